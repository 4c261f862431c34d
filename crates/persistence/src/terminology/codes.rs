//! Record shapes for the supported code systems.

use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::core::sql::{SqlField, column};

use super::TerminologyCode;

/// A LOINC observation code.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoincCode {
    pub code: String,
    pub long_common_name: String,
    pub component: Option<String>,
    pub property: Option<String>,
    pub system: Option<String>,
    pub scale_type: Option<String>,
    pub class: Option<String>,
    pub status: Option<String>,
}

impl TerminologyCode for LoincCode {
    const SYSTEM: &'static str = "LOINC";
    const TABLE: &'static str = "loinc_codes";
    const CODE_COLUMN: &'static str = "code";
    const SEARCH_COLUMNS: &'static [&'static str] =
        &["code", "long_common_name", "component", "class"];
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.loinc_codes (
    code TEXT PRIMARY KEY,
    long_common_name TEXT NOT NULL,
    component TEXT,
    property TEXT,
    system TEXT,
    scale_type TEXT,
    class TEXT,
    status TEXT
);
";

    fn code(&self) -> &str {
        &self.code
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("code", self.code.to_sql_value()),
            ("long_common_name", self.long_common_name.to_sql_value()),
            ("component", self.component.to_sql_value()),
            ("property", self.property.to_sql_value()),
            ("system", self.system.to_sql_value()),
            ("scale_type", self.scale_type.to_sql_value()),
            ("class", self.class.to_sql_value()),
            ("status", self.status.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: column(row, "code")?,
            long_common_name: column(row, "long_common_name")?,
            component: column(row, "component")?,
            property: column(row, "property")?,
            system: column(row, "system")?,
            scale_type: column(row, "scale_type")?,
            class: column(row, "class")?,
            status: column(row, "status")?,
        })
    }
}

/// An ICD-10 diagnosis code.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Icd10Code {
    pub code: String,
    pub description: String,
    pub category: Option<String>,
    pub chapter: Option<String>,
    /// Whether the code is valid on a claim (a leaf code).
    pub billable: bool,
}

impl TerminologyCode for Icd10Code {
    const SYSTEM: &'static str = "ICD-10";
    const TABLE: &'static str = "icd10_codes";
    const CODE_COLUMN: &'static str = "code";
    const SEARCH_COLUMNS: &'static [&'static str] = &["code", "description", "category"];
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.icd10_codes (
    code TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    category TEXT,
    chapter TEXT,
    billable INTEGER NOT NULL DEFAULT 0
);
";

    fn code(&self) -> &str {
        &self.code
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("code", self.code.to_sql_value()),
            ("description", self.description.to_sql_value()),
            ("category", self.category.to_sql_value()),
            ("chapter", self.chapter.to_sql_value()),
            ("billable", self.billable.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: column(row, "code")?,
            description: column(row, "description")?,
            category: column(row, "category")?,
            chapter: column(row, "chapter")?,
            billable: column(row, "billable")?,
        })
    }
}

/// A SNOMED CT concept.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnomedConcept {
    pub concept_id: String,
    pub preferred_term: String,
    pub fully_specified_name: Option<String>,
    pub semantic_tag: Option<String>,
    /// Pipe-separated alternative descriptions.
    pub synonyms: Option<String>,
    pub active: bool,
}

impl TerminologyCode for SnomedConcept {
    const SYSTEM: &'static str = "SNOMED-CT";
    const TABLE: &'static str = "snomed_concepts";
    const CODE_COLUMN: &'static str = "concept_id";
    const SEARCH_COLUMNS: &'static [&'static str] =
        &["concept_id", "preferred_term", "fully_specified_name", "synonyms"];
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.snomed_concepts (
    concept_id TEXT PRIMARY KEY,
    preferred_term TEXT NOT NULL,
    fully_specified_name TEXT,
    semantic_tag TEXT,
    synonyms TEXT,
    active INTEGER NOT NULL DEFAULT 1
);
";

    fn code(&self) -> &str {
        &self.concept_id
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("concept_id", self.concept_id.to_sql_value()),
            ("preferred_term", self.preferred_term.to_sql_value()),
            ("fully_specified_name", self.fully_specified_name.to_sql_value()),
            ("semantic_tag", self.semantic_tag.to_sql_value()),
            ("synonyms", self.synonyms.to_sql_value()),
            ("active", self.active.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            concept_id: column(row, "concept_id")?,
            preferred_term: column(row, "preferred_term")?,
            fully_specified_name: column(row, "fully_specified_name")?,
            semantic_tag: column(row, "semantic_tag")?,
            synonyms: column(row, "synonyms")?,
            active: column(row, "active")?,
        })
    }
}

/// An RxNorm drug concept.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RxNormConcept {
    pub rxcui: String,
    pub name: String,
    /// RxNorm term type such as `SCD` or `BN`.
    pub term_type: Option<String>,
    pub synonyms: Option<String>,
    pub suppressed: bool,
}

impl TerminologyCode for RxNormConcept {
    const SYSTEM: &'static str = "RxNorm";
    const TABLE: &'static str = "rxnorm_concepts";
    const CODE_COLUMN: &'static str = "rxcui";
    const SEARCH_COLUMNS: &'static [&'static str] = &["rxcui", "name", "synonyms"];
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.rxnorm_concepts (
    rxcui TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    term_type TEXT,
    synonyms TEXT,
    suppressed INTEGER NOT NULL DEFAULT 0
);
";

    fn code(&self) -> &str {
        &self.rxcui
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("rxcui", self.rxcui.to_sql_value()),
            ("name", self.name.to_sql_value()),
            ("term_type", self.term_type.to_sql_value()),
            ("synonyms", self.synonyms.to_sql_value()),
            ("suppressed", self.suppressed.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            rxcui: column(row, "rxcui")?,
            name: column(row, "name")?,
            term_type: column(row, "term_type")?,
            synonyms: column(row, "synonyms")?,
            suppressed: column(row, "suppressed")?,
        })
    }
}

/// A CPT procedure code.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CptCode {
    pub code: String,
    pub description: String,
    pub short_description: Option<String>,
    pub category: Option<String>,
}

impl TerminologyCode for CptCode {
    const SYSTEM: &'static str = "CPT";
    const TABLE: &'static str = "cpt_codes";
    const CODE_COLUMN: &'static str = "code";
    const SEARCH_COLUMNS: &'static [&'static str] =
        &["code", "description", "short_description", "category"];
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.cpt_codes (
    code TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    short_description TEXT,
    category TEXT
);
";

    fn code(&self) -> &str {
        &self.code
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("code", self.code.to_sql_value()),
            ("description", self.description.to_sql_value()),
            ("short_description", self.short_description.to_sql_value()),
            ("category", self.category.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: column(row, "code")?,
            description: column(row, "description")?,
            short_description: column(row, "short_description")?,
            category: column(row, "category")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_code_column_first<T: TerminologyCode>(record: &T) {
        let columns = record.columns();
        assert_eq!(columns[0].0, T::CODE_COLUMN);
        assert!(T::SEARCH_COLUMNS.contains(&T::CODE_COLUMN));
    }

    #[test]
    fn test_code_column_leads_every_system() {
        assert_code_column_first(&LoincCode::default());
        assert_code_column_first(&Icd10Code::default());
        assert_code_column_first(&SnomedConcept::default());
        assert_code_column_first(&RxNormConcept::default());
        assert_code_column_first(&CptCode::default());
    }

    #[test]
    fn test_code_accessor_reads_natural_key() {
        let concept = SnomedConcept {
            concept_id: "22298006".into(),
            preferred_term: "Myocardial infarction".into(),
            ..Default::default()
        };
        assert_eq!(concept.code(), "22298006");
    }
}
