//! Message definitions and the headers of exchanged messages.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// Describes a kind of message: its triggering event and expected response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageDefinition {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub url: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub status: String,
    pub date: DateTime<Utc>,
    pub publisher: Option<String>,
    pub event_code: String,
    pub event_system: Option<String>,
    /// One of `consequence`, `currency`, `notification`.
    pub category: Option<String>,
    /// One of `always`, `on-error`, `never`, `on-success`.
    pub response_required: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub enum MessageDefinitionFilter {
    Url(String),
    Name(String),
    Status(String),
    Event(String),
    Category(String),
    Date(DateParam),
}

impl SearchFilter for MessageDefinitionFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "url" => params::token(key, value).map(Self::Url),
            "name" => params::token(key, value).map(Self::Name),
            "status" => params::token(key, value).map(Self::Status),
            "event" => params::token(key, value).map(Self::Event),
            "category" => params::token(key, value).map(Self::Category),
            "date" => params::date(key, value).map(Self::Date),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Url(url) => Predicate::eq("url", url.as_str()),
            Self::Name(name) => Predicate::text(&["name"], name.as_str()),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Event(event) => Predicate::eq("event_code", event.as_str()),
            Self::Category(category) => Predicate::eq("category", category.as_str()),
            Self::Date(date) => Predicate::instant("date", *date),
        }
    }
}

impl Resource for MessageDefinition {
    const RESOURCE_TYPE: &'static str = "MessageDefinition";
    const TABLE: &'static str = "message_definitions";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.message_definitions (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    url TEXT,
    name TEXT,
    title TEXT,
    status TEXT NOT NULL CHECK (status IN ('draft', 'active', 'retired', 'unknown')),
    date TEXT NOT NULL,
    publisher TEXT,
    event_code TEXT NOT NULL,
    event_system TEXT,
    category TEXT CHECK (category IN ('consequence', 'currency', 'notification')),
    response_required TEXT CHECK (response_required IN ('always', 'on-error', 'never', 'on-success')),
    description TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_message_definitions_status ON message_definitions (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_message_definitions_event ON message_definitions (event_code);
CREATE INDEX IF NOT EXISTS {ns}.idx_message_definitions_url ON message_definitions (url);
";

    type Filter = MessageDefinitionFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("url", self.url.to_sql_value()),
            ("name", self.name.to_sql_value()),
            ("title", self.title.to_sql_value()),
            ("status", self.status.to_sql_value()),
            ("date", self.date.to_sql_value()),
            ("publisher", self.publisher.to_sql_value()),
            ("event_code", self.event_code.to_sql_value()),
            ("event_system", self.event_system.to_sql_value()),
            ("category", self.category.to_sql_value()),
            ("response_required", self.response_required.to_sql_value()),
            ("description", self.description.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            url: column(row, "url")?,
            name: column(row, "name")?,
            title: column(row, "title")?,
            status: column(row, "status")?,
            date: column(row, "date")?,
            publisher: column(row, "publisher")?,
            event_code: column(row, "event_code")?,
            event_system: column(row, "event_system")?,
            category: column(row, "category")?,
            response_required: column(row, "response_required")?,
            description: column(row, "description")?,
        })
    }
}

pub type MessageDefinitionRepository = Repository<MessageDefinition>;

/// Routing and context of one exchanged message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub event_code: String,
    pub event_system: Option<String>,
    pub destination_name: Option<String>,
    pub destination_endpoint: Option<String>,
    pub sender_organization_id: Option<Uuid>,
    pub enterer_practitioner_id: Option<Uuid>,
    pub author_practitioner_id: Option<Uuid>,
    pub source_name: Option<String>,
    pub source_endpoint: String,
    pub responsible_organization_id: Option<Uuid>,
    pub reason_code: Option<String>,
    pub response_identifier: Option<String>,
    /// One of `ok`, `transient-error`, `fatal-error`.
    pub response_code: Option<String>,
    pub definition_url: Option<String>,
    pub focus_reference: Option<String>,
}

#[derive(Debug, Clone)]
pub enum MessageHeaderFilter {
    Event(String),
    Source(String),
    Destination(String),
    Sender(Uuid),
    Author(Uuid),
    ResponseCode(String),
}

impl SearchFilter for MessageHeaderFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "event" => params::token(key, value).map(Self::Event),
            "source" => params::token(key, value).map(Self::Source),
            "destination" => params::token(key, value).map(Self::Destination),
            "sender" => params::uuid(key, value).map(Self::Sender),
            "author" => params::uuid(key, value).map(Self::Author),
            "response-code" | "code" => params::token(key, value).map(Self::ResponseCode),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Event(event) => Predicate::eq("event_code", event.as_str()),
            Self::Source(source) => {
                Predicate::text(&["source_name", "source_endpoint"], source.as_str())
            }
            Self::Destination(destination) => Predicate::text(
                &["destination_name", "destination_endpoint"],
                destination.as_str(),
            ),
            Self::Sender(id) => Predicate::eq("sender_organization_id", *id),
            Self::Author(id) => Predicate::eq("author_practitioner_id", *id),
            Self::ResponseCode(code) => Predicate::eq("response_code", code.as_str()),
        }
    }
}

impl Resource for MessageHeader {
    const RESOURCE_TYPE: &'static str = "MessageHeader";
    const TABLE: &'static str = "message_headers";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.message_headers (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    event_code TEXT NOT NULL,
    event_system TEXT,
    destination_name TEXT,
    destination_endpoint TEXT,
    sender_organization_id TEXT REFERENCES organizations (id),
    enterer_practitioner_id TEXT REFERENCES practitioners (id),
    author_practitioner_id TEXT REFERENCES practitioners (id),
    source_name TEXT,
    source_endpoint TEXT NOT NULL,
    responsible_organization_id TEXT REFERENCES organizations (id),
    reason_code TEXT,
    response_identifier TEXT,
    response_code TEXT CHECK (response_code IN ('ok', 'transient-error', 'fatal-error')),
    definition_url TEXT,
    focus_reference TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_message_headers_event ON message_headers (event_code);
CREATE INDEX IF NOT EXISTS {ns}.idx_message_headers_sender ON message_headers (sender_organization_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_message_headers_author ON message_headers (author_practitioner_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_message_headers_response ON message_headers (response_code);
";

    type Filter = MessageHeaderFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("event_code", self.event_code.to_sql_value()),
            ("event_system", self.event_system.to_sql_value()),
            ("destination_name", self.destination_name.to_sql_value()),
            ("destination_endpoint", self.destination_endpoint.to_sql_value()),
            ("sender_organization_id", self.sender_organization_id.to_sql_value()),
            ("enterer_practitioner_id", self.enterer_practitioner_id.to_sql_value()),
            ("author_practitioner_id", self.author_practitioner_id.to_sql_value()),
            ("source_name", self.source_name.to_sql_value()),
            ("source_endpoint", self.source_endpoint.to_sql_value()),
            ("responsible_organization_id", self.responsible_organization_id.to_sql_value()),
            ("reason_code", self.reason_code.to_sql_value()),
            ("response_identifier", self.response_identifier.to_sql_value()),
            ("response_code", self.response_code.to_sql_value()),
            ("definition_url", self.definition_url.to_sql_value()),
            ("focus_reference", self.focus_reference.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            event_code: column(row, "event_code")?,
            event_system: column(row, "event_system")?,
            destination_name: column(row, "destination_name")?,
            destination_endpoint: column(row, "destination_endpoint")?,
            sender_organization_id: column(row, "sender_organization_id")?,
            enterer_practitioner_id: column(row, "enterer_practitioner_id")?,
            author_practitioner_id: column(row, "author_practitioner_id")?,
            source_name: column(row, "source_name")?,
            source_endpoint: column(row, "source_endpoint")?,
            responsible_organization_id: column(row, "responsible_organization_id")?,
            reason_code: column(row, "reason_code")?,
            response_identifier: column(row, "response_identifier")?,
            response_code: column(row, "response_code")?,
            definition_url: column(row, "definition_url")?,
            focus_reference: column(row, "focus_reference")?,
        })
    }
}

pub type MessageHeaderRepository = Repository<MessageHeader>;
