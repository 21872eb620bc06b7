//! Row shapes of the redesigned schema.
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::EntityKind;

/// Written on every target row; bumped when the target layout changes.
pub const SCHEMA_VERSION: i32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Audit {
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_by: String,
    pub last_updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Minimal company projection handed out by the reference resolver.
/// Copied onto referencing rows at transform time and never refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CompanyRef {
    pub id: String,
    pub name: String,
    pub status: String,
    pub is_deleted: bool,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub linkedin_url: Option<String>,
    pub headquarters: Option<String>,
    pub status_key: String,
    pub status: String,
    pub schema_version: i32,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lead {
    pub id: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub company_status: Option<String>,
    pub company_is_deleted: Option<bool>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub metadata: Option<Value>,
    pub status_key: String,
    pub status: String,
    pub schema_version: i32,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub id: String,
    pub company_id: String,
    pub company_name: String,
    pub company_status: String,
    pub company_is_deleted: bool,
    pub title: String,
    pub description: Option<String>,
    pub role_key: String,
    pub role: String,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub details: Option<Value>,
    pub status_key: String,
    pub status: String,
    pub schema_version: i32,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub id: String,
    pub company_id: String,
    pub company_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub email_is_placeholder: bool,
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub linkedin_url: Option<String>,
    pub is_primary: bool,
    pub metadata: Option<Value>,
    pub schema_version: i32,
    #[serde(flatten)]
    pub audit: Audit,
}

/// One transformed record ready for a single atomic write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetRow {
    Company(Company),
    Lead(Lead),
    Position(Position),
    Contact(Contact),
}

impl TargetRow {
    pub fn id(&self) -> &str {
        match self {
            TargetRow::Company(r) => &r.id,
            TargetRow::Lead(r) => &r.id,
            TargetRow::Position(r) => &r.id,
            TargetRow::Contact(r) => &r.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            TargetRow::Company(_) => EntityKind::Company,
            TargetRow::Lead(_) => EntityKind::Lead,
            TargetRow::Position(_) => EntityKind::Position,
            TargetRow::Contact(_) => EntityKind::Contact,
        }
    }
}
