//! Row shapes of the legacy schema. Column names are camelCase in the source database;
//! everything here is read-only input and never written back.
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Anything read from a legacy table that carries its own identifier.
pub trait LegacyRecord: Send + Sync {
    fn legacy_id(&self) -> &str;
}

/// Audit and soft-delete columns shared by every legacy table.
#[derive(Debug, Clone, Default, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct LegacyAudit {
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub is_deleted: Option<bool>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

#[derive(Debug, Clone, Default, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct LegacyCompany {
    pub id: String,
    pub name: Option<String>,
    pub domain: Option<String>,
    pub website: Option<String>,
    /// Serialized JSON payload (`name`, `website_url`, `industry`, ...).
    pub data: Option<String>,
    pub status: Option<String>,
    #[sqlx(flatten)]
    pub audit: LegacyAudit,
}

#[derive(Debug, Clone, Default, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct LegacyLead {
    pub id: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub data: Option<String>,
    pub is_stuck: Option<bool>,
    pub is_pending: Option<bool>,
    #[sqlx(flatten)]
    pub audit: LegacyAudit,
}

#[derive(Debug, Clone, Default, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct LegacyPosition {
    pub id: String,
    pub company_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub role: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub data: Option<String>,
    pub is_filled: Option<bool>,
    pub is_open: Option<bool>,
    #[sqlx(flatten)]
    pub audit: LegacyAudit,
}

#[derive(Debug, Clone, Default, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct LegacyContact {
    pub id: String,
    pub company_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub linkedin_url: Option<String>,
    pub data: Option<String>,
    pub is_primary: Option<bool>,
    #[sqlx(flatten)]
    pub audit: LegacyAudit,
}

macro_rules! legacy_record {
    ($($ty:ty),* $(,)?) => {
        $(impl LegacyRecord for $ty {
            fn legacy_id(&self) -> &str {
                &self.id
            }
        })*
    };
}

legacy_record!(LegacyCompany, LegacyLead, LegacyPosition, LegacyContact);
