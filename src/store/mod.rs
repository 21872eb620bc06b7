//! Store seams. The migration core only talks to these traits; Postgres backs both
//! sides in production and an in-memory store backs the tests.
pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::model::{
    CompanyRef, EntityKind, LegacyCompany, LegacyContact, LegacyLead, LegacyPosition, LookupRow,
    LookupTable, TargetRow,
};

pub use postgres::{PgSourceStore, PgTargetStore};

/// Store-level failures the core needs to branch on.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique index rejected the write. `field` is `"id"` for primary-key collisions.
    #[error("unique constraint violated on field `{field}`")]
    UniqueViolation { field: String },

    #[error("value too long for column: {detail}")]
    ValueTooLong { detail: String },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Classify a driver error raised while touching `table`.
    pub fn from_sqlx(err: sqlx::Error, table: &str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                // unique_violation
                Some("23505") => {
                    return StoreError::UniqueViolation {
                        field: unique_field_from_constraint(table, db.constraint()),
                    }
                }
                // string_data_right_truncation
                Some("22001") => {
                    return StoreError::ValueTooLong {
                        detail: db.message().to_string(),
                    }
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

/// Derive the offending column from a Postgres constraint name
/// (`contacts_email_key` → `email`, `companies_pkey` → `id`).
pub fn unique_field_from_constraint(table: &str, constraint: Option<&str>) -> String {
    let Some(name) = constraint else {
        return "unknown".to_string();
    };
    if name.ends_with("_pkey") {
        return "id".to_string();
    }
    let rest = name
        .strip_prefix(table)
        .and_then(|s| s.strip_prefix('_'))
        .unwrap_or(name);
    ["_key", "_unique", "_uniq", "_idx"]
        .iter()
        .find_map(|suffix| rest.strip_suffix(suffix))
        .unwrap_or(rest)
        .to_string()
}

/// Read-only access to the legacy database.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn count(&self, kind: EntityKind) -> anyhow::Result<i64>;
    async fn companies(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyCompany>>;
    async fn leads(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyLead>>;
    async fn positions(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyPosition>>;
    async fn contacts(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyContact>>;
    /// Fetch a single legacy company by its raw (un-normalized) identifier.
    async fn company_by_id(&self, legacy_id: &str) -> anyhow::Result<Option<LegacyCompany>>;
}

/// How a company natural key is compared against the target's `domain` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainMatch {
    Exact,
    CaseInsensitive,
    /// Substring containment. Overbroad on purpose: `example.com` also hits `myexample.com`.
    Contains,
}

#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn count(&self, kind: EntityKind) -> Result<i64, StoreError>;
    async fn exists(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError>;
    async fn insert(&self, row: &TargetRow) -> Result<(), StoreError>;
    /// Insert or overwrite by identifier.
    async fn upsert(&self, row: &TargetRow) -> Result<(), StoreError>;

    async fn company_by_id(&self, id: &str) -> Result<Option<CompanyRef>, StoreError>;
    async fn company_by_domain(&self, domain: &str, matching: DomainMatch) -> Result<Option<CompanyRef>, StoreError>;
    async fn contact_id_by_email(&self, email: &str) -> Result<Option<String>, StoreError>;

    async fn lookup_by_key(&self, table: LookupTable, key: &str) -> Result<Option<LookupRow>, StoreError>;
    async fn lookup_by_value(&self, table: LookupTable, value: &str) -> Result<Option<LookupRow>, StoreError>;
    async fn create_lookup(&self, table: LookupTable, row: &LookupRow) -> Result<(), StoreError>;
}
