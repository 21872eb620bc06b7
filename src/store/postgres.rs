use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::{debug, instrument};

use super::{DomainMatch, SourceStore, StoreError, TargetStore};
use crate::model::{
    Audit, CompanyRef, EntityKind, LegacyCompany, LegacyContact, LegacyLead, LegacyPosition,
    LookupRow, LookupTable, TargetRow,
};
use crate::util::db::Db;

// ----------------------------------------------------------------------------
// Source (legacy) side: read-only, camelCase quoted columns
// ----------------------------------------------------------------------------

// Casts keep the typed row shapes stable even when legacy columns drifted
// (uuid vs text ids, json vs text payloads, timestamp vs timestamptz).
const LEGACY_AUDIT_COLUMNS: &str = r#""createdAt"::timestamptz AS "createdAt", "createdBy",
    "updatedAt"::timestamptz AS "updatedAt", "updatedBy", "isDeleted",
    "deletedAt"::timestamptz AS "deletedAt", "deletedBy""#;

const LEGACY_COMPANY_COLUMNS: &str = r#""id"::text AS "id", "name", "domain", "website",
    "data"::text AS "data", "status""#;

const LEGACY_LEAD_COLUMNS: &str = r#""id"::text AS "id", "companyId"::text AS "companyId",
    "companyName", "contactName", "email", "phone", "source", "notes",
    "data"::text AS "data", "isStuck", "isPending""#;

const LEGACY_POSITION_COLUMNS: &str = r#""id"::text AS "id", "companyId"::text AS "companyId",
    "title", "description", "role", "location", "employmentType",
    "data"::text AS "data", "isFilled", "isOpen""#;

const LEGACY_CONTACT_COLUMNS: &str = r#""id"::text AS "id", "companyId"::text AS "companyId",
    "firstName", "lastName", "email", "phone", "title", "linkedinUrl",
    "data"::text AS "data", "isPrimary""#;

#[derive(Clone)]
pub struct PgSourceStore {
    db: Db,
}

impl PgSourceStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn page<T>(&self, kind: EntityKind, columns: &str, skip: i64, take: i64) -> anyhow::Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        // Ordering by id keeps offset pagination stable across pages.
        let sql = format!(
            r#"SELECT {columns}, {LEGACY_AUDIT_COLUMNS} FROM "{table}" ORDER BY "id" OFFSET $1 LIMIT $2"#,
            table = kind.source_table()
        );
        let rows = sqlx::query_as::<_, T>(&sql)
            .persistent(false)
            .bind(skip)
            .bind(take)
            .fetch_all(&self.db.pool)
            .await
            .with_context(|| format!("failed to fetch {kind} page (skip={skip}, take={take})"))?;
        debug!(target: "source", %kind, skip, take, fetched = rows.len(), "fetched legacy page");
        Ok(rows)
    }
}

#[async_trait]
impl SourceStore for PgSourceStore {
    async fn count(&self, kind: EntityKind) -> anyhow::Result<i64> {
        let sql = format!(r#"SELECT COUNT(*) FROM "{}""#, kind.source_table());
        let n: i64 = sqlx::query_scalar(&sql)
            .persistent(false)
            .fetch_one(&self.db.pool)
            .await
            .with_context(|| format!("failed to count legacy {kind} rows"))?;
        Ok(n)
    }

    async fn companies(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyCompany>> {
        self.page(EntityKind::Company, LEGACY_COMPANY_COLUMNS, skip, take).await
    }

    async fn leads(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyLead>> {
        self.page(EntityKind::Lead, LEGACY_LEAD_COLUMNS, skip, take).await
    }

    async fn positions(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyPosition>> {
        self.page(EntityKind::Position, LEGACY_POSITION_COLUMNS, skip, take).await
    }

    async fn contacts(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyContact>> {
        self.page(EntityKind::Contact, LEGACY_CONTACT_COLUMNS, skip, take).await
    }

    #[instrument(skip(self))]
    async fn company_by_id(&self, legacy_id: &str) -> anyhow::Result<Option<LegacyCompany>> {
        let sql = format!(
            r#"SELECT {LEGACY_COMPANY_COLUMNS}, {LEGACY_AUDIT_COLUMNS} FROM "Company" WHERE "id"::text = $1 LIMIT 1"#
        );
        let row = sqlx::query_as::<_, LegacyCompany>(&sql)
            .persistent(false)
            .bind(legacy_id)
            .fetch_optional(&self.db.pool)
            .await
            .context("failed to fetch legacy company by id")?;
        Ok(row)
    }
}

// ----------------------------------------------------------------------------
// Target side: snake_case tables, one statement per record
// ----------------------------------------------------------------------------

const AUDIT_COLUMNS: [&str; 7] = [
    "created_by",
    "created_at",
    "last_updated_by",
    "last_updated_at",
    "is_deleted",
    "deleted_by",
    "deleted_at",
];

const COMPANY_COLUMNS: &[&str] = &[
    "id",
    "name",
    "domain",
    "website",
    "industry",
    "description",
    "linkedin_url",
    "headquarters",
    "status_key",
    "status",
    "schema_version",
];

const LEAD_COLUMNS: &[&str] = &[
    "id",
    "company_id",
    "company_name",
    "company_status",
    "company_is_deleted",
    "contact_name",
    "email",
    "phone",
    "source",
    "notes",
    "metadata",
    "status_key",
    "status",
    "schema_version",
];

const POSITION_COLUMNS: &[&str] = &[
    "id",
    "company_id",
    "company_name",
    "company_status",
    "company_is_deleted",
    "title",
    "description",
    "role_key",
    "role",
    "location",
    "employment_type",
    "details",
    "status_key",
    "status",
    "schema_version",
];

const CONTACT_COLUMNS: &[&str] = &[
    "id",
    "company_id",
    "company_name",
    "first_name",
    "last_name",
    "email",
    "email_is_placeholder",
    "phone",
    "job_title",
    "linkedin_url",
    "is_primary",
    "metadata",
    "schema_version",
];

const COMPANY_REF_COLUMNS: &str = "id, name, status, is_deleted, domain";

fn bind_audit<'a>(b: &mut Separated<'_, 'a, Postgres, &'static str>, audit: &'a Audit) {
    b.push_bind(&audit.created_by)
        .push_bind(audit.created_at)
        .push_bind(&audit.last_updated_by)
        .push_bind(audit.last_updated_at)
        .push_bind(audit.is_deleted)
        .push_bind(&audit.deleted_by)
        .push_bind(audit.deleted_at);
}

fn write_query(row: &TargetRow, upsert: bool) -> QueryBuilder<'_, Postgres> {
    let (table, columns) = match row {
        TargetRow::Company(_) => ("companies", COMPANY_COLUMNS),
        TargetRow::Lead(_) => ("leads", LEAD_COLUMNS),
        TargetRow::Position(_) => ("positions", POSITION_COLUMNS),
        TargetRow::Contact(_) => ("contacts", CONTACT_COLUMNS),
    };
    let all_columns: Vec<&str> = columns.iter().chain(AUDIT_COLUMNS.iter()).copied().collect();

    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("INSERT INTO {table} ({}) ", all_columns.join(", ")));
    match row {
        TargetRow::Company(c) => qb.push_values(std::iter::once(c), |mut b, c| {
            b.push_bind(&c.id)
                .push_bind(&c.name)
                .push_bind(&c.domain)
                .push_bind(&c.website)
                .push_bind(&c.industry)
                .push_bind(&c.description)
                .push_bind(&c.linkedin_url)
                .push_bind(&c.headquarters)
                .push_bind(&c.status_key)
                .push_bind(&c.status)
                .push_bind(c.schema_version);
            bind_audit(&mut b, &c.audit);
        }),
        TargetRow::Lead(l) => qb.push_values(std::iter::once(l), |mut b, l| {
            b.push_bind(&l.id)
                .push_bind(&l.company_id)
                .push_bind(&l.company_name)
                .push_bind(&l.company_status)
                .push_bind(l.company_is_deleted)
                .push_bind(&l.contact_name)
                .push_bind(&l.email)
                .push_bind(&l.phone)
                .push_bind(&l.source)
                .push_bind(&l.notes)
                .push_bind(&l.metadata)
                .push_bind(&l.status_key)
                .push_bind(&l.status)
                .push_bind(l.schema_version);
            bind_audit(&mut b, &l.audit);
        }),
        TargetRow::Position(p) => qb.push_values(std::iter::once(p), |mut b, p| {
            b.push_bind(&p.id)
                .push_bind(&p.company_id)
                .push_bind(&p.company_name)
                .push_bind(&p.company_status)
                .push_bind(p.company_is_deleted)
                .push_bind(&p.title)
                .push_bind(&p.description)
                .push_bind(&p.role_key)
                .push_bind(&p.role)
                .push_bind(&p.location)
                .push_bind(&p.employment_type)
                .push_bind(&p.details)
                .push_bind(&p.status_key)
                .push_bind(&p.status)
                .push_bind(p.schema_version);
            bind_audit(&mut b, &p.audit);
        }),
        TargetRow::Contact(c) => qb.push_values(std::iter::once(c), |mut b, c| {
            b.push_bind(&c.id)
                .push_bind(&c.company_id)
                .push_bind(&c.company_name)
                .push_bind(&c.first_name)
                .push_bind(&c.last_name)
                .push_bind(&c.email)
                .push_bind(c.email_is_placeholder)
                .push_bind(&c.phone)
                .push_bind(&c.job_title)
                .push_bind(&c.linkedin_url)
                .push_bind(c.is_primary)
                .push_bind(&c.metadata)
                .push_bind(c.schema_version);
            bind_audit(&mut b, &c.audit);
        }),
    };

    if upsert {
        let assignments: Vec<String> = all_columns
            .iter()
            .filter(|c| **c != "id")
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();
        qb.push(" ON CONFLICT (id) DO UPDATE SET ");
        qb.push(assignments.join(", "));
    }
    qb
}

/// Escape LIKE metacharacters so a domain is matched literally inside `%...%`.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[derive(Clone)]
pub struct PgTargetStore {
    db: Db,
}

impl PgTargetStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn write(&self, row: &TargetRow, upsert: bool) -> Result<(), StoreError> {
        let table = row.kind().target_table();
        let mut qb = write_query(row, upsert);
        qb.build()
            .persistent(false)
            .execute(&self.db.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, table))?;
        Ok(())
    }
}

#[async_trait]
impl TargetStore for PgTargetStore {
    async fn count(&self, kind: EntityKind) -> Result<i64, StoreError> {
        let table = kind.target_table();
        let sql = format!("SELECT COUNT(*) FROM {table}");
        sqlx::query_scalar(&sql)
            .persistent(false)
            .fetch_one(&self.db.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, table))
    }

    async fn exists(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError> {
        let table = kind.target_table();
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)");
        sqlx::query_scalar(&sql)
            .persistent(false)
            .bind(id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, table))
    }

    #[instrument(skip(self, row), fields(kind = %row.kind(), id = row.id()))]
    async fn insert(&self, row: &TargetRow) -> Result<(), StoreError> {
        self.write(row, false).await
    }

    #[instrument(skip(self, row), fields(kind = %row.kind(), id = row.id()))]
    async fn upsert(&self, row: &TargetRow) -> Result<(), StoreError> {
        self.write(row, true).await
    }

    async fn company_by_id(&self, id: &str) -> Result<Option<CompanyRef>, StoreError> {
        let sql = format!("SELECT {COMPANY_REF_COLUMNS} FROM companies WHERE id = $1");
        sqlx::query_as::<_, CompanyRef>(&sql)
            .persistent(false)
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "companies"))
    }

    async fn company_by_domain(&self, domain: &str, matching: DomainMatch) -> Result<Option<CompanyRef>, StoreError> {
        let (predicate, bound) = match matching {
            DomainMatch::Exact => ("domain = $1", domain.to_string()),
            DomainMatch::CaseInsensitive => ("lower(domain) = lower($1)", domain.to_string()),
            DomainMatch::Contains => ("domain ILIKE $1", format!("%{}%", escape_like(domain))),
        };
        let sql = format!(
            "SELECT {COMPANY_REF_COLUMNS} FROM companies WHERE {predicate} ORDER BY created_at, id LIMIT 1"
        );
        sqlx::query_as::<_, CompanyRef>(&sql)
            .persistent(false)
            .bind(bound)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "companies"))
    }

    async fn contact_id_by_email(&self, email: &str) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar("SELECT id FROM contacts WHERE lower(email) = lower($1) LIMIT 1")
            .persistent(false)
            .bind(email)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "contacts"))
    }

    async fn lookup_by_key(&self, table: LookupTable, key: &str) -> Result<Option<LookupRow>, StoreError> {
        let name = table.table_name();
        let sql = format!("SELECT key, value FROM {name} WHERE key = $1 LIMIT 1");
        sqlx::query_as::<_, LookupRow>(&sql)
            .persistent(false)
            .bind(key)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, name))
    }

    async fn lookup_by_value(&self, table: LookupTable, value: &str) -> Result<Option<LookupRow>, StoreError> {
        let name = table.table_name();
        let sql = format!("SELECT key, value FROM {name} WHERE value = $1 LIMIT 1");
        sqlx::query_as::<_, LookupRow>(&sql)
            .persistent(false)
            .bind(value)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, name))
    }

    async fn create_lookup(&self, table: LookupTable, row: &LookupRow) -> Result<(), StoreError> {
        let name = table.table_name();
        let sql = format!("INSERT INTO {name} (key, value) VALUES ($1, $2)");
        sqlx::query(&sql)
            .persistent(false)
            .bind(&row.key)
            .bind(&row.value)
            .execute(&self.db.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, name))?;
        Ok(())
    }
}
