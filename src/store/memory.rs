//! In-memory store backing both seams in tests. Enforces the target's unique
//! indexes (id everywhere, contact email, lookup key) and optional column widths.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{DomainMatch, SourceStore, StoreError, TargetStore};
use crate::model::{
    Audit, Company, CompanyRef, Contact, EntityKind, LegacyCompany, LegacyContact, LegacyLead, LegacyPosition,
    LegacyRecord, LookupRow, LookupTable, TargetRow, SCHEMA_VERSION,
};

#[derive(Default)]
struct State {
    legacy_companies: Vec<LegacyCompany>,
    legacy_leads: Vec<LegacyLead>,
    legacy_positions: Vec<LegacyPosition>,
    legacy_contacts: Vec<LegacyContact>,

    rows: BTreeMap<(EntityKind, String), TargetRow>,
    lookups: HashMap<LookupTable, Vec<LookupRow>>,

    pending_race: Option<(LookupTable, LookupRow)>,
    lookup_width: Option<usize>,
    text_width: Option<usize>,
    failing_writes: HashSet<String>,
    writes: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn sorted_by_id<T: LegacyRecord>(mut rows: Vec<T>) -> Vec<T> {
    rows.sort_by(|a, b| a.legacy_id().cmp(b.legacy_id()));
    rows
}

fn page<T: Clone>(rows: &[T], skip: i64, take: i64) -> Vec<T> {
    rows.iter()
        .skip(skip.max(0) as usize)
        .take(take.max(0) as usize)
        .cloned()
        .collect()
}

fn company_ref(c: &Company) -> CompanyRef {
    CompanyRef {
        id: c.id.clone(),
        name: c.name.clone(),
        status: c.status.clone(),
        is_deleted: c.audit.is_deleted,
        domain: c.domain.clone(),
    }
}

/// The column a width limit applies to, per row kind.
fn constrained_text(row: &TargetRow) -> Option<&str> {
    match row {
        TargetRow::Company(c) => Some(&c.name),
        TargetRow::Lead(l) => l.contact_name.as_deref(),
        TargetRow::Position(p) => Some(&p.title),
        TargetRow::Contact(c) => Some(&c.email),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_legacy_companies(self, rows: Vec<LegacyCompany>) -> Self {
        self.lock().legacy_companies = sorted_by_id(rows);
        self
    }

    pub fn with_legacy_leads(self, rows: Vec<LegacyLead>) -> Self {
        self.lock().legacy_leads = sorted_by_id(rows);
        self
    }

    pub fn with_legacy_positions(self, rows: Vec<LegacyPosition>) -> Self {
        self.lock().legacy_positions = sorted_by_id(rows);
        self
    }

    pub fn with_legacy_contacts(self, rows: Vec<LegacyContact>) -> Self {
        self.lock().legacy_contacts = sorted_by_id(rows);
        self
    }

    /// Seed a target company directly, bypassing write accounting.
    pub fn put_company(&self, company: Company) {
        self.lock()
            .rows
            .insert((EntityKind::Company, company.id.clone()), TargetRow::Company(company));
    }

    pub fn put_contact(&self, contact: Contact) {
        self.lock()
            .rows
            .insert((EntityKind::Contact, contact.id.clone()), TargetRow::Contact(contact));
    }

    pub fn put_lookup(&self, table: LookupTable, row: LookupRow) {
        self.lock().lookups.entry(table).or_default().push(row);
    }

    pub fn lookups(&self, table: LookupTable) -> Vec<LookupRow> {
        self.lock().lookups.get(&table).cloned().unwrap_or_default()
    }

    /// The next `create_lookup` on `table` behaves as if another writer inserted `row` first.
    pub fn race_next_lookup_create(&self, table: LookupTable, row: LookupRow) {
        self.lock().pending_race = Some((table, row));
    }

    /// Reject lookup rows whose key or value exceeds `chars`.
    pub fn set_lookup_width(&self, chars: usize) {
        self.lock().lookup_width = Some(chars);
    }

    /// Reject target rows whose primary text column exceeds `chars`.
    pub fn set_text_width(&self, chars: usize) {
        self.lock().text_width = Some(chars);
    }

    /// Writes of this target id fail with an unclassified store error.
    pub fn fail_writes_of(&self, id: &str) {
        self.lock().failing_writes.insert(id.to_string());
    }

    pub fn rows(&self, kind: EntityKind) -> Vec<TargetRow> {
        self.lock()
            .rows
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, row)| row.clone())
            .collect()
    }

    pub fn row(&self, kind: EntityKind, id: &str) -> Option<TargetRow> {
        self.lock().rows.get(&(kind, id.to_string())).cloned()
    }

    /// Successful insert/upsert calls so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    fn write(&self, row: &TargetRow, upsert: bool) -> Result<(), StoreError> {
        let mut state = self.lock();
        let key = (row.kind(), row.id().to_string());

        if state.failing_writes.contains(row.id()) {
            return Err(StoreError::Other(anyhow::anyhow!("connection reset while writing {}", row.id())));
        }
        if let (Some(width), Some(text)) = (state.text_width, constrained_text(row)) {
            if text.chars().count() > width {
                return Err(StoreError::ValueTooLong {
                    detail: format!("value too long for type character varying({width})"),
                });
            }
        }
        if !upsert && state.rows.contains_key(&key) {
            return Err(StoreError::UniqueViolation { field: "id".into() });
        }
        if let TargetRow::Contact(contact) = row {
            let clash = state.rows.values().any(|existing| match existing {
                TargetRow::Contact(other) => {
                    other.id != contact.id && other.email.eq_ignore_ascii_case(&contact.email)
                }
                _ => false,
            });
            if clash {
                return Err(StoreError::UniqueViolation { field: "email".into() });
            }
        }

        state.rows.insert(key, row.clone());
        state.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn count(&self, kind: EntityKind) -> anyhow::Result<i64> {
        let state = self.lock();
        let n = match kind {
            EntityKind::Company => state.legacy_companies.len(),
            EntityKind::Lead => state.legacy_leads.len(),
            EntityKind::Position => state.legacy_positions.len(),
            EntityKind::Contact => state.legacy_contacts.len(),
        };
        Ok(n as i64)
    }

    async fn companies(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyCompany>> {
        Ok(page(&self.lock().legacy_companies, skip, take))
    }

    async fn leads(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyLead>> {
        Ok(page(&self.lock().legacy_leads, skip, take))
    }

    async fn positions(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyPosition>> {
        Ok(page(&self.lock().legacy_positions, skip, take))
    }

    async fn contacts(&self, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyContact>> {
        Ok(page(&self.lock().legacy_contacts, skip, take))
    }

    async fn company_by_id(&self, legacy_id: &str) -> anyhow::Result<Option<LegacyCompany>> {
        Ok(self
            .lock()
            .legacy_companies
            .iter()
            .find(|c| c.id == legacy_id)
            .cloned())
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn count(&self, kind: EntityKind) -> Result<i64, StoreError> {
        Ok(self.lock().rows.keys().filter(|(k, _)| *k == kind).count() as i64)
    }

    async fn exists(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError> {
        Ok(self.lock().rows.contains_key(&(kind, id.to_string())))
    }

    async fn insert(&self, row: &TargetRow) -> Result<(), StoreError> {
        self.write(row, false)
    }

    async fn upsert(&self, row: &TargetRow) -> Result<(), StoreError> {
        self.write(row, true)
    }

    async fn company_by_id(&self, id: &str) -> Result<Option<CompanyRef>, StoreError> {
        Ok(match self.lock().rows.get(&(EntityKind::Company, id.to_string())) {
            Some(TargetRow::Company(c)) => Some(company_ref(c)),
            _ => None,
        })
    }

    async fn company_by_domain(&self, domain: &str, matching: DomainMatch) -> Result<Option<CompanyRef>, StoreError> {
        let state = self.lock();
        let needle = domain.to_lowercase();
        let mut hits: Vec<&Company> = state
            .rows
            .values()
            .filter_map(|row| match row {
                TargetRow::Company(c) => Some(c),
                _ => None,
            })
            .filter(|c| {
                let Some(candidate) = c.domain.as_deref() else {
                    return false;
                };
                match matching {
                    DomainMatch::Exact => candidate == domain,
                    DomainMatch::CaseInsensitive => candidate.to_lowercase() == needle,
                    DomainMatch::Contains => candidate.to_lowercase().contains(&needle),
                }
            })
            .collect();
        hits.sort_by(|a, b| (a.audit.created_at, &a.id).cmp(&(b.audit.created_at, &b.id)));
        Ok(hits.first().map(|c| company_ref(c)))
    }

    async fn contact_id_by_email(&self, email: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().rows.values().find_map(|row| match row {
            TargetRow::Contact(c) if c.email.eq_ignore_ascii_case(email) => Some(c.id.clone()),
            _ => None,
        }))
    }

    async fn lookup_by_key(&self, table: LookupTable, key: &str) -> Result<Option<LookupRow>, StoreError> {
        Ok(self
            .lock()
            .lookups
            .get(&table)
            .and_then(|rows| rows.iter().find(|r| r.key == key).cloned()))
    }

    async fn lookup_by_value(&self, table: LookupTable, value: &str) -> Result<Option<LookupRow>, StoreError> {
        Ok(self
            .lock()
            .lookups
            .get(&table)
            .and_then(|rows| rows.iter().find(|r| r.value == value).cloned()))
    }

    async fn create_lookup(&self, table: LookupTable, row: &LookupRow) -> Result<(), StoreError> {
        let mut state = self.lock();
        if let Some(width) = state.lookup_width {
            if row.key.chars().count() > width || row.value.chars().count() > width {
                return Err(StoreError::ValueTooLong {
                    detail: format!("value too long for type character varying({width})"),
                });
            }
        }
        if state.pending_race.as_ref().is_some_and(|(t, _)| *t == table) {
            if let Some((_, raced)) = state.pending_race.take() {
                state.lookups.entry(table).or_default().push(raced);
            }
        }
        let rows = state.lookups.entry(table).or_default();
        if rows.iter().any(|r| r.key == row.key) {
            return Err(StoreError::UniqueViolation { field: "key".into() });
        }
        rows.push(row.clone());
        Ok(())
    }
}

/// Minimal target company for seeding tests.
pub fn target_company(id: &str, name: &str, domain: Option<&str>) -> Company {
    let now = Utc::now();
    Company {
        id: id.to_string(),
        name: name.to_string(),
        domain: domain.map(str::to_string),
        website: None,
        industry: None,
        description: None,
        linkedin_url: None,
        headquarters: None,
        status_key: "active_client".into(),
        status: "Active Client".into(),
        schema_version: SCHEMA_VERSION,
        audit: Audit {
            created_by: "test".into(),
            created_at: now,
            last_updated_by: "test".into(),
            last_updated_at: now,
            is_deleted: false,
            deleted_by: None,
            deleted_at: None,
        },
    }
}
