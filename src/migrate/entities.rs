//! Per-entity glue between the orchestrator loop and the pure transformers:
//! which source page to read, which references and lookups to resolve, which row to build.
use async_trait::async_trait;

use super::error::MigrationError;
use super::lookup::LookupSet;
use super::resolver::ReferenceResolver;
use super::stats::MigrationStats;
use super::transform::{
    contact_email, derive_company_status, derive_lead_status, derive_position_status, role_lookup_row,
    transform_company, transform_contact, transform_lead, transform_position, TransformContext,
};
use crate::model::{
    CompanyRef, EntityKind, LegacyCompany, LegacyContact, LegacyLead, LegacyPosition, LegacyRecord, LookupRow,
    LookupTable, TargetRow,
};
use crate::normalization::CanonicalId;
use crate::store::{SourceStore, TargetStore};

/// Everything a migrator may touch while building one record.
pub struct RecordScope<'s, 'a> {
    pub resolver: &'s ReferenceResolver<'a>,
    pub target: &'a dyn TargetStore,
    pub lookups: &'s mut LookupSet,
    pub stats: &'s mut MigrationStats,
    pub ctx: &'s TransformContext,
}

impl RecordScope<'_, '_> {
    /// Resolve a company reference the record cannot exist without.
    async fn required_company(&mut self, legacy_ref: Option<&str>) -> Result<CompanyRef, MigrationError> {
        self.resolver
            .resolve_company(legacy_ref, self.stats)
            .await?
            .ok_or_else(|| MigrationError::MissingReference {
                entity: EntityKind::Company,
                legacy_ref: legacy_ref.unwrap_or_default().to_string(),
            })
    }

    async fn status(&mut self, table: LookupTable, key: &str) -> Result<LookupRow, MigrationError> {
        self.lookups.enumeration(self.target, table, key).await
    }
}

#[async_trait]
pub trait EntityMigrator: Send + Sync {
    type Legacy: LegacyRecord + 'static;

    fn kind(&self) -> EntityKind;

    async fn fetch_page(&self, source: &dyn SourceStore, skip: i64, take: i64) -> anyhow::Result<Vec<Self::Legacy>>;

    /// Target id of a row that already holds this record under its natural key.
    async fn natural_key_match(
        &self,
        _target: &dyn TargetStore,
        _record: &Self::Legacy,
    ) -> Result<Option<String>, MigrationError> {
        Ok(None)
    }

    async fn build_row(
        &self,
        scope: &mut RecordScope<'_, '_>,
        record: &Self::Legacy,
        id: &CanonicalId,
    ) -> Result<TargetRow, MigrationError>;
}

pub struct CompanyMigrator;

#[async_trait]
impl EntityMigrator for CompanyMigrator {
    type Legacy = LegacyCompany;

    fn kind(&self) -> EntityKind {
        EntityKind::Company
    }

    async fn fetch_page(&self, source: &dyn SourceStore, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyCompany>> {
        source.companies(skip, take).await
    }

    async fn build_row(
        &self,
        scope: &mut RecordScope<'_, '_>,
        record: &LegacyCompany,
        id: &CanonicalId,
    ) -> Result<TargetRow, MigrationError> {
        let status = scope
            .status(LookupTable::CompanyStatus, derive_company_status(record))
            .await?;
        Ok(TargetRow::Company(transform_company(record, id, &status, scope.ctx)))
    }
}

pub struct LeadMigrator;

#[async_trait]
impl EntityMigrator for LeadMigrator {
    type Legacy = LegacyLead;

    fn kind(&self) -> EntityKind {
        EntityKind::Lead
    }

    async fn fetch_page(&self, source: &dyn SourceStore, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyLead>> {
        source.leads(skip, take).await
    }

    async fn build_row(
        &self,
        scope: &mut RecordScope<'_, '_>,
        record: &LegacyLead,
        id: &CanonicalId,
    ) -> Result<TargetRow, MigrationError> {
        // Optional relationship: an unresolved company leaves the lead unlinked.
        let company = scope
            .resolver
            .resolve_company(record.company_id.as_deref(), scope.stats)
            .await?;
        let status = scope
            .status(LookupTable::LeadStatus, derive_lead_status(record, company.is_some()))
            .await?;
        Ok(TargetRow::Lead(transform_lead(record, id, company.as_ref(), &status, scope.ctx)))
    }
}

pub struct PositionMigrator;

#[async_trait]
impl EntityMigrator for PositionMigrator {
    type Legacy = LegacyPosition;

    fn kind(&self) -> EntityKind {
        EntityKind::Position
    }

    async fn fetch_page(&self, source: &dyn SourceStore, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyPosition>> {
        source.positions(skip, take).await
    }

    async fn build_row(
        &self,
        scope: &mut RecordScope<'_, '_>,
        record: &LegacyPosition,
        id: &CanonicalId,
    ) -> Result<TargetRow, MigrationError> {
        let company = scope.required_company(record.company_id.as_deref()).await?;
        let role = scope
            .lookups
            .ensure(scope.target, LookupTable::PositionRole, &role_lookup_row(record))
            .await?;
        let status = scope
            .status(LookupTable::PositionStatus, derive_position_status(record))
            .await?;
        Ok(TargetRow::Position(transform_position(
            record, id, &company, &role, &status, scope.ctx,
        )))
    }
}

pub struct ContactMigrator;

#[async_trait]
impl EntityMigrator for ContactMigrator {
    type Legacy = LegacyContact;

    fn kind(&self) -> EntityKind {
        EntityKind::Contact
    }

    async fn fetch_page(&self, source: &dyn SourceStore, skip: i64, take: i64) -> anyhow::Result<Vec<LegacyContact>> {
        source.contacts(skip, take).await
    }

    async fn natural_key_match(
        &self,
        target: &dyn TargetStore,
        record: &LegacyContact,
    ) -> Result<Option<String>, MigrationError> {
        match contact_email(record) {
            Some(email) => Ok(target.contact_id_by_email(&email).await?),
            None => Ok(None),
        }
    }

    async fn build_row(
        &self,
        scope: &mut RecordScope<'_, '_>,
        record: &LegacyContact,
        id: &CanonicalId,
    ) -> Result<TargetRow, MigrationError> {
        let company = scope.required_company(record.company_id.as_deref()).await?;
        Ok(TargetRow::Contact(transform_contact(record, id, &company, scope.ctx)))
    }
}
