use serde::Serialize;
use tracing::debug;

use super::error::MigrationError;
use super::stats::MigrationStats;
use super::transform::company::company_natural_key;
use crate::model::CompanyRef;
use crate::normalization::{toggle_www, CanonicalId};
use crate::store::{DomainMatch, SourceStore, StoreError, TargetStore};

/// Which strategy satisfied a reference lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Canonical identifier matched a target row.
    Primary,
    /// Natural key (domain) of the legacy record matched a target row.
    Secondary,
}

/// Resolves legacy foreign keys to target rows: canonical id first, natural key second.
pub struct ReferenceResolver<'a> {
    source: &'a dyn SourceStore,
    target: &'a dyn TargetStore,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(source: &'a dyn SourceStore, target: &'a dyn TargetStore) -> Self {
        Self { source, target }
    }

    /// Resolve a legacy company reference.
    ///
    /// `Ok(None)` means either no reference was supplied or neither strategy found a row;
    /// the latter also bumps the unresolved counter. Callers decide whether that is fatal
    /// for the owning record.
    pub async fn resolve_company(
        &self,
        legacy_ref: Option<&str>,
        stats: &mut MigrationStats,
    ) -> Result<Option<CompanyRef>, MigrationError> {
        let Some(raw) = legacy_ref.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        match CanonicalId::parse(raw) {
            Ok(id) => {
                if let Some(found) = self.target.company_by_id(id.as_str()).await? {
                    debug!(target: "resolver", legacy_ref = raw, company_id = %found.id, "primary match");
                    stats.record_resolution(ResolutionStrategy::Primary);
                    return Ok(Some(found));
                }
            }
            Err(err) => {
                debug!(target: "resolver", legacy_ref = raw, error = %err, "reference id malformed; trying natural key");
            }
        }

        if let Some(found) = self.company_by_natural_key(raw).await? {
            debug!(target: "resolver", legacy_ref = raw, company_id = %found.id, "secondary match");
            stats.record_resolution(ResolutionStrategy::Secondary);
            return Ok(Some(found));
        }

        debug!(target: "resolver", legacy_ref = raw, "company reference unresolved");
        stats.record_unresolved();
        Ok(None)
    }

    async fn company_by_natural_key(&self, raw: &str) -> Result<Option<CompanyRef>, MigrationError> {
        let Some(legacy) = self.source.company_by_id(raw).await? else {
            return Ok(None);
        };
        match company_natural_key(&legacy) {
            Some(key) => Ok(company_by_domain(self.target, &key).await?),
            None => Ok(None),
        }
    }
}

/// Match a normalized domain against target companies, first hit wins:
/// exact, then case-insensitive on the key and its `www.`-toggled variant,
/// then substring containment.
pub async fn company_by_domain(target: &dyn TargetStore, key: &str) -> Result<Option<CompanyRef>, StoreError> {
    if let Some(found) = target.company_by_domain(key, DomainMatch::Exact).await? {
        return Ok(Some(found));
    }
    for candidate in [key.to_string(), toggle_www(key)] {
        if let Some(found) = target.company_by_domain(&candidate, DomainMatch::CaseInsensitive).await? {
            return Ok(Some(found));
        }
    }
    target.company_by_domain(key, DomainMatch::Contains).await
}
