use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::error::MigrationError;
use super::transform::truncate;
use crate::model::lookup::{LOOKUP_KEY_MAX, LOOKUP_VALUE_MAX, NARROW_KEY_MAX, NARROW_VALUE_PLACEHOLDER};
use crate::model::{LookupRow, LookupTable};
use crate::store::{StoreError, TargetStore};

/// Find-or-create one enumeration row.
///
/// Lookup order: by key, then by display value (older runs sometimes swapped the two),
/// then create. Losing a creation race is not an error: the row is re-read.
/// If the store rejects the row as too long, a narrower row is tried once. Narrow rows
/// share one placeholder value, so that retry matches on key only.
pub async fn ensure_lookup(
    target: &dyn TargetStore,
    table: LookupTable,
    requested: &LookupRow,
) -> Result<LookupRow, MigrationError> {
    let row = LookupRow::new(
        truncate(&requested.key, LOOKUP_KEY_MAX),
        truncate(&requested.value, LOOKUP_VALUE_MAX),
    );

    match find_or_create(target, table, &row, Match::KeyOrValue).await {
        Ok(found) => Ok(found),
        Err(StoreError::ValueTooLong { detail }) => {
            let narrow = narrow_row(&row);
            warn!(
                target: "lookup",
                table = table.table_name(),
                key = %row.key,
                narrow_key = %narrow.key,
                %detail,
                "lookup row too long; retrying with narrow fallback"
            );
            find_or_create(target, table, &narrow, Match::Key)
                .await
                .map_err(|source| MigrationError::LookupReconciliationFailed {
                    table,
                    key: narrow.key.clone(),
                    source,
                })
        }
        Err(source) => Err(MigrationError::LookupReconciliationFailed {
            table,
            key: row.key.clone(),
            source,
        }),
    }
}

/// Shorter key, generic display value.
fn narrow_row(row: &LookupRow) -> LookupRow {
    LookupRow::new(truncate(&row.key, NARROW_KEY_MAX), NARROW_VALUE_PLACEHOLDER)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Key,
    KeyOrValue,
}

async fn find_or_create(
    target: &dyn TargetStore,
    table: LookupTable,
    row: &LookupRow,
    by: Match,
) -> Result<LookupRow, StoreError> {
    if let Some(found) = find_existing(target, table, row, by).await? {
        return Ok(found);
    }
    match target.create_lookup(table, row).await {
        Ok(()) => {
            info!(target: "lookup", table = table.table_name(), key = %row.key, "created lookup row");
            Ok(row.clone())
        }
        Err(err) if err.is_unique_violation() => {
            debug!(target: "lookup", table = table.table_name(), key = %row.key, "lost creation race; re-reading");
            find_existing(target, table, row, by).await?.ok_or(err)
        }
        Err(err) => Err(err),
    }
}

async fn find_existing(
    target: &dyn TargetStore,
    table: LookupTable,
    row: &LookupRow,
    by: Match,
) -> Result<Option<LookupRow>, StoreError> {
    if let Some(found) = target.lookup_by_key(table, &row.key).await? {
        return Ok(Some(found));
    }
    match by {
        Match::Key => Ok(None),
        Match::KeyOrValue => target.lookup_by_value(table, &row.value).await,
    }
}

/// Run-scoped cache of reconciled lookup rows, keyed by the requested key.
#[derive(Debug, Default)]
pub struct LookupSet {
    rows: HashMap<(LookupTable, String), LookupRow>,
}

impl LookupSet {
    /// Seed every fixed enumeration row of `tables`. Runs once before paging;
    /// a failure here aborts the whole run.
    pub async fn reconcile_seeds(&mut self, target: &dyn TargetStore, tables: &[LookupTable]) -> Result<(), MigrationError> {
        for &table in tables {
            for (key, value) in table.seeds() {
                self.ensure(target, table, &LookupRow::new(*key, *value)).await?;
            }
            info!(target: "lookup", table = table.table_name(), rows = table.seeds().len(), "lookup table reconciled");
        }
        Ok(())
    }

    pub async fn ensure(
        &mut self,
        target: &dyn TargetStore,
        table: LookupTable,
        requested: &LookupRow,
    ) -> Result<LookupRow, MigrationError> {
        let cache_key = (table, requested.key.clone());
        if let Some(hit) = self.rows.get(&cache_key) {
            return Ok(hit.clone());
        }
        let row = ensure_lookup(target, table, requested).await?;
        self.rows.insert(cache_key, row.clone());
        Ok(row)
    }

    /// Resolve one of the table's fixed enumeration keys.
    pub async fn enumeration(
        &mut self,
        target: &dyn TargetStore,
        table: LookupTable,
        key: &str,
    ) -> Result<LookupRow, MigrationError> {
        let value = table
            .seeds()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap_or(key);
        self.ensure(target, table, &LookupRow::new(key, value)).await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.rows.len()
    }
}
