use anyhow::{Context, Result};
use serde::Serialize;

use crate::model::EntityKind;
use crate::store::{SourceStore, TargetStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountRow {
    pub entity: EntityKind,
    pub source: i64,
    pub target: i64,
}

impl CountRow {
    /// Legacy rows with no target counterpart yet (never negative).
    pub fn pending(&self) -> i64 {
        (self.source - self.target).max(0)
    }
}

/// Source vs target row counts for every entity kind, in dependency order.
pub async fn collect(source: &dyn SourceStore, target: &dyn TargetStore) -> Result<Vec<CountRow>> {
    let mut rows = Vec::with_capacity(EntityKind::ALL.len());
    for entity in EntityKind::ALL {
        let source_count = source
            .count(entity)
            .await
            .with_context(|| format!("failed to count legacy {entity} rows"))?;
        let target_count = target
            .count(entity)
            .await
            .with_context(|| format!("failed to count target {}", entity.target_table()))?;
        rows.push(CountRow {
            entity,
            source: source_count,
            target: target_count,
        });
    }
    Ok(rows)
}

pub fn render(rows: &[CountRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<10} {:>10} {:>10} {:>10}\n", "entity", "source", "target", "pending"));
    for r in rows {
        out.push_str(&format!(
            "{:<10} {:>10} {:>10} {:>10}\n",
            r.entity.as_str(),
            r.source,
            r.target,
            r.pending()
        ));
    }
    out
}

pub async fn run(source: &dyn SourceStore, target: &dyn TargetStore) -> Result<()> {
    let rows = collect(source, target).await?;
    print!("{}", render(&rows));
    Ok(())
}
