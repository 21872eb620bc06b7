use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::migrate::{AutoConfirm, Confirm, MigrationReport, Orchestrator, OrchestratorOptions, TerminalConfirm};
use crate::model::EntityKind;
use crate::store::{SourceStore, TargetStore};
use crate::util::env::{env_opt, env_parse};

/// What to migrate in one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    One(EntityKind),
    All,
}

#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub selection: Selection,
    /// Prompt before paging and on every already-migrated record.
    pub interactive: bool,
    /// Batch mode only: overwrite already-migrated records instead of skipping them.
    pub update_existing: bool,
    pub report_json: Option<PathBuf>,
    pub options: OrchestratorOptions,
}

impl MigrateConfig {
    /// Defaults from the environment (`MIGRATE_PAGE_SIZE`, `PROGRESS_INTERVAL`,
    /// `FAILURE_SAMPLE_LIMIT`, `MIGRATE_ACTOR`); CLI flags are applied on top by the caller.
    pub fn from_env(selection: Selection) -> Self {
        let defaults = OrchestratorOptions::default();
        let page_size = env_parse::<i64>("MIGRATE_PAGE_SIZE", 0);
        Self {
            selection,
            interactive: false,
            update_existing: false,
            report_json: None,
            options: OrchestratorOptions {
                page_size: (page_size > 0).then_some(page_size),
                progress_every: env_parse("PROGRESS_INTERVAL", defaults.progress_every),
                sample_limit: env_parse("FAILURE_SAMPLE_LIMIT", defaults.sample_limit),
                actor: env_opt("MIGRATE_ACTOR").unwrap_or(defaults.actor),
            },
        }
    }
}

pub async fn run(source: &dyn SourceStore, target: &dyn TargetStore, cfg: MigrateConfig) -> Result<Vec<MigrationReport>> {
    let mut confirm: Box<dyn Confirm> = if cfg.interactive {
        Box::new(TerminalConfirm::stdio())
    } else if cfg.update_existing {
        Box::new(AutoConfirm::update_existing())
    } else {
        Box::new(AutoConfirm::skip_existing())
    };
    run_with(source, target, confirm.as_mut(), cfg).await
}

/// Same as [`run`] with an injected confirmation port.
pub async fn run_with(
    source: &dyn SourceStore,
    target: &dyn TargetStore,
    confirm: &mut dyn Confirm,
    cfg: MigrateConfig,
) -> Result<Vec<MigrationReport>> {
    let mut orchestrator = Orchestrator::new(source, target, confirm, cfg.options);
    let reports = match cfg.selection {
        Selection::One(kind) => vec![orchestrator.run_kind(kind).await?],
        Selection::All => orchestrator.run_all().await?,
    };

    for report in &reports {
        println!("{}", summary_line(report));
    }

    if let Some(path) = &cfg.report_json {
        let json = serde_json::to_string_pretty(&reports).context("failed to serialize migration report")?;
        std::fs::write(path, json).with_context(|| format!("failed to write report to {}", path.display()))?;
        info!(target: "migrate", path = %path.display(), "report written");
    }
    Ok(reports)
}

fn summary_line(report: &MigrationReport) -> String {
    let s = &report.stats;
    format!(
        "{}: {} of {} processed, {} migrated, {} updated, {} duplicates, {} failed ({:.1}% ok){}",
        report.entity,
        s.total,
        report.source_total,
        s.succeeded,
        s.updated,
        s.duplicates,
        s.failed,
        report.success_rate,
        if report.completed { "" } else { " [declined]" }
    )
}
