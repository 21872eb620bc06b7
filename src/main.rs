use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crm_migrate::cli::{counts, migrate};
use crm_migrate::logging::init_tracing;
use crm_migrate::model::EntityKind;
use crm_migrate::store::{PgSourceStore, PgTargetStore};
use crm_migrate::util::db::{Db, DbRole};
use crm_migrate::util::env as env_util;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "crm-migrate", version, about = "Migrate CRM records from the legacy schema into the redesigned one")]
struct Cli {
    /// Legacy database URL (defaults to SOURCE_DATABASE_URL / LEGACY_DATABASE_URL)
    #[arg(long, global = true)]
    source_url: Option<String>,
    /// Target database URL (defaults to TARGET_DATABASE_URL / DATABASE_URL)
    #[arg(long, global = true)]
    target_url: Option<String>,
    /// Override the per-entity page size (defaults to MIGRATE_PAGE_SIZE, then 100/50)
    #[arg(long, global = true)]
    page_size: Option<i64>,
    /// Ask before paging and on every already-migrated record
    #[arg(long, global = true, default_value_t = false)]
    interactive: bool,
    /// Overwrite already-migrated records instead of skipping them
    #[arg(long, global = true, default_value_t = false)]
    update_existing: bool,
    /// Write the final report(s) as JSON to this path
    #[arg(long, global = true)]
    report_json: Option<PathBuf>,
    /// Audit identity for rows with no legacy author (defaults to MIGRATE_ACTOR or "migration")
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// Migrate companies
    Companies,
    /// Migrate leads (companies should be migrated first)
    Leads,
    /// Migrate positions (companies should be migrated first)
    Positions,
    /// Migrate contacts (companies should be migrated first)
    Contacts,
    /// Migrate every entity kind in dependency order
    All,
    /// Print source vs target row counts
    Counts,
}

impl Command {
    fn selection(&self) -> Option<migrate::Selection> {
        match self {
            Command::Companies => Some(migrate::Selection::One(EntityKind::Company)),
            Command::Leads => Some(migrate::Selection::One(EntityKind::Lead)),
            Command::Positions => Some(migrate::Selection::One(EntityKind::Position)),
            Command::Contacts => Some(migrate::Selection::One(EntityKind::Contact)),
            Command::All => Some(migrate::Selection::All),
            Command::Counts => None,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info,sqlx=warn")?;
    let cli = Cli::parse();
    env_util::bootstrap_cli("crm-migrate");

    if let Err(e) = run(cli).await {
        error!(error = %format!("{e:#}"), "crm-migrate failed");
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let source_url = env_util::source_db_url(cli.source_url.as_deref()).ok();
    let target_url = env_util::target_db_url(cli.target_url.as_deref()).ok();
    env_util::preflight_check(
        "crm-migrate",
        &[("SOURCE_DATABASE_URL", source_url.as_deref()), ("TARGET_DATABASE_URL", target_url.as_deref())],
        &["MIGRATE_PAGE_SIZE", "PROGRESS_INTERVAL", "FAILURE_SAMPLE_LIMIT", "MIGRATE_ACTOR", "USE_PREPARED"],
    )?;
    let (Some(source_url), Some(target_url)) = (source_url, target_url) else {
        anyhow::bail!("database URLs missing after preflight");
    };

    let max_conns: u32 = env_util::env_parse("DB_MAX_CONNS", 2u32);
    let source_db = Db::connect(&source_url, DbRole::Source, max_conns)
        .await
        .context("source store unreachable")?;
    let target_db = Db::connect(&target_url, DbRole::Target, max_conns)
        .await
        .context("target store unreachable")?;
    let source = PgSourceStore::new(source_db);
    let target = PgTargetStore::new(target_db);

    let Some(selection) = cli.command.selection() else {
        return counts::run(&source, &target).await;
    };

    let mut cfg = migrate::MigrateConfig::from_env(selection);
    cfg.interactive = cli.interactive;
    cfg.update_existing = cli.update_existing;
    cfg.report_json = cli.report_json;
    if let Some(page_size) = cli.page_size.filter(|n| *n > 0) {
        cfg.options.page_size = Some(page_size);
    }
    if let Some(actor) = cli.actor {
        cfg.options.actor = actor;
    }

    let reports = migrate::run(&source, &target, cfg).await?;
    let failed: usize = reports.iter().map(|r| r.stats.failed).sum();
    info!(target: "migrate", runs = reports.len(), failed, "migration finished");
    Ok(())
}
