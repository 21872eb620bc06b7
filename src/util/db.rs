use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use crate::util::env::{env_flag, env_parse};

/// Which side of the migration a pool talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbRole {
    /// Legacy database; every session is forced read-only.
    Source,
    Target,
}

impl DbRole {
    fn label(self) -> &'static str {
        match self {
            DbRole::Source => "source",
            DbRole::Target => "target",
        }
    }
}

/// `SET` statements run on every new pooled connection.
fn session_setup(read_only: bool, statement_timeout_ms: u64) -> Vec<String> {
    let mut statements = Vec::new();
    if read_only {
        statements.push("SET default_transaction_read_only = on".to_string());
    }
    if statement_timeout_ms > 0 {
        statements.push(format!("SET statement_timeout = {statement_timeout_ms}"));
    }
    statements
}

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
    pub role: DbRole,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url), fields(role = role.label()))]
    pub async fn connect(database_url: &str, role: DbRole, max_connections: u32) -> Result<Self> {
        let use_prepared = env_flag("USE_PREPARED", false);
        let mut connect_options = PgConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid {} database url", role.label()))?;

        // Be explicit about TLS when the DSN asks for it.
        if database_url.contains("sslmode=require") && !database_url.contains("sslmode=disable") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        if !use_prepared {
            // PgBouncer txn mode safe
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let read_only = role == DbRole::Source;
        let statement_timeout_ms: u64 = env_parse("DB_STATEMENT_TIMEOUT_MS", 0u64);

        let session = session_setup(read_only, statement_timeout_ms);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .after_connect(move |conn, _meta| {
                let session = session.clone();
                Box::pin(async move {
                    for sql in &session {
                        sqlx::query(sql).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to connect to {} database", role.label()))?;

        // Surface connectivity faults now, before any record is touched.
        sqlx::raw_sql("SELECT 1")
            .execute(&pool)
            .await
            .with_context(|| format!("{} database is not reachable", role.label()))?;

        info!(role = role.label(), max_connections, read_only, "connected to db");
        Ok(Self { pool, role })
    }
}
