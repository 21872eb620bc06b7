use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

use crate::util::env::env_flag;

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`;
/// `MIGRATE_LOG_JSON=1` switches to one JSON object per line.
///
/// Logs go to stderr so stdout stays free for reports.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if env_flag("MIGRATE_LOG_JSON", false) {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.with_line_number(true).with_file(true).try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
