//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Keys consulted (in order) for the legacy database DSN.
pub const SOURCE_URL_KEYS: [&str; 2] = ["SOURCE_DATABASE_URL", "LEGACY_DATABASE_URL"];
/// Keys consulted (in order) for the redesigned database DSN.
pub const TARGET_URL_KEYS: [&str; 2] = ["TARGET_DATABASE_URL", "DATABASE_URL"];

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_err() {
            // Fallback to Cargo project root
            let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
            let _ = dotenv::from_filename(candidate);
        }
    });
}

/// Common bootstrap for CLI binaries: load env once and note which DSNs are present.
pub fn bootstrap_cli(bin_name: &str) {
    init_env();
    info!(
        target = "bootstrap",
        bin = bin_name,
        source_dsn = first_present(&SOURCE_URL_KEYS).is_some(),
        target_dsn = first_present(&TARGET_URL_KEYS).is_some(),
        "environment loaded"
    );
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => {
            let v = raw.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "on" | "yes")
        }
        Err(_) => default,
    }
}

fn first_present(keys: &[&'static str]) -> Option<(&'static str, String)> {
    keys.iter().find_map(|&k| env_opt(k).map(|v| (k, v)))
}

/// Legacy database DSN: explicit override first, then the env keys.
pub fn source_db_url(explicit: Option<&str>) -> anyhow::Result<String> {
    resolve_url(explicit, &SOURCE_URL_KEYS, "source")
}

/// Target database DSN: explicit override first, then the env keys.
pub fn target_db_url(explicit: Option<&str>) -> anyhow::Result<String> {
    resolve_url(explicit, &TARGET_URL_KEYS, "target")
}

fn resolve_url(explicit: Option<&str>, keys: &[&'static str], side: &str) -> anyhow::Result<String> {
    if let Some(v) = explicit.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(v.to_string());
    }
    first_present(keys)
        .map(|(_, v)| v)
        .ok_or_else(|| anyhow::anyhow!("no {side} database URL configured; set one of {keys:?}"))
}

pub fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASSWORD") || k.contains("SECRET") || k.contains("TOKEN") {
        return "***".to_string();
    }

    // Trim so we don't accidentally log credentials hidden behind newlines.
    let val_trim = val.trim();

    // Always redact postgres DSNs even if the key isn't obviously sensitive.
    if let Ok(mut u) = url::Url::parse(val_trim) {
        let scheme = u.scheme().to_ascii_lowercase();
        if scheme == "postgres" || scheme == "postgresql" {
            let _ = u.set_username("***");
            let _ = u.set_password(Some("***"));
            return u.to_string();
        }
    }

    if (k.contains("URL") || k.contains("DSN"))
        && (val_trim.starts_with("postgres://") || val_trim.starts_with("postgresql://"))
    {
        return "postgres://***".to_string();
    }

    val_trim.to_string()
}

/// Validate required keys and log a consolidated, redacted snapshot of configuration.
/// `required` pairs are (label, resolved value); missing values are reported together.
pub fn preflight_check(title: &str, required: &[(&str, Option<&str>)], also_log: &[&str]) -> anyhow::Result<()> {
    init_env();
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, v)| v.map(str::trim).unwrap_or_default().is_empty())
        .map(|(k, _)| *k)
        .collect();
    let mut snapshot: Vec<(String, String)> = required
        .iter()
        .map(|(k, v)| (k.to_string(), redact_value(k, v.unwrap_or_default())))
        .collect();
    for &k in also_log {
        let v = env_opt(k).unwrap_or_default();
        snapshot.push((k.to_string(), redact_value(k, &v)));
    }
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
    if !missing.is_empty() {
        return Err(anyhow::anyhow!("missing required configuration: {:?}", missing));
    }
    Ok(())
}
