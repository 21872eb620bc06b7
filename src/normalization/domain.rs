use url::Url;

/// Normalize a company natural key (domain or website) for comparison.
///
/// Normalization steps:
/// - trim whitespace and lowercase
/// - drop an `http://`/`https://` scheme, any path, query or port
/// - strip a single leading `www.`
///
/// Returns `None` when nothing usable is left.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return None;
    }

    let host = if trimmed.contains("://") {
        Url::parse(&trimmed)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    } else {
        trimmed
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .split(':')
            .next()
            .unwrap_or_default()
            .to_string()
    };

    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = host.trim_end_matches('.');
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// The `www.`-toggled variant of an already normalized domain.
pub fn toggle_www(domain: &str) -> String {
    match domain.strip_prefix("www.") {
        Some(bare) => bare.to_string(),
        None => format!("www.{domain}"),
    }
}
