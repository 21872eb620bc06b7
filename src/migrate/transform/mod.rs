//! Field transformer: pure functions from typed legacy rows (plus resolved references
//! and lookup rows) to typed target rows. No I/O happens here.
pub mod company;
pub mod contact;
pub mod lead;
pub mod position;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::{Audit, LegacyAudit};

pub use company::{company_natural_key, derive_company_status, transform_company};
pub use contact::{contact_email, placeholder_email, transform_contact};
pub use lead::{derive_lead_status, transform_lead};
pub use position::{derive_position_status, role_lookup_row, transform_position};

/// Target column widths.
pub const CODE_MAX: usize = 100;
pub const NAME_MAX: usize = 200;
pub const WIDE_MAX: usize = 250;
pub const URL_MAX: usize = 500;

/// Per-record inputs that do not come from the legacy row.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub now: DateTime<Utc>,
    pub actor: String,
}

impl TransformContext {
    pub fn new(now: DateTime<Utc>, actor: impl Into<String>) -> Self {
        Self {
            now,
            actor: actor.into(),
        }
    }
}

/// First `max` characters of `raw`. Silent; never errors.
pub fn truncate(raw: &str, max: usize) -> String {
    match raw.char_indices().nth(max) {
        Some((cut, _)) => raw[..cut].to_string(),
        None => raw.to_string(),
    }
}

/// Trimmed, non-empty text.
pub fn clean(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Trimmed, non-empty text truncated to `max`.
pub fn clean_max(raw: Option<&str>, max: usize) -> Option<String> {
    clean(raw).map(|s| truncate(s, max))
}

/// Trimmed, lowercased email. Lowercasing can grow the text, so truncation comes last.
pub fn clean_email(raw: Option<&str>) -> Option<String> {
    clean(raw).map(|s| truncate(&s.to_lowercase(), WIDE_MAX))
}

/// Parse a serialized JSON payload into `T`; malformed payloads count as absent.
pub fn parse_payload<T: DeserializeOwned>(raw: Option<&str>) -> Option<T> {
    clean(raw).and_then(|s| serde_json::from_str(s).ok())
}

/// Parse a serialized JSON payload as an opaque document.
pub fn parse_json(raw: Option<&str>) -> Option<Value> {
    parse_payload::<Value>(raw).filter(|v| !v.is_null())
}

/// Lowercase snake-ish key: alphanumerics kept, every other run collapsed to `_`.
pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

pub fn derive_audit(legacy: &LegacyAudit, ctx: &TransformContext) -> Audit {
    let created_by = clean_max(legacy.created_by.as_deref(), CODE_MAX).unwrap_or_else(|| ctx.actor.clone());
    let created_at = legacy.created_at.unwrap_or(ctx.now);
    let last_updated_by = clean_max(legacy.updated_by.as_deref(), CODE_MAX).unwrap_or_else(|| created_by.clone());
    let last_updated_at = legacy.updated_at.unwrap_or(created_at);

    let is_deleted = legacy.is_deleted.unwrap_or(false);
    let (deleted_by, deleted_at) = if is_deleted {
        (
            Some(clean_max(legacy.deleted_by.as_deref(), CODE_MAX).unwrap_or_else(|| ctx.actor.clone())),
            Some(legacy.deleted_at.unwrap_or(ctx.now)),
        )
    } else {
        (None, None)
    };

    Audit {
        created_by,
        created_at,
        last_updated_by,
        last_updated_at,
        is_deleted,
        deleted_by,
        deleted_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn truncation_keeps_exact_prefix() {
        let input = "a".repeat(120) + "tail";
        let out = truncate(&input, CODE_MAX);
        assert_eq!(out.chars().count(), CODE_MAX);
        assert_eq!(out, input.chars().take(CODE_MAX).collect::<String>());
        assert_eq!(truncate("short", CODE_MAX), "short");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 4), "héll");
    }

    #[test]
    fn malformed_json_payload_is_absent() {
        assert_eq!(parse_json(Some("{not json")), None);
        assert_eq!(parse_json(Some("null")), None);
        assert_eq!(parse_json(Some(r#"{"a":1}"#)).unwrap()["a"], 1);
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Senior  Backend / API Engineer "), "senior_backend_api_engineer");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn deleted_rows_get_deletion_audit() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let ctx = TransformContext::new(now, "migration");
        let legacy = LegacyAudit {
            is_deleted: Some(true),
            created_by: Some("  ".into()),
            ..Default::default()
        };
        let audit = derive_audit(&legacy, &ctx);
        assert!(audit.is_deleted);
        assert_eq!(audit.created_by, "migration");
        assert_eq!(audit.deleted_by.as_deref(), Some("migration"));
        assert_eq!(audit.deleted_at, Some(now));

        let live = derive_audit(&LegacyAudit::default(), &ctx);
        assert!(!live.is_deleted);
        assert_eq!(live.deleted_at, None);
        assert_eq!(live.last_updated_at, now);
    }
}
