use super::{clean, clean_max, derive_audit, parse_json, slugify, TransformContext, CODE_MAX, NAME_MAX, WIDE_MAX};
use crate::model::{CompanyRef, LegacyPosition, LookupRow, Position, SCHEMA_VERSION};
use crate::normalization::CanonicalId;

const GENERAL_ROLE: (&str, &str) = ("general", "General");
const UNTITLED: &str = "Untitled position";

/// Filled beats closed beats open.
pub fn derive_position_status(legacy: &LegacyPosition) -> &'static str {
    if legacy.is_filled.unwrap_or(false) {
        "filled"
    } else if legacy.is_open == Some(false) {
        "closed"
    } else {
        "open"
    }
}

/// Role taxonomy row requested for a legacy position; untruncated, the reconciler applies widths.
pub fn role_lookup_row(legacy: &LegacyPosition) -> LookupRow {
    match clean(legacy.role.as_deref()) {
        Some(text) => {
            let key = slugify(text);
            if key.is_empty() {
                LookupRow::new(GENERAL_ROLE.0, GENERAL_ROLE.1)
            } else {
                LookupRow::new(key, text)
            }
        }
        None => LookupRow::new(GENERAL_ROLE.0, GENERAL_ROLE.1),
    }
}

pub fn transform_position(
    legacy: &LegacyPosition,
    id: &CanonicalId,
    company: &CompanyRef,
    role: &LookupRow,
    status: &LookupRow,
    ctx: &TransformContext,
) -> Position {
    Position {
        id: id.as_str().to_string(),
        company_id: company.id.clone(),
        company_name: company.name.clone(),
        company_status: company.status.clone(),
        company_is_deleted: company.is_deleted,
        title: clean_max(legacy.title.as_deref(), NAME_MAX).unwrap_or_else(|| UNTITLED.to_string()),
        description: clean(legacy.description.as_deref()).map(str::to_string),
        role_key: role.key.clone(),
        role: role.value.clone(),
        location: clean_max(legacy.location.as_deref(), WIDE_MAX),
        employment_type: clean_max(legacy.employment_type.as_deref(), CODE_MAX),
        details: parse_json(legacy.data.as_deref()),
        status_key: status.key.clone(),
        status: status.value.clone(),
        schema_version: SCHEMA_VERSION,
        audit: derive_audit(&legacy.audit, ctx),
    }
}
