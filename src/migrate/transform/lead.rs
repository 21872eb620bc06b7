use super::{clean, clean_email, clean_max, derive_audit, parse_json, TransformContext, CODE_MAX, NAME_MAX};
use crate::model::{CompanyRef, LegacyLead, Lead, LookupRow, SCHEMA_VERSION};
use crate::normalization::CanonicalId;

/// Exactly one rule fires, checked in order: stuck, pending, converted (company resolved), new.
pub fn derive_lead_status(legacy: &LegacyLead, company_resolved: bool) -> &'static str {
    if legacy.is_stuck.unwrap_or(false) {
        "stuck"
    } else if legacy.is_pending.unwrap_or(false) {
        "pending"
    } else if company_resolved {
        "converted_to_company"
    } else {
        "new_lead"
    }
}

pub fn transform_lead(
    legacy: &LegacyLead,
    id: &CanonicalId,
    company: Option<&CompanyRef>,
    status: &LookupRow,
    ctx: &TransformContext,
) -> Lead {
    let company_name = company
        .map(|c| c.name.clone())
        .or_else(|| clean_max(legacy.company_name.as_deref(), NAME_MAX));

    Lead {
        id: id.as_str().to_string(),
        company_id: company.map(|c| c.id.clone()),
        company_name,
        company_status: company.map(|c| c.status.clone()),
        company_is_deleted: company.map(|c| c.is_deleted),
        contact_name: clean_max(legacy.contact_name.as_deref(), NAME_MAX),
        email: clean_email(legacy.email.as_deref()),
        phone: clean_max(legacy.phone.as_deref(), CODE_MAX),
        source: clean_max(legacy.source.as_deref(), CODE_MAX),
        notes: clean(legacy.notes.as_deref()).map(str::to_string),
        metadata: parse_json(legacy.data.as_deref()),
        status_key: status.key.clone(),
        status: status.value.clone(),
        schema_version: SCHEMA_VERSION,
        audit: derive_audit(&legacy.audit, ctx),
    }
}
