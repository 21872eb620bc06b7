use chrono::{DateTime, Utc};

use super::{clean_email, clean_max, derive_audit, parse_json, truncate, TransformContext, CODE_MAX, NAME_MAX, URL_MAX, WIDE_MAX};
use crate::model::{CompanyRef, Contact, LegacyContact, SCHEMA_VERSION};
use crate::normalization::{normalize_domain, CanonicalId};

const PLACEHOLDER_DOMAIN: &str = "placeholder.invalid";

/// Synthesized address for contacts without one. The millisecond nonce is not
/// collision-proof; two placeholders minted in the same millisecond for the same
/// company will clash on the unique email column.
pub fn placeholder_email(company_domain: Option<&str>, now: DateTime<Utc>) -> String {
    let domain = company_domain
        .and_then(normalize_domain)
        .unwrap_or_else(|| PLACEHOLDER_DOMAIN.to_string());
    truncate(&format!("contact.{}@{}", now.timestamp_millis(), domain), WIDE_MAX)
}

/// Normalized legacy email, when one is present.
pub fn contact_email(legacy: &LegacyContact) -> Option<String> {
    clean_email(legacy.email.as_deref())
}

pub fn transform_contact(legacy: &LegacyContact, id: &CanonicalId, company: &CompanyRef, ctx: &TransformContext) -> Contact {
    let (email, email_is_placeholder) = match contact_email(legacy) {
        Some(email) => (email, false),
        None => (placeholder_email(company.domain.as_deref(), ctx.now), true),
    };

    Contact {
        id: id.as_str().to_string(),
        company_id: company.id.clone(),
        company_name: company.name.clone(),
        first_name: clean_max(legacy.first_name.as_deref(), CODE_MAX),
        last_name: clean_max(legacy.last_name.as_deref(), CODE_MAX),
        email,
        email_is_placeholder,
        phone: clean_max(legacy.phone.as_deref(), CODE_MAX),
        job_title: clean_max(legacy.title.as_deref(), NAME_MAX),
        linkedin_url: clean_max(legacy.linkedin_url.as_deref(), URL_MAX),
        is_primary: legacy.is_primary.unwrap_or(false),
        metadata: parse_json(legacy.data.as_deref()),
        schema_version: SCHEMA_VERSION,
        audit: derive_audit(&legacy.audit, ctx),
    }
}
