use serde::Deserialize;

use super::{clean, clean_max, derive_audit, parse_payload, TransformContext, NAME_MAX, URL_MAX, WIDE_MAX};
use crate::model::lookup::COMPANY_STATUSES;
use crate::model::{Company, LegacyCompany, LookupRow, SCHEMA_VERSION};
use crate::normalization::{normalize_domain, CanonicalId};

const UNNAMED: &str = "Unnamed company";
const DEFAULT_STATUS: &str = "potential_client";

/// Fields carried in the legacy `data` column.
#[derive(Debug, Default, Deserialize)]
struct CompanyPayload {
    name: Option<String>,
    website_url: Option<String>,
    industry: Option<String>,
    description: Option<String>,
    linkedin_url: Option<String>,
    headquarters: Option<String>,
}

/// Map the legacy status text onto the enumeration key; unknown or absent text is a potential client.
pub fn derive_company_status(legacy: &LegacyCompany) -> &'static str {
    let Some(raw) = clean(legacy.status.as_deref()) else {
        return DEFAULT_STATUS;
    };
    let wanted = fold(raw);
    COMPANY_STATUSES
        .iter()
        .find(|(key, value)| fold(key) == wanted || fold(value) == wanted)
        .map(|(key, _)| *key)
        .unwrap_or(DEFAULT_STATUS)
}

/// Case- and separator-insensitive comparison form.
fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Natural key of a legacy company: the domain column, else the website host.
pub fn company_natural_key(legacy: &LegacyCompany) -> Option<String> {
    legacy
        .domain
        .as_deref()
        .and_then(normalize_domain)
        .or_else(|| legacy.website.as_deref().and_then(normalize_domain))
}

pub fn transform_company(
    legacy: &LegacyCompany,
    id: &CanonicalId,
    status: &LookupRow,
    ctx: &TransformContext,
) -> Company {
    let payload: CompanyPayload = parse_payload(legacy.data.as_deref()).unwrap_or_default();

    let website = clean_max(payload.website_url.as_deref(), URL_MAX)
        .or_else(|| clean_max(legacy.website.as_deref(), URL_MAX));
    let domain = legacy
        .domain
        .as_deref()
        .and_then(normalize_domain)
        .or_else(|| website.as_deref().and_then(normalize_domain))
        .map(|d| super::truncate(&d, WIDE_MAX));

    let name = clean_max(payload.name.as_deref(), NAME_MAX)
        .or_else(|| clean_max(legacy.name.as_deref(), NAME_MAX))
        .or_else(|| domain.clone())
        .unwrap_or_else(|| UNNAMED.to_string());

    Company {
        id: id.as_str().to_string(),
        name,
        domain,
        website,
        industry: clean_max(payload.industry.as_deref(), NAME_MAX),
        description: clean(payload.description.as_deref()).map(str::to_string),
        linkedin_url: clean_max(payload.linkedin_url.as_deref(), URL_MAX),
        headquarters: clean_max(payload.headquarters.as_deref(), WIDE_MAX),
        status_key: status.key.clone(),
        status: status.value.clone(),
        schema_version: SCHEMA_VERSION,
        audit: derive_audit(&legacy.audit, ctx),
    }
}
