use serde::Serialize;

/// Primary truncation applied to every lookup row before it is written.
pub const LOOKUP_KEY_MAX: usize = 100;
pub const LOOKUP_VALUE_MAX: usize = 250;

/// Narrow fallback, only used after the store rejected a row as too long.
pub const NARROW_KEY_MAX: usize = 40;
pub const NARROW_VALUE_PLACEHOLDER: &str = "Other";

/// Shared reference-data tables in the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupTable {
    CompanyStatus,
    LeadStatus,
    PositionStatus,
    PositionRole,
}

impl LookupTable {
    pub fn table_name(self) -> &'static str {
        match self {
            LookupTable::CompanyStatus => "company_statuses",
            LookupTable::LeadStatus => "lead_statuses",
            LookupTable::PositionStatus => "position_statuses",
            LookupTable::PositionRole => "position_roles",
        }
    }

    /// Fixed enumeration rows seeded before any record is processed.
    /// Role taxonomy rows are created on demand, so it has none.
    pub fn seeds(self) -> &'static [(&'static str, &'static str)] {
        match self {
            LookupTable::CompanyStatus => COMPANY_STATUSES,
            LookupTable::LeadStatus => LEAD_STATUSES,
            LookupTable::PositionStatus => POSITION_STATUSES,
            LookupTable::PositionRole => &[],
        }
    }
}

pub const COMPANY_STATUSES: &[(&str, &str)] = &[
    ("potential_client", "Potential Client"),
    ("active_client", "Active Client"),
    ("former_client", "Former Client"),
    ("do_not_contact", "Do Not Contact"),
];

pub const LEAD_STATUSES: &[(&str, &str)] = &[
    ("new_lead", "New Lead"),
    ("pending", "Pending"),
    ("stuck", "Stuck"),
    ("converted_to_company", "Converted to Company"),
];

pub const POSITION_STATUSES: &[(&str, &str)] = &[
    ("open", "Open"),
    ("filled", "Filled"),
    ("closed", "Closed"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LookupRow {
    pub key: String,
    pub value: String,
}

impl LookupRow {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
