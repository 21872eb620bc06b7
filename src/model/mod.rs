pub mod legacy;
pub mod lookup;
pub mod target;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub use legacy::{LegacyAudit, LegacyCompany, LegacyContact, LegacyLead, LegacyPosition, LegacyRecord};
pub use lookup::{LookupRow, LookupTable};
pub use target::{Audit, Company, CompanyRef, Contact, Lead, Position, TargetRow, SCHEMA_VERSION};

/// The fixed set of entity kinds this tool knows how to migrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Company,
    Lead,
    Position,
    Contact,
}

impl EntityKind {
    /// Dependency order: companies must exist before anything referencing them.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Company,
        EntityKind::Lead,
        EntityKind::Position,
        EntityKind::Contact,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Company => "company",
            EntityKind::Lead => "lead",
            EntityKind::Position => "position",
            EntityKind::Contact => "contact",
        }
    }

    /// Legacy table (quoted, camel-cased in the source database).
    pub fn source_table(self) -> &'static str {
        match self {
            EntityKind::Company => "Company",
            EntityKind::Lead => "Lead",
            EntityKind::Position => "Position",
            EntityKind::Contact => "Contact",
        }
    }

    pub fn target_table(self) -> &'static str {
        match self {
            EntityKind::Company => "companies",
            EntityKind::Lead => "leads",
            EntityKind::Position => "positions",
            EntityKind::Contact => "contacts",
        }
    }

    /// Page size used for offset pagination of the source table.
    pub fn default_page_size(self) -> i64 {
        match self {
            EntityKind::Company | EntityKind::Lead => 100,
            EntityKind::Position | EntityKind::Contact => 50,
        }
    }

    /// Enumeration tables reconciled before this kind's records are processed.
    pub fn lookup_tables(self) -> &'static [LookupTable] {
        match self {
            EntityKind::Company => &[LookupTable::CompanyStatus],
            EntityKind::Lead => &[LookupTable::LeadStatus],
            EntityKind::Position => &[LookupTable::PositionStatus],
            EntityKind::Contact => &[],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "company" | "companies" => Ok(EntityKind::Company),
            "lead" | "leads" => Ok(EntityKind::Lead),
            "position" | "positions" => Ok(EntityKind::Position),
            "contact" | "contacts" => Ok(EntityKind::Contact),
            other => Err(anyhow::anyhow!("unknown entity kind '{other}'")),
        }
    }
}
