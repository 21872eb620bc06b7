pub mod domain;
pub mod identifier;

pub use domain::{normalize_domain, toggle_www};
pub use identifier::{normalize_identifier, to_dashed, CanonicalId, InvalidIdentifier};
