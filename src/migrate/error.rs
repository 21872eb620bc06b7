use serde::Serialize;

use crate::model::{EntityKind, LookupTable};
use crate::normalization::InvalidIdentifier;
use crate::store::StoreError;

/// Ledger bucket for a failed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FailureKind {
    InvalidIdentifierFormat,
    MissingReference,
    LookupReconciliationFailed,
    DuplicateConstraintViolation,
    DataTooLong,
    UnclassifiedError,
}

/// Per-record failure. Caught at the orchestrator's record boundary; never aborts a batch.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    InvalidIdentifierFormat(#[from] InvalidIdentifier),

    #[error("{entity} reference {legacy_ref:?} not found by id or natural key")]
    MissingReference { entity: EntityKind, legacy_ref: String },

    #[error("lookup row {key:?} in {table:?} could not be found or created: {source}")]
    LookupReconciliationFailed {
        table: LookupTable,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("unique constraint violated on field `{field}`")]
    DuplicateConstraintViolation { field: String },

    #[error("data too long: {detail}")]
    DataTooLong { detail: String },

    #[error("unclassified error: {0:#}")]
    Unclassified(#[from] anyhow::Error),
}

impl MigrationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            MigrationError::InvalidIdentifierFormat(_) => FailureKind::InvalidIdentifierFormat,
            MigrationError::MissingReference { .. } => FailureKind::MissingReference,
            MigrationError::LookupReconciliationFailed { .. } => FailureKind::LookupReconciliationFailed,
            MigrationError::DuplicateConstraintViolation { .. } => FailureKind::DuplicateConstraintViolation,
            MigrationError::DataTooLong { .. } => FailureKind::DataTooLong,
            MigrationError::Unclassified(_) => FailureKind::UnclassifiedError,
        }
    }
}

impl From<StoreError> for MigrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { field } => MigrationError::DuplicateConstraintViolation { field },
            StoreError::ValueTooLong { detail } => MigrationError::DataTooLong { detail },
            StoreError::Database(e) => MigrationError::Unclassified(anyhow::Error::new(e)),
            StoreError::Other(e) => MigrationError::Unclassified(e),
        }
    }
}

/// What happened to a record that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Migrated,
    /// Already present in the target and overwritten on operator request.
    Updated,
    /// Already present in the target (by id or natural key); left untouched.
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_onto_the_taxonomy() {
        let dup: MigrationError = StoreError::UniqueViolation { field: "email".into() }.into();
        assert_eq!(dup.kind(), FailureKind::DuplicateConstraintViolation);

        let long: MigrationError = StoreError::ValueTooLong { detail: "varchar(100)".into() }.into();
        assert_eq!(long.kind(), FailureKind::DataTooLong);

        let other: MigrationError = StoreError::Other(anyhow::anyhow!("socket closed")).into();
        assert_eq!(other.kind(), FailureKind::UnclassifiedError);
    }

    #[test]
    fn invalid_identifier_keeps_raw_value_in_message() {
        let err: MigrationError = InvalidIdentifier { raw: "nope".into() }.into();
        assert_eq!(err.kind(), FailureKind::InvalidIdentifierFormat);
        assert!(err.to_string().contains("nope"));
    }
}
