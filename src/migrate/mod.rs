//! Migration core: per-record pipeline (normalize, resolve, reconcile, transform, write)
//! and the batch orchestrator around it.
pub mod confirm;
pub mod entities;
pub mod error;
pub mod lookup;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod stats;
pub mod transform;

pub use confirm::{AutoConfirm, Confirm, Decision, Prompt, TerminalConfirm};
pub use entities::{CompanyMigrator, ContactMigrator, EntityMigrator, LeadMigrator, PositionMigrator};
pub use error::{FailureKind, MigrationError, Outcome};
pub use lookup::{ensure_lookup, LookupSet};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use resolver::{ReferenceResolver, ResolutionStrategy};
pub use stats::{FailureSample, MigrationReport, MigrationStats};
