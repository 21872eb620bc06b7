use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::error::{FailureKind, MigrationError, Outcome};
use super::resolver::ResolutionStrategy;
use crate::model::EntityKind;

#[derive(Debug, Clone, Serialize)]
pub struct FailureSample {
    pub legacy_id: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Per-run counters. Owned by one orchestrator run and passed down by reference;
/// never shared across runs or threads.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStats {
    pub total: usize,
    pub succeeded: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    pub primary_matches: usize,
    pub secondary_matches: usize,
    pub unresolved_references: usize,
    pub failure_samples: Vec<FailureSample>,
    #[serde(skip)]
    sample_limit: usize,
}

impl MigrationStats {
    pub fn new(sample_limit: usize) -> Self {
        Self {
            sample_limit,
            ..Self::default()
        }
    }

    pub fn record_seen(&mut self) {
        self.total += 1;
    }

    pub fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Migrated => self.succeeded += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Duplicate => self.duplicates += 1,
        }
    }

    pub fn record_failure(&mut self, legacy_id: &str, err: &MigrationError) {
        let kind = err.kind();
        self.failed += 1;
        *self.failures.entry(kind).or_default() += 1;
        if self.failure_samples.len() < self.sample_limit {
            self.failure_samples.push(FailureSample {
                legacy_id: legacy_id.to_string(),
                kind,
                message: err.to_string(),
            });
        }
    }

    pub fn record_resolution(&mut self, strategy: ResolutionStrategy) {
        match strategy {
            ResolutionStrategy::Primary => self.primary_matches += 1,
            ResolutionStrategy::Secondary => self.secondary_matches += 1,
        }
    }

    pub fn record_unresolved(&mut self) {
        self.unresolved_references += 1;
    }

    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    pub fn into_report(self, entity: EntityKind, source_total: i64, elapsed: Duration, completed: bool) -> MigrationReport {
        let success_rate = if self.total == 0 {
            100.0
        } else {
            100.0 * ((self.succeeded + self.updated + self.duplicates) as f64) / (self.total as f64)
        };
        MigrationReport {
            entity,
            completed,
            source_total,
            elapsed_ms: elapsed.as_millis() as u64,
            success_rate,
            stats: self,
        }
    }
}

/// Final per-entity report; printed and optionally written as JSON, then discarded.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub entity: EntityKind,
    /// False when the operator declined the run at the confirmation gate.
    pub completed: bool,
    pub source_total: i64,
    pub elapsed_ms: u64,
    pub success_rate: f64,
    #[serde(flatten)]
    pub stats: MigrationStats,
}

impl MigrationReport {
    pub fn log(&self) {
        let s = &self.stats;
        info!(
            target: "migrate",
            entity = %self.entity,
            completed = self.completed,
            source_total = self.source_total,
            total = s.total,
            succeeded = s.succeeded,
            updated = s.updated,
            duplicates = s.duplicates,
            failed = s.failed,
            primary_matches = s.primary_matches,
            secondary_matches = s.secondary_matches,
            unresolved_references = s.unresolved_references,
            success_rate = format!("{:.1}%", self.success_rate),
            took_ms = self.elapsed_ms,
            "migration report"
        );
        for (kind, count) in &s.failures {
            warn!(target: "migrate", entity = %self.entity, failure = ?kind, count, "failure category");
        }
        for sample in &s.failure_samples {
            warn!(
                target: "migrate",
                entity = %self.entity,
                legacy_id = %sample.legacy_id,
                failure = ?sample.kind,
                message = %sample.message,
                "failure sample"
            );
        }
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::InvalidIdentifier;

    #[test]
    fn failures_are_bucketed_and_sampled_up_to_limit() {
        let mut stats = MigrationStats::new(1);
        for raw in ["a", "b"] {
            stats.record_seen();
            let err = MigrationError::from(InvalidIdentifier { raw: raw.into() });
            stats.record_failure(raw, &err);
        }
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.failures_of(FailureKind::InvalidIdentifierFormat), 2);
        assert_eq!(stats.failure_samples.len(), 1);
        assert_eq!(stats.failure_samples[0].legacy_id, "a");
    }

    #[test]
    fn report_serializes_counters_flat() {
        let mut stats = MigrationStats::new(5);
        stats.record_seen();
        stats.record_outcome(Outcome::Duplicate);
        stats.record_resolution(ResolutionStrategy::Secondary);
        let report = stats.into_report(EntityKind::Company, 1, Duration::from_millis(12), true);
        let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["entity"], "company");
        assert_eq!(json["duplicates"], 1);
        assert_eq!(json["secondary_matches"], 1);
        assert_eq!(json["success_rate"], 100.0);
    }
}
