use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use super::confirm::{Confirm, Decision, Prompt};
use super::entities::{CompanyMigrator, ContactMigrator, EntityMigrator, LeadMigrator, PositionMigrator, RecordScope};
use super::error::{MigrationError, Outcome};
use super::lookup::LookupSet;
use super::progress::Progress;
use super::resolver::ReferenceResolver;
use super::stats::{MigrationReport, MigrationStats};
use super::transform::TransformContext;
use crate::model::{EntityKind, LegacyRecord};
use crate::normalization::CanonicalId;
use crate::store::{SourceStore, StoreError, TargetStore};

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Overrides the per-entity page size.
    pub page_size: Option<i64>,
    pub progress_every: usize,
    pub sample_limit: usize,
    /// Audit identity stamped on rows whose legacy audit columns are empty.
    pub actor: String,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            page_size: None,
            progress_every: 100,
            sample_limit: 20,
            actor: "migration".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    ReconcileLookups,
    Paginate,
    Report,
    Terminal,
}

fn enter(kind: EntityKind, phase: &mut Phase, next: Phase) {
    debug!(target: "migrate", %kind, from = ?*phase, to = ?next, "phase");
    *phase = next;
}

/// Drives one entity kind at a time: reconcile lookups, page through the source,
/// process each record sequentially, report.
pub struct Orchestrator<'a> {
    source: &'a dyn SourceStore,
    target: &'a dyn TargetStore,
    confirm: &'a mut dyn Confirm,
    options: OrchestratorOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        source: &'a dyn SourceStore,
        target: &'a dyn TargetStore,
        confirm: &'a mut dyn Confirm,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            source,
            target,
            confirm,
            options,
        }
    }

    pub async fn run_kind(&mut self, kind: EntityKind) -> Result<MigrationReport> {
        match kind {
            EntityKind::Company => self.run(&CompanyMigrator).await,
            EntityKind::Lead => self.run(&LeadMigrator).await,
            EntityKind::Position => self.run(&PositionMigrator).await,
            EntityKind::Contact => self.run(&ContactMigrator).await,
        }
    }

    /// Every kind in dependency order, each with its own ledger.
    pub async fn run_all(&mut self) -> Result<Vec<MigrationReport>> {
        let mut reports = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            reports.push(self.run_kind(kind).await?);
        }
        Ok(reports)
    }

    /// Errors returned here are fatal for the run (source unreachable, lookup seeding failed).
    /// Per-record failures only land in the report.
    pub async fn run<M: EntityMigrator>(&mut self, migrator: &M) -> Result<MigrationReport> {
        let kind = migrator.kind();
        let started = Instant::now();
        let mut phase = Phase::Init;

        let source_total = self
            .source
            .count(kind)
            .await
            .with_context(|| format!("failed to count legacy {kind} rows"))?;
        let mut stats = MigrationStats::new(self.options.sample_limit);
        let mut lookups = LookupSet::default();
        info!(target: "migrate", %kind, source_total, "starting migration");

        enter(kind, &mut phase, Phase::ReconcileLookups);
        lookups
            .reconcile_seeds(self.target, kind.lookup_tables())
            .await
            .with_context(|| format!("lookup reconciliation failed for {kind}"))?;

        let decision = self.confirm.confirm(&Prompt::StartMigration { kind, source_total });
        if decision != Decision::Proceed {
            warn!(target: "migrate", %kind, "migration declined by operator");
            enter(kind, &mut phase, Phase::Report);
            let report = stats.into_report(kind, source_total, started.elapsed(), false);
            report.log();
            enter(kind, &mut phase, Phase::Terminal);
            return Ok(report);
        }

        enter(kind, &mut phase, Phase::Paginate);
        let page_size = self.options.page_size.unwrap_or_else(|| kind.default_page_size()).max(1);
        let resolver = ReferenceResolver::new(self.source, self.target);
        let mut progress = Progress::new(kind.as_str(), usize::try_from(source_total).ok(), self.options.progress_every);
        let mut skip = 0i64;
        loop {
            let page = migrator
                .fetch_page(self.source, skip, page_size)
                .await
                .with_context(|| format!("failed to read {kind} page at offset {skip}"))?;
            let fetched = page.len();
            debug!(target: "migrate", %kind, skip, fetched, "page fetched");

            for record in &page {
                stats.record_seen();
                match self
                    .process_record(migrator, record, &resolver, &mut lookups, &mut stats)
                    .await
                {
                    Ok(outcome) => {
                        if outcome == Outcome::Duplicate {
                            debug!(target: "migrate", %kind, legacy_id = record.legacy_id(), "already migrated; skipped");
                        }
                        stats.record_outcome(outcome);
                    }
                    Err(err) => {
                        warn!(
                            target: "migrate",
                            %kind,
                            legacy_id = record.legacy_id(),
                            failure = ?err.kind(),
                            error = %err,
                            "record failed"
                        );
                        stats.record_failure(record.legacy_id(), &err);
                    }
                }
                progress.tick(&stats);
            }

            if (fetched as i64) < page_size {
                break;
            }
            skip += page_size;
        }
        progress.finish(&stats);

        enter(kind, &mut phase, Phase::Report);
        let report = stats.into_report(kind, source_total, started.elapsed(), true);
        report.log();
        enter(kind, &mut phase, Phase::Terminal);
        Ok(report)
    }

    async fn process_record<M: EntityMigrator>(
        &mut self,
        migrator: &M,
        record: &M::Legacy,
        resolver: &ReferenceResolver<'a>,
        lookups: &mut LookupSet,
        stats: &mut MigrationStats,
    ) -> Result<Outcome, MigrationError> {
        let kind = migrator.kind();
        let id = CanonicalId::parse(record.legacy_id())?;

        let mut overwrite = false;
        if self.target.exists(kind, id.as_str()).await? {
            let prompt = Prompt::ExistingRecord {
                kind,
                legacy_id: record.legacy_id(),
                target_id: id.as_str(),
            };
            match self.confirm.confirm(&prompt) {
                Decision::Update => overwrite = true,
                _ => return Ok(Outcome::Duplicate),
            }
        } else if let Some(existing) = migrator.natural_key_match(self.target, record).await? {
            debug!(target: "migrate", %kind, legacy_id = record.legacy_id(), target_id = %existing, "natural key already present");
            return Ok(Outcome::Duplicate);
        }

        let ctx = TransformContext::new(Utc::now(), self.options.actor.as_str());
        let mut scope = RecordScope {
            resolver,
            target: self.target,
            lookups,
            stats,
            ctx: &ctx,
        };
        let row = migrator.build_row(&mut scope, record, &id).await?;

        let written = if overwrite {
            self.target.upsert(&row).await
        } else {
            self.target.insert(&row).await
        };
        match written {
            Ok(()) if overwrite => Ok(Outcome::Updated),
            Ok(()) => Ok(Outcome::Migrated),
            // Lost a race with another writer on our own id: same record, not a failure.
            Err(StoreError::UniqueViolation { field }) if field == "id" => Ok(Outcome::Duplicate),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::migrate::confirm::{AutoConfirm, TerminalConfirm};
    use crate::migrate::error::FailureKind;
    use crate::model::{
        Audit, Contact, LegacyCompany, LegacyContact, LegacyLead, LegacyPosition, LookupTable, TargetRow,
        SCHEMA_VERSION,
    };
    use crate::store::memory::{target_company, MemoryStore};

    const SUPERIOR_ID: &str = "0627caad-6165-48ca-8c74-aac1d9783d92";
    const SUPERIOR_CANONICAL: &str = "0627caad616548ca8c74aac1d9783d92";

    fn superior() -> LegacyCompany {
        LegacyCompany {
            id: SUPERIOR_ID.into(),
            domain: Some("superiorphm.com".into()),
            data: Some(r#"{"name":"Superior PHM","website_url":"https://superiorphm.com"}"#.into()),
            ..Default::default()
        }
    }

    fn hex_id(n: u32) -> String {
        format!("{n:032x}")
    }

    fn seeded_contact(id: &str, company_id: &str, email: &str) -> Contact {
        let now = Utc::now();
        Contact {
            id: id.into(),
            company_id: company_id.into(),
            company_name: "Acme".into(),
            first_name: None,
            last_name: None,
            email: email.into(),
            email_is_placeholder: false,
            phone: None,
            job_title: None,
            linkedin_url: None,
            is_primary: false,
            metadata: None,
            schema_version: SCHEMA_VERSION,
            audit: Audit {
                created_by: "test".into(),
                created_at: now,
                last_updated_by: "test".into(),
                last_updated_at: now,
                is_deleted: false,
                deleted_by: None,
                deleted_at: None,
            },
        }
    }

    async fn run(store: &MemoryStore, kind: EntityKind) -> MigrationReport {
        let mut confirm = AutoConfirm::skip_existing();
        Orchestrator::new(store, store, &mut confirm, OrchestratorOptions::default())
            .run_kind(kind)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn company_end_to_end_and_rerun_is_idempotent() {
        let store = MemoryStore::new().with_legacy_companies(vec![superior()]);

        let first = run(&store, EntityKind::Company).await;
        assert!(first.completed);
        assert_eq!(first.stats.succeeded, 1);
        assert_eq!(first.stats.failed, 0);

        let Some(TargetRow::Company(row)) = store.row(EntityKind::Company, SUPERIOR_CANONICAL) else {
            panic!("company not written");
        };
        assert_eq!(row.name, "Superior PHM");
        assert_eq!(row.website.as_deref(), Some("https://superiorphm.com"));
        assert_eq!(row.domain.as_deref(), Some("superiorphm.com"));
        assert_eq!(row.status, "Potential Client");
        assert_eq!(row.schema_version, SCHEMA_VERSION);
        assert_eq!(store.lookups(LookupTable::CompanyStatus).len(), 4);

        let second = run(&store, EntityKind::Company).await;
        assert_eq!(second.stats.succeeded, 0);
        assert_eq!(second.stats.duplicates, 1);
        assert_eq!(store.writes(), 1);
        assert_eq!(store.rows(EntityKind::Company).len(), 1);
    }

    #[tokio::test]
    async fn invalid_identifier_fails_without_writing() {
        let bad = LegacyCompany {
            id: "not-a-hex-id".into(),
            name: Some("Broken".into()),
            ..Default::default()
        };
        let store = MemoryStore::new().with_legacy_companies(vec![bad, superior()]);

        let report = run(&store, EntityKind::Company).await;
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.failures_of(FailureKind::InvalidIdentifierFormat), 1);
        assert_eq!(report.stats.succeeded, 1);
        assert_eq!(report.stats.failure_samples[0].legacy_id, "not-a-hex-id");
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn pages_through_every_record() {
        let companies = (1..=5)
            .map(|n| LegacyCompany {
                id: hex_id(n),
                name: Some(format!("Company {n}")),
                ..Default::default()
            })
            .collect();
        let store = MemoryStore::new().with_legacy_companies(companies);
        let mut confirm = AutoConfirm::skip_existing();
        let options = OrchestratorOptions {
            page_size: Some(2),
            ..Default::default()
        };

        let report = Orchestrator::new(&store, &store, &mut confirm, options)
            .run_kind(EntityKind::Company)
            .await
            .unwrap();
        assert_eq!(report.source_total, 5);
        assert_eq!(report.stats.total, 5);
        assert_eq!(report.stats.succeeded, 5);
    }

    #[tokio::test]
    async fn position_without_company_is_missing_reference() {
        let position = LegacyPosition {
            id: hex_id(10),
            company_id: Some(hex_id(999)),
            title: Some("Engineer".into()),
            ..Default::default()
        };
        let store = MemoryStore::new().with_legacy_positions(vec![position]);

        let report = run(&store, EntityKind::Position).await;
        assert_eq!(report.stats.failures_of(FailureKind::MissingReference), 1);
        assert_eq!(report.stats.unresolved_references, 1);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn position_resolves_company_and_role() {
        let position = LegacyPosition {
            id: hex_id(11),
            company_id: Some(SUPERIOR_ID.into()),
            title: Some("Staff Engineer".into()),
            role: Some("Platform Engineering".into()),
            is_filled: Some(true),
            ..Default::default()
        };
        let store = MemoryStore::new()
            .with_legacy_companies(vec![superior()])
            .with_legacy_positions(vec![position]);
        run(&store, EntityKind::Company).await;

        let report = run(&store, EntityKind::Position).await;
        assert_eq!(report.stats.succeeded, 1);
        assert_eq!(report.stats.primary_matches, 1);

        let Some(TargetRow::Position(row)) = store.row(EntityKind::Position, &hex_id(11)) else {
            panic!("position not written");
        };
        assert_eq!(row.company_id, SUPERIOR_CANONICAL);
        assert_eq!(row.company_name, "Superior PHM");
        assert_eq!(row.role_key, "platform_engineering");
        assert_eq!(row.status_key, "filled");
        assert_eq!(store.lookups(LookupTable::PositionRole).len(), 1);
    }

    #[tokio::test]
    async fn lead_falls_back_to_domain_and_counts_secondary() {
        let legacy_acme = LegacyCompany {
            id: hex_id(1),
            domain: Some("www.Acme.io".into()),
            ..Default::default()
        };
        let leads = vec![
            LegacyLead {
                id: hex_id(20),
                company_id: Some(hex_id(1)),
                ..Default::default()
            },
            LegacyLead {
                id: hex_id(21),
                company_id: Some(hex_id(404)),
                company_name: Some("Nowhere Inc".into()),
                ..Default::default()
            },
        ];
        let store = MemoryStore::new()
            .with_legacy_companies(vec![legacy_acme])
            .with_legacy_leads(leads);
        // Migrated earlier under a different identifier.
        store.put_company(target_company(&hex_id(77), "Acme", Some("acme.io")));

        let report = run(&store, EntityKind::Lead).await;
        assert_eq!(report.stats.succeeded, 2);
        assert_eq!(report.stats.secondary_matches, 1);
        assert_eq!(report.stats.unresolved_references, 1);

        let Some(TargetRow::Lead(linked)) = store.row(EntityKind::Lead, &hex_id(20)) else {
            panic!("lead not written");
        };
        assert_eq!(linked.company_id, Some(hex_id(77)));
        assert_eq!(linked.status_key, "converted_to_company");

        let Some(TargetRow::Lead(orphan)) = store.row(EntityKind::Lead, &hex_id(21)) else {
            panic!("lead not written");
        };
        assert_eq!(orphan.company_id, None);
        assert_eq!(orphan.company_name.as_deref(), Some("Nowhere Inc"));
        assert_eq!(orphan.status_key, "new_lead");
    }

    #[tokio::test]
    async fn contact_with_known_email_is_skipped() {
        let contact = LegacyContact {
            id: hex_id(30),
            company_id: Some(SUPERIOR_ID.into()),
            email: Some("Wile@Acme.io".into()),
            ..Default::default()
        };
        let store = MemoryStore::new().with_legacy_contacts(vec![contact]);
        store.put_company(target_company(SUPERIOR_CANONICAL, "Superior PHM", Some("superiorphm.com")));
        store.put_contact(seeded_contact(&hex_id(31), SUPERIOR_CANONICAL, "wile@acme.io"));

        let report = run(&store, EntityKind::Contact).await;
        assert_eq!(report.stats.duplicates, 1);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn contact_email_collision_on_update_is_a_failure() {
        let contact = LegacyContact {
            id: hex_id(40),
            company_id: Some(SUPERIOR_ID.into()),
            email: Some("taken@acme.io".into()),
            ..Default::default()
        };
        let store = MemoryStore::new().with_legacy_contacts(vec![contact]);
        store.put_company(target_company(SUPERIOR_CANONICAL, "Superior PHM", Some("superiorphm.com")));
        store.put_contact(seeded_contact(&hex_id(40), SUPERIOR_CANONICAL, "old@acme.io"));
        store.put_contact(seeded_contact(&hex_id(41), SUPERIOR_CANONICAL, "taken@acme.io"));

        let mut confirm = AutoConfirm::update_existing();
        let report = Orchestrator::new(&store, &store, &mut confirm, OrchestratorOptions::default())
            .run_kind(EntityKind::Contact)
            .await
            .unwrap();
        assert_eq!(report.stats.failures_of(FailureKind::DuplicateConstraintViolation), 1);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn contact_without_email_gets_placeholder() {
        let contact = LegacyContact {
            id: hex_id(50),
            company_id: Some(SUPERIOR_ID.into()),
            first_name: Some("Road".into()),
            ..Default::default()
        };
        let store = MemoryStore::new().with_legacy_contacts(vec![contact]);
        store.put_company(target_company(SUPERIOR_CANONICAL, "Superior PHM", Some("superiorphm.com")));

        let report = run(&store, EntityKind::Contact).await;
        assert_eq!(report.stats.succeeded, 1);
        let Some(TargetRow::Contact(row)) = store.row(EntityKind::Contact, &hex_id(50)) else {
            panic!("contact not written");
        };
        assert!(row.email_is_placeholder);
        assert!(row.email.starts_with("contact."));
        assert!(row.email.ends_with("@superiorphm.com"));
    }

    #[tokio::test]
    async fn update_existing_overwrites_and_counts_updated() {
        let store = MemoryStore::new().with_legacy_companies(vec![superior()]);
        run(&store, EntityKind::Company).await;

        let mut confirm = AutoConfirm::update_existing();
        let report = Orchestrator::new(&store, &store, &mut confirm, OrchestratorOptions::default())
            .run_kind(EntityKind::Company)
            .await
            .unwrap();
        assert_eq!(report.stats.updated, 1);
        assert_eq!(report.stats.duplicates, 0);
        assert_eq!(store.writes(), 2);
        assert_eq!(store.rows(EntityKind::Company).len(), 1);
    }

    #[tokio::test]
    async fn store_failures_are_classified_per_record() {
        let other = LegacyCompany {
            id: hex_id(2),
            name: Some("Fine".into()),
            ..Default::default()
        };
        let store = MemoryStore::new().with_legacy_companies(vec![superior(), other]);
        store.set_text_width(8);
        store.fail_writes_of(&hex_id(2));

        let report = run(&store, EntityKind::Company).await;
        assert!(report.completed);
        assert_eq!(report.stats.failures_of(FailureKind::DataTooLong), 1);
        assert_eq!(report.stats.failures_of(FailureKind::UnclassifiedError), 1);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn declined_gate_reports_incomplete_run() {
        let store = MemoryStore::new().with_legacy_companies(vec![superior()]);
        let mut confirm = TerminalConfirm::new(Cursor::new("n\n"), Vec::new());

        let report = Orchestrator::new(&store, &store, &mut confirm, OrchestratorOptions::default())
            .run_kind(EntityKind::Company)
            .await
            .unwrap();
        assert!(!report.completed);
        assert_eq!(report.source_total, 1);
        assert_eq!(report.stats.total, 0);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn lookup_seeding_failure_is_fatal() {
        let store = MemoryStore::new().with_legacy_companies(vec![superior()]);
        store.set_lookup_width(3);
        let mut confirm = AutoConfirm::skip_existing();

        let result = Orchestrator::new(&store, &store, &mut confirm, OrchestratorOptions::default())
            .run_kind(EntityKind::Company)
            .await;
        assert!(result.is_err());
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn run_all_follows_dependency_order() {
        let contact = LegacyContact {
            id: hex_id(60),
            company_id: Some(SUPERIOR_ID.into()),
            email: Some("ops@superiorphm.com".into()),
            ..Default::default()
        };
        let store = MemoryStore::new()
            .with_legacy_companies(vec![superior()])
            .with_legacy_contacts(vec![contact]);
        let mut confirm = AutoConfirm::skip_existing();

        let reports = Orchestrator::new(&store, &store, &mut confirm, OrchestratorOptions::default())
            .run_all()
            .await
            .unwrap();
        let kinds: Vec<_> = reports.iter().map(|r| r.entity).collect();
        assert_eq!(kinds, EntityKind::ALL.to_vec());
        assert_eq!(reports[3].stats.succeeded, 1);
        assert_eq!(reports[3].stats.primary_matches, 1);
    }

    #[tokio::test]
    async fn rerun_skips_every_dependent_record() {
        let lead = LegacyLead {
            id: hex_id(70),
            company_id: Some(SUPERIOR_ID.into()),
            ..Default::default()
        };
        let position = LegacyPosition {
            id: hex_id(71),
            company_id: Some(SUPERIOR_ID.into()),
            title: Some("Pharmacist".into()),
            ..Default::default()
        };
        let contacts = vec![
            LegacyContact {
                id: hex_id(72),
                company_id: Some(SUPERIOR_ID.into()),
                email: Some("Ops@SuperiorPHM.com".into()),
                ..Default::default()
            },
            LegacyContact {
                id: hex_id(73),
                company_id: Some(SUPERIOR_ID.into()),
                first_name: Some("No Email".into()),
                ..Default::default()
            },
        ];
        let store = MemoryStore::new()
            .with_legacy_companies(vec![superior()])
            .with_legacy_leads(vec![lead])
            .with_legacy_positions(vec![position])
            .with_legacy_contacts(contacts);
        run(&store, EntityKind::Company).await;

        let dependents = [(EntityKind::Lead, 1), (EntityKind::Position, 1), (EntityKind::Contact, 2)];
        for (kind, n) in dependents {
            let first = run(&store, kind).await;
            assert_eq!(first.stats.succeeded, n, "{kind}");
        }
        let writes = store.writes();
        assert_eq!(writes, 5);

        for (kind, n) in dependents {
            let again = run(&store, kind).await;
            assert_eq!(again.stats.duplicates, n, "{kind}");
            assert_eq!(again.stats.succeeded, 0, "{kind}");
            assert_eq!(again.stats.failed, 0, "{kind}");
            assert_eq!(store.rows(kind).len(), n, "{kind}");
        }
        assert_eq!(store.writes(), writes);
    }
}
