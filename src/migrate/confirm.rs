//! Operator confirmation port. The orchestrator asks; batch runs answer automatically,
//! interactive runs block on a terminal line with no timeout.
use std::io::{BufRead, BufReader, Write};

use crate::model::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip,
    Update,
}

#[derive(Debug, Clone, Copy)]
pub enum Prompt<'a> {
    /// Gate between lookup reconciliation and paging.
    StartMigration { kind: EntityKind, source_total: i64 },
    /// The record's canonical id already exists in the target.
    ExistingRecord {
        kind: EntityKind,
        legacy_id: &'a str,
        target_id: &'a str,
    },
}

pub trait Confirm: Send {
    fn confirm(&mut self, prompt: &Prompt<'_>) -> Decision;
}

/// Non-interactive answers for unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm {
    update_existing: bool,
}

impl AutoConfirm {
    pub fn skip_existing() -> Self {
        Self { update_existing: false }
    }

    pub fn update_existing() -> Self {
        Self { update_existing: true }
    }
}

impl Confirm for AutoConfirm {
    fn confirm(&mut self, prompt: &Prompt<'_>) -> Decision {
        match prompt {
            Prompt::StartMigration { .. } => Decision::Proceed,
            Prompt::ExistingRecord { .. } if self.update_existing => Decision::Update,
            Prompt::ExistingRecord { .. } => Decision::Skip,
        }
    }
}

/// Line-oriented prompt. End of input answers "skip".
pub struct TerminalConfirm<R, W> {
    input: R,
    output: W,
    /// Set once the operator answers "all" to an existing-record prompt.
    update_all: bool,
}

impl TerminalConfirm<BufReader<std::io::Stdin>, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            update_all: false,
        }
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        let _ = write!(self.output, "{question} ");
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_ascii_lowercase()),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> Confirm for TerminalConfirm<R, W> {
    fn confirm(&mut self, prompt: &Prompt<'_>) -> Decision {
        match prompt {
            Prompt::StartMigration { kind, source_total } => {
                let question = format!("migrate {source_total} legacy {kind} records? [y/N]");
                loop {
                    match self.ask(&question).as_deref() {
                        Some("y") | Some("yes") => return Decision::Proceed,
                        Some("n") | Some("no") | Some("") | None => return Decision::Skip,
                        Some(_) => continue,
                    }
                }
            }
            Prompt::ExistingRecord { kind, legacy_id, target_id } => {
                if self.update_all {
                    return Decision::Update;
                }
                let question = format!(
                    "{kind} {legacy_id} already migrated as {target_id}: [s]kip / [u]pdate / update [a]ll?"
                );
                loop {
                    match self.ask(&question).as_deref() {
                        Some("u") | Some("update") => return Decision::Update,
                        Some("a") | Some("all") => {
                            self.update_all = true;
                            return Decision::Update;
                        }
                        Some("s") | Some("skip") | Some("") | None => return Decision::Skip,
                        Some(_) => continue,
                    }
                }
            }
        }
    }
}
