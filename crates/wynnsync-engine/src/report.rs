//! Per-collection outcomes and the run report.

use std::fmt;

use wynnsync_core::{Error, diff::DiffStats};

use crate::presence::PresenceReport;

/// The pipeline state a collection was in when it finished or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Fetching,
  Canonicalizing,
  /// Reading the stored current state a diff or presence pass starts from.
  LoadingState,
  Diffing,
  Emitting,
  PersistingState,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Fetching => "fetching",
      Self::Canonicalizing => "canonicalizing",
      Self::LoadingState => "loading stored state",
      Self::Diffing => "diffing",
      Self::Emitting => "emitting",
      Self::PersistingState => "persisting state",
    })
  }
}

/// A collection that stopped early. Writes made before the failure stand.
#[derive(Debug)]
pub struct Failure {
  pub stage: Stage,
  pub error: Error,
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "failed while {}: {}", self.stage, self.error)
  }
}

/// What a completed collection did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
  /// Entities in the freshly fetched snapshot.
  pub entities:       usize,
  pub stats:          DiffStats,
  pub events_written: usize,
  pub upserted:       usize,
  pub removed:        usize,
}

#[derive(Debug)]
pub enum Outcome {
  Done(SyncSummary),
  /// Nothing to do, e.g. the upstream no longer knows the entity.
  Skipped(String),
  Failed(Failure),
}

#[derive(Debug)]
pub struct CollectionOutcome {
  /// Human-readable collection label, e.g. `aspect:mage`.
  pub label:   String,
  pub outcome: Outcome,
}

impl CollectionOutcome {
  pub fn done(label: impl ToString, summary: SyncSummary) -> Self {
    Self { label: label.to_string(), outcome: Outcome::Done(summary) }
  }

  pub fn skipped(label: impl ToString, reason: impl Into<String>) -> Self {
    Self { label: label.to_string(), outcome: Outcome::Skipped(reason.into()) }
  }

  pub fn failed(label: impl ToString, stage: Stage, error: Error) -> Self {
    Self {
      label:   label.to_string(),
      outcome: Outcome::Failed(Failure { stage, error }),
    }
  }

  pub fn summary(&self) -> Option<&SyncSummary> {
    match &self.outcome {
      Outcome::Done(s) => Some(s),
      _ => None,
    }
  }

  pub fn failure(&self) -> Option<&Failure> {
    match &self.outcome {
      Outcome::Failed(f) => Some(f),
      _ => None,
    }
  }
}

// ─── RunReport ───────────────────────────────────────────────────────────────

/// Everything one invocation did, for the final summary.
#[derive(Debug, Default)]
pub struct RunReport {
  pub run_timestamp: i64,
  pub collections:   Vec<CollectionOutcome>,
  pub presence:      Option<Result<PresenceReport, Failure>>,
}

impl RunReport {
  pub fn new(run_timestamp: i64) -> Self {
    Self { run_timestamp, ..Self::default() }
  }

  pub fn entities_processed(&self) -> usize {
    self.collections.iter().filter_map(|c| c.summary()).map(|s| s.entities).sum()
  }

  pub fn changes_detected(&self) -> usize {
    self
      .collections
      .iter()
      .filter_map(|c| c.summary())
      .map(|s| s.stats.total_changes())
      .sum()
  }

  pub fn changes_written(&self) -> usize {
    self
      .collections
      .iter()
      .filter_map(|c| c.summary())
      .map(|s| s.events_written)
      .sum()
  }

  /// Labels of every collection (and the presence pass) that failed.
  pub fn failed(&self) -> Vec<&str> {
    let mut failed: Vec<&str> = self
      .collections
      .iter()
      .filter(|c| c.failure().is_some())
      .map(|c| c.label.as_str())
      .collect();
    if matches!(self.presence, Some(Err(_))) {
      failed.push("presence");
    }
    failed
  }

  pub fn is_success(&self) -> bool { self.failed().is_empty() }
}

impl fmt::Display for RunReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(
      f,
      "processed {} entities across {} collections; {} changes detected, {} written",
      self.entities_processed(),
      self.collections.len(),
      self.changes_detected(),
      self.changes_written(),
    )?;
    match &self.presence {
      Some(Ok(p)) => writeln!(f, "{p}")?,
      Some(Err(e)) => writeln!(f, "presence {e}")?,
      None => {}
    }
    for c in &self.collections {
      match &c.outcome {
        Outcome::Failed(failure) => writeln!(f, "  {}: {failure}", c.label)?,
        Outcome::Skipped(reason) => writeln!(f, "  {}: skipped ({reason})", c.label)?,
        Outcome::Done(_) => {}
      }
    }
    Ok(())
  }
}
