//! [`Syncer`], the run orchestrator.
//!
//! Each collection moves through Fetching → Canonicalizing → LoadingState →
//! Diffing → Emitting → PersistingState. An error in any stage stops that
//! collection only; it is logged, recorded in the report, and the next
//! collection starts. Nothing is retried within one invocation.

use std::{collections::HashSet, future::Future, sync::Arc};

use chrono::Utc;
use serde_json::Value;
use wynnsync_core::{
  Error, Result,
  canonical::{self, canonicalize},
  collection::{CollectionKind, CollectionRef},
  diff::{Change, DiffStats, diff},
  snapshot::{EntityKey, Snapshot},
  store::SnapshotStore,
  upstream::Upstream,
};

use crate::{
  config::SyncConfig,
  emit::emit,
  report::{CollectionOutcome, RunReport, Stage, SyncSummary},
};

/// Which collections a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
  Items,
  Aspects,
  /// Named guilds; an empty list means every guild the upstream lists.
  Guilds(Vec<String>),
  /// Every online player, then every guild those players belong to.
  Players,
  Player(String),
  Presence,
  /// Items, aspects, players (+ their guilds), then presence.
  All,
}

/// Where the previous snapshot for a diff comes from.
#[derive(Debug, Clone, Copy)]
enum Previous {
  /// The whole stored collection; keys missing upstream become removals.
  Collection,
  /// Only the stored rows for keys present in the current snapshot. Used
  /// for point-fetched entities, which can never be "removed".
  CurrentKeys,
}

/// Result of a `players` pass.
#[derive(Debug, Default)]
pub struct PlayersPass {
  pub outcomes: Vec<CollectionOutcome>,
  /// Guild names seen on fetched players, first-seen order, deduplicated.
  pub guilds:   Vec<String>,
}

/// Drives fetch → canonicalize → diff → emit → persist for every tracked
/// collection. Collaborators are supplied at construction so tests can
/// substitute fakes.
pub struct Syncer<U, S> {
  pub(crate) upstream: Arc<U>,
  pub(crate) store:    Arc<S>,
  pub(crate) config:   SyncConfig,
}

impl<U, S> Syncer<U, S> {
  pub fn new(upstream: Arc<U>, store: Arc<S>, config: SyncConfig) -> Self {
    Self { upstream, store, config }
  }
}

/// Seconds since the epoch; captured once per run.
pub fn now() -> i64 { Utc::now().timestamp() }

impl<U, S> Syncer<U, S>
where
  U: Upstream,
  S: SnapshotStore + 'static,
{
  /// Run every collection in `selection`, sharing one run timestamp.
  pub async fn run(&self, selection: Selection) -> RunReport {
    let run_ts = now();
    let mut report = RunReport::new(run_ts);
    tracing::info!(?selection, run_ts, "starting run");

    match selection {
      Selection::Items => report.collections.push(self.items_at(run_ts).await),
      Selection::Aspects => report.collections.extend(self.aspects_at(run_ts).await),
      Selection::Guilds(names) => {
        report.collections.extend(self.guilds_at(names, run_ts).await)
      }
      Selection::Players => {
        let pass = self.players_at(run_ts).await;
        report.collections.extend(pass.outcomes);
        report.collections.extend(self.guilds_named(&pass.guilds, run_ts).await);
      }
      Selection::Player(uuid) => {
        let (outcome, _) = self.player_at(&uuid, run_ts).await;
        report.collections.push(outcome);
      }
      Selection::Presence => report.presence = Some(self.presence_at(run_ts).await),
      Selection::All => {
        report.collections.push(self.items_at(run_ts).await);
        report.collections.extend(self.aspects_at(run_ts).await);
        let pass = self.players_at(run_ts).await;
        report.collections.extend(pass.outcomes);
        report.collections.extend(self.guilds_named(&pass.guilds, run_ts).await);
        report.presence = Some(self.presence_at(run_ts).await);
      }
    }

    tracing::info!(
      entities = report.entities_processed(),
      written = report.changes_written(),
      failed = report.failed().len(),
      "run finished"
    );
    report
  }

  // ── Public single-collection entry points ─────────────────────────────────

  pub async fn sync_items(&self) -> CollectionOutcome {
    self.items_at(now()).await
  }

  pub async fn sync_aspects(&self) -> Vec<CollectionOutcome> {
    self.aspects_at(now()).await
  }

  /// Sync one guild's header and roster.
  pub async fn sync_guild(&self, name: &str) -> Vec<CollectionOutcome> {
    self.guild_at(name, now()).await
  }

  /// Sync the named guilds, or every listed guild when `names` is empty.
  pub async fn sync_guilds(&self, names: Vec<String>) -> Vec<CollectionOutcome> {
    self.guilds_at(names, now()).await
  }

  /// Sync one player. Also returns the player's guild name, if any.
  pub async fn sync_player(&self, uuid: &str) -> (CollectionOutcome, Option<String>) {
    self.player_at(uuid, now()).await
  }

  pub async fn sync_players(&self) -> PlayersPass {
    self.players_at(now()).await
  }

  // ── Collections ───────────────────────────────────────────────────────────

  async fn items_at(&self, run_ts: i64) -> CollectionOutcome {
    let target = CollectionRef::global(CollectionKind::Item);
    self
      .track(target, self.upstream.item_catalog(), Previous::Collection, run_ts)
      .await
  }

  async fn aspects_at(&self, run_ts: i64) -> Vec<CollectionOutcome> {
    let mut outcomes = Vec::with_capacity(self.config.aspect_classes.len());
    for class in &self.config.aspect_classes {
      let target = CollectionRef::scoped(CollectionKind::Aspect, class.as_str());
      let fetch = self.upstream.aspect_catalog(class);
      outcomes.push(self.track(target, fetch, Previous::Collection, run_ts).await);
    }
    outcomes
  }

  async fn guilds_at(&self, names: Vec<String>, run_ts: i64) -> Vec<CollectionOutcome> {
    if !names.is_empty() {
      return self.guilds_named(&names, run_ts).await;
    }
    let names = self
      .upstream
      .guild_list()
      .await
      .and_then(|raw| canonical::guild_names(&raw));
    match names {
      Ok(names) => self.guilds_named(&names, run_ts).await,
      Err(error) => {
        let stage = stage_of(&error);
        log_failure("guild-list", stage, &error);
        vec![CollectionOutcome::failed("guild-list", stage, error)]
      }
    }
  }

  async fn guilds_named(&self, names: &[String], run_ts: i64) -> Vec<CollectionOutcome> {
    let mut outcomes = Vec::new();
    for name in names {
      outcomes.extend(self.guild_at(name, run_ts).await);
    }
    outcomes
  }

  /// One fetch feeds two collections: the guild header (keyed by guild UUID)
  /// and the roster (scoped by guild UUID, keyed by member UUID).
  async fn guild_at(&self, name: &str, run_ts: i64) -> Vec<CollectionOutcome> {
    let label = format!("guild:{name}");
    let raw = match self.upstream.guild(name).await {
      Ok(raw) => raw,
      Err(error) => {
        log_failure(&label, Stage::Fetching, &error);
        return vec![CollectionOutcome::failed(label, Stage::Fetching, error)];
      }
    };

    let header = match canonicalize(&raw, CollectionKind::Guild) {
      Ok(header) => header,
      Err(error) => {
        log_failure(&label, Stage::Canonicalizing, &error);
        return vec![CollectionOutcome::failed(label, Stage::Canonicalizing, error)];
      }
    };
    let Some(guild_key) = header.keys().next().cloned() else {
      let error = Error::malformed("guild payload produced no header");
      log_failure(&label, Stage::Canonicalizing, &error);
      return vec![CollectionOutcome::failed(label, Stage::Canonicalizing, error)];
    };

    let header_target = CollectionRef::global(CollectionKind::Guild);
    let roster_target =
      CollectionRef::scoped(CollectionKind::GuildMember, guild_key.as_str());

    let header = self.apply(&header_target, header, Previous::CurrentKeys, run_ts).await;
    let roster = match canonicalize(&raw, CollectionKind::GuildMember) {
      Ok(current) => {
        self.apply(&roster_target, current, Previous::Collection, run_ts).await
      }
      Err(error) => Err((Stage::Canonicalizing, error)),
    };
    vec![finish(label, header), finish(format!("roster:{name}"), roster)]
  }

  async fn player_at(&self, uuid: &str, run_ts: i64) -> (CollectionOutcome, Option<String>) {
    let label = format!("player:{uuid}");
    let raw = match self.upstream.player(uuid).await {
      Ok(Some(raw)) => raw,
      Ok(None) => {
        tracing::debug!(uuid, "player unknown upstream, skipping");
        return (CollectionOutcome::skipped(label, "not found upstream"), None);
      }
      Err(error) => {
        log_failure(&label, Stage::Fetching, &error);
        return (CollectionOutcome::failed(label, Stage::Fetching, error), None);
      }
    };

    let target = CollectionRef::global(CollectionKind::Player);
    let current = match canonicalize(&raw, CollectionKind::Player) {
      Ok(current) => current,
      Err(error) => {
        log_failure(&label, Stage::Canonicalizing, &error);
        return (CollectionOutcome::failed(label, Stage::Canonicalizing, error), None);
      }
    };
    let guild = current
      .iter()
      .next()
      .and_then(|(_, record)| canonical::player_guild(record))
      .map(str::to_owned);

    let result = self.apply(&target, current, Previous::CurrentKeys, run_ts).await;
    (finish(label, result), guild)
  }

  async fn players_at(&self, run_ts: i64) -> PlayersPass {
    let mut pass = PlayersPass::default();
    let uuids = self
      .upstream
      .online_players()
      .await
      .and_then(|raw| canonical::online_player_keys(&raw));
    let uuids = match uuids {
      Ok(uuids) => uuids,
      Err(error) => {
        let stage = stage_of(&error);
        log_failure("player-list", stage, &error);
        pass.outcomes.push(CollectionOutcome::failed("player-list", stage, error));
        return pass;
      }
    };

    let limit = self.config.max_players.unwrap_or(uuids.len());
    tracing::info!(online = uuids.len(), limit, "syncing players");

    let mut seen = HashSet::new();
    for uuid in uuids.iter().take(limit) {
      let (outcome, guild) = self.player_at(uuid, run_ts).await;
      pass.outcomes.push(outcome);
      if let Some(guild) = guild {
        if seen.insert(guild.clone()) {
          pass.guilds.push(guild);
        }
      }
    }
    pass
  }

  // ── Pipeline ──────────────────────────────────────────────────────────────

  /// Fetching + Canonicalizing, then [`apply`](Self::apply).
  async fn track(
    &self,
    target: CollectionRef,
    fetch: impl Future<Output = Result<Value>>,
    previous: Previous,
    run_ts: i64,
  ) -> CollectionOutcome {
    let raw = match fetch.await {
      Ok(raw) => raw,
      Err(error) => {
        log_failure(&target, Stage::Fetching, &error);
        return CollectionOutcome::failed(&target, Stage::Fetching, error);
      }
    };
    let result = match canonicalize(&raw, target.kind) {
      Ok(current) => self.apply(&target, current, previous, run_ts).await,
      Err(error) => Err((Stage::Canonicalizing, error)),
    };
    finish(target, result)
  }

  /// LoadingState → Diffing → Emitting → PersistingState for an already
  /// canonical snapshot.
  async fn apply(
    &self,
    target: &CollectionRef,
    current: Snapshot,
    previous: Previous,
    run_ts: i64,
  ) -> StageResult<SyncSummary> {
    let previous = self
      .load_previous(target, &current, previous)
      .await
      .map_err(|e| (Stage::LoadingState, e))?;
    let changes = diff(&previous, &current, target.kind.noise_paths());
    let stats = DiffStats::tally(&changes, &previous, &current);
    let removed: Vec<EntityKey> = changes
      .iter()
      .filter(|c| matches!(c, Change::Remove { .. }))
      .map(|c| c.key().clone())
      .collect();

    // Emitting
    let events_written = emit(&*self.store, target, changes, run_ts)
      .await
      .map_err(|e| (Stage::Emitting, e))?;

    // PersistingState: every current key is rewritten, changed or not.
    let upserted = self
      .store
      .upsert_all(target, &current)
      .await
      .map_err(|e| (Stage::PersistingState, Error::store_write(e)))?;
    let removed = self
      .store
      .remove_keys(target, &removed)
      .await
      .map_err(|e| (Stage::PersistingState, Error::store_write(e)))?;

    let summary = SyncSummary {
      entities: current.len(),
      stats,
      events_written,
      upserted,
      removed,
    };
    tracing::info!(
      %target,
      entities = summary.entities,
      added = stats.added,
      removed = stats.removed,
      modified = stats.modified,
      written = events_written,
      "collection synced"
    );
    Ok(summary)
  }

  async fn load_previous(
    &self,
    target: &CollectionRef,
    current: &Snapshot,
    previous: Previous,
  ) -> Result<Snapshot> {
    match previous {
      Previous::Collection => {
        self.store.load_previous(target).await.map_err(Error::store_read)
      }
      Previous::CurrentKeys => {
        let mut snapshot = Snapshot::new();
        for key in current.keys() {
          let row = self
            .store
            .load_one(target, key)
            .await
            .map_err(Error::store_read)?;
          if let Some(row) = row {
            snapshot.insert(row.key, row.record);
          }
        }
        Ok(snapshot)
      }
    }
  }
}

// ─── Stage plumbing ──────────────────────────────────────────────────────────

/// An error tagged with the stage it happened in.
type StageResult<T> = std::result::Result<T, (Stage, Error)>;

fn finish(label: impl ToString, result: StageResult<SyncSummary>) -> CollectionOutcome {
  let label = label.to_string();
  match result {
    Ok(summary) => CollectionOutcome::done(label, summary),
    Err((stage, error)) => {
      log_failure(&label, stage, &error);
      CollectionOutcome::failed(label, stage, error)
    }
  }
}

/// Canonicalization errors surface as malformed payloads; everything else
/// the upstream returns happened while fetching.
fn stage_of(error: &Error) -> Stage {
  match error {
    Error::MalformedPayload(_) => Stage::Canonicalizing,
    _ => Stage::Fetching,
  }
}

fn log_failure(label: impl std::fmt::Display, stage: Stage, error: &Error) {
  tracing::warn!(collection = %label, %stage, %error, "collection failed");
}
