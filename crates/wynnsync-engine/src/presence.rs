//! Presence fan-out: one shared online set, one task per stored guild roster.

use std::{collections::HashSet, fmt, sync::Arc};

use tokio::{sync::Semaphore, task::JoinHandle};
use wynnsync_core::{
  Error, Result,
  canonical,
  collection::{CollectionKind, CollectionRef},
  presence::{PresenceUpdate, PresenceWrite},
  snapshot::EntityKey,
  store::SnapshotStore,
  upstream::Upstream,
};

use crate::{
  report::{Failure, Stage},
  sync::{Syncer, now},
};

/// How one guild's presence task ended.
#[derive(Debug)]
pub enum PresenceTask {
  Updated { guild_key: String, online: usize },
  /// The guild gets no update this run; the others are unaffected.
  Failed { guild_key: String, error: String },
}

impl PresenceTask {
  pub fn guild_key(&self) -> &str {
    match self {
      Self::Updated { guild_key, .. } | Self::Failed { guild_key, .. } => guild_key,
    }
  }

  pub fn is_failed(&self) -> bool { matches!(self, Self::Failed { .. }) }
}

/// What a presence pass did.
#[derive(Debug, Default)]
pub struct PresenceReport {
  pub timestamp:      i64,
  /// Size of the shared online set.
  pub online_players: usize,
  pub tasks:          Vec<PresenceTask>,
  pub write:          PresenceWrite,
  /// Online-count rows deleted by retention.
  pub pruned:         usize,
}

impl PresenceReport {
  pub fn failed_tasks(&self) -> impl Iterator<Item = &PresenceTask> {
    self.tasks.iter().filter(|t| t.is_failed())
  }
}

impl fmt::Display for PresenceReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let failed = self.failed_tasks().count();
    write!(
      f,
      "presence: {} players online across {} guilds, {} members seen, {} \
       counts recorded, {} pruned",
      self.online_players,
      self.tasks.len() - failed,
      self.write.members_touched,
      self.write.counts_appended,
      self.pruned,
    )?;
    for task in self.failed_tasks() {
      if let PresenceTask::Failed { guild_key, error } = task {
        write!(f, "\n  presence {guild_key}: {error}")?;
      }
    }
    Ok(())
  }
}

impl<U, S> Syncer<U, S>
where
  U: Upstream,
  S: SnapshotStore + 'static,
{
  /// Record which roster members are online now, and each guild's count.
  pub async fn sync_presence(&self) -> std::result::Result<PresenceReport, Failure> {
    self.presence_at(now()).await
  }

  pub(crate) async fn presence_at(
    &self,
    run_ts: i64,
  ) -> std::result::Result<PresenceReport, Failure> {
    let online = self
      .upstream
      .online_players()
      .await
      .map_err(|error| fail(Stage::Fetching, error))?;
    let online = canonical::online_players(&online)
      .map_err(|error| fail(Stage::Canonicalizing, error))?;
    let online_players = online.len();

    // An empty online list is treated as a bad read, not as every guild
    // dropping to zero.
    let (tasks, write) = if online.is_empty() {
      tracing::info!("no players online, leaving presence untouched");
      (Vec::new(), PresenceWrite::default())
    } else {
      self.fan_out(Arc::new(online), run_ts).await?
    };

    let pruned = self
      .store
      .prune_online_counts(run_ts - self.config.online_count_retention_secs)
      .await
      .map_err(|e| fail(Stage::PersistingState, Error::store_write(e)))?;

    tracing::info!(
      members = write.members_touched,
      counts = write.counts_appended,
      pruned,
      "presence recorded"
    );
    Ok(PresenceReport {
      timestamp: run_ts,
      online_players,
      tasks,
      write,
      pruned,
    })
  }

  /// One task per stored roster, then a single batch write of the results.
  async fn fan_out(
    &self,
    online: Arc<HashSet<String>>,
    run_ts: i64,
  ) -> std::result::Result<(Vec<PresenceTask>, PresenceWrite), Failure> {
    let guilds = self
      .store
      .list_scopes(CollectionKind::GuildMember)
      .await
      .map_err(|e| fail(Stage::LoadingState, Error::store_read(e)))?;
    tracing::info!(guilds = guilds.len(), online = online.len(), "presence fan-out");

    let permits = Arc::new(Semaphore::new(self.config.presence_concurrency.max(1)));
    let handles: Vec<(String, JoinHandle<TaskResult>)> = guilds
      .into_iter()
      .map(|guild_key| {
        let store = Arc::clone(&self.store);
        let online = Arc::clone(&online);
        let permits = Arc::clone(&permits);
        let key = guild_key.clone();
        let handle = tokio::spawn(async move {
          let Ok(_permit) = permits.acquire_owned().await else {
            return Err("presence task limiter closed".to_owned());
          };
          guild_presence(&*store, key, &online)
            .await
            .map_err(|e| e.to_string())
        });
        (guild_key, handle)
      })
      .collect();

    let mut tasks = Vec::with_capacity(handles.len());
    let mut updates = Vec::with_capacity(handles.len());
    for (guild_key, handle) in handles {
      let error = match handle.await {
        Ok(Ok(update)) => {
          tasks.push(PresenceTask::Updated { guild_key, online: update.count() });
          updates.push(update);
          continue;
        }
        Ok(Err(e)) => e,
        Err(e) => e.to_string(),
      };
      tracing::warn!(guild = %guild_key, %error, "presence task failed");
      tasks.push(PresenceTask::Failed { guild_key, error });
    }

    let write = self
      .store
      .record_presence(&updates, run_ts)
      .await
      .map_err(|e| fail(Stage::PersistingState, Error::store_write(e)))?;
    Ok((tasks, write))
  }
}

/// A task's update, or why the guild got none.
type TaskResult = std::result::Result<PresenceUpdate, String>;

/// One guild: load the stored roster and header name, intersect with the
/// shared online set.
async fn guild_presence<S: SnapshotStore>(
  store: &S,
  guild_key: String,
  online: &HashSet<String>,
) -> Result<PresenceUpdate> {
  let roster_target =
    CollectionRef::scoped(CollectionKind::GuildMember, guild_key.as_str());
  let roster = store
    .load_previous(&roster_target)
    .await
    .map_err(Error::store_read)?;

  let header_target = CollectionRef::global(CollectionKind::Guild);
  let header_key = EntityKey::new(guild_key.as_str());
  let guild_name = store
    .load_one(&header_target, &header_key)
    .await
    .map_err(Error::store_read)?
    .and_then(|row| canonical::guild_name(&row.record).map(str::to_owned));

  Ok(PresenceUpdate::compute(guild_key, guild_name, &roster, online))
}

fn fail(stage: Stage, error: Error) -> Failure {
  tracing::warn!(%stage, %error, "presence pass failed");
  Failure { stage, error }
}
