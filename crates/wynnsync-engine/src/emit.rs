//! Changelog emitter: stamps a run's changes and appends them.

use wynnsync_core::{
  Error, Result,
  changelog::stamp_all,
  collection::CollectionRef,
  diff::Change,
  store::SnapshotStore,
};

/// Stamp `changes` with `run_timestamp` and append them to the changelog.
///
/// Zero changes means zero writes, so re-running against unchanged upstream
/// data leaves the changelog untouched. Returns the number of rows written.
pub async fn emit<S: SnapshotStore>(
  store: &S,
  target: &CollectionRef,
  changes: Vec<Change>,
  run_timestamp: i64,
) -> Result<usize> {
  if changes.is_empty() {
    return Ok(0);
  }
  let events = stamp_all(changes, run_timestamp);
  let written = store
    .append_changelog(target, &events)
    .await
    .map_err(Error::store_write)?;
  tracing::debug!(%target, written, run_timestamp, "changelog appended");
  Ok(written)
}
