//! wynnsync binary.
//!
//! Reads `wynnsync.toml` (or the path given with `--config`), opens the
//! SQLite store, polls the upstream API for the selected collections, and
//! prints a run summary. Exits non-zero when any collection failed.
//!
//! ```text
//! wynnsync all
//! wynnsync guilds "Some Guild" "Other Guild"
//! wynnsync log guild_member --scope <guild-uuid> --since 1700000000
//! ```

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use wynnsync_client::ApiClient;
use wynnsync_core::{
  collection::{CollectionKind, CollectionRef},
  store::SnapshotStore,
};
use wynnsync_engine::{Selection, SyncConfig, Syncer};
use wynnsync_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Game-data change tracker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "wynnsync.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Sync the item catalog.
  Items,
  /// Sync the aspect catalog of every configured class.
  Aspects,
  /// Sync guild headers and rosters. With no names, every listed guild.
  Guilds { names: Vec<String> },
  /// Sync every online player, then their guilds.
  Players,
  /// Sync one player by UUID.
  Player { uuid: String },
  /// Record which stored roster members are online.
  Presence,
  /// Items, aspects, players and their guilds, then presence.
  All,
  /// Print a collection's changelog as JSON lines.
  Log {
    /// guild, guild_member, item, aspect, or player.
    collection: String,
    /// Scope within the collection (guild UUID for rosters, class for aspects).
    #[arg(long, default_value = "")]
    scope:      String,
    /// Only entries at or after this Unix timestamp.
    #[arg(long)]
    since:      Option<i64>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = SyncConfig::load(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let selection = match cli.command {
    Command::Log { collection, scope, since } => {
      print_log(&store, &collection, scope, since).await?;
      return Ok(ExitCode::SUCCESS);
    }
    Command::Items => Selection::Items,
    Command::Aspects => Selection::Aspects,
    Command::Guilds { names } => Selection::Guilds(names),
    Command::Players => Selection::Players,
    Command::Player { uuid } => Selection::Player(uuid),
    Command::Presence => Selection::Presence,
    Command::All => Selection::All,
  };

  let client = ApiClient::new(cfg.client_config()).context("failed to build HTTP client")?;
  let syncer = Syncer::new(Arc::new(client), Arc::new(store), cfg);

  let report = syncer.run(selection).await;
  print!("{report}");

  if report.is_success() {
    Ok(ExitCode::SUCCESS)
  } else {
    Ok(ExitCode::FAILURE)
  }
}

async fn print_log(
  store: &SqliteStore,
  collection: &str,
  scope: String,
  since: Option<i64>,
) -> anyhow::Result<()> {
  let kind = CollectionKind::parse(collection)
    .with_context(|| format!("unknown collection {collection:?}"))?;
  let target = CollectionRef::scoped(kind, scope);
  let events = store
    .changelog(&target, since)
    .await
    .with_context(|| format!("failed to read changelog for {target}"))?;
  for event in &events {
    println!("{}", serde_json::to_string(event)?);
  }
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
