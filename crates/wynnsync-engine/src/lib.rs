//! Sync engine for wynnsync.
//!
//! Drives each tracked collection through fetch → canonicalize → diff →
//! emit → persist, isolating failures per collection, and runs the presence
//! fan-out across stored guild rosters.
//!
//! Every collaborator is passed in explicitly:
//!
//! ```rust,ignore
//! let syncer = Syncer::new(Arc::new(client), Arc::new(store), config);
//! let report = syncer.run(Selection::All).await;
//! ```

pub mod config;
pub mod emit;
pub mod presence;
pub mod report;
pub mod sync;

pub use config::SyncConfig;
pub use presence::{PresenceReport, PresenceTask};
pub use report::{CollectionOutcome, Failure, Outcome, RunReport, Stage, SyncSummary};
pub use sync::{PlayersPass, Selection, Syncer};
