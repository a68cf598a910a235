//! Change broadcasting: the in-process pub/sub hub, alert-rule evaluation,
//! and the realtime sync that polls for recent changes.

use themeradar_db::DbError;
use thiserror::Error;

mod alerts;
mod hub;
mod sync;

pub use alerts::{rule_matches, ChangeKind, ThemeChange};
pub use hub::{BroadcastEvent, BroadcastHub, EventKind};
pub use sync::{run_realtime_sync, SyncReport};

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error(transparent)]
    Db(#[from] DbError),
}
