//! Durable session snapshots.
//!
//! One snapshot per store, under one key, replaced wholesale on every save:
//! - `snapshot`: the stored JSON shape and conversion to and from a session
//! - `migration`: one-time upgrade of linear legacy histories
//! - `compress`: lossy, size-bounded re-encoding of stored images
//! - `persister`: save/load orchestration, the guard window and the
//!   storage-full state machine

pub mod compress;
pub mod migration;
pub mod persister;
pub mod snapshot;

pub use compress::{compress_for_storage, CompressionSettings};
pub use migration::{fill_missing_parents, migrate_linear_history, needs_migration};
pub use persister::{
    GuardConfig, LoadOutcome, SaveGuard, SaveOutcome, SessionPersister, SkipReason,
};
pub use snapshot::{SessionSnapshot, SnapshotShapeError};
