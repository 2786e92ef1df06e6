//! DragonArt-State: durable snapshot storage for DragonArt sessions
//!
//! The editor keeps exactly one session snapshot under a well-known key in a
//! size-constrained store. This crate defines that store's contract and ships
//! two backends.
//!
//! ## Key Components
//!
//! - `KvStore`: async get/set/delete by key with a hard byte capacity
//! - `StorageError`: distinguishes capacity exhaustion from other failures
//! - `FsKvStore`: filesystem backend with atomic replace-on-write
//! - `MemoryKvStore`: in-memory fake for tests

mod error;
pub mod fakes;
mod fs;
pub mod storage_traits;

pub use error::StorageError;
pub use fakes::MemoryKvStore;
pub use fs::FsKvStore;
pub use storage_traits::{KvStore, StorageResult, SESSION_KEY};
