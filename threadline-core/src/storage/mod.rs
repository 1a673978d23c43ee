//! Storage - Backend Trait and Implementations
//!
//! TigerStyle: One contract, a volatile and a durable implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Storage Trait                         │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                              ↑
//!          │                              │
//! ┌────────┴────────┐           ┌────────┴────────┐
//! │  MemoryStorage  │           │ PostgresStorage │
//! │ (tests, dev)    │           │  (production)   │
//! └─────────────────┘           └─────────────────┘
//! ```
//!
//! # Comment Closure
//!
//! Every comment owns a level-0 self-edge. A reply copies each edge that
//! ends at its parent one level down, so `ancestors` and `descendants`
//! are single lookups rather than recursive walks.

mod backend;
mod entity;
mod error;
mod memory;

#[cfg(feature = "postgres")]
mod postgres;

pub use backend::{PageRequest, Storage};
pub use entity::{ClosureEdge, Comment, NewComment, NewPost, Post};
pub use error::{ErrorKind, StorageError, StorageResult};
pub use memory::MemoryStorage;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;
