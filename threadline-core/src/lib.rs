//! Threadline Core - Posts, Threaded Comments, Live Notifications
//!
//! TigerStyle: explicit types, injectable time and cancellation, every
//! failure a typed value.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     DiscussionService                        │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │  Storage (trait)             │  Notifier (trait)            │
//! │  ├─ MemoryStorage            │  └─ TopicNotifier            │
//! │  └─ PostgresStorage          │     topic = post id          │
//! │     posts / comments /       │     one stream per           │
//! │     structure_tree (closure) │     subscription             │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │  Clock  │  OpContext (cancellation + deadline)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use threadline_core::{MemoryStorage, NewComment, NewPost, OpContext, Storage};
//!
//! # tokio_test::block_on(async {
//! let storage = MemoryStorage::new();
//! let cx = OpContext::background();
//!
//! let post = storage
//!     .create_post(&cx, NewPost::new("Test", "Hello", uuid::Uuid::new_v4()))
//!     .await
//!     .unwrap();
//! let root = storage
//!     .create_comment(&cx, NewComment::root(post.id, "first", uuid::Uuid::new_v4()))
//!     .await
//!     .unwrap();
//!
//! let page = storage.list_root_comments(&cx, post.id, 1, 10).await.unwrap();
//! assert_eq!(page[0].id, root.id);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod constants;
pub mod context;
pub mod notify;
pub mod service;
pub mod storage;

// Re-export common types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, StorageConfig, StorageKind};
pub use constants::*;
pub use context::OpContext;
pub use notify::{NotifyError, NotifyResult, Notifier, Subscription, TopicNotifier};
pub use service::{CommentEvent, DiscussionService, PostPatch, ServiceError, ServiceResult};
pub use storage::{
    ClosureEdge, Comment, ErrorKind, MemoryStorage, NewComment, NewPost, PageRequest, Post,
    Storage, StorageError, StorageResult,
};

#[cfg(feature = "postgres")]
pub use storage::PostgresStorage;
