//! # Climb Log
//!
//! A local-first store for climbing gym sessions: start a timed session at a
//! gym, log climb attempts against it, and review historical summaries.
//!
//! ## Core Concepts
//!
//! - **Sessions**: One continuous gym visit, at most one active at a time
//! - **Entries**: Logged attempts with grade, result, and attempt count
//! - **Recent gyms**: Bounded recency-ranked visit tracking
//! - **Persistence**: Best-effort durable writes behind a key-value adapter
//!
//! ## Example
//!
//! ```ignore
//! use climblog::{ClimbStore, ClimbResult, DiskStorage, EntryInput};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(DiskStorage::open("./climblog")?);
//! let store = ClimbStore::new(storage);
//! store.load();
//!
//! store.start_session("gym-1", None);
//! store.add_entry(EntryInput::new("V4", ClimbResult::Conquer, 2));
//! let completed = store.end_session();
//! ```

pub mod catalog;
pub mod error;
pub mod grades;
pub mod persist;
pub mod storage;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use catalog::GymCatalog;
pub use error::{Result, StoreError};
pub use grades::{compare_grades, format_duration, highest_grade, session_summary, V_GRADES};
pub use persist::PersistQueue;
pub use storage::{DiskStorage, KvStorage, MemoryStorage};
pub use store::{ClimbStore, StoreState};
pub use subscriptions::{SubscriptionId, SubscriptionManager};
pub use types::*;
