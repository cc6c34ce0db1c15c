//! `bugtrack-core` - storage-free bug model for bugtrack.
//!
//! Holds the types every layer shares: the bug entity and its canonical
//! states, provider and service keys, partial updates, the tagged error
//! type, and JSONL feed I/O.
//!
//! # Quick Start
//!
//! ```
//! use bugtrack_core::{BugState, BugUpdate, NewBug, Provider, state_from_status};
//!
//! assert_eq!(state_from_status("fixed", "issuetracker").unwrap(), BugState::Resolved);
//!
//! let mut bug = NewBug { title: "Crash on save".into(), ..Default::default() }
//!     .into_bug(Provider::Datastore);
//! let update = BugUpdate { status: Some("resolved".into()), ..Default::default() };
//! assert!(update.apply_to(&mut bug));
//! assert_eq!(bug.state, BugState::Resolved);
//! ```

pub mod error;
pub mod jsonl;
pub mod model;
pub mod query;
pub mod util;

pub use error::{BugError, ErrorKind, Result, ValidationError};
pub use model::{Bug, BugState, Provider, Service, TestCycle, UrlBugMap, state_from_status};
pub use query::{BugFilters, BugUpdate, NewBug};
