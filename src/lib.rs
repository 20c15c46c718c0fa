//! Mail folder reconciliation engine
//!
//! Converges the contents, identifiers and flag sets of independently-stored
//! message folders, tolerating backends that cannot mint stable UIDs.
//!
//! ## Module Organization
//!
//! - `error`: Unified error type for contract and reconciliation failures
//! - `flag`: Canonical flag sets with union/difference operations
//! - `folder`: The capability contract every backend implements, plus an
//!   in-memory reference backend
//! - `sync`: The four-pass reconciliation algorithm
//!
//! Concrete stores (IMAP sessions, maildirs, local caches) live outside this
//! crate; they participate by implementing [`Folder`]. The core never opens a
//! connection or touches disk itself.

pub mod error;
pub mod flag;
pub mod folder;
pub mod sync;

pub use error::{Error, Result};
pub use flag::Flags;
pub use folder::memory::MemoryFolder;
pub use folder::{Envelope, Folder, Uid};
pub use sync::{reconcile, ReconcileReport};
