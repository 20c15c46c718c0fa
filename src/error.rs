//! Unified error types for folder backends and reconciliation
//!
//! Errors are serializable so embedding applications can forward them to a
//! frontend or log sink as structured data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::folder::Uid;

/// Error type shared by the capability contract and the reconciliation run.
///
/// A failed placement of a placeholder message is *not* represented here:
/// `write_message` signals it by returning the input UID unchanged, and the
/// promotion pass treats that as an accepted outcome.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A snapshot read was attempted before `refresh_message_list`.
    #[error("Folder not prepared: {0}")]
    FolderNotPrepared(String),

    #[error("Message not found: {0}")]
    MessageNotFound(Uid),

    /// The backend cannot honor this operation at all (e.g. a read-only
    /// store asked to persist a UID validity marker).
    #[error("Operation not supported by backend: {0}")]
    NotSupported(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;
