//! Capability contract for message folders
//!
//! Every backend that wants to take part in reconciliation implements
//! [`Folder`]. The contract deliberately says nothing about transport or
//! storage: an implementation may be an IMAP mailbox, a maildir, a local
//! cache table. All I/O-shaped methods are async because real backends block
//! on the network or on disk; the reconciliation core awaits them strictly
//! in sequence.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flag::Flags;

/// Message identifier within one folder.
///
/// Positive values are stable UIDs, unique within their folder and assigned
/// by a backend authorized to mint them. Negative values are placeholders
/// for messages no backend knows yet; they exist only on the source side of
/// a run and must never be compared across folders.
pub type Uid = i64;

/// Per-message metadata as carried in a folder's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub uid: Uid,
    pub flags: Flags,
}

/// The contract every message store implements.
///
/// A folder owns one in-memory snapshot of its message list, created by
/// [`refresh_message_list`](Folder::refresh_message_list) and replaced only
/// by the next refresh. Write calls issued through this contract may keep
/// the snapshot in step with the store, but nothing re-reads backend state
/// behind the caller's back.
#[async_trait]
pub trait Folder: Send + Sync {
    /// The folder's own name, without its root prefix.
    fn name(&self) -> &str;

    /// The root this folder hangs off, backend-specific (e.g. a namespace
    /// prefix or a filesystem directory). `None` for top-level folders.
    fn root(&self) -> Option<&str>;

    /// The hierarchy separator used between root and name.
    fn separator(&self) -> &str;

    /// Full hierarchical address: `root + separator + name` when a root
    /// exists, otherwise just the name.
    fn full_address(&self) -> String {
        match self.root() {
            Some(root) => format!("{}{}{}", root, self.separator(), self.name()),
            None => self.name().to_string(),
        }
    }

    /// Whether this folder's UID space can be safely compared against
    /// `other`'s, i.e. neither side has reset its UID assignment since the
    /// validity markers were last persisted.
    async fn is_uid_space_compatible(&self, other: &dyn Folder) -> Result<bool>;

    /// The current UID validity marker, if one has been persisted. The
    /// encoding is opaque to the reconciliation core.
    async fn uid_validity(&self) -> Result<Option<String>>;

    /// Persists a new UID validity marker.
    async fn persist_uid_validity(&self, value: &str) -> Result<()>;

    /// (Re)loads the message list snapshot from the backing store. Must be
    /// called at least once before
    /// [`cached_message_list`](Folder::cached_message_list); calling it
    /// again replaces the prior snapshot wholesale.
    async fn refresh_message_list(&self) -> Result<()>;

    /// The current snapshot, keyed by UID. Fails with
    /// [`Error::FolderNotPrepared`](crate::Error::FolderNotPrepared) if no
    /// refresh has happened yet.
    fn cached_message_list(&self) -> Result<BTreeMap<Uid, Envelope>>;

    /// The raw content of the message stored under `uid`.
    async fn read_message(&self, uid: Uid) -> Result<Vec<u8>>;

    /// Stores a message and returns the *effective* UID it lives under.
    ///
    /// With `uid < 0` the backend tries to mint a fresh stable UID. On
    /// success the message is stored and the new positive UID returned. A
    /// backend that cannot (or will not) mint returns the `uid` it was
    /// given *without storing anything* — a defined soft failure, not an
    /// error.
    ///
    /// With `uid > 0` the backend stores under exactly that UID when it
    /// can; when it cannot preserve it, it stores under a UID of its own
    /// choosing and returns that one instead.
    async fn write_message(&self, uid: Uid, content: &[u8], flags: &Flags) -> Result<Uid>;

    /// The current flag set of the message stored under `uid`.
    async fn read_flags(&self, uid: Uid) -> Result<Flags>;

    /// Replaces the message's flag set; stored canonicalized.
    async fn write_flags(&self, uid: Uid, flags: &Flags) -> Result<()>;

    /// Adds `flags` to the message's flag set, skipping flags already
    /// present. Composed of a read and a write; a concurrent external flag
    /// change between the two is neither detected nor prevented.
    async fn add_flags(&self, uid: Uid, flags: &Flags) -> Result<()> {
        let mut current = self.read_flags(uid).await?;
        current.union_with(flags);
        self.write_flags(uid, &current).await
    }

    /// Removes each of `flags` from the message's flag set, skipping flags
    /// already absent. Same composed read/write pattern as
    /// [`add_flags`](Folder::add_flags).
    async fn remove_flags(&self, uid: Uid, flags: &Flags) -> Result<()> {
        let mut current = self.read_flags(uid).await?;
        current.remove_all(flags);
        self.write_flags(uid, &current).await
    }

    /// Deletes the message stored under `uid`. Backends may treat a missing
    /// UID as a no-op.
    async fn delete_message(&self, uid: Uid) -> Result<()>;
}
