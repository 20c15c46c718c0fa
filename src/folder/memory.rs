//! In-memory folder backend
//!
//! Reference implementation of the capability contract backed by a plain
//! map. Used by this crate's own tests and useful to embedders that need a
//! local store without a server (staging folders, dry runs).
//!
//! Whether the folder may mint stable UIDs is configurable, so it can stand
//! in for both an authoritative server folder and a non-minting local one.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::flag::Flags;
use crate::folder::{Envelope, Folder, Uid};

#[derive(Debug, Clone)]
struct StoredMessage {
    content: Vec<u8>,
    flags: Flags,
}

#[derive(Debug, Default)]
struct State {
    messages: BTreeMap<Uid, StoredMessage>,
    /// Snapshot as of the last refresh; `None` until the first one.
    snapshot: Option<BTreeMap<Uid, Envelope>>,
    next_uid: Uid,
    uid_validity: Option<String>,
}

/// A folder whose message store lives entirely in memory.
pub struct MemoryFolder {
    name: String,
    root: Option<String>,
    separator: String,
    assigns_uids: bool,
    state: Mutex<State>,
}

impl MemoryFolder {
    /// Creates an empty folder that mints UIDs starting at 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
            separator: "/".to_string(),
            assigns_uids: true,
            state: Mutex::new(State {
                next_uid: 1,
                ..State::default()
            }),
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Controls whether this folder may mint new stable UIDs. A non-minting
    /// folder answers a negative-UID write with the soft failure signal.
    pub fn assigns_uids(mut self, assigns: bool) -> Self {
        self.assigns_uids = assigns;
        self
    }

    pub fn with_uid_validity(self, value: impl Into<String>) -> Self {
        self.lock().uid_validity = Some(value.into());
        self
    }

    /// Seeds a message directly into the store, bypassing the contract.
    /// Intended for test setup; does not touch the snapshot.
    pub fn insert(&self, uid: Uid, content: impl Into<Vec<u8>>, flags: Flags) {
        let mut state = self.lock();
        state.messages.insert(
            uid,
            StoredMessage {
                content: content.into(),
                flags,
            },
        );
        if uid >= state.next_uid {
            state.next_uid = uid + 1;
        }
    }

    /// Whether a message is currently stored under `uid`.
    pub fn contains(&self, uid: Uid) -> bool {
        self.lock().messages.contains_key(&uid)
    }

    /// Content and flags of the message stored under `uid`, if any.
    pub fn message(&self, uid: Uid) -> Option<(Vec<u8>, Flags)> {
        self.lock()
            .messages
            .get(&uid)
            .map(|m| (m.content.clone(), m.flags.clone()))
    }

    /// All UIDs currently in the store, in ascending order.
    pub fn uids(&self) -> Vec<Uid> {
        self.lock().messages.keys().copied().collect()
    }

    // A poisoned lock only means another test thread panicked mid-write;
    // the map itself is still usable.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Folder for MemoryFolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    fn separator(&self) -> &str {
        &self.separator
    }

    async fn is_uid_space_compatible(&self, other: &dyn Folder) -> Result<bool> {
        let ours = self.lock().uid_validity.clone();
        let theirs = other.uid_validity().await?;
        // Two folders that never persisted a marker have nothing to compare.
        Ok(match (ours, theirs) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        })
    }

    async fn uid_validity(&self) -> Result<Option<String>> {
        Ok(self.lock().uid_validity.clone())
    }

    async fn persist_uid_validity(&self, value: &str) -> Result<()> {
        self.lock().uid_validity = Some(value.to_string());
        Ok(())
    }

    async fn refresh_message_list(&self) -> Result<()> {
        let mut state = self.lock();
        let snapshot = state
            .messages
            .iter()
            .map(|(&uid, msg)| {
                (
                    uid,
                    Envelope {
                        uid,
                        flags: msg.flags.clone(),
                    },
                )
            })
            .collect();
        state.snapshot = Some(snapshot);
        Ok(())
    }

    fn cached_message_list(&self) -> Result<BTreeMap<Uid, Envelope>> {
        self.lock()
            .snapshot
            .clone()
            .ok_or_else(|| Error::FolderNotPrepared(self.name.clone()))
    }

    async fn read_message(&self, uid: Uid) -> Result<Vec<u8>> {
        self.lock()
            .messages
            .get(&uid)
            .map(|m| m.content.clone())
            .ok_or(Error::MessageNotFound(uid))
    }

    async fn write_message(&self, uid: Uid, content: &[u8], flags: &Flags) -> Result<Uid> {
        let mut state = self.lock();

        let effective = if uid < 0 {
            if !self.assigns_uids {
                // Soft failure: hand the placeholder back, store nothing.
                return Ok(uid);
            }
            let minted = state.next_uid;
            state.next_uid += 1;
            minted
        } else {
            // A map has no collisions it cannot accept, so the requested
            // UID is always preserved.
            if uid >= state.next_uid {
                state.next_uid = uid + 1;
            }
            uid
        };

        state.messages.insert(
            effective,
            StoredMessage {
                content: content.to_vec(),
                flags: flags.clone(),
            },
        );
        if let Some(snapshot) = state.snapshot.as_mut() {
            snapshot.insert(
                effective,
                Envelope {
                    uid: effective,
                    flags: flags.clone(),
                },
            );
        }
        Ok(effective)
    }

    async fn read_flags(&self, uid: Uid) -> Result<Flags> {
        self.lock()
            .messages
            .get(&uid)
            .map(|m| m.flags.clone())
            .ok_or(Error::MessageNotFound(uid))
    }

    async fn write_flags(&self, uid: Uid, flags: &Flags) -> Result<()> {
        let mut state = self.lock();
        match state.messages.get_mut(&uid) {
            Some(msg) => msg.flags = flags.clone(),
            None => return Err(Error::MessageNotFound(uid)),
        }
        if let Some(env) = state.snapshot.as_mut().and_then(|s| s.get_mut(&uid)) {
            env.flags = flags.clone();
        }
        Ok(())
    }

    async fn delete_message(&self, uid: Uid) -> Result<()> {
        let mut state = self.lock();
        // Deleting an absent UID is a no-op, per the contract.
        state.messages.remove(&uid);
        if let Some(snapshot) = state.snapshot.as_mut() {
            snapshot.remove(&uid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_list_before_refresh_fails() {
        let folder = MemoryFolder::new("INBOX");
        assert!(matches!(
            folder.cached_message_list(),
            Err(Error::FolderNotPrepared(name)) if name == "INBOX"
        ));
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let folder = MemoryFolder::new("INBOX");
        folder.insert(1, b"one".to_vec(), Flags::new());
        folder.refresh_message_list().await.unwrap();
        assert_eq!(folder.cached_message_list().unwrap().len(), 1);

        folder.insert(2, b"two".to_vec(), Flags::new());
        folder.refresh_message_list().await.unwrap();
        let snapshot = folder.cached_message_list().unwrap();
        assert!(snapshot.contains_key(&1) && snapshot.contains_key(&2));
    }

    #[tokio::test]
    async fn test_mint_assigns_fresh_uid() {
        let folder = MemoryFolder::new("INBOX");
        folder.insert(41, b"m".to_vec(), Flags::new());
        let uid = folder
            .write_message(-3, b"new", &Flags::new())
            .await
            .unwrap();
        assert_eq!(uid, 42);
        assert!(folder.contains(42));
        assert!(!folder.contains(-3));
    }

    #[tokio::test]
    async fn test_non_minting_folder_soft_fails() {
        let folder = MemoryFolder::new("local").assigns_uids(false);
        let uid = folder
            .write_message(-7, b"new", &Flags::new())
            .await
            .unwrap();
        assert_eq!(uid, -7);
        assert!(folder.uids().is_empty());
    }

    #[tokio::test]
    async fn test_positive_uid_is_preserved() {
        let folder = MemoryFolder::new("local").assigns_uids(false);
        let uid = folder
            .write_message(9, b"m", &Flags::new())
            .await
            .unwrap();
        assert_eq!(uid, 9);
        assert_eq!(folder.message(9).unwrap().0, b"m".to_vec());
    }

    #[tokio::test]
    async fn test_add_and_remove_flags_compose() {
        let folder = MemoryFolder::new("INBOX");
        folder.insert(5, b"m".to_vec(), ["Seen"].into_iter().collect());

        folder
            .add_flags(5, &["Answered", "Seen"].into_iter().collect())
            .await
            .unwrap();
        assert_eq!(
            folder.read_flags(5).await.unwrap(),
            ["Answered", "Seen"].into_iter().collect()
        );

        folder
            .remove_flags(5, &["Seen", "Draft"].into_iter().collect())
            .await
            .unwrap();
        assert_eq!(
            folder.read_flags(5).await.unwrap(),
            ["Answered"].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn test_delete_absent_uid_is_noop() {
        let folder = MemoryFolder::new("INBOX");
        folder.delete_message(99).await.unwrap();
    }

    #[tokio::test]
    async fn test_uid_space_compatibility() {
        let a = MemoryFolder::new("a").with_uid_validity("1000");
        let b = MemoryFolder::new("b").with_uid_validity("1000");
        let c = MemoryFolder::new("c").with_uid_validity("2000");
        let fresh = MemoryFolder::new("fresh");

        assert!(a.is_uid_space_compatible(&b).await.unwrap());
        assert!(!a.is_uid_space_compatible(&c).await.unwrap());
        assert!(a.is_uid_space_compatible(&fresh).await.unwrap());
    }
}
