//! Four-pass folder reconciliation
//!
//! Converges one source folder against a destination (and optionally
//! further write targets) in four strictly ordered passes:
//!
//! 1. Placeholder promotion: messages the source holds under negative UIDs
//!    are offered to the targets until one mints a stable UID, then fanned
//!    out everywhere under it
//! 2. Existence propagation: messages present in the source but not the
//!    destination are uploaded to every target
//! 3. Deletion propagation: messages gone from the source are deleted from
//!    every target
//! 4. Flag reconciliation: per-message flag differences are applied to
//!    every target with additive add/remove operations
//!
//! Execution is fully sequential; there are no locks, no retries and no
//! rollback. Ordering alone bounds the damage of an interruption (the
//! source is always mutated last during promotion), and a repeated run
//! converges whatever a failed run left behind.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::flag::Flags;
use crate::folder::{Folder, Uid};

/// What one reconciliation run changed.
///
/// A second run straight after a completed one, with no external mutation
/// in between, reports all counters at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Placeholder messages promoted to a stable UID.
    pub promoted: u32,
    /// Placeholder messages no target would accept; left at the source.
    pub unplaced: u32,
    /// Messages uploaded to targets because the destination lacked them.
    pub uploaded: u32,
    /// Messages deleted from targets because the source no longer has them.
    pub deleted: u32,
    /// Messages whose flag set was adjusted on the targets.
    pub flag_updates: u32,
}

impl ReconcileReport {
    /// True when the run observed both sides already converged.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Reconciles `source` against `destination`, writing to every folder in
/// `targets` (defaults to `[destination]` when `None`).
///
/// The source is authoritative for existence and flags; the targets are
/// authoritative for UID assignment. `destination` must be a member of
/// `targets`, otherwise passes 2-4 would compare against state that was
/// never written to; that misconfiguration is rejected up front.
///
/// Each involved folder's message list is refreshed once before the first
/// pass; no pass forces a refresh mid-run. A folder mutated by anything
/// else between that refresh and the end of the run yields stale
/// comparisons, which the next run converges.
pub async fn reconcile(
    source: &dyn Folder,
    destination: &dyn Folder,
    targets: Option<&[&dyn Folder]>,
) -> Result<ReconcileReport> {
    let default_targets = [destination];
    let targets = targets.unwrap_or(&default_targets);

    if !targets.iter().any(|t| same_folder(*t, destination)) {
        return Err(Error::Config(format!(
            "destination folder {} is not in the write-target list",
            destination.full_address()
        )));
    }

    source.refresh_message_list().await?;
    for target in targets {
        target.refresh_message_list().await?;
    }

    let mut report = ReconcileReport::default();
    promote_placeholders(source, targets, &mut report).await?;
    propagate_additions(source, destination, targets, &mut report).await?;
    propagate_deletions(source, destination, targets, &mut report).await?;
    reconcile_flags(source, destination, targets, &mut report).await?;

    info!(
        source = %source.full_address(),
        destination = %destination.full_address(),
        promoted = report.promoted,
        unplaced = report.unplaced,
        uploaded = report.uploaded,
        deleted = report.deleted,
        flag_updates = report.flag_updates,
        "Reconcile complete"
    );
    Ok(report)
}

/// Pass 1: resolve placeholder UIDs into backend-assigned stable UIDs.
///
/// Each placeholder is offered to the targets in list order; the first
/// target returning a positive UID wins and fixes the UID for everyone
/// else. The source is rewritten last, after all targets hold the message,
/// so an interruption never leaves the source referencing a UID no target
/// has accepted. A placeholder no target accepts stays put; that is an
/// expected outcome, not a fault.
async fn promote_placeholders(
    source: &dyn Folder,
    targets: &[&dyn Folder],
    report: &mut ReconcileReport,
) -> Result<()> {
    let snapshot = source.cached_message_list()?;

    for &uid in snapshot.keys().filter(|&&uid| uid < 0) {
        let content = source.read_message(uid).await?;
        let flags = source.read_flags(uid).await?;

        let mut winner: Option<(&dyn Folder, Uid)> = None;
        for target in targets {
            let assigned = target.write_message(uid, &content, &flags).await?;
            if assigned > 0 {
                winner = Some((*target, assigned));
                break;
            }
        }

        let (winner_folder, new_uid) = match winner {
            Some(win) => win,
            None => {
                warn!(
                    source = %source.full_address(),
                    uid,
                    "No target accepted placeholder message; leaving it at the source"
                );
                report.unplaced += 1;
                continue;
            }
        };

        debug!(
            winner = %winner_folder.full_address(),
            uid,
            new_uid,
            "Placeholder promoted"
        );

        for target in targets {
            if !same_folder(*target, winner_folder) {
                target.write_message(new_uid, &content, &flags).await?;
            }
        }
        source.write_message(new_uid, &content, &flags).await?;
        source.delete_message(uid).await?;
        report.promoted += 1;
    }

    Ok(())
}

/// Pass 2: upload messages the destination lacks.
///
/// Creation and flagging are two distinct calls per target. An interruption
/// between them leaves the message flagless there until the flag pass of a
/// later run repairs it.
async fn propagate_additions(
    source: &dyn Folder,
    destination: &dyn Folder,
    targets: &[&dyn Folder],
    report: &mut ReconcileReport,
) -> Result<()> {
    let source_list = source.cached_message_list()?;
    let destination_list = destination.cached_message_list()?;

    for &uid in source_list.keys().filter(|&&uid| uid >= 0) {
        if destination_list.contains_key(&uid) {
            continue;
        }
        let content = source.read_message(uid).await?;
        let flags = source.read_flags(uid).await?;

        debug!(uid, destination = %destination.full_address(), "Uploading missing message");
        for target in targets {
            target.write_message(uid, &content, &Flags::new()).await?;
            target.write_flags(uid, &flags).await?;
        }
        report.uploaded += 1;
    }

    Ok(())
}

/// Pass 3: delete messages the source no longer has. The source is
/// authoritative for existence; anything missing from it is removed from
/// every target.
async fn propagate_deletions(
    source: &dyn Folder,
    destination: &dyn Folder,
    targets: &[&dyn Folder],
    report: &mut ReconcileReport,
) -> Result<()> {
    let source_list = source.cached_message_list()?;
    let destination_list = destination.cached_message_list()?;

    for &uid in destination_list.keys() {
        if source_list.contains_key(&uid) {
            continue;
        }
        debug!(uid, "Deleting message absent from source");
        for target in targets {
            target.delete_message(uid).await?;
        }
        report.deleted += 1;
    }

    Ok(())
}

/// Pass 4: make every target's flag sets match the source's, using additive
/// add/remove operations rather than whole-set replacement so that the two
/// directions of drift are corrected independently.
async fn reconcile_flags(
    source: &dyn Folder,
    destination: &dyn Folder,
    targets: &[&dyn Folder],
    report: &mut ReconcileReport,
) -> Result<()> {
    let source_list = source.cached_message_list()?;

    for &uid in source_list.keys().filter(|&&uid| uid >= 0) {
        let source_flags = source.read_flags(uid).await?;
        let destination_flags = destination.read_flags(uid).await?;

        let missing = source_flags.difference(&destination_flags);
        let extra = destination_flags.difference(&source_flags);
        if missing.is_empty() && extra.is_empty() {
            continue;
        }

        debug!(uid, add = %missing, remove = %extra, "Adjusting flags");
        if !missing.is_empty() {
            for target in targets {
                target.add_flags(uid, &missing).await?;
            }
        }
        if !extra.is_empty() {
            for target in targets {
                target.remove_flags(uid, &extra).await?;
            }
        }
        report.flag_updates += 1;
    }

    Ok(())
}

/// Folder identity by address of the underlying object, so one folder
/// appearing twice in a target list is still recognized as itself.
fn same_folder(a: &dyn Folder, b: &dyn Folder) -> bool {
    std::ptr::eq(a as *const dyn Folder as *const (), b as *const dyn Folder as *const ())
}
