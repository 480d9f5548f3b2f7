use chrono::{DateTime, Utc};
use serde_json::json;

use crate::board::{AppliedMutation, BoardSnapshot};
use crate::types::{Application, ApplicationId, Patch, PatchKind, Stage, SyncStatus};

/// Pure projector helpers that transform applied mutations into patches.
pub struct Projector;

impl Projector {
    /// Builds the patch describing an applied mutation.
    ///
    /// A wholesale replacement is described by the snapshot taken after it, so
    /// callers pass that snapshot along.
    pub fn applied(
        version: u64,
        at: DateTime<Utc>,
        applied: &AppliedMutation,
        snapshot: impl FnOnce() -> BoardSnapshot,
    ) -> Patch {
        match applied {
            AppliedMutation::Reordered { stage, order } => {
                Self::column_reordered(version, at, *stage, order)
            }
            AppliedMutation::Moved {
                id,
                from,
                to,
                index,
            } => Self::application_moved(version, at, id, *from, *to, *index),
            AppliedMutation::Inserted { application, stage } => {
                Self::application_added(version, at, application, *stage)
            }
            AppliedMutation::Updated {
                application,
                previous_stage,
                stage,
            } => Self::application_updated(version, at, application, *previous_stage, *stage),
            AppliedMutation::Removed { id, stage } => {
                Self::application_removed(version, at, id, *stage)
            }
            AppliedMutation::Replaced(_) => Self::board_replace(version, at, &snapshot()),
        }
    }

    /// Builds a `column.reordered` patch carrying the full new order.
    pub fn column_reordered(
        version: u64,
        at: DateTime<Utc>,
        stage: Stage,
        order: &[ApplicationId],
    ) -> Patch {
        Patch {
            version,
            kind: PatchKind::ColumnReordered,
            at,
            data: json!({
                "stage": stage,
                "order": order,
            }),
        }
    }

    /// Builds an `application.moved` patch.
    pub fn application_moved(
        version: u64,
        at: DateTime<Utc>,
        id: &ApplicationId,
        from: Stage,
        to: Stage,
        index: usize,
    ) -> Patch {
        Patch {
            version,
            kind: PatchKind::ApplicationMoved,
            at,
            data: json!({
                "id": id,
                "from": from,
                "to": to,
                "index": index,
            }),
        }
    }

    /// Builds an `application.added` patch embedding the record.
    pub fn application_added(
        version: u64,
        at: DateTime<Utc>,
        application: &Application,
        stage: Option<Stage>,
    ) -> Patch {
        Patch {
            version,
            kind: PatchKind::ApplicationAdded,
            at,
            data: json!({
                "application": application,
                "stage": stage,
            }),
        }
    }

    /// Builds an `application.updated` patch.
    pub fn application_updated(
        version: u64,
        at: DateTime<Utc>,
        application: &Application,
        previous_stage: Option<Stage>,
        stage: Option<Stage>,
    ) -> Patch {
        Patch {
            version,
            kind: PatchKind::ApplicationUpdated,
            at,
            data: json!({
                "application": application,
                "previous_stage": previous_stage,
                "stage": stage,
            }),
        }
    }

    /// Builds an `application.removed` patch.
    pub fn application_removed(
        version: u64,
        at: DateTime<Utc>,
        id: &ApplicationId,
        stage: Option<Stage>,
    ) -> Patch {
        Patch {
            version,
            kind: PatchKind::ApplicationRemoved,
            at,
            data: json!({
                "id": id,
                "stage": stage,
            }),
        }
    }

    /// Builds a `board.replace` patch with the provided snapshot.
    pub fn board_replace(version: u64, at: DateTime<Utc>, snapshot: &BoardSnapshot) -> Patch {
        Patch {
            version,
            kind: PatchKind::BoardReplace,
            at,
            data: json!({ "board": snapshot }),
        }
    }

    /// Builds a `sync.status` patch carrying the current flags.
    pub fn sync_status(version: u64, at: DateTime<Utc>, status: &SyncStatus) -> Patch {
        Patch {
            version,
            kind: PatchKind::SyncStatus,
            at,
            data: json!({ "status": status }),
        }
    }
}
