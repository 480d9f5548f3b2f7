//! Domain layer for the job application board.
//!
//! The board keeps application records and their per-stage column order in
//! step; the engine turns drag gestures into board mutations and the projector
//! describes applied mutations as patches for subscribers.

pub mod board;
pub mod demo;
pub mod engine;
pub mod error;
pub mod partition;
pub mod projector;
pub mod stats;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use board::{AppliedMutation, Board, BoardMutation, BoardSnapshot, ReplaceReport};
pub use engine::{array_move, resolve_drag, DragEnd, DropTarget};
pub use error::BoardError;
pub use partition::StagePartition;
pub use store::EntityStore;
pub use types::{
    Application, ApplicationId, ApplicationStage, NewApplication, Patch, PatchKind, Stage,
    SyncStatus,
};
