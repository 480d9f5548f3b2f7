use thiserror::Error;

use crate::types::{ApplicationId, Stage};

/// Errors produced by board operations. None of them leave the board modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error(
        "reorder of {stage} rejected: expected a permutation of {expected} items, got {received}"
    )]
    InvalidPermutation {
        stage: Stage,
        expected: usize,
        received: usize,
    },
    #[error("application {id} has unknown stage '{stage}'")]
    UnknownStage { id: ApplicationId, stage: String },
}
