use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::BoardError;
use crate::types::{ApplicationId, Stage, STAGE_COUNT};

/// Ordered identifier lists, one per stage, indexed by [`Stage::index`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagePartition {
    columns: [Vec<ApplicationId>; STAGE_COUNT],
}

impl StagePartition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ordered identifiers of a column.
    pub fn column(&self, stage: Stage) -> &[ApplicationId] {
        &self.columns[stage.index()]
    }

    /// Iterates columns in board order.
    pub fn columns(&self) -> impl Iterator<Item = (Stage, &[ApplicationId])> {
        Stage::ALL
            .into_iter()
            .map(move |stage| (stage, self.column(stage)))
    }

    /// Finds the column holding `id` with a linear scan over the five lists.
    pub fn stage_of(&self, id: &ApplicationId) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| self.column(*stage).contains(id))
    }

    pub fn position(&self, stage: Stage, id: &ApplicationId) -> Option<usize> {
        self.column(stage).iter().position(|candidate| candidate == id)
    }

    pub fn contains(&self, id: &ApplicationId) -> bool {
        self.stage_of(id).is_some()
    }

    /// Total number of placed identifiers.
    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }

    /// Replaces the order of a column.
    ///
    /// `new_order` must be a permutation of the current column; anything else is
    /// rejected with [`BoardError::InvalidPermutation`] and the column is left as is.
    pub fn reorder(
        &mut self,
        stage: Stage,
        new_order: Vec<ApplicationId>,
    ) -> Result<(), BoardError> {
        let current = &self.columns[stage.index()];
        if !is_permutation(current, &new_order) {
            return Err(BoardError::InvalidPermutation {
                stage,
                expected: current.len(),
                received: new_order.len(),
            });
        }
        self.columns[stage.index()] = new_order;
        Ok(())
    }

    /// Appends `id` to the end of a column and returns its index.
    pub(crate) fn append(&mut self, stage: Stage, id: ApplicationId) -> usize {
        let column = &mut self.columns[stage.index()];
        column.push(id);
        column.len() - 1
    }

    /// Removes `id` from one column. Returns `false` when it was not there.
    pub(crate) fn remove_from(&mut self, stage: Stage, id: &ApplicationId) -> bool {
        let column = &mut self.columns[stage.index()];
        match column.iter().position(|candidate| candidate == id) {
            Some(index) => {
                column.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes `id` from whichever column holds it.
    pub(crate) fn detach(&mut self, id: &ApplicationId) -> Option<(Stage, usize)> {
        let stage = self.stage_of(id)?;
        let index = self.position(stage, id)?;
        self.columns[stage.index()].remove(index);
        Some((stage, index))
    }
}

impl Serialize for StagePartition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(STAGE_COUNT))?;
        for (stage, ids) in self.columns() {
            map.serialize_entry(stage.as_str(), ids)?;
        }
        map.end()
    }
}

fn is_permutation(current: &[ApplicationId], proposed: &[ApplicationId]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let mut left: Vec<&ApplicationId> = current.iter().collect();
    let mut right: Vec<&ApplicationId> = proposed.iter().collect();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}
