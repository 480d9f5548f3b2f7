use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::BoardError;
use crate::partition::StagePartition;
use crate::store::EntityStore;
use crate::types::{Application, ApplicationId, ApplicationStage, Stage, SyncStatus};

/// Entity store and stage partition, mutated together.
///
/// Every record with a known stage sits in exactly one column, exactly once,
/// and the column always matches the record's stage. Records with an unknown
/// stage stay in the store without being placed.
#[derive(Debug, Clone, Default)]
pub struct Board {
    store: EntityStore,
    partition: StagePartition,
}

/// A board transition computed ahead of being applied.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardMutation {
    Reorder {
        stage: Stage,
        order: Vec<ApplicationId>,
    },
    Move {
        id: ApplicationId,
        from: Stage,
        to: Stage,
    },
    Insert(Application),
    Update(Application),
    Remove(ApplicationId),
    ReplaceAll(Vec<Application>),
}

impl BoardMutation {
    /// Returns the metrics label associated with the mutation.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reorder { .. } => "reorder",
            Self::Move { .. } => "move",
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Remove(_) => "remove",
            Self::ReplaceAll(_) => "replace_all",
        }
    }
}

/// What a mutation actually changed once applied.
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedMutation {
    Reordered {
        stage: Stage,
        order: Vec<ApplicationId>,
    },
    Moved {
        id: ApplicationId,
        from: Stage,
        to: Stage,
        index: usize,
    },
    Inserted {
        application: Application,
        stage: Option<Stage>,
    },
    Updated {
        application: Application,
        previous_stage: Option<Stage>,
        stage: Option<Stage>,
    },
    Removed {
        id: ApplicationId,
        stage: Option<Stage>,
    },
    Replaced(ReplaceReport),
}

/// Outcome of rebuilding the board from a fresh record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceReport {
    pub placed: usize,
    pub unplaced: Vec<ApplicationId>,
    pub duplicates: usize,
}

/// Serializable view of the board handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    pub version: u64,
    pub columns: StagePartition,
    pub applications: BTreeMap<ApplicationId, Application>,
    pub unplaced: Vec<ApplicationId>,
    pub status: SyncStatus,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a board from an initial record set.
    pub fn from_applications(records: impl IntoIterator<Item = Application>) -> Self {
        let mut board = Self::new();
        board.replace_all(records);
        board
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn partition(&self) -> &StagePartition {
        &self.partition
    }

    pub fn get(&self, id: &ApplicationId) -> Result<&Application, BoardError> {
        self.store.get(id)
    }

    pub fn column(&self, stage: Stage) -> &[ApplicationId] {
        self.partition.column(stage)
    }

    pub fn stage_of(&self, id: &ApplicationId) -> Option<Stage> {
        self.partition.stage_of(id)
    }

    /// Identifiers held in the store but kept off the board.
    pub fn unplaced(&self) -> Vec<ApplicationId> {
        let mut ids: Vec<_> = self
            .store
            .iter()
            .filter(|record| record.stage.known().is_none())
            .map(|record| record.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Applies a mutation atomically: on error nothing has changed.
    pub fn apply(&mut self, mutation: BoardMutation) -> Result<AppliedMutation, BoardError> {
        match mutation {
            BoardMutation::Reorder { stage, order } => {
                self.reorder(stage, order.clone())?;
                Ok(AppliedMutation::Reordered { stage, order })
            }
            BoardMutation::Move { id, from, to } => {
                let index = self.move_to(&id, from, to)?;
                Ok(AppliedMutation::Moved {
                    id,
                    from,
                    to,
                    index,
                })
            }
            BoardMutation::Insert(application) => {
                let stage = self.insert(application.clone());
                Ok(AppliedMutation::Inserted { application, stage })
            }
            BoardMutation::Update(application) => {
                let previous_stage = self.stage_of(&application.id);
                let stage = self.update(application.clone())?;
                Ok(AppliedMutation::Updated {
                    application,
                    previous_stage,
                    stage,
                })
            }
            BoardMutation::Remove(id) => {
                let stage = self.stage_of(&id);
                self.remove(&id)?;
                Ok(AppliedMutation::Removed { id, stage })
            }
            BoardMutation::ReplaceAll(records) => Ok(AppliedMutation::Replaced(
                self.replace_all(records),
            )),
        }
    }

    /// Replaces the order of one column. See [`StagePartition::reorder`].
    pub fn reorder(&mut self, stage: Stage, order: Vec<ApplicationId>) -> Result<(), BoardError> {
        self.partition.reorder(stage, order)
    }

    /// Moves an application to the end of `to` and updates its stage field.
    ///
    /// Absence from `from` is tolerated: the identifier is detached from
    /// whichever column holds it so it never ends up placed twice. Returns the
    /// index of the identifier in its new column.
    pub fn move_to(
        &mut self,
        id: &ApplicationId,
        from: Stage,
        to: Stage,
    ) -> Result<usize, BoardError> {
        let record = self
            .store
            .get_mut(id)
            .ok_or_else(|| BoardError::NotFound(id.clone()))?;
        record.stage = ApplicationStage::Known(to);

        if !self.partition.remove_from(from, id) {
            if let Some((actual, _)) = self.partition.detach(id) {
                debug!(stage = "board", application = %id, expected = %from, %actual, "move source was stale");
            }
        }
        Ok(self.partition.append(to, id.clone()))
    }

    /// Stores a record and appends it to the column of its stage.
    ///
    /// An identifier that is already present is relocated, not duplicated.
    /// Returns the column the record landed in, if any.
    pub fn insert(&mut self, application: Application) -> Option<Stage> {
        let id = application.id.clone();
        let stage = application.stage.clone();
        self.store.upsert(application);
        self.partition.detach(&id);
        self.place(&id, &stage)
    }

    /// Replaces an existing record.
    ///
    /// A record whose stage is unchanged keeps its position; otherwise it moves
    /// to the end of its new column.
    pub fn update(&mut self, application: Application) -> Result<Option<Stage>, BoardError> {
        if !self.store.contains(&application.id) {
            return Err(BoardError::NotFound(application.id));
        }
        let id = application.id.clone();
        let stage = application.stage.clone();
        let placed = self.stage_of(&id);
        self.store.upsert(application);

        if placed.is_some() && placed == stage.known() {
            return Ok(placed);
        }
        self.partition.detach(&id);
        Ok(self.place(&id, &stage))
    }

    /// Removes a record and its column entry together.
    pub fn remove(&mut self, id: &ApplicationId) -> Result<Application, BoardError> {
        let record = self
            .store
            .remove(id)
            .ok_or_else(|| BoardError::NotFound(id.clone()))?;
        self.partition.detach(id);
        Ok(record)
    }

    /// Rebuilds store and partition from scratch, bucketing records by stage in
    /// the order given. Records with unknown stage are stored but not placed.
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = Application>) -> ReplaceReport {
        let mut store = EntityStore::new();
        let mut partition = StagePartition::new();
        let mut report = ReplaceReport::default();

        for record in records {
            let id = record.id.clone();
            let stage = record.stage.clone();
            if store.upsert(record).is_some() {
                warn!(stage = "board", application = %id, "duplicate application in refresh; keeping the last one");
                report.duplicates += 1;
                partition.detach(&id);
                report.unplaced.retain(|unplaced| *unplaced != id);
            }
            match stage.known() {
                Some(column) => {
                    partition.append(column, id);
                }
                None => {
                    warn!(stage = "board", application = %id, status = %stage, "unknown stage; application kept off the board");
                    report.unplaced.push(id);
                }
            }
        }

        report.placed = partition.len();
        self.store = store;
        self.partition = partition;
        report
    }

    /// Builds the snapshot served to readers.
    pub fn snapshot(&self, version: u64, status: SyncStatus) -> BoardSnapshot {
        BoardSnapshot {
            version,
            columns: self.partition.clone(),
            applications: self
                .store
                .iter()
                .map(|record| (record.id.clone(), record.clone()))
                .collect(),
            unplaced: self.unplaced(),
            status,
        }
    }

    /// Lists every broken board invariant; empty when the board is consistent.
    pub fn consistency_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for (stage, ids) in self.partition.columns() {
            for (index, id) in ids.iter().enumerate() {
                if ids[..index].contains(id) {
                    violations.push(format!("{id} appears twice in {stage}"));
                }
                match self.store.get(id) {
                    Ok(record) if record.stage.known() != Some(stage) => violations.push(
                        format!("{id} sits in {stage} but its stage is {}", record.stage),
                    ),
                    Ok(_) => {}
                    Err(_) => violations.push(format!("{id} in {stage} has no record")),
                }
            }
        }
        for record in self.store.iter() {
            let holders = self
                .partition
                .columns()
                .filter(|(_, ids)| ids.contains(&record.id))
                .count();
            match record.stage.known() {
                Some(_) if holders != 1 => violations.push(format!(
                    "{} is placed in {holders} columns",
                    record.id
                )),
                None if holders != 0 => {
                    violations.push(format!("{} has unknown stage but is placed", record.id))
                }
                _ => {}
            }
        }
        violations
    }

    fn place(&mut self, id: &ApplicationId, stage: &ApplicationStage) -> Option<Stage> {
        match stage.known() {
            Some(column) => {
                self.partition.append(column, id.clone());
                Some(column)
            }
            None => {
                warn!(stage = "board", application = %id, status = %stage, "unknown stage; application kept off the board");
                None
            }
        }
    }
}
