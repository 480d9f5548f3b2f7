use std::collections::HashMap;

use crate::error::BoardError;
use crate::types::{Application, ApplicationId};

/// Application records keyed by identifier.
///
/// The store never touches column membership; [`crate::board::Board`] keeps
/// the two in step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStore {
    records: HashMap<ApplicationId, Application>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a record by identifier.
    pub fn get(&self, id: &ApplicationId) -> Result<&Application, BoardError> {
        self.records
            .get(id)
            .ok_or_else(|| BoardError::NotFound(id.clone()))
    }

    pub(crate) fn get_mut(&mut self, id: &ApplicationId) -> Option<&mut Application> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &ApplicationId) -> bool {
        self.records.contains_key(id)
    }

    /// Inserts or replaces a record, returning the previous one.
    pub fn upsert(&mut self, record: Application) -> Option<Application> {
        self.records.insert(record.id.clone(), record)
    }

    /// Deletes a record. Callers remove the identifier from its column themselves.
    pub fn remove(&mut self, id: &ApplicationId) -> Option<Application> {
        self.records.remove(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Application> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApplicationStage, Stage};
    use crate::testing::application;

    #[test]
    fn get_reports_missing_identifier() {
        let store = EntityStore::new();
        let err = store.get(&ApplicationId::from("nope")).unwrap_err();
        assert_eq!(err, BoardError::NotFound(ApplicationId::from("nope")));
    }

    #[test]
    fn upsert_replaces_by_identifier() {
        let mut store = EntityStore::new();
        assert!(store.upsert(application("1", Stage::Wishlist)).is_none());

        let previous = store
            .upsert(application("1", Stage::Offer))
            .expect("previous record");
        assert_eq!(previous.stage, ApplicationStage::Known(Stage::Wishlist));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&ApplicationId::from("1")).unwrap().stage.known(),
            Some(Stage::Offer)
        );
    }

    #[test]
    fn remove_returns_record() {
        let mut store = EntityStore::new();
        store.upsert(application("1", Stage::Applied));
        assert!(store.remove(&ApplicationId::from("1")).is_some());
        assert!(store.remove(&ApplicationId::from("1")).is_none());
        assert!(store.is_empty());
    }
}
