// ABOUTME: Mapping from list id to SpecificList, with a store-level lock for structural changes.
// ABOUTME: The store lock is never held while a list's own lock is taken for element access.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::ListError;
use crate::list::SpecificList;

/// All named lists held by one process.
///
/// The `RwLock` guards only the id-to-list mapping. Callers get an `Arc`
/// handle back and release the store lock before touching list contents,
/// so a slow operation on one list never serializes unrelated lists.
#[derive(Debug, Default)]
pub struct ListStore {
    lists: RwLock<HashMap<String, Arc<SpecificList>>>,
}

impl ListStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted contents. Each list gets a fresh lock.
    pub fn from_lists<I>(lists: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<i64>, Option<DateTime<Utc>>)>,
    {
        let map = lists
            .into_iter()
            .map(|(id, elements, last_logged)| {
                let list = Arc::new(SpecificList::with_elements(id.clone(), elements, last_logged));
                (id, list)
            })
            .collect();
        Self {
            lists: RwLock::new(map),
        }
    }

    /// Return the list for `id`, creating an empty one if absent.
    /// Exactly one instance ever exists per id, even under racing callers.
    pub fn ensure_list(&self, id: &str) -> Arc<SpecificList> {
        if let Some(list) = self.lists.read().get(id) {
            return Arc::clone(list);
        }

        let mut lists = self.lists.write();
        let list = lists.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!(list_id = id, "creating list");
            Arc::new(SpecificList::new(id))
        });
        Arc::clone(list)
    }

    /// Return the list for `id` without creating it.
    pub fn lookup(&self, id: &str) -> Result<Arc<SpecificList>, ListError> {
        self.lists
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ListError::ListNotFound(id.to_string()))
    }

    pub fn append(&self, id: &str, value: i64) {
        self.ensure_list(id).append(value);
    }

    pub fn get(&self, id: &str, index: i64) -> Result<i64, ListError> {
        self.lookup(id)?.get(index)
    }

    pub fn remove(&self, id: &str) -> Result<i64, ListError> {
        self.lookup(id)?.remove()
    }

    pub fn size(&self, id: &str) -> Result<usize, ListError> {
        Ok(self.lookup(id)?.size())
    }

    /// Point-in-time copy of the handles, taken under the shared store lock.
    pub fn entries(&self) -> Vec<(String, Arc<SpecificList>)> {
        self.lists
            .read()
            .iter()
            .map(|(id, list)| (id.clone(), Arc::clone(list)))
            .collect()
    }

    /// Sorted list ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lists.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lists.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.read().is_empty()
    }
}
