// ABOUTME: A single named list of integers guarded by its own mutex.
// ABOUTME: Stack semantics: append pushes to the tail, remove pops from the tail.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};

use crate::error::ListError;

/// Contents of one list plus the timestamp of the last journal entry
/// written for it while its lock was held.
#[derive(Debug, Default)]
pub struct ListState {
    elements: Vec<i64>,
    last_logged: Option<DateTime<Utc>>,
}

/// Exclusive access to a list for the duration of one operation.
pub type ListGuard<'a> = MutexGuard<'a, ListState>;

impl ListState {
    pub fn push(&mut self, value: i64) {
        self.elements.push(value);
    }

    /// Read the element at `index`. `list_id` is only used for the error.
    pub fn get(&self, list_id: &str, index: i64) -> Result<i64, ListError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.elements.get(i).copied())
            .ok_or_else(|| ListError::IndexOutOfRange {
                list_id: list_id.to_string(),
                index,
                size: self.elements.len(),
            })
    }

    pub fn pop(&mut self, list_id: &str) -> Result<i64, ListError> {
        self.elements
            .pop()
            .ok_or_else(|| ListError::EmptyList(list_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[i64] {
        &self.elements
    }

    pub fn last_logged(&self) -> Option<DateTime<Utc>> {
        self.last_logged
    }

    /// Record that a journal entry stamped `ts` covers this list's current
    /// contents. Never moves backwards.
    pub fn mark_logged(&mut self, ts: DateTime<Utc>) {
        if self.last_logged.is_none_or(|prev| ts > prev) {
            self.last_logged = Some(ts);
        }
    }
}

/// A named sequence of integers with its own lock. Operations on different
/// lists never contend.
#[derive(Debug)]
pub struct SpecificList {
    id: String,
    state: Mutex<ListState>,
}

impl SpecificList {
    /// Create an empty list.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_elements(id, Vec::new(), None)
    }

    /// Create a list from persisted contents. The lock is always fresh.
    pub fn with_elements(
        id: impl Into<String>,
        elements: Vec<i64>,
        last_logged: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(ListState {
                elements,
                last_logged,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Acquire the list lock so a caller can apply and journal an operation
    /// inside one critical section.
    pub fn lock(&self) -> ListGuard<'_> {
        self.state.lock()
    }

    pub fn append(&self, value: i64) {
        self.lock().push(value);
    }

    pub fn get(&self, index: i64) -> Result<i64, ListError> {
        self.lock().get(&self.id, index)
    }

    pub fn remove(&self) -> Result<i64, ListError> {
        self.lock().pop(&self.id)
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Copy of the contents and journal stamp, taken under the list lock.
    pub fn capture(&self) -> (Vec<i64>, Option<DateTime<Utc>>) {
        let state = self.lock();
        (state.elements.clone(), state.last_logged)
    }
}
