// ABOUTME: Core library for listd, containing the in-memory list store and its error types.
// ABOUTME: Defines SpecificList, ListStore, and the operation kinds shared by the journal and the API.

pub mod error;
pub mod list;
pub mod operation;
pub mod store;

pub use error::ListError;
pub use list::{ListGuard, ListState, SpecificList};
pub use operation::{OpKind, validate_list_id};
pub use store::ListStore;
