// ABOUTME: API module containing the HTTP handler functions for the listd REST API.
// ABOUTME: Split into list operations and administrative endpoints.

pub mod admin;
pub mod lists;
