// ABOUTME: Operation kinds recorded in the journal and list id validation.
// ABOUTME: The textual forms here are the on-disk spelling used by the operation log.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::ListError;

/// The kind of a journaled operation. `Observe` covers both Get and Size,
/// which share one spelling on disk and never change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Append,
    Remove,
    Observe,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Append => "Append",
            OpKind::Remove => "Remove",
            OpKind::Observe => "Get/Size",
        }
    }

    /// Whether replaying this operation changes list contents.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, OpKind::Observe)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a token is not one of the known operation spellings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation '{0}'")]
pub struct UnknownOpKind(pub String);

impl FromStr for OpKind {
    type Err = UnknownOpKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Append" => Ok(OpKind::Append),
            "Remove" => Ok(OpKind::Remove),
            "Get/Size" => Ok(OpKind::Observe),
            other => Err(UnknownOpKind(other.to_string())),
        }
    }
}

/// Check that a list id can be written to the whitespace-delimited journal.
pub fn validate_list_id(list_id: &str) -> Result<(), ListError> {
    if list_id.is_empty() || list_id.chars().any(char::is_whitespace) {
        return Err(ListError::InvalidListId(list_id.to_string()));
    }
    Ok(())
}
