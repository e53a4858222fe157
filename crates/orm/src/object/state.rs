//! Persistence states of objects registered in a unit of work

use std::fmt;

/// Lifecycle state of a persistent object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistenceState {
    /// Not registered with any unit of work
    Transient,
    /// Registered, not yet stored
    New,
    /// In sync with the last fetched row
    Committed,
    /// Fetched and changed locally
    Modified,
    /// Scheduled for deletion
    Deleted,
    /// Identity known, attribute values not loaded
    Hollow,
}

impl PersistenceState {
    /// Whether a fetched row may overwrite the object's attribute values
    pub fn accepts_row_data(self) -> bool {
        matches!(self, PersistenceState::Hollow)
    }
}

impl fmt::Display for PersistenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PersistenceState::Transient => "transient",
            PersistenceState::New => "new",
            PersistenceState::Committed => "committed",
            PersistenceState::Modified => "modified",
            PersistenceState::Deleted => "deleted",
            PersistenceState::Hollow => "hollow",
        };
        write!(f, "{}", name)
    }
}
