//! # Edit Session Registry
//!
//! Tracks which rows are currently in edit mode.
//!
//! The registry is owned by one grid instance and holds at most one
//! [`RowEditState`] per row identity. Several rows may be editing at once;
//! nothing here assumes a single active session.

use crate::columns::ColumnEditSpec;
use crate::errors::RowEditError;
use crate::row::{Row, RowId};
use crate::state::RowEditState;
use std::collections::HashMap;

/// Map from row identity to its edit session
#[derive(Debug, Default)]
pub struct EditSessionRegistry {
    sessions: HashMap<RowId, RowEditState>,

    /// Source of session numbers; never reused within a registry
    next_session: u64,
}

impl EditSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an edit session for `id`
    ///
    /// Snapshots `row` and seeds one cell state per editable column.
    /// Fails if the row is already editing.
    pub fn begin(
        &mut self,
        id: RowId,
        row: Row,
        columns: &[ColumnEditSpec],
    ) -> Result<&mut RowEditState, RowEditError> {
        if self.sessions.contains_key(&id) {
            return Err(RowEditError::AlreadyEditing { id });
        }

        self.next_session += 1;
        let editable = columns
            .iter()
            .filter(|column| column.editable)
            .map(|column| column.field.as_str());
        let state = RowEditState::new(id.clone(), self.next_session, row, editable);

        Ok(self.sessions.entry(id).or_insert(state))
    }

    /// Close the edit session for `id` and hand back its state
    pub fn end(&mut self, id: &RowId) -> Result<RowEditState, RowEditError> {
        self.sessions
            .remove(id)
            .ok_or_else(|| RowEditError::NotEditing { id: id.clone() })
    }

    pub fn get(&self, id: &RowId) -> Option<&RowEditState> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &RowId) -> Option<&mut RowEditState> {
        self.sessions.get_mut(id)
    }

    /// Session of `id` if it is still the one numbered `session`
    pub(crate) fn current_mut(&mut self, id: &RowId, session: u64) -> Option<&mut RowEditState> {
        self.sessions
            .get_mut(id)
            .filter(|state| state.session == session)
    }

    pub fn is_editing(&self, id: &RowId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
