//! # Edit State
//!
//! Transient state owned by a row while it is in edit mode.
//!
//! A [`RowEditState`] exists exactly while its row is editing. It keeps the
//! row snapshot taken at start, one [`CellEditState`] per editable column and
//! the provisional row that results from the edits made so far.

use crate::pipeline::PendingMutation;
use crate::row::{Row, RowId, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Props handed to the edit cell renderer.
///
/// The core fields are owned by the validation pipeline. `extra` carries any
/// flags a pre-processor attaches for its renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellProps {
    pub value: Value,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub is_processing_props: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl CellProps {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            error: false,
            is_processing_props: false,
            extra: serde_json::Map::new(),
        }
    }

    /// Same props with the error flag set
    pub fn with_error(mut self, error: bool) -> Self {
        self.error = error;
        self
    }

    /// Same props with one extension flag added
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Merge props returned by a pre-processor.
    ///
    /// The pipeline's value is authoritative and is never taken from `returned`.
    pub(crate) fn absorb(&mut self, returned: CellProps) {
        self.error = returned.error;
        self.extra.extend(returned.extra);
        self.is_processing_props = false;
    }
}

/// Editing value and validation flags of one cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellEditState {
    pub props: CellProps,
    /// Validation round counter; bumped on every round for this cell
    pub(crate) generation: u64,
}

impl CellEditState {
    fn seeded(value: Value) -> Self {
        Self {
            props: CellProps::new(value),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Whether a row is rendered as read-only cells or as inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowMode {
    View,
    Edit,
}

/// Per-cell mode; only editable cells of an editing row are `Edit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellMode {
    View,
    Edit,
}

/// Edit session of one row
#[derive(Debug)]
pub struct RowEditState {
    pub(crate) id: RowId,
    /// Registry-unique session number, distinguishes restarts of the same row
    pub(crate) session: u64,
    pub(crate) original_row: Row,
    pub(crate) provisional_row: Row,
    /// Bumped on every write of `provisional_row`
    pub(crate) provisional_version: u64,
    pub(crate) cells: HashMap<String, CellEditState>,
    pub(crate) focused_field: Option<String>,
    pub(crate) committing: bool,
    pub(crate) pending: HashMap<String, PendingMutation>,
    next_ticket: u64,
}

impl RowEditState {
    pub(crate) fn new<'a>(
        id: RowId,
        session: u64,
        row: Row,
        editable_fields: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let cells = editable_fields
            .into_iter()
            .map(|field| {
                let value = row.get(field).cloned().unwrap_or(Value::Null);
                (field.to_string(), CellEditState::seeded(value))
            })
            .collect();

        Self {
            id,
            session,
            provisional_row: row.clone(),
            provisional_version: 0,
            original_row: row,
            cells,
            focused_field: None,
            committing: false,
            pending: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub fn id(&self) -> &RowId {
        &self.id
    }

    /// Row snapshot taken when editing started
    pub fn original_row(&self) -> &Row {
        &self.original_row
    }

    /// Original row with every edit made so far applied, in call order
    pub fn provisional_row(&self) -> &Row {
        &self.provisional_row
    }

    pub fn cell(&self, field: &str) -> Option<&CellEditState> {
        self.cells.get(field)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, &CellEditState)> {
        self.cells.iter().map(|(field, cell)| (field.as_str(), cell))
    }

    pub fn focused_field(&self) -> Option<&str> {
        self.focused_field.as_deref()
    }

    pub fn is_processing(&self) -> bool {
        self.cells.values().any(|cell| cell.props.is_processing_props)
    }

    pub fn has_error(&self) -> bool {
        self.cells.values().any(|cell| cell.props.error)
    }

    pub fn is_committing(&self) -> bool {
        self.committing
    }

    /// Current editing value of every cell
    pub(crate) fn cell_values(&self) -> HashMap<String, Value> {
        self.cells
            .iter()
            .map(|(field, cell)| (field.clone(), cell.props.value.clone()))
            .collect()
    }

    pub(crate) fn next_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Remove the pending debounced mutation of `field` if it is still `ticket`
    pub(crate) fn take_pending(&mut self, field: &str, ticket: u64) -> Option<PendingMutation> {
        match self.pending.get(field) {
            Some(pending) if pending.ticket == ticket => self.pending.remove(field),
            _ => None,
        }
    }

    /// Remove all pending debounced mutations, oldest first
    pub(crate) fn drain_pending(&mut self) -> Vec<(String, PendingMutation)> {
        let mut pending: Vec<_> = self.pending.drain().collect();
        pending.sort_by_key(|(_, mutation)| mutation.ticket);
        pending
    }

    /// Drop pending debounced mutations; their callers resolve to `false`
    pub(crate) fn cancel_pending(&mut self) {
        for (_, mutation) in self.drain_pending() {
            mutation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> Row {
        json!({ "id": 0, "currencyPair": "USDGBP", "price1M": 1 })
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_cells_are_seeded_from_row() {
        let state = RowEditState::new(RowId::from(0), 1, row(), ["currencyPair", "price1M"]);

        let cell = state.cell("currencyPair").unwrap();
        assert_eq!(cell.props.value, json!("USDGBP"));
        assert!(!cell.props.error);
        assert!(!cell.props.is_processing_props);
        assert_eq!(state.cell("price1M").unwrap().props.value, json!(1));
        assert!(state.cell("id").is_none());
        assert!(!state.is_processing());
        assert!(!state.has_error());
    }

    #[test]
    fn test_absorb_keeps_pipeline_value() {
        let mut props = CellProps::new(json!("USD GBP"));
        props.is_processing_props = true;

        let returned = CellProps::new(json!("foobar"))
            .with_error(true)
            .with_extra("foo", "bar");
        props.absorb(returned);

        assert_eq!(props.value, json!("USD GBP"));
        assert!(props.error);
        assert!(!props.is_processing_props);
        assert_eq!(props.extra.get("foo"), Some(&json!("bar")));
    }

    #[test]
    fn test_props_serialize_with_flattened_extras() {
        let props = CellProps::new(json!(1)).with_extra("foo", "bar");
        let value = serde_json::to_value(&props).unwrap();
        assert_eq!(
            value,
            json!({ "value": 1, "error": false, "isProcessingProps": false, "foo": "bar" })
        );

        let back: CellProps = serde_json::from_value(value).unwrap();
        assert_eq!(back, props);
    }
}
