//! # Commit Coordinator
//!
//! Decides what happens when a row leaves edit mode.
//!
//! Decision order for `stop_row_edit_mode`:
//!
//! ```text
//! ignore_modifications ──► discard session, route focus
//!        │ no
//!        ▼
//! flush debounced edits
//!        │
//!        ▼
//! committing / processing / error ──► drop the request (row stays editing)
//!        │ none
//!        ▼
//! fold setters over original row ──► process_row_update(new, old)
//!        │                                 │ Err
//!        │ Ok / no hook                    ▼
//!        ▼                          on_process_row_update_error
//! update store, end session, route focus
//! ```
//!
//! A dropped stop is not queued; the caller re-issues it once validation
//! settles.

use crate::columns::ColumnEditSpec;
use crate::controller::RowEditingController;
use crate::errors::RowEditError;
use crate::events::GridEvent;
use crate::focus::{CellToFocusAfter, FocusRouter};
use crate::hooks::{self, MaybeDeferred};
use crate::row::{Row, RowId, Value};
use crate::state::{RowEditState, RowMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Parameters of [`RowEditingController::stop_row_edit_mode`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRowEditModeParams {
    pub id: RowId,
    /// Cell the stop is anchored on; focus is only routed when present
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub ignore_modifications: bool,
    #[serde(default)]
    pub cell_to_focus_after: Option<CellToFocusAfter>,
}

impl StopRowEditModeParams {
    pub fn new(id: impl Into<RowId>) -> Self {
        Self {
            id: id.into(),
            field: None,
            ignore_modifications: false,
            cell_to_focus_after: None,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn ignore_modifications(mut self, ignore: bool) -> Self {
        self.ignore_modifications = ignore;
        self
    }

    pub fn cell_to_focus_after(mut self, direction: CellToFocusAfter) -> Self {
        self.cell_to_focus_after = Some(direction);
        self
    }
}

/// Why a stop request was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBlock {
    /// An asynchronous commit of the row has not settled
    Committing,
    /// A cell still waits on its pre-processor
    Processing,
    /// A cell failed validation
    Error,
}

impl StopBlock {
    fn of(row: &RowEditState) -> Option<Self> {
        if row.is_committing() {
            Some(StopBlock::Committing)
        } else if row.is_processing() {
            Some(StopBlock::Processing)
        } else if row.has_error() {
            Some(StopBlock::Error)
        } else {
            None
        }
    }
}

impl fmt::Display for StopBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopBlock::Committing => write!(f, "commit in progress"),
            StopBlock::Processing => write!(f, "validation pending"),
            StopBlock::Error => write!(f, "invalid cell"),
        }
    }
}

/// What a stop request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Edits thrown away, row back in view mode
    Discarded,
    /// Row written to the store and back in view mode
    Committed,
    /// Commit hook is running; the row stays in edit mode until it settles
    Committing,
    /// Commit hook failed; the row stays in edit mode
    Rejected,
    /// Request dropped, nothing changed
    Blocked(StopBlock),
}

/// Fold every column's setter over `original`, in declaration order.
///
/// Columns without an editing value keep the original field untouched.
pub fn build_new_row(
    original: &Row,
    values: &HashMap<String, Value>,
    columns: &[ColumnEditSpec],
) -> Row {
    columns
        .iter()
        .fold(original.clone(), |row, column| match values.get(&column.field) {
            Some(value) => column.apply_setter(value, &row),
            None => row,
        })
}

impl RowEditingController {
    /// Take the row `id` out of edit mode
    ///
    /// Fails only if the row is not editing. Requests that cannot commit yet
    /// are dropped and reported as [`StopOutcome::Blocked`].
    pub fn stop_row_edit_mode(
        &self,
        params: StopRowEditModeParams,
    ) -> Result<StopOutcome, RowEditError> {
        let StopRowEditModeParams {
            id,
            field,
            ignore_modifications,
            cell_to_focus_after,
        } = params;

        if !self.is_editing(&id) {
            return Err(RowEditError::NotEditing { id });
        }

        if ignore_modifications {
            let mut ended = self.lock().registry.end(&id)?;
            ended.cancel_pending();

            tracing::debug!("Row id={} left edit mode, modifications discarded", id);
            self.emit(GridEvent::RowModesChange {
                id: id.clone(),
                mode: RowMode::View,
            });
            self.route_focus(&id, field.as_deref(), cell_to_focus_after);
            return Ok(StopOutcome::Discarded);
        }

        self.flush_pending(&id);

        let (session, original, values) = {
            let state = self.lock();
            let row = state
                .registry
                .get(&id)
                .ok_or_else(|| RowEditError::NotEditing { id: id.clone() })?;
            if let Some(block) = StopBlock::of(row) {
                tracing::debug!("Dropping stop of row id={}: {}", id, block);
                return Ok(StopOutcome::Blocked(block));
            }
            (row.session, row.original_row.clone(), row.cell_values())
        };

        let new_row = build_new_row(&original, &values, &self.shared.columns.columns());

        let Some(process_row_update) = self.shared.hooks.process_row_update.clone() else {
            return Ok(self.finish_commit(&id, session, new_row, field.as_deref(), cell_to_focus_after));
        };

        match process_row_update(new_row, original) {
            MaybeDeferred::Ready(Ok(row)) => {
                Ok(self.finish_commit(&id, session, row, field.as_deref(), cell_to_focus_after))
            }
            MaybeDeferred::Ready(Err(err)) => {
                self.report_commit_error(&id, err);
                Ok(StopOutcome::Rejected)
            }
            MaybeDeferred::Deferred(future) => {
                if let Some(row) = self.lock().registry.current_mut(&id, session) {
                    row.committing = true;
                }

                let controller = self.clone();
                hooks::spawn_detached(async move {
                    match future.await {
                        Ok(row) => {
                            controller.finish_commit(
                                &id,
                                session,
                                row,
                                field.as_deref(),
                                cell_to_focus_after,
                            );
                        }
                        Err(err) => {
                            let still_editing = match controller
                                .lock()
                                .registry
                                .current_mut(&id, session)
                            {
                                Some(row) => {
                                    row.committing = false;
                                    true
                                }
                                None => false,
                            };

                            if still_editing {
                                controller.report_commit_error(&id, err);
                            } else {
                                tracing::debug!(
                                    "Commit of row id={} failed after the row left edit mode: {:#}",
                                    id,
                                    err
                                );
                            }
                        }
                    }
                });
                Ok(StopOutcome::Committing)
            }
        }
    }

    /// Persist `row` and close the session, unless the session already ended
    fn finish_commit(
        &self,
        id: &RowId,
        session: u64,
        row: Row,
        field: Option<&str>,
        direction: Option<CellToFocusAfter>,
    ) -> StopOutcome {
        let ended = {
            let mut state = self.lock();
            let current = state.registry.current_mut(id, session).is_some();
            if current {
                state.registry.end(id).ok()
            } else {
                None
            }
        };

        let Some(mut ended) = ended else {
            tracing::debug!("Commit of row id={} settled after the row left edit mode", id);
            return StopOutcome::Discarded;
        };
        ended.cancel_pending();

        self.shared.rows.update_row(id, row);
        tracing::info!("Committed row id={}", id);
        self.emit(GridEvent::RowModesChange {
            id: id.clone(),
            mode: RowMode::View,
        });
        self.route_focus(id, field, direction);
        StopOutcome::Committed
    }

    fn report_commit_error(&self, id: &RowId, err: anyhow::Error) {
        match &self.shared.hooks.on_process_row_update_error {
            Some(callback) => callback(err),
            None => tracing::warn!(
                "A call to `processRowUpdate` threw an error which was not handled because `onProcessRowUpdateError` is missing. Row id={}: {:#}",
                id,
                err
            ),
        }
    }

    fn route_focus(&self, id: &RowId, field: Option<&str>, direction: Option<CellToFocusAfter>) {
        let Some(field) = field else {
            return;
        };

        if let Some(target) = FocusRouter::next_cell(self.shared.view.as_ref(), id, field, direction) {
            self.focus_cell(target);
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
    fn test_fold_keeps_unedited_fields() {
        let columns = vec![
            ColumnEditSpec::new("id"),
            ColumnEditSpec::new("currencyPair").editable(true),
            ColumnEditSpec::new("price1M").editable(true),
        ];
        let values = HashMap::from([("currencyPair".to_string(), json!("USD GBP"))]);

        let new_row = build_new_row(&row(), &values, &columns);
        assert_eq!(new_row["currencyPair"], json!("USD GBP"));
        assert_eq!(new_row["price1M"], json!(1));
        assert_eq!(new_row["id"], json!(0));
    }

    #[test]
    fn test_fold_runs_in_column_order() {
        // The second setter reads what the first one wrote
        let columns = vec![
            ColumnEditSpec::new("currencyPair")
                .editable(true)
                .with_value_setter(|value, row| {
                    let mut row = row.clone();
                    let trimmed = value.as_str().unwrap_or_default().trim().to_string();
                    row.insert("currencyPair".into(), Value::String(trimmed));
                    row
                }),
            ColumnEditSpec::new("price1M")
                .editable(true)
                .with_value_setter(|value, row| {
                    let mut row = row.clone();
                    row.insert("price1M".into(), value.clone());
                    row.insert("label".into(), row["currencyPair"].clone());
                    row
                }),
        ];
        let values = HashMap::from([
            ("currencyPair".to_string(), json!(" usdgbp ")),
            ("price1M".to_string(), json!(3)),
        ]);

        let new_row = build_new_row(&row(), &values, &columns);
        assert_eq!(new_row["currencyPair"], json!("usdgbp"));
        assert_eq!(new_row["price1M"], json!(3));
        assert_eq!(new_row["label"], json!("usdgbp"));
    }

    #[test]
    fn test_stop_block_precedence() {
        let mut state = RowEditState::new(RowId::from(0), 1, row(), ["currencyPair"]);
        assert_eq!(StopBlock::of(&state), None);

        if let Some(cell) = state.cells.get_mut("currencyPair") {
            cell.props.error = true;
        }
        assert_eq!(StopBlock::of(&state), Some(StopBlock::Error));

        if let Some(cell) = state.cells.get_mut("currencyPair") {
            cell.props.is_processing_props = true;
        }
        assert_eq!(StopBlock::of(&state), Some(StopBlock::Processing));

        state.committing = true;
        assert_eq!(StopBlock::of(&state), Some(StopBlock::Committing));
    }

    #[test]
    fn test_params_deserialize_defaults() {
        let params: StopRowEditModeParams =
            serde_json::from_str(r#"{ "id": 0, "field": "currencyPair", "cellToFocusAfter": "right" }"#)
                .unwrap();
        assert_eq!(
            params,
            StopRowEditModeParams::new(0)
                .field("currencyPair")
                .cell_to_focus_after(CellToFocusAfter::Right)
        );
        assert!(!params.ignore_modifications);
    }
}
