//! # Row Editing Controller
//!
//! Public entry point. One controller belongs to one grid instance and owns
//! that grid's [`EditSessionRegistry`]; there is no process-wide state.
//!
//! The controller is a cheap handle (`Clone`) over shared state, so hooks and
//! spawned validation rounds can call back into it. Internal state is only
//! locked for short synchronous sections and never while user callbacks run.

use crate::columns::ColumnRegistry;
use crate::commit::StopRowEditModeParams;
use crate::config::EditingConfig;
use crate::errors::RowEditError;
use crate::events::{
    EventBus, GridEvent, GridEventKind, Listener, RowEditStartParams, RowEditStartReason,
    RowEditStopParams, RowEditStopReason, SubscriptionId,
};
use crate::focus::{CellToFocusAfter, FocusSink, GridView, PagedView};
use crate::hooks::{CommitHooks, MaybeDeferred};
use crate::pipeline::EditCellValueParams;
use crate::row::{CellCoords, Row, RowId, Value};
use crate::session::EditSessionRegistry;
use crate::state::{CellMode, CellProps, RowMode};
use crate::store::RowStore;
use crate::triggers::TriggerMapper;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Parameters of [`RowEditingController::start_row_edit_mode`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRowEditModeParams {
    pub id: RowId,
    #[serde(default)]
    pub field_to_focus: Option<String>,
}

impl StartRowEditModeParams {
    pub fn new(id: impl Into<RowId>) -> Self {
        Self {
            id: id.into(),
            field_to_focus: None,
        }
    }

    pub fn field_to_focus(mut self, field: impl Into<String>) -> Self {
        self.field_to_focus = Some(field.into());
        self
    }
}

/// Everything an edit cell renderer needs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRenderParams {
    pub id: RowId,
    pub field: String,
    /// Provisional row with the edits made so far
    pub row: Row,
    #[serde(flatten)]
    pub props: CellProps,
    pub has_focus: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ControllerState {
    pub(crate) registry: EditSessionRegistry,
    pub(crate) focused: Option<CellCoords>,
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<ControllerState>,
    pub(crate) rows: Arc<dyn RowStore>,
    pub(crate) columns: Arc<dyn ColumnRegistry>,
    pub(crate) view: Arc<dyn GridView>,
    pub(crate) focus: Option<Arc<dyn FocusSink>>,
    pub(crate) hooks: CommitHooks,
    pub(crate) events: EventBus,
    pub(crate) config: EditingConfig,
}

/// Row edit mode state machine of one grid
#[derive(Clone)]
pub struct RowEditingController {
    pub(crate) shared: Arc<Shared>,
}

impl RowEditingController {
    pub fn builder(
        rows: Arc<dyn RowStore>,
        columns: Arc<dyn ColumnRegistry>,
    ) -> RowEditingControllerBuilder {
        RowEditingControllerBuilder {
            rows,
            columns,
            view: None,
            focus: None,
            hooks: CommitHooks::default(),
            config: EditingConfig::default(),
        }
    }

    /// Put the row `id` into edit mode
    ///
    /// Snapshots the committed row and seeds one cell state per editable
    /// column. `field_to_focus` is recorded as the focused cell for the
    /// renderer; nothing else about focus changes.
    pub fn start_row_edit_mode(&self, params: StartRowEditModeParams) -> Result<(), RowEditError> {
        let StartRowEditModeParams { id, field_to_focus } = params;

        if self.is_editing(&id) {
            return Err(RowEditError::AlreadyEditing { id });
        }

        let row = self
            .shared
            .rows
            .get_row(&id)
            .ok_or_else(|| RowEditError::UnknownRow { id: id.clone() })?;
        let columns = self.shared.columns.columns();

        {
            let mut state = self.lock();
            let session = state.registry.begin(id.clone(), row, &columns)?;
            session.focused_field = field_to_focus.clone();
            if let Some(field) = field_to_focus {
                state.focused = Some(CellCoords {
                    id: id.clone(),
                    field,
                });
            }
        }

        tracing::debug!("Row id={} entered edit mode", id);
        self.emit(GridEvent::RowModesChange {
            id,
            mode: RowMode::Edit,
        });
        Ok(())
    }

    pub fn is_editing(&self, id: &RowId) -> bool {
        self.lock().registry.is_editing(id)
    }

    pub fn row_mode(&self, id: &RowId) -> RowMode {
        if self.is_editing(id) {
            RowMode::Edit
        } else {
            RowMode::View
        }
    }

    pub fn cell_mode(&self, id: &RowId, field: &str) -> CellMode {
        let state = self.lock();
        match state.registry.get(id).and_then(|row| row.cell(field)) {
            Some(_) => CellMode::Edit,
            None => CellMode::View,
        }
    }

    /// True while any cell of the row waits on a pre-processor
    pub fn is_processing(&self, id: &RowId) -> bool {
        self.lock()
            .registry
            .get(id)
            .map(|row| row.is_processing())
            .unwrap_or(false)
    }

    /// Render params of an editing cell, `None` if the cell is not editing
    pub fn edit_cell_params(&self, id: &RowId, field: &str) -> Option<CellRenderParams> {
        let state = self.lock();
        let row = state.registry.get(id)?;
        let cell = row.cell(field)?;

        Some(CellRenderParams {
            id: id.clone(),
            field: field.to_string(),
            row: row.provisional_row().clone(),
            props: cell.props.clone(),
            has_focus: row.focused_field() == Some(field),
        })
    }

    /// Props of every editing cell of the row
    pub fn edit_props(&self, id: &RowId) -> Option<BTreeMap<String, CellProps>> {
        let state = self.lock();
        let row = state.registry.get(id)?;
        Some(
            row.cells()
                .map(|(field, cell)| (field.to_string(), cell.props.clone()))
                .collect(),
        )
    }

    pub fn focused_cell(&self) -> Option<CellCoords> {
        self.lock().focused.clone()
    }

    /// Move focus to a cell and forward the request to the focus sink
    pub fn focus_cell(&self, target: CellCoords) {
        {
            let mut state = self.lock();
            if let Some(row) = state.registry.get_mut(&target.id) {
                row.focused_field = Some(target.field.clone());
            }
            state.focused = Some(target.clone());
        }

        if let Some(sink) = &self.shared.focus {
            sink.set_cell_focus(&target.id, &target.field);
        }
    }

    pub fn subscribe_event(&self, kind: GridEventKind, listener: Listener) -> SubscriptionId {
        self.shared.events.subscribe(kind, listener)
    }

    pub fn unsubscribe_event(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Publish an event to subscribers, then run the controller's own reaction
    pub fn publish_event(&self, event: GridEvent) {
        self.shared.events.publish(&event);

        match &event {
            GridEvent::RowEditStart(params) => self.handle_row_edit_start(params),
            GridEvent::RowEditStop(params) => self.handle_row_edit_stop(params),
            _ => {}
        }
    }

    /// Mapper from pointer/keyboard input to start/stop events
    pub fn triggers(&self) -> TriggerMapper {
        TriggerMapper::new(self.clone())
    }

    pub fn config(&self) -> &EditingConfig {
        &self.shared.config
    }

    pub fn rows(&self) -> &Arc<dyn RowStore> {
        &self.shared.rows
    }

    pub fn columns(&self) -> &Arc<dyn ColumnRegistry> {
        &self.shared.columns
    }

    pub fn view(&self) -> &Arc<dyn GridView> {
        &self.shared.view
    }

    fn handle_row_edit_start(&self, params: &RowEditStartParams) {
        let start = StartRowEditModeParams::new(params.id.clone()).field_to_focus(&params.field);
        if let Err(err) = self.start_row_edit_mode(start) {
            tracing::debug!("Ignoring rowEditStart: {}", err);
            return;
        }

        if matches!(
            params.reason,
            RowEditStartReason::DeleteKeyDown | RowEditStartReason::PrintableKeyDown
        ) {
            let clear = EditCellValueParams::new(
                params.id.clone(),
                &params.field,
                Value::String(String::new()),
            )
            .debounce_ms(0);
            if let Err(err) = self.set_edit_cell_value(clear) {
                tracing::warn!("Could not clear cell after rowEditStart: {}", err);
            }
        }
    }

    fn handle_row_edit_stop(&self, params: &RowEditStopParams) {
        let cell_to_focus_after = match params.reason {
            RowEditStopReason::EnterKeyDown => Some(CellToFocusAfter::Below),
            RowEditStopReason::TabKeyDown => Some(CellToFocusAfter::Right),
            RowEditStopReason::ShiftTabKeyDown => Some(CellToFocusAfter::Left),
            RowEditStopReason::RowFocusOut | RowEditStopReason::EscapeKeyDown => None,
        };
        // A stop that cannot commit yet discards instead of being dropped
        let ignore_modifications =
            params.reason == RowEditStopReason::EscapeKeyDown || self.is_processing(&params.id);

        let mut stop = StopRowEditModeParams::new(params.id.clone())
            .field(&params.field)
            .ignore_modifications(ignore_modifications);
        stop.cell_to_focus_after = cell_to_focus_after;

        if let Err(err) = self.stop_row_edit_mode(stop) {
            tracing::debug!("Ignoring rowEditStop: {}", err);
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: GridEvent) {
        self.shared.events.publish(&event);
    }
}

impl std::fmt::Debug for RowEditingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowEditingController")
            .field("state", &*self.lock())
            .field("hooks", &self.shared.hooks)
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Assembles a [`RowEditingController`] from its collaborators
pub struct RowEditingControllerBuilder {
    rows: Arc<dyn RowStore>,
    columns: Arc<dyn ColumnRegistry>,
    view: Option<Arc<dyn GridView>>,
    focus: Option<Arc<dyn FocusSink>>,
    hooks: CommitHooks,
    config: EditingConfig,
}

impl RowEditingControllerBuilder {
    /// Grid view used for focus routing; defaults to an unpaginated view
    pub fn view(mut self, view: Arc<dyn GridView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn focus_sink(mut self, sink: Arc<dyn FocusSink>) -> Self {
        self.focus = Some(sink);
        self
    }

    pub fn process_row_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(Row, Row) -> MaybeDeferred<anyhow::Result<Row>> + Send + Sync + 'static,
    {
        self.hooks.process_row_update = Some(Arc::new(hook));
        self
    }

    pub fn on_process_row_update_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(anyhow::Error) + Send + Sync + 'static,
    {
        self.hooks.on_process_row_update_error = Some(Arc::new(callback));
        self
    }

    pub fn config(mut self, config: EditingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> RowEditingController {
        let view = self
            .view
            .unwrap_or_else(|| Arc::new(PagedView::new(self.rows.clone(), self.columns.clone())));

        RowEditingController {
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState::default()),
                rows: self.rows,
                columns: self.columns,
                view,
                focus: self.focus,
                hooks: self.hooks,
                events: EventBus::new(),
                config: self.config,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{ColumnEditSpec, ColumnSet};
    use crate::store::MemoryRowStore;
    use serde_json::json;

    fn controller() -> RowEditingController {
        let rows = vec![json!({ "id": 0, "currencyPair": "USDGBP", "price1M": 1, "price2M": 2 })
            .as_object()
            .unwrap()
            .clone()];
        let columns = ColumnSet::new(vec![
            ColumnEditSpec::new("id"),
            ColumnEditSpec::new("currencyPair").editable(true),
            ColumnEditSpec::new("price1M").editable(true),
            ColumnEditSpec::new("price2M"),
        ]);

        RowEditingController::builder(
            Arc::new(MemoryRowStore::from_rows(rows).unwrap()),
            Arc::new(columns),
        )
        .build()
    }

    #[test]
    fn test_start_marks_row_and_editable_cells() {
        let controller = controller();
        let id = RowId::from(0);
        assert_eq!(controller.row_mode(&id), RowMode::View);

        controller
            .start_row_edit_mode(StartRowEditModeParams::new(0))
            .unwrap();

        assert_eq!(controller.row_mode(&id), RowMode::Edit);
        assert_eq!(controller.cell_mode(&id, "currencyPair"), CellMode::Edit);
        assert_eq!(controller.cell_mode(&id, "price1M"), CellMode::Edit);
        assert_eq!(controller.cell_mode(&id, "price2M"), CellMode::View);
        assert_eq!(controller.cell_mode(&id, "id"), CellMode::View);
    }

    #[test]
    fn test_start_twice_fails() {
        let controller = controller();
        controller
            .start_row_edit_mode(StartRowEditModeParams::new(0))
            .unwrap();

        let err = controller
            .start_row_edit_mode(StartRowEditModeParams::new(0))
            .unwrap_err();
        assert_eq!(err.to_string(), "The row with id=0 is not in view mode.");
    }

    #[test]
    fn test_start_unknown_row_fails() {
        let controller = controller();
        let err = controller
            .start_row_edit_mode(StartRowEditModeParams::new(42))
            .unwrap_err();
        assert_eq!(err, RowEditError::UnknownRow { id: RowId::from(42) });
    }

    #[test]
    fn test_field_to_focus_is_exposed_to_renderer() {
        let controller = controller();
        controller
            .start_row_edit_mode(StartRowEditModeParams::new(0).field_to_focus("price1M"))
            .unwrap();

        let id = RowId::from(0);
        assert!(controller.edit_cell_params(&id, "price1M").unwrap().has_focus);
        assert!(!controller.edit_cell_params(&id, "currencyPair").unwrap().has_focus);
        assert_eq!(controller.focused_cell(), Some(CellCoords::new(0, "price1M")));
    }

    #[test]
    fn test_edit_props_cover_editable_cells_only() {
        let controller = controller();
        let id = RowId::from(0);
        assert!(controller.edit_props(&id).is_none());

        controller
            .start_row_edit_mode(StartRowEditModeParams::new(0))
            .unwrap();
        controller
            .set_edit_cell_value(EditCellValueParams::new(0, "price1M", 3))
            .unwrap();

        let props = controller.edit_props(&id).unwrap();
        assert_eq!(
            props.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["currencyPair", "price1M"]
        );
        assert_eq!(props["price1M"].value, json!(3));
        assert_eq!(props["currencyPair"].value, json!("USDGBP"));
    }

    #[test]
    fn test_initial_render_params() {
        let controller = controller();
        controller
            .start_row_edit_mode(StartRowEditModeParams::new(0))
            .unwrap();

        let params = controller
            .edit_cell_params(&RowId::from(0), "currencyPair")
            .unwrap();
        assert_eq!(params.props.value, json!("USDGBP"));
        assert!(!params.props.error);
        assert!(!params.props.is_processing_props);
        assert_eq!(params.row["price1M"], json!(1));
    }
}
