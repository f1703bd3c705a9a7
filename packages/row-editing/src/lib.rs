//! # Gridline Row Editing
//!
//! Row edit mode for a tabular grid: every editable cell of a row becomes an
//! input at once and the row is committed or discarded as a unit.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ triggers: pointer/keyboard → rowEditStart,  │
//! │           rowEditStop events                │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ controller: per-grid session registry       │
//! │  - start / stop row edit mode               │
//! │  - render params for edit cells             │
//! │  - default event handlers                   │
//! └─────────────────────────────────────────────┘
//!          ↓                          ↓
//! ┌──────────────────────┐  ┌──────────────────────┐
//! │ pipeline: parse →    │  │ commit: fold setters │
//! │ set → pre-process,   │  │ → processRowUpdate → │
//! │ debounce, stale-     │  │ row store, focus     │
//! │ round discard        │  │ routing              │
//! └──────────────────────┘  └──────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The row store is the source of truth**: edits live in the session
//!    until a commit writes them back
//! 2. **Last writer wins**: every validation round carries a generation; a
//!    round that settles late changes nothing
//! 3. **Stops are never queued**: a stop that cannot commit yet is dropped
//! 4. **No global state**: each grid owns its own controller
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gridline_row_editing::{
//!     ColumnEditSpec, ColumnSet, EditCellValueParams, MemoryRowStore,
//!     RowEditingController, StartRowEditModeParams, StopRowEditModeParams,
//! };
//!
//! let controller = RowEditingController::builder(Arc::new(store), Arc::new(columns)).build();
//!
//! controller.start_row_edit_mode(StartRowEditModeParams::new(0))?;
//! let valid = controller
//!     .set_edit_cell_value(EditCellValueParams::new(0, "currencyPair", "USD GBP"))?
//!     .await;
//! controller.stop_row_edit_mode(StopRowEditModeParams::new(0))?;
//! ```

mod columns;
mod commit;
mod config;
mod controller;
mod errors;
mod events;
mod focus;
mod hooks;
mod pipeline;
mod row;
mod session;
mod state;
mod store;
mod triggers;

pub use columns::{ColumnEditSpec, ColumnRegistry, ColumnSet, PreProcessor, ValueParser, ValueSetter};
pub use commit::{build_new_row, StopBlock, StopOutcome, StopRowEditModeParams};
pub use config::EditingConfig;
pub use controller::{
    CellRenderParams, RowEditingController, RowEditingControllerBuilder, StartRowEditModeParams,
};
pub use errors::RowEditError;
pub use events::{
    EventBus, GridEvent, GridEventKind, Listener, RowEditStartParams, RowEditStartReason,
    RowEditStopParams, RowEditStopReason, SubscriptionId,
};
pub use focus::{CellToFocusAfter, FocusRouter, FocusSink, GridView, PagedView};
pub use hooks::{CommitHooks, MaybeDeferred, OnProcessRowUpdateError, ProcessRowUpdate};
pub use pipeline::{EditCellValueHandle, EditCellValueParams, PreProcessParams};
pub use row::{CellCoords, Row, RowId, Value};
pub use session::EditSessionRegistry;
pub use state::{CellEditState, CellMode, CellProps, RowEditState, RowMode};
pub use store::{MemoryRowStore, RowStore};
pub use triggers::{KeyDown, Modifiers, TriggerMapper};
