//! # Trigger Mapper
//!
//! Translates pointer and keyboard input on cells into `rowEditStart` and
//! `rowEditStop` events. The controller's default handlers react to those
//! events; listeners subscribed on the controller see them first.
//!
//! Every method returns whether an event was published.

use crate::controller::RowEditingController;
use crate::events::{
    GridEvent, RowEditStartParams, RowEditStartReason, RowEditStopParams, RowEditStopReason,
};
use crate::row::{CellCoords, RowId};
use serde::{Deserialize, Serialize};

/// Modifier keys held during a key press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::default()
        }
    }

    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.meta || self.alt
    }
}

/// A key press, keys named like DOM `KeyboardEvent.key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDown {
    pub key: String,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl KeyDown {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// A single character typed without any modifier
    pub fn is_printable(&self) -> bool {
        self.key.chars().count() == 1 && !self.modifiers.any()
    }
}

#[derive(Debug, Clone)]
pub struct TriggerMapper {
    controller: RowEditingController,
}

impl TriggerMapper {
    pub fn new(controller: RowEditingController) -> Self {
        Self { controller }
    }

    pub fn cell_double_click(&self, id: &RowId, field: &str) -> bool {
        if !self.can_start(id, field) {
            return false;
        }
        self.start(id, field, RowEditStartReason::CellDoubleClick)
    }

    pub fn cell_key_down(&self, id: &RowId, field: &str, key: &KeyDown) -> bool {
        if self.controller.is_editing(id) {
            return self.key_down_while_editing(id, field, key);
        }
        if !self.can_start(id, field) {
            return false;
        }

        let reason = match key.key.as_str() {
            "Enter" => RowEditStartReason::EnterKeyDown,
            "Delete" | "Backspace" => RowEditStartReason::DeleteKeyDown,
            _ if key.is_printable() => RowEditStartReason::PrintableKeyDown,
            _ => return false,
        };
        self.start(id, field, reason)
    }

    /// Focus left `(id, field)`; `next` is the newly focused cell, if any
    pub fn cell_focus_out(&self, id: &RowId, field: &str, next: Option<&CellCoords>) -> bool {
        if !self.controller.config().stop_on_focus_out || !self.controller.is_editing(id) {
            return false;
        }
        if next.is_some_and(|cell| &cell.id == id) {
            return false;
        }
        self.stop(id, field, RowEditStopReason::RowFocusOut)
    }

    fn key_down_while_editing(&self, id: &RowId, field: &str, key: &KeyDown) -> bool {
        let reason = match key.key.as_str() {
            "Escape" => RowEditStopReason::EscapeKeyDown,
            "Enter" => RowEditStopReason::EnterKeyDown,
            "Tab" => return self.tab(id, field, key.modifiers.shift),
            _ => return false,
        };
        self.stop(id, field, reason)
    }

    fn tab(&self, id: &RowId, field: &str, backwards: bool) -> bool {
        let reason = if backwards {
            RowEditStopReason::ShiftTabKeyDown
        } else {
            RowEditStopReason::TabKeyDown
        };
        if !self.controller.config().tab_stops_at_row_edge {
            return self.stop(id, field, reason);
        }

        let columns = self.controller.columns();
        let editable: Vec<String> = self
            .controller
            .view()
            .visible_fields()
            .into_iter()
            .filter(|f| columns.is_editable(f))
            .collect();

        let Some(position) = editable.iter().position(|f| f == field) else {
            return self.stop(id, field, reason);
        };
        let neighbour = if backwards {
            position.checked_sub(1)
        } else {
            Some(position + 1).filter(|next| *next < editable.len())
        };

        match neighbour {
            Some(next) => {
                self.controller
                    .focus_cell(CellCoords::new(id.clone(), editable[next].as_str()));
                false
            }
            None => self.stop(id, field, reason),
        }
    }

    fn can_start(&self, id: &RowId, field: &str) -> bool {
        !self.controller.is_editing(id) && self.controller.columns().is_editable(field)
    }

    fn start(&self, id: &RowId, field: &str, reason: RowEditStartReason) -> bool {
        self.controller
            .publish_event(GridEvent::RowEditStart(RowEditStartParams {
                id: id.clone(),
                field: field.to_string(),
                reason,
            }));
        true
    }

    fn stop(&self, id: &RowId, field: &str, reason: RowEditStopReason) -> bool {
        self.controller
            .publish_event(GridEvent::RowEditStop(RowEditStopParams {
                id: id.clone(),
                field: field.to_string(),
                reason,
            }));
        true
    }
}
