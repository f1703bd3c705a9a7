//! # Grid Events
//!
//! Semantic events published by the controller and its trigger mapper.
//! Listeners run synchronously on the publishing thread, after the
//! controller has released its own state.

use crate::row::RowId;
use crate::state::{CellProps, RowMode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Why a row entered edit mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowEditStartReason {
    CellDoubleClick,
    EnterKeyDown,
    DeleteKeyDown,
    PrintableKeyDown,
}

/// Why a row left edit mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowEditStopReason {
    RowFocusOut,
    EscapeKeyDown,
    EnterKeyDown,
    TabKeyDown,
    ShiftTabKeyDown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowEditStartParams {
    pub id: RowId,
    pub field: String,
    pub reason: RowEditStartReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowEditStopParams {
    pub id: RowId,
    pub field: String,
    pub reason: RowEditStopReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    RowEditStart(RowEditStartParams),
    RowEditStop(RowEditStopParams),
    /// Published props of an editing cell changed
    EditCellPropsChange {
        id: RowId,
        field: String,
        props: CellProps,
    },
    RowModesChange {
        id: RowId,
        mode: RowMode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridEventKind {
    RowEditStart,
    RowEditStop,
    EditCellPropsChange,
    RowModesChange,
}

impl GridEvent {
    pub fn kind(&self) -> GridEventKind {
        match self {
            GridEvent::RowEditStart(_) => GridEventKind::RowEditStart,
            GridEvent::RowEditStop(_) => GridEventKind::RowEditStop,
            GridEvent::EditCellPropsChange { .. } => GridEventKind::EditCellPropsChange,
            GridEvent::RowModesChange { .. } => GridEventKind::RowModesChange,
        }
    }
}

pub type Listener = Arc<dyn Fn(&GridEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous publish/subscribe hub
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<(SubscriptionId, GridEventKind, Listener)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: GridEventKind, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, kind, listener));
        id
    }

    /// Returns false if the subscription was not found
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(sub, _, _)| *sub != id);
        listeners.len() != before
    }

    pub fn publish(&self, event: &GridEvent) {
        let kind = event.kind();
        // Listeners may subscribe or publish in turn
        let matching: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();

        for listener in matching {
            listener(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("EventBus").field("listeners", &count).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn start_event() -> GridEvent {
        GridEvent::RowEditStart(RowEditStartParams {
            id: RowId::from(0),
            field: "currencyPair".into(),
            reason: RowEditStartReason::CellDoubleClick,
        })
    }

    #[test]
    fn test_publish_reaches_matching_kind_only() {
        let bus = EventBus::new();
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));

        let counter = starts.clone();
        bus.subscribe(
            GridEventKind::RowEditStart,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = stops.clone();
        bus.subscribe(
            GridEventKind::RowEditStop,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish(&start_event());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = bus.subscribe(
            GridEventKind::RowEditStart,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(bus.unsubscribe(sub));
        assert!(!bus.unsubscribe(sub));
        bus.publish(&start_event());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reasons_serialize_camel_case() {
        let json = serde_json::to_string(&RowEditStopReason::ShiftTabKeyDown).unwrap();
        assert_eq!(json, "\"shiftTabKeyDown\"");
    }
}
