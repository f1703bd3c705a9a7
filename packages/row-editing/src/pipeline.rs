//! # Validation Pipeline
//!
//! Runs one cell edit through parse → set → pre-process and publishes the
//! resulting cell props.
//!
//! The synchronous part (parsing, the value setter, publishing the
//! provisional props) completes before `set_edit_cell_value` returns.
//! Pre-processors that answer with a future are driven on the runtime and
//! reconciled when they settle.
//!
//! ## Races
//!
//! Every round bumps the cell's generation and remembers the session it was
//! started in. A round whose generation is no longer current, or whose row
//! left edit mode (or was restarted), resolves to `false` and leaves state
//! untouched. In-flight pre-processors are never cancelled.
//!
//! ## Debounce
//!
//! With `debounce_ms > 0` the round is parked per `(row, field)` behind a
//! timer that restarts on every call. Only the latest value runs; the
//! handles of superseded calls never resolve.

use crate::columns::PreProcessor;
use crate::controller::RowEditingController;
use crate::errors::RowEditError;
use crate::events::GridEvent;
use crate::hooks::{self, MaybeDeferred};
use crate::row::{Row, RowId, Value};
use crate::state::CellProps;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Parameters of [`RowEditingController::set_edit_cell_value`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditCellValueParams {
    pub id: RowId,
    pub field: String,
    pub value: Value,
    /// Falls back to the configured default when absent
    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

impl EditCellValueParams {
    pub fn new(id: impl Into<RowId>, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            value: value.into(),
            debounce_ms: None,
        }
    }

    pub fn debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = Some(debounce_ms);
        self
    }
}

/// Input handed to a column pre-processor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreProcessParams {
    pub id: RowId,
    /// Provisional row including the edit being validated
    pub row: Row,
    /// Whether the value differs from the committed one
    pub has_changed: bool,
    pub props: CellProps,
}

/// Resolves to `true` when the edit validated and is still current.
///
/// Dropping the handle does not cancel the round.
#[derive(Debug)]
pub struct EditCellValueHandle {
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Waiting(oneshot::Receiver<bool>),
    Settled(bool),
    Superseded,
}

impl EditCellValueHandle {
    pub(crate) fn channel() -> (oneshot::Sender<bool>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                state: HandleState::Waiting(rx),
            },
        )
    }

    /// Non-blocking check; `None` while the round is still running
    pub fn try_result(&mut self) -> Option<bool> {
        let next = match &mut self.state {
            HandleState::Settled(valid) => return Some(*valid),
            HandleState::Superseded => return None,
            HandleState::Waiting(rx) => match rx.try_recv() {
                Ok(valid) => HandleState::Settled(valid),
                Err(oneshot::error::TryRecvError::Empty) => return None,
                Err(oneshot::error::TryRecvError::Closed) => HandleState::Superseded,
            },
        };
        self.state = next;
        match self.state {
            HandleState::Settled(valid) => Some(valid),
            _ => None,
        }
    }

    /// A later debounced call replaced this one; it will never resolve
    pub fn is_superseded(&mut self) -> bool {
        self.try_result();
        matches!(self.state, HandleState::Superseded)
    }
}

impl Future for EditCellValueHandle {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        let next = match &mut this.state {
            HandleState::Settled(valid) => return Poll::Ready(*valid),
            HandleState::Superseded => return Poll::Pending,
            HandleState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(valid)) => HandleState::Settled(valid),
                Poll::Ready(Err(_)) => HandleState::Superseded,
            },
        };
        this.state = next;
        match this.state {
            HandleState::Settled(valid) => Poll::Ready(valid),
            _ => Poll::Pending,
        }
    }
}

/// A debounced edit waiting for its timer
#[derive(Debug)]
pub(crate) struct PendingMutation {
    pub(crate) ticket: u64,
    value: Value,
    reply: oneshot::Sender<bool>,
    timer: JoinHandle<()>,
}

impl PendingMutation {
    /// Replaced by a newer call: the caller's handle never resolves
    fn supersede(self) {
        self.timer.abort();
    }

    /// The row left edit mode before the timer fired
    pub(crate) fn cancel(self) {
        self.timer.abort();
        let _ = self.reply.send(false);
    }
}

/// Identifies one validation round of one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoundKey {
    id: RowId,
    field: String,
    session: u64,
    generation: u64,
}

struct PendingRound {
    key: RoundKey,
    /// The round of the cell the caller edited; only it answers the handle
    edited: bool,
    pre_process: PreProcessor,
    params: PreProcessParams,
}

impl RowEditingController {
    /// Set the editing value of a cell
    ///
    /// Fails if the row is not editing or the field has no editable cell.
    /// The returned handle follows the edited cell's own round: it resolves to
    /// `false` when that cell's pre-processor flags an error or the round was
    /// overtaken by a newer one or by a stop. Sibling cells do not count.
    pub fn set_edit_cell_value(
        &self,
        params: EditCellValueParams,
    ) -> Result<EditCellValueHandle, RowEditError> {
        let EditCellValueParams {
            id,
            field,
            value,
            debounce_ms,
        } = params;

        self.check_editable_cell(&id, &field)?;

        let debounce_ms = debounce_ms.unwrap_or(self.shared.config.default_debounce_ms);
        if debounce_ms > 0 {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    return self.schedule_debounced(
                        runtime,
                        id,
                        field,
                        value,
                        Duration::from_millis(debounce_ms),
                    );
                }
                Err(_) => tracing::warn!(
                    "No tokio runtime for debounce timer, editing `{}` immediately",
                    field
                ),
            }
        }

        let (reply, handle) = EditCellValueHandle::channel();
        self.run_round(&id, &field, value, reply)?;
        Ok(handle)
    }

    /// Run every debounced edit of the row now instead of waiting for timers
    pub(crate) fn flush_pending(&self, id: &RowId) {
        let pending = match self.lock().registry.get_mut(id) {
            Some(row) => row.drain_pending(),
            None => return,
        };

        for (field, mutation) in pending {
            mutation.timer.abort();
            self.forward_pending(id, &field, mutation.value, mutation.reply);
        }
    }

    fn check_editable_cell(&self, id: &RowId, field: &str) -> Result<(), RowEditError> {
        {
            let state = self.lock();
            let row = state
                .registry
                .get(id)
                .ok_or_else(|| RowEditError::NotEditing { id: id.clone() })?;
            if row.cell(field).is_some() {
                return Ok(());
            }
        }

        match self.shared.columns.get_column(field) {
            Some(_) => Err(RowEditError::NotEditable {
                field: field.to_string(),
            }),
            None => Err(RowEditError::UnknownField {
                id: id.clone(),
                field: field.to_string(),
            }),
        }
    }

    fn schedule_debounced(
        &self,
        runtime: tokio::runtime::Handle,
        id: RowId,
        field: String,
        value: Value,
        delay: Duration,
    ) -> Result<EditCellValueHandle, RowEditError> {
        let (reply, handle) = EditCellValueHandle::channel();

        let previous = {
            let mut state = self.lock();
            let row = state
                .registry
                .get_mut(&id)
                .ok_or_else(|| RowEditError::NotEditing { id: id.clone() })?;
            let ticket = row.next_ticket();

            let controller = self.clone();
            let (timer_id, timer_field) = (id.clone(), field.clone());
            let timer = runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                controller.fire_debounced(&timer_id, &timer_field, ticket);
            });

            row.pending.insert(
                field.clone(),
                PendingMutation {
                    ticket,
                    value,
                    reply,
                    timer,
                },
            )
        };

        if let Some(previous) = previous {
            tracing::debug!("Restarting debounce of id={} field={}", id, field);
            previous.supersede();
        }

        Ok(handle)
    }

    fn fire_debounced(&self, id: &RowId, field: &str, ticket: u64) {
        let pending = self
            .lock()
            .registry
            .get_mut(id)
            .and_then(|row| row.take_pending(field, ticket));

        if let Some(mutation) = pending {
            self.forward_pending(id, field, mutation.value, mutation.reply);
        }
    }

    fn forward_pending(&self, id: &RowId, field: &str, value: Value, reply: oneshot::Sender<bool>) {
        if let Err(err) = self.run_round(id, field, value, reply) {
            tracing::debug!("Debounced edit dropped: {}", err);
        }
    }

    fn run_round(
        &self,
        id: &RowId,
        field: &str,
        raw: Value,
        reply: oneshot::Sender<bool>,
    ) -> Result<(), RowEditError> {
        match self.prepare_round(id, field, raw) {
            Ok(rounds) => {
                self.dispatch_rounds(rounds, reply);
                Ok(())
            }
            Err(err) => {
                let _ = reply.send(false);
                Err(err)
            }
        }
    }

    /// Parse, apply the setter and publish provisional props.
    ///
    /// In row edit mode every column with a pre-processor is re-validated
    /// against the new provisional row; only the edited one sees
    /// `has_changed = true`.
    fn prepare_round(
        &self,
        id: &RowId,
        field: &str,
        raw: Value,
    ) -> Result<Vec<PendingRound>, RowEditError> {
        let column = self
            .shared
            .columns
            .get_column(field)
            .ok_or_else(|| RowEditError::UnknownField {
                id: id.clone(),
                field: field.to_string(),
            })?;
        let value = column.parse_value(raw);

        let has_changed = {
            let state = self.lock();
            let row = state
                .registry
                .get(id)
                .ok_or_else(|| RowEditError::NotEditing { id: id.clone() })?;
            value != row.original_row.get(field).cloned().unwrap_or(Value::Null)
        };
        let columns = self.shared.columns.columns();

        let mut published = Vec::new();
        let mut rounds = Vec::new();
        loop {
            let (session, version, base_row) = {
                let state = self.lock();
                let row = state
                    .registry
                    .get(id)
                    .ok_or_else(|| RowEditError::NotEditing { id: id.clone() })?;
                (row.session, row.provisional_version, row.provisional_row.clone())
            };

            // The setter runs unlocked; a concurrent edit may land meanwhile
            let provisional = column.apply_setter(&value, &base_row);

            let mut state = self.lock();
            let row = state
                .registry
                .current_mut(id, session)
                .ok_or_else(|| RowEditError::NotEditing { id: id.clone() })?;
            if row.provisional_version != version {
                tracing::debug!(
                    "Provisional row of id={} changed while setting `{}`, re-applying",
                    id,
                    field
                );
                continue;
            }
            row.provisional_row = provisional.clone();
            row.provisional_version += 1;

            for column in &columns {
                let Some(cell) = row.cells.get_mut(&column.field) else {
                    continue;
                };
                let edited = column.field == field;
                if edited {
                    cell.props.value = value.clone();
                    cell.props.error = false;
                }

                match &column.pre_process {
                    Some(pre_process) => {
                        cell.generation += 1;
                        cell.props.is_processing_props = true;
                        rounds.push(PendingRound {
                            key: RoundKey {
                                id: id.clone(),
                                field: column.field.clone(),
                                session,
                                generation: cell.generation,
                            },
                            edited,
                            pre_process: pre_process.clone(),
                            params: PreProcessParams {
                                id: id.clone(),
                                row: provisional.clone(),
                                has_changed: edited && has_changed,
                                props: cell.props.clone(),
                            },
                        });
                        published.push((column.field.clone(), cell.props.clone()));
                    }
                    None if edited => {
                        cell.generation += 1;
                        cell.props.is_processing_props = false;
                        published.push((column.field.clone(), cell.props.clone()));
                    }
                    None => {}
                }
            }
            break;
        }

        tracing::debug!(
            "Edit of id={} field={} scheduled {} validation round(s)",
            id,
            field,
            rounds.len()
        );
        for (field, props) in published {
            self.emit(GridEvent::EditCellPropsChange {
                id: id.clone(),
                field,
                props,
            });
        }

        Ok(rounds)
    }

    /// Invoke pre-processors; settle ready answers now and deferred ones on the runtime.
    ///
    /// Every round is reconciled, but the handle answers with the edited
    /// cell's own round: `false` if it went stale, otherwise `!error`.
    fn dispatch_rounds(&self, rounds: Vec<PendingRound>, reply: oneshot::Sender<bool>) {
        let mut reply = Some(reply);
        let mut deferred = Vec::new();

        for PendingRound {
            key,
            edited,
            pre_process,
            params,
        } in rounds
        {
            match pre_process(params) {
                MaybeDeferred::Ready(props) => {
                    let valid = self.reconcile(&key, props);
                    if edited {
                        answer(&mut reply, valid);
                    }
                }
                MaybeDeferred::Deferred(future) => deferred.push((key, edited, future)),
            }
        }

        // Edited cell without a pre-processor
        if !deferred.iter().any(|(_, edited, _)| *edited) {
            answer(&mut reply, true);
        }

        if deferred.is_empty() {
            return;
        }

        let controller = self.clone();
        hooks::spawn_detached(async move {
            let mut reply = reply;
            let mut settling: FuturesUnordered<_> = deferred
                .into_iter()
                .map(|(key, edited, future)| async move { (key, edited, future.await) })
                .collect();

            while let Some((key, edited, props)) = settling.next().await {
                let valid = controller.reconcile(&key, props);
                if edited {
                    answer(&mut reply, valid);
                }
            }
        });
    }

    /// Apply a settled pre-processor result if its round is still current
    fn reconcile(&self, key: &RoundKey, returned: CellProps) -> bool {
        let settled = {
            let mut state = self.lock();
            state
                .registry
                .current_mut(&key.id, key.session)
                .and_then(|row| row.cells.get_mut(&key.field))
                .filter(|cell| cell.generation == key.generation)
                .map(|cell| {
                    cell.props.absorb(returned);
                    cell.props.clone()
                })
        };

        match settled {
            Some(props) => {
                let valid = !props.error;
                self.emit(GridEvent::EditCellPropsChange {
                    id: key.id.clone(),
                    field: key.field.clone(),
                    props,
                });
                valid
            }
            None => {
                tracing::debug!(
                    "Discarding stale validation of id={} field={}",
                    key.id,
                    key.field
                );
                false
            }
        }
    }
}

fn answer(reply: &mut Option<oneshot::Sender<bool>>, valid: bool) {
    if let Some(reply) = reply.take() {
        let _ = reply.send(valid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_settles_from_sender() {
        let (reply, mut handle) = EditCellValueHandle::channel();
        assert_eq!(handle.try_result(), None);
        reply.send(true).unwrap();
        assert_eq!(handle.try_result(), Some(true));
        assert_eq!(handle.try_result(), Some(true));
    }

    #[test]
    fn test_dropped_sender_supersedes_handle() {
        let (reply, mut handle) = EditCellValueHandle::channel();
        drop(reply);
        assert!(handle.is_superseded());
        assert_eq!(handle.try_result(), None);
    }

    #[tokio::test]
    async fn test_superseded_handle_never_resolves() {
        let (reply, handle) = EditCellValueHandle::channel();
        drop(reply);
        let outcome = tokio::time::timeout(Duration::from_millis(20), handle).await;
        assert!(outcome.is_err());
    }

    #[test]
    fn test_params_deserialize_camel_case() {
        let params: EditCellValueParams = serde_json::from_str(
            r#"{ "id": 0, "field": "currencyPair", "value": "USD", "debounceMs": 100 }"#,
        )
        .unwrap();
        assert_eq!(
            params,
            EditCellValueParams::new(0, "currencyPair", "USD").debounce_ms(100)
        );
    }
}
