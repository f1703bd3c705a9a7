//! Row storage consumed by the controller.

use crate::errors::RowEditError;
use crate::row::{Row, RowId};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Committed row storage
pub trait RowStore: Send + Sync {
    fn get_row(&self, id: &RowId) -> Option<Row>;

    fn update_row(&self, id: &RowId, row: Row);

    /// Row identities in display order
    fn row_ids(&self) -> Vec<RowId>;
}

/// Ordered in-memory row store
#[derive(Debug, Default)]
pub struct MemoryRowStore {
    rows: Mutex<Vec<(RowId, Row)>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from rows carrying their identity in an `id` field
    pub fn from_rows(rows: Vec<Row>) -> Result<Self, RowEditError> {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                RowId::of(&row)
                    .map(|id| (id, row))
                    .ok_or(RowEditError::MissingRowId { index })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rows: Mutex::new(rows),
        })
    }

    /// All rows in order
    pub fn snapshot(&self) -> Vec<Row> {
        self.lock().iter().map(|(_, row)| row.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(RowId, Row)>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RowStore for MemoryRowStore {
    fn get_row(&self, id: &RowId) -> Option<Row> {
        self.lock()
            .iter()
            .find(|(row_id, _)| row_id == id)
            .map(|(_, row)| row.clone())
    }

    fn update_row(&self, id: &RowId, row: Row) {
        let mut rows = self.lock();
        match rows.iter_mut().find(|(row_id, _)| row_id == id) {
            Some((_, existing)) => *existing = row,
            None => rows.push((id.clone(), row)),
        }
    }

    fn row_ids(&self) -> Vec<RowId> {
        self.lock().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Row> {
        vec![
            json!({ "id": 0, "name": "a" }).as_object().unwrap().clone(),
            json!({ "id": 1, "name": "b" }).as_object().unwrap().clone(),
        ]
    }

    #[test]
    fn test_from_rows_keeps_order() {
        let store = MemoryRowStore::from_rows(rows()).unwrap();
        assert_eq!(store.row_ids(), vec![RowId::from(0), RowId::from(1)]);
        assert_eq!(store.get_row(&RowId::from(1)).unwrap()["name"], json!("b"));
    }

    #[test]
    fn test_update_replaces_in_place() {
        let store = MemoryRowStore::from_rows(rows()).unwrap();
        let mut row = store.get_row(&RowId::from(0)).unwrap();
        row.insert("name".into(), json!("z"));
        store.update_row(&RowId::from(0), row);

        assert_eq!(store.row_ids(), vec![RowId::from(0), RowId::from(1)]);
        assert_eq!(store.snapshot()[0]["name"], json!("z"));
    }

    #[test]
    fn test_row_without_id_is_rejected() {
        let rows = vec![json!({ "name": "a" }).as_object().unwrap().clone()];
        let err = MemoryRowStore::from_rows(rows).unwrap_err();
        assert_eq!(err, RowEditError::MissingRowId { index: 0 });
    }
}
