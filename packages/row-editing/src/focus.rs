//! # Focus Routing
//!
//! Picks the cell that receives focus once a row leaves edit mode.
//!
//! Navigation only considers what the grid currently shows: visible columns
//! and the rows of the current page. Moving past an edge keeps focus on the
//! cell the stop was anchored on; nothing wraps.

use crate::columns::ColumnRegistry;
use crate::row::{CellCoords, RowId};
use crate::store::RowStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Direction of the focus move requested by a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellToFocusAfter {
    Left,
    Right,
    Below,
}

/// What the grid currently shows
pub trait GridView: Send + Sync {
    /// Visible column fields, left to right
    fn visible_fields(&self) -> Vec<String>;

    /// Row identities on the current page, top to bottom
    fn visible_row_ids(&self) -> Vec<RowId>;
}

/// Receives focus requests
pub trait FocusSink: Send + Sync {
    fn set_cell_focus(&self, id: &RowId, field: &str);
}

/// View over a row store and a column registry with optional pagination
pub struct PagedView {
    rows: Arc<dyn RowStore>,
    columns: Arc<dyn ColumnRegistry>,
    page_size: Option<usize>,
    page: usize,
}

impl PagedView {
    /// Unpaginated view showing every row
    pub fn new(rows: Arc<dyn RowStore>, columns: Arc<dyn ColumnRegistry>) -> Self {
        Self {
            rows,
            columns,
            page_size: None,
            page: 0,
        }
    }

    /// Show page `page` (zero-based) of `page_size` rows
    pub fn paginated(mut self, page_size: usize, page: usize) -> Self {
        self.page_size = Some(page_size);
        self.page = page;
        self
    }
}

impl GridView for PagedView {
    fn visible_fields(&self) -> Vec<String> {
        self.columns
            .columns()
            .into_iter()
            .filter(|column| self.columns.is_visible(&column.field))
            .map(|column| column.field)
            .collect()
    }

    fn visible_row_ids(&self) -> Vec<RowId> {
        let ids = self.rows.row_ids();
        match self.page_size {
            Some(size) if size > 0 => ids.into_iter().skip(size * self.page).take(size).collect(),
            _ => ids,
        }
    }
}

/// Computes focus targets on a [`GridView`]
pub struct FocusRouter;

impl FocusRouter {
    /// Cell to focus after stopping the row `id` anchored on `field`.
    ///
    /// `None` when no direction is requested or the anchor is not visible.
    pub fn next_cell(
        view: &dyn GridView,
        id: &RowId,
        field: &str,
        direction: Option<CellToFocusAfter>,
    ) -> Option<CellCoords> {
        let direction = direction?;
        let fields = view.visible_fields();
        let rows = view.visible_row_ids();

        let column = fields.iter().position(|f| f == field)?;
        let row = rows.iter().position(|r| r == id)?;

        let (row, column) = match direction {
            CellToFocusAfter::Right if column + 1 < fields.len() => (row, column + 1),
            CellToFocusAfter::Left if column > 0 => (row, column - 1),
            CellToFocusAfter::Below if row + 1 < rows.len() => (row + 1, column),
            _ => (row, column),
        };

        Some(CellCoords {
            id: rows[row].clone(),
            field: fields[column].clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedView {
        fields: Vec<&'static str>,
        rows: Vec<i64>,
    }

    impl GridView for FixedView {
        fn visible_fields(&self) -> Vec<String> {
            self.fields.iter().map(|f| f.to_string()).collect()
        }

        fn visible_row_ids(&self) -> Vec<RowId> {
            self.rows.iter().copied().map(RowId::from).collect()
        }
    }

    fn view() -> FixedView {
        FixedView {
            fields: vec!["id", "currencyPair", "price1M"],
            rows: vec![0, 1],
        }
    }

    #[test]
    fn test_right_moves_to_next_column() {
        let target = FocusRouter::next_cell(
            &view(),
            &RowId::from(0),
            "currencyPair",
            Some(CellToFocusAfter::Right),
        );
        assert_eq!(target, Some(CellCoords::new(0, "price1M")));
    }

    #[test]
    fn test_left_moves_to_previous_column() {
        let target =
            FocusRouter::next_cell(&view(), &RowId::from(0), "price1M", Some(CellToFocusAfter::Left));
        assert_eq!(target, Some(CellCoords::new(0, "currencyPair")));
    }

    #[test]
    fn test_below_moves_to_next_row() {
        let target = FocusRouter::next_cell(
            &view(),
            &RowId::from(0),
            "currencyPair",
            Some(CellToFocusAfter::Below),
        );
        assert_eq!(target, Some(CellCoords::new(1, "currencyPair")));
    }

    #[test]
    fn test_edges_keep_focus_in_place() {
        let view = view();
        let right =
            FocusRouter::next_cell(&view, &RowId::from(1), "price1M", Some(CellToFocusAfter::Right));
        assert_eq!(right, Some(CellCoords::new(1, "price1M")));

        let left = FocusRouter::next_cell(&view, &RowId::from(0), "id", Some(CellToFocusAfter::Left));
        assert_eq!(left, Some(CellCoords::new(0, "id")));

        let below =
            FocusRouter::next_cell(&view, &RowId::from(1), "price1M", Some(CellToFocusAfter::Below));
        assert_eq!(below, Some(CellCoords::new(1, "price1M")));
    }

    #[test]
    fn test_no_direction_requests_nothing() {
        assert_eq!(
            FocusRouter::next_cell(&view(), &RowId::from(0), "price1M", None),
            None
        );
    }
}
