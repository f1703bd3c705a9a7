//! Error types for the row editing controller

use crate::row::RowId;
use thiserror::Error;

/// Programmer errors raised synchronously by the controller API.
///
/// Validation failures and commit-hook failures are not represented here:
/// the former are cell state flags, the latter are forwarded to
/// `on_process_row_update_error`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowEditError {
    #[error("The row with id={id} is not in view mode.")]
    AlreadyEditing { id: RowId },

    #[error("The row with id={id} is not in edit mode.")]
    NotEditing { id: RowId },

    #[error("No row with id={id} exists in the row store.")]
    UnknownRow { id: RowId },

    #[error("The row with id={id} has no column with field `{field}`.")]
    UnknownField { id: RowId, field: String },

    #[error("The column `{field}` is not editable.")]
    NotEditable { field: String },

    #[error("Row at index {index} has no usable `id` field")]
    MissingRowId { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_row() {
        let err = RowEditError::AlreadyEditing { id: RowId::from(0) };
        assert_eq!(err.to_string(), "The row with id=0 is not in view mode.");

        let err = RowEditError::NotEditing { id: RowId::from(0) };
        assert_eq!(err.to_string(), "The row with id=0 is not in edit mode.");
    }
}
