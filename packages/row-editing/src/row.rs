//! Row identity and row values.
//!
//! Rows are loosely typed field maps. The grid never interprets cell values
//! itself; parsers and setters supplied by the column definitions do.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use serde_json::Value;

/// A row as seen by the controller: field name → cell value
pub type Row = serde_json::Map<String, Value>;

/// Stable, externally defined row identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Number(i64),
    Text(String),
}

impl RowId {
    /// Read the identity stored in a row's `id` field
    pub fn of(row: &Row) -> Option<RowId> {
        match row.get("id")? {
            Value::Number(n) => n.as_i64().map(RowId::Number),
            Value::String(s) => Some(RowId::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Number(n) => write!(f, "{}", n),
            RowId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RowId {
    fn from(n: i64) -> Self {
        RowId::Number(n)
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        RowId::Text(s.to_string())
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        RowId::Text(s)
    }
}

/// A single cell address: row identity plus column field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellCoords {
    pub id: RowId,
    pub field: String,
}

impl CellCoords {
    pub fn new(id: impl Into<RowId>, field: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_id_display_is_bare() {
        assert_eq!(RowId::from(0).to_string(), "0");
        assert_eq!(RowId::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_row_id_of_reads_id_field() {
        let row = json!({ "id": 7, "name": "x" });
        let row = row.as_object().unwrap();
        assert_eq!(RowId::of(row), Some(RowId::Number(7)));

        let row = json!({ "id": "r-1" });
        assert_eq!(RowId::of(row.as_object().unwrap()), Some(RowId::from("r-1")));

        let row = json!({ "id": true });
        assert_eq!(RowId::of(row.as_object().unwrap()), None);
    }

    #[test]
    fn test_row_id_deserializes_untagged() {
        let ids: Vec<RowId> = serde_json::from_str(r#"[1, "two"]"#).unwrap();
        assert_eq!(ids, vec![RowId::Number(1), RowId::from("two")]);
    }
}
