//! # Column Definitions
//!
//! Per-column editing configuration. Columns are supplied by the grid and are
//! read-only to the controller for the duration of an edit session.

use crate::hooks::MaybeDeferred;
use crate::pipeline::PreProcessParams;
use crate::row::{Row, Value};
use crate::state::CellProps;
use std::collections::HashSet;
use std::sync::Arc;

/// Converts the raw input value into the stored value
pub type ValueParser = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Produces the row that results from writing `value` into it
pub type ValueSetter = Arc<dyn Fn(&Value, &Row) -> Row + Send + Sync>;

/// Validates or decorates the props of an edited cell
pub type PreProcessor = Arc<dyn Fn(PreProcessParams) -> MaybeDeferred<CellProps> + Send + Sync>;

/// Editing configuration of one column
#[derive(Clone)]
pub struct ColumnEditSpec {
    pub field: String,
    pub editable: bool,
    pub value_parser: Option<ValueParser>,
    pub value_setter: Option<ValueSetter>,
    pub pre_process: Option<PreProcessor>,
}

impl ColumnEditSpec {
    /// Read-only column with no hooks
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            editable: false,
            value_parser: None,
            value_setter: None,
            pre_process: None,
        }
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_value_parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.value_parser = Some(Arc::new(parser));
        self
    }

    pub fn with_value_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&Value, &Row) -> Row + Send + Sync + 'static,
    {
        self.value_setter = Some(Arc::new(setter));
        self
    }

    pub fn with_pre_process<F>(mut self, pre_process: F) -> Self
    where
        F: Fn(PreProcessParams) -> MaybeDeferred<CellProps> + Send + Sync + 'static,
    {
        self.pre_process = Some(Arc::new(pre_process));
        self
    }

    /// Run the value parser, or pass the raw value through
    pub fn parse_value(&self, raw: Value) -> Value {
        match &self.value_parser {
            Some(parser) => parser(raw),
            None => raw,
        }
    }

    /// Run the value setter, or assign `value` to this column's field
    pub fn apply_setter(&self, value: &Value, row: &Row) -> Row {
        match &self.value_setter {
            Some(setter) => setter(value, row),
            None => {
                let mut next = row.clone();
                next.insert(self.field.clone(), value.clone());
                next
            }
        }
    }
}

impl std::fmt::Debug for ColumnEditSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnEditSpec")
            .field("field", &self.field)
            .field("editable", &self.editable)
            .field("value_parser", &self.value_parser.is_some())
            .field("value_setter", &self.value_setter.is_some())
            .field("pre_process", &self.pre_process.is_some())
            .finish()
    }
}

/// Column lookup consumed by the controller
pub trait ColumnRegistry: Send + Sync {
    /// Look up a column by field
    fn get_column(&self, field: &str) -> Option<ColumnEditSpec>;

    /// All columns in declaration order
    fn columns(&self) -> Vec<ColumnEditSpec>;

    /// Whether the column is currently shown
    fn is_visible(&self, _field: &str) -> bool {
        true
    }

    fn is_editable(&self, field: &str) -> bool {
        self.get_column(field).map(|c| c.editable).unwrap_or(false)
    }
}

/// Fixed list of columns plus a column visibility model
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    columns: Vec<ColumnEditSpec>,
    hidden: HashSet<String>,
}

impl ColumnSet {
    pub fn new(columns: Vec<ColumnEditSpec>) -> Self {
        Self {
            columns,
            hidden: HashSet::new(),
        }
    }

    /// Hide the given fields
    pub fn with_hidden<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl ColumnRegistry for ColumnSet {
    fn get_column(&self, field: &str) -> Option<ColumnEditSpec> {
        self.columns.iter().find(|c| c.field == field).cloned()
    }

    fn columns(&self) -> Vec<ColumnEditSpec> {
        self.columns.clone()
    }

    fn is_visible(&self, field: &str) -> bool {
        !self.hidden.contains(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> Row {
        json!({ "id": 0, "currencyPair": "USDGBP" })
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_default_setter_assigns_field() {
        let column = ColumnEditSpec::new("currencyPair").editable(true);
        let next = column.apply_setter(&json!("USD GBP"), &row());
        assert_eq!(next.get("currencyPair"), Some(&json!("USD GBP")));
        assert_eq!(next.get("id"), Some(&json!(0)));
    }

    #[test]
    fn test_custom_setter_and_parser() {
        let column = ColumnEditSpec::new("currencyPair")
            .with_value_parser(|raw| json!(raw.as_str().unwrap_or_default().to_lowercase()))
            .with_value_setter(|value, row| {
                let mut next = row.clone();
                next.insert(
                    "currencyPair".into(),
                    json!(value.as_str().unwrap_or_default().trim()),
                );
                next
            });

        let value = column.parse_value(json!(" USD GBP "));
        assert_eq!(value, json!(" usd gbp "));

        let next = column.apply_setter(&value, &row());
        assert_eq!(next.get("currencyPair"), Some(&json!("usd gbp")));
    }

    #[test]
    fn test_column_set_visibility() {
        let set = ColumnSet::new(vec![
            ColumnEditSpec::new("id"),
            ColumnEditSpec::new("name").editable(true),
        ])
        .with_hidden(["id"]);

        assert!(!set.is_visible("id"));
        assert!(set.is_visible("name"));
        assert!(set.is_editable("name"));
        assert!(!set.is_editable("id"));
        assert!(!set.is_editable("missing"));
        assert_eq!(set.len(), 2);
    }
}
