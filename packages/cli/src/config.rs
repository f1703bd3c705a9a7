use anyhow::Context;
use gridline_row_editing::{
    CellCoords, CellProps, ColumnEditSpec, ColumnSet, EditCellValueParams, EditingConfig,
    MaybeDeferred, Modifiers, PreProcessParams, Row, RowId, StartRowEditModeParams,
    StopRowEditModeParams, Value,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::path::Path;

pub const DEFAULT_FIXTURE_NAME: &str = "gridline.fixture.json";

/// Grid fixture: editing config, columns, rows and a script of user actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    #[serde(default)]
    pub config: EditingConfig,

    pub columns: Vec<ColumnConfig>,

    pub rows: Vec<Row>,

    /// Fields hidden from the view
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,

    /// When set, every commit is rejected with this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_commits: Option<String>,

    #[serde(default)]
    pub script: Vec<Action>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page_size: usize,
    #[serde(default)]
    pub page: usize,
}

/// Declarative column definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnConfig {
    pub field: String,

    #[serde(default)]
    pub editable: bool,

    /// Trim surrounding whitespace when the value is written into the row
    #[serde(default)]
    pub trim: bool,

    /// Parse input strings as numbers
    #[serde(default)]
    pub number: bool,

    /// Flag empty values as invalid
    #[serde(default)]
    pub required: bool,

    /// Flag values longer than this as invalid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl ColumnConfig {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ..Self::default()
        }
    }

    pub fn to_column(&self) -> ColumnEditSpec {
        let mut column = ColumnEditSpec::new(&self.field).editable(self.editable);

        if self.number {
            column = column.with_value_parser(parse_number);
        }

        if self.trim {
            let field = self.field.clone();
            column = column.with_value_setter(move |value, row| {
                let mut row = row.clone();
                let value = match value {
                    Value::String(s) => Value::String(s.trim().to_string()),
                    other => other.clone(),
                };
                row.insert(field.clone(), value);
                row
            });
        }

        if self.required || self.max_length.is_some() {
            let required = self.required;
            let max_length = self.max_length;
            column = column.with_pre_process(move |params: PreProcessParams| {
                let invalid = violates(&params.props.value, required, max_length);
                MaybeDeferred::Ready(CellProps::new(params.props.value).with_error(invalid))
            });
        }

        column
    }
}

fn parse_number(value: Value) -> Value {
    let parsed = value.as_str().and_then(|s| s.trim().parse::<f64>().ok());
    match parsed {
        Some(n) if n.fract() == 0.0 && n.abs() < 1e15 => json!(n as i64),
        Some(n) => serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(value),
        None => value,
    }
}

fn violates(value: &Value, required: bool, max_length: Option<usize>) -> bool {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };

    (required && text.is_empty()) || max_length.is_some_and(|max| text.chars().count() > max)
}

/// One step of a replay script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    DoubleClick {
        id: RowId,
        field: String,
    },
    KeyDown {
        id: RowId,
        field: String,
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
    },
    FocusOut {
        id: RowId,
        field: String,
        #[serde(default)]
        next: Option<CellCoords>,
    },
    Start(StartRowEditModeParams),
    SetValue(EditCellValueParams),
    Stop(StopRowEditModeParams),
    /// Let timers run
    Wait {
        ms: u64,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::DoubleClick { id, field } => write!(f, "double-click ({}, {})", id, field),
            Action::KeyDown {
                id,
                field,
                key,
                modifiers,
            } => {
                let shift = if modifiers.shift { "Shift+" } else { "" };
                write!(f, "key {}{} on ({}, {})", shift, key, id, field)
            }
            Action::FocusOut { id, field, next } => match next {
                Some(next) => write!(f, "focus ({}, {}) → ({}, {})", id, field, next.id, next.field),
                None => write!(f, "focus leaves ({}, {})", id, field),
            },
            Action::Start(params) => write!(f, "start row {}", params.id),
            Action::SetValue(params) => {
                write!(f, "set ({}, {}) = {}", params.id, params.field, params.value)
            }
            Action::Stop(params) => write!(f, "stop row {}", params.id),
            Action::Wait { ms } => write!(f, "wait {}ms", ms),
        }
    }
}

impl Fixture {
    /// Load a fixture file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read fixture {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn column_set(&self) -> ColumnSet {
        ColumnSet::new(self.columns.iter().map(ColumnConfig::to_column).collect())
            .with_hidden(self.hidden.iter().cloned())
    }

    /// Double-click a cell, retype it and Tab out
    pub fn example() -> Self {
        let rows = vec![
            json!({ "id": 0, "currencyPair": "USDGBP", "price1M": 1 }),
            json!({ "id": 1, "currencyPair": "USDEUR", "price1M": 2 }),
        ]
        .into_iter()
        .filter_map(|row| row.as_object().cloned())
        .collect();

        Self {
            config: EditingConfig::default(),
            columns: vec![
                ColumnConfig::new("id"),
                ColumnConfig {
                    editable: true,
                    required: true,
                    max_length: Some(7),
                    ..ColumnConfig::new("currencyPair")
                },
                ColumnConfig {
                    editable: true,
                    number: true,
                    ..ColumnConfig::new("price1M")
                },
                ColumnConfig::new("price2M"),
            ],
            rows,
            hidden: vec![],
            pagination: None,
            reject_commits: None,
            script: vec![
                Action::DoubleClick {
                    id: RowId::from(0),
                    field: "currencyPair".to_string(),
                },
                Action::SetValue(EditCellValueParams::new(0, "currencyPair", "USD GBP")),
                Action::KeyDown {
                    id: RowId::from(0),
                    field: "currencyPair".to_string(),
                    key: "Tab".to_string(),
                    modifiers: Modifiers::default(),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixture() {
        let json = r#"{
            "config": { "defaultDebounceMs": 50 },
            "columns": [
                { "field": "id" },
                { "field": "currencyPair", "editable": true, "trim": true, "required": true }
            ],
            "rows": [{ "id": 0, "currencyPair": "USDGBP" }],
            "pagination": { "pageSize": 2 },
            "script": [
                { "action": "doubleClick", "id": 0, "field": "currencyPair" },
                { "action": "setValue", "id": 0, "field": "currencyPair", "value": " usd ", "debounceMs": 0 },
                { "action": "keyDown", "id": 0, "field": "currencyPair", "key": "Tab", "modifiers": { "shift": true } },
                { "action": "stop", "id": 0, "ignoreModifications": true },
                { "action": "wait", "ms": 100 }
            ]
        }"#;

        let fixture = Fixture::from_json(json).unwrap();
        assert_eq!(fixture.config.default_debounce_ms, 50);
        assert!(fixture.config.stop_on_focus_out);
        assert_eq!(fixture.columns.len(), 2);
        assert!(fixture.columns[1].trim);
        assert_eq!(
            fixture.pagination,
            Some(Pagination {
                page_size: 2,
                page: 0
            })
        );
        assert_eq!(fixture.script.len(), 5);
        assert_eq!(
            fixture.script[1],
            Action::SetValue(EditCellValueParams::new(0, "currencyPair", " usd ").debounce_ms(0))
        );
        assert_eq!(
            fixture.script[3],
            Action::Stop(StopRowEditModeParams::new(0).ignore_modifications(true))
        );
        assert!(matches!(
            &fixture.script[2],
            Action::KeyDown { modifiers, .. } if modifiers.shift
        ));
    }

    #[test]
    fn test_example_round_trips() {
        let json = serde_json::to_string_pretty(&Fixture::example()).unwrap();
        let fixture = Fixture::from_json(&json).unwrap();
        assert_eq!(fixture.script, Fixture::example().script);
        assert_eq!(fixture.columns, Fixture::example().columns);
    }

    #[test]
    fn test_declarative_column_hooks() {
        let column = ColumnConfig {
            editable: true,
            trim: true,
            number: true,
            ..ColumnConfig::new("price1M")
        }
        .to_column();

        assert_eq!(column.parse_value(json!(" 42 ")), json!(42));
        assert_eq!(column.parse_value(json!("1.5")), json!(1.5));
        assert_eq!(column.parse_value(json!("abc")), json!("abc"));

        let row = column.apply_setter(&json!(" x "), &Row::new());
        assert_eq!(row["price1M"], json!("x"));
    }

    #[test]
    fn test_validation_rules() {
        assert!(violates(&json!(""), true, None));
        assert!(violates(&Value::Null, true, None));
        assert!(!violates(&json!("USD"), true, None));
        assert!(violates(&json!("USD GBP!"), false, Some(7)));
        assert!(!violates(&json!("USD GBP"), false, Some(7)));
    }
}
