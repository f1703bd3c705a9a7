use serde::{Deserialize, Serialize};

/// Behaviour switches for the row editing controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditingConfig {
    /// Debounce applied to `set_edit_cell_value` calls that do not specify one
    #[serde(default)]
    pub default_debounce_ms: u64,

    /// Publish `rowEditStop` when focus leaves an editing row
    #[serde(default = "default_true")]
    pub stop_on_focus_out: bool,

    /// Tab moves between editable cells and only stops on the row edge.
    /// When false, every Tab stops the row and focuses the next cell.
    #[serde(default)]
    pub tab_stops_at_row_edge: bool,
}

fn default_true() -> bool {
    true
}

impl EditingConfig {
    /// Parse a config from its JSON form
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            default_debounce_ms: 0,
            stop_on_focus_out: true,
            tab_stops_at_row_edge: false,
        }
    }
}
