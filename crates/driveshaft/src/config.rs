//! Configuration

use driveshaft_dom::{Selector, SelectorError};
use serde::{Deserialize, Serialize};

/// Selector for elements kept alive across body replacement
pub const DEFAULT_PERMANENT_SELECTOR: &str = "[data-driveshaft-permanent]";

/// Script opt-out marker: `data-driveshaft-eval="false"` keeps a script from
/// being re-executed after a body replacement
pub const EVAL_ATTRIBUTE: &str = "data-driveshaft-eval";

/// Event dispatched at the document after every default reconciliation
pub const RENDER_EVENT: &str = "driveshaft:render";

/// Prefix of identifiers generated for permanent elements without an `id`
pub const PERMANENT_ID_PREFIX: &str = "driveshaft-permanent-";

/// DriveShaft configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Permanent-element selector. Blank means the default.
    pub permanent_selector: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            permanent_selector: DEFAULT_PERMANENT_SELECTOR.to_string(),
        }
    }
}

impl Config {
    /// Load from a JSON object such as `{"permanentSelector": "#player"}`
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parsed permanent-element selector
    pub fn permanent_selector(&self) -> Result<Selector, ConfigError> {
        let source = match self.permanent_selector.trim() {
            "" => DEFAULT_PERMANENT_SELECTOR,
            s => s,
        };
        Ok(Selector::parse(source)?)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid permanent selector: {0}")]
    Selector(#[from] SelectorError),
}
