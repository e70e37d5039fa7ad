//! Script execution seam
//!
//! The DOM never runs code itself. Scripts that become ready are described
//! by a `ScriptSource` and handed to whatever `ScriptExecutor` the document
//! carries.

use url::Url;

use crate::NodeId;

/// Everything an engine needs to run one script element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub element: NodeId,
    /// Resolved `src`, for external scripts
    pub src: Option<Url>,
    /// Inline text
    pub text: String,
    pub nonce: Option<String>,
    /// Raw `type` attribute
    pub script_type: Option<String>,
}

impl ScriptSource {
    pub fn is_external(&self) -> bool {
        self.src.is_some()
    }

    pub fn is_module(&self) -> bool {
        self.script_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("module"))
    }

    /// Whether the element is a data block (e.g. `application/json`) that
    /// browsers never execute
    pub fn is_data_block(&self) -> bool {
        let Some(ty) = self.script_type.as_deref().map(str::trim) else {
            return false;
        };
        if ty.is_empty() || self.is_module() {
            return false;
        }
        let essence = ty.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        !matches!(
            essence.as_str(),
            "text/javascript"
                | "application/javascript"
                | "application/ecmascript"
                | "application/x-javascript"
                | "text/ecmascript"
                | "text/jscript"
        )
    }
}

/// Runs scripts on behalf of a document
pub trait ScriptExecutor {
    fn execute(&mut self, script: &ScriptSource);
}

impl<F: FnMut(&ScriptSource)> ScriptExecutor for F {
    fn execute(&mut self, script: &ScriptSource) {
        self(script)
    }
}
