//! Pipeline context - shared state and variables

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Execution context for a stage
///
/// Contains shared variables and the output of stages that already ran.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineContext {
    /// Global and user-defined variables
    pub variables: HashMap<String, String>,

    /// Outputs from completed stages (stage_id -> output)
    pub stage_outputs: HashMap<String, String>,

    /// The current stage being executed (if any)
    pub current_stage_id: Option<String>,
}

impl PipelineContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, key: String, value: String) {
        self.variables.insert(key, value);
    }

    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    pub fn set_stage_output(&mut self, stage_id: &str, output: String) {
        self.stage_outputs.insert(stage_id.to_string(), output);
    }

    pub fn get_stage_output(&self, stage_id: &str) -> Option<&String> {
        self.stage_outputs.get(stage_id)
    }

    /// Get all variables available for template rendering
    pub fn get_rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = self.variables.clone();

        for (stage_id, output) in &self.stage_outputs {
            vars.insert(format!("stages.{}.output", stage_id), output.trim().to_string());
        }

        if let Some(ref current_stage) = self.current_stage_id {
            vars.insert("current_stage".to_string(), current_stage.clone());
        }

        vars
    }
}

/// `{{ name }}` with optional inner whitespace
const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([\w.\-]+)\s*\}\}";

/// Variable values may reference other variables up to this depth
const MAX_NESTING: usize = 8;

fn placeholder() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).ok())
        .as_ref()
}

/// Replace `{{ name }}` placeholders with variable values
///
/// The template is scanned once, left to right. Placeholders inside a
/// value are expanded too; unknown names are left as written.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    render_nested(template, variables, 0)
}

fn render_nested(template: &str, variables: &HashMap<String, String>, depth: usize) -> String {
    let Some(re) = placeholder() else {
        return template.to_string();
    };

    re.replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
        Some(value) if depth < MAX_NESTING => render_nested(value, variables, depth + 1),
        Some(value) => value.clone(),
        None => caps[0].to_string(),
    })
    .into_owned()
}
