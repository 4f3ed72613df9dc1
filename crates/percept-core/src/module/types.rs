//! Manifest and module definition documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Task parameters handed to a module's `render`.
pub type TaskParams = Map<String, Value>;

/// The list of available modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub modules: Vec<ModuleStub>,
}

/// One manifest entry, pointing at the module's definition document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStub {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub entry: String,
}

/// A module's definition document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDefinition {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub entry_script: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub ui: UiLabels,
}

/// A step of a module definition, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    Intro {
        #[serde(default)]
        text: String,
    },
    Task {
        #[serde(default)]
        params: TaskParams,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiLabels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_label: Option<String>,
}

impl ModuleDefinition {
    pub const DEFAULT_COMPLETE_LABEL: &str = "Mark Done";

    /// Text of the first intro step, if it has any.
    pub fn intro_text(&self) -> Option<&str> {
        self.steps
            .iter()
            .find_map(|s| match s {
                Step::Intro { text } => Some(text.as_str()),
                _ => None,
            })
            .filter(|t| !t.is_empty())
    }

    /// Params of the first task step, or an empty map.
    pub fn task_params(&self) -> TaskParams {
        self.steps
            .iter()
            .find_map(|s| match s {
                Step::Task { params } => Some(params.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn complete_label(&self) -> &str {
        self.ui
            .complete_label
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(Self::DEFAULT_COMPLETE_LABEL)
    }
}

/// Read a numeric task parameter, falling back to `default` when the key is
/// absent, not a number, or zero.
pub fn param_f64(params: &TaskParams, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| *v != 0.0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> ModuleDefinition {
        serde_json::from_value(json!({
            "id": "vision-basic",
            "title": "Vision",
            "entryScript": "vision-basic/module.js",
            "steps": [
                {"type": "intro", "text": "Click the target."},
                {"type": "countdown", "seconds": 3},
                {"type": "task", "params": {"speed": 400}},
                {"type": "task", "params": {"speed": 900}},
                {"type": "intro", "text": "ignored"}
            ],
            "ui": {"completeLabel": "Finished"}
        }))
        .unwrap()
    }

    #[test]
    fn first_intro_and_task_win() {
        let def = definition();
        assert_eq!(def.intro_text(), Some("Click the target."));
        assert_eq!(def.task_params().get("speed"), Some(&json!(400)));
        assert_eq!(def.complete_label(), "Finished");
    }

    #[test]
    fn unknown_step_types_are_tolerated() {
        let def = definition();
        assert_eq!(def.steps[1], Step::Unknown);
    }

    #[test]
    fn missing_steps_and_ui_use_defaults() {
        let def: ModuleDefinition = serde_json::from_value(json!({
            "id": "x",
            "entryScript": "x.js"
        }))
        .unwrap();
        assert_eq!(def.intro_text(), None);
        assert!(def.task_params().is_empty());
        assert_eq!(def.complete_label(), "Mark Done");
    }

    #[test]
    fn manifest_without_modules_is_empty() {
        let manifest: Manifest = serde_json::from_str("{}").unwrap();
        assert!(manifest.modules.is_empty());
    }

    #[test]
    fn param_f64_falls_back() {
        let params = json!({"a": 5, "b": "x", "c": 0})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(param_f64(&params, "a", 1.0), 5.0);
        assert_eq!(param_f64(&params, "b", 1.0), 1.0);
        assert_eq!(param_f64(&params, "c", 1.0), 1.0);
        assert_eq!(param_f64(&params, "d", 2.5), 2.5);
    }
}
