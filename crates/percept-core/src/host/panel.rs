//! What the host currently displays.

use serde::Serialize;

/// The view the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "module_id", rename_all = "snake_case")]
pub enum View {
    Home,
    Module(String),
    Progress,
}

impl View {
    /// Parse `home`, `progress` or `module:<id>`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "home" => Some(Self::Home),
            "progress" => Some(Self::Progress),
            _ => s
                .strip_prefix("module:")
                .filter(|id| !id.is_empty())
                .map(|id| Self::Module(id.to_string())),
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home => f.write_str("home"),
            Self::Module(id) => write!(f, "module:{id}"),
            Self::Progress => f.write_str("progress"),
        }
    }
}

/// Where the module lifecycle stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "module_id", rename_all = "snake_case")]
pub enum HostPhase {
    Idle,
    ManifestLoading,
    Ready,
    ModuleLoading(String),
    ModuleActive(String),
}

/// A module as listed on the home panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleEntry {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModulePanel {
    pub module_id: String,
    pub title: String,
    pub intro: Option<String>,
    pub complete_label: String,
    pub completions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressRow {
    pub module_id: String,
    pub title: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressPanel {
    pub rows: Vec<ProgressRow>,
    /// Empty when nothing was completed yet.
    pub last_done: String,
}

/// The rendered content of the host's main area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum Panel {
    /// Nothing rendered yet.
    Blank,
    Home { modules: Vec<ModuleEntry> },
    /// The requested module id is not in the manifest.
    Unavailable { module_id: String },
    Loading { module_id: String, title: String },
    Module(ModulePanel),
    Error { message: String },
    Progress(ProgressPanel),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_parse_and_display() {
        for view in [View::Home, View::Progress, View::Module("vision-basic".into())] {
            assert_eq!(View::parse(&view.to_string()), Some(view));
        }
        assert_eq!(View::parse("module:"), None);
        assert_eq!(View::parse("settings"), None);
    }
}
