//! Plain-text rendering of host panels and adapter status.

use std::fmt::Write as _;

use percept_core::adapter::AdapterStatus;
use percept_core::host::Panel;

/// Render a host panel for the terminal.
pub fn render_panel(panel: &Panel) -> String {
    let mut out = String::new();
    match panel {
        Panel::Blank => {}
        Panel::Home { modules } => {
            out.push_str("Modules:\n");
            if modules.is_empty() {
                out.push_str("  (none available)\n");
            }
            for m in modules {
                let _ = writeln!(out, "  {:<20} {}", m.id, m.title);
            }
        }
        Panel::Unavailable { module_id } => {
            let _ = writeln!(out, "Module not available: {module_id}");
        }
        Panel::Loading { module_id, title } => {
            let title = if title.is_empty() { module_id } else { title };
            let _ = writeln!(out, "Loading {title}...");
        }
        Panel::Module(p) => {
            let _ = writeln!(out, "{}", p.title);
            if let Some(intro) = &p.intro {
                let _ = writeln!(out, "{intro}");
            }
            let _ = writeln!(out, "Completed: {}", p.completions);
            let _ = writeln!(out, "[{}] type `done` to record a completion", p.complete_label);
        }
        Panel::Error { message } => {
            let _ = writeln!(out, "Error: {message}");
        }
        Panel::Progress(p) => {
            out.push_str("Progress:\n");
            if p.rows.is_empty() {
                out.push_str("  (no modules)\n");
            }
            for row in &p.rows {
                let _ = writeln!(out, "  {:<24} {}", row.title, row.count);
            }
            let last = if p.last_done.is_empty() { "never" } else { p.last_done.as_str() };
            let _ = writeln!(out, "Last completion: {last}");
        }
    }
    out
}

/// Render the adapter status list shown next to progress.
pub fn render_adapters(statuses: &[AdapterStatus], top_error: &str) -> String {
    let mut out = String::from("Adapters:\n");
    if !top_error.is_empty() {
        let _ = writeln!(out, "  adapter service unavailable: {top_error}");
        return out;
    }
    if statuses.is_empty() {
        out.push_str("  (none)\n");
    }
    for s in statuses {
        let _ = writeln!(
            out,
            "  {} ({} {}) connected={} polling={}",
            s.descriptor.id,
            s.descriptor.name,
            s.descriptor.version,
            s.state.connected,
            s.polling
        );
        if !s.state.error.is_empty() {
            let _ = writeln!(out, "    error: {}", s.state.error);
        }
        if let Some(last) = &s.state.last_state {
            let _ = writeln!(out, "    last: {last}");
        }
    }
    out
}
