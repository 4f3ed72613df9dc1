//! `percept modules`, `percept show`, `percept run` and `percept done`.

use std::time::Duration;

use anyhow::{Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};

use percept_core::host::{ModuleHost, Panel, View};

use crate::app::App;
use crate::render::render_panel;

/// How often `run` prints new module output.
const OUTPUT_REFRESH: Duration = Duration::from_millis(200);

/// List the modules from the manifest with their completion counts.
pub fn run_modules(app: &App) -> Result<()> {
    let modules = app.host.modules();
    if modules.is_empty() {
        println!("No modules found in {}.", app.config.modules);
        return Ok(());
    }
    let progress = app.host.progress();
    println!("{:<20} {:<28} COMPLETED", "ID", "TITLE");
    for m in modules {
        println!("{:<20} {:<28} {}", m.id, m.title, progress.count(&m.id));
    }
    Ok(())
}

/// Render one view (`home`, `progress` or `module:<id>`) and print it.
pub async fn run_show(app: &App, view: &str) -> Result<()> {
    let Some(view) = View::parse(view) else {
        bail!("unknown view: {view} (expected home, progress or module:<id>)");
    };
    app.host.set_view(view).await;
    print!("{}", render_panel(&app.host.panel()));
    if let Some(container) = app.host.active_container() {
        for line in container.drain_lines() {
            println!("{line}");
        }
    }
    app.host.shutdown();
    Ok(())
}

/// Record one completion of `module_id` without running it.
pub fn run_done(app: &App, module_id: &str) -> Result<()> {
    ensure_known(&app.host, module_id)?;
    let count = app.host.mark_done(module_id)?;
    println!("{module_id}: {count} completion(s)");
    Ok(())
}

fn ensure_known(host: &ModuleHost, module_id: &str) -> Result<()> {
    if !host.modules().iter().any(|m| m.id == module_id) {
        bail!("module {module_id} is not in the manifest");
    }
    Ok(())
}

/// Run `module_id` interactively.
///
/// Input lines are forwarded to the module as actions, except the host
/// commands `done`, `progress` and `quit`. Module output is printed as it
/// arrives.
pub async fn run_module(app: &App, module_id: &str) -> Result<()> {
    app.host.set_view(View::Module(module_id.to_string())).await;
    let panel = app.host.panel();
    print!("{}", render_panel(&panel));
    let Panel::Module(mut shown) = panel else {
        bail!("module {module_id} could not be started");
    };
    println!("Host commands: done | progress | quit");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut refresh = tokio::time::interval(OUTPUT_REFRESH);
    let mut last_status: Option<String> = None;

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                print_module_output(&app.host, &mut last_status);
                if let Panel::Module(p) = app.host.panel() {
                    if p.completions != shown.completions {
                        println!("Completed: {}", p.completions);
                        shown = p;
                    }
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let action = line.trim();
                match action {
                    "" => {}
                    "quit" | "exit" => break,
                    "done" => {
                        let count = app.host.mark_done(module_id)?;
                        println!("Completed: {count}");
                        shown.completions = count;
                    }
                    "progress" => {
                        let progress = app.host.progress();
                        println!("{module_id}: {} completion(s)", progress.count(module_id));
                    }
                    _ => {
                        if !app.host.dispatch(action) {
                            println!("module is not accepting actions");
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    print_module_output(&app.host, &mut last_status);
    app.host.shutdown();
    Ok(())
}

fn print_module_output(host: &ModuleHost, last_status: &mut Option<String>) {
    let Some(container) = host.active_container() else {
        return;
    };
    let status = container.status();
    if status.is_some() && status != *last_status {
        if let Some(s) = &status {
            println!("* {s}");
        }
        *last_status = status;
    }
    for line in container.drain_lines() {
        println!("{line}");
    }
}
