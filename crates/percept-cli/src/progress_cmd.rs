//! `percept progress`: show or reset completion counters.

use anyhow::Result;

use percept_core::host::View;

use crate::app::App;
use crate::render::{render_adapters, render_panel};

/// Print the progress panel followed by the adapter status list.
pub async fn run_show(app: &App) -> Result<()> {
    app.host.set_view(View::Progress).await;
    print!("{}", render_panel(&app.host.panel()));
    println!();

    app.adapters.list_adapters().await;
    print!(
        "{}",
        render_adapters(&app.adapters.snapshot(), &app.adapters.top_error())
    );
    Ok(())
}

pub async fn run_reset(app: &App) -> Result<()> {
    app.host.set_view(View::Progress).await;
    app.host.reset_progress()?;
    println!("Progress reset.");
    print!("{}", render_panel(&app.host.panel()));
    Ok(())
}
