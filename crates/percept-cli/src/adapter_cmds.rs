//! `percept adapters`: talk to the local sensor adapter service.

use std::time::Duration;

use anyhow::{Context, Result, bail};

use percept_core::adapter::{AdapterPollingCoordinator, AdapterState};

use crate::AdapterCommands;
use crate::render::render_adapters;

pub async fn run_adapter_command(
    command: AdapterCommands,
    adapters: &AdapterPollingCoordinator,
    default_interval: Duration,
) -> Result<()> {
    match command {
        AdapterCommands::List => {
            adapters.list_adapters().await;
            print!("{}", render_adapters(&adapters.snapshot(), &adapters.top_error()));
            if !adapters.top_error().is_empty() {
                bail!("adapter service unavailable");
            }
        }
        AdapterCommands::Discover { adapter_id } => {
            let state = adapters.discover(&adapter_id).await;
            print_state(&adapter_id, &state)?;
        }
        AdapterCommands::Connect { adapter_id } => {
            let state = adapters.connect(&adapter_id).await;
            print_state(&adapter_id, &state)?;
        }
        AdapterCommands::Read { adapter_id } => {
            let body = adapters
                .read_once(&adapter_id)
                .await
                .with_context(|| format!("failed to read adapter {adapter_id}"))?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        AdapterCommands::Poll {
            adapter_id,
            interval_ms,
            count,
        } => {
            let interval = match interval_ms {
                Some(0) => bail!("poll interval must be positive"),
                Some(ms) => Duration::from_millis(ms),
                None => default_interval,
            };
            run_poll(adapters, &adapter_id, interval, count).await?;
        }
    }
    Ok(())
}

fn print_state(adapter_id: &str, state: &AdapterState) -> Result<()> {
    if !state.error.is_empty() {
        bail!("{adapter_id}: {}", state.error);
    }
    println!("{adapter_id}: connected={}", state.connected);
    if let Some(last) = &state.last_state {
        println!("{}", serde_json::to_string_pretty(last)?);
    }
    Ok(())
}

/// Connect, then poll and print each new reading until `count` readings
/// were shown or Ctrl+C.
async fn run_poll(
    adapters: &AdapterPollingCoordinator,
    adapter_id: &str,
    interval: Duration,
    count: Option<u32>,
) -> Result<()> {
    let state = adapters.connect(adapter_id).await;
    if !state.error.is_empty() {
        bail!("{adapter_id}: {}", state.error);
    }
    adapters.start_polling(adapter_id, interval);
    println!("Polling {adapter_id} every {} ms (Ctrl+C to stop)", interval.as_millis());

    let mut shown = 0u32;
    let mut ticker = tokio::time::interval(interval);
    let mut last = adapters.state(adapter_id);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        let current = adapters.state(adapter_id);
        if current == last {
            continue;
        }
        if !current.error.is_empty() {
            println!("error: {}", current.error);
        } else if let Some(body) = &current.last_state {
            println!("{body}");
        }
        last = current;
        shown += 1;
        if count.is_some_and(|c| shown >= c) {
            break;
        }
    }
    adapters.stop_polling(adapter_id);
    Ok(())
}
