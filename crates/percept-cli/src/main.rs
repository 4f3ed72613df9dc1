mod adapter_cmds;
mod app;
mod config;
mod modules_cmd;
mod progress_cmd;
mod render;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use percept_adapter::{AdapterRegistry, ServerConfig};
use percept_core::adapter::DEFAULT_ADAPTER_URL;

use app::App;
use config::{CliOverrides, PerceptConfig};

#[derive(Parser)]
#[command(name = "percept", about = "Perception training host")]
struct Cli {
    /// Adapter service base URL (overrides PERCEPT_ADAPTER_URL)
    #[arg(long, global = true)]
    adapter_url: Option<String>,

    /// Module directory or http(s) base URL (overrides PERCEPT_MODULES)
    #[arg(long, global = true)]
    modules: Option<String>,

    /// Directory for progress data (overrides PERCEPT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a percept config file
    Init {
        /// Adapter service base URL
        #[arg(long = "adapter", default_value = DEFAULT_ADAPTER_URL)]
        adapter: String,
        /// Module directory or http(s) base URL
        #[arg(long = "module-source", default_value = config::DEFAULT_MODULES)]
        module_source: String,
        /// Adapter poll interval in milliseconds
        #[arg(long, default_value_t = 1500)]
        poll_interval_ms: u64,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// List available modules and their completion counts
    Modules,
    /// Render a view once: home, progress or module:<id>
    Show {
        /// View to render
        #[arg(default_value = "home")]
        view: String,
    },
    /// Run a module interactively
    Run {
        /// Module ID
        module_id: String,
    },
    /// Record a completion of a module
    Done {
        /// Module ID
        module_id: String,
    },
    /// Progress management
    Progress {
        #[command(subcommand)]
        command: ProgressCommands,
    },
    /// Sensor adapter commands
    Adapters {
        #[command(subcommand)]
        command: AdapterCommands,
    },
    /// Run the local sensor adapter service
    ServeAdapters {
        /// Address to bind
        #[arg(long, default_value = percept_adapter::server::DEFAULT_BIND)]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = percept_adapter::server::DEFAULT_PORT)]
        port: u16,
        /// Browser origin allowed to call the service
        #[arg(long, default_value = percept_adapter::server::DEFAULT_ALLOWED_ORIGIN)]
        allowed_origin: String,
    },
}

#[derive(Subcommand)]
pub enum ProgressCommands {
    /// Show completion counts and adapter status
    Show,
    /// Clear all completion counts
    Reset,
}

#[derive(Subcommand)]
pub enum AdapterCommands {
    /// List adapters offered by the service
    List,
    /// Ask an adapter to discover devices
    Discover {
        adapter_id: String,
    },
    /// Connect an adapter to its device
    Connect {
        adapter_id: String,
    },
    /// Read an adapter's current state once
    Read {
        adapter_id: String,
    },
    /// Connect and print readings as they arrive
    Poll {
        adapter_id: String,
        /// Poll interval in milliseconds (defaults to the configured interval)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Stop after this many readings
        #[arg(long)]
        count: Option<u32>,
    },
}

/// Execute the `percept init` command: write config file.
fn cmd_init(adapter: &str, module_source: &str, poll_interval_ms: u64, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }
    if poll_interval_ms == 0 {
        anyhow::bail!("poll interval must be positive");
    }
    let data_dir = config::default_data_dir();
    let cfg = config::ConfigFile {
        adapter: config::AdapterSection {
            url: Some(adapter.to_string()),
            poll_interval_ms: Some(poll_interval_ms),
        },
        modules: config::ModulesSection {
            source: Some(module_source.to_string()),
        },
        storage: config::StorageSection {
            data_dir: Some(data_dir.clone()),
        },
    };
    config::save_config_to(&path, &cfg)?;
    println!("Config written to {}", path.display());
    println!("  adapter.url = {adapter}");
    println!("  adapter.poll_interval_ms = {poll_interval_ms}");
    println!("  modules.source = {module_source}");
    println!("  storage.data_dir = {}", data_dir.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let overrides = CliOverrides {
        adapter_url: cli.adapter_url,
        modules: cli.modules,
        data_dir: cli.data_dir,
    };

    match cli.command {
        Commands::Init {
            adapter,
            module_source,
            poll_interval_ms,
            force,
        } => {
            cmd_init(&adapter, &module_source, poll_interval_ms, force)?;
        }
        Commands::Modules => {
            let app = App::start(PerceptConfig::resolve(&overrides)?).await?;
            modules_cmd::run_modules(&app)?;
        }
        Commands::Show { view } => {
            let app = App::start(PerceptConfig::resolve(&overrides)?).await?;
            modules_cmd::run_show(&app, &view).await?;
        }
        Commands::Run { module_id } => {
            let app = App::start(PerceptConfig::resolve(&overrides)?).await?;
            modules_cmd::run_module(&app, &module_id).await?;
        }
        Commands::Done { module_id } => {
            let app = App::start(PerceptConfig::resolve(&overrides)?).await?;
            modules_cmd::run_done(&app, &module_id)?;
        }
        Commands::Progress { command } => {
            let app = App::start(PerceptConfig::resolve(&overrides)?).await?;
            match command {
                ProgressCommands::Show => progress_cmd::run_show(&app).await?,
                ProgressCommands::Reset => progress_cmd::run_reset(&app).await?,
            }
        }
        Commands::Adapters { command } => {
            let app = App::build(PerceptConfig::resolve(&overrides)?)?;
            let interval = app.config.poll_interval;
            adapter_cmds::run_adapter_command(command, &app.adapters, interval).await?;
        }
        Commands::ServeAdapters {
            bind,
            port,
            allowed_origin,
        } => {
            let server_config = ServerConfig {
                bind,
                port,
                allowed_origin,
            };
            percept_adapter::run_server(AdapterRegistry::with_builtin_adapters(), &server_config).await?;
        }
    }

    Ok(())
}
