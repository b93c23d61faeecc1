mod bridge;
mod config_commands;
mod plugin_commands;

use {
    clap::{Parser, Subcommand},
    onebridge_config::BridgeConfig,
    std::path::PathBuf,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "onebridge", about = "onebridge: OneBot bridge client with plugins", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Falls back to the config
    /// file's `log_level`, then `info`. `RUST_LOG` takes precedence.
    #[arg(long, global = true, env = "ONEBRIDGE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of searching the standard locations.
    #[arg(short, long, global = true, env = "ONEBRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to every configured bridge and run plugins (default).
    Run,
    /// List the plugins linked into this binary.
    Plugins {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and print it as resolved.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli, config: &BridgeConfig) {
    let level = cli
        .log_level
        .as_deref()
        .or(config.log_level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<(BridgeConfig, Option<PathBuf>)> {
    match &cli.config {
        Some(path) => Ok((onebridge_config::load_config(path)?, Some(path.clone()))),
        None => onebridge_config::discover_and_load(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let (config, config_path) = load_config(&cli)?;

    init_telemetry(&cli, &config);

    match cli.command {
        None | Some(Commands::Run) => {
            info!(
                version = env!("CARGO_PKG_VERSION"),
                config = ?config_path,
                "onebridge starting"
            );
            bridge::run(config).await
        },
        Some(Commands::Plugins { json }) => plugin_commands::list(&config, json),
        Some(Commands::Check { verbose }) => {
            config_commands::check(&config, config_path.as_deref(), verbose)
        },
    }
}
