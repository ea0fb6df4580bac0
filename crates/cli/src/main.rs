use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use tollgate_config::Settings;

#[derive(Parser)]
#[command(name = "tollgate", about = "Tollgate — cookie-to-bearer authentication relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Settings file (falls back to $TOLLGATE_CONFIG, then tollgate.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay gateway.
    Gateway {
        /// Override the bind address from the settings file.
        #[arg(long)]
        bind: Option<String>,
        /// Override the port from the settings file.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate the settings file and exit.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config_path = Settings::resolve_path(cli.config.as_deref());

    match cli.command {
        Commands::Gateway { bind, port } => {
            let mut settings = Settings::load(&config_path)?;
            if let Some(bind) = bind {
                settings.server.bind = bind;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            info!(version = env!("CARGO_PKG_VERSION"), "tollgate starting");
            tollgate_gateway::server::start_gateway(settings).await
        }
        Commands::Check => {
            Settings::load(&config_path)?;
            println!("settings OK: {}", config_path.display());
            Ok(())
        }
    }
}
