mod chat_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use nexus_config::NexusConfig;

#[derive(Parser)]
#[command(name = "nexus", about = "Nexus: event relay for the neon grid", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Directory to look in for nexus.toml / nexus.yaml / nexus.json.
    #[arg(long, global = true, env = "NEXUS_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server.
    Gateway {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Emit grid.tick events to a gateway.
    Ticker {
        /// Gateway URL, e.g. ws://127.0.0.1:7000.
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Interactive chat interface.
    Chat {
        /// Gateway URL, e.g. ws://127.0.0.1:7000.
        #[arg(long)]
        url: Option<String>,
        /// Join an existing session instead of starting a new one.
        #[arg(long)]
        session: Option<String>,
    },
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

fn load_config(cli: &Cli) -> NexusConfig {
    if let Some(dir) = &cli.config_dir {
        nexus_config::set_config_dir(dir.clone());
    }
    nexus_config::discover_and_load()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "nexus starting");
    let mut config = load_config(&cli);

    match cli.command {
        Commands::Gateway { bind, port } => {
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            nexus_gateway::start_gateway(config).await
        },
        Commands::Ticker { url, interval_ms } => {
            if let Some(url) = url {
                config.ticker.url = url;
            }
            if let Some(ms) = interval_ms {
                config.ticker.interval_ms = ms;
            }
            nexus_client::run_ticker(&config.ticker, config.gateway.effective_token())
                .await
                .context("ticker stopped")
        },
        Commands::Chat { url, session } => {
            if let Some(url) = url {
                config.interface.url = url;
            }
            chat_commands::run_chat(&config, session).await
        },
    }
}
