use std::{path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    switchboard_auto_reply::EchoGenerator,
    switchboard_gateway::SwitchboardFactory,
    switchboard_whatsapp::{Transport, UnconfiguredTransport},
};

#[derive(Parser)]
#[command(name = "switchboard", about = "Multi-channel customer messaging gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Config file path (overrides discovery).
    #[arg(long, global = true, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

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

fn load_config(cli: &Cli) -> anyhow::Result<switchboard_config::SwitchboardConfig> {
    match &cli.config {
        Some(path) => switchboard_config::load_config(path),
        None => Ok(switchboard_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "switchboard starting");

    match cli.command {
        None | Some(Commands::Gateway) => {
            let config = load_config(&cli)?;
            let bind = cli.bind.unwrap_or_else(|| config.server.host.clone());
            let port = cli.port.unwrap_or(config.server.port);

            // The reply generator and WhatsApp protocol stack are deployment
            // concerns; the stock binary ships with an echo generator and no
            // WhatsApp transport.
            let factory = SwitchboardFactory::new(Arc::new(|_channel| {
                Arc::new(UnconfiguredTransport) as Arc<dyn Transport>
            }));
            let state =
                switchboard_gateway::wire(&config, Arc::new(EchoGenerator), factory).await?;
            switchboard_gateway::start_gateway(&bind, port, state).await?;
        },
        Some(Commands::Config { action: ConfigAction::Show }) => {
            let config = load_config(&cli)?;
            print!("{}", toml::to_string_pretty(&config)?);
        },
    }

    Ok(())
}
