use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use qrlogin::{gateway, qr, Config};

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "qrlogin=info";

#[derive(Debug, Parser)]
#[command(name = "qrlogin", version, about = "Cross-device QR login gateway")]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Address to bind (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides gateway.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print a QR code for any text to the terminal
    Qr {
        /// Text or URL to encode
        data: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = Config::resolve(cli.config.as_deref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            config.validate().context("Invalid configuration")?;
            gateway::run_gateway(config).await
        }
        Commands::Qr { data } => {
            println!("{}", qr::render_terminal(&data)?);
            Ok(())
        }
        Commands::Config => {
            let config = Config::load(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
