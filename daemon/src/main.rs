//! Gateway daemon: entry point for running the ledger gateway.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gateway_node::{init_logging, CoreApiSubmitter, Gateway, GatewayConfig, LogFormat};
use gateway_store_lmdb::environment::DEFAULT_MAP_SIZE;
use gateway_store_lmdb::LmdbEnvironment;
use gateway_types::{NetworkId, SystemClock};

#[derive(Parser)]
#[command(name = "gatewayd", about = "Ledger gateway daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the gateway until SIGINT or SIGTERM.
    Run(RunArgs),
    /// Print the default configuration as TOML.
    #[command(name = "print-default-config")]
    PrintDefaultConfig,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to a TOML configuration file. CLI flags and env vars override it.
    #[arg(long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Network the upstream nodes run: "mainnet", "stokenet" or "localnet".
    #[arg(long, env = "GATEWAY_NETWORK")]
    network: Option<NetworkId>,

    /// Data directory for ledger storage.
    #[arg(long, env = "GATEWAY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Serve /metrics and /status on this port.
    #[arg(long, env = "GATEWAY_STATUS_PORT")]
    status_port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "GATEWAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "GATEWAY_LOG_FORMAT")]
    log_format: Option<String>,
}

impl RunArgs {
    fn into_config(self) -> anyhow::Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let path_str = path
                    .to_str()
                    .context("config path is not valid UTF-8")?;
                GatewayConfig::from_toml_file(path_str)
                    .with_context(|| format!("failed to load {}", path.display()))?
            }
            None => GatewayConfig::default(),
        };

        if let Some(network) = self.network {
            config.network = network;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(port) = self.status_port {
            config.enable_status_server = true;
            config.status_port = port;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::PrintDefaultConfig => {
            print!("{}", GatewayConfig::default().to_toml_string()?);
            Ok(())
        }
        Command::Run(args) => run(args.into_config()?).await,
    }
}

async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level)?;
    config.validate()?;

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;
    let store = Arc::new(
        LmdbEnvironment::open(&config.data_dir, DEFAULT_MAP_SIZE)
            .with_context(|| format!("failed to open store at {}", config.data_dir.display()))?,
    );
    let submitter = Arc::new(CoreApiSubmitter::new(
        config.network,
        &config.nodes,
        config.mempool.submission_request_timeout(),
    )?);

    tracing::info!(
        network = config.network.as_str(),
        nodes = config.nodes.len(),
        data_dir = %config.data_dir.display(),
        status = if config.enable_status_server {
            config.status_port.to_string()
        } else {
            "off".into()
        },
        "starting gateway"
    );

    let mut gateway = Gateway::new(config, store, submitter, Arc::new(SystemClock))?;
    gateway.start();

    gateway.shutdown_controller().wait_for_signal().await;
    gateway.stop().await?;

    tracing::info!("gateway daemon exited cleanly");
    Ok(())
}
