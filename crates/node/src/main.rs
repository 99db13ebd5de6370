//! Chain-sync node daemon
//!
//! Binds the client RPC port, wires the strongest-chain hub and the
//! dev collaborators, and optionally joins the network at startup.
//! Operators normally drive the join over RPC (`main/0`).

use anyhow::Result;
use chain_bootstrap::{join, JoinParams, NodeAddressing};
use chain_hub::StrongestChainHub;
use chain_rpc::{RpcContext, RpcServer};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod dev;

use config::NodeConfig;
use dev::{DevEngine, DevProverFactory};

/// Chain-sync node
#[derive(Parser, Debug)]
#[command(name = "chain-node")]
#[command(about = "Strongest-chain sync node", long_about = None)]
struct Args {
    /// Advertised host address
    #[arg(long)]
    host: Option<IpAddr>,

    /// Base port; discovery binds base+1, client RPC base+2
    #[arg(long)]
    port: Option<u16>,

    /// Prover storage directory
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Initial peers to dial after joining
    #[arg(long = "peer")]
    peers: Vec<SocketAddr>,

    /// Produce blocks with the dev engine
    #[arg(long)]
    mine: bool,

    /// Join immediately instead of waiting for a Join RPC
    #[arg(long)]
    join_on_start: bool,

    /// Dev-engine block interval in milliseconds
    #[arg(long)]
    block_time_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> NodeConfig {
        let defaults = NodeConfig::default();
        NodeConfig {
            host: self.host.unwrap_or(defaults.host),
            base_port: self.port.unwrap_or(defaults.base_port),
            storage_dir: self
                .storage_dir
                .clone()
                .unwrap_or(defaults.storage_dir),
            block_time_ms: self.block_time_ms.unwrap_or(defaults.block_time_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addressing = NodeAddressing::from_base(config.host, config.base_port);
    tracing::info!("Starting chain-sync node");
    tracing::info!("  External P2P: {}", addressing.external_addr());
    tracing::info!("  Discovery:    {}", addressing.discovery_addr());
    tracing::info!("  Client RPC:   {}", addressing.client_rpc_addr());
    tracing::info!("  Storage:      {:?}", config.storage_dir);
    tracing::info!("  Mining:       {}", args.mine);

    let hub = StrongestChainHub::new();
    let prover_factory = Arc::new(DevProverFactory);
    let engine = Arc::new(DevEngine::new(config.block_time_ms));
    let context = Arc::new(RpcContext::new(hub.clone(), prover_factory, engine));

    let server = RpcServer::bind(addressing.client_rpc_addr(), context.clone()).await?;
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("RPC server error: {}", e);
        }
    });

    if args.join_on_start {
        let params = JoinParams {
            storage_location: config.storage_dir.clone(),
            initial_peers: args.peers.clone(),
            should_mine: args.mine,
            self_address: addressing.external_addr(),
        };
        let node = join(
            context.prover_factory.as_ref(),
            context.engine.as_ref(),
            &hub,
            params,
        )
        .await?;
        context.install_node(node);
        tracing::info!("Joined at startup");
    } else {
        tracing::info!("Waiting for Join over RPC");
    }

    tracing::info!("Node running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    server_task.abort();

    Ok(())
}
