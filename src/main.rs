use clap::Parser;
use peerstore::cli::Cli;
use peerstore::config::{self, FileConfig, NodeConfig};
use peerstore::metadata::types::{PeerOrder, UNKNOWN_DISTANCE};
use peerstore::node::handlers::router;
use peerstore::node::service::Node;
use peerstore::peer::client::HttpPeerClient;
use peerstore::replication::distance::distance;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let address = cli.address();

    // 1. Configuration:
    let file_config = if cli.config.exists() {
        config::load_from_file(&cli.config)?
    } else {
        tracing::warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
        FileConfig::default()
    };

    let peer_order = if cli.distance_aware {
        PeerOrder::Distance
    } else {
        PeerOrder::Registration
    };
    let node_config = NodeConfig::new(address.clone(), cli.data_dir.clone())
        .with_peer_order(peer_order)
        .apply_file(&file_config, cli.use_dist_replication)?;

    let server_list = std::fs::read_to_string(&cli.serverlist).map_err(|e| {
        anyhow::anyhow!("Failed to read server list {}: {}", cli.serverlist.display(), e)
    })?;
    let servers = config::parse_server_list(&server_list, &address);

    tracing::info!("Starting node {}", address);
    tracing::info!(
        "Storage limit: {} bytes, distributed replication: {}",
        node_config.storage_limit,
        match node_config.replication {
            Some(settings) => format!("on (k={})", settings.threshold),
            None => "off".to_string(),
        }
    );

    // 2. Node state:
    let peers = Arc::new(HttpPeerClient::new(node_config.peer_timeout));
    let node = Node::open(node_config, peers)?;

    if cli.clear_metadata {
        tracing::info!("Clearing metadata");
        node.metadata().clear_all().await?;
    }

    for server in &servers {
        let peer_distance = if cli.distance_aware {
            distance(&address, server) as i64
        } else {
            UNKNOWN_DISTANCE
        };
        node.metadata()
            .register_peer(server, peer_distance)
            .await?;
    }
    tracing::info!("Known peers: {:?}", node.metadata().list_peers());

    // 3. HTTP server:
    let app = router(node);
    let http_addr = SocketAddr::from(([0, 0, 0, 0], cli.port));

    tracing::info!("HTTP server listening on {}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        tracing::info!("Shutting down");
    })
    .await?;

    Ok(())
}
