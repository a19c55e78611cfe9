use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Peer-to-peer file storage node", long_about = None)]
pub struct Cli {
    /// File containing the addresses of the other servers, one `host:port` per line.
    pub serverlist: PathBuf,

    /// Host name this node advertises to its peers.
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// TOML file with storage and replication settings.
    #[arg(long, default_value = "server.toml")]
    pub config: PathBuf,

    /// Directory holding uploaded files, logs and the metadata snapshot.
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Enable load-triggered replication of hot files.
    #[arg(long)]
    pub use_dist_replication: bool,

    /// Wipe all metadata (peers, holders) on startup.
    #[arg(long)]
    pub clear_metadata: bool,

    /// Probe peers in ascending distance order instead of registration order.
    #[arg(long)]
    pub distance_aware: bool,
}

impl Cli {
    /// The `host:port` identity of this node.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["peerstore", "servers.txt"]);
        assert_eq!(cli.address(), "localhost:5000");
        assert!(!cli.use_dist_replication);
        assert!(!cli.clear_metadata);
        assert_eq!(cli.config, PathBuf::from("server.toml"));
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "peerstore",
            "servers.txt",
            "--host",
            "10.0.0.4",
            "--port",
            "6001",
            "--use-dist-replication",
            "--clear-metadata",
        ]);
        assert_eq!(cli.address(), "10.0.0.4:6001");
        assert!(cli.use_dist_replication);
        assert!(cli.clear_metadata);
    }
}
