//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Listening port, overriding the config file
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Peer to dial on startup (host:port, repeatable)
    #[arg(long = "connect", value_name = "HOST:PORT")]
    pub peers: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a node and print incoming messages until interrupted
    Listen {
        /// Your display name
        #[arg(short, long, default_value = "Anonymous")]
        name: String,
    },
    /// Send a single message into a 1-on-1 room and exit
    Send {
        /// Recipient identity (hex format)
        #[arg(short, long)]
        to: String,
        /// Message content
        message: String,
    },
    /// List users discovered on the network
    Users {
        /// Seconds to wait for announcements
        #[arg(short, long, default_value_t = 3)]
        wait: u64,
    },
    /// Show the node's effective configuration and connectivity
    Status,
}
