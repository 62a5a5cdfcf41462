//! linechat server binary
//!
//! Run with: cargo run --bin linechat-server -- [options]
//!
//! Options:
//!   --config <file>    JSON config file (flags below override it)
//!   --bind <addr>      Bind address (default: 0.0.0.0)
//!   --port <port>      Listen port (default: 8080)
//!   --capacity <n>     Maximum registered users (default: 10)
//!   --keep-alive       Keep running after the last user leaves

use std::path::PathBuf;

use clap::Parser;
use log::info;

use linechat::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "linechat-server", version, about = "Line-oriented TCP chat server")]
struct Cli {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the listener to
    #[arg(long)]
    bind: Option<String>,

    /// Listen port
    #[arg(long)]
    port: Option<u16>,

    /// Maximum number of registered users
    #[arg(long)]
    capacity: Option<usize>,

    /// Keep running after the last user leaves
    #[arg(long)]
    keep_alive: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }
    if cli.keep_alive {
        config.shutdown_on_empty = false;
    }

    info!("linechat server v{} (PID: {})", env!("CARGO_PKG_VERSION"), std::process::id());
    info!("  Address:  {}", config.addr());
    info!("  Capacity: {} users", config.capacity);
    info!("  Shutdown when empty: {}", config.shutdown_on_empty);

    Server::new(config).run().await?;

    info!("Server stopped");
    Ok(())
}
