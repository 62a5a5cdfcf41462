//! linechat client binary
//!
//! Run with: cargo run --bin linechat-client -- [options]
//!
//! Options:
//!   --config <file>    JSON config file (flags below override it)
//!   --user <name>      Display name, 5 characters max (default: guest)
//!   --server <host>    Server hostname or address (default: 127.0.0.1)
//!   --port <port>      Server port (default: 8080)
//!   --height <rows>    Message pane height (default: 20)
//!
//! Type `bye` to leave. Logs go to stderr at `warn` unless RUST_LOG says otherwise.

use std::path::PathBuf;

use clap::Parser;
use log::info;

use linechat::client::{spawn_stdin_reader, with_renderer};
use linechat::{connect, AnsiSurface, ChatSession, ClientConfig, DisplayName, SessionEnd};

#[derive(Parser, Debug)]
#[command(name = "linechat-client", version, about = "Terminal client for linechat")]
struct Cli {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display name (truncated to 5 characters)
    #[arg(long)]
    user: Option<String>,

    /// Server hostname or IP address
    #[arg(long)]
    server: Option<String>,

    /// Server port
    #[arg(long)]
    port: Option<u16>,

    /// Message pane height in rows
    #[arg(long)]
    height: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Warn by default so log lines stay out of the chat display
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(user) = cli.user {
        config.user = user;
    }
    if let Some(server) = cli.server {
        config.server = server;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(height) = cli.height {
        config.display_height = height;
    }

    let stream = connect(&config).await?;
    info!("Connected to server at {}:{}", config.server, config.port);

    let input = spawn_stdin_reader(16);
    let surface = AnsiSurface::new(std::io::stdout(), config.display_width, config.display_height);
    let session = ChatSession::new(DisplayName::new(&config.user), config.poll_interval());

    // The terminal is restored before any error is reported
    let end = with_renderer(surface, |render| session.run(stream, input, render)).await?;

    match end {
        SessionEnd::UserQuit | SessionEnd::InputClosed => {}
        SessionEnd::ServerClosed => eprintln!("Server closed the connection"),
        SessionEnd::Rejected => eprintln!("Server is full, try again later"),
        SessionEnd::Error(e) => {
            eprintln!("Connection error: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
