//! Merels session server binary.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin merels-server
//! cargo run --bin merels-server -- --host 0.0.0.0 --port 3000
//! ```

use std::time::Duration;

use clap::Parser;

use merels_server::config::ServerConfig;
use merels_server::ui::run_server;
use merels_shared::logger::setup_logger;
use merels_shared::protocol::DEFAULT_STARTING_PIECES;

#[derive(Parser, Debug)]
#[command(name = "merels-server")]
#[command(about = "Nine Men's Morris multiplayer session server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Pieces each side starts with
    #[arg(long, default_value_t = DEFAULT_STARTING_PIECES)]
    starting_pieces: u8,

    /// Milliseconds a cancelled room lingers after a disconnect before
    /// removal (0 = immediate teardown)
    #[arg(long, default_value_t = 0)]
    disconnect_grace_ms: u64,

    /// HTTP endpoint receiving game result records (omit to disable
    /// persistence)
    #[arg(long)]
    result_endpoint: Option<String>,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        starting_pieces: args.starting_pieces,
        disconnect_grace: Duration::from_millis(args.disconnect_grace_ms),
        result_endpoint: args.result_endpoint,
    };

    if let Err(e) = run_server(config).await {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    }
}
