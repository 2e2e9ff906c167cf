//! Server configuration.

use std::time::Duration;

use merels_shared::protocol::DEFAULT_STARTING_PIECES;

/// Runtime knobs for the session server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Pieces each side starts with.
    pub starting_pieces: u8,
    /// How long a cancelled room lingers after a disconnect before it is
    /// removed. Zero (the default) tears the room down immediately; the
    /// opponent is notified right away either way.
    pub disconnect_grace: Duration,
    /// HTTP endpoint that receives game result records. `None` disables
    /// persistence.
    pub result_endpoint: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            starting_pieces: DEFAULT_STARTING_PIECES,
            disconnect_grace: Duration::ZERO,
            result_endpoint: None,
        }
    }
}
