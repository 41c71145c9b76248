//! `TombolaServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → room.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tombola_protocol::{Codec, JsonCodec};
use tombola_room::{RoomConfig, RoomRegistry};
use tombola_transport::{Transport, WebSocketTransport};

use crate::TombolaError;
use crate::handler::handle_connection;

/// The current protocol version, announced in the `connected` frame.
pub const PROTOCOL_VERSION: u32 = 1;

/// Address used when the builder is not given one.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Connections that send nothing for this long are closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: RoomRegistry,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    started: Instant,
}

impl<C: Codec> ServerState<C> {
    /// Milliseconds since the server started; the envelope clock.
    pub(crate) fn uptime_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a Tombola server.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), tombola::TombolaError> {
/// use tombola::prelude::*;
///
/// let server = TombolaServer::builder()
///     .bind("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct TombolaServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    idle_timeout: Duration,
}

impl TombolaServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            room_config: RoomConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener. Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<TombolaServer<JsonCodec>, TombolaError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: RoomRegistry::new(self.room_config),
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
            started: Instant::now(),
        });

        Ok(TombolaServer { transport, state })
    }
}

impl Default for TombolaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tombola server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TombolaServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl TombolaServer<JsonCodec> {
    pub fn builder() -> TombolaServerBuilder {
        TombolaServerBuilder::new()
    }
}

impl<C: Codec> TombolaServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TombolaError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop, spawning a handler task per connection.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), TombolaError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "tombola server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
