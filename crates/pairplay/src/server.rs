//! `PairplayServer` builder and accept loop.
//!
//! This is the entry point for running a Pairplay server. It ties together
//! all the layers: transport → protocol → session → room coordinator.

use std::sync::Arc;
use std::time::Duration;

use pairplay_protocol::{Codec, JsonCodec};
use pairplay_room::{
    CoordinatorHandle, MatchRecorder, RoomConfig, TracingRecorder, spawn_coordinator,
};
use pairplay_session::{IdentityResolver, UnverifiedTokenHint};
use pairplay_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{PairplayError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// All room state lives in the coordinator task, so nothing here needs a
/// lock.
pub(crate) struct ServerState<R: IdentityResolver, C: Codec> {
    pub(crate) coordinator: CoordinatorHandle,
    pub(crate) resolver: R,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    pub(crate) ping_interval: Duration,
}

/// Builder for configuring and starting a Pairplay server.
///
/// # Example
///
/// ```rust,no_run
/// use pairplay::prelude::*;
///
/// # async fn run() -> Result<(), PairplayError> {
/// let server = PairplayServer::builder()
///     .bind("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PairplayServerBuilder {
    config: ServerConfig,
}

impl PairplayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a connection may stay silent before it is closed.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    /// Sets the room coordinator configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    /// Binds the listener with the default identity resolver and match
    /// recorder.
    pub async fn build(self) -> Result<PairplayServer<UnverifiedTokenHint, JsonCodec>, PairplayError> {
        self.build_with(UnverifiedTokenHint, TracingRecorder).await
    }

    /// Binds the listener with a custom identity resolver and match
    /// recorder.
    pub async fn build_with<R, M>(
        self,
        resolver: R,
        recorder: M,
    ) -> Result<PairplayServer<R, JsonCodec>, PairplayError>
    where
        R: IdentityResolver,
        M: MatchRecorder,
    {
        if self.config.ping_interval.is_zero() {
            return Err(PairplayError::Config {
                key: "ping_interval",
                value: "0s".into(),
                reason: "must be greater than zero".into(),
            });
        }
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let coordinator = spawn_coordinator(self.config.room, recorder);

        let state = Arc::new(ServerState {
            coordinator,
            resolver,
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
            ping_interval: self.config.ping_interval,
        });

        Ok(PairplayServer { transport, state })
    }
}

impl Default for PairplayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Pairplay server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PairplayServer<R: IdentityResolver, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<R, C>>,
}

impl PairplayServer<UnverifiedTokenHint, JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PairplayServerBuilder {
        PairplayServerBuilder::new()
    }
}

impl<R, C> PairplayServer<R, C>
where
    R: IdentityResolver,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the room coordinator, e.g. for reading its stats.
    pub fn coordinator(&self) -> CoordinatorHandle {
        self.state.coordinator.clone()
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), PairplayError> {
        tracing::info!("Pairplay server running");

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
