//! `GambitServer` builder and server loops.
//!
//! This is the entry point for running a Gambit server. It ties the
//! layers together: transport → protocol → coordinator, plus the HTTP
//! query surface on its own listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gambit_presence::IdentityProvider;
use gambit_protocol::{Codec, JsonCodec};
use gambit_room::PersistenceSink;
use gambit_transport::{Transport, WebSocketTransport};

use crate::config::ServerConfig;
use crate::coordinator::Coordinator;
use crate::handler::handle_connection;
use crate::{GambitError, http};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<I, P, C>
where
    I: IdentityProvider,
    P: PersistenceSink,
    C: Codec,
{
    pub(crate) coordinator: Arc<Coordinator<I, P>>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Gambit server.
///
/// # Example
///
/// ```rust,no_run
/// use gambit::prelude::*;
///
/// # async fn run() -> Result<(), GambitError> {
/// let server = gambit::GambitServerBuilder::new()
///     .bind("0.0.0.0:8080".parse().unwrap())
///     .http("0.0.0.0:3000".parse().unwrap())
///     .build(TrustedIdentity, MemorySink::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct GambitServerBuilder {
    config: ServerConfig,
}

impl GambitServerBuilder {
    /// Creates a builder with [`ServerConfig::default`] settings.
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

    /// Sets the WebSocket listen address.
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.ws_addr = addr;
        self
    }

    /// Sets the HTTP listen address.
    pub fn http(mut self, addr: SocketAddr) -> Self {
        self.config.http_addr = addr;
        self
    }

    /// Sets how long a connection may stay silent before it is closed.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Binds both listeners.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<I, P>(
        self,
        identity: I,
        sink: P,
    ) -> Result<GambitServer<I, P, JsonCodec>, GambitError>
    where
        I: IdentityProvider,
        P: PersistenceSink,
    {
        let transport =
            WebSocketTransport::bind(&self.config.ws_addr.to_string()).await?;
        let http_listener = tokio::net::TcpListener::bind(self.config.http_addr)
            .await
            .map_err(GambitError::Http)?;

        let state = Arc::new(ServerState {
            coordinator: Arc::new(Coordinator::new(identity, sink)),
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
        });

        Ok(GambitServer {
            transport,
            http_listener,
            state,
        })
    }
}

impl Default for GambitServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Gambit server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct GambitServer<I: IdentityProvider, P: PersistenceSink, C: Codec> {
    transport: WebSocketTransport,
    http_listener: tokio::net::TcpListener,
    state: Arc<ServerState<I, P, C>>,
}

impl<I, P, C> GambitServer<I, P, C>
where
    I: IdentityProvider,
    P: PersistenceSink,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> GambitServerBuilder {
        GambitServerBuilder::new()
    }

    /// The address WebSocket clients connect to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The address of the HTTP query surface.
    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http_listener.local_addr()
    }

    /// Handle to the shared coordinator.
    pub fn coordinator(&self) -> Arc<Coordinator<I, P>> {
        Arc::clone(&self.state.coordinator)
    }

    /// Runs the HTTP surface and the WebSocket accept loop.
    ///
    /// Spawns a handler task per accepted connection. Runs until the
    /// process is terminated or the HTTP server fails.
    pub async fn run(mut self) -> Result<(), GambitError> {
        let app = http::router(Arc::clone(&self.state.coordinator));
        let http_listener = self.http_listener;
        let mut http_task =
            tokio::spawn(async move { axum::serve(http_listener, app).await });

        tracing::info!(
            ws = ?self.transport.local_addr().ok(),
            "Gambit server running"
        );

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let ended = handle_connection(conn, state).await;
                            if let Err(e) = ended {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },

                finished = &mut http_task => {
                    return match finished {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(GambitError::Http(e)),
                        Err(e) => {
                            Err(GambitError::Http(std::io::Error::other(e)))
                        }
                    };
                }
            }
        }
    }
}
