//! `QuizforgeServer` builder and accept loop.
//!
//! This is the entry point for running a quiz server. It ties the layers
//! together: transport → handshake → session directory → adapter pumps.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use quizforge_hub::SessionDirectory;
use quizforge_protocol::JsonCodec;
use quizforge_session::Authenticator;
use quizforge_transport::{Transport, TransportError, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{PackLibrary, QuizforgeError, ServerConfig};

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<A, P> {
    pub(crate) directory: Arc<SessionDirectory>,
    pub(crate) auth: Arc<A>,
    pub(crate) packs: P,
    pub(crate) config: ServerConfig,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,ignore
/// let server = QuizforgeServerBuilder::new()
///     .config(ServerConfig::load("quiz.toml")?)
///     .build(JwtAuthenticator::new(b"secret")?, MemoryPackLibrary::load_dir("packs")?)
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Clone, Default)]
pub struct QuizforgeServerBuilder {
    config: ServerConfig,
}

impl QuizforgeServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Binds the listener and returns a server ready to [`run`](QuizforgeServer::run).
    pub async fn build<A, P>(self, auth: A, packs: P) -> Result<QuizforgeServer<A, P>, QuizforgeError>
    where
        A: Authenticator,
        P: PackLibrary,
    {
        self.config.validate()?;
        let transport =
            WebSocketTransport::bind_with_config(&self.config.bind_addr, self.config.transport())
                .await?;

        let directory = Arc::new(SessionDirectory::new(
            self.config.hub(),
            self.config.timings.clone(),
        ));
        let state = Arc::new(ServerState {
            directory,
            auth: Arc::new(auth),
            packs,
            config: self.config,
            codec: JsonCodec,
        });

        Ok(QuizforgeServer { transport, state })
    }
}

/// A bound quiz server.
pub struct QuizforgeServer<A, P> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, P>>,
}

impl<A, P> QuizforgeServer<A, P>
where
    A: Authenticator,
    P: PackLibrary,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, QuizforgeError> {
        Ok(self.transport.local_addr()?)
    }

    /// The live sessions.
    pub fn directory(&self) -> Arc<SessionDirectory> {
        Arc::clone(&self.state.directory)
    }

    /// Runs the accept loop until the process ends.
    pub async fn run(self) -> Result<(), QuizforgeError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then stops
    /// accepting and shuts every session down.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), QuizforgeError> {
        tracing::info!(addr = %self.state.config.bind_addr, "quiz server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(incoming, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(TransportError::Shutdown) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        self.state.directory.shutdown_all().await;
        tracing::info!("quiz server stopped");
        Ok(())
    }
}
