//! Broker server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::backend::{SecretBackend, SessionInitializer, SessionProvider, VaultBackend};
use crate::broker::{DeliveryMode, REDIRECT_URL, TokenBroker, TokenIssuer, broker_routes};
use crate::config::{Config, IdentitySource};
use crate::{Error, Result};

/// Token broker server
pub struct BrokerServer {
    /// Configuration
    config: Config,
    /// Shared broker state
    broker: Arc<TokenBroker>,
}

impl BrokerServer {
    /// Build the broker: load the allow-list, connect to Vault and
    /// establish the session. Any failure here is fatal.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let ca_cert = config
            .vault
            .ca_cert
            .as_deref()
            .ok_or_else(|| Error::Config("CA certificate path is required".to_string()))?;
        let backend: Arc<dyn SecretBackend> =
            Arc::new(VaultBackend::new(&config.vault.address, ca_cert)?);

        Self::with_backend(config, backend).await
    }

    /// Build the broker around an already constructed backend.
    pub async fn with_backend(config: Config, backend: Arc<dyn SecretBackend>) -> Result<Self> {
        let allow_list = config.load_allow_list()?;
        if allow_list.is_empty() {
            warn!("No allowed groups configured - every claimed group becomes a policy");
        } else {
            info!(groups = allow_list.len(), "Loaded group allow-list");
        }

        let initializer = SessionInitializer::new(Arc::clone(&backend), config.session_source()?);
        let sessions = SessionProvider::new(initializer, config.vault.session_lifetime).await?;
        let issuer = TokenIssuer::new(backend, config.token.clone());

        let broker = Arc::new(TokenBroker::new(
            sessions,
            issuer,
            allow_list,
            config.identity.clone(),
            DeliveryMode::from_redirect_flag(config.delivery.redirect),
        ));

        Ok(Self { config, broker })
    }

    /// Shared broker state.
    #[must_use]
    pub fn broker(&self) -> Arc<TokenBroker> {
        Arc::clone(&self.broker)
    }

    /// Run the server until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let app = broker_routes(Arc::clone(&self.broker));
        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("VAULT TOKEN BROKER v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(vault = %self.config.vault.address, lifetime = ?self.config.vault.session_lifetime, "Vault session ready");
        match self.config.identity.source {
            IdentitySource::Headers => info!(
                user_header = %self.config.identity.user_header,
                groups_header = %self.config.identity.groups_header,
                "Identity from proxy headers"
            ),
            IdentitySource::Body => info!("Identity from JSON body (no group authorization)"),
        }
        match self.broker.delivery() {
            DeliveryMode::Direct => info!("Delivery: response body"),
            DeliveryMode::Redirect => info!("Delivery: redirect to {REDIRECT_URL}"),
        }
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
