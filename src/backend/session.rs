//! Broker session bootstrap.
//!
//! Two ways to authenticate the broker itself:
//!
//! - **Kubernetes login**: read the service account JWT from its well-known
//!   path and exchange it, together with a role, at the login endpoint.
//! - **Static token**: attach a pre-provisioned token; no network call.
//!
//! The resulting [`BackendSession`] either lives for the whole process
//! (shared by every request, never renewed) or is created per request.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{BackendSession, LoginCredentials, SecretBackend};
use crate::{Error, Result};

/// Where Kubernetes mounts the service account token.
pub const DEFAULT_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// How the broker authenticates to Vault.
#[derive(Clone)]
pub enum SessionSource {
    /// Exchange the bootstrap JWT at `POST /v1/auth/<login_path>`.
    KubernetesLogin {
        /// Mount-relative login path.
        login_path: String,
        /// Role to log in as.
        role: String,
        /// File holding the bootstrap JWT.
        jwt_path: PathBuf,
    },
    /// Pre-provisioned token.
    StaticToken(String),
}

impl std::fmt::Debug for SessionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KubernetesLogin {
                login_path,
                role,
                jwt_path,
            } => f
                .debug_struct("KubernetesLogin")
                .field("login_path", login_path)
                .field("role", role)
                .field("jwt_path", jwt_path)
                .finish(),
            Self::StaticToken(_) => f.write_str("StaticToken(<redacted>)"),
        }
    }
}

/// Lifetime of the broker's own session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SessionLifetime {
    /// One session created at startup and shared by all requests.
    #[default]
    Process,
    /// A fresh session for every request.
    Request,
}

/// Produces a [`BackendSession`] from a [`SessionSource`].
#[derive(Clone)]
pub struct SessionInitializer {
    backend: Arc<dyn SecretBackend>,
    source: SessionSource,
}

impl SessionInitializer {
    /// Create an initializer for `source` against `backend`.
    pub fn new(backend: Arc<dyn SecretBackend>, source: SessionSource) -> Self {
        Self { backend, source }
    }

    /// The configured source.
    #[must_use]
    pub fn source(&self) -> &SessionSource {
        &self.source
    }

    /// Obtain an authenticated session. One attempt, no retry.
    pub async fn initialize(&self) -> Result<BackendSession> {
        match &self.source {
            SessionSource::StaticToken(token) => Ok(BackendSession::new(token.clone())),
            SessionSource::KubernetesLogin {
                login_path,
                role,
                jwt_path,
            } => {
                let jwt = tokio::fs::read_to_string(jwt_path).await.map_err(|e| {
                    Error::Authentication(format!(
                        "error reading token {}: {e}",
                        jwt_path.display()
                    ))
                })?;

                info!(login_path = %login_path, role = %role, "Exchanging bootstrap credential");
                let credentials = LoginCredentials {
                    login_path: login_path.clone(),
                    jwt,
                    role: role.clone(),
                };
                self.backend.login(&credentials).await
            }
        }
    }
}

/// Hands out the session used for a request.
pub enum SessionProvider {
    /// Created once, reused by every request without renewal.
    Shared(BackendSession),
    /// Created on demand for each request.
    PerRequest(SessionInitializer),
}

impl SessionProvider {
    /// Build a provider. For [`SessionLifetime::Process`] the session is
    /// created immediately, so startup fails if Vault rejects the login.
    pub async fn new(initializer: SessionInitializer, lifetime: SessionLifetime) -> Result<Self> {
        match lifetime {
            SessionLifetime::Process => {
                let session = initializer.initialize().await?;
                warn!("Vault session is shared for the process lifetime and is never renewed");
                Ok(Self::Shared(session))
            }
            SessionLifetime::Request => Ok(Self::PerRequest(initializer)),
        }
    }

    /// Session for the current request.
    pub async fn session(&self) -> Result<BackendSession> {
        match self {
            Self::Shared(session) => Ok(session.clone()),
            Self::PerRequest(initializer) => initializer.initialize().await,
        }
    }
}
