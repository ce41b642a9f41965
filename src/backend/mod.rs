//! Secret backend capability and wire types.
//!
//! The broker only needs two things from Vault: a way to authenticate
//! itself ([`SecretBackend::login`]) and a way to mint a child token on a
//! caller's behalf ([`SecretBackend::issue_token`]). Everything else about
//! the Vault API stays behind [`VaultBackend`].
//!
//! [`SessionInitializer`] decides how the broker's own session is obtained
//! (bootstrap-credential exchange or a pre-provisioned token) and
//! [`SessionProvider`] decides how long it lives.

pub mod session;
pub mod vault;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

pub use session::{SessionInitializer, SessionLifetime, SessionProvider, SessionSource};
pub use vault::VaultBackend;

/// Narrow capability interface over the secret backend.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Exchange a bootstrap credential for a session token.
    ///
    /// Exactly one attempt is made; no retry.
    async fn login(&self, credentials: &LoginCredentials) -> Result<BackendSession>;

    /// Create a new token scoped by `request`, authenticated with `session`.
    async fn issue_token(
        &self,
        session: &BackendSession,
        request: &TokenCreateRequest,
    ) -> Result<Secret>;
}

/// Bootstrap login submitted to `POST /v1/auth/<login_path>`.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    /// Mount-relative login path, e.g. `kubernetes/login`.
    #[serde(skip)]
    pub login_path: String,
    /// Bootstrap credential (service account JWT).
    pub jwt: String,
    /// Backend role to log in as.
    pub role: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("login_path", &self.login_path)
            .field("jwt", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Authenticated handle held by the broker.
///
/// Never renewed. Address and trust material live on the backend client.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendSession {
    token: String,
}

impl BackendSession {
    /// Wrap a session token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The raw session token, sent as `X-Vault-Token`.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for BackendSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSession")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /v1/auth/token/create[/<role>]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenCreateRequest {
    /// Named token role; selects the `/create/<role>` endpoint.
    #[serde(skip)]
    pub role: Option<String>,
    /// Policies attached to the new token.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    /// Display name recorded on the token.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Initial TTL, Vault duration syntax (`12h`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ttl: String,
    /// Hard upper bound on the token's lifetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit_max_ttl: Option<String>,
    /// Whether the token may be renewed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewable: Option<bool>,
}

/// A Vault secret as returned by the API.
///
/// This is the issued token handed back to callers; its serialized form
/// is the canonical response payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    /// Request ID assigned by Vault.
    #[serde(default)]
    pub request_id: String,
    /// Lease ID (empty for tokens).
    #[serde(default)]
    pub lease_id: String,
    /// Lease duration in seconds.
    #[serde(default)]
    pub lease_duration: i64,
    /// Whether the lease is renewable.
    #[serde(default)]
    pub renewable: bool,
    // `data` and `warnings` always serialize (as `null` when unset);
    // `auth` and `wrap_info` are omitted when unset.

    /// Secret payload (null for token creation).
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    /// Warnings emitted by Vault.
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
    /// Authentication block carrying the client token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<SecretAuth>,
    /// Response-wrapping information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_info: Option<Value>,
}

impl Secret {
    /// Client token from the auth block, if any.
    #[must_use]
    pub fn client_token(&self) -> Option<&str> {
        self.auth
            .as_ref()
            .map(|a| a.client_token.as_str())
            .filter(|t| !t.is_empty())
    }
}

/// `auth` block of a Vault secret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretAuth {
    /// The issued token.
    #[serde(default)]
    pub client_token: String,
    /// Token accessor (safe to log).
    #[serde(default)]
    pub accessor: String,
    /// All policies attached to the token.
    #[serde(default)]
    pub policies: Vec<String>,
    /// Policies attached directly to the token.
    #[serde(default)]
    pub token_policies: Vec<String>,
    /// Policies inherited through the identity entity and its groups.
    #[serde(default)]
    pub identity_policies: Option<Vec<String>>,
    /// Token metadata.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    /// Token TTL in seconds.
    #[serde(default)]
    pub lease_duration: i64,
    /// Whether the token is renewable.
    #[serde(default)]
    pub renewable: bool,
    /// Identity entity ID.
    #[serde(default)]
    pub entity_id: String,
    /// `service` or `batch`.
    #[serde(default)]
    pub token_type: String,
    /// Whether the token has no parent.
    #[serde(default)]
    pub orphan: bool,
}
