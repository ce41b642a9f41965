//! Token broker — proxy-asserted identity to short-lived Vault tokens.
//!
//! # Request flow
//!
//! ```text
//! GET /
//!   -> Extract caller identity (headers, or JSON body)
//!   -> Filter group claims against the allow-list (headers only)
//!   -> Obtain the broker's Vault session
//!   -> Create a token: policies = authorized groups, display name = caller
//!   -> Deliver: JSON body, or 307 to the loopback callback
//! ```
//!
//! The allow-list and the shared session are built once at startup and are
//! read-only afterwards. Nothing issued here is stored, renewed or revoked.

pub mod audit;
pub mod authorizer;
pub mod dispatch;
pub mod handler;
pub mod identity;
pub mod issuer;

use axum::response::Response;
use tracing::warn;

use crate::Result;
use crate::backend::{Secret, SessionProvider};
use crate::config::IdentityConfig;

pub use audit::AuditEvent;
pub use authorizer::{AllowList, filter_groups};
pub use dispatch::{DeliveryMode, REDIRECT_URL};
pub use handler::broker_routes;
pub use identity::{CallerIdentity, split_groups};
pub use issuer::TokenIssuer;

/// Central coordinator holding everything a request needs.
pub struct TokenBroker {
    sessions: SessionProvider,
    issuer: TokenIssuer,
    allow_list: AllowList,
    identity: IdentityConfig,
    delivery: DeliveryMode,
}

impl TokenBroker {
    /// Assemble a broker from its startup-built parts.
    pub fn new(
        sessions: SessionProvider,
        issuer: TokenIssuer,
        allow_list: AllowList,
        identity: IdentityConfig,
        delivery: DeliveryMode,
    ) -> Self {
        Self {
            sessions,
            issuer,
            allow_list,
            identity,
            delivery,
        }
    }

    /// Identity extraction settings.
    #[must_use]
    pub fn identity_config(&self) -> &IdentityConfig {
        &self.identity
    }

    /// The allow-list in force.
    #[must_use]
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Delivery mode in force.
    #[must_use]
    pub fn delivery(&self) -> DeliveryMode {
        self.delivery
    }

    /// Groups of `identity` that become token policies.
    pub fn authorize(&self, identity: &CallerIdentity) -> Result<Vec<String>> {
        self.allow_list
            .authorize(&identity.claimed_groups)
            .inspect_err(|e| {
                warn!(caller = %identity.name, "Caller has no allowed groups");
                audit::emit(&AuditEvent::denied(identity, e.to_string()));
            })
    }

    /// Create a token for `identity` carrying `policies`.
    pub async fn issue(&self, identity: &CallerIdentity, policies: &[String]) -> Result<Secret> {
        let result = match self.sessions.session().await {
            Ok(session) => self.issuer.issue(&session, &identity.name, policies).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(secret) => {
                audit::emit(&AuditEvent::issued(&identity.name, &secret));
                Ok(secret)
            }
            Err(e) => {
                warn!(caller = %identity.name, error = %e, "Token issuance failed");
                audit::emit(&AuditEvent::failed(&identity.name, e.to_string()));
                Err(e)
            }
        }
    }

    /// Build the response delivering `secret`.
    pub fn deliver(&self, secret: &Secret) -> Result<Response> {
        self.delivery.deliver(secret)
    }
}
