//! Token issuance on a caller's behalf.

use std::sync::Arc;

use crate::backend::{BackendSession, Secret, SecretBackend, TokenCreateRequest};
use crate::config::TokenConfig;
use crate::{Error, Result};

/// Mints caller tokens with the authorized groups as policies.
pub struct TokenIssuer {
    backend: Arc<dyn SecretBackend>,
    config: TokenConfig,
}

impl TokenIssuer {
    /// Create an issuer with static token parameters.
    pub fn new(backend: Arc<dyn SecretBackend>, config: TokenConfig) -> Self {
        Self { backend, config }
    }

    /// Static token parameters.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Build the creation request for `name` holding `policies`.
    #[must_use]
    pub fn build_request(&self, name: &str, policies: &[String]) -> TokenCreateRequest {
        TokenCreateRequest {
            role: self.config.role.clone().filter(|r| !r.is_empty()),
            policies: policies.to_vec(),
            display_name: name.to_string(),
            ttl: self.config.ttl.clone(),
            explicit_max_ttl: self.config.explicit_max_ttl.clone().filter(|t| !t.is_empty()),
            renewable: Some(self.config.renewable),
        }
    }

    /// Issue a token. Any backend failure is an [`Error::Issuance`]; no retry.
    pub async fn issue(
        &self,
        session: &BackendSession,
        name: &str,
        policies: &[String],
    ) -> Result<Secret> {
        let request = self.build_request(name, policies);
        self.backend
            .issue_token(session, &request)
            .await
            .map_err(|e| match e {
                Error::Issuance(_) => e,
                other => Error::Issuance(other.to_string()),
            })
    }
}
