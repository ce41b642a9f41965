//! Vault HTTP client speaking the documented JSON API.
//!
//! TLS is validated against the configured CA material only (a PEM file or
//! a directory of PEM files). No timeouts and no retries: every call is
//! attempted exactly once.

use std::fmt::Write as _;
use std::path::Path;

use async_trait::async_trait;
use reqwest::{Certificate, Client, Response};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{BackendSession, LoginCredentials, SecretBackend, Secret, TokenCreateRequest};
use crate::error::error_chain;
use crate::{Error, Result};

/// Header carrying the session token on authenticated calls.
const TOKEN_HEADER: &str = "X-Vault-Token";

/// Error body returned by Vault on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct VaultErrors {
    #[serde(default)]
    errors: Vec<String>,
}

/// Vault client bound to one address and one trust root.
#[derive(Debug, Clone)]
pub struct VaultBackend {
    address: Url,
    http: Client,
}

impl VaultBackend {
    /// Build a client for `address`, trusting only the certificates under
    /// `ca_path`. Built-in and platform roots are not consulted.
    pub fn new(address: &str, ca_path: &Path) -> Result<Self> {
        let certs = load_ca_certificates(ca_path)?;
        let http = Client::builder()
            .tls_certs_only(certs)
            .build()
            .map_err(|e| Error::Certificate(format!("failed to build TLS client: {e}")))?;
        Self::with_client(address, http)
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_client(address: &str, http: Client) -> Result<Self> {
        let address = Url::parse(address)
            .map_err(|e| Error::Config(format!("Invalid vault address '{address}': {e}")))?;
        Ok(Self { address, http })
    }

    /// Vault address this client talks to.
    #[must_use]
    pub fn address(&self) -> &Url {
        &self.address
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.address.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl SecretBackend for VaultBackend {
    async fn login(&self, credentials: &LoginCredentials) -> Result<BackendSession> {
        let url = self.endpoint(&format!("auth/{}", credentials.login_path));
        debug!(url = %url, role = %credentials.role, "Logging in to vault");

        let response = self
            .http
            .post(&url)
            .json(credentials)
            .send()
            .await
            .map_err(|e| Error::from_transport(&e))?;

        if !response.status().is_success() {
            return Err(Error::Authentication(describe_failure(&url, response).await));
        }

        let secret: Secret = response
            .json()
            .await
            .map_err(|e| Error::Authentication(format!("error parsing response: {e}")))?;

        let token = secret.client_token().ok_or_else(|| {
            Error::Authentication("login response carried no client token".to_string())
        })?;

        Ok(BackendSession::new(token))
    }

    async fn issue_token(
        &self,
        session: &BackendSession,
        request: &TokenCreateRequest,
    ) -> Result<Secret> {
        let path = match request.role.as_deref() {
            Some(role) if !role.is_empty() => format!("auth/token/create/{role}"),
            _ => "auth/token/create".to_string(),
        };
        let url = self.endpoint(&path);
        debug!(url = %url, policies = ?request.policies, "Creating token");

        let response = self
            .http
            .post(&url)
            .header(TOKEN_HEADER, session.token())
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Issuance(error_chain(&e)))?;

        if !response.status().is_success() {
            return Err(Error::Issuance(describe_failure(&url, response).await));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Issuance(format!("error parsing response: {e}")))
    }
}

/// Render a non-2xx Vault response, keeping the backend's error text verbatim.
async fn describe_failure(url: &str, response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let errors = serde_json::from_str::<VaultErrors>(&body)
        .map(|e| e.errors)
        .unwrap_or_default();

    let mut text = format!("URL: POST {url}\nCode: {}. Errors:\n", status.as_u16());
    if errors.is_empty() {
        if !body.trim().is_empty() {
            let _ = write!(text, "\n{}", body.trim());
        }
    } else {
        for err in errors {
            let _ = write!(text, "\n* {err}");
        }
    }
    text
}

/// Load every certificate from a PEM file, or from every file in a directory.
fn load_ca_certificates(ca_path: &Path) -> Result<Vec<Certificate>> {
    let files = if ca_path.is_dir() {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(ca_path).map_err(|e| {
            Error::Certificate(format!("cannot read CA directory {}: {e}", ca_path.display()))
        })? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        files
    } else {
        vec![ca_path.to_path_buf()]
    };

    let mut certs = Vec::new();
    for file in files {
        let pem = std::fs::read(&file).map_err(|e| {
            Error::Certificate(format!("cannot read CA file {}: {e}", file.display()))
        })?;
        let bundle = Certificate::from_pem_bundle(&pem).map_err(|e| {
            Error::Certificate(format!("invalid CA file {}: {e}", file.display()))
        })?;
        certs.extend(bundle);
    }

    if certs.is_empty() {
        return Err(Error::Certificate(format!(
            "no certificates found at {}",
            ca_path.display()
        )));
    }
    Ok(certs)
}
