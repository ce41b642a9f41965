//! Configuration management

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::backend::session::DEFAULT_JWT_PATH;
use crate::backend::{SessionLifetime, SessionSource};
use crate::broker::AllowList;
use crate::cli::Cli;
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,
    /// Vault connection and broker authentication
    pub vault: VaultConfig,
    /// Parameters of issued tokens
    pub token: TokenConfig,
    /// Where caller identity is read from
    pub identity: IdentityConfig,
    /// How issued tokens reach the caller
    pub delivery: DeliveryConfig,
    /// File whose first record is the group allow-list
    pub allowed_groups_file: Option<PathBuf>,
    /// Inline allow-list, used when no file is configured
    pub allowed_groups: Vec<String>,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Vault connection and broker authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Vault address, e.g. `https://vault:8200`
    pub address: String,
    /// CA certificate file or directory used to validate Vault
    pub ca_cert: Option<PathBuf>,
    /// Login path for the bootstrap exchange, e.g. `kubernetes/login`
    pub login_path: Option<String>,
    /// Role to log in as
    pub role: Option<String>,
    /// Bootstrap credential location
    pub jwt_path: PathBuf,
    /// Pre-provisioned token (alternative to login)
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Whether the broker session is shared or per request
    pub session_lifetime: SessionLifetime,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            ca_cert: None,
            login_path: None,
            role: None,
            jwt_path: PathBuf::from(DEFAULT_JWT_PATH),
            token: None,
            session_lifetime: SessionLifetime::Process,
        }
    }
}

/// Parameters of issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Initial TTL
    pub ttl: String,
    /// Hard upper bound on lifetime
    pub explicit_max_ttl: Option<String>,
    /// Named token role
    pub role: Option<String>,
    /// Whether issued tokens are renewable
    pub renewable: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl: "12h".to_string(),
            explicit_max_ttl: Some("12h".to_string()),
            role: None,
            renewable: false,
        }
    }
}

/// Where caller identity comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Caller name and groups from proxy headers
    #[default]
    Headers,
    /// Caller name from a JSON body; no groups, no authorization
    Body,
}

/// Identity extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Source of the caller identity
    pub source: IdentitySource,
    /// Header carrying the caller name
    pub user_header: String,
    /// Header carrying the group claims
    pub groups_header: String,
    /// Separator between group claims
    pub group_separator: char,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            source: IdentitySource::Headers,
            user_header: "X-Forwarded-User".to_string(),
            groups_header: "X-Forwarded-Groups".to_string(),
            group_separator: '|',
        }
    }
}

/// Delivery settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Redirect to the local callback instead of writing the body
    pub redirect: bool,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // VAULT_BROKER_VAULT__ADDRESS -> vault.address
        figment = figment.merge(Env::prefixed("VAULT_BROKER_").split("__"));

        figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref addr) = cli.vault_addr {
            self.vault.address.clone_from(addr);
        }
        if let Some(ref ca) = cli.ca_cert {
            self.vault.ca_cert = Some(ca.clone());
        }
        if let Some(ref path) = cli.config_path {
            self.allowed_groups_file = Some(path.clone());
        }
        if cli.redirect {
            self.delivery.redirect = true;
        }
        if let Some(ref login_path) = cli.login_path {
            self.vault.login_path = Some(login_path.clone());
        }
        if let Some(ref role) = cli.role {
            self.vault.role = Some(role.clone());
        }
        if let Some(ref jwt_path) = cli.jwt_path {
            self.vault.jwt_path.clone_from(jwt_path);
        }
        if let Some(ref token) = cli.token {
            self.vault.token = Some(token.clone());
        }
        if let Some(lifetime) = cli.session_lifetime {
            self.vault.session_lifetime = lifetime;
        }
        if let Some(ref token_role) = cli.token_role {
            self.token.role = Some(token_role.clone());
        }
        if let Some(ref ttl) = cli.token_ttl {
            self.token.ttl.clone_from(ttl);
        }
        if let Some(source) = cli.identity_source {
            self.identity.source = source;
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(ref host) = cli.host {
            self.server.host.clone_from(host);
        }
    }

    /// Reject configurations the broker cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.vault.address.trim().is_empty() {
            return Err(Error::Config(
                "vault address is required (--vault-addr)".to_string(),
            ));
        }
        if self.vault.ca_cert.is_none() {
            return Err(Error::Config(
                "CA certificate path is required (--ca-cert)".to_string(),
            ));
        }
        if self.token.ttl.trim().is_empty() {
            return Err(Error::Config("token ttl must not be empty".to_string()));
        }
        self.session_source().map(|_| ())
    }

    /// How the broker authenticates to Vault.
    pub fn session_source(&self) -> Result<SessionSource> {
        let vault = &self.vault;
        match (&vault.login_path, &vault.token) {
            (Some(_), Some(_)) => Err(Error::Config(
                "--login-path and --token are mutually exclusive".to_string(),
            )),
            (None, None) => Err(Error::Config(
                "either --login-path with --role, or --token, is required".to_string(),
            )),
            (None, Some(token)) if token.is_empty() => {
                Err(Error::Config("static token must not be empty".to_string()))
            }
            (None, Some(token)) => Ok(SessionSource::StaticToken(token.clone())),
            (Some(login_path), None) => {
                let role = vault
                    .role
                    .clone()
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| {
                        Error::Config("--role is required with --login-path".to_string())
                    })?;
                Ok(SessionSource::KubernetesLogin {
                    login_path: login_path.trim_matches('/').to_string(),
                    role,
                    jwt_path: vault.jwt_path.clone(),
                })
            }
        }
    }

    /// Build the allow-list: the file's first record if a file is set,
    /// otherwise the inline list.
    pub fn load_allow_list(&self) -> Result<AllowList> {
        match self.allowed_groups_file {
            Some(ref path) => AllowList::from_file(path),
            None => Ok(AllowList::new(self.allowed_groups.clone())),
        }
    }
}
