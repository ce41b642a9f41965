//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

use crate::backend::SessionLifetime;
use crate::config::IdentitySource;

/// Vault token broker - issue group-scoped Vault tokens to proxy-authenticated callers
#[derive(Parser, Debug)]
#[command(name = "vault-token-broker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "VAULT_BROKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Vault address, e.g. <https://vault:8200>
    #[arg(long, env = "VAULT_BROKER_VAULT_ADDR")]
    pub vault_addr: Option<String>,

    /// Path to CA certificate/certificate folder to validate Vault server
    #[arg(long, env = "VAULT_BROKER_CA_CERT")]
    pub ca_cert: Option<PathBuf>,

    /// Path to CSV file whose first record lists the allowed groups
    #[arg(long, env = "VAULT_BROKER_ALLOWED_GROUPS_FILE")]
    pub config_path: Option<PathBuf>,

    /// Redirect responses to <http://localhost:63974/authed>
    #[arg(long)]
    pub redirect: bool,

    /// Vault login path, e.g. `kubernetes/login`
    #[arg(long, env = "VAULT_BROKER_LOGIN_PATH", conflicts_with = "token")]
    pub login_path: Option<String>,

    /// Role to log in to Vault as
    #[arg(long, env = "VAULT_BROKER_ROLE")]
    pub role: Option<String>,

    /// Bootstrap credential file exchanged at the login path
    #[arg(long, env = "VAULT_BROKER_JWT_PATH")]
    pub jwt_path: Option<PathBuf>,

    /// Pre-provisioned Vault token used instead of a login
    #[arg(long, env = "VAULT_BROKER_STATIC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Lifetime of the broker's own Vault session
    #[arg(long, value_enum, env = "VAULT_BROKER_SESSION_LIFETIME")]
    pub session_lifetime: Option<SessionLifetime>,

    /// Token role to use when creating tokens
    #[arg(long, env = "VAULT_BROKER_TOKEN_ROLE")]
    pub token_role: Option<String>,

    /// TTL of issued tokens
    #[arg(long, env = "VAULT_BROKER_TOKEN_TTL")]
    pub token_ttl: Option<String>,

    /// Where caller identity is read from
    #[arg(long, value_enum, env = "VAULT_BROKER_IDENTITY_SOURCE")]
    pub identity_source: Option<IdentitySource>,

    /// Port to listen on
    #[arg(short, long, env = "VAULT_BROKER_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "VAULT_BROKER_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "VAULT_BROKER_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "VAULT_BROKER_LOG_FORMAT")]
    pub log_format: Option<String>,
}
