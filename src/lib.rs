//! Vault Token Broker Library
//!
//! Issues short-lived, group-scoped Vault tokens to callers authenticated by
//! a trusted reverse proxy.
//!
//! # Features
//!
//! - **Proxy identity**: caller name and pipe-delimited groups from forwarded
//!   headers, or a name from a JSON body
//! - **Group allow-list**: optional filter loaded once from a CSV record
//! - **Vault bootstrap**: Kubernetes service-account login or a static token,
//!   shared for the process or created per request
//! - **Delivery**: JSON body, or a 307 to a loopback callback

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod broker;
pub mod cli;
pub mod config;
pub mod error;
pub mod server;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to install subscriber: {e}"))),
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to install subscriber: {e}"))),
    }
}
