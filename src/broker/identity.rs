//! Caller identity extraction from trusted proxy input.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::config::IdentityConfig;
use crate::{Error, Result};

/// Identity asserted by the upstream proxy. Built per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerIdentity {
    /// Free-text caller name.
    pub name: String,
    /// Group claims in header order; may hold empty strings or duplicates.
    pub claimed_groups: Vec<String>,
}

/// Body accepted by the body identity source.
#[derive(Debug, Deserialize)]
struct NameRequest {
    name: String,
}

impl CallerIdentity {
    /// Read the caller name and group claims from the configured headers.
    ///
    /// A missing header reads as the empty string, so a request without a
    /// groups header claims exactly one empty group.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, config: &IdentityConfig) -> Self {
        let name = header_value(headers, &config.user_header);
        let groups = header_value(headers, &config.groups_header);
        Self {
            name,
            claimed_groups: split_groups(&groups, config.group_separator),
        }
    }

    /// Read the caller name from a `{"name": ...}` JSON body. No groups.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let req: NameRequest =
            serde_json::from_slice(body).map_err(|e| Error::MalformedInput(e.to_string()))?;
        Ok(Self {
            name: req.name,
            claimed_groups: Vec::new(),
        })
    }
}

/// Split a claims string. Never returns an empty vector: `""` yields `[""]`.
#[must_use]
pub fn split_groups(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator).map(str::to_string).collect()
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}
