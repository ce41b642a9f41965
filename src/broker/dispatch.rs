//! Response delivery of issued tokens.
//!
//! | Mode | Response |
//! |------|----------|
//! | Direct | `200` with the secret's JSON as the body |
//! | Redirect | `307` to `http://localhost:63974/authed?status=ok&config=<base64url(JSON)>` |
//!
//! Both modes serialize through [`encode_secret`], so the direct body and the
//! decoded `config` parameter are byte-identical for the same secret.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use url::Url;

use crate::backend::Secret;
use crate::{Error, Result};

/// Loopback callback served by the local helper.
pub const REDIRECT_URL: &str = "http://localhost:63974/authed";

/// How an issued token reaches the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Write the secret as the response body.
    #[default]
    Direct,
    /// Redirect to the loopback callback with the secret in the query.
    Redirect,
}

impl DeliveryMode {
    /// Mode selected by the `redirect` toggle.
    #[must_use]
    pub fn from_redirect_flag(redirect: bool) -> Self {
        if redirect { Self::Redirect } else { Self::Direct }
    }

    /// Build the response delivering `secret`.
    pub fn deliver(self, secret: &Secret) -> Result<Response> {
        let payload = encode_secret(secret)?;
        match self {
            Self::Direct => Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                payload,
            )
                .into_response()),
            Self::Redirect => {
                let target = redirect_url(&payload)?;
                Ok(Redirect::temporary(target.as_str()).into_response())
            }
        }
    }
}

/// Canonical JSON form of an issued secret.
pub fn encode_secret(secret: &Secret) -> Result<Vec<u8>> {
    serde_json::to_vec(secret).map_err(|e| Error::Serialization(e.to_string()))
}

/// Callback URL carrying `payload` as padded base64url in `config`.
pub fn redirect_url(payload: &[u8]) -> Result<Url> {
    let mut url = Url::parse(REDIRECT_URL)
        .map_err(|e| Error::Internal(format!("Error generating redirect: {e}")))?;
    url.query_pairs_mut()
        .append_pair("status", "ok")
        .append_pair("config", &URL_SAFE.encode(payload));
    Ok(url)
}
