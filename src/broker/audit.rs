//! Audit logging for token issuance.
//!
//! Every event is emitted via `tracing::info!` with structured fields, making
//! the audit trail queryable by any log aggregator.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `token.issued` | Vault created a token for the caller |
//! | `token.denied` | The caller holds none of the allowed groups |
//! | `token.failed` | Session setup or token creation failed |
//!
//! The client token is never part of an event; the accessor is.

use serde::Serialize;

use super::identity::CallerIdentity;
use crate::backend::Secret;

/// Structured audit event emitted for every issuance attempt.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Event type string (e.g., `"token.issued"`).
    pub event: &'static str,
    /// Caller name asserted by the proxy.
    pub caller: String,
    /// Group claims (for `token.denied`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_groups: Option<Vec<String>>,
    /// Policies attached to the issued token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<String>>,
    /// Token accessor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessor: Option<String>,
    /// Token TTL in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<i64>,
    /// Whether the token is renewable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewable: Option<bool>,
    /// Human-readable reason for denial or failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Construct a `token.issued` event.
    #[must_use]
    pub fn issued(caller: &str, secret: &Secret) -> Self {
        let auth = secret.auth.as_ref();
        Self {
            event: "token.issued",
            caller: caller.to_string(),
            claimed_groups: None,
            policies: auth.map(|a| a.policies.clone()),
            accessor: auth.map(|a| a.accessor.clone()),
            ttl_secs: auth.map(|a| a.lease_duration),
            renewable: auth.map(|a| a.renewable),
            reason: None,
        }
    }

    /// Construct a `token.denied` event.
    #[must_use]
    pub fn denied(identity: &CallerIdentity, reason: impl Into<String>) -> Self {
        Self {
            event: "token.denied",
            caller: identity.name.clone(),
            claimed_groups: Some(identity.claimed_groups.clone()),
            policies: None,
            accessor: None,
            ttl_secs: None,
            renewable: None,
            reason: Some(reason.into()),
        }
    }

    /// Construct a `token.failed` event.
    #[must_use]
    pub fn failed(caller: &str, reason: impl Into<String>) -> Self {
        Self {
            event: "token.failed",
            caller: caller.to_string(),
            claimed_groups: None,
            policies: None,
            accessor: None,
            ttl_secs: None,
            renewable: None,
            reason: Some(reason.into()),
        }
    }
}

/// Emit an audit event via `tracing::info!`.
///
/// ```text
/// INFO broker::audit audit={"event":"token.issued","caller":"alice",...}
/// ```
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "token broker audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SecretAuth;

    fn secret() -> Secret {
        Secret {
            auth: Some(SecretAuth {
                client_token: "s.do-not-log".to_string(),
                accessor: "acc-1".to_string(),
                policies: vec!["dev".to_string()],
                lease_duration: 43200,
                ..SecretAuth::default()
            }),
            ..Secret::default()
        }
    }

    #[test]
    fn issued_event_never_contains_client_token() {
        // GIVEN: an issued secret
        let event = AuditEvent::issued("alice", &secret());

        // WHEN: serialized
        let json = serde_json::to_string(&event).unwrap();

        // THEN: accessor present, client token absent
        assert_eq!(event.event, "token.issued");
        assert!(json.contains("acc-1"));
        assert!(!json.contains("s.do-not-log"));
        assert_eq!(event.ttl_secs, Some(43200));
    }

    #[test]
    fn denied_event_records_claims() {
        let identity = CallerIdentity {
            name: "bob".to_string(),
            claimed_groups: vec!["users".to_string()],
        };

        let event = AuditEvent::denied(&identity, "no allowed groups");

        assert_eq!(event.event, "token.denied");
        assert_eq!(event.claimed_groups, Some(vec!["users".to_string()]));
        assert_eq!(event.reason.as_deref(), Some("no allowed groups"));
    }

    #[test]
    fn failed_event_has_reason() {
        let event = AuditEvent::failed("carol", "permission denied");
        assert_eq!(event.event, "token.failed");
        assert!(event.policies.is_none());
    }

    #[test]
    fn emit_does_not_panic() {
        emit(&AuditEvent::issued("alice", &secret()));
    }
}
