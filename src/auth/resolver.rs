//! Per-client handshake bookkeeping
//!
//! Turns the sequence of `Authorization` headers a client sends into either
//! a demand for another round or a resolved identity. Pending handshakes
//! live in a mutex-guarded table keyed by the client token; a lookup removes
//! the entry, so each context is consumed exactly once.

use super::identity::{current_user, ResolvedIdentity};
use super::ntlm::message::{message_type, NEGOTIATE};
use super::ntlm::{NtlmError, ServerContext, ServerCredentials};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Authentication scheme named in `Authorization` / `WWW-Authenticate`
pub const SCHEME: &str = "NTLM";

/// Outcome of one round of the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Reply 401. `None` asks the client to start over, `Some` carries the
    /// base64 challenge for the second round.
    Challenge(Option<String>),
    Resolved(ResolvedIdentity),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("illegal base64 data in Authorization header: {0}")]
    Encoding(#[from] base64::DecodeError),
    /// The opening message was rejected; the client should restart
    #[error("{0}")]
    Negotiate(NtlmError),
    #[error("{0}")]
    Handshake(NtlmError),
    #[error("NTLM error: {0}")]
    Internal(NtlmError),
}

impl AuthError {
    fn negotiate(err: NtlmError) -> Self {
        if err.is_credential_error() {
            Self::Negotiate(err)
        } else {
            Self::Internal(err)
        }
    }

    fn handshake(err: NtlmError) -> Self {
        if err.is_credential_error() {
            Self::Handshake(err)
        } else {
            Self::Internal(err)
        }
    }
}

struct PendingHandshake {
    context: ServerContext,
    started: Instant,
}

pub struct IdentityResolver {
    credentials: Arc<ServerCredentials>,
    pending: Mutex<HashMap<String, PendingHandshake>>,
    ttl: Duration,
}

impl IdentityResolver {
    pub fn new(credentials: Arc<ServerCredentials>, ttl: Duration) -> Self {
        Self {
            credentials,
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Advance the handshake for `key` with the request's `Authorization`
    /// header value.
    pub fn resolve(
        &self,
        key: &str,
        authorization: Option<&str>,
    ) -> Result<Resolution, AuthError> {
        let Some(payload) = authorization.and_then(parse_authorization) else {
            return Ok(Resolution::Challenge(None));
        };
        let data = STANDARD.decode(payload)?;

        let pending = self.take_pending(key);
        match pending {
            Some(pending) if message_type(&data) != Some(NEGOTIATE) => {
                Self::complete(pending.context, &data)
            }
            // A fresh NEGOTIATE replaces whatever was in flight
            _ => self.negotiate(key, &data),
        }
    }

    fn negotiate(&self, key: &str, data: &[u8]) -> Result<Resolution, AuthError> {
        let (context, challenge) =
            ServerContext::new(&self.credentials, data).map_err(AuthError::negotiate)?;
        self.lock().insert(
            key.to_string(),
            PendingHandshake {
                context,
                started: Instant::now(),
            },
        );
        Ok(Resolution::Challenge(Some(STANDARD.encode(challenge))))
    }

    fn complete(mut context: ServerContext, data: &[u8]) -> Result<Resolution, AuthError> {
        context.update(data).map_err(AuthError::handshake)?;
        let identity = {
            let _bracket = context.impersonate().map_err(AuthError::handshake)?;
            current_user()
        };
        Ok(Resolution::Resolved(identity))
    }

    /// Remove and return the pending handshake for `key`, unless it expired
    fn take_pending(&self, key: &str) -> Option<PendingHandshake> {
        let pending = self.lock().remove(key)?;
        if pending.started.elapsed() >= self.ttl {
            tracing::debug!(client = key, "discarding expired NTLM handshake");
            return None;
        }
        Some(pending)
    }

    /// Drop every handshake older than the TTL, returning how many went
    pub fn evict_expired(&self) -> usize {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, p| p.started.elapsed() < self.ttl);
        before - pending.len()
    }

    #[cfg(test)]
    pub fn has_pending(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingHandshake>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("pending", &self.pending_count())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Payload of `NTLM <payload>`; anything else reads as no credentials
fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, payload) = value.split_once(' ')?;
    (scheme == SCHEME && !payload.is_empty()).then_some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ntlm::test_client;
    use crate::config::{AccountConfig, AuthConfig};

    const CLIENT: &str = "10.0.0.7:50123";

    fn resolver(ttl: Duration) -> IdentityResolver {
        let config = AuthConfig {
            accounts: vec![AccountConfig {
                username: "alice".to_string(),
                domain: "CORP".to_string(),
                password: Some("Wonderland1".to_string()),
                ..AccountConfig::default()
            }],
            ..AuthConfig::default()
        };
        let creds = Arc::new(ServerCredentials::acquire(&config).unwrap());
        IdentityResolver::new(creds, ttl)
    }

    fn challenge_of(resolution: Resolution) -> Vec<u8> {
        match resolution {
            Resolution::Challenge(Some(blob)) => STANDARD.decode(blob).unwrap(),
            other => panic!("expected a challenge, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_or_foreign_header_restarts() {
        let r = resolver(Duration::from_secs(60));
        for header in [None, Some("Basic YWxpY2U6cHc="), Some("NTLM"), Some("NTLM "), Some("ntlm TlRMTQ==")] {
            assert_eq!(r.resolve(CLIENT, header).unwrap(), Resolution::Challenge(None));
        }
        assert_eq!(r.pending_count(), 0);
    }

    #[test]
    fn test_bad_base64_is_an_encoding_error() {
        let r = resolver(Duration::from_secs(60));
        assert!(matches!(
            r.resolve(CLIENT, Some("NTLM ***")),
            Err(AuthError::Encoding(_))
        ));
    }

    #[test]
    fn test_two_round_handshake_consumes_state() {
        let r = resolver(Duration::from_secs(60));
        let negotiate = test_client::header(&test_client::negotiate());
        let challenge = challenge_of(r.resolve(CLIENT, Some(&negotiate)).unwrap());
        assert!(r.has_pending(CLIENT));

        let auth = test_client::header(&test_client::authenticate(
            &challenge,
            "alice",
            "CORP",
            "Wonderland1",
        ));
        match r.resolve(CLIENT, Some(&auth)).unwrap() {
            Resolution::Resolved(identity) => assert_eq!(identity.account(), "CORP\\alice"),
            other => panic!("expected identity, got {other:?}"),
        }
        assert!(!r.has_pending(CLIENT));

        // Replay with no stored context is a rejected negotiation
        assert!(matches!(
            r.resolve(CLIENT, Some(&auth)),
            Err(AuthError::Negotiate(NtlmError::UnexpectedType { .. }))
        ));
        assert!(!r.has_pending(CLIENT));
    }

    #[test]
    fn test_failed_authentication_discards_context() {
        let r = resolver(Duration::from_secs(60));
        let negotiate = test_client::header(&test_client::negotiate());
        let challenge = challenge_of(r.resolve(CLIENT, Some(&negotiate)).unwrap());
        let auth = test_client::header(&test_client::authenticate(&challenge, "alice", "CORP", "nope"));

        let err = r.resolve(CLIENT, Some(&auth)).unwrap_err();
        assert!(matches!(err, AuthError::Handshake(NtlmError::InvalidCredentials(_))));
        assert!(!r.has_pending(CLIENT));
    }

    #[test]
    fn test_handshakes_are_keyed_per_client() {
        let r = resolver(Duration::from_secs(60));
        let negotiate = test_client::header(&test_client::negotiate());
        let first = challenge_of(r.resolve(CLIENT, Some(&negotiate)).unwrap());
        let _ = r.resolve("10.0.0.8:40000", Some(&negotiate)).unwrap();
        assert_eq!(r.pending_count(), 2);

        // Renegotiating replaces the slot with a new challenge
        let second = challenge_of(r.resolve(CLIENT, Some(&negotiate)).unwrap());
        assert_ne!(first[24..32], second[24..32]);
        assert_eq!(r.pending_count(), 2);

        let stale = test_client::header(&test_client::authenticate(
            &first,
            "alice",
            "CORP",
            "Wonderland1",
        ));
        assert!(matches!(
            r.resolve(CLIENT, Some(&stale)),
            Err(AuthError::Handshake(_))
        ));
    }

    #[test]
    fn test_expired_handshakes_are_ignored_and_swept() {
        let r = resolver(Duration::ZERO);
        let negotiate = test_client::header(&test_client::negotiate());
        let challenge = challenge_of(r.resolve(CLIENT, Some(&negotiate)).unwrap());
        let _ = r.resolve("10.0.0.8:40000", Some(&negotiate)).unwrap();

        assert_eq!(r.evict_expired(), 2);
        assert_eq!(r.pending_count(), 0);

        // An answer to an expired challenge is treated as a new negotiation
        let _ = r.resolve(CLIENT, Some(&negotiate)).unwrap();
        let auth = test_client::header(&test_client::authenticate(
            &challenge,
            "alice",
            "CORP",
            "Wonderland1",
        ));
        assert!(matches!(
            r.resolve(CLIENT, Some(&auth)),
            Err(AuthError::Negotiate(_))
        ));
    }
}
