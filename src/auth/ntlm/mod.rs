//! NTLMv2 server-side security provider
//!
//! - `message`: wire codec for NEGOTIATE / CHALLENGE / AUTHENTICATE
//! - `credentials`: the account directory and key derivation
//! - `context`: one handshake from challenge to authenticated identity

mod context;
mod credentials;
pub mod message;
#[cfg(test)]
pub(crate) mod test_client;

pub use context::ServerContext;
pub use credentials::{CredentialsError, ServerCredentials};

/// Errors raised while running a handshake
#[derive(Debug, thiserror::Error)]
pub enum NtlmError {
    #[error("malformed NTLM message: {0}")]
    Malformed(&'static str),
    #[error("unexpected NTLM message type {found}, expected {expected}")]
    UnexpectedType { expected: u32, found: u32 },
    #[error("NTLM field too large: {0}")]
    Oversized(&'static str),
    #[error("unsupported NTLM variant: {0}")]
    Unsupported(&'static str),
    #[error("anonymous logon is not accepted")]
    Anonymous,
    #[error("unknown account {0}")]
    UnknownAccount(String),
    #[error("the credentials supplied for {0} are invalid")]
    InvalidCredentials(String),
    #[error("security context is in the wrong state: {0}")]
    InvalidState(&'static str),
    #[error("could not generate a server challenge: {0}")]
    Entropy(#[from] rand::Error),
    #[error("key derivation failed: {0}")]
    Crypto(#[from] hmac::digest::InvalidLength),
}

impl NtlmError {
    /// Whether the client's input caused the failure, as opposed to the
    /// server being unable to run the handshake at all
    pub const fn is_credential_error(&self) -> bool {
        !matches!(
            self,
            Self::InvalidState(_) | Self::Entropy(_) | Self::Crypto(_)
        )
    }
}
