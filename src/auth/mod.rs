//! Caller identity for the `/user/info` endpoint
//!
//! - `ntlm`: the NTLMv2 handshake itself
//! - `resolver`: per-client handshake state across requests
//! - `identity`: resolved identities and the impersonation bracket
//! - `gate`: pluggable authorization policy

pub mod gate;
pub mod identity;
pub mod ntlm;
mod resolver;

pub use gate::{authorizer_from_config, Authorizer};
pub use resolver::{AuthError, IdentityResolver, Resolution, SCHEME};
