//! Identity endpoint: greets the caller once the NTLM handshake resolves them

use crate::auth::{AuthError, Authorizer, IdentityResolver, Resolution, SCHEME};
use crate::http;
use crate::logger;
use crate::routing::RequestContext;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::AUTHORIZATION;
use hyper::Response;
use std::sync::Arc;

/// Account that authenticated on this request, attached to the response
/// extensions for the access log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount(pub String);

#[derive(Debug)]
pub struct UserInfo {
    resolver: Arc<IdentityResolver>,
    gate: Arc<dyn Authorizer>,
}

impl UserInfo {
    pub fn new(resolver: Arc<IdentityResolver>, gate: Arc<dyn Authorizer>) -> Self {
        Self { resolver, gate }
    }

    pub fn serve(&self, ctx: &RequestContext<'_>) -> Response<Full<Bytes>> {
        let client = ctx.remote_addr.to_string();
        match self.resolver.resolve(&client, ctx.header(&AUTHORIZATION)) {
            Ok(Resolution::Challenge(None)) => {
                http::build_challenge_response(SCHEME, "Authorization required")
            }
            Ok(Resolution::Challenge(Some(challenge))) => http::build_challenge_response(
                &format!("{SCHEME} {challenge}"),
                "Respond to challenge",
            ),
            Ok(Resolution::Resolved(identity)) => {
                if !self.gate.authorize(&identity, ctx) {
                    logger::log_warning(&format!(
                        "Denied {} from {client}",
                        identity.account()
                    ));
                    return http::build_401_response(&format!(
                        "{} is not authorized to do that",
                        identity.account()
                    ));
                }
                let mut response =
                    http::build_ok_text(format!("Hello, {}", identity.greeting_name()));
                response
                    .extensions_mut()
                    .insert(AuthenticatedAccount(identity.account().to_string()));
                response
            }
            Err(e @ AuthError::Encoding(_)) => {
                logger::log_warning(&format!("Bad Authorization header from {client}: {e}"));
                http::build_400_response(&e.to_string())
            }
            Err(e @ AuthError::Negotiate(_)) => {
                logger::log_warning(&format!("Rejected NTLM negotiation from {client}: {e}"));
                http::build_challenge_response(SCHEME, "Authorization required")
            }
            Err(e @ AuthError::Handshake(_)) => {
                logger::log_warning(&format!("NTLM authentication failed for {client}: {e}"));
                http::build_401_response(&e.to_string())
            }
            Err(e @ AuthError::Internal(_)) => {
                logger::log_error(&e.to_string());
                http::build_500_response(&e.to_string())
            }
        }
    }
}
