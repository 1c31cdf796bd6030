use super::identity::ResolvedIdentity;
use crate::config::AuthConfig;
use crate::routing::RequestContext;
use std::fmt::Debug;
use std::sync::Arc;

/// Decides whether a resolved identity may use the endpoint it reached
pub trait Authorizer: Send + Sync + Debug {
    fn authorize(&self, identity: &ResolvedIdentity, request: &RequestContext<'_>) -> bool;
}

/// Every authenticated caller is allowed
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _identity: &ResolvedIdentity, _request: &RequestContext<'_>) -> bool {
        true
    }
}

/// Only the listed accounts are allowed. An entry matches the full
/// `DOMAIN\user` identifier or the bare username, ignoring case.
#[derive(Debug, Clone)]
pub struct AllowList {
    accounts: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accounts: accounts.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorizer for AllowList {
    fn authorize(&self, identity: &ResolvedIdentity, request: &RequestContext<'_>) -> bool {
        let allowed = self.accounts.iter().any(|entry| {
            entry.eq_ignore_ascii_case(identity.account())
                || entry.eq_ignore_ascii_case(identity.username())
        });
        if !allowed {
            tracing::info!(
                account = identity.account(),
                path = request.path(),
                "account not in allow list"
            );
        }
        allowed
    }
}

/// `AllowList` when `allowed_accounts` is set, `AllowAll` otherwise
pub fn authorizer_from_config(config: &AuthConfig) -> Arc<dyn Authorizer> {
    if config.allowed_accounts.is_empty() {
        Arc::new(AllowAll)
    } else {
        Arc::new(AllowList::new(config.allowed_accounts.iter().cloned()))
    }
}
