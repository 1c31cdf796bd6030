//! Resolved caller identity and the impersonation bracket.
//!
//! The operating identity is thread-local. [`Impersonation`] swaps the
//! authenticated principal in and restores whatever was there before when it
//! is dropped, so every exit path reverts. The guard is `!Send` and must not
//! be held across an `.await`.

use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static OPERATING: RefCell<Option<ResolvedIdentity>> = const { RefCell::new(None) };
}

/// Identity produced by a completed handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    account: String,
    display_name: Option<String>,
}

impl ResolvedIdentity {
    pub fn new(account: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            account: account.into(),
            display_name: display_name.filter(|n| !n.is_empty()),
        }
    }

    /// `DOMAIN\user`, or `user` when the domain is empty
    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Bare username with any `DOMAIN\` prefix removed
    pub fn username(&self) -> &str {
        self.account
            .rsplit_once('\\')
            .map_or(self.account.as_str(), |(_, user)| user)
    }

    pub fn greeting_name(&self) -> &str {
        self.display_name().unwrap_or(&self.account)
    }
}

/// Scoped assumption of a client's identity on the current thread
#[derive(Debug)]
#[must_use = "impersonation ends as soon as the guard is dropped"]
pub struct Impersonation {
    previous: Option<ResolvedIdentity>,
    _thread_bound: PhantomData<*const ()>,
}

impl Impersonation {
    pub(crate) fn begin(identity: ResolvedIdentity) -> Self {
        let previous = OPERATING.with(|cell| cell.replace(Some(identity)));
        Self {
            previous,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for Impersonation {
    fn drop(&mut self) {
        let previous = self.previous.take();
        OPERATING.with(|cell| *cell.borrow_mut() = previous);
    }
}

/// Identity the current thread operates as: the impersonated client inside
/// a bracket, the server process account otherwise
pub fn current_user() -> ResolvedIdentity {
    OPERATING
        .with(|cell| cell.borrow().clone())
        .unwrap_or_else(process_identity)
}

fn process_identity() -> ResolvedIdentity {
    let account = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "server".to_string());
    ResolvedIdentity::new(account, None)
}
