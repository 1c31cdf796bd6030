//! Server-side credentials: the account directory every handshake is
//! validated against.

use super::message::encode_string;
use crate::config::{AccountConfig, AuthConfig};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;
use std::fmt;

pub(crate) type HmacMd5 = Hmac<Md5>;

/// Fatal problems found while acquiring credentials at startup
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("account entry with an empty username")]
    EmptyUsername,
    #[error("account {0} needs exactly one of `password` or `nt_hash`")]
    Secret(String),
    #[error("account {account} has an invalid nt_hash: {source}")]
    InvalidHash {
        account: String,
        source: hex::FromHexError,
    },
    #[error("account {0} is configured more than once")]
    Duplicate(String),
}

/// A principal the server can authenticate
#[derive(Clone)]
pub struct Account {
    pub username: String,
    /// Empty matches whatever domain the client names
    pub domain: String,
    pub display_name: Option<String>,
    nt_hash: [u8; 16],
}

impl Account {
    fn from_config(cfg: &AccountConfig) -> Result<Self, CredentialsError> {
        if cfg.username.is_empty() {
            return Err(CredentialsError::EmptyUsername);
        }
        let name = qualified_name(&cfg.domain, &cfg.username);
        let nt_hash = match (&cfg.password, &cfg.nt_hash) {
            (Some(password), None) => nt_hash(password),
            (None, Some(hash)) => {
                let mut out = [0u8; 16];
                hex::decode_to_slice(hash.trim(), &mut out).map_err(|source| {
                    CredentialsError::InvalidHash {
                        account: name.clone(),
                        source,
                    }
                })?;
                out
            }
            _ => return Err(CredentialsError::Secret(name)),
        };
        Ok(Self {
            username: cfg.username.clone(),
            domain: cfg.domain.clone(),
            display_name: cfg.display_name.clone().filter(|n| !n.is_empty()),
            nt_hash,
        })
    }

    /// `DOMAIN\user`, or just `user` for domain-less accounts
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.domain, &self.username)
    }

    pub(crate) const fn nt_hash(&self) -> &[u8; 16] {
        &self.nt_hash
    }

    fn matches(&self, user: &str, domain: &str) -> bool {
        self.username.eq_ignore_ascii_case(user)
            && (self.domain.is_empty() || domain.is_empty() || self.domain.eq_ignore_ascii_case(domain))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// Process-wide credentials, acquired once before serving
#[derive(Debug)]
pub struct ServerCredentials {
    target_name: String,
    computer_name: String,
    accounts: Vec<Account>,
}

impl ServerCredentials {
    pub fn acquire(config: &AuthConfig) -> Result<Self, CredentialsError> {
        let mut accounts: Vec<Account> = Vec::with_capacity(config.accounts.len());
        for entry in &config.accounts {
            let account = Account::from_config(entry)?;
            if accounts.iter().any(|a| {
                a.username.eq_ignore_ascii_case(&account.username)
                    && a.domain.eq_ignore_ascii_case(&account.domain)
            }) {
                return Err(CredentialsError::Duplicate(account.qualified_name()));
            }
            accounts.push(account);
        }
        if accounts.is_empty() {
            tracing::warn!("No NTLM accounts configured; every handshake will be rejected");
        }
        Ok(Self {
            target_name: config.target_name.clone(),
            computer_name: config.computer_name.clone(),
            accounts,
        })
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn computer_name(&self) -> &str {
        &self.computer_name
    }

    /// Account for the user and domain named in an AUTHENTICATE message.
    ///
    /// An account whose domain equals the client's wins over one that only
    /// matches through an empty domain, whatever the declaration order.
    pub fn find(&self, user: &str, domain: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.username.eq_ignore_ascii_case(user) && a.domain.eq_ignore_ascii_case(domain))
            .or_else(|| self.accounts.iter().find(|a| a.matches(user, domain)))
    }
}

pub(crate) fn qualified_name(domain: &str, user: &str) -> String {
    if domain.is_empty() {
        user.to_string()
    } else {
        format!("{domain}\\{user}")
    }
}

/// NT one-way function: MD4 over the UTF-16LE password
pub fn nt_hash(password: &str) -> [u8; 16] {
    Md4::digest(encode_string(password, true)).into()
}

/// NTOWFv2 keyed on the NT hash, the upper-cased user and the domain as
/// sent by the client
pub fn ntowf_v2(nt_hash: &[u8; 16], user: &str, domain: &str) -> Result<[u8; 16], InvalidLength> {
    let identity = encode_string(&format!("{}{domain}", user.to_uppercase()), true);
    let mut mac = <HmacMd5 as Mac>::new_from_slice(nt_hash)?;
    mac.update(&identity);
    Ok(mac.finalize().into_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(username: &str, domain: &str) -> AccountConfig {
        AccountConfig {
            username: username.to_string(),
            domain: domain.to_string(),
            password: Some("Password".to_string()),
            ..AccountConfig::default()
        }
    }

    // Values from MS-NLMP 4.2.4.1 (User "User", domain "Domain", password "Password")
    #[test]
    fn test_known_answer_hashes() {
        assert_eq!(hex::encode(nt_hash("Password")), "a4f49c406510bdcab6824ee7c30fd852");
        assert_eq!(
            hex::encode(ntowf_v2(&nt_hash("Password"), "User", "Domain").unwrap()),
            "0c868a403bfd7a93a3001ef22ef02e3f"
        );
    }

    #[test]
    fn test_acquire_accepts_password_or_hash() {
        let mut hashed = account("bob", "");
        hashed.password = None;
        hashed.nt_hash = Some("A4F49C406510BDCAB6824EE7C30FD852".to_string());
        let config = AuthConfig {
            accounts: vec![account("alice", "CORP"), hashed],
            ..AuthConfig::default()
        };
        let creds = ServerCredentials::acquire(&config).unwrap();

        let alice = creds.find("ALICE", "corp").unwrap();
        assert_eq!(alice.qualified_name(), "CORP\\alice");
        assert!(creds.find("alice", "OTHER").is_none());

        let bob = creds.find("bob", "ANYTHING").unwrap();
        assert_eq!(bob.qualified_name(), "bob");
        assert_eq!(bob.nt_hash(), &nt_hash("Password"));
    }

    #[test]
    fn test_exact_domain_beats_domainless_account() {
        for accounts in [
            vec![account("alice", ""), account("alice", "CORP")],
            vec![account("alice", "CORP"), account("alice", "")],
        ] {
            let creds = ServerCredentials::acquire(&AuthConfig {
                accounts,
                ..AuthConfig::default()
            })
            .unwrap();
            assert_eq!(creds.find("alice", "corp").unwrap().qualified_name(), "CORP\\alice");
            assert_eq!(creds.find("alice", "").unwrap().qualified_name(), "alice");
            assert_eq!(creds.find("alice", "OTHER").unwrap().qualified_name(), "alice");
        }
    }

    #[test]
    fn test_acquire_rejects_bad_entries() {
        let mut both = account("carol", "CORP");
        both.nt_hash = Some("00".repeat(16));
        let config = AuthConfig {
            accounts: vec![both],
            ..AuthConfig::default()
        };
        assert!(matches!(
            ServerCredentials::acquire(&config),
            Err(CredentialsError::Secret(name)) if name == "CORP\\carol"
        ));

        let mut short = account("dave", "");
        short.password = None;
        short.nt_hash = Some("abcd".to_string());
        let config = AuthConfig {
            accounts: vec![short],
            ..AuthConfig::default()
        };
        assert!(matches!(
            ServerCredentials::acquire(&config),
            Err(CredentialsError::InvalidHash { .. })
        ));

        let config = AuthConfig {
            accounts: vec![account("erin", "CORP"), account("ERIN", "corp")],
            ..AuthConfig::default()
        };
        assert!(matches!(
            ServerCredentials::acquire(&config),
            Err(CredentialsError::Duplicate(_))
        ));

        let config = AuthConfig {
            accounts: vec![account("", "CORP")],
            ..AuthConfig::default()
        };
        assert!(matches!(
            ServerCredentials::acquire(&config),
            Err(CredentialsError::EmptyUsername)
        ));
    }
}
