use super::credentials::{ntowf_v2, qualified_name, HmacMd5, ServerCredentials};
use super::message::{
    AuthenticateMessage, AvId, ChallengeMessage, NegotiateMessage, TargetInfo, NEGOTIATE_128,
    NEGOTIATE_56, NEGOTIATE_ALWAYS_SIGN, NEGOTIATE_EXTENDED_SESSIONSECURITY, NEGOTIATE_KEY_EXCH,
    NEGOTIATE_NTLM, NEGOTIATE_OEM, NEGOTIATE_SEAL, NEGOTIATE_SIGN, NEGOTIATE_TARGET_INFO,
    NEGOTIATE_UNICODE, NEGOTIATE_VERSION, REQUEST_TARGET, TARGET_TYPE_DOMAIN,
};
use super::NtlmError;
use crate::auth::identity::{Impersonation, ResolvedIdentity};
use hmac::Mac;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;

/// Seconds between 1601-01-01 and the Unix epoch
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;

/// NTProofStr followed by at least the fixed part of the client blob
const MIN_NTLMV2_RESPONSE: usize = 16 + 28;
const NTLMV1_RESPONSE: usize = 24;

/// Client bits echoed back when offered
const ECHOED_FLAGS: u32 = NEGOTIATE_EXTENDED_SESSIONSECURITY
    | NEGOTIATE_128
    | NEGOTIATE_56
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_KEY_EXCH
    | NEGOTIATE_SIGN
    | NEGOTIATE_SEAL;

#[derive(Debug)]
enum State {
    Challenged,
    Authenticated(ResolvedIdentity),
    Failed,
}

/// Server half of one NTLM handshake.
///
/// Created from a NEGOTIATE message, which also yields the CHALLENGE to
/// send back. A single AUTHENTICATE message completes or fails it.
#[derive(Debug)]
pub struct ServerContext {
    credentials: Arc<ServerCredentials>,
    server_challenge: [u8; 8],
    state: State,
}

impl ServerContext {
    /// Accept a NEGOTIATE message and produce the CHALLENGE message bytes
    pub fn new(
        credentials: &Arc<ServerCredentials>,
        negotiate: &[u8],
    ) -> Result<(Self, Vec<u8>), NtlmError> {
        let negotiate = NegotiateMessage::parse(negotiate)?;
        if negotiate.flags & NEGOTIATE_NTLM == 0 {
            return Err(NtlmError::Unsupported("client did not offer NTLM"));
        }

        let mut server_challenge = [0u8; 8];
        OsRng.try_fill_bytes(&mut server_challenge)?;

        let challenge = ChallengeMessage {
            flags: response_flags(negotiate.flags),
            server_challenge,
            target_name: credentials.target_name().to_string(),
            target_info: target_info(credentials)?,
        }
        .to_bytes()?;

        let context = Self {
            credentials: Arc::clone(credentials),
            server_challenge,
            state: State::Challenged,
        };
        Ok((context, challenge))
    }

    /// Feed the client's AUTHENTICATE message. The context is single-use:
    /// whatever the outcome, a second call fails.
    pub fn update(&mut self, authenticate: &[u8]) -> Result<(), NtlmError> {
        if !matches!(self.state, State::Challenged) {
            return Err(NtlmError::InvalidState("handshake already finished"));
        }
        match self.verify(authenticate) {
            Ok(identity) => {
                self.state = State::Authenticated(identity);
                Ok(())
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    /// Enter the impersonation bracket for the authenticated client
    pub fn impersonate(&self) -> Result<Impersonation, NtlmError> {
        match &self.state {
            State::Authenticated(identity) => Ok(Impersonation::begin(identity.clone())),
            State::Challenged | State::Failed => {
                Err(NtlmError::InvalidState("client is not authenticated"))
            }
        }
    }

    fn verify(&self, authenticate: &[u8]) -> Result<ResolvedIdentity, NtlmError> {
        let msg = AuthenticateMessage::parse(authenticate)?;
        if msg.user.is_empty() {
            return Err(NtlmError::Anonymous);
        }
        if msg.nt_response.len() == NTLMV1_RESPONSE {
            return Err(NtlmError::Unsupported("NTLMv1 responses are not accepted"));
        }
        if msg.nt_response.len() < MIN_NTLMV2_RESPONSE {
            return Err(NtlmError::Malformed("NTLMv2 response too short"));
        }
        let (proof, blob) = msg.nt_response.split_at(16);
        if blob[..2] != [1, 1] {
            return Err(NtlmError::Malformed("unknown NTLMv2 blob version"));
        }

        let claimed = qualified_name(&msg.domain, &msg.user);
        let account = self
            .credentials
            .find(&msg.user, &msg.domain)
            .ok_or_else(|| NtlmError::UnknownAccount(claimed.clone()))?;

        let key = ntowf_v2(account.nt_hash(), &msg.user, &msg.domain)?;
        let mut mac = <HmacMd5 as Mac>::new_from_slice(&key)?;
        mac.update(&self.server_challenge);
        mac.update(blob);
        mac.verify_slice(proof)
            .map_err(|_| NtlmError::InvalidCredentials(claimed))?;

        tracing::debug!(
            account = %account.qualified_name(),
            workstation = %msg.workstation,
            flags = format_args!("{:#010x}", msg.flags),
            "NTLM handshake completed"
        );
        Ok(ResolvedIdentity::new(
            account.qualified_name(),
            account.display_name.clone(),
        ))
    }
}

fn response_flags(client: u32) -> u32 {
    let encoding = if client & NEGOTIATE_UNICODE != 0 {
        NEGOTIATE_UNICODE
    } else {
        NEGOTIATE_OEM
    };
    NEGOTIATE_NTLM
        | REQUEST_TARGET
        | TARGET_TYPE_DOMAIN
        | NEGOTIATE_TARGET_INFO
        | NEGOTIATE_VERSION
        | encoding
        | (client & ECHOED_FLAGS)
}

fn target_info(credentials: &ServerCredentials) -> Result<Vec<u8>, NtlmError> {
    Ok(TargetInfo::new()
        .push_str(AvId::NbDomainName, credentials.target_name())?
        .push_str(AvId::NbComputerName, credentials.computer_name())?
        .push_str(AvId::DnsDomainName, credentials.target_name())?
        .push_str(AvId::DnsComputerName, credentials.computer_name())?
        .push(AvId::Timestamp, &filetime_now().to_le_bytes())?
        .finish())
}

/// 100ns intervals since 1601-01-01 UTC
fn filetime_now() -> u64 {
    let now = chrono::Utc::now();
    let secs = u64::try_from(now.timestamp() + FILETIME_EPOCH_OFFSET).unwrap_or_default();
    secs * 10_000_000 + u64::from(now.timestamp_subsec_nanos() / 100)
}
