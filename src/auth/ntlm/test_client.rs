//! Minimal NTLMv2 client used to drive the server side in tests

use super::credentials::{nt_hash, ntowf_v2, HmacMd5};
use super::message::{
    encode_string, security_buffer, write_security_buffer, AUTHENTICATE, NEGOTIATE,
    NEGOTIATE_EXTENDED_SESSIONSECURITY, NEGOTIATE_NTLM, NEGOTIATE_UNICODE, REQUEST_TARGET,
    SIGNATURE,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::Mac;

const AUTHENTICATE_HEADER_LEN: usize = 64;

pub fn negotiate() -> Vec<u8> {
    let flags = NEGOTIATE_UNICODE
        | NEGOTIATE_NTLM
        | REQUEST_TARGET
        | NEGOTIATE_EXTENDED_SESSIONSECURITY;
    let mut msg = SIGNATURE.to_vec();
    msg.extend_from_slice(&NEGOTIATE.to_le_bytes());
    msg.extend_from_slice(&flags.to_le_bytes());
    // empty domain and workstation buffers
    msg.extend_from_slice(&[0; 16]);
    msg
}

/// AUTHENTICATE answering `challenge` with an NTLMv2 response
pub fn authenticate(challenge: &[u8], user: &str, domain: &str, password: &str) -> Vec<u8> {
    let server_challenge = &challenge[24..32];
    let target_info = security_buffer(challenge, 40).unwrap();

    let mut blob = vec![1, 1, 0, 0, 0, 0, 0, 0];
    blob.extend_from_slice(&[0x11; 8]); // timestamp
    blob.extend_from_slice(&[0xAA; 8]); // client challenge
    blob.extend_from_slice(&[0; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0; 4]);

    let key = ntowf_v2(&nt_hash(password), user, domain).unwrap();
    let mut mac = <HmacMd5 as Mac>::new_from_slice(&key).unwrap();
    mac.update(server_challenge);
    mac.update(&blob);
    let mut nt_response = mac.finalize().into_bytes().to_vec();
    nt_response.extend_from_slice(&blob);

    authenticate_with_response(&nt_response, user, domain)
}

/// AUTHENTICATE carrying an arbitrary NT response
pub fn authenticate_with_response(nt_response: &[u8], user: &str, domain: &str) -> Vec<u8> {
    let lm = [0u8; 24];
    let domain = encode_string(domain, true);
    let user = encode_string(user, true);
    let workstation = encode_string("TESTBOX", true);
    let fields: [&[u8]; 6] = [&lm, nt_response, &domain, &user, &workstation, &[]];

    let mut msg = SIGNATURE.to_vec();
    msg.extend_from_slice(&AUTHENTICATE.to_le_bytes());
    let mut payload = Vec::new();
    for field in fields {
        write_security_buffer(&mut msg, field.len(), AUTHENTICATE_HEADER_LEN + payload.len())
            .unwrap();
        payload.extend_from_slice(field);
    }
    msg.extend_from_slice(&(NEGOTIATE_UNICODE | NEGOTIATE_NTLM).to_le_bytes());
    msg.extend_from_slice(&payload);
    msg
}

/// `Authorization` header value for a raw message
pub fn header(msg: &[u8]) -> String {
    format!("NTLM {}", STANDARD.encode(msg))
}

/// Decode the challenge from a `WWW-Authenticate: NTLM <blob>` value
pub fn challenge_from_header(value: &str) -> Vec<u8> {
    let blob = value.strip_prefix("NTLM ").unwrap();
    STANDARD.decode(blob).unwrap()
}
