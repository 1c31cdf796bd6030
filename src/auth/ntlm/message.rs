//! NTLM wire messages (MS-NLMP 2.2.1)
//!
//! All integers are little-endian. Variable-length fields are described by
//! an 8-byte security buffer: length (u16), allocated length (u16), offset
//! (u32) from the start of the message.

use super::NtlmError;

pub const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

pub const NEGOTIATE: u32 = 1;
pub const CHALLENGE: u32 = 2;
pub const AUTHENTICATE: u32 = 3;

pub const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
pub const NEGOTIATE_OEM: u32 = 0x0000_0002;
pub const REQUEST_TARGET: u32 = 0x0000_0004;
pub const NEGOTIATE_SIGN: u32 = 0x0000_0010;
pub const NEGOTIATE_SEAL: u32 = 0x0000_0020;
pub const NEGOTIATE_NTLM: u32 = 0x0000_0200;
pub const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
pub const TARGET_TYPE_DOMAIN: u32 = 0x0001_0000;
pub const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
pub const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;
pub const NEGOTIATE_VERSION: u32 = 0x0200_0000;
pub const NEGOTIATE_128: u32 = 0x2000_0000;
pub const NEGOTIATE_KEY_EXCH: u32 = 0x4000_0000;
pub const NEGOTIATE_56: u32 = 0x8000_0000;

/// Product version 6.1 build 7601, NTLM revision 15
const VERSION: [u8; 8] = [6, 1, 0xB1, 0x1D, 0, 0, 0, 15];

const CHALLENGE_HEADER_LEN: usize = 56;
const AUTHENTICATE_HEADER_LEN: usize = 64;
const NEGOTIATE_MIN_LEN: usize = 16;

/// Attribute-value pair ids used in the challenge target info
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum AvId {
    Eol = 0,
    NbComputerName = 1,
    NbDomainName = 2,
    DnsComputerName = 3,
    DnsDomainName = 4,
    Timestamp = 7,
}

/// Client's opening message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiateMessage {
    pub flags: u32,
}

impl NegotiateMessage {
    pub fn parse(msg: &[u8]) -> Result<Self, NtlmError> {
        check_header(msg, NEGOTIATE, NEGOTIATE_MIN_LEN)?;
        Ok(Self {
            flags: read_u32(msg, 12)?,
        })
    }
}

/// Server's challenge, sent back in `WWW-Authenticate`
#[derive(Debug, Clone)]
pub struct ChallengeMessage {
    pub flags: u32,
    pub server_challenge: [u8; 8],
    pub target_name: String,
    pub target_info: Vec<u8>,
}

impl ChallengeMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, NtlmError> {
        let target_name = encode_string(&self.target_name, self.flags & NEGOTIATE_UNICODE != 0);
        let name_offset = CHALLENGE_HEADER_LEN;
        let info_offset = name_offset + target_name.len();

        let mut out = Vec::with_capacity(info_offset + self.target_info.len());
        out.extend_from_slice(SIGNATURE);
        out.extend_from_slice(&CHALLENGE.to_le_bytes());
        write_security_buffer(&mut out, target_name.len(), name_offset)?;
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.server_challenge);
        out.extend_from_slice(&[0; 8]);
        write_security_buffer(&mut out, self.target_info.len(), info_offset)?;
        out.extend_from_slice(&VERSION);
        out.extend_from_slice(&target_name);
        out.extend_from_slice(&self.target_info);
        Ok(out)
    }
}

/// Builder for the AV_PAIR list carried in `TargetInfo`
#[derive(Debug, Default)]
pub struct TargetInfo {
    buf: Vec<u8>,
}

impl TargetInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, id: AvId, value: &[u8]) -> Result<Self, NtlmError> {
        let len = u16::try_from(value.len()).map_err(|_| NtlmError::Oversized("AV pair"))?;
        self.buf.extend_from_slice(&(id as u16).to_le_bytes());
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(value);
        Ok(self)
    }

    pub fn push_str(self, id: AvId, value: &str) -> Result<Self, NtlmError> {
        self.push(id, &encode_string(value, true))
    }

    /// Terminate the list with `MsvAvEOL`
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(&(AvId::Eol as u16).to_le_bytes());
        self.buf.extend_from_slice(&0u16.to_le_bytes());
        self.buf
    }
}

/// Client's answer to the challenge
#[derive(Debug, Clone)]
pub struct AuthenticateMessage {
    pub flags: u32,
    pub nt_response: Vec<u8>,
    pub domain: String,
    pub user: String,
    pub workstation: String,
}

impl AuthenticateMessage {
    pub fn parse(msg: &[u8]) -> Result<Self, NtlmError> {
        check_header(msg, AUTHENTICATE, AUTHENTICATE_HEADER_LEN)?;
        let flags = read_u32(msg, 60)?;
        let unicode = flags & NEGOTIATE_UNICODE != 0;
        Ok(Self {
            flags,
            nt_response: security_buffer(msg, 20)?.to_vec(),
            domain: decode_string(security_buffer(msg, 28)?, unicode)?,
            user: decode_string(security_buffer(msg, 36)?, unicode)?,
            workstation: decode_string(security_buffer(msg, 44)?, unicode)?,
        })
    }
}

/// Message type of anything carrying the NTLMSSP signature
pub fn message_type(msg: &[u8]) -> Option<u32> {
    if msg.get(..8)? != SIGNATURE {
        return None;
    }
    read_u32(msg, 8).ok()
}

fn check_header(msg: &[u8], expected: u32, min_len: usize) -> Result<(), NtlmError> {
    if msg.len() < min_len {
        return Err(NtlmError::Malformed("message too short"));
    }
    if &msg[..8] != SIGNATURE {
        return Err(NtlmError::Malformed("missing NTLMSSP signature"));
    }
    let found = read_u32(msg, 8)?;
    if found != expected {
        return Err(NtlmError::UnexpectedType { expected, found });
    }
    Ok(())
}

pub(crate) fn read_u16(msg: &[u8], at: usize) -> Result<u16, NtlmError> {
    msg.get(at..at + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or(NtlmError::Malformed("truncated field"))
}

pub(crate) fn read_u32(msg: &[u8], at: usize) -> Result<u32, NtlmError> {
    msg.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(NtlmError::Malformed("truncated field"))
}

/// Slice described by the security buffer at `at`
pub(crate) fn security_buffer(msg: &[u8], at: usize) -> Result<&[u8], NtlmError> {
    let len = usize::from(read_u16(msg, at)?);
    let offset = usize::try_from(read_u32(msg, at + 4)?)
        .map_err(|_| NtlmError::Malformed("security buffer out of bounds"))?;
    if len == 0 {
        return Ok(&[]);
    }
    offset
        .checked_add(len)
        .and_then(|end| msg.get(offset..end))
        .ok_or(NtlmError::Malformed("security buffer out of bounds"))
}

pub(crate) fn write_security_buffer(
    out: &mut Vec<u8>,
    len: usize,
    offset: usize,
) -> Result<(), NtlmError> {
    let len = u16::try_from(len).map_err(|_| NtlmError::Oversized("security buffer"))?;
    let offset = u32::try_from(offset).map_err(|_| NtlmError::Oversized("message"))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    Ok(())
}

/// UTF-16LE when `unicode`, otherwise single-byte OEM text
pub(crate) fn encode_string(s: &str, unicode: bool) -> Vec<u8> {
    if unicode {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    } else {
        s.chars()
            .map(|c| u8::try_from(c).unwrap_or(b'?'))
            .collect()
    }
}

pub(crate) fn decode_string(bytes: &[u8], unicode: bool) -> Result<String, NtlmError> {
    if !unicode {
        return Ok(bytes.iter().copied().map(char::from).collect());
    }
    if bytes.len() % 2 != 0 {
        return Err(NtlmError::Malformed("odd-length UTF-16 string"));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| NtlmError::Malformed("invalid UTF-16 string"))
}
