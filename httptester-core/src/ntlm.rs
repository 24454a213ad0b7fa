//! NTLMv2 message construction for the `Authorization: NTLM` handshake.
//!
//! Only the three messages needed by an HTTP client are implemented:
//! NEGOTIATE (type 1), parsing of CHALLENGE (type 2) and AUTHENTICATE
//! (type 3). Session security (signing/sealing) is not negotiated.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;

use crate::{Error, Result};

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const NEGOTIATE_OEM: u32 = 0x0000_0002;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;
const NEGOTIATE_128: u32 = 0x2000_0000;
const NEGOTIATE_56: u32 = 0x8000_0000;

const NEGOTIATE_FLAGS: u32 = NEGOTIATE_UNICODE
    | NEGOTIATE_OEM
    | REQUEST_TARGET
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSIONSECURITY
    | NEGOTIATE_128
    | NEGOTIATE_56;

/// AV pair id carrying the server's FILETIME.
const MSV_AV_TIMESTAMP: u16 = 7;
const MSV_AV_EOL: u16 = 0;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;

type HmacMd5 = Hmac<Md5>;

/// Credentials for NTLM authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: String,
    domain: String,
    workstation: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("domain", &self.domain)
            .field("workstation", &self.workstation)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// `user` may be given as `DOMAIN\user`.
    pub fn new(user: impl AsRef<str>, password: impl Into<String>) -> Credentials {
        let (domain, user) = match user.as_ref().split_once('\\') {
            Some((domain, user)) => (domain.to_string(), user.to_string()),
            None => (String::new(), user.as_ref().to_string()),
        };
        Credentials {
            user,
            password: password.into(),
            domain,
            workstation: String::new(),
        }
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Credentials {
        self.domain = domain.into();
        self
    }

    pub fn workstation(mut self, workstation: impl Into<String>) -> Credentials {
        self.workstation = workstation.into();
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn domain_name(&self) -> &str {
        &self.domain
    }
}

/// Server challenge extracted from a type 2 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub flags: u32,
    pub server_challenge: [u8; 8],
    pub target_info: Vec<u8>,
}

impl Challenge {
    pub fn parse(msg: &[u8]) -> Result<Challenge> {
        if msg.len() < 32 || &msg[..8] != SIGNATURE {
            return Err(Error::Ntlm("not an NTLMSSP message".into()));
        }
        if read_u32(msg, 8) != 2 {
            return Err(Error::Ntlm("expected a CHALLENGE message".into()));
        }

        let flags = read_u32(msg, 20);
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&msg[24..32]);

        let target_info = if msg.len() >= 48 && flags & NEGOTIATE_TARGET_INFO != 0 {
            let len = read_u16(msg, 40) as usize;
            let offset = read_u32(msg, 44) as usize;
            msg.get(offset..offset + len)
                .ok_or_else(|| Error::Ntlm("target info out of bounds".into()))?
                .to_vec()
        } else {
            Vec::new()
        };

        Ok(Challenge {
            flags,
            server_challenge,
            target_info,
        })
    }

    /// FILETIME advertised by the server, if any.
    fn timestamp(&self) -> Option<[u8; 8]> {
        let info = &self.target_info;
        let mut pos = 0;
        while pos + 4 <= info.len() {
            let id = read_u16(info, pos);
            let len = read_u16(info, pos + 2) as usize;
            let value = info.get(pos + 4..pos + 4 + len)?;
            match id {
                MSV_AV_EOL => return None,
                MSV_AV_TIMESTAMP if len == 8 => {
                    let mut ts = [0u8; 8];
                    ts.copy_from_slice(value);
                    return Some(ts);
                }
                _ => pos += 4 + len,
            }
        }
        None
    }
}

/// Base64 type 1 message as sent in the first `Authorization: NTLM` header.
pub fn negotiate() -> String {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    // empty domain and workstation security buffers
    msg.extend_from_slice(&[0u8; 16]);
    STANDARD.encode(msg)
}

/// Extract the challenge from a `WWW-Authenticate` header value.
pub fn challenge_from_header(value: &str) -> Option<Result<Challenge>> {
    let token = value.trim().strip_prefix("NTLM ")?.trim();
    Some(
        STANDARD
            .decode(token)
            .map_err(|e| Error::Ntlm(e.to_string()))
            .and_then(|bytes| Challenge::parse(&bytes)),
    )
}

/// Base64 type 3 message answering `challenge`.
pub fn authenticate(creds: &Credentials, challenge: &Challenge) -> String {
    let client_challenge: [u8; 8] = rand::random();
    let (timestamp, server_sent_time) = match challenge.timestamp() {
        Some(ts) => (ts, true),
        None => (filetime_now(), false),
    };
    let msg = authenticate_message(creds, challenge, client_challenge, timestamp, server_sent_time);
    STANDARD.encode(msg)
}

fn authenticate_message(
    creds: &Credentials,
    challenge: &Challenge,
    client_challenge: [u8; 8],
    timestamp: [u8; 8],
    server_sent_time: bool,
) -> Vec<u8> {
    let key = ntowf_v2(&creds.user, &creds.password, &creds.domain);
    let (nt_response, lm_response) = responses(
        &key,
        &challenge.server_challenge,
        &client_challenge,
        &timestamp,
        &challenge.target_info,
    );
    // The LMv2 response must be zeroed when the server supplied a timestamp.
    let lm_response = if server_sent_time {
        vec![0u8; 24]
    } else {
        lm_response
    };

    let unicode = challenge.flags & NEGOTIATE_UNICODE != 0;
    let encode = |s: &str| {
        if unicode {
            utf16le(s)
        } else {
            s.as_bytes().to_vec()
        }
    };
    let domain = encode(&creds.domain);
    let user = encode(&creds.user);
    let workstation = encode(&creds.workstation);

    let flags = (challenge.flags & NEGOTIATE_FLAGS) | NEGOTIATE_NTLM;

    const HEADER_LEN: usize = 64;
    let payloads: [&[u8]; 6] = [
        &lm_response,
        &nt_response,
        &domain,
        &user,
        &workstation,
        &[],
    ];

    let mut msg = Vec::with_capacity(HEADER_LEN + payloads.iter().map(|p| p.len()).sum::<usize>());
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&3u32.to_le_bytes());

    let mut offset = HEADER_LEN;
    for payload in payloads {
        msg.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        msg.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        msg.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += payload.len();
    }
    msg.extend_from_slice(&flags.to_le_bytes());
    debug_assert_eq!(msg.len(), HEADER_LEN);

    for payload in payloads {
        msg.extend_from_slice(payload);
    }
    msg
}

/// NTOWFv2: HMAC-MD5 keyed by the NT hash over `UPPER(user) || domain`.
fn ntowf_v2(user: &str, password: &str, domain: &str) -> [u8; 16] {
    let nt_hash = ntowf_v1(password);
    let identity = utf16le(&format!("{}{}", user.to_uppercase(), domain));
    hmac_md5(&nt_hash, &[&identity])
}

fn ntowf_v1(password: &str) -> [u8; 16] {
    Md4::digest(utf16le(password)).into()
}

/// Returns `(NtChallengeResponse, LmChallengeResponse)`.
fn responses(
    key: &[u8; 16],
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
    timestamp: &[u8; 8],
    target_info: &[u8],
) -> (Vec<u8>, Vec<u8>) {
    let mut blob = Vec::with_capacity(28 + target_info.len() + 4);
    blob.extend_from_slice(&[1, 1, 0, 0, 0, 0, 0, 0]);
    blob.extend_from_slice(timestamp);
    blob.extend_from_slice(client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0u8; 4]);

    let proof = hmac_md5(key, &[server_challenge, &blob]);
    let mut nt = proof.to_vec();
    nt.extend_from_slice(&blob);

    let mut lm = hmac_md5(key, &[server_challenge, client_challenge]).to_vec();
    lm.extend_from_slice(client_challenge);

    (nt, lm)
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> [u8; 16] {
    let mut mac = <HmacMd5 as Mac>::new_from_slice(key).expect("hmac accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

fn filetime_now() -> [u8; 8] {
    let now = chrono::Utc::now();
    let ticks = (now.timestamp() + FILETIME_EPOCH_OFFSET) as u64 * 10_000_000
        + u64::from(now.timestamp_subsec_nanos() / 100);
    ticks.to_le_bytes()
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn challenge_message(target_info: &[u8]) -> Vec<u8> {
        let mut msg = Vec::new();
        msg.extend_from_slice(SIGNATURE);
        msg.extend_from_slice(&2u32.to_le_bytes());
        // target name: empty, offset 48
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&48u32.to_le_bytes());
        msg.extend_from_slice(&(NEGOTIATE_FLAGS | NEGOTIATE_TARGET_INFO).to_le_bytes());
        msg.extend_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        msg.extend_from_slice(&[0u8; 8]);
        msg.extend_from_slice(&(target_info.len() as u16).to_le_bytes());
        msg.extend_from_slice(&(target_info.len() as u16).to_le_bytes());
        msg.extend_from_slice(&48u32.to_le_bytes());
        msg.extend_from_slice(target_info);
        msg
    }

    #[test]
    fn nt_hash() {
        assert_eq!(hex(&ntowf_v1("Password")), "a4f49c406510bdcab6824ee7c30fd852");
    }

    #[test]
    fn response_key_v2() {
        assert_eq!(
            hex(&ntowf_v2("User", "Password", "Domain")),
            "0c868a403bfd7a93a3001ef22ef02e3f"
        );
    }

    #[test]
    fn lm_v2_response() {
        let key = ntowf_v2("User", "Password", "Domain");
        let (_, lm) = responses(
            &key,
            &[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef],
            &[0xaa; 8],
            &[0u8; 8],
            &[],
        );
        assert_eq!(
            hex(&lm),
            "86c35097ac9cec102554764a57cccc19aaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn negotiate_message_layout() {
        let msg = STANDARD.decode(negotiate()).unwrap();
        assert_eq!(msg.len(), 32);
        assert_eq!(&msg[..8], SIGNATURE);
        assert_eq!(read_u32(&msg, 8), 1);
        assert_eq!(read_u32(&msg, 12), NEGOTIATE_FLAGS);
    }

    #[test]
    fn parse_challenge_with_timestamp() -> eyre::Result<()> {
        let mut info = Vec::new();
        info.extend_from_slice(&MSV_AV_TIMESTAMP.to_le_bytes());
        info.extend_from_slice(&8u16.to_le_bytes());
        info.extend_from_slice(&[9u8; 8]);
        info.extend_from_slice(&[0u8; 4]);

        let header = format!("NTLM {}", STANDARD.encode(challenge_message(&info)));
        let challenge = challenge_from_header(&header).expect("ntlm header")?;
        assert_eq!(
            challenge.server_challenge,
            [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]
        );
        assert_eq!(challenge.target_info, info);
        assert_eq!(challenge.timestamp(), Some([9u8; 8]));
        Ok(())
    }

    #[test]
    fn non_ntlm_header_is_ignored() {
        assert!(challenge_from_header("Basic realm=\"api\"").is_none());
    }

    #[test]
    fn malformed_challenge() {
        let header = format!("NTLM {}", STANDARD.encode(b"garbage"));
        assert!(matches!(
            challenge_from_header(&header),
            Some(Err(Error::Ntlm(_)))
        ));
    }

    #[test]
    fn authenticate_message_layout() -> eyre::Result<()> {
        let challenge = Challenge::parse(&challenge_message(&[0u8; 4]))?;
        let creds = Credentials::new("Domain\\User", "Password").workstation("WS");
        let msg = authenticate_message(&creds, &challenge, [0xaa; 8], [0u8; 8], false);

        assert_eq!(&msg[..8], SIGNATURE);
        assert_eq!(read_u32(&msg, 8), 3);

        // LM response buffer
        assert_eq!(read_u16(&msg, 12), 24);
        assert_eq!(read_u32(&msg, 16), 64);
        // NT response: 16-byte proof + 28-byte blob header + target info + 4 zero bytes
        let nt_len = read_u16(&msg, 20) as usize;
        assert_eq!(nt_len, 16 + 28 + 4 + 4);

        // user name is the utf-16 encoded "User"
        let user_len = read_u16(&msg, 36) as usize;
        let user_offset = read_u32(&msg, 40) as usize;
        assert_eq!(&msg[user_offset..user_offset + user_len], utf16le("User").as_slice());

        let domain_offset = read_u32(&msg, 32) as usize;
        assert_eq!(&msg[domain_offset..domain_offset + 12], utf16le("Domain").as_slice());
        Ok(())
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("CORP\\alice", "hunter2");
        assert_eq!(creds.user(), "alice");
        assert_eq!(creds.domain_name(), "CORP");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
