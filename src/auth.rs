//! Handshake v10 parsing, the handshake response, and the two supported
//! authentication plugins (`mysql_native_password`, `caching_sha2_password`).

use crate::binary::{Reader, write_bytes_lenenc, write_int_1, write_int_4, write_string_null};
use crate::constant::{CLIENT_CAPABILITIES, CapabilityFlags};
use crate::error::{Error, Result, ServerError};
use crate::opts::Character;

/// Server's initial handshake packet (Protocol::HandshakeV10).
#[derive(Debug, Clone)]
pub struct InitialHandshake {
    pub server_version: String,
    pub connection_id: u32,
    pub auth_plugin_data: Vec<u8>,
    pub capability_flags: CapabilityFlags,
    pub auth_plugin_name: String,
}

pub fn read_initial_handshake(payload: &[u8]) -> Result<InitialHandshake> {
    let mut r = Reader::new(payload);
    let protocol_version = r.read_int_1()?;

    if protocol_version == 0xFF {
        return Err(parse_err_packet(payload)?);
    }
    if protocol_version != 10 {
        return Err(Error::protocol(format!(
            "unsupported handshake protocol version {protocol_version}"
        )));
    }

    let server_version = String::from_utf8_lossy(r.read_string_null()?).into_owned();
    let connection_id = r.read_int_4()?;
    let auth_data_1 = r.read_bytes_fix(8)?.to_vec();
    let _filler = r.read_int_1()?;
    let cap_lower = r.read_int_2()?;
    let _charset = r.read_int_1()?;
    let _status_flags = r.read_int_2()?;
    let cap_upper = r.read_int_2()?;
    let cap_bits = ((cap_upper as u32) << 16) | (cap_lower as u32);
    let capability_flags = CapabilityFlags::from_bits_truncate(cap_bits);

    let auth_data_len = r.read_int_1()?;
    let _reserved = r.read_bytes_fix(10)?;

    let auth_data_2_len = (auth_data_len as usize).saturating_sub(9).max(12);
    let auth_data_2 = r.read_bytes_fix(auth_data_2_len)?;

    let mut auth_plugin_data = auth_data_1;
    auth_plugin_data.extend_from_slice(auth_data_2);
    // Trailing NUL terminating the second part of the challenge.
    if auth_plugin_data.last() == Some(&0) {
        auth_plugin_data.pop();
    }

    let auth_plugin_name = String::from_utf8_lossy(r.read_string_null()?).into_owned();

    Ok(InitialHandshake {
        server_version,
        connection_id,
        auth_plugin_data,
        capability_flags,
        auth_plugin_name,
    })
}

fn parse_err_packet(payload: &[u8]) -> Result<InitialHandshake> {
    let mut r = Reader::new(payload);
    let _header = r.read_int_1()?;
    let error_code = r.read_int_2()?;
    let _marker = r.read_bytes_fix(1)?;
    let sql_state = String::from_utf8_lossy(r.read_bytes_fix(5)?).into_owned();
    let message = String::from_utf8_lossy(r.read_bytes_eof()).into_owned();
    Err(Error::Server(ServerError {
        error_code,
        sql_state,
        message,
    }))
}

/// Build the `HandshakeResponse41` payload.
pub fn write_handshake_response(
    out: &mut Vec<u8>,
    user: &str,
    database: Option<&str>,
    auth_plugin_name: &str,
    auth_response: &[u8],
    character: Character,
) {
    let mut capabilities = CLIENT_CAPABILITIES;
    if database.is_some() {
        capabilities |= CapabilityFlags::CLIENT_CONNECT_WITH_DB;
    }

    write_int_4(out, capabilities.bits());
    write_int_4(out, 0x0100_0000); // max packet size: 16 MiB
    write_int_1(out, character.collation_id());
    out.extend_from_slice(&[0u8; 23]);
    write_string_null(out, user);

    if capabilities.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA) {
        write_bytes_lenenc(out, auth_response);
    } else {
        write_int_1(out, auth_response.len() as u8);
        out.extend_from_slice(auth_response);
    }

    if let Some(db) = database {
        write_string_null(out, db);
    }

    if capabilities.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
        write_string_null(out, auth_plugin_name);
    }
}

/// Server's auth switch request (`0xFE`, followed by a plugin name and a
/// fresh challenge).
#[derive(Debug, Clone)]
pub struct AuthSwitchRequest {
    pub plugin_name: String,
    pub plugin_data: Vec<u8>,
}

pub fn read_auth_switch_request(payload: &[u8]) -> Result<AuthSwitchRequest> {
    let mut r = Reader::new(payload);
    let header = r.read_int_1()?;
    if header != 0xFE {
        return Err(Error::protocol("expected auth switch request (0xFE)"));
    }
    let plugin_name = String::from_utf8_lossy(r.read_string_null()?).into_owned();
    let mut plugin_data = r.read_bytes_eof().to_vec();
    if plugin_data.last() == Some(&0) {
        plugin_data.pop();
    }
    Ok(AuthSwitchRequest {
        plugin_name,
        plugin_data,
    })
}

/// `mysql_native_password`: SHA1(password) XOR SHA1(challenge ‖ SHA1(SHA1(password))).
pub fn auth_mysql_native_password(password: &str, challenge: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};

    if password.is_empty() {
        return [0u8; 20];
    }

    let stage1 = Sha1::digest(password.as_bytes());
    let stage2 = Sha1::digest(stage1);

    let mut hasher = Sha1::new();
    hasher.update(challenge);
    hasher.update(stage2);
    let token = hasher.finalize();

    let mut result = [0u8; 20];
    for i in 0..20 {
        result[i] = stage1[i] ^ token[i];
    }
    result
}

/// `caching_sha2_password` initial response:
/// SHA256(password) XOR SHA256(SHA256(SHA256(password)) ‖ challenge).
pub fn auth_caching_sha2_password(password: &str, challenge: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    if password.is_empty() {
        return [0u8; 32];
    }

    let stage1 = Sha256::digest(password.as_bytes());
    let stage2 = Sha256::digest(stage1);

    let mut hasher = Sha256::new();
    hasher.update(stage2);
    hasher.update(challenge);
    let scramble = hasher.finalize();

    let mut result = [0u8; 32];
    for i in 0..32 {
        result[i] = stage1[i] ^ scramble[i];
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachingSha2FastAuthResult {
    Success,
    FullAuthRequired,
}

pub fn read_caching_sha2_fast_auth_result(payload: &[u8]) -> Result<CachingSha2FastAuthResult> {
    let mut r = Reader::new(payload);
    let _status = r.read_int_1()?; // 0x01: more-data marker
    match r.read_int_1()? {
        0x03 => Ok(CachingSha2FastAuthResult::Success),
        0x04 => Ok(CachingSha2FastAuthResult::FullAuthRequired),
        other => Err(Error::protocol(format!(
            "unexpected caching_sha2_password fast-auth byte {other:#x}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_yields_zeroed_scramble() {
        assert_eq!(auth_mysql_native_password("", b"01234567890123456789"), [0u8; 20]);
        assert_eq!(auth_caching_sha2_password("", b"01234567890123456789"), [0u8; 32]);
    }

    #[test]
    fn native_password_is_deterministic_and_nonzero() {
        let challenge = b"01234567890123456789";
        let a = auth_mysql_native_password("hunter2", challenge);
        let b = auth_mysql_native_password("hunter2", challenge);
        assert_eq!(a, b);
        assert_ne!(a, [0u8; 20]);
    }

    #[test]
    fn fast_auth_result_bytes() {
        assert_eq!(
            read_caching_sha2_fast_auth_result(&[0x01, 0x03]).unwrap(),
            CachingSha2FastAuthResult::Success
        );
        assert_eq!(
            read_caching_sha2_fast_auth_result(&[0x01, 0x04]).unwrap(),
            CachingSha2FastAuthResult::FullAuthRequired
        );
    }
}
