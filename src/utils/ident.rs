//! Room codes, derived client ids and hashed store keys.

use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

pub const CODE_LEN: usize = 20;
const CLIENT_ID_LEN: usize = 16;

/// 20 characters drawn uniformly from `[0-9a-zA-Z]`.
pub fn room_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LEN)
        .map(char::from)
        .collect()
}

pub fn is_room_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Per-browser pseudo token: not secret, only stable within the same second.
pub fn client_id(ip: &str, user_agent: &str, now: i64) -> String {
    let mut hex = sha256_hex(&format!("{ip}{user_agent}{now}"));
    hex.truncate(CLIENT_ID_LEN);
    hex
}

pub fn room_key(code: &str) -> String {
    format!("room_{code}")
}

pub fn rate_key(ip: &str, action: &str) -> String {
    format!("rate_{}", sha256_hex(&format!("{ip}_{action}")))
}

pub fn ip_key(ip: &str) -> String {
    format!("ip_{}", sha256_hex(ip))
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
