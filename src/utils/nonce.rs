use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey,
                   Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppErr, AppResult};

const SUBJECT: &str = "anonchat";
pub const NONCE_TTL: i64 = 12 * 3600;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims { pub sub:String, pub exp:i64 }

pub fn sign(secret:&str) -> AppResult<String> {
    let c = Claims { sub: SUBJECT.into(), exp: Utc::now().timestamp()+NONCE_TTL };
    encode(&Header::default(), &c, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppErr::Internal(e.to_string()))
}

pub fn verify(token:&str, secret:&str) -> bool {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()),
                     &Validation::new(Algorithm::HS256))
        .is_ok_and(|d| d.claims.sub == SUBJECT)
}
