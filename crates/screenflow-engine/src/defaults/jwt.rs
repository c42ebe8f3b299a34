//! HMAC-signed reference token issuer.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::errors::JwtError;
use crate::traits::JwtIssuer;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// The referenced resource uid.
    sub: String,
    /// Per-resource-type audience; verifiers must pin it.
    aud: String,
    iss: String,
    iat: i64,
    exp: i64,
}

/// HS256 issuer over a shared secret. The services verifying resource
/// access hold the same secret and check `aud` + `exp`.
pub struct HmacJwtIssuer {
    key: EncodingKey,
    issuer: String,
}

impl HmacJwtIssuer {
    pub fn new(secret: &[u8], issuer: &str) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            issuer: issuer.to_string(),
        }
    }
}

impl JwtIssuer for HmacJwtIssuer {
    fn issue(&self, audience: &str, uid: &str, ttl: chrono::Duration) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: uid.to_string(),
            aud: audience.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.key).map_err(|e| JwtError::Issue {
            message: e.to_string(),
        })
    }
}
