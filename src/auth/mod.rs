use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User id carried by sessions opened with the single-user token.
pub const SINGLE_USER: &str = "single-user";

/// The user a request acts on behalf of. Only [`Actor::single_user`] opens a
/// single-user session; a user id that happens to read `single-user` does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    single_user: bool,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            single_user: false,
        }
    }

    pub fn single_user() -> Self {
        Self {
            user_id: SINGLE_USER.to_string(),
            single_user: true,
        }
    }

    pub fn is_single_user(&self) -> bool {
        self.single_user
    }

    /// Id written into `createdBy`/`modifiedBy`. Single-user mode has no real
    /// identity, so nothing is attributed to the sentinel.
    pub fn stored_id(&self) -> &str {
        if self.is_single_user() {
            ""
        } else {
            &self.user_id
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id.into(),
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_user_is_not_attributed() {
        assert_eq!(Actor::single_user().stored_id(), "");
        assert_eq!(Actor::new("u1").stored_id(), "u1");
    }

    #[test]
    fn test_user_named_single_user_is_a_regular_user() {
        let actor = Actor::new(SINGLE_USER);
        assert!(!actor.is_single_user());
        assert_eq!(actor.stored_id(), SINGLE_USER);
        assert_ne!(actor, Actor::single_user());
    }

    #[test]
    fn test_jwt_round_trip() {
        let token = generate_jwt(&Claims::new("u42", 1), "secret").unwrap();
        let claims = validate_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "u42");
        assert!(validate_jwt(&token, "other").is_err());
        assert!(matches!(generate_jwt(&Claims::new("u", 1), ""), Err(JwtError::InvalidSecret)));
    }
}
