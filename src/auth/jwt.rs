//! HS256 access tokens.
//!
//! A token on its own is not enough to authenticate: the extractor also
//! requires a live session row holding the same token string. The `jti`
//! claim keeps tokens issued within the same second distinct, which the
//! unique session-token constraint relies on.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DbId, Role};

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: DbId,
    /// Role at issue time. Informational; authorization reads the user row.
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Sign a token for `user_id` valid for `expire_minutes`.
pub fn issue(
    user_id: DbId,
    role: Role,
    secret: &str,
    expire_minutes: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    // ---
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role,
        exp: now + expire_minutes * 60,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify signature and expiry and return the claims.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    // ---
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const SECRET: &str = "unit-test-secret-with-enough-entropy";

    #[test]
    fn test_issue_and_decode() {
        // ---
        let token = issue(42, Role::Operator, SECRET, 30).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Operator);
        assert_eq!(claims.exp - claims.iat, 30 * 60);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_tokens_are_unique() {
        // ---
        let a = issue(1, Role::Viewer, SECRET, 30).unwrap();
        let b = issue(1, Role::Viewer, SECRET, 30).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        // ---
        let token = issue(1, Role::Admin, SECRET, 30).unwrap();
        assert!(decode_token(&token, "some-other-secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // ---
        // Well past the default 60 second leeway
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: 1,
            role: Role::Viewer,
            exp: now - 600,
            iat: now - 1200,
            jti: "expired".to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(decode_token(&token, SECRET).is_err());
    }
}
