use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),
    #[error("Token signing failed: {0}")]
    SigningFailed(String),
    #[error("Invalid token")]
    InvalidToken,
}

/// Hash a password with Argon2id and the crate's default cost parameters.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::HashingFailed(e.to_string()))
}

/// Verification reads the parameters embedded in `hash`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and validates HS256 bearer tokens. Any other algorithm is rejected.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String, AuthError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: &str, issued_at: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = TokenClaims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))
    }

    /// Returns the subject of a valid token.
    pub fn validate(&self, token: &str) -> Result<String, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!(kind = ?e.kind(), "Rejected bearer token");
            AuthError::InvalidToken
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_and_is_salted() {
        let hash = hash_password("secret1").unwrap();
        let hash_again = hash_password("secret1").unwrap();

        assert_ne!(hash, "secret1");
        assert_ne!(hash, hash_again);
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret1", &hash).unwrap());
        assert!(verify_password("secret1", &hash_again).unwrap());
        assert!(!verify_password("secret2", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_mismatch() {
        assert!(matches!(
            verify_password("secret1", "not-a-phc-string"),
            Err(AuthError::MalformedHash(_))
        ));
    }

    #[test]
    fn issued_token_validates_to_subject() {
        let signer = TokenSigner::new("test-secret", Duration::days(7));
        let token = signer.issue("user-1").unwrap();
        assert_eq!(signer.validate(&token).unwrap(), "user-1");
    }

    #[test]
    fn token_carries_seven_day_window() {
        let signer = TokenSigner::new("test-secret", Duration::days(7));
        let issued_at = Utc::now();
        let token = signer.issue_at("user-1", issued_at).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let claims = decode::<TokenClaims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims.iat, issued_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = TokenSigner::new("test-secret", Duration::days(7));
        let token = signer
            .issue_at("user-1", Utc::now() - Duration::days(8))
            .unwrap();
        assert!(matches!(signer.validate(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenSigner::new("secret-a", Duration::days(7))
            .issue("user-1")
            .unwrap();
        let other = TokenSigner::new("secret-b", Duration::days(7));
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn other_algorithms_are_rejected_even_with_the_right_secret() {
        let claims = TokenClaims {
            sub: "user-1".to_string(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::days(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let signer = TokenSigner::new("test-secret", Duration::days(7));
        assert!(signer.validate(&token).is_err());
    }

    #[test]
    fn empty_subject_is_rejected() {
        let signer = TokenSigner::new("test-secret", Duration::days(7));
        let token = signer.issue("").unwrap();
        assert!(signer.validate(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let signer = TokenSigner::new("test-secret", Duration::days(7));
        assert!(signer.validate("invalid.token.here").is_err());
        assert!(signer.validate("").is_err());
    }
}
