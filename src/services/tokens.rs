//! Bearer token issuing and verification.
//!
//! Tokens are HS256 JWTs carrying the account id in `sub`. They are not
//! persisted anywhere: verification is a signature plus expiry check.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Issues and verifies access tokens with a key fixed at construction.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand against an explicit clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(
            config.secret.as_bytes(),
            Duration::minutes(config.expiration_minutes),
        )
    }

    /// Create a signed token for an account id
    pub fn issue(&self, account_id: &str) -> AppResult<IssuedToken> {
        self.issue_at(account_id, Utc::now())
    }

    pub fn issue_at(&self, account_id: &str, now: DateTime<Utc>) -> AppResult<IssuedToken> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to sign token: {}", e)))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token and return the account id it was issued for
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// A token is rejected once `now` reaches its `exp`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;

        if claims.sub.is_empty() {
            return Err(TokenError::Malformed);
        }

        let exp = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(TokenError::Malformed)?;
        if now >= exp {
            return Err(TokenError::Expired);
        }

        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(b"unit-test-secret", Duration::seconds(3600))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn accepts_token_right_after_issue() {
        let svc = service();
        let issued = svc.issue_at("acct-1", t0()).unwrap();
        assert_eq!(issued.expires_at, t0() + Duration::seconds(3600));
        assert_eq!(svc.verify_at(&issued.token, t0()).unwrap(), "acct-1");
    }

    #[test]
    fn issue_uses_wall_clock() {
        let svc = service();
        let issued = svc.issue("acct-1").unwrap();
        assert_eq!(svc.verify(&issued.token).unwrap(), "acct-1");
    }

    #[test]
    fn rejects_token_after_expiry() {
        let svc = service();
        let issued = svc.issue_at("acct-1", t0()).unwrap();

        let just_before = t0() + Duration::seconds(3599);
        assert!(svc.verify_at(&issued.token, just_before).is_ok());

        let after = t0() + Duration::seconds(3601);
        assert_eq!(
            svc.verify_at(&issued.token, after),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn rejects_any_altered_byte() {
        let svc = service();
        let issued = svc.issue_at("acct-1", t0()).unwrap();
        let original = issued.token.into_bytes();

        for i in 0..original.len() {
            let mut tampered = original.clone();
            tampered[i] = if tampered[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(tampered).unwrap();
            assert!(
                svc.verify_at(&tampered, t0()).is_err(),
                "tampered byte {} was accepted",
                i
            );
        }
    }

    #[test]
    fn rejects_signature_from_other_key() {
        let issued = service().issue_at("acct-1", t0()).unwrap();
        let other = TokenService::new(b"another-secret", Duration::seconds(3600));
        assert_eq!(
            other.verify_at(&issued.token, t0()),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_garbage() {
        let svc = service();
        assert_eq!(svc.verify_at("", t0()), Err(TokenError::Malformed));
        assert_eq!(
            svc.verify_at("not.a.token", t0()),
            Err(TokenError::Malformed)
        );
    }
}
