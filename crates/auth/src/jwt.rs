//! HS256 bearer token decoding.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::claims::{validate_claims, JwtClaims, TokenValidationError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtError {
    #[error("malformed or unsigned token: {0}")]
    Decode(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a raw bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

/// Shared-secret (HS256) validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry lives in `expires_at`, checked by `validate_claims`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| JwtError::Decode(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrincipalId, Role};
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    fn mint(secret: &str, issued_at: DateTime<Utc>, ttl: Duration) -> (JwtClaims, String) {
        let claims = JwtClaims {
            sub: PrincipalId::new(),
            roles: vec![Role::new("admin")],
            issued_at,
            expires_at: issued_at + ttl,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (claims, token)
    }

    #[test]
    fn round_trips_a_valid_token() {
        let now = Utc::now();
        let (claims, token) = mint("s3cret", now, Duration::minutes(10));

        let validator = Hs256JwtValidator::new("s3cret");
        assert_eq!(validator.validate(&token, now).unwrap(), claims);
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let (_, token) = mint("s3cret", now, Duration::minutes(10));

        let validator = Hs256JwtValidator::new("other");
        assert!(matches!(validator.validate(&token, now), Err(JwtError::Decode(_))));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now();
        let (_, token) = mint("s3cret", now - Duration::hours(1), Duration::minutes(10));

        let validator = Hs256JwtValidator::new("s3cret");
        assert_eq!(
            validator.validate(&token, now),
            Err(JwtError::Claims(TokenValidationError::Expired))
        );
    }

    #[test]
    fn rejects_garbage() {
        let validator = Hs256JwtValidator::new("s3cret");
        assert!(validator.validate("not.a.token", Utc::now()).is_err());
    }
}
