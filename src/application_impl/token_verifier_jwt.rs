use crate::application_port::{AuthError, TokenVerifier};
use crate::domain_model::UserId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String, // user id
}

/// Verifies HS256 access tokens minted by the auth service.
pub struct JwtTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtTokenVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[config.audience.clone()]);
        validation.set_issuer(&[config.issuer.clone()]);

        Self {
            key: DecodingKey::from_secret(&config.signing_key),
            validation,
        }
    }
}

#[async_trait::async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<AccessClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            }
        })?;

        UserId::new(data.claims.sub).map_err(|_| AuthError::TokenInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: u64,
        iss: &'a str,
        aud: &'a str,
    }

    fn config() -> JwtConfig {
        JwtConfig {
            issuer: "sharenote.auth".into(),
            audience: "sharenote".into(),
            signing_key: b"test-key".to_vec(),
        }
    }

    fn token(sub: &str, exp: u64, key: &[u8]) -> String {
        let claims = Claims {
            sub,
            exp,
            iss: "sharenote.auth",
            aud: "sharenote",
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(key),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let verifier = JwtTokenVerifier::new(&config());
        let t = token("u1", get_current_timestamp() + 600, b"test-key");

        let user_id = verifier.verify_token(&t).await.unwrap();
        assert_eq!(user_id.as_str(), "u1");
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let verifier = JwtTokenVerifier::new(&config());
        let t = token("u1", get_current_timestamp() - 600, b"test-key");

        let err = verifier.verify_token(&t).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn rejects_foreign_signature_and_blank_subject() {
        let verifier = JwtTokenVerifier::new(&config());

        let forged = token("u1", get_current_timestamp() + 600, b"other-key");
        assert!(matches!(
            verifier.verify_token(&forged).await,
            Err(AuthError::TokenInvalid)
        ));

        let blank = token("", get_current_timestamp() + 600, b"test-key");
        assert!(matches!(
            verifier.verify_token(&blank).await,
            Err(AuthError::TokenInvalid)
        ));
    }
}
