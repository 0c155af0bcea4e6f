use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Issues and validates HS256 access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expire_minutes: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, expire_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expire_minutes,
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<String, AppError> {
        self.issue_with_expiry(user_id, username, email, Duration::minutes(self.expire_minutes))
    }

    fn issue_with_expiry(
        &self,
        user_id: Uuid,
        username: Option<&str>,
        email: Option<&str>,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
            username: username.map(str::to_string),
            email: email.map(str::to_string),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign token: {e}")))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_decode() {
        let issuer = TokenIssuer::new("secret", 60);
        let id = Uuid::new_v4();
        let token = issuer.issue(id, Some("alice"), None).unwrap();
        let claims = issuer.decode(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert!(claims.email.is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new("secret", 60);
        let token = issuer
            .issue_with_expiry(Uuid::new_v4(), None, None, Duration::minutes(-5))
            .unwrap();
        assert!(matches!(
            issuer.decode(&token),
            Err(AppError::Unauthorized(msg)) if msg == "Invalid or expired token"
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenIssuer::new("one", 60)
            .issue(Uuid::new_v4(), None, None)
            .unwrap();
        assert!(TokenIssuer::new("two", 60).decode(&token).is_err());
    }
}
