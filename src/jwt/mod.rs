//! JWT token handling
//!
//! Bearer tokens identify the calling principal only. Tenant selection and
//! capabilities are resolved per request, never carried in the token.

use crate::config::JwtConfig;
use crate::domain::StringUuid;
use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const AUDIENCE: &str = "tenantry";
const IDENTITY_TOKEN_TYPE: &str = "identity";

/// Identity Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (principal ID)
    pub sub: String,
    pub email: String,
    pub iss: String,
    pub aud: String,
    /// Token type discriminator
    #[serde(default)]
    pub token_type: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl IdentityClaims {
    pub fn principal_id(&self) -> Result<StringUuid> {
        StringUuid::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("Invalid principal ID in token".to_string()))
    }
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Strict leeway (5 seconds) instead of the default 60.
    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 5;
        v.set_audience(&[AUDIENCE]);
        v.set_issuer(&[&self.config.issuer]);
        v
    }

    pub fn create_identity_token(&self, principal_id: StringUuid, email: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.access_token_ttl_secs);

        let claims = IdentityClaims {
            sub: principal_id.to_string(),
            email: email.to_string(),
            iss: self.config.issuer.clone(),
            aud: AUDIENCE.to_string(),
            token_type: IDENTITY_TOKEN_TYPE.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(e.into()))
    }

    pub fn verify_identity_token(&self, token: &str) -> Result<IdentityClaims> {
        let token_data =
            decode::<IdentityClaims>(token, &self.decoding_key, &self.strict_validation())?;
        if token_data.claims.token_type != IDENTITY_TOKEN_TYPE {
            return Err(AppError::Unauthorized("Unexpected token type".to_string()));
        }
        Ok(token_data.claims)
    }
}
