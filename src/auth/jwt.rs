use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

const OAUTH_STATE_EXPIRY_MINUTES: i64 = 10;

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
    download_audience: String,
    download_expiry: Duration,
    oauth_state_audience: String,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::minutes(config.jwt_expiry_minutes),
            download_audience: config.download_token_audience.clone(),
            download_expiry: Duration::minutes(config.download_token_expiry_minutes),
            oauth_state_audience: format!("{}-oauth-state", config.jwt_issuer),
        })
    }

    pub fn generate_token(&self, user_id: Uuid, username: &str, role: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.expiry;
        let claims = Claims {
            sub: user_id,
            username: username.to_owned(),
            role: role.to_owned(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation(&self.audience))?;
        Ok(data.claims)
    }

    /// Token embedded in document download links so the proxy route can be
    /// opened directly by the browser without an `Authorization` header.
    pub fn generate_download_token(&self, document_id: Uuid, user_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.download_expiry;
        let claims = DownloadClaims {
            doc_id: document_id,
            user_id,
            iss: self.issuer.clone(),
            aud: self.download_audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_download_token(&self, token: &str) -> Result<DownloadClaims> {
        let data = decode::<DownloadClaims>(
            token,
            &self.decoding,
            &self.validation(&self.download_audience),
        )?;
        Ok(data.claims)
    }

    /// Signed CSRF state for the OAuth round trip. The random nonce keeps two
    /// states issued within the same second distinct.
    pub fn generate_oauth_state(&self, nonce: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(OAUTH_STATE_EXPIRY_MINUTES);
        let claims = OAuthStateClaims {
            nonce: nonce.to_owned(),
            iss: self.issuer.clone(),
            aud: self.oauth_state_audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_oauth_state(&self, state: &str) -> Result<OAuthStateClaims> {
        let data = decode::<OAuthStateClaims>(
            state,
            &self.decoding,
            &self.validation(&self.oauth_state_audience),
        )?;
        Ok(data.claims)
    }

    fn validation(&self, audience: &str) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(&[audience.to_owned()]);
        validation.set_issuer(&[self.issuer.clone()]);
        validation
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadClaims {
    pub doc_id: Uuid,
    pub user_id: Uuid,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthStateClaims {
    pub nonce: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}
