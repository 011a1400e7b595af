//! Bearer-token issuance and verification

use crate::credentials::CredentialStore;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Algorithm used to sign issued tokens
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS512;

/// Algorithms accepted on verification: the HMAC family only
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Upper bound on token lifetime (100 years)
const MAX_TOKEN_EXPIRY_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (access key)
    pub sub: String,
    /// Expiration time
    pub exp: i64,
    /// Issued at
    pub iat: i64,
}

/// Token issuance errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("unable to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Proof that a request passed token verification.
///
/// Only [`TokenVerifier`] can mint one, and every privileged RPC method takes
/// it as an argument.
#[derive(Debug)]
pub struct Authorized {
    subject: String,
}

impl Authorized {
    /// Access key the token was issued to
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Validate a JWT against `secret` and extract its claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
    validation.validate_exp = true;

    decode::<Claims>(token, &key, &validation).map(|data| data.claims)
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Checks tokens against the active secret
#[derive(Clone)]
pub struct TokenVerifier {
    credentials: Arc<CredentialStore>,
}

impl TokenVerifier {
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self { credentials }
    }

    /// Verify the bearer token carried in the `Authorization` header
    pub fn authorize(&self, headers: &HeaderMap) -> Option<Authorized> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(extract_bearer_token);

        match token {
            Some(token) => self.authorize_query_token(token),
            None => {
                tracing::debug!("Request carries no bearer token");
                None
            }
        }
    }

    /// Verify a token passed explicitly, e.g. as a `?token=` query parameter
    pub fn authorize_query_token(&self, token: &str) -> Option<Authorized> {
        // Reasons stay in the log; callers only learn "unauthorized".
        match validate_token(token, &self.credentials.secret_key()) {
            Ok(claims) => Some(Authorized {
                subject: claims.sub,
            }),
            Err(e) => {
                tracing::debug!(reason = %e, "Token rejected");
                None
            }
        }
    }

    /// `true` if the request's bearer token is valid
    pub fn authenticate(&self, headers: &HeaderMap) -> bool {
        self.authorize(headers).is_some()
    }

    /// `true` if `token` is valid
    pub fn authenticate_query_token(&self, token: &str) -> bool {
        self.authorize_query_token(token).is_some()
    }
}

/// Checks login credentials and signs tokens with the active secret
#[derive(Clone)]
pub struct TokenIssuer {
    credentials: Arc<CredentialStore>,
    expiry: Duration,
}

impl TokenIssuer {
    pub fn new(credentials: Arc<CredentialStore>, expiry_secs: u64) -> Self {
        let expiry_secs = i64::try_from(expiry_secs)
            .unwrap_or(MAX_TOKEN_EXPIRY_SECS)
            .min(MAX_TOKEN_EXPIRY_SECS);
        Self {
            credentials,
            expiry: Duration::seconds(expiry_secs),
        }
    }

    /// `true` if the pair matches the active credential
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        let active = self.credentials.current();
        let user_ok = active.access_key.as_bytes().ct_eq(username.as_bytes());
        let pass_ok = active.secret_key.as_bytes().ct_eq(password.as_bytes());
        (user_ok & pass_ok).into()
    }

    /// Sign a token for `subject`
    pub fn generate_token(&self, subject: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };
        let key = EncodingKey::from_secret(self.credentials.secret_key().as_bytes());
        Ok(encode(&Header::new(SIGNING_ALGORITHM), &claims, &key)?)
    }
}
