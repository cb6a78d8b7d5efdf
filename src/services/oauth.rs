use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{AppError, Result};

const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// The ID-token claims the login flow consumes.
///
/// Claims are decoded, not signature-verified: the token arrives directly
/// from Google's token endpoint over TLS during the code exchange.
#[derive(Debug, Deserialize)]
pub struct GoogleClaims {
    pub sub: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

/// Google OAuth client (authorization-code flow with PKCE).
#[derive(Clone)]
pub struct GoogleOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: Zeroizing<String>,
    redirect_uri: String,
}

impl GoogleOAuth {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: format!("{}/auth/login/google/callback", config.public_base_url),
        }
    }

    /// Generates an opaque CSRF `state` value.
    pub fn generate_state() -> String {
        random_urlsafe(16)
    }

    /// Generates a PKCE code verifier.
    pub fn generate_code_verifier() -> String {
        random_urlsafe(32)
    }

    /// The S256 code challenge for a verifier.
    pub fn code_challenge(code_verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
    }

    /// Builds the authorization redirect URL.
    pub fn authorization_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            AUTHORIZATION_ENDPOINT,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", "openid profile"),
                ("state", state),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Authorization URL build failed: {}", e)))?;

        Ok(url.into())
    }

    /// Exchanges an authorization code for the user's identity claims.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<GoogleClaims> {
        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("OAuth code exchange rejected: {}", response.status());
            return Err(AppError::Validation(
                "Invalid authorization code".to_string(),
            ));
        }

        let tokens: TokenResponse = response.json().await?;
        decode_id_token(&tokens.id_token)
    }
}

fn random_urlsafe(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Decodes the claims segment of a JWT without verifying the signature.
fn decode_id_token(id_token: &str) -> Result<GoogleClaims> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AppError::Validation("Malformed ID token".to_string()))?;

    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AppError::Validation("Malformed ID token".to_string()))?;

    sonic_rs::from_slice(&decoded)
        .map_err(|_| AppError::Validation("Malformed ID token".to_string()))
}
