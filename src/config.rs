use std::env;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server holding session records.
    pub redis_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: String,
    /// The externally visible base URL, used for OAuth redirects.
    pub public_base_url: String,
    /// The Cloudflare account that owns the Images namespace.
    pub cloudflare_account_id: String,
    /// The Cloudflare Images API token.
    pub cloudflare_images_token: Zeroizing<String>,
    /// The Google OAuth client ID.
    pub google_client_id: String,
    /// The Google OAuth client secret.
    pub google_client_secret: Zeroizing<String>,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
            cloudflare_account_id: env::var("CLOUDFLARE_ACCOUNT_ID")
                .context("CLOUDFLARE_ACCOUNT_ID must be set")?,
            cloudflare_images_token: Zeroizing::new(
                env::var("CLOUDFLARE_IMAGES_TOKEN")
                    .context("CLOUDFLARE_IMAGES_TOKEN must be set")?,
            ),
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .context("GOOGLE_CLIENT_ID must be set")?,
            google_client_secret: Zeroizing::new(
                env::var("GOOGLE_CLIENT_SECRET")
                    .context("GOOGLE_CLIENT_SECRET must be set")?,
            ),
        })
    }
}
