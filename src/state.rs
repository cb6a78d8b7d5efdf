use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::repositories::sloths::{PgSlothRepository, SlothRepository};
use crate::repositories::users::{PgUserRepository, UserRepository};
use crate::services::oauth::GoogleOAuth;
use crate::stores::images::{CloudflareImages, ImageService};
use crate::stores::kv::{KeyValueStore, RedisStore};

/// The application's state: shared handles to the external stores.
///
/// Store fields are trait objects so request handling and the submission
/// saga receive their collaborators explicitly; tests assemble a state
/// from in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    /// The session key-value store.
    pub kv: Arc<dyn KeyValueStore>,
    /// The relational identity store.
    pub users: Arc<dyn UserRepository>,
    /// The relational sighting store.
    pub sloths: Arc<dyn SlothRepository>,
    /// The external image service.
    pub images: Arc<dyn ImageService>,
    /// The Google OAuth client.
    pub oauth: GoogleOAuth,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Creates an `AppState` wired to the production store backends.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = crate::db::create_pool(&config.database_url)?;
        tracing::info!("✅ PostgreSQL pool initialized");

        let kv = RedisStore::connect(&config.redis_url).await?;
        tracing::info!("✅ Redis connection manager initialized");

        let images = CloudflareImages::new(config);
        let oauth = GoogleOAuth::new(config);

        Ok(AppState {
            kv: Arc::new(kv),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            sloths: Arc::new(PgSlothRepository::new(pool)),
            images: Arc::new(images),
            oauth,
            config: config.clone(),
        })
    }
}
