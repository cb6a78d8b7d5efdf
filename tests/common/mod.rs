#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use zeroize::Zeroizing;

use slothspot::config::Config;
use slothspot::error::{AppError, Result};
use slothspot::models::sloth::{
    NewPhoto, NewSighting, NewSloth, Photo, Sighting, SightingDetail, Sloth, SlothDetail,
};
use slothspot::models::user::{AuthProvider, NewUser, User};
use slothspot::repositories::sloths::SlothRepository;
use slothspot::repositories::users::UserRepository;
use slothspot::services::oauth::GoogleOAuth;
use slothspot::state::AppState;
use slothspot::stores::images::ImageService;
use slothspot::stores::kv::KeyValueStore;

/// In-memory `KeyValueStore`. TTLs are recorded, not enforced; expiry is
/// simulated by deleting the key.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (String, u64)>>,
    put_count: AtomicUsize,
}

impl MemoryKv {
    pub fn raw(&self, key: &str) -> Option<(String, u64)> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str, ttl_seconds: u64) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), ttl_seconds));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key).map(|(value, _)| value))
    }

    async fn put_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        self.put_count.fetch_add(1, Ordering::SeqCst);
        self.insert_raw(key, value, ttl_seconds);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// In-memory `UserRepository`.
#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUsers {
    pub fn seed(&self, display_name: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            avatar_url: None,
            provider: AuthProvider::Google,
            provider_id: format!("google-{}", Uuid::new_v4()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        user
    }

    pub fn remove(&self, id: Uuid) {
        self.users.lock().unwrap().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_provider(
        &self,
        provider: AuthProvider,
        provider_id: &str,
    ) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.provider == provider && u.provider_id == provider_id)
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User> {
        let user = User {
            id: new_user.id,
            display_name: new_user.display_name,
            avatar_url: new_user.avatar_url,
            provider: new_user.provider,
            provider_id: new_user.provider_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        Ok(users.get_mut(&id).map(|user| {
            user.display_name = display_name.to_string();
            user.avatar_url = avatar_url.map(str::to_string);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

/// In-memory `SlothRepository` with injectable insert failures.
#[derive(Default)]
pub struct MemorySloths {
    sloths: Mutex<HashMap<Uuid, Sloth>>,
    sightings: Mutex<HashMap<Uuid, Sighting>>,
    photos: Mutex<HashMap<Uuid, Photo>>,
    /// Fail the photo insert with this zero-based attempt index.
    pub fail_photo_insert_at: Mutex<Option<usize>>,
    photo_insert_attempts: AtomicUsize,
}

impl MemorySloths {
    pub fn sloth_count(&self) -> usize {
        self.sloths.lock().unwrap().len()
    }

    pub fn sighting_count(&self) -> usize {
        self.sightings.lock().unwrap().len()
    }

    pub fn photo_count(&self) -> usize {
        self.photos.lock().unwrap().len()
    }

    pub fn sighting(&self, id: Uuid) -> Option<Sighting> {
        self.sightings.lock().unwrap().get(&id).cloned()
    }

    pub fn photos(&self) -> Vec<Photo> {
        self.photos.lock().unwrap().values().cloned().collect()
    }

    fn store_sighting(&self, sighting: &NewSighting) {
        self.sightings.lock().unwrap().insert(
            sighting.id,
            Sighting {
                id: sighting.id,
                sloth_id: sighting.sloth_id,
                user_id: sighting.user_id,
                kind: sighting.kind,
                sloth_status: sighting.sloth_status,
                notes: sighting.notes.clone(),
                created_at: Utc::now(),
            },
        );
    }
}

#[async_trait]
impl SlothRepository for MemorySloths {
    async fn create_sloth_with_discovery(
        &self,
        sloth: &NewSloth,
        sighting: &NewSighting,
    ) -> Result<()> {
        self.sloths.lock().unwrap().insert(
            sloth.id,
            Sloth {
                id: sloth.id,
                latitude: sloth.latitude,
                longitude: sloth.longitude,
                status: sloth.status,
                discovered_by: sloth.discovered_by,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
        self.store_sighting(sighting);
        Ok(())
    }

    async fn insert_sighting(&self, sighting: &NewSighting) -> Result<()> {
        self.store_sighting(sighting);
        Ok(())
    }

    async fn insert_photo(&self, photo: &NewPhoto) -> Result<()> {
        let attempt = self.photo_insert_attempts.fetch_add(1, Ordering::SeqCst);
        if *self.fail_photo_insert_at.lock().unwrap() == Some(attempt) {
            return Err(AppError::Internal("simulated photo insert failure".to_string()));
        }

        self.photos.lock().unwrap().insert(
            photo.id,
            Photo {
                id: photo.id,
                sighting_id: photo.sighting_id,
                image_id: photo.image_id.clone(),
                caption: photo.caption.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete_photo_by_image(&self, image_id: &str) -> Result<()> {
        self.photos
            .lock()
            .unwrap()
            .retain(|_, photo| photo.image_id != image_id);
        Ok(())
    }

    async fn delete_sighting(&self, id: Uuid) -> Result<()> {
        self.sightings.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn delete_sloth(&self, id: Uuid) -> Result<()> {
        self.sloths.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn find_sloth(&self, id: Uuid) -> Result<Option<Sloth>> {
        Ok(self.sloths.lock().unwrap().get(&id).cloned())
    }

    async fn find_sighting(&self, id: Uuid) -> Result<Option<Sighting>> {
        Ok(self.sightings.lock().unwrap().get(&id).cloned())
    }

    async fn photos_of_sighting(&self, sighting_id: Uuid) -> Result<Vec<Photo>> {
        Ok(self
            .photos
            .lock()
            .unwrap()
            .values()
            .filter(|photo| photo.sighting_id == sighting_id)
            .cloned()
            .collect())
    }

    async fn list_sloths(&self) -> Result<Vec<Sloth>> {
        let mut sloths: Vec<Sloth> = self.sloths.lock().unwrap().values().cloned().collect();
        sloths.sort_by_key(|sloth| sloth.created_at);
        Ok(sloths)
    }

    async fn sloths_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Sloth>> {
        let lat_delta = radius_km / 111.0;
        let lon_delta = radius_km / (111.0 * latitude.to_radians().cos().abs().max(0.01));
        let mut sloths: Vec<Sloth> = self
            .sloths
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                (s.latitude - latitude).abs() <= lat_delta
                    && (s.longitude - longitude).abs() <= lon_delta
            })
            .cloned()
            .collect();
        sloths.sort_by_key(|sloth| sloth.created_at);
        Ok(sloths)
    }

    async fn sloth_detail(&self, id: Uuid) -> Result<Option<SlothDetail>> {
        let Some(sloth) = self.sloths.lock().unwrap().get(&id).cloned() else {
            return Ok(None);
        };

        let mut sightings: Vec<Sighting> = self
            .sightings
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.sloth_id == id)
            .cloned()
            .collect();
        sightings.sort_by_key(|s| std::cmp::Reverse(s.created_at));

        let photos = self.photos.lock().unwrap();
        let sightings = sightings
            .into_iter()
            .map(|sighting| {
                let photos = photos
                    .values()
                    .filter(|p| p.sighting_id == sighting.id)
                    .cloned()
                    .collect();
                SightingDetail {
                    sighting,
                    sighted_by: None,
                    photos,
                }
            })
            .collect();

        Ok(Some(SlothDetail { sloth, sightings }))
    }
}

/// In-memory `ImageService` with injectable upload/delete failures.
#[derive(Default)]
pub struct MemoryImages {
    uploads: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    delete_attempts: Mutex<Vec<String>>,
    /// Fail the upload with this zero-based attempt index.
    pub fail_upload_at: Mutex<Option<usize>>,
    /// When set, every delete call fails (after being recorded).
    pub fail_deletes: AtomicBool,
    upload_attempts: AtomicUsize,
}

impl MemoryImages {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn delete_attempts(&self) -> Vec<String> {
        self.delete_attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageService for MemoryImages {
    async fn upload(
        &self,
        _data: Vec<u8>,
        _filename: &str,
        image_id: Uuid,
        _uploader_id: Uuid,
    ) -> Result<String> {
        let attempt = self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        if *self.fail_upload_at.lock().unwrap() == Some(attempt) {
            return Err(AppError::Upload("simulated upload failure".to_string()));
        }

        let external_id = format!("cf-{}", image_id);
        self.uploads.lock().unwrap().push(external_id.clone());
        Ok(external_id)
    }

    async fn delete(&self, image_id: &str) -> Result<()> {
        self.delete_attempts.lock().unwrap().push(image_id.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Upload("simulated delete failure".to_string()));
        }
        self.deleted.lock().unwrap().push(image_id.to_string());
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/unused".to_string(),
        redis_url: "redis://localhost/unused".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        public_base_url: "http://127.0.0.1:3000".to_string(),
        cloudflare_account_id: "test-account".to_string(),
        cloudflare_images_token: Zeroizing::new("test-token".to_string()),
        google_client_id: "test-client".to_string(),
        google_client_secret: Zeroizing::new("test-secret".to_string()),
    }
}

pub struct TestStores {
    pub kv: Arc<MemoryKv>,
    pub users: Arc<MemoryUsers>,
    pub sloths: Arc<MemorySloths>,
    pub images: Arc<MemoryImages>,
}

/// Assembles an `AppState` backed entirely by in-memory doubles.
pub fn test_state() -> (AppState, TestStores) {
    let config = test_config();
    let stores = TestStores {
        kv: Arc::new(MemoryKv::default()),
        users: Arc::new(MemoryUsers::default()),
        sloths: Arc::new(MemorySloths::default()),
        images: Arc::new(MemoryImages::default()),
    };

    let state = AppState {
        kv: stores.kv.clone(),
        users: stores.users.clone(),
        sloths: stores.sloths.clone(),
        images: stores.images.clone(),
        oauth: GoogleOAuth::new(&config),
        config,
    };

    (state, stores)
}
