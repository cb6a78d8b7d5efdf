use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::sloth::{
    NewPhoto, NewSighting, NewSloth, Photo, Sighting, SightingDetail, Sloth, SlothDetail,
};
use crate::models::user::UserSummary;

/// The relational store for sloths, sightings, and photos.
///
/// `create_sloth_with_discovery` is the only multi-row write and runs in a
/// single transaction; every other method is one statement, so the saga
/// can rely on per-call atomicity and issue compensating deletes
/// individually.
#[async_trait]
pub trait SlothRepository: Send + Sync {
    /// Inserts a sloth and its discovery sighting atomically.
    async fn create_sloth_with_discovery(
        &self,
        sloth: &NewSloth,
        sighting: &NewSighting,
    ) -> Result<()>;

    async fn insert_sighting(&self, sighting: &NewSighting) -> Result<()>;

    async fn insert_photo(&self, photo: &NewPhoto) -> Result<()>;

    /// Compensating delete for a photo row, keyed by the external image ID.
    async fn delete_photo_by_image(&self, image_id: &str) -> Result<()>;

    async fn delete_sighting(&self, id: Uuid) -> Result<()>;

    async fn delete_sloth(&self, id: Uuid) -> Result<()>;

    async fn find_sloth(&self, id: Uuid) -> Result<Option<Sloth>>;

    async fn find_sighting(&self, id: Uuid) -> Result<Option<Sighting>>;

    async fn photos_of_sighting(&self, sighting_id: Uuid) -> Result<Vec<Photo>>;

    async fn list_sloths(&self) -> Result<Vec<Sloth>>;

    /// Read-only proximity query; the submission write path never uses it.
    async fn sloths_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Sloth>>;

    /// A sloth with its sightings (newest first), reporters, and photos.
    async fn sloth_detail(&self, id: Uuid) -> Result<Option<SlothDetail>>;
}

const SLOTH_COLUMNS: &str =
    "id, latitude, longitude, status, discovered_by, created_at, updated_at";

/// PostgreSQL-backed `SlothRepository`.
pub struct PgSlothRepository {
    pool: Pool,
}

impl PgSlothRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlothRepository for PgSlothRepository {
    async fn create_sloth_with_discovery(
        &self,
        sloth: &NewSloth,
        sighting: &NewSighting,
    ) -> Result<()> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        let insert_sloth = transaction
            .prepare_cached(
                r#"
                INSERT INTO sloths (id, latitude, longitude, status, discovered_by)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .await?;
        transaction
            .execute(
                &insert_sloth,
                &[
                    &sloth.id,
                    &sloth.latitude,
                    &sloth.longitude,
                    &sloth.status,
                    &sloth.discovered_by,
                ],
            )
            .await?;

        let insert_sighting = transaction
            .prepare_cached(
                r#"
                INSERT INTO sightings (id, sloth_id, user_id, kind, sloth_status, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .await?;
        transaction
            .execute(
                &insert_sighting,
                &[
                    &sighting.id,
                    &sighting.sloth_id,
                    &sighting.user_id,
                    &sighting.kind,
                    &sighting.sloth_status,
                    &sighting.notes,
                ],
            )
            .await?;

        transaction.commit().await?;
        Ok(())
    }

    async fn insert_sighting(&self, sighting: &NewSighting) -> Result<()> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO sightings (id, sloth_id, user_id, kind, sloth_status, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .await?;

        client
            .execute(
                &stmt,
                &[
                    &sighting.id,
                    &sighting.sloth_id,
                    &sighting.user_id,
                    &sighting.kind,
                    &sighting.sloth_status,
                    &sighting.notes,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_photo(&self, photo: &NewPhoto) -> Result<()> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO photos (id, sighting_id, image_id, caption)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .await?;

        client
            .execute(
                &stmt,
                &[&photo.id, &photo.sighting_id, &photo.image_id, &photo.caption],
            )
            .await?;
        Ok(())
    }

    async fn delete_photo_by_image(&self, image_id: &str) -> Result<()> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("DELETE FROM photos WHERE image_id = $1")
            .await?;
        client.execute(&stmt, &[&image_id]).await?;
        Ok(())
    }

    async fn delete_sighting(&self, id: Uuid) -> Result<()> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("DELETE FROM sightings WHERE id = $1")
            .await?;
        client.execute(&stmt, &[&id]).await?;
        Ok(())
    }

    async fn delete_sloth(&self, id: Uuid) -> Result<()> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("DELETE FROM sloths WHERE id = $1")
            .await?;
        client.execute(&stmt, &[&id]).await?;
        Ok(())
    }

    async fn find_sloth(&self, id: Uuid) -> Result<Option<Sloth>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(&format!("SELECT {SLOTH_COLUMNS} FROM sloths WHERE id = $1"))
            .await?;

        let row = client.query_opt(&stmt, &[&id]).await?;
        Ok(row.as_ref().map(Sloth::from_row))
    }

    async fn find_sighting(&self, id: Uuid) -> Result<Option<Sighting>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                SELECT id, sloth_id, user_id, kind, sloth_status, notes, created_at
                FROM sightings
                WHERE id = $1
                "#,
            )
            .await?;

        let row = client.query_opt(&stmt, &[&id]).await?;
        Ok(row.as_ref().map(Sighting::from_row))
    }

    async fn photos_of_sighting(&self, sighting_id: Uuid) -> Result<Vec<Photo>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                SELECT id, sighting_id, image_id, caption, created_at
                FROM photos
                WHERE sighting_id = $1
                ORDER BY created_at ASC
                "#,
            )
            .await?;

        let rows = client.query(&stmt, &[&sighting_id]).await?;
        Ok(rows.iter().map(Photo::from_row).collect())
    }

    async fn list_sloths(&self) -> Result<Vec<Sloth>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(&format!(
                "SELECT {SLOTH_COLUMNS} FROM sloths ORDER BY created_at ASC"
            ))
            .await?;

        let rows = client.query(&stmt, &[]).await?;
        Ok(rows.iter().map(Sloth::from_row).collect())
    }

    async fn sloths_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Sloth>> {
        // Bounding-box approximation: 1 degree of latitude ~ 111 km, with
        // longitude scaled by cos(latitude).
        let lat_delta = radius_km / 111.0;
        let lon_delta = radius_km / (111.0 * latitude.to_radians().cos().abs().max(0.01));

        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(&format!(
                r#"
                SELECT {SLOTH_COLUMNS} FROM sloths
                WHERE latitude BETWEEN $1 AND $2
                  AND longitude BETWEEN $3 AND $4
                ORDER BY created_at ASC
                "#
            ))
            .await?;

        let rows = client
            .query(
                &stmt,
                &[
                    &(latitude - lat_delta),
                    &(latitude + lat_delta),
                    &(longitude - lon_delta),
                    &(longitude + lon_delta),
                ],
            )
            .await?;
        Ok(rows.iter().map(Sloth::from_row).collect())
    }

    async fn sloth_detail(&self, id: Uuid) -> Result<Option<SlothDetail>> {
        let Some(sloth) = self.find_sloth(id).await? else {
            return Ok(None);
        };

        let client = self.pool.get().await?;
        let sightings_stmt = client
            .prepare_cached(
                r#"
                SELECT s.id, s.sloth_id, s.user_id, s.kind, s.sloth_status,
                       s.notes, s.created_at,
                       u.display_name, u.avatar_url
                FROM sightings s
                LEFT JOIN users u ON u.id = s.user_id
                WHERE s.sloth_id = $1
                ORDER BY s.created_at DESC
                "#,
            )
            .await?;
        let sighting_rows = client.query(&sightings_stmt, &[&id]).await?;

        let sighting_ids: Vec<Uuid> =
            sighting_rows.iter().map(|row| row.get("id")).collect();

        let photos_stmt = client
            .prepare_cached(
                r#"
                SELECT id, sighting_id, image_id, caption, created_at
                FROM photos
                WHERE sighting_id = ANY($1)
                ORDER BY created_at ASC
                "#,
            )
            .await?;
        let photo_rows = client.query(&photos_stmt, &[&sighting_ids]).await?;

        let mut photos_by_sighting: HashMap<Uuid, Vec<Photo>> = HashMap::new();
        for row in &photo_rows {
            let photo = Photo::from_row(row);
            photos_by_sighting
                .entry(photo.sighting_id)
                .or_default()
                .push(photo);
        }

        let sightings = sighting_rows
            .iter()
            .map(|row| {
                let sighting = Sighting::from_row(row);
                let sighted_by = row
                    .get::<_, Option<String>>("display_name")
                    .map(|display_name| UserSummary {
                        id: sighting.user_id,
                        display_name,
                        avatar_url: row.get("avatar_url"),
                    });
                let photos = photos_by_sighting.remove(&sighting.id).unwrap_or_default();
                SightingDetail {
                    sighting,
                    sighted_by,
                    photos,
                }
            })
            .collect();

        Ok(Some(SlothDetail { sloth, sightings }))
    }
}
