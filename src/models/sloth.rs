use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::models::user::UserSummary;

/// The status of a sloth in the wild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(name = "sloth_status")]
#[serde(rename_all = "lowercase")]
pub enum SlothStatus {
    #[postgres(name = "active")]
    Active,
    #[postgres(name = "removed")]
    Removed,
}

impl FromStr for SlothStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SlothStatus::Active),
            "removed" => Ok(SlothStatus::Removed),
            _ => Err(()),
        }
    }
}

/// Whether a sighting discovered the sloth or observed a known one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(name = "sighting_kind")]
#[serde(rename_all = "lowercase")]
pub enum SightingKind {
    #[postgres(name = "discovery")]
    Discovery,
    #[postgres(name = "followup")]
    Followup,
}

/// A reported sloth. Exactly one discovery sighting references it from the
/// moment it becomes visible; further sightings may accumulate later.
#[derive(Debug, Clone, Serialize)]
pub struct Sloth {
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub status: SlothStatus,
    /// The user who reported the discovery.
    pub discovered_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sloth {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            status: row.get("status"),
            discovered_by: row.get("discovered_by"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// A single observation of a sloth.
#[derive(Debug, Clone, Serialize)]
pub struct Sighting {
    pub id: Uuid,
    pub sloth_id: Uuid,
    pub user_id: Uuid,
    pub kind: SightingKind,
    /// The sloth status observed at sighting time.
    pub sloth_status: SlothStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Sighting {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            sloth_id: row.get("sloth_id"),
            user_id: row.get("user_id"),
            kind: row.get("kind"),
            sloth_status: row.get("sloth_status"),
            notes: row.get("notes"),
            created_at: row.get("created_at"),
        }
    }
}

/// A photo attached to a sighting. `image_id` is the external image
/// service's identifier, not a relational key.
#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    pub id: Uuid,
    pub sighting_id: Uuid,
    pub image_id: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            sighting_id: row.get("sighting_id"),
            image_id: row.get("image_id"),
            caption: row.get("caption"),
            created_at: row.get("created_at"),
        }
    }
}

/// Insert payload for a sloth row.
#[derive(Debug, Clone)]
pub struct NewSloth {
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub status: SlothStatus,
    pub discovered_by: Uuid,
}

/// Insert payload for a sighting row.
#[derive(Debug, Clone)]
pub struct NewSighting {
    pub id: Uuid,
    pub sloth_id: Uuid,
    pub user_id: Uuid,
    pub kind: SightingKind,
    pub sloth_status: SlothStatus,
    pub notes: Option<String>,
}

/// Insert payload for a photo row.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub id: Uuid,
    pub sighting_id: Uuid,
    pub image_id: String,
    pub caption: Option<String>,
}

/// A sighting with its reporter and photos, as served on the detail page.
#[derive(Debug, Clone, Serialize)]
pub struct SightingDetail {
    #[serde(flatten)]
    pub sighting: Sighting,
    pub sighted_by: Option<UserSummary>,
    pub photos: Vec<Photo>,
}

/// A sloth with its full sighting history.
#[derive(Debug, Clone, Serialize)]
pub struct SlothDetail {
    #[serde(flatten)]
    pub sloth: Sloth,
    pub sightings: Vec<SightingDetail>,
}
