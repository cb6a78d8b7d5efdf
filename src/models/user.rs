use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// The identity provider a user authenticated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(name = "auth_provider")]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    #[postgres(name = "google")]
    Google,
}

/// Represents a user in the system.
///
/// Identity is keyed by `(provider, provider_id)`; a row is created on the
/// first successful login for that pair and profile fields are refreshed on
/// every subsequent login.
#[derive(Debug, Clone)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's display name, as reported by the provider.
    pub display_name: String,
    /// The user's avatar URL, if the provider supplied one.
    pub avatar_url: Option<String>,
    /// The identity provider.
    pub provider: AuthProvider,
    /// The provider's subject identifier for this user.
    pub provider_id: String,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            display_name: row.get("display_name"),
            avatar_url: row.get("avatar_url"),
            provider: row.get("provider"),
            provider_id: row.get("provider_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// The publicly visible slice of a user record.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// The fields required to create a user on first login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub provider: AuthProvider,
    pub provider_id: String,
}
