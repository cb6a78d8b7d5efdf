use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::user::User;

/// The session record as persisted in the key-value store.
///
/// Stored as JSON under `session:<lookup_key>`; the raw bearer token never
/// appears here. Expiry is enforced by the store's TTL, so age is the only
/// state the record itself carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// The ID of the user this session belongs to.
    pub user_id: Uuid,
    /// The timestamp when the session was created or last renewed.
    pub created_at: DateTime<Utc>,
}

/// A stored session together with its lookup key.
#[derive(Debug, Clone)]
pub struct SessionData {
    /// The lookup key (hex SHA-256 of the bearer token).
    pub id: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn from_stored(id: String, stored: StoredSession) -> Self {
        Self {
            id,
            user_id: stored.user_id,
            created_at: stored.created_at,
        }
    }
}

/// The per-request authentication state attached by the auth middleware.
///
/// Immutable once built; handlers read it from request extensions instead
/// of mutating shared per-request state.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub session: Option<SessionData>,
    pub user: Option<User>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// The binary authentication gate: the user, or `AuthRequired`.
    pub fn require_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or(AppError::AuthRequired)
    }
}
