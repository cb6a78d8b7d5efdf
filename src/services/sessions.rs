use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::crypto::token::derive_lookup_key;
use crate::error::Result;
use crate::models::session::{SessionData, StoredSession};
use crate::models::user::User;
use crate::repositories::users::UserRepository;
use crate::stores::kv::KeyValueStore;

/// Full session lifetime; the KV store enforces expiry via TTL.
pub const SESSION_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;
/// Sessions at least this old are renewed in place when observed.
pub const RENEW_THRESHOLD_DAYS: i64 = 15;
/// The credential cookie name.
pub const SESSION_COOKIE_NAME: &str = "auth-session";

fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

async fn write_session(
    kv: &dyn KeyValueStore,
    session_id: &str,
    stored: &StoredSession,
) -> Result<()> {
    let json = sonic_rs::to_string(stored).map_err(|e| {
        crate::error::AppError::Internal(format!("Session serialization failed: {}", e))
    })?;
    kv.put_with_ttl(&session_key(session_id), &json, SESSION_TTL_SECONDS)
        .await
}

/// Creates a session for `token`, overwriting any record at the same key.
pub async fn create_session(
    kv: &dyn KeyValueStore,
    token: &str,
    user_id: Uuid,
) -> Result<SessionData> {
    let session_id = derive_lookup_key(token);
    let stored = StoredSession {
        user_id,
        created_at: Utc::now(),
    };
    write_session(kv, &session_id, &stored).await?;
    Ok(SessionData::from_stored(session_id, stored))
}

/// Re-writes a live session with a fresh `created_at` and full TTL.
///
/// Same storage effect as `create_session`; the distinction is for
/// callers refreshing an existing session rather than minting one.
pub async fn renew_session(
    kv: &dyn KeyValueStore,
    session_id: &str,
    user_id: Uuid,
) -> Result<StoredSession> {
    let stored = StoredSession {
        user_id,
        created_at: Utc::now(),
    };
    write_session(kv, session_id, &stored).await?;
    Ok(stored)
}

/// Looks up a session by its lookup key.
///
/// Absence covers both "expired" and "never existed". A record that no
/// longer deserializes is deleted and reported absent.
pub async fn retrieve_session(
    kv: &dyn KeyValueStore,
    session_id: &str,
) -> Result<Option<SessionData>> {
    let Some(raw) = kv.get(&session_key(session_id)).await? else {
        return Ok(None);
    };

    match sonic_rs::from_str::<StoredSession>(&raw) {
        Ok(stored) => Ok(Some(SessionData::from_stored(
            session_id.to_string(),
            stored,
        ))),
        Err(e) => {
            tracing::warn!("Discarding undecodable session record {}: {}", session_id, e);
            kv.delete(&session_key(session_id)).await?;
            Ok(None)
        }
    }
}

/// Deletes a session. Idempotent; deleting an absent key is not an error.
pub async fn invalidate_session(kv: &dyn KeyValueStore, session_id: &str) -> Result<()> {
    kv.delete(&session_key(session_id)).await
}

/// The session's effective expiry, mirrored onto the credential cookie.
pub fn session_expires_at(session: &SessionData) -> DateTime<Utc> {
    session.created_at + Duration::seconds(SESSION_TTL_SECONDS as i64)
}

/// Validates a bearer token: lookup, sliding renewal, identity resolution.
///
/// Returns `(None, None)` for unknown/expired tokens and for sessions
/// whose user row has gone missing; the latter also invalidates the
/// dangling session so the state cannot recur. Store transport failures
/// propagate — the caller must not serve a page with undecided auth state.
pub async fn validate_session_token(
    kv: &dyn KeyValueStore,
    users: &dyn UserRepository,
    token: &str,
) -> Result<(Option<SessionData>, Option<User>)> {
    let session_id = derive_lookup_key(token);
    let Some(mut session) = retrieve_session(kv, &session_id).await? else {
        return Ok((None, None));
    };

    if Utc::now() - session.created_at >= Duration::days(RENEW_THRESHOLD_DAYS) {
        let renewed = renew_session(kv, &session_id, session.user_id).await?;
        session.created_at = renewed.created_at;
        tracing::debug!("Renewed session {} for user {}", session_id, session.user_id);
    }

    match users.find_by_id(session.user_id).await? {
        Some(user) => Ok((Some(session), Some(user))),
        None => {
            tracing::warn!(
                "Session {} references missing user {}; invalidating",
                session_id,
                session.user_id
            );
            invalidate_session(kv, &session_id).await?;
            Ok((None, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::crypto::token::generate_session_token;
    use crate::error::AppError;
    use crate::models::user::{AuthProvider, NewUser};

    #[derive(Default)]
    struct FakeKv {
        entries: Mutex<HashMap<String, (String, u64)>>,
    }

    impl FakeKv {
        fn raw(&self, key: &str) -> Option<(String, u64)> {
            self.entries.lock().unwrap().get(key).cloned()
        }

        fn insert_raw(&self, key: &str, value: &str) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), SESSION_TTL_SECONDS));
        }

        fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl KeyValueStore for FakeKv {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.raw(key).map(|(value, _)| value))
        }

        async fn put_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl_seconds));
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeUsers {
        users: Mutex<HashMap<Uuid, User>>,
    }

    impl FakeUsers {
        fn with_user(user_id: Uuid) -> Self {
            let store = Self::default();
            store.users.lock().unwrap().insert(
                user_id,
                User {
                    id: user_id,
                    display_name: "Dot".to_string(),
                    avatar_url: None,
                    provider: AuthProvider::Google,
                    provider_id: "g-1".to_string(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
            );
            store
        }
    }

    #[async_trait]
    impl UserRepository for FakeUsers {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_provider(
            &self,
            _provider: AuthProvider,
            _provider_id: &str,
        ) -> Result<Option<User>> {
            Ok(None)
        }

        async fn create(&self, _new_user: NewUser) -> Result<User> {
            Err(AppError::Internal("not used in these tests".to_string()))
        }

        async fn update_profile(
            &self,
            _id: Uuid,
            _display_name: &str,
            _avatar_url: Option<&str>,
        ) -> Result<Option<User>> {
            Ok(None)
        }
    }

    fn stale_record(user_id: Uuid, age_days: i64) -> String {
        sonic_rs::to_string(&StoredSession {
            user_id,
            created_at: Utc::now() - Duration::days(age_days),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_retrieve_roundtrips() {
        let kv = FakeKv::default();
        let user_id = Uuid::new_v4();
        let token = generate_session_token();

        let created = create_session(&kv, &token, user_id).await.unwrap();
        assert_eq!(created.id, derive_lookup_key(&token));

        let retrieved = retrieve_session(&kv, &created.id).await.unwrap().unwrap();
        assert_eq!(retrieved.user_id, user_id);
        assert_eq!(retrieved.created_at, created.created_at);

        // Records live under the session namespace with the full TTL.
        let (_, ttl) = kv.raw(&format!("session:{}", created.id)).unwrap();
        assert_eq!(ttl, SESSION_TTL_SECONDS);
    }

    #[tokio::test]
    async fn retrieve_absent_returns_none() {
        let kv = FakeKv::default();
        assert!(retrieve_session(&kv, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let kv = FakeKv::default();
        invalidate_session(&kv, "never-existed").await.unwrap();
        invalidate_session(&kv, "never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn renew_twice_leaves_one_record_latest_wins() {
        let kv = FakeKv::default();
        let user_id = Uuid::new_v4();

        let first = renew_session(&kv, "abc", user_id).await.unwrap();
        let second = renew_session(&kv, "abc", user_id).await.unwrap();

        assert_eq!(kv.len(), 1);
        let stored: StoredSession =
            sonic_rs::from_str(&kv.raw("session:abc").unwrap().0).unwrap();
        assert!(second.created_at >= first.created_at);
        assert_eq!(stored.created_at, second.created_at);
    }

    #[tokio::test]
    async fn undecodable_record_is_discarded() {
        let kv = FakeKv::default();
        kv.insert_raw("session:bad", "{not json");

        assert!(retrieve_session(&kv, "bad").await.unwrap().is_none());
        assert!(kv.raw("session:bad").is_none());
    }

    #[tokio::test]
    async fn fresh_session_is_not_renewed() {
        let kv = FakeKv::default();
        let user_id = Uuid::new_v4();
        let users = FakeUsers::with_user(user_id);
        let token = generate_session_token();
        let session_id = derive_lookup_key(&token);
        kv.insert_raw(&format!("session:{}", session_id), &stale_record(user_id, 14));

        let (session, user) = validate_session_token(&kv, &users, &token).await.unwrap();
        let session = session.unwrap();
        assert!(user.is_some());
        // created_at untouched: still ~14 days old.
        assert!(Utc::now() - session.created_at >= Duration::days(13));
    }

    #[tokio::test]
    async fn stale_session_is_renewed_once() {
        let kv = FakeKv::default();
        let user_id = Uuid::new_v4();
        let users = FakeUsers::with_user(user_id);
        let token = generate_session_token();
        let session_id = derive_lookup_key(&token);
        kv.insert_raw(&format!("session:{}", session_id), &stale_record(user_id, 16));

        let (session, _) = validate_session_token(&kv, &users, &token).await.unwrap();
        let session = session.unwrap();
        assert!(Utc::now() - session.created_at < Duration::days(1));

        // The stored record was rewritten in place.
        assert_eq!(kv.len(), 1);
        let stored: StoredSession = sonic_rs::from_str(
            &kv.raw(&format!("session:{}", session_id)).unwrap().0,
        )
        .unwrap();
        assert_eq!(stored.created_at, session.created_at);
    }

    #[tokio::test]
    async fn missing_user_invalidates_dangling_session() {
        let kv = FakeKv::default();
        let users = FakeUsers::default();
        let token = generate_session_token();
        let session_id = derive_lookup_key(&token);
        kv.insert_raw(
            &format!("session:{}", session_id),
            &stale_record(Uuid::new_v4(), 1),
        );

        let (session, user) = validate_session_token(&kv, &users, &token).await.unwrap();
        assert!(session.is_none());
        assert!(user.is_none());
        assert!(kv.raw(&format!("session:{}", session_id)).is_none());
    }
}
