//! Explicit user sessions with a sliding expiration.
//!
//! A [`Session`] is handed to every orchestrator call instead of living in
//! ambient global state. Expiry is the pure function [`is_expired`]; callers
//! run [`Session::touch`] before invoking a core operation, which either
//! slides the deadline forward or reports [`Error::SessionExpired`].
//!
//! The HTTP server keeps its sessions in a [`SessionRegistry`] keyed by
//! opaque bearer tokens.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::User;
use crate::traits::IdentityResolver;
use crate::users;

/// Sliding-expiration policy.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub timeout: Duration,
}

impl SessionPolicy {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            timeout: Duration::seconds(secs as i64),
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from_secs(1800)
    }
}

/// True once more than `timeout` has elapsed since `login_time`.
pub fn is_expired(now: DateTime<Utc>, login_time: DateTime<Utc>, timeout: Duration) -> bool {
    now.signed_duration_since(login_time) > timeout
}

/// An authenticated user's session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub name: String,
    /// Last observed activity; reset on every successful [`touch`](Session::touch).
    pub login_time: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            name: String::new(),
            login_time: now,
        }
    }

    pub fn for_user(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
            login_time: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, policy: &SessionPolicy) -> bool {
        is_expired(now, self.login_time, policy.timeout)
    }

    /// Record activity at `now`, extending the deadline.
    pub fn touch(&mut self, now: DateTime<Utc>, policy: &SessionPolicy) -> Result<()> {
        if self.is_expired(now, policy) {
            return Err(Error::SessionExpired);
        }
        self.login_time = now;
        Ok(())
    }
}

/// Resolve an authorization code into a fresh session.
///
/// Creates the user on first sight of the email; later logins refresh the
/// display fields.
pub async fn login(
    resolver: &dyn IdentityResolver,
    pool: &SqlitePool,
    auth_code: &str,
    now: DateTime<Utc>,
) -> Result<Session> {
    if auth_code.trim().is_empty() {
        return Err(Error::Auth("authorization code must not be empty".to_string()));
    }
    let identity = resolver.resolve(auth_code).await?;
    let user = users::find_or_create(pool, &identity).await?;
    info!(user_id = %user.id, "user signed in");
    Ok(Session::for_user(&user, now))
}

/// Bearer-token session table used by the HTTP server.
pub struct SessionRegistry {
    policy: SessionPolicy,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            policy,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a session and return its token.
    ///
    /// Sessions that expired by the new session's login time are dropped
    /// first, so tokens nobody presents again do not accumulate.
    pub fn open(&self, session: Session) -> String {
        let token = Uuid::new_v4().to_string();
        let mut sessions = self.lock();
        let purged = purge_expired(&mut sessions, session.login_time, &self.policy);
        if purged > 0 {
            debug!(purged, "expired sessions removed");
        }
        sessions.insert(token.clone(), session);
        token
    }

    /// Validate `token` at `now`, sliding its deadline.
    ///
    /// Expired sessions are removed and reported as `SessionExpired`; unknown
    /// tokens as `Unauthenticated`.
    pub fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Result<Session> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(token).ok_or(Error::Unauthenticated)?;
        match session.touch(now, &self.policy) {
            Ok(()) => Ok(session.clone()),
            Err(e) => {
                sessions.remove(token);
                Err(e)
            }
        }
    }

    pub fn close(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Drop every session that has expired by `now`. Returns how many.
fn purge_expired(
    sessions: &mut HashMap<String, Session>,
    now: DateTime<Utc>,
    policy: &SessionPolicy,
) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| !s.is_expired(now, policy));
    before - sessions.len()
}
