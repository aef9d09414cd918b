use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::oauth::TokenSet;

pub const CLOUD_ID_KEY: &str = "jira.oauth.cloud_id";
pub const ACCESS_TOKEN_KEY: &str = "jira.oauth.access_token";
pub const REFRESH_TOKEN_KEY: &str = "jira.oauth.refresh_token";
pub const EXPIRES_KEY: &str = "jira.oauth.expires";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage failed: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Key/value storage scoped to one user session.
pub trait SessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn put(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn forget(&self, key: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self
            .values
            .lock()
            .expect("session mutex poisoned")
            .get(key)
            .cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.values
            .lock()
            .expect("session mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<(), SessionError> {
        self.values
            .lock()
            .expect("session mutex poisoned")
            .remove(key);
        Ok(())
    }
}

/// SQLite-backed session. Values older than `duration` read as absent and are
/// purged on access.
#[derive(Debug)]
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    session: String,
    duration: Duration,
}

impl SqliteSessionStore {
    pub fn open(path: &Path, session: &str, duration: Duration) -> Result<Self, SessionError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS session_values (
  session TEXT NOT NULL,
  key TEXT NOT NULL,
  value TEXT NOT NULL,
  stored_at INTEGER NOT NULL,
  PRIMARY KEY (session, key)
);
",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            session: session.to_string(),
            duration,
        })
    }

    fn is_expired(&self, stored_at: i64, now: i64) -> bool {
        let age = now.saturating_sub(stored_at);
        age < 0 || age as u64 >= self.duration.as_secs()
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let conn = self.conn.lock().expect("session db mutex poisoned");
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT value, stored_at FROM session_values WHERE session = ?1 AND key = ?2",
                params![self.session, key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((value, stored_at)) if !self.is_expired(stored_at, now()) => Ok(Some(value)),
            Some(_) => {
                conn.execute(
                    "DELETE FROM session_values WHERE session = ?1 AND key = ?2",
                    params![self.session, key],
                )?;
                tracing::debug!(session = %self.session, key, "expired session value purged");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let conn = self.conn.lock().expect("session db mutex poisoned");
        conn.execute(
            "
INSERT INTO session_values(session, key, value, stored_at)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(session, key) DO UPDATE SET
  value = excluded.value,
  stored_at = excluded.stored_at
",
            params![self.session, key, value, now()],
        )?;
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<(), SessionError> {
        let conn = self.conn.lock().expect("session db mutex poisoned");
        conn.execute(
            "DELETE FROM session_values WHERE session = ?1 AND key = ?2",
            params![self.session, key],
        )?;
        Ok(())
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn save_tokens(store: &dyn SessionStore, tokens: &TokenSet) -> Result<(), SessionError> {
    put_or_forget(store, CLOUD_ID_KEY, tokens.cloud_id.as_deref())?;
    store.put(ACCESS_TOKEN_KEY, &tokens.access_token)?;
    put_or_forget(store, REFRESH_TOKEN_KEY, tokens.refresh_token.as_deref())?;
    put_or_forget(
        store,
        EXPIRES_KEY,
        tokens.expires.map(|at| at.to_string()).as_deref(),
    )
}

/// Tokens previously stored with [`save_tokens`]; `None` without an access token.
pub fn load_tokens(store: &dyn SessionStore) -> Result<Option<TokenSet>, SessionError> {
    let Some(access_token) = store.get(ACCESS_TOKEN_KEY)? else {
        return Ok(None);
    };

    Ok(Some(TokenSet {
        cloud_id: store.get(CLOUD_ID_KEY)?,
        access_token,
        refresh_token: store.get(REFRESH_TOKEN_KEY)?,
        expires: store
            .get(EXPIRES_KEY)?
            .and_then(|raw| raw.parse::<i64>().ok()),
    }))
}

pub fn clear_tokens(store: &dyn SessionStore) -> Result<(), SessionError> {
    for key in [CLOUD_ID_KEY, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, EXPIRES_KEY] {
        store.forget(key)?;
    }
    Ok(())
}

fn put_or_forget(
    store: &dyn SessionStore,
    key: &str,
    value: Option<&str>,
) -> Result<(), SessionError> {
    match value {
        Some(value) => store.put(key, value),
        None => store.forget(key),
    }
}
