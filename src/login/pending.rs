//! Pending MFA continuations.
//!
//! A pending login links a password-verified attempt to its eventual MFA
//! completion. Entries live in process memory with their own TTL and are
//! created/consumed atomically under one lock; an expired entry is simply
//! treated as absent on the next lookup. Failed code submissions count
//! against a per-entry cap, after which the entry is dropped and the user
//! must restart login.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// What a completed MFA submission needs to finish the login.
#[derive(Clone, Debug)]
pub struct PendingLogin {
    pub user_id: Uuid,
    pub remember_me: bool,
    pub return_to: Option<String>,
}

struct PendingEntry {
    login: PendingLogin,
    failed_attempts: u32,
    created_at: Instant,
}

pub struct PendingMfaStore {
    ttl: Duration,
    max_failed_attempts: u32,
    entries: Mutex<HashMap<Uuid, PendingEntry>>,
}

impl PendingMfaStore {
    #[must_use]
    pub fn new(ttl: Duration, max_failed_attempts: u32) -> Self {
        Self {
            ttl,
            max_failed_attempts: max_failed_attempts.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Park a login attempt and return its continuation key.
    pub async fn create(&self, login: PendingLogin) -> Uuid {
        let pending_id = Uuid::new_v4();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        entries.insert(
            pending_id,
            PendingEntry {
                login,
                failed_attempts: 0,
                created_at: Instant::now(),
            },
        );
        pending_id
    }

    /// Look up a pending login without consuming it.
    pub async fn get(&self, pending_id: Uuid) -> Option<PendingLogin> {
        let entries = self.entries.lock().await;
        entries
            .get(&pending_id)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.login.clone())
    }

    /// Remove and return a pending login, if still live.
    pub async fn consume(&self, pending_id: Uuid) -> Option<PendingLogin> {
        let mut entries = self.entries.lock().await;
        let entry = entries.remove(&pending_id)?;
        if entry.created_at.elapsed() < self.ttl {
            Some(entry.login)
        } else {
            None
        }
    }

    /// Count a failed code submission; the entry is dropped at the cap so
    /// the next submission maps to an expired-session outcome.
    pub async fn record_failure(&self, pending_id: Uuid) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&pending_id) {
            entry.failed_attempts += 1;
            if entry.failed_attempts >= self.max_failed_attempts {
                entries.remove(&pending_id);
            }
        }
    }
}
