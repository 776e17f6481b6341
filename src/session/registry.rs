// src/session/registry.rs
//
// The only state shared between sessions: who is being monitored right now.
// Entries are held by a SessionGuard and disappear when the guard drops,
// whether the session terminated, disconnected or failed.

use crate::error::SessionError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionKey {
    pub student_id: String,
    pub exam_id: String,
}

impl SessionKey {
    pub fn new(student_id: impl Into<String>, exam_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            exam_id: exam_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Monitoring,
    Terminated,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEntry {
    pub student_id: String,
    pub exam_id: String,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionKey, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Fails while another session holds it.
    pub fn register(&self, key: SessionKey) -> Result<SessionGuard, SessionError> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(&key) {
            return Err(SessionError::AlreadyActive {
                student_id: key.student_id,
                exam_id: key.exam_id,
            });
        }

        sessions.insert(
            key.clone(),
            SessionEntry {
                student_id: key.student_id.clone(),
                exam_id: key.exam_id.clone(),
                started_at: Utc::now(),
                status: SessionStatus::Monitoring,
            },
        );
        Ok(SessionGuard {
            registry: self.clone(),
            key,
        })
    }

    pub fn set_status(&self, key: &SessionKey, status: SessionStatus) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = sessions.get_mut(key) {
            entry.status = status;
        }
    }

    pub fn get(&self, key: &SessionKey) -> Option<SessionEntry> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(key).cloned()
    }

    /// Every registered session, oldest first
    pub fn active_sessions(&self) -> Vec<SessionEntry> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<SessionEntry> = sessions.values().cloned().collect();
        entries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        entries
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &SessionKey) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.remove(key).is_some() {
            debug!("Released session {}/{}", key.student_id, key.exam_id);
        }
    }
}

/// Registration handle; dropping it removes the registry entry.
#[derive(Debug)]
pub struct SessionGuard {
    registry: SessionRegistry,
    key: SessionKey,
}

impl SessionGuard {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn set_status(&self, status: SessionStatus) {
        self.registry.set_status(&self.key, status);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}
