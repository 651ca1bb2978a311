//! Session title resolution with an in-memory cache.
//!
//! Every notification carries a human-readable session title, but the title
//! is not always present on the event itself. The resolver answers from its
//! cache first (the common path; avoids a round trip per event), falls back
//! to a single external lookup, and degrades to a fixed default title on
//! any failure. Failed lookups are never cached, so a later event for the
//! same session retries instead of sticking with the fallback forever.
//!
//! The cache is append/update-only for the life of the process. There is no
//! eviction: a long-lived host touching many sessions grows it without
//! bound, and a re-lookup never happens once an id is cached. That is the
//! intended observable behavior; see DESIGN.md before adding a TTL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chime_protocol::SessionInfo;

/// Title used whenever no better one is known.
pub const DEFAULT_SESSION_TITLE: &str = "Agent session";

/// Last-known display data for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub title: String,
    pub parent_id: Option<String>,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            title: DEFAULT_SESSION_TITLE.to_string(),
            parent_id: None,
        }
    }
}

/// What an external lookup returns on success. Both fields are optional;
/// a missing title still counts as success and is cached with the default.
#[derive(Debug, Clone, Default)]
pub struct LookedUpSession {
    pub title: Option<String>,
    pub parent_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("session lookup failed: {0}")]
pub struct LookupError(pub String);

/// External session-info collaborator. Any rejection is treated the same
/// as "not found".
#[async_trait]
pub trait SessionLookup: Send + Sync {
    async fn fetch(&self, session_id: &str) -> Result<LookedUpSession, LookupError>;
}

pub struct TitleResolver {
    cache: Mutex<HashMap<String, SessionRecord>>,
    lookup: Option<Arc<dyn SessionLookup>>,
}

impl TitleResolver {
    pub fn new(lookup: Option<Arc<dyn SessionLookup>>) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            lookup,
        }
    }

    /// Opportunistic cache population from a `session_info_updated` event.
    pub fn record_info(&self, info: &SessionInfo) {
        if info.id.trim().is_empty() {
            return;
        }
        let record = SessionRecord {
            title: normalize_title(info.title.clone()),
            parent_id: info.parent_id.clone(),
        };
        self.store(&info.id, record);
    }

    /// Resolve a display title for a session.
    ///
    /// No id means no I/O: the default record comes back immediately. A
    /// cache hit is returned verbatim. A miss performs at most one external
    /// lookup; only a successful lookup is cached.
    pub async fn resolve(&self, session_id: Option<&str>) -> SessionRecord {
        let Some(id) = session_id.filter(|id| !id.trim().is_empty()) else {
            return SessionRecord::default();
        };

        if let Some(record) = self.cached(id) {
            return record;
        }

        let Some(lookup) = self.lookup.as_ref() else {
            return SessionRecord::default();
        };

        match lookup.fetch(id).await {
            Ok(found) => {
                let record = SessionRecord {
                    title: normalize_title(found.title),
                    parent_id: found.parent_id,
                };
                tracing::debug!(session_id = %id, title = %record.title, "Cached session info from lookup");
                self.store(id, record.clone());
                record
            }
            Err(err) => {
                tracing::debug!(session_id = %id, error = %err, "Session lookup failed; using default title");
                SessionRecord::default()
            }
        }
    }

    fn cached(&self, session_id: &str) -> Option<SessionRecord> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(session_id).cloned())
    }

    fn store(&self, session_id: &str, record: SessionRecord) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(session_id.to_string(), record);
        }
    }
}

fn normalize_title(title: Option<String>) -> String {
    match title {
        Some(title) if !title.trim().is_empty() => title,
        _ => DEFAULT_SESSION_TITLE.to_string(),
    }
}
