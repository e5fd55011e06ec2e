// Keyed session store for the upload -> review -> finalize flow.
//
// Uploads park their OCR regions and translations here under a random id;
// finalize looks the session up by id instead of trusting client-supplied
// geometry. Entries expire after a TTL and a background sweeper reclaims
// them; lookups also evict lazily so an expired session is never served.

use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::core::errors::SessionError;
use crate::core::types::Region;
use crate::translation::DocumentTranslation;

#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub image: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub regions: Arc<Vec<Region>>,
    pub translation: Arc<DocumentTranslation>,
    pub target_language: String,
    created_at: Instant,
}

impl Session {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn insert(
        &self,
        image: Arc<Vec<u8>>,
        width: u32,
        height: u32,
        regions: Arc<Vec<Region>>,
        translation: Arc<DocumentTranslation>,
        target_language: String,
    ) -> String {
        let id = generate_id();
        let session = Session {
            id: id.clone(),
            image,
            width,
            height,
            regions,
            translation,
            target_language,
            created_at: Instant::now(),
        };
        self.sessions.insert(id.clone(), session);
        debug!("Created session {} ({} live)", id, self.sessions.len());
        id
    }

    /// Fetch a session, evicting it first if its TTL has lapsed.
    pub fn get(&self, id: &str) -> Result<Session, SessionError> {
        let expired = match self.sessions.get(id) {
            Some(entry) => entry.is_expired(self.ttl),
            None => return Err(SessionError::NotFound(id.to_string())),
        };
        if expired {
            self.sessions.remove(id);
            debug!("Session {} expired on access", id);
            return Err(SessionError::NotFound(id.to_string()));
        }
        // Entry can only disappear here via a concurrent sweep, which
        // means it was expired anyway.
        self.sessions
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every expired session. Returns the number evicted.
    pub fn sweep(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(self.ttl));
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            info!("Swept {} expired sessions ({} live)", evicted, self.sessions.len());
        }
        evicted
    }
}

fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| {
            let nibble: u8 = rng.gen_range(0..16);
            char::from_digit(nibble as u32, 16).unwrap()
        })
        .collect()
}
