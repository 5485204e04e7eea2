use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::auth::Principal;

struct Session {
    principal: Principal,
    expires_at: Instant,
}

/// In-memory sessions keyed by an opaque token. Expiry slides forward on every lookup.
pub struct SessionManager {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(&self, principal: Principal) -> String {
        let token = Uuid::new_v4().simple().to_string();
        debug!("session created for user_id={}", principal.id);
        self.sessions.write().insert(
            token.clone(),
            Session {
                principal,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    pub fn current_principal(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        let mut sessions = self.sessions.write();

        match sessions.get_mut(token) {
            Some(session) if session.expires_at > now => {
                session.expires_at = now + self.ttl;
                Some(session.principal.clone())
            }
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    /// Drops expired sessions and returns how many went.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }
}
