//! One-time codes handed to the browser after a Google login.
//!
//! The callback redirect carries a short random code instead of the bearer
//! token, so the token never lands in browser history or referrers. The
//! frontend trades the code for the token exactly once.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};

use super::dto::AuthResponse;

pub const HANDOFF_TTL: Duration = Duration::from_secs(60);
const CODE_LEN: usize = 32;

struct Pending {
    response: AuthResponse,
    expires_at: Instant,
}

pub struct HandoffStore {
    ttl: Duration,
    pending: Mutex<HashMap<String, Pending>>,
}

impl Default for HandoffStore {
    fn default() -> Self {
        Self::with_ttl(HANDOFF_TTL)
    }
}

impl HandoffStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Parks `response` and returns the code that redeems it.
    pub fn issue(&self, response: AuthResponse) -> String {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CODE_LEN)
            .map(char::from)
            .collect();
        let now = Instant::now();
        let mut pending = self.pending.lock();
        pending.retain(|_, p| p.expires_at > now);
        pending.insert(
            code.clone(),
            Pending {
                response,
                expires_at: now + self.ttl,
            },
        );
        code
    }

    /// Removes and returns the parked response. Unknown, used or expired codes yield `None`.
    pub fn redeem(&self, code: &str) -> Option<AuthResponse> {
        let entry = self.pending.lock().remove(code)?;
        (entry.expires_at > Instant::now()).then_some(entry.response)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
