//! Logged-out tokens, remembered until they would have expired anyway.

use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct RevokedTokens {
    // jti -> exp (unix seconds)
    entries: DashMap<Uuid, i64>,
}

impl RevokedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `jti` and drop entries that expired before `now`.
    pub fn revoke(&self, jti: Uuid, exp: i64, now: i64) {
        self.purge_expired(now);
        if exp > now {
            self.entries.insert(jti, exp);
        }
    }

    pub fn is_revoked(&self, jti: Uuid) -> bool {
        self.entries.contains_key(&jti)
    }

    /// Drop expired entries, returning how many went.
    pub fn purge_expired(&self, now: i64) -> usize {
        let mut purged = 0;
        self.entries.retain(|_, exp| {
            let live = *exp > now;
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
