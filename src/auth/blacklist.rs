//! Revoked access tokens.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use time::OffsetDateTime;

/// Access tokens that were revoked before they expired, keyed by their `jti`.
///
/// An entry only needs to live as long as the token it revokes, so entries
/// are kept with the token's expiry and dropped by [AccessTokenBlacklist::prune].
#[derive(Debug, Clone, Default)]
pub struct AccessTokenBlacklist {
    entries: Arc<RwLock<HashMap<String, OffsetDateTime>>>,
}

impl AccessTokenBlacklist {
    /// Revoke the token with the ID `jti` until `expires_at`.
    pub fn insert(&self, jti: &str, expires_at: OffsetDateTime) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(jti.to_owned(), expires_at);
    }

    /// Whether the token with the ID `jti` has been revoked.
    pub fn contains(&self, jti: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(jti)
    }

    /// Drop the entries for tokens that expired at or before `now`.
    ///
    /// Returns the number of entries dropped.
    pub fn prune(&self, now: OffsetDateTime) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);

        before - entries.len()
    }

    /// The number of revoked tokens.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no tokens are revoked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use super::AccessTokenBlacklist;

    #[test]
    fn inserted_token_is_contained() {
        let blacklist = AccessTokenBlacklist::default();

        blacklist.insert("abc", OffsetDateTime::now_utc() + Duration::minutes(15));

        assert!(blacklist.contains("abc"));
        assert!(!blacklist.contains("def"));
    }

    #[test]
    fn clones_share_entries() {
        let blacklist = AccessTokenBlacklist::default();
        let clone = blacklist.clone();

        clone.insert("abc", OffsetDateTime::now_utc() + Duration::minutes(15));

        assert!(blacklist.contains("abc"));
    }

    #[test]
    fn prune_drops_only_expired_entries() {
        let blacklist = AccessTokenBlacklist::default();
        let now = OffsetDateTime::now_utc();
        blacklist.insert("old", now - Duration::seconds(1));
        blacklist.insert("live", now + Duration::minutes(5));

        assert_eq!(blacklist.prune(now), 1);
        assert_eq!(blacklist.len(), 1);
        assert!(blacklist.contains("live"));
        assert!(!blacklist.contains("old"));
    }

    #[test]
    fn new_blacklist_is_empty() {
        assert!(AccessTokenBlacklist::default().is_empty());
    }
}
