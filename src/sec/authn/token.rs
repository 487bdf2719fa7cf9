use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use data_encoding::HEXLOWER;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error;
use crate::time::Clock;

pub const TOKEN_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error(transparent)]
    Rand(#[from] rand::Error),
}

impl From<TokenError> for error::Error {
    fn from(err: TokenError) -> Self {
        error::Error::new()
            .context("failed to generate token")
            .source(err)
    }
}

/// produces the opaque values handed out as tokens. collisions are never
/// checked for
pub trait TokenSource: std::fmt::Debug + Send + Sync {
    fn generate(&self) -> Result<String, TokenError>;
}

#[derive(Debug, Default)]
pub struct OsTokens;

impl TokenSource for OsTokens {
    fn generate(&self) -> Result<String, TokenError> {
        let mut bytes = [0u8; TOKEN_BYTES];

        OsRng.try_fill_bytes(&mut bytes)?;

        Ok(HEXLOWER.encode(&bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant<T> {
    pub payload: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> Grant<T> {
    #[inline]
    fn expired(&self, now: &DateTime<Utc>) -> bool {
        *now > self.expires_at
    }
}

/// payload for grants tied to the email they were mailed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailBound {
    pub user_id: acct_lib::ids::UserId,
    pub email: String,
}

/// token -> payload table with lazy expiry. an expired grant is reported
/// as missing and removed on the access that notices it
#[derive(Debug)]
pub struct TokenStore<T> {
    name: &'static str,
    entries: RwLock<HashMap<String, Grant<T>>>,
    clock: Arc<dyn Clock>,
}

impl<T> TokenStore<T>
where
    T: Clone
{
    pub fn new(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        tracing::debug!(store = name, "creating TokenStore");

        TokenStore {
            name,
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Grant<T>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Grant<T>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(token: &str) -> Option<&str> {
        let trimmed = token.trim();

        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn put(&self, token: String, payload: T, ttl: Duration) -> DateTime<Utc> {
        let expires_at = self.clock.now() + ttl;

        self.write().insert(token, Grant {
            payload,
            expires_at,
        });

        expires_at
    }

    /// generates a fresh token from the source and stores the payload under it
    pub fn issue(
        &self,
        source: &dyn TokenSource,
        payload: T,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let token = source.generate()?;
        let expires_at = self.put(token.clone(), payload, ttl);

        Ok((token, expires_at))
    }

    pub fn get(&self, token: &str) -> Option<Grant<T>> {
        let key = Self::key(token)?;
        let now = self.clock.now();

        {
            let entries = self.read();

            match entries.get(key) {
                Some(grant) if !grant.expired(&now) => return Some(grant.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        self.evict(key, &now);

        None
    }

    /// a refreshed grant expires `ttl` from now. an already expired grant
    /// is evicted instead
    pub fn refresh(&self, token: &str, ttl: Duration) -> Option<Grant<T>> {
        let key = Self::key(token)?;
        let now = self.clock.now();
        let mut entries = self.write();

        let grant = entries.get_mut(key)?;

        if grant.expired(&now) {
            entries.remove(key);

            tracing::debug!(store = self.name, "evicted expired token on refresh");

            return None;
        }

        grant.expires_at = now + ttl;

        Some(grant.clone())
    }

    pub fn delete(&self, token: &str) -> Option<Grant<T>> {
        let key = Self::key(token)?;

        self.write().remove(key)
    }

    /// removes the grant and hands it back if it was still valid. of any
    /// number of concurrent callers at most one receives the grant
    pub fn take(&self, token: &str) -> Option<Grant<T>> {
        let key = Self::key(token)?;
        let now = self.clock.now();
        let grant = self.write().remove(key)?;

        if grant.expired(&now) {
            tracing::debug!(store = self.name, "evicted expired token on take");

            None
        } else {
            Some(grant)
        }
    }

    /// puts a taken grant back under its token with the original expiry.
    /// nothing happens if the token was reissued in the meantime
    pub fn restore(&self, token: &str, grant: Grant<T>) {
        let Some(key) = Self::key(token) else {
            return;
        };

        self.write().entry(key.to_owned()).or_insert(grant);
    }

    pub fn delete_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&T) -> bool
    {
        let mut entries = self.write();
        let before = entries.len();

        entries.retain(|_, grant| !predicate(&grant.payload));

        before - entries.len()
    }

    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();

        entries.retain(|_, grant| !grant.expired(&now));

        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn evict(&self, key: &str, now: &DateTime<Utc>) {
        let mut entries = self.write();

        // another caller may have refreshed or replaced it since the read
        let still_expired = entries.get(key)
            .map(|grant| grant.expired(now))
            .unwrap_or(false);

        if still_expired {
            entries.remove(key);

            tracing::debug!(store = self.name, "evicted expired token");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::time::ManualClock;

    fn store() -> (TokenStore<String>, Arc<ManualClock>) {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));

        (TokenStore::new("test", clock.clone()), clock)
    }

    #[test]
    fn os_tokens_are_hex() {
        let first = OsTokens.generate().unwrap();
        let second = OsTokens.generate().unwrap();

        assert_eq!(first.len(), TOKEN_BYTES * 2);
        assert!(first.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()), "{first}");
        assert_ne!(first, second, "two tokens matched");
    }

    #[test]
    fn put_then_get() {
        let (store, clock) = store();

        let expires_at = store.put("abc".into(), "alice".into(), Duration::minutes(10));

        assert_eq!(expires_at, clock.now() + Duration::minutes(10));

        let grant = store.get(" abc ").expect("grant should be found");

        assert_eq!(grant.payload, "alice");
        assert_eq!(grant.expires_at, expires_at);
        assert!(store.get("").is_none(), "empty token matched");
    }

    #[test]
    fn already_expired_is_missing_and_evicted() {
        let (store, _clock) = store();

        store.put("abc".into(), "alice".into(), Duration::seconds(-1));

        assert_eq!(store.len(), 1);
        assert!(store.get("abc").is_none(), "expired grant was returned");
        assert_eq!(store.len(), 0, "expired grant was not evicted");
        assert!(store.get("abc").is_none(), "evicted grant came back");
    }

    #[test]
    fn expiry_is_inclusive() {
        let (store, clock) = store();

        store.put("abc".into(), "alice".into(), Duration::seconds(30));

        clock.advance(Duration::seconds(30));

        assert!(store.get("abc").is_some(), "grant at its expiry instant should be valid");

        clock.advance(Duration::seconds(1));

        assert!(store.get("abc").is_none(), "grant past expiry was returned");
    }

    #[test]
    fn refresh_extends_but_never_revives() {
        let (store, clock) = store();

        store.put("abc".into(), "alice".into(), Duration::minutes(10));

        clock.advance(Duration::minutes(9));

        let refreshed = store.refresh("abc", Duration::minutes(10)).unwrap();

        assert_eq!(refreshed.expires_at, clock.now() + Duration::minutes(10));

        clock.advance(Duration::minutes(9));

        assert!(store.get("abc").is_some(), "refreshed grant expired early");

        clock.advance(Duration::minutes(2));

        assert!(store.refresh("abc", Duration::minutes(10)).is_none(), "expired grant was revived");
        assert!(store.is_empty(), "expired grant was kept");
    }

    #[test]
    fn take_hands_out_once() {
        let (store, clock) = store();

        store.put("abc".into(), "alice".into(), Duration::minutes(10));

        let grant = store.take(" abc ").expect("grant should be taken");

        assert_eq!(grant.payload, "alice");
        assert!(store.take("abc").is_none(), "grant was taken twice");
        assert!(store.get("abc").is_none(), "taken grant is still stored");

        store.restore("abc", grant.clone());

        assert_eq!(store.get("abc"), Some(grant));

        store.put("late".into(), "bob".into(), Duration::seconds(5));
        clock.advance(Duration::seconds(6));

        assert!(store.take("late").is_none(), "expired grant was taken");
        assert_eq!(store.len(), 1, "expired grant was not evicted");
    }

    #[test]
    fn restore_keeps_newer_grant() {
        let (store, _clock) = store();

        store.put("abc".into(), "alice".into(), Duration::minutes(10));

        let taken = store.take("abc").unwrap();

        store.put("abc".into(), "bob".into(), Duration::minutes(10));
        store.restore("abc", taken);

        assert_eq!(store.get("abc").unwrap().payload, "bob");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_take_has_one_winner() {
        let (store, _clock) = store();
        let store = Arc::new(store);

        store.put("abc".into(), "alice".into(), Duration::minutes(10));

        let mut handles = Vec::new();

        for _ in 0..8 {
            let store = store.clone();

            handles.push(tokio::spawn(async move {
                store.take("abc").is_some()
            }));
        }

        let mut winners = 0;

        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
    }

    #[test]
    fn delete_where_matches_payload() {
        let (store, _clock) = store();

        store.put("a".into(), "alice".into(), Duration::minutes(10));
        store.put("b".into(), "bob".into(), Duration::minutes(10));
        store.put("c".into(), "alice".into(), Duration::minutes(10));

        assert_eq!(store.delete_where(|payload| payload == "alice"), 2);
        assert!(store.get("b").is_some(), "unrelated grant removed");
        assert!(store.get("a").is_none() && store.get("c").is_none());
        assert!(store.delete("b").is_some());
        assert!(store.delete("b").is_none(), "delete is not idempotent");
    }

    #[test]
    fn purge_counts_expired() {
        let (store, clock) = store();

        store.put("a".into(), "alice".into(), Duration::minutes(1));
        store.put("b".into(), "bob".into(), Duration::minutes(10));

        clock.advance(Duration::minutes(5));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
