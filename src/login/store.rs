//! In-memory login session store.
//!
//! One lock guards the whole map. Every operation is a short in-memory
//! critical section, and the sweep is O(live sessions), which stays in
//! the thousands. Confirm checks and mutates under the same guard, so the
//! Pending -> Confirmed transition happens at most once per session.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::session::{LoginSession, LoginStatus};
use super::token::{generate_session_id, redact};
use super::LoginError;

/// How long a login session stays valid (seconds).
pub const SESSION_TTL_SECS: i64 = 300; // 5 minutes

/// `user_info` recorded when the confirming device sends none.
pub const DEFAULT_USER_INFO: &str = "User";

/// Path the scanning device opens; the session id rides along as a query parameter.
const CONFIRM_PATH: &str = "/mobile/confirm";

/// Thread-safe store for pending and confirmed login sessions.
///
/// Create one per process and share it (`Arc<LoginSessionStore>`) with
/// every request handler.
pub struct LoginSessionStore {
    sessions: Mutex<HashMap<String, LoginSession>>,
    ttl: chrono::Duration,
    default_user_info: String,
    clock: Arc<dyn Clock>,
}

impl Default for LoginSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginSessionStore {
    /// Empty store on the system clock with the `"User"` placeholder.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::seconds(SESSION_TTL_SECS),
            default_user_info: DEFAULT_USER_INFO.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the placeholder stored when a confirmation carries no user info.
    pub fn with_default_user_info(mut self, placeholder: impl Into<String>) -> Self {
        self.default_user_info = placeholder.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The fixed validity window.
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Mint a new pending session whose confirmation URL hangs off `base_url`.
    ///
    /// Also sweeps every session that has aged out, so cleanup cost rides
    /// on the create path instead of needing a timer.
    pub fn create(&self, base_url: &str) -> Result<LoginSession, LoginError> {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(LoginError::InvalidBaseUrl);
        }

        // Entropy is drawn outside the lock; a failure leaves the store untouched.
        let id = generate_session_id()?;
        let confirmation_url = format!("{base}{CONFIRM_PATH}?sessionId={id}");

        let mut sessions = self.sessions.lock();
        let now = self.clock.now();
        let swept = Self::sweep_locked(&mut sessions, now, self.ttl);

        let session = LoginSession::pending(id.clone(), confirmation_url, now);
        sessions.insert(id.clone(), session.clone());
        let active = sessions.len();
        drop(sessions);

        tracing::info!(
            session = redact(&id),
            swept,
            active,
            "Login session created"
        );
        Ok(session)
    }

    /// Snapshot of a live session, or `None` if unknown or aged out.
    ///
    /// An aged-out session found here is evicted before returning.
    pub fn get(&self, id: &str) -> Option<LoginSession> {
        let mut sessions = self.sessions.lock();
        let now = self.clock.now();

        let expired = sessions.get(id)?.is_expired_at(now, self.ttl);
        if expired {
            Self::evict_locked(&mut sessions, id);
            return None;
        }

        sessions.get(id).cloned()
    }

    /// Confirm a pending session. Returns `false` if the session is unknown,
    /// aged out, or already confirmed.
    ///
    /// `user_info` is stored exactly as supplied. A missing or whitespace-only
    /// value records the configured placeholder instead.
    pub fn confirm(&self, id: &str, user_info: Option<&str>) -> bool {
        let mut sessions = self.sessions.lock();
        let now = self.clock.now();

        let Some(session) = sessions.get_mut(id) else {
            tracing::debug!(session = redact(id), "Confirm for unknown login session");
            return false;
        };

        if session.is_expired_at(now, self.ttl) {
            Self::evict_locked(&mut sessions, id);
            return false;
        }

        if session.status != LoginStatus::Pending {
            tracing::warn!(
                session = redact(id),
                status = %session.status,
                "Rejected repeat confirmation"
            );
            return false;
        }

        let info = user_info
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(self.default_user_info.as_str());

        session.status = LoginStatus::Confirmed;
        session.confirmed_at = Some(now);
        session.user_info = Some(info.to_string());

        tracing::info!(session = redact(id), "Login session confirmed");
        true
    }

    /// Remove every aged-out session. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let now = self.clock.now();
        Self::sweep_locked(&mut sessions, now, self.ttl)
    }

    /// Number of sessions currently held, including any not yet swept.
    pub fn active_count(&self) -> usize {
        self.sessions.lock().len()
    }

    fn sweep_locked(
        sessions: &mut HashMap<String, LoginSession>,
        now: chrono::DateTime<chrono::Utc>,
        ttl: chrono::Duration,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now, ttl));
        before - sessions.len()
    }

    fn evict_locked(sessions: &mut HashMap<String, LoginSession>, id: &str) {
        if let Some(mut session) = sessions.remove(id) {
            session.status = LoginStatus::Expired;
            tracing::debug!(
                session = redact(id),
                status = %session.status,
                "Evicted aged-out login session"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::clock::ManualClock;
    use crate::login::token::SESSION_ID_LEN;
    use chrono::{Duration, Utc};
    use std::collections::HashSet;

    fn store_with_clock() -> (LoginSessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = LoginSessionStore::new().with_clock(clock.clone());
        (store, clock)
    }

    #[test]
    fn ttl_is_five_minutes() {
        assert_eq!(SESSION_TTL_SECS, 300);
        assert_eq!(LoginSessionStore::new().ttl(), Duration::minutes(5));
    }

    #[test]
    fn get_after_create_returns_pending_snapshot() {
        let store = LoginSessionStore::new();
        let created = store.create("http://x").unwrap();

        let fetched = store.get(&created.id).unwrap();
        assert_eq!(fetched.status, LoginStatus::Pending);
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.confirmation_url, created.confirmation_url);
        assert_eq!(fetched.created_at, created.created_at);
        assert!(fetched.confirmed_at.is_none());
        assert!(fetched.user_info.is_none());
    }

    #[test]
    fn confirmation_url_embeds_id() {
        let store = LoginSessionStore::new();
        let session = store.create("https://app.example.com/").unwrap();
        assert_eq!(
            session.confirmation_url,
            format!("https://app.example.com/mobile/confirm?sessionId={}", session.id)
        );
    }

    #[test]
    fn create_rejects_empty_base() {
        let store = LoginSessionStore::new();
        assert!(matches!(store.create(""), Err(LoginError::InvalidBaseUrl)));
        assert!(matches!(store.create("  "), Err(LoginError::InvalidBaseUrl)));
        assert!(matches!(store.create("/"), Err(LoginError::InvalidBaseUrl)));
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let store = LoginSessionStore::new();
        store.create("http://x").unwrap();

        let well_formed = "a".repeat(32);
        let huge = "x".repeat(10_000);
        for id in ["", "nope", "../../etc/passwd", "💥", well_formed.as_str(), huge.as_str()] {
            assert!(store.get(id).is_none());
            assert!(!store.confirm(id, Some("Mallory")));
        }
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn second_confirm_fails_and_keeps_first_winner() {
        let (store, clock) = store_with_clock();
        let session = store.create("http://x").unwrap();

        assert!(store.confirm(&session.id, Some("Alice")));
        let first = store.get(&session.id).unwrap();

        clock.advance(Duration::seconds(10));
        assert!(!store.confirm(&session.id, Some("Bob")));

        let after = store.get(&session.id).unwrap();
        assert_eq!(after.status, LoginStatus::Confirmed);
        assert_eq!(after.user_info.as_deref(), Some("Alice"));
        assert_eq!(after.confirmed_at, first.confirmed_at);
    }

    #[test]
    fn session_older_than_window_is_expired() {
        let (store, clock) = store_with_clock();
        let a = store.create("http://x").unwrap();
        let b = store.create("http://x").unwrap();

        clock.advance(Duration::minutes(5) + Duration::seconds(1));
        assert!(store.get(&a.id).is_none());
        assert!(!store.confirm(&b.id, Some("Alice")));
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn session_just_inside_window_is_valid() {
        let (store, clock) = store_with_clock();
        let a = store.create("http://x").unwrap();
        let b = store.create("http://x").unwrap();

        clock.advance(Duration::minutes(4) + Duration::seconds(59));
        assert_eq!(store.get(&a.id).unwrap().status, LoginStatus::Pending);
        assert!(store.confirm(&b.id, Some("Alice")));
    }

    #[test]
    fn session_at_exact_window_is_still_valid() {
        let (store, clock) = store_with_clock();
        let session = store.create("http://x").unwrap();

        clock.advance(Duration::minutes(5));
        assert!(store.get(&session.id).is_some());
        assert!(store.confirm(&session.id, None));
    }

    #[test]
    fn confirmed_session_still_expires() {
        let (store, clock) = store_with_clock();
        let session = store.create("http://x").unwrap();
        assert!(store.confirm(&session.id, Some("Alice")));

        clock.advance(Duration::minutes(6));
        assert!(store.get(&session.id).is_none());
    }

    #[test]
    fn scenario_create_confirm_get() {
        let store = LoginSessionStore::new();
        let session = store.create("http://x").unwrap();
        assert_eq!(session.id.len(), SESSION_ID_LEN);

        assert!(store.confirm(&session.id, Some("Alice")));

        let fetched = store.get(&session.id).unwrap();
        assert_eq!(fetched.status, LoginStatus::Confirmed);
        assert_eq!(fetched.user_info.as_deref(), Some("Alice"));
        assert!(fetched.confirmed_at.is_some());
    }

    #[test]
    fn scenario_expired_then_confirm_fails() {
        let (store, clock) = store_with_clock();
        let session = store.create("http://x").unwrap();

        clock.advance(Duration::minutes(6));
        assert!(store.get(&session.id).is_none());
        assert!(!store.confirm(&session.id, Some("Bob")));
    }

    #[test]
    fn scenario_blank_user_info_uses_placeholder() {
        let store = LoginSessionStore::new();
        let a = store.create("http://x").unwrap();
        let b = store.create("http://x").unwrap();
        let c = store.create("http://x").unwrap();

        assert!(store.confirm(&a.id, Some("")));
        assert!(store.confirm(&b.id, None));
        assert!(store.confirm(&c.id, Some("   ")));

        for id in [&a.id, &b.id, &c.id] {
            assert_eq!(store.get(id).unwrap().user_info.as_deref(), Some(DEFAULT_USER_INFO));
        }
    }

    #[test]
    fn confirm_keeps_user_info_verbatim() {
        let store = LoginSessionStore::new();
        let session = store.create("http://x").unwrap();

        assert!(store.confirm(&session.id, Some("  Alice  ")));
        assert_eq!(
            store.get(&session.id).unwrap().user_info.as_deref(),
            Some("  Alice  ")
        );
    }

    #[test]
    fn custom_placeholder_is_used() {
        let store = LoginSessionStore::new().with_default_user_info("Guest");
        let session = store.create("http://x").unwrap();
        assert!(store.confirm(&session.id, None));
        assert_eq!(store.get(&session.id).unwrap().user_info.as_deref(), Some("Guest"));
    }

    #[test]
    fn create_sweeps_aged_out_sessions() {
        let (store, clock) = store_with_clock();
        let old = store.create("http://x").unwrap();
        store.create("http://x").unwrap();
        assert_eq!(store.active_count(), 2);

        clock.advance(Duration::minutes(6));
        let fresh = store.create("http://x").unwrap();

        assert_eq!(store.active_count(), 1);
        assert!(store.get(&old.id).is_none());
        assert!(store.get(&fresh.id).is_some());
    }

    #[test]
    fn sweep_expired_counts_removed() {
        let (store, clock) = store_with_clock();
        store.create("http://x").unwrap();
        store.create("http://x").unwrap();
        clock.advance(Duration::minutes(3));
        let young = store.create("http://x").unwrap();

        clock.advance(Duration::minutes(3));
        assert_eq!(store.sweep_expired(), 2);
        assert_eq!(store.active_count(), 1);
        assert!(store.get(&young.id).is_some());
        assert_eq!(store.sweep_expired(), 0);
    }

    #[test]
    fn concurrent_confirms_have_exactly_one_winner() {
        let store = Arc::new(LoginSessionStore::new());
        let session = store.create("http://x").unwrap();

        let results: Vec<(String, bool)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let store = Arc::clone(&store);
                    let id = session.id.clone();
                    scope.spawn(move || {
                        let who = format!("device-{i}");
                        let ok = store.confirm(&id, Some(&who));
                        (who, ok)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<_> = results.iter().filter(|(_, ok)| *ok).collect();
        assert_eq!(winners.len(), 1);

        let stored = store.get(&session.id).unwrap();
        assert_eq!(stored.user_info.as_deref(), Some(winners[0].0.as_str()));
    }

    #[test]
    fn concurrent_creates_are_all_visible() {
        let store = Arc::new(LoginSessionStore::new());

        let ids: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || {
                        (0..250)
                            .map(|_| store.create("http://x").unwrap().id)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 2_000);
        assert_eq!(store.active_count(), 2_000);
        assert!(ids.iter().all(|id| store.get(id).is_some()));
    }
}
