use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dashmap::DashMap;
use uuid::Uuid;

use crate::services::analysis::Reading;

pub const SESSION_COOKIE: &str = "palm_session";

/// Per-client state: the latest reading and the notices waiting to be shown.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub reading: Option<Reading>,
    pub notices: Vec<String>,
}

/// In-memory session storage keyed by the session cookie.
///
/// Entries are created on first write only; resolving a cookie never
/// allocates.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<Uuid, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session id from the cookie jar, issuing a fresh cookie when missing or
    /// malformed.
    pub fn resolve(&self, jar: CookieJar) -> (CookieJar, Uuid) {
        let existing = jar
            .get(SESSION_COOKIE)
            .and_then(|c| Uuid::parse_str(c.value()).ok());

        if let Some(id) = existing {
            return (jar, id);
        }

        let id = Uuid::new_v4();
        let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        (jar.add(cookie), id)
    }

    pub fn get(&self, id: Uuid) -> Option<SessionState> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut SessionState)) {
        f(&mut self.sessions.entry(id).or_default());
    }

    /// Store the outcome of an analysis, replacing the previous one.
    pub fn set_reading(&self, id: Uuid, reading: Reading) {
        self.update(id, |s| s.reading = Some(reading));
    }

    pub fn push_notice(&self, id: Uuid, notice: impl Into<String>) {
        let notice = notice.into();
        self.update(id, |s| s.notices.push(notice));
    }

    /// Drain pending notices; each one is shown once.
    pub fn take_notices(&self, id: Uuid) -> Vec<String> {
        self.sessions
            .get_mut(&id)
            .map(|mut s| std::mem::take(&mut s.notices))
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(text: &str, image_filename: &str) -> Reading {
        Reading {
            text: text.into(),
            image_filename: image_filename.into(),
        }
    }

    #[test]
    fn test_resolve_issues_cookie_once() {
        let store = SessionStore::new();
        let (jar, id) = store.resolve(CookieJar::new());
        assert_eq!(jar.get(SESSION_COOKIE).unwrap().value(), id.to_string());

        let (_, again) = store.resolve(jar);
        assert_eq!(again, id);
    }

    #[test]
    fn test_resolve_does_not_allocate() {
        let store = SessionStore::new();
        let (jar, id) = store.resolve(CookieJar::new());
        store.resolve(jar);

        assert_eq!(store.session_count(), 0);
        assert!(store.get(id).is_none());
        assert!(store.take_notices(id).is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_well_formed_cookie_is_kept_after_restart() {
        let store = SessionStore::new();
        let earlier = Uuid::new_v4();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, earlier.to_string()));

        let (_, id) = store.resolve(jar);
        assert_eq!(id, earlier);
        assert!(store.get(id).is_none());
    }

    #[test]
    fn test_malformed_cookie_gets_new_id() {
        let store = SessionStore::new();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "not-a-uuid"));

        let (jar, id) = store.resolve(jar);
        assert_eq!(jar.get(SESSION_COOKIE).unwrap().value(), id.to_string());
    }

    #[test]
    fn test_notices_are_taken_once() {
        let store = SessionStore::new();
        let (_, id) = store.resolve(CookieJar::new());
        store.push_notice(id, "No selected file");

        assert_eq!(store.take_notices(id), vec!["No selected file".to_string()]);
        assert!(store.take_notices(id).is_empty());
    }

    #[test]
    fn test_reading_is_overwritten() {
        let store = SessionStore::new();
        let (_, id) = store.resolve(CookieJar::new());
        store.set_reading(id, reading("first", "a.png"));
        store.set_reading(id, reading("second", "b.png"));

        let state = store.get(id).unwrap();
        assert_eq!(state.reading, Some(reading("second", "b.png")));
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        let (_, a) = store.resolve(CookieJar::new());
        let (_, b) = store.resolve(CookieJar::new());
        store.set_reading(a, reading("mine", "a.png"));

        assert!(store.get(b).is_none());
    }
}
