//! The store state container: one authoritative in-memory state with
//! observer notification and best-effort durable persistence.
//!
//! Every mutation builds a new immutable snapshot, swaps the shared
//! reference, notifies subscribers synchronously, then enqueues the affected
//! slices for persistence. The in-memory state is the source of truth for
//! the running process; durability is best-effort and failures are only
//! logged.

use crate::error::Result;
use crate::persist::PersistQueue;
use crate::storage::KvStorage;
use crate::subscriptions::{SubscriptionId, SubscriptionManager};
use crate::types::{
    ClimbEntry, EntryInput, RecentGymVisit, Session, Settings, SettingsPatch, Timestamp,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Persisted slice keys.
const SESSIONS_KEY: &str = "climblog_sessions";
const ACTIVE_SESSION_KEY: &str = "climblog_active_session";
const SETTINGS_KEY: &str = "climblog_settings";
const FAVORITES_KEY: &str = "climblog_favorites";
const RECENT_GYMS_KEY: &str = "climblog_recent_gyms";

/// Hard cap on the recent-gym list.
const RECENT_GYMS_CAP: usize = 10;

/// Placeholder user id; there is exactly one local user.
const LOCAL_USER_ID: &str = "local-user";

/// Current persisted payload version.
const SLICE_VERSION: u32 = 1;

/// Versioned envelope around each persisted slice.
///
/// Older installs persisted the bare payload; the load path accepts both.
#[derive(Serialize, Deserialize)]
struct VersionedSlice<T> {
    version: u32,
    data: T,
}

/// Immutable snapshot of the whole store.
///
/// Readers holding an old snapshot see consistent (if stale) data; no
/// snapshot is ever mutated in place.
#[derive(Clone, Debug)]
pub struct StoreState {
    /// Completed sessions, most recent first.
    pub sessions: Vec<Session>,
    /// The at-most-one ongoing session.
    pub active_session: Option<Session>,
    pub settings: Settings,
    /// Favorited gym ids, insertion-ordered, unique.
    pub favorites: Vec<String>,
    /// Most-recently-visited gyms, capped at [`RECENT_GYMS_CAP`].
    pub recent_gyms: Vec<RecentGymVisit>,
    /// False until the initial load has run.
    pub is_loaded: bool,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            active_session: None,
            settings: Settings::default(),
            favorites: Vec::new(),
            recent_gyms: Vec::new(),
            is_loaded: false,
        }
    }
}

/// The climb log store.
pub struct ClimbStore {
    state: RwLock<Arc<StoreState>>,
    storage: Arc<dyn KvStorage>,
    queue: PersistQueue,
    subscriptions: SubscriptionManager,
    id_counter: AtomicU64,
}

impl ClimbStore {
    /// Create a store over the given storage backend.
    ///
    /// The store starts empty and not loaded; call [`load`](Self::load)
    /// before serving data-dependent reads.
    pub fn new(storage: Arc<dyn KvStorage>) -> Self {
        Self {
            state: RwLock::new(Arc::new(StoreState::default())),
            storage: Arc::clone(&storage),
            queue: PersistQueue::new(storage),
            subscriptions: SubscriptionManager::new(),
            id_counter: AtomicU64::new(1),
        }
    }

    // --- Load ---

    /// Populate state from storage.
    ///
    /// Each slice independently falls back to its default when absent,
    /// unreadable, or unparseable. `is_loaded` flips to true even on total
    /// failure so consumers are never stuck waiting. Subscribers are
    /// notified exactly once.
    pub fn load(&self) {
        let sessions: Vec<Session> = self.read_slice(SESSIONS_KEY);
        let active_session: Option<Session> = self.read_slice(ACTIVE_SESSION_KEY);
        let settings: Settings = self.read_slice(SETTINGS_KEY);
        let favorites: Vec<String> = self.read_slice(FAVORITES_KEY);
        let recent_gyms: Vec<RecentGymVisit> = self.read_slice(RECENT_GYMS_KEY);

        {
            let mut guard = self.state.write();
            *guard = Arc::new(StoreState {
                sessions,
                active_session,
                settings,
                favorites,
                recent_gyms,
                is_loaded: true,
            });
        }
        debug!("store loaded");
        self.subscriptions.notify_all();
    }

    fn read_slice<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let raw = match self.storage.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(e) => {
                warn!(key = %key, error = %e, "failed to read slice, using default");
                return T::default();
            }
        };

        match decode_slice(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to parse slice, using default");
                T::default()
            }
        }
    }

    // --- Mutations ---

    /// Start a session at `gym_id` and make it the active session.
    ///
    /// No guard: an already-active session is overwritten and its unsaved
    /// entries discarded. Callers gate this path behind their own
    /// active-session check.
    pub fn start_session(&self, gym_id: &str, note: Option<&str>) -> Session {
        let session = Session {
            id: self.next_id(),
            user_id: LOCAL_USER_ID.to_string(),
            gym_id: gym_id.to_string(),
            start_time: Timestamp::now(),
            end_time: None,
            note: note.map(String::from),
            entries: Vec::new(),
        };

        let snapshot = self.commit(|state| {
            let mut next = state.clone();
            next.active_session = Some(session.clone());
            next
        });
        self.persist_active(&snapshot);

        self.update_recent_gym(gym_id);

        session
    }

    /// End the active session, moving it to the head of the history.
    ///
    /// Returns None when no session is active.
    pub fn end_session(&self) -> Option<Session> {
        let (completed, snapshot) = {
            let mut guard = self.state.write();
            let current = Arc::clone(&guard);
            let active = current.active_session.as_ref()?;

            let mut completed = active.clone();
            completed.end_time = Some(Timestamp::now());

            let mut next = (*current).clone();
            next.sessions.insert(0, completed.clone());
            next.active_session = None;

            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            (completed, next)
        };

        self.subscriptions.notify_all();
        self.persist_sessions(&snapshot);
        self.persist_active(&snapshot);
        Some(completed)
    }

    /// Append an entry to the active session.
    ///
    /// Returns None when no session is active.
    pub fn add_entry(&self, input: EntryInput) -> Option<ClimbEntry> {
        let (entry, snapshot) = {
            let mut guard = self.state.write();
            let current = Arc::clone(&guard);
            let active = current.active_session.as_ref()?;

            let entry = ClimbEntry {
                id: self.next_id(),
                session_id: active.id.clone(),
                grade: input.grade,
                result: input.result,
                attempts: input.attempts,
                note: input.note,
                media_uri: input.media_uri,
                created_at: Timestamp::now(),
            };

            let mut next = (*current).clone();
            if let Some(session) = next.active_session.as_mut() {
                session.entries.push(entry.clone());
            }

            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            (entry, next)
        };

        self.subscriptions.notify_all();
        self.persist_active(&snapshot);
        Some(entry)
    }

    /// Remove an entry from the active session by id.
    ///
    /// Entries of completed sessions cannot be deleted. Returns whether an
    /// entry was removed.
    pub fn delete_entry(&self, entry_id: &str) -> bool {
        let snapshot = {
            let mut guard = self.state.write();
            let current = Arc::clone(&guard);
            let Some(active) = current.active_session.as_ref() else {
                return false;
            };
            if !active.entries.iter().any(|e| e.id == entry_id) {
                return false;
            }

            let mut next = (*current).clone();
            if let Some(session) = next.active_session.as_mut() {
                session.entries.retain(|e| e.id != entry_id);
            }

            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            next
        };

        self.subscriptions.notify_all();
        self.persist_active(&snapshot);
        true
    }

    /// Toggle favorite membership for a gym. Returns the new membership.
    pub fn toggle_favorite(&self, gym_id: &str) -> bool {
        let mut now_favorite = false;
        let snapshot = self.commit(|state| {
            let mut next = state.clone();
            if next.favorites.iter().any(|id| id == gym_id) {
                next.favorites.retain(|id| id != gym_id);
                now_favorite = false;
            } else {
                next.favorites.push(gym_id.to_string());
                now_favorite = true;
            }
            next
        });
        self.persist_favorites(&snapshot);
        now_favorite
    }

    /// Merge a partial settings update.
    pub fn update_settings(&self, patch: SettingsPatch) {
        let snapshot = self.commit(|state| {
            let mut next = state.clone();
            next.settings = patch.apply_to(&state.settings);
            next
        });
        self.persist_settings(&snapshot);
    }

    /// Remove a completed session from the history.
    pub fn delete_session(&self, session_id: &str) {
        let snapshot = self.commit(|state| {
            let mut next = state.clone();
            next.sessions.retain(|s| s.id != session_id);
            next
        });
        self.persist_sessions(&snapshot);
    }

    /// Reset every slice to its default and clear all persisted keys.
    pub fn clear_all_data(&self) {
        self.commit(|_| StoreState {
            is_loaded: true,
            ..StoreState::default()
        });
        for key in [
            SESSIONS_KEY,
            ACTIVE_SESSION_KEY,
            SETTINGS_KEY,
            FAVORITES_KEY,
            RECENT_GYMS_KEY,
        ] {
            self.queue.delete(key);
        }
    }

    /// Fold a visit to `gym_id` into the recent-gym list.
    ///
    /// Revisits move to the front with an incremented count; first visits
    /// insert at the front with a count of 1. The list never exceeds
    /// [`RECENT_GYMS_CAP`] entries; the least recently visited fall off.
    fn update_recent_gym(&self, gym_id: &str) {
        let snapshot = self.commit(|state| {
            let mut next = state.clone();

            let visit_count = match next.recent_gyms.iter().position(|r| r.gym_id == gym_id) {
                Some(index) => next.recent_gyms.remove(index).visit_count + 1,
                None => 1,
            };
            next.recent_gyms.insert(
                0,
                RecentGymVisit {
                    gym_id: gym_id.to_string(),
                    last_visit_time: Timestamp::now(),
                    visit_count,
                },
            );
            next.recent_gyms.truncate(RECENT_GYMS_CAP);
            next
        });
        self.persist_recent_gyms(&snapshot);
    }

    // --- Queries ---

    /// The current full snapshot.
    pub fn snapshot(&self) -> Arc<StoreState> {
        Arc::clone(&self.state.read())
    }

    /// Completed sessions, most recent first.
    pub fn sessions(&self) -> Vec<Session> {
        self.snapshot().sessions.clone()
    }

    /// The ongoing session, if any.
    pub fn active_session(&self) -> Option<Session> {
        self.snapshot().active_session.clone()
    }

    pub fn settings(&self) -> Settings {
        self.snapshot().settings.clone()
    }

    pub fn favorites(&self) -> Vec<String> {
        self.snapshot().favorites.clone()
    }

    pub fn recent_gyms(&self) -> Vec<RecentGymVisit> {
        self.snapshot().recent_gyms.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_loaded
    }

    pub fn is_favorite(&self, gym_id: &str) -> bool {
        self.snapshot().favorites.iter().any(|id| id == gym_id)
    }

    /// Find a session by id. The active session takes precedence over a
    /// historical session with the same id.
    pub fn session_by_id(&self, id: &str) -> Option<Session> {
        let state = self.snapshot();
        if let Some(active) = &state.active_session {
            if active.id == id {
                return Some(active.clone());
            }
        }
        state.sessions.iter().find(|s| s.id == id).cloned()
    }

    /// Completed sessions at a gym. Excludes the active session.
    pub fn sessions_by_gym(&self, gym_id: &str) -> Vec<Session> {
        self.snapshot()
            .sessions
            .iter()
            .filter(|s| s.gym_id == gym_id)
            .cloned()
            .collect()
    }

    // --- Subscriptions ---

    /// Register a change listener. Listeners receive no payload; re-read
    /// state through the query API.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    /// Block until every enqueued durable write has been applied.
    ///
    /// Shutdown and test aid; normal operation never waits on persistence.
    pub fn flush(&self) {
        self.queue.flush();
    }

    // --- Internals ---

    /// Swap in a new snapshot and notify subscribers.
    fn commit<F>(&self, build: F) -> Arc<StoreState>
    where
        F: FnOnce(&StoreState) -> StoreState,
    {
        let next = {
            let mut guard = self.state.write();
            let next = Arc::new(build(&guard));
            *guard = Arc::clone(&next);
            next
        };
        self.subscriptions.notify_all();
        next
    }

    fn next_id(&self) -> String {
        let n = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("{:x}-{:x}", Timestamp::now().0, n)
    }

    fn persist_sessions(&self, state: &StoreState) {
        self.enqueue_slice(SESSIONS_KEY, &state.sessions);
    }

    fn persist_active(&self, state: &StoreState) {
        match &state.active_session {
            Some(session) => self.enqueue_slice(ACTIVE_SESSION_KEY, session),
            // Removed, not nulled, when no session is active
            None => self.queue.delete(ACTIVE_SESSION_KEY),
        }
    }

    fn persist_settings(&self, state: &StoreState) {
        self.enqueue_slice(SETTINGS_KEY, &state.settings);
    }

    fn persist_favorites(&self, state: &StoreState) {
        self.enqueue_slice(FAVORITES_KEY, &state.favorites);
    }

    fn persist_recent_gyms(&self, state: &StoreState) {
        self.enqueue_slice(RECENT_GYMS_KEY, &state.recent_gyms);
    }

    fn enqueue_slice<T: Serialize>(&self, key: &str, value: &T) {
        match encode_slice(value) {
            Ok(encoded) => self.queue.put(key, encoded),
            Err(e) => error!(key = %key, error = %e, "failed to encode slice"),
        }
    }
}

fn encode_slice<T: Serialize>(value: &T) -> Result<String> {
    let envelope = VersionedSlice {
        version: SLICE_VERSION,
        data: value,
    };
    Ok(serde_json::to_string(&envelope)?)
}

fn decode_slice<T: DeserializeOwned>(raw: &str) -> Result<T> {
    match serde_json::from_str::<VersionedSlice<T>>(raw) {
        Ok(envelope) => Ok(envelope.data),
        // Pre-envelope installs persisted the bare payload
        Err(_) => Ok(serde_json::from_str(raw)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::ClimbResult;
    use std::sync::atomic::AtomicUsize;

    fn test_store() -> (ClimbStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = ClimbStore::new(storage.clone());
        store.load();
        (store, storage)
    }

    #[test]
    fn test_load_empty_storage() {
        let (store, _storage) = test_store();
        assert!(store.is_loaded());
        assert!(store.sessions().is_empty());
        assert!(store.active_session().is_none());
        assert_eq!(store.settings(), Settings::default());
        assert!(store.favorites().is_empty());
        assert!(store.recent_gyms().is_empty());
    }

    #[test]
    fn test_load_fallback_on_corrupt_slices() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_raw(SESSIONS_KEY, "not json at all");
        storage.insert_raw(SETTINGS_KEY, "{\"version\":");
        storage.insert_raw(FAVORITES_KEY, "42");

        let store = ClimbStore::new(storage);
        store.load();

        assert!(store.is_loaded());
        assert!(store.sessions().is_empty());
        assert_eq!(store.settings(), Settings::default());
        assert!(store.favorites().is_empty());
    }

    #[test]
    fn test_load_flips_loaded_on_total_read_failure() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_fail_reads(true);

        let store = ClimbStore::new(storage);
        store.load();

        assert!(store.is_loaded());
        assert!(store.sessions().is_empty());
    }

    #[test]
    fn test_load_notifies_once() {
        let storage = Arc::new(MemoryStorage::new());
        let store = ClimbStore::new(storage);

        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = calls.clone();
            store.subscribe(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        store.load();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_accepts_legacy_bare_payload() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_raw(FAVORITES_KEY, r#"["gym-1","gym-2"]"#);
        storage.insert_raw(
            SETTINGS_KEY,
            r#"{"gradeSystem":"v-grade","defaultPrivacy":"public"}"#,
        );

        let store = ClimbStore::new(storage);
        store.load();

        assert_eq!(store.favorites(), vec!["gym-1", "gym-2"]);
        assert_eq!(store.settings().default_privacy, crate::types::Privacy::Public);
    }

    #[test]
    fn test_session_lifecycle() {
        let (store, _storage) = test_store();

        let started = store.start_session("gym-1", Some("with friends"));
        let active = store.active_session().unwrap();
        assert_eq!(active.id, started.id);
        assert!(active.end_time.is_none());
        assert_eq!(active.user_id, "local-user");
        assert_eq!(active.note.as_deref(), Some("with friends"));

        let completed = store.end_session().unwrap();
        assert_eq!(completed.id, started.id);
        assert!(completed.end_time.is_some());
        assert!(store.active_session().is_none());

        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, completed.id);
    }

    #[test]
    fn test_completed_sessions_prepend() {
        let (store, _storage) = test_store();

        store.start_session("gym-1", None);
        let first = store.end_session().unwrap();
        store.start_session("gym-2", None);
        let second = store.end_session().unwrap();

        let sessions = store.sessions();
        assert_eq!(sessions[0].id, second.id);
        assert_eq!(sessions[1].id, first.id);
    }

    #[test]
    fn test_end_session_without_active() {
        let (store, _storage) = test_store();
        assert!(store.end_session().is_none());
    }

    #[test]
    fn test_start_session_overwrites_active() {
        let (store, _storage) = test_store();

        let first = store.start_session("gym-1", None);
        store.add_entry(EntryInput::new("V3", ClimbResult::Conquer, 1));

        let second = store.start_session("gym-2", None);
        let active = store.active_session().unwrap();
        assert_eq!(active.id, second.id);
        assert!(active.entries.is_empty());
        // The first session and its entries are gone, not archived
        assert!(store.sessions().iter().all(|s| s.id != first.id));
    }

    #[test]
    fn test_add_entry() {
        let (store, _storage) = test_store();

        let session = store.start_session("gym-1", None);
        let entry = store
            .add_entry(
                EntryInput::new("V4", ClimbResult::Conquer, 2)
                    .with_note("crimpy")
                    .with_media("file://send.jpg"),
            )
            .unwrap();

        assert_eq!(entry.session_id, session.id);
        assert_eq!(entry.grade, "V4");
        assert_eq!(entry.attempts, 2);

        let active = store.active_session().unwrap();
        assert_eq!(active.entries.len(), 1);
        assert_eq!(active.entries[0].id, entry.id);
    }

    #[test]
    fn test_add_entry_without_active() {
        let (store, _storage) = test_store();
        assert!(store
            .add_entry(EntryInput::new("V4", ClimbResult::Fail, 1))
            .is_none());
    }

    #[test]
    fn test_entries_preserve_insertion_order() {
        let (store, _storage) = test_store();
        store.start_session("gym-1", None);

        for grade in ["V1", "V5", "V2"] {
            store.add_entry(EntryInput::new(grade, ClimbResult::Conquer, 1));
        }

        let grades: Vec<String> = store
            .active_session()
            .unwrap()
            .entries
            .iter()
            .map(|e| e.grade.clone())
            .collect();
        assert_eq!(grades, vec!["V1", "V5", "V2"]);
    }

    #[test]
    fn test_delete_entry_scope() {
        let (store, _storage) = test_store();

        // No active session: inapplicable
        assert!(!store.delete_entry("whatever"));

        store.start_session("gym-1", None);
        let keep = store
            .add_entry(EntryInput::new("V2", ClimbResult::Conquer, 1))
            .unwrap();
        let remove = store
            .add_entry(EntryInput::new("V3", ClimbResult::Fail, 2))
            .unwrap();

        assert!(store.delete_entry(&remove.id));
        let entries = store.active_session().unwrap().entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, keep.id);

        // Unknown id
        assert!(!store.delete_entry(&remove.id));
    }

    #[test]
    fn test_recent_gyms_cap_and_order() {
        let (store, _storage) = test_store();

        for i in 0..11 {
            store.start_session(&format!("gym-{i}"), None);
            store.end_session();
        }

        let recent = store.recent_gyms();
        assert_eq!(recent.len(), 10);
        // Most recent first; the very first gym visited was evicted
        assert_eq!(recent[0].gym_id, "gym-10");
        assert_eq!(recent[9].gym_id, "gym-1");
        assert!(recent.iter().all(|r| r.gym_id != "gym-0"));
    }

    #[test]
    fn test_recent_gym_revisit_moves_to_front() {
        let (store, _storage) = test_store();

        for gym in ["gym-a", "gym-b", "gym-c"] {
            store.start_session(gym, None);
            store.end_session();
        }
        store.start_session("gym-a", None);
        store.end_session();

        let recent = store.recent_gyms();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].gym_id, "gym-a");
        assert_eq!(recent[0].visit_count, 2);
        // Relative order of untouched records preserved
        assert_eq!(recent[1].gym_id, "gym-c");
        assert_eq!(recent[2].gym_id, "gym-b");
        assert_eq!(recent[1].visit_count, 1);
    }

    #[test]
    fn test_favorite_toggle() {
        let (store, _storage) = test_store();

        assert!(!store.is_favorite("gym-1"));
        assert!(store.toggle_favorite("gym-1"));
        assert!(store.is_favorite("gym-1"));
        assert!(!store.toggle_favorite("gym-1"));
        assert!(!store.is_favorite("gym-1"));
    }

    #[test]
    fn test_favorites_preserve_insertion_order() {
        let (store, _storage) = test_store();

        store.toggle_favorite("gym-b");
        store.toggle_favorite("gym-a");
        store.toggle_favorite("gym-c");
        store.toggle_favorite("gym-a");

        assert_eq!(store.favorites(), vec!["gym-b", "gym-c"]);
    }

    #[test]
    fn test_update_settings() {
        let (store, storage) = test_store();

        store.update_settings(SettingsPatch {
            user_name: Some("mei".into()),
            ..Default::default()
        });
        assert_eq!(store.settings().user_name.as_deref(), Some("mei"));

        store.flush();
        let persisted = storage.get(SETTINGS_KEY).unwrap().unwrap();
        let decoded: Settings = decode_slice(&persisted).unwrap();
        assert_eq!(decoded.user_name.as_deref(), Some("mei"));
    }

    #[test]
    fn test_session_by_id_prefers_active() {
        let (store, _storage) = test_store();

        store.start_session("gym-1", None);
        let first = store.end_session().unwrap();
        let active = store.start_session("gym-2", None);

        assert_eq!(store.session_by_id(&first.id).unwrap().id, first.id);
        let found = store.session_by_id(&active.id).unwrap();
        assert_eq!(found.id, active.id);
        assert!(found.is_active());
        assert!(store.session_by_id("missing").is_none());
    }

    #[test]
    fn test_sessions_by_gym_excludes_active() {
        let (store, _storage) = test_store();

        store.start_session("gym-1", None);
        store.end_session();
        store.start_session("gym-1", None);

        let history = store.sessions_by_gym("gym-1");
        assert_eq!(history.len(), 1);
        assert!(!history[0].is_active());
        assert!(store.sessions_by_gym("gym-2").is_empty());
    }

    #[test]
    fn test_delete_session() {
        let (store, _storage) = test_store();

        store.start_session("gym-1", None);
        let first = store.end_session().unwrap();
        store.start_session("gym-2", None);
        let second = store.end_session().unwrap();

        store.delete_session(&first.id);
        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, second.id);
    }

    #[test]
    fn test_clear_all_data() {
        let (store, storage) = test_store();

        store.start_session("gym-1", None);
        store.add_entry(EntryInput::new("V2", ClimbResult::Conquer, 1));
        store.toggle_favorite("gym-1");
        store.flush();
        assert!(!storage.is_empty());

        store.clear_all_data();
        store.flush();

        assert!(store.is_loaded());
        assert!(store.active_session().is_none());
        assert!(store.sessions().is_empty());
        assert!(store.favorites().is_empty());
        assert!(store.recent_gyms().is_empty());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_active_session_key_removed_when_idle() {
        let (store, storage) = test_store();

        store.start_session("gym-1", None);
        store.flush();
        assert!(storage.get(ACTIVE_SESSION_KEY).unwrap().is_some());

        store.end_session();
        store.flush();
        assert!(storage.get(ACTIVE_SESSION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let (store, storage) = test_store();
        storage.set_fail_writes(true);

        store.toggle_favorite("gym-1");
        store.flush();

        // The in-memory mutation stands; only durability was lost
        assert!(store.is_favorite("gym-1"));
        storage.set_fail_writes(false);
        assert!(storage.get(FAVORITES_KEY).unwrap().is_none());
    }

    #[test]
    fn test_mutations_notify_subscribers() {
        let (store, _storage) = test_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let id = {
            let calls = calls.clone();
            store.subscribe(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        // start_session commits twice: active slot, then recent-gym ranker
        store.start_session("gym-1", None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        store.add_entry(EntryInput::new("V1", ClimbResult::Fail, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        store.unsubscribe(id);
        store.end_session();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_ids_are_unique() {
        let (store, _storage) = test_store();
        store.start_session("gym-1", None);

        let mut ids: Vec<String> = (0..50)
            .map(|_| {
                store
                    .add_entry(EntryInput::new("V1", ClimbResult::Conquer, 1))
                    .unwrap()
                    .id
            })
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_state_roundtrips_through_storage() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let store = ClimbStore::new(storage.clone());
            store.load();
            store.start_session("gym-1", None);
            store.add_entry(EntryInput::new("V5", ClimbResult::Conquer, 3));
            store.end_session();
            store.toggle_favorite("gym-1");
            store.update_settings(SettingsPatch {
                user_name: Some("mei".into()),
                ..Default::default()
            });
            store.flush();
        }

        let store = ClimbStore::new(storage);
        store.load();

        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].entries.len(), 1);
        assert_eq!(sessions[0].entries[0].grade, "V5");
        assert!(store.is_favorite("gym-1"));
        assert_eq!(store.settings().user_name.as_deref(), Some("mei"));
        assert_eq!(store.recent_gyms().len(), 1);
    }
}
