//! Sessions: a context id counter and a page cache per browser
//! session, and the store holding them.

use std::{collections::HashMap,
          sync::{Arc, Mutex, MutexGuard, atomic::{AtomicU64, Ordering}},
          time::{Duration, Instant}};

use kstring::KString;

use crate::component::PageRef;
use crate::page_cache::{PageCache, PageCacheMiss};
use crate::debug;


pub struct Session {
    id: KString,
    next_context_id: AtomicU64,
    page_cache: Mutex<PageCache<PageRef>>,
    last_access: Mutex<Instant>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("next_context_id", &self.next_context_id)
            .finish()
    }
}

// The guarded data is consistent after every single operation; keep
// using it after a panic elsewhere.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Session {
    pub fn new(id: &str, page_cache_size: usize) -> Self {
        Session {
            id: KString::from_ref(id),
            next_context_id: AtomicU64::new(0),
            page_cache: Mutex::new(PageCache::new(page_cache_size)),
            last_access: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Context ids are unique within the session: 0, 1, 2, ...
    pub fn next_context_id(&self) -> KString {
        let n = self.next_context_id.fetch_add(1, Ordering::SeqCst);
        KString::from_string(n.to_string())
    }

    pub fn save_page(&self, context_id: KString, page: PageRef) {
        lock(&self.page_cache).save(context_id, page);
    }

    /// Look up a page and mark it as most recently used.
    pub fn restore_page(&self, context_id: &str) -> Result<PageRef, PageCacheMiss> {
        let mut cache = lock(&self.page_cache);
        let page = cache.restore(context_id)?;
        cache.retain(context_id)?;
        Ok(page)
    }

    pub fn has_page(&self, context_id: &str) -> bool {
        lock(&self.page_cache).contains(context_id)
    }

    pub fn page_count(&self) -> usize {
        lock(&self.page_cache).len()
    }

    /// Cached context ids, least recently used first.
    pub fn page_context_ids(&self) -> Vec<KString> {
        lock(&self.page_cache).context_ids().map(KString::from_ref).collect()
    }

    pub fn touch(&self) {
        *lock(&self.last_access) = Instant::now();
    }

    pub fn idle_time(&self) -> Duration {
        lock(&self.last_access).elapsed()
    }
}


#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<KString, Arc<Session>>>,
    timeout: Duration,
    page_cache_size: usize,
}

impl SessionStore {
    pub fn new(timeout: Duration, page_cache_size: usize) -> Self {
        SessionStore {
            sessions: Mutex::new(HashMap::new()),
            timeout,
            page_cache_size,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The session with this id, created if necessary; either way
    /// marked as accessed now.
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        let mut sessions = lock(&self.sessions);
        let session = sessions.entry(KString::from_ref(id))
            .or_insert_with(|| {
                debug!("new session {id:?}");
                Arc::new(Session::new(id, self.page_cache_size))
            })
            .clone();
        session.touch();
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        lock(&self.sessions).get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        lock(&self.sessions).remove(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops sessions idle for longer than the timeout, returns how
    /// many.
    pub fn expire_idle(&self) -> usize {
        self.expire_idle_for(self.timeout)
    }

    pub fn expire_idle_for(&self, max_idle: Duration) -> usize {
        let mut sessions = lock(&self.sessions);
        let before = sessions.len();
        sessions.retain(|_, s| s.idle_time() <= max_idle);
        before - sessions.len()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentDefinition};
    use crate::value::Value;

    #[derive(Debug)]
    struct Empty;

    impl Component for Empty {
        fn value_for_key(&self, _key: &str) -> Option<Value> {
            None
        }
    }

    fn page() -> PageRef {
        Arc::new(ComponentDefinition::new("P", "", "", || Box::new(Empty)))
            .instantiate().into_page_ref()
    }

    #[test]
    fn t_context_ids() {
        let s = Session::new("a", 3);
        assert_eq!(s.next_context_id().as_str(), "0");
        assert_eq!(s.next_context_id().as_str(), "1");
    }

    #[test]
    fn t_pages() {
        let s = Session::new("a", 2);
        s.save_page("0".into(), page());
        s.save_page("1".into(), page());
        assert!(s.restore_page("0").is_ok());
        s.save_page("2".into(), page());
        assert!(s.has_page("0"));
        assert!(!s.has_page("1"));
        assert_eq!(s.restore_page("1").unwrap_err().context_id.as_str(), "1");
        assert_eq!(s.page_count(), 2);
    }

    #[test]
    fn t_store() {
        let store = SessionStore::new(Duration::from_secs(60), 5);
        let a = store.get_or_create("a");
        let a2 = store.get_or_create("a");
        assert!(Arc::ptr_eq(&a, &a2));
        store.get_or_create("b");
        assert_eq!(store.len(), 2);
        assert_eq!(store.expire_idle(), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.expire_idle_for(Duration::from_millis(1)), 2);
        assert!(store.is_empty());
        assert!(store.get("a").is_none());
    }
}
