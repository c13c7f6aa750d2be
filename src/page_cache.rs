//! Per-session store of rendered page instances, keyed by context id,
//! with least-recently-used eviction.

use std::collections::{BTreeMap, HashMap};

use kstring::KString;

use crate::debug;

/// Lookup of a context id that isn't (or no longer) in the cache.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("no page with context id {context_id:?} in the page cache")]
pub struct PageCacheMiss {
    pub context_id: KString,
}

pub const DEFAULT_PAGE_CACHE_SIZE: usize = 30;

#[derive(Debug)]
pub struct PageCache<T> {
    capacity: usize,
    /// context id -> (stamp of last save/retain, page)
    entries: HashMap<KString, (u64, T)>,
    /// stamp -> context id, oldest first
    recency: BTreeMap<u64, KString>,
    clock: u64,
}

impl<T: Clone> PageCache<T> {
    /// `capacity` is at least 1.
    pub fn new(capacity: usize) -> Self {
        PageCache {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            clock: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, context_id: &str) -> bool {
        self.entries.contains_key(context_id)
    }

    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Insert or overwrite, making the entry the most recently used
    /// one. Returns the context ids of evicted entries.
    pub fn save(&mut self, context_id: KString, page: T) -> Vec<KString> {
        let stamp = self.next_stamp();
        if let Some((old_stamp, _)) = self.entries.insert(context_id.clone(), (stamp, page)) {
            self.recency.remove(&old_stamp);
        }
        self.recency.insert(stamp, context_id);
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let (_, oldest) = match self.recency.pop_first() {
                Some(e) => e,
                None => break,
            };
            self.entries.remove(&oldest);
            debug!("page cache: evicted context {oldest:?}");
            evicted.push(oldest);
        }
        evicted
    }

    /// Does not change the eviction order.
    pub fn restore(&self, context_id: &str) -> Result<T, PageCacheMiss> {
        match self.entries.get(context_id) {
            Some((_, page)) => Ok(page.clone()),
            None => Err(PageCacheMiss { context_id: KString::from_ref(context_id) }),
        }
    }

    /// Make an existing entry the most recently used one.
    pub fn retain(&mut self, context_id: &str) -> Result<(), PageCacheMiss> {
        let stamp = self.next_stamp();
        match self.entries.get_mut(context_id) {
            Some((entry_stamp, _)) => {
                let old = *entry_stamp;
                *entry_stamp = stamp;
                if let Some(key) = self.recency.remove(&old) {
                    self.recency.insert(stamp, key);
                }
                Ok(())
            }
            None => Err(PageCacheMiss { context_id: KString::from_ref(context_id) }),
        }
    }

    /// Context ids from least to most recently used.
    pub fn context_ids(&self) -> impl Iterator<Item = &str> {
        self.recency.values().map(|k| k.as_str())
    }
}

impl<T: Clone> Default for PageCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_CACHE_SIZE)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn t_save_restore() {
        let mut c = PageCache::new(3);
        let page = Arc::new(7);
        c.save("7".into(), page.clone());
        let restored = c.restore("7").unwrap();
        assert!(Arc::ptr_eq(&page, &restored));
        assert_eq!(c.restore("8").unwrap_err(),
                   PageCacheMiss { context_id: "8".into() });
        assert!(c.retain("8").is_err());
    }

    #[test]
    fn t_overwrite_keeps_one_entry() {
        let mut c = PageCache::new(3);
        c.save("1".into(), "a");
        c.save("1".into(), "b");
        assert_eq!(c.len(), 1);
        assert_eq!(c.restore("1").unwrap(), "b");
    }

    #[test]
    fn t_eviction_order() {
        let mut c = PageCache::new(3);
        c.save("1".into(), 1);
        c.save("2".into(), 2);
        c.save("3".into(), 3);
        // restore alone doesn't protect "1"
        c.restore("1").unwrap();
        c.retain("2").unwrap();
        assert_eq!(c.context_ids().collect::<Vec<_>>(), vec!["1", "3", "2"]);
        let evicted = c.save("4".into(), 4);
        assert_eq!(evicted, vec![KString::from_static("1")]);
        assert!(!c.contains("1"));
        let evicted = c.save("5".into(), 5);
        assert_eq!(evicted, vec![KString::from_static("3")]);
        assert_eq!(c.context_ids().collect::<Vec<_>>(), vec!["2", "4", "5"]);
    }

    #[test]
    fn t_min_capacity() {
        let mut c = PageCache::new(0);
        assert_eq!(c.capacity(), 1);
        c.save("1".into(), ());
        c.save("2".into(), ());
        assert_eq!(c.context_ids().collect::<Vec<_>>(), vec!["2"]);
    }
}
