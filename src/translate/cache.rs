//! Translation cache (spec §2, §4.1): bounded LRU from source SQL to
//! (rewritten SQL, modified-bool), shared across sessions.
//!
//! No literal precedent in the corpus uses an LRU (the nearest relative,
//! `cache::mod`, is an unbounded SQLite-backed key-value store with no
//! eviction policy), so this is a plain `HashMap` + access-order `VecDeque`
//! built from scratch rather than adapted from an existing module.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One cached translation: the rewritten SQL and whether it differs from
/// the input.
#[derive(Debug, Clone)]
pub struct TranslationEntry {
    pub rewritten: String,
    pub modified: bool,
}

struct Inner {
    capacity: usize,
    entries: HashMap<String, TranslationEntry>,
    order: VecDeque<String>,
}

impl Inner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos).unwrap();
            self.order.push_back(k);
        }
    }

    fn insert(&mut self, key: String, entry: TranslationEntry) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key.clone(), entry);
            self.touch(&key);
            return;
        }
        while self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, entry);
    }
}

/// Thread-safe bounded LRU mapping source SQL to its translation.
///
/// Only translations that were actually modified are cached (spec §4.1:
/// "unchanged text short-circuits via the prefilter on subsequent
/// lookups") — callers insert through [`TranslationCache::record`], which
/// only a modified `translate()` result satisfies; the caller is
/// responsible for calling the cheap prefilter first.
pub struct TranslationCache {
    inner: Mutex<Inner>,
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity: capacity.max(1),
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, source: &str) -> Option<TranslationEntry> {
        let mut inner = self.inner.lock().expect("translation cache poisoned");
        if let Some(entry) = inner.entries.get(source).cloned() {
            inner.touch(source);
            Some(entry)
        } else {
            None
        }
    }

    pub fn record(&self, source: String, entry: TranslationEntry) {
        let mut inner = self.inner.lock().expect("translation cache poisoned");
        inner.insert(source, entry);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("translation cache poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
