//! Per-category append buffers with single-flush thresholds.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::BatchSizePolicy;

struct Bucket<T> {
    // Shared while appending, exclusive while flushing.
    guard: RwLock<()>,
    items: Mutex<Vec<T>>,
}

impl<T> Default for Bucket<T> {
    fn default() -> Self {
        Self {
            guard: RwLock::new(()),
            items: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Bucket<T> {
    fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn take(&self) -> Vec<T> {
        mem::take(&mut *self.items.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Buffers keyed by category.
///
/// Many threads may append to one category at once. When an append crosses
/// the threshold, that thread takes the category's exclusive guard, re-checks
/// the size and hands the drained records to the flush callback while still
/// holding the guard, so racing publishers never flush the same records
/// twice.
pub struct CategoryBuffers<T> {
    policy: BatchSizePolicy,
    categories: RwLock<HashMap<String, Arc<Bucket<T>>>>,
}

impl<T> fmt::Debug for CategoryBuffers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryBuffers")
            .field("policy", &self.policy)
            .field("categories", &self.category_count())
            .finish()
    }
}

impl<T> CategoryBuffers<T> {
    /// Empty buffers with the given threshold policy.
    #[must_use]
    pub fn new(policy: BatchSizePolicy) -> Self {
        Self {
            policy,
            categories: RwLock::new(HashMap::new()),
        }
    }

    /// Number of categories seen so far.
    #[must_use]
    pub fn category_count(&self) -> usize {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Current flush threshold.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.policy.batch_size(self.category_count())
    }

    /// Records waiting in `category`.
    #[must_use]
    pub fn pending(&self, category: &str) -> usize {
        self.bucket(category).map_or(0, |bucket| bucket.len())
    }

    /// Append `item`, flushing the category through `flush` if the
    /// threshold is reached. Returns the flush result when one ran.
    pub fn append<R>(
        &self,
        category: &str,
        item: T,
        flush: impl FnOnce(Vec<T>) -> R,
    ) -> Option<R> {
        let bucket = self.bucket_or_insert(category);
        let size = {
            let _shared = bucket.guard.read().unwrap_or_else(PoisonError::into_inner);
            let mut items = bucket.items.lock().unwrap_or_else(PoisonError::into_inner);
            items.push(item);
            items.len()
        };
        let threshold = self.batch_size();
        if size < threshold {
            return None;
        }
        let _exclusive = bucket.guard.write().unwrap_or_else(PoisonError::into_inner);
        if bucket.len() < threshold {
            return None;
        }
        Some(flush(bucket.take()))
    }

    /// Flush `category` regardless of size. Returns `None` when it is empty.
    pub fn flush<R>(&self, category: &str, write: impl FnOnce(Vec<T>) -> R) -> Option<R> {
        let bucket = self.bucket(category)?;
        let _exclusive = bucket.guard.write().unwrap_or_else(PoisonError::into_inner);
        let items = bucket.take();
        if items.is_empty() {
            return None;
        }
        Some(write(items))
    }

    /// Flush every non-empty category, in name order.
    pub fn flush_all<R>(&self, mut write: impl FnMut(&str, Vec<T>) -> R) -> Vec<R> {
        let mut names: Vec<String> = self
            .categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
            .iter()
            .filter_map(|name| self.flush(name, |items| write(name, items)))
            .collect()
    }

    fn bucket(&self, category: &str) -> Option<Arc<Bucket<T>>> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
            .cloned()
    }

    fn bucket_or_insert(&self, category: &str) -> Arc<Bucket<T>> {
        if let Some(bucket) = self.bucket(category) {
            return bucket;
        }
        let mut categories = self
            .categories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(categories.entry(category.to_owned()).or_default())
    }
}
