use crate::log_entry::FormattedLogEntry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An entry as held by the store, keyed by its append sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub seq: u64,
    pub entry: FormattedLogEntry,
}

#[derive(Debug, Default)]
struct Entries {
    next_seq: u64,
    items: Vec<Arc<StoredEntry>>,
}

/// Append-only, insertion-ordered log buffer.
///
/// Handles are cheap to clone and share one backing sequence. Appends are
/// serialised by a mutex; readers get a snapshot of already-complete entries.
/// There is no capacity limit.
#[derive(Debug, Clone, Default)]
pub struct OrderedLogStore {
    inner: Arc<Mutex<Entries>>,
}

impl OrderedLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts with one entry already in place.
    pub fn with_initial(entry: FormattedLogEntry) -> Self {
        let store = Self::new();
        store.append(entry);
        store
    }

    /// Appends `entry` at the end and returns its sequence number.
    pub fn append(&self, entry: FormattedLogEntry) -> u64 {
        let mut entries = self.lock();
        push(&mut entries, entry)
    }

    /// Builds the entry while holding the lock and appends it on success.
    ///
    /// If `build` fails (or panics) nothing is appended and the lock is
    /// released for the next caller.
    pub fn append_with<E>(
        &self,
        build: impl FnOnce() -> Result<FormattedLogEntry, E>,
    ) -> Result<u64, E> {
        let mut entries = self.lock();
        let entry = build()?;
        Ok(push(&mut entries, entry))
    }

    pub fn snapshot(&self) -> Vec<Arc<StoredEntry>> {
        self.lock().items.clone()
    }

    /// Entries appended after `seq`, in order.
    pub fn since(&self, seq: Option<u64>) -> Vec<Arc<StoredEntry>> {
        let entries = self.lock();
        let start = match seq {
            Some(seq) => entries.items.partition_point(|e| e.seq <= seq),
            None => 0,
        };
        entries.items[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic inside `append_with` poisons the mutex, but the sequence is
    // only mutated by `push` after the entry is built, so it is never partial.
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn push(entries: &mut Entries, entry: FormattedLogEntry) -> u64 {
    let seq = entries.next_seq;
    entries.next_seq += 1;
    entries.items.push(Arc::new(StoredEntry { seq, entry }));
    seq
}
