//! Process-wide repository of parsed dataset metadata.
//!
//! Keyed by a word-sum hash of `"<basename>/<dataset-path>"`; a hit is only
//! valid when the stored name compares equal, so hash collisions degrade to
//! misses. Entries are published only after a fully successful parse and are
//! evicted oldest-first when the repository is full.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, OnceLock};

use rangehdf5_format::DatasetMeta;

/// Maximum number of memoized dataset parses.
pub const MAX_META_STORE: usize = 256;

/// Fixed buffer size the repo key is computed over. Names are zero-padded;
/// at least two trailing zero bytes must remain.
const MAX_META_NAME: usize = 128;

struct RepoEntry {
    name: String,
    meta: DatasetMeta,
}

struct RepoState {
    entries: HashMap<u64, RepoEntry>,
    order: VecDeque<u64>,
}

/// The metadata repository. One instance exists per process.
pub struct MetaRepo {
    state: Mutex<RepoState>,
}

impl MetaRepo {
    fn new() -> Self {
        Self {
            state: Mutex::new(RepoState {
                entries: HashMap::with_capacity(MAX_META_STORE),
                order: VecDeque::with_capacity(MAX_META_STORE),
            }),
        }
    }

    /// The process-wide repository.
    pub fn global() -> &'static MetaRepo {
        static REPO: OnceLock<MetaRepo> = OnceLock::new();
        REPO.get_or_init(MetaRepo::new)
    }

    /// Copy out the metadata stored under `key`, verifying the full name.
    pub fn lookup(&self, key: u64, name: &str) -> Option<DatasetMeta> {
        let state = self.state.lock().unwrap();
        let entry = state.entries.get(&key)?;
        if entry.name == name {
            Some(entry.meta.clone())
        } else {
            None
        }
    }

    /// Publish a finished parse, evicting the oldest entry when full.
    pub fn publish(&self, key: u64, name: &str, meta: DatasetMeta) {
        let mut state = self.state.lock().unwrap();
        if state.entries.insert(
            key,
            RepoEntry {
                name: name.to_string(),
                meta,
            },
        ).is_some() {
            state.order.retain(|&k| k != key);
        }
        state.order.push_back(key);
        while state.entries.len() > MAX_META_STORE {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
    }

    /// Number of memoized parses.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the repo name `"<basename>/<dataset-path>"` from a resource string
/// and a dataset path.
pub fn meta_name(resource: &str, dataset: &str) -> String {
    let basename = resource.rsplit('/').next().unwrap_or(resource);
    let dataset = dataset.strip_prefix('/').unwrap_or(dataset);
    format!("{basename}/{dataset}")
}

/// Hash a repo name: the wrapping sum of the little-endian u64 words of the
/// zero-padded name buffer. Names too long for the buffer get no key and
/// therefore are never memoized.
pub fn meta_key(name: &str) -> Option<u64> {
    let bytes = name.as_bytes();
    if bytes.len() > MAX_META_NAME - 2 {
        return None;
    }
    let mut padded = [0u8; MAX_META_NAME];
    padded[..bytes.len()].copy_from_slice(bytes);

    let mut key = 0u64;
    for word in padded.chunks_exact(8) {
        key = key.wrapping_add(u64::from_le_bytes(word.try_into().unwrap()));
    }
    Some(key)
}
