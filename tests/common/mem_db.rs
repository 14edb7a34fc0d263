//! A simple, volatile, in-memory implementation of [`VersionedKVStore`].

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
};

use validator_window::{
    store::pluggables::{KVGet, VersionedKVStore, WriteBatch},
    types::data_types::Version,
};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory implementation of [`VersionedKVStore`]. Clones share the same underlying state, so a
/// test can keep a handle on a store that it has moved into a `ValidatorState`.
#[derive(Clone)]
pub(crate) struct MemDB(Arc<Mutex<MemDBInner>>);

struct MemDBInner {
    working: Map,
    // versions[i] is the state as of Version(i + 1).
    versions: Vec<Arc<Map>>,
}

impl MemDB {
    /// Create a new, empty `MemDB`.
    pub(crate) fn new() -> MemDB {
        MemDB(Arc::new(Mutex::new(MemDBInner {
            working: BTreeMap::new(),
            versions: Vec::new(),
        })))
    }

    /// Overwrite (or with `None`, delete) `key` in the already-committed `version`. Used to simulate
    /// corrupted history.
    pub(crate) fn tamper(&self, version: Version, key: &[u8], value: Option<&[u8]>) {
        let mut inner = self.0.lock().unwrap();
        let map = Arc::make_mut(&mut inner.versions[version.int() as usize - 1]);
        match value {
            Some(value) => map.insert(key.to_vec(), value.to_vec()),
            None => map.remove(key),
        };
    }
}

impl VersionedKVStore for MemDB {
    type WriteBatch = MemWriteBatch;
    type Snapshot = MemDBSnapshot;

    fn write(&mut self, wb: Self::WriteBatch) {
        let mut inner = self.0.lock().unwrap();
        for (key, value) in wb.insertions {
            inner.working.insert(key, value);
        }
        for key in wb.deletions {
            inner.working.remove(&key);
        }
    }

    fn commit(&mut self) -> Version {
        let mut inner = self.0.lock().unwrap();
        let frozen = Arc::new(inner.working.clone());
        inner.versions.push(frozen);
        Version::new(inner.versions.len() as u64)
    }

    fn version(&self) -> Option<Version> {
        let len = self.0.lock().unwrap().versions.len();
        if len == 0 {
            None
        } else {
            Some(Version::new(len as u64))
        }
    }

    fn snapshot_at(&self, version: Version) -> Option<MemDBSnapshot> {
        let inner = self.0.lock().unwrap();
        let index = (version.int() as usize).checked_sub(1)?;
        inner.versions.get(index).cloned().map(MemDBSnapshot)
    }
}

impl KVGet for MemDB {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.lock().unwrap().working.get(key).cloned()
    }

    fn prefix_iter(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        prefix_iter(&self.0.lock().unwrap().working, prefix)
    }
}

// A simple implementation of [`WriteBatch`].
pub(crate) struct MemWriteBatch {
    insertions: HashMap<Vec<u8>, Vec<u8>>,
    deletions: HashSet<Vec<u8>>,
}

impl WriteBatch for MemWriteBatch {
    fn new() -> Self {
        MemWriteBatch {
            insertions: HashMap::new(),
            deletions: HashSet::new(),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        let _ = self.deletions.remove(key);
        self.insertions.insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        let _ = self.insertions.remove(key);
        self.deletions.insert(key.to_vec());
    }
}

/// A simple implementation of [`KVGet`] used as `VersionedKVStore::Snapshot` for `MemDB`.
pub(crate) struct MemDBSnapshot(Arc<Map>);

impl KVGet for MemDBSnapshot {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.get(key).cloned()
    }

    fn prefix_iter(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        prefix_iter(&self.0, prefix)
    }
}

fn prefix_iter(map: &Map, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    map.range(prefix.to_vec()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
