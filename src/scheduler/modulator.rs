//! The modulator: owning context of every scheduler of one replication
//!
//! This module handles:
//! - The concurrency bound and pause flag shared by all schedulers
//! - Creating named, durable schedulers
//! - The durable auxiliary sets (mutable, immutable, emitted, unemitted,
//!   filtered, latest version per logical member)

use super::queue::Scheduler;
use super::Comparator;
use crate::model::{FragmentRef, Member, Value};
use crate::storage::{lock, Partition, SharedStorage, StorageError, StorageResult};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Admission state shared by every scheduler of a modulator
#[derive(Debug)]
pub(crate) struct Admission {
    paused: AtomicBool,
    active: AtomicUsize,
    concurrency: usize,
}

impl Admission {
    /// Claims one slot if not paused and below the bound
    pub(crate) fn try_acquire(&self) -> bool {
        if self.paused.load(Ordering::SeqCst) {
            return false;
        }
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                (active < self.concurrency).then_some(active + 1)
            })
            .is_ok()
    }

    /// Returns one slot
    pub(crate) fn release(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                active.checked_sub(1)
            });
    }
}

/// A fragment recorded as mutable, as persisted
#[derive(Debug, Serialize, Deserialize)]
struct MutableEntry {
    fragment: FragmentRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_age: Option<u64>,
}

/// Owning context of the schedulers and durable sets of one replication
///
/// Cloning yields another handle onto the same state.
#[derive(Clone)]
pub struct Modulator {
    storage: SharedStorage,
    admission: Arc<Admission>,
}

impl Modulator {
    /// Creates a modulator over a storage backend
    ///
    /// # Arguments
    ///
    /// * `storage` - Durable map holding every partition
    /// * `concurrency` - Maximum number of jobs dispatched at once, across all schedulers
    pub fn new(storage: SharedStorage, concurrency: usize) -> Self {
        Self {
            storage,
            admission: Arc::new(Admission {
                paused: AtomicBool::new(false),
                active: AtomicUsize::new(0),
                concurrency: concurrency.max(1),
            }),
        }
    }

    /// Opens the named scheduler
    ///
    /// Jobs left in flight by an interrupted run are moved back to pending
    /// and every pending job is loaded into the priority heap.
    pub fn create<T>(&self, name: &str, comparator: Comparator<T>) -> StorageResult<Scheduler<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        Scheduler::open(
            name,
            Arc::clone(&self.storage),
            Arc::clone(&self.admission),
            comparator,
        )
    }

    /// Stops admitting jobs on every scheduler
    pub fn pause(&self) {
        self.admission.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes admission; callers run `check_ready` on their schedulers afterwards
    pub fn unpause(&self) {
        self.admission.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.admission.paused.load(Ordering::SeqCst)
    }

    /// Number of jobs currently dispatched across all schedulers
    pub fn active(&self) -> usize {
        self.admission.active.load(Ordering::SeqCst)
    }

    pub fn concurrency(&self) -> usize {
        self.admission.concurrency
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Records a fragment as mutable, removing any immutable record
    ///
    /// # Returns
    ///
    /// `true` if the fragment was not already recorded as mutable
    pub fn record_mutable(&self, url: &str, max_age: Option<u64>) -> StorageResult<bool> {
        let mut storage = lock(&self.storage)?;
        let existing = storage.get(Partition::Mutable, url)?;

        let created = existing
            .as_deref()
            .and_then(|raw| serde_json::from_str::<MutableEntry>(raw).ok())
            .and_then(|entry| entry.fragment.created);

        let mut fragment = FragmentRef::new(url);
        fragment.mutable = true;
        fragment.created = created.or(fragment.created);
        fragment.updated = Some(Utc::now());

        let entry = MutableEntry { fragment, max_age };
        storage.put(Partition::Mutable, url, &serde_json::to_string(&entry)?)?;
        storage.delete(Partition::Immutable, url)?;
        Ok(existing.is_none())
    }

    /// Records a fragment as cacheable forever, removing any mutable record
    pub fn record_immutable(&self, url: &str) -> StorageResult<()> {
        let mut storage = lock(&self.storage)?;
        storage.put(Partition::Immutable, url, &Utc::now().to_rfc3339())?;
        storage.delete(Partition::Mutable, url)?;
        Ok(())
    }

    pub fn is_immutable(&self, url: &str) -> StorageResult<bool> {
        lock(&self.storage)?.contains(Partition::Immutable, url)
    }

    /// Returns every fragment recorded as mutable, in key order
    pub fn mutable_fragments(&self) -> StorageResult<Vec<FragmentRef>> {
        let entries = lock(&self.storage)?.iter(Partition::Mutable, "")?;
        entries
            .into_iter()
            .map(|(key, raw)| {
                serde_json::from_str::<MutableEntry>(&raw)
                    .map(|entry| entry.fragment)
                    .map_err(|e| StorageError::Corrupt {
                        partition: Partition::Mutable,
                        key,
                        message: e.to_string(),
                    })
            })
            .collect()
    }

    /// Records a member as delivered
    pub fn record_emitted(&self, id: &str) -> StorageResult<()> {
        lock(&self.storage)?.put(Partition::Emitted, id, &Utc::now().to_rfc3339())
    }

    pub fn was_emitted(&self, id: &str) -> StorageResult<bool> {
        lock(&self.storage)?.contains(Partition::Emitted, id)
    }

    /// Persists a member still buffered for ordering
    pub fn record_unemitted(&self, member: &Member) -> StorageResult<()> {
        let raw = serde_json::to_string(member)?;
        lock(&self.storage)?.put(Partition::Unemitted, &member.id, &raw)
    }

    pub fn remove_unemitted(&self, id: &str) -> StorageResult<()> {
        lock(&self.storage)?.delete(Partition::Unemitted, id)
    }

    /// Returns every buffered member left by a previous run
    pub fn unemitted(&self) -> StorageResult<Vec<Member>> {
        let entries = lock(&self.storage)?.iter(Partition::Unemitted, "")?;
        entries
            .into_iter()
            .map(|(key, raw)| {
                serde_json::from_str::<Member>(&raw).map_err(|e| StorageError::Corrupt {
                    partition: Partition::Unemitted,
                    key,
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Records a member rejected by the member condition
    pub fn record_filtered(&self, id: &str) -> StorageResult<()> {
        lock(&self.storage)?.put(Partition::Filtered, id, &Utc::now().to_rfc3339())
    }

    pub fn was_filtered(&self, id: &str) -> StorageResult<bool> {
        lock(&self.storage)?.contains(Partition::Filtered, id)
    }

    /// Returns the newest timestamp emitted for a logical member
    pub fn latest_version(&self, base: &str) -> StorageResult<Option<Value>> {
        let raw = lock(&self.storage)?.get(Partition::LatestVersions, base)?;
        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                partition: Partition::LatestVersions,
                key: base.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
    }

    pub fn set_latest_version(&self, base: &str, value: &Value) -> StorageResult<()> {
        let raw = serde_json::to_string(value)?;
        lock(&self.storage)?.put(Partition::LatestVersions, base, &raw)
    }

    pub fn meta(&self, key: &str) -> StorageResult<Option<String>> {
        lock(&self.storage)?.get(Partition::Meta, key)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> StorageResult<()> {
        lock(&self.storage)?.put(Partition::Meta, key, value)
    }

    /// Removes every partition's contents
    pub fn clear_all(&self) -> StorageResult<()> {
        lock(&self.storage)?.clear_all()
    }
}
