//! Durable, bounded-concurrency job queue
//!
//! Each scheduler owns one named slice of the `pending` and `inflight`
//! partitions. A job lives in exactly one of them at a time:
//!
//! ```text
//! push ──► pending ──check_ready──► inflight ──finished──► (gone)
//!             ▲                         │
//!             └──── reopen after crash ─┘
//! ```

use super::heap::{Comparator, PriorityHeap};
use super::modulator::Admission;
use crate::storage::{lock, Partition, SharedStorage, StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// A job admitted for execution
///
/// The holder must hand `index` back to [`Scheduler::finished`] exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch<T> {
    pub index: u64,
    pub item: T,
}

struct Queued<T> {
    index: u64,
    item: T,
}

/// A named job queue sharing its concurrency bound with its modulator
pub struct Scheduler<T> {
    name: String,
    storage: SharedStorage,
    admission: Arc<Admission>,
    heap: PriorityHeap<Queued<T>>,
    next_index: u64,
    in_flight: HashSet<u64>,
    restored: usize,
}

impl<T> Scheduler<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub(crate) fn open(
        name: &str,
        storage: SharedStorage,
        admission: Arc<Admission>,
        comparator: Comparator<T>,
    ) -> StorageResult<Self> {
        let prefix = format!("{}/", name);
        let heap_order: Comparator<Queued<T>> =
            Arc::new(move |a: &Queued<T>, b: &Queued<T>| {
                comparator(&a.item, &b.item).then_with(|| a.index.cmp(&b.index))
            });

        let mut heap = PriorityHeap::new(heap_order);
        let mut next_index = 0;

        {
            let mut guard = lock(&storage)?;

            let interrupted = guard.iter(Partition::Inflight, &prefix)?;
            if !interrupted.is_empty() {
                tracing::info!(
                    "Requeueing {} interrupted job(s) of scheduler '{}'",
                    interrupted.len(),
                    name
                );
            }
            for (key, value) in interrupted {
                guard.put(Partition::Pending, &key, &value)?;
                guard.delete(Partition::Inflight, &key)?;
            }

            for (key, value) in guard.iter(Partition::Pending, &prefix)? {
                let corrupt = |message: String| StorageError::Corrupt {
                    partition: Partition::Pending,
                    key: key.clone(),
                    message,
                };
                let index: u64 = key[prefix.len()..]
                    .parse()
                    .map_err(|_| corrupt("key is not a job index".to_string()))?;
                let item: T = serde_json::from_str(&value).map_err(|e| corrupt(e.to_string()))?;
                next_index = next_index.max(index + 1);
                heap.push(Queued { index, item });
            }

            if let Some(stored) = guard.get(Partition::Meta, &Self::counter_key(name))? {
                let stored: u64 = stored.parse().map_err(|_| StorageError::Corrupt {
                    partition: Partition::Meta,
                    key: Self::counter_key(name),
                    message: format!("invalid index counter '{}'", stored),
                })?;
                next_index = next_index.max(stored);
            }
        }

        let restored = heap.len();
        tracing::debug!(
            "Opened scheduler '{}' with {} pending job(s), next index {}",
            name,
            restored,
            next_index
        );

        Ok(Self {
            name: name.to_string(),
            storage,
            admission,
            heap,
            next_index,
            in_flight: HashSet::new(),
            restored,
        })
    }

    fn counter_key(name: &str) -> String {
        format!("{}/next-index", name)
    }

    fn job_key(&self, index: u64) -> String {
        format!("{}/{:020}", self.name, index)
    }

    /// Schedules items and admits whatever fits
    ///
    /// Each item gets a new, strictly increasing index and is persisted as
    /// pending before it can be dispatched.
    ///
    /// # Returns
    ///
    /// The jobs admitted by this call, possibly including older pending ones
    pub fn push(&mut self, items: Vec<T>) -> StorageResult<Vec<Dispatch<T>>> {
        if !items.is_empty() {
            let mut guard = lock(&self.storage)?;
            for item in items {
                let index = self.next_index;
                self.next_index += 1;

                let raw = serde_json::to_string(&item)?;
                guard.put(Partition::Pending, &self.job_key(index), &raw)?;
                guard.put(
                    Partition::Meta,
                    &Self::counter_key(&self.name),
                    &self.next_index.to_string(),
                )?;
                self.heap.push(Queued { index, item });
            }
        }
        self.check_ready()
    }

    /// Admits the highest-priority pending jobs while slots are free
    ///
    /// Admission stops when the modulator is paused, the shared bound is
    /// reached or nothing is pending.
    pub fn check_ready(&mut self) -> StorageResult<Vec<Dispatch<T>>> {
        let mut ready = Vec::new();

        while !self.heap.is_empty() && self.admission.try_acquire() {
            let Some(queued) = self.heap.pop() else {
                self.admission.release();
                break;
            };

            let key = self.job_key(queued.index);
            let moved = serde_json::to_string(&queued.item)
                .map_err(StorageError::from)
                .and_then(|raw| {
                    let mut guard = lock(&self.storage)?;
                    guard.put(Partition::Inflight, &key, &raw)?;
                    guard.delete(Partition::Pending, &key)
                });

            if let Err(e) = moved {
                self.admission.release();
                self.heap.push(queued);
                return Err(e);
            }

            self.in_flight.insert(queued.index);
            ready.push(Dispatch {
                index: queued.index,
                item: queued.item,
            });
        }

        Ok(ready)
    }

    /// Completes a dispatched job and admits whatever its slot frees up
    ///
    /// Finishing an index that is not in flight only re-runs admission.
    pub fn finished(&mut self, index: u64) -> StorageResult<Vec<Dispatch<T>>> {
        if self.in_flight.remove(&index) {
            lock(&self.storage)?.delete(Partition::Inflight, &self.job_key(index))?;
            self.admission.release();
        }
        self.check_ready()
    }

    /// Number of jobs waiting for a slot
    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    /// Number of this scheduler's jobs currently dispatched
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of pending jobs found when the scheduler was opened
    pub fn restored(&self) -> usize {
        self.restored
    }

    /// Iterates over pending items in no particular order
    pub fn pending_items(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|queued| &queued.item)
    }
}

#[cfg(test)]
mod tests {
    use crate::scheduler::{Comparator, Modulator};
    use crate::storage::{shared, Partition, SqliteStorage, Storage};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn smallest_first() -> Comparator<u32> {
        Arc::new(|a: &u32, b: &u32| a.cmp(b))
    }

    fn modulator(concurrency: usize) -> Modulator {
        Modulator::new(shared(SqliteStorage::in_memory().unwrap()), concurrency)
    }

    #[test]
    fn test_push_dispatches_up_to_bound() {
        let m = modulator(2);
        let mut s = m.create("jobs", smallest_first()).unwrap();

        let ready = s.push(vec![30, 10, 20]).unwrap();
        let items: Vec<u32> = ready.iter().map(|d| d.item).collect();
        assert_eq!(items, vec![10, 20]);
        assert_eq!(s.pending(), 1);
        assert_eq!(s.in_flight(), 2);
    }

    #[test]
    fn test_priority_order_among_pending() {
        let m = modulator(1);
        let mut s = m.create("jobs", smallest_first()).unwrap();
        m.pause();
        assert!(s.push(vec![30, 10, 20]).unwrap().is_empty());
        m.unpause();

        let first = s.check_ready().unwrap();
        assert_eq!(first[0].item, 10);
        let second = s.finished(first[0].index).unwrap();
        assert_eq!(second[0].item, 20);
        let third = s.finished(second[0].index).unwrap();
        assert_eq!(third[0].item, 30);
        assert!(s.finished(third[0].index).unwrap().is_empty());
        assert_eq!((s.pending(), s.in_flight()), (0, 0));
    }

    #[test]
    fn test_indices_strictly_increase() {
        let m = modulator(10);
        let mut s = m.create("jobs", smallest_first()).unwrap();
        let a = s.push(vec![5, 5]).unwrap();
        let b = s.push(vec![5]).unwrap();
        assert!(a[0].index < a[1].index);
        assert!(a[1].index < b[0].index);
    }

    #[test]
    fn test_paused_admits_nothing() {
        let m = modulator(4);
        let mut s = m.create("jobs", smallest_first()).unwrap();
        m.pause();
        assert!(s.push(vec![1, 2]).unwrap().is_empty());
        assert_eq!(s.pending(), 2);
        m.unpause();
        assert_eq!(s.check_ready().unwrap().len(), 2);
    }

    #[test]
    fn test_finished_unknown_index_is_noop() {
        let m = modulator(1);
        let mut s = m.create("jobs", smallest_first()).unwrap();
        let ready = s.push(vec![1]).unwrap();
        assert!(s.finished(999).unwrap().is_empty());
        assert_eq!(m.active(), 1);
        s.finished(ready[0].index).unwrap();
        assert_eq!(m.active(), 0);
    }

    #[test]
    fn test_bound_is_shared_between_schedulers() {
        let m = modulator(2);
        let mut a = m.create("a", smallest_first()).unwrap();
        let mut b = m.create("b", smallest_first()).unwrap();

        assert_eq!(a.push(vec![1]).unwrap().len(), 1);
        assert_eq!(b.push(vec![1, 2]).unwrap().len(), 1);
        assert_eq!(m.active(), 2);
        assert_eq!(b.pending(), 1);
    }

    #[test]
    fn test_in_flight_never_exceeds_bound() {
        let concurrency = 3;
        let m = modulator(concurrency);
        let mut s = m.create("jobs", smallest_first()).unwrap();
        let mut running: Vec<u64> = Vec::new();

        // Deterministic pseudo-random interleaving of pushes and completions
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for step in 0..500u32 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;

            let admitted = if seed % 3 != 0 || running.is_empty() {
                s.push(vec![(seed % 100) as u32]).unwrap()
            } else {
                let pick = (seed as usize / 3) % running.len();
                let index = running.swap_remove(pick);
                s.finished(index).unwrap()
            };
            running.extend(admitted.iter().map(|d| d.index));

            assert!(running.len() <= concurrency, "step {}", step);
            assert_eq!(s.in_flight(), running.len());
            assert!(m.active() <= concurrency);
        }
    }

    #[test]
    fn test_reopen_requeues_interrupted_jobs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.db");

        let dispatched = {
            let m = Modulator::new(shared(SqliteStorage::new(&path).unwrap()), 1);
            let mut s = m.create("jobs", smallest_first()).unwrap();
            let ready = s.push(vec![7, 8, 9]).unwrap();
            assert_eq!(ready.len(), 1);
            ready[0].clone()
        };

        let storage = shared(SqliteStorage::new(&path).unwrap());
        let m = Modulator::new(Arc::clone(&storage), 5);
        let mut s = m.create("jobs", smallest_first()).unwrap();
        assert_eq!(s.restored(), 3);
        assert_eq!(
            storage.lock().unwrap().count(Partition::Inflight).unwrap(),
            0
        );

        let ready = s.check_ready().unwrap();
        let items: Vec<u32> = ready.iter().map(|d| d.item).collect();
        assert_eq!(items, vec![7, 8, 9]);
        assert!(ready.iter().any(|d| d.index == dispatched.index));

        // New jobs continue the index sequence
        let later = s.push(vec![1]).unwrap();
        assert!(later[0].index > 2);
    }

    #[test]
    fn test_finished_jobs_do_not_return() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.db");

        {
            let m = Modulator::new(shared(SqliteStorage::new(&path).unwrap()), 1);
            let mut s = m.create("jobs", smallest_first()).unwrap();
            let ready = s.push(vec![1, 2]).unwrap();
            s.finished(ready[0].index).unwrap();
        }

        let m = Modulator::new(shared(SqliteStorage::new(&path).unwrap()), 1);
        let s = m.create::<u32>("jobs", smallest_first()).unwrap();
        assert_eq!(s.restored(), 1);
        assert_eq!(s.pending_items().copied().collect::<Vec<_>>(), vec![2]);
    }
}
