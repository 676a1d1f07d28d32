//! Capacity-weighted worker selection.

use crate::config::WorkerEntry;
use crate::error::{ClusterError, ClusterResult};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use std::sync::{Mutex, PoisonError};

/// A worker taken out of the idle set
///
/// Hand it back with [`WorkerPool::checkin`] once the request is answered.
#[derive(Debug, PartialEq, Eq)]
pub struct WorkerHandle {
    index: usize,
    address: String,
    capacity: u32,
}

impl WorkerHandle {
    /// Worker address
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Worker capacity weight
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// Fixed set of workers and the subset currently idle
///
/// A worker is idle iff no request is outstanding to it. The lock only
/// guards selection and return, never a network round trip.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<WorkerEntry>,
    idle: Mutex<Vec<usize>>,
    total_capacity: u64,
}

impl WorkerPool {
    /// Create a pool with every worker idle
    ///
    /// # Errors
    ///
    /// Returns `Config` if any worker has zero capacity
    pub fn new(workers: Vec<WorkerEntry>) -> ClusterResult<Self> {
        if let Some(bad) = workers.iter().find(|w| w.capacity == 0) {
            return Err(ClusterError::Config(format!(
                "worker {} has zero capacity",
                bad.address
            )));
        }
        let total_capacity = workers.iter().map(|w| u64::from(w.capacity)).sum();
        Ok(Self {
            idle: Mutex::new((0..workers.len()).collect()),
            workers,
            total_capacity,
        })
    }

    /// All configured workers
    #[must_use]
    pub fn workers(&self) -> &[WorkerEntry] {
        &self.workers
    }

    /// Sum of every worker's capacity, busy or not
    #[must_use]
    pub fn total_capacity(&self) -> u64 {
        self.total_capacity
    }

    /// Number of idle workers
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Take an idle worker chosen with probability proportional to its
    /// capacity among the idle ones
    #[must_use]
    pub fn checkout(&self) -> Option<WorkerHandle> {
        self.checkout_with(&mut rand::thread_rng())
    }

    /// [`checkout`](Self::checkout) with a caller-supplied random source
    pub fn checkout_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<WorkerHandle> {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.is_empty() {
            return None;
        }
        let weights = idle.iter().map(|&i| u64::from(self.workers[i].capacity));
        let chosen = WeightedIndex::new(weights).ok()?.sample(rng);
        let index = idle.swap_remove(chosen);
        drop(idle);

        let worker = &self.workers[index];
        Some(WorkerHandle {
            index,
            address: worker.address.clone(),
            capacity: worker.capacity,
        })
    }

    /// Return a worker to the idle set
    pub fn checkin(&self, handle: WorkerHandle) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if !idle.contains(&handle.index) {
            idle.push(handle.index);
        }
    }
}
