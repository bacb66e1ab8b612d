//! What the trainer needs from a data-parallel execution engine.
//!
//! Training only relies on three things: running a function over every
//! partition of a collection, handing a read-only value to all partitions, and
//! combining keyed partial results. [`Executor`] names those operations and
//! [`LocalExecutor`] provides them in-process on a rayon thread pool.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use crate::error::{Error, Result};

/// A collection split into partitions, each processed as one unit.
#[derive(Debug, Clone)]
pub struct Partitioned<T> {
    partitions: Vec<Vec<T>>,
}

impl<T> Partitioned<T> {
    /// Split `items` into `num_partitions` contiguous, nearly equal slices.
    pub fn split(mut items: Vec<T>, num_partitions: usize) -> Self {
        let total = items.len();
        let mut partitions: Vec<Vec<T>> = (0..num_partitions)
            .rev()
            .map(|i| {
                let start = total * i / num_partitions;
                items.split_off(start)
            })
            .collect();
        partitions.reverse();
        Partitioned { partitions }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition(&self, index: usize) -> &[T] {
        &self.partitions[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.partitions.iter().map(Vec::as_slice)
    }
}

/// A value published read-only to every partition until destroyed.
#[derive(Debug)]
pub struct Broadcast<T> {
    id: u64,
    value: Arc<T>,
}

impl<T> Broadcast<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Release the published value.
    pub fn destroy(self) {
        debug!("destroying broadcast {}", self.id);
    }
}

pub trait Executor {
    fn parallelize<T: Send>(&self, items: Vec<T>, num_partitions: usize) -> Partitioned<T> {
        Partitioned::split(items, num_partitions)
    }

    fn broadcast<T: Send + Sync>(&self, value: T) -> Broadcast<T>;

    /// Run `f(partition_index, partition)` for every partition. Results are
    /// returned in partition order.
    fn map_partitions<T, R, F>(&self, data: &Partitioned<T>, f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &[T]) -> R + Sync + Send;

    /// Group `(key, value)` records from all partitions by key and fold the
    /// values of each key with `combine`. The result is sorted by key.
    fn reduce_by_key<K, V, F>(&self, partials: Vec<Vec<(K, V)>>, combine: F) -> Vec<(K, V)>
    where
        K: Ord + Send,
        V: Send,
        F: Fn(V, V) -> V + Sync + Send;
}

/// Runs partitions as tasks on a dedicated rayon pool.
pub struct LocalExecutor {
    pool: rayon::ThreadPool,
    next_broadcast_id: AtomicU64,
}

impl LocalExecutor {
    /// `num_threads` of `None` uses rayon's default (one per core).
    pub fn new(num_threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("skipgram-worker-{i}"));
        if let Some(n) = num_threads {
            if n == 0 {
                return Err(Error::Configuration(
                    "number of threads must be positive".to_string(),
                ));
            }
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|err| Error::Configuration(format!("failed to start thread pool: {err}")))?;
        Ok(LocalExecutor {
            pool,
            next_broadcast_id: AtomicU64::new(0),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Executor for LocalExecutor {
    fn broadcast<T: Send + Sync>(&self, value: T) -> Broadcast<T> {
        let id = self.next_broadcast_id.fetch_add(1, Ordering::Relaxed);
        debug!("created broadcast {id}");
        Broadcast {
            id,
            value: Arc::new(value),
        }
    }

    fn map_partitions<T, R, F>(&self, data: &Partitioned<T>, f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &[T]) -> R + Sync + Send,
    {
        self.pool.install(|| {
            data.partitions
                .par_iter()
                .enumerate()
                .map(|(i, partition)| f(i, partition))
                .collect()
        })
    }

    fn reduce_by_key<K, V, F>(&self, partials: Vec<Vec<(K, V)>>, combine: F) -> Vec<(K, V)>
    where
        K: Ord + Send,
        V: Send,
        F: Fn(V, V) -> V + Sync + Send,
    {
        // Partials are folded in partition order so floating-point sums come
        // out the same on every run.
        let mut merged: BTreeMap<K, V> = BTreeMap::new();
        for partial in partials {
            for (key, value) in partial {
                let value = match merged.remove(&key) {
                    Some(prev) => combine(prev, value),
                    None => value,
                };
                merged.insert(key, value);
            }
        }
        merged.into_iter().collect()
    }
}
