
//! A bounded pool of worker threads for the tiles of a single pass.
//! Without the `rayon` feature, or when no threads can be spawned,
//! all work runs on the calling thread.

use crate::error::Result;


/// Runs independent tasks, either on a thread pool or sequentially.
#[derive(Debug)]
pub struct WorkerPool {

    #[cfg(feature = "rayon")]
    pool: Option<rayon_core::ThreadPool>,
}

impl Default for WorkerPool {
    fn default() -> Self { Self::sequential() }
}

impl WorkerPool {

    /// Run every task on the calling thread.
    pub fn sequential() -> Self {
        WorkerPool {
            #[cfg(feature = "rayon")]
            pool: None,
        }
    }

    /// Create a pool with the specified number of threads, or one per cpu if zero.
    /// Reverts to sequential processing if the threads cannot be created.
    #[cfg(feature = "rayon")]
    pub fn new(thread_count: usize) -> Self {
        let maybe_pool = rayon_core::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|index| format!("pik worker thread #{}", index))
            .build();

        // in case thread pool creation fails (for example on WASM currently),
        // we revert to sequential processing
        match maybe_pool {
            Ok(pool) => WorkerPool { pool: Some(pool) },
            Err(error) => {
                tracing::debug!(%error, "falling back to sequential processing");
                Self::sequential()
            }
        }
    }

    /// Without the `rayon` feature, the pool always processes sequentially.
    #[cfg(not(feature = "rayon"))]
    pub fn new(_thread_count: usize) -> Self {
        Self::sequential()
    }

    /// The number of tasks that may run at the same time.
    pub fn thread_count(&self) -> usize {
        #[cfg(feature = "rayon")] {
            if let Some(pool) = &self.pool {
                return pool.current_num_threads().max(1);
            }
        }

        1
    }

    /// Run `task` for every index in `0 .. count` and collect the results in index order.
    /// Once a task fails, tasks that have not started yet are skipped
    /// and the error of the failed task with the lowest index is returned.
    pub fn run_parallel_for<T: Send>(
        &self, count: usize, task: impl Fn(usize) -> Result<T> + Sync
    ) -> Result<Vec<T>>
    {
        #[cfg(feature = "rayon")] {
            if let Some(pool) = &self.pool {
                if count > 1 {
                    return run_on_pool(pool, count, &task);
                }
            }
        }

        (0 .. count).map(task).collect()
    }

    /// Run `task` once on each thread of the pool, passing the thread index.
    pub fn run_on_each_thread(&self, task: impl Fn(usize) + Sync) {
        #[cfg(feature = "rayon")] {
            if let Some(pool) = &self.pool {
                pool.broadcast(|context| task(context.index()));
                return;
            }
        }

        task(0)
    }
}

#[cfg(feature = "rayon")]
fn run_on_pool<T: Send>(
    pool: &rayon_core::ThreadPool, count: usize, task: &(impl Fn(usize) -> Result<T> + Sync)
) -> Result<Vec<T>>
{
    use std::sync::atomic::{AtomicBool, Ordering};

    let failed = AtomicBool::new(false);
    let (sender, receiver) = flume::unbounded();

    pool.scope(|scope| {
        for index in 0 .. count {
            let sender = sender.clone();
            let failed = &failed;

            scope.spawn(move |_| {
                if failed.load(Ordering::Relaxed) { return; }

                let result = task(index);
                if result.is_err() { failed.store(true, Ordering::Relaxed); }

                // the receiver outlives the scope
                let _ = sender.send((index, result));
            });
        }
    });

    drop(sender);
    collect_in_order(count, receiver.drain())
}

/// Sort results by index, returning the first error in index order.
#[cfg(feature = "rayon")]
fn collect_in_order<T>(count: usize, results: impl Iterator<Item = (usize, Result<T>)>) -> Result<Vec<T>> {
    let mut slots: Vec<Option<Result<T>>> = (0 .. count).map(|_| None).collect();
    for (index, result) in results { slots[index] = Some(result); }

    let mut values = Vec::with_capacity(count);
    let mut first_error = None;

    for slot in slots {
        match slot {
            Some(Ok(value)) => values.push(value),
            Some(Err(error)) => { first_error.get_or_insert(error); },
            None => {},
        }
    }

    match first_error {
        Some(error) => Err(error),
        None if values.len() == count => Ok(values),
        None => Err(crate::error::Error::invalid("worker task did not complete")),
    }
}
