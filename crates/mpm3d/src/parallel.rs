//! Fixed-size worker pool for the per-step stages.
//!
//! Each call splits its slice into one contiguous range per worker, starts a
//! fresh rayon pool with one thread per range, and returns only after every
//! range has finished and the pool is dropped. That join is the barrier
//! between pipeline stages; no threads outlive a call.

use std::ops::Range;

use rayon::{ThreadPool, ThreadPoolBuilder};

/// Split `[0, len)` into at most `workers` contiguous, non-empty ranges.
///
/// Each range takes `ceil(remaining / workers_left)` elements, so earlier
/// ranges are never shorter than later ones and sizes differ by at most one.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    assert!(workers > 0, "cannot partition work across zero workers");
    let mut ranges = Vec::with_capacity(workers.min(len));
    let mut start = 0;
    for workers_left in (1..=workers).rev() {
        let remaining = len - start;
        if remaining == 0 {
            break;
        }
        let size = remaining.div_ceil(workers_left);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

pub struct ParallelExecutor {
    workers: usize,
}

impl ParallelExecutor {
    /// Executor that splits every call across `workers` threads. Panics on zero.
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "executor needs at least one worker");
        log::debug!("Parallel executor configured with {workers} workers");
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Pool for a single call, one thread per range.
    fn start_pool(threads: usize) -> ThreadPool {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mpm-worker-{i}"))
            .build()
            .unwrap_or_else(|e| panic!("failed to start {threads} worker threads: {e}"))
    }

    /// Run `op` on every element. Returns after all ranges complete.
    pub fn for_each<T, F>(&self, items: &[T], op: F)
    where
        T: Sync,
        F: Fn(&T) + Sync,
    {
        let ranges = partition(items.len(), self.workers);
        if ranges.is_empty() {
            return;
        }
        let op = &op;
        Self::start_pool(ranges.len()).scope(|scope| {
            for range in ranges {
                let chunk = &items[range];
                scope.spawn(move |_| chunk.iter().for_each(op));
            }
        });
    }

    /// Run `op` on every element with exclusive access to it.
    pub fn for_each_mut<T, F>(&self, items: &mut [T], op: F)
    where
        T: Send,
        F: Fn(&mut T) + Sync,
    {
        let ranges = partition(items.len(), self.workers);
        if ranges.is_empty() {
            return;
        }
        let op = &op;
        Self::start_pool(ranges.len()).scope(|scope| {
            let mut rest = items;
            for range in ranges {
                let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
                rest = tail;
                scope.spawn(move |_| chunk.iter_mut().for_each(op));
            }
        });
    }
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("workers", &self.workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread::ThreadId;

    fn assert_covers(ranges: &[Range<usize>], len: usize) {
        let mut next = 0;
        for range in ranges {
            assert_eq!(range.start, next, "ranges not contiguous: {ranges:?}");
            assert!(!range.is_empty(), "empty range dispatched: {ranges:?}");
            next = range.end;
        }
        assert_eq!(next, len);
    }

    #[test]
    fn test_partition_even_split() {
        assert_eq!(partition(8, 4), vec![0..2, 2..4, 4..6, 6..8]);
    }

    #[test]
    fn test_partition_remainder_goes_first() {
        let ranges = partition(10, 4);
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
        assert_covers(&ranges, 10);
    }

    #[test]
    fn test_partition_fewer_items_than_workers() {
        let ranges = partition(3, 8);
        assert_eq!(ranges, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_partition_empty() {
        assert!(partition(0, 4).is_empty());
    }

    #[test]
    fn test_partition_balance() {
        for len in 0..50 {
            for workers in 1..9 {
                let ranges = partition(len, workers);
                assert_covers(&ranges, len);
                assert!(ranges.len() <= workers);
                if let (Some(max), Some(min)) = (
                    ranges.iter().map(|r| r.len()).max(),
                    ranges.iter().map(|r| r.len()).min(),
                ) {
                    assert!(max - min <= 1, "unbalanced split of {len} over {workers}: {ranges:?}");
                }
            }
        }
    }

    #[test]
    fn test_for_each_visits_every_element_once() {
        let executor = ParallelExecutor::new(3);
        let items: Vec<usize> = (0..101).collect();
        let sum = AtomicUsize::new(0);
        let count = AtomicUsize::new(0);
        executor.for_each(&items, |&i| {
            sum.fetch_add(i, Ordering::Relaxed);
            count.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(count.load(Ordering::Relaxed), 101);
        assert_eq!(sum.load(Ordering::Relaxed), 100 * 101 / 2);
    }

    #[test]
    fn test_for_each_mut_writes_in_place() {
        let executor = ParallelExecutor::new(4);
        let mut items: Vec<u32> = (0..37).collect();
        executor.for_each_mut(&mut items, |x| *x *= 2);
        assert_eq!(items, (0..37).map(|x| x * 2).collect::<Vec<_>>());
    }

    fn worker_threads(executor: &ParallelExecutor) -> HashSet<ThreadId> {
        let seen = Mutex::new(HashSet::new());
        let items: Vec<u32> = (0..64).collect();
        executor.for_each(&items, |_| {
            let thread = std::thread::current();
            assert!(thread.name().is_some_and(|name| name.starts_with("mpm-worker-")));
            seen.lock().unwrap().insert(thread.id());
        });
        seen.into_inner().unwrap()
    }

    #[test]
    fn test_each_call_gets_its_own_threads() {
        let executor = ParallelExecutor::new(3);
        let first = worker_threads(&executor);
        let second = worker_threads(&executor);
        assert!(!first.is_empty() && first.len() <= 3, "{} threads", first.len());
        assert!(first.is_disjoint(&second), "threads reused across calls");
    }

    #[test]
    fn test_empty_input_dispatches_nothing() {
        let executor = ParallelExecutor::new(2);
        let calls = AtomicUsize::new(0);
        executor.for_each(&[] as &[u8], |_| {
            calls.fetch_add(1, Ordering::Relaxed);
        });
        let mut empty: Vec<u8> = Vec::new();
        executor.for_each_mut(&mut empty, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn test_zero_workers_panics() {
        ParallelExecutor::new(0);
    }

    #[test]
    #[should_panic(expected = "worker failure")]
    fn test_worker_panic_propagates() {
        let executor = ParallelExecutor::new(2);
        executor.for_each(&[1, 2, 3, 4], |&x| {
            if x == 3 {
                panic!("worker failure");
            }
        });
    }
}
