use crossbeam_utils::thread;

/// Provides the worker fan-out used by the collision pipeline.
///
/// Work is split into contiguous chunks, one per worker, and the per-worker results are handed back in
/// chunk order. Callers merge them serially, so the outcome does not depend on scheduling.
#[derive(Debug, Clone, Copy)]
pub struct ThreadDispatcher {
    thread_count: usize,
}

impl Default for ThreadDispatcher {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ThreadDispatcher {
    /// Creates a dispatcher. A count of zero is treated as one.
    pub fn new(thread_count: usize) -> Self {
        Self {
            thread_count: thread_count.max(1),
        }
    }

    /// Gets the number of workers available in the thread dispatcher.
    #[inline(always)]
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Runs `worker_body` over contiguous chunks of `items` and returns each worker's result in chunk order.
    ///
    /// With a single worker, or too little work to split, the body runs inline on the calling thread.
    /// A panic on a worker is resumed on the caller.
    pub fn dispatch_chunks<T, R, F>(&self, items: &mut [T], worker_body: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(usize, &mut [T]) -> R + Sync,
    {
        if self.thread_count <= 1 || items.len() < 2 {
            return vec![worker_body(0, items)];
        }
        let chunk_size = (items.len() + self.thread_count - 1) / self.thread_count;
        let body = &worker_body;
        thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks_mut(chunk_size)
                .enumerate()
                .map(|(worker_index, chunk)| scope.spawn(move |_| body(worker_index, chunk)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect()
        })
        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_come_back_in_chunk_order() {
        let dispatcher = ThreadDispatcher::new(4);
        let mut items: Vec<u32> = (0..10).collect();
        let results = dispatcher.dispatch_chunks(&mut items, |worker_index, chunk| {
            for item in chunk.iter_mut() {
                *item *= 2;
            }
            (worker_index, chunk.to_vec())
        });
        let flattened: Vec<u32> = results.iter().flat_map(|(_, chunk)| chunk.iter().copied()).collect();
        assert_eq!(flattened, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        for (expected, (worker_index, _)) in results.iter().enumerate() {
            assert_eq!(expected, *worker_index);
        }
    }

    #[test]
    fn single_worker_runs_inline() {
        let dispatcher = ThreadDispatcher::new(0);
        assert_eq!(dispatcher.thread_count(), 1);
        let mut items = vec![1, 2, 3];
        let sums = dispatcher.dispatch_chunks(&mut items, |_, chunk| chunk.iter().sum::<i32>());
        assert_eq!(sums, vec![6]);
    }
}
