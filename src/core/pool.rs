//! Bounded-concurrency worker pool.
//!
//! Applies an async function to a list of inputs with at most `limit`
//! invocations in flight. Results are delivered as `(input, output)` pairs in
//! completion order, not submission order.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::error;

/// Progress snapshot passed to the progress hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Items finished so far (including panicked ones)
    pub completed: usize,
    /// Items submitted in total
    pub total: usize,
}

/// Callback invoked once per completed item
pub type ProgressHook = Arc<dyn Fn(Progress) + Send + Sync>;

/// Sliding window of at most `limit` concurrent tasks
#[derive(Clone)]
pub struct BoundedPool {
    limit: usize,
    progress: Option<ProgressHook>,
}

impl BoundedPool {
    /// Create a pool; a limit of zero is treated as one
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            progress: None,
        }
    }

    /// Report progress after every completed item
    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Start processing `inputs` and return the stream of results.
    ///
    /// Must be called from within a tokio runtime. The pool stops admitting
    /// new work once the receiver is dropped.
    pub fn run<I, T, F, Fut>(&self, inputs: Vec<I>, f: F) -> mpsc::Receiver<(I, T)>
    where
        I: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.limit);
        let limit = self.limit;
        let progress = self.progress.clone();

        tokio::spawn(async move {
            let total = inputs.len();
            let mut pending = inputs.into_iter();
            let mut in_flight = JoinSet::new();
            let mut completed = 0;

            let spawn_next = |set: &mut JoinSet<(I, T)>, pending: &mut std::vec::IntoIter<I>| {
                if let Some(input) = pending.next() {
                    let fut = f(input.clone());
                    set.spawn(async move { (input, fut.await) });
                }
            };

            for _ in 0..limit {
                spawn_next(&mut in_flight, &mut pending);
            }

            while let Some(joined) = in_flight.join_next().await {
                completed += 1;
                if let Some(hook) = &progress {
                    hook(Progress { completed, total });
                }

                match joined {
                    Ok(pair) => {
                        if tx.send(pair).await.is_err() {
                            // Receiver gone: finish nothing further
                            in_flight.abort_all();
                            break;
                        }
                    }
                    Err(e) => error!(error = %e, "Worker task failed"),
                }

                spawn_next(&mut in_flight, &mut pending);
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_all_inputs_are_processed() {
        let pool = BoundedPool::new(3);
        let mut rx = pool.run((0..20).collect(), |n: u32| async move { n * 2 });

        let mut seen = Vec::new();
        while let Some((input, output)) = rx.recv().await {
            assert_eq!(output, input * 2);
            seen.push(input);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let pool = BoundedPool::new(4);
        let (a, p) = (active.clone(), peak.clone());
        let mut rx = pool.run((0..32).collect(), move |_: u32| {
            let (active, peak) = (a.clone(), p.clone());
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        });

        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 32);
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_results_arrive_in_completion_order() {
        let pool = BoundedPool::new(2);
        let mut rx = pool.run(vec![50u64, 1], |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        });

        let (first, _) = rx.recv().await.unwrap();
        assert_eq!(first, 1);
    }

    #[tokio::test]
    async fn test_progress_hook_called_per_item() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let hook: ProgressHook = Arc::new(move |p| sink.lock().unwrap().push(p));

        let pool = BoundedPool::new(2).with_progress(hook);
        let mut rx = pool.run((0..5).collect(), |n: u8| async move { n });
        while rx.recv().await.is_some() {}

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 5);
        assert_eq!(reports.last(), Some(&Progress { completed: 5, total: 5 }));
    }

    #[tokio::test]
    async fn test_no_hook_and_empty_input() {
        let pool = BoundedPool::new(0);
        assert_eq!(pool.limit(), 1);
        let mut rx = pool.run(Vec::<u8>::new(), |n| async move { n });
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_panicking_task_is_skipped() {
        let pool = BoundedPool::new(2);
        let mut rx = pool.run(vec![1u8, 2, 3], |n| async move {
            if n == 2 {
                panic!("boom");
            }
            n
        });

        let mut outputs = Vec::new();
        while let Some((_, n)) = rx.recv().await {
            outputs.push(n);
        }
        outputs.sort_unstable();
        assert_eq!(outputs, vec![1, 3]);
    }
}
