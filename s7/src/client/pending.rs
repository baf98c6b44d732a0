use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::client::request::ReadResponse;
use crate::error::RequestError;

/// Final outcome of a read request
pub type ReadResult = Result<ReadResponse, RequestError>;

type Continuation = Box<dyn FnOnce(ReadResult) + Send + 'static>;

#[derive(Default)]
struct State {
    outcome: Option<ReadResult>,
    continuations: Vec<Continuation>,
}

struct Shared {
    state: Mutex<State>,
    condvar: Condvar,
    notify: tokio::sync::Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // a panicking continuation never holds the lock, so the state is always consistent
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// store the outcome if the cell is still empty, returning false otherwise
    fn complete(&self, outcome: ReadResult, run_continuations: bool) -> bool {
        let continuations = {
            let mut state = self.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            std::mem::take(&mut state.continuations)
        };

        self.condvar.notify_all();
        self.notify.notify_waiters();

        if run_continuations {
            for continuation in continuations {
                continuation(outcome.clone());
            }
        }

        true
    }
}

/// Handle to the eventual result of a read
///
/// The handle may be cloned freely. Every clone observes the same outcome, and
/// any mix of the consumption styles below may be used concurrently:
///
/// * [`wait`](Self::wait) and [`wait_timeout`](Self::wait_timeout) block the calling thread
/// * [`response`](Self::response) suspends an async task
/// * [`on_complete`](Self::on_complete) registers a callback
/// * [`is_done`](Self::is_done) and [`try_get`](Self::try_get) poll without blocking
///
/// The blocking methods must not be called from within an async runtime's worker thread.
#[derive(Clone)]
pub struct PendingRead {
    shared: Arc<Shared>,
}

/// Write side of a [`PendingRead`], owned by the session task
///
/// Dropping it without completing the read completes it with
/// [`RequestError::Shutdown`].
pub(crate) struct Promise {
    shared: Option<Arc<Shared>>,
}

/// create a connected [`Promise`] / [`PendingRead`] pair
pub(crate) fn pending() -> (Promise, PendingRead) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::default()),
        condvar: Condvar::new(),
        notify: tokio::sync::Notify::new(),
    });
    (
        Promise {
            shared: Some(shared.clone()),
        },
        PendingRead { shared },
    )
}

impl Promise {
    pub(crate) fn complete(mut self, outcome: ReadResult) {
        if let Some(shared) = self.shared.take() {
            shared.complete(outcome, true);
        }
    }

    pub(crate) fn success(self, response: ReadResponse) {
        self.complete(Ok(response))
    }

    pub(crate) fn failure(self, err: RequestError) {
        self.complete(Err(err))
    }

    /// true if the reader side already holds an outcome, e.g. after `cancel`
    pub(crate) fn is_complete(&self) -> bool {
        self.shared
            .as_ref()
            .map_or(true, |x| x.lock().outcome.is_some())
    }
}

impl Drop for Promise {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.complete(Err(RequestError::Shutdown), true);
        }
    }
}

impl PendingRead {
    /// block the calling thread until the read completes
    pub fn wait(&self) -> ReadResult {
        let guard = self.shared.lock();
        let guard = self
            .shared
            .condvar
            .wait_while(guard, |state| state.outcome.is_none())
            .unwrap_or_else(|err| err.into_inner());
        match &guard.outcome {
            Some(outcome) => outcome.clone(),
            // wait_while only returns once the outcome is set
            None => Err(RequestError::Shutdown),
        }
    }

    /// block the calling thread until the read completes or `timeout` elapses
    ///
    /// Returns `None` on timeout. The read itself keeps running and may still
    /// be observed later.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ReadResult> {
        let guard = self.shared.lock();
        let (guard, _) = self
            .shared
            .condvar
            .wait_timeout_while(guard, timeout, |state| state.outcome.is_none())
            .unwrap_or_else(|err| err.into_inner());
        guard.outcome.clone()
    }

    /// wait asynchronously for the read to complete
    pub async fn response(&self) -> ReadResult {
        loop {
            // registered on creation, so a completion between the check and the await is not lost
            let notified = self.shared.notify.notified();
            if let Some(outcome) = self.try_get() {
                return outcome;
            }
            notified.await;
        }
    }

    /// register a callback invoked exactly once with the outcome
    ///
    /// If the read is still outstanding, the callback runs on the thread that
    /// completes it. If it has already completed, the callback runs
    /// immediately on the calling thread. Callbacks registered before a
    /// [`cancel`](Self::cancel) are discarded without being run.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(ReadResult) + Send + 'static,
    {
        let mut state = self.shared.lock();
        match &state.outcome {
            Some(outcome) => {
                let outcome = outcome.clone();
                drop(state);
                callback(outcome);
            }
            None => state.continuations.push(Box::new(callback)),
        }
    }

    /// true once an outcome is available
    pub fn is_done(&self) -> bool {
        self.shared.lock().outcome.is_some()
    }

    /// the outcome, if available, without blocking
    pub fn try_get(&self) -> Option<ReadResult> {
        self.shared.lock().outcome.clone()
    }

    /// complete the read with [`RequestError::Cancelled`] if it is still outstanding
    ///
    /// Returns true if this call completed the read. Registered callbacks are
    /// dropped without running and frames not yet sent for this read are skipped.
    pub fn cancel(&self) -> bool {
        self.shared.complete(Err(RequestError::Cancelled), false)
    }
}

impl std::fmt::Debug for PendingRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRead")
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::address::resolve;
    use crate::types::Value;

    fn response(value: u8) -> ReadResponse {
        ReadResponse::new(vec![(resolve("INPUTS/0").unwrap(), Ok(Value::Byte(value)))])
    }

    #[test]
    fn polling_sees_the_completed_value() {
        let (promise, read) = pending();
        assert!(!read.is_done());
        assert_eq!(read.try_get(), None);
        promise.success(response(1));
        assert!(read.is_done());
        assert_eq!(read.try_get(), Some(Ok(response(1))));
        assert_eq!(read.wait(), Ok(response(1)));
    }

    #[test]
    fn wait_blocks_until_another_thread_completes() {
        let (promise, read) = pending();
        let waiter = {
            let read = read.clone();
            std::thread::spawn(move || read.wait())
        };
        std::thread::sleep(Duration::from_millis(20));
        promise.success(response(2));
        assert_eq!(waiter.join().unwrap(), Ok(response(2)));
    }

    #[test]
    fn wait_timeout_returns_none_while_outstanding() {
        let (promise, read) = pending();
        assert_eq!(read.wait_timeout(Duration::from_millis(10)), None);
        promise.failure(RequestError::Timeout);
        assert_eq!(
            read.wait_timeout(Duration::from_millis(10)),
            Some(Err(RequestError::Timeout))
        );
    }

    #[tokio::test]
    async fn async_and_blocking_observers_see_the_same_outcome() {
        let (promise, read) = pending();
        let blocking = {
            let read = read.clone();
            std::thread::spawn(move || read.wait())
        };
        let task = {
            let read = read.clone();
            tokio::spawn(async move { read.response().await })
        };
        tokio::task::yield_now().await;
        promise.success(response(3));
        assert_eq!(task.await.unwrap(), Ok(response(3)));
        assert_eq!(blocking.join().unwrap(), Ok(response(3)));
        assert_eq!(read.response().await, Ok(response(3)));
    }

    #[test]
    fn continuation_runs_once_on_completion() {
        let (promise, read) = pending();
        let count = Arc::new(AtomicUsize::new(0));
        let observed = Arc::new(Mutex::new(None));
        {
            let count = count.clone();
            let observed = observed.clone();
            read.on_complete(move |result| {
                count.fetch_add(1, Ordering::SeqCst);
                *observed.lock().unwrap() = Some(result);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        promise.success(response(4));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*observed.lock().unwrap(), Some(Ok(response(4))));
    }

    #[test]
    fn concurrent_observers_all_see_the_single_outcome() {
        const CONTINUATIONS: usize = 8;
        const WAITERS: usize = 8;

        fn observe(
            read: &PendingRead,
            calls: &Arc<AtomicUsize>,
            tx: &std::sync::mpsc::Sender<ReadResult>,
            barrier: Option<Arc<std::sync::Barrier>>,
        ) -> Vec<std::thread::JoinHandle<()>> {
            let mut threads = Vec::new();
            for index in 0..CONTINUATIONS + WAITERS {
                let (read, calls, tx, barrier) =
                    (read.clone(), calls.clone(), tx.clone(), barrier.clone());
                threads.push(std::thread::spawn(move || {
                    if let Some(barrier) = barrier {
                        barrier.wait();
                    }
                    if index < CONTINUATIONS {
                        read.on_complete(move |result| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            let _ = tx.send(result);
                        });
                    } else {
                        let _ = tx.send(read.wait());
                    }
                }));
            }
            threads
        }

        let (promise, read) = pending();
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = std::sync::mpsc::channel();

        // observers race the completion
        let barrier = Arc::new(std::sync::Barrier::new(CONTINUATIONS + WAITERS + 1));
        let mut threads = observe(&read, &calls, &tx, Some(barrier.clone()));
        barrier.wait();
        promise.success(response(6));

        // observers attached after completion
        threads.extend(observe(&read, &calls, &tx, None));

        for thread in threads {
            thread.join().unwrap();
        }
        drop(tx);

        let outcomes: Vec<ReadResult> = rx.iter().collect();
        assert_eq!(outcomes.len(), 2 * (CONTINUATIONS + WAITERS));
        assert!(outcomes.iter().all(|x| *x == Ok(response(6))));
        assert_eq!(calls.load(Ordering::SeqCst), 2 * CONTINUATIONS);
    }

    #[test]
    fn continuation_runs_inline_when_already_complete() {
        let (promise, read) = pending();
        promise.failure(RequestError::Io(std::io::ErrorKind::ConnectionReset));
        let caller = std::thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));
        {
            let ran_on = ran_on.clone();
            read.on_complete(move |result| {
                assert_eq!(
                    result,
                    Err(RequestError::Io(std::io::ErrorKind::ConnectionReset))
                );
                *ran_on.lock().unwrap() = Some(std::thread::current().id());
            });
        }
        assert_eq!(*ran_on.lock().unwrap(), Some(caller));
    }

    #[test]
    fn cancel_discards_continuations_and_later_writes() {
        let (promise, read) = pending();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = count.clone();
            read.on_complete(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(read.cancel());
        assert!(promise.is_complete());
        assert!(!read.cancel());
        promise.success(response(5));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(read.wait(), Err(RequestError::Cancelled));
    }

    #[test]
    fn dropped_promise_completes_with_shutdown() {
        let (promise, read) = pending();
        drop(promise);
        assert_eq!(read.try_get(), Some(Err(RequestError::Shutdown)));
    }
}
