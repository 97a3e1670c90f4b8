//! Cancellable delayed actions

use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio_util::sync::CancellationToken;

/// Schedules one-shot delayed actions on a tokio runtime.
#[derive(Debug, Clone)]
pub struct Timer {
    runtime: Handle,
}

impl Timer {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Timer bound to the runtime the caller is running on
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    /// Run `action` once `delay` has elapsed, unless cancelled first.
    ///
    /// A zero delay fires on the next scheduler turn. The action runs on a
    /// runtime worker and must not block for long.
    pub fn schedule<F>(&self, delay: Duration, action: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let guard = token.clone();
        let deadline = tokio::time::Instant::now() + delay;

        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = guard.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    if !guard.is_cancelled() {
                        action();
                    }
                }
            }
        });

        TimerHandle { token }
    }
}

/// Cancels a scheduled action. Dropping the handle cancels it too.
///
/// Cancellation is a signal, not preemption: an action that already started
/// runs to completion, so actions re-check their own liveness before acting.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    /// Idempotent; safe from any thread, including from inside the action
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let read = {
            let count = count.clone();
            move || count.load(Ordering::SeqCst)
        };
        (count, read)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let timer = Timer::current().unwrap();
        let (count, fired) = counter();

        let _handle = timer.schedule(Duration::from_secs(10), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(9_999)).await;
        assert_eq!(fired(), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_fires_immediately() {
        let timer = Timer::current().unwrap();
        let (count, fired) = counter();

        let _handle = timer.schedule(Duration::ZERO, move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_action_never_runs() {
        let timer = Timer::current().unwrap();
        let (count, fired) = counter();

        let handle = timer.schedule(Duration::from_secs(5), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels() {
        let timer = Timer::current().unwrap();
        let (count, fired) = counter();

        drop(timer.schedule(Duration::from_secs(5), move || {
            count.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_from_inside_action_does_not_deadlock() {
        let timer = Timer::current().unwrap();
        let (count, fired) = counter();
        let slot: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));

        let inner_slot = slot.clone();
        let handle = timer.schedule(Duration::from_secs(1), move || {
            if let Some(h) = inner_slot.lock().unwrap().as_ref() {
                h.cancel();
            }
            count.fetch_add(1, Ordering::SeqCst);
        });
        *slot.lock().unwrap() = Some(handle);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired(), 1);
    }

    #[test]
    fn current_fails_outside_runtime() {
        assert!(Timer::current().is_err());
    }
}
