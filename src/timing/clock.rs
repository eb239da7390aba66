use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};

/// Cooperative cancellation signal shared between a running playback and
/// whoever wants to stop it. Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug)]
struct CancelInner {
    cancelled: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = crossbeam::channel::bounded(1);
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                wake_tx,
                wake_rx,
            }),
        }
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            let _ = self.inner.wake_tx.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Blocks until cancelled.
    pub fn wait(&self) {
        if !self.is_cancelled() {
            let _ = self.inner.wake_rx.recv();
        }
    }

    /// Blocks until `deadline` or until cancelled, whichever comes first.
    /// Returns true if cancelled.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.inner.wake_rx.recv_deadline(deadline) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            Err(RecvTimeoutError::Disconnected) => self.is_cancelled(),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Reached,
    Cancelled,
}

/// Time source for playback. Offsets are measured from the last `start`.
pub trait Clock {
    fn start(&mut self);

    fn now(&self) -> Duration;

    /// Waits until `offset` past start. Cancellation ends the wait early and
    /// is reported even when the offset has already passed.
    fn wait_until(&mut self, offset: Duration, cancel: &CancelToken) -> Wake;

    /// Uninterruptible pause, used between a failed send and its retry.
    fn pause(&mut self, duration: Duration);
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn start(&mut self) {
        self.origin = Instant::now();
    }

    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wait_until(&mut self, offset: Duration, cancel: &CancelToken) -> Wake {
        let Some(deadline) = self.origin.checked_add(offset) else {
            cancel.wait();
            return Wake::Cancelled;
        };
        if cancel.wait_deadline(deadline) {
            Wake::Cancelled
        } else {
            Wake::Reached
        }
    }

    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that jumps straight to every deadline.
///
/// Clones share the same position, so a sink holding a clone can stamp the
/// messages it receives with the playback time they were dispatched at.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    nanos: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, at: Duration) {
        let nanos = u64::try_from(at.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.store(nanos, Ordering::Relaxed);
    }
}

impl Clock for VirtualClock {
    fn start(&mut self) {
        self.set(Duration::ZERO);
    }

    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    fn wait_until(&mut self, offset: Duration, cancel: &CancelToken) -> Wake {
        if cancel.is_cancelled() {
            return Wake::Cancelled;
        }
        if offset > self.now() {
            self.set(offset);
        }
        Wake::Reached
    }

    fn pause(&mut self, duration: Duration) {
        self.set(self.now() + duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_advances_to_deadlines() {
        let cancel = CancelToken::new();
        let mut clock = VirtualClock::new();
        let observer = clock.clone();
        clock.start();

        assert_eq!(clock.wait_until(Duration::from_millis(250), &cancel), Wake::Reached);
        assert_eq!(observer.now(), Duration::from_millis(250));

        // never moves backwards
        clock.wait_until(Duration::from_millis(100), &cancel);
        assert_eq!(observer.now(), Duration::from_millis(250));

        clock.pause(Duration::from_millis(10));
        assert_eq!(observer.now(), Duration::from_millis(260));
    }

    #[test]
    fn cancelled_token_short_circuits_waits() {
        let cancel = CancelToken::new();
        cancel.cancel();
        cancel.cancel();

        let mut clock = SystemClock::new();
        clock.start();
        let started = Instant::now();
        assert_eq!(clock.wait_until(Duration::from_secs(5), &cancel), Wake::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn cancel_from_another_thread_wakes_waiter() {
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        let mut clock = SystemClock::new();
        clock.start();
        let started = Instant::now();
        assert_eq!(clock.wait_until(Duration::from_secs(5), &cancel), Wake::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn system_clock_reaches_short_deadline() {
        let cancel = CancelToken::new();
        let mut clock = SystemClock::new();
        clock.start();
        assert_eq!(clock.wait_until(Duration::from_millis(20), &cancel), Wake::Reached);
        assert!(clock.now() >= Duration::from_millis(20));
    }
}
