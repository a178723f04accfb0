//! Repeating progress timer
//!
//! Drives the transport's position and level sampling while recording or
//! playing. The tick callback runs on a dedicated thread; `start` always
//! cancels any previous instance first so two tickers can never run at
//! once, and `stop` joins the thread before returning.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default tick cadence (~20 Hz).
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// What the tick callback wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

/// Owner handle for the tick thread.
pub struct Ticker {
    stop_tx: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new() -> Self {
        Self {
            stop_tx: None,
            thread_handle: None,
        }
    }

    /// Start ticking `on_tick` every `interval`.
    ///
    /// Any previously running ticker is cancelled and joined first. The
    /// callback may end the ticker itself by returning [`Tick::Stop`].
    pub fn start<F>(&mut self, interval: Duration, mut on_tick: F)
    where
        F: FnMut() -> Tick + Send + 'static,
    {
        self.stop();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if on_tick() == Tick::Stop {
                        break;
                    }
                }
                // Stop signal, or the owner dropped the sender.
                _ => break,
            }
        });

        self.stop_tx = Some(stop_tx);
        self.thread_handle = Some(handle);
    }

    /// Stop ticking and wait for the tick thread to exit.
    ///
    /// Must not be called while holding a lock the tick callback also
    /// takes. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn ticks_repeatedly_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        let mut ticker = Ticker::new();
        ticker.start(Duration::from_millis(10), move || {
            count2.fetch_add(1, Ordering::SeqCst);
            Tick::Continue
        });

        thread::sleep(Duration::from_millis(100));
        ticker.stop();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 5, "expected >= 5 ticks, got {after_stop}");

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
        assert!(!ticker.is_running());
    }

    #[test]
    fn callback_can_stop_itself() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        let mut ticker = Ticker::new();
        ticker.start(Duration::from_millis(5), move || {
            count2.fetch_add(1, Ordering::SeqCst);
            Tick::Stop
        });

        thread::sleep(Duration::from_millis(60));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!ticker.is_running());
    }

    #[test]
    fn restart_cancels_previous_instance() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut ticker = Ticker::new();
        let f = Arc::clone(&first);
        ticker.start(Duration::from_millis(5), move || {
            f.fetch_add(1, Ordering::SeqCst);
            Tick::Continue
        });
        thread::sleep(Duration::from_millis(30));

        let s = Arc::clone(&second);
        ticker.start(Duration::from_millis(5), move || {
            s.fetch_add(1, Ordering::SeqCst);
            Tick::Continue
        });
        let first_after_restart = first.load(Ordering::SeqCst);

        thread::sleep(Duration::from_millis(50));
        ticker.stop();

        // The first callback must not have ticked after the restart.
        assert_eq!(first.load(Ordering::SeqCst), first_after_restart);
        assert!(second.load(Ordering::SeqCst) >= 5);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut ticker = Ticker::new();
        ticker.start(Duration::from_millis(5), || Tick::Continue);
        ticker.stop();
        ticker.stop();
        assert!(!ticker.is_running());
    }
}
