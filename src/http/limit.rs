//! Concurrent connection bound
//!
//! The acceptor takes a [`Permit`] before accepting each connection and the
//! session thread holds it until the connection closes. When the bound is
//! reached, acceptance pauses until a session ends.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::warn;

#[derive(Debug, Default)]
struct State {
    active: usize,
    saturated: bool,
}

#[derive(Debug)]
struct Shared {
    max: Option<usize>,
    state: Mutex<State>,
    released: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counts live connections against an optional maximum
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    shared: Arc<Shared>,
}

impl ConnectionLimiter {
    /// `None` never blocks
    pub fn new(max: Option<usize>) -> Self {
        ConnectionLimiter {
            shared: Arc::new(Shared {
                max,
                state: Mutex::new(State::default()),
                released: Condvar::new(),
            }),
        }
    }

    /// Block until a connection slot is free and take it
    pub fn acquire(&self) -> Permit {
        let shared = &self.shared;
        let mut state = shared.lock();

        if let Some(max) = shared.max {
            while state.active >= max {
                if !state.saturated {
                    warn!(max, "connection limit reached, pausing accept");
                    state.saturated = true;
                }
                state = shared
                    .released
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        state.active += 1;
        state.saturated = false;
        Permit {
            shared: Arc::clone(shared),
        }
    }

    /// Number of permits currently held
    pub fn active(&self) -> usize {
        self.shared.lock().active
    }
}

/// One occupied connection slot, released on drop
#[derive(Debug)]
pub struct Permit {
    shared: Arc<Shared>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.active -= 1;
        drop(state);
        self.shared.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_unbounded_never_blocks() {
        let limiter = ConnectionLimiter::new(None);
        let permits: Vec<_> = (0..100).map(|_| limiter.acquire()).collect();
        assert_eq!(limiter.active(), 100);
        drop(permits);
        assert_eq!(limiter.active(), 0);
    }

    #[test]
    fn test_permits_counted_until_dropped() {
        let limiter = ConnectionLimiter::new(Some(2));
        let a = limiter.acquire();
        let _b = limiter.acquire();
        assert_eq!(limiter.active(), 2);

        drop(a);
        assert_eq!(limiter.active(), 1);
    }

    #[test]
    fn test_acquire_waits_for_release() {
        let limiter = ConnectionLimiter::new(Some(1));
        let held = limiter.acquire();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let limiter = limiter.clone();
            thread::spawn(move || {
                let _permit = limiter.acquire();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(held);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
        assert_eq!(limiter.active(), 0);
    }
}
