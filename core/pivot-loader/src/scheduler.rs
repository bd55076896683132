//! FILENAME: core/pivot-loader/src/scheduler.rs
//! PURPOSE: Coalescing throttle for chunk-processing runs.
//! CONTEXT: The loader is single-threaded. `submit` answers whether a run may
//! happen right now; if not, the request is remembered and the host's next
//! `poll` after the window elapses picks it up. Any number of submissions
//! inside one window collapse into a single trailing run.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Time source, injectable so tests control the throttle window.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Leading-edge throttle with a coalesced trailing run.
pub struct Throttle {
    window: Duration,
    clock: Rc<dyn Clock>,
    last_run: Option<Instant>,
    pending: bool,
}

impl Throttle {
    pub fn new(window: Duration, clock: Rc<dyn Clock>) -> Self {
        Throttle {
            window,
            clock,
            last_run: None,
            pending: false,
        }
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        self.last_run
            .map_or(true, |last| now.saturating_duration_since(last) >= self.window)
    }

    /// Requests a run. Returns true if the caller should run now.
    pub fn submit(&mut self) -> bool {
        let now = self.clock.now();
        if self.window_elapsed(now) {
            self.last_run = Some(now);
            self.pending = false;
            true
        } else {
            self.pending = true;
            false
        }
    }

    /// Returns true (once) when a coalesced run has become due.
    pub fn poll(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        let now = self.clock.now();
        if self.window_elapsed(now) {
            self.last_run = Some(now);
            self.pending = false;
            true
        } else {
            false
        }
    }

    /// Drops a coalesced run that has not fired yet.
    pub fn cancel_pending(&mut self) {
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// When the pending run becomes due, if one is waiting.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.pending {
            return None;
        }
        Some(self.last_run.map_or_else(|| self.clock.now(), |last| last + self.window))
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(ms: u64) -> (Rc<ManualClock>, Throttle) {
        let clock = Rc::new(ManualClock::new());
        let throttle = Throttle::new(Duration::from_millis(ms), clock.clone());
        (clock, throttle)
    }

    #[test]
    fn test_leading_submit_runs_immediately() {
        let (_clock, mut throttle) = throttle(100);
        assert!(throttle.submit());
        assert!(!throttle.is_pending());
    }

    #[test]
    fn test_submissions_inside_window_coalesce() {
        let (clock, mut throttle) = throttle(100);
        assert!(throttle.submit());
        assert!(!throttle.submit());
        assert!(!throttle.submit());
        assert!(throttle.is_pending());
        assert!(!throttle.poll());

        clock.advance(Duration::from_millis(100));
        assert!(throttle.poll());
        // Only one trailing run.
        assert!(!throttle.poll());
    }

    #[test]
    fn test_cancel_pending_drops_trailing_run() {
        let (clock, mut throttle) = throttle(50);
        throttle.submit();
        throttle.submit();
        assert!(throttle.next_deadline().is_some());
        throttle.cancel_pending();
        clock.advance(Duration::from_millis(60));
        assert!(!throttle.poll());
        assert_eq!(throttle.next_deadline(), None);
    }

    #[test]
    fn test_zero_window_never_defers() {
        let (_clock, mut throttle) = throttle(0);
        for _ in 0..5 {
            assert!(throttle.submit());
        }
    }
}
