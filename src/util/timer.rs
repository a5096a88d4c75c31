//! Wall-clock timer for setup and kernel timing.

use std::time::{Duration, Instant};

/// Accumulating stopwatch. `start`/`stop` may be called repeatedly; the
/// elapsed time sums all completed intervals plus any running one.
#[derive(Debug, Default)]
pub struct Timer {
    started: Option<Instant>,
    accumulated: Duration,
}

impl Timer {
    /// Create a stopped timer with zero accumulated time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or resume the timer. Starting a running timer is a no-op.
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Stop the timer, folding the running interval into the total.
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.accumulated += started.elapsed();
        }
    }

    /// Reset to zero and stop.
    pub fn reset(&mut self) {
        self.started = None;
        self.accumulated = Duration::ZERO;
    }

    /// Total measured time.
    pub fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => self.accumulated + started.elapsed(),
            None => self.accumulated,
        }
    }

    /// Total measured time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_timer_is_zero() {
        let timer = Timer::new();
        assert_eq!(timer.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_accumulates_across_intervals() {
        let mut timer = Timer::new();

        timer.start();
        std::thread::sleep(Duration::from_millis(5));
        timer.stop();
        let first = timer.elapsed();
        assert!(first >= Duration::from_millis(5));

        timer.start();
        std::thread::sleep(Duration::from_millis(5));
        timer.stop();
        assert!(timer.elapsed() > first);
    }

    #[test]
    fn test_reset_zeroes() {
        let mut timer = Timer::new();
        timer.start();
        timer.stop();
        timer.reset();
        assert_eq!(timer.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_elapsed_while_running() {
        let mut timer = Timer::new();
        timer.start();
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed() > Duration::ZERO);
    }
}
