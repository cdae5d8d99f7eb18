//! Stopwatch used by the monitor loop for interval timing.

use std::time::{Duration, Instant};

/// Measures time since the last `start`, optionally frozen by `end`.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
    ended: Option<Instant>,
}

impl Stopwatch {
    /// Create a stopwatch that is already running.
    pub fn started() -> Self {
        Stopwatch {
            started: Instant::now(),
            ended: None,
        }
    }

    /// Restart measuring from now.
    pub fn start(&mut self) {
        self.started = Instant::now();
        self.ended = None;
    }

    /// Freeze the reading at the current instant.
    pub fn end(&mut self) {
        self.ended = Some(Instant::now());
    }

    pub fn elapsed(&self) -> Duration {
        match self.ended {
            Some(ended) => ended.saturating_duration_since(self.started),
            None => self.started.elapsed(),
        }
    }

    /// Elapsed time in fractional seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::started()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_elapsed_grows_until_end() {
        let mut watch = Stopwatch::started();
        thread::sleep(Duration::from_millis(20));
        watch.end();
        let frozen = watch.elapsed();
        assert!(frozen >= Duration::from_millis(20));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(watch.elapsed(), frozen);
        assert!(watch.elapsed_secs() >= 0.02);
    }

    #[test]
    fn test_start_resets() {
        let mut watch = Stopwatch::started();
        thread::sleep(Duration::from_millis(30));
        watch.start();
        assert!(watch.elapsed() < Duration::from_millis(30));
    }
}
