//! Frame timing

use std::time::{Duration, Instant};

/// Measures the time between successive ticks
#[derive(Debug, Clone, Copy)]
pub struct DeltaTime {
    /// Instant of the last tick (or reset)
    pub start: Instant,
    /// Duration measured by the last tick
    pub dt: Duration,
}

impl Default for DeltaTime {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            dt: Duration::ZERO,
        }
    }
}

impl DeltaTime {
    /// Restart measurement from now
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    /// Time elapsed since the previous tick
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        self.dt = now.duration_since(self.start);
        self.start = now;
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_measures_elapsed_time() {
        let mut delta = DeltaTime::default();
        std::thread::sleep(Duration::from_millis(5));
        let dt = delta.tick();
        assert!(dt >= Duration::from_millis(5));
        assert_eq!(dt, delta.dt);
    }

    #[test]
    fn test_reset_moves_start() {
        let mut delta = DeltaTime::default();
        let before = delta.start;
        std::thread::sleep(Duration::from_millis(1));
        delta.reset();
        assert!(delta.start > before);
    }
}
