use std::time::{Duration, Instant};

//
// A repeating timer driven by an external event loop.
// The owner calls `fire_if_due` with the current time on every loop iteration.
//
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl PeriodicTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn start(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Makes an active timer fire on the next call to `fire_if_due`.
    pub fn expedite(&mut self, now: Instant) {
        if self.deadline.is_some() {
            self.deadline = Some(now);
        }
    }

    ///
    /// Returns true once per elapsed deadline.
    /// A timer that fell behind fires once and is rescheduled relative to `now`.
    ///
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                let next = deadline + self.interval;
                self.deadline = Some(if next > now { next } else { now + self.interval });
                true
            }
            _ => false,
        }
    }
}

/// Poll period for the given frame rate, `1000 / fps` milliseconds.
pub fn frame_period(fps: u32) -> Duration {
    Duration::from_millis(1000 / fps.max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_timer_never_fires() {
        let mut t = PeriodicTimer::new(Duration::from_millis(10));
        assert!(!t.fire_if_due(Instant::now() + Duration::from_secs(10)));
    }

    #[test]
    fn fires_on_each_interval() {
        let start = Instant::now();
        let mut t = PeriodicTimer::new(Duration::from_millis(10));
        t.start(start);
        assert!(!t.fire_if_due(start + Duration::from_millis(5)));
        assert!(t.fire_if_due(start + Duration::from_millis(10)));
        assert!(!t.fire_if_due(start + Duration::from_millis(15)));
        assert!(t.fire_if_due(start + Duration::from_millis(20)));
    }

    #[test]
    fn late_timer_fires_once_and_reschedules() {
        let start = Instant::now();
        let mut t = PeriodicTimer::new(Duration::from_millis(10));
        t.start(start);
        let late = start + Duration::from_millis(95);
        assert!(t.fire_if_due(late));
        assert!(!t.fire_if_due(late));
        assert_eq!(t.deadline(), Some(late + Duration::from_millis(10)));
    }

    #[test]
    fn frame_period_matches_rate() {
        assert_eq!(frame_period(30), Duration::from_millis(33));
        assert_eq!(frame_period(5), Duration::from_millis(200));
        assert_eq!(frame_period(0), Duration::from_millis(1000));
    }
}
