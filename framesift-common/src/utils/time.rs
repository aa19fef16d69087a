use std::time::{Duration, Instant};

/// Rate limits something, e.g., progress logs.
pub struct Every {
    every: Duration,
    last: Option<Instant>,
}

impl Every {
    /// The first call to `perform` always runs.
    pub fn new(every: Duration) -> Self {
        Self { every, last: None }
    }

    pub fn perform(&mut self, f: impl FnOnce()) {
        let now = Instant::now();
        match self.last {
            Some(last) if now - last < self.every => (),
            _ => {
                self.last = Some(now);
                f()
            }
        }
    }
}

/// Seconds as `HH:MM:SS`, fractions are truncated.
pub fn seconds_to_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
