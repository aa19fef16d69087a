use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use signal_hook::{consts::signal::*, low_level};

/// Counts received SIGINT and SIGTERM. The first signal only sets the cookie, so the
/// program can wind down on its own terms. The third one kills the process the default
/// way, in case winding down got stuck.
#[derive(Clone, Debug)]
pub struct Cookie {
    count: Arc<AtomicUsize>,
}

impl Cookie {
    pub fn new() -> Result<Self, std::io::Error> {
        let count = Arc::new(AtomicUsize::new(0));

        for flag in [SIGINT, SIGTERM] {
            let count = Arc::clone(&count);
            // SAFETY: this only uses atomic stuff and functions the crate itself is using
            // in signal handlers
            unsafe {
                low_level::register(flag, move || {
                    let prev = count.fetch_add(1, Ordering::SeqCst);
                    if prev >= 2 {
                        let _ = low_level::emulate_default_handler(flag);
                    }
                })?;
            };
        }

        Ok(Self { count })
    }

    pub fn signals_received(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}
