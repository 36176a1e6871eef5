//! Rate-limited promotion of repetitive log lines.
//!
//! Periodic tasks report the same condition every tick. A [`LogLimiter`]
//! lets one line per window through at `info` and demotes the rest to
//! `debug`, so steady-state noise stays out of production logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use gateway_types::Timestamp;

pub struct LogLimiter {
    window: Duration,
    /// Millis of the last promoted line; `u64::MAX` before the first one.
    last_promoted: AtomicU64,
}

impl LogLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_promoted: AtomicU64::new(u64::MAX),
        }
    }

    /// Whether a line logged at `now` should go out at `info`.
    pub fn promote(&self, now: Timestamp) -> bool {
        let now_ms = now.as_millis();
        let mut last = self.last_promoted.load(Ordering::Acquire);
        loop {
            let due = last == u64::MAX
                || Timestamp::from_millis(last).has_expired(self.window, now);
            if !due {
                return false;
            }
            match self.last_promoted.compare_exchange_weak(
                last,
                now_ms,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => last = current,
            }
        }
    }
}

/// Log at `info` if the limiter allows it, otherwise at `debug`.
#[macro_export]
macro_rules! limited_info {
    ($limiter:expr, $now:expr, $($arg:tt)+) => {
        if $limiter.promote($now) {
            ::tracing::info!($($arg)+)
        } else {
            ::tracing::debug!($($arg)+)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_once_per_window() {
        let limiter = LogLimiter::new(Duration::from_secs(10));
        assert!(limiter.promote(Timestamp::from_secs(100)));
        assert!(!limiter.promote(Timestamp::from_secs(105)));
        assert!(!limiter.promote(Timestamp::from_secs(109)));
        assert!(limiter.promote(Timestamp::from_secs(110)));
        assert!(!limiter.promote(Timestamp::from_secs(111)));
    }
}
