// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::time::{Duration, Instant};

/// Installs the global subscriber. `RUST_LOG` wins; otherwise `info`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// Counts presented frames and reports the total once per window.
#[derive(Debug)]
pub struct FpsCounter {
    frames: u32,
    window: Duration,
    last: Instant,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1), Instant::now())
    }

    pub fn with_window(window: Duration, start: Instant) -> Self {
        Self {
            frames: 0,
            window,
            last: start,
        }
    }

    /// Records one frame at `now`. Returns the frame count of the elapsed
    /// window when it closes, and starts a new one.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        self.frames = self.frames.saturating_add(1);
        if now.duration_since(self.last) >= self.window {
            let n = self.frames;
            self.frames = 0;
            self.last = now;
            Some(n)
        } else {
            None
        }
    }

    /// Records one frame and logs `fps ~ N` when a window closes.
    pub fn frame(&mut self) {
        if let Some(n) = self.tick(Instant::now()) {
            tracing::info!("fps ~ {}", n);
        }
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_window() {
        let t0 = Instant::now();
        let mut fps = FpsCounter::with_window(Duration::from_secs(1), t0);
        for i in 1..60 {
            assert_eq!(fps.tick(t0 + Duration::from_millis(i * 10)), None);
        }
        assert_eq!(fps.tick(t0 + Duration::from_secs(1)), Some(60));
        assert_eq!(fps.tick(t0 + Duration::from_millis(1010)), None);
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
