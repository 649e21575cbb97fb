//! Progress reporting for batch conversions (`progress` feature).
//!
//! [`BatchProgress`] wraps an [`indicatif::ProgressBar`] and shows, next to the bar,
//! the file being converted together with the last and smoothed per-file durations.
//!
//! The smoothing is an exponential moving average kept by [`IterTimer`]:
//! `ema ← α·dt + (1–α)·ema`, seeded with the first sample.
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str =
    "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | ETA {eta_precise} | {msg}";

pub struct IterTimer {
    last: Instant,
    ema_ns: f64,
    alpha: f64,
    count: u64,
}

impl IterTimer {
    /// `alpha` in `(0, 1]`; 1 disables smoothing.
    pub fn new(alpha: f64) -> Self {
        Self {
            last: Instant::now(),
            ema_ns: 0.0,
            alpha,
            count: 0,
        }
    }

    /// Time since the previous tick (or since creation).
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;
        self.record(dt);
        dt
    }

    fn record(&mut self, dt: Duration) {
        self.count += 1;
        let dt_ns = dt.as_nanos() as f64;
        self.ema_ns = if self.count == 1 {
            dt_ns
        } else {
            self.alpha * dt_ns + (1.0 - self.alpha) * self.ema_ns
        };
    }

    pub fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.ema_ns as u64)
        }
    }
}

/// `253µs`, `42ms` or `3.14s` depending on magnitude.
pub fn fmt_dur(d: Duration) -> String {
    if d.as_micros() < 1_000 {
        format!("{}µs", d.as_micros())
    } else if d.as_millis() < 1_000 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.2}s", d.as_secs_f32())
    }
}

pub struct BatchProgress {
    bar: ProgressBar,
    timer: IterTimer,
}

impl BatchProgress {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total.max(1));
        bar.set_style(
            ProgressStyle::with_template(TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(200));
        BatchProgress {
            bar,
            timer: IterTimer::new(0.2),
        }
    }

    /// Mark one file as done.
    pub fn tick(&mut self, name: &str) {
        let last = self.timer.tick();
        self.bar.set_message(format!(
            "{name} (last: {}, avg: {})",
            fmt_dur(last),
            fmt_dur(self.timer.avg())
        ));
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
