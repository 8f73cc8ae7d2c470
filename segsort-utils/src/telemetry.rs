//! Scoped timing for the segmentation pipeline.
//!
//! A [`TimingGuard`] measures the span between its creation and drop and logs the duration
//! under [`TELEMETRY_TARGET`]. Guards only log when telemetry has been switched on through
//! [`configure`], the requested level is within the configured threshold, and the logger
//! itself accepts that level. With telemetry off a guard is a stored `Instant` and nothing else.

use std::{
    borrow::Cow,
    sync::atomic::{AtomicU8, Ordering},
    time::{Duration, Instant},
};

use log::{Level, LevelFilter, log, log_enabled};

/// Log target used for every timing record.
pub const TELEMETRY_TARGET: &str = "segsort::telemetry";

// 0 means disabled; otherwise the numeric `LevelFilter` threshold (1 = error .. 5 = trace).
static TELEMETRY_THRESHOLD: AtomicU8 = AtomicU8::new(0);

/// RAII helper that logs how long an operation took when dropped.
pub struct TimingGuard {
    label: Cow<'static, str>,
    level: Level,
    start: Instant,
    active: bool,
}

impl TimingGuard {
    /// Returns `true` when the guard will emit a log entry on drop.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Time elapsed since the guard was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if self.active {
            log!(
                target: TELEMETRY_TARGET,
                self.level,
                "{} completed in {:.2?}",
                self.label,
                self.start.elapsed()
            );
        }
    }
}

/// Create a timing guard that logs at `level` when telemetry allows it.
pub fn timing_guard(label: impl Into<Cow<'static, str>>, level: Level) -> TimingGuard {
    timing_guard_if(label, level, true)
}

/// Like [`timing_guard`], with an extra caller-side switch.
pub fn timing_guard_if(
    label: impl Into<Cow<'static, str>>,
    level: Level,
    enabled: bool,
) -> TimingGuard {
    let active = enabled && telemetry_allows(level) && log_enabled!(target: TELEMETRY_TARGET, level);
    TimingGuard {
        label: label.into(),
        level,
        start: Instant::now(),
        active,
    }
}

/// Switch telemetry on or off and set its level threshold.
pub fn configure(enabled: bool, level: LevelFilter) {
    let threshold = if enabled { level as usize as u8 } else { 0 };
    TELEMETRY_THRESHOLD.store(threshold, Ordering::Relaxed);
}

/// Returns whether telemetry logging is currently enabled.
pub fn telemetry_enabled() -> bool {
    TELEMETRY_THRESHOLD.load(Ordering::Relaxed) > 0
}

/// Returns the configured telemetry threshold (`Off` when disabled).
pub fn telemetry_level() -> LevelFilter {
    match TELEMETRY_THRESHOLD.load(Ordering::Relaxed) {
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        5 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Returns `true` when telemetry is enabled and `level` is within the threshold.
pub fn telemetry_allows(level: Level) -> bool {
    level <= telemetry_level()
}
