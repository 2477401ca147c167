//! Timing and progress logging.

use std::time::Instant;

/// RAII timer that logs the elapsed time of a pass on drop.
///
/// ```ignore
/// let _t = Timed::info("Build BSP");
/// bsp.build(threshold, &MedianSplit, &cancel)?;
/// // "Build BSP: 1.204s" at INFO, also on the error path
/// ```
pub struct Timed {
    name: &'static str,
    start: Instant,
    level: log::Level,
}

impl Timed {
    /// Timer for a whole pass, reported at INFO.
    pub fn info(name: &'static str) -> Self {
        Self::start(name, log::Level::Info)
    }

    /// Timer for per-leaf work, reported at DEBUG.
    pub fn debug(name: &'static str) -> Self {
        Self::start(name, log::Level::Debug)
    }

    fn start(name: &'static str, level: log::Level) -> Self {
        log::trace!("{name} started");
        Self {
            name,
            start: Instant::now(),
            level,
        }
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        log::log!(self.level, "{}: {:.3?}", self.name, self.start.elapsed());
    }
}

/// Logs loop progress in steps of 10 % at TRACE level.
///
/// When the total is unknown a line is logged every [`Progress::UNKNOWN_STEP`]
/// items instead.
pub struct Progress {
    what: &'static str,
    total: Option<u64>,
    step: u64,
}

impl Progress {
    pub const UNKNOWN_STEP: u64 = 1 << 20;

    pub fn new(what: &'static str, total: Option<u64>) -> Self {
        let step = match total {
            Some(total) => (total / 10).max(1),
            None => Self::UNKNOWN_STEP,
        };
        Self { what, total, step }
    }

    #[inline]
    pub fn tick(&self, done: u64) {
        if done % self.step != 0 || !log::log_enabled!(log::Level::Trace) {
            return;
        }
        match self.total {
            Some(total) => log::trace!("{} {done} / {total} ({}%)", self.what, done * 100 / total.max(1)),
            None => log::trace!("{} {done}", self.what),
        }
    }
}
