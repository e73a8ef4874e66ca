//! Console verbosity for vbench.
//!
//! - **Quiet** (`-q`): errors and the requested output only
//! - **Default**: one progress line per loaded source and written file
//! - **Verbose** (`-v`): resolved column mappings, config summary and stage timings
//!
//! Everything here goes to stderr; stdout carries only reports and tables.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Output verbosity level, ordered from least to most chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Default = 1,
    Verbose = 2,
}

impl Verbosity {
    /// Level selected by the global `-q` / `-v` flags. `-q` wins.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, true) => Self::Verbose,
            (false, false) => Self::Default,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Quiet,
            2 => Self::Verbose,
            _ => Self::Default,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(Verbosity::Default as u8);

/// Set the process-wide level from the CLI flags.
pub fn init(quiet: bool, verbose: bool) {
    LEVEL.store(Verbosity::from_flags(quiet, verbose) as u8, Ordering::Relaxed);
}

/// Returns `true` if messages at `level` should be printed.
pub fn enabled(level: Verbosity) -> bool {
    Verbosity::from_u8(LEVEL.load(Ordering::Relaxed)) >= level
}

/// Print to stderr with `-v` only.
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::enabled($crate::verbose::Verbosity::Verbose) {
            eprintln!($($arg)*);
        }
    };
}

pub(crate) use vprintln;

/// Print to stderr unless `-q`.
macro_rules! dprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::enabled($crate::verbose::Verbosity::Default) {
            eprintln!($($arg)*);
        }
    };
}

pub(crate) use dprintln;

/// Reports how long a stage took when dropped, with `-v`.
pub struct Timer {
    stage: &'static str,
    start: Instant,
}

impl Timer {
    /// Start timing `stage`.
    pub fn start(stage: &'static str) -> Self {
        Self {
            stage,
            start: Instant::now(),
        }
    }

    /// Time since the stage started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        vprintln!("  [{}] {:.1?}", self.stage, self.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_flag_wins() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Default);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(Verbosity::Verbose > Verbosity::Default);
        assert!(Verbosity::Default > Verbosity::Quiet);
        assert_eq!(Verbosity::from_u8(7), Verbosity::Default);
    }
}
