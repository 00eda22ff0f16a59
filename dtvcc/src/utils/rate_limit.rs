//! Counting limiter for repetitive diagnostics.

use std::fmt::Display;

use log::{Level, info, log, trace};

pub const SUPPRESSION_NOTICE: &str = "--- Suppressing Subsequent Warnings.";

/// How loudly the current occurrence should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Below the threshold: report in full.
    Full,
    /// Exactly at the threshold: report, then announce suppression.
    Last,
    /// Past the threshold: trace only.
    Quiet,
}

/// Counts occurrences of one kind of warning and decides whether each one
/// is still worth printing. Every occurrence is counted, printed or not.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    label: &'static str,
    threshold: usize,
    count: usize,
}

impl RateLimiter {
    pub const fn new(label: &'static str, threshold: usize) -> Self {
        Self {
            label,
            threshold,
            count: 0,
        }
    }

    pub fn hit(&mut self) -> Verbosity {
        let verbosity = match self.count.cmp(&self.threshold) {
            std::cmp::Ordering::Less => Verbosity::Full,
            std::cmp::Ordering::Equal => Verbosity::Last,
            std::cmp::Ordering::Greater => Verbosity::Quiet,
        };
        self.count += 1;
        verbosity
    }

    /// Counts `err` and logs it at `level`, or at trace level once past the
    /// threshold. Returns it instead when `level` reaches `fail_level`.
    pub fn report<E: Display>(
        &mut self,
        fail_level: Option<Level>,
        level: Level,
        err: E,
    ) -> Result<(), E> {
        let verbosity = self.hit();

        if fail_level.is_some_and(|fail| level <= fail) {
            return Err(err);
        }

        match verbosity {
            Verbosity::Full => log!(level, "{err}"),
            Verbosity::Last => {
                log!(level, "{err}");
                log!(level, "{SUPPRESSION_NOTICE}");
            }
            Verbosity::Quiet => trace!("{err}"),
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Occurrences that only reached the trace log.
    pub fn suppressed(&self) -> usize {
        self.count.saturating_sub(self.threshold + 1)
    }

    pub fn report_suppressed(&self) {
        match self.suppressed() {
            0 => trace!("{}: {} occurrences", self.label, self.count),
            n => info!("{}: suppressed {n} additional occurrences", self.label),
        }
    }
}

#[test]
fn threshold_boundaries() {
    let mut limiter = RateLimiter::new("P16 commands", 5);

    let seen: Vec<Verbosity> = (0..8).map(|_| limiter.hit()).collect();

    assert!(seen[..5].iter().all(|v| *v == Verbosity::Full));
    assert_eq!(seen[5], Verbosity::Last);
    assert!(seen[6..].iter().all(|v| *v == Verbosity::Quiet));
    assert_eq!(limiter.count(), 8);
    assert_eq!(limiter.suppressed(), 2);
}

#[test]
fn single_shot() {
    let mut limiter = RateLimiter::new("zero length packets", 0);
    assert_eq!(limiter.hit(), Verbosity::Last);
    assert_eq!(limiter.hit(), Verbosity::Quiet);
    assert_eq!(limiter.hit(), Verbosity::Quiet);
    assert_eq!(limiter.suppressed(), 2);
}

#[test]
fn report_respects_fail_level() {
    let mut limiter = RateLimiter::new("length mismatches", 1);
    assert!(limiter.report(None, Level::Warn, "mismatch").is_ok());
    assert!(limiter.report(None, Level::Warn, "mismatch").is_ok());
    assert!(limiter.report(None, Level::Warn, "mismatch").is_ok());
    assert_eq!(limiter.suppressed(), 1);

    assert_eq!(
        limiter.report(Some(Level::Warn), Level::Warn, "mismatch"),
        Err("mismatch")
    );
    assert!(limiter.report(Some(Level::Error), Level::Warn, "mismatch").is_ok());
    assert_eq!(limiter.count(), 5);
}
