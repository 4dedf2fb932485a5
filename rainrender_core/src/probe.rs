use std::path::Path;

use log::{info, warn};

use crate::engine::Engine;

/// Seconds assumed when the input's duration cannot be determined.
pub const FALLBACK_DURATION_SECS: u64 = 3_720;

/// Whole-second duration used to size generated beds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbedDuration {
    pub secs: u64,
    /// The prober failed or reported nothing usable; `secs` is the fallback.
    pub fallback: bool,
}

/// Parse the prober's report into whole seconds.
///
/// Returns `None` for empty, non-numeric or non-finite reports and for
/// anything that truncates to zero or below.
pub fn parse_duration_report(report: &str) -> Option<u64> {
    let line = report.lines().map(str::trim).find(|line| !line.is_empty())?;
    let secs = line.parse::<f64>().ok()?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc();
    if whole < 1.0 {
        return None;
    }
    Some(whole as u64)
}

/// Probe `input`, substituting `fallback_secs` on any failure.
///
/// A failed probe never aborts the render; it is logged as a warning and
/// flagged on the returned value so the caller can surface it.
pub fn probe_duration(engine: &dyn Engine, input: &Path, fallback_secs: u64) -> ProbedDuration {
    let report = match engine.probe_duration(input) {
        Ok(report) => report,
        Err(err) => {
            warn!(
                "could not probe '{}' ({err}); assuming {fallback_secs}s",
                input.display()
            );
            return ProbedDuration {
                secs: fallback_secs,
                fallback: true,
            };
        }
    };

    match parse_duration_report(&report) {
        Some(secs) => {
            info!("probed '{}': {secs}s", input.display());
            ProbedDuration {
                secs,
                fallback: false,
            }
        }
        None => {
            warn!(
                "unusable duration {:?} for '{}'; assuming {fallback_secs}s",
                report.trim(),
                input.display()
            );
            ProbedDuration {
                secs: fallback_secs,
                fallback: true,
            }
        }
    }
}
