//! Flat-rate sandbox cost estimation.
//!
//! Rates are USD per second of sandbox runtime for each provider's most
//! common tier, taken from their published pricing pages.

use crate::suites::phase::round_to;

/// Rate used for providers missing from the table (~$0.36/hr).
pub const DEFAULT_RATE_PER_SECOND: f64 = 0.0001;

const PROVIDER_RATES: &[(&str, f64)] = &[
    ("e2b", 0.0001),
    ("daytona", 0.00015),
    ("modal", 0.000164),
    ("codesandbox", 0.000278),
    ("fly", 0.0000095),
    // Local runtimes.
    ("docker-image", 0.0),
    ("http-agent", 0.0),
    ("microvm", 0.0),
];

/// Per-second rate for `provider`, falling back to the default rate.
pub fn rate_for(provider: &str) -> f64 {
    PROVIDER_RATES
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, rate)| *rate)
        .unwrap_or(DEFAULT_RATE_PER_SECOND)
}

/// Estimated USD cost of keeping a sandbox alive for `duration_seconds`,
/// rounded to 6 decimal places.
pub fn estimate_sandbox_cost(provider: &str, duration_seconds: f64) -> f64 {
    round_to(rate_for(provider) * duration_seconds.max(0.0), 6)
}
