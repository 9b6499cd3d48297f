//! Out-of-memory crash-risk heuristic.

/// Step thresholds on resident / available memory and the risk they map to.
const RISK_STEPS: [(f64, f64); 4] = [(0.5, 5.0), (0.7, 20.0), (0.85, 50.0), (0.93, 75.0)];

/// Risk when the ratio is at or above the last threshold.
const RISK_CEILING: f64 = 90.0;

/// Bump applied when the error probe reports recent errors.
const ERROR_BUMP: f64 = 10.0;

/// Map a memory ratio to a risk percentage via the step table.
pub fn risk_for_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return RISK_CEILING;
    }
    RISK_STEPS
        .iter()
        .find(|(limit, _)| ratio < *limit)
        .map(|(_, risk)| *risk)
        .unwrap_or(RISK_CEILING)
}

/// Crash-risk percent for a process using `rss_bytes` when the host has
/// `available_bytes` free, plus a bump when errors were recently seen.
///
/// Zero available memory counts as the worst ratio.
pub fn crash_risk_percent(rss_bytes: u64, available_bytes: u64, recent_errors: u64) -> f64 {
    let ratio = if available_bytes == 0 {
        f64::INFINITY
    } else {
        rss_bytes as f64 / available_bytes as f64
    };
    let mut risk = risk_for_ratio(ratio);
    if recent_errors > 0 {
        risk = (risk + ERROR_BUMP).min(100.0);
    }
    risk
}
