use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Granularity at which long waits re-check the cancellation flag
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sleep for `duration` in `POLL_INTERVAL` ticks.
///
/// Returns `false` as soon as `cancel` fires, `true` if the full duration
/// elapsed.
pub async fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return false;
        }
        let tick = remaining.min(POLL_INTERVAL);
        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            _ = cancel.cancelled() => return false,
        }
        remaining = remaining.saturating_sub(tick);
    }
    !cancel.is_cancelled()
}

/// Convert a seconds knob from configuration into a duration. Negative or
/// non-finite values mean "no wait"; values too large for a `Duration` saturate.
pub fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
