//! Small display formatters shared by the dashboard and the selector.

/// Render a byte count as a short human-readable figure (`1.4 MB`).
#[must_use]
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "kB", "MB", "GB", "TB", "PB"];

    if bytes < 1_000 {
        return format!("{bytes} B");
    }

    let mut value = bytes_to_f64(bytes);
    let mut unit = 0;
    while value >= 1_000.0 && unit < UNITS.len() - 1 {
        value /= 1_000.0;
        unit += 1;
    }

    if value >= 100.0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Render a second count the way a person would say it (`4m 12s`).
#[must_use]
pub fn human_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 3_600 {
        return format!("{}m {}s", seconds / 60, seconds % 60);
    }
    let hours = seconds / 3_600;
    let minutes = (seconds % 3_600) / 60;
    format!("{hours}h {minutes}m")
}

pub(crate) const fn bytes_to_f64(value: u64) -> f64 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "u64 to f64 conversion is needed for user-facing size reporting"
    )]
    {
        value as f64
    }
}
