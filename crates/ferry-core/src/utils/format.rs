//! Human-readable formatting for sizes, rates and durations.

/// Format a byte count as KB or MB with two decimals.
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes >= MIB {
        format!("{:.2} MB", bytes / MIB)
    } else {
        format!("{:.2} KB", bytes / 1024.0)
    }
}

/// Format a rate given in megabits per second.
pub fn format_speed(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.2} Gbps", mbps / 1000.0)
    } else {
        format!("{mbps:.2} Mbps")
    }
}

/// Format a duration in seconds as `42s` or `3m 5s`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_eta(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0).ceil() as u64 } else { 0 };
    if total < 60 {
        return format!("{total}s");
    }
    format!("{}m {}s", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_file_size(512), "0.50 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn speeds() {
        assert_eq!(format_speed(12.345), "12.35 Mbps");
        assert_eq!(format_speed(2500.0), "2.50 Gbps");
    }

    #[test]
    fn etas() {
        assert_eq!(format_eta(41.2), "42s");
        assert_eq!(format_eta(185.0), "3m 5s");
        assert_eq!(format_eta(179.5), "3m 0s");
        assert_eq!(format_eta(f64::NAN), "0s");
    }
}
