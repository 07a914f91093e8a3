//! Transfer rate and ETA estimation.
//!
//! Rates are expressed in megabits per second (`bytes/s * 8 / 2^20`).

use std::time::Instant;

const BITS_PER_MEGABIT: f64 = 1024.0 * 1024.0;

/// Convert a byte rate to megabits per second.
pub fn bytes_per_sec_to_mbps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * 8.0 / BITS_PER_MEGABIT
}

/// Seconds left to move the remaining bytes at `speed_mbps`.
///
/// Zero when the speed is unknown or nothing remains.
#[allow(clippy::cast_precision_loss)]
pub fn eta_seconds(total_bytes: u64, uploaded_bytes: u64, speed_mbps: f64) -> f64 {
    let remaining = total_bytes.saturating_sub(uploaded_bytes);
    if speed_mbps > 0.0 && remaining > 0 {
        (remaining as f64 * 8.0) / (speed_mbps * BITS_PER_MEGABIT)
    } else {
        0.0
    }
}

/// Per-attempt speed meter fed with cumulative byte counts.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    alpha: f64,
    last_bytes: u64,
    last_at: Instant,
    speed: f64,
    primed: bool,
}

impl SpeedEstimator {
    /// Start measuring at `started`.
    ///
    /// `alpha` is the exponential smoothing weight of the newest interval;
    /// `1.0` reports the instantaneous rate.
    pub const fn new(alpha: f64, started: Instant) -> Self {
        Self {
            alpha,
            last_bytes: 0,
            last_at: started,
            speed: 0.0,
            primed: false,
        }
    }

    /// Feed the cumulative byte count observed at `at` and return the speed.
    ///
    /// A sample taken at the same instant as the previous one keeps the
    /// previous speed. Byte counts that went backwards count as zero progress.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(&mut self, bytes: u64, at: Instant) -> f64 {
        let elapsed = at.saturating_duration_since(self.last_at).as_secs_f64();
        if elapsed <= 0.0 {
            return self.speed;
        }

        let delta = bytes.saturating_sub(self.last_bytes);
        let instant = bytes_per_sec_to_mbps(delta as f64 / elapsed);

        self.speed = if self.primed {
            self.alpha.mul_add(instant, (1.0 - self.alpha) * self.speed)
        } else {
            self.primed = true;
            instant
        };
        self.last_bytes = self.last_bytes.max(bytes);
        self.last_at = at;
        self.speed
    }

    /// Most recent speed in Mbps.
    pub const fn speed(&self) -> f64 {
        self.speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn one_mebibyte_per_second_is_eight_mbps() {
        let start = Instant::now();
        let mut meter = SpeedEstimator::new(1.0, start);
        let speed = meter.sample(MIB, start + Duration::from_secs(1));
        assert!((speed - 8.0).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_keeps_previous_speed() {
        let start = Instant::now();
        let mut meter = SpeedEstimator::new(1.0, start);
        let at = start + Duration::from_secs(2);
        let first = meter.sample(MIB, at);
        let second = meter.sample(3 * MIB, at);
        assert!((first - second).abs() < f64::EPSILON);
    }

    #[test]
    fn backwards_bytes_saturate_to_zero() {
        let start = Instant::now();
        let mut meter = SpeedEstimator::new(1.0, start);
        meter.sample(2 * MIB, start + Duration::from_secs(1));
        let speed = meter.sample(MIB, start + Duration::from_secs(2));
        assert!(speed.abs() < f64::EPSILON);
    }

    #[test]
    fn smoothing_blends_with_previous() {
        let start = Instant::now();
        let mut meter = SpeedEstimator::new(0.5, start);
        meter.sample(MIB, start + Duration::from_secs(1)); // 8 Mbps
        let speed = meter.sample(MIB, start + Duration::from_secs(2)); // 0 Mbps instant
        assert!((speed - 4.0).abs() < 1e-9);
        assert!((meter.speed() - speed).abs() < f64::EPSILON);
    }

    #[test]
    fn eta_guards_unknown_speed() {
        assert!(eta_seconds(MIB, 0, 0.0).abs() < f64::EPSILON);
        assert!(eta_seconds(MIB, MIB, 8.0).abs() < f64::EPSILON);
        assert!((eta_seconds(2 * MIB, MIB, 8.0) - 1.0).abs() < 1e-9);
    }
}
