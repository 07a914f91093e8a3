//! Upload queue configuration.
//!
//! Pure domain types: the defaults follow a device-class heuristic and can be
//! overridden from the environment or by the caller.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Viewports narrower than this (in CSS pixels) count as mobile.
pub const MOBILE_BREAKPOINT_PX: u32 = 768;

/// Environment variable overriding the number of concurrent uploads.
pub const ENV_CONCURRENCY: &str = "FERRY_UPLOAD_CONCURRENCY";

/// Environment variable selecting the device class (`desktop` or `mobile`).
pub const ENV_DEVICE_CLASS: &str = "FERRY_DEVICE_CLASS";

/// Environment variable setting the speed smoothing factor (0 < α ≤ 1).
pub const ENV_SPEED_SMOOTHING: &str = "FERRY_SPEED_SMOOTHING";

static MOBILE_USER_AGENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)Android|webOS|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini").ok()
});

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Concurrency must be a positive integer.
    #[error("Invalid concurrency '{value}': expected a positive integer")]
    InvalidConcurrency {
        /// The rejected value.
        value: String,
    },

    /// Unknown device class.
    #[error("Invalid device class '{value}': expected 'desktop' or 'mobile'")]
    InvalidDeviceClass {
        /// The rejected value.
        value: String,
    },

    /// Smoothing factor out of range.
    #[error("Invalid speed smoothing '{value}': expected a number in (0, 1]")]
    InvalidSpeedSmoothing {
        /// The rejected value.
        value: String,
    },
}

/// Coarse device class used to pick a default concurrency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Wide viewport, desktop-class connection.
    #[default]
    Desktop,
    /// Narrow viewport or mobile user agent.
    Mobile,
}

impl DeviceClass {
    /// Classify a client from its viewport width and user agent.
    #[must_use]
    pub fn detect(viewport_width: Option<u32>, user_agent: Option<&str>) -> Self {
        let narrow = viewport_width.is_some_and(|w| w < MOBILE_BREAKPOINT_PX);
        let mobile_agent = user_agent
            .zip(MOBILE_USER_AGENT.as_ref())
            .is_some_and(|(ua, re)| re.is_match(ua));

        if narrow || mobile_agent {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }

    /// Number of concurrent uploads for this class.
    #[must_use]
    pub const fn default_concurrency(self) -> usize {
        match self {
            Self::Desktop => 2,
            Self::Mobile => 1,
        }
    }

    /// String representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

impl FromStr for DeviceClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            _ => Err(ConfigError::InvalidDeviceClass {
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for creating an upload queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadQueueConfig {
    /// Maximum number of items uploading at once.
    pub concurrency: usize,
    /// Exponential smoothing factor for speed estimates.
    ///
    /// `1.0` reports the instantaneous rate of the latest interval.
    pub speed_smoothing: f64,
}

impl Default for UploadQueueConfig {
    fn default() -> Self {
        Self::for_device(DeviceClass::default())
    }
}

impl UploadQueueConfig {
    /// Defaults for a device class.
    #[must_use]
    pub const fn for_device(device: DeviceClass) -> Self {
        Self {
            concurrency: device.default_concurrency(),
            speed_smoothing: 1.0,
        }
    }

    /// Set the maximum concurrent uploads.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the speed smoothing factor.
    #[must_use]
    pub const fn with_speed_smoothing(mut self, alpha: f64) -> Self {
        self.speed_smoothing = alpha;
        self
    }

    /// Concurrency actually used by the runner (never zero).
    #[must_use]
    pub const fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 { 1 } else { self.concurrency }
    }

    /// Smoothing factor actually used (falls back to 1.0 when out of range).
    #[must_use]
    pub fn effective_speed_smoothing(&self) -> f64 {
        if self.speed_smoothing > 0.0 && self.speed_smoothing <= 1.0 {
            self.speed_smoothing
        } else {
            1.0
        }
    }

    /// Build a config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from a key lookup (environment-style).
    ///
    /// `FERRY_DEVICE_CLASS` picks the base defaults, then
    /// `FERRY_UPLOAD_CONCURRENCY` and `FERRY_SPEED_SMOOTHING` override.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let device = lookup(ENV_DEVICE_CLASS)
            .map(|v| v.parse::<DeviceClass>())
            .transpose()?
            .unwrap_or_default();
        let mut config = Self::for_device(device);

        if let Some(raw) = lookup(ENV_CONCURRENCY) {
            config.concurrency = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidConcurrency { value: raw })?;
        }

        if let Some(raw) = lookup(ENV_SPEED_SMOOTHING) {
            config.speed_smoothing = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|a| *a > 0.0 && *a <= 1.0)
                .ok_or(ConfigError::InvalidSpeedSmoothing { value: raw })?;
        }

        tracing::debug!(
            device = device.as_str(),
            concurrency = config.concurrency,
            speed_smoothing = config.speed_smoothing,
            "Loaded upload queue config"
        );

        Ok(config)
    }
}
