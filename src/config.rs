// src/config.rs
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::stream::{FeaturePipeline, StreamError, WindowScheduler};
use crate::types::CHANNEL_COUNT;

/// Field names the phone sensor app uses for the six axes.
pub fn default_channel_names() -> Vec<String> {
    [
        "accelerometerAccelerationX",
        "accelerometerAccelerationY",
        "accelerometerAccelerationZ",
        "gyroRotationX",
        "gyroRotationY",
        "gyroRotationZ",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub window_size: usize,
    pub overlap_fraction: f64,
    pub sampling_frequency: f64,
    pub channel_names: Vec<String>,
    /// Ring capacity per channel; `None` means `window_size`.
    pub buffer_capacity: Option<usize>,
    /// Windows waiting for the processing stage before ingestion blocks.
    pub queue_capacity: usize,
    /// Longest accepted JSON line; longer packets are dropped as malformed.
    pub max_line_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_size: 128,
            overlap_fraction: 0.5,
            sampling_frequency: 50.0,
            channel_names: default_channel_names(),
            buffer_capacity: None,
            queue_capacity: 4,
            max_line_bytes: 64 * 1024,
        }
    }
}

impl SessionConfig {
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity.unwrap_or(self.window_size)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        // Scheduler construction owns the window/overlap rules.
        WindowScheduler::new(self.window_size, self.overlap_fraction)?;
        if !(self.sampling_frequency.is_finite() && self.sampling_frequency > 0.0) {
            return Err(StreamError::Config(format!(
                "sampling_frequency must be positive, got {}",
                self.sampling_frequency
            )));
        }
        if self.channel_names.len() != CHANNEL_COUNT {
            return Err(StreamError::Config(format!(
                "channel_names must list {CHANNEL_COUNT} identifiers, got {}",
                self.channel_names.len()
            )));
        }
        let mut seen = HashSet::new();
        for name in &self.channel_names {
            if name.trim().is_empty() {
                return Err(StreamError::Config("channel names must not be empty".into()));
            }
            if !seen.insert(name.as_str()) {
                return Err(StreamError::Config(format!("duplicate channel name `{name}`")));
            }
        }
        if self.buffer_capacity() < self.window_size {
            return Err(StreamError::Config(format!(
                "buffer_capacity {} is smaller than window_size {}",
                self.buffer_capacity(),
                self.window_size
            )));
        }
        if self.queue_capacity == 0 {
            return Err(StreamError::Config("queue_capacity must be greater than zero".into()));
        }
        if self.max_line_bytes == 0 {
            return Err(StreamError::Config("max_line_bytes must be greater than zero".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub median_kernel: usize,
    pub order: usize,
    pub motion_cutoff_hz: f64,
    pub gravity_cutoff_hz: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            median_kernel: 3,
            order: 3,
            motion_cutoff_hz: 20.0,
            gravity_cutoff_hz: 0.3,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7777".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub filter: FilterConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, StreamError> {
        let config: AppConfig = serde_json::from_str(raw)
            .map_err(|e| StreamError::Config(format!("cannot parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Session rules plus a trial filter design at the configured sampling rate.
    pub fn validate(&self) -> Result<(), StreamError> {
        self.session.validate()?;
        FeaturePipeline::new(
            &self.filter,
            self.session.window_size,
            self.session.sampling_frequency,
        )?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, StreamError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_phone_setup() {
        let config = AppConfig::default();
        assert_eq!(config.session.window_size, 128);
        assert_eq!(config.session.overlap_fraction, 0.5);
        assert_eq!(config.session.buffer_capacity(), 128);
        assert_eq!(config.server.bind_addr, "0.0.0.0:7777");
        config.session.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            AppConfig::from_json_str(r#"{"session":{"window_size":64},"filter":{"order":2}}"#)
                .unwrap();
        assert_eq!(config.session.window_size, 64);
        assert_eq!(config.session.overlap_fraction, 0.5);
        assert_eq!(config.filter.order, 2);
        assert_eq!(config.filter.motion_cutoff_hz, 20.0);
    }

    #[test]
    fn zero_step_is_rejected_at_startup() {
        let err = AppConfig::from_json_str(
            r#"{"session":{"window_size":4,"overlap_fraction":0.2}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn channel_names_must_be_six_distinct() {
        let mut session = SessionConfig::default();
        session.channel_names[5] = session.channel_names[0].clone();
        assert!(session.validate().is_err());
        session.channel_names.pop();
        assert!(session.validate().is_err());
    }

    #[test]
    fn buffer_smaller_than_window_is_rejected() {
        let session = SessionConfig {
            buffer_capacity: Some(100),
            ..SessionConfig::default()
        };
        assert!(session.validate().is_err());
    }

    #[test]
    fn filter_cutoff_above_nyquist_is_rejected_at_load() {
        let err = AppConfig::from_json_str(r#"{"filter":{"motion_cutoff_hz":40.0}}"#).unwrap_err();
        assert!(matches!(err, StreamError::Filter(_)));
        let err = AppConfig::from_json_str(r#"{"filter":{"median_kernel":2}}"#).unwrap_err();
        assert!(matches!(err, StreamError::Filter(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(AppConfig::from_json_str(r#"{"session":{"window":64}}"#).is_err());
    }
}
