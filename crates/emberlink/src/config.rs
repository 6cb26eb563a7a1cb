//! Per-connection configuration.

use std::time::Duration;

use emberlink_wire::{DEFAULT_MAX_TRANSMISSION_SIZE, MAX_FRAME_LEN, WireLimits, max_chunk_for};
use serde::{Deserialize, Serialize};

use crate::EmberlinkError;

// ---------------------------------------------------------------------------
// ConnectionConfig
// ---------------------------------------------------------------------------

/// Settings for one [`Connection`](crate::Connection) and the
/// [`Messenger`](crate::Messenger) driving it.
///
/// Every field has a default, so a JSON document only needs the keys it
/// wants to change:
///
/// ```rust
/// use emberlink::ConnectionConfig;
///
/// let config = ConnectionConfig::from_json(r#"{ "max_transmission_size": 1200 }"#).unwrap();
/// assert_eq!(config.max_transmission_size, 1200);
/// assert_eq!(config.queue_capacity, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Largest datagram we'll send, frame header included. Messages
    /// whose frame would be bigger are fragmented.
    pub max_transmission_size: usize,

    /// Receive-side hardening limits.
    pub limits: WireLimits,

    /// How long an incomplete multipart group may go without a new part
    /// before it's dropped.
    pub group_idle_timeout: Duration,

    /// How often the messenger sweeps for idle groups.
    pub eviction_interval: Duration,

    /// Capacity of the messenger's command and inbound message queues.
    pub queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_transmission_size: DEFAULT_MAX_TRANSMISSION_SIZE,
            limits: WireLimits::default(),
            group_idle_timeout: Duration::from_secs(5),
            eviction_interval: Duration::from_secs(1),
            queue_capacity: 256,
        }
    }
}

impl ConnectionConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    /// Parses a config from JSON and validates it.
    ///
    /// # Errors
    /// Returns [`EmberlinkError::Config`] if the JSON is invalid or a
    /// value is out of range.
    pub fn from_json(json: &str) -> Result<Self, EmberlinkError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EmberlinkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Largest chunk per part frame under this transmission size.
    pub fn max_chunk_bytes(&self) -> usize {
        max_chunk_for(self.max_transmission_size)
    }

    /// Checks that the values can actually work together.
    ///
    /// # Errors
    /// Returns [`EmberlinkError::Config`] naming the first bad field.
    pub fn validate(&self) -> Result<(), EmberlinkError> {
        if self.max_chunk_bytes() == 0 {
            return Err(EmberlinkError::Config(format!(
                "max_transmission_size {} leaves no room for a part chunk",
                self.max_transmission_size
            )));
        }
        if self.limits.max_buffer_bytes < MAX_FRAME_LEN {
            return Err(EmberlinkError::Config(format!(
                "max_buffer_bytes {} is smaller than one maximum frame ({MAX_FRAME_LEN})",
                self.limits.max_buffer_bytes
            )));
        }
        if self.limits.max_parts == 0 || self.limits.max_open_groups == 0 {
            return Err(EmberlinkError::Config(
                "max_parts and max_open_groups must be at least 1".into(),
            ));
        }
        if self.eviction_interval.is_zero() {
            return Err(EmberlinkError::Config("eviction_interval must be non-zero".into()));
        }
        if self.queue_capacity == 0 {
            return Err(EmberlinkError::Config("queue_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConnectionConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for [`ConnectionConfig`].
///
/// ```rust
/// use std::time::Duration;
/// use emberlink::ConnectionConfig;
///
/// let config = ConnectionConfig::builder()
///     .max_transmission_size(1200)
///     .group_idle_timeout(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// assert_eq!(config.max_chunk_bytes(), 1200 - 18);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_transmission_size(mut self, bytes: usize) -> Self {
        self.config.max_transmission_size = bytes;
        self
    }

    pub fn limits(mut self, limits: WireLimits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn group_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.group_idle_timeout = timeout;
        self
    }

    pub fn eviction_interval(mut self, interval: Duration) -> Self {
        self.config.eviction_interval = interval;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Validates and returns the config.
    ///
    /// # Errors
    /// See [`ConnectionConfig::validate`].
    pub fn build(self) -> Result<ConnectionConfig, EmberlinkError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ConnectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_transmission_size, 512);
        assert_eq!(config.max_chunk_bytes(), 494);
        assert_eq!(config.group_idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_tiny_transmission_size_rejected() {
        let err = ConnectionConfig::builder()
            .max_transmission_size(18)
            .build()
            .unwrap_err();
        assert!(matches!(err, EmberlinkError::Config(_)));
        assert!(ConnectionConfig::builder().max_transmission_size(19).build().is_ok());
    }

    #[test]
    fn test_small_buffer_rejected() {
        let limits = WireLimits {
            max_buffer_bytes: 1024,
            ..WireLimits::default()
        };
        let err = ConnectionConfig::builder().limits(limits).build().unwrap_err();
        assert!(err.to_string().contains("max_buffer_bytes"));
    }

    #[test]
    fn test_zero_interval_and_queue_rejected() {
        assert!(ConnectionConfig::builder()
            .eviction_interval(Duration::ZERO)
            .build()
            .is_err());
        assert!(ConnectionConfig::builder().queue_capacity(0).build().is_err());
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config =
            ConnectionConfig::from_json(r#"{ "limits": { "max_open_groups": 8 } }"#).unwrap();
        assert_eq!(config.limits.max_open_groups, 8);
        assert_eq!(config.limits.max_parts, WireLimits::default().max_parts);
        assert_eq!(config.max_transmission_size, 512);
    }

    #[test]
    fn test_from_json_rejects_garbage_and_bad_values() {
        assert!(matches!(
            ConnectionConfig::from_json("not json"),
            Err(EmberlinkError::Config(_))
        ));
        assert!(ConnectionConfig::from_json(r#"{ "queue_capacity": 0 }"#).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = ConnectionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ConnectionConfig::from_json(&json).unwrap(), config);
    }
}
