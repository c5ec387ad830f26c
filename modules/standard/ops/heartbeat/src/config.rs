use std::time::Duration;

use serde::Deserialize;

/// `modules."standard.ops.heartbeat"` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HeartbeatConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Settings key receiving the RFC 3339 time of the last beat.
    pub settings_key: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            settings_key: "heartbeat.last_beat".to_string(),
        }
    }
}
