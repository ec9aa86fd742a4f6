//! Connection configuration
//!
//! ```rust
//! use rvoip_connection_core::config::{ConnectionConfig, PostDialConfig};
//! use std::time::Duration;
//!
//! let config = ConnectionConfig::new()
//!     .with_post_dial(PostDialConfig::default().with_pause_delay(Duration::from_millis(2000)))
//!     .with_log_pii(true);
//!
//! assert_eq!(config.post_dial.pause_delay, Duration::from_millis(2000));
//! assert_eq!(config.post_dial.wait_char, ';');
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConnectionError, Result};

/// Default delay applied for each pause marker
pub const DEFAULT_PAUSE_DELAY: Duration = Duration::from_millis(3000);

/// Post-dial string handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostDialConfig {
    /// Marker that stops playback until the user confirms
    pub wait_char: char,
    /// Marker replaced by user supplied digits before playback resumes
    pub wild_char: char,
    /// Marker that pauses playback for `pause_delay`
    pub pause_char: char,
    #[serde(with = "duration_millis")]
    pub pause_delay: Duration,
}

impl Default for PostDialConfig {
    fn default() -> Self {
        Self {
            wait_char: ';',
            wild_char: 'N',
            pause_char: ',',
            pause_delay: DEFAULT_PAUSE_DELAY,
        }
    }
}

impl PostDialConfig {
    pub fn with_pause_delay(mut self, delay: Duration) -> Self {
        self.pause_delay = delay;
        self
    }

    pub fn with_markers(mut self, wait: char, wild: char, pause: char) -> Self {
        self.wait_char = wait;
        self.wild_char = wild;
        self.pause_char = pause;
        self
    }

    /// Markers must be distinct and must not be dialable characters
    pub fn validate(&self) -> Result<()> {
        let markers = [self.wait_char, self.wild_char, self.pause_char];
        if markers.iter().any(|c| crate::post_dial::is_dialable(*c)) {
            return Err(ConnectionError::config("post-dial marker collides with a dialable character"));
        }
        if markers[0] == markers[1] || markers[0] == markers[2] || markers[1] == markers[2] {
            return Err(ConnectionError::config("post-dial markers must be distinct"));
        }
        Ok(())
    }
}

/// Per-connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConnectionConfig {
    pub post_dial: PostDialConfig,
    /// Include numbers and names when formatting a connection
    pub log_pii: bool,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post_dial(mut self, post_dial: PostDialConfig) -> Self {
        self.post_dial = post_dial;
        self
    }

    pub fn with_log_pii(mut self, log_pii: bool) -> Self {
        self.log_pii = log_pii;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.post_dial.validate()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
