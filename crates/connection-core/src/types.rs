//! Core types shared across the connection modules

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unique identifier for a connection (call leg)
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConnectionId(pub uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Aggregate state of the call that owns a connection
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Default)]
pub enum CallState {
    #[default]
    Idle,
    Active,
    Holding,
    Dialing,
    Alerting,
    Incoming,
    Waiting,
    Disconnected,
    Disconnecting,
}

impl CallState {
    /// Any state other than idle or (being) disconnected
    pub fn is_alive(&self) -> bool {
        !matches!(self, Self::Idle | Self::Disconnected | Self::Disconnecting)
    }

    pub fn is_ringing(&self) -> bool {
        matches!(self, Self::Incoming | Self::Waiting)
    }

    pub fn is_dialing(&self) -> bool {
        matches!(self, Self::Dialing | Self::Alerting)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
            Self::Holding => "HOLDING",
            Self::Dialing => "DIALING",
            Self::Alerting => "ALERTING",
            Self::Incoming => "INCOMING",
            Self::Waiting => "WAITING",
            Self::Disconnected => "DISCONNECTED",
            Self::Disconnecting => "DISCONNECTING",
        };
        f.write_str(name)
    }
}

/// Presentation indicator for a number or a caller name (CLIP/CNAP)
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Default)]
pub enum Presentation {
    #[default]
    Allowed = 1,
    Restricted = 2,
    Unknown = 3,
    Payphone = 4,
}

impl Presentation {
    /// Numeric code as carried in call-control signalling
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Allowed),
            2 => Some(Self::Restricted),
            3 => Some(Self::Unknown),
            4 => Some(Self::Payphone),
            _ => None,
        }
    }
}

/// Audio quality of the bearer
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum AudioQuality {
    Standard = 1,
    HighDefinition = 2,
}

impl AudioQuality {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Time on the monotonic clock, in milliseconds since an arbitrary origin.
///
/// Kept apart from wall-clock timestamps so the two can never be subtracted
/// from each other.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MonotonicMillis(pub u64);

impl MonotonicMillis {
    /// Milliseconds elapsed between `earlier` and `self`, saturating at zero
    pub fn since(self, earlier: MonotonicMillis) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// A participant in a conference as reported by the owning call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceParticipant {
    /// Participant handle (usually a tel: or sip: URI)
    pub handle: String,
    pub display_name: Option<String>,
    /// Endpoint URI used to address the participant in the conference
    pub endpoint: String,
    /// Participant state, as reported by the conference event package
    pub state: CallState,
}

/// User-to-user signalling payload attached to a call leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UusInfo {
    pub uus_type: i32,
    pub dcs: i32,
    pub data: Vec<u8>,
}

/// Opaque key/value extras carried alongside a connection
pub type Extras = serde_json::Map<String, serde_json::Value>;

/// Handle to the video pipeline bound to a connection.
///
/// The core only stores and forwards it to listeners; it never calls into it.
pub trait VideoProvider: fmt::Debug + Send + Sync {}

pub type VideoProviderRef = Arc<dyn VideoProvider>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_state_predicates() {
        assert!(!CallState::Idle.is_alive());
        assert!(!CallState::Disconnecting.is_alive());
        assert!(CallState::Holding.is_alive());
        assert!(CallState::Waiting.is_ringing());
        assert!(!CallState::Active.is_ringing());
        assert!(CallState::Alerting.is_dialing());
    }

    #[test]
    fn test_presentation_codes() {
        assert_eq!(Presentation::default(), Presentation::Allowed);
        assert_eq!(Presentation::from_code(4), Some(Presentation::Payphone));
        assert_eq!(Presentation::from_code(9), None);
        assert_eq!(Presentation::Restricted.code(), 2);
    }

    #[test]
    fn test_monotonic_since_saturates() {
        assert_eq!(MonotonicMillis(1500).since(MonotonicMillis(1000)), 500);
        assert_eq!(MonotonicMillis(10).since(MonotonicMillis(20)), 0);
    }
}
