//! Connection capability bitmask
//!
//! Capabilities are independent bits OR-combined into a single mask. The
//! helpers here are pure; change detection happens in
//! [`Connection::set_connection_capabilities`](crate::Connection::set_connection_capabilities).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Capability bitmask of a connection
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct Capabilities(pub u32);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    /// Local side can downgrade a video call to voice
    pub const SUPPORTS_DOWNGRADE_TO_VOICE_LOCAL: Capabilities = Capabilities(0x0000_0001);
    /// Remote side can downgrade a video call to voice
    pub const SUPPORTS_DOWNGRADE_TO_VOICE_REMOTE: Capabilities = Capabilities(0x0000_0002);
    /// Local side supports bidirectional video
    pub const SUPPORTS_VT_LOCAL_BIDIRECTIONAL: Capabilities = Capabilities(0x0000_0004);
    /// Remote side supports bidirectional video
    pub const SUPPORTS_VT_REMOTE_BIDIRECTIONAL: Capabilities = Capabilities(0x0000_0008);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `flag` is set
    pub fn contains(self, flag: Capabilities) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn with(self, flag: Capabilities) -> Self {
        add_capability(self, flag)
    }

    pub fn without(self, flag: Capabilities) -> Self {
        remove_capability(self, flag)
    }
}

/// Returns `mask` with `flag` set
pub fn add_capability(mask: Capabilities, flag: Capabilities) -> Capabilities {
    Capabilities(mask.0 | flag.0)
}

/// Returns `mask` with `flag` cleared
pub fn remove_capability(mask: Capabilities, flag: Capabilities) -> Capabilities {
    Capabilities(mask.0 & !flag.0)
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        add_capability(self, rhs)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Capabilities) {
        *self = add_capability(*self, rhs);
    }
}

impl From<u32> for Capabilities {
    fn from(bits: u32) -> Self {
        Capabilities(bits)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
