//! Contracts implemented outside the core
//!
//! [`OwningCall`] is the call a connection belongs to. [`TechnologyConnection`]
//! is implemented once per radio/bearer technology; each implementation holds
//! a [`Connection`] and adds hangup and disconnect-cause semantics on top.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::connection::Connection;
use crate::error::Result;
use crate::post_dial::PostDialController;
use crate::types::{CallState, ConferenceParticipant, Presentation, UusInfo};

/// The call a connection is attached to
pub trait OwningCall: Send + Sync {
    /// Aggregate state across every connection of the call
    fn state(&self) -> CallState;

    /// Conference roster, if the call is a conference
    fn conference_participants(&self) -> Option<Vec<ConferenceParticipant>> {
        None
    }
}

/// Technology-specific behaviour layered over a [`Connection`]
pub trait TechnologyConnection: Send {
    fn connection(&self) -> &Connection;

    fn connection_mut(&mut self) -> &mut Connection;

    /// Hang up this leg. Fails with a call-state error when the current state
    /// does not allow it; the error is returned to the caller unchanged.
    fn hangup(&mut self) -> Result<()>;

    /// Hang up a ringing leg with an explicit cause
    fn hangup_with_cause(&mut self, _cause: i32) -> Result<()> {
        Ok(())
    }

    /// Detach this leg from its current (conference) call
    fn separate(&mut self) -> Result<()>;

    /// Only meaningful once disconnected
    fn disconnect_cause(&self) -> i32;

    fn precise_disconnect_cause(&self) -> i32;

    fn vendor_disconnect_cause(&self) -> Option<String>;

    fn disconnect_time(&self) -> Option<DateTime<Utc>>;

    fn hold_duration_millis(&self) -> u64;

    fn uus_info(&self) -> Option<UusInfo>;

    fn is_multiparty(&self) -> bool;

    fn number_presentation(&self) -> Presentation {
        self.connection().number_presentation()
    }

    fn post_dial(&self) -> &Arc<PostDialController> {
        self.connection().post_dial()
    }

    /// Drop a participant from the conference hosted on this leg
    fn on_disconnect_conference_participant(&mut self, _endpoint: &str) {}
}
