//! # RVoIP Connection Core
//!
//! Call-leg state for telephony connections: identity and timestamps,
//! capability negotiation, listener fan-out, post-dial DTMF playback, and
//! migration of a leg across a radio-technology handover.
//!
//! ## Quick Start
//!
//! ```rust
//! use rvoip_connection_core::{Connection, ConnectionListener, Capabilities, PostDialState};
//! use rvoip_connection_core::post_dial::QueuedPauseScheduler;
//! use std::sync::Arc;
//!
//! struct Ui;
//! impl ConnectionListener for Ui {
//!     fn on_connection_capabilities_changed(&self, caps: Capabilities) {
//!         println!("capabilities now {}", caps);
//!     }
//! }
//!
//! let mut conn = Connection::outgoing("5551234;99")
//!     .pause_scheduler(QueuedPauseScheduler::new())
//!     .build()?;
//! conn.add_listener(Arc::new(Ui));
//!
//! conn.set_connection_capabilities(Capabilities::SUPPORTS_VT_LOCAL_BIDIRECTIONAL);
//! conn.mark_connected();
//! assert_eq!(conn.post_dial_state(), PostDialState::Wait);
//!
//! conn.proceed_after_wait_char();
//! assert_eq!(conn.post_dial_state(), PostDialState::Complete);
//! # Ok::<(), rvoip_connection_core::ConnectionError>(())
//! ```
//!
//! ## Architecture
//!
//! - `capability`: pure bitmask helpers
//! - `listener`: listener trait, event enum and the copy-on-write registry
//! - `post_dial`: post-dial playback state machine
//! - `connection`: the per-leg record and its setters
//! - `migration`: handover state transfer
//! - `technology`: contracts for the owning call and per-technology hooks

pub mod capability;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod listener;
pub mod migration;
pub mod post_dial;
pub mod technology;
pub mod types;

pub use capability::{add_capability, remove_capability, Capabilities};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConnectionConfig, PostDialConfig};
pub use connection::{Connection, ConnectionBuilder, UserData};
pub use error::{ConnectionError, Result};
pub use listener::{ConnectionEvent, ConnectionListener, ListenerRegistry};
pub use post_dial::{PauseScheduler, PostDialController, PostDialListener, PostDialState, TokioPauseScheduler};
pub use technology::{OwningCall, TechnologyConnection};
pub use types::*;
