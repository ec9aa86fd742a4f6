//! Handover migration
//!
//! When a call moves to another radio technology the new technology layer
//! builds a fresh [`Connection`] and takes over the old one's lifecycle data:
//!
//! - the listener registry itself (shared, so subscribers need not re-register);
//! - the dialed number, empty rather than absent for incoming calls;
//! - creation, connect (wall and monotonic) and holding-start times;
//! - the back-reference to the first connection of the handover chain.
//!
//! Post-dial state, capabilities and media/extras fields are left alone; the
//! new technology re-establishes them.

use tracing::debug;

use crate::connection::Connection;

/// Copy lifecycle state from `source` into `dest`
pub fn migrate(source: &Connection, dest: &mut Connection) {
    dest.listeners = source.listeners.clone();
    dest.dial_string = Some(source.orig_dial_string());
    dest.create_time = source.create_time;
    dest.connect_time = source.connect_time;
    dest.connect_time_real = source.connect_time_real;
    dest.holding_start_time = source.holding_start_time;
    dest.orig_connection = Some(source.orig_connection.unwrap_or_else(|| source.id()));

    debug!(
        from = %source.id(),
        to = %dest.id(),
        origin = ?dest.orig_connection,
        listeners = dest.listeners.len(),
        "connection migrated"
    );
}
