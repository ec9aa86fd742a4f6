//! Connection record
//!
//! A [`Connection`] is one call leg: who is on the other end, when it was
//! created and connected, what it can do, and who is listening. Setters update
//! local state and then fan out through the shared [`ListenerRegistry`].
//!
//! Most setters notify on every call. [`Connection::set_connection_capabilities`]
//! is the exception and only notifies when the mask actually changes; callers
//! relying on change detection for other fields must do it themselves.
//!
//! Setters take `&mut self`: one call-control context writes a connection at
//! a time. The listener registry and post-dial controller are the only parts
//! safe to touch from other threads.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::capability::Capabilities;
use crate::clock::{Clock, SystemClock};
use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};
use crate::listener::{ConnectionEvent, ConnectionListener, ListenerRegistry};
use crate::migration;
use crate::post_dial::{PauseScheduler, PostDialController, PostDialListener, PostDialState, TokioPauseScheduler};
use crate::technology::OwningCall;
use crate::types::{
    AudioQuality, CallState, ConferenceParticipant, ConnectionId, Extras, MonotonicMillis, Presentation,
    VideoProviderRef,
};

/// Opaque per-connection slot for the call-control layer
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Split a dialed number into the network portion and the post-dial string.
///
/// The post-dial string starts at the first wait, wild or pause marker and
/// keeps that marker.
pub fn split_dial_string(dial_string: &str, config: &ConnectionConfig) -> (String, String) {
    let markers = [config.post_dial.wait_char, config.post_dial.wild_char, config.post_dial.pause_char];
    match dial_string.char_indices().find(|(_, c)| markers.contains(c)) {
        Some((idx, _)) => (dial_string[..idx].to_string(), dial_string[idx..].to_string()),
        None => (dial_string.to_string(), String::new()),
    }
}

/// Builder for [`Connection`]
pub struct ConnectionBuilder {
    is_incoming: bool,
    address: Option<String>,
    dial_string: Option<String>,
    config: ConnectionConfig,
    clock: Arc<dyn Clock>,
    scheduler: Option<Arc<dyn PauseScheduler>>,
    listeners: Option<Arc<ListenerRegistry>>,
}

impl ConnectionBuilder {
    fn new(is_incoming: bool) -> Self {
        Self {
            is_incoming,
            address: None,
            dial_string: None,
            config: ConnectionConfig::default(),
            clock: Arc::new(SystemClock),
            scheduler: None,
            listeners: None,
        }
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Full dialed number, post-dial portion included (outgoing calls)
    pub fn dial_string(mut self, dial_string: impl Into<String>) -> Self {
        self.dial_string = Some(dial_string.into());
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pause_scheduler(mut self, scheduler: Arc<dyn PauseScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Start with an existing listener registry instead of an empty one
    pub fn listeners(mut self, listeners: Arc<ListenerRegistry>) -> Self {
        self.listeners = Some(listeners);
        self
    }

    /// Validate the configuration and create the connection.
    ///
    /// Without an explicit [`pause_scheduler`](Self::pause_scheduler), pause
    /// markers are timed on the current tokio runtime. Building an outgoing
    /// connection whose post-dial string pauses fails when there is no runtime
    /// to time them.
    pub fn build(self) -> Result<Connection> {
        self.config.validate()?;
        let (address, post_dial_string) = match (&self.dial_string, self.is_incoming) {
            (Some(dial), false) => {
                let (network, post_dial) = split_dial_string(dial, &self.config);
                (self.address.or(Some(network)), post_dial)
            }
            _ => (self.address, String::new()),
        };
        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => {
                if post_dial_string.contains(self.config.post_dial.pause_char)
                    && tokio::runtime::Handle::try_current().is_err()
                {
                    return Err(ConnectionError::config(
                        "post-dial pause needs a tokio runtime or an explicit pause scheduler",
                    ));
                }
                Arc::new(TokioPauseScheduler)
            }
        };
        let post_dial = PostDialController::new(self.config.post_dial.clone(), scheduler);
        let id = ConnectionId::new();
        debug!(%id, incoming = self.is_incoming, "connection created");

        Ok(Connection {
            id,
            is_incoming: self.is_incoming,
            address,
            number_presentation: Presentation::Allowed,
            cnap_name: None,
            cnap_name_presentation: Presentation::Allowed,
            redirecting_address: None,
            forwarding_address: None,
            dial_string: self.dial_string,
            post_dial_string,
            number_converted: false,
            converted_number: None,
            create_time: Some(self.clock.now_wall()),
            connect_time: None,
            connect_time_real: None,
            duration: None,
            holding_start_time: None,
            capabilities: Capabilities::NONE,
            video_state: 0,
            video_provider: None,
            audio_quality: None,
            is_wifi: false,
            call_substate: 0,
            call_type: 0,
            extras: None,
            orig_connection: None,
            pre_handover_state: CallState::Idle,
            pre_multiparty_state: false,
            listeners: self.listeners.unwrap_or_default(),
            post_dial,
            call: None,
            user_data: None,
            config: self.config,
            clock: self.clock,
        })
    }
}

/// State of a single call leg
pub struct Connection {
    id: ConnectionId,
    is_incoming: bool,

    address: Option<String>,
    number_presentation: Presentation,
    cnap_name: Option<String>,
    cnap_name_presentation: Presentation,
    redirecting_address: Option<String>,
    forwarding_address: Option<String>,
    pub(crate) dial_string: Option<String>,
    post_dial_string: String,
    number_converted: bool,
    converted_number: Option<String>,

    // wall clock
    pub(crate) create_time: Option<DateTime<Utc>>,
    pub(crate) connect_time: Option<DateTime<Utc>>,
    // monotonic clock
    pub(crate) connect_time_real: Option<MonotonicMillis>,
    pub(crate) holding_start_time: Option<MonotonicMillis>,
    duration: Option<u64>,

    capabilities: Capabilities,
    video_state: i32,
    video_provider: Option<VideoProviderRef>,
    audio_quality: Option<AudioQuality>,
    is_wifi: bool,
    call_substate: i32,
    call_type: i32,
    extras: Option<Extras>,

    pub(crate) orig_connection: Option<ConnectionId>,
    pre_handover_state: CallState,
    pre_multiparty_state: bool,

    pub(crate) listeners: Arc<ListenerRegistry>,
    post_dial: Arc<PostDialController>,
    call: Option<Arc<dyn OwningCall>>,
    user_data: Option<UserData>,

    config: ConnectionConfig,
    clock: Arc<dyn Clock>,
}

impl Connection {
    pub fn outgoing(dial_string: impl Into<String>) -> ConnectionBuilder {
        ConnectionBuilder::new(false).dial_string(dial_string)
    }

    pub fn incoming(address: impl Into<String>) -> ConnectionBuilder {
        ConnectionBuilder::new(true).address(address)
    }

    // ===== Identity =====

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_incoming(&self) -> bool {
        self.is_incoming
    }

    /// Remote number; may be absent (e.g. withheld)
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn number_presentation(&self) -> Presentation {
        self.number_presentation
    }

    pub fn set_number_presentation(&mut self, presentation: Presentation) {
        self.number_presentation = presentation;
    }

    pub fn cnap_name(&self) -> Option<&str> {
        self.cnap_name.as_deref()
    }

    pub fn set_cnap_name(&mut self, name: Option<String>) {
        self.cnap_name = name;
    }

    pub fn cnap_name_presentation(&self) -> Presentation {
        self.cnap_name_presentation
    }

    pub fn set_cnap_name_presentation(&mut self, presentation: Presentation) {
        self.cnap_name_presentation = presentation;
    }

    pub fn redirecting_address(&self) -> Option<&str> {
        self.redirecting_address.as_deref()
    }

    pub fn set_redirecting_address(&mut self, address: Option<String>) {
        self.redirecting_address = address;
    }

    pub fn forwarding_address(&self) -> Option<&str> {
        self.forwarding_address.as_deref()
    }

    pub fn set_forwarding_address(&mut self, address: Option<String>) {
        self.forwarding_address = address;
    }

    /// Dialed number, or an empty string for incoming connections
    pub fn orig_dial_string(&self) -> String {
        self.dial_string.clone().unwrap_or_default()
    }

    /// Replace the dialed number with `original` after the network converted it
    /// (e.g. emergency or short code mapping). The converted number is kept.
    pub fn set_converted(&mut self, original: impl Into<String>) {
        let original = original.into();
        debug!(id = %self.id, "number converted");
        self.number_converted = true;
        self.converted_number = self.address.take();
        self.address = Some(original.clone());
        self.dial_string = Some(original);
    }

    pub fn is_number_converted(&self) -> bool {
        self.number_converted
    }

    pub fn converted_number(&self) -> Option<&str> {
        self.converted_number.as_deref()
    }

    // ===== Timestamps =====

    pub fn create_time(&self) -> Option<DateTime<Utc>> {
        self.create_time
    }

    pub fn connect_time(&self) -> Option<DateTime<Utc>> {
        self.connect_time
    }

    pub fn set_connect_time(&mut self, connect_time: Option<DateTime<Utc>>) {
        self.connect_time = connect_time;
    }

    pub fn connect_time_real(&self) -> Option<MonotonicMillis> {
        self.connect_time_real
    }

    pub fn set_connect_time_real(&mut self, connect_time_real: Option<MonotonicMillis>) {
        self.connect_time_real = connect_time_real;
    }

    pub fn holding_start_time(&self) -> Option<MonotonicMillis> {
        self.holding_start_time
    }

    /// Record connect times and start post-dial playback for outgoing calls.
    ///
    /// A repeat connect keeps the first connect times, so the live duration
    /// keeps counting from the original connect.
    pub fn mark_connected(&mut self) {
        if self.connect_time_real.is_some() {
            debug!(id = %self.id, "connection already connected, keeping connect time");
        } else {
            self.connect_time = Some(self.clock.now_wall());
            self.connect_time_real = Some(self.clock.now_monotonic());
            debug!(id = %self.id, "connection connected");
        }
        if !self.is_incoming {
            self.post_dial.start(&self.post_dial_string);
        }
    }

    /// Record the moment the connection went on hold
    pub fn mark_holding(&mut self) {
        self.holding_start_time = Some(self.clock.now_monotonic());
    }

    /// Call duration in milliseconds.
    ///
    /// Zero until connected, live while connected, and fixed once
    /// [`freeze_duration`](Self::freeze_duration) has run.
    pub fn duration_millis(&self) -> u64 {
        match (self.connect_time_real, self.duration) {
            (None, _) => 0,
            (Some(_), Some(frozen)) => frozen,
            (Some(connected), None) => self.clock.now_monotonic().since(connected),
        }
    }

    /// Fix the duration at its current value. Later calls return the first value.
    pub fn freeze_duration(&mut self) -> u64 {
        if let Some(frozen) = self.duration {
            return frozen;
        }
        let frozen = self.duration_millis();
        self.duration = Some(frozen);
        debug!(id = %self.id, duration_ms = frozen, "duration frozen");
        frozen
    }

    pub fn set_frozen_duration(&mut self, millis: u64) {
        self.duration = Some(millis);
    }

    // ===== Capabilities & media =====

    pub fn connection_capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Notifies only when `capabilities` differs from the current mask
    pub fn set_connection_capabilities(&mut self, capabilities: Capabilities) {
        if self.capabilities == capabilities {
            return;
        }
        debug!(id = %self.id, "capabilities {} -> {}", self.capabilities, capabilities);
        self.capabilities = capabilities;
        self.listeners.notify(&ConnectionEvent::CapabilitiesChanged(capabilities));
    }

    pub fn video_state(&self) -> i32 {
        self.video_state
    }

    pub fn set_video_state(&mut self, video_state: i32) {
        self.video_state = video_state;
        self.listeners.notify(&ConnectionEvent::VideoStateChanged(video_state));
    }

    pub fn video_provider(&self) -> Option<&VideoProviderRef> {
        self.video_provider.as_ref()
    }

    pub fn set_video_provider(&mut self, provider: Option<VideoProviderRef>) {
        self.video_provider = provider.clone();
        self.listeners.notify(&ConnectionEvent::VideoProviderChanged(provider));
    }

    pub fn audio_quality(&self) -> Option<AudioQuality> {
        self.audio_quality
    }

    pub fn set_audio_quality(&mut self, audio_quality: AudioQuality) {
        self.audio_quality = Some(audio_quality);
        self.listeners.notify(&ConnectionEvent::AudioQualityChanged(audio_quality));
    }

    pub fn is_wifi(&self) -> bool {
        self.is_wifi
    }

    pub fn set_wifi(&mut self, is_wifi: bool) {
        self.is_wifi = is_wifi;
        self.listeners.notify(&ConnectionEvent::WifiChanged(is_wifi));
    }

    pub fn call_substate(&self) -> i32 {
        self.call_substate
    }

    pub fn set_call_substate(&mut self, call_substate: i32) {
        self.call_substate = call_substate;
        self.listeners.notify(&ConnectionEvent::CallSubstateChanged(call_substate));
    }

    pub fn call_type(&self) -> i32 {
        self.call_type
    }

    /// Notifies on every call, even when the value is unchanged
    pub fn set_call_type(&mut self, call_type: i32) {
        self.call_type = call_type;
        self.listeners.notify(&ConnectionEvent::CallTypeChanged(call_type));
    }

    pub fn connection_extras(&self) -> Option<&Extras> {
        self.extras.as_ref()
    }

    /// Replace the extras wholesale
    pub fn set_connection_extras(&mut self, extras: Option<Extras>) {
        self.extras = extras.clone();
        self.listeners.notify(&ConnectionEvent::ExtrasChanged(extras));
    }

    // ===== Conference relays =====

    pub fn update_conference_participants(&self, participants: Vec<ConferenceParticipant>) {
        self.listeners.notify(&ConnectionEvent::ConferenceParticipantsChanged(participants));
    }

    pub fn update_multiparty_state(&self, is_multiparty: bool) {
        self.listeners.notify(&ConnectionEvent::MultipartyStateChanged(is_multiparty));
    }

    pub fn on_conference_merge_failed(&self) {
        self.listeners.notify(&ConnectionEvent::ConferenceMergeFailed);
    }

    pub fn notify_supp_service_failed(&self, action_code: i32) {
        self.listeners.notify(&ConnectionEvent::SuppServiceFailed(action_code));
    }

    pub fn notify_conference_participants_invited(&self, is_success: bool) {
        self.listeners.notify(&ConnectionEvent::ConferenceParticipantsInvited(is_success));
    }

    pub fn notify_conference_connections_configured(&self, radio_connections: Vec<ConnectionId>) {
        self.listeners.notify(&ConnectionEvent::ConferenceConnectionsConfigured(radio_connections));
    }

    // ===== Listeners =====

    pub fn add_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ConnectionListener>) {
        self.listeners.remove(listener);
    }

    /// The registry, shared with any connection migrated from this one
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    // ===== Post-dial =====

    pub fn post_dial(&self) -> &Arc<PostDialController> {
        &self.post_dial
    }

    pub fn post_dial_state(&self) -> PostDialState {
        self.post_dial.state()
    }

    pub fn remaining_post_dial_string(&self) -> String {
        self.post_dial.remaining_post_dial_string()
    }

    pub fn add_post_dial_listener(&self, listener: Arc<dyn PostDialListener>) {
        self.post_dial.add_listener(listener);
    }

    pub fn remove_post_dial_listener(&self, listener: &Arc<dyn PostDialListener>) {
        self.post_dial.remove_listener(listener);
    }

    pub fn clear_post_dial_listeners(&self) {
        self.post_dial.clear_listeners();
    }

    pub fn proceed_after_wait_char(&self) {
        self.post_dial.proceed_after_wait_char();
    }

    pub fn proceed_after_wild_char(&self, replacement: &str) {
        self.post_dial.proceed_after_wild_char(replacement);
    }

    pub fn cancel_post_dial(&self) {
        self.post_dial.cancel_post_dial();
    }

    // ===== Owning call =====

    pub fn attach_call(&mut self, call: Arc<dyn OwningCall>) {
        self.call = Some(call);
    }

    pub fn detach_call(&mut self) {
        self.call = None;
    }

    pub fn call(&self) -> Option<&Arc<dyn OwningCall>> {
        self.call.as_ref()
    }

    /// Aggregate state of the owning call, idle when unattached
    pub fn state(&self) -> CallState {
        self.call.as_ref().map(|c| c.state()).unwrap_or_default()
    }

    pub fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    pub fn is_ringing(&self) -> bool {
        self.state().is_ringing()
    }

    pub fn conference_participants(&self) -> Option<Vec<ConferenceParticipant>> {
        self.call.as_ref().and_then(|c| c.conference_participants())
    }

    // ===== Handover =====

    /// First connection in the handover chain this one descends from
    pub fn orig_connection(&self) -> Option<ConnectionId> {
        self.orig_connection
    }

    pub fn state_before_handover(&self) -> CallState {
        self.pre_handover_state
    }

    pub fn set_pre_handover_state(&mut self, state: CallState) {
        self.pre_handover_state = state;
    }

    pub fn is_multiparty_before_handover(&self) -> bool {
        self.pre_multiparty_state
    }

    pub fn set_pre_multiparty_state(&mut self, is_multiparty: bool) {
        self.pre_multiparty_state = is_multiparty;
    }

    /// Take over lifecycle data and listeners from `source`; no-op when absent
    pub fn migrate_from(&mut self, source: Option<&Connection>) {
        if let Some(source) = source {
            migration::migrate(source, self);
        }
    }

    // ===== User data =====

    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    pub fn set_user_data(&mut self, data: UserData) {
        self.user_data = Some(data);
    }

    pub fn clear_user_data(&mut self) {
        self.user_data = None;
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.config.log_pii {
            write!(
                f,
                "addr: {} pres.: {} dial: {} postdial: {} cnap name: {}({}) ",
                self.address.as_deref().unwrap_or("null"),
                self.number_presentation.code(),
                self.orig_dial_string(),
                self.remaining_post_dial_string(),
                self.cnap_name.as_deref().unwrap_or("null"),
                self.cnap_name_presentation.code(),
            )?;
        }
        write!(
            f,
            "incoming: {} state: {} post dial state: {}",
            self.is_incoming,
            self.state(),
            self.post_dial_state()
        )
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("is_incoming", &self.is_incoming)
            .field("state", &self.state())
            .field("post_dial", &self.post_dial_state())
            .field("capabilities", &self.capabilities)
            .field("orig_connection", &self.orig_connection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::PostDialConfig;
    use crate::post_dial::QueuedPauseScheduler;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<String>>,
    }

    impl ConnectionListener for EventLog {
        fn on_connection_capabilities_changed(&self, capabilities: Capabilities) {
            self.events.lock().push(format!("caps:{}", capabilities.bits()));
        }

        fn on_call_type_changed(&self, call_type: i32) {
            self.events.lock().push(format!("type:{}", call_type));
        }

        fn on_extras_changed(&self, extras: Option<&Extras>) {
            self.events.lock().push(format!("extras:{}", extras.map(|e| e.len()).unwrap_or(0)));
        }
    }

    fn outgoing(dial: &str, clock: Arc<ManualClock>) -> Connection {
        Connection::outgoing(dial)
            .clock(clock)
            .pause_scheduler(QueuedPauseScheduler::new())
            .build()
            .unwrap()
    }

    #[test]
    fn test_split_dial_string() {
        let config = ConnectionConfig::default();
        assert_eq!(split_dial_string("5551234;99", &config), ("5551234".into(), ";99".into()));
        assert_eq!(split_dial_string("5551234", &config), ("5551234".into(), "".into()));
        assert_eq!(split_dial_string("555,1", &config), ("555".into(), ",1".into()));
    }

    #[test]
    fn test_capabilities_change_check() {
        let mut conn = Connection::incoming("5550100").build().unwrap();
        let log = Arc::new(EventLog::default());
        conn.add_listener(log.clone());

        conn.set_connection_capabilities(Capabilities::SUPPORTS_VT_LOCAL_BIDIRECTIONAL);
        conn.set_connection_capabilities(Capabilities::SUPPORTS_VT_LOCAL_BIDIRECTIONAL);
        conn.set_call_type(2);
        conn.set_call_type(2);

        assert_eq!(*log.events.lock(), vec!["caps:4", "type:2", "type:2"]);
    }

    #[test]
    fn test_extras_replaced_wholesale() {
        let mut conn = Connection::incoming("5550100").build().unwrap();
        let log = Arc::new(EventLog::default());
        conn.add_listener(log.clone());

        let mut first = Extras::new();
        first.insert("a".into(), 1.into());
        first.insert("b".into(), 2.into());
        conn.set_connection_extras(Some(first));

        let mut second = Extras::new();
        second.insert("c".into(), 3.into());
        conn.set_connection_extras(Some(second));

        let extras = conn.connection_extras().unwrap();
        assert_eq!(extras.len(), 1);
        assert!(extras.get("a").is_none());
        assert_eq!(*log.events.lock(), vec!["extras:2", "extras:1"]);
    }

    #[test]
    fn test_duration_semantics() {
        let clock = ManualClock::new(MonotonicMillis(10_000));
        let mut conn = outgoing("5551234", clock.clone());
        assert_eq!(conn.duration_millis(), 0);

        conn.mark_connected();
        clock.advance(500);
        assert_eq!(conn.duration_millis(), 500);

        assert_eq!(conn.freeze_duration(), 500);
        clock.advance(10_000);
        assert_eq!(conn.duration_millis(), 500);
        assert_eq!(conn.freeze_duration(), 500);
    }

    #[test]
    fn test_repeat_connect_keeps_first_connect_time() {
        let clock = ManualClock::new(MonotonicMillis(10_000));
        let mut conn = outgoing("5551234", clock.clone());
        conn.mark_connected();
        let first_wall = conn.connect_time();

        clock.advance(700);
        conn.mark_connected();
        assert_eq!(conn.connect_time_real(), Some(MonotonicMillis(10_000)));
        assert_eq!(conn.connect_time(), first_wall);
        assert_eq!(conn.duration_millis(), 700);
    }

    #[test]
    fn test_build_rejects_dialable_marker() {
        let config = ConnectionConfig::new().with_post_dial(PostDialConfig::default().with_markers('1', 'N', ','));
        let err = Connection::outgoing("5551234")
            .config(config)
            .pause_scheduler(QueuedPauseScheduler::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Configuration { .. }));
    }

    #[test]
    fn test_build_rejects_pause_without_timer() {
        // plain #[test] has no tokio runtime
        let err = Connection::outgoing("555,1").build().unwrap_err();
        assert!(matches!(err, ConnectionError::Configuration { .. }));

        assert!(Connection::outgoing("555;1").build().is_ok());
        assert!(Connection::incoming("555,1").build().is_ok());
    }

    #[test]
    fn test_pause_is_observable_with_explicit_scheduler() {
        let scheduler = QueuedPauseScheduler::new();
        let mut conn = Connection::outgoing("555,1")
            .pause_scheduler(scheduler.clone())
            .build()
            .unwrap();
        conn.mark_connected();
        assert_eq!(conn.post_dial_state(), PostDialState::Pause);
        assert_eq!(conn.remaining_post_dial_string(), "1");

        scheduler.run_pending();
        assert_eq!(conn.post_dial_state(), PostDialState::Complete);
    }

    #[tokio::test]
    async fn test_default_scheduler_inside_runtime() {
        let mut conn = Connection::outgoing("555,1").build().unwrap();
        conn.mark_connected();
        assert_eq!(conn.post_dial_state(), PostDialState::Pause);
    }

    #[test]
    fn test_mark_connected_starts_post_dial_for_outgoing_only() {
        let clock = ManualClock::new(MonotonicMillis(0));
        let mut out = outgoing("5551234;12", clock.clone());
        assert_eq!(out.address(), Some("5551234"));
        out.mark_connected();
        assert_eq!(out.post_dial_state(), PostDialState::Wait);
        assert_eq!(out.remaining_post_dial_string(), "12");

        let mut inc = Connection::incoming("5550100").clock(clock).build().unwrap();
        inc.mark_connected();
        assert_eq!(inc.post_dial_state(), PostDialState::NotStarted);
    }

    #[test]
    fn test_set_converted() {
        let mut conn = Connection::outgoing("112").build().unwrap();
        conn.set_converted("911");
        assert!(conn.is_number_converted());
        assert_eq!(conn.converted_number(), Some("112"));
        assert_eq!(conn.address(), Some("911"));
        assert_eq!(conn.orig_dial_string(), "911");
    }

    #[test]
    fn test_unattached_state_is_idle() {
        let conn = Connection::incoming("5550100").build().unwrap();
        assert_eq!(conn.state(), CallState::Idle);
        assert!(!conn.is_alive());
        assert!(conn.conference_participants().is_none());
    }

    #[test]
    fn test_display_hides_pii_by_default() {
        let conn = Connection::incoming("5550100").build().unwrap();
        let text = conn.to_string();
        assert!(!text.contains("5550100"));
        assert!(text.contains("incoming: true"));
        assert!(text.contains("post dial state: NOT_STARTED"));

        let conn = Connection::incoming("5550100")
            .config(ConnectionConfig::new().with_log_pii(true))
            .build()
            .unwrap();
        assert!(conn.to_string().contains("addr: 5550100"));
    }

    #[test]
    fn test_user_data_slot() {
        let mut conn = Connection::incoming("5550100").build().unwrap();
        conn.set_user_data(Arc::new(42u32));
        assert_eq!(conn.user_data().and_then(|d| d.downcast_ref::<u32>()), Some(&42));
        conn.clear_user_data();
        assert!(conn.user_data().is_none());
    }
}
