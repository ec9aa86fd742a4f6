//! Listener surface and registry for connection notifications
//!
//! [`ConnectionListener`] has one callback per event a connection can emit,
//! each with a no-op default so implementers only override what they need.
//! [`ConnectionEvent`] is the same surface as a tagged union, which is what
//! the [`Connection`](crate::Connection) setters build and hand to
//! [`ListenerRegistry::notify`].
//!
//! # Snapshot semantics
//!
//! Membership is stored copy-on-write. `notify` delivers to the snapshot of
//! members taken when the call starts:
//!
//! - a listener added during a pass (from a callback or another thread) is not
//!   guaranteed to see the in-flight event, but sees every later one;
//! - a listener removed during a pass may still receive the in-flight event,
//!   but no later one.
//!
//! Adding or removing never blocks a notifying thread and never fails.

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::capability::Capabilities;
use crate::types::{AudioQuality, ConferenceParticipant, ConnectionId, Extras, VideoProviderRef};

/// Observer of connection state changes
#[allow(unused_variables)]
pub trait ConnectionListener: Send + Sync {
    fn on_video_state_changed(&self, video_state: i32) {}
    fn on_connection_capabilities_changed(&self, capabilities: Capabilities) {}
    fn on_wifi_changed(&self, is_wifi: bool) {}
    fn on_video_provider_changed(&self, provider: Option<&VideoProviderRef>) {}
    fn on_audio_quality_changed(&self, audio_quality: AudioQuality) {}
    fn on_conference_participants_changed(&self, participants: &[ConferenceParticipant]) {}
    fn on_conference_participants_invited(&self, is_success: bool) {}
    /// Radio connections that make up a conference after a handover
    fn on_conference_connections_configured(&self, radio_connections: &[ConnectionId]) {}
    /// A supplementary service (hold, resume, merge...) failed
    fn on_supp_service_failed(&self, action_code: i32) {}
    fn on_call_type_changed(&self, call_type: i32) {}
    fn on_call_substate_changed(&self, call_substate: i32) {}
    fn on_multiparty_state_changed(&self, is_multiparty: bool) {}
    fn on_conference_merge_failed(&self) {}
    fn on_extras_changed(&self, extras: Option<&Extras>) {}
}

/// Events delivered through [`ListenerRegistry::notify`]
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    VideoStateChanged(i32),
    CapabilitiesChanged(Capabilities),
    WifiChanged(bool),
    VideoProviderChanged(Option<VideoProviderRef>),
    AudioQualityChanged(AudioQuality),
    ConferenceParticipantsChanged(Vec<ConferenceParticipant>),
    ConferenceParticipantsInvited(bool),
    ConferenceConnectionsConfigured(Vec<ConnectionId>),
    SuppServiceFailed(i32),
    CallTypeChanged(i32),
    CallSubstateChanged(i32),
    MultipartyStateChanged(bool),
    ConferenceMergeFailed,
    ExtrasChanged(Option<Extras>),
}

impl ConnectionEvent {
    /// Invoke the matching callback on `listener`
    pub fn dispatch(&self, listener: &dyn ConnectionListener) {
        match self {
            Self::VideoStateChanged(state) => listener.on_video_state_changed(*state),
            Self::CapabilitiesChanged(caps) => listener.on_connection_capabilities_changed(*caps),
            Self::WifiChanged(wifi) => listener.on_wifi_changed(*wifi),
            Self::VideoProviderChanged(provider) => listener.on_video_provider_changed(provider.as_ref()),
            Self::AudioQualityChanged(quality) => listener.on_audio_quality_changed(*quality),
            Self::ConferenceParticipantsChanged(participants) => {
                listener.on_conference_participants_changed(participants)
            }
            Self::ConferenceParticipantsInvited(ok) => listener.on_conference_participants_invited(*ok),
            Self::ConferenceConnectionsConfigured(ids) => listener.on_conference_connections_configured(ids),
            Self::SuppServiceFailed(code) => listener.on_supp_service_failed(*code),
            Self::CallTypeChanged(call_type) => listener.on_call_type_changed(*call_type),
            Self::CallSubstateChanged(substate) => listener.on_call_substate_changed(*substate),
            Self::MultipartyStateChanged(mpty) => listener.on_multiparty_state_changed(*mpty),
            Self::ConferenceMergeFailed => listener.on_conference_merge_failed(),
            Self::ExtrasChanged(extras) => listener.on_extras_changed(extras.as_ref()),
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::VideoStateChanged(_) => "video_state_changed",
            Self::CapabilitiesChanged(_) => "capabilities_changed",
            Self::WifiChanged(_) => "wifi_changed",
            Self::VideoProviderChanged(_) => "video_provider_changed",
            Self::AudioQualityChanged(_) => "audio_quality_changed",
            Self::ConferenceParticipantsChanged(_) => "conference_participants_changed",
            Self::ConferenceParticipantsInvited(_) => "conference_participants_invited",
            Self::ConferenceConnectionsConfigured(_) => "conference_connections_configured",
            Self::SuppServiceFailed(_) => "supp_service_failed",
            Self::CallTypeChanged(_) => "call_type_changed",
            Self::CallSubstateChanged(_) => "call_substate_changed",
            Self::MultipartyStateChanged(_) => "multiparty_state_changed",
            Self::ConferenceMergeFailed => "conference_merge_failed",
            Self::ExtrasChanged(_) => "extras_changed",
        }
    }
}

/// Deduplicated, copy-on-write set of listener handles.
///
/// Identity is the address of the shared allocation, so two clones of the
/// same `Arc` are the same member.
pub struct ListenerSet<L: ?Sized> {
    members: ArcSwap<Vec<Arc<L>>>,
}

fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn new() -> Self {
        Self {
            members: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Add a listener. Returns false if it was already registered.
    pub fn add(&self, listener: Arc<L>) -> bool {
        let mut added = false;
        self.members.rcu(|current| {
            added = !current.iter().any(|l| same_listener(l, &listener));
            let mut next = (**current).clone();
            if added {
                next.push(listener.clone());
            }
            next
        });
        added
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut removed = false;
        self.members.rcu(|current| {
            let next: Vec<Arc<L>> = current
                .iter()
                .filter(|l| !same_listener(*l, listener))
                .cloned()
                .collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    pub fn contains(&self, listener: &Arc<L>) -> bool {
        self.members.load().iter().any(|l| same_listener(l, listener))
    }

    pub fn clear(&self) {
        self.members.store(Arc::new(Vec::new()));
    }

    pub fn len(&self) -> usize {
        self.members.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.load().is_empty()
    }

    /// Current membership as an immutable snapshot
    pub fn snapshot(&self) -> Arc<Vec<Arc<L>>> {
        self.members.load_full()
    }

    /// Call `f` for every member of the snapshot taken at entry
    pub fn for_each(&self, mut f: impl FnMut(&L)) {
        let snapshot = self.snapshot();
        for listener in snapshot.iter() {
            f(listener);
        }
    }
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> fmt::Debug for ListenerSet<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet").field("len", &self.len()).finish()
    }
}

/// Registry of [`ConnectionListener`]s for one logical call leg.
///
/// Shared through an `Arc` so a handover can hand the same registry to the
/// replacement connection.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: ListenerSet<dyn ConnectionListener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; no-op if already present
    pub fn add(&self, listener: Arc<dyn ConnectionListener>) {
        if !self.listeners.add(listener) {
            trace!("listener already registered");
        }
    }

    /// Unregister a listener; no-op if absent
    pub fn remove(&self, listener: &Arc<dyn ConnectionListener>) {
        if !self.listeners.remove(listener) {
            trace!("listener not registered");
        }
    }

    pub fn contains(&self, listener: &Arc<dyn ConnectionListener>) -> bool {
        self.listeners.contains(listener)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn ConnectionListener>>> {
        self.listeners.snapshot()
    }

    /// Deliver `event` to every listener registered when the call starts
    pub fn notify(&self, event: &ConnectionEvent) {
        let snapshot = self.listeners.snapshot();
        trace!(event = event.name(), listeners = snapshot.len(), "notify");
        for listener in snapshot.iter() {
            event.dispatch(listener.as_ref());
        }
    }
}
