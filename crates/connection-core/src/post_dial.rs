//! Post-dial string playback
//!
//! The post-dial string is the part of a dialed number played out as DTMF
//! after an outgoing call connects, e.g. the `;1234#` in `5551234;1234#`.
//! Three marker characters control playback:
//!
//! - **wait** (`;` by default) stops playback until [`PostDialController::proceed_after_wait_char`];
//! - **wild** (`N` by default) stops playback until [`PostDialController::proceed_after_wild_char`]
//!   supplies replacement digits;
//! - **pause** (`,` by default) stops playback for a fixed delay, after which
//!   it resumes on its own through a [`PauseScheduler`] callback.
//!
//! ```text
//! NotStarted ──start──▶ Started ──wait──▶ Wait ──proceed──┐
//!                         │  ▲  ──wild──▶ Wild ──proceed──┤
//!                         │  │  ──pause─▶ Pause ──timer───┤
//!                         │  └────────────────────────────┘
//!                         └──end of string──▶ Complete
//!   any non-terminal state ──cancel──▶ Cancelled
//! ```
//!
//! Resume signals that do not match the current state are ignored. The
//! controller never holds its lock while calling listeners, so a listener may
//! drive the controller from inside a callback.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::PostDialConfig;
use crate::error::{ConnectionError, Result};
use crate::listener::ListenerSet;

/// Playback state of the post-dial string
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Default)]
pub enum PostDialState {
    /// Playback has not begun, the call is not connected yet, or the call is incoming
    #[default]
    NotStarted,
    Started,
    /// Waiting for `proceed_after_wait_char`
    Wait,
    /// Waiting for `proceed_after_wild_char`
    Wild,
    Complete,
    Cancelled,
    /// Waiting for the pause delay to elapse
    Pause,
}

impl PostDialState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }
}

impl fmt::Display for PostDialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Started => "STARTED",
            Self::Wait => "WAIT",
            Self::Wild => "WILD",
            Self::Complete => "COMPLETE",
            Self::Cancelled => "CANCELLED",
            Self::Pause => "PAUSE",
        };
        f.write_str(name)
    }
}

/// Characters that are played out as DTMF tones
pub fn is_dialable(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '*' | '#' | 'A'..='D')
}

/// Observer of post-dial playback
#[allow(unused_variables)]
pub trait PostDialListener: Send + Sync {
    /// Playback reached a wait marker
    fn on_post_dial_wait(&self) {}
    /// A character is being played out
    fn on_post_dial_char(&self, c: char) {}
}

pub type PauseTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task once `delay` has elapsed, without blocking the caller
pub trait PauseScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: PauseTask) -> Result<()>;
}

/// Schedules pause expiry on the current tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPauseScheduler;

impl PauseScheduler for TokioPauseScheduler {
    fn schedule(&self, delay: Duration, task: PauseTask) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| ConnectionError::internal(format!("no tokio runtime for pause timer: {}", e)))?;
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        Ok(())
    }
}

/// Collects pause tasks for a host that drives its own timers
#[derive(Default)]
pub struct QueuedPauseScheduler {
    pending: Mutex<Vec<(Duration, PauseTask)>>,
}

impl QueuedPauseScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delays of the tasks not yet run
    pub fn pending(&self) -> Vec<Duration> {
        self.pending.lock().iter().map(|(delay, _)| *delay).collect()
    }

    /// Run every queued task as if its delay had elapsed. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let tasks = std::mem::take(&mut *self.pending.lock());
        let count = tasks.len();
        for (_, task) in tasks {
            task();
        }
        count
    }
}

impl PauseScheduler for QueuedPauseScheduler {
    fn schedule(&self, delay: Duration, task: PauseTask) -> Result<()> {
        self.pending.lock().push((delay, task));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Playback {
    state: PostDialState,
    chars: Vec<char>,
    next: usize,
}

impl Playback {
    fn remaining(&self) -> String {
        self.chars.get(self.next..).map(|rest| rest.iter().collect()).unwrap_or_default()
    }
}

/// One unit of work decided under the lock and carried out after it is released
enum Step {
    Dial(char),
    Wait,
    Wild,
    Pause,
    Complete,
}

/// State machine driving post-dial playback for one connection
pub struct PostDialController {
    config: PostDialConfig,
    playback: Mutex<Playback>,
    listeners: ListenerSet<dyn PostDialListener>,
    scheduler: Arc<dyn PauseScheduler>,
    weak_self: Weak<PostDialController>,
}

impl PostDialController {
    pub fn new(config: PostDialConfig, scheduler: Arc<dyn PauseScheduler>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            config,
            playback: Mutex::new(Playback::default()),
            listeners: ListenerSet::new(),
            scheduler,
            weak_self: weak_self.clone(),
        })
    }

    /// Controller with default markers and tokio pause timers
    pub fn with_defaults() -> Arc<Self> {
        Self::new(PostDialConfig::default(), Arc::new(TokioPauseScheduler))
    }

    pub fn state(&self) -> PostDialState {
        self.playback.lock().state
    }

    /// The not-yet-dialed suffix; empty once finished or if playback never started
    pub fn remaining_post_dial_string(&self) -> String {
        let playback = self.playback.lock();
        match playback.state {
            PostDialState::NotStarted | PostDialState::Complete | PostDialState::Cancelled => String::new(),
            _ => playback.remaining(),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn PostDialListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn PostDialListener>) {
        self.listeners.remove(listener);
    }

    pub fn clear_listeners(&self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Begin playback of `post_dial_string`. Called once the call connects;
    /// ignored unless playback has not started yet.
    pub fn start(&self, post_dial_string: &str) {
        {
            let mut playback = self.playback.lock();
            if playback.state != PostDialState::NotStarted {
                debug!("post-dial start ignored in state {}", playback.state);
                return;
            }
            playback.chars = post_dial_string.chars().collect();
            playback.next = 0;
            playback.state = PostDialState::Started;
        }
        debug!(length = post_dial_string.chars().count(), "post-dial playback started");
        self.process_next();
    }

    pub fn proceed_after_wait_char(&self) {
        if !self.resume_from(PostDialState::Wait) {
            debug!("proceed_after_wait_char ignored, not waiting");
            return;
        }
        self.process_next();
    }

    /// Substitute `replacement` for the wild marker and resume playback
    pub fn proceed_after_wild_char(&self, replacement: &str) {
        {
            let mut playback = self.playback.lock();
            if playback.state != PostDialState::Wild {
                debug!("proceed_after_wild_char ignored in state {}", playback.state);
                return;
            }
            let mut chars: Vec<char> = replacement.chars().collect();
            chars.extend_from_slice(&playback.chars[playback.next..]);
            playback.chars = chars;
            playback.next = 0;
            playback.state = PostDialState::Started;
        }
        self.process_next();
    }

    /// Resume after a pause marker. Normally invoked by the pause timer.
    pub fn on_pause_elapsed(&self) {
        if !self.resume_from(PostDialState::Pause) {
            trace!("pause timer fired outside of pause");
            return;
        }
        self.process_next();
    }

    /// Stop playback for good. No-op once complete or already cancelled.
    pub fn cancel_post_dial(&self) {
        let mut playback = self.playback.lock();
        if playback.state.is_terminal() {
            return;
        }
        debug!("post-dial cancelled in state {}", playback.state);
        playback.state = PostDialState::Cancelled;
    }

    fn resume_from(&self, expected: PostDialState) -> bool {
        let mut playback = self.playback.lock();
        if playback.state != expected {
            return false;
        }
        playback.state = PostDialState::Started;
        true
    }

    fn advance(&self, playback: &mut Playback) -> Step {
        while let Some(&c) = playback.chars.get(playback.next) {
            playback.next += 1;
            if is_dialable(c) {
                return Step::Dial(c);
            } else if c == self.config.wait_char {
                playback.state = PostDialState::Wait;
                return Step::Wait;
            } else if c == self.config.wild_char {
                playback.state = PostDialState::Wild;
                return Step::Wild;
            } else if c == self.config.pause_char {
                playback.state = PostDialState::Pause;
                return Step::Pause;
            }
            trace!("skipping non-dialable post-dial char {:?}", c);
        }
        playback.state = PostDialState::Complete;
        Step::Complete
    }

    fn process_next(&self) {
        loop {
            let step = {
                let mut playback = self.playback.lock();
                if playback.state != PostDialState::Started {
                    return;
                }
                self.advance(&mut playback)
            };

            match step {
                Step::Dial(c) => {
                    trace!("post-dial char {}", c);
                    self.listeners.for_each(|l| l.on_post_dial_char(c));
                }
                Step::Wait => {
                    debug!("post-dial waiting");
                    self.listeners.for_each(|l| l.on_post_dial_wait());
                    return;
                }
                Step::Wild => {
                    debug!("post-dial waiting for wild replacement");
                    return;
                }
                Step::Pause => {
                    if self.schedule_pause() {
                        return;
                    }
                    // timer unavailable, carry on in this loop
                    self.resume_from(PostDialState::Pause);
                }
                Step::Complete => {
                    debug!("post-dial playback complete");
                    return;
                }
            }
        }
    }

    /// Returns false when the scheduler refused the task.
    fn schedule_pause(&self) -> bool {
        let delay = self.config.pause_delay;
        let weak = self.weak_self.clone();
        let task: PauseTask = Box::new(move || {
            if let Some(controller) = weak.upgrade() {
                controller.on_pause_elapsed();
            }
        });
        debug!(delay_ms = delay.as_millis() as u64, "post-dial pausing");
        match self.scheduler.schedule(delay, task) {
            Ok(()) => true,
            Err(e) => {
                warn!("could not schedule post-dial pause, resuming now: {}", e);
                false
            }
        }
    }
}

impl fmt::Debug for PostDialController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostDialController")
            .field("state", &self.state())
            .field("remaining", &self.remaining_post_dial_string())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        chars: Mutex<String>,
        waits: Mutex<usize>,
    }

    impl PostDialListener for Recorder {
        fn on_post_dial_wait(&self) {
            *self.waits.lock() += 1;
        }

        fn on_post_dial_char(&self, c: char) {
            self.chars.lock().push(c);
        }
    }

    fn controller() -> (Arc<PostDialController>, Arc<QueuedPauseScheduler>, Arc<Recorder>) {
        let scheduler = QueuedPauseScheduler::new();
        let controller = PostDialController::new(PostDialConfig::default(), scheduler.clone());
        let recorder = Arc::new(Recorder::default());
        controller.add_listener(recorder.clone());
        (controller, scheduler, recorder)
    }

    #[test]
    fn test_starts_not_started() {
        let (controller, _, _) = controller();
        assert_eq!(controller.state(), PostDialState::NotStarted);
        assert_eq!(controller.remaining_post_dial_string(), "");
    }

    #[test]
    fn test_plain_digits_complete() {
        let (controller, _, recorder) = controller();
        controller.start("1234#");

        assert_eq!(controller.state(), PostDialState::Complete);
        assert_eq!(recorder.chars.lock().as_str(), "1234#");
        assert_eq!(controller.remaining_post_dial_string(), "");
    }

    #[test]
    fn test_wait_blocks_until_proceed() {
        let (controller, _, recorder) = controller();
        controller.start("1;23");

        assert_eq!(controller.state(), PostDialState::Wait);
        assert_eq!(*recorder.waits.lock(), 1);
        assert_eq!(recorder.chars.lock().as_str(), "1");
        assert_eq!(controller.remaining_post_dial_string(), "23");

        controller.proceed_after_wait_char();
        assert_eq!(controller.state(), PostDialState::Complete);
        assert_eq!(recorder.chars.lock().as_str(), "123");
        assert_eq!(*recorder.waits.lock(), 1);
    }

    #[test]
    fn test_wild_substitutes_replacement() {
        let (controller, _, recorder) = controller();
        controller.start("9N#");
        assert_eq!(controller.state(), PostDialState::Wild);

        controller.proceed_after_wild_char("55");
        assert_eq!(controller.state(), PostDialState::Complete);
        assert_eq!(recorder.chars.lock().as_str(), "955#");
    }

    #[test]
    fn test_pause_resumes_through_scheduler() {
        let (controller, scheduler, recorder) = controller();
        controller.start("1,2");

        assert_eq!(controller.state(), PostDialState::Pause);
        assert_eq!(scheduler.pending(), vec![crate::config::DEFAULT_PAUSE_DELAY]);
        assert_eq!(*recorder.waits.lock(), 0);

        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(controller.state(), PostDialState::Complete);
        assert_eq!(recorder.chars.lock().as_str(), "12");
    }

    #[test]
    fn test_mismatched_resume_is_ignored() {
        let (controller, _, recorder) = controller();
        controller.start("1N2");

        controller.proceed_after_wait_char();
        controller.on_pause_elapsed();
        assert_eq!(controller.state(), PostDialState::Wild);
        assert_eq!(recorder.chars.lock().as_str(), "1");
    }

    #[test]
    fn test_cancel_is_terminal_and_idempotent() {
        let (controller, scheduler, _) = controller();
        controller.start("1,2");
        controller.cancel_post_dial();
        controller.cancel_post_dial();
        assert_eq!(controller.state(), PostDialState::Cancelled);

        // stale pause timer must not revive playback
        scheduler.run_pending();
        assert_eq!(controller.state(), PostDialState::Cancelled);
        assert_eq!(controller.remaining_post_dial_string(), "");
    }

    #[test]
    fn test_cancel_after_complete_is_noop() {
        let (controller, _, _) = controller();
        controller.start("1");
        controller.cancel_post_dial();
        assert_eq!(controller.state(), PostDialState::Complete);
    }

    #[test]
    fn test_second_start_ignored() {
        let (controller, _, recorder) = controller();
        controller.start("1;");
        controller.start("999");
        assert_eq!(recorder.chars.lock().as_str(), "1");
    }

    #[test]
    fn test_unknown_chars_are_skipped() {
        let (controller, _, recorder) = controller();
        controller.start("1-2 3");
        assert_eq!(recorder.chars.lock().as_str(), "123");
        assert_eq!(controller.state(), PostDialState::Complete);
    }

    #[test]
    fn test_listener_dedup() {
        let (controller, _, recorder) = controller();
        controller.add_listener(recorder.clone());
        assert_eq!(controller.listener_count(), 1);

        let as_dyn: Arc<dyn PostDialListener> = recorder;
        controller.remove_listener(&as_dyn);
        controller.remove_listener(&as_dyn);
        assert_eq!(controller.listener_count(), 0);
    }

    #[test]
    fn test_scheduler_failure_resumes_immediately() {
        // no tokio runtime in a plain #[test]
        let controller = PostDialController::new(PostDialConfig::default(), Arc::new(TokioPauseScheduler));
        controller.start("1,2");
        assert_eq!(controller.state(), PostDialState::Complete);
    }

    #[test]
    fn test_many_unscheduled_pauses_do_not_grow_stack() {
        let controller = PostDialController::new(PostDialConfig::default(), Arc::new(TokioPauseScheduler));
        let recorder = Arc::new(Recorder::default());
        controller.add_listener(recorder.clone());

        let post_dial = format!("1{}2", ",".repeat(20_000));
        controller.start(&post_dial);

        assert_eq!(controller.state(), PostDialState::Complete);
        assert_eq!(recorder.chars.lock().as_str(), "12");
    }

    #[test]
    fn test_consecutive_pauses_each_wait_for_timer() {
        let (controller, scheduler, recorder) = controller();
        controller.start("1,,2");

        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(controller.state(), PostDialState::Pause);
        assert_eq!(recorder.chars.lock().as_str(), "1");

        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(controller.state(), PostDialState::Complete);
        assert_eq!(recorder.chars.lock().as_str(), "12");
    }
}
