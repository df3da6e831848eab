//! Session state container.
//!
//! Owns the conversation turns, the in-flight flag, the status text, the
//! user-facing error message, the active view and the loaded profile. All
//! mutation goes through the methods below; every change is published as a
//! [`ChatEvent`] so the presentation layer can render without polling.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use sentinel_core::events::ChatEvent;
use sentinel_core::types::{Profile, Turn, View};

/// Capacity of the event channel. Slow subscribers lag rather than block.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug)]
struct Inner {
    turns: Vec<Turn>,
    in_flight: bool,
    status_text: String,
    error_message: Option<String>,
    cancel: Option<CancellationToken>,
    profile: Option<Profile>,
    view: View,
}

/// Process-wide session state with controlled mutation entry points.
#[derive(Debug)]
pub struct SessionState {
    inner: Mutex<Inner>,
    events: broadcast::Sender<ChatEvent>,
}

impl SessionState {
    pub fn new(profile: Option<Profile>, view: View) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                turns: Vec::new(),
                in_flight: false,
                status_text: String::new(),
                error_message: None,
                cancel: None,
                profile,
                view,
            }),
            events,
        }
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // -------------------------------------------------------------------------
    // Request lifecycle
    // -------------------------------------------------------------------------

    /// Atomically claim the single in-flight slot.
    ///
    /// Returns the cancellation token for the new request, or `None` if a
    /// request is already running.
    pub fn try_begin_request(&self) -> Option<CancellationToken> {
        let token = {
            let mut inner = self.lock();
            if inner.in_flight {
                return None;
            }
            let token = CancellationToken::new();
            inner.in_flight = true;
            inner.cancel = Some(token.clone());
            token
        };
        self.emit(ChatEvent::InFlightChanged { in_flight: true });
        Some(token)
    }

    /// Release the in-flight slot, clear the status text and drop the
    /// cancellation handle.
    pub fn finish_request(&self) {
        let status_changed = {
            let mut inner = self.lock();
            inner.in_flight = false;
            inner.cancel = None;
            !std::mem::take(&mut inner.status_text).is_empty()
        };
        if status_changed {
            self.emit(ChatEvent::StatusChanged {
                text: String::new(),
            });
        }
        self.emit(ChatEvent::InFlightChanged { in_flight: false });
    }

    /// Signal cancellation to the running request, if any.
    pub fn cancel_current(&self) -> bool {
        match self.lock().cancel.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    // -------------------------------------------------------------------------
    // Transcript
    // -------------------------------------------------------------------------

    pub fn append_turn(&self, turn: Turn) {
        self.lock().turns.push(turn.clone());
        self.emit(ChatEvent::TurnAppended { turn });
    }

    /// Replace the text of the turn with `id`. Returns `false` if no such
    /// turn exists (e.g. the session was reset meanwhile).
    pub fn update_turn_text(&self, id: Uuid, text: &str) -> bool {
        {
            let mut inner = self.lock();
            match inner.turns.iter_mut().find(|t| t.id == id) {
                Some(turn) => {
                    turn.text.clear();
                    turn.text.push_str(text);
                }
                None => return false,
            }
        }
        self.emit(ChatEvent::TurnUpdated {
            id,
            text: text.to_string(),
        });
        true
    }

    /// Snapshot of the transcript.
    pub fn turns(&self) -> Vec<Turn> {
        self.lock().turns.clone()
    }

    /// Clear the transcript and any error message.
    pub fn reset_session(&self) {
        {
            let mut inner = self.lock();
            inner.turns.clear();
            inner.error_message = None;
        }
        self.emit(ChatEvent::SessionReset);
    }

    // -------------------------------------------------------------------------
    // Indicators
    // -------------------------------------------------------------------------

    pub fn set_status(&self, text: impl Into<String>) {
        let text = text.into();
        {
            let mut inner = self.lock();
            if inner.status_text == text {
                return;
            }
            inner.status_text = text.clone();
        }
        self.emit(ChatEvent::StatusChanged { text });
    }

    pub fn status_text(&self) -> String {
        self.lock().status_text.clone()
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.lock().error_message = Some(message.clone());
        self.emit(ChatEvent::ErrorRaised { message });
    }

    pub fn clear_error(&self) {
        if self.lock().error_message.take().is_some() {
            self.emit(ChatEvent::ErrorCleared);
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message.clone()
    }

    // -------------------------------------------------------------------------
    // Profile and view
    // -------------------------------------------------------------------------

    pub fn profile(&self) -> Option<Profile> {
        self.lock().profile.clone()
    }

    pub fn set_profile(&self, profile: Option<Profile>) {
        self.lock().profile = profile;
    }

    pub fn view(&self) -> View {
        self.lock().view
    }

    pub fn set_view(&self, view: View) {
        {
            let mut inner = self.lock();
            if inner.view == view {
                return;
            }
            inner.view = view;
        }
        tracing::debug!(%view, "View changed");
        self.emit(ChatEvent::ViewChanged { view });
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(None, View::Home)
    }
}
