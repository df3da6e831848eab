//! Send-message orchestration: one user-initiated round trip.
//!
//! Guards the single in-flight slot and the cooldown, appends the user and
//! placeholder turns, drives the query controller, and always releases the
//! in-flight state afterwards.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use sentinel_core::config::SentinelConfig;
use sentinel_core::types::{Profile, Turn, View};

use crate::backend::GenerationBackend;
use crate::controller::QueryController;
use crate::cooldown::Cooldown;
use crate::error::ChatError;
use crate::onboarding::initialization_message;
use crate::state::SessionState;

/// Why a send was ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// A request is already running.
    InFlight,
    /// The cooldown has this many seconds left.
    CoolingDown(u32),
    /// Nothing but whitespace was entered.
    EmptyMessage,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InFlight => write!(f, "a request is already in flight"),
            RejectReason::CoolingDown(secs) => write!(f, "System Cooling: {secs}s remaining..."),
            RejectReason::EmptyMessage => write!(f, "empty message"),
        }
    }
}

/// Result of [`ChatOrchestrator::send_message`].
#[derive(Debug)]
pub enum SendOutcome {
    /// The round trip finished, possibly after a user cancel.
    Completed,
    /// The controller returned an error. The transcript keeps whatever
    /// text had streamed in.
    Failed(ChatError),
    /// Nothing happened: no turn appended, no request sent.
    Rejected(RejectReason),
}

impl SendOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SendOutcome::Completed)
    }
}

/// Releases the in-flight slot when the round trip ends, including when
/// the future is dropped mid-flight.
struct InFlightGuard<'a> {
    state: &'a SessionState,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.finish_request();
    }
}

/// Coordinates the session state, the cooldown and the query controller.
pub struct ChatOrchestrator {
    controller: QueryController,
    state: Arc<SessionState>,
    cooldown: Cooldown,
    post_query_cooldown_secs: u32,
    retry_with_fallback: bool,
}

impl ChatOrchestrator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        state: Arc<SessionState>,
        cooldown: Cooldown,
        config: &SentinelConfig,
    ) -> Result<Self, ChatError> {
        let controller = QueryController::new(backend, state.clone(), cooldown.clone(), config)?;
        Ok(Self {
            controller,
            state,
            cooldown,
            post_query_cooldown_secs: config.throttle.post_query_cooldown_secs,
            retry_with_fallback: config.throttle.retry_with_fallback,
        })
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    /// Send one user message and stream the reply into the transcript.
    ///
    /// A send while a request is in flight, while the cooldown is running,
    /// or with blank text is a no-op reported as [`SendOutcome::Rejected`].
    /// The text is stored and sent exactly as typed; trimming only decides
    /// whether it is blank.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Rejected(RejectReason::EmptyMessage);
        }
        let remaining = self.cooldown.remaining();
        if remaining > 0 {
            return SendOutcome::Rejected(RejectReason::CoolingDown(remaining));
        }
        let Some(cancel) = self.state.try_begin_request() else {
            return SendOutcome::Rejected(RejectReason::InFlight);
        };
        let _guard = InFlightGuard { state: &self.state };

        self.state.clear_error();

        let mut history = self.state.turns();
        let user_turn = Turn::user(text);
        history.push(user_turn.clone());
        self.state.append_turn(user_turn);

        let placeholder = Turn::assistant_placeholder();
        let reply_id = placeholder.id;
        self.state.append_turn(placeholder);
        self.state.set_view(View::Chat);

        let mut attempt = 0;
        loop {
            let result = self
                .controller
                .execute(
                    text,
                    &history,
                    |accumulated| {
                        self.state.update_turn_text(reply_id, accumulated);
                    },
                    &cancel,
                    attempt,
                )
                .await;

            match result {
                Ok(()) => {
                    self.cooldown.start(self.post_query_cooldown_secs);
                    info!(
                        attempt,
                        cancelled = cancel.is_cancelled(),
                        "Query complete"
                    );
                    return SendOutcome::Completed;
                }
                Err(e) if self.should_retry(&e, attempt, cancel.is_cancelled()) => {
                    warn!(attempt, error = %e, "Query failed, retrying with fallback model");
                    attempt += 1;
                    self.state.update_turn_text(reply_id, "");
                }
                Err(e) => {
                    error!(attempt, error = %e, "Signal lost");
                    return SendOutcome::Failed(e);
                }
            }
        }
    }

    fn should_retry(&self, err: &ChatError, attempt: usize, cancelled: bool) -> bool {
        self.retry_with_fallback
            && !cancelled
            && !err.is_rate_limited()
            && attempt + 1 < self.controller.model_count()
    }

    /// Cancel the running request, if any. Returns whether one was running.
    pub fn stop(&self) -> bool {
        let stopped = self.state.cancel_current();
        if stopped {
            info!("Stop requested");
        }
        stopped
    }

    /// Clear the transcript. A running request is cancelled first.
    pub fn reset_session(&self) {
        self.state.cancel_current();
        self.state.reset_session();
        info!("Session reset");
    }

    /// Adopt a freshly saved profile and open the conversation with the
    /// synthetic initialization message.
    pub async fn sync_baseline(&self, profile: Profile) -> SendOutcome {
        let message = initialization_message(&profile);
        self.state.set_profile(Some(profile));
        self.state.set_view(View::Home);
        self.send_message(&message).await
    }
}

impl fmt::Debug for ChatOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatOrchestrator")
            .field("controller", &self.controller)
            .field("cooldown", &self.cooldown)
            .field("retry_with_fallback", &self.retry_with_fallback)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
