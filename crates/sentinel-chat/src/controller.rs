//! Query controller: one streaming model call with rate-limit handling.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sentinel_core::config::SentinelConfig;
use sentinel_core::types::{Role, Turn};

use crate::backend::{GenerateRequest, GenerationBackend};
use crate::cooldown::Cooldown;
use crate::error::ChatError;
use crate::prompt::{context_window, system_instruction};
use crate::state::SessionState;

/// Status text shown while the first attempt is being dispatched.
pub const STATUS_PROCESSING: &str = "Processing...";

/// User-facing message raised when the service throttles us.
pub fn rate_limit_message(seconds: u32) -> String {
    format!("Global Traffic surge. System cooling ({seconds}s)...")
}

/// Drives a single streaming generation request.
pub struct QueryController {
    backend: Arc<dyn GenerationBackend>,
    state: Arc<SessionState>,
    cooldown: Cooldown,
    models: Vec<String>,
    temperature: f32,
    context_turns: usize,
    rate_limit_cooldown_secs: u32,
}

impl QueryController {
    /// Build a controller from the loaded configuration.
    ///
    /// Fails if the model list is empty.
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        state: Arc<SessionState>,
        cooldown: Cooldown,
        config: &SentinelConfig,
    ) -> Result<Self, ChatError> {
        if config.model.models.is_empty() {
            return Err(ChatError::Config(
                "model.models must list at least one model".to_string(),
            ));
        }
        Ok(Self {
            backend,
            state,
            cooldown,
            models: config.model.models.clone(),
            temperature: config.generation.temperature,
            context_turns: config.throttle.context_turns,
            rate_limit_cooldown_secs: config.throttle.rate_limit_cooldown_secs,
        })
    }

    /// Number of distinct models available for fallback.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Model addressed on the given attempt. Attempts past the end of the
    /// list pin to the last entry.
    pub fn model_for_attempt(&self, attempt: usize) -> &str {
        let index = attempt.min(self.models.len() - 1);
        &self.models[index]
    }

    /// Execute one query.
    ///
    /// `history` is the conversation including the new user turn; only the
    /// last `context_turns` entries are sent. `on_chunk` receives the full
    /// accumulated text after every fragment. A cancelled `cancel` token
    /// stops consumption at the next fragment and returns `Ok(())`.
    ///
    /// On a rate-limit failure the process-wide cooldown is started and the
    /// user-facing error is set before the error is returned.
    pub async fn execute<F>(
        &self,
        user_text: &str,
        history: &[Turn],
        mut on_chunk: F,
        cancel: &CancellationToken,
        attempt: usize,
    ) -> Result<(), ChatError>
    where
        F: FnMut(&str),
    {
        let model = self.model_for_attempt(attempt).to_string();
        if attempt == 0 {
            self.state.set_status(STATUS_PROCESSING);
        } else {
            self.state.set_status(format!("Re-routing via {model}..."));
        }

        let ends_with_user_text = history
            .last()
            .is_some_and(|t| t.role == Role::User && t.text == user_text);
        let contents = if ends_with_user_text {
            context_window(history, self.context_turns)
        } else {
            let mut extended = history.to_vec();
            extended.push(Turn::user(user_text));
            context_window(&extended, self.context_turns)
        };

        let profile = self.state.profile();
        let request = GenerateRequest {
            model: model.clone(),
            contents,
            system_instruction: system_instruction(profile.as_ref()),
            temperature: self.temperature,
        };

        info!(
            model = %model,
            attempt,
            context_turns = request.contents.len(),
            chars = user_text.len(),
            "Dispatching query"
        );

        let result = self.consume(request, &mut on_chunk, cancel).await;

        if let Err(ref e) = result {
            if e.is_rate_limited() {
                warn!(model = %model, error = %e, "Rate limited, cooling down");
                self.cooldown.start(self.rate_limit_cooldown_secs);
                self.state
                    .set_error(rate_limit_message(self.rate_limit_cooldown_secs));
            }
        }
        result
    }

    async fn consume<F>(
        &self,
        request: GenerateRequest,
        on_chunk: &mut F,
        cancel: &CancellationToken,
    ) -> Result<(), ChatError>
    where
        F: FnMut(&str),
    {
        let mut stream = self.backend.stream_generate(request).await?;
        self.state.set_status("");

        let mut buffer = String::new();
        let mut fragments = 0usize;
        while let Some(fragment) = stream.next_fragment().await {
            if cancel.is_cancelled() {
                debug!(fragments, "Query cancelled");
                return Ok(());
            }
            let fragment = fragment?;
            buffer.push_str(fragment.as_str());
            fragments += 1;
            on_chunk(&buffer);
        }

        debug!(fragments, chars = buffer.len(), "Stream complete");
        Ok(())
    }
}

impl std::fmt::Debug for QueryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryController")
            .field("models", &self.models)
            .field("context_turns", &self.context_turns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ContentRole;
    use crate::testing::{Script, ScriptedBackend, Step};
    use sentinel_core::types::{AuthorityPreference, Profile};

    fn controller(backend: Arc<ScriptedBackend>) -> (QueryController, Arc<SessionState>, Cooldown) {
        let state = Arc::new(SessionState::default());
        let cooldown = Cooldown::new();
        let controller = QueryController::new(
            backend,
            state.clone(),
            cooldown.clone(),
            &SentinelConfig::default(),
        )
        .unwrap();
        (controller, state, cooldown)
    }

    fn history_ending_with(text: &str) -> Vec<Turn> {
        vec![Turn::user(text)]
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_accumulate_with_missing_text() {
        let backend = ScriptedBackend::new(vec![Script::Stream(vec![
            Step::Text("A"),
            Step::Missing,
            Step::Text("B"),
        ])]);
        let (controller, _, _) = controller(backend);

        let mut seen = Vec::new();
        let cancel = CancellationToken::new();
        controller
            .execute("hi", &history_ending_with("hi"), |t| seen.push(t.to_string()), &cancel, 0)
            .await
            .unwrap();

        assert_eq!(seen, vec!["A", "A", "AB"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_fragment_still_emits() {
        let backend = ScriptedBackend::texts(&["A", "", "B"]);
        let (controller, _, _) = controller(backend);

        let mut seen = Vec::new();
        let cancel = CancellationToken::new();
        controller
            .execute("hi", &history_ending_with("hi"), |t| seen.push(t.to_string()), &cancel, 0)
            .await
            .unwrap();
        assert_eq!(seen, vec!["A", "A", "AB"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_first_fragment() {
        let backend = ScriptedBackend::texts(&["one", "two", "three"]);
        let (controller, _, cooldown) = controller(backend);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut calls = 0;
        let result = controller
            .execute(
                "hi",
                &history_ending_with("hi"),
                |_| {
                    calls += 1;
                    trigger.cancel();
                },
                &cancel,
                0,
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(calls, 1);
        assert!(!cooldown.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_starts_cooldown_and_returns_error() {
        let backend = ScriptedBackend::new(vec![Script::Refuse(ChatError::Transport(
            "Error: 429 Too Many Requests".to_string(),
        ))]);
        let (controller, state, cooldown) = controller(backend);

        let cancel = CancellationToken::new();
        let err = controller
            .execute("hi", &history_ending_with("hi"), |_| {}, &cancel, 0)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("429"));
        assert_eq!(cooldown.remaining(), 15);
        assert_eq!(
            state.error_message().as_deref(),
            Some("Global Traffic surge. System cooling (15s)...")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_mid_stream_is_rate_limited() {
        let backend = ScriptedBackend::new(vec![Script::Stream(vec![
            Step::Text("partial"),
            Step::Fail(ChatError::Stream("Quota Exceeded".to_string())),
        ])]);
        let (controller, state, cooldown) = controller(backend);

        let mut seen = Vec::new();
        let cancel = CancellationToken::new();
        let result = controller
            .execute("hi", &history_ending_with("hi"), |t| seen.push(t.to_string()), &cancel, 0)
            .await;

        assert!(result.is_err());
        assert_eq!(seen, vec!["partial"]);
        assert_eq!(cooldown.remaining(), 15);
        assert!(state.error_message().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_failure_has_no_side_effects() {
        let backend = ScriptedBackend::new(vec![Script::Refuse(ChatError::Api {
            status: Some(500),
            message: "INTERNAL: boom".to_string(),
        })]);
        let (controller, state, cooldown) = controller(backend);

        let cancel = CancellationToken::new();
        let err = controller
            .execute("hi", &history_ending_with("hi"), |_| {}, &cancel, 0)
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Api { status: Some(500), .. }));
        assert!(!cooldown.is_active());
        assert!(state.error_message().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_uses_last_six_turns_and_roles() {
        let backend = ScriptedBackend::texts(&["ok"]);
        let (controller, _, _) = controller(backend.clone());

        let mut history: Vec<Turn> = (0..9)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                Turn::new(role, format!("t{i}"))
            })
            .collect();
        history.push(Turn::new(Role::SystemError, "oops"));
        history.push(Turn::user("latest"));

        let cancel = CancellationToken::new();
        controller
            .execute("latest", &history, |_| {}, &cancel, 0)
            .await
            .unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let contents = &requests[0].contents;
        let texts: Vec<&str> = contents.iter().map(|c| c.parts[0].text.as_str()).collect();
        assert_eq!(texts, vec!["t5", "t6", "t7", "t8", "oops", "latest"]);
        let roles: Vec<ContentRole> = contents.iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![
                ContentRole::Model,
                ContentRole::User,
                ContentRole::Model,
                ContentRole::User,
                ContentRole::Model,
                ContentRole::User,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_text_appended_when_missing_from_history() {
        let backend = ScriptedBackend::texts(&["ok"]);
        let (controller, _, _) = controller(backend.clone());

        let history = vec![Turn::user("earlier"), Turn::new(Role::Assistant, "reply")];
        let cancel = CancellationToken::new();
        controller
            .execute("new question", &history, |_| {}, &cancel, 0)
            .await
            .unwrap();

        let contents = &backend.requests()[0].contents;
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[2].role, ContentRole::User);
        assert_eq!(contents[2].parts[0].text, "new question");
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_selection_pins_to_last() {
        let backend = ScriptedBackend::new(vec![]);
        let (controller, _, _) = controller(backend);
        assert_eq!(controller.model_for_attempt(0), "gemini-2.5-flash-lite-latest");
        assert_eq!(controller.model_for_attempt(1), "gemini-3-flash-preview");
        assert_eq!(controller.model_for_attempt(7), "gemini-3-flash-preview");
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_text_per_attempt() {
        let backend = ScriptedBackend::new(vec![
            Script::Refuse(ChatError::Transport("down".to_string())),
            Script::Refuse(ChatError::Transport("down".to_string())),
        ]);
        let (controller, state, _) = controller(backend);
        let cancel = CancellationToken::new();

        let _ = controller
            .execute("hi", &history_ending_with("hi"), |_| {}, &cancel, 0)
            .await;
        assert_eq!(state.status_text(), "Processing...");

        let _ = controller
            .execute("hi", &history_ending_with("hi"), |_| {}, &cancel, 1)
            .await;
        assert_eq!(state.status_text(), "Re-routing via gemini-3-flash-preview...");
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_cleared_once_stream_opens() {
        let backend = ScriptedBackend::texts(&["ok"]);
        let (controller, state, _) = controller(backend);
        let cancel = CancellationToken::new();
        controller
            .execute("hi", &history_ending_with("hi"), |_| {}, &cancel, 0)
            .await
            .unwrap();
        assert_eq!(state.status_text(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_instruction_and_temperature_sent() {
        let backend = ScriptedBackend::texts(&["ok"]);
        let (controller, state, _) = controller(backend.clone());
        state.set_profile(Some(Profile {
            name: "Ada".to_string(),
            primary_goal: "Ship v1".to_string(),
            main_blocker: "Meetings".to_string(),
            authority_preference: AuthorityPreference::Advisor,
            ..Profile::default()
        }));

        let cancel = CancellationToken::new();
        controller
            .execute("hi", &history_ending_with("hi"), |_| {}, &cancel, 0)
            .await
            .unwrap();

        let request = &backend.requests()[0];
        assert_eq!(request.model, "gemini-2.5-flash-lite-latest");
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
        assert!(request.system_instruction.contains("advisory guide"));
        assert!(request.system_instruction.contains("Identity: Ada"));
    }

    #[test]
    fn test_empty_model_list_is_rejected() {
        let mut config = SentinelConfig::default();
        config.model.models.clear();
        let result = QueryController::new(
            ScriptedBackend::new(vec![]),
            Arc::new(SessionState::default()),
            Cooldown::new(),
            &config,
        );
        assert!(matches!(result, Err(ChatError::Config(_))));
    }
}
