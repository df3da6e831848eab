//! Interactive terminal front-end.
//!
//! Line-oriented: identity prompt, the onboarding wizard, then the chat
//! loop. While a reply streams, session events are rendered as they arrive
//! and Ctrl-C stops the request instead of exiting.

use std::io::{self, Stdout};
use std::pin::pin;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use sentinel_chat::{
    ChatOrchestrator, OnboardingStep, OnboardingWizard, RejectReason, SendOutcome,
};
use sentinel_core::events::ChatEvent;
use sentinel_core::types::{AuthorityPreference, Profile, View};
use sentinel_storage::ProfileStore;

use crate::render::{home_banner, TranscriptRenderer};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Terminal session bound to stdin/stdout.
pub struct Repl {
    lines: Lines<BufReader<Stdin>>,
    renderer: TranscriptRenderer<Stdout>,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            renderer: TranscriptRenderer::new(io::stdout()),
        }
    }

    /// Show `label` and read one line as typed. `None` on end of input.
    async fn read_line(&mut self, label: &str) -> io::Result<Option<String>> {
        use std::io::Write;
        let mut out = io::stdout();
        write!(out, "{label}")?;
        out.flush()?;
        self.lines.next_line().await
    }

    /// Like `read_line`, trimmed. Used for form answers.
    async fn ask(&mut self, label: &str) -> io::Result<Option<String>> {
        Ok(self.read_line(label).await?.map(|l| l.trim().to_string()))
    }

    /// Ask with a pre-filled default used for blank answers.
    async fn ask_default(&mut self, label: &str, default: &str) -> io::Result<Option<String>> {
        Ok(self
            .ask(&format!("{label} [{default}]: "))
            .await?
            .map(|answer| if answer.is_empty() { default.to_string() } else { answer }))
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    /// Prompt until the local identity flag is set. `false` on end of input.
    pub async fn authenticate(&mut self, store: &ProfileStore) -> AppResult<bool> {
        self.renderer
            .line("LifeAx\nAura Sentinel Build. Identity validation required.")?;
        loop {
            let Some(id) = self.ask("Identity Handle: ").await? else {
                return Ok(false);
            };
            let Some(code) = self.ask("Access Code: ").await? else {
                return Ok(false);
            };
            match store.authenticate(&id, &code) {
                Ok(()) => return Ok(true),
                Err(e) => self.renderer.line(&format!("  ! {e}"))?,
            }
        }
    }

    // -------------------------------------------------------------------------
    // Onboarding
    // -------------------------------------------------------------------------

    /// Walk the wizard and persist the baseline. `None` on end of input.
    pub async fn onboard(&mut self, store: &ProfileStore) -> AppResult<Option<Profile>> {
        let mut wizard = OnboardingWizard::new();
        loop {
            let step = wizard.step();
            self.renderer.line(&format!(
                "\n[{}/{}] {}",
                step.index() + 1,
                OnboardingStep::ALL.len(),
                step
            ))?;
            if !self.collect_step(&mut wizard).await? {
                return Ok(None);
            }
            if step == OnboardingStep::SeverityLevel {
                break;
            }
            if let Err(e) = wizard.advance() {
                self.renderer.line(&format!("  ! {e}"))?;
            }
        }
        let profile = wizard.finish(store)?;
        Ok(Some(profile))
    }

    async fn collect_step(&mut self, wizard: &mut OnboardingWizard) -> io::Result<bool> {
        let draft = wizard.draft().clone();
        match wizard.step() {
            OnboardingStep::Designation => {
                let Some(name) = self.ask("Assign Identity: ").await? else {
                    return Ok(false);
                };
                wizard.set_name(name);
            }
            OnboardingStep::TemporalRhythm => {
                let Some(wake) = self.ask_default("Wake", &draft.wake_time).await? else {
                    return Ok(false);
                };
                let Some(sleep) = self.ask_default("Sleep", &draft.sleep_time).await? else {
                    return Ok(false);
                };
                wizard.set_rhythm(wake, sleep);
            }
            OnboardingStep::StrategicObjectives => {
                let Some(goal) = self.ask("90-Day Objective: ").await? else {
                    return Ok(false);
                };
                let Some(blocker) = self.ask("Primary Friction Point: ").await? else {
                    return Ok(false);
                };
                wizard.set_objectives(goal, blocker);
            }
            OnboardingStep::SeverityLevel => loop {
                self.renderer.line(
                    "  mentor  - High accountability.\n  advisor - Collaborative guidance.",
                )?;
                let Some(mode) = self.ask_default("Select Authority Mode", "mentor").await? else {
                    return Ok(false);
                };
                match mode.parse::<AuthorityPreference>() {
                    Ok(preference) => {
                        wizard.set_authority(preference);
                        break;
                    }
                    Err(e) => self.renderer.line(&format!("  ! {e}"))?,
                }
            },
        }
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Chat
    // -------------------------------------------------------------------------

    /// Send the synthetic initialization message for a fresh baseline.
    pub async fn sync_baseline(
        &mut self,
        orchestrator: &Arc<ChatOrchestrator>,
        profile: Profile,
    ) -> AppResult<()> {
        let mut events = orchestrator.state().subscribe();
        self.renderer
            .line(&format!("> {}", sentinel_chat::initialization_message(&profile)))?;
        let outcome = {
            let send = pin!(orchestrator.sync_baseline(profile));
            self.drive(orchestrator, &mut events, send).await?
        };
        self.after_send(orchestrator, outcome).await
    }

    /// The chat loop. Returns when input ends or `/quit` is entered.
    pub async fn run(&mut self, orchestrator: &Arc<ChatOrchestrator>) -> AppResult<()> {
        let state = orchestrator.state();
        if state.view() == View::Home {
            self.renderer.line(&home_banner(state.profile().as_ref()))?;
        }
        self.renderer
            .line("Type a message. /reset clears the session, /quit exits. Ctrl-C stops a reply.")?;

        let mut events = state.subscribe();
        loop {
            let line = tokio::select! {
                line = self.read_line("> ") => line?,
                _ = tokio::signal::ctrl_c() => {
                    self.renderer.line("")?;
                    break;
                }
            };
            let Some(line) = line else {
                break;
            };

            match line.trim() {
                "" => continue,
                "/quit" | "/exit" => break,
                "/reset" => {
                    orchestrator.reset_session();
                    self.render_pending(&mut events)?;
                    continue;
                }
                _ => {}
            }

            let outcome = {
                let send = pin!(orchestrator.send_message(&line));
                self.drive(orchestrator, &mut events, send).await?
            };
            self.after_send(orchestrator, outcome).await?;
        }
        Ok(())
    }

    /// Poll a send to completion while rendering events and routing Ctrl-C
    /// to `stop()`.
    async fn drive<F>(
        &mut self,
        orchestrator: &ChatOrchestrator,
        events: &mut broadcast::Receiver<ChatEvent>,
        mut send: std::pin::Pin<&mut F>,
    ) -> io::Result<SendOutcome>
    where
        F: std::future::Future<Output = SendOutcome>,
    {
        let outcome = loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Ok(event) => self.renderer.handle(&event)?,
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Renderer lagged behind session events"),
                    Err(RecvError::Closed) => {}
                },
                outcome = &mut send => break outcome,
                _ = tokio::signal::ctrl_c() => {
                    orchestrator.stop();
                }
            }
        };
        self.render_pending(events)?;
        Ok(outcome)
    }

    fn render_pending(&mut self, events: &mut broadcast::Receiver<ChatEvent>) -> io::Result<()> {
        loop {
            match events.try_recv() {
                Ok(event) => self.renderer.handle(&event)?,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Renderer lagged behind session events");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
            }
        }
    }

    async fn after_send(
        &mut self,
        orchestrator: &ChatOrchestrator,
        outcome: SendOutcome,
    ) -> AppResult<()> {
        match outcome {
            SendOutcome::Completed => {}
            SendOutcome::Rejected(reason @ RejectReason::CoolingDown(_)) => {
                self.renderer.line(&format!("  {reason}"))?;
            }
            SendOutcome::Rejected(reason) => debug!(%reason, "Send ignored"),
            SendOutcome::Failed(e) => {
                if e.is_rate_limited() {
                    self.wait_out_cooldown(orchestrator).await?;
                }
            }
        }
        Ok(())
    }

    /// Block input with a live countdown until the cooldown ends.
    async fn wait_out_cooldown(&mut self, orchestrator: &ChatOrchestrator) -> io::Result<()> {
        let mut remaining = orchestrator.cooldown().subscribe();
        loop {
            let secs = *remaining.borrow_and_update();
            if secs == 0 {
                break;
            }
            self.renderer
                .status_line(&RejectReason::CoolingDown(secs).to_string())?;
            tokio::select! {
                changed = remaining.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        self.renderer.clear_status_line()
    }
}
