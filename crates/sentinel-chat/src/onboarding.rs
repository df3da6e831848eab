//! Four-step onboarding wizard that collects the behavioral baseline.

use std::fmt;

use tracing::info;

use sentinel_core::types::{AuthorityPreference, Profile};
use sentinel_storage::ProfileStore;

use crate::error::ChatError;

/// Wizard steps, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OnboardingStep {
    /// Name.
    Designation,
    /// Wake and sleep times.
    TemporalRhythm,
    /// Primary goal and main blocker.
    StrategicObjectives,
    /// Authority preference.
    SeverityLevel,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 4] = [
        OnboardingStep::Designation,
        OnboardingStep::TemporalRhythm,
        OnboardingStep::StrategicObjectives,
        OnboardingStep::SeverityLevel,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            OnboardingStep::Designation => "Designation",
            OnboardingStep::TemporalRhythm => "Temporal Rhythm",
            OnboardingStep::StrategicObjectives => "Strategic Objectives",
            OnboardingStep::SeverityLevel => "Severity Level",
        }
    }

    /// 0-based position.
    pub fn index(&self) -> usize {
        match self {
            OnboardingStep::Designation => 0,
            OnboardingStep::TemporalRhythm => 1,
            OnboardingStep::StrategicObjectives => 2,
            OnboardingStep::SeverityLevel => 3,
        }
    }

    fn next(&self) -> Option<OnboardingStep> {
        Self::ALL.get(self.index() + 1).copied()
    }

    fn previous(&self) -> Option<OnboardingStep> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Collects a [`Profile`] one step at a time.
///
/// Each step must validate before the wizard moves on. Finishing persists
/// the profile; the caller then sends [`initialization_message`].
#[derive(Clone, Debug)]
pub struct OnboardingWizard {
    step: OnboardingStep,
    draft: Profile,
}

impl Default for OnboardingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingWizard {
    pub fn new() -> Self {
        Self {
            step: OnboardingStep::Designation,
            draft: Profile::default(),
        }
    }

    pub fn step(&self) -> OnboardingStep {
        self.step
    }

    pub fn draft(&self) -> &Profile {
        &self.draft
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into().trim().to_string();
    }

    pub fn set_rhythm(&mut self, wake_time: impl Into<String>, sleep_time: impl Into<String>) {
        self.draft.wake_time = wake_time.into().trim().to_string();
        self.draft.sleep_time = sleep_time.into().trim().to_string();
    }

    pub fn set_objectives(&mut self, primary_goal: impl Into<String>, main_blocker: impl Into<String>) {
        self.draft.primary_goal = primary_goal.into().trim().to_string();
        self.draft.main_blocker = main_blocker.into().trim().to_string();
    }

    pub fn set_authority(&mut self, preference: AuthorityPreference) {
        self.draft.authority_preference = preference;
    }

    /// Check the fields gated by the current step.
    pub fn validate_step(&self) -> Result<(), ChatError> {
        let required: Vec<(&str, &str)> = match self.step {
            OnboardingStep::Designation => vec![("name", self.draft.name.as_str())],
            OnboardingStep::TemporalRhythm => vec![
                ("wakeTime", self.draft.wake_time.as_str()),
                ("sleepTime", self.draft.sleep_time.as_str()),
            ],
            OnboardingStep::StrategicObjectives => vec![
                ("primaryGoal", self.draft.primary_goal.as_str()),
                ("mainBlocker", self.draft.main_blocker.as_str()),
            ],
            OnboardingStep::SeverityLevel => Vec::new(),
        };
        match required.iter().find(|(_, value)| value.is_empty()) {
            Some((field, _)) => Err(ChatError::Validation(format!(
                "{field} is required ({})",
                self.step
            ))),
            None => Ok(()),
        }
    }

    /// Validate the current step and move to the next one.
    pub fn advance(&mut self) -> Result<OnboardingStep, ChatError> {
        self.validate_step()?;
        let next = self.step.next().ok_or_else(|| {
            ChatError::Validation("already at the final step".to_string())
        })?;
        self.step = next;
        Ok(next)
    }

    /// Go back one step. Fields already entered are kept.
    pub fn back(&mut self) -> OnboardingStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Persist the completed profile. Only valid on the final step.
    pub fn finish(self, store: &ProfileStore) -> Result<Profile, ChatError> {
        if self.step != OnboardingStep::SeverityLevel {
            return Err(ChatError::Validation(format!(
                "onboarding is at step '{}', not the final step",
                self.step
            )));
        }
        self.validate_step()?;
        store.save_profile(&self.draft)?;
        info!(name = %self.draft.name, authority = ?self.draft.authority_preference, "Onboarding complete");
        Ok(self.draft)
    }
}

/// Synthetic first user message summarizing the collected dossier.
pub fn initialization_message(profile: &Profile) -> String {
    format!(
        "INITIALIZATION SYNC: Designation: {}. Objective: {}. Constraint: {}. \
         I am ready for behavioral analysis.",
        profile.name, profile.primary_goal, profile.main_blocker
    )
}
