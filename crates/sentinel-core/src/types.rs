use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SentinelError};

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Assistant,
    SystemError,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::SystemError => write!(f, "system-error"),
        }
    }
}

/// How the user prefers to organise their work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStyle {
    #[default]
    Deep,
    Collaborative,
    Reactive,
}

/// Tone of authority the assistant takes with the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityPreference {
    /// High accountability.
    #[default]
    Mentor,
    /// Collaborative guidance.
    Advisor,
}

impl AuthorityPreference {
    /// Phrase used for the role in the system instruction.
    pub fn phrase(&self) -> &'static str {
        match self {
            AuthorityPreference::Mentor => "authoritative mentor",
            AuthorityPreference::Advisor => "advisory guide",
        }
    }
}

impl std::str::FromStr for AuthorityPreference {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mentor" => Ok(AuthorityPreference::Mentor),
            "advisor" => Ok(AuthorityPreference::Advisor),
            other => Err(SentinelError::Validation(format!(
                "unknown authority mode '{other}' (expected 'mentor' or 'advisor')"
            ))),
        }
    }
}

/// Named views of the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Auth,
    Onboarding,
    Home,
    Chat,
    Scheduler,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            View::Auth => "auth",
            View::Onboarding => "onboarding",
            View::Home => "home",
            View::Chat => "chat",
            View::Scheduler => "scheduler",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// One exchange unit of the conversation.
///
/// The text of an assistant turn is replaced in place while a response
/// streams in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: now_millis(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Empty assistant turn used as the streaming target.
    pub fn assistant_placeholder() -> Self {
        Self::new(Role::Assistant, String::new())
    }
}

// =============================================================================
// Profile
// =============================================================================

/// The user's behavioral baseline, collected once during onboarding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub wake_time: String,
    pub sleep_time: String,
    pub energy_peak: String,
    pub primary_goal: String,
    pub main_blocker: String,
    pub work_style: WorkStyle,
    pub authority_preference: AuthorityPreference,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            wake_time: "07:00".to_string(),
            sleep_time: "23:00".to_string(),
            energy_peak: "morning".to_string(),
            primary_goal: String::new(),
            main_blocker: String::new(),
            work_style: WorkStyle::Deep,
            authority_preference: AuthorityPreference::Mentor,
        }
    }
}

impl Profile {
    /// Check the completed-profile invariant: name, goal and blocker are set.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("name", &self.name),
            ("primaryGoal", &self.primary_goal),
            ("mainBlocker", &self.main_blocker),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(SentinelError::Validation(format!("{field} is required")));
            }
        }
        Ok(())
    }

    /// One-line dossier summary used in prompts and the settings panel.
    pub fn dossier(&self) -> String {
        format!(
            "USER DOSSIER: Identity: {}, Focus: {}, Constraint: {}.",
            self.name, self.primary_goal, self.main_blocker
        )
    }
}

// =============================================================================
// Generation settings
// =============================================================================

/// Process-wide generation settings, fixed at startup.
///
/// Only `temperature` reaches the model request; the remaining fields are
/// carried for the settings panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub behavioral_probe: bool,
    pub authority_level: AuthorityPreference,
    pub risk_profiling: bool,
    pub thinking_budget: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            behavioral_probe: true,
            authority_level: AuthorityPreference::Mentor,
            risk_profiling: true,
            thinking_budget: 0,
            temperature: 0.7,
        }
    }
}
