//! Chat engine for Aura Sentinel.
//!
//! Streams model replies into the session transcript through a single
//! in-flight query, with rate-limit cooldown, cooperative cancellation and
//! the onboarding wizard that seeds the behavioral baseline.

pub mod backend;
pub mod controller;
pub mod cooldown;
pub mod error;
pub mod gemini;
pub mod onboarding;
pub mod orchestrator;
pub mod prompt;
pub mod sse;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Content, ContentRole, Fragment, FragmentStream, GenerateRequest, GenerationBackend};
pub use controller::QueryController;
pub use cooldown::Cooldown;
pub use error::ChatError;
pub use gemini::GeminiClient;
pub use onboarding::{initialization_message, OnboardingStep, OnboardingWizard};
pub use orchestrator::{ChatOrchestrator, RejectReason, SendOutcome};
pub use state::SessionState;
