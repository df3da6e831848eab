//! Prompt construction: system instruction and context window.

use sentinel_core::types::{AuthorityPreference, Profile, Turn};

use crate::backend::Content;

/// Dossier line used before onboarding has completed.
const DOSSIER_PENDING: &str = "USER DOSSIER: Initializing.";

/// Build the system instruction sent with every query.
///
/// Without a profile the assistant falls back to the advisory role.
pub fn system_instruction(profile: Option<&Profile>) -> String {
    let authority = profile
        .map(|p| p.authority_preference)
        .unwrap_or(AuthorityPreference::Advisor)
        .phrase();
    let dossier = profile
        .map(Profile::dossier)
        .unwrap_or_else(|| DOSSIER_PENDING.to_string());

    format!(
        "You are Aura Sentinel. {dossier}\n\
         PROTOCOL: 1. Act as a {authority}. \
         2. Challenge the user's blockers aggressively but constructively. \
         3. Ask EXACTLY ONE sharp question. \
         4. Text only."
    )
}

/// Map the last `max_turns` turns of `history` to request contents,
/// preserving their order.
pub fn context_window(history: &[Turn], max_turns: usize) -> Vec<Content> {
    let start = history.len().saturating_sub(max_turns);
    history[start..].iter().map(Content::from).collect()
}
