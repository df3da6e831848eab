use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Turn, View};

/// State changes published by the session state container.
///
/// Consumed by the presentation layer to render the transcript, the status
/// line and the error banner without polling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ChatEvent {
    /// A turn was appended to the transcript.
    TurnAppended { turn: Turn },

    /// The text of an existing turn was replaced (streaming update).
    TurnUpdated { id: Uuid, text: String },

    /// The status indicator changed. Empty text means idle.
    StatusChanged { text: String },

    /// A user-facing error message was raised.
    ErrorRaised { message: String },

    /// The user-facing error message was cleared.
    ErrorCleared,

    /// A request started (`true`) or finished (`false`).
    InFlightChanged { in_flight: bool },

    /// The active view changed.
    ViewChanged { view: View },

    /// The transcript was cleared.
    SessionReset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = ChatEvent::StatusChanged {
            text: "Processing...".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["text"], "Processing...");
    }

    #[test]
    fn test_turn_appended_roundtrip() {
        let turn = Turn::new(Role::User, "hi");
        let event = ChatEvent::TurnAppended { turn: turn.clone() };
        let json = serde_json::to_string(&event).unwrap();
        let back: ChatEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ChatEvent::TurnAppended { turn });
    }

    #[test]
    fn test_unit_variants_serialize() {
        let json = serde_json::to_value(ChatEvent::SessionReset).unwrap();
        assert_eq!(json["type"], "session_reset");
        let json = serde_json::to_value(ChatEvent::ErrorCleared).unwrap();
        assert_eq!(json["type"], "error_cleared");
    }

    #[test]
    fn test_view_changed_uses_lowercase_view() {
        let json = serde_json::to_value(ChatEvent::ViewChanged { view: View::Chat }).unwrap();
        assert_eq!(json["view"], "chat");
    }
}
