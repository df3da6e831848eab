//! Streaming generation seam.
//!
//! The controller talks to the hosted model through `GenerationBackend`, so
//! the transport can be swapped for a scripted one in tests.

use async_trait::async_trait;
use serde::Serialize;

use sentinel_core::types::{Role, Turn};

use crate::error::ChatError;

/// Conversation role understood by the generation endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRole {
    User,
    Model,
}

impl From<Role> for ContentRole {
    /// User-authored turns stay `user`; everything else is `model`.
    fn from(role: Role) -> Self {
        match role {
            Role::User => ContentRole::User,
            Role::Assistant | Role::SystemError => ContentRole::Model,
        }
    }
}

/// A text part of a content entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Part {
    pub text: String,
}

/// One entry of the conversation sent to the model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Content {
    pub role: ContentRole,
    pub parts: Vec<Part>,
}

impl From<&Turn> for Content {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.into(),
            parts: vec![Part {
                text: turn.text.clone(),
            }],
        }
    }
}

/// A fully built streaming generation request.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub contents: Vec<Content>,
    pub system_instruction: String,
    pub temperature: f32,
}

/// One incremental piece of a streamed response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fragment {
    /// Missing text is treated as the empty string.
    pub text: Option<String>,
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn empty() -> Self {
        Self { text: None }
    }

    pub fn as_str(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// A response stream, consumed one fragment at a time.
#[async_trait]
pub trait FragmentStream: Send {
    /// Await the next fragment. `None` marks the end of the stream.
    async fn next_fragment(&mut self) -> Option<Result<Fragment, ChatError>>;
}

/// Opens streaming generation requests against a hosted model.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn stream_generate(
        &self,
        request: GenerateRequest,
    ) -> Result<Box<dyn FragmentStream>, ChatError>;
}
