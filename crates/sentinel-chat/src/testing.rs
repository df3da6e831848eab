//! Scripted in-memory backend for controller and orchestrator tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::backend::{Fragment, FragmentStream, GenerateRequest, GenerationBackend};
use crate::error::ChatError;

/// One step of a scripted response stream.
pub(crate) enum Step {
    Text(&'static str),
    Missing,
    Fail(ChatError),
    /// Block until the notify fires.
    Wait(Arc<Notify>),
}

/// What a single `stream_generate` call does.
pub(crate) enum Script {
    Stream(Vec<Step>),
    Refuse(ChatError),
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn texts(texts: &[&'static str]) -> Arc<Self> {
        Self::new(vec![Script::Stream(
            texts.iter().map(|t| Step::Text(t)).collect(),
        )])
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn stream_generate(
        &self,
        request: GenerateRequest,
    ) -> Result<Box<dyn FragmentStream>, ChatError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Stream(Vec::new()));
        match script {
            Script::Stream(steps) => Ok(Box::new(ScriptedStream {
                steps: steps.into(),
            })),
            Script::Refuse(err) => Err(err),
        }
    }
}

struct ScriptedStream {
    steps: VecDeque<Step>,
}

#[async_trait]
impl FragmentStream for ScriptedStream {
    async fn next_fragment(&mut self) -> Option<Result<Fragment, ChatError>> {
        loop {
            match self.steps.pop_front()? {
                Step::Text(text) => return Some(Ok(Fragment::text(text))),
                Step::Missing => return Some(Ok(Fragment::empty())),
                Step::Fail(err) => return Some(Err(err)),
                Step::Wait(notify) => notify.notified().await,
            }
        }
    }
}
