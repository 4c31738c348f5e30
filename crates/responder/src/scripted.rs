use crate::{DiagnosticResponder, ResponderError, ResponderResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use triage_core::{DiagnosticReply, TokenUsage};

/// In-memory responder that plays back queued outcomes in order.
///
/// Records every query it receives. Once the script runs out each call fails.
#[derive(Default)]
pub struct ScriptedResponder {
    script: Mutex<VecDeque<ResponderResult<DiagnosticReply>>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply with zero token usage.
    pub fn with_reply(self, text: &str) -> Self {
        self.with_outcome(Ok(DiagnosticReply {
            text: text.to_string(),
            usage: TokenUsage::default(),
        }))
    }

    pub fn with_failure(self, error: ResponderError) -> Self {
        self.with_outcome(Err(error))
    }

    pub fn with_outcome(self, outcome: ResponderResult<DiagnosticReply>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
        self
    }

    /// Queries received so far, oldest first.
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DiagnosticResponder for ScriptedResponder {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn respond(&self, query: &str) -> ResponderResult<DiagnosticReply> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.to_string());

        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(ResponderError::HttpClient("script exhausted".into())))
    }
}
