//! HTTP diagnostic responder.
//!
//! Wire contract: `POST {endpoint}` with JSON `{"prompt": "<query>"}`. A success
//! status must carry `{"text": "...", "usage": {"promptTokens": n,
//! "completionTokens": n, "totalTokens": n}}`. Any other status is a failure whose
//! body is kept for the error message.

use crate::config::ResponderConfig;
use crate::{DiagnosticResponder, ResponderError, ResponderResult};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use triage_core::DiagnosticReply;

/// Request body sent to the responder.
#[derive(Serialize)]
struct DiagnoseRequest<'a> {
    prompt: &'a str,
}

/// Sends queries to a text-generation service over HTTP.
pub struct HttpResponder {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpResponder {
    pub fn new(config: &ResponderConfig) -> ResponderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ResponderError::HttpClient(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint().to_string(),
            client,
            timeout: config.timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DiagnosticResponder for HttpResponder {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn respond(&self, query: &str) -> ResponderResult<DiagnosticReply> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&DiagnoseRequest { prompt: query })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResponderError::Timeout(self.timeout)
                } else if e.is_connect() {
                    ResponderError::Connection(self.endpoint.clone())
                } else {
                    ResponderError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResponderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: DiagnosticReply = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ResponderError::Timeout(self.timeout)
            } else {
                ResponderError::ResponseParsing(e.to_string())
            }
        })?;

        tracing::debug!(
            prompt_tokens = reply.usage.prompt_tokens,
            completion_tokens = reply.usage.completion_tokens,
            total_tokens = reply.usage.total_tokens,
            "responder replied"
        );

        Ok(reply)
    }
}
