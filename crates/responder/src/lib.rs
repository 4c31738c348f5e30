//! # Triage Responder
//!
//! The asynchronous boundary of the questionnaire.
//!
//! When a forward-query questionnaire completes, `triage-core` hands back a
//! [`PendingRequest`]. This crate sends it to a [`DiagnosticResponder`] and turns
//! the result into a [`ResponseOutcome`] for `Questionnaire::receive`:
//!
//! ```ignore
//! if let Transition::Dispatched(request) = questionnaire.select(&mut state, label)? {
//!     let outcome = resolve(&responder, request).await;
//!     questionnaire.receive(&mut state, outcome);
//! }
//! ```
//!
//! Timeouts are the responder's business; the session only sees success or a message.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod http;
pub mod scripted;

pub use config::ResponderConfig;
pub use http::HttpResponder;
pub use scripted::ScriptedResponder;

use async_trait::async_trait;
use std::time::Duration;
use triage_core::{DiagnosticReply, PendingRequest, ResponseOutcome};

/// Errors from talking to a diagnostic responder.
#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    #[error("could not connect to responder at {0}")]
    Connection(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("responder returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse responder reply: {0}")]
    ResponseParsing(String),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("invalid responder configuration: {0}")]
    InvalidConfig(String),
}

pub type ResponderResult<T> = std::result::Result<T, ResponderError>;

/// Anything that can turn a formatted query into a narrative reply.
#[async_trait]
pub trait DiagnosticResponder: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Sends `query` and waits for the reply.
    async fn respond(&self, query: &str) -> ResponderResult<DiagnosticReply>;
}

/// Sends a pending request and packages the result for the session.
pub async fn resolve<R>(responder: &R, request: PendingRequest) -> ResponseOutcome
where
    R: DiagnosticResponder + ?Sized,
{
    tracing::info!(
        responder = responder.name(),
        ticket = %request.ticket,
        "dispatching diagnostic query"
    );

    let result = responder.respond(&request.query).await.map_err(|err| {
        tracing::warn!(responder = responder.name(), error = %err, "diagnostic query failed");
        err.to_string()
    });

    ResponseOutcome {
        ticket: request.ticket,
        result,
    }
}
