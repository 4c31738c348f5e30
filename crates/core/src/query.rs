//! Natural-language query forwarded to an external diagnostic responder.
//!
//! The query is an opaque payload as far as the rest of the system goes. Its
//! wording is deterministic:
//!
//! `I am a patient in the {age} age group, gender {gender}, experiencing {symptoms}
//! for {duration}.[ I have recently been exposed to {exposures}.] What could be the
//! possible diagnosis?`
//!
//! Missing answers fall back to placeholders from [`crate::constants`]; the
//! exposure sentence only appears when at least one exposure was chosen.

use crate::constants::{
    AGE_GROUP_PLACEHOLDER, DURATION_PLACEHOLDER, GENDER_PLACEHOLDER, LIST_SEPARATOR,
    QUERY_QUESTION, SYMPTOMS_PLACEHOLDER, SYMPTOM_CONNECTIVE,
};
use crate::session::Selections;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use triage_types::NonEmptyText;

/// Token accounting reported by the responder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Narrative answer from the responder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReply {
    pub text: String,
    pub usage: TokenUsage,
}

/// Identifies one dispatch of a query. A fresh ticket is issued for every dispatch
/// and every retry, so replies to superseded dispatches can be told apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestTicket(pub(crate) u64);

impl RequestTicket {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A query the caller must hand to the responder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub ticket: RequestTicket,
    pub query: String,
}

/// What came back for a dispatched ticket. Failures carry a human-readable message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseOutcome {
    pub ticket: RequestTicket,
    pub result: Result<DiagnosticReply, String>,
}

/// Formats the query from everything selected so far.
pub fn format_query(selections: &Selections) -> String {
    let age = joined_or(selections.get(Stage::AgeGroup), LIST_SEPARATOR, AGE_GROUP_PLACEHOLDER);
    let gender = joined_or(selections.get(Stage::Gender), LIST_SEPARATOR, GENDER_PLACEHOLDER);
    let symptoms = joined_or(
        selections.get(Stage::Symptoms),
        SYMPTOM_CONNECTIVE,
        SYMPTOMS_PLACEHOLDER,
    );
    let duration = joined_or(selections.get(Stage::Duration), LIST_SEPARATOR, DURATION_PLACEHOLDER);

    let mut query = format!(
        "I am a patient in the {age} age group, gender {gender}, \
         experiencing {symptoms} for {duration}."
    );

    let exposures = selections.get(Stage::Exposure);
    if !exposures.is_empty() {
        query.push_str(" I have recently been exposed to ");
        query.push_str(&join(exposures, LIST_SEPARATOR));
        query.push('.');
    }

    query.push(' ');
    query.push_str(QUERY_QUESTION);
    query
}

fn join(labels: &[NonEmptyText], separator: &str) -> String {
    labels
        .iter()
        .map(NonEmptyText::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}

fn joined_or(labels: &[NonEmptyText], separator: &str, placeholder: &str) -> String {
    if labels.is_empty() {
        placeholder.to_string()
    } else {
        join(labels, separator)
    }
}
