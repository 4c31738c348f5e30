//! Questionnaire configuration.
//!
//! A questionnaire is one state machine parameterised by the shape of its symptom
//! catalog and by what happens once the symptom stage completes. Both are fixed when
//! the [`crate::Questionnaire`] is built and are never read from the environment.

use serde::{Deserialize, Serialize};

/// How the symptom stage is navigated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymptomMode {
    /// Flat list; any number of symptoms may be picked, then `finish` completes.
    MultiSelect,
    /// Tree; picking a branch descends, picking a leaf completes with the whole path.
    Hierarchical,
}

/// What the questionnaire does on reaching `COMPLETE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalAction {
    /// Rank the catalog's conditions against the chosen symptoms.
    LocalMatch,
    /// Format a natural-language query and hand it to an external responder.
    ForwardQuery,
}

/// Configuration resolved once when the questionnaire is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireConfig {
    pub symptom_mode: SymptomMode,
    pub terminal: TerminalAction,
}

impl QuestionnaireConfig {
    pub fn new(symptom_mode: SymptomMode, terminal: TerminalAction) -> Self {
        Self {
            symptom_mode,
            terminal,
        }
    }

    /// Flat symptom multi-select ranked by the local matcher.
    pub fn local_match() -> Self {
        Self::new(SymptomMode::MultiSelect, TerminalAction::LocalMatch)
    }

    /// Symptom tree whose result is forwarded to an external responder.
    pub fn forward_query() -> Self {
        Self::new(SymptomMode::Hierarchical, TerminalAction::ForwardQuery)
    }
}

impl Default for QuestionnaireConfig {
    fn default() -> Self {
        Self::local_match()
    }
}
