//! # Triage Core
//!
//! Core logic for the guided symptom questionnaire.
//!
//! This crate contains pure, synchronous operations:
//! - [`Catalog`]: validated reference data (option sets and conditions)
//! - [`matcher`]: ranks conditions by symptom overlap
//! - [`Questionnaire`]: stage sequencing, symptom-tree navigation, back/reset and
//!   terminal actions over a caller-owned [`SessionState`]
//! - [`query`]: the natural-language query handed to an external responder
//!
//! **No I/O**: sending queries to a responder belongs in `triage-responder`.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod matcher;
pub mod query;
pub mod session;
pub mod stage;

pub use catalog::{Catalog, CatalogData, Condition, OptionNode};
pub use config::{QuestionnaireConfig, SymptomMode, TerminalAction};
pub use error::{CatalogError, CatalogResult, SessionError, SessionResult};
pub use matcher::{match_symptoms, DiagnosisResult};
pub use query::{DiagnosticReply, PendingRequest, RequestTicket, ResponseOutcome, TokenUsage};
pub use session::{
    Completion, Delivery, QueryState, QueryStatus, Questionnaire, SessionState, Selections,
    Transition,
};
pub use stage::Stage;

// Re-export the validated text type so callers need not depend on triage-types directly.
pub use triage_types::NonEmptyText;
