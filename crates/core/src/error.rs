use crate::stage::Stage;

/// Malformed catalog data. Raised while a catalog is being built, never during a session.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("invalid text in {context}: {source}")]
    InvalidText {
        context: String,
        #[source]
        source: triage_types::TextError,
    },
    #[error("option set '{0}' must offer at least one option")]
    EmptyOptionSet(&'static str),
    #[error("option set '{set}' repeats the label '{label}' among siblings")]
    DuplicateLabel { set: &'static str, label: String },
    #[error("option set '{set}' must be flat but '{label}' has children")]
    NestedOptions { set: &'static str, label: String },
    #[error("option set '{set}' exceeds maximum depth of {max}")]
    TooDeep { set: &'static str, max: usize },
    #[error("condition '{0}' appears more than once")]
    DuplicateCondition(String),
    #[error("condition '{0}' has no required symptoms")]
    NoRequiredSymptoms(String),
    #[error("condition '{condition}' lists the symptom '{symptom}' more than once")]
    DuplicateSymptom { condition: String, symptom: String },
    #[error("multi-select symptom mode needs a flat symptom list")]
    HierarchicalSymptomsInFlatMode,
    #[error("catalog schema mismatch at {path}: {message}")]
    Schema { path: String, message: String },
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// A navigation action that was rejected. The session is left exactly as it was.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("already at the first stage")]
    AtFirstStage,
    #[error("select at least one symptom before finishing")]
    NoSymptomsSelected,
    #[error("finish is only available while choosing symptoms from a flat list")]
    FinishUnavailable,
    #[error("'{label}' is not offered at stage {stage}")]
    NotOffered { stage: Stage, label: String },
    #[error("symptom '{0}' is already selected")]
    AlreadySelected(String),
    #[error("symptom '{0}' is not selected")]
    NotSelected(String),
    #[error("stage {0} cannot be skipped")]
    SkipNotAllowed(Stage),
    #[error("a diagnostic request is still in flight")]
    RequestInFlight,
    #[error("the questionnaire is already complete")]
    AlreadyComplete,
    #[error("there is no failed request to retry")]
    NothingToRetry,
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
