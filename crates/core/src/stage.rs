use serde::{Deserialize, Serialize};

/// One step of the fixed questionnaire sequence.
///
/// Declaration order is the questionnaire order. A given catalog may leave out
/// `Duration` and `Exposure`; the others are always present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    #[default]
    AgeGroup,
    Gender,
    Duration,
    Exposure,
    Symptoms,
    Complete,
}

impl Stage {
    /// Short label for progress indicators.
    pub fn title(self) -> &'static str {
        match self {
            Self::AgeGroup => "Age group",
            Self::Gender => "Gender",
            Self::Duration => "Duration",
            Self::Exposure => "Exposure",
            Self::Symptoms => "Symptoms",
            Self::Complete => "Complete",
        }
    }

    /// Question asked while the stage is current. Empty once complete.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::AgeGroup => "What is your age group?",
            Self::Gender => "What is your gender?",
            Self::Duration => "How long have you had these symptoms?",
            Self::Exposure => "Have you recently been exposed to any of the following?",
            Self::Symptoms => "Select all symptoms you are experiencing:",
            Self::Complete => "",
        }
    }

    /// Stages that may be passed over without an answer.
    pub fn is_optional(self) -> bool {
        matches!(self, Self::Duration | Self::Exposure)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AgeGroup => "AGE_GROUP",
            Self::Gender => "GENDER",
            Self::Duration => "DURATION",
            Self::Exposure => "EXPOSURE",
            Self::Symptoms => "SYMPTOMS",
            Self::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}
