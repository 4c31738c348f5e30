//! Validated primitive types shared across the triage crates.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
///
/// The authored case is preserved. Catalog labels and symptoms are compared
/// case-insensitively, so compare [`NonEmptyText::folded`] against [`fold`] whenever
/// identity matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Arguments
    ///
    /// * `input` - Any type that can be converted to a string reference
    ///
    /// # Returns
    ///
    /// Returns `Ok(NonEmptyText)` if the trimmed input is non-empty,
    /// or `Err(TextError::Empty)` if it's empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased form used as the case-insensitive identity of the text.
    pub fn folded(&self) -> String {
        fold(&self.0)
    }
}

/// Normalise free text into its case-insensitive identity: trimmed and lower-cased.
pub fn fold(input: &str) -> String {
    input.trim().to_lowercase()
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for NonEmptyText {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_rejects_blank_input() {
        let text = NonEmptyText::new("  Fever \n").expect("valid text");
        assert_eq!(text.as_str(), "Fever");

        assert_eq!(NonEmptyText::new("   "), Err(TextError::Empty));
        assert_eq!(NonEmptyText::new(""), Err(TextError::Empty));
    }

    #[test]
    fn case_insensitive_identity_keeps_authored_case() {
        let text = NonEmptyText::new("Muscle and Joint Pain").expect("valid text");
        assert_eq!(text.to_string(), "Muscle and Joint Pain");
        assert_eq!(text.folded(), "muscle and joint pain");
        assert_eq!(text.folded(), fold("  MUSCLE AND JOINT PAIN "));
        assert_ne!(text.folded(), fold("muscle pain"));
    }

    #[test]
    fn deserialize_rejects_whitespace_only() {
        let ok: NonEmptyText = serde_json::from_str("\"Chills\"").expect("parse");
        assert_eq!(ok.as_str(), "Chills");

        let err = serde_json::from_str::<NonEmptyText>("\"  \"").expect_err("should reject");
        assert!(err.to_string().contains("Text cannot be empty"));
    }
}
