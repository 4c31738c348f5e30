//! Constants used throughout the triage core crate.
//!
//! Query template fragments live here so the wording of the forwarded query
//! stays in one place.

/// Deepest option tree a catalog may define, counting the roots as depth 1.
pub const MAX_OPTION_DEPTH: usize = 8;

/// Number of runner-up matches shown beneath the top match.
pub const SECONDARY_MATCH_LIMIT: usize = 3;

/// Stands in for the age group when none was chosen.
pub const AGE_GROUP_PLACEHOLDER: &str = "unspecified";

/// Stands in for the gender when none was chosen.
pub const GENDER_PLACEHOLDER: &str = "unspecified";

/// Stands in for the symptom list when none was chosen.
pub const SYMPTOMS_PLACEHOLDER: &str = "unspecified symptoms";

/// Stands in for the duration when none was chosen.
pub const DURATION_PLACEHOLDER: &str = "an unspecified duration";

/// Joins symptom labels inside the query sentence.
pub const SYMPTOM_CONNECTIVE: &str = " and ";

/// Joins age group, gender and exposure labels when more than one was chosen.
pub const LIST_SEPARATOR: &str = ", ";

/// Closing question appended to every forwarded query.
pub const QUERY_QUESTION: &str = "What could be the possible diagnosis?";

/// Built-in flat catalog: symptom multi-select with local matching.
pub const BUILTIN_FLAT_CATALOG: &str = include_str!("../catalogs/flat.yaml");

/// Built-in hierarchical catalog: symptom tree with duration and exposure stages.
pub const BUILTIN_HIERARCHICAL_CATALOG: &str = include_str!("../catalogs/hierarchical.yaml");

/// Conditions shared by both built-in catalogs.
pub const BUILTIN_CONDITIONS: &str = include_str!("../catalogs/conditions.yaml");
