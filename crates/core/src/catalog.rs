//! Static reference data for the questionnaire.
//!
//! A [`Catalog`] holds the option sets offered at each stage and the list of
//! conditions the matcher ranks. It is validated once on construction and is
//! read-only afterwards; every accessor hands out shared references.
//!
//! Catalogs are either assembled in code through [`CatalogData`] or loaded from
//! YAML with [`Catalog::from_yaml`]. Both routes go through the same checks:
//! - no empty labels, condition names or symptoms
//! - sibling labels unique (case-insensitive)
//! - age group, gender, duration and exposure sets are flat
//! - option trees no deeper than [`MAX_OPTION_DEPTH`]
//! - condition names unique, each with a non-empty, duplicate-free symptom set

use crate::constants::{
    BUILTIN_CONDITIONS, BUILTIN_FLAT_CATALOG, BUILTIN_HIERARCHICAL_CATALOG, MAX_OPTION_DEPTH,
};
use crate::error::{CatalogError, CatalogResult};
use crate::matcher::{self, DiagnosisResult};
use crate::stage::Stage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use triage_types::{fold, NonEmptyText};

/// A selectable node. Nodes without children are leaves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionNode {
    label: NonEmptyText,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<OptionNode>,
}

impl OptionNode {
    /// Creates a node with no children.
    pub fn leaf(label: impl AsRef<str>) -> CatalogResult<Self> {
        Self::branch(label, Vec::new())
    }

    /// Creates a node with the given children, in display order.
    pub fn branch(label: impl AsRef<str>, children: Vec<OptionNode>) -> CatalogResult<Self> {
        Ok(Self {
            label: text("option label", label)?,
            children,
        })
    }

    pub fn label(&self) -> &NonEmptyText {
        &self.label
    }

    pub fn children(&self) -> &[OptionNode] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn depth(&self) -> usize {
        1 + self.children.iter().map(Self::depth).max().unwrap_or(0)
    }
}

/// Builds a list of leaves from plain labels.
pub fn flat_options<I, S>(labels: I) -> CatalogResult<Vec<OptionNode>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels.into_iter().map(OptionNode::leaf).collect()
}

/// A diagnosable condition and the symptoms that characterise it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConditionWire")]
pub struct Condition {
    name: NonEmptyText,
    #[serde(rename = "symptoms")]
    required_symptoms: Vec<NonEmptyText>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionWire {
    name: String,
    symptoms: Vec<String>,
}

impl TryFrom<ConditionWire> for Condition {
    type Error = CatalogError;

    fn try_from(wire: ConditionWire) -> CatalogResult<Self> {
        Condition::new(wire.name, wire.symptoms)
    }
}

impl Condition {
    /// Creates a condition, rejecting empty or repeated symptoms.
    ///
    /// Symptom identity is case-insensitive; the authored case is kept for display.
    pub fn new<I, S>(name: impl AsRef<str>, symptoms: I) -> CatalogResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = text("condition name", name)?;

        let mut seen = HashSet::new();
        let mut required_symptoms = Vec::new();
        for symptom in symptoms {
            let symptom = text(&format!("symptom of '{name}'"), symptom)?;
            if !seen.insert(symptom.folded()) {
                return Err(CatalogError::DuplicateSymptom {
                    condition: name.to_string(),
                    symptom: symptom.to_string(),
                });
            }
            required_symptoms.push(symptom);
        }

        if required_symptoms.is_empty() {
            return Err(CatalogError::NoRequiredSymptoms(name.to_string()));
        }

        Ok(Self {
            name,
            required_symptoms,
        })
    }

    pub fn name(&self) -> &NonEmptyText {
        &self.name
    }

    pub fn required_symptoms(&self) -> &[NonEmptyText] {
        &self.required_symptoms
    }

    /// Looks up a required symptom by its folded (lower-cased, trimmed) form.
    pub fn find_symptom(&self, folded: &str) -> Option<&NonEmptyText> {
        self.required_symptoms
            .iter()
            .find(|symptom| symptom.folded() == folded)
    }
}

/// Unvalidated catalog contents, as authored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogData {
    pub age_groups: Vec<OptionNode>,
    pub genders: Vec<OptionNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durations: Option<Vec<OptionNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposures: Option<Vec<OptionNode>>,
    pub symptoms: Vec<OptionNode>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Validated, immutable reference data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    data: CatalogData,
}

impl Catalog {
    /// Validates `data` and wraps it as a catalog.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] naming the first integrity violation found.
    pub fn new(data: CatalogData) -> CatalogResult<Self> {
        validate_forest("age_groups", &data.age_groups, true)?;
        validate_forest("genders", &data.genders, true)?;
        if let Some(durations) = &data.durations {
            validate_forest("durations", durations, true)?;
        }
        if let Some(exposures) = &data.exposures {
            validate_forest("exposures", exposures, true)?;
        }
        validate_forest("symptoms", &data.symptoms, false)?;

        let mut names = HashSet::new();
        for condition in &data.conditions {
            if !names.insert(condition.name.folded()) {
                return Err(CatalogError::DuplicateCondition(condition.name.to_string()));
            }
        }

        tracing::debug!(
            conditions = data.conditions.len(),
            symptoms = data.symptoms.len(),
            "catalog validated"
        );

        Ok(Self { data })
    }

    /// Parses and validates a catalog from YAML.
    ///
    /// Schema errors carry the path of the failing field (e.g. `conditions[3].symptoms`).
    pub fn from_yaml(yaml_text: &str) -> CatalogResult<Self> {
        Self::new(parse_yaml(yaml_text)?)
    }

    /// The flat catalog: 34 symptoms and 12 conditions, no duration or exposure stage.
    pub fn builtin() -> CatalogResult<Self> {
        Self::builtin_with_conditions(BUILTIN_FLAT_CATALOG)
    }

    /// The hierarchical catalog: a symptom tree plus duration and exposure stages,
    /// ranked against the same conditions as [`Catalog::builtin`].
    pub fn builtin_hierarchical() -> CatalogResult<Self> {
        Self::builtin_with_conditions(BUILTIN_HIERARCHICAL_CATALOG)
    }

    fn builtin_with_conditions(options_yaml: &str) -> CatalogResult<Self> {
        let mut data: CatalogData = parse_yaml(options_yaml)?;
        data.conditions = parse_yaml(BUILTIN_CONDITIONS)?;
        Self::new(data)
    }

    pub fn age_groups(&self) -> &[OptionNode] {
        &self.data.age_groups
    }

    pub fn genders(&self) -> &[OptionNode] {
        &self.data.genders
    }

    pub fn durations(&self) -> Option<&[OptionNode]> {
        self.data.durations.as_deref()
    }

    pub fn exposures(&self) -> Option<&[OptionNode]> {
        self.data.exposures.as_deref()
    }

    pub fn symptoms(&self) -> &[OptionNode] {
        &self.data.symptoms
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.data.conditions
    }

    /// True when any symptom has children.
    pub fn has_symptom_tree(&self) -> bool {
        self.data.symptoms.iter().any(|node| !node.is_leaf())
    }

    /// Whether the catalog supplies options for `stage`. `COMPLETE` never has options.
    pub fn has_stage(&self, stage: Stage) -> bool {
        match stage {
            Stage::Duration => self.data.durations.is_some(),
            Stage::Exposure => self.data.exposures.is_some(),
            Stage::Complete => false,
            _ => true,
        }
    }

    /// Top-level options for `stage`; empty when the stage is absent.
    pub fn options_for(&self, stage: Stage) -> &[OptionNode] {
        match stage {
            Stage::AgeGroup => self.age_groups(),
            Stage::Gender => self.genders(),
            Stage::Duration => self.durations().unwrap_or_default(),
            Stage::Exposure => self.exposures().unwrap_or_default(),
            Stage::Symptoms => self.symptoms(),
            Stage::Complete => &[],
        }
    }

    /// Ranks this catalog's conditions against `user_symptoms`.
    pub fn match_symptoms<S: AsRef<str>>(&self, user_symptoms: &[S]) -> Vec<DiagnosisResult> {
        matcher::match_symptoms(self.conditions(), user_symptoms)
    }
}

/// Index of the option labelled `label` (case-insensitive) among `options`.
pub(crate) fn position_of(options: &[OptionNode], label: &str) -> Option<usize> {
    let folded = fold(label);
    options
        .iter()
        .position(|option| option.label.folded() == folded)
}

/// Deserializes YAML, reporting schema errors with the failing field path.
fn parse_yaml<T: DeserializeOwned>(yaml_text: &str) -> CatalogResult<T> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let path = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        CatalogError::Schema {
            path,
            message: err.into_inner().to_string(),
        }
    })
}

fn text(context: &str, value: impl AsRef<str>) -> CatalogResult<NonEmptyText> {
    NonEmptyText::new(value).map_err(|source| CatalogError::InvalidText {
        context: context.to_string(),
        source,
    })
}

fn validate_forest(set: &'static str, nodes: &[OptionNode], flat: bool) -> CatalogResult<()> {
    fn check_siblings(set: &'static str, nodes: &[OptionNode]) -> CatalogResult<()> {
        let mut seen = HashSet::new();
        for node in nodes {
            if !seen.insert(node.label.folded()) {
                return Err(CatalogError::DuplicateLabel {
                    set,
                    label: node.label.to_string(),
                });
            }
            check_siblings(set, &node.children)?;
        }
        Ok(())
    }

    if nodes.is_empty() {
        return Err(CatalogError::EmptyOptionSet(set));
    }

    if flat {
        if let Some(nested) = nodes.iter().find(|node| !node.is_leaf()) {
            return Err(CatalogError::NestedOptions {
                set,
                label: nested.label.to_string(),
            });
        }
    }

    if nodes.iter().map(OptionNode::depth).max().unwrap_or(0) > MAX_OPTION_DEPTH {
        return Err(CatalogError::TooDeep {
            set,
            max: MAX_OPTION_DEPTH,
        });
    }

    check_siblings(set, nodes)
}
