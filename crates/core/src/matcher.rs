//! Symptom matching.
//!
//! Every condition is scored by the share of its own required symptoms the user
//! reported: `100 * |matched| / |required|`. The denominator is the condition's
//! symptom count, not the user's, so a small condition hit by one symptom outranks
//! a large condition hit by the same symptom.
//!
//! Comparison is exact string equality after trimming and lower-casing. Conditions
//! with no overlap are left out entirely. Ties keep catalog order.

use crate::catalog::Condition;
use crate::constants::SECONDARY_MATCH_LIMIT;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use triage_types::fold;

/// One ranked candidate condition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub condition_name: String,
    /// Full precision; use [`DiagnosisResult::display_percentage`] for display.
    pub match_percentage: f64,
    /// Matched required symptoms, authored case, in the order the user reported them.
    pub matched_symptoms: Vec<String>,
    pub total_symptoms: usize,
}

impl DiagnosisResult {
    /// Match percentage rounded to one decimal place, e.g. `"60.0"`.
    pub fn display_percentage(&self) -> String {
        format!("{:.1}", self.match_percentage)
    }
}

/// Ranks `conditions` against `user_symptoms`, best match first.
///
/// Empty input yields an empty ranking.
pub fn match_symptoms<S: AsRef<str>>(
    conditions: &[Condition],
    user_symptoms: &[S],
) -> Vec<DiagnosisResult> {
    let reported = normalize(user_symptoms);
    if reported.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<DiagnosisResult> = conditions
        .iter()
        .filter_map(|condition| score(condition, &reported))
        .collect();

    // `sort_by` is stable, so equal percentages keep catalog order.
    results.sort_by(|a, b| b.match_percentage.total_cmp(&a.match_percentage));

    tracing::debug!(
        reported = reported.len(),
        candidates = results.len(),
        "ranked conditions"
    );

    results
}

/// The top match followed by up to [`SECONDARY_MATCH_LIMIT`] runners-up.
pub fn split_ranking(
    results: &[DiagnosisResult],
) -> (Option<&DiagnosisResult>, &[DiagnosisResult]) {
    match results.split_first() {
        Some((top, rest)) => (Some(top), &rest[..rest.len().min(SECONDARY_MATCH_LIMIT)]),
        None => (None, &[]),
    }
}

/// Lower-cases and trims each symptom, keeping the first occurrence of duplicates.
fn normalize<S: AsRef<str>>(user_symptoms: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    user_symptoms
        .iter()
        .map(|symptom| fold(symptom.as_ref()))
        .filter(|symptom| !symptom.is_empty() && seen.insert(symptom.clone()))
        .collect()
}

fn score(condition: &Condition, reported: &[String]) -> Option<DiagnosisResult> {
    let matched_symptoms: Vec<String> = reported
        .iter()
        .filter_map(|symptom| condition.find_symptom(symptom))
        .map(|symptom| symptom.to_string())
        .collect();

    if matched_symptoms.is_empty() {
        return None;
    }

    let total_symptoms = condition.required_symptoms().len();
    let match_percentage = 100.0 * matched_symptoms.len() as f64 / total_symptoms as f64;

    Some(DiagnosisResult {
        condition_name: condition.name().to_string(),
        match_percentage,
        matched_symptoms,
        total_symptoms,
    })
}
