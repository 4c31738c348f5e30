//! Questionnaire state machine.
//!
//! A [`Questionnaire`] holds the shared, read-only parts: catalog, configuration and
//! the stage sequence derived from them. Everything that changes while a user answers
//! lives in a [`SessionState`] value owned by the caller and passed to each operation.
//!
//! Operations either apply fully or return a [`SessionError`] and leave the state
//! untouched. `back` is destructive: the stage being left and the stage being
//! returned to both start empty again.
//!
//! In the forward-query variant, reaching `COMPLETE` yields a [`PendingRequest`]. The
//! caller resolves it against a responder and hands the [`ResponseOutcome`] to
//! [`Questionnaire::receive`]. Tickets are issued by the questionnaire, not stored in
//! the session, so a reset session equals a fresh one while late replies for a
//! superseded dispatch are still recognised and dropped.

use crate::catalog::{position_of, Catalog, OptionNode};
use crate::config::{QuestionnaireConfig, SymptomMode, TerminalAction};
use crate::error::{CatalogError, CatalogResult, SessionError, SessionResult};
use crate::matcher::{split_ranking, DiagnosisResult};
use crate::query::{
    format_query, DiagnosticReply, PendingRequest, RequestTicket, ResponseOutcome,
};
use crate::stage::Stage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use triage_types::{fold, NonEmptyText};

/// Chosen labels per stage, in selection order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Selections(BTreeMap<Stage, Vec<NonEmptyText>>);

impl Selections {
    /// Labels chosen at `stage`; empty if none.
    pub fn get(&self, stage: Stage) -> &[NonEmptyText] {
        self.0.get(&stage).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, stage: Stage, label: &str) -> bool {
        let folded = fold(label);
        self.get(stage).iter().any(|chosen| chosen.folded() == folded)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn push(&mut self, stage: Stage, label: NonEmptyText) {
        self.0.entry(stage).or_default().push(label);
    }

    pub(crate) fn set(&mut self, stage: Stage, labels: Vec<NonEmptyText>) {
        if labels.is_empty() {
            self.0.remove(&stage);
        } else {
            self.0.insert(stage, labels);
        }
    }

    pub(crate) fn clear(&mut self, stage: Stage) {
        self.0.remove(&stage);
    }

    fn remove(&mut self, stage: Stage, label: &str) -> bool {
        let folded = fold(label);
        let Some(labels) = self.0.get_mut(&stage) else {
            return false;
        };
        let before = labels.len();
        labels.retain(|chosen| chosen.folded() != folded);
        let removed = labels.len() != before;
        if labels.is_empty() {
            self.0.remove(&stage);
        }
        removed
    }
}

/// Where a forwarded query stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryStatus {
    Pending(RequestTicket),
    Answered(DiagnosticReply),
    Failed(String),
}

/// The forwarded query and its status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryState {
    pub query: String,
    pub status: QueryStatus,
}

/// Terminal data, present only at `COMPLETE`.
#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    Ranked(Vec<DiagnosisResult>),
    Forwarded(QueryState),
}

impl Completion {
    /// Best-ranked condition, if any matched.
    pub fn top_match(&self) -> Option<&DiagnosisResult> {
        match self {
            Self::Ranked(results) => split_ranking(results).0,
            Self::Forwarded(_) => None,
        }
    }

    /// Runners-up shown beneath the top match.
    pub fn secondary_matches(&self) -> &[DiagnosisResult] {
        match self {
            Self::Ranked(results) => split_ranking(results).1,
            Self::Forwarded(_) => &[],
        }
    }
}

/// Everything that changes while one user answers the questionnaire.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    stage: Stage,
    selections: Selections,
    /// Child indices from the symptom roots down to the current level.
    path: Vec<usize>,
    completion: Option<Completion>,
}

impl SessionState {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn selections(&self) -> &Selections {
        &self.selections
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }

    /// True while a forwarded query awaits its reply.
    pub fn is_pending(&self) -> bool {
        matches!(
            &self.completion,
            Some(Completion::Forwarded(QueryState {
                status: QueryStatus::Pending(_),
                ..
            }))
        )
    }
}

/// Result of an accepted operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Moved forward to the given stage.
    Advanced(Stage),
    /// Moved into a symptom branch; `depth` is the new path length.
    Descended { depth: usize },
    /// Moved out of a symptom branch; `depth` is the new path length.
    Ascended { depth: usize },
    /// Moved back to the given stage.
    Retreated(Stage),
    SymptomAdded { selected: usize },
    SymptomRemoved { selected: usize },
    /// Reached `COMPLETE` with a local ranking.
    Completed,
    /// Reached `COMPLETE`; the request must now be sent to the responder.
    Dispatched(PendingRequest),
}

/// What [`Questionnaire::receive`] did with a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Answered,
    Failed,
    /// The ticket no longer matches the session's pending request.
    Discarded,
}

/// The questionnaire definition shared by any number of sessions.
#[derive(Debug)]
pub struct Questionnaire {
    catalog: Arc<Catalog>,
    config: QuestionnaireConfig,
    stages: Vec<Stage>,
    last_ticket: AtomicU64,
}

const STAGE_ORDER: [Stage; 6] = [
    Stage::AgeGroup,
    Stage::Gender,
    Stage::Duration,
    Stage::Exposure,
    Stage::Symptoms,
    Stage::Complete,
];

impl Questionnaire {
    /// Builds a questionnaire over `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::HierarchicalSymptomsInFlatMode`] when a multi-select
    /// configuration is paired with a catalog whose symptoms have children.
    pub fn new(catalog: Arc<Catalog>, config: QuestionnaireConfig) -> CatalogResult<Self> {
        if config.symptom_mode == SymptomMode::MultiSelect && catalog.has_symptom_tree() {
            return Err(CatalogError::HierarchicalSymptomsInFlatMode);
        }

        let stages = STAGE_ORDER
            .into_iter()
            .filter(|stage| *stage == Stage::Complete || catalog.has_stage(*stage))
            .collect();

        Ok(Self {
            catalog,
            config,
            stages,
            last_ticket: AtomicU64::new(0),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> QuestionnaireConfig {
        self.config
    }

    /// Stage sequence for this catalog, ending in `COMPLETE`.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// A fresh session at the first stage.
    pub fn start(&self) -> SessionState {
        SessionState::default()
    }

    /// `(answered stages, interactive stages)`; equal once complete.
    pub fn progress(&self, state: &SessionState) -> (usize, usize) {
        (self.position(state.stage), self.stages.len() - 1)
    }

    /// Options currently on offer.
    ///
    /// Flat symptom mode hides symptoms already chosen; hierarchical mode offers the
    /// children addressed by the current path. Nothing is offered at `COMPLETE`.
    pub fn current_options(&self, state: &SessionState) -> Vec<&OptionNode> {
        match (state.stage, self.config.symptom_mode) {
            (Stage::Symptoms, SymptomMode::MultiSelect) => self
                .catalog
                .symptoms()
                .iter()
                .filter(|option| {
                    !state
                        .selections
                        .contains(Stage::Symptoms, option.label().as_str())
                })
                .collect(),
            (Stage::Symptoms, SymptomMode::Hierarchical) => {
                self.symptom_level(&state.path).iter().collect()
            }
            (stage, _) => self.catalog.options_for(stage).iter().collect(),
        }
    }

    /// Labels along the current symptom path, root first.
    pub fn current_path(&self, state: &SessionState) -> Vec<NonEmptyText> {
        self.path_labels(&state.path)
    }

    /// Chooses `label` from the options on offer.
    pub fn select(&self, state: &mut SessionState, label: &str) -> SessionResult<Transition> {
        Self::ensure_open(state)?;

        let stage = state.stage;
        if stage == Stage::Symptoms {
            return match self.config.symptom_mode {
                SymptomMode::MultiSelect => self.add_symptom(state, label),
                SymptomMode::Hierarchical => self.descend(state, label),
            };
        }

        let options = self.catalog.options_for(stage);
        let index = position_of(options, label).ok_or_else(|| not_offered(stage, label))?;
        state.selections.push(stage, options[index].label().clone());

        let next = self.next_stage(stage);
        state.stage = next;
        tracing::debug!(%stage, %next, label, "option selected");
        Ok(Transition::Advanced(next))
    }

    /// Passes over an optional stage without answering it.
    pub fn skip(&self, state: &mut SessionState) -> SessionResult<Transition> {
        Self::ensure_open(state)?;

        let stage = state.stage;
        if !stage.is_optional() {
            return Err(SessionError::SkipNotAllowed(stage));
        }

        let next = self.next_stage(stage);
        state.stage = next;
        tracing::debug!(%stage, %next, "stage skipped");
        Ok(Transition::Advanced(next))
    }

    /// Removes a chosen symptom in flat symptom mode.
    pub fn deselect(&self, state: &mut SessionState, label: &str) -> SessionResult<Transition> {
        Self::ensure_open(state)?;

        if state.stage != Stage::Symptoms
            || self.config.symptom_mode != SymptomMode::MultiSelect
            || !state.selections.remove(Stage::Symptoms, label)
        {
            return Err(SessionError::NotSelected(label.to_string()));
        }

        let selected = state.selections.get(Stage::Symptoms).len();
        tracing::debug!(label, selected, "symptom removed");
        Ok(Transition::SymptomRemoved { selected })
    }

    /// Completes flat symptom selection.
    pub fn finish(&self, state: &mut SessionState) -> SessionResult<Transition> {
        Self::ensure_open(state)?;

        if state.stage != Stage::Symptoms || self.config.symptom_mode != SymptomMode::MultiSelect {
            return Err(SessionError::FinishUnavailable);
        }
        if state.selections.get(Stage::Symptoms).is_empty() {
            return Err(SessionError::NoSymptomsSelected);
        }

        Ok(self.complete(state))
    }

    /// Steps back once.
    ///
    /// From `COMPLETE` this returns to the symptom stage and discards all terminal data,
    /// including any request in flight. Inside a symptom tree it leaves the current
    /// branch. Otherwise it returns to the previous stage with both stages cleared.
    pub fn back(&self, state: &mut SessionState) -> SessionResult<Transition> {
        match state.stage {
            Stage::Complete => {
                state.completion = None;
                state.stage = Stage::Symptoms;
                if self.config.symptom_mode == SymptomMode::Hierarchical {
                    // The leaf path would be appended again on the next leaf.
                    state.selections.clear(Stage::Symptoms);
                }
                tracing::debug!("completion discarded");
                Ok(Transition::Retreated(Stage::Symptoms))
            }
            Stage::Symptoms
                if self.config.symptom_mode == SymptomMode::Hierarchical
                    && !state.path.is_empty() =>
            {
                state.path.pop();
                Ok(Transition::Ascended {
                    depth: state.path.len(),
                })
            }
            stage => {
                let position = self.position(stage);
                if position == 0 {
                    return Err(SessionError::AtFirstStage);
                }

                let previous = self.stages[position - 1];
                state.selections.clear(stage);
                state.selections.clear(previous);
                state.path.clear();
                state.stage = previous;
                tracing::debug!(from = %stage, to = %previous, "stepped back");
                Ok(Transition::Retreated(previous))
            }
        }
    }

    /// Wipes the session back to its initial value.
    pub fn reset(&self, state: &mut SessionState) {
        *state = self.start();
        tracing::debug!("session reset");
    }

    /// Applies a responder outcome if it answers the session's pending request.
    pub fn receive(&self, state: &mut SessionState, outcome: ResponseOutcome) -> Delivery {
        let Some(Completion::Forwarded(query)) = state.completion.as_mut() else {
            tracing::warn!(
                ticket = %outcome.ticket,
                "reply for a session with no forwarded query discarded"
            );
            return Delivery::Discarded;
        };

        if query.status != QueryStatus::Pending(outcome.ticket) {
            tracing::warn!(ticket = %outcome.ticket, "stale reply discarded");
            return Delivery::Discarded;
        }

        match outcome.result {
            Ok(reply) => {
                tracing::info!(
                    ticket = %outcome.ticket,
                    total_tokens = reply.usage.total_tokens,
                    "diagnostic reply received"
                );
                query.status = QueryStatus::Answered(reply);
                Delivery::Answered
            }
            Err(message) => {
                tracing::warn!(ticket = %outcome.ticket, %message, "diagnostic request failed");
                query.status = QueryStatus::Failed(message);
                Delivery::Failed
            }
        }
    }

    /// Re-issues a failed query under a new ticket.
    pub fn retry(&self, state: &mut SessionState) -> SessionResult<PendingRequest> {
        match state.completion.as_mut() {
            Some(Completion::Forwarded(query))
                if matches!(query.status, QueryStatus::Failed(_)) =>
            {
                let ticket = self.issue_ticket();
                query.status = QueryStatus::Pending(ticket);
                tracing::info!(%ticket, "diagnostic request retried");
                Ok(PendingRequest {
                    ticket,
                    query: query.query.clone(),
                })
            }
            _ => Err(SessionError::NothingToRetry),
        }
    }

    fn ensure_open(state: &SessionState) -> SessionResult<()> {
        if state.is_pending() {
            return Err(SessionError::RequestInFlight);
        }
        if state.is_complete() {
            return Err(SessionError::AlreadyComplete);
        }
        Ok(())
    }

    fn add_symptom(&self, state: &mut SessionState, label: &str) -> SessionResult<Transition> {
        let symptoms = self.catalog.symptoms();
        let index =
            position_of(symptoms, label).ok_or_else(|| not_offered(Stage::Symptoms, label))?;
        let chosen = symptoms[index].label();
        if state.selections.contains(Stage::Symptoms, chosen.as_str()) {
            return Err(SessionError::AlreadySelected(chosen.to_string()));
        }

        state.selections.push(Stage::Symptoms, chosen.clone());
        let selected = state.selections.get(Stage::Symptoms).len();
        tracing::debug!(label = %chosen, selected, "symptom added");
        Ok(Transition::SymptomAdded { selected })
    }

    fn descend(&self, state: &mut SessionState, label: &str) -> SessionResult<Transition> {
        let level = self.symptom_level(&state.path);
        let index = position_of(level, label).ok_or_else(|| not_offered(Stage::Symptoms, label))?;
        let node = &level[index];

        if !node.is_leaf() {
            state.path.push(index);
            tracing::debug!(label = %node.label(), depth = state.path.len(), "descended");
            return Ok(Transition::Descended {
                depth: state.path.len(),
            });
        }

        let mut labels = self.path_labels(&state.path);
        labels.push(node.label().clone());
        state.selections.set(Stage::Symptoms, labels);
        Ok(self.complete(state))
    }

    fn complete(&self, state: &mut SessionState) -> Transition {
        state.stage = Stage::Complete;

        match self.config.terminal {
            TerminalAction::LocalMatch => {
                let results = self
                    .catalog
                    .match_symptoms(state.selections.get(Stage::Symptoms));
                tracing::info!(candidates = results.len(), "questionnaire complete");
                state.completion = Some(Completion::Ranked(results));
                Transition::Completed
            }
            TerminalAction::ForwardQuery => {
                let query = format_query(&state.selections);
                let ticket = self.issue_ticket();
                tracing::info!(%ticket, "questionnaire complete, query ready");
                state.completion = Some(Completion::Forwarded(QueryState {
                    query: query.clone(),
                    status: QueryStatus::Pending(ticket),
                }));
                Transition::Dispatched(PendingRequest { ticket, query })
            }
        }
    }

    fn symptom_level(&self, path: &[usize]) -> &[OptionNode] {
        path.iter()
            .try_fold(self.catalog.symptoms(), |level, &index| {
                level.get(index).map(OptionNode::children)
            })
            .unwrap_or_default()
    }

    fn path_labels(&self, path: &[usize]) -> Vec<NonEmptyText> {
        let mut level = self.catalog.symptoms();
        let mut labels = Vec::with_capacity(path.len());
        for &index in path {
            let Some(node) = level.get(index) else {
                break;
            };
            labels.push(node.label().clone());
            level = node.children();
        }
        labels
    }

    fn position(&self, stage: Stage) -> usize {
        self.stages
            .iter()
            .position(|candidate| *candidate == stage)
            .unwrap_or(0)
    }

    fn next_stage(&self, stage: Stage) -> Stage {
        self.stages
            .get(self.position(stage) + 1)
            .copied()
            .unwrap_or(Stage::Complete)
    }

    fn issue_ticket(&self) -> RequestTicket {
        RequestTicket(self.last_ticket.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

fn not_offered(stage: Stage, label: &str) -> SessionError {
    SessionError::NotOffered {
        stage,
        label: label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{flat_options, CatalogData, Condition};
    use crate::query::TokenUsage;

    fn flat() -> Questionnaire {
        let catalog = Catalog::builtin().expect("builtin catalog");
        Questionnaire::new(Arc::new(catalog), QuestionnaireConfig::local_match())
            .expect("questionnaire")
    }

    fn tree() -> Questionnaire {
        let catalog = Catalog::builtin_hierarchical().expect("builtin catalog");
        Questionnaire::new(Arc::new(catalog), QuestionnaireConfig::forward_query())
            .expect("questionnaire")
    }

    fn labels(values: &[NonEmptyText]) -> Vec<&str> {
        values.iter().map(NonEmptyText::as_str).collect()
    }

    fn reply(text: &str) -> DiagnosticReply {
        DiagnosticReply {
            text: text.to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            },
        }
    }

    /// Answers age and gender, then descends to a leaf and returns the request.
    fn dispatch(q: &Questionnaire, state: &mut SessionState) -> PendingRequest {
        q.select(state, "Child (4-12 years)").expect("age");
        q.select(state, "Male").expect("gender");
        q.select(state, "4-7 days").expect("duration");
        q.skip(state).expect("exposure");
        q.select(state, "General").expect("branch");
        match q.select(state, "Fever").expect("leaf") {
            Transition::Dispatched(request) => request,
            other => panic!("expected Dispatched, got {other:?}"),
        }
    }

    #[test]
    fn stage_sequence_follows_catalog() {
        assert_eq!(
            flat().stages(),
            &[Stage::AgeGroup, Stage::Gender, Stage::Symptoms, Stage::Complete]
        );
        assert_eq!(
            tree().stages(),
            &[
                Stage::AgeGroup,
                Stage::Gender,
                Stage::Duration,
                Stage::Exposure,
                Stage::Symptoms,
                Stage::Complete
            ]
        );
    }

    #[test]
    fn multi_select_rejects_symptom_tree() {
        let catalog = Catalog::builtin_hierarchical().expect("builtin catalog");
        let err = Questionnaire::new(Arc::new(catalog), QuestionnaireConfig::local_match())
            .expect_err("should reject");
        assert_eq!(err, CatalogError::HierarchicalSymptomsInFlatMode);
    }

    #[test]
    fn flat_walkthrough_ranks_conditions() {
        let q = flat();
        let mut state = q.start();

        assert_eq!(
            q.select(&mut state, "young adult (18-35 years)"),
            Ok(Transition::Advanced(Stage::Gender))
        );
        assert_eq!(
            q.select(&mut state, "Female"),
            Ok(Transition::Advanced(Stage::Symptoms))
        );
        assert_eq!(
            labels(state.selections().get(Stage::AgeGroup)),
            vec!["Young Adult (18-35 years)"]
        );

        assert_eq!(q.finish(&mut state), Err(SessionError::NoSymptomsSelected));

        for (count, symptom) in ["Fever", "Chills", "Muscle and joint pain"].iter().enumerate() {
            assert_eq!(
                q.select(&mut state, symptom),
                Ok(Transition::SymptomAdded { selected: count + 1 })
            );
        }
        assert_eq!(state.stage(), Stage::Symptoms);

        assert_eq!(q.finish(&mut state), Ok(Transition::Completed));
        assert!(state.is_complete());

        let completion = state.completion().expect("completion stored");
        let malaria = match completion {
            Completion::Ranked(results) => results
                .iter()
                .find(|r| r.condition_name == "Malaria")
                .expect("malaria ranked"),
            other => panic!("expected ranking, got {other:?}"),
        };
        assert_eq!(malaria.match_percentage, 60.0);
        assert!(completion.top_match().is_some());
        assert!(completion.secondary_matches().len() <= 3);
    }

    #[test]
    fn rejected_actions_leave_state_untouched() {
        let q = flat();
        let mut state = q.start();

        assert_eq!(q.back(&mut state), Err(SessionError::AtFirstStage));
        assert_eq!(
            q.select(&mut state, "Martian"),
            Err(SessionError::NotOffered {
                stage: Stage::AgeGroup,
                label: "Martian".into()
            })
        );
        assert_eq!(q.skip(&mut state), Err(SessionError::SkipNotAllowed(Stage::AgeGroup)));
        assert_eq!(q.finish(&mut state), Err(SessionError::FinishUnavailable));
        assert_eq!(state, q.start());

        q.select(&mut state, "Infant (0-1 year)").expect("age");
        q.select(&mut state, "Male").expect("gender");
        q.select(&mut state, "Fever").expect("symptom");
        let before = state.clone();
        assert_eq!(
            q.select(&mut state, "FEVER"),
            Err(SessionError::AlreadySelected("Fever".into()))
        );
        assert_eq!(
            q.deselect(&mut state, "Chills"),
            Err(SessionError::NotSelected("Chills".into()))
        );
        assert_eq!(state, before);
    }

    #[test]
    fn selected_symptoms_are_hidden_and_can_be_removed() {
        let q = flat();
        let mut state = q.start();
        q.select(&mut state, "Child (4-12 years)").expect("age");
        q.select(&mut state, "Male").expect("gender");

        assert_eq!(q.current_options(&state).len(), 34);
        q.select(&mut state, "Fever").expect("symptom");
        q.select(&mut state, "Chills").expect("symptom");
        let offered = q.current_options(&state);
        assert_eq!(offered.len(), 32);
        assert!(offered.iter().all(|o| o.label().as_str() != "Fever"));

        assert_eq!(
            q.deselect(&mut state, "fever"),
            Ok(Transition::SymptomRemoved { selected: 1 })
        );
        assert_eq!(labels(state.selections().get(Stage::Symptoms)), vec!["Chills"]);
        assert_eq!(q.current_options(&state).len(), 33);
    }

    #[test]
    fn back_is_destructive() {
        let q = flat();
        let mut state = q.start();
        q.select(&mut state, "Child (4-12 years)").expect("age");
        q.select(&mut state, "Male").expect("gender");
        q.select(&mut state, "Fever").expect("symptom");

        assert_eq!(q.back(&mut state), Ok(Transition::Retreated(Stage::Gender)));
        assert!(state.selections().get(Stage::Symptoms).is_empty());
        assert!(state.selections().get(Stage::Gender).is_empty());
        assert_eq!(
            labels(state.selections().get(Stage::AgeGroup)),
            vec!["Child (4-12 years)"]
        );

        assert_eq!(q.back(&mut state), Ok(Transition::Retreated(Stage::AgeGroup)));
        assert_eq!(state, q.start());
    }

    #[test]
    fn back_from_complete_clears_ranking_and_keeps_flat_symptoms() {
        let q = flat();
        let mut state = q.start();
        q.select(&mut state, "Child (4-12 years)").expect("age");
        q.select(&mut state, "Male").expect("gender");
        q.select(&mut state, "Fever").expect("symptom");
        q.finish(&mut state).expect("finish");

        assert_eq!(q.select(&mut state, "Chills"), Err(SessionError::AlreadyComplete));
        assert_eq!(q.back(&mut state), Ok(Transition::Retreated(Stage::Symptoms)));
        assert_eq!(state.stage(), Stage::Symptoms);
        assert!(state.completion().is_none());
        assert_eq!(labels(state.selections().get(Stage::Symptoms)), vec!["Fever"]);
    }

    #[test]
    fn progress_counts_interactive_stages() {
        let q = flat();
        let mut state = q.start();
        assert_eq!(q.progress(&state), (0, 3));
        q.select(&mut state, "Child (4-12 years)").expect("age");
        assert_eq!(q.progress(&state), (1, 3));
        q.select(&mut state, "Male").expect("gender");
        q.select(&mut state, "Fever").expect("symptom");
        q.finish(&mut state).expect("finish");
        assert_eq!(q.progress(&state), (3, 3));
    }

    #[test]
    fn branch_descends_and_leaf_completes_with_full_path() {
        let q = tree();
        let mut state = q.start();
        q.select(&mut state, "Adolescent (13-17 years)").expect("age");
        q.select(&mut state, "Female").expect("gender");
        q.skip(&mut state).expect("duration");
        assert_eq!(
            q.select(&mut state, "Mosquito bites"),
            Ok(Transition::Advanced(Stage::Symptoms))
        );

        assert_eq!(q.current_options(&state).len(), 7);
        assert_eq!(
            q.select(&mut state, "Digestive"),
            Ok(Transition::Descended { depth: 1 })
        );
        assert_eq!(q.select(&mut state, "Pain"), Ok(Transition::Descended { depth: 2 }));
        assert_eq!(state.stage(), Stage::Symptoms);
        assert_eq!(
            labels(&q.current_path(&state)),
            vec!["Digestive", "Pain"]
        );
        assert_eq!(state.path(), &[3, 0]);

        let request = match q.select(&mut state, "Abdominal cramps").expect("leaf") {
            Transition::Dispatched(request) => request,
            other => panic!("expected Dispatched, got {other:?}"),
        };
        assert!(state.is_complete());
        assert!(state.is_pending());
        assert_eq!(
            labels(state.selections().get(Stage::Symptoms)),
            vec!["Digestive", "Pain", "Abdominal cramps"]
        );
        assert_eq!(
            request.query,
            "I am a patient in the Adolescent (13-17 years) age group, gender Female, \
             experiencing Digestive and Pain and Abdominal cramps for an unspecified duration. \
             I have recently been exposed to Mosquito bites. What could be the possible diagnosis?"
        );
    }

    #[test]
    fn back_in_tree_pops_one_level_then_leaves_stage() {
        let q = tree();
        let mut state = q.start();
        q.select(&mut state, "Child (4-12 years)").expect("age");
        q.select(&mut state, "Male").expect("gender");
        q.skip(&mut state).expect("duration");
        q.skip(&mut state).expect("exposure");
        q.select(&mut state, "Digestive").expect("branch");
        q.select(&mut state, "Pain").expect("branch");

        assert_eq!(q.back(&mut state), Ok(Transition::Ascended { depth: 1 }));
        assert_eq!(q.back(&mut state), Ok(Transition::Ascended { depth: 0 }));
        assert_eq!(q.back(&mut state), Ok(Transition::Retreated(Stage::Exposure)));
        assert_eq!(state.stage(), Stage::Exposure);
    }

    #[test]
    fn tree_leaf_path_goes_to_local_matcher_when_configured() {
        let catalog = Catalog::builtin_hierarchical().expect("builtin catalog");
        let config =
            QuestionnaireConfig::new(SymptomMode::Hierarchical, TerminalAction::LocalMatch);
        let q = Questionnaire::new(Arc::new(catalog), config).expect("questionnaire");
        let mut state = q.start();
        q.select(&mut state, "Child (4-12 years)").expect("age");
        q.select(&mut state, "Male").expect("gender");
        q.skip(&mut state).expect("duration");
        q.skip(&mut state).expect("exposure");
        q.select(&mut state, "Muscles and joints").expect("branch");

        assert_eq!(
            q.select(&mut state, "Muscle cramps"),
            Ok(Transition::Completed)
        );
        let top = state
            .completion()
            .and_then(Completion::top_match)
            .expect("top match");
        assert_eq!(top.condition_name, "Cholera");
        assert_eq!(top.match_percentage, 25.0);
    }

    #[test]
    fn tree_local_match_ranks_every_builtin_condition() {
        let catalog = Catalog::builtin_hierarchical().expect("builtin catalog");
        let config =
            QuestionnaireConfig::new(SymptomMode::Hierarchical, TerminalAction::LocalMatch);
        let q = Questionnaire::new(Arc::new(catalog), config).expect("questionnaire");
        let mut state = q.start();
        q.select(&mut state, "Young Adult (18-35 years)").expect("age");
        q.select(&mut state, "Female").expect("gender");
        q.skip(&mut state).expect("duration");
        q.skip(&mut state).expect("exposure");
        q.select(&mut state, "Skin").expect("branch");

        assert_eq!(q.select(&mut state, "Raised bumps"), Ok(Transition::Completed));
        let completion = state.completion().expect("completion");
        let top = completion.top_match().expect("top match");
        assert_eq!(top.condition_name, "Smallpox");
        assert_eq!(top.display_percentage(), "33.3");
        assert_eq!(top.matched_symptoms, vec!["raised bumps"]);
        assert!(completion.secondary_matches().is_empty());
    }

    #[test]
    fn flat_forward_query_rejects_finish_and_deselect_while_pending() {
        let catalog = Catalog::builtin().expect("builtin catalog");
        let config =
            QuestionnaireConfig::new(SymptomMode::MultiSelect, TerminalAction::ForwardQuery);
        let q = Questionnaire::new(Arc::new(catalog), config).expect("questionnaire");
        let mut state = q.start();
        q.select(&mut state, "Young Adult (18-35 years)").expect("age");
        q.select(&mut state, "Female").expect("gender");
        q.select(&mut state, "Fever").expect("symptom");
        q.select(&mut state, "Chills").expect("symptom");

        let request = match q.finish(&mut state).expect("finish") {
            Transition::Dispatched(request) => request,
            other => panic!("expected Dispatched, got {other:?}"),
        };
        assert!(request
            .query
            .contains("experiencing Fever and Chills for an unspecified duration."));
        assert!(state.is_pending());

        let before = state.clone();
        assert_eq!(q.finish(&mut state), Err(SessionError::RequestInFlight));
        assert_eq!(
            q.deselect(&mut state, "Fever"),
            Err(SessionError::RequestInFlight)
        );
        assert_eq!(
            q.select(&mut state, "Headache"),
            Err(SessionError::RequestInFlight)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn receive_stores_reply_for_current_ticket() {
        let q = tree();
        let mut state = q.start();
        let request = dispatch(&q, &mut state);

        assert_eq!(q.select(&mut state, "Fever"), Err(SessionError::RequestInFlight));
        assert_eq!(q.skip(&mut state), Err(SessionError::RequestInFlight));

        let delivery = q.receive(
            &mut state,
            ResponseOutcome {
                ticket: request.ticket,
                result: Ok(reply("Possibly malaria.")),
            },
        );
        assert_eq!(delivery, Delivery::Answered);
        assert!(!state.is_pending());
        match state.completion() {
            Some(Completion::Forwarded(QueryState {
                status: QueryStatus::Answered(answer),
                ..
            })) => assert_eq!(answer.text, "Possibly malaria."),
            other => panic!("expected answered query, got {other:?}"),
        }

        // A second delivery for the same ticket is no longer pending.
        let delivery = q.receive(
            &mut state,
            ResponseOutcome {
                ticket: request.ticket,
                result: Ok(reply("duplicate")),
            },
        );
        assert_eq!(delivery, Delivery::Discarded);
    }

    #[test]
    fn failure_keeps_selections_and_retry_reuses_query() {
        let q = tree();
        let mut state = q.start();
        let request = dispatch(&q, &mut state);
        let selections = state.selections().clone();

        assert_eq!(q.retry(&mut state), Err(SessionError::NothingToRetry));

        let delivery = q.receive(
            &mut state,
            ResponseOutcome {
                ticket: request.ticket,
                result: Err("responder returned HTTP 503".into()),
            },
        );
        assert_eq!(delivery, Delivery::Failed);
        assert_eq!(state.selections(), &selections);
        assert!(matches!(
            state.completion(),
            Some(Completion::Forwarded(QueryState {
                status: QueryStatus::Failed(message),
                ..
            })) if message.contains("503")
        ));

        let retried = q.retry(&mut state).expect("retry");
        assert_eq!(retried.query, request.query);
        assert_ne!(retried.ticket, request.ticket);
        assert!(state.is_pending());

        // The failed dispatch's ticket no longer counts.
        let late = q.receive(
            &mut state,
            ResponseOutcome {
                ticket: request.ticket,
                result: Ok(reply("late")),
            },
        );
        assert_eq!(late, Delivery::Discarded);
        assert!(state.is_pending());
    }

    #[test]
    fn back_from_complete_discards_pending_request() {
        let q = tree();
        let mut state = q.start();
        let request = dispatch(&q, &mut state);

        assert_eq!(q.back(&mut state), Ok(Transition::Retreated(Stage::Symptoms)));
        assert!(state.completion().is_none());
        assert!(state.selections().get(Stage::Symptoms).is_empty());
        assert_eq!(labels(&q.current_path(&state)), vec!["General"]);

        let late = q.receive(
            &mut state,
            ResponseOutcome {
                ticket: request.ticket,
                result: Ok(reply("late")),
            },
        );
        assert_eq!(late, Delivery::Discarded);
        assert!(state.completion().is_none());
    }

    #[test]
    fn reset_matches_fresh_session_and_late_reply_is_dropped() {
        let q = tree();
        let mut state = q.start();
        let request = dispatch(&q, &mut state);

        q.reset(&mut state);
        assert_eq!(state, q.start());

        // Redo the questionnaire; the new dispatch gets a different ticket.
        let second = dispatch(&q, &mut state);
        assert_ne!(second.ticket, request.ticket);
        let late = q.receive(
            &mut state,
            ResponseOutcome {
                ticket: request.ticket,
                result: Ok(reply("for the old session")),
            },
        );
        assert_eq!(late, Delivery::Discarded);
        assert!(state.is_pending());
    }

    #[test]
    fn reset_from_any_stage_equals_fresh_session() {
        let q = flat();
        let mut state = q.start();
        q.reset(&mut state);
        assert_eq!(state, q.start());

        q.select(&mut state, "Child (4-12 years)").expect("age");
        q.reset(&mut state);
        assert_eq!(state, q.start());

        q.select(&mut state, "Child (4-12 years)").expect("age");
        q.select(&mut state, "Male").expect("gender");
        q.select(&mut state, "Fever").expect("symptom");
        q.finish(&mut state).expect("finish");
        q.reset(&mut state);
        assert_eq!(state, q.start());
    }

    #[test]
    fn custom_catalog_without_conditions_completes_with_empty_ranking() {
        let data = CatalogData {
            age_groups: flat_options(["Adult"]).expect("options"),
            genders: flat_options(["Female"]).expect("options"),
            durations: None,
            exposures: None,
            symptoms: flat_options(["Itching"]).expect("options"),
            conditions: vec![Condition::new("Flu", ["fever"]).expect("condition")],
        };
        let q = Questionnaire::new(
            Arc::new(Catalog::new(data).expect("catalog")),
            QuestionnaireConfig::local_match(),
        )
        .expect("questionnaire");
        let mut state = q.start();
        q.select(&mut state, "Adult").expect("age");
        q.select(&mut state, "Female").expect("gender");
        q.select(&mut state, "Itching").expect("symptom");
        q.finish(&mut state).expect("finish");

        let completion = state.completion().expect("completion");
        assert_eq!(completion, &Completion::Ranked(Vec::new()));
        assert!(completion.top_match().is_none());
    }
}
