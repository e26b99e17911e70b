//! The workflow controller: sole owner of step, round, history and result state.
//!
//! Every user action is one method. Mutating methods take `&mut self`, so at
//! most one of them can be in flight on a controller at a time. Asynchronous
//! actions enter their loading step (and broadcast it) before awaiting the
//! collaborator, then apply all follow-up mutations synchronously once it
//! resolves.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::core::history::{HistoryEntry, HistoryLedger};
use crate::core::round::RoundState;
use crate::core::step::{Action, Step};
use crate::core::types::{Candidate, ContextBundle, FormInput, PublishReceipt, Side};
use crate::core::validation;
use crate::error::WorkflowError;
use crate::events::{EVENT_CAPACITY, WorkflowEvent};
use crate::io::services::{PublishRequest, Services};

/// Placeholder shown where the selected candidate's text would go.
pub const NO_SELECTION_TEXT: &str = "select a candidate";

/// Everything one workflow run owns. Replaced wholesale on restart.
#[derive(Debug, Clone, Default, PartialEq)]
struct WorkflowState {
    step: Step,
    form: FormInput,
    context: ContextBundle,
    round: RoundState,
    history: HistoryLedger,
    final_result: Option<Candidate>,
    error: Option<String>,
    refinement_text: String,
    loading: bool,
    publishing: bool,
    receipt: Option<PublishReceipt>,
}

/// Read-only view of controller state for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub step: Step,
    pub label: &'static str,
    pub ordinal: u8,
    pub progress: f64,
    pub progress_text: String,
    pub form: FormInput,
    pub context: ContextBundle,
    pub round: RoundState,
    pub selected_text: String,
    pub history: HistoryLedger,
    pub final_result: Option<Candidate>,
    pub error: Option<String>,
    pub refinement_text: String,
    pub loading: bool,
    pub publishing: bool,
    pub receipt: Option<PublishReceipt>,
}

pub struct WorkflowController {
    services: Services,
    events: broadcast::Sender<WorkflowEvent>,
    state: WorkflowState,
}

impl WorkflowController {
    pub fn new(services: Services) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            services,
            events,
            state: WorkflowState::default(),
        }
    }

    /// Subscribe to state change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    /// Sender half, for consumers that subscribe later without holding the controller.
    pub fn event_sender(&self) -> broadcast::Sender<WorkflowEvent> {
        self.events.clone()
    }

    // --- Entry: context acquisition -------------------------------------------------

    /// Validate the form, fetch context, then either stop at the review step or,
    /// when retrieval found nothing, continue straight into generation.
    pub async fn fetch_context(&mut self, form: FormInput) -> Result<(), WorkflowError> {
        self.begin(Action::FetchContext)?;
        self.state.form = form;
        if let Err(missing) = validation::validate(&self.state.form) {
            debug!(field = missing.name(), "form rejected");
            return Err(self.fail(missing.into()));
        }

        self.enter_busy(Action::FetchContext);
        self.transition(Step::LoadingContext);
        info!(url = %self.state.form.url, "fetching context");
        let fetched = self.services.context.fetch(&self.state.form).await;

        let outcome = match fetched {
            Ok(bundle) => {
                info!(
                    matches = bundle.retrieval_matches.len(),
                    similar = bundle.similar_posts.len(),
                    "context fetched"
                );
                self.state.context = bundle;
                if self.state.context.has_matches() {
                    self.transition(Step::ReviewContext);
                    Ok(())
                } else {
                    debug!("no retrieval matches, skipping review");
                    self.generate(Action::FetchContext, Step::EnterInfo).await
                }
            }
            Err(err) => {
                self.transition(Step::EnterInfo);
                Err(self.fail(WorkflowError::service(Action::FetchContext, &err)))
            }
        };
        self.leave_busy(Action::FetchContext);
        outcome
    }

    // --- Generation -----------------------------------------------------------------

    /// Generate the first candidate pair after the user reviewed the context.
    pub async fn proceed_to_generation(&mut self) -> Result<(), WorkflowError> {
        self.begin(Action::ProceedToGeneration)?;
        self.enter_busy(Action::ProceedToGeneration);
        let outcome = self
            .generate(Action::ProceedToGeneration, Step::ReviewContext)
            .await;
        self.leave_busy(Action::ProceedToGeneration);
        outcome
    }

    /// Shared generation path. `fallback` is where a failure routes to: the
    /// review step for an explicit continuation, the entry step when review was
    /// skipped (the review screen was never shown).
    async fn generate(&mut self, action: Action, fallback: Step) -> Result<(), WorkflowError> {
        self.transition(Step::LoadingGeneration);
        info!(
            matches = self.state.context.retrieval_matches.len(),
            "generating candidates"
        );
        let generated = self
            .services
            .generation
            .generate(&self.state.form, &self.state.context)
            .await;

        match generated {
            Ok(pair) => {
                self.state.round = RoundState::first(pair);
                self.emit(WorkflowEvent::RoundOpened { round: 1 });
                self.transition(Step::CompareCandidates);
                Ok(())
            }
            Err(err) => {
                self.transition(fallback);
                Err(self.fail(WorkflowError::service(action, &err)))
            }
        }
    }

    // --- Comparison -----------------------------------------------------------------

    pub fn select_candidate(&mut self, side: Side) -> Result<(), WorkflowError> {
        self.begin(Action::SelectCandidate)?;
        self.state.round.select(side);
        debug!(round = self.state.round.number(), side = %side, "candidate selected");
        Ok(())
    }

    /// Close the round and open the refinement step.
    pub fn proceed_to_refinement(&mut self) -> Result<(), WorkflowError> {
        self.begin(Action::ProceedToRefinement)?;
        self.close_round()?;
        self.state.refinement_text.clear();
        self.transition(Step::Refine);
        Ok(())
    }

    /// Close the round and take its selection as the final result.
    pub fn finalize_selection(&mut self) -> Result<(), WorkflowError> {
        self.begin(Action::FinalizeSelection)?;
        let selected = self.close_round()?;
        self.state.final_result = Some(selected);
        self.transition(Step::Confirm);
        Ok(())
    }

    /// Snapshot the current round into the ledger; returns the selected candidate.
    fn close_round(&mut self) -> Result<Candidate, WorkflowError> {
        let Some(entry) = HistoryEntry::close(&self.state.round) else {
            return Err(self.fail(WorkflowError::Selection));
        };
        let round = entry.round();
        let selected = entry.selected();
        let candidate = entry.selected_candidate().clone();
        self.state.history.close_round(entry);
        debug!(round, entries = self.state.history.len(), "round closed");
        self.emit(WorkflowEvent::RoundClosed { round, selected });
        Ok(candidate)
    }

    // --- Refinement -----------------------------------------------------------------

    /// Ask for a refined pair based on the candidate selected in the round that
    /// was just closed.
    ///
    /// On success the request is recorded on that round's history entry in the
    /// same synchronous step that opens the next round.
    pub async fn refine_post(&mut self, request: impl Into<String>) -> Result<(), WorkflowError> {
        self.begin(Action::RefinePost)?;
        let round = self.state.round.number();
        let closed_this_round = self.state.history.last().map(HistoryEntry::round) == Some(round);
        let selected_text = match self.state.round.selected_candidate() {
            Some(candidate) if closed_this_round => candidate.text.clone(),
            _ => return Err(self.fail(WorkflowError::Selection)),
        };
        self.state.refinement_text = request.into();

        self.enter_busy(Action::RefinePost);
        info!(round, request = %self.state.refinement_text, "refining candidate");
        let refined = self
            .services
            .refinement
            .refine(&selected_text, &self.state.refinement_text, round)
            .await;
        self.leave_busy(Action::RefinePost);

        let pair = match refined {
            Ok(pair) => pair,
            Err(err) => return Err(self.fail(WorkflowError::service(Action::RefinePost, &err))),
        };

        let request = std::mem::take(&mut self.state.refinement_text);
        if let Err(reason) = self.state.history.amend_last_request(round, &request) {
            warn!(round, reason = %reason, "refinement request not recorded");
            self.state.refinement_text = request;
            return Err(self.fail(WorkflowError::Selection));
        }
        self.state.round.advance(pair);
        let next = self.state.round.number();
        self.emit(WorkflowEvent::RoundOpened { round: next });
        self.transition(Step::CompareCandidates);
        Ok(())
    }

    /// Hold draft refinement text between keystrokes. Cleared when refinement
    /// opens or is left via `go_back`.
    pub fn set_refinement_text(&mut self, text: impl Into<String>) {
        self.state.refinement_text = text.into();
    }

    /// Stop refining and take the selection made before entering refinement.
    pub fn skip_refinement(&mut self) -> Result<(), WorkflowError> {
        self.begin(Action::SkipRefinement)?;
        let Some(selected) = self.state.round.selected_candidate().cloned() else {
            return Err(self.fail(WorkflowError::Selection));
        };
        self.state.final_result = Some(selected);
        self.transition(Step::Confirm);
        Ok(())
    }

    // --- Confirmation ---------------------------------------------------------------

    /// Publish the final result together with the history and context. A
    /// failure leaves the controller on the confirmation step for an explicit retry.
    pub async fn confirm_and_publish(&mut self) -> Result<(), WorkflowError> {
        self.begin(Action::ConfirmAndPublish)?;
        let Some(final_result) = self.state.final_result.clone() else {
            return Err(self.fail(WorkflowError::Selection));
        };
        let request = PublishRequest {
            form: self.state.form.clone(),
            final_result,
            history: self.state.history.entries().to_vec(),
            context: self.state.context.clone(),
        };

        self.enter_busy(Action::ConfirmAndPublish);
        info!(rounds = request.history.len(), "publishing");
        let published = self.services.publish.publish(&request).await;
        self.leave_busy(Action::ConfirmAndPublish);

        match published {
            Ok(receipt) => {
                info!(
                    draft_row = ?receipt.draft_row,
                    published_row = ?receipt.published_row,
                    "published"
                );
                self.state.receipt = Some(receipt);
                self.emit(WorkflowEvent::Published);
                self.transition(Step::Done);
                Ok(())
            }
            Err(err) => Err(self.fail(WorkflowError::service(Action::ConfirmAndPublish, &err))),
        }
    }

    /// Return to the comparison to re-select, keeping round and history as they are.
    pub fn edit_post(&mut self) -> Result<(), WorkflowError> {
        self.begin(Action::EditPost)?;
        self.transition(Step::CompareCandidates);
        Ok(())
    }

    // --- Navigation -----------------------------------------------------------------

    /// Table-driven backward step. Touches nothing but the step, plus the
    /// pending refinement text when leaving refinement.
    pub fn go_back(&mut self) {
        self.state.error = None;
        let from = self.state.step;
        if from == Step::Refine {
            self.state.refinement_text.clear();
        }
        let to = from.back_target();
        if to != from {
            self.transition(to);
        }
    }

    /// Discard the whole run and start over from an empty form.
    pub fn restart(&mut self) {
        let from = self.state.step;
        self.state = WorkflowState::default();
        info!(from = %from, "workflow restarted");
        if from != Step::EnterInfo {
            self.emit(WorkflowEvent::StepChanged {
                from,
                to: Step::EnterInfo,
            });
        }
        self.emit(WorkflowEvent::Reset);
    }

    // --- Accessors ------------------------------------------------------------------

    pub fn step(&self) -> Step {
        self.state.step
    }

    pub fn form(&self) -> &FormInput {
        &self.state.form
    }

    pub fn context(&self) -> &ContextBundle {
        &self.state.context
    }

    pub fn round(&self) -> &RoundState {
        &self.state.round
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.state.history
    }

    pub fn final_result(&self) -> Option<&Candidate> {
        self.state.final_result.as_ref()
    }

    /// Character count of the final result.
    pub fn final_length(&self) -> Option<usize> {
        self.state.final_result.as_ref().map(Candidate::length)
    }

    pub fn final_is_valid(&self) -> Option<bool> {
        self.state
            .final_result
            .as_ref()
            .map(|candidate| candidate.is_valid)
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    pub fn refinement_text(&self) -> &str {
        &self.state.refinement_text
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    pub fn is_publishing(&self) -> bool {
        self.state.publishing
    }

    pub fn receipt(&self) -> Option<&PublishReceipt> {
        self.state.receipt.as_ref()
    }

    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.state.round.selected_candidate()
    }

    pub fn selected_text(&self) -> &str {
        self.state
            .round
            .selected_candidate()
            .map_or(NO_SELECTION_TEXT, |candidate| candidate.text.as_str())
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let state = &self.state;
        WorkflowSnapshot {
            step: state.step,
            label: state.step.label(),
            ordinal: state.step.ordinal(),
            progress: state.step.progress(),
            progress_text: state.step.progress_text(),
            form: state.form.clone(),
            context: state.context.clone(),
            round: state.round.clone(),
            selected_text: self.selected_text().to_string(),
            history: state.history.clone(),
            final_result: state.final_result.clone(),
            error: state.error.clone(),
            refinement_text: state.refinement_text.clone(),
            loading: state.loading,
            publishing: state.publishing,
            receipt: state.receipt.clone(),
        }
    }

    // --- Internals ------------------------------------------------------------------

    /// Start an action: clear the previous error and check the step.
    fn begin(&mut self, action: Action) -> Result<(), WorkflowError> {
        self.state.error = None;
        let step = self.state.step;
        if !action.is_allowed_from(step) {
            return Err(self.fail(WorkflowError::InvalidStep { action, step }));
        }
        Ok(())
    }

    /// Record an error in the error slot and hand it back to the caller.
    fn fail(&mut self, err: WorkflowError) -> WorkflowError {
        let message = err.to_string();
        warn!(step = %self.state.step, error = %message, "workflow action failed");
        self.state.error = Some(message.clone());
        self.emit(WorkflowEvent::Failed { message });
        err
    }

    /// Raise the loading flag (and the publishing flag for publication) and
    /// announce it before the collaborator is awaited.
    fn enter_busy(&mut self, action: Action) {
        let publishing = action == Action::ConfirmAndPublish;
        self.state.loading = true;
        self.state.publishing = publishing;
        self.emit(WorkflowEvent::Busy { action, publishing });
    }

    fn leave_busy(&mut self, action: Action) {
        self.state.loading = false;
        self.state.publishing = false;
        self.emit(WorkflowEvent::Idle { action });
    }

    fn transition(&mut self, to: Step) {
        let from = self.state.step;
        self.state.step = to;
        debug!(from = %from, to = %to, "step transition");
        self.emit(WorkflowEvent::StepChanged { from, to });
    }

    fn emit(&self, event: WorkflowEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}
