//! Workflow step table: ordering, labels, backward navigation and the steps
//! each user action may start from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of steps in the workflow.
pub const STEP_COUNT: u8 = 8;

/// One of the eight ordered workflow stages.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    EnterInfo,
    LoadingContext,
    ReviewContext,
    LoadingGeneration,
    CompareCandidates,
    Refine,
    Confirm,
    Done,
}

impl Step {
    pub const ALL: [Step; STEP_COUNT as usize] = [
        Step::EnterInfo,
        Step::LoadingContext,
        Step::ReviewContext,
        Step::LoadingGeneration,
        Step::CompareCandidates,
        Step::Refine,
        Step::Confirm,
        Step::Done,
    ];

    /// 1-based position in the workflow.
    pub fn ordinal(self) -> u8 {
        match self {
            Step::EnterInfo => 1,
            Step::LoadingContext => 2,
            Step::ReviewContext => 3,
            Step::LoadingGeneration => 4,
            Step::CompareCandidates => 5,
            Step::Refine => 6,
            Step::Confirm => 7,
            Step::Done => 8,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Step> {
        Step::ALL.get(usize::from(ordinal).checked_sub(1)?).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::EnterInfo => "entry",
            Step::LoadingContext => "context-loading",
            Step::ReviewContext => "context-review",
            Step::LoadingGeneration => "generation-loading",
            Step::CompareCandidates => "comparison",
            Step::Refine => "refinement",
            Step::Confirm => "confirmation",
            Step::Done => "done",
        }
    }

    /// Fraction of the workflow reached, in `(0, 1]`.
    pub fn progress(self) -> f64 {
        f64::from(self.ordinal()) / f64::from(STEP_COUNT)
    }

    pub fn progress_text(self) -> String {
        format!("Step {}/{}: {}", self.ordinal(), STEP_COUNT, self.label())
    }

    /// Loading steps are only ever held while a service call is in flight.
    pub fn is_loading(self) -> bool {
        matches!(self, Step::LoadingContext | Step::LoadingGeneration)
    }

    /// Where `goBack` leads from this step.
    ///
    /// The explicit rows take precedence; every other step falls back to the
    /// previous ordinal, and `EnterInfo` stays put.
    pub fn back_target(self) -> Step {
        match self {
            Step::ReviewContext => Step::EnterInfo,
            Step::CompareCandidates => Step::ReviewContext,
            Step::Refine => Step::CompareCandidates,
            Step::Confirm => Step::CompareCandidates,
            other => Step::from_ordinal(other.ordinal() - 1).unwrap_or(Step::EnterInfo),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-initiated controller entry points that are only valid from certain steps.
///
/// `goBack` and `restart` are valid everywhere and are not listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    FetchContext,
    ProceedToGeneration,
    SelectCandidate,
    ProceedToRefinement,
    FinalizeSelection,
    RefinePost,
    SkipRefinement,
    ConfirmAndPublish,
    EditPost,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::FetchContext => "fetch context",
            Action::ProceedToGeneration => "generate candidates",
            Action::SelectCandidate => "select a candidate",
            Action::ProceedToRefinement => "open refinement",
            Action::FinalizeSelection => "finalize the selection",
            Action::RefinePost => "refine the candidate",
            Action::SkipRefinement => "skip refinement",
            Action::ConfirmAndPublish => "publish",
            Action::EditPost => "edit the post",
        }
    }

    /// Steps from which the action may be started.
    pub fn allowed_from(self) -> &'static [Step] {
        match self {
            Action::FetchContext => &[Step::EnterInfo],
            Action::ProceedToGeneration => &[Step::ReviewContext],
            Action::SelectCandidate | Action::ProceedToRefinement | Action::FinalizeSelection => {
                &[Step::CompareCandidates]
            }
            Action::RefinePost | Action::SkipRefinement => &[Step::Refine],
            Action::ConfirmAndPublish | Action::EditPost => &[Step::Confirm],
        }
    }

    pub fn is_allowed_from(self, step: Step) -> bool {
        self.allowed_from().contains(&step)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_round_trip() {
        for step in Step::ALL {
            assert_eq!(Step::from_ordinal(step.ordinal()), Some(step));
        }
        assert_eq!(Step::from_ordinal(0), None);
        assert_eq!(Step::from_ordinal(9), None);
    }

    #[test]
    fn back_table_matches_navigation_rules() {
        let expected = [
            (Step::EnterInfo, Step::EnterInfo),
            (Step::LoadingContext, Step::EnterInfo),
            (Step::ReviewContext, Step::EnterInfo),
            (Step::LoadingGeneration, Step::ReviewContext),
            (Step::CompareCandidates, Step::ReviewContext),
            (Step::Refine, Step::CompareCandidates),
            (Step::Confirm, Step::CompareCandidates),
            (Step::Done, Step::Confirm),
        ];
        for (from, to) in expected {
            assert_eq!(from.back_target(), to, "back from {from}");
        }
    }

    #[test]
    fn progress_is_ordinal_over_eight() {
        assert_eq!(Step::EnterInfo.progress(), 0.125);
        assert_eq!(Step::CompareCandidates.progress(), 0.625);
        assert_eq!(Step::Done.progress(), 1.0);
        assert_eq!(Step::Refine.progress_text(), "Step 6/8: refinement");
    }

    #[test]
    fn every_action_has_an_entry_step() {
        let actions = [
            Action::FetchContext,
            Action::ProceedToGeneration,
            Action::SelectCandidate,
            Action::ProceedToRefinement,
            Action::FinalizeSelection,
            Action::RefinePost,
            Action::SkipRefinement,
            Action::ConfirmAndPublish,
            Action::EditPost,
        ];
        for action in actions {
            assert!(!action.allowed_from().is_empty());
            assert!(
                action.allowed_from().iter().all(|step| !step.is_loading()),
                "{action} must not start from a loading step"
            );
        }
    }
}
