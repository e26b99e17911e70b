//! The in-flight comparison round.

use serde::Serialize;

use crate::core::types::{Candidate, CandidatePair, Side};

/// Current round: the two live candidates and the pending selection.
///
/// The round number starts at 1 and only moves forward, one step per
/// refinement, through [`RoundState::advance`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundState {
    number: u32,
    candidate_a: Option<Candidate>,
    candidate_b: Option<Candidate>,
    selected: Option<Side>,
}

impl Default for RoundState {
    fn default() -> Self {
        Self {
            number: 1,
            candidate_a: None,
            candidate_b: None,
            selected: None,
        }
    }
}

impl RoundState {
    /// Round 1 over a freshly generated pair.
    pub fn first(pair: CandidatePair) -> Self {
        Self {
            number: 1,
            candidate_a: Some(pair.a),
            candidate_b: Some(pair.b),
            selected: None,
        }
    }

    /// Replace the pair with a refined one and move to the next round.
    pub fn advance(&mut self, pair: CandidatePair) {
        self.number += 1;
        self.candidate_a = Some(pair.a);
        self.candidate_b = Some(pair.b);
        self.selected = None;
    }

    pub fn select(&mut self, side: Side) {
        self.selected = Some(side);
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn selected(&self) -> Option<Side> {
        self.selected
    }

    pub fn candidate(&self, side: Side) -> Option<&Candidate> {
        match side {
            Side::A => self.candidate_a.as_ref(),
            Side::B => self.candidate_b.as_ref(),
        }
    }

    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.candidate(self.selected?)
    }

    pub fn has_candidates(&self) -> bool {
        self.candidate_a.is_some() && self.candidate_b.is_some()
    }
}
