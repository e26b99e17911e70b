//! Append-only ledger of closed comparison rounds.

use serde::{Deserialize, Serialize};

use crate::core::round::RoundState;
use crate::core::types::{Candidate, Side};

/// Snapshot of one concluded round.
///
/// Candidates are owned copies taken when the round closes; later changes to
/// the live round never reach a recorded entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    round: u32,
    candidate_a: Candidate,
    candidate_b: Candidate,
    selected: Side,
    refinement_request: String,
}

impl HistoryEntry {
    /// Snapshot a round that has both candidates and a selection.
    pub fn close(round: &RoundState) -> Option<Self> {
        Some(Self {
            round: round.number(),
            candidate_a: round.candidate(Side::A)?.clone(),
            candidate_b: round.candidate(Side::B)?.clone(),
            selected: round.selected()?,
            refinement_request: String::new(),
        })
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn candidate(&self, side: Side) -> &Candidate {
        match side {
            Side::A => &self.candidate_a,
            Side::B => &self.candidate_b,
        }
    }

    pub fn selected(&self) -> Side {
        self.selected
    }

    pub fn selected_candidate(&self) -> &Candidate {
        self.candidate(self.selected)
    }

    /// Request that produced the next round; empty if the round was finalized.
    pub fn refinement_request(&self) -> &str {
        &self.refinement_request
    }
}

/// Ordered record of closed rounds, one entry per closure.
///
/// Entries are only ever appended. Navigating back into a round and closing
/// it again records a second entry for the same round number.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
}

impl HistoryLedger {
    pub fn close_round(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Attach the refinement request to the entry of the round it concluded.
    ///
    /// Only the tail entry (the closure that opened refinement) may be
    /// amended, only for `round`, and only once. Earlier entries are frozen.
    pub fn amend_last_request(&mut self, round: u32, request: &str) -> Result<(), String> {
        let last = self
            .entries
            .last_mut()
            .ok_or_else(|| "no closed round to amend".to_string())?;
        if last.round != round {
            return Err(format!(
                "last closed round is {} but the request belongs to round {}",
                last.round, round
            ));
        }
        if !last.refinement_request.is_empty() {
            return Err(format!("round {round} already has a refinement request"));
        }
        last.refinement_request = request.to_string();
        Ok(())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
