//! Change notifications broadcast by the controller.

use serde::Serialize;

use crate::core::step::{Action, Step};
use crate::core::types::Side;

/// Capacity of the controller's broadcast channel.
pub const EVENT_CAPACITY: usize = 64;

/// Emitted synchronously at the moment the controller mutates its state.
///
/// Step changes into loading steps, and `Busy`, are sent before the awaited
/// service call is issued, so subscribers always observe them. `Idle` follows
/// once the call has resolved and its outcome has been applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StepChanged { from: Step, to: Step },
    RoundOpened { round: u32 },
    RoundClosed { round: u32, selected: Side },
    Failed { message: String },
    Busy { action: Action, publishing: bool },
    Idle { action: Action },
    Published,
    Reset,
}
