//! Guided post-creation workflow.
//!
//! A user supplies a handful of facts about a product post, the backend
//! retrieves context and proposes two candidates, and the user picks one per
//! round, optionally asking for refinements, until a final post is published.
//!
//! - **[`core`]**: Pure, deterministic logic (step table, validation, rounds,
//!   history). No I/O.
//! - **[`io`]**: Collaborators behind traits (HTTP backend, local archive),
//!   configuration and text views.
//!
//! [`controller::WorkflowController`] owns all workflow state and is the only
//! thing that mutates it. [`session`] drives it from a terminal; the
//! `postcraft-ui` crate drives it over HTTP.

pub mod controller;
pub mod core;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use controller::{WorkflowController, WorkflowSnapshot};
pub use error::WorkflowError;
pub use events::WorkflowEvent;
