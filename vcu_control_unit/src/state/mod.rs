//! Vehicle supervisory state machine.
//!
//! - [`machine`] - states, actions and the pure transition function
//! - [`vsm`] - the per-tick runner that samples inputs and applies actions

pub mod machine;
pub mod vsm;

pub use machine::{Transition, TransitionInputs, VsmAction, VsmState, transition};
pub use vsm::Vsm;
