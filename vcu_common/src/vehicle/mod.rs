//! Vehicle domain types shared between the control unit and its tools.
//!
//! - [`state`] - the vehicle data block
//! - [`fault`] - fault flags and classification
//! - [`config`] - static vehicle configuration
//! - [`control`] - actuator interface

pub mod config;
pub mod control;
pub mod fault;
pub mod state;
