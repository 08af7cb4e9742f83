//! VCU Common Library
//!
//! Shared types and configuration for the vehicle control unit workspace.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Scheduling constants shared by all tasks
//! - [`vehicle`] - Vehicle state data, fault flags, vehicle config and the
//!   actuator-facing [`vehicle::control::VehicleControl`] trait
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use vcu_common::prelude::*;
//!
//! let config = VehicleConfig::default();
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod vehicle;
