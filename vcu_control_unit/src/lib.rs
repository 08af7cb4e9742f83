//! # VCU Control Unit Library
//!
//! Supervisory core of an electric vehicle control unit. Turns sensor and
//! bus data into a vehicle operating state and a torque command while
//! policing safety limits.
//!
//! ## Components
//!
//! 1. **VehicleState** ([`vehicle_state`]): lock-guarded data store with
//!    atomic snapshots
//! 2. **FaultManager** ([`fault`]): latching, hysteresis-based fault rules
//! 3. **VSM** ([`state`]): top-level supervisory state machine
//! 4. **ThrottleController** ([`throttle`]): pedal to torque via torque maps
//! 5. **Supervisor** ([`supervisor`]): periodic task hosting the VSM, plus
//!    the boot sequence
//!
//! Periodic scheduling lives in [`cycle`]; device frame decoding and command
//! encoding in [`device`]; the actuator implementation in [`control`]; a
//! workstation simulation in [`sim`].

pub mod config;
pub mod context;
pub mod control;
pub mod cycle;
pub mod device;
pub mod fault;
pub mod sim;
pub mod state;
pub mod supervisor;
pub mod throttle;
pub mod vehicle_state;
