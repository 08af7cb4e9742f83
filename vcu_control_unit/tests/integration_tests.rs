//! Integration tests for the VCU control unit.
//!
//! These tests exercise multiple modules together: the supervisory state
//! machine with its fault manager and throttle, the device frame pipeline
//! and the boot sequence.

mod integration;
