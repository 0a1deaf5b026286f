//! Crate-wide constants for the push-notification control channel.
//!
//! Timeouts and simulation intervals live here so the binary, the
//! configuration defaults and the tests agree on the same values.
//!
//! # Categories
//!
//! - **Timeouts**: retry interval hints handed to tutors
//! - **Simulation**: pacing for the `simulate` command

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// Default retry interval hint for every control request, in milliseconds.
///
/// The external scheduler re-polls a tutor no sooner than this after the
/// previous attempt was dispatched.
pub const DEFAULT_CONTROL_TIMEOUT_MS: u64 = 4000;

// ============================================================================
// Simulation
// ============================================================================

/// Tick of the `simulate` event loop.
///
/// Scheduler polls and fake server responses are evaluated once per tick.
pub const SIMULATION_TICK: Duration = Duration::from_millis(20);

/// Hard stop for a simulation run, whatever the drop count.
pub const SIMULATION_DEADLINE: Duration = Duration::from_secs(60);

/// Server-assigned device id handed out by the simulated server.
pub const SIMULATED_DEVICE_ID: &str = "sim-device-1";
