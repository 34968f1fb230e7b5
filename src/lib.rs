// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # ecs-ship
//!
//! Deploys container configuration changes to ECS services, waits for the
//! service to reach steady state, and rolls back when it doesn't.
//!
//! ## Overview
//!
//! A deployment takes a partial set of overrides (a [`TaskPatch`]) and:
//!
//! 1. Fetches the service and the task definition it runs
//! 2. Applies the patch to a copy of that definition and computes a diff
//! 3. Stops if the diff is empty, or if this is a dry run
//! 4. Registers the patched definition and points the service at it
//! 5. Polls until the service is steady, rolling back on timeout
//!
//! ## Modules
//!
//! - [`config`]: Updates payload types, loading and validation
//! - [`planner`]: Diff tree and the pure patch application
//! - [`ecs`]: Control plane capability, AWS client, health checks and polling
//! - [`progress`]: Progress events and reporters
//! - [`deployer`]: Deployment orchestration with rollback
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! cpu: "512"
//! memory: "1024"
//! containerDefinitions:
//!   app:
//!     image: registry.example.com/app:1.4.2
//!     environment:
//!       LOG_LEVEL: debug
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod deployer;
pub mod ecs;
pub mod error;
pub mod planner;
pub mod progress;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, ConsoleReporter};
pub use config::{ContainerPatch, PatchParser, PatchValidator, TaskPatch};
pub use deployer::{DeployOutcome, DeployRequest, Deployer};
pub use ecs::{AwsEcsClient, EcsApi, HealthChecker, SteadyStatePoller};
pub use error::{Result, ShipError};
pub use planner::{ContainerDiff, ScalarDiff, TaskDiff};
pub use progress::{ProgressEvent, ProgressReporter, TracingReporter};
