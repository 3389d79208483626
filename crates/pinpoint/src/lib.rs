//! pinpoint application library
//!
//! Wires the bus and the interaction engine into a [`Toolkit`], replays
//! scripted scenarios against it, and publishes the JSON Schema of the
//! detection result. The command-line entry point is in main.rs.

pub mod scenario;
pub mod schema;
pub mod toolkit;

// Re-export commonly used types
pub use scenario::{Emission, Replay, Scenario, Step, StepOutcome};
pub use schema::{component_info_schema, to_draft07};
pub use toolkit::Toolkit;
