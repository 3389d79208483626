//! # pinpoint-interaction
//!
//! Capture-mode interaction for pinpoint.
//!
//! This crate provides:
//! - `EventBus`, the explicitly constructed publish/subscribe channel, with
//!   per-consumer `Subscriptions` scopes
//! - Scheduling policy: `Throttle`, `Debounce`, idle-time requests, and the
//!   deterministic `VirtualScheduler`
//! - The `Host` interface for cursor, listener and haptic side effects
//! - `InteractionEngine`, the hover/selection state machine over mouse,
//!   touch and keyboard input
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on pinpoint-core and
//! pinpoint-detector. Everything here is single-threaded: state lives behind
//! `Rc`/`RefCell` and deferred work arrives through `TaskSink` callbacks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod engine;
pub mod host;
pub mod input;
pub mod scheduler;

// Re-export commonly used types
pub use bus::{
    listener, EmitReport, EventBus, EventKind, Listener, Payload, ScreenshotReport, Selection,
    Subscription, SubscriptionId, Subscriptions,
};
pub use engine::{EngineBuilder, EngineSnapshot, EngineState, InteractionEngine, IGNORE_ATTRIBUTE};
pub use host::{Host, HostLog, Pulse, RecordingHost};
pub use input::{Disposition, InputEvent, InputSource, Key};
pub use scheduler::{
    Debounce, Gate, IdleDeadline, Scheduler, TaskId, TaskSink, Throttle, VirtualScheduler,
};
