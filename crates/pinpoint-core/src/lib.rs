//! # pinpoint-core
//!
//! Core types for pinpoint.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other pinpoint crates. It provides:
//!
//! - Component metadata produced by detection (`ComponentInfo`)
//! - The read-only page abstraction strategies inspect (`Page`, `ElementId`)
//! - An in-memory `Document` page with YAML fixtures
//! - Screenshot capture interface types
//! - Geometry, session identifiers, configuration and error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other pinpoint crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capture;
pub mod component;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod page;
pub mod session;

// Re-export commonly used types
pub use capture::{CaptureError, CaptureOutcome, Screenshot, ScreenshotCapturer};
pub use component::{ComponentInfo, Confidence, DetectionMethod, Props, SourceLocation};
pub use config::{
    DetectionSettings, HapticSettings, HeuristicSettings, InteractionSettings, LoggingSettings,
    PinpointConfig, TreeWalkSettings,
};
pub use document::{Document, DocumentFixture, ElementFixture, HookFixture, RenderNodeFixture};
pub use error::{Error, Result};
pub use geometry::{Point, Rect};
pub use page::{
    ElementId, HookError, HookRecord, IntrospectionHook, Page, RenderNode, RenderNodeId,
    RenderNodeKind,
};
pub use session::SessionId;
