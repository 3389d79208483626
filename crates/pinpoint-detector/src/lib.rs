//! # pinpoint-detector
//!
//! Component detection for pinpoint.
//!
//! This crate provides:
//! - The `ComponentStrategy` contract (element -> optional component)
//! - Four strategies: introspection hook, render-tree walk, DOM heuristics, fallback
//! - `DetectionChain`, which tries strategies in canonical order and stops at
//!   the first match
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on pinpoint-core and
//! reads the page only through the `Page` trait. Detection is synchronous and
//! side-effect free; scheduling lives in pinpoint-interaction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod strategies;
pub mod strategy;
pub mod testing;

// Re-export commonly used types
pub use chain::{Detection, DetectionChain, StrategyStats};
pub use strategies::{FallbackStrategy, HeuristicStrategy, IntrospectionStrategy, TreeWalkStrategy};
pub use strategy::{ComponentStrategy, StrategyError, StrategyResult};
