//! Detection strategy implementations, most specific first.

pub mod fallback;
pub mod heuristic;
pub mod introspection;
pub mod tree_walk;

pub use fallback::FallbackStrategy;
pub use heuristic::HeuristicStrategy;
pub use introspection::IntrospectionStrategy;
pub use tree_walk::TreeWalkStrategy;
