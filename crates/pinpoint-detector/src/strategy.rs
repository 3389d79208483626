//! The contract every detection strategy implements.

use pinpoint_core::{ComponentInfo, DetectionMethod, ElementId, HookError, Page};
use thiserror::Error;

/// Fault raised while a strategy inspects the page.
///
/// A fault is not a decline: the chain logs it, then moves on as if the
/// strategy had declined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// The introspection hook reported an error
    #[error("introspection hook failed: {0}")]
    Hook(#[from] HookError),

    /// The render tree references a node that does not exist
    #[error("render tree is inconsistent: {0}")]
    BrokenRenderTree(String),

    /// The strategy panicked
    #[error("strategy panicked: {0}")]
    Panicked(String),

    /// Any other fault
    #[error("{0}")]
    Other(String),
}

/// Outcome of one strategy attempt: a match, a decline (`Ok(None)`), or a fault.
pub type StrategyResult = Result<Option<ComponentInfo>, StrategyError>;

/// One algorithm for naming the component that owns an element.
///
/// Implementations must only read the page. "Can't tell" is `Ok(None)`,
/// never an error.
pub trait ComponentStrategy {
    /// Which method this strategy reports in its results.
    fn method(&self) -> DetectionMethod;

    /// Attempt to resolve `element`.
    fn resolve(&self, page: &dyn Page, element: ElementId) -> StrategyResult;

    /// Strategy name for logging.
    fn name(&self) -> &'static str {
        self.method().as_str()
    }
}
