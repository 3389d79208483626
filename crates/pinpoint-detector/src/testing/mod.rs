//! Testing utilities for pinpoint detection.
//!
//! Provides scripted, call-counting strategies so chain behavior (ordering,
//! short-circuiting, fault handling, skipped invocations) can be asserted
//! without building realistic pages.

use std::cell::Cell;
use std::rc::Rc;

use pinpoint_core::{ComponentInfo, DetectionMethod, ElementId, Page};

use crate::strategy::{ComponentStrategy, StrategyError, StrategyResult};

/// What a [`ScriptedStrategy`] does when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Resolve every element to a component with this name
    Match(&'static str),
    /// Decline every element
    Decline,
    /// Return a strategy fault
    Fault,
    /// Panic
    Panic,
}

/// Strategy with fixed behavior that counts its invocations.
pub struct ScriptedStrategy {
    method: DetectionMethod,
    behavior: Behavior,
    calls: Rc<Cell<usize>>,
}

impl ScriptedStrategy {
    /// Create a scripted strategy reporting `method`.
    pub fn new(method: DetectionMethod, behavior: Behavior) -> Self {
        Self {
            method,
            behavior,
            calls: Rc::new(Cell::new(0)),
        }
    }

    /// Shared invocation counter; stays readable after the strategy is boxed
    /// into a chain.
    pub fn calls(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.calls)
    }
}

impl ComponentStrategy for ScriptedStrategy {
    fn method(&self) -> DetectionMethod {
        self.method
    }

    fn resolve(&self, _page: &dyn Page, element: ElementId) -> StrategyResult {
        self.calls.set(self.calls.get() + 1);
        match self.behavior {
            Behavior::Match(name) => Ok(Some(ComponentInfo::new(name, element, self.method))),
            Behavior::Decline => Ok(None),
            Behavior::Fault => Err(StrategyError::Other("scripted fault".to_string())),
            Behavior::Panic => panic!("scripted panic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinpoint_core::Document;

    #[test]
    fn test_scripted_strategy_counts_calls() {
        let mut doc = Document::new();
        let div = doc.append(None, "div");
        let strategy = ScriptedStrategy::new(DetectionMethod::Heuristic, Behavior::Decline);
        let calls = strategy.calls();

        assert_eq!(strategy.resolve(&doc, div), Ok(None));
        assert_eq!(strategy.resolve(&doc, div), Ok(None));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_scripted_match_reports_its_method() {
        let mut doc = Document::new();
        let div = doc.append(None, "div");
        let strategy = ScriptedStrategy::new(DetectionMethod::TreeWalk, Behavior::Match("Card"));
        let info = strategy.resolve(&doc, div).unwrap().unwrap();
        assert_eq!(info.name, "Card");
        assert_eq!(info.detection_method, DetectionMethod::TreeWalk);
    }
}
