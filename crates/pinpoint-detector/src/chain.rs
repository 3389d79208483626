//! Detection chain: ordered strategies, first match wins.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

use pinpoint_core::{ComponentInfo, DetectionMethod, DetectionSettings, ElementId, Page};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::strategies::{
    FallbackStrategy, HeuristicStrategy, IntrospectionStrategy, TreeWalkStrategy,
};
use crate::strategy::{ComponentStrategy, StrategyError};

/// Outcome of running the chain on one target.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// A component was resolved
    Found(ComponentInfo),
    /// The target was missing or detached; no strategy ran
    NoTarget,
}

impl Detection {
    /// Borrow the resolved component, if any.
    pub fn info(&self) -> Option<&ComponentInfo> {
        match self {
            Detection::Found(info) => Some(info),
            Detection::NoTarget => None,
        }
    }

    /// Take the resolved component, if any.
    pub fn into_info(self) -> Option<ComponentInfo> {
        match self {
            Detection::Found(info) => Some(info),
            Detection::NoTarget => None,
        }
    }
}

/// Per-strategy counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyStats {
    /// Times the strategy was invoked
    pub attempts: u64,
    /// Times it produced the result
    pub matches: u64,
    /// Times it faulted
    pub faults: u64,
}

struct Slot {
    strategy: Box<dyn ComponentStrategy>,
    stats: Cell<StrategyStats>,
}

/// Ordered list of strategies.
///
/// Strategies always run in [`DetectionMethod::ALL`] order regardless of the
/// order they were added in. The chain is total: for any attached element it
/// produces a result, synthesizing a fallback one if every strategy declined.
pub struct DetectionChain {
    slots: Vec<Slot>,
}

fn rank(method: DetectionMethod) -> usize {
    DetectionMethod::ALL
        .iter()
        .position(|m| *m == method)
        .unwrap_or(DetectionMethod::ALL.len())
}

impl DetectionChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Create the canonical chain for the given settings.
    pub fn with_defaults(settings: &DetectionSettings) -> Self {
        let mut chain = Self::new();
        if settings.is_enabled(DetectionMethod::Introspection) {
            chain.add_strategy(Box::new(IntrospectionStrategy::new()));
        }
        if settings.is_enabled(DetectionMethod::TreeWalk) {
            chain.add_strategy(Box::new(TreeWalkStrategy::from_settings(&settings.tree_walk)));
        }
        if settings.is_enabled(DetectionMethod::Heuristic) {
            chain.add_strategy(Box::new(HeuristicStrategy::from_settings(&settings.heuristic)));
        }
        chain.add_strategy(Box::new(FallbackStrategy::new()));
        chain
    }

    /// Add a strategy at its canonical position.
    pub fn add_strategy(&mut self, strategy: Box<dyn ComponentStrategy>) {
        self.slots.push(Slot {
            strategy,
            stats: Cell::new(StrategyStats::default()),
        });
        // Stable: strategies sharing a method keep insertion order
        self.slots.sort_by_key(|slot| rank(slot.strategy.method()));
    }

    /// Methods in the order they will be tried.
    pub fn methods(&self) -> Vec<DetectionMethod> {
        self.slots.iter().map(|s| s.strategy.method()).collect()
    }

    /// Counters per strategy, in chain order.
    pub fn stats(&self) -> Vec<(&'static str, StrategyStats)> {
        self.slots
            .iter()
            .map(|s| (s.strategy.name(), s.stats.get()))
            .collect()
    }

    /// Resolve an element to its component.
    ///
    /// `None` or a detached element yields [`Detection::NoTarget`] without
    /// invoking any strategy.
    pub fn detect(&self, page: &dyn Page, element: Option<ElementId>) -> Detection {
        let Some(element) = element else {
            trace!("detect called without a target");
            return Detection::NoTarget;
        };
        if !page.is_connected(element) {
            debug!(%element, "target is detached; skipping detection");
            return Detection::NoTarget;
        }

        for slot in &self.slots {
            let mut stats = slot.stats.get();
            stats.attempts += 1;

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                slot.strategy.resolve(page, element)
            }))
            .unwrap_or_else(|payload| Err(StrategyError::Panicked(panic_message(&*payload))));

            match outcome {
                Ok(Some(info)) => {
                    stats.matches += 1;
                    slot.stats.set(stats);
                    debug!(
                        %element,
                        strategy = slot.strategy.name(),
                        component = %info.name,
                        "component resolved"
                    );
                    return Detection::Found(info);
                }
                Ok(None) => {
                    trace!(%element, strategy = slot.strategy.name(), "strategy declined");
                }
                Err(err) => {
                    stats.faults += 1;
                    warn!(
                        %element,
                        strategy = slot.strategy.name(),
                        error = %err,
                        "strategy failed; treating as no match"
                    );
                }
            }
            slot.stats.set(stats);
        }

        Detection::Found(FallbackStrategy::describe(page, element))
    }
}

impl Default for DetectionChain {
    fn default() -> Self {
        Self::with_defaults(&DetectionSettings::default())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, ScriptedStrategy};
    use pinpoint_core::{Document, HookRecord};

    fn single_button() -> (Document, ElementId) {
        let mut doc = Document::new();
        let root = doc.append(None, "div");
        let button = doc.append(Some(root), "button");
        doc.set_attribute(button, "data-testid", "x");
        (doc, button)
    }

    #[test]
    fn test_chain_orders_strategies_canonically() {
        let mut chain = DetectionChain::new();
        chain.add_strategy(Box::new(FallbackStrategy::new()));
        chain.add_strategy(Box::new(HeuristicStrategy::new()));
        chain.add_strategy(Box::new(IntrospectionStrategy::new()));
        chain.add_strategy(Box::new(TreeWalkStrategy::new()));

        assert_eq!(chain.methods(), DetectionMethod::ALL.to_vec());
    }

    #[test]
    fn test_default_chain_respects_settings() {
        let settings = DetectionSettings {
            strategies: vec![DetectionMethod::Heuristic],
            ..DetectionSettings::default()
        };
        let chain = DetectionChain::with_defaults(&settings);
        assert_eq!(
            chain.methods(),
            vec![DetectionMethod::Heuristic, DetectionMethod::Fallback]
        );
    }

    #[test]
    fn test_first_match_wins_and_later_strategies_are_skipped() {
        let (doc, button) = single_button();
        let first = ScriptedStrategy::new(DetectionMethod::Introspection, Behavior::Match("First"));
        let second = ScriptedStrategy::new(DetectionMethod::Heuristic, Behavior::Match("Second"));
        let second_calls = second.calls();

        let mut chain = DetectionChain::new();
        chain.add_strategy(Box::new(second));
        chain.add_strategy(Box::new(first));

        let info = chain.detect(&doc, Some(button)).into_info().unwrap();
        assert_eq!(info.name, "First");
        assert_eq!(info.detection_method, DetectionMethod::Introspection);
        assert_eq!(second_calls.get(), 0);
    }

    #[test]
    fn test_missing_target_invokes_nothing() {
        let (doc, _) = single_button();
        let probe = ScriptedStrategy::new(DetectionMethod::Heuristic, Behavior::Match("X"));
        let calls = probe.calls();
        let mut chain = DetectionChain::new();
        chain.add_strategy(Box::new(probe));

        assert_eq!(chain.detect(&doc, None), Detection::NoTarget);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_detached_target_invokes_nothing() {
        let (doc, button) = single_button();
        let probe = ScriptedStrategy::new(DetectionMethod::Introspection, Behavior::Match("X"));
        let calls = probe.calls();
        let mut chain = DetectionChain::new();
        chain.add_strategy(Box::new(probe));

        doc.detach(button);
        assert_eq!(chain.detect(&doc, Some(button)), Detection::NoTarget);
        assert_eq!(calls.get(), 0);
        assert_eq!(chain.stats()[0].1.attempts, 0);
    }

    #[test]
    fn test_faulting_strategy_falls_through() {
        let (doc, button) = single_button();
        let mut chain = DetectionChain::new();
        chain.add_strategy(Box::new(ScriptedStrategy::new(
            DetectionMethod::Introspection,
            Behavior::Fault,
        )));
        chain.add_strategy(Box::new(HeuristicStrategy::new()));

        let info = chain.detect(&doc, Some(button)).into_info().unwrap();
        assert_eq!(info.detection_method, DetectionMethod::Heuristic);
        assert_eq!(info.name, "X");

        let stats = chain.stats();
        assert_eq!(stats[0].1.faults, 1);
        assert_eq!(stats[1].1.matches, 1);
    }

    #[test]
    fn test_panicking_strategy_is_contained() {
        let (doc, button) = single_button();
        let mut chain = DetectionChain::new();
        chain.add_strategy(Box::new(ScriptedStrategy::new(
            DetectionMethod::TreeWalk,
            Behavior::Panic,
        )));

        let info = chain.detect(&doc, Some(button)).into_info().unwrap();
        assert_eq!(info.detection_method, DetectionMethod::Fallback);
        assert_eq!(chain.stats()[0].1.faults, 1);

        // The chain stays usable afterwards
        assert!(chain.detect(&doc, Some(button)).info().is_some());
    }

    #[test]
    fn test_empty_chain_still_resolves_attached_elements() {
        let (doc, button) = single_button();
        let chain = DetectionChain::new();
        let info = chain.detect(&doc, Some(button)).into_info().unwrap();
        assert_eq!(info.detection_method, DetectionMethod::Fallback);
        assert_eq!(info.name, "button");
    }

    #[test]
    fn test_introspection_beats_heuristic() {
        let (mut doc, button) = single_button();
        doc.set_hook_record(
            button,
            HookRecord {
                name: "SaveButton".to_string(),
                owners: vec!["App".to_string()],
                props: Default::default(),
                source: None,
            },
        );

        let chain = DetectionChain::default();
        let info = chain.detect(&doc, Some(button)).into_info().unwrap();
        assert_eq!(info.detection_method, DetectionMethod::Introspection);
        assert_eq!(info.name, "SaveButton");
    }
}
