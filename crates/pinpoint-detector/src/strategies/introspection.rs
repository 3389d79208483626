//! Strategy backed by the page's debugging hook.

use pinpoint_core::{ComponentInfo, DetectionMethod, ElementId, Page};

use crate::strategy::{ComponentStrategy, StrategyResult};

/// Asks the host's introspection hook which component rendered the element.
///
/// The hook is consulted for the element first, then for its ancestors, since
/// hooks usually only know about component root nodes.
pub struct IntrospectionStrategy {
    max_ancestor_depth: usize,
}

impl IntrospectionStrategy {
    /// Create a new introspection strategy.
    pub fn new() -> Self {
        Self {
            max_ancestor_depth: 16,
        }
    }

    /// Limit how many ancestors are looked up.
    pub fn with_max_ancestor_depth(mut self, depth: usize) -> Self {
        self.max_ancestor_depth = depth;
        self
    }
}

impl Default for IntrospectionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentStrategy for IntrospectionStrategy {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Introspection
    }

    fn resolve(&self, page: &dyn Page, element: ElementId) -> StrategyResult {
        let Some(hook) = page.introspection_hook() else {
            return Ok(None);
        };

        let mut current = Some(element);
        let mut depth = 0;
        while let Some(node) = current {
            if depth > self.max_ancestor_depth {
                break;
            }
            if let Some(record) = hook.inspect(node)? {
                if !record.name.trim().is_empty() {
                    let info = ComponentInfo::new(record.name, element, self.method())
                        .with_props(record.props)
                        .with_source(record.source)
                        .with_tree_path(record.owners);
                    return Ok(Some(info));
                }
            }
            current = page.parent(node);
            depth += 1;
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyError;
    use pinpoint_core::{Document, HookError, HookRecord, SourceLocation};

    fn record(name: &str) -> HookRecord {
        HookRecord {
            name: name.to_string(),
            owners: vec!["App".to_string(), "Toolbar".to_string()],
            props: [("variant".to_string(), serde_json::json!("primary"))]
                .into_iter()
                .collect(),
            source: Some(SourceLocation::new("src/SaveButton.tsx", 8)),
        }
    }

    #[test]
    fn test_declines_without_hook() {
        let mut doc = Document::new();
        let div = doc.append(None, "div");
        assert_eq!(IntrospectionStrategy::new().resolve(&doc, div), Ok(None));
    }

    #[test]
    fn test_resolves_direct_record() {
        let mut doc = Document::new();
        let button = doc.append(None, "button");
        doc.set_hook_record(button, record("SaveButton"));

        let info = IntrospectionStrategy::new()
            .resolve(&doc, button)
            .unwrap()
            .unwrap();
        assert_eq!(info.name, "SaveButton");
        assert_eq!(info.element, button);
        assert_eq!(info.detection_method, DetectionMethod::Introspection);
        assert_eq!(info.tree_path, vec!["App", "Toolbar"]);
        assert_eq!(info.props.unwrap()["variant"], "primary");
        assert_eq!(info.source.unwrap().line, Some(8));
    }

    #[test]
    fn test_resolves_through_ancestor() {
        let mut doc = Document::new();
        let button = doc.append(None, "button");
        let label = doc.append(Some(button), "span");
        doc.set_hook_record(button, record("SaveButton"));

        let info = IntrospectionStrategy::new()
            .resolve(&doc, label)
            .unwrap()
            .unwrap();
        assert_eq!(info.name, "SaveButton");
        assert_eq!(info.element, label);
    }

    #[test]
    fn test_respects_ancestor_depth() {
        let mut doc = Document::new();
        let outer = doc.append(None, "section");
        let middle = doc.append(Some(outer), "div");
        let inner = doc.append(Some(middle), "span");
        doc.set_hook_record(outer, record("Panel"));

        let strategy = IntrospectionStrategy::new().with_max_ancestor_depth(1);
        assert_eq!(strategy.resolve(&doc, inner), Ok(None));
    }

    #[test]
    fn test_blank_record_name_declines() {
        let mut doc = Document::new();
        let div = doc.append(None, "div");
        doc.set_hook_record(div, record("  "));
        assert_eq!(IntrospectionStrategy::new().resolve(&doc, div), Ok(None));
    }

    #[test]
    fn test_hook_failure_is_a_fault() {
        let mut doc = Document::new();
        let div = doc.append(None, "div");
        doc.fail_hook(HookError::NoRenderer);
        assert_eq!(
            IntrospectionStrategy::new().resolve(&doc, div),
            Err(StrategyError::Hook(HookError::NoRenderer))
        );
    }
}
