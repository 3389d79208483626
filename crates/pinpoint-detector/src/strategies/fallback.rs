//! Terminal strategy: always produces a result from the tag name.

use pinpoint_core::{ComponentInfo, DetectionMethod, ElementId, Page};

use crate::strategy::{ComponentStrategy, StrategyResult};

/// Longest text preview attached to a fallback result.
const TEXT_PREVIEW_CHARS: usize = 40;

/// Labels the element by its tag, id and first class (`div#root`, `span.badge`).
pub struct FallbackStrategy;

impl FallbackStrategy {
    /// Create a new fallback strategy.
    pub fn new() -> Self {
        Self
    }

    /// Synthesize a generic description of `element`. Never fails.
    pub fn describe(page: &dyn Page, element: ElementId) -> ComponentInfo {
        let tag = page
            .tag_name(element)
            .filter(|tag| !tag.is_empty())
            .unwrap_or(ComponentInfo::UNNAMED);

        let mut label = tag.to_string();
        if let Some(id) = page.attribute(element, "id").map(str::trim).filter(|id| !id.is_empty()) {
            label.push('#');
            label.push_str(id);
        } else if let Some(class) = page.classes(element).first() {
            label.push('.');
            label.push_str(class);
        }

        let mut info =
            ComponentInfo::new(label, element, DetectionMethod::Fallback).with_prop("tag", tag);
        if let Some(text) = page.text_content(element).map(str::trim).filter(|t| !t.is_empty()) {
            let preview: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
            info = info.with_prop("text", preview);
        }
        info
    }
}

impl Default for FallbackStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentStrategy for FallbackStrategy {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Fallback
    }

    fn resolve(&self, page: &dyn Page, element: ElementId) -> StrategyResult {
        Ok(Some(Self::describe(page, element)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinpoint_core::Document;

    #[test]
    fn test_plain_tag() {
        let mut doc = Document::new();
        let div = doc.append(None, "DIV");
        let info = FallbackStrategy::new().resolve(&doc, div).unwrap().unwrap();
        assert_eq!(info.name, "div");
        assert_eq!(info.detection_method, DetectionMethod::Fallback);
        assert_eq!(info.props.unwrap()["tag"], "div");
    }

    #[test]
    fn test_id_takes_precedence_over_class() {
        let mut doc = Document::new();
        let div = doc.append(None, "div");
        doc.set_attribute(div, "id", "root");
        doc.set_attribute(div, "class", "app shell");
        assert_eq!(FallbackStrategy::describe(&doc, div).name, "div#root");
    }

    #[test]
    fn test_first_class_label() {
        let mut doc = Document::new();
        let span = doc.append(None, "span");
        doc.set_attribute(span, "class", "badge badge-new");
        assert_eq!(FallbackStrategy::describe(&doc, span).name, "span.badge");
    }

    #[test]
    fn test_text_preview_is_truncated() {
        let mut doc = Document::new();
        let p = doc.append(None, "p");
        doc.set_text(p, "x".repeat(100));
        let info = FallbackStrategy::describe(&doc, p);
        let text = info.props.unwrap()["text"].as_str().unwrap().to_string();
        assert_eq!(text.len(), TEXT_PREVIEW_CHARS);
    }

    #[test]
    fn test_unknown_element_gets_placeholder() {
        let doc = Document::new();
        let info = FallbackStrategy::describe(&doc, ElementId::new(77));
        assert_eq!(info.name, ComponentInfo::UNNAMED);
    }
}
