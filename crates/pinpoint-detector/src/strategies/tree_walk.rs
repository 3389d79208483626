//! Strategy that walks the rendering library's internal node graph.

use lazy_static::lazy_static;
use pinpoint_core::{
    ComponentInfo, DetectionMethod, ElementId, Page, RenderNode, RenderNodeId, TreeWalkSettings,
};
use regex::Regex;

use crate::strategy::{ComponentStrategy, StrategyError, StrategyResult};

lazy_static! {
    /// `ForwardRef(Button)`, `Memo(Card)`, `withRouter(Nav)`
    static ref WRAPPED_NAME: Regex = Regex::new(r"^[A-Za-z_$][\w$]*\((.+)\)$").unwrap();
}

/// Suffixes of library-internal component names.
const INTERNAL_SUFFIXES: &[&str] = &["Provider", "Consumer", "Context"];

/// Walks outward from the element's render node to the nearest
/// user-defined component.
pub struct TreeWalkStrategy {
    max_depth: usize,
    ignored_names: Vec<String>,
}

impl TreeWalkStrategy {
    /// Create a tree-walk strategy with default settings.
    pub fn new() -> Self {
        Self::from_settings(&TreeWalkSettings::default())
    }

    /// Create a tree-walk strategy from configuration.
    pub fn from_settings(settings: &TreeWalkSettings) -> Self {
        Self {
            max_depth: settings.max_depth,
            ignored_names: settings.ignored_names.clone(),
        }
    }

    /// Strip wrapper notation down to the innermost name.
    fn unwrap_name(name: &str) -> &str {
        let mut current = name.trim();
        while let Some(inner) = WRAPPED_NAME
            .captures(current)
            .and_then(|caps| caps.get(1))
        {
            current = inner.as_str().trim();
        }
        current
    }

    /// Name of the node if it looks like a user-defined component.
    fn component_name<'a>(&self, node: &'a RenderNode) -> Option<&'a str> {
        if !node.kind.is_composite() {
            return None;
        }
        let name = Self::unwrap_name(node.name.as_deref()?);
        let user_defined = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        if !user_defined
            || self.ignored_names.iter().any(|ignored| ignored == name)
            || INTERNAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        {
            return None;
        }
        Some(name)
    }

    fn lookup<'p>(page: &'p dyn Page, id: RenderNodeId) -> Result<&'p RenderNode, StrategyError> {
        page.render_node(id).ok_or_else(|| {
            StrategyError::BrokenRenderTree(format!("dangling render node {}", id.0))
        })
    }

    /// Names of qualifying components above `start`, outermost first.
    fn owner_path(&self, page: &dyn Page, start: Option<RenderNodeId>, budget: usize) -> Vec<String> {
        let mut owners = Vec::new();
        let mut current = start;
        let mut steps = 0;
        while let Some(id) = current {
            if steps >= budget {
                break;
            }
            let Some(node) = page.render_node(id) else {
                break;
            };
            if let Some(name) = self.component_name(node) {
                owners.push(name.to_string());
            }
            current = node.parent;
            steps += 1;
        }
        owners.reverse();
        owners
    }
}

impl Default for TreeWalkStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentStrategy for TreeWalkStrategy {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::TreeWalk
    }

    fn resolve(&self, page: &dyn Page, element: ElementId) -> StrategyResult {
        let Some(mut current) = page.render_node_for(element) else {
            return Ok(None);
        };

        for depth in 0..self.max_depth {
            let node = Self::lookup(page, current)?;

            if let Some(name) = self.component_name(node) {
                let mut props = node.props.clone();
                props.remove("children");
                let owners =
                    self.owner_path(page, node.parent, self.max_depth.saturating_sub(depth + 1));
                let info = ComponentInfo::new(name, element, self.method())
                    .with_props(props)
                    .with_source(node.source.clone())
                    .with_tree_path(owners);
                return Ok(Some(info));
            }

            match node.parent {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinpoint_core::{Document, RenderNodeKind, SourceLocation};

    /// div > button, rendered by App > Toolbar > ForwardRef(SaveButton) > button
    fn fixture() -> (Document, ElementId) {
        let mut doc = Document::new();
        let root = doc.append(None, "div");
        let button = doc.append(Some(root), "button");

        let app = doc.add_render_node(RenderNode::new(RenderNodeKind::Function, "App", None));
        let provider = doc.add_render_node(RenderNode::new(
            RenderNodeKind::Context,
            "ThemeProvider",
            Some(app),
        ));
        let toolbar =
            doc.add_render_node(RenderNode::new(RenderNodeKind::Class, "Toolbar", Some(provider)));
        let mut save = RenderNode::new(
            RenderNodeKind::ForwardRef,
            "ForwardRef(SaveButton)",
            Some(toolbar),
        );
        save.props.insert("label".to_string(), serde_json::json!("Save"));
        save.props.insert("children".to_string(), serde_json::json!("Save"));
        save.source = Some(SourceLocation::new("src/SaveButton.tsx", 3));
        let save = doc.add_render_node(save);
        let host = doc.add_render_node(RenderNode::new(RenderNodeKind::Host, "button", Some(save)));
        doc.link_render_node(button, host);

        (doc, button)
    }

    #[test]
    fn test_declines_without_render_node() {
        let mut doc = Document::new();
        let div = doc.append(None, "div");
        assert_eq!(TreeWalkStrategy::new().resolve(&doc, div), Ok(None));
    }

    #[test]
    fn test_finds_nearest_user_component() {
        let (doc, button) = fixture();
        let info = TreeWalkStrategy::new().resolve(&doc, button).unwrap().unwrap();

        assert_eq!(info.name, "SaveButton");
        assert_eq!(info.element, button);
        assert_eq!(info.detection_method, DetectionMethod::TreeWalk);
        assert_eq!(info.tree_path, vec!["App", "Toolbar"]);
        assert_eq!(info.source.unwrap().file, "src/SaveButton.tsx");

        let props = info.props.unwrap();
        assert_eq!(props["label"], "Save");
        assert!(!props.contains_key("children"));
    }

    #[test]
    fn test_skips_lowercase_and_internal_names() {
        let mut doc = Document::new();
        let div = doc.append(None, "div");
        let page = doc.add_render_node(RenderNode::new(RenderNodeKind::Function, "Page", None));
        let suspense =
            doc.add_render_node(RenderNode::new(RenderNodeKind::Function, "Suspense", Some(page)));
        let ctx = doc.add_render_node(RenderNode::new(
            RenderNodeKind::Function,
            "AuthContext",
            Some(suspense),
        ));
        let helper =
            doc.add_render_node(RenderNode::new(RenderNodeKind::Function, "renderRow", Some(ctx)));
        let host = doc.add_render_node(RenderNode::new(RenderNodeKind::Host, "div", Some(helper)));
        doc.link_render_node(div, host);

        let info = TreeWalkStrategy::new().resolve(&doc, div).unwrap().unwrap();
        assert_eq!(info.name, "Page");
        assert!(info.tree_path.is_empty());
    }

    #[test]
    fn test_declines_when_only_primitives() {
        let mut doc = Document::new();
        let div = doc.append(None, "div");
        let outer = doc.add_render_node(RenderNode::new(RenderNodeKind::Host, "main", None));
        let host = doc.add_render_node(RenderNode::new(RenderNodeKind::Host, "div", Some(outer)));
        doc.link_render_node(div, host);

        assert_eq!(TreeWalkStrategy::new().resolve(&doc, div), Ok(None));
    }

    #[test]
    fn test_respects_max_depth() {
        let (doc, button) = fixture();
        let strategy = TreeWalkStrategy::from_settings(&TreeWalkSettings {
            max_depth: 1,
            ..TreeWalkSettings::default()
        });
        assert_eq!(strategy.resolve(&doc, button), Ok(None));
    }

    #[test]
    fn test_dangling_parent_is_a_fault() {
        let mut doc = Document::new();
        let div = doc.append(None, "div");
        let host = doc.add_render_node(RenderNode::new(
            RenderNodeKind::Host,
            "div",
            Some(RenderNodeId(99)),
        ));
        doc.link_render_node(div, host);

        assert!(matches!(
            TreeWalkStrategy::new().resolve(&doc, div),
            Err(StrategyError::BrokenRenderTree(_))
        ));
    }

    #[test]
    fn test_unwrap_name() {
        assert_eq!(TreeWalkStrategy::unwrap_name("Memo(Card)"), "Card");
        assert_eq!(TreeWalkStrategy::unwrap_name("withRouter(ForwardRef(Nav))"), "Nav");
        assert_eq!(TreeWalkStrategy::unwrap_name("Plain"), "Plain");
    }
}
