//! Read-only view of the live page that detection strategies inspect.
//!
//! Everything here is best-effort: a page may expose no introspection hook and
//! no render tree, in which case the corresponding strategies simply decline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Point, Props, SourceLocation};

/// Identity handle for a DOM element.
///
/// Equality is node identity. Holding an id never keeps the node alive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ElementId(u64);

impl ElementId {
    /// Wrap a raw handle value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a node in the rendering library's internal tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RenderNodeId(pub usize);

/// Kind of a render-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RenderNodeKind {
    /// Built-in primitive backed by a DOM element (`div`, `button`)
    Host,
    /// Text node
    Text,
    /// Function component
    Function,
    /// Class component
    Class,
    /// Forward-ref wrapper
    ForwardRef,
    /// Memoized wrapper
    Memo,
    /// Fragment
    Fragment,
    /// Context provider or consumer
    Context,
    /// Suspense boundary
    Suspense,
    /// Anything else the library tracks
    Other,
}

impl RenderNodeKind {
    /// Whether nodes of this kind can be user-defined components.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            RenderNodeKind::Function
                | RenderNodeKind::Class
                | RenderNodeKind::ForwardRef
                | RenderNodeKind::Memo
        )
    }
}

/// Node of the rendering library's internal tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderNode {
    /// Node kind
    pub kind: RenderNodeKind,
    /// Display name (component name, or tag for host nodes)
    #[serde(default)]
    pub name: Option<String>,
    /// Parent node (the node that rendered this one)
    #[serde(default)]
    pub parent: Option<RenderNodeId>,
    /// Props the node was rendered with
    #[serde(default)]
    pub props: Props,
    /// Debug source location, when the build keeps it
    #[serde(default)]
    pub source: Option<SourceLocation>,
}

impl RenderNode {
    /// Create a node with no props or source.
    pub fn new(kind: RenderNodeKind, name: impl Into<String>, parent: Option<RenderNodeId>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            parent,
            props: Props::new(),
            source: None,
        }
    }
}

/// What the introspection hook knows about an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookRecord {
    /// Authoring-time component name
    pub name: String,
    /// Owner chain, outermost first
    #[serde(default)]
    pub owners: Vec<String>,
    /// Props
    #[serde(default)]
    pub props: Props,
    /// Source location
    #[serde(default)]
    pub source: Option<SourceLocation>,
}

/// Failure reported by an introspection hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// Hook is installed but no renderer is attached
    #[error("no renderer attached to introspection hook")]
    NoRenderer,
    /// Hook speaks a protocol version we cannot read
    #[error("unsupported hook version: {0}")]
    UnsupportedVersion(String),
    /// Hook threw while inspecting
    #[error("introspection failed: {0}")]
    Failed(String),
}

/// Host-provided debugging hook.
pub trait IntrospectionHook {
    /// Map an element to its authoring-time component.
    ///
    /// `Ok(None)` means the hook has no record for the element.
    fn inspect(&self, element: ElementId) -> Result<Option<HookRecord>, HookError>;
}

/// Read-only, best-effort view of the page.
pub trait Page {
    /// Whether the element is still attached to the document.
    fn is_connected(&self, element: ElementId) -> bool;

    /// Lowercase tag name.
    fn tag_name(&self, element: ElementId) -> Option<&str>;

    /// Attribute value.
    fn attribute(&self, element: ElementId, name: &str) -> Option<&str>;

    /// Parent element.
    fn parent(&self, element: ElementId) -> Option<ElementId>;

    /// Topmost attached element under a viewport point.
    fn element_from_point(&self, point: Point) -> Option<ElementId>;

    /// Own text content.
    fn text_content(&self, _element: ElementId) -> Option<&str> {
        None
    }

    /// Introspection hook, if the page exposes one.
    fn introspection_hook(&self) -> Option<&dyn IntrospectionHook> {
        None
    }

    /// Render node attached to a DOM element, if the rendering library left one.
    fn render_node_for(&self, _element: ElementId) -> Option<RenderNodeId> {
        None
    }

    /// Render node by id.
    fn render_node(&self, _id: RenderNodeId) -> Option<&RenderNode> {
        None
    }

    /// Class tokens of the element.
    fn classes(&self, element: ElementId) -> Vec<&str> {
        self.attribute(element, "class")
            .map(|class| class.split_whitespace().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_id_identity() {
        assert_eq!(ElementId::new(4), ElementId::new(4));
        assert_ne!(ElementId::new(4), ElementId::new(5));
        assert_eq!(ElementId::new(4).to_string(), "#4");
    }

    #[test]
    fn test_composite_kinds() {
        assert!(RenderNodeKind::Function.is_composite());
        assert!(RenderNodeKind::Class.is_composite());
        assert!(RenderNodeKind::Memo.is_composite());
        assert!(RenderNodeKind::ForwardRef.is_composite());
        assert!(!RenderNodeKind::Host.is_composite());
        assert!(!RenderNodeKind::Fragment.is_composite());
        assert!(!RenderNodeKind::Context.is_composite());
    }

    #[test]
    fn test_hook_error_display() {
        assert_eq!(
            HookError::UnsupportedVersion("19.1".to_string()).to_string(),
            "unsupported hook version: 19.1"
        );
    }
}
