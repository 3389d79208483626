//! In-memory page used by tests, benchmarks and scenario replay.
//!
//! A [`Document`] is built either programmatically or from a YAML
//! [`DocumentFixture`]. Structure is fixed once built; only attachment state
//! can change afterwards (see [`Document::detach`]), mirroring how the engine
//! observes a live page it does not own.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::page::{HookError, HookRecord, IntrospectionHook, RenderNode, RenderNodeId};
use crate::{ElementId, Error, Page, Point, Props, Rect, RenderNodeKind, Result, SourceLocation};

#[derive(Debug)]
struct NodeData {
    tag: String,
    attributes: BTreeMap<String, String>,
    parent: Option<ElementId>,
    text: Option<String>,
    rect: Option<Rect>,
    depth: usize,
    connected: Cell<bool>,
}

/// Introspection hook backed by a fixed table of records.
#[derive(Debug, Default)]
struct StaticHook {
    records: HashMap<ElementId, HookRecord>,
    error: Option<HookError>,
}

impl IntrospectionHook for StaticHook {
    fn inspect(&self, element: ElementId) -> std::result::Result<Option<HookRecord>, HookError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(self.records.get(&element).cloned())
    }
}

/// In-memory [`Page`] implementation.
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<NodeData>,
    keys: HashMap<String, ElementId>,
    render_nodes: Vec<RenderNode>,
    render_links: HashMap<ElementId, RenderNodeId>,
    hook: Option<StaticHook>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements ever added (attached or not).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document has no elements.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All element ids in document order.
    pub fn elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        (1..=self.nodes.len() as u64).map(ElementId::new)
    }

    fn node(&self, id: ElementId) -> Option<&NodeData> {
        let index = usize::try_from(id.raw()).ok()?.checked_sub(1)?;
        self.nodes.get(index)
    }

    fn node_mut(&mut self, id: ElementId) -> Option<&mut NodeData> {
        let index = usize::try_from(id.raw()).ok()?.checked_sub(1)?;
        self.nodes.get_mut(index)
    }

    /// Append an element under `parent` (or as a root) and return its id.
    pub fn append(&mut self, parent: Option<ElementId>, tag: &str) -> ElementId {
        let depth = parent
            .and_then(|p| self.node(p))
            .map(|p| p.depth + 1)
            .unwrap_or(0);
        self.nodes.push(NodeData {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            parent,
            text: None,
            rect: None,
            depth,
            connected: Cell::new(true),
        });
        ElementId::new(self.nodes.len() as u64)
    }

    /// Set an attribute.
    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: impl Into<String>) {
        if let Some(node) = self.node_mut(id) {
            node.attributes.insert(name.to_string(), value.into());
        }
    }

    /// Set own text content.
    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) {
        if let Some(node) = self.node_mut(id) {
            node.text = Some(text.into());
        }
    }

    /// Set the element's box for hit testing.
    pub fn set_rect(&mut self, id: ElementId, rect: Rect) {
        if let Some(node) = self.node_mut(id) {
            node.rect = Some(rect);
        }
    }

    /// Register a lookup key for an element.
    pub fn set_key(&mut self, id: ElementId, key: impl Into<String>) {
        self.keys.insert(key.into(), id);
    }

    /// Look up an element by key.
    pub fn element(&self, key: &str) -> Option<ElementId> {
        self.keys.get(key).copied()
    }

    /// Look up an element by key, failing if absent.
    pub fn require(&self, key: &str) -> Result<ElementId> {
        self.element(key)
            .ok_or_else(|| Error::ElementNotFound(key.to_string()))
    }

    /// Add a node to the render tree.
    pub fn add_render_node(&mut self, node: RenderNode) -> RenderNodeId {
        self.render_nodes.push(node);
        RenderNodeId(self.render_nodes.len() - 1)
    }

    /// Attach a render node to a DOM element.
    pub fn link_render_node(&mut self, element: ElementId, node: RenderNodeId) {
        self.render_links.insert(element, node);
    }

    /// Install an (empty) introspection hook.
    pub fn install_hook(&mut self) {
        self.hook.get_or_insert_with(StaticHook::default);
    }

    /// Record what the introspection hook reports for an element.
    pub fn set_hook_record(&mut self, element: ElementId, record: HookRecord) {
        self.hook
            .get_or_insert_with(StaticHook::default)
            .records
            .insert(element, record);
    }

    /// Make every hook lookup fail with `error`.
    pub fn fail_hook(&mut self, error: HookError) {
        self.hook.get_or_insert_with(StaticHook::default).error = Some(error);
    }

    /// Detach an element (and with it, its subtree) from the document.
    pub fn detach(&self, id: ElementId) {
        if let Some(node) = self.node(id) {
            node.connected.set(false);
        }
    }

    /// Re-attach a previously detached element.
    pub fn reattach(&self, id: ElementId) {
        if let Some(node) = self.node(id) {
            node.connected.set(true);
        }
    }

    /// Load a document from a YAML fixture file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a document from a YAML fixture string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let fixture: DocumentFixture = serde_yaml::from_str(yaml)?;
        Self::from_fixture(&fixture)
    }

    /// Build a document from a parsed fixture.
    pub fn from_fixture(fixture: &DocumentFixture) -> Result<Self> {
        let mut doc = Document::new();

        for element in &fixture.elements {
            doc.add_fixture_element(None, element)?;
        }

        let mut render_keys: HashMap<&str, RenderNodeId> = HashMap::new();
        for (index, node) in fixture.render_tree.iter().enumerate() {
            if render_keys.insert(node.key.as_str(), RenderNodeId(index)).is_some() {
                return Err(Error::InvalidFixture(format!(
                    "duplicate render node key: {}",
                    node.key
                )));
            }
        }

        for node in &fixture.render_tree {
            let parent = match &node.parent {
                Some(key) => Some(*render_keys.get(key.as_str()).ok_or_else(|| {
                    Error::InvalidFixture(format!("unknown render node parent: {key}"))
                })?),
                None => None,
            };
            let id = doc.add_render_node(RenderNode {
                kind: node.kind,
                name: node.name.clone(),
                parent,
                props: node.props.clone(),
                source: node.source.clone(),
            });
            if let Some(key) = &node.element {
                let element = doc.require(key)?;
                doc.link_render_node(element, id);
            }
        }

        if let Some(hook) = &fixture.hook {
            doc.install_hook();
            for (key, record) in &hook.records {
                let element = doc.require(key)?;
                doc.set_hook_record(element, record.clone());
            }
            if let Some(message) = &hook.error {
                doc.fail_hook(HookError::Failed(message.clone()));
            }
        }

        Ok(doc)
    }

    fn add_fixture_element(
        &mut self,
        parent: Option<ElementId>,
        fixture: &ElementFixture,
    ) -> Result<()> {
        let id = self.append(parent, &fixture.tag);
        if let Some(key) = &fixture.key {
            if self.keys.contains_key(key) {
                return Err(Error::InvalidFixture(format!("duplicate element key: {key}")));
            }
            self.set_key(id, key.clone());
        }
        for (name, value) in &fixture.attributes {
            self.set_attribute(id, name, value.clone());
        }
        if let Some(text) = &fixture.text {
            self.set_text(id, text.clone());
        }
        if let Some(rect) = fixture.rect {
            self.set_rect(id, rect);
        }
        for child in &fixture.children {
            self.add_fixture_element(Some(id), child)?;
        }
        if fixture.detached {
            self.detach(id);
        }
        Ok(())
    }
}

impl Page for Document {
    fn is_connected(&self, element: ElementId) -> bool {
        let mut current = Some(element);
        while let Some(id) = current {
            match self.node(id) {
                Some(node) if node.connected.get() => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    fn tag_name(&self, element: ElementId) -> Option<&str> {
        self.node(element).map(|n| n.tag.as_str())
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<&str> {
        self.node(element)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }

    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.node(element).and_then(|n| n.parent)
    }

    fn element_from_point(&self, point: Point) -> Option<ElementId> {
        // Deepest hit wins; among equal depth, later siblings paint on top.
        self.elements()
            .filter(|&id| self.is_connected(id))
            .filter_map(|id| {
                let node = self.node(id)?;
                let rect = node.rect?;
                rect.contains(&point).then_some((node.depth, id))
            })
            .max()
            .map(|(_, id)| id)
    }

    fn text_content(&self, element: ElementId) -> Option<&str> {
        self.node(element).and_then(|n| n.text.as_deref())
    }

    fn introspection_hook(&self) -> Option<&dyn IntrospectionHook> {
        self.hook.as_ref().map(|h| h as &dyn IntrospectionHook)
    }

    fn render_node_for(&self, element: ElementId) -> Option<RenderNodeId> {
        self.render_links.get(&element).copied()
    }

    fn render_node(&self, id: RenderNodeId) -> Option<&RenderNode> {
        self.render_nodes.get(id.0)
    }
}

/// Declarative description of a page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentFixture {
    /// Root elements (with nested children)
    pub elements: Vec<ElementFixture>,
    /// Render tree nodes, in any order
    pub render_tree: Vec<RenderNodeFixture>,
    /// Introspection hook, absent when the page exposes none
    pub hook: Option<HookFixture>,
}

/// One element of a [`DocumentFixture`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementFixture {
    /// Lookup key
    #[serde(default)]
    pub key: Option<String>,
    /// Tag name
    pub tag: String,
    /// Attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Own text
    #[serde(default)]
    pub text: Option<String>,
    /// Hit-test box
    #[serde(default)]
    pub rect: Option<Rect>,
    /// Start detached from the document
    #[serde(default)]
    pub detached: bool,
    /// Child elements
    #[serde(default)]
    pub children: Vec<ElementFixture>,
}

/// One render-tree node of a [`DocumentFixture`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderNodeFixture {
    /// Key used by `parent` references
    pub key: String,
    /// Node kind
    pub kind: RenderNodeKind,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Parent node key
    #[serde(default)]
    pub parent: Option<String>,
    /// Props
    #[serde(default)]
    pub props: Props,
    /// Source location
    #[serde(default)]
    pub source: Option<SourceLocation>,
    /// Element key this node is attached to
    #[serde(default)]
    pub element: Option<String>,
}

/// Introspection hook section of a [`DocumentFixture`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookFixture {
    /// Records keyed by element key
    pub records: BTreeMap<String, HookRecord>,
    /// Make every lookup fail with this message
    pub error: Option<String>,
}
