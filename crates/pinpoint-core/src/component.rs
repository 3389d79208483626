//! Component metadata produced by detection.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ElementId;

/// Structured key/value metadata attached to a component.
pub type Props = BTreeMap<String, serde_json::Value>;

/// Which strategy produced a [`ComponentInfo`].
///
/// Variants are declared in chain order, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    /// Host-provided debugging hook
    Introspection,
    /// Rendering library's internal node graph
    TreeWalk,
    /// DOM attribute and class-name conventions
    Heuristic,
    /// Tag name only; always succeeds
    Fallback,
}

impl DetectionMethod {
    /// All methods in canonical chain order.
    pub const ALL: [DetectionMethod; 4] = [
        DetectionMethod::Introspection,
        DetectionMethod::TreeWalk,
        DetectionMethod::Heuristic,
        DetectionMethod::Fallback,
    ];

    /// Wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Introspection => "introspection",
            DetectionMethod::TreeWalk => "tree-walk",
            DetectionMethod::Heuristic => "heuristic",
            DetectionMethod::Fallback => "fallback",
        }
    }

    /// Confidence implied by a match from this method.
    pub fn confidence(&self) -> Confidence {
        match self {
            DetectionMethod::Introspection => Confidence::High,
            DetectionMethod::TreeWalk => Confidence::Medium,
            DetectionMethod::Heuristic => Confidence::Low,
            DetectionMethod::Fallback => Confidence::Guess,
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal trust in a detection result.
///
/// Not a score: only comparisons between results are meaningful.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Synthesized from the tag name
    Guess,
    /// Inferred from markup conventions
    Low,
    /// Read from the rendering library's internals
    Medium,
    /// Reported by the introspection hook
    High,
}

/// Authoring-time source position of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceLocation {
    /// Source file path
    pub file: String,
    /// 1-based line number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl SourceLocation {
    /// Create a location pointing at a line of a file.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: None,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// Normalized result of resolving an element to its owning component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInfo {
    /// Human-readable component name; never empty
    pub name: String,
    /// The element this metadata describes (non-owning)
    pub element: ElementId,
    /// Component props, when the strategy can read them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Props>,
    /// Source location, when introspectable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLocation>,
    /// Owner chain from the outermost component down to this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tree_path: Vec<String>,
    /// Strategy that produced this result
    pub detection_method: DetectionMethod,
    /// Ordinal trust implied by the strategy
    pub confidence: Confidence,
}

impl ComponentInfo {
    /// Placeholder used if a caller passes an empty name.
    pub const UNNAMED: &'static str = "element";

    /// Create a result for `element` produced by `method`.
    ///
    /// A blank name is replaced with [`ComponentInfo::UNNAMED`].
    pub fn new(name: impl Into<String>, element: ElementId, method: DetectionMethod) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            Self::UNNAMED.to_string()
        } else {
            name.trim().to_string()
        };

        Self {
            name,
            element,
            props: None,
            source: None,
            tree_path: Vec::new(),
            detection_method: method,
            confidence: method.confidence(),
        }
    }

    /// Attach a full props map. An empty map is stored as `None`.
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = if props.is_empty() { None } else { Some(props) };
        self
    }

    /// Attach a single prop.
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.props
            .get_or_insert_with(Props::new)
            .insert(key.into(), value.into());
        self
    }

    /// Attach a source location.
    pub fn with_source(mut self, source: Option<SourceLocation>) -> Self {
        self.source = source;
        self
    }

    /// Attach the owner chain.
    pub fn with_tree_path(mut self, path: Vec<String>) -> Self {
        self.tree_path = path;
        self
    }

    /// Whether this result should replace `other` as the better candidate.
    pub fn is_better_than(&self, other: &ComponentInfo) -> bool {
        self.confidence > other.confidence
    }

    /// Owner chain rendered as `App > Toolbar > SaveButton`.
    pub fn display_path(&self) -> String {
        if self.tree_path.is_empty() {
            return self.name.clone();
        }
        let mut path = self.tree_path.join(" > ");
        if self.tree_path.last() != Some(&self.name) {
            path.push_str(" > ");
            path.push_str(&self.name);
        }
        path
    }
}
