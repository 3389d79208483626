//! Strategy based on markup conventions.
//!
//! Works on any page, including production builds without a render tree, but
//! only as well as the markup's naming discipline.

use lazy_static::lazy_static;
use pinpoint_core::{ComponentInfo, DetectionMethod, ElementId, HeuristicSettings, Page};
use regex::Regex;
use tracing::warn;

use crate::strategy::{ComponentStrategy, StrategyResult};

lazy_static! {
    /// CSS-module classes: `Button_root__a1b2c`, `Card-module__title___x9`
    static ref CSS_MODULE_CLASS: Regex =
        Regex::new(r"^(?P<name>[A-Z][A-Za-z0-9]*)(?:-module)?_{1,2}[A-Za-z0-9]").unwrap();

    /// BEM block with an element or modifier: `user-card__avatar`, `menu--open`
    static ref BEM_CLASS: Regex =
        Regex::new(r"^(?P<name>[a-z][a-z0-9]*(?:-[a-z0-9]+)*)(?:__|--)[a-z0-9]").unwrap();

    /// Bare PascalCase with at least two words: `UserCard`, `NavBar`
    static ref PASCAL_CLASS: Regex =
        Regex::new(r"^(?P<name>[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]*)+)$").unwrap();

    /// Word boundaries inside ids and class names
    static ref WORD_SPLIT: Regex = Regex::new(r"[-_.:\s]+|([a-z0-9])([A-Z])").unwrap();
}

/// ARIA roles and semantic tags recognized as UI roles, with display names.
const ROLE_NAMES: &[(&str, &str)] = &[
    ("button", "Button"),
    ("link", "Link"),
    ("a", "Link"),
    ("navigation", "Navigation"),
    ("nav", "Navigation"),
    ("dialog", "Dialog"),
    ("alertdialog", "Dialog"),
    ("form", "Form"),
    ("banner", "Header"),
    ("header", "Header"),
    ("contentinfo", "Footer"),
    ("footer", "Footer"),
    ("main", "Main"),
    ("complementary", "Aside"),
    ("aside", "Aside"),
    ("table", "Table"),
    ("grid", "Table"),
    ("menu", "Menu"),
    ("menubar", "Menu"),
    ("tab", "Tab"),
    ("tablist", "Tabs"),
];

/// What made an element match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Evidence {
    NameAttribute,
    TestId,
    ClassName,
    Role,
}

impl Evidence {
    fn as_str(&self) -> &'static str {
        match self {
            Evidence::NameAttribute => "name-attribute",
            Evidence::TestId => "test-id",
            Evidence::ClassName => "class-name",
            Evidence::Role => "role",
        }
    }
}

struct Match {
    name: String,
    evidence: Evidence,
    source: String,
    value: String,
}

/// Names the nearest element (self or ancestor) that carries a recognizable
/// naming convention.
pub struct HeuristicStrategy {
    max_ancestor_depth: usize,
    name_attributes: Vec<String>,
    test_id_attributes: Vec<String>,
    class_patterns: Vec<Regex>,
}

impl HeuristicStrategy {
    /// Create a heuristic strategy with default settings.
    pub fn new() -> Self {
        Self::from_settings(&HeuristicSettings::default())
    }

    /// Create a heuristic strategy from configuration.
    ///
    /// Patterns that fail to compile are logged and skipped.
    pub fn from_settings(settings: &HeuristicSettings) -> Self {
        let class_patterns = settings
            .class_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(pattern = %pattern, error = %err, "ignoring invalid class pattern");
                    None
                }
            })
            .collect();

        Self {
            max_ancestor_depth: settings.max_ancestor_depth,
            name_attributes: settings.name_attributes.clone(),
            test_id_attributes: settings.test_id_attributes.clone(),
            class_patterns,
        }
    }

    /// Turn `save-button`, `save_button` or `saveButton` into `SaveButton`.
    pub fn humanize(raw: &str) -> String {
        let spaced = WORD_SPLIT.replace_all(raw, "$1 $2");
        spaced
            .split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect()
    }

    fn by_attributes(
        &self,
        page: &dyn Page,
        element: ElementId,
        attributes: &[String],
        evidence: Evidence,
    ) -> Option<Match> {
        attributes.iter().find_map(|attr| {
            let value = page.attribute(element, attr)?.trim();
            let name = match evidence {
                Evidence::NameAttribute => value.to_string(),
                _ => Self::humanize(value),
            };
            (!name.is_empty()).then(|| Match {
                name,
                evidence,
                source: attr.clone(),
                value: value.to_string(),
            })
        })
    }

    fn by_class(&self, page: &dyn Page, element: ElementId) -> Option<Match> {
        let builtin: [&Regex; 3] = [&*CSS_MODULE_CLASS, &*BEM_CLASS, &*PASCAL_CLASS];
        for class in page.classes(element) {
            let patterns = self.class_patterns.iter().chain(builtin);
            for pattern in patterns {
                let Some(caps) = pattern.captures(class) else {
                    continue;
                };
                let Some(raw) = caps.name("name").or_else(|| caps.get(1)) else {
                    continue;
                };
                let name = Self::humanize(raw.as_str());
                if !name.is_empty() {
                    return Some(Match {
                        name,
                        evidence: Evidence::ClassName,
                        source: "class".to_string(),
                        value: class.to_string(),
                    });
                }
            }
        }
        None
    }

    fn by_role(&self, page: &dyn Page, element: ElementId) -> Option<Match> {
        let lookup = |key: &str| {
            ROLE_NAMES
                .iter()
                .find(|(role, _)| role.eq_ignore_ascii_case(key))
                .map(|(_, name)| *name)
        };

        if let Some(role) = page.attribute(element, "role") {
            if let Some(name) = lookup(role.trim()) {
                return Some(Match {
                    name: name.to_string(),
                    evidence: Evidence::Role,
                    source: "role".to_string(),
                    value: role.trim().to_string(),
                });
            }
        }

        let tag = page.tag_name(element)?;
        lookup(tag).map(|name| Match {
            name: name.to_string(),
            evidence: Evidence::Role,
            source: "tag".to_string(),
            value: tag.to_string(),
        })
    }

    fn inspect(&self, page: &dyn Page, element: ElementId) -> Option<Match> {
        self.by_attributes(page, element, &self.name_attributes, Evidence::NameAttribute)
            .or_else(|| {
                self.by_attributes(page, element, &self.test_id_attributes, Evidence::TestId)
            })
            .or_else(|| self.by_class(page, element))
            .or_else(|| self.by_role(page, element))
    }
}

impl Default for HeuristicStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentStrategy for HeuristicStrategy {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Heuristic
    }

    fn resolve(&self, page: &dyn Page, element: ElementId) -> StrategyResult {
        let mut current = Some(element);
        let mut depth = 0usize;

        while let Some(node) = current {
            if depth > self.max_ancestor_depth {
                break;
            }
            if let Some(found) = self.inspect(page, node) {
                let mut info = ComponentInfo::new(found.name, element, self.method())
                    .with_prop("matchedBy", found.evidence.as_str())
                    .with_prop("attribute", found.source)
                    .with_prop("value", found.value)
                    .with_prop("ancestorDepth", depth);
                if let Some(tag) = page.tag_name(node) {
                    info = info.with_prop("tag", tag);
                }
                return Ok(Some(info));
            }
            current = page.parent(node);
            depth += 1;
        }

        Ok(None)
    }
}
