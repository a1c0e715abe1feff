//! # Resource trees
//!
//! A deserialized resource document is a mapping from string keys to either
//! scalar leaves or nested mappings. Leaves are addressed with dotted keys
//! (`menu.file.open`).
//!
//! Two interchangeable backings implement [`ResourceTree`]:
//! - [`NestedTree`] walks the mapping segment by segment on every lookup;
//! - [`FlatTree`] flattens the mapping once at load time for `O(1)` lookups.
//!
//! Both treat a *marker object* (a mapping carrying both [`MARKER_TEXT_FIELD`]
//! and [`MARKER_FIELD`]) as a leaf whose value is its text, so translation
//! metadata stored beside the text never leaks into lookups.
//!
//! Empty keys, empty segments (`a..b`) and missing branches are misses.
//! Document keys that themselves contain a `.` can never be addressed by a
//! dotted key; both backings leave them out.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::debug;

/// Field holding the translatable text of a marker object.
pub const MARKER_TEXT_FIELD: &str = "text";

/// Provenance field identifying a marker object.
pub const MARKER_FIELD: &str = "crowdinContext";

pub type ResourceMap = BTreeMap<String, ResourceValue>;

/// A node of a resource tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Map(Arc<ResourceMap>),
}

impl ResourceValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResourceValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ResourceMap> {
        match self {
            ResourceValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, ResourceValue::Map(_))
    }

    /// Converts a YAML node. Nulls and sequences have no counterpart and are
    /// dropped.
    pub fn from_yaml(value: serde_yaml::Value) -> Option<Self> {
        use serde_yaml::Value;
        match value {
            Value::String(s) => Some(ResourceValue::Text(s)),
            Value::Bool(b) => Some(ResourceValue::Bool(b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => ResourceValue::Integer(i),
                None => ResourceValue::Float(n.as_f64().unwrap_or_default()),
            }),
            Value::Mapping(mapping) => {
                let map = mapping
                    .into_iter()
                    .filter_map(|(k, v)| Some((yaml_key(k)?, ResourceValue::from_yaml(v)?)))
                    .collect();
                Some(ResourceValue::Map(Arc::new(map)))
            }
            Value::Tagged(tagged) => ResourceValue::from_yaml(tagged.value),
            Value::Null | Value::Sequence(_) => None,
        }
    }

    /// Converts a JSON node. Nulls and arrays are dropped.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::String(s) => Some(ResourceValue::Text(s)),
            Value::Bool(b) => Some(ResourceValue::Bool(b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => ResourceValue::Integer(i),
                None => ResourceValue::Float(n.as_f64().unwrap_or_default()),
            }),
            Value::Object(object) => {
                let map = object
                    .into_iter()
                    .filter_map(|(k, v)| Some((k, ResourceValue::from_json(v)?)))
                    .collect();
                Some(ResourceValue::Map(Arc::new(map)))
            }
            Value::Null | Value::Array(_) => None,
        }
    }
}

impl fmt::Display for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceValue::Text(s) => f.write_str(s),
            ResourceValue::Integer(i) => write!(f, "{i}"),
            ResourceValue::Float(x) => write!(f, "{x}"),
            ResourceValue::Bool(b) => write!(f, "{b}"),
            ResourceValue::Map(m) => write!(f, "{{{} entries}}", m.len()),
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;
    match key {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn marker_text(map: &ResourceMap) -> Option<&ResourceValue> {
    if map.contains_key(MARKER_FIELD) {
        map.get(MARKER_TEXT_FIELD).filter(|v| v.is_leaf())
    } else {
        None
    }
}

/// Splits a dotted key, rejecting empty keys and empty segments.
fn segments(key: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = key.split('.').collect();
    if key.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}

fn walk(root: &ResourceMap, key: &str) -> Option<ResourceValue> {
    let parts = segments(key)?;
    let (last, init) = parts.split_last()?;

    let mut current = root;
    for segment in init {
        match current.get(*segment)? {
            ResourceValue::Map(map) if marker_text(map).is_none() => current = map.as_ref(),
            _ => return None,
        }
    }

    let value = current.get(*last)?;
    match value {
        ResourceValue::Map(map) => Some(marker_text(map).unwrap_or(value).clone()),
        leaf => Some(leaf.clone()),
    }
}

/// Joiner used when flattening nested keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeySeparator {
    /// `menu.file`, identical to the nested lookup.
    #[default]
    Dot,
    /// `menu_file`, usable as an identifier.
    Underscore,
}

impl KeySeparator {
    pub fn as_char(self) -> char {
        match self {
            KeySeparator::Dot => '.',
            KeySeparator::Underscore => '_',
        }
    }
}

/// Read-only lookup over a deserialized resource document.
pub trait ResourceTree: Send + Sync + fmt::Debug {
    /// Resolves a dotted key. Intermediate nodes are returned as maps.
    fn get(&self, key: &str) -> Option<ResourceValue>;

    /// Visits every fully-qualified leaf key until `visit` breaks.
    fn visit_keys(&self, visit: &mut dyn FnMut(&str) -> ControlFlow<()>) -> ControlFlow<()>;
}

/// Tree walked on every lookup.
#[derive(Debug, Clone, Default)]
pub struct NestedTree {
    root: ResourceMap,
}

impl NestedTree {
    pub fn new(root: ResourceMap) -> Self {
        Self { root }
    }
}

fn visit_nested(
    map: &ResourceMap,
    prefix: &str,
    visit: &mut dyn FnMut(&str) -> ControlFlow<()>,
) -> ControlFlow<()> {
    for (key, value) in map {
        if key.contains('.') {
            continue;
        }
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            ResourceValue::Map(child) if marker_text(child).is_none() => {
                visit_nested(child, &full, visit)?
            }
            _ => visit(&full)?,
        }
    }
    ControlFlow::Continue(())
}

impl ResourceTree for NestedTree {
    fn get(&self, key: &str) -> Option<ResourceValue> {
        walk(&self.root, key)
    }

    fn visit_keys(&self, visit: &mut dyn FnMut(&str) -> ControlFlow<()>) -> ControlFlow<()> {
        visit_nested(&self.root, "", visit)
    }
}

/// Tree flattened once into full-key → leaf entries.
#[derive(Debug, Clone, Default)]
pub struct FlatTree {
    entries: HashMap<String, ResourceValue>,
    root: ResourceMap,
}

impl FlatTree {
    pub fn new(root: ResourceMap, separator: KeySeparator) -> Self {
        let mut entries = HashMap::new();
        flatten(&root, "", separator.as_char(), &mut entries);
        Self { entries, root }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn flatten(
    map: &ResourceMap,
    prefix: &str,
    separator: char,
    out: &mut HashMap<String, ResourceValue>,
) {
    for (key, value) in map {
        if key.contains('.') {
            debug!("skipping unaddressable key '{}'", key);
            continue;
        }
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{separator}{key}")
        };
        match value {
            ResourceValue::Map(child) => match marker_text(child) {
                Some(text) => {
                    out.insert(full, text.clone());
                }
                None => flatten(child, &full, separator, out),
            },
            leaf => {
                out.insert(full, leaf.clone());
            }
        }
    }
}

impl ResourceTree for FlatTree {
    fn get(&self, key: &str) -> Option<ResourceValue> {
        segments(key)?;
        match self.entries.get(key) {
            Some(value) => Some(value.clone()),
            // intermediate nodes are not flattened
            None => walk(&self.root, key),
        }
    }

    fn visit_keys(&self, visit: &mut dyn FnMut(&str) -> ControlFlow<()>) -> ControlFlow<()> {
        for key in self.entries.keys() {
            visit(key)?;
        }
        ControlFlow::Continue(())
    }
}
