//! Typed tree for the semi-structured parts of a manifest.
//!
//! Manifests are YAML, but strategy documents carry arbitrary fields that are
//! only given meaning once a strategy type picks them out. [`Node`] keeps the
//! shape (scalars, lists, maps, explicit nulls) without committing to a schema,
//! and [`merge`] combines two maps the way version entries override common
//! fields.

use std::collections::BTreeMap;
use std::fmt;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

/// String-keyed map of nodes.
pub type Map = BTreeMap<String, Node>;

/// One value in a manifest document.
///
/// Numbers are kept apart from strings. YAML has already normalized them by
/// the time they get here (`1.10` reads as `1.1`, `2.0` as `2`), so only
/// fields where that is harmless accept them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Null,
    Bool(bool),
    /// Rendered form of an unquoted YAML number.
    Number(String),
    String(String),
    List(Vec<Node>),
    Map(Map),
}

impl Node {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// Scalar rendering, used for OS/arch data values.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            Node::String(s) | Node::Number(s) => Some(s.clone()),
            Node::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::String(value.to_string())
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Bool(value)
    }
}

impl From<Map> for Node {
    fn from(value: Map) -> Self {
        Node::Map(value)
    }
}

/// Deep-merges `overlay` onto `base` and returns the combined map.
///
/// For keys present in both, a null overlay value deletes the key, two maps
/// merge recursively, and anything else is replaced by the overlay. Keys only
/// in the overlay are added as they are.
pub fn merge(base: &Map, overlay: &Map) -> Map {
    let mut combined = base.clone();
    for (key, value) in overlay {
        match (combined.get(key), value) {
            (Some(_), Node::Null) => {
                combined.remove(key);
            }
            (Some(Node::Map(inner)), Node::Map(over)) => {
                let merged = merge(inner, over);
                combined.insert(key.clone(), Node::Map(merged));
            }
            _ => {
                combined.insert(key.clone(), value.clone());
            }
        }
    }
    combined
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a manifest value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Node, E> {
        Ok(Node::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(Node::Number(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Node, E> {
        Ok(Node::Number(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Node, E> {
        Ok(Node::Number(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Node, E> {
        Ok(Node::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Node, E> {
        Ok(Node::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Node, D::Error>
    where
        D: Deserializer<'de>,
    {
        Node::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Node, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Node>()? {
            items.push(item);
        }
        Ok(Node::List(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Node, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = Map::new();
        while let Some((key, value)) = access.next_entry::<Node, Node>()? {
            let key = key
                .scalar_string()
                .ok_or_else(|| de::Error::custom("map keys must be scalars"))?;
            map.insert(key, value);
        }
        Ok(Node::Map(map))
    }
}
