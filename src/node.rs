use chrono::{DateTime, FixedOffset};

use crate::ScalarStyle;

/// The index of a node within its owning document.
///
/// Documents store their nodes in a single arena; children refer to each
/// other by id. A shared or cyclic structure is expressed by the same id
/// appearing in more than one place, which is what the stringifier's anchor
/// pass looks for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// A node of the document tree.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Node {
    /// The node kind and its payload.
    pub data: NodeData,
    /// The resolved tag, as an absolute URI.
    pub tag: Option<String>,
    /// The `&name` anchor label, if any.
    pub anchor: Option<String>,
    /// A blank line precedes this node.
    pub space_before: bool,
    /// Comment lines immediately before this node, `#` stripped.
    pub comment_before: Option<String>,
    /// Trailing same-line comment, `#` stripped.
    pub comment: Option<String>,
    /// Source byte range `[start, end)` when composed from text.
    pub range: Option<[usize; 2]>,
}

/// Node kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    Scalar(Scalar),
    Sequence(Sequence),
    Mapping(Mapping),
    /// A `*name` reference to the most recent preceding anchor.
    Alias {
        source: String,
    },
}

/// A terminal value.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Scalar {
    /// The resolved native value.
    pub value: ScalarValue,
    /// The requested output style; `Any` lets the stringifier choose.
    pub style: ScalarStyle,
    /// Number formatting override.
    pub format: Option<NumberFormat>,
    /// Minimum fraction digits when emitting a float in decimal form.
    pub min_fraction_digits: usize,
    /// The original source text (unquoted, unescaped), kept so values like
    /// `~`, `Yes` or `0x1f` re-emit verbatim while they still round-trip.
    pub source: Option<String>,
}

/// The resolved value of a scalar node.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<FixedOffset>),
}

/// Number formatting overrides for scalar emission.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NumberFormat {
    /// Emit integers as `0x..`.
    Hex,
    /// Emit integers as `0o..` (YAML 1.2) or `0..` (YAML 1.1).
    Oct,
    /// Emit floats in exponential form.
    Exp,
}

/// An ordered list of items.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Sequence {
    pub items: Vec<NodeId>,
    /// Emit in `[ ... ]` style.
    pub flow: bool,
}

/// An ordered list of key/value pairs.
///
/// Keys are not required to be unique here; duplicate policy belongs to the
/// schema, and lookup is linear by design.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Mapping {
    pub pairs: Vec<Pair>,
    /// Emit in `{ ... }` style.
    pub flow: bool,
}

/// A key/value pair. Either side may be absent: an explicit key with no
/// value, or a `: value` entry with no key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Pair {
    pub key: Option<NodeId>,
    pub value: Option<NodeId>,
}

impl Node {
    pub fn new(data: NodeData) -> Node {
        Node {
            data,
            tag: None,
            anchor: None,
            space_before: false,
            comment_before: None,
            comment: None,
            range: None,
        }
    }

    pub fn scalar(value: ScalarValue) -> Node {
        Node::new(NodeData::Scalar(Scalar::new(value)))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.data, NodeData::Scalar(_))
    }

    pub fn is_seq(&self) -> bool {
        matches!(self.data, NodeData::Sequence(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.data, NodeData::Mapping(_))
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.data, NodeData::Alias { .. })
    }

    /// Whether this node resolves to `null`.
    pub fn is_null(&self) -> bool {
        matches!(
            self.data,
            NodeData::Scalar(Scalar {
                value: ScalarValue::Null,
                ..
            })
        )
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.data {
            NodeData::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar_mut(&mut self) -> Option<&mut Scalar> {
        match &mut self.data {
            NodeData::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&Sequence> {
        match &self.data {
            NodeData::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match &self.data {
            NodeData::Mapping(m) => Some(m),
            _ => None,
        }
    }
}

impl Scalar {
    pub fn new(value: ScalarValue) -> Scalar {
        Scalar {
            value,
            style: ScalarStyle::Any,
            format: None,
            min_fraction_digits: 0,
            source: None,
        }
    }
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// String form used when a scalar serves as a lookup key.
    pub fn key_repr(&self) -> String {
        match self {
            ScalarValue::Null => String::from("null"),
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::Str(s) => s.clone(),
            ScalarValue::Bytes(_) => String::from("<binary>"),
            ScalarValue::Timestamp(t) => t.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminator_predicates() {
        let s = Node::scalar(ScalarValue::Int(1));
        assert!(s.is_scalar() && !s.is_map() && !s.is_seq() && !s.is_alias());
        let m = Node::new(NodeData::Mapping(Mapping::default()));
        assert!(m.is_map());
        let a = Node::new(NodeData::Alias {
            source: String::from("a"),
        });
        assert!(a.is_alias());
        assert!(Node::scalar(ScalarValue::Null).is_null());
    }
}
