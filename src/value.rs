use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use crate::document::Document;
use crate::error::ResolveError;
use crate::node::{NodeData, NodeId, Pair, ScalarValue};
use crate::schema::format_timestamp;
use crate::{MERGE_TAG, OMAP_TAG};

/// A native value: the host-side representation a document resolves to.
///
/// Mappings preserve insertion order. Floats are wrapped in
/// [`OrderedFloat`] so values can serve as mapping keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<FixedOffset>),
    Seq(Vec<Value>),
    Map(IndexMap<Value, Value>),
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                3u8.hash(state);
                f.hash(state);
            }
            Value::Str(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::Bytes(b) => {
                5u8.hash(state);
                b.hash(state);
            }
            Value::Timestamp(t) => {
                6u8.hash(state);
                t.hash(state);
            }
            Value::Seq(items) => {
                7u8.hash(state);
                items.hash(state);
            }
            Value::Map(entries) => {
                // Entry order does not affect equality, so it must not
                // affect the hash either.
                8u8.hash(state);
                entries.len().hash(state);
                let mut acc = 0u64;
                for (k, v) in entries {
                    let mut h = std::collections::hash_map::DefaultHasher::new();
                    k.hash(&mut h);
                    v.hash(&mut h);
                    acc ^= h.finish();
                }
                acc.hash(state);
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", x.0),
            Value::Str(s) => f.write_str(s),
            Value::Bytes(_) => f.write_str("<binary>"),
            Value::Timestamp(t) => f.write_str(&format_timestamp(t)),
            Value::Seq(_) => f.write_str("<sequence>"),
            Value::Map(_) => f.write_str("<mapping>"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(String::from(s))
    }
}
impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Value {
        Value::Int(i64::from(i))
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}
impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Float(OrderedFloat(f))
    }
}
impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::Seq(items)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f.0),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<Value, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// The scalar-value form, if this value is not a collection.
    pub(crate) fn to_scalar(&self) -> Option<ScalarValue> {
        match self {
            Value::Null => Some(ScalarValue::Null),
            Value::Bool(b) => Some(ScalarValue::Bool(*b)),
            Value::Int(i) => Some(ScalarValue::Int(*i)),
            Value::Float(f) => Some(ScalarValue::Float(f.0)),
            Value::Str(s) => Some(ScalarValue::Str(s.clone())),
            Value::Bytes(b) => Some(ScalarValue::Bytes(b.clone())),
            Value::Timestamp(t) => Some(ScalarValue::Timestamp(*t)),
            Value::Seq(_) | Value::Map(_) => None,
        }
    }
}

impl From<ScalarValue> for Value {
    fn from(v: ScalarValue) -> Value {
        match v {
            ScalarValue::Null => Value::Null,
            ScalarValue::Bool(b) => Value::Bool(b),
            ScalarValue::Int(i) => Value::Int(i),
            ScalarValue::Float(f) => Value::Float(OrderedFloat(f)),
            ScalarValue::Str(s) => Value::Str(s),
            ScalarValue::Bytes(b) => Value::Bytes(b),
            ScalarValue::Timestamp(t) => Value::Timestamp(t),
        }
    }
}

/// Per-conversion state: the anchor table, reference counters for the
/// alias-expansion guard, and the set of nodes currently being resolved
/// (for cycle detection). Scoped to one `to_value` call.
struct Resolver<'d> {
    doc: &'d Document,
    max_alias_count: i64,
    anchors: HashMap<String, NodeId>,
    ref_counts: HashMap<String, i64>,
    in_progress: Vec<NodeId>,
    alias_cost: HashMap<NodeId, i64>,
}

impl Document {
    /// Resolve the document to a native value.
    ///
    /// Aliases bind to the most recent preceding node carrying their
    /// anchor; `<<` merge keys are applied under the 1.1 schema; alias
    /// expansion is bounded by `max_alias_count` (negative disables the
    /// guard). Cyclic references cannot be represented as owned values and
    /// fail with [`ResolveError::CyclicReference`].
    pub fn to_value(&self, max_alias_count: i64) -> Result<Value, ResolveError> {
        let Some(root) = self.contents else {
            return Ok(Value::Null);
        };
        let mut resolver = Resolver {
            doc: self,
            max_alias_count,
            anchors: HashMap::new(),
            ref_counts: HashMap::new(),
            in_progress: Vec::new(),
            alias_cost: HashMap::new(),
        };
        resolver.resolve(root)
    }
}

impl<'d> Resolver<'d> {
    fn resolve(&mut self, id: NodeId) -> Result<Value, ResolveError> {
        let node = self.doc.node(id);
        if let Some(anchor) = &node.anchor {
            self.anchors.insert(anchor.clone(), id);
        }
        match &node.data {
            NodeData::Scalar(s) => Ok(Value::from(s.value.clone())),
            NodeData::Alias { source } => self.resolve_alias(source),
            NodeData::Sequence(seq) => {
                self.enter(id)?;
                let out = if node.tag.as_deref() == Some(OMAP_TAG) {
                    self.resolve_omap(&seq.items)
                } else {
                    let mut items = Vec::with_capacity(seq.items.len());
                    for &item in &seq.items {
                        items.push(self.resolve(item)?);
                    }
                    Ok(Value::Seq(items))
                };
                self.leave();
                out
            }
            NodeData::Mapping(map) => {
                self.enter(id)?;
                let out = self.resolve_map(&map.pairs);
                self.leave();
                out
            }
        }
    }

    fn enter(&mut self, id: NodeId) -> Result<(), ResolveError> {
        if self.in_progress.contains(&id) {
            let name = self.doc.node(id).anchor.clone().unwrap_or_default();
            return Err(ResolveError::CyclicReference { name });
        }
        self.in_progress.push(id);
        Ok(())
    }

    fn leave(&mut self) {
        self.in_progress.pop();
    }

    fn resolve_alias(&mut self, name: &str) -> Result<Value, ResolveError> {
        let Some(&target) = self.anchors.get(name) else {
            return Err(ResolveError::UnresolvedAlias {
                name: String::from(name),
            });
        };
        if self.in_progress.contains(&target) {
            return Err(ResolveError::CyclicReference {
                name: String::from(name),
            });
        }
        if self.max_alias_count >= 0 {
            let count = self.ref_counts.entry(String::from(name)).or_insert(0);
            *count += 1;
            let count = *count;
            let cost = self.alias_subtree_size(target);
            if count * cost > self.max_alias_count {
                return Err(ResolveError::ExcessiveAliasCount {
                    name: String::from(name),
                });
            }
        }
        self.resolve(target)
    }

    /// The intrinsic alias-subtree size of a node: how many alias
    /// references live below it, counted through their targets. Plain
    /// scalars cost nothing, so well-formed simple aliases pass even with
    /// a zero budget.
    fn alias_subtree_size(&mut self, id: NodeId) -> i64 {
        if let Some(&cached) = self.alias_cost.get(&id) {
            return cached;
        }
        // Break recursion through cycles; the cycle check reports them.
        self.alias_cost.insert(id, 0);
        let cost = match &self.doc.node(id).data {
            NodeData::Scalar(_) => 0,
            NodeData::Alias { source } => match self.anchors.get(source).copied() {
                Some(target) => 1 + self.alias_subtree_size(target),
                None => 1,
            },
            NodeData::Sequence(seq) => {
                let items = seq.items.clone();
                items.iter().map(|&i| self.alias_subtree_size(i)).sum()
            }
            NodeData::Mapping(map) => {
                let pairs = map.pairs.clone();
                pairs
                    .iter()
                    .flat_map(|p| [p.key, p.value])
                    .flatten()
                    .map(|i| self.alias_subtree_size(i))
                    .sum()
            }
        };
        self.alias_cost.insert(id, cost);
        cost
    }

    fn resolve_map(&mut self, pairs: &[Pair]) -> Result<Value, ResolveError> {
        let mut out: IndexMap<Value, Value> = IndexMap::with_capacity(pairs.len());
        let mut merged: Vec<(Value, Value)> = Vec::new();
        for pair in pairs {
            let is_merge = self.doc.schema.merge
                && pair
                    .key
                    .map(|k| self.doc.node(k))
                    .is_some_and(|n| n.tag.as_deref() == Some(MERGE_TAG));
            if is_merge {
                if let Some(value) = pair.value {
                    self.collect_merge(value, &mut merged)?;
                }
                continue;
            }
            let key = match pair.key {
                Some(k) => self.resolve(k)?,
                None => Value::Null,
            };
            let value = match pair.value {
                Some(v) => self.resolve(v)?,
                None => Value::Null,
            };
            // The first occurrence of a duplicate key wins.
            out.entry(key).or_insert(value);
        }
        // Entries already present take precedence over merged ones.
        for (key, value) in merged {
            out.entry(key).or_insert(value);
        }
        Ok(Value::Map(out))
    }

    /// Flatten the value of a `<<` key: a mapping, or a sequence of
    /// mappings merged left to right.
    fn collect_merge(
        &mut self,
        id: NodeId,
        into: &mut Vec<(Value, Value)>,
    ) -> Result<(), ResolveError> {
        let resolved = self.resolve(id)?;
        match resolved {
            Value::Map(entries) => into.extend(entries),
            Value::Seq(items) => {
                for item in items {
                    if let Value::Map(entries) = item {
                        into.extend(entries);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// `!!omap`: a sequence of single-pair mappings, as one ordered map.
    fn resolve_omap(&mut self, items: &[NodeId]) -> Result<Value, ResolveError> {
        let mut out = IndexMap::with_capacity(items.len());
        for &item in items {
            match self.resolve(item)? {
                Value::Map(entries) => {
                    for (k, v) in entries {
                        out.entry(k).or_insert(v);
                    }
                }
                other => {
                    out.entry(other).or_insert(Value::Null);
                }
            }
        }
        Ok(Value::Map(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Mapping, Node, NodeData, Sequence};
    use crate::schema::{Schema, SchemaId};

    fn doc11() -> Document {
        Document::new(Schema::new(SchemaId::Yaml11))
    }

    #[test]
    fn map_equality_ignores_order() {
        let mut a = IndexMap::new();
        a.insert(Value::from("x"), Value::from(1));
        a.insert(Value::from("y"), Value::from(2));
        let mut b = IndexMap::new();
        b.insert(Value::from("y"), Value::from(2));
        b.insert(Value::from("x"), Value::from(1));
        assert_eq!(Value::Map(a), Value::Map(b));
    }

    #[test]
    fn alias_resolves_to_last_preceding_anchor() {
        let mut doc = Document::new(Schema::default());
        let first = doc.new_scalar(ScalarValue::Int(1));
        doc.node_mut(first).anchor = Some(String::from("a"));
        let second = doc.new_scalar(ScalarValue::Int(2));
        doc.node_mut(second).anchor = Some(String::from("a"));
        let alias = doc.push_node(Node::new(NodeData::Alias {
            source: String::from("a"),
        }));
        let root = doc.push_node(Node::new(NodeData::Sequence(Sequence {
            items: vec![first, second, alias],
            flow: false,
        })));
        doc.contents = Some(root);
        assert_eq!(
            doc.to_value(100).unwrap(),
            Value::Seq(vec![Value::Int(1), Value::Int(2), Value::Int(2)])
        );
    }

    #[test]
    fn unresolved_alias_errors() {
        let mut doc = Document::new(Schema::default());
        let alias = doc.push_node(Node::new(NodeData::Alias {
            source: String::from("ghost"),
        }));
        doc.contents = Some(alias);
        assert!(matches!(
            doc.to_value(100),
            Err(ResolveError::UnresolvedAlias { name }) if name == "ghost"
        ));
    }

    #[test]
    fn zero_budget_allows_plain_aliases() {
        let mut doc = Document::new(Schema::default());
        let target = doc.new_scalar(ScalarValue::Str(String::from("v")));
        doc.node_mut(target).anchor = Some(String::from("a"));
        let alias = doc.push_node(Node::new(NodeData::Alias {
            source: String::from("a"),
        }));
        let root = doc.push_node(Node::new(NodeData::Sequence(Sequence {
            items: vec![target, alias],
            flow: false,
        })));
        doc.contents = Some(root);
        assert!(doc.to_value(0).is_ok());
    }

    #[test]
    fn cyclic_reference_is_rejected() {
        let mut doc = Document::new(Schema::default());
        let map = doc.new_map(false);
        doc.node_mut(map).anchor = Some(String::from("m"));
        let key = doc.new_scalar(ScalarValue::Str(String::from("self")));
        let alias = doc.push_node(Node::new(NodeData::Alias {
            source: String::from("m"),
        }));
        if let NodeData::Mapping(Mapping { pairs, .. }) = &mut doc.node_mut(map).data {
            pairs.push(Pair {
                key: Some(key),
                value: Some(alias),
            });
        }
        doc.contents = Some(map);
        assert!(matches!(
            doc.to_value(100),
            Err(ResolveError::CyclicReference { .. })
        ));
    }

    #[test]
    fn merge_key_prefers_existing_entries() {
        let mut doc = doc11();
        // base: {x: 1, y: 2}; target: {<<: *base, y: 9}
        let base = doc.new_map(false);
        doc.node_mut(base).anchor = Some(String::from("base"));
        let bx = doc.new_scalar(ScalarValue::Str(String::from("x")));
        let b1 = doc.new_scalar(ScalarValue::Int(1));
        let by = doc.new_scalar(ScalarValue::Str(String::from("y")));
        let b2 = doc.new_scalar(ScalarValue::Int(2));
        if let NodeData::Mapping(m) = &mut doc.node_mut(base).data {
            m.pairs.push(Pair {
                key: Some(bx),
                value: Some(b1),
            });
            m.pairs.push(Pair {
                key: Some(by),
                value: Some(b2),
            });
        }
        let merge_key = doc.new_scalar(ScalarValue::Str(String::from("<<")));
        doc.node_mut(merge_key).tag = Some(String::from(MERGE_TAG));
        let alias = doc.push_node(Node::new(NodeData::Alias {
            source: String::from("base"),
        }));
        let ty = doc.new_scalar(ScalarValue::Str(String::from("y")));
        let t9 = doc.new_scalar(ScalarValue::Int(9));
        let target = doc.new_map(false);
        if let NodeData::Mapping(m) = &mut doc.node_mut(target).data {
            m.pairs.push(Pair {
                key: Some(merge_key),
                value: Some(alias),
            });
            m.pairs.push(Pair {
                key: Some(ty),
                value: Some(t9),
            });
        }
        let root = doc.new_seq(false);
        if let NodeData::Sequence(s) = &mut doc.node_mut(root).data {
            s.items = vec![base, target];
        }
        doc.contents = Some(root);

        let Value::Seq(docs) = doc.to_value(100).unwrap() else {
            panic!("expected sequence root");
        };
        let Value::Map(target) = &docs[1] else {
            panic!("expected mapping");
        };
        assert_eq!(target.get(&Value::from("x")), Some(&Value::Int(1)));
        assert_eq!(target.get(&Value::from("y")), Some(&Value::Int(9)));
    }
}
