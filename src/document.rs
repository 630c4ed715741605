use crate::error::YamlError;
use crate::node::{Mapping, Node, NodeData, NodeId, Pair, Scalar, ScalarValue, Sequence};
use crate::options::YamlVersion;
use crate::schema::Schema;
use crate::value::Value;

/// A `%TAG` handle mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct TagDirective {
    /// The tag handle, e.g. `!e!`.
    pub handle: String,
    /// The tag prefix, e.g. `tag:example.com,2000:app/`.
    pub prefix: String,
}

/// The directive state of one document: the `%YAML` version and the
/// `%TAG` handle table. Directives reset at every `---`.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct Directives {
    /// Version from an explicit `%YAML` directive.
    pub version: Option<YamlVersion>,
    /// Custom handles; `!` and `!!` are built in.
    pub tags: Vec<TagDirective>,
}

impl Directives {
    pub fn new() -> Directives {
        Directives::default()
    }

    /// Apply one `%...` directive line.
    pub(crate) fn apply_line(&mut self, line: &str) -> Result<(), String> {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("%YAML") => match parts.next() {
                Some("1.1") => {
                    self.version = Some(YamlVersion::V1_1);
                    Ok(())
                }
                Some("1.2") => {
                    self.version = Some(YamlVersion::V1_2);
                    Ok(())
                }
                Some(other) => Err(format!("unsupported YAML version {other}")),
                None => Err(String::from("%YAML directive is missing its version")),
            },
            Some("%TAG") => {
                let (Some(handle), Some(prefix)) = (parts.next(), parts.next()) else {
                    return Err(String::from("%TAG directive requires a handle and a prefix"));
                };
                if !(handle.starts_with('!') && handle.ends_with('!') || handle == "!") {
                    return Err(format!("invalid tag handle {handle}"));
                }
                self.tags.retain(|t| t.handle != handle);
                self.tags.push(TagDirective {
                    handle: String::from(handle),
                    prefix: String::from(prefix),
                });
                Ok(())
            }
            Some(other) => Err(format!("unknown directive {other}")),
            None => Err(String::from("empty directive line")),
        }
    }

    /// Resolve a `handle` + `suffix` tag property to an absolute URI.
    pub fn tag_uri(&self, handle: &str, suffix: &str) -> Option<String> {
        if let Some(t) = self.tags.iter().find(|t| t.handle == handle) {
            return Some(format!("{}{}", t.prefix, suffix));
        }
        match handle {
            "!!" => Some(format!("tag:yaml.org,2002:{suffix}")),
            // A lone ! is a local tag.
            "!" => Some(format!("!{suffix}")),
            _ => None,
        }
    }

    /// The shortest form a tag URI can take under the active handles.
    pub fn shorten(&self, uri: &str) -> String {
        for t in &self.tags {
            if let Some(rest) = uri.strip_prefix(t.prefix.as_str()) {
                if !rest.is_empty() {
                    return format!("{}{}", t.handle, rest);
                }
            }
        }
        if let Some(rest) = uri.strip_prefix("tag:yaml.org,2002:") {
            return format!("!!{rest}");
        }
        if let Some(rest) = uri.strip_prefix('!') {
            if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || "-_./".contains(c)) {
                return String::from(uri);
            }
        }
        format!("!<{uri}>")
    }
}

/// Filters and transforms applied while building nodes from a value.
///
/// `Keys` keeps only the listed mapping keys. `Func` is called for every
/// entry with `(key, value)` and returns the value to emit, or `None` to
/// skip the entry entirely; sequence items are visited with their integer
/// index as the key and the document root with `Value::Null`.
pub enum Replacer<'a> {
    Keys(&'a [&'a str]),
    Func(&'a dyn Fn(&Value, &Value) -> Option<Value>),
}

/// One YAML document: a node arena, a root, directive state, and the
/// diagnostics collected while composing it.
///
/// Children address each other through [`NodeId`]s into the arena, so a
/// node reused under several parents is genuinely shared; the stringifier
/// turns such sharing into anchors and aliases, which also makes cyclic
/// structures expressible.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct Document {
    pub(crate) nodes: Vec<Node>,
    /// The root node, if the document has contents.
    pub contents: Option<NodeId>,
    pub directives: Directives,
    /// Whether an explicit `---` marker opened (or should open) the document.
    pub directives_end_marker: bool,
    pub errors: Vec<YamlError>,
    pub warnings: Vec<YamlError>,
    pub schema: Schema,
    /// Source range of the document, when parsed.
    pub range: Option<[usize; 2]>,
}

impl Document {
    pub fn new(schema: Schema) -> Document {
        Document {
            schema,
            ..Document::default()
        }
    }

    /// Build a document holding `value` as its contents.
    pub fn from_value(value: &Value, schema: Schema) -> Document {
        Document::from_value_with(value, None, None, schema)
    }

    /// Build a document from a value with a replacer and an explicit root
    /// tag.
    pub fn from_value_with(
        value: &Value,
        replacer: Option<&Replacer<'_>>,
        tag: Option<&str>,
        schema: Schema,
    ) -> Document {
        let mut doc = Document::new(schema);
        let value = match replacer {
            Some(Replacer::Func(f)) => f(&Value::Null, value),
            _ => Some(value.clone()),
        };
        if let Some(value) = value {
            let root = doc.create_node(&value, replacer, tag);
            doc.contents = Some(root);
        }
        doc
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub(crate) fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn new_scalar(&mut self, value: ScalarValue) -> NodeId {
        self.push_node(Node::scalar(value))
    }

    pub fn new_seq(&mut self, flow: bool) -> NodeId {
        self.push_node(Node::new(NodeData::Sequence(Sequence {
            items: Vec::new(),
            flow,
        })))
    }

    pub fn new_map(&mut self, flow: bool) -> NodeId {
        self.push_node(Node::new(NodeData::Mapping(Mapping {
            pairs: Vec::new(),
            flow,
        })))
    }

    /// Recursively build nodes for a native value.
    pub fn create_node(
        &mut self,
        value: &Value,
        replacer: Option<&Replacer<'_>>,
        tag: Option<&str>,
    ) -> NodeId {
        // A custom tag may take over construction for values it identifies.
        let custom = self.schema.tags.iter().find_map(|t| {
            let build = t.create_node?;
            let matches = match tag {
                Some(tag) => t.tag == tag,
                None => value.to_scalar().is_some_and(|v| (t.identify)(&v)),
            };
            matches.then_some((build, t.tag))
        });
        if let Some((build, tag_uri)) = custom {
            let id = build(self, value);
            let node = self.node_mut(id);
            if node.tag.is_none() {
                node.tag = Some(String::from(tag_uri));
            }
            return id;
        }
        let id = match value {
            Value::Seq(items) => {
                let id = self.new_seq(false);
                let mut built = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match replacer {
                        Some(Replacer::Func(f)) => {
                            if let Some(v) = f(&Value::Int(i as i64), item) {
                                built.push(self.create_node(&v, replacer, None));
                            }
                        }
                        _ => built.push(self.create_node(item, replacer, None)),
                    }
                }
                if let NodeData::Sequence(seq) = &mut self.node_mut(id).data {
                    seq.items = built;
                }
                id
            }
            Value::Map(entries) => {
                let id = self.new_map(false);
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, val) in entries {
                    let val = match replacer {
                        Some(Replacer::Keys(keys)) => {
                            let keep = matches!(key, Value::Str(s) if keys.contains(&s.as_str()));
                            if keep {
                                Some(val.clone())
                            } else {
                                None
                            }
                        }
                        Some(Replacer::Func(f)) => f(key, val),
                        None => Some(val.clone()),
                    };
                    let Some(val) = val else { continue };
                    let k = self.create_node(key, replacer, None);
                    let v = self.create_node(&val, replacer, None);
                    pairs.push(Pair {
                        key: Some(k),
                        value: Some(v),
                    });
                }
                if let NodeData::Mapping(map) = &mut self.node_mut(id).data {
                    map.pairs = pairs;
                }
                id
            }
            scalar => {
                let sv = scalar
                    .to_scalar()
                    .unwrap_or_else(|| ScalarValue::Str(scalar.to_string()));
                self.new_scalar(sv)
            }
        };
        if let Some(tag) = tag {
            self.node_mut(id).tag = Some(String::from(tag));
        }
        id
    }

    fn key_matches(&self, key_id: Option<NodeId>, key: &Value) -> bool {
        match key_id {
            None => matches!(key, Value::Null),
            Some(id) => match (self.node(id).as_scalar(), key.to_scalar()) {
                (Some(s), Some(k)) => s.value == k,
                _ => false,
            },
        }
    }

    fn seq_index(key: &Value) -> Option<usize> {
        match key {
            Value::Int(i) if *i >= 0 => Some(*i as usize),
            Value::Str(s) => s.parse::<usize>().ok(),
            _ => None,
        }
    }

    /// Look up `key` in the collection at `id`.
    ///
    /// For sequences `key` must parse as a non-negative integer.
    pub fn get_in(&self, id: NodeId, key: &Value) -> Option<NodeId> {
        match &self.node(id).data {
            NodeData::Mapping(map) => map
                .pairs
                .iter()
                .find(|p| self.key_matches(p.key, key))
                .and_then(|p| p.value),
            NodeData::Sequence(seq) => Self::seq_index(key).and_then(|i| seq.items.get(i).copied()),
            _ => None,
        }
    }

    pub fn has_in(&self, id: NodeId, key: &Value) -> bool {
        match &self.node(id).data {
            NodeData::Mapping(map) => map.pairs.iter().any(|p| self.key_matches(p.key, key)),
            NodeData::Sequence(seq) => {
                Self::seq_index(key).is_some_and(|i| i < seq.items.len())
            }
            _ => false,
        }
    }

    /// Set `key` to `value` in the collection at `id`, replacing an
    /// existing entry.
    pub fn set_in(&mut self, id: NodeId, key: Value, value: Value) {
        match &self.node(id).data {
            NodeData::Mapping(map) => {
                let found = map
                    .pairs
                    .iter()
                    .position(|p| self.key_matches(p.key, &key));
                let v = self.create_node(&value, None, None);
                match found {
                    Some(i) => {
                        if let NodeData::Mapping(map) = &mut self.node_mut(id).data {
                            map.pairs[i].value = Some(v);
                        }
                    }
                    None => {
                        let k = self.create_node(&key, None, None);
                        if let NodeData::Mapping(map) = &mut self.node_mut(id).data {
                            map.pairs.push(Pair {
                                key: Some(k),
                                value: Some(v),
                            });
                        }
                        self.sort_pairs(id);
                    }
                }
            }
            NodeData::Sequence(_) => {
                let Some(i) = Self::seq_index(&key) else { return };
                let v = self.create_node(&value, None, None);
                if let NodeData::Sequence(seq) = &mut self.node_mut(id).data {
                    if i < seq.items.len() {
                        seq.items[i] = v;
                    } else if i == seq.items.len() {
                        seq.items.push(v);
                    }
                }
            }
            _ => {}
        }
    }

    /// Append `value` to the sequence at `id`, or add a single-entry map as
    /// a pair when `id` is a mapping.
    pub fn add_in(&mut self, id: NodeId, value: Value) {
        match &self.node(id).data {
            NodeData::Sequence(_) => {
                let v = self.create_node(&value, None, None);
                if let NodeData::Sequence(seq) = &mut self.node_mut(id).data {
                    seq.items.push(v);
                }
            }
            NodeData::Mapping(_) => {
                if let Value::Map(entries) = &value {
                    for (k, v) in entries {
                        self.set_in(id, k.clone(), v.clone());
                    }
                }
            }
            _ => {}
        }
    }

    pub fn delete_in(&mut self, id: NodeId, key: &Value) -> bool {
        match &self.node(id).data {
            NodeData::Mapping(map) => {
                let found = map.pairs.iter().position(|p| self.key_matches(p.key, key));
                match found {
                    Some(i) => {
                        if let NodeData::Mapping(map) = &mut self.node_mut(id).data {
                            map.pairs.remove(i);
                        }
                        true
                    }
                    None => false,
                }
            }
            NodeData::Sequence(seq) => {
                let Some(i) = Self::seq_index(key) else {
                    return false;
                };
                if i >= seq.items.len() {
                    return false;
                }
                if let NodeData::Sequence(seq) = &mut self.node_mut(id).data {
                    seq.items.remove(i);
                }
                true
            }
            _ => false,
        }
    }

    /// Keep mapping entries ordered when the schema asks for it.
    ///
    /// Applied on mutation as well as at serialization time so that an
    /// explicitly sorted document stays sorted through edits.
    fn sort_pairs(&mut self, id: NodeId) {
        let Some(sort) = self.schema.sort_map_entries else {
            return;
        };
        let NodeData::Mapping(map) = &self.node(id).data else {
            return;
        };
        let mut keyed: Vec<(String, Pair)> = map
            .pairs
            .iter()
            .map(|p| (self.key_repr(p.key), *p))
            .collect();
        keyed.sort_by(|a, b| sort.compare(&a.0, &b.0));
        if let NodeData::Mapping(map) = &mut self.node_mut(id).data {
            map.pairs = keyed.into_iter().map(|(_, p)| p).collect();
        }
    }

    pub(crate) fn key_repr(&self, key: Option<NodeId>) -> String {
        match key {
            None => String::from("null"),
            Some(id) => match self.node(id).as_scalar() {
                Some(s) => s.value.key_repr(),
                None => String::from("<collection>"),
            },
        }
    }

    fn root_for_key(&mut self, key: &Value) -> NodeId {
        if let Some(root) = self.contents {
            return root;
        }
        let root = if Self::seq_index(key).is_some() && !matches!(key, Value::Str(_)) {
            self.new_seq(false)
        } else {
            self.new_map(false)
        };
        self.contents = Some(root);
        root
    }

    /// Look up `key` on the document root and unwrap a scalar result.
    pub fn get(&self, key: &Value) -> Option<&ScalarValue> {
        let id = self.get_node(key)?;
        self.node(id).as_scalar().map(|s| &s.value)
    }

    /// Look up `key` on the document root, keeping the node wrapper.
    pub fn get_node(&self, key: &Value) -> Option<NodeId> {
        self.get_in(self.contents?, key)
    }

    pub fn has(&self, key: &Value) -> bool {
        self.contents.is_some_and(|root| self.has_in(root, key))
    }

    pub fn set(&mut self, key: Value, value: Value) {
        let root = self.root_for_key(&key);
        self.set_in(root, key, value);
    }

    /// Append to the root collection, creating a sequence root if the
    /// document is empty.
    pub fn add(&mut self, value: Value) {
        let root = match self.contents {
            Some(root) => root,
            None => {
                let root = self.new_seq(false);
                self.contents = Some(root);
                root
            }
        };
        self.add_in(root, value);
    }

    pub fn delete(&mut self, key: &Value) -> bool {
        self.contents
            .is_some_and(|root| self.delete_in(root, key))
    }

    /// Record a warning; the composer decides whether it is also logged.
    pub(crate) fn warn(&mut self, warning: YamlError) {
        self.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaId, SortEntries};

    #[test]
    fn directive_lines() {
        let mut d = Directives::new();
        d.apply_line("%YAML 1.1").unwrap();
        assert_eq!(d.version, Some(YamlVersion::V1_1));
        d.apply_line("%TAG !e! tag:example.com,2000:app/").unwrap();
        assert_eq!(
            d.tag_uri("!e!", "foo").as_deref(),
            Some("tag:example.com,2000:app/foo")
        );
        assert_eq!(d.tag_uri("!!", "str").as_deref(), Some("tag:yaml.org,2002:str"));
        assert_eq!(d.tag_uri("!", "local").as_deref(), Some("!local"));
        assert!(d.apply_line("%YAML 2.0").is_err());
    }

    #[test]
    fn shorten_prefers_handles() {
        let mut d = Directives::new();
        d.apply_line("%TAG !e! tag:example.com,2000:app/").unwrap();
        assert_eq!(d.shorten("tag:yaml.org,2002:str"), "!!str");
        assert_eq!(d.shorten("tag:example.com,2000:app/foo"), "!e!foo");
        assert_eq!(d.shorten("!local"), "!local");
        assert_eq!(d.shorten("tag:other.org,2002:x"), "!<tag:other.org,2002:x>");
    }

    #[test]
    fn create_and_query_nodes() {
        let mut doc = Document::new(Schema::new(SchemaId::Core));
        doc.set(Value::from("a"), Value::from(1));
        doc.set(Value::from("b"), Value::Seq(vec![Value::from(true)]));
        assert_eq!(doc.get(&Value::from("a")), Some(&ScalarValue::Int(1)));
        assert!(doc.has(&Value::from("b")));
        let b = doc.get_node(&Value::from("b")).unwrap();
        assert!(doc.node(b).is_seq());
        assert_eq!(
            doc.get_in(b, &Value::from(0))
                .map(|id| &doc.node(id).data),
            Some(&NodeData::Scalar(Scalar::new(ScalarValue::Bool(true))))
        );
        assert!(doc.delete(&Value::from("a")));
        assert!(!doc.has(&Value::from("a")));
    }

    #[test]
    fn set_replaces_existing_entry() {
        let mut doc = Document::new(Schema::default());
        doc.set(Value::from("k"), Value::from(1));
        doc.set(Value::from("k"), Value::from(2));
        assert_eq!(doc.get(&Value::from("k")), Some(&ScalarValue::Int(2)));
        let root = doc.contents.unwrap();
        assert_eq!(doc.node(root).as_map().unwrap().pairs.len(), 1);
    }

    #[test]
    fn sorted_maps_stay_sorted_through_edits() {
        let mut schema = Schema::default();
        schema.sort_map_entries = Some(SortEntries::Lexicographic);
        let mut doc = Document::new(schema);
        doc.set(Value::from("b"), Value::from(1));
        doc.set(Value::from("a"), Value::from(2));
        doc.set(Value::from("c"), Value::from(3));
        let root = doc.contents.unwrap();
        let keys: Vec<String> = doc
            .node(root)
            .as_map()
            .unwrap()
            .pairs
            .iter()
            .map(|p| doc.key_repr(p.key))
            .collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn replacer_keys_filters_entries() {
        let mut map = indexmap::IndexMap::new();
        map.insert(Value::from("keep"), Value::from(1));
        map.insert(Value::from("drop"), Value::from(2));
        let doc = Document::from_value_with(
            &Value::Map(map),
            Some(&Replacer::Keys(&["keep"])),
            None,
            Schema::default(),
        );
        assert!(doc.has(&Value::from("keep")));
        assert!(!doc.has(&Value::from("drop")));
    }

    #[test]
    fn replacer_func_transforms_values() {
        let double = |_k: &Value, v: &Value| match v {
            Value::Int(i) => Some(Value::Int(i * 2)),
            other => Some(other.clone()),
        };
        let mut map = indexmap::IndexMap::new();
        map.insert(Value::from("n"), Value::from(21));
        let doc = Document::from_value_with(
            &Value::Map(map),
            Some(&Replacer::Func(&double)),
            None,
            Schema::default(),
        );
        assert_eq!(doc.get(&Value::from("n")), Some(&ScalarValue::Int(42)));
    }
}
