use std::collections::{HashMap, HashSet};

use crate::document::Document;
use crate::error::StringifyError;
use crate::node::{NodeData, NodeId, NumberFormat, Pair, Scalar, ScalarValue};
use crate::options::{StringifyOptions, YamlVersion};
use crate::schema::{format_binary, format_timestamp, SchemaId};
use crate::{ScalarStyle, BINARY_TAG};

/// How a rendered node composes into its parent's layout.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Layout {
    /// A single line.
    Inline,
    /// First line attaches to the parent (a block-scalar header or a folded
    /// quoted string); continuation lines are already indented.
    HeadInline,
    /// A block collection starting at its own indent on a fresh line.
    Block,
}

struct Rendered {
    props: String,
    text: String,
    layout: Layout,
}

impl Rendered {
    fn inline(text: String) -> Rendered {
        Rendered {
            props: String::new(),
            text,
            layout: Layout::Inline,
        }
    }

    /// The node with its properties, for inline positions.
    fn attached(&self) -> String {
        if self.props.is_empty() {
            self.text.clone()
        } else if self.text.is_empty() {
            self.props.clone()
        } else {
            format!("{} {}", self.props, self.text)
        }
    }
}

/// Serialize a document to YAML text.
pub fn stringify_document(
    doc: &Document,
    options: &StringifyOptions,
) -> Result<String, StringifyError> {
    if options.indent == 0 || options.indent > 9 {
        return Err(StringifyError::BadIndent(options.indent));
    }
    let mut s = Stringifier::new(doc, options);
    s.run()
}

impl Document {
    /// Serialize this document with the given options.
    pub fn to_yaml_string(&self, options: &StringifyOptions) -> Result<String, StringifyError> {
        stringify_document(self, options)
    }
}

struct Stringifier<'d> {
    doc: &'d Document,
    opts: &'d StringifyOptions,
    /// Labels for nodes referenced more than once.
    anchors: HashMap<NodeId, String>,
    /// Shared nodes already written once; later occurrences alias.
    emitted: HashSet<NodeId>,
    /// Anchor labels written so far, for alias-order verification.
    seen_anchors: HashSet<String>,
}

impl<'d> Stringifier<'d> {
    fn new(doc: &'d Document, opts: &'d StringifyOptions) -> Stringifier<'d> {
        Stringifier {
            doc,
            opts,
            anchors: HashMap::new(),
            emitted: HashSet::new(),
            seen_anchors: HashSet::new(),
        }
    }

    fn version(&self) -> YamlVersion {
        self.doc.directives.version.unwrap_or({
            if self.doc.schema.id == SchemaId::Yaml11 {
                YamlVersion::V1_1
            } else {
                YamlVersion::V1_2
            }
        })
    }

    fn run(&mut self) -> Result<String, StringifyError> {
        let mut out = String::new();
        if let Some(version) = self.doc.directives.version {
            out.push_str(&format!("%YAML {}\n", version.as_str()));
        }
        for tag in &self.doc.directives.tags {
            out.push_str(&format!("%TAG {} {}\n", tag.handle, tag.prefix));
        }
        let need_marker = !out.is_empty()
            || self.opts.directives_end_marker
            || self.doc.directives_end_marker;

        let Some(root) = self.doc.contents else {
            if need_marker {
                out.push_str("---\n");
            }
            return Ok(out);
        };

        self.assign_anchors(root);

        if let Some(comment) = &self.doc.node(root).comment_before {
            for line in comment.lines() {
                out.push('#');
                out.push_str(line);
                out.push('\n');
            }
        }

        let rendered = self.stringify_node(root, "", false, false, true)?;
        match rendered.layout {
            Layout::Inline | Layout::HeadInline => {
                if need_marker {
                    out.push_str("--- ");
                }
                out.push_str(&rendered.attached());
            }
            Layout::Block => {
                if need_marker {
                    out.push_str("---\n");
                }
                if !rendered.props.is_empty() {
                    out.push_str(&rendered.props);
                    out.push('\n');
                }
                out.push_str(&rendered.text);
            }
        }
        if let Some(comment) = &self.doc.node(root).comment {
            if rendered.layout == Layout::Inline {
                out.push_str(" #");
                out.push_str(comment.lines().next().unwrap_or_default());
            }
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }

    /// Find nodes referenced from more than one place and give each a
    /// label. The first emission will carry `&label`, the rest alias it.
    ///
    /// Scalar ids holding plain values are re-emitted instead of aliased;
    /// timestamps and binary data keep their identity. Nulls never get
    /// anchors.
    fn assign_anchors(&mut self, root: NodeId) {
        let mut refs: HashMap<NodeId, usize> = HashMap::new();
        let mut order: Vec<NodeId> = Vec::new();
        let mut stack = vec![root];
        *refs.entry(root).or_insert(0) += 1;
        while let Some(id) = stack.pop() {
            order.push(id);
            let children: Vec<NodeId> = match &self.doc.node(id).data {
                NodeData::Sequence(seq) => seq.items.clone(),
                NodeData::Mapping(map) => map
                    .pairs
                    .iter()
                    .flat_map(|p| [p.key, p.value])
                    .flatten()
                    .collect(),
                _ => Vec::new(),
            };
            // Reversed pushes keep `order` in emission (preorder) order, so
            // generated labels count up through the output.
            for child in children.into_iter().rev() {
                let count = refs.entry(child).or_insert(0);
                *count += 1;
                if *count == 1 {
                    stack.push(child);
                }
            }
        }

        let user_anchors: HashSet<&str> = self
            .doc
            .nodes
            .iter()
            .filter_map(|n| n.anchor.as_deref())
            .collect();
        let mut counter = 0usize;
        for id in order {
            if refs.get(&id).copied().unwrap_or(0) < 2 {
                continue;
            }
            let node = self.doc.node(id);
            let aliasable = match &node.data {
                NodeData::Sequence(_) | NodeData::Mapping(_) => true,
                NodeData::Scalar(s) => matches!(
                    s.value,
                    ScalarValue::Timestamp(_) | ScalarValue::Bytes(_)
                ),
                NodeData::Alias { .. } => false,
            };
            if !aliasable || node.is_null() {
                continue;
            }
            let label = match &node.anchor {
                Some(a) => a.clone(),
                None => loop {
                    counter += 1;
                    let candidate = format!("{}{}", self.opts.anchor_prefix, counter);
                    if !user_anchors.contains(candidate.as_str()) {
                        break candidate;
                    }
                },
            };
            self.anchors.insert(id, label);
        }
    }

    fn stringify_node(
        &mut self,
        id: NodeId,
        indent: &str,
        in_flow: bool,
        implicit_key: bool,
        at_root: bool,
    ) -> Result<Rendered, StringifyError> {
        if let Some(label) = self.anchors.get(&id) {
            if !self.emitted.insert(id) {
                return Ok(Rendered::inline(format!("*{label}")));
            }
        }

        let node = self.doc.node(id);
        if let NodeData::Alias { source } = &node.data {
            if self.opts.verify_alias_order && !self.seen_anchors.contains(source) {
                return Err(StringifyError::MissingAnchor(source.clone()));
            }
            return Ok(Rendered::inline(format!("*{source}")));
        }

        let mut props = String::new();
        let label = node
            .anchor
            .clone()
            .or_else(|| self.anchors.get(&id).cloned());
        if let Some(label) = label {
            props.push('&');
            props.push_str(&label);
            self.seen_anchors.insert(label);
        }
        match &node.data {
            NodeData::Alias { .. } => unreachable!("handled above"),
            NodeData::Scalar(scalar) => {
                if let Some(tag) = &node.tag {
                    if tag.as_str() != crate::MERGE_TAG {
                        push_prop(&mut props, &self.shorten_tag(tag));
                    }
                } else if matches!(scalar.value, ScalarValue::Bytes(_)) {
                    push_prop(&mut props, &self.shorten_tag(BINARY_TAG));
                }
                let (text, layout) =
                    self.stringify_scalar(scalar, indent, in_flow, implicit_key, at_root)?;
                Ok(Rendered {
                    props,
                    text,
                    layout,
                })
            }
            NodeData::Sequence(_) | NodeData::Mapping(_) => {
                if let Some(tag) = &node.tag {
                    push_prop(&mut props, &self.shorten_tag(tag));
                }
                let flow = in_flow
                    || implicit_key
                    || match &node.data {
                        NodeData::Sequence(s) => s.flow || s.items.is_empty(),
                        NodeData::Mapping(m) => m.flow || m.pairs.is_empty(),
                        _ => false,
                    };
                let (text, layout) = if flow {
                    let text = self.stringify_flow_collection(id, indent)?;
                    let layout = if text.contains('\n') {
                        Layout::HeadInline
                    } else {
                        Layout::Inline
                    };
                    (text, layout)
                } else {
                    (self.stringify_block_collection(id, indent)?, Layout::Block)
                };
                Ok(Rendered {
                    props,
                    text,
                    layout,
                })
            }
        }
    }

    fn shorten_tag(&self, uri: &str) -> String {
        if uri == "!" {
            return String::from("!");
        }
        self.doc.directives.shorten(uri)
    }

    fn effective_width(&self, indent: &str) -> Option<usize> {
        if self.opts.line_width == 0 {
            return None;
        }
        Some(
            self.opts
                .line_width
                .max(indent.len() + self.opts.min_content_width),
        )
    }

    fn stringify_scalar(
        &self,
        scalar: &Scalar,
        indent: &str,
        in_flow: bool,
        implicit_key: bool,
        at_root: bool,
    ) -> Result<(String, Layout), StringifyError> {
        match &scalar.value {
            ScalarValue::Str(s) => {
                self.stringify_str(s, scalar.style, indent, in_flow, implicit_key, at_root)
            }
            other => Ok((self.stringify_typed(scalar, other), Layout::Inline)),
        }
    }

    /// Render a non-string scalar, preferring its original source text when
    /// that text still resolves to the same value in the same format.
    fn stringify_typed(&self, scalar: &Scalar, value: &ScalarValue) -> String {
        if let Some(src) = scalar.source.as_deref() {
            if !src.is_empty() && source_still_matches(self, src, scalar) {
                return String::from(src);
            }
        }
        match value {
            ScalarValue::Null => self.opts.null_str.clone(),
            ScalarValue::Bool(true) => self.opts.true_str.clone(),
            ScalarValue::Bool(false) => self.opts.false_str.clone(),
            ScalarValue::Int(i) => self.stringify_int(*i, scalar.format),
            ScalarValue::Float(f) => stringify_float(*f, scalar),
            ScalarValue::Bytes(_) | ScalarValue::Timestamp(_) => {
                let tag = self.doc.schema.tag_for_scalar(value);
                match self.doc.schema.find_tag(tag).and_then(|t| t.stringify) {
                    Some(f) => f(scalar),
                    // A schema without the tag still gets the canonical
                    // payload, not a placeholder.
                    None => match value {
                        ScalarValue::Bytes(bytes) => format_binary(bytes),
                        ScalarValue::Timestamp(ts) => format_timestamp(ts),
                        _ => value.key_repr(),
                    },
                }
            }
            ScalarValue::Str(_) => unreachable!("strings take the style path"),
        }
    }

    fn stringify_int(&self, i: i64, format: Option<NumberFormat>) -> String {
        match format {
            Some(NumberFormat::Hex) => {
                if i < 0 {
                    match self.version() {
                        // The 1.2 core schema has no negative-hex syntax.
                        YamlVersion::V1_2 => i.to_string(),
                        YamlVersion::V1_1 => format!("-0x{:x}", i.unsigned_abs()),
                    }
                } else {
                    format!("0x{i:x}")
                }
            }
            Some(NumberFormat::Oct) => {
                if i < 0 {
                    match self.version() {
                        YamlVersion::V1_2 => i.to_string(),
                        YamlVersion::V1_1 => format!("-0{:o}", i.unsigned_abs()),
                    }
                } else {
                    match self.version() {
                        YamlVersion::V1_2 => format!("0o{i:o}"),
                        YamlVersion::V1_1 => format!("0{i:o}"),
                    }
                }
            }
            _ => i.to_string(),
        }
    }

    fn stringify_str(
        &self,
        s: &str,
        style: ScalarStyle,
        indent: &str,
        in_flow: bool,
        implicit_key: bool,
        at_root: bool,
    ) -> Result<(String, Layout), StringifyError> {
        let requested = match style {
            ScalarStyle::Any => {
                if implicit_key {
                    self.opts
                        .default_key_type
                        .unwrap_or(self.opts.default_string_type)
                } else {
                    self.opts.default_string_type
                }
            }
            other => other,
        };
        let can_block = !in_flow && !implicit_key;
        let multiline = s.contains('\n');
        let blockable = can_block && block_allowed(s);

        // A top-level plain scalar that reads as a document marker is
        // promoted to a block literal.
        if at_root
            && (s == "---" || s == "..." || s.starts_with("--- ") || s.starts_with("... "))
            && blockable
            && matches!(requested, ScalarStyle::Any | ScalarStyle::Plain)
        {
            return Ok((self.emit_block_scalar(s, true, indent), Layout::HeadInline));
        }

        match requested {
            ScalarStyle::Literal | ScalarStyle::Folded => {
                if blockable {
                    let literal = requested == ScalarStyle::Literal;
                    Ok((self.emit_block_scalar(s, literal, indent), Layout::HeadInline))
                } else {
                    Ok(self.emit_quoted(s, false, indent, implicit_key))
                }
            }
            ScalarStyle::SingleQuoted => {
                let single = single_allowed(s);
                Ok(self.emit_quoted(s, single, indent, implicit_key))
            }
            ScalarStyle::DoubleQuoted => Ok(self.emit_quoted(s, false, indent, implicit_key)),
            ScalarStyle::Plain | ScalarStyle::Any => {
                if multiline {
                    if blockable {
                        return Ok((self.emit_block_scalar(s, true, indent), Layout::HeadInline));
                    }
                    return Ok(self.emit_quoted(s, false, indent, implicit_key));
                }
                let fits = self
                    .effective_width(indent)
                    .map_or(true, |w| indent.len() + s.len() <= w);
                if self.plain_allowed(s, in_flow, at_root) && (fits || implicit_key) {
                    return Ok((String::from(s), Layout::Inline));
                }
                // A long but otherwise plain string folds best as a `>`
                // block.
                if !fits && blockable && self.plain_allowed(s, false, at_root) && s.contains(' ') {
                    return Ok((self.emit_block_scalar(s, false, indent), Layout::HeadInline));
                }
                let single = match self.opts.single_quote {
                    Some(true) => single_allowed(s),
                    Some(false) => false,
                    None => s.contains('"') && !s.contains('\'') && single_allowed(s),
                };
                Ok(self.emit_quoted(s, single, indent, implicit_key))
            }
        }
    }

    /// Whether `s` may be written as a plain scalar in this context.
    fn plain_allowed(&self, s: &str, in_flow: bool, at_root: bool) -> bool {
        if s.is_empty() {
            return false;
        }
        let first = s.chars().next().unwrap_or(' ');
        let last = s.chars().next_back().unwrap_or(' ');
        if first == ' ' || first == '\t' || last == ' ' || last == '\t' {
            return false;
        }
        if "#,[]{}&*!|>'\"%@`".contains(first) {
            return false;
        }
        if matches!(first, '?' | '-' | ':')
            && matches!(s.chars().nth(1), None | Some(' ') | Some('\t'))
        {
            return false;
        }
        if s.chars().any(|c| c.is_control()) {
            return false;
        }
        if s.contains(": ") || s.ends_with(':') || s.contains(" #") {
            return false;
        }
        if in_flow && s.contains(['[', ']', '{', '}', ',']) {
            return false;
        }
        if at_root && (s.starts_with("---") || s.starts_with("...")) {
            return false;
        }
        // Must not read back as another type.
        if self.doc.schema.is_implicitly_typed(s) {
            return false;
        }
        true
    }

    fn emit_quoted(
        &self,
        s: &str,
        single: bool,
        indent: &str,
        implicit_key: bool,
    ) -> (String, Layout) {
        let text = if single {
            format!("'{}'", s.replace('\'', "''"))
        } else {
            double_quote(s, self.opts.double_quoted_as_json)
        };
        if implicit_key || self.opts.line_width == 0 {
            return (text, Layout::Inline);
        }
        let width = self.effective_width(indent).unwrap_or(usize::MAX);
        if text.len() + indent.len() <= width
            || text.len() < self.opts.double_quoted_min_multi_line_length
        {
            return (text, Layout::Inline);
        }
        let folded = fold_at_spaces(&text, indent, width);
        if folded.contains('\n') {
            (folded, Layout::HeadInline)
        } else {
            (folded, Layout::Inline)
        }
    }

    /// Emit a literal or folded block scalar: header with chomping (and an
    /// explicit indentation digit when the content starts with whitespace),
    /// then the indented body.
    fn emit_block_scalar(&self, s: &str, literal: bool, indent: &str) -> String {
        // `indent` is already this node's continuation indent; only a
        // document-root scalar needs a step of its own.
        let body_indent = if indent.is_empty() {
            " ".repeat(self.opts.indent)
        } else {
            String::from(indent)
        };
        let trailing = s.len() - s.trim_end_matches('\n').len();
        let content = &s[..s.len() - trailing];

        let mut header = String::from(if literal { "|" } else { ">" });
        if content.starts_with(' ') || content.starts_with('\t') {
            header.push_str(&self.opts.indent.to_string());
        }
        match trailing {
            0 => header.push('-'),
            1 if !content.is_empty() => {}
            _ => header.push('+'),
        }

        let mut out = header;
        out.push('\n');
        let lines: Vec<&str> = if content.is_empty() {
            Vec::new()
        } else {
            content.split('\n').collect()
        };
        if literal {
            for line in &lines {
                if line.is_empty() {
                    out.push('\n');
                } else {
                    out.push_str(&body_indent);
                    out.push_str(line);
                    out.push('\n');
                }
            }
        } else {
            let width = self.effective_width(&body_indent).unwrap_or(usize::MAX);
            let mut prev_more = false;
            for (i, line) in lines.iter().enumerate() {
                if line.is_empty() {
                    out.push('\n');
                    prev_more = false;
                    continue;
                }
                let more = line.starts_with(' ') || line.starts_with('\t');
                if i > 0 && !more && !prev_more {
                    // A content break folds from a blank line.
                    out.push('\n');
                }
                if more {
                    out.push_str(&body_indent);
                    out.push_str(line);
                    out.push('\n');
                } else {
                    let folded = fold_at_spaces(line, &body_indent, width);
                    out.push_str(&body_indent);
                    out.push_str(&folded);
                    out.push('\n');
                }
                prev_more = more;
            }
        }
        // Extra trailing newlines become trailing blank lines.
        let extra = if content.is_empty() {
            trailing
        } else {
            trailing.saturating_sub(1)
        };
        for _ in 0..extra {
            out.push('\n');
        }
        out
    }

    fn sorted_pairs(&self, pairs: &[Pair]) -> Vec<Pair> {
        let sort = self
            .opts
            .sort_map_entries
            .or(self.doc.schema.sort_map_entries);
        let Some(sort) = sort else {
            return pairs.to_vec();
        };
        let mut keyed: Vec<(String, Pair)> = pairs
            .iter()
            .map(|p| (self.doc.key_repr(p.key), *p))
            .collect();
        keyed.sort_by(|a, b| sort.compare(&a.0, &b.0));
        keyed.into_iter().map(|(_, p)| p).collect()
    }

    fn stringify_block_collection(
        &mut self,
        id: NodeId,
        indent: &str,
    ) -> Result<String, StringifyError> {
        let mut out = String::new();
        match &self.doc.node(id).data {
            NodeData::Sequence(seq) => {
                let items = seq.items.clone();
                let child_indent = format!("{}{}", indent, " ".repeat(self.opts.indent));
                for item in items {
                    self.push_comment_before(&mut out, item, indent);
                    let r = self.stringify_node(item, &child_indent, false, false, false)?;
                    out.push_str(indent);
                    out.push('-');
                    match r.layout {
                        Layout::Inline | Layout::HeadInline => {
                            out.push(' ');
                            out.push_str(&r.attached());
                        }
                        Layout::Block => {
                            if r.props.is_empty() {
                                // The first line of the block continues the
                                // marker line; pad so nested lines align.
                                for _ in 1..self.opts.indent {
                                    out.push(' ');
                                }
                                out.push_str(strip_first_indent(&r.text, &child_indent));
                            } else {
                                out.push(' ');
                                out.push_str(&r.props);
                                out.push('\n');
                                out.push_str(&r.text);
                            }
                        }
                    }
                    self.push_trailing_comment(&mut out, item, r.layout);
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
            NodeData::Mapping(map) => {
                let pairs = self.sorted_pairs(&map.pairs);
                let value_indent = format!("{}{}", indent, " ".repeat(self.opts.indent));
                for pair in pairs {
                    self.stringify_block_pair(&mut out, pair, indent, &value_indent)?;
                }
            }
            _ => {}
        }
        Ok(out)
    }

    /// Whether a key can be rendered as an implicit one-line simple key.
    fn key_is_simple(&self, key: NodeId) -> bool {
        let node = self.doc.node(key);
        match &node.data {
            NodeData::Alias { .. } => true,
            NodeData::Scalar(s) => match &s.value {
                ScalarValue::Str(text) => {
                    !text.contains('\n') && text.chars().count() <= 1024
                }
                _ => true,
            },
            _ => false,
        }
    }

    fn stringify_block_pair(
        &mut self,
        out: &mut String,
        pair: Pair,
        indent: &str,
        value_indent: &str,
    ) -> Result<(), StringifyError> {
        if let Some(key) = pair.key {
            self.push_comment_before(out, key, indent);
        }
        if self.opts.simple_keys {
            self.check_simple_key(pair.key)?;
        }

        let simple = pair.key.map_or(true, |k| self.key_is_simple(k));
        if !simple {
            // Explicit key form.
            let key = pair.key.expect("a complex key is present");
            let r = self.stringify_node(key, value_indent, false, false, false)?;
            out.push_str(indent);
            out.push('?');
            match r.layout {
                Layout::Inline | Layout::HeadInline => {
                    out.push(' ');
                    out.push_str(&r.attached());
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                Layout::Block => {
                    if !r.props.is_empty() {
                        out.push(' ');
                        out.push_str(&r.props);
                    }
                    out.push('\n');
                    out.push_str(&r.text);
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
            out.push_str(indent);
            out.push(':');
            self.append_block_value(out, pair.value, indent, value_indent)?;
            return Ok(());
        }

        out.push_str(indent);
        match pair.key {
            Some(key) => {
                let r = self.stringify_node(key, indent, false, true, false)?;
                out.push_str(&r.attached());
            }
            None => out.push_str(&self.opts.null_str),
        }
        out.push(':');
        self.append_block_value(out, pair.value, indent, value_indent)
    }

    fn check_simple_key(&self, key: Option<NodeId>) -> Result<(), StringifyError> {
        let Some(key) = key else { return Ok(()) };
        let node = self.doc.node(key);
        if node.comment.is_some() || node.comment_before.is_some() {
            return Err(StringifyError::ForbiddenSimpleKey(
                "a key with a comment may not be used",
            ));
        }
        match &node.data {
            NodeData::Scalar(s) => match &s.value {
                ScalarValue::Str(text) => {
                    if text.contains('\n') || text.chars().count() > 1024 {
                        return Err(StringifyError::ForbiddenSimpleKey(
                            "a multi-line or over-long key may not be used",
                        ));
                    }
                    if matches!(s.style, ScalarStyle::Literal | ScalarStyle::Folded) {
                        return Err(StringifyError::ForbiddenSimpleKey(
                            "a block-scalar key may not be used",
                        ));
                    }
                    Ok(())
                }
                _ => Ok(()),
            },
            NodeData::Alias { .. } => Ok(()),
            _ => Err(StringifyError::ForbiddenSimpleKey(
                "a collection key may not be used",
            )),
        }
    }

    fn append_block_value(
        &mut self,
        out: &mut String,
        value: Option<NodeId>,
        indent: &str,
        value_indent: &str,
    ) -> Result<(), StringifyError> {
        let Some(value) = value else {
            out.push(' ');
            out.push_str(&self.opts.null_str);
            out.push('\n');
            return Ok(());
        };
        // An aligned sequence keeps the parent's indent.
        let aligned_seq = !self.opts.indent_seq
            && matches!(&self.doc.node(value).data,
                NodeData::Sequence(s) if !s.flow && !s.items.is_empty());
        let child_indent = if aligned_seq {
            String::from(indent)
        } else {
            String::from(value_indent)
        };
        let r = self.stringify_node(value, &child_indent, false, false, false)?;
        match r.layout {
            Layout::Inline | Layout::HeadInline => {
                out.push(' ');
                out.push_str(&r.attached());
                self.push_trailing_comment(out, value, r.layout);
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Layout::Block => {
                if !r.props.is_empty() {
                    out.push(' ');
                    out.push_str(&r.props);
                }
                out.push('\n');
                if let Some(comment) = &self.doc.node(value).comment_before {
                    for line in comment.lines() {
                        out.push_str(&child_indent);
                        out.push('#');
                        out.push_str(line);
                        out.push('\n');
                    }
                }
                out.push_str(&r.text);
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
        Ok(())
    }

    fn stringify_flow_collection(
        &mut self,
        id: NodeId,
        indent: &str,
    ) -> Result<String, StringifyError> {
        let (open, close, parts) = match &self.doc.node(id).data {
            NodeData::Sequence(seq) => {
                let items = seq.items.clone();
                let child_indent = format!("{}{}", indent, " ".repeat(self.opts.indent));
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    let r = self.stringify_node(item, &child_indent, true, false, false)?;
                    parts.push(r.attached());
                }
                ('[', ']', parts)
            }
            NodeData::Mapping(map) => {
                let pairs = self.sorted_pairs(&map.pairs);
                let child_indent = format!("{}{}", indent, " ".repeat(self.opts.indent));
                let mut parts = Vec::with_capacity(pairs.len());
                for pair in pairs {
                    let mut part = String::new();
                    match pair.key {
                        Some(key) => {
                            let r = self.stringify_node(key, &child_indent, true, true, false)?;
                            part.push_str(&r.attached());
                        }
                        None => {}
                    }
                    match pair.value {
                        Some(value) => {
                            part.push_str(": ");
                            let r = self.stringify_node(value, &child_indent, true, false, false)?;
                            part.push_str(&r.attached());
                        }
                        None => {
                            if part.is_empty() {
                                part.push_str(&self.opts.null_str);
                            }
                        }
                    }
                    parts.push(part);
                }
                ('{', '}', parts)
            }
            _ => return Ok(String::new()),
        };

        if parts.is_empty() {
            return Ok(format!("{open}{close}"));
        }

        let inline = format!("{open} {} {close}", parts.join(", "));
        let fits = inline.len() <= self.opts.max_flow_string_single_line_length
            && self
                .effective_width(indent)
                .map_or(true, |w| indent.len() + inline.len() <= w);
        if fits && !parts.iter().any(|p| p.contains('\n')) {
            return Ok(inline);
        }

        let child_indent = format!("{}{}", indent, " ".repeat(self.opts.indent));
        let mut out = String::new();
        out.push(open);
        out.push('\n');
        for (i, part) in parts.iter().enumerate() {
            out.push_str(&child_indent);
            out.push_str(part);
            if i + 1 < parts.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str(indent);
        out.push(close);
        Ok(out)
    }

    fn push_comment_before(&self, out: &mut String, id: NodeId, indent: &str) {
        let node = self.doc.node(id);
        if node.space_before && !out.is_empty() {
            out.push('\n');
        }
        if let Some(comment) = &node.comment_before {
            for line in comment.lines() {
                out.push_str(indent);
                out.push('#');
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    fn push_trailing_comment(&self, out: &mut String, id: NodeId, layout: Layout) {
        if layout != Layout::Inline {
            return;
        }
        if let Some(comment) = &self.doc.node(id).comment {
            out.push_str(" #");
            out.push_str(comment.lines().next().unwrap_or_default());
        }
    }
}

fn push_prop(props: &mut String, text: &str) {
    if !props.is_empty() {
        props.push(' ');
    }
    props.push_str(text);
}

/// Strip the indentation of a block's first line; the parent supplies it.
fn strip_first_indent<'a>(text: &'a str, indent: &str) -> &'a str {
    text.strip_prefix(indent).unwrap_or(text)
}

/// A non-string scalar re-emits its source text while the text still reads
/// back as the same value in the same format.
fn source_still_matches(s: &Stringifier<'_>, src: &str, scalar: &Scalar) -> bool {
    match s.doc.schema.resolve_scalar(src) {
        Some((tag, value)) => value == scalar.value && tag.format == scalar.format,
        None => false,
    }
}

/// Block scalars require printable content; anything with control
/// characters other than line breaks, or with a carriage return, must be
/// double-quoted.
fn block_allowed(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| c.is_control() && c != '\n')
}

fn single_allowed(s: &str) -> bool {
    !s.chars().any(|c| c.is_control())
}

fn stringify_float(f: f64, scalar: &Scalar) -> String {
    if f.is_nan() {
        return String::from(".nan");
    }
    if f.is_infinite() {
        return String::from(if f > 0.0 { ".inf" } else { "-.inf" });
    }
    if scalar.format == Some(NumberFormat::Exp) {
        return format!("{f:e}");
    }
    let mut s = f.to_string();
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        s.push_str(".0");
    }
    if scalar.min_fraction_digits > 0 {
        if let Some(dot) = s.find('.') {
            let frac = s.len() - dot - 1;
            for _ in frac..scalar.min_fraction_digits {
                s.push('0');
            }
        }
    }
    s
}

/// Escape a string for double quotes.
fn double_quote(s: &str, as_json: bool) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\0' if !as_json => out.push_str("\\0"),
            '\u{7}' if !as_json => out.push_str("\\a"),
            '\u{b}' if !as_json => out.push_str("\\v"),
            '\u{1b}' if !as_json => out.push_str("\\e"),
            '\u{85}' if !as_json => out.push_str("\\N"),
            '\u{a0}' if !as_json => out.push_str("\\_"),
            '\u{2028}' if !as_json => out.push_str("\\L"),
            '\u{2029}' if !as_json => out.push_str("\\P"),
            c if c.is_control() => {
                let code = c as u32;
                if code <= 0xff && !as_json {
                    out.push_str(&format!("\\x{code:02x}"));
                } else if code <= 0xffff {
                    out.push_str(&format!("\\u{code:04x}"));
                } else {
                    out.push_str(&format!("\\U{code:08x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Fold a single-line text at word boundaries so no emitted line exceeds
/// `width`. Breaks replace a single space whose neighbors are not spaces,
/// so a re-parse folds the break back into the same space.
fn fold_at_spaces(text: &str, indent: &str, width: usize) -> String {
    if indent.len() + text.len() <= width {
        return String::from(text);
    }
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut col = indent.len();
    let mut line_start_break: Option<usize> = None;
    for (i, &c) in chars.iter().enumerate() {
        if c == ' '
            && i > 0
            && chars[i - 1] != ' '
            && chars.get(i + 1).is_some_and(|&n| n != ' ' && n != '\t')
        {
            line_start_break = Some(out.len());
        }
        out.push(c);
        col += 1;
        if col > width {
            if let Some(pos) = line_start_break.take() {
                // Replace the remembered space with a break.
                let tail: String = out[pos + 1..].to_string();
                out.truncate(pos);
                out.push('\n');
                out.push_str(indent);
                col = indent.len() + tail.chars().count();
                out.push_str(&tail);
            }
        }
    }
    out
}
