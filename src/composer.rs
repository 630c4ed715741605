use crate::document::{Directives, Document};
use crate::error::{ErrorCode, LineCounter, YamlError};
use crate::node::{
    Mapping, Node, NodeData, NodeId, NumberFormat, Pair, Scalar, ScalarValue, Sequence,
};
use crate::options::{LogLevel, ParseOptions, YamlVersion};
use crate::parser::Parser;
use crate::schema::{Schema, SchemaId};
use crate::token::{
    BlockMapNode, BlockScalarNode, BlockSeqNode, CollectionItem, DocumentNode, FlowCollectionNode,
    FlowKind, FlowScalarNode, FlowScalarStyle, SourceToken, TokenKind, TokenNode,
};
use crate::{ScalarStyle, MERGE_TAG};

/// Compose a source string into documents.
///
/// This is the main parsing pipeline: lexer, parser, then the composer's
/// walk over the token tree applying the schema.
pub fn compose(src: &str, options: &ParseOptions) -> Vec<Document> {
    let counter = (options.pretty_errors || options.line_counter).then(|| build_counter(src));
    let mut parser = Parser::new(options.strict);
    let trees = parser.parse(src);
    trees
        .into_iter()
        .map(|tree| {
            let mut composer = Composer::new(options);
            composer.compose_document(&tree, counter.as_ref())
        })
        .collect()
}

pub(crate) fn build_counter(src: &str) -> LineCounter {
    let mut counter = LineCounter::new();
    for (i, b) in src.bytes().enumerate() {
        if b == b'\n' {
            counter.add_new_line(i + 1);
        }
    }
    counter
}

/// Node properties gathered from the trivia in front of a node.
#[derive(Default)]
struct Props {
    anchor: Option<String>,
    tag: Option<String>,
    comment_before: Option<String>,
    space_before: bool,
}

impl Props {
    fn is_empty(&self) -> bool {
        self.anchor.is_none()
            && self.tag.is_none()
            && self.comment_before.is_none()
            && !self.space_before
    }

    fn apply(self, node: &mut Node) {
        node.anchor = self.anchor;
        if node.tag.is_none() {
            node.tag = self.tag;
        }
        node.comment_before = self.comment_before;
        node.space_before = self.space_before;
    }
}

struct Composer<'o> {
    options: &'o ParseOptions,
    doc: Document,
    directives: Directives,
}

impl<'o> Composer<'o> {
    fn new(options: &'o ParseOptions) -> Composer<'o> {
        Composer {
            options,
            doc: Document::default(),
            directives: Directives::new(),
        }
    }

    fn error(&mut self, code: ErrorCode, span: [usize; 2], message: impl Into<String>) {
        self.doc.errors.push(YamlError::new(code, span, message));
    }

    fn warn(&mut self, code: ErrorCode, span: [usize; 2], message: impl Into<String>) {
        let warning = YamlError::new(code, span, message);
        if self.options.log_level == LogLevel::Warn {
            log::warn!("{warning}");
        }
        self.doc.warn(warning);
    }

    fn compose_document(
        mut self,
        tree: &DocumentNode<'_>,
        counter: Option<&LineCounter>,
    ) -> Document {
        self.doc.errors.extend(tree.errors.iter().cloned());

        for token in &tree.start {
            if token.kind == TokenKind::DirectiveLine {
                if let Err(problem) = self.directives.apply_line(token.source) {
                    let span = [token.offset, token.offset + token.source.len()];
                    if token.source.starts_with("%YAML") || token.source.starts_with("%TAG") {
                        self.error(ErrorCode::BadDirective, span, problem);
                    } else {
                        self.warn(ErrorCode::BadDirective, span, problem);
                    }
                }
            }
        }

        let version = self.directives.version.unwrap_or(self.options.version);
        let schema_id = self.options.schema.unwrap_or(match version {
            YamlVersion::V1_1 => SchemaId::Yaml11,
            YamlVersion::V1_2 => SchemaId::Core,
        });
        self.doc.schema =
            Schema::new(schema_id).with_custom_tags(self.options.custom_tags.clone());
        self.doc.directives_end_marker = tree.has_directives_end_marker();

        let (props, _) = self.extract_props(&tree.start, None);
        let contents = match &tree.value {
            Some(value) => Some(self.compose_node(value, props)),
            None if !props.is_empty() => Some(self.empty_scalar(props, tree.offset)),
            None => None,
        };
        self.doc.contents = contents;
        self.doc.directives = self.directives;

        let end_start = tree
            .end
            .first()
            .map_or_else(|| src_end(tree), |t| t.offset);
        self.doc.range = Some([tree.offset, src_end(tree).max(end_start)]);

        if let Some(counter) = counter {
            if self.options.pretty_errors {
                for err in &mut self.doc.errors {
                    err.pretty = Some(counter.line_pos(err.span[0]));
                }
                for warning in &mut self.doc.warnings {
                    warning.pretty = Some(counter.line_pos(warning.span[0]));
                }
            }
        }
        self.doc
    }

    /// Split a trivia run into node properties.
    ///
    /// Comments before the first line break belong to the preceding node
    /// and are returned separately; everything after it describes the node
    /// that follows. A run containing a blank line sets `space_before`.
    fn extract_props(
        &mut self,
        tokens: &[SourceToken<'_>],
        mut prev: Option<NodeId>,
    ) -> (Props, Option<String>) {
        let mut props = Props::default();
        let mut trailing: Option<String> = None;
        // With no previous node, even a first-line comment describes the
        // node that follows.
        let mut seen_newline = prev.is_none();
        let mut last_was_newline = false;
        for token in tokens {
            match token.kind {
                TokenKind::Newline => {
                    if last_was_newline {
                        props.space_before = true;
                    }
                    seen_newline = true;
                    last_was_newline = true;
                    continue;
                }
                TokenKind::Comment => {
                    let text = token.source.strip_prefix('#').unwrap_or(token.source);
                    if seen_newline {
                        append_line(&mut props.comment_before, text);
                    } else {
                        append_line(&mut trailing, text);
                    }
                }
                TokenKind::Anchor => {
                    if props.anchor.is_some() {
                        self.error(
                            ErrorCode::MultipleAnchors,
                            token_span(token),
                            "a node can have at most one anchor",
                        );
                    }
                    props.anchor = Some(String::from(
                        token.source.strip_prefix('&').unwrap_or(token.source),
                    ));
                }
                TokenKind::Tag => {
                    if props.tag.is_some() {
                        self.error(
                            ErrorCode::MultipleTags,
                            token_span(token),
                            "a node can have at most one tag",
                        );
                    }
                    props.tag = self.resolve_tag_property(token);
                }
                _ => {}
            }
            last_was_newline = false;
        }
        if let (Some(text), Some(prev)) = (&trailing, prev.take()) {
            let node = self.doc.node_mut(prev);
            append_line(&mut node.comment, text);
            trailing = None;
        }
        (props, trailing)
    }

    /// Resolve a `!...` tag property to an absolute URI.
    fn resolve_tag_property(&mut self, token: &SourceToken<'_>) -> Option<String> {
        let src = token.source;
        if let Some(verbatim) = src.strip_prefix("!<") {
            return Some(String::from(verbatim.strip_suffix('>').unwrap_or(verbatim)));
        }
        if src == "!" {
            // Non-specific tag: force the default tag for the node kind.
            return Some(String::from("!"));
        }
        let (handle, suffix) = if let Some(rest) = src.strip_prefix("!!") {
            ("!!", rest)
        } else if let Some(second) = src[1..].find('!') {
            src.split_at(second + 2)
        } else {
            ("!", &src[1..])
        };
        match self.directives.tag_uri(handle, suffix) {
            Some(uri) => Some(uri),
            None => {
                self.error(
                    ErrorCode::TagResolveFailed,
                    token_span(token),
                    format!("could not resolve tag handle {handle}"),
                );
                None
            }
        }
    }

    fn empty_scalar(&mut self, props: Props, offset: usize) -> NodeId {
        let mut scalar = Scalar::new(ScalarValue::Null);
        scalar.style = ScalarStyle::Plain;
        let mut node = Node::new(NodeData::Scalar(scalar));
        node.range = Some([offset, offset]);
        props.apply(&mut node);
        self.doc.push_node(node)
    }

    fn compose_node(&mut self, token: &TokenNode<'_>, props: Props) -> NodeId {
        match token {
            TokenNode::FlowScalar(scalar) => self.compose_flow_scalar(scalar, props),
            TokenNode::BlockScalar(scalar) => self.compose_block_scalar(scalar, props),
            TokenNode::BlockMap(map) => self.compose_block_map(map, props),
            TokenNode::BlockSeq(seq) => self.compose_block_seq(seq, props),
            TokenNode::FlowCollection(flow) => self.compose_flow_collection(flow, props),
        }
    }

    fn compose_flow_scalar(&mut self, token: &FlowScalarNode<'_>, props: Props) -> NodeId {
        let range = [token.offset, token.offset + token.source.len()];
        if token.style == FlowScalarStyle::Alias {
            if props.anchor.is_some() || props.tag.is_some() {
                self.error(
                    ErrorCode::AliasProps,
                    range,
                    "an alias node must not specify any properties",
                );
            }
            let name = token.source.strip_prefix('*').unwrap_or(token.source);
            let mut node = Node::new(NodeData::Alias {
                source: String::from(name),
            });
            node.range = Some(range);
            node.comment_before = props.comment_before;
            node.space_before = props.space_before;
            return self.doc.push_node(node);
        }

        let (text, style) = match token.style {
            FlowScalarStyle::Plain => (fold_lines(token.source), ScalarStyle::Plain),
            FlowScalarStyle::SingleQuoted => {
                (resolve_single_quoted(token.source), ScalarStyle::SingleQuoted)
            }
            FlowScalarStyle::DoubleQuoted => {
                (resolve_double_quoted(token.source), ScalarStyle::DoubleQuoted)
            }
            FlowScalarStyle::Alias => unreachable!("handled above"),
        };

        let mut scalar = Scalar::new(ScalarValue::Str(text.clone()));
        scalar.style = style;
        scalar.source = Some(text.clone());

        if let Some(tag) = props.tag.as_deref() {
            self.resolve_explicit(&mut scalar, tag, &text, range);
        } else if style == ScalarStyle::Plain {
            if let Some((tag, value)) = self.doc.schema.resolve_scalar(&text) {
                scalar.format = tag.format;
                let keep_tag = tag.tag == MERGE_TAG;
                let tag_uri = tag.tag;
                scalar.value = value;
                Self::apply_number_hints(&mut scalar, &text);
                let mut node = Node::new(NodeData::Scalar(scalar));
                node.range = Some(range);
                if keep_tag {
                    node.tag = Some(String::from(tag_uri));
                }
                props.apply(&mut node);
                // An explicit property tag was consumed above, so only the
                // merge tag survives here.
                return self.doc.push_node(node);
            }
        }

        let mut node = Node::new(NodeData::Scalar(scalar));
        node.range = Some(range);
        props.apply(&mut node);
        self.doc.push_node(node)
    }

    /// Resolve explicitly tagged scalar content through the schema.
    ///
    /// Several definitions may share one URI (the core schema registers
    /// decimal, octal and hex under `!!int`); the last-registered one that
    /// resolves wins.
    fn resolve_explicit(&mut self, scalar: &mut Scalar, tag: &str, text: &str, range: [usize; 2]) {
        if tag == "!" {
            return;
        }
        let mut found = false;
        let mut resolved = None;
        for def in self.doc.schema.tags.iter().rev() {
            if def.tag != tag {
                continue;
            }
            found = true;
            if def.collection {
                return;
            }
            if let Some(value) = (def.resolve)(text) {
                resolved = Some((value, def.format));
                break;
            }
        }
        match resolved {
            Some((value, format)) => {
                scalar.value = value;
                scalar.format = format;
                Self::apply_number_hints(scalar, text);
            }
            None => {
                if found || tag.starts_with("tag:yaml.org,2002:") {
                    self.warn(
                        ErrorCode::TagResolveFailed,
                        range,
                        format!("failed to resolve {text:?} as {tag}"),
                    );
                }
            }
        }
    }

    /// Remember formatting details of numeric source text.
    fn apply_number_hints(scalar: &mut Scalar, text: &str) {
        match scalar.value {
            ScalarValue::Float(_) => {
                if text.contains(['e', 'E']) {
                    scalar.format = Some(NumberFormat::Exp);
                } else if let Some(frac) = text.split('.').nth(1) {
                    let digits = frac.chars().take_while(char::is_ascii_digit).count();
                    scalar.min_fraction_digits = digits;
                }
            }
            ScalarValue::Int(_) => {}
            _ => {}
        }
    }

    fn compose_block_scalar(&mut self, token: &BlockScalarNode<'_>, props: Props) -> NodeId {
        let range = [token.offset, token.offset + token.header.len() + token.source.len()];
        let (text, style) = resolve_block_scalar(token);
        let mut scalar = Scalar::new(ScalarValue::Str(text.clone()));
        scalar.style = style;
        scalar.source = Some(text.clone());
        if let Some(tag) = props.tag.as_deref() {
            self.resolve_explicit(&mut scalar, tag, &text, range);
        }
        let mut node = Node::new(NodeData::Scalar(scalar));
        node.range = Some(range);
        props.apply(&mut node);
        // A comment on the header line trails the scalar.
        for t in &token.inline {
            if t.kind == TokenKind::Comment {
                let text = t.source.strip_prefix('#').unwrap_or(t.source);
                append_line(&mut node.comment, text);
            }
        }
        self.doc.push_node(node)
    }

    fn compose_block_seq(&mut self, token: &BlockSeqNode<'_>, props: Props) -> NodeId {
        let mut items = Vec::with_capacity(token.items.len());
        let mut prev: Option<NodeId> = None;
        for item in &token.items {
            let (item_props, _) = self.extract_props(&item.start, prev);
            let id = match &item.value {
                Some(value) => self.compose_node(value, item_props),
                None => self.empty_scalar(item_props, item_end(item, token.offset)),
            };
            items.push(id);
            prev = Some(id);
        }
        let mut node = Node::new(NodeData::Sequence(Sequence { items, flow: false }));
        node.range = Some([token.offset, token_end(token.items.last(), token.offset)]);
        props.apply(&mut node);
        self.doc.push_node(node)
    }

    fn compose_block_map(&mut self, token: &BlockMapNode<'_>, props: Props) -> NodeId {
        let mut pairs: Vec<Pair> = Vec::with_capacity(token.items.len());
        let mut prev: Option<NodeId> = None;
        for item in &token.items {
            let explicit = item
                .start
                .iter()
                .any(|t| t.kind == TokenKind::ExplicitKeyInd);
            let (key_props, _) = self.extract_props(&item.start, prev);
            let key = match &item.key {
                Some(key) => {
                    if !explicit {
                        self.check_implicit_key(key);
                    }
                    Some(self.compose_node(key, key_props))
                }
                None if !key_props.is_empty() => {
                    Some(self.empty_scalar(key_props, item_end(item, token.offset)))
                }
                None => None,
            };
            let (value_props, _) = self.extract_props(&item.sep, key);
            let value = match &item.value {
                Some(value) => Some(self.compose_node(value, value_props)),
                None if !value_props.is_empty() => {
                    Some(self.empty_scalar(value_props, item_end(item, token.offset)))
                }
                None => None,
            };
            if let Some(key) = key {
                self.check_duplicate_key(&pairs, key);
            }
            prev = value.or(key).or(prev);
            pairs.push(Pair { key, value });
        }
        let mut node = Node::new(NodeData::Mapping(Mapping {
            pairs,
            flow: false,
        }));
        node.range = Some([token.offset, token_end(token.items.last(), token.offset)]);
        props.apply(&mut node);
        self.doc.push_node(node)
    }

    fn compose_flow_collection(&mut self, token: &FlowCollectionNode<'_>, props: Props) -> NodeId {
        let end = token
            .end
            .iter()
            .rev()
            .find(|t| !t.kind.is_space())
            .map_or(token.offset + 1, |t| t.offset + t.source.len());
        let range = [token.offset, end];
        let mut prev: Option<NodeId> = None;

        let node = match token.kind {
            FlowKind::Map => {
                let mut pairs = Vec::with_capacity(token.items.len());
                for item in &token.items {
                    if item.key.is_none() && item.value.is_none() {
                        // Trailing trivia captured as a bare item.
                        let (p, _) = self.extract_props(&item.start, prev);
                        if !p.is_empty() {
                            let id = self.empty_scalar(p, range[1]);
                            pairs.push(Pair {
                                key: Some(id),
                                value: None,
                            });
                        }
                        continue;
                    }
                    let pair = if item.key.is_none() && !has_map_value_ind(&item.sep) {
                        // A lone value in a flow map is a key with no value:
                        // `{a}` means `{a: null}`.
                        let (key_props, _) = self.extract_props(&item.start, prev);
                        let key = match item.value.as_deref() {
                            Some(value) => self.compose_node(value, key_props),
                            None => self.empty_scalar(key_props, range[1]),
                        };
                        prev = Some(key);
                        Pair {
                            key: Some(key),
                            value: None,
                        }
                    } else {
                        self.compose_flow_pair(item, &mut prev, token.offset)
                    };
                    if let Some(key) = pair.key {
                        self.check_duplicate_key(&pairs, key);
                    }
                    pairs.push(pair);
                }
                NodeData::Mapping(Mapping { pairs, flow: true })
            }
            FlowKind::Seq => {
                let mut items = Vec::with_capacity(token.items.len());
                for item in &token.items {
                    if item.key.is_none() && item.value.is_none() {
                        let (p, _) = self.extract_props(&item.start, prev);
                        if !p.is_empty() {
                            items.push(self.empty_scalar(p, range[1]));
                        }
                        continue;
                    }
                    if item.key.is_some() || has_map_value_ind(&item.sep) {
                        // A pair inside a flow sequence becomes a one-entry
                        // mapping.
                        self.check_flow_pair_key(item);
                        let pair = self.compose_flow_pair(item, &mut prev, token.offset);
                        let mut map = Node::new(NodeData::Mapping(Mapping {
                            pairs: vec![pair],
                            flow: true,
                        }));
                        map.range = pair_range(self, &pair);
                        items.push(self.doc.push_node(map));
                    } else {
                        let (item_props, _) = self.extract_props(&item.start, prev);
                        let id = match item.value.as_deref() {
                            Some(value) => self.compose_node(value, item_props),
                            None => self.empty_scalar(item_props, range[1]),
                        };
                        items.push(id);
                        prev = Some(id);
                    }
                }
                NodeData::Sequence(Sequence { items, flow: true })
            }
        };
        let mut node = Node::new(node);
        node.range = Some(range);
        props.apply(&mut node);
        let id = self.doc.push_node(node);
        // Trailing comment on the closing bracket line.
        for t in &token.end {
            if t.kind == TokenKind::Comment {
                let text = t.source.strip_prefix('#').unwrap_or(t.source);
                append_line(&mut self.doc.node_mut(id).comment, text);
            }
        }
        id
    }

    fn compose_flow_pair(
        &mut self,
        item: &CollectionItem<'_>,
        prev: &mut Option<NodeId>,
        fallback_offset: usize,
    ) -> Pair {
        let (key_props, _) = self.extract_props(&item.start, *prev);
        let key = match &item.key {
            Some(key) => {
                self.check_implicit_key(key);
                Some(self.compose_node(key, key_props))
            }
            None if !key_props.is_empty() => {
                Some(self.empty_scalar(key_props, item_end(item, fallback_offset)))
            }
            None => None,
        };
        let (value_props, _) = self.extract_props(&item.sep, key.or(*prev));
        let value = match &item.value {
            Some(value) => Some(self.compose_node(value, value_props)),
            None if !value_props.is_empty() => {
                Some(self.empty_scalar(value_props, item_end(item, fallback_offset)))
            }
            None => None,
        };
        *prev = value.or(key).or(*prev);
        Pair { key, value }
    }

    /// Simple-key constraints: single line, at most 1024 characters.
    fn check_implicit_key(&mut self, key: &TokenNode<'_>) {
        let span = [key.offset(), key.end_offset()];
        match key {
            TokenNode::FlowScalar(s) => {
                if s.source.contains('\n') {
                    self.error(
                        ErrorCode::MultilineImplicitKey,
                        span,
                        "implicit keys need to be on a single line",
                    );
                } else if s.source.chars().count() > 1024 {
                    self.error(
                        ErrorCode::KeyOver1024Chars,
                        span,
                        "the : indicator must be at most 1024 chars after the start of an implicit block mapping key",
                    );
                }
            }
            TokenNode::BlockMap(_) | TokenNode::BlockSeq(_) | TokenNode::BlockScalar(_) => {
                self.error(
                    ErrorCode::BlockAsImplicitKey,
                    span,
                    "a block collection may not be used as an implicit key",
                );
            }
            TokenNode::FlowCollection(_) => {
                if span[1] - span[0] > 1024 {
                    self.error(
                        ErrorCode::KeyOver1024Chars,
                        span,
                        "the : indicator must be at most 1024 chars after the start of an implicit flow sequence key",
                    );
                }
            }
        }
    }

    /// In a flow sequence, a pair's `:` must follow within 1024 characters
    /// of the key start.
    fn check_flow_pair_key(&mut self, item: &CollectionItem<'_>) {
        let (Some(key), Some(colon)) = (
            item.key.as_deref(),
            item.sep
                .iter()
                .find(|t| t.kind == TokenKind::MapValueInd),
        ) else {
            return;
        };
        if colon.offset.saturating_sub(key.offset()) > 1024 {
            self.error(
                ErrorCode::KeyOver1024Chars,
                [key.offset(), colon.offset],
                "the : indicator must be at most 1024 chars after the start of an implicit flow sequence key",
            );
        }
    }

    fn check_duplicate_key(&mut self, pairs: &[Pair], key: NodeId) {
        let Some(new_key) = self.doc.node(key).as_scalar().map(|s| s.value.clone()) else {
            return;
        };
        let duplicate = pairs.iter().any(|p| {
            p.key
                .and_then(|k| self.doc.node(k).as_scalar())
                .is_some_and(|s| s.value == new_key)
        });
        if duplicate {
            let span = self.doc.node(key).range.unwrap_or([0, 0]);
            self.warn(
                ErrorCode::DuplicateKey,
                span,
                format!("duplicate mapping key {:?}", new_key.key_repr()),
            );
        }
    }
}

fn token_span(token: &SourceToken<'_>) -> [usize; 2] {
    [token.offset, token.offset + token.source.len().max(1)]
}

fn item_end(item: &CollectionItem<'_>, fallback: usize) -> usize {
    item.end_offset()
        .or_else(|| {
            item.sep
                .last()
                .or_else(|| item.start.last())
                .map(|t| t.offset + t.source.len())
        })
        .unwrap_or(fallback)
}

fn token_end(last: Option<&CollectionItem<'_>>, fallback: usize) -> usize {
    last.map_or(fallback, |item| item_end(item, fallback))
}

fn src_end(tree: &DocumentNode<'_>) -> usize {
    tree.end
        .last()
        .map(|t| t.offset + t.source.len())
        .or_else(|| tree.value.as_ref().map(TokenNode::end_offset))
        .or_else(|| tree.start.last().map(|t| t.offset + t.source.len()))
        .unwrap_or(tree.offset)
}

fn has_map_value_ind(sep: &[SourceToken<'_>]) -> bool {
    sep.iter().any(|t| t.kind == TokenKind::MapValueInd)
}

fn pair_range(composer: &Composer<'_>, pair: &Pair) -> Option<[usize; 2]> {
    let start = pair.key.and_then(|k| composer.doc.node(k).range)?;
    let end = pair
        .value
        .and_then(|v| composer.doc.node(v).range)
        .unwrap_or(start);
    Some([start[0], end[1]])
}

fn append_line(target: &mut Option<String>, line: &str) {
    match target {
        Some(text) => {
            text.push('\n');
            text.push_str(line);
        }
        None => *target = Some(String::from(line)),
    }
}

/// Fold the lines of a plain or quoted scalar: a single break becomes a
/// space, `n` breaks become `n - 1` newlines, and surrounding whitespace
/// is trimmed.
fn fold_lines(src: &str) -> String {
    if !src.contains('\n') {
        return String::from(src);
    }
    let mut lines = src.split('\n');
    let mut out = String::from(lines.next().unwrap_or_default().trim_end());
    let mut breaks = 0;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            breaks += 1;
            continue;
        }
        if breaks == 0 {
            out.push(' ');
        } else {
            for _ in 0..breaks {
                out.push('\n');
            }
        }
        out.push_str(line);
        breaks = 0;
    }
    out
}

fn resolve_single_quoted(src: &str) -> String {
    let inner = src.strip_prefix('\'').unwrap_or(src);
    let inner = inner.strip_suffix('\'').unwrap_or(inner);
    fold_lines(inner).replace("''", "'")
}

fn resolve_double_quoted(src: &str) -> String {
    let inner = src.strip_prefix('"').unwrap_or(src);
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\n') => {
                    // Escaped break: join lines without a space.
                    while matches!(chars.peek(), Some(' ' | '\t')) {
                        chars.next();
                    }
                }
                Some('0') => out.push('\0'),
                Some('a') => out.push('\u{7}'),
                Some('b') => out.push('\u{8}'),
                Some('t') => out.push('\t'),
                Some('n') => out.push('\n'),
                Some('v') => out.push('\u{b}'),
                Some('f') => out.push('\u{c}'),
                Some('r') => out.push('\r'),
                Some('e') => out.push('\u{1b}'),
                Some(' ') => out.push(' '),
                Some('"') => out.push('"'),
                Some('/') => out.push('/'),
                Some('\\') => out.push('\\'),
                Some('N') => out.push('\u{85}'),
                Some('_') => out.push('\u{a0}'),
                Some('L') => out.push('\u{2028}'),
                Some('P') => out.push('\u{2029}'),
                Some('x') => push_hex_escape(&mut out, &mut chars, 2),
                Some('u') => push_hex_escape(&mut out, &mut chars, 4),
                Some('U') => push_hex_escape(&mut out, &mut chars, 8),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            '\n' => {
                while matches!(chars.peek(), Some(' ' | '\t')) {
                    chars.next();
                }
                let mut breaks = 0;
                while chars.peek() == Some(&'\n') {
                    chars.next();
                    breaks += 1;
                    while matches!(chars.peek(), Some(' ' | '\t')) {
                        chars.next();
                    }
                }
                while out.ends_with(' ') || out.ends_with('\t') {
                    out.pop();
                }
                if breaks == 0 {
                    out.push(' ');
                } else {
                    for _ in 0..breaks {
                        out.push('\n');
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn push_hex_escape(out: &mut String, chars: &mut std::iter::Peekable<std::str::Chars>, len: usize) {
    let mut code = 0u32;
    for _ in 0..len {
        let Some(d) = chars.peek().and_then(|c| c.to_digit(16)) else {
            out.push('\u{fffd}');
            return;
        };
        code = code * 16 + d;
        chars.next();
    }
    // Combine a surrogate pair written as two \u escapes.
    if (0xd800..=0xdbff).contains(&code) {
        let mut ahead = chars.clone();
        if ahead.next() == Some('\\') && ahead.next() == Some('u') {
            let mut low = 0u32;
            let mut ok = true;
            for _ in 0..4 {
                match ahead.next().and_then(|c| c.to_digit(16)) {
                    Some(d) => low = low * 16 + d,
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok && (0xdc00..=0xdfff).contains(&low) {
                *chars = ahead;
                let combined = 0x10000 + ((code - 0xd800) << 10) + (low - 0xdc00);
                out.push(char::from_u32(combined).unwrap_or('\u{fffd}'));
                return;
            }
        }
    }
    out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
}

/// Chomping modes for block scalars.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Chomp {
    Strip,
    Clip,
    Keep,
}

/// Resolve a block scalar's body: compute the content indent, strip it,
/// fold if `>`, then apply the chomping indicator.
fn resolve_block_scalar(token: &BlockScalarNode<'_>) -> (String, ScalarStyle) {
    let literal = token.header.starts_with('|');
    let style = if literal {
        ScalarStyle::Literal
    } else {
        ScalarStyle::Folded
    };
    let chomp = if token.header.contains('-') {
        Chomp::Strip
    } else if token.header.contains('+') {
        Chomp::Keep
    } else {
        Chomp::Clip
    };
    let digit = token.header[1..]
        .chars()
        .find(char::is_ascii_digit)
        .and_then(|c| c.to_digit(10))
        .map(|d| d as usize);

    let mut lines: Vec<&str> = token.source.split('\n').collect();
    if token.source.ends_with('\n') {
        lines.pop();
    }

    let content_indent = digit.map(|d| token.indent + d).unwrap_or_else(|| {
        lines
            .iter()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start_matches(' ').len())
            .unwrap_or(0)
    });

    let stripped: Vec<&str> = lines
        .iter()
        .map(|l| {
            if l.len() >= content_indent {
                &l[content_indent..]
            } else {
                l.trim_start_matches(' ')
            }
        })
        .collect();

    let trailing_blanks = stripped
        .iter()
        .rev()
        .take_while(|l| l.trim().is_empty())
        .count();
    let content_lines = &stripped[..stripped.len() - trailing_blanks];

    let content = if literal {
        content_lines.join("\n")
    } else {
        fold_block(content_lines)
    };

    let text = match chomp {
        Chomp::Strip => content,
        Chomp::Clip => {
            if content.is_empty() {
                content
            } else {
                content + "\n"
            }
        }
        Chomp::Keep => {
            let breaks = if content_lines.is_empty() {
                stripped.len()
            } else {
                1 + trailing_blanks
            };
            let mut text = content;
            for _ in 0..breaks {
                text.push('\n');
            }
            text
        }
    };
    (text, style)
}

/// Folding for `>` scalars: breaks around more-indented lines are kept
/// verbatim, otherwise a single break folds to a space.
fn fold_block(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut prev_more = false;
    let mut seen_content = false;
    let mut blanks = 0;
    for line in lines {
        if line.trim().is_empty() {
            if seen_content {
                blanks += 1;
            } else {
                // Leading blank lines are preserved verbatim.
                out.push('\n');
            }
            continue;
        }
        let more = line.starts_with(' ') || line.starts_with('\t');
        if seen_content {
            if prev_more || more {
                for _ in 0..=blanks {
                    out.push('\n');
                }
            } else if blanks == 0 {
                out.push(' ');
            } else {
                for _ in 0..blanks {
                    out.push('\n');
                }
            }
        }
        out.push_str(line);
        prev_more = more;
        seen_content = true;
        blanks = 0;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn first_doc(src: &str) -> Document {
        let mut docs = compose(src, &ParseOptions::default());
        assert!(!docs.is_empty(), "no documents in {src:?}");
        docs.remove(0)
    }

    fn root_value(src: &str) -> crate::Value {
        first_doc(src).to_value(100).unwrap()
    }

    fn scalar_text(doc: &Document, id: NodeId) -> &ScalarValue {
        &doc.node(id).as_scalar().expect("scalar").value
    }

    #[test]
    fn composes_typed_scalars() {
        use crate::Value;
        let v = root_value("a: 1\nb: true\nc: ~\nd: 1.5\ne: text\n");
        let map = v.as_map().unwrap();
        assert_eq!(map[&Value::from("a")], Value::Int(1));
        assert_eq!(map[&Value::from("b")], Value::Bool(true));
        assert_eq!(map[&Value::from("c")], Value::Null);
        assert_eq!(map[&Value::from("d")], Value::from(1.5));
        assert_eq!(map[&Value::from("e")], Value::from("text"));
    }

    #[test]
    fn quoted_scalars_stay_strings() {
        use crate::Value;
        let v = root_value("a: \"1\"\nb: 'true'\n");
        let map = v.as_map().unwrap();
        assert_eq!(map[&Value::from("a")], Value::from("1"));
        assert_eq!(map[&Value::from("b")], Value::from("true"));
    }

    #[test]
    fn double_quoted_escapes() {
        use crate::Value;
        assert_eq!(root_value(r#""a\tb\n""#), Value::from("a\tb\n"));
        assert_eq!(root_value(r#""\x41B""#), Value::from("AB"));
        assert_eq!(root_value("\"a\\\nb\""), Value::from("ab"));
        assert_eq!(root_value("\"a\nb\""), Value::from("a b"));
        assert_eq!(root_value(r#""😀""#), Value::from("\u{1f600}"));
    }

    #[test]
    fn single_quoted_escape_and_folding() {
        use crate::Value;
        assert_eq!(root_value("'it''s'"), Value::from("it's"));
        assert_eq!(root_value("'a\nb'"), Value::from("a b"));
        assert_eq!(root_value("'a\n\nb'"), Value::from("a\nb"));
    }

    #[test]
    fn plain_multiline_folds() {
        use crate::Value;
        assert_eq!(root_value("key: one\n  two\n").as_map().unwrap()[&Value::from("key")], Value::from("one two"));
    }

    #[test]
    fn literal_block_scalar_chomping() {
        use crate::Value;
        assert_eq!(root_value("k: |\n  a\n  b\n").as_map().unwrap()[&Value::from("k")], Value::from("a\nb\n"));
        assert_eq!(root_value("k: |-\n  a\n  b\n").as_map().unwrap()[&Value::from("k")], Value::from("a\nb"));
        assert_eq!(root_value("k: |+\n  a\n\n\n").as_map().unwrap()[&Value::from("k")], Value::from("a\n\n\n"));
    }

    #[test]
    fn folded_block_scalar() {
        use crate::Value;
        assert_eq!(
            root_value("k: >\n  one\n  two\n\n  three\n").as_map().unwrap()[&Value::from("k")],
            Value::from("one two\nthree\n")
        );
        // More-indented lines keep their breaks.
        assert_eq!(
            root_value("k: >\n  one\n   more\n  two\n").as_map().unwrap()[&Value::from("k")],
            Value::from("one\n more\ntwo\n")
        );
    }

    #[test]
    fn explicit_indentation_digit() {
        use crate::Value;
        assert_eq!(
            root_value("k: |2\n   a\n").as_map().unwrap()[&Value::from("k")],
            Value::from(" a\n")
        );
    }

    #[test]
    fn anchors_and_aliases_resolve() {
        use crate::Value;
        let v = root_value("a: &x 1\nb: *x\n");
        let map = v.as_map().unwrap();
        assert_eq!(map[&Value::from("b")], Value::Int(1));
    }

    #[test]
    fn explicit_tags_override_resolution() {
        use crate::Value;
        assert_eq!(root_value("!!str 123"), Value::from("123"));
        assert_eq!(root_value("!!int '42'"), Value::Int(42));
    }

    #[test]
    fn unknown_core_tag_warns() {
        let doc = first_doc("!!nope x\n");
        assert!(doc
            .warnings
            .iter()
            .any(|w| w.code == ErrorCode::TagResolveFailed));
    }

    #[test]
    fn yaml_version_directive_switches_schema() {
        use crate::Value;
        let mut docs = compose("%YAML 1.1\n---\n[ n, Y, on, off ]\n", &ParseOptions::default());
        let v = docs.remove(0).to_value(100).unwrap();
        assert_eq!(
            v,
            Value::Seq(vec![
                Value::Bool(false),
                Value::Bool(true),
                Value::Bool(true),
                Value::Bool(false),
            ])
        );
    }

    #[test]
    fn merge_keys_from_source() {
        use crate::Value;
        let src = "anchors:\n  - &base { x: 1, y: 2 }\nfoo:\n  <<: *base\n  y: 9\n";
        let opts = ParseOptions {
            schema: Some(SchemaId::Yaml11),
            ..ParseOptions::default()
        };
        let mut docs = compose(src, &opts);
        let v = docs.remove(0).to_value(100).unwrap();
        let foo = &v.as_map().unwrap()[&Value::from("foo")];
        let foo = foo.as_map().unwrap();
        assert_eq!(foo[&Value::from("x")], Value::Int(1));
        assert_eq!(foo[&Value::from("y")], Value::Int(9));
    }

    #[test]
    fn multiple_anchors_is_an_error() {
        let doc = first_doc("&a &b x\n");
        assert!(doc
            .errors
            .iter()
            .any(|e| e.code == ErrorCode::MultipleAnchors));
    }

    #[test]
    fn alias_with_properties_is_an_error() {
        let doc = first_doc("a: &x 1\nb: !!str *x\n");
        assert!(doc.errors.iter().any(|e| e.code == ErrorCode::AliasProps));
    }

    #[test]
    fn duplicate_keys_warn() {
        let doc = first_doc("a: 1\na: 2\n");
        assert!(doc
            .warnings
            .iter()
            .any(|w| w.code == ErrorCode::DuplicateKey));
    }

    #[test]
    fn comments_attach_to_nodes() {
        let doc = first_doc("# before\nkey: value # after\n");
        let root = doc.contents.unwrap();
        assert_eq!(doc.node(root).comment_before.as_deref(), Some(" before"));

        let doc = first_doc("a: 1\n# note\nb: 2\n");
        let root = doc.contents.unwrap();
        let map = doc.node(root).as_map().unwrap();
        let b_key = map.pairs[1].key.unwrap();
        assert_eq!(doc.node(b_key).comment_before.as_deref(), Some(" note"));
    }

    #[test]
    fn number_format_hints() {
        let doc = first_doc("a: 0x1f\nb: 1.50\nc: 1e3\n");
        let root = doc.contents.unwrap();
        let map = doc.node(root).as_map().unwrap();
        let a = doc.node(map.pairs[0].value.unwrap()).as_scalar().unwrap();
        assert_eq!(a.format, Some(NumberFormat::Hex));
        let b = doc.node(map.pairs[1].value.unwrap()).as_scalar().unwrap();
        assert_eq!(b.min_fraction_digits, 2);
        let c = doc.node(map.pairs[2].value.unwrap()).as_scalar().unwrap();
        assert_eq!(c.format, Some(NumberFormat::Exp));
        let _ = scalar_text(&doc, map.pairs[0].value.unwrap());
    }

    #[test]
    fn ranges_are_attached() {
        let doc = first_doc("key: value\n");
        let root = doc.contents.unwrap();
        assert!(doc.node(root).range.is_some());
        let map = doc.node(root).as_map().unwrap();
        let value = map.pairs[0].value.unwrap();
        assert_eq!(doc.node(value).range, Some([5, 10]));
    }

    #[test]
    fn tag_directive_handles() {
        let src = "%TAG !e! tag:example.com,2000:\n---\n!e!foo bar\n";
        let doc = first_doc(src);
        let root = doc.contents.unwrap();
        assert_eq!(
            doc.node(root).tag.as_deref(),
            Some("tag:example.com,2000:foo")
        );
    }

    #[test]
    fn flow_pair_in_sequence_becomes_mapping() {
        use crate::Value;
        let v = root_value("[a: 1]\n");
        let Value::Seq(items) = v else { panic!("expected seq") };
        let map = items[0].as_map().unwrap();
        assert_eq!(map[&Value::from("a")], Value::Int(1));
    }
}
