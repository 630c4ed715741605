use crate::error::{ErrorCode, YamlError};
use crate::lexer::Lexer;
use crate::token::{
    BlockMapNode, BlockScalarNode, BlockSeqNode, CollectionItem, DocumentNode, FlowCollectionNode,
    FlowKind, FlowScalarNode, FlowScalarStyle, SourceToken, TokenKind, TokenNode,
};

/// The block-structure parser.
///
/// Consumes the lexer's token stream and groups it into a tree of
/// [`DocumentNode`]s. The parser owns the indentation rules: an item at
/// column `c` belongs to the innermost open collection whose base indent is
/// less than `c`, and a line at or left of the base indent closes the
/// collection.
///
/// All syntax errors are recorded on the containing document and parsing
/// continues best-effort, so the composer always receives a tree.
pub struct Parser<'s> {
    src: &'s str,
    tokens: Vec<SourceToken<'s>>,
    cols: Vec<usize>,
    pos: usize,
    strict: bool,
    errors: Vec<YamlError>,
}

const PROP_KINDS: &[TokenKind] = &[
    TokenKind::Space,
    TokenKind::Newline,
    TokenKind::Comment,
    TokenKind::Anchor,
    TokenKind::Tag,
];

fn is_content(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Scalar
            | TokenKind::SingleQuotedScalar
            | TokenKind::DoubleQuotedScalar
            | TokenKind::Alias
            | TokenKind::FlowSeqStart
            | TokenKind::FlowMapStart
            | TokenKind::BlockScalarHeader
            | TokenKind::SeqItemInd
            | TokenKind::ExplicitKeyInd
            | TokenKind::MapValueInd
    )
}

impl<'s> Parser<'s> {
    pub fn new(strict: bool) -> Parser<'s> {
        Parser {
            src: "",
            tokens: Vec::new(),
            cols: Vec::new(),
            pos: 0,
            strict,
            errors: Vec::new(),
        }
    }

    /// Parse a complete source string into a stream of document trees.
    pub fn parse(&mut self, src: &'s str) -> Vec<DocumentNode<'s>> {
        self.src = src;
        self.tokens = Lexer::new(src).collect();
        self.cols = compute_columns(&self.tokens);
        self.pos = 0;
        self.errors.clear();

        let mut pre_errors = self.scan_token_stream_errors();
        let mut docs = Vec::new();
        let mut pending: Vec<SourceToken<'s>> = Vec::new();
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::DocMode {
                let doc = self.parse_document(std::mem::take(&mut pending));
                docs.push(doc);
            } else {
                pending.push(token);
                self.pos += 1;
            }
        }
        if let Some(last) = docs.last_mut() {
            last.end.append(&mut pending);
        }

        // Attach stream-level diagnostics to the document whose source range
        // contains them.
        for err in pre_errors.drain(..) {
            let target_idx = docs
                .iter()
                .enumerate()
                .rev()
                .find(|(_, d)| d.offset <= err.span[0])
                .map(|(i, _)| i)
                .or(if docs.is_empty() { None } else { Some(0) });
            if let Some(idx) = target_idx {
                docs[idx].errors.push(err);
            }
        }
        docs
    }

    fn peek(&self) -> Option<SourceToken<'s>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn col(&self) -> usize {
        self.cols.get(self.pos).copied().unwrap_or(0)
    }

    fn bump(&mut self) -> SourceToken<'s> {
        let t = self.tokens[self.pos];
        self.pos += 1;
        t
    }

    fn error(&mut self, code: ErrorCode, span: [usize; 2], message: impl Into<String>) {
        self.errors.push(YamlError::new(code, span, message));
    }

    /// Checks that need only the flat token stream: comment spacing in
    /// strict mode and tabs used as block indentation.
    fn scan_token_stream_errors(&self) -> Vec<YamlError> {
        let mut errors = Vec::new();
        for (i, t) in self.tokens.iter().enumerate() {
            match t.kind {
                TokenKind::Comment if self.strict && t.offset > 0 => {
                    let before = &self.src[..t.offset];
                    let prev = before.chars().next_back();
                    if prev.is_some_and(|c| !c.is_whitespace()) {
                        errors.push(YamlError::new(
                            ErrorCode::CommentSpace,
                            [t.offset, t.offset + 1],
                            "comments must be separated from other tokens by white space",
                        ));
                    }
                }
                TokenKind::Space
                    if t.source.contains('\t')
                        && i > 0
                        && self.tokens[i - 1].kind == TokenKind::Newline
                        && matches!(
                            self.tokens.get(i + 1).map(|n| n.kind),
                            Some(TokenKind::SeqItemInd | TokenKind::ExplicitKeyInd)
                        ) =>
                {
                    errors.push(YamlError::new(
                        ErrorCode::TabAsIndent,
                        [t.offset, t.offset + t.source.len()],
                        "tabs are not allowed as indentation",
                    ));
                }
                _ => {}
            }
        }
        errors
    }

    fn parse_document(&mut self, pending: Vec<SourceToken<'s>>) -> DocumentNode<'s> {
        let mut start = pending;
        let offset = start
            .first()
            .map_or_else(|| self.peek().map_or(0, |t| t.offset), |t| t.offset);
        debug_assert_eq!(self.peek_kind(), Some(TokenKind::DocMode));
        start.push(self.bump());

        loop {
            match self.peek_kind() {
                Some(
                    TokenKind::Space
                    | TokenKind::Newline
                    | TokenKind::Comment
                    | TokenKind::DirectiveLine
                    | TokenKind::ByteOrderMark
                    | TokenKind::DocStart,
                ) => start.push(self.bump()),
                _ => break,
            }
        }

        let (props, value) = self.parse_node_after_marker(-1, true);
        start.extend(props);

        let mut end = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::Space | TokenKind::Comment | TokenKind::Newline) => {
                    end.push(self.bump());
                }
                Some(TokenKind::DocEnd) => {
                    end.push(self.bump());
                    // The rest of the marker line stays with this document.
                    while matches!(
                        self.peek_kind(),
                        Some(TokenKind::Space | TokenKind::Comment)
                    ) {
                        end.push(self.bump());
                    }
                    if self.peek_kind() == Some(TokenKind::Newline) {
                        end.push(self.bump());
                    }
                    break;
                }
                Some(TokenKind::DocMode) | None => break,
                Some(_) => {
                    let t = self.bump();
                    self.error(
                        ErrorCode::UnexpectedToken,
                        [t.offset, t.offset + t.source.len().max(1)],
                        format!("unexpected content after document contents: {:?}", t.source),
                    );
                    end.push(t);
                }
            }
        }

        DocumentNode {
            offset,
            start,
            value,
            end,
            errors: std::mem::take(&mut self.errors),
        }
    }

    /// Collect the trivia-and-properties run in front of a node, then parse
    /// the node itself.
    ///
    /// Returns the consumed run and the node, if any. A candidate node is
    /// only accepted when it sits deeper than `min_indent`; otherwise the
    /// cursor is rewound so the outer collection can claim the tokens. When
    /// the run carries an anchor or tag but no node follows (an anchored
    /// empty scalar), the run is consumed up to the last property.
    fn parse_node_after_marker(
        &mut self,
        min_indent: isize,
        allow_indentless_seq: bool,
    ) -> (Vec<SourceToken<'s>>, Option<TokenNode<'s>>) {
        let save = self.pos;
        let mut run = Vec::new();
        let mut same_line = true;
        let mut last_prop_end = None;
        while let Some(t) = self.peek() {
            if !PROP_KINDS.contains(&t.kind) {
                break;
            }
            if t.kind == TokenKind::Newline {
                same_line = false;
            }
            if matches!(t.kind, TokenKind::Anchor | TokenKind::Tag) {
                last_prop_end = Some(self.pos + 1);
            }
            run.push(self.bump());
        }

        let rewind_to_props = |parser: &mut Self, run: Vec<SourceToken<'s>>| {
            match last_prop_end {
                Some(end) => {
                    parser.pos = end;
                    (run.into_iter().take(end - save).collect(), None)
                }
                None => {
                    parser.pos = save;
                    (Vec::new(), None)
                }
            }
        };

        let Some(next) = self.peek() else {
            return rewind_to_props(self, run);
        };
        if !is_content(next.kind) {
            return rewind_to_props(self, run);
        }
        if !same_line {
            let col = self.col() as isize;
            let indentless =
                allow_indentless_seq && next.kind == TokenKind::SeqItemInd && col == min_indent;
            if col <= min_indent && !indentless {
                return rewind_to_props(self, run);
            }
        }
        let node = self.parse_block_node(min_indent);
        (run, node)
    }

    /// Parse one node in block context, starting at a content token.
    ///
    /// A scalar or flow collection followed by an inline `:` is promoted to
    /// the first key of a block mapping at its own column.
    fn parse_block_node(&mut self, min_indent: isize) -> Option<TokenNode<'s>> {
        let col = self.col();
        match self.peek_kind()? {
            TokenKind::SeqItemInd => Some(self.parse_block_seq(col)),
            TokenKind::ExplicitKeyInd | TokenKind::MapValueInd => {
                Some(self.parse_block_map(col, None))
            }
            TokenKind::Scalar => {
                let node = self.parse_plain_scalar(min_indent, false);
                self.promote_if_key(col, TokenNode::FlowScalar(node))
            }
            TokenKind::SingleQuotedScalar | TokenKind::DoubleQuotedScalar | TokenKind::Alias => {
                let node = self.parse_simple_flow_scalar();
                self.promote_if_key(col, TokenNode::FlowScalar(node))
            }
            TokenKind::FlowSeqStart | TokenKind::FlowMapStart => {
                let node = self.parse_flow_collection();
                self.promote_if_key(col, TokenNode::FlowCollection(node))
            }
            TokenKind::BlockScalarHeader => Some(self.parse_block_scalar()),
            _ => {
                let t = self.bump();
                self.error(
                    ErrorCode::UnexpectedToken,
                    [t.offset, t.offset + t.source.len().max(1)],
                    format!("unexpected token {:?}", t.source),
                );
                None
            }
        }
    }

    fn promote_if_key(&mut self, col: usize, key: TokenNode<'s>) -> Option<TokenNode<'s>> {
        let save = self.pos;
        let mut sep = Vec::new();
        if self.peek_kind() == Some(TokenKind::Space) {
            sep.push(self.bump());
        }
        if self.peek_kind() == Some(TokenKind::MapValueInd) {
            return Some(self.parse_block_map(col, Some((sep, key))));
        }
        self.pos = save;
        Some(key)
    }

    fn parse_block_seq(&mut self, indent: usize) -> TokenNode<'s> {
        let offset = self.peek().map_or(0, |t| t.offset);
        let mut items = Vec::new();
        loop {
            let save = self.pos;
            let mut start = Vec::new();
            while matches!(
                self.peek_kind(),
                Some(TokenKind::Space | TokenKind::Newline | TokenKind::Comment)
            ) {
                start.push(self.bump());
            }
            if self.peek_kind() == Some(TokenKind::SeqItemInd) && self.col() == indent {
                start.push(self.bump());
                let (props, value) = self.parse_node_after_marker(indent as isize, false);
                start.extend(props);
                items.push(CollectionItem {
                    start,
                    key: None,
                    sep: Vec::new(),
                    value: value.map(Box::new),
                });
            } else {
                self.pos = save;
                break;
            }
        }
        TokenNode::BlockSeq(BlockSeqNode {
            offset,
            indent,
            items,
        })
    }

    fn parse_block_map(
        &mut self,
        indent: usize,
        first_key: Option<(Vec<SourceToken<'s>>, TokenNode<'s>)>,
    ) -> TokenNode<'s> {
        let offset = first_key
            .as_ref()
            .map_or_else(|| self.peek().map_or(0, |t| t.offset), |(_, k)| k.offset());
        let mut items = Vec::new();

        if let Some((mut sep, key)) = first_key {
            debug_assert_eq!(self.peek_kind(), Some(TokenKind::MapValueInd));
            sep.push(self.bump());
            let (props, value) = self.parse_node_after_marker(indent as isize, true);
            sep.extend(props);
            items.push(CollectionItem {
                start: Vec::new(),
                key: Some(Box::new(key)),
                sep,
                value: value.map(Box::new),
            });
        }

        loop {
            let save = self.pos;
            let mut start = Vec::new();
            while matches!(
                self.peek_kind(),
                Some(TokenKind::Space | TokenKind::Newline | TokenKind::Comment)
            ) {
                start.push(self.bump());
            }
            let Some(next) = self.peek() else {
                self.pos = save;
                break;
            };
            if self.col() != indent {
                self.pos = save;
                break;
            }
            match next.kind {
                TokenKind::ExplicitKeyInd => {
                    start.push(self.bump());
                    let (props, key) = self.parse_node_after_marker(indent as isize, false);
                    start.extend(props);
                    let (sep, value) = self.parse_explicit_value(indent);
                    items.push(CollectionItem {
                        start,
                        key: key.map(Box::new),
                        sep,
                        value: value.map(Box::new),
                    });
                }
                TokenKind::MapValueInd => {
                    let mut sep = vec![self.bump()];
                    let (props, value) = self.parse_node_after_marker(indent as isize, true);
                    sep.extend(props);
                    items.push(CollectionItem {
                        start,
                        key: None,
                        sep,
                        value: value.map(Box::new),
                    });
                }
                TokenKind::Anchor
                | TokenKind::Tag
                | TokenKind::Scalar
                | TokenKind::SingleQuotedScalar
                | TokenKind::DoubleQuotedScalar
                | TokenKind::Alias
                | TokenKind::FlowSeqStart
                | TokenKind::FlowMapStart => {
                    // Implicit key: collect inline properties, then a
                    // single-line node, then require `:`.
                    while matches!(
                        self.peek_kind(),
                        Some(TokenKind::Anchor | TokenKind::Tag | TokenKind::Space)
                    ) {
                        start.push(self.bump());
                    }
                    if !matches!(
                        self.peek_kind(),
                        Some(
                            TokenKind::Scalar
                                | TokenKind::SingleQuotedScalar
                                | TokenKind::DoubleQuotedScalar
                                | TokenKind::Alias
                                | TokenKind::FlowSeqStart
                                | TokenKind::FlowMapStart
                        )
                    ) {
                        // Properties with nothing to hang them on: an
                        // anchored empty item ends the mapping.
                        items.push(CollectionItem {
                            start,
                            ..CollectionItem::default()
                        });
                        break;
                    }
                    let key = self.parse_implicit_key();
                    let mut sep = Vec::new();
                    if self.peek_kind() == Some(TokenKind::Space) {
                        sep.push(self.bump());
                    }
                    if self.peek_kind() == Some(TokenKind::MapValueInd) {
                        sep.push(self.bump());
                        let (props, value) = self.parse_node_after_marker(indent as isize, true);
                        sep.extend(props);
                        items.push(CollectionItem {
                            start,
                            key: key.map(Box::new),
                            sep,
                            value: value.map(Box::new),
                        });
                    } else {
                        let at = key.as_ref().map_or(next.offset, |k| k.end_offset());
                        self.error(
                            ErrorCode::MissingChar,
                            [at, at + 1],
                            "implicit map key is missing its \":\" indicator",
                        );
                        items.push(CollectionItem {
                            start,
                            key: key.map(Box::new),
                            sep,
                            value: None,
                        });
                    }
                }
                _ => {
                    self.pos = save;
                    break;
                }
            }
        }
        TokenNode::BlockMap(BlockMapNode {
            offset,
            indent,
            items,
        })
    }

    fn parse_explicit_value(
        &mut self,
        indent: usize,
    ) -> (Vec<SourceToken<'s>>, Option<TokenNode<'s>>) {
        let save = self.pos;
        let mut sep = Vec::new();
        let mut same_line = true;
        while matches!(
            self.peek_kind(),
            Some(TokenKind::Space | TokenKind::Newline | TokenKind::Comment)
        ) {
            if self.peek_kind() == Some(TokenKind::Newline) {
                same_line = false;
            }
            sep.push(self.bump());
        }
        let at_marker = self.peek_kind() == Some(TokenKind::MapValueInd)
            && (same_line || self.col() == indent);
        if !at_marker {
            self.pos = save;
            return (Vec::new(), None);
        }
        sep.push(self.bump());
        let (props, value) = self.parse_node_after_marker(indent as isize, true);
        sep.extend(props);
        (sep, value)
    }

    /// An implicit key: a single-line scalar, alias or flow collection.
    fn parse_implicit_key(&mut self) -> Option<TokenNode<'s>> {
        match self.peek_kind()? {
            TokenKind::Scalar => {
                let t = self.bump();
                Some(TokenNode::FlowScalar(FlowScalarNode {
                    style: FlowScalarStyle::Plain,
                    offset: t.offset,
                    source: t.source,
                }))
            }
            TokenKind::SingleQuotedScalar | TokenKind::DoubleQuotedScalar | TokenKind::Alias => {
                Some(TokenNode::FlowScalar(self.parse_simple_flow_scalar()))
            }
            TokenKind::FlowSeqStart | TokenKind::FlowMapStart => {
                Some(TokenNode::FlowCollection(self.parse_flow_collection()))
            }
            _ => None,
        }
    }

    /// A quoted scalar or alias; one token, possibly internally multiline.
    fn parse_simple_flow_scalar(&mut self) -> FlowScalarNode<'s> {
        let t = self.bump();
        let style = match t.kind {
            TokenKind::SingleQuotedScalar => FlowScalarStyle::SingleQuoted,
            TokenKind::DoubleQuotedScalar => FlowScalarStyle::DoubleQuoted,
            TokenKind::Alias => FlowScalarStyle::Alias,
            _ => FlowScalarStyle::Plain,
        };
        if self.peek_kind() == Some(TokenKind::FlowErrorEnd) {
            let end = self.bump();
            self.error(
                ErrorCode::MissingChar,
                [end.offset, end.offset + 1],
                "missing closing quote",
            );
        }
        FlowScalarNode {
            style,
            offset: t.offset,
            source: t.source,
        }
    }

    /// A plain scalar, merging continuation lines.
    ///
    /// A following line continues the scalar when it holds a lone plain
    /// scalar token deeper than `min_indent` that is not itself an implicit
    /// key.
    fn parse_plain_scalar(&mut self, min_indent: isize, in_flow: bool) -> FlowScalarNode<'s> {
        let first = self.bump();
        let mut end = first.offset + first.source.len();
        loop {
            let save = self.pos;
            let mut saw_newline = false;
            while matches!(self.peek_kind(), Some(TokenKind::Space | TokenKind::Newline)) {
                if self.peek_kind() == Some(TokenKind::Newline) {
                    saw_newline = true;
                }
                self.pos += 1;
            }
            if !saw_newline || self.peek_kind() != Some(TokenKind::Scalar) {
                self.pos = save;
                break;
            }
            if !in_flow && self.col() as isize <= min_indent {
                self.pos = save;
                break;
            }
            let cont = self.bump();
            // `foo: 1` on a continuation line is a new mapping, not content.
            let ahead = self.pos;
            let mut is_key = false;
            if self.peek_kind() == Some(TokenKind::Space) {
                self.pos += 1;
            }
            if self.peek_kind() == Some(TokenKind::MapValueInd) {
                is_key = true;
            }
            self.pos = ahead;
            if is_key {
                self.pos = save;
                break;
            }
            end = cont.offset + cont.source.len();
        }
        FlowScalarNode {
            style: FlowScalarStyle::Plain,
            offset: first.offset,
            source: &self.src[first.offset..end],
        }
    }

    fn parse_block_scalar(&mut self) -> TokenNode<'s> {
        let header = self.bump();
        let line_start = self.src[..header.offset].rfind('\n').map_or(0, |i| i + 1);
        let indent = self.src[line_start..]
            .chars()
            .take_while(|&c| c == ' ')
            .count();
        let mut inline = Vec::new();
        while matches!(
            self.peek_kind(),
            Some(TokenKind::Space | TokenKind::Comment)
        ) {
            inline.push(self.bump());
        }
        if self.peek_kind() == Some(TokenKind::Newline) {
            inline.push(self.bump());
        }
        let source = if self.peek_kind() == Some(TokenKind::BlockScalar) {
            self.bump().source
        } else {
            ""
        };
        TokenNode::BlockScalar(BlockScalarNode {
            offset: header.offset,
            header: header.source,
            indent,
            inline,
            source,
        })
    }

    fn parse_flow_collection(&mut self) -> FlowCollectionNode<'s> {
        let open = self.bump();
        let kind = if open.kind == TokenKind::FlowSeqStart {
            FlowKind::Seq
        } else {
            FlowKind::Map
        };
        let offset = open.offset;
        let mut items = Vec::new();
        let mut end = Vec::new();
        loop {
            let mut start = Vec::new();
            while matches!(
                self.peek_kind(),
                Some(
                    TokenKind::Space
                        | TokenKind::Newline
                        | TokenKind::Comment
                        | TokenKind::Comma
                        | TokenKind::Anchor
                        | TokenKind::Tag
                )
            ) {
                start.push(self.bump());
            }
            let Some(next) = self.peek() else {
                self.error(
                    ErrorCode::MissingChar,
                    [self.src.len(), self.src.len() + 1],
                    flow_close_problem(kind),
                );
                if !start.is_empty() {
                    items.push(CollectionItem {
                        start,
                        ..CollectionItem::default()
                    });
                }
                break;
            };
            match next.kind {
                TokenKind::FlowSeqEnd | TokenKind::FlowMapEnd => {
                    if !start.is_empty() {
                        items.push(CollectionItem {
                            start,
                            ..CollectionItem::default()
                        });
                    }
                    end.push(self.bump());
                    while matches!(
                        self.peek_kind(),
                        Some(TokenKind::Space | TokenKind::Comment)
                    ) {
                        end.push(self.bump());
                    }
                    break;
                }
                TokenKind::MapValueInd => {
                    let mut sep = vec![self.bump()];
                    let value = self.parse_flow_value(&mut sep);
                    items.push(CollectionItem {
                        start,
                        key: None,
                        sep,
                        value: value.map(Box::new),
                    });
                }
                TokenKind::DocMode | TokenKind::DocStart | TokenKind::DocEnd => {
                    self.error(
                        ErrorCode::MissingChar,
                        [next.offset, next.offset + 1],
                        flow_close_problem(kind),
                    );
                    if !start.is_empty() {
                        items.push(CollectionItem {
                            start,
                            ..CollectionItem::default()
                        });
                    }
                    break;
                }
                TokenKind::SeqItemInd | TokenKind::ExplicitKeyInd | TokenKind::BlockScalarHeader => {
                    let t = self.bump();
                    self.error(
                        ErrorCode::BlockInFlow,
                        [t.offset, t.offset + t.source.len().max(1)],
                        "block constructs are not allowed inside flow collections",
                    );
                }
                TokenKind::FlowErrorEnd => {
                    self.pos += 1;
                }
                _ if is_content(next.kind) => {
                    let node = self.parse_flow_node();
                    let save = self.pos;
                    let mut sep = Vec::new();
                    while matches!(
                        self.peek_kind(),
                        Some(TokenKind::Space | TokenKind::Newline | TokenKind::Comment)
                    ) {
                        sep.push(self.bump());
                    }
                    if self.peek_kind() == Some(TokenKind::MapValueInd) {
                        sep.push(self.bump());
                        let value = self.parse_flow_value(&mut sep);
                        items.push(CollectionItem {
                            start,
                            key: node.map(Box::new),
                            sep,
                            value: value.map(Box::new),
                        });
                    } else {
                        self.pos = save;
                        items.push(CollectionItem {
                            start,
                            key: None,
                            sep: Vec::new(),
                            value: node.map(Box::new),
                        });
                    }
                }
                _ => {
                    let t = self.bump();
                    self.error(
                        ErrorCode::UnexpectedToken,
                        [t.offset, t.offset + t.source.len().max(1)],
                        format!("unexpected token in flow collection: {:?}", t.source),
                    );
                }
            }
        }
        FlowCollectionNode {
            offset,
            kind,
            items,
            end,
        }
    }

    /// The value half of a flow pair; trivia and properties go into `sep`.
    fn parse_flow_value(&mut self, sep: &mut Vec<SourceToken<'s>>) -> Option<TokenNode<'s>> {
        let save = self.pos;
        let save_sep = sep.len();
        while matches!(
            self.peek_kind(),
            Some(
                TokenKind::Space
                    | TokenKind::Newline
                    | TokenKind::Comment
                    | TokenKind::Anchor
                    | TokenKind::Tag
            )
        ) {
            sep.push(self.bump());
        }
        match self.peek_kind() {
            Some(
                TokenKind::Scalar
                | TokenKind::SingleQuotedScalar
                | TokenKind::DoubleQuotedScalar
                | TokenKind::Alias
                | TokenKind::FlowSeqStart
                | TokenKind::FlowMapStart,
            ) => self.parse_flow_node(),
            _ => {
                // Keep properties (an anchored null value), drop plain trivia.
                let keep = sep[save_sep..]
                    .iter()
                    .rposition(|t| matches!(t.kind, TokenKind::Anchor | TokenKind::Tag))
                    .map(|i| save_sep + i + 1);
                match keep {
                    Some(keep) => {
                        self.pos = save + (keep - save_sep);
                        sep.truncate(keep);
                    }
                    None => {
                        self.pos = save;
                        sep.truncate(save_sep);
                    }
                }
                None
            }
        }
    }

    fn parse_flow_node(&mut self) -> Option<TokenNode<'s>> {
        match self.peek_kind()? {
            TokenKind::Scalar => Some(TokenNode::FlowScalar(self.parse_plain_scalar(-1, true))),
            TokenKind::SingleQuotedScalar | TokenKind::DoubleQuotedScalar | TokenKind::Alias => {
                Some(TokenNode::FlowScalar(self.parse_simple_flow_scalar()))
            }
            TokenKind::FlowSeqStart | TokenKind::FlowMapStart => {
                Some(TokenNode::FlowCollection(self.parse_flow_collection()))
            }
            _ => None,
        }
    }
}

fn flow_close_problem(kind: FlowKind) -> &'static str {
    match kind {
        FlowKind::Seq => "expected flow sequence to end with \"]\"",
        FlowKind::Map => "expected flow map to end with \"}\"",
    }
}

/// Column of each token, counted in characters from its line start.
fn compute_columns(tokens: &[SourceToken<'_>]) -> Vec<usize> {
    let mut cols = Vec::with_capacity(tokens.len());
    let mut col = 0usize;
    for t in tokens {
        cols.push(col);
        if let Some(nl) = t.source.rfind('\n') {
            col = t.source[nl + 1..].chars().count();
        } else {
            col += t.source.chars().count();
        }
    }
    cols
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Vec<DocumentNode<'_>> {
        Parser::new(false).parse(src)
    }

    fn single(src: &str) -> DocumentNode<'_> {
        let mut docs = parse(src);
        assert_eq!(docs.len(), 1, "expected one document in {src:?}");
        docs.remove(0)
    }

    #[test]
    fn block_map_items() {
        let doc = single("a: 1\nb: 2\n");
        let Some(TokenNode::BlockMap(map)) = &doc.value else {
            panic!("expected block map, got {:?}", doc.value);
        };
        assert_eq!(map.indent, 0);
        assert_eq!(map.items.len(), 2);
        let key = map.items[1].key.as_deref().unwrap();
        let TokenNode::FlowScalar(k) = key else {
            panic!("expected scalar key");
        };
        assert_eq!(k.source, "b");
    }

    #[test]
    fn block_seq_with_nested_map() {
        let doc = single("- a: 1\n  b: 2\n- x\n");
        let Some(TokenNode::BlockSeq(seq)) = &doc.value else {
            panic!("expected block seq");
        };
        assert_eq!(seq.items.len(), 2);
        let TokenNode::BlockMap(map) = seq.items[0].value.as_deref().unwrap() else {
            panic!("expected nested map");
        };
        assert_eq!(map.indent, 2);
        assert_eq!(map.items.len(), 2);
    }

    #[test]
    fn indentless_sequence_as_map_value() {
        let doc = single("key:\n- a\n- b\n");
        let Some(TokenNode::BlockMap(map)) = &doc.value else {
            panic!("expected block map");
        };
        let TokenNode::BlockSeq(seq) = map.items[0].value.as_deref().unwrap() else {
            panic!("expected indentless seq value");
        };
        assert_eq!(seq.indent, 0);
        assert_eq!(seq.items.len(), 2);
    }

    #[test]
    fn multiline_plain_scalar_merges() {
        let doc = single("key: one\n  two\n");
        let Some(TokenNode::BlockMap(map)) = &doc.value else {
            panic!("expected block map");
        };
        let TokenNode::FlowScalar(v) = map.items[0].value.as_deref().unwrap() else {
            panic!("expected scalar value");
        };
        assert_eq!(v.source, "one\n  two");
    }

    #[test]
    fn flow_collection_pairs() {
        let doc = single("{a: 1, b}\n");
        let Some(TokenNode::FlowCollection(flow)) = &doc.value else {
            panic!("expected flow collection");
        };
        assert_eq!(flow.kind, FlowKind::Map);
        assert_eq!(flow.items.len(), 2);
        assert!(flow.items[0].key.is_some());
        assert!(flow.items[0].value.is_some());
        assert!(flow.items[1].key.is_none());
    }

    #[test]
    fn explicit_key_pair() {
        let doc = single("? key\n: value\n");
        let Some(TokenNode::BlockMap(map)) = &doc.value else {
            panic!("expected block map");
        };
        assert_eq!(map.items.len(), 1);
        assert!(map.items[0].key.is_some());
        assert!(map.items[0].value.is_some());
    }

    #[test]
    fn multiple_documents() {
        let docs = parse("--- a\n--- b\n");
        assert_eq!(docs.len(), 2);
        assert!(docs[0].has_directives_end_marker());
        assert!(docs[1].has_directives_end_marker());
    }

    #[test]
    fn directives_attach_to_following_document() {
        let docs = parse("%YAML 1.1\n---\na\n");
        assert_eq!(docs.len(), 1);
        assert!(docs[0]
            .start
            .iter()
            .any(|t| t.kind == TokenKind::DirectiveLine));
    }

    #[test]
    fn unclosed_flow_records_missing_char() {
        let doc = single("[a, b\n");
        assert!(doc
            .errors
            .iter()
            .any(|e| e.code == ErrorCode::MissingChar));
    }

    #[test]
    fn missing_colon_is_recorded_not_fatal() {
        let doc = single("a: 1\nb\n");
        assert!(doc.errors.iter().any(|e| e.code == ErrorCode::MissingChar));
        let Some(TokenNode::BlockMap(map)) = &doc.value else {
            panic!("expected block map");
        };
        assert_eq!(map.items.len(), 2);
    }

    #[test]
    fn anchored_empty_scalar_keeps_properties() {
        let doc = single("- &a\n- b\n");
        let Some(TokenNode::BlockSeq(seq)) = &doc.value else {
            panic!("expected block seq");
        };
        assert_eq!(seq.items.len(), 2);
        assert!(seq.items[0].value.is_none());
        assert!(seq.items[0]
            .start
            .iter()
            .any(|t| t.kind == TokenKind::Anchor));
    }

    #[test]
    fn strict_comment_space() {
        let docs = Parser::new(true).parse("[a,#c\n]\n");
        assert!(docs[0]
            .errors
            .iter()
            .any(|e| e.code == ErrorCode::CommentSpace));
    }

    #[test]
    fn block_scalar_node_captures_header_and_body() {
        let doc = single("key: |-\n  text\n");
        let Some(TokenNode::BlockMap(map)) = &doc.value else {
            panic!("expected block map");
        };
        let TokenNode::BlockScalar(bs) = map.items[0].value.as_deref().unwrap() else {
            panic!("expected block scalar");
        };
        assert_eq!(bs.header, "|-");
        assert_eq!(bs.indent, 0);
        assert_eq!(bs.source, "  text\n");
    }
}
