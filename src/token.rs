use crate::YamlError;

/// A lexed source token.
///
/// Tokens borrow the input text; `source` is the exact slice the token was
/// scanned from, so concatenating the sources of every token in a stream
/// reproduces the input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceToken<'s> {
    /// The token type.
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub offset: usize,
    /// The raw source slice.
    pub source: &'s str,
}

/// Source token types.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TokenKind {
    /// A leading U+FEFF.
    ByteOrderMark,
    /// Marks the start of document content mode (zero-width).
    DocMode,
    /// A `---` document start marker.
    DocStart,
    /// A `...` document end marker.
    DocEnd,
    /// A `{`.
    FlowMapStart,
    /// A `}`.
    FlowMapEnd,
    /// A `[`.
    FlowSeqStart,
    /// A `]`.
    FlowSeqEnd,
    /// Zero-width marker closing an unterminated quoted scalar.
    FlowErrorEnd,
    /// A `,` separator in flow context.
    Comma,
    /// A `?` explicit key indicator.
    ExplicitKeyInd,
    /// A `:` mapping value indicator.
    MapValueInd,
    /// A `-` sequence item indicator.
    SeqItemInd,
    /// An `&name` anchor property.
    Anchor,
    /// A `*name` alias node.
    Alias,
    /// A `!...` tag property.
    Tag,
    /// A line break (`\n` or `\r\n`).
    Newline,
    /// A run of spaces and tabs.
    Space,
    /// A `#` comment running to the end of the line.
    Comment,
    /// A full `%YAML` or `%TAG` directive line.
    DirectiveLine,
    /// The `|` or `>` header of a block scalar, with modifiers.
    BlockScalarHeader,
    /// The raw body of a block scalar, newlines included.
    BlockScalar,
    /// A `'...'` scalar, quotes included.
    SingleQuotedScalar,
    /// A `"..."` scalar, quotes included.
    DoubleQuotedScalar,
    /// A plain scalar.
    Scalar,
}

impl TokenKind {
    /// Tokens that never contribute content: whitespace, breaks, comments.
    pub fn is_space(self) -> bool {
        matches!(
            self,
            TokenKind::Space | TokenKind::Newline | TokenKind::Comment
        )
    }
}

/// A node of the parser's token tree.
#[derive(Debug)]
pub enum TokenNode<'s> {
    FlowScalar(FlowScalarNode<'s>),
    BlockScalar(BlockScalarNode<'s>),
    BlockMap(BlockMapNode<'s>),
    BlockSeq(BlockSeqNode<'s>),
    FlowCollection(FlowCollectionNode<'s>),
}

impl<'s> TokenNode<'s> {
    /// Byte offset where the node's own content begins.
    pub fn offset(&self) -> usize {
        match self {
            TokenNode::FlowScalar(n) => n.offset,
            TokenNode::BlockScalar(n) => n.offset,
            TokenNode::BlockMap(n) => n.offset,
            TokenNode::BlockSeq(n) => n.offset,
            TokenNode::FlowCollection(n) => n.offset,
        }
    }

    /// Byte offset one past the node's last content character.
    pub fn end_offset(&self) -> usize {
        match self {
            TokenNode::FlowScalar(n) => n.offset + n.source.len(),
            TokenNode::BlockScalar(n) => n.offset + n.source.len(),
            TokenNode::BlockMap(n) => n
                .items
                .last()
                .and_then(CollectionItem::end_offset)
                .unwrap_or(n.offset),
            TokenNode::BlockSeq(n) => n
                .items
                .last()
                .and_then(CollectionItem::end_offset)
                .unwrap_or(n.offset),
            TokenNode::FlowCollection(n) => n
                .end
                .iter()
                .rev()
                .find(|t| !t.kind.is_space())
                .map_or_else(
                    || {
                        n.items
                            .last()
                            .and_then(CollectionItem::end_offset)
                            .unwrap_or(n.offset + 1)
                    },
                    |t| t.offset + t.source.len(),
                ),
        }
    }
}

/// The quoting style of a flow scalar token.
///
/// Aliases are carried as a scalar-shaped leaf: `*name` occupies a value
/// position exactly like a plain scalar does.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Alias,
}

/// A plain or quoted scalar, possibly spanning multiple lines.
#[derive(Debug)]
pub struct FlowScalarNode<'s> {
    pub style: FlowScalarStyle,
    pub offset: usize,
    /// Raw source, quotes and embedded line breaks included.
    pub source: &'s str,
}

/// A `|` or `>` scalar with its header.
#[derive(Debug)]
pub struct BlockScalarNode<'s> {
    pub offset: usize,
    /// The header token source, e.g. `|`, `>-`, `|+2`.
    pub header: &'s str,
    /// Indentation of the line the header appeared on.
    pub indent: usize,
    /// Trivia between the header and the body: spaces, a trailing comment,
    /// the line break.
    pub inline: Vec<SourceToken<'s>>,
    /// Raw body: every line after the header, breaks included.
    pub source: &'s str,
}

/// An indentation-structured mapping.
#[derive(Debug)]
pub struct BlockMapNode<'s> {
    pub offset: usize,
    /// Base indent: the column of the first key.
    pub indent: usize,
    pub items: Vec<CollectionItem<'s>>,
}

/// An indentation-structured sequence of `- ` items.
#[derive(Debug)]
pub struct BlockSeqNode<'s> {
    pub offset: usize,
    /// Base indent: the column of the `-` markers.
    pub indent: usize,
    pub items: Vec<CollectionItem<'s>>,
}

/// The bracket flavor of a flow collection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowKind {
    Map,
    Seq,
}

/// A `[...]` or `{...}` collection.
#[derive(Debug)]
pub struct FlowCollectionNode<'s> {
    pub offset: usize,
    pub kind: FlowKind,
    pub items: Vec<CollectionItem<'s>>,
    /// Closing bracket and anything after it on the same line.
    pub end: Vec<SourceToken<'s>>,
}

/// One entry of a collection node.
///
/// `start` holds everything before the key (or lone value): indicators,
/// separators, comments and node properties. `sep` holds the tokens between
/// key and value, including the `:` indicator and the value's properties.
#[derive(Debug, Default)]
pub struct CollectionItem<'s> {
    pub start: Vec<SourceToken<'s>>,
    pub key: Option<Box<TokenNode<'s>>>,
    pub sep: Vec<SourceToken<'s>>,
    pub value: Option<Box<TokenNode<'s>>>,
}

impl<'s> CollectionItem<'s> {
    pub fn end_offset(&self) -> Option<usize> {
        self.value
            .as_deref()
            .or(self.key.as_deref())
            .map(TokenNode::end_offset)
    }
}

/// One document of the parsed stream.
#[derive(Debug)]
pub struct DocumentNode<'s> {
    pub offset: usize,
    /// Directive lines, the `---` marker and surrounding trivia.
    pub start: Vec<SourceToken<'s>>,
    pub value: Option<TokenNode<'s>>,
    /// The `...` marker and trailing trivia.
    pub end: Vec<SourceToken<'s>>,
    /// Syntax errors found while parsing this document.
    pub errors: Vec<YamlError>,
}

impl<'s> DocumentNode<'s> {
    /// Whether an explicit `---` marker opened this document.
    pub fn has_directives_end_marker(&self) -> bool {
        self.start.iter().any(|t| t.kind == TokenKind::DocStart)
    }
}
