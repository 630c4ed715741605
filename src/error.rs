/// A position in the source text.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Mark {
    /// The byte offset into the source.
    pub index: usize,
    /// The 0-based source line.
    pub line: usize,
    /// The 0-based column, counted in characters.
    pub column: usize,
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {} column {}", self.line + 1, self.column + 1)
    }
}

/// Maps byte offsets to 1-based line and column numbers.
///
/// The lexer feeds every newline it sees into the counter; afterwards
/// [`line_pos`](LineCounter::line_pos) answers position queries in
/// `O(log lines)`.
#[derive(Clone, Debug)]
pub struct LineCounter {
    line_starts: Vec<usize>,
}

impl Default for LineCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCounter {
    pub fn new() -> LineCounter {
        LineCounter {
            line_starts: vec![0],
        }
    }

    /// Record that a new line begins at byte `offset`.
    pub fn add_new_line(&mut self, offset: usize) {
        if self.line_starts.last().copied() != Some(offset) {
            self.line_starts.push(offset);
        }
    }

    /// The 1-based `(line, col)` of the byte at `offset`.
    ///
    /// The column is a byte count from the line start; for ASCII sources it
    /// equals the character column.
    pub fn line_pos(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }
}

/// Stable error and warning codes.
///
/// The string form (via [`as_str`](ErrorCode::as_str)) is part of the public
/// interface and never changes between releases.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    AliasProps,
    BadDirective,
    BadIndent,
    BadScalarStart,
    BlockAsImplicitKey,
    BlockInFlow,
    CommentSpace,
    DuplicateKey,
    Impossible,
    KeyOver1024Chars,
    MissingAnchor,
    MissingChar,
    MultilineImplicitKey,
    MultipleAnchors,
    MultipleDocs,
    MultipleTags,
    TabAsIndent,
    TagResolveFailed,
    UnexpectedToken,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::AliasProps => "ALIAS_PROPS",
            ErrorCode::BadDirective => "BAD_DIRECTIVE",
            ErrorCode::BadIndent => "BAD_INDENT",
            ErrorCode::BadScalarStart => "BAD_SCALAR_START",
            ErrorCode::BlockAsImplicitKey => "BLOCK_AS_IMPLICIT_KEY",
            ErrorCode::BlockInFlow => "BLOCK_IN_FLOW",
            ErrorCode::CommentSpace => "COMMENT_SPACE",
            ErrorCode::DuplicateKey => "DUPLICATE_KEY",
            ErrorCode::Impossible => "IMPOSSIBLE",
            ErrorCode::KeyOver1024Chars => "KEY_OVER_1024_CHARS",
            ErrorCode::MissingAnchor => "MISSING_ANCHOR",
            ErrorCode::MissingChar => "MISSING_CHAR",
            ErrorCode::MultilineImplicitKey => "MULTILINE_IMPLICIT_KEY",
            ErrorCode::MultipleAnchors => "MULTIPLE_ANCHORS",
            ErrorCode::MultipleDocs => "MULTIPLE_DOCS",
            ErrorCode::MultipleTags => "MULTIPLE_TAGS",
            ErrorCode::TabAsIndent => "TAB_AS_INDENT",
            ErrorCode::TagResolveFailed => "TAG_RESOLVE_FAILED",
            ErrorCode::UnexpectedToken => "UNEXPECTED_TOKEN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A syntactic error or warning recorded on a document.
///
/// Parsing never aborts on these; they accumulate on
/// [`Document::errors`](crate::Document::errors) and
/// [`Document::warnings`](crate::Document::warnings) while composition
/// continues best-effort.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{code}: {message}{}", pretty_suffix(.pretty))]
#[non_exhaustive]
pub struct YamlError {
    /// The stable code identifying the failure class.
    pub code: ErrorCode,
    /// Byte range `[start, end)` of the offending source.
    pub span: [usize; 2],
    /// Human-readable description.
    pub message: String,
    /// `(line, col)` filled in when pretty errors are enabled.
    pub pretty: Option<(usize, usize)>,
}

fn pretty_suffix(pretty: &Option<(usize, usize)>) -> String {
    match pretty {
        Some((line, col)) => format!(" at line {line}, column {col}"),
        None => String::new(),
    }
}

impl YamlError {
    pub fn new(code: ErrorCode, span: [usize; 2], message: impl Into<String>) -> YamlError {
        YamlError {
            code,
            span,
            message: message.into(),
            pretty: None,
        }
    }

    /// Attach a 1-based source position derived from `counter`.
    #[must_use]
    pub fn locate(mut self, counter: &LineCounter) -> YamlError {
        self.pretty = Some(counter.line_pos(self.span[0]));
        self
    }
}

/// Raised while converting a document to native values.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("unresolved alias *{name}")]
    UnresolvedAlias { name: String },
    #[error("excessive alias count for anchor &{name}")]
    ExcessiveAliasCount { name: String },
    #[error("cannot convert cyclic reference through anchor &{name} to a value")]
    CyclicReference { name: String },
    #[error("unknown tag {tag}")]
    UnknownTag { tag: String },
}

/// Raised when a node tree violates an emission constraint.
///
/// Stringification produces no partial output; the first violation aborts
/// the whole call.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StringifyError {
    #[error("\"indent\" option must be an integer in 1..=9, got {0}")]
    BadIndent(usize),
    #[error("alias *{0} has no matching anchor before it")]
    MissingAnchor(String),
    #[error("with simple keys, {0}")]
    ForbiddenSimpleKey(&'static str),
    #[error("{0}")]
    Problem(&'static str),
}

/// Any failure surfaced by the convenience entry points.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] YamlError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Stringify(#[from] StringifyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_counter_positions() {
        let mut lc = LineCounter::new();
        lc.add_new_line(4);
        lc.add_new_line(10);
        assert_eq!(lc.line_pos(0), (1, 1));
        assert_eq!(lc.line_pos(3), (1, 4));
        assert_eq!(lc.line_pos(4), (2, 1));
        assert_eq!(lc.line_pos(9), (2, 6));
        assert_eq!(lc.line_pos(10), (3, 1));
    }

    #[test]
    fn error_display_includes_code() {
        let err = YamlError::new(ErrorCode::MissingChar, [3, 4], "missing colon");
        assert_eq!(err.to_string(), "MISSING_CHAR: missing colon");
        let mut lc = LineCounter::new();
        lc.add_new_line(2);
        let err = err.locate(&lc);
        assert_eq!(
            err.to_string(),
            "MISSING_CHAR: missing colon at line 2, column 2"
        );
    }
}
