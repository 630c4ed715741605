use std::collections::VecDeque;

use crate::token::{SourceToken, TokenKind};

/// The streaming tokenizer.
///
/// Scans a complete source string and yields [`SourceToken`]s lazily. The
/// lexer tracks only enough state to classify characters: a stack of open
/// flow collections, whether document content has begun (directives are only
/// legal outside of it), and a pending block-scalar header. Indentation and
/// blank-line bookkeeping are left to the parser, which receives raw `space`
/// and `newline` tokens.
///
/// Lexing never fails. An unterminated quoted scalar produces the partial
/// scalar followed by a zero-width `flow-error-end` token, which the parser
/// converts into a structured error.
pub struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line_start: usize,
    queue: VecDeque<SourceToken<'s>>,
    /// Open flow collections, `b'['` or `b'{'`.
    flow: Vec<u8>,
    in_document: bool,
    /// Kind of the last content token, used for `"key":value` in flow.
    prev_content: Option<TokenKind>,
    /// Set after a block-scalar header: `(base_indent, explicit_digit)`.
    pending_block: Option<(usize, Option<usize>)>,
}

fn is_blank(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

fn is_break(ch: char) -> bool {
    ch == '\n' || ch == '\r'
}

fn is_blankz(ch: Option<char>) -> bool {
    match ch {
        None => true,
        Some(ch) => is_blank(ch) || is_break(ch),
    }
}

fn is_flow_indicator(ch: char) -> bool {
    matches!(ch, ',' | '[' | ']' | '{' | '}')
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Lexer<'s> {
        Lexer {
            src,
            pos: 0,
            line_start: 0,
            queue: VecDeque::with_capacity(16),
            flow: Vec::new(),
            in_document: false,
            prev_content: None,
            pending_block: None,
        }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn at_line_start(&self) -> bool {
        self.pos == self.line_start
    }

    /// Emit the token covering `self.pos..end` and advance past it.
    fn push(&mut self, kind: TokenKind, end: usize) {
        let source = &self.src[self.pos..end];
        self.queue.push_back(SourceToken {
            kind,
            offset: self.pos,
            source,
        });
        if let Some(nl) = source.rfind('\n') {
            self.line_start = self.pos + nl + 1;
        } else if kind == TokenKind::Newline {
            self.line_start = end;
        }
        if !kind.is_space() {
            self.prev_content = Some(kind);
        }
        self.pos = end;
    }

    /// Emit a zero-width marker token at the current position.
    fn push_marker(&mut self, kind: TokenKind) {
        self.queue.push_back(SourceToken {
            kind,
            offset: self.pos,
            source: "",
        });
    }

    /// Document content begins here; directives are no longer legal.
    fn mark_content(&mut self) {
        if !self.in_document {
            self.push_marker(TokenKind::DocMode);
            self.in_document = true;
        }
    }

    fn scan_token(&mut self) {
        let Some(ch) = self.peek() else { return };

        if self.pos == 0 && ch == '\u{feff}' {
            self.push(TokenKind::ByteOrderMark, '\u{feff}'.len_utf8());
            return;
        }
        if is_break(ch) {
            self.scan_newline();
            return;
        }
        if self.at_line_start() && self.flow.is_empty() {
            let rest = self.rest();
            if rest.starts_with("---") && is_blankz(self.peek_at(3)) {
                self.in_document = false;
                self.mark_content();
                self.push(TokenKind::DocStart, self.pos + 3);
                return;
            }
            if rest.starts_with("...") && is_blankz(self.peek_at(3)) {
                self.push(TokenKind::DocEnd, self.pos + 3);
                self.in_document = false;
                self.prev_content = None;
                return;
            }
            if ch == '%' && !self.in_document {
                self.push(TokenKind::DirectiveLine, self.line_end());
                return;
            }
        }
        if is_blank(ch) {
            let end = self.scan_while(|c| is_blank(c));
            self.push(TokenKind::Space, end);
            return;
        }
        if ch == '#' {
            self.push(TokenKind::Comment, self.line_end());
            return;
        }

        match ch {
            '{' => {
                self.mark_content();
                self.flow.push(b'{');
                self.push(TokenKind::FlowMapStart, self.pos + 1);
            }
            '[' => {
                self.mark_content();
                self.flow.push(b'[');
                self.push(TokenKind::FlowSeqStart, self.pos + 1);
            }
            '}' => {
                self.mark_content();
                self.flow.pop();
                self.push(TokenKind::FlowMapEnd, self.pos + 1);
            }
            ']' => {
                self.mark_content();
                self.flow.pop();
                self.push(TokenKind::FlowSeqEnd, self.pos + 1);
            }
            ',' if !self.flow.is_empty() => {
                self.push(TokenKind::Comma, self.pos + 1);
            }
            '-' if self.flow.is_empty() && is_blankz(self.peek_at(1)) => {
                self.mark_content();
                self.push(TokenKind::SeqItemInd, self.pos + 1);
            }
            '?' if self.flow.is_empty() && is_blankz(self.peek_at(1)) => {
                self.mark_content();
                self.push(TokenKind::ExplicitKeyInd, self.pos + 1);
            }
            ':' if self.is_value_indicator() => {
                self.mark_content();
                self.push(TokenKind::MapValueInd, self.pos + 1);
            }
            '&' => {
                self.mark_content();
                let end = self.scan_name();
                self.push(TokenKind::Anchor, end);
            }
            '*' => {
                self.mark_content();
                let end = self.scan_name();
                self.push(TokenKind::Alias, end);
            }
            '!' => {
                self.mark_content();
                self.scan_tag();
            }
            '|' | '>' if self.flow.is_empty() => {
                self.mark_content();
                self.scan_block_scalar_header();
            }
            '\'' => {
                self.mark_content();
                self.scan_quoted('\'');
            }
            '"' => {
                self.mark_content();
                self.scan_quoted('"');
            }
            _ => {
                self.mark_content();
                self.scan_plain();
            }
        }
    }

    fn is_value_indicator(&self) -> bool {
        let next = self.peek_at(1);
        // JSON-like keys allow `"key":value` with no separating space.
        let after_quoted = matches!(
            self.prev_content,
            Some(TokenKind::SingleQuotedScalar | TokenKind::DoubleQuotedScalar)
        );
        if self.flow.is_empty() {
            is_blankz(next) || after_quoted
        } else {
            is_blankz(next) || next.is_some_and(is_flow_indicator) || after_quoted
        }
    }

    /// Byte offset of the end of the current line, exclusive of the break.
    fn line_end(&self) -> usize {
        match self.rest().find(|c| is_break(c)) {
            Some(i) => self.pos + i,
            None => self.src.len(),
        }
    }

    fn scan_while(&self, pred: impl Fn(char) -> bool) -> usize {
        for (i, c) in self.rest().char_indices() {
            if !pred(c) {
                return self.pos + i;
            }
        }
        self.src.len()
    }

    fn scan_newline(&mut self) {
        let end = if self.rest().starts_with("\r\n") {
            self.pos + 2
        } else {
            self.pos + 1
        };
        self.push(TokenKind::Newline, end);
        if let Some((base, digit)) = self.pending_block.take() {
            self.scan_block_scalar_body(base, digit);
        }
    }

    /// Anchor and alias names end at whitespace or a flow indicator.
    fn scan_name(&self) -> usize {
        for (i, c) in self.rest().char_indices().skip(1) {
            if is_blank(c) || is_break(c) || is_flow_indicator(c) {
                return self.pos + i;
            }
        }
        self.src.len()
    }

    fn scan_tag(&mut self) {
        if self.peek_at(1) == Some('<') {
            // Verbatim form: !<tag:example.com,2000:app/foo>
            let end = match self.rest().find('>') {
                Some(i) => self.pos + i + 1,
                None => self.src.len(),
            };
            self.push(TokenKind::Tag, end);
            return;
        }
        let end = self.scan_name();
        self.push(TokenKind::Tag, end);
    }

    fn scan_block_scalar_header(&mut self) {
        let start = self.pos;
        let mut end = start + 1;
        for (i, c) in self.rest().char_indices().skip(1) {
            if matches!(c, '+' | '-' | '1'..='9') {
                end = start + i + c.len_utf8();
            } else {
                break;
            }
        }
        let header = &self.src[start..end];
        let digit = header[1..]
            .chars()
            .find(char::is_ascii_digit)
            .and_then(|c| c.to_digit(10))
            .map(|d| d as usize);
        // The base indent for the body is the indentation of the header's
        // line, not the header column itself.
        let line_indent = self.src[self.line_start..]
            .chars()
            .take_while(|&c| c == ' ')
            .count();
        self.pending_block = Some((line_indent, digit));
        self.push(TokenKind::BlockScalarHeader, end);
    }

    /// Collect every body line of a block scalar into a single raw token.
    ///
    /// A line belongs to the body while it is blank or indented deeper than
    /// the header line. The token ends at the start of the first line that
    /// breaks that rule, so scanning resumes at a line start.
    fn scan_block_scalar_body(&mut self, base: usize, digit: Option<usize>) {
        let min_indent = digit.map(|d| base + d);
        let bytes = self.src.as_bytes();
        let mut end = self.pos;
        let mut cursor = self.pos;
        while cursor < bytes.len() {
            let mut i = cursor;
            while i < bytes.len() && bytes[i] == b' ' {
                i += 1;
            }
            let indent = i - cursor;
            let blank = i >= bytes.len() || bytes[i] == b'\n' || bytes[i] == b'\r';
            let deep_enough = match min_indent {
                Some(min) => indent >= min,
                None => indent > base,
            };
            if !blank && !deep_enough {
                break;
            }
            // Consume through the line break.
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            if i < bytes.len() {
                i += 1;
            }
            cursor = i;
            end = cursor;
        }
        self.push(TokenKind::BlockScalar, end);
    }

    fn scan_quoted(&mut self, quote: char) {
        let rest = self.rest();
        let mut chars = rest.char_indices().skip(1).peekable();
        let mut closed = None;
        while let Some((i, c)) = chars.next() {
            if c == quote {
                if quote == '\'' {
                    // '' is an escaped quote, not a terminator.
                    if chars.peek().map(|&(_, c)| c) == Some('\'') {
                        chars.next();
                        continue;
                    }
                }
                closed = Some(self.pos + i + c.len_utf8());
                break;
            }
            if quote == '"' && c == '\\' {
                chars.next();
            }
        }
        let kind = if quote == '\'' {
            TokenKind::SingleQuotedScalar
        } else {
            TokenKind::DoubleQuotedScalar
        };
        match closed {
            Some(end) => self.push(kind, end),
            None => {
                self.push(kind, self.src.len());
                self.push_marker(TokenKind::FlowErrorEnd);
            }
        }
    }

    fn scan_plain(&mut self) {
        let start = self.pos;
        let in_flow = !self.flow.is_empty();
        let rest = self.rest();
        let mut content_end = start;
        let mut prev_blank = false;
        let mut iter = rest.char_indices().peekable();
        while let Some((i, c)) = iter.next() {
            if is_break(c) {
                break;
            }
            if in_flow && is_flow_indicator(c) {
                break;
            }
            if c == ':' {
                let next = iter.peek().map(|&(_, c)| c);
                if is_blankz(next) || (in_flow && next.is_some_and(is_flow_indicator)) {
                    break;
                }
            }
            if c == '#' && prev_blank {
                break;
            }
            if is_blank(c) {
                prev_blank = true;
            } else {
                prev_blank = false;
                content_end = start + i + c.len_utf8();
            }
        }
        self.push(TokenKind::Scalar, content_end);
    }
}

impl<'s> Iterator for Lexer<'s> {
    type Item = SourceToken<'s>;

    fn next(&mut self) -> Option<SourceToken<'s>> {
        if self.queue.is_empty() {
            self.scan_token();
        }
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, &str)> {
        Lexer::new(src).map(|t| (t.kind, t.source)).collect()
    }

    #[test]
    fn lexes_simple_mapping() {
        use TokenKind::*;
        assert_eq!(
            kinds("a: 1\n"),
            vec![
                (DocMode, ""),
                (Scalar, "a"),
                (MapValueInd, ":"),
                (Space, " "),
                (Scalar, "1"),
                (Newline, "\n"),
            ]
        );
    }

    #[test]
    fn lexes_flow_collection() {
        use TokenKind::*;
        assert_eq!(
            kinds("[a, b]"),
            vec![
                (DocMode, ""),
                (FlowSeqStart, "["),
                (Scalar, "a"),
                (Comma, ","),
                (Space, " "),
                (Scalar, "b"),
                (FlowSeqEnd, "]"),
            ]
        );
    }

    #[test]
    fn plain_scalar_keeps_inner_colon() {
        use TokenKind::*;
        assert_eq!(
            kinds("http://example.com\n"),
            vec![
                (DocMode, ""),
                (Scalar, "http://example.com"),
                (Newline, "\n"),
            ]
        );
    }

    #[test]
    fn comment_needs_leading_blank() {
        use TokenKind::*;
        assert_eq!(
            kinds("a #c\n"),
            vec![
                (DocMode, ""),
                (Scalar, "a"),
                (Space, " "),
                (Comment, "#c"),
                (Newline, "\n"),
            ]
        );
        assert_eq!(
            kinds("a#c\n"),
            vec![(DocMode, ""), (Scalar, "a#c"), (Newline, "\n")]
        );
    }

    #[test]
    fn block_scalar_body_is_one_token() {
        use TokenKind::*;
        assert_eq!(
            kinds("key: |\n  a\n  b\nnext: 1\n"),
            vec![
                (DocMode, ""),
                (Scalar, "key"),
                (MapValueInd, ":"),
                (Space, " "),
                (BlockScalarHeader, "|"),
                (Newline, "\n"),
                (BlockScalar, "  a\n  b\n"),
                (Scalar, "next"),
                (MapValueInd, ":"),
                (Space, " "),
                (Scalar, "1"),
                (Newline, "\n"),
            ]
        );
    }

    #[test]
    fn block_scalar_explicit_indent_and_chomp() {
        let tokens = kinds("? x\n: >+2\n  a\n");
        assert!(tokens
            .iter()
            .any(|&(k, s)| k == TokenKind::BlockScalarHeader && s == ">+2"));
    }

    #[test]
    fn document_markers_at_column_zero() {
        use TokenKind::*;
        assert_eq!(
            kinds("---\na\n...\n"),
            vec![
                (DocMode, ""),
                (DocStart, "---"),
                (Newline, "\n"),
                (Scalar, "a"),
                (Newline, "\n"),
                (DocEnd, "..."),
                (Newline, "\n"),
            ]
        );
    }

    #[test]
    fn second_doc_start_opens_new_document() {
        let tokens = kinds("--- a\n--- b\n");
        let doc_modes = tokens
            .iter()
            .filter(|&&(k, _)| k == TokenKind::DocMode)
            .count();
        assert_eq!(doc_modes, 2);
    }

    #[test]
    fn directives_only_before_content() {
        use TokenKind::*;
        assert_eq!(
            kinds("%YAML 1.1\n--- a\n"),
            vec![
                (DirectiveLine, "%YAML 1.1"),
                (Newline, "\n"),
                (DocMode, ""),
                (DocStart, "---"),
                (Space, " "),
                (Scalar, "a"),
                (Newline, "\n"),
            ]
        );
    }

    #[test]
    fn unterminated_double_quote_flags_error_end() {
        let tokens = kinds("\"abc\n");
        assert_eq!(
            tokens.last().map(|&(k, _)| k),
            Some(TokenKind::FlowErrorEnd)
        );
    }

    #[test]
    fn single_quote_escape_does_not_terminate() {
        use TokenKind::*;
        assert_eq!(
            kinds("'it''s'\n"),
            vec![
                (DocMode, ""),
                (SingleQuotedScalar, "'it''s'"),
                (Newline, "\n"),
            ]
        );
    }

    #[test]
    fn json_style_flow_value_indicator() {
        use TokenKind::*;
        assert_eq!(
            kinds("{\"a\":1}"),
            vec![
                (DocMode, ""),
                (FlowMapStart, "{"),
                (DoubleQuotedScalar, "\"a\""),
                (MapValueInd, ":"),
                (Scalar, "1"),
                (FlowMapEnd, "}"),
            ]
        );
    }

    #[test]
    fn anchor_alias_and_tag_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("&a !!str x\n"),
            vec![
                (DocMode, ""),
                (Anchor, "&a"),
                (Space, " "),
                (Tag, "!!str"),
                (Space, " "),
                (Scalar, "x"),
                (Newline, "\n"),
            ]
        );
        assert_eq!(
            kinds("*a\n"),
            vec![(DocMode, ""), (Alias, "*a"), (Newline, "\n")]
        );
    }

    #[test]
    fn trailing_spaces_left_out_of_plain_scalar() {
        use TokenKind::*;
        assert_eq!(
            kinds("a  \n"),
            vec![
                (DocMode, ""),
                (Scalar, "a"),
                (Space, "  "),
                (Newline, "\n"),
            ]
        );
    }
}
