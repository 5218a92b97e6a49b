use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::pos::{Pos, Range};

use super::token::{Token, TokenType, Tokens};

/// What the scanner expects at the start of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// A configuration file or a standalone expression.
    Normal,
    /// A bare template: literal text with interpolations and directives,
    /// running to the end of input.
    Template,
}

#[derive(Debug, Clone)]
enum Frame {
    /// Between `${`/`%{` and the matching `}`.
    Interp { braces: usize },
    Quoted,
    Heredoc { marker: Vec<u8>, at_line_start: bool },
    Bare,
}

/// A template sequence starting at some offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sequence {
    /// `$${` or `%%{`, which stand for literal `${` and `%{`.
    Escape,
    /// `${` or `%{`.
    Open(TokenType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Quoted,
    Heredoc,
    Bare,
}

/// Splits `src` into tokens. Always ends with an `EOF` token whose range
/// is the empty range at the end of input.
pub fn scan_tokens(src: &[u8], filename: &str, start: Pos, mode: ScanMode) -> Tokens {
    let mut scanner = Scanner {
        src,
        filename,
        offset: 0,
        pos: start,
        tokens: Tokens::new(),
        stack: Vec::new(),
    };
    if mode == ScanMode::Template {
        scanner.stack.push(Frame::Bare);
    }
    scanner.run()
}

struct Scanner<'a> {
    src: &'a [u8],
    filename: &'a str,
    offset: usize,
    pos: Pos,
    tokens: Tokens,
    stack: Vec<Frame>,
}

impl<'a> Scanner<'a> {
    fn run(mut self) -> Tokens {
        while self.offset < self.src.len() {
            let state = match self.stack.last() {
                None | Some(Frame::Interp { .. }) => State::Normal,
                Some(Frame::Quoted) => State::Quoted,
                Some(Frame::Heredoc { .. }) => State::Heredoc,
                Some(Frame::Bare) => State::Bare,
            };
            match state {
                State::Normal => self.scan_normal(),
                State::Quoted => self.scan_quoted(),
                State::Heredoc => self.scan_heredoc(),
                State::Bare => self.scan_bare(),
            }
        }
        let eof = Range::point(self.filename, self.pos);
        self.tokens.push(Token::new(TokenType::EOF, &[], eof));
        self.tokens
    }

    fn byte_at(&self, index: usize) -> Option<u8> {
        self.src.get(index).copied()
    }

    fn emit(&mut self, ty: TokenType, len: usize) {
        let end_offset = (self.offset + len).min(self.src.len());
        let bytes = &self.src[self.offset..end_offset];
        let start = self.pos;
        let end = start.advance(bytes);
        self.tokens
            .push(Token::new(ty, bytes, Range::new(self.filename, start, end)));
        self.offset = end_offset;
        self.pos = end;
    }

    fn skip(&mut self, len: usize) {
        let end_offset = (self.offset + len).min(self.src.len());
        self.pos = self.pos.advance(&self.src[self.offset..end_offset]);
        self.offset = end_offset;
    }

    /// Emits literal text from the current offset up to `end`, if any.
    fn emit_literal(&mut self, ty: TokenType, end: usize) {
        if end > self.offset {
            self.emit(ty, end - self.offset);
        }
    }

    fn in_interp_with_no_open_braces(&self) -> bool {
        matches!(self.stack.last(), Some(Frame::Interp { braces: 0 }))
    }

    fn scan_normal(&mut self) {
        let src: &'a [u8] = self.src;
        let rest = &src[self.offset..];
        let next = rest.get(1).copied();
        if rest[0] == b'<' {
            if let Some((len, marker)) = heredoc_header(rest) {
                self.emit(TokenType::OHeredoc, len);
                self.stack.push(Frame::Heredoc {
                    marker,
                    at_line_start: true,
                });
                return;
            }
        }
        match rest[0] {
            b' ' | b'\t' => {
                let len = rest
                    .iter()
                    .take_while(|b| **b == b' ' || **b == b'\t')
                    .count();
                self.skip(len);
            }
            b'\r' if next == Some(b'\n') => self.emit(TokenType::Newline, 2),
            b'\r' => self.skip(1),
            b'\n' => self.emit(TokenType::Newline, 1),
            b'#' => self.emit(TokenType::Comment, line_comment_len(rest)),
            b'/' if next == Some(b'/') => self.emit(TokenType::Comment, line_comment_len(rest)),
            b'/' if next == Some(b'*') => {
                let len = find(&rest[2..], b"*/").map_or(rest.len(), |at| at + 4);
                self.emit(TokenType::Comment, len);
            }
            b'0'..=b'9' => self.emit(TokenType::NumberLit, number_len(rest)),
            b'"' => {
                self.emit(TokenType::OQuote, 1);
                self.stack.push(Frame::Quoted);
            }
            b'{' => {
                if let Some(Frame::Interp { braces }) = self.stack.last_mut() {
                    *braces += 1;
                }
                self.emit(TokenType::OBrace, 1);
            }
            b'}' => {
                if self.in_interp_with_no_open_braces() {
                    self.emit(TokenType::TemplateSeqEnd, 1);
                    self.stack.pop();
                } else {
                    if let Some(Frame::Interp { braces }) = self.stack.last_mut() {
                        *braces -= 1;
                    }
                    self.emit(TokenType::CBrace, 1);
                }
            }
            b'~' if next == Some(b'}') && self.in_interp_with_no_open_braces() => {
                self.emit(TokenType::TemplateSeqEnd, 2);
                self.stack.pop();
            }
            b'[' => self.emit(TokenType::OBrack, 1),
            b']' => self.emit(TokenType::CBrack, 1),
            b'(' => self.emit(TokenType::OParen, 1),
            b')' => self.emit(TokenType::CParen, 1),
            b'.' if rest.starts_with(b"...") => self.emit(TokenType::Ellipsis, 3),
            b'.' => self.emit(TokenType::Dot, 1),
            b',' => self.emit(TokenType::Comma, 1),
            b'*' => self.emit(TokenType::Star, 1),
            b'/' => self.emit(TokenType::Slash, 1),
            b'+' => self.emit(TokenType::Plus, 1),
            b'-' => self.emit(TokenType::Minus, 1),
            b'%' => self.emit(TokenType::Percent, 1),
            b'=' if next == Some(b'=') => self.emit(TokenType::EqualOp, 2),
            b'=' if next == Some(b'>') => self.emit(TokenType::FatArrow, 2),
            b'=' => self.emit(TokenType::Equal, 1),
            b'!' if next == Some(b'=') => self.emit(TokenType::NotEqual, 2),
            b'!' => self.emit(TokenType::Bang, 1),
            b'<' if next == Some(b'=') => self.emit(TokenType::LessThanEq, 2),
            b'<' => self.emit(TokenType::LessThan, 1),
            b'>' if next == Some(b'=') => self.emit(TokenType::GreaterThanEq, 2),
            b'>' => self.emit(TokenType::GreaterThan, 1),
            b'&' if next == Some(b'&') => self.emit(TokenType::And, 2),
            b'&' => self.emit(TokenType::BitwiseAnd, 1),
            b'|' if next == Some(b'|') => self.emit(TokenType::Or, 2),
            b'|' => self.emit(TokenType::BitwiseOr, 1),
            b'~' => self.emit(TokenType::BitwiseNot, 1),
            b'^' => self.emit(TokenType::BitwiseXor, 1),
            b'?' => self.emit(TokenType::Question, 1),
            b':' => self.emit(TokenType::Colon, 1),
            b'\'' => self.emit(TokenType::Apostrophe, 1),
            b'`' => self.emit(TokenType::Backtick, 1),
            b';' => self.emit(TokenType::Semicolon, 1),
            _ => self.scan_word(),
        }
    }

    /// Identifiers, and anything else that is not ASCII punctuation.
    fn scan_word(&mut self) {
        let src: &'a [u8] = self.src;
        let rest = &src[self.offset..];
        let Some((first, first_len)) = decode_char(rest) else {
            self.emit(TokenType::BadUTF8, 1);
            return;
        };
        if !is_ident_start(first) {
            self.emit(TokenType::Invalid, first_len);
            return;
        }
        let mut len = first_len;
        while let Some((ch, ch_len)) = decode_char(&rest[len..]) {
            if !is_ident_continue(ch) {
                break;
            }
            len += ch_len;
        }
        self.emit(TokenType::Ident, len);
    }

    /// Starts an interpolation or directive at the current offset, which
    /// must point at `${` or `%{`.
    fn open_sequence(&mut self, ty: TokenType) {
        let len = if self.byte_at(self.offset + 2) == Some(b'~') {
            3
        } else {
            2
        };
        self.emit(ty, len);
        self.stack.push(Frame::Interp { braces: 0 });
    }

    /// Steps over the character of template text at `index`. When the bytes
    /// there are not valid UTF-8, emits the literal text before them and a
    /// `BadUTF8` token, and returns `None`.
    fn literal_char(&mut self, ty: TokenType, index: usize) -> Option<usize> {
        let src: &'a [u8] = self.src;
        if src[index] < 0x80 {
            return Some(index + 1);
        }
        match decode_char(&src[index..]) {
            Some((_, len)) => Some(index + len),
            None => {
                self.emit_literal(ty, index);
                self.emit(TokenType::BadUTF8, 1);
                None
            }
        }
    }

    fn sequence_at(&self, index: usize) -> Option<Sequence> {
        let lead = self.byte_at(index)?;
        if lead != b'$' && lead != b'%' {
            return None;
        }
        let second = self.byte_at(index + 1)?;
        if second == lead && self.byte_at(index + 2) == Some(b'{') {
            return Some(Sequence::Escape);
        }
        if second == b'{' {
            return Some(Sequence::Open(if lead == b'$' {
                TokenType::TemplateInterp
            } else {
                TokenType::TemplateControl
            }));
        }
        None
    }

    fn scan_quoted(&mut self) {
        let mut i = self.offset;
        loop {
            let Some(b) = self.byte_at(i) else {
                self.emit_literal(TokenType::QuotedLit, i);
                self.stack.pop();
                return;
            };
            match self.sequence_at(i) {
                Some(Sequence::Escape) => {
                    i += 3;
                    continue;
                }
                Some(Sequence::Open(ty)) => {
                    self.emit_literal(TokenType::QuotedLit, i);
                    self.open_sequence(ty);
                    return;
                }
                None => {}
            }
            match b {
                b'\\' => {
                    i += match self.byte_at(i + 1) {
                        Some(b'\n') | None => 1,
                        Some(next) if next >= 0x80 => 1,
                        Some(_) => 2,
                    };
                }
                b'"' => {
                    self.emit_literal(TokenType::QuotedLit, i);
                    self.emit(TokenType::CQuote, 1);
                    self.stack.pop();
                    return;
                }
                b'\n' => {
                    self.emit_literal(TokenType::QuotedLit, i);
                    self.emit(TokenType::QuotedNewline, 1);
                    return;
                }
                b'\r' if self.byte_at(i + 1) == Some(b'\n') => {
                    self.emit_literal(TokenType::QuotedLit, i);
                    self.emit(TokenType::QuotedNewline, 2);
                    return;
                }
                _ => match self.literal_char(TokenType::QuotedLit, i) {
                    Some(next) => i = next,
                    None => return,
                },
            }
        }
    }

    fn scan_heredoc(&mut self) {
        let Some(Frame::Heredoc {
            marker,
            at_line_start,
        }) = self.stack.last().cloned()
        else {
            return;
        };
        if at_line_start {
            let src: &'a [u8] = self.src;
            let rest = &src[self.offset..];
            let line_len = rest.iter().position(|b| *b == b'\n').unwrap_or(rest.len());
            let line = &rest[..line_len];
            let content = line.strip_suffix(b"\r").unwrap_or(line);
            let content_start = content
                .iter()
                .position(|b| *b != b' ' && *b != b'\t')
                .unwrap_or(content.len());
            if &content[content_start..] == marker.as_slice() {
                self.emit(TokenType::CHeredoc, content.len());
                self.stack.pop();
                return;
            }
        }

        let mut i = self.offset;
        loop {
            match self.byte_at(i) {
                None => {
                    self.emit_literal(TokenType::StringLit, i);
                    self.stack.pop();
                    return;
                }
                Some(b'\n') => {
                    self.emit_literal(TokenType::StringLit, i + 1);
                    self.set_heredoc_line_start(true);
                    return;
                }
                Some(_) => match self.sequence_at(i) {
                    Some(Sequence::Escape) => i += 3,
                    Some(Sequence::Open(ty)) => {
                        self.emit_literal(TokenType::StringLit, i);
                        self.set_heredoc_line_start(false);
                        self.open_sequence(ty);
                        return;
                    }
                    None => match self.literal_char(TokenType::StringLit, i) {
                        Some(next) => i = next,
                        None => {
                            self.set_heredoc_line_start(false);
                            return;
                        }
                    },
                },
            }
        }
    }

    fn set_heredoc_line_start(&mut self, value: bool) {
        if let Some(Frame::Heredoc { at_line_start, .. }) = self.stack.last_mut() {
            *at_line_start = value;
        }
    }

    fn scan_bare(&mut self) {
        let mut i = self.offset;
        loop {
            if i >= self.src.len() {
                self.emit_literal(TokenType::StringLit, i);
                return;
            }
            match self.sequence_at(i) {
                Some(Sequence::Escape) => i += 3,
                Some(Sequence::Open(ty)) => {
                    self.emit_literal(TokenType::StringLit, i);
                    self.open_sequence(ty);
                    return;
                }
                None => match self.literal_char(TokenType::StringLit, i) {
                    Some(next) => i = next,
                    None => return,
                },
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn line_comment_len(rest: &[u8]) -> usize {
    let len = rest.iter().position(|b| *b == b'\n').unwrap_or(rest.len());
    if len > 0 && rest[len - 1] == b'\r' {
        len - 1
    } else {
        len
    }
}

fn number_len(rest: &[u8]) -> usize {
    let digits = |from: usize| rest[from..].iter().take_while(|b| b.is_ascii_digit()).count();
    let mut len = digits(0);
    if rest.get(len) == Some(&b'.') && rest.get(len + 1).is_some_and(u8::is_ascii_digit) {
        len += 1 + digits(len + 1);
    }
    if matches!(rest.get(len), Some(b'e') | Some(b'E')) {
        let mut exp = len + 1;
        if matches!(rest.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        if rest.get(exp).is_some_and(u8::is_ascii_digit) {
            len = exp + digits(exp);
        }
    }
    len
}

/// `<<EOT\n` or `<<-EOT\n`: the header length (including the newline)
/// and the marker.
fn heredoc_header(rest: &[u8]) -> Option<(usize, Vec<u8>)> {
    let mut i = rest.strip_prefix(b"<<").map(|_| 2)?;
    if rest.get(i) == Some(&b'-') {
        i += 1;
    }
    let marker_start = i;
    let first = *rest.get(i)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    while rest
        .get(i)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-')
    {
        i += 1;
    }
    let marker = rest[marker_start..i].to_vec();
    if rest.get(i) == Some(&b'\r') {
        i += 1;
    }
    if rest.get(i) != Some(&b'\n') {
        return None;
    }
    Some((i + 1, marker))
}

fn decode_char(bytes: &[u8]) -> Option<(char, usize)> {
    let chunk = bytes.utf8_chunks().next()?;
    let ch = chunk.valid().chars().next()?;
    Some((ch, ch.len_utf8()))
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

pub(crate) fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch == '-' || ch.is_alphanumeric()
}

/// Reports every token that can never be valid.
pub fn check_invalid_tokens(tokens: &[Token]) -> Diagnostics {
    let mut diags = Diagnostics::new();
    for token in tokens {
        let (summary, detail) = match token.ty {
            TokenType::BitwiseAnd => (
                "Unsupported operator",
                "Bitwise operators are not supported. Did you mean boolean AND (\"&&\")?",
            ),
            TokenType::BitwiseOr => (
                "Unsupported operator",
                "Bitwise operators are not supported. Did you mean boolean OR (\"||\")?",
            ),
            TokenType::BitwiseNot => (
                "Unsupported operator",
                "Bitwise operators are not supported. Did you mean boolean NOT (\"!\")?",
            ),
            TokenType::BitwiseXor => (
                "Unsupported operator",
                "Bitwise operators are not supported.",
            ),
            TokenType::Apostrophe => (
                "Invalid character",
                "Single quotes are not valid. Use double quotes (\") to enclose strings.",
            ),
            TokenType::Backtick => (
                "Invalid character",
                "The \"`\" character is not valid. To create a multi-line string, use the \"heredoc\" syntax, like \"<<EOT\".",
            ),
            TokenType::Semicolon => (
                "Invalid character",
                "The \";\" character is not valid. Use newlines to separate arguments and blocks, and commas to separate items in collection values.",
            ),
            TokenType::Invalid if is_curly_quote(&token.bytes) => (
                "Invalid character",
                "\"Curly quotes\" are not valid here. These can sometimes be inadvertently introduced when sharing code via documents or discussion forums. It might help to replace the character with a \"straight quote\".",
            ),
            TokenType::Invalid => (
                "Invalid character",
                "This character is not used within the language.",
            ),
            TokenType::BadUTF8 => (
                "Invalid character encoding",
                "All input files must be UTF-8 encoded. Ensure that UTF-8 encoding is selected in your editor.",
            ),
            TokenType::Comment
                if token.bytes.starts_with(b"/*")
                    && (token.bytes.len() < 4 || !token.bytes.ends_with(b"*/")) =>
            {
                (
                    "Unterminated comment",
                    "There is no closing marker for this comment.",
                )
            }
            _ => continue,
        };
        diags.push(Diagnostic::error(summary, detail).with_subject(token.range.clone()));
    }
    diags
}

fn is_curly_quote(bytes: &[u8]) -> bool {
    matches!(
        std::str::from_utf8(bytes),
        Ok("\u{201C}" | "\u{201D}" | "\u{2018}" | "\u{2019}")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenType::*;

    fn types(src: &str, mode: ScanMode) -> Vec<TokenType> {
        scan_tokens(src.as_bytes(), "test.hcl", Pos::INITIAL, mode)
            .iter()
            .map(|token| token.ty)
            .collect()
    }

    #[test]
    fn attribute_with_interpolation() {
        assert_eq!(
            types("a = \"x${b}\"\n", ScanMode::Normal),
            vec![
                Ident,
                Equal,
                OQuote,
                QuotedLit,
                TemplateInterp,
                Ident,
                TemplateSeqEnd,
                CQuote,
                Newline,
                EOF
            ]
        );
    }

    #[test]
    fn braces_inside_interpolation() {
        assert_eq!(
            types("\"${ {a = 1} }\"", ScanMode::Normal),
            vec![
                OQuote,
                TemplateInterp,
                OBrace,
                Ident,
                Equal,
                NumberLit,
                CBrace,
                TemplateSeqEnd,
                CQuote,
                EOF
            ]
        );
    }

    #[test]
    fn heredoc() {
        let tokens = scan_tokens(b"x = <<EOT\nhi\n  EOT\n", "test.hcl", Pos::INITIAL, ScanMode::Normal);
        let types: Vec<TokenType> = tokens.iter().map(|token| token.ty).collect();
        assert_eq!(
            types,
            vec![Ident, Equal, OHeredoc, StringLit, CHeredoc, Newline, EOF]
        );
        assert_eq!(tokens[2].bytes, b"<<EOT\n");
        assert_eq!(tokens[3].bytes, b"hi\n");
        assert_eq!(tokens[4].bytes, b"  EOT");
    }

    #[test]
    fn template_mode() {
        assert_eq!(
            types("a $${b} %{ if c }d%{ endif ~}", ScanMode::Template),
            vec![
                StringLit,
                TemplateControl,
                Ident,
                Ident,
                TemplateSeqEnd,
                StringLit,
                TemplateControl,
                Ident,
                TemplateSeqEnd,
                EOF
            ]
        );
    }

    #[test]
    fn operators_and_numbers() {
        assert_eq!(
            types("1.5e3 == x && !y || z >= 2 ... =>", ScanMode::Normal),
            vec![
                NumberLit,
                EqualOp,
                Ident,
                And,
                Bang,
                Ident,
                Or,
                Ident,
                GreaterThanEq,
                NumberLit,
                Ellipsis,
                FatArrow,
                EOF
            ]
        );
    }

    #[test]
    fn ranges_follow_the_source() {
        let tokens = scan_tokens(b"a\n  bb", "test.hcl", Pos::INITIAL, ScanMode::Normal);
        let bb = &tokens[2];
        assert_eq!(bb.ty, Ident);
        assert_eq!(bb.range.start, Pos { line: 2, column: 3, byte: 4 });
        assert_eq!(bb.range.end, Pos { line: 2, column: 5, byte: 6 });
        let eof = tokens.last().map(|token| token.range.clone());
        assert_eq!(eof.map(|range| range.start.byte), Some(6));
    }

    #[test]
    fn invalid_tokens_are_reported() {
        let src = "a = 1;\nb = c & d\ne = \u{201C}x\u{201D}\n/* open";
        let tokens = scan_tokens(src.as_bytes(), "test.hcl", Pos::INITIAL, ScanMode::Normal);
        let diags = check_invalid_tokens(&tokens);
        let summaries: Vec<&str> = diags.iter().map(|diag| diag.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec![
                "Invalid character",
                "Unsupported operator",
                "Invalid character",
                "Invalid character",
                "Unterminated comment",
            ]
        );
        assert!(diags[2].detail.contains("Curly quotes"));
        assert_eq!(diags[0].subject.as_ref().map(|r| r.start.column), Some(6));
    }

    #[test]
    fn bad_utf8_inside_templates() {
        let tokens = scan_tokens(b"a = \"x\xffy\"\n", "test.hcl", Pos::INITIAL, ScanMode::Normal);
        let types: Vec<TokenType> = tokens.iter().map(|token| token.ty).collect();
        assert_eq!(
            types,
            vec![Ident, Equal, OQuote, QuotedLit, BadUTF8, QuotedLit, CQuote, Newline, EOF]
        );
        assert_eq!(check_invalid_tokens(&tokens).len(), 1);

        let src = b"a = <<EOT\n\xfe\nEOT\n";
        let tokens = scan_tokens(src, "test.hcl", Pos::INITIAL, ScanMode::Normal);
        assert!(tokens.iter().any(|token| token.ty == BadUTF8));
        assert!(tokens.iter().any(|token| token.ty == CHeredoc));

        let tokens = scan_tokens(b"ok \xc3 ${x}", "test.hcl", Pos::INITIAL, ScanMode::Template);
        let diags = check_invalid_tokens(&tokens);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid character encoding");
    }

    #[test]
    fn multibyte_text_in_strings_is_not_flagged() {
        let src = "a = \"caf\u{e9} \\\u{e9}\"\n";
        let tokens = scan_tokens(src.as_bytes(), "test.hcl", Pos::INITIAL, ScanMode::Normal);
        assert!(tokens.iter().all(|token| token.ty != BadUTF8));
    }

    #[test]
    fn bad_utf8() {
        let tokens = scan_tokens(b"a = \xff", "test.hcl", Pos::INITIAL, ScanMode::Normal);
        let diags = check_invalid_tokens(&tokens);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid character encoding");
    }
}
