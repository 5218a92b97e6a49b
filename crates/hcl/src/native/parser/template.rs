use std::collections::VecDeque;
use std::sync::Arc;

use hcl_value::Value;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::didyoumean::suggestion_sentence;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::pos::{range_between, Range};

use super::super::ast::{Expr, ForExpr};
use super::super::token::{Token, TokenType};
use super::{normalize_ident, Parser};

const DIRECTIVE_KEYWORDS: &[&str] = &["if", "for", "else", "endif", "endfor"];

/// A template token sequence before directives are matched up.
#[derive(Debug)]
enum Part {
    Literal {
        val: String,
        src_range: Range,
    },
    Interp {
        expr: Expr,
    },
    If {
        condition: Expr,
        src_range: Range,
    },
    For {
        key_var: Option<String>,
        val_var: String,
        coll_expr: Expr,
        src_range: Range,
    },
    EndControl {
        kind: ControlEnd,
        src_range: Range,
    },
    End {
        src_range: Range,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlEnd {
    Else,
    EndIf,
    EndFor,
}

impl ControlEnd {
    fn name(self) -> &'static str {
        match self {
            ControlEnd::Else => "else",
            ControlEnd::EndIf => "endif",
            ControlEnd::EndFor => "endfor",
        }
    }
}

impl Parser {
    /// Parses a bare template up to end of input.
    pub fn parse_template(&mut self) -> Expr {
        let (mut parts, passthrough, src_range) = self.parse_template_with_range(TokenType::EOF, false);
        if passthrough && parts.len() == 1 {
            if let Some(wrapped) = parts.pop() {
                return Expr::TemplateWrap {
                    wrapped: Arc::new(wrapped),
                    src_range,
                };
            }
        }
        Expr::Template {
            parts: parts.into_iter().map(Arc::new).collect(),
            src_range,
        }
    }

    /// Parses template content up to `end`, returning the folded parts and
    /// whether the template is a single interpolation.
    pub(super) fn parse_template_inner(&mut self, end: TokenType, flush: bool) -> (Vec<Expr>, bool) {
        let (parts, passthrough, _) = self.parse_template_with_range(end, flush);
        (parts, passthrough)
    }

    fn parse_template_with_range(&mut self, end: TokenType, flush: bool) -> (Vec<Expr>, bool, Range) {
        let (mut parts, src_range) = self.parse_template_parts(end);
        if flush {
            flush_heredoc(&mut parts);
        }
        let passthrough = parts.len() == 2 && matches!(parts[0], Part::Interp { .. });
        let mut folder = TemplateFolder {
            parts: parts.into(),
            diagnostics: Diagnostics::new(),
        };
        let exprs = folder.fold_root();
        self.diagnostics.extend(folder.diagnostics);
        (exprs, passthrough, src_range)
    }

    fn parse_template_parts(&mut self, end: TokenType) -> (Vec<Part>, Range) {
        let mut parts = Vec::new();
        let start_range = self.peek_range();
        let mut trim_next_literal = false;
        let mut prev_is_literal = false;

        let end_range = loop {
            let next = self.read();
            if next.ty == end {
                break next.range;
            }
            let trim_this = std::mem::take(&mut trim_next_literal);
            let can_trim_prev = std::mem::take(&mut prev_is_literal);

            match next.ty {
                TokenType::StringLit | TokenType::QuotedLit => {
                    let (mut val, diags) = decode_string_literal(&next);
                    self.diagnostics.extend(diags);
                    if trim_this {
                        val = val.trim_start().to_string();
                    }
                    parts.push(Part::Literal {
                        val,
                        src_range: next.range,
                    });
                    prev_is_literal = true;
                }
                TokenType::BadUTF8 => {
                    // Already reported by the token check; keep a stand-in
                    // character so the rest of the template still parses.
                    parts.push(Part::Literal {
                        val: char::REPLACEMENT_CHARACTER.to_string(),
                        src_range: next.range,
                    });
                    prev_is_literal = true;
                }
                TokenType::QuotedNewline => {
                    if !self.recovery {
                        self.error_in(
                            "Invalid multi-line string",
                            "Quoted strings may not be split over multiple lines. To produce a multi-line string, either use the \\n escape to represent a newline character or use the \"heredoc\" multi-line template syntax.",
                            next.range.clone(),
                            range_between(&start_range, &next.range),
                        );
                    }
                    self.set_recovery();
                }
                TokenType::TemplateInterp => {
                    if can_trim_prev && next.trims_left_side() {
                        trim_end_of_last_literal(&mut parts);
                    }
                    self.peeker.push_include_newlines(false);
                    let expr = self.parse_expression();
                    let close = self.peek().clone();
                    if close.ty != TokenType::TemplateSeqEnd {
                        if !self.recovery {
                            self.unclosed_interpolation(&close, &start_range, end);
                        }
                        self.peeker.recover(TokenType::TemplateSeqEnd);
                    } else {
                        self.read();
                        trim_next_literal = close.trims_right_side();
                    }
                    self.peeker.pop_include_newlines();
                    parts.push(Part::Interp { expr });
                }
                TokenType::TemplateControl => {
                    if can_trim_prev && next.trims_left_side() {
                        trim_end_of_last_literal(&mut parts);
                    }
                    self.peeker.push_include_newlines(false);
                    let parsed = self.parse_directive(&next);
                    match parsed {
                        Some((part, keyword)) => {
                            parts.push(part);
                            let close = self.peek().clone();
                            if close.ty != TokenType::TemplateSeqEnd {
                                if !self.recovery {
                                    self.error_in(
                                        format!("Extra characters in {keyword} marker"),
                                        "Expected a closing brace to end the sequence, but found extra characters.",
                                        close.range.clone(),
                                        range_between(&start_range, &close.range),
                                    );
                                }
                                self.peeker.recover(TokenType::TemplateSeqEnd);
                            } else {
                                self.read();
                                trim_next_literal = close.trims_right_side();
                            }
                        }
                        None => {
                            self.peeker.recover(TokenType::TemplateSeqEnd);
                        }
                    }
                    self.peeker.pop_include_newlines();
                }
                _ => {
                    if !self.recovery {
                        self.error_in(
                            "Unterminated template string",
                            "No closing marker was found for the string.",
                            next.range.clone(),
                            range_between(&start_range, &next.range),
                        );
                    }
                    break self.peeker.recover(end).range;
                }
            }
        };

        if parts.is_empty() {
            parts.push(Part::Literal {
                val: String::new(),
                src_range: start_range.start_point(),
            });
        }
        parts.push(Part::End {
            src_range: end_range.clone(),
        });
        (parts, range_between(&start_range, &end_range))
    }

    fn unclosed_interpolation(&mut self, close: &Token, start_range: &Range, end: TokenType) {
        match close.ty {
            TokenType::EOF => self.error(
                "Unclosed template interpolation sequence",
                "There is no closing brace for this interpolation sequence before the end of the file. This might be caused by incorrect nesting inside the given expression.",
                start_range.clone(),
            ),
            TokenType::Colon => self.error_in(
                "Extra characters after interpolation expression",
                "Template interpolation doesn't expect a colon at this location. Did you intend this to be a literal sequence to be processed as part of another language? If so, you can escape it by starting with \"$${\" instead of just \"${\".",
                close.range.clone(),
                range_between(start_range, &close.range),
            ),
            TokenType::CQuote | TokenType::OQuote if end == TokenType::CQuote => self.error(
                "Unclosed template interpolation sequence",
                "There is no closing brace for this interpolation sequence before the end of the quoted template. This might be caused by incorrect nesting inside the given expression.",
                start_range.clone(),
            ),
            _ => self.error_in(
                "Extra characters after interpolation expression",
                "Expected a closing brace to end the interpolation expression, but found extra characters.\n\nThis can happen when you include interpolation syntax for another language, such as shell scripting, but forget to escape the interpolation start token. If this is an embedded sequence for another language, escape it by starting with \"$${\" instead of just \"${\".",
                close.range.clone(),
                range_between(start_range, &close.range),
            ),
        }
    }

    /// Parses the keyword and arguments of a `%{ ... }` directive. Returns
    /// `None` after reporting a malformed directive.
    fn parse_directive(&mut self, open: &Token) -> Option<(Part, String)> {
        let keyword = self.peek().clone();
        if keyword.ty != TokenType::Ident {
            if !self.recovery {
                self.error_in(
                    "Invalid template directive",
                    "A template directive keyword (\"if\", \"for\", etc) is expected at the beginning of a %{ sequence.",
                    keyword.range.clone(),
                    range_between(&open.range, &keyword.range),
                );
            }
            return None;
        }
        self.read();
        let name = keyword.text();

        let part = match name.as_str() {
            "if" => {
                let condition = self.parse_expression();
                Part::If {
                    condition,
                    src_range: range_between(&open.range, &self.peek_range()),
                }
            }
            "else" | "endif" | "endfor" => Part::EndControl {
                kind: match name.as_str() {
                    "else" => ControlEnd::Else,
                    "endif" => ControlEnd::EndIf,
                    _ => ControlEnd::EndFor,
                },
                src_range: range_between(&open.range, &self.peek_range()),
            },
            "for" => {
                if self.peek_type() != TokenType::Ident {
                    self.invalid_for_directive("For directive requires variable name after 'for'.");
                    return None;
                }
                let mut key_var = None;
                let mut val_var = normalize_ident(&self.read());
                if self.peek_type() == TokenType::Comma {
                    self.read();
                    if self.peek_type() != TokenType::Ident {
                        self.invalid_for_directive(
                            "For directive requires value variable name after comma.",
                        );
                        return None;
                    }
                    key_var = Some(val_var);
                    val_var = normalize_ident(&self.read());
                }
                let next = self.peek();
                if !(next.ty == TokenType::Ident && next.bytes == b"in") {
                    self.invalid_for_directive("For directive requires 'in' keyword after names.");
                    return None;
                }
                self.read();
                let coll_expr = self.parse_expression();
                Part::For {
                    key_var,
                    val_var,
                    coll_expr,
                    src_range: range_between(&open.range, &self.peek_range()),
                }
            }
            _ => {
                if !self.recovery {
                    let suggestion = suggestion_sentence(&name, DIRECTIVE_KEYWORDS);
                    self.error_in(
                        "Invalid template control keyword",
                        format!("{name:?} is not a valid template control keyword.{suggestion}"),
                        keyword.range.clone(),
                        range_between(&open.range, &keyword.range),
                    );
                }
                return None;
            }
        };
        Some((part, name))
    }

    fn invalid_for_directive(&mut self, detail: &str) {
        if !self.recovery {
            let subject = self.peek_range();
            self.error("Invalid 'for' directive", detail, subject);
        }
    }
}

fn trim_end_of_last_literal(parts: &mut [Part]) {
    if let Some(Part::Literal { val, .. }) = parts.last_mut() {
        let trimmed_len = val.trim_end().len();
        val.truncate(trimmed_len);
    }
}

/// Removes the indentation common to every line of a `<<-` heredoc.
///
/// Indentation is counted in grapheme clusters. Lines containing only
/// whitespace do not constrain it.
fn flush_heredoc(parts: &mut [Part]) {
    let mut min_spaces = usize::MAX;
    let mut at_line_start = true;
    let mut adjust = Vec::new();

    for (index, part) in parts.iter().enumerate() {
        if at_line_start {
            at_line_start = false;
            let spaces = match part {
                Part::Literal { val, .. } => {
                    let trimmed = val.trim_start();
                    if trimmed.is_empty() && val.ends_with('\n') {
                        usize::MAX
                    } else {
                        adjust.push(index);
                        val[..val.len() - trimmed.len()].graphemes(true).count()
                    }
                }
                Part::End { .. } => break,
                _ => 0,
            };
            min_spaces = min_spaces.min(spaces);
        }
        if let Part::Literal { val, .. } = part {
            if val.ends_with('\n') {
                at_line_start = true;
            }
        }
    }

    if min_spaces == usize::MAX {
        return;
    }
    for index in adjust {
        if let Part::Literal { val, src_range } = &mut parts[index] {
            let skip: usize = val.graphemes(true).take(min_spaces).map(str::len).sum();
            val.replace_range(..skip, "");
            src_range.start.column += min_spaces;
            src_range.start.byte += skip;
        }
    }
}

/// Matches up directive parts into conditional and `for` expressions.
struct TemplateFolder {
    parts: VecDeque<Part>,
    diagnostics: Diagnostics,
}

fn empty_string(src_range: Range) -> Expr {
    Expr::Literal {
        val: Value::string(""),
        src_range,
    }
}

fn placeholder(src_range: Range) -> Expr {
    Expr::Literal {
        val: Value::dynamic(),
        src_range,
    }
}

fn template_of(parts: Vec<Expr>) -> Expr {
    let src_range = match (parts.first(), parts.last()) {
        (Some(first), Some(last)) => range_between(&first.src_range(), &last.src_range()),
        _ => Range::default(),
    };
    Expr::Template {
        parts: parts.into_iter().map(Arc::new).collect(),
        src_range,
    }
}

impl TemplateFolder {
    fn at_end(&self) -> bool {
        matches!(self.parts.front(), None | Some(Part::End { .. }))
    }

    fn error(&mut self, summary: impl Into<String>, detail: impl Into<String>, subject: Range) {
        self.diagnostics
            .push(Diagnostic::error(summary, detail).with_subject(subject));
    }

    fn fold_root(&mut self) -> Vec<Expr> {
        let mut exprs = Vec::new();
        while !self.at_end() {
            exprs.push(self.fold_part());
        }
        exprs
    }

    fn fold_part(&mut self) -> Expr {
        let Some(part) = self.parts.pop_front() else {
            return placeholder(Range::default());
        };
        match part {
            Part::Literal { val, src_range } => Expr::Literal {
                val: Value::string(val),
                src_range,
            },
            Part::Interp { expr } => expr,
            Part::If {
                condition,
                src_range,
            } => self.fold_if(condition, src_range),
            Part::For {
                key_var,
                val_var,
                coll_expr,
                src_range,
            } => self.fold_for(key_var, val_var, coll_expr, src_range),
            Part::End { src_range } => {
                self.error(
                    "Unexpected end of template",
                    "The control directives within this template are unbalanced.",
                    src_range.clone(),
                );
                placeholder(src_range)
            }
            Part::EndControl { kind, src_range } => {
                self.error(
                    format!("Unexpected {} directive", kind.name()),
                    "The control directives within this template are unbalanced.",
                    src_range.clone(),
                );
                placeholder(src_range)
            }
        }
    }

    /// Collects parts up to the next `else`, `endif` or `endfor`, which is
    /// consumed and returned. `Err` carries the end-of-template range.
    fn fold_until_control(&mut self, exprs: &mut Vec<Expr>) -> Result<(ControlEnd, Range), Range> {
        loop {
            match self.parts.front() {
                Some(Part::End { src_range }) => return Err(src_range.clone()),
                None => return Err(Range::default()),
                Some(Part::EndControl { .. }) => {
                    if let Some(Part::EndControl { kind, src_range }) = self.parts.pop_front() {
                        return Ok((kind, src_range));
                    }
                }
                Some(_) => exprs.push(self.fold_part()),
            }
        }
    }

    fn fold_if(&mut self, condition: Expr, if_range: Range) -> Expr {
        let mut if_exprs = Vec::new();
        let mut else_exprs = Vec::new();
        let mut in_else = false;

        let endif_range = loop {
            let current = if in_else {
                &mut else_exprs
            } else {
                &mut if_exprs
            };
            match self.fold_until_control(current) {
                Err(end_range) => {
                    self.error(
                        "Unexpected end of template",
                        format!(
                            "The if directive at {if_range} is missing its corresponding endif directive."
                        ),
                        end_range.clone(),
                    );
                    return placeholder(end_range);
                }
                Ok((ControlEnd::Else, range)) => {
                    if !in_else {
                        in_else = true;
                        continue;
                    }
                    self.error(
                        "Unexpected else directive",
                        format!("Already in the else clause for the if started at {if_range}."),
                        range.clone(),
                    );
                    return placeholder(range);
                }
                Ok((ControlEnd::EndIf, range)) => break range,
                Ok((kind, range)) => {
                    self.error(
                        format!("Unexpected {} directive", kind.name()),
                        format!("Expecting an endif directive for the if started at {if_range}."),
                        range.clone(),
                    );
                    return placeholder(range);
                }
            }
        };

        if if_exprs.is_empty() {
            if_exprs.push(empty_string(if_range.end_point()));
        }
        if else_exprs.is_empty() {
            else_exprs.push(empty_string(endif_range.start_point()));
        }
        Expr::Conditional {
            condition: Arc::new(condition),
            true_result: Arc::new(template_of(if_exprs)),
            false_result: Arc::new(template_of(else_exprs)),
            src_range: range_between(&if_range, &endif_range),
        }
    }

    fn fold_for(
        &mut self,
        key_var: Option<String>,
        val_var: String,
        coll_expr: Expr,
        for_range: Range,
    ) -> Expr {
        let mut content = Vec::new();
        let endfor_range = match self.fold_until_control(&mut content) {
            Err(end_range) => {
                self.error(
                    "Unexpected end of template",
                    format!(
                        "The for directive at {for_range} is missing its corresponding endfor directive."
                    ),
                    end_range.clone(),
                );
                return placeholder(end_range);
            }
            Ok((ControlEnd::EndFor, range)) => range,
            Ok((ControlEnd::Else, range)) => {
                self.error(
                    "Unexpected else directive",
                    "An else clause is not expected for a for directive.",
                    range.clone(),
                );
                return placeholder(range);
            }
            Ok((kind, range)) => {
                self.error(
                    format!("Unexpected {} directive", kind.name()),
                    format!(
                        "Expecting an endfor directive corresponding to the for directive at {for_range}."
                    ),
                    range.clone(),
                );
                return placeholder(range);
            }
        };

        if content.is_empty() {
            content.push(empty_string(for_range.end_point()));
        }
        let for_expr = ForExpr {
            key_var,
            val_var,
            coll_expr: Arc::new(coll_expr),
            key_expr: None,
            val_expr: Arc::new(template_of(content)),
            cond_expr: None,
            group: false,
            src_range: range_between(&for_range, &endfor_range),
            open_range: for_range,
            close_range: endfor_range,
        };
        Expr::TemplateJoin {
            tuple: Arc::new(Expr::For(Box::new(for_expr))),
        }
    }
}

/// Decodes the text of a literal token: backslash escapes in quoted
/// strings, and the doubled `$${` and `%%{` in every template. The result
/// is normalized to NFC.
pub(crate) fn decode_string_literal(token: &Token) -> (String, Diagnostics) {
    let quoted = token.ty == TokenType::QuotedLit;
    let bytes = token.bytes.as_slice();
    let mut diags = Diagnostics::new();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let sub_range = |from: usize, to: usize| {
        let start = token.range.start.advance(&bytes[..from]);
        let end = start.advance(&bytes[from..to]);
        Range::new(token.range.filename.clone(), start, end)
    };

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if (b == b'$' || b == b'%') && bytes.get(i + 1) == Some(&b) && bytes.get(i + 2) == Some(&b'{') {
            out.push(b);
            out.push(b'{');
            i += 3;
            continue;
        }
        if !quoted || b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }

        let Some(&selector) = bytes.get(i + 1) else {
            out.push(b);
            i += 1;
            continue;
        };
        let simple = match selector {
            b'n' => Some('\n'),
            b'r' => Some('\r'),
            b't' => Some('\t'),
            b'"' => Some('"'),
            b'\\' => Some('\\'),
            _ => None,
        };
        if let Some(ch) = simple {
            push_char(&mut out, ch);
            i += 2;
            continue;
        }

        let digits = match selector {
            b'u' => 4,
            b'U' => 8,
            _ => {
                let len = std::str::from_utf8(&bytes[i + 1..])
                    .ok()
                    .and_then(|rest| rest.chars().next())
                    .map_or(1, char::len_utf8);
                let symbol = String::from_utf8_lossy(&bytes[i + 1..i + 1 + len]).into_owned();
                diags.push(
                    Diagnostic::error(
                        "Invalid escape sequence",
                        format!("The symbol {symbol:?} is not a valid escape sequence selector."),
                    )
                    .with_subject(sub_range(i, i + 1 + len)),
                );
                out.extend_from_slice(&bytes[i..i + 1 + len]);
                i += 1 + len;
                continue;
            }
        };

        let hex_end = (i + 2 + digits).min(bytes.len());
        let hex = &bytes[i + 2..hex_end];
        let decoded = (hex.len() == digits && hex.iter().all(u8::is_ascii_hexdigit))
            .then(|| std::str::from_utf8(hex).ok())
            .flatten()
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(ch) => push_char(&mut out, ch),
            None => {
                let detail = if hex.len() == digits && hex.iter().all(u8::is_ascii_hexdigit) {
                    "The escape sequence does not name a valid Unicode character.".to_string()
                } else {
                    format!(
                        "The \\{} escape sequence must be followed by {digits} hexadecimal digits.",
                        selector as char
                    )
                };
                diags.push(
                    Diagnostic::error("Invalid escape sequence", detail)
                        .with_subject(sub_range(i, hex_end)),
                );
                out.extend_from_slice(&bytes[i..hex_end]);
            }
        }
        i = hex_end;
    }

    let text: String = String::from_utf8_lossy(&out).nfc().collect();
    (text, diags)
}

fn push_char(out: &mut Vec<u8>, ch: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
}
