use std::sync::Arc;

use indexmap::IndexMap;
use unicode_normalization::UnicodeNormalization;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::pos::{range_between, Range};

use super::ast::{Attribute, Block, Body};
use super::peeker::Peeker;
use super::token::{Token, TokenType, Tokens};

mod expressions;
mod template;
mod traversal;

pub(crate) use template::decode_string_literal;

/// Recursive-descent parser over a token stream.
///
/// Diagnostics accumulate in `diagnostics`. After a syntax error the
/// parser enters recovery mode, in which follow-on errors that would only
/// restate the first problem are suppressed.
pub(crate) struct Parser {
    peeker: Peeker,
    pub diagnostics: Diagnostics,
    recovery: bool,
}

impl Parser {
    pub fn new(tokens: Tokens, include_newlines: bool) -> Self {
        Self {
            peeker: Peeker::new(tokens, include_newlines),
            diagnostics: Diagnostics::new(),
            recovery: false,
        }
    }

    fn peek(&self) -> &Token {
        self.peeker.peek()
    }

    fn peek_type(&self) -> TokenType {
        self.peeker.peek().ty
    }

    fn peek_range(&self) -> Range {
        self.peeker.peek().range.clone()
    }

    fn read(&mut self) -> Token {
        self.peeker.read()
    }

    fn prev_range(&self) -> Range {
        self.peeker.prev_range()
    }

    fn set_recovery(&mut self) {
        self.recovery = true;
    }

    fn error(&mut self, summary: impl Into<String>, detail: impl Into<String>, subject: Range) {
        self.diagnostics
            .push(Diagnostic::error(summary, detail).with_subject(subject));
    }

    fn error_in(
        &mut self,
        summary: impl Into<String>,
        detail: impl Into<String>,
        subject: Range,
        context: Range,
    ) {
        self.diagnostics.push(
            Diagnostic::error(summary, detail)
                .with_subject(subject)
                .with_context(context),
        );
    }

    /// A marker for [`Parser::errors_since`].
    fn mark(&self) -> usize {
        self.diagnostics.len()
    }

    fn errors_since(&self, mark: usize) -> bool {
        self.diagnostics.as_slice()[mark..]
            .iter()
            .any(Diagnostic::is_error)
    }

    /// True if parsing since `mark` failed and left the parser recovering,
    /// which means the token stream position is unreliable.
    fn failed_since(&self, mark: usize) -> bool {
        self.recovery && self.errors_since(mark)
    }

    /// Reports anything left over after a standalone expression.
    pub fn expect_eof(&mut self) {
        let next = self.peek().clone();
        if next.ty != TokenType::EOF && !self.recovery {
            self.error(
                "Extra characters after expression",
                "An expression was successfully parsed, but extra characters were found after it.",
                next.range,
            );
        }
    }

    /// Parses body items until a token of type `end`, which is consumed.
    pub fn parse_body(&mut self, end: TokenType) -> Body {
        let mut attributes: IndexMap<String, Attribute> = IndexMap::new();
        let mut blocks = Vec::new();
        let start_range = self.prev_range();
        let end_range;

        loop {
            let next = self.peek_type();
            if next == end {
                end_range = self.read().range;
                break;
            }
            match next {
                TokenType::Newline => {
                    self.read();
                }
                TokenType::Ident => match self.parse_body_item() {
                    Some(BodyItem::Block(block)) => blocks.push(block),
                    Some(BodyItem::Attribute(attr)) => {
                        if let Some(existing) = attributes.get(&attr.name) {
                            let detail = format!(
                                "The argument {:?} was already set at {}. Each argument may be set only once.",
                                attr.name, existing.name_range
                            );
                            self.error("Attribute redefined", detail, attr.name_range.clone());
                        } else {
                            attributes.insert(attr.name.clone(), attr);
                        }
                    }
                    None => {}
                },
                _ => {
                    let bad = self.read();
                    if !self.recovery {
                        if bad.ty == TokenType::OQuote {
                            self.error(
                                "Invalid argument name",
                                "Argument names must not be quoted.",
                                bad.range.clone(),
                            );
                        } else {
                            self.error(
                                "Argument or block definition required",
                                "An argument or block definition is required here.",
                                bad.range.clone(),
                            );
                        }
                    }
                    end_range = self.prev_range();
                    self.peeker.recover(end);
                    break;
                }
            }
        }

        Body {
            attributes,
            blocks,
            src_range: range_between(&start_range, &end_range),
            end_range: end_range.end_point(),
            ..Body::default()
        }
    }

    fn parse_body_item(&mut self) -> Option<BodyItem> {
        let ident = self.read();
        if ident.ty != TokenType::Ident {
            self.peeker.recover_after_body_item();
            self.error(
                "Argument or block definition required",
                "An argument or block definition is required here.",
                ident.range,
            );
            return None;
        }
        match self.peek_type() {
            TokenType::Equal => Some(BodyItem::Attribute(
                self.finish_parsing_body_attribute(ident, false),
            )),
            TokenType::OQuote | TokenType::OBrace | TokenType::Ident => {
                Some(BodyItem::Block(self.finish_parsing_body_block(ident)))
            }
            _ => {
                self.peeker.recover_after_body_item();
                self.error(
                    "Argument or block definition required",
                    "An argument or block definition is required here. To set an argument, use the equals sign \"=\" to introduce the argument value.",
                    ident.range,
                );
                None
            }
        }
    }

    fn finish_parsing_body_attribute(&mut self, ident: Token, single_line: bool) -> Attribute {
        let equals = self.read();
        let mark = self.mark();
        let expr = self.parse_expression();
        let mut end_range = self.prev_range();
        if self.failed_since(mark) {
            self.peeker.recover_after_body_item();
        } else if !single_line {
            let end = self.peek().clone();
            if end.ty != TokenType::Newline && end.ty != TokenType::EOF {
                if !self.recovery {
                    let (summary, detail) = if end.ty == TokenType::Comma {
                        (
                            "Unexpected comma after argument",
                            "Argument definitions must be separated by newlines, not commas. An argument definition must end with a newline.",
                        )
                    } else {
                        (
                            "Missing newline after argument",
                            "An argument definition must end with a newline.",
                        )
                    };
                    self.error_in(
                        summary,
                        detail,
                        end.range.clone(),
                        range_between(&ident.range, &end.range),
                    );
                }
                end_range = self.prev_range();
                self.peeker.recover_after_body_item();
            } else {
                end_range = self.prev_range();
                self.read();
            }
        }

        Attribute {
            name: normalize_ident(&ident),
            expr: Arc::new(expr),
            src_range: range_between(&ident.range, &end_range),
            name_range: ident.range,
            equals_range: equals.range,
        }
    }

    fn finish_parsing_body_block(&mut self, ident: Token) -> Block {
        let type_name = normalize_ident(&ident);
        let mut labels = Vec::new();
        let mut label_ranges = Vec::new();

        let open_brace = loop {
            let token = self.peek().clone();
            match token.ty {
                TokenType::OBrace => break self.read(),
                TokenType::OQuote => {
                    let (label, range) = self.parse_quoted_string_literal();
                    labels.push(label);
                    label_ranges.push(range);
                }
                TokenType::Ident => {
                    let token = self.read();
                    labels.push(normalize_ident(&token));
                    label_ranges.push(token.range);
                }
                _ => {
                    let context = range_between(&ident.range, &token.range);
                    match token.ty {
                        TokenType::Equal => self.error_in(
                            "Invalid block definition",
                            "The equals sign \"=\" indicates an argument definition, and must not be used when defining a block.",
                            token.range.clone(),
                            context,
                        ),
                        TokenType::Newline => self.error_in(
                            "Invalid block definition",
                            "A block definition must have block content delimited by \"{\" and \"}\", starting on the same line as the block header.",
                            token.range.clone(),
                            context,
                        ),
                        _ if !self.recovery => self.error_in(
                            "Invalid block definition",
                            "Either a quoted string block label or an opening brace (\"{\") is expected here.",
                            token.range.clone(),
                            context,
                        ),
                        _ => {}
                    }
                    self.peeker.recover_after_body_item();
                    return Block {
                        type_name,
                        labels,
                        body: Arc::new(Body {
                            src_range: ident.range.clone(),
                            end_range: ident.range.clone(),
                            ..Body::default()
                        }),
                        type_range: ident.range.clone(),
                        label_ranges,
                        open_brace_range: ident.range.clone(),
                        close_brace_range: ident.range,
                    };
                }
            }
        };

        let body = match self.peek_type() {
            TokenType::Newline | TokenType::EOF | TokenType::CBrace => {
                Some(self.parse_body(TokenType::CBrace))
            }
            _ => {
                let body = self.parse_single_attr_body(&open_brace);
                let next = self.peek().clone();
                match next.ty {
                    TokenType::CBrace => {
                        self.read();
                    }
                    TokenType::Comma => {
                        self.error(
                            "Invalid single-argument block definition",
                            "Single-line block syntax can include only one argument definition. To define multiple arguments, use the multi-line block syntax with one argument definition per line.",
                            next.range,
                        );
                        self.peeker.recover(TokenType::CBrace);
                    }
                    TokenType::Newline => {
                        self.error(
                            "Invalid single-argument block definition",
                            "An argument definition on the same line as its containing block creates a single-line block definition, which must also be closed on the same line. Place the block's closing brace immediately after the argument definition.",
                            next.range,
                        );
                        self.peeker.recover(TokenType::CBrace);
                    }
                    _ => {
                        if !self.recovery {
                            self.error(
                                "Invalid single-argument block definition",
                                "A single-line block definition must end with a closing brace immediately after its single argument definition.",
                                next.range,
                            );
                        }
                        self.peeker.recover(TokenType::CBrace);
                    }
                }
                body
            }
        };
        let close_brace_range = self.prev_range();

        let eol = self.peek().clone();
        if eol.ty == TokenType::Newline || eol.ty == TokenType::EOF {
            self.read();
        } else {
            if !self.recovery {
                self.error_in(
                    "Missing newline after block definition",
                    "A block definition must end with a newline.",
                    eol.range.clone(),
                    range_between(&ident.range, &eol.range),
                );
            }
            self.peeker.recover_after_body_item();
        }

        let body = body.unwrap_or_else(|| Body {
            src_range: range_between(&open_brace.range, &close_brace_range),
            end_range: close_brace_range.clone(),
            ..Body::default()
        });

        Block {
            type_name,
            labels,
            body: Arc::new(body),
            type_range: ident.range,
            label_ranges,
            open_brace_range: open_brace.range,
            close_brace_range,
        }
    }

    /// The body of a single-line block such as `b { a = 1 }`.
    fn parse_single_attr_body(&mut self, open_brace: &Token) -> Option<Body> {
        let ident = self.read();
        if ident.ty != TokenType::Ident {
            self.peeker.recover_after_body_item();
            self.error(
                "Argument or block definition required",
                "An argument or block definition is required here.",
                ident.range,
            );
            return None;
        }
        let next = self.peek().clone();
        match next.ty {
            TokenType::Equal => {
                let attr = self.finish_parsing_body_attribute(ident, true);
                let src_range = range_between(&open_brace.range, &attr.src_range);
                let end_range = attr.src_range.end_point();
                let mut attributes = IndexMap::new();
                attributes.insert(attr.name.clone(), attr);
                Some(Body {
                    attributes,
                    src_range,
                    end_range,
                    ..Body::default()
                })
            }
            TokenType::OQuote | TokenType::OBrace | TokenType::Ident => {
                self.peeker.recover_after_body_item();
                let detail = format!(
                    "A single-line block definition can contain only a single argument. If you meant to define argument {:?}, use an equals sign to assign it a value. To define a nested block, place it on a line of its own within its parent block.",
                    ident.text()
                );
                self.error(
                    "Argument definition required",
                    detail,
                    range_between(&ident.range, &next.range),
                );
                None
            }
            _ => {
                self.peeker.recover_after_body_item();
                self.error(
                    "Argument or block definition required",
                    "An argument or block definition is required here. To set an argument, use the equals sign \"=\" to introduce the argument value.",
                    ident.range,
                );
                None
            }
        }
    }

    /// A quoted string with no template sequences, such as a block label.
    fn parse_quoted_string_literal(&mut self) -> (String, Range) {
        let open = self.read();
        if open.ty != TokenType::OQuote {
            self.error(
                "Invalid string literal",
                "A string literal is expected here.",
                open.range.clone(),
            );
            return (String::new(), open.range);
        }

        let mut value = String::new();
        let end_range = loop {
            let token = self.read();
            match token.ty {
                TokenType::CQuote => break token.range,
                TokenType::QuotedLit => {
                    let (text, diags) = decode_string_literal(&token);
                    self.diagnostics.extend(diags);
                    value.push_str(&text);
                }
                TokenType::TemplateInterp | TokenType::TemplateControl => {
                    let which = if token.ty == TokenType::TemplateControl {
                        "%"
                    } else {
                        "$"
                    };
                    self.error_in(
                        "Invalid string literal",
                        format!(
                            "Template sequences are not allowed in this string. To include a literal {which:?}, double it (as \"{which}{which}\") to escape it."
                        ),
                        token.range.clone(),
                        range_between(&open.range, &token.range),
                    );
                    value.push_str(which);
                    value.push_str("{ ... }");
                    self.peeker.recover(TokenType::TemplateSeqEnd);
                }
                TokenType::EOF => {
                    self.error_in(
                        "Unterminated string literal",
                        "Unable to find the closing quote mark before the end of the file.",
                        token.range.clone(),
                        range_between(&open.range, &token.range),
                    );
                    break token.range;
                }
                _ => {
                    self.error_in(
                        "Invalid string literal",
                        "This item is not valid in a string literal.",
                        token.range.clone(),
                        range_between(&open.range, &token.range),
                    );
                    self.peeker.recover(TokenType::CQuote);
                    break token.range;
                }
            }
        };
        (value, range_between(&open.range, &end_range))
    }
}

enum BodyItem {
    Attribute(Attribute),
    Block(Block),
}

/// Identifiers are compared in Unicode normalization form C.
pub(crate) fn normalize_ident(token: &Token) -> String {
    token.text().nfc().collect()
}
