use std::sync::Arc;

use hcl_value::{parse_number, BinaryOperator, UnaryOperator, Value};

use crate::pos::{range_between, Range};
use crate::traversal::{Traversal, Traverser};

use super::super::ast::{Expr, ForExpr, ObjectConsItem};
use super::super::token::{Token, TokenType};
use super::{normalize_ident, Parser};

/// Binary operators from loosest to tightest binding.
const BINARY_LEVELS: &[&[(TokenType, BinaryOperator)]] = &[
    &[(TokenType::Or, BinaryOperator::Or)],
    &[(TokenType::And, BinaryOperator::And)],
    &[
        (TokenType::EqualOp, BinaryOperator::Equal),
        (TokenType::NotEqual, BinaryOperator::NotEqual),
    ],
    &[
        (TokenType::GreaterThan, BinaryOperator::GreaterThan),
        (TokenType::GreaterThanEq, BinaryOperator::GreaterThanOrEqual),
        (TokenType::LessThan, BinaryOperator::LessThan),
        (TokenType::LessThanEq, BinaryOperator::LessThanOrEqual),
    ],
    &[
        (TokenType::Plus, BinaryOperator::Add),
        (TokenType::Minus, BinaryOperator::Subtract),
    ],
    &[
        (TokenType::Star, BinaryOperator::Multiply),
        (TokenType::Slash, BinaryOperator::Divide),
        (TokenType::Percent, BinaryOperator::Modulo),
    ],
];

fn is_keyword(token: &Token, keyword: &str) -> bool {
    token.ty == TokenType::Ident && token.bytes == keyword.as_bytes()
}

/// Placeholder for an expression that failed to parse.
fn placeholder(src_range: Range) -> Expr {
    Expr::Literal {
        val: Value::dynamic(),
        src_range,
    }
}

impl Parser {
    pub fn parse_expression(&mut self) -> Expr {
        self.parse_ternary_conditional()
    }

    fn parse_ternary_conditional(&mut self) -> Expr {
        let mark = self.mark();
        let condition = self.parse_binary_ops(0);
        if self.failed_since(mark) || self.peek_type() != TokenType::Question {
            return condition;
        }
        self.read();

        let mark = self.mark();
        let true_result = self.parse_expression();
        if self.failed_since(mark) {
            return condition;
        }

        let colon = self.peek().clone();
        if colon.ty != TokenType::Colon {
            self.error_in(
                "Missing false expression in conditional",
                "The conditional operator (...?...:...) requires a false expression, delimited by a colon.",
                colon.range.clone(),
                range_between(&condition.src_range(), &colon.range),
            );
            return condition;
        }
        self.read();

        let mark = self.mark();
        let false_result = self.parse_expression();
        if self.failed_since(mark) {
            return condition;
        }

        let src_range = range_between(&condition.src_range(), &false_result.src_range());
        Expr::Conditional {
            condition: Arc::new(condition),
            true_result: Arc::new(true_result),
            false_result: Arc::new(false_result),
            src_range,
        }
    }

    fn binary_operator_at(&self, level: usize) -> Option<BinaryOperator> {
        let ty = self.peek_type();
        BINARY_LEVELS[level]
            .iter()
            .find(|(token, _)| *token == ty)
            .map(|(_, op)| *op)
    }

    fn parse_binary_ops(&mut self, level: usize) -> Expr {
        if level == BINARY_LEVELS.len() {
            return self.parse_expression_with_traversals();
        }

        let mark = self.mark();
        let mut lhs = self.parse_binary_ops(level + 1);
        if self.failed_since(mark) {
            return lhs;
        }

        while let Some(op) = self.binary_operator_at(level) {
            self.read();
            let mark = self.mark();
            // The logical operators group to the right.
            let rhs = if op.is_logical() {
                self.parse_binary_ops(level)
            } else {
                self.parse_binary_ops(level + 1)
            };
            let src_range = range_between(&lhs.src_range(), &rhs.src_range());
            lhs = Expr::BinaryOp {
                lhs: Arc::new(lhs),
                op,
                rhs: Arc::new(rhs),
                src_range,
            };
            if self.failed_since(mark) || op.is_logical() {
                break;
            }
        }
        lhs
    }

    fn parse_expression_with_traversals(&mut self) -> Expr {
        let term = self.parse_expression_term();
        self.parse_expression_traversals(term)
    }

    pub(super) fn parse_expression_traversals(&mut self, from: Expr) -> Expr {
        let from_range = from.src_range();
        let mut ret = from;
        loop {
            match self.peek_type() {
                TokenType::Dot => {
                    let dot = self.read();
                    let attr = self.peek().clone();
                    match attr.ty {
                        TokenType::Ident => {
                            let attr = self.read();
                            let src_range = range_between(&dot.range, &attr.range);
                            let step = Traverser::Attr {
                                name: normalize_ident(&attr),
                                src_range: src_range.clone(),
                            };
                            ret = extend_traversal(ret, step, &src_range);
                        }
                        TokenType::NumberLit => {
                            let number = self.read();
                            let src_range = range_between(&dot.range, &number.range);
                            let key = self.legacy_index_key(&number, false);
                            let step = Traverser::Index {
                                key,
                                src_range: src_range.clone(),
                            };
                            ret = extend_traversal(ret, step, &src_range);
                        }
                        TokenType::Star => {
                            ret = self.finish_attribute_splat(ret, &from_range, dot);
                        }
                        _ => {
                            self.error(
                                "Invalid attribute name",
                                "An attribute name is required after a dot.",
                                attr.range,
                            );
                            self.set_recovery();
                        }
                    }
                }
                TokenType::OBrack => {
                    let open = self.read();
                    if self.peek_type() == TokenType::Star {
                        ret = self.finish_full_splat(ret, &from_range, open);
                    } else {
                        ret = self.finish_index(ret, &from_range, open);
                    }
                }
                _ => return ret,
            }
        }
    }

    /// The key for a `.0` step, which indexes like `[0]`.
    fn legacy_index_key(&mut self, number: &Token, in_splat: bool) -> Value {
        let text = number.text();
        if let Some((first, second)) = text.split_once('.') {
            let alternative = if in_splat {
                " with a full splat expression [*]"
            } else {
                ""
            };
            self.error(
                "Invalid legacy index syntax",
                format!(
                    "When using the legacy index syntax, chaining two indexes together is not permitted. Use the proper index syntax{alternative} instead, like [{first}][{second}]."
                ),
                number.range.clone(),
            );
            return Value::dynamic();
        }
        self.number_literal_value(number)
    }

    /// `source.*.attr.attr`: only attribute and legacy index steps apply
    /// to each element.
    fn finish_attribute_splat(&mut self, source: Expr, from_range: &Range, dot: Token) -> Expr {
        let marker = self.read();
        let marker_range = range_between(&dot.range, &marker.range);
        let first_range = self.peek_range();
        let mut last_range = marker.range.clone();
        let mut steps = Vec::new();

        while self.peek_type() == TokenType::Dot {
            let dot = self.read();
            let next = self.peek().clone();
            match next.ty {
                TokenType::NumberLit => {
                    let number = self.read();
                    let key = self.legacy_index_key(&number, true);
                    steps.push(Traverser::Index {
                        key,
                        src_range: range_between(&dot.range, &number.range),
                    });
                    last_range = number.range;
                }
                TokenType::Ident => {
                    let attr = self.read();
                    steps.push(Traverser::Attr {
                        name: normalize_ident(&attr),
                        src_range: range_between(&dot.range, &attr.range),
                    });
                    last_range = attr.range;
                }
                _ => {
                    if !self.recovery {
                        if next.ty == TokenType::Star {
                            self.error(
                                "Nested splat expression not allowed",
                                "A splat expression (*) cannot be used inside another attribute-only splat expression.",
                                next.range,
                            );
                        } else {
                            self.error(
                                "Invalid attribute name",
                                "An attribute name is required after a dot.",
                                next.range,
                            );
                        }
                    }
                    self.set_recovery();
                    break;
                }
            }
        }

        let item = Expr::AnonSymbol {
            src_range: marker_range.clone(),
        };
        let each = if steps.is_empty() {
            item
        } else {
            Expr::RelativeTraversal {
                source: Arc::new(item),
                traversal: Traversal::new(steps),
                src_range: range_between(&first_range, &last_range),
            }
        };
        Expr::Splat {
            source: Arc::new(source),
            each: Arc::new(each),
            src_range: range_between(from_range, &last_range),
            marker_range,
        }
    }

    /// `source[*]...`: every following traversal step applies to each
    /// element.
    fn finish_full_splat(&mut self, source: Expr, from_range: &Range, open: Token) -> Expr {
        self.read();
        let mut close = self.read();
        if close.ty != TokenType::CBrack && !self.recovery {
            self.error(
                "Missing close bracket on splat index",
                "The star for a full splat operator must be immediately followed by a closing bracket (\"]\").",
                close.range.clone(),
            );
            close = self.peeker.recover(TokenType::CBrack);
        }
        let marker_range = range_between(&open.range, &close.range);
        let item = Expr::AnonSymbol {
            src_range: marker_range.clone(),
        };
        let each = self.parse_expression_traversals(item);
        let src_range = range_between(from_range, &each.src_range());
        Expr::Splat {
            source: Arc::new(source),
            each: Arc::new(each),
            src_range,
            marker_range,
        }
    }

    fn finish_index(&mut self, collection: Expr, from_range: &Range, open: Token) -> Expr {
        self.peeker.push_include_newlines(false);
        let mark = self.mark();
        let key = self.parse_expression();
        let close = if self.failed_since(mark) {
            self.peeker.recover(TokenType::CBrack)
        } else {
            let close = self.read();
            if close.ty != TokenType::CBrack && !self.recovery {
                self.error(
                    "Missing close bracket on index",
                    "The index operator must end with a closing bracket (\"]\").",
                    close.range.clone(),
                );
                self.peeker.recover(TokenType::CBrack)
            } else {
                close
            }
        };
        self.peeker.pop_include_newlines();

        let bracket_range = range_between(&open.range, &close.range);
        if let Some(literal) = key.literal_value() {
            let step = Traverser::Index {
                key: literal.clone(),
                src_range: bracket_range.clone(),
            };
            return extend_traversal(collection, step, &bracket_range);
        }
        Expr::Index {
            collection: Arc::new(collection),
            key: Arc::new(key),
            src_range: range_between(from_range, &bracket_range),
            open_range: open.range,
            bracket_range,
        }
    }

    fn parse_expression_term(&mut self) -> Expr {
        let start = self.peek().clone();
        match start.ty {
            TokenType::OParen => {
                let open = self.read();
                self.peeker.push_include_newlines(false);
                let mark = self.mark();
                let expr = self.parse_expression();
                if self.errors_since(mark) {
                    self.peeker.recover(TokenType::CParen);
                    self.peeker.pop_include_newlines();
                    return expr;
                }
                let close = self.peek().clone();
                if close.ty != TokenType::CParen {
                    self.error_in(
                        "Unbalanced parentheses",
                        "Expected a closing parenthesis to terminate the expression.",
                        close.range.clone(),
                        range_between(&start.range, &close.range),
                    );
                    self.set_recovery();
                }
                let close = self.read();
                self.peeker.pop_include_newlines();
                Expr::Parentheses {
                    expr: Arc::new(expr),
                    src_range: range_between(&open.range, &close.range),
                }
            }
            TokenType::NumberLit => {
                let token = self.read();
                Expr::Literal {
                    val: self.number_literal_value(&token),
                    src_range: token.range,
                }
            }
            TokenType::Ident => {
                let token = self.read();
                if self.peek_type() == TokenType::OParen {
                    return self.finish_parsing_function_call(token);
                }
                let val = match token.bytes.as_slice() {
                    b"true" => Value::bool(true),
                    b"false" => Value::bool(false),
                    b"null" => Value::null_dynamic(),
                    _ => {
                        return Expr::ScopeTraversal {
                            traversal: Traversal::new(vec![Traverser::Root {
                                name: normalize_ident(&token),
                                src_range: token.range.clone(),
                            }]),
                            src_range: token.range,
                        };
                    }
                };
                Expr::Literal {
                    val,
                    src_range: token.range,
                }
            }
            TokenType::OQuote | TokenType::OHeredoc => {
                let open = self.read();
                let (close, flush) = if open.ty == TokenType::OQuote {
                    (TokenType::CQuote, false)
                } else {
                    (TokenType::CHeredoc, open.bytes.starts_with(b"<<-"))
                };
                let (parts, passthrough) = self.parse_template_inner(close, flush);
                let src_range = range_between(&open.range, &self.prev_range());
                if passthrough {
                    if let [wrapped] = parts.as_slice() {
                        return Expr::TemplateWrap {
                            wrapped: Arc::new(wrapped.clone()),
                            src_range,
                        };
                    }
                }
                Expr::Template {
                    parts: parts.into_iter().map(Arc::new).collect(),
                    src_range,
                }
            }
            TokenType::Minus | TokenType::Bang => {
                let symbol = self.read();
                let op = if symbol.ty == TokenType::Minus {
                    UnaryOperator::Negate
                } else {
                    UnaryOperator::Not
                };
                // Binds tighter than any binary operator: -1+2 is (-1)+2.
                let operand = self.parse_expression_with_traversals();
                Expr::UnaryOp {
                    op,
                    src_range: range_between(&symbol.range, &operand.src_range()),
                    val: Arc::new(operand),
                    symbol_range: symbol.range,
                }
            }
            TokenType::OBrack => self.parse_tuple_cons(),
            TokenType::OBrace => self.parse_object_cons(),
            _ => {
                if !self.recovery {
                    let detail = if start.ty == TokenType::EOF {
                        "Expected the start of an expression, but found the end of the file."
                    } else {
                        "Expected the start of an expression, but found an invalid expression token."
                    };
                    let summary = if start.ty == TokenType::EOF {
                        "Missing expression"
                    } else {
                        "Invalid expression"
                    };
                    self.error(summary, detail, start.range.clone());
                }
                self.set_recovery();
                if start.ty == TokenType::EOF {
                    self.read();
                }
                placeholder(start.range)
            }
        }
    }

    pub(super) fn number_literal_value(&mut self, token: &Token) -> Value {
        match parse_number(&token.text()) {
            Some(number) => Value::number(number),
            None => {
                self.error(
                    "Invalid number literal",
                    "Failed to recognize the value of this number literal.",
                    token.range.clone(),
                );
                Value::unknown(hcl_value::Type::Number)
            }
        }
    }

    fn finish_parsing_function_call(&mut self, name: Token) -> Expr {
        let open = self.read();
        let mut args = Vec::new();
        let mut expand_final = false;
        let mut close: Option<Token> = None;

        self.peeker.push_include_newlines(false);
        loop {
            if self.peek_type() == TokenType::CParen {
                close = Some(self.read());
                break;
            }

            let mark = self.mark();
            let arg = self.parse_expression();
            args.push(Arc::new(arg));
            if self.failed_since(mark) {
                let recovered = self.peeker.recover(TokenType::CParen);
                if recovered.ty == TokenType::CParen {
                    close = Some(recovered);
                }
                break;
            }

            let sep = self.read();
            match sep.ty {
                TokenType::CParen => {
                    close = Some(sep);
                    break;
                }
                TokenType::Ellipsis => {
                    expand_final = true;
                    if self.peek_type() != TokenType::CParen {
                        if !self.recovery {
                            self.error_in(
                                "Missing closing parenthesis",
                                "An expanded function argument (with ...) must be immediately followed by closing parentheses.",
                                sep.range.clone(),
                                range_between(&name.range, &sep.range),
                            );
                        }
                        close = Some(self.peeker.recover(TokenType::CParen));
                    } else {
                        close = Some(self.read());
                    }
                    break;
                }
                TokenType::Comma => {
                    if self.peek_type() == TokenType::CParen {
                        close = Some(self.read());
                        break;
                    }
                }
                TokenType::EOF => {
                    self.error(
                        "Unterminated function call",
                        "There is no closing parenthesis for this function call before the end of the file. This may be caused by incorrect parenthesis nesting elsewhere in this file.",
                        range_between(&name.range, &open.range),
                    );
                    close = Some(self.peeker.recover(TokenType::CParen));
                    break;
                }
                _ => {
                    self.error_in(
                        "Missing argument separator",
                        "A comma is required to separate each function argument from the next.",
                        sep.range.clone(),
                        range_between(&name.range, &sep.range),
                    );
                    close = Some(self.peeker.recover(TokenType::CParen));
                    break;
                }
            }
        }
        self.peeker.pop_include_newlines();

        let close_paren_range = close
            .map(|token| token.range)
            .unwrap_or_else(|| self.prev_range());
        Expr::FunctionCall {
            name: normalize_ident(&name),
            args,
            expand_final,
            name_range: name.range,
            open_paren_range: open.range,
            close_paren_range,
        }
    }

    fn parse_tuple_cons(&mut self) -> Expr {
        let open = self.read();
        self.peeker.push_include_newlines(false);
        let expr = if is_keyword(self.peek(), "for") {
            self.finish_parsing_for_expr(open)
        } else {
            self.finish_tuple_cons(open)
        };
        self.peeker.pop_include_newlines();
        expr
    }

    fn finish_tuple_cons(&mut self, open: Token) -> Expr {
        let mut exprs = Vec::new();
        let close = loop {
            if self.peek_type() == TokenType::CBrack {
                break self.read();
            }

            let mark = self.mark();
            exprs.push(Arc::new(self.parse_expression()));
            if self.failed_since(mark) {
                break self.peeker.recover(TokenType::CBrack);
            }

            let next = self.peek().clone();
            match next.ty {
                TokenType::CBrack => break self.read(),
                TokenType::Comma => {
                    self.read();
                }
                _ => {
                    if !self.recovery {
                        if next.ty == TokenType::EOF {
                            self.error(
                                "Unterminated tuple constructor expression",
                                "There is no corresponding closing bracket before the end of the file. This may be caused by incorrect bracket nesting elsewhere in this file.",
                                open.range.clone(),
                            );
                        } else {
                            self.error_in(
                                "Missing item separator",
                                "Expected a comma to mark the beginning of the next item.",
                                next.range.clone(),
                                range_between(&open.range, &next.range),
                            );
                        }
                    }
                    break self.peeker.recover(TokenType::CBrack);
                }
            }
        };

        Expr::TupleCons {
            exprs,
            src_range: range_between(&open.range, &close.range),
            open_range: open.range,
        }
    }

    fn parse_object_cons(&mut self) -> Expr {
        let open = self.read();
        self.peeker.push_include_newlines(true);
        let expr = if is_keyword(self.peek(), "for") {
            self.finish_parsing_for_expr(open)
        } else {
            self.finish_object_cons(open)
        };
        self.peeker.pop_include_newlines();
        expr
    }

    fn unterminated_object(&mut self, open: &Token) {
        self.error(
            "Unterminated object constructor expression",
            "There is no corresponding closing brace before the end of the file. This may be caused by incorrect brace nesting elsewhere in this file.",
            open.range.clone(),
        );
    }

    fn finish_object_cons(&mut self, open: Token) -> Expr {
        let mut items = Vec::new();
        let close = loop {
            match self.peek_type() {
                TokenType::Newline => {
                    self.read();
                    continue;
                }
                TokenType::CBrace => break self.read(),
                _ => {}
            }

            // Parentheses make a bare name key an expression.
            let force_non_literal = self.peek_type() == TokenType::OParen;
            let mark = self.mark();
            let key = self.parse_expression();
            if self.failed_since(mark) {
                break self.peeker.recover(TokenType::CBrace);
            }
            let key = Expr::ObjectConsKey {
                wrapped: Arc::new(key),
                force_non_literal,
            };

            let next = self.peek().clone();
            if next.ty != TokenType::Equal && next.ty != TokenType::Colon {
                if !self.recovery {
                    let context = range_between(&open.range, &next.range);
                    match next.ty {
                        TokenType::Newline | TokenType::Comma => self.error_in(
                            "Missing attribute value",
                            "Expected an attribute value, introduced by an equals sign (\"=\").",
                            next.range.clone(),
                            context,
                        ),
                        TokenType::Ident => self.error_in(
                            "Missing key/value separator",
                            "Expected an equals sign (\"=\") to mark the beginning of the attribute value. If you intended to given an attribute name containing periods or spaces, write the name in quotes to create a string literal.",
                            next.range.clone(),
                            context,
                        ),
                        TokenType::EOF => self.unterminated_object(&open),
                        _ => self.error_in(
                            "Missing key/value separator",
                            "Expected an equals sign (\"=\") to mark the beginning of the attribute value.",
                            next.range.clone(),
                            context,
                        ),
                    }
                }
                break self.peeker.recover(TokenType::CBrace);
            }
            self.read();

            let mark = self.mark();
            let value = self.parse_expression();
            if self.failed_since(mark) {
                break self.peeker.recover(TokenType::CBrace);
            }
            items.push(ObjectConsItem {
                key: Arc::new(key),
                value: Arc::new(value),
            });

            let next = self.peek().clone();
            match next.ty {
                TokenType::CBrace => break self.read(),
                TokenType::Comma | TokenType::Newline => {
                    self.read();
                }
                _ => {
                    if !self.recovery {
                        if next.ty == TokenType::EOF {
                            self.unterminated_object(&open);
                        } else {
                            self.error_in(
                                "Missing attribute separator",
                                "Expected a newline or comma to mark the beginning of the next attribute.",
                                next.range.clone(),
                                range_between(&open.range, &next.range),
                            );
                        }
                    }
                    break self.peeker.recover(TokenType::CBrace);
                }
            }
        };

        Expr::ObjectCons {
            items,
            src_range: range_between(&open.range, &close.range),
            open_range: open.range,
        }
    }

    fn invalid_for(&mut self, open: &Token, detail: &str) {
        if !self.recovery {
            let next = self.peek_range();
            self.error_in(
                "Invalid 'for' expression",
                detail,
                next.clone(),
                range_between(&open.range, &next),
            );
        }
    }

    /// `[for ...]` or `{for ...}`, with the opening bracket already read.
    fn finish_parsing_for_expr(&mut self, open: Token) -> Expr {
        self.peeker.push_include_newlines(false);
        let expr = self.finish_for_expr_inner(open);
        self.peeker.pop_include_newlines();
        expr
    }

    fn finish_for_expr_inner(&mut self, open: Token) -> Expr {
        self.read();
        let make_object = open.ty == TokenType::OBrace;
        let close_type = if make_object {
            TokenType::CBrace
        } else {
            TokenType::CBrack
        };
        let bail = |parser: &mut Parser| {
            let close = parser.peeker.recover(close_type);
            placeholder(range_between(&open.range, &close.range))
        };

        if self.peek_type() != TokenType::Ident {
            self.invalid_for(&open, "For expression requires variable name after 'for'.");
            return bail(self);
        }
        let mut key_var = None;
        let mut val_var = normalize_ident(&self.read());
        if self.peek_type() == TokenType::Comma {
            self.read();
            if self.peek_type() != TokenType::Ident {
                self.invalid_for(&open, "For expression requires value variable name after comma.");
                return bail(self);
            }
            key_var = Some(val_var);
            val_var = normalize_ident(&self.read());
        }

        if !is_keyword(self.peek(), "in") {
            self.invalid_for(
                &open,
                "For expression requires the 'in' keyword after its name declarations.",
            );
            return bail(self);
        }
        self.read();

        let mark = self.mark();
        let coll_expr = self.parse_expression();
        if self.failed_since(mark) {
            return bail(self);
        }

        if self.peek_type() != TokenType::Colon {
            self.invalid_for(
                &open,
                "For expression requires a colon after the collection expression.",
            );
            return bail(self);
        }
        self.read();

        let mark = self.mark();
        let mut key_expr = None;
        let mut val_expr = self.parse_expression();
        if self.peek_type() == TokenType::FatArrow {
            self.read();
            key_expr = Some(val_expr);
            val_expr = self.parse_expression();
        }
        if self.failed_since(mark) {
            return bail(self);
        }

        let mut ellipsis_range = None;
        if self.peek_type() == TokenType::Ellipsis {
            ellipsis_range = Some(self.read().range);
        }

        let mut cond_expr = None;
        if is_keyword(self.peek(), "if") {
            self.read();
            let mark = self.mark();
            cond_expr = Some(self.parse_expression());
            if self.failed_since(mark) {
                return bail(self);
            }
        }

        let close = if self.peek_type() == close_type {
            self.read()
        } else {
            self.invalid_for(&open, "Extra characters after the end of the 'for' expression.");
            self.peeker.recover(close_type)
        };
        let context = range_between(&open.range, &close.range);

        if make_object {
            if key_expr.is_none() {
                self.error_in(
                    "Invalid 'for' expression",
                    "Key expression is required when building an object.",
                    val_expr.src_range(),
                    context,
                );
            }
        } else {
            if let Some(key_expr) = &key_expr {
                self.error_in(
                    "Invalid 'for' expression",
                    "Key expression is not valid when building a tuple.",
                    key_expr.src_range(),
                    context.clone(),
                );
            }
            if let Some(ellipsis_range) = &ellipsis_range {
                self.error_in(
                    "Invalid 'for' expression",
                    "Grouping ellipsis (...) cannot be used when building a tuple.",
                    ellipsis_range.clone(),
                    context,
                );
            }
        }

        Expr::For(Box::new(ForExpr {
            key_var,
            val_var,
            coll_expr: Arc::new(coll_expr),
            key_expr: key_expr.map(Arc::new),
            val_expr: Arc::new(val_expr),
            cond_expr: cond_expr.map(Arc::new),
            group: ellipsis_range.is_some(),
            src_range: range_between(&open.range, &close.range),
            open_range: open.range,
            close_range: close.range,
        }))
    }
}

/// Appends a static step, extending `expr` in place if it is already a
/// traversal.
fn extend_traversal(expr: Expr, step: Traverser, step_range: &Range) -> Expr {
    match expr {
        Expr::ScopeTraversal {
            mut traversal,
            src_range,
        } => {
            traversal.steps.push(step);
            Expr::ScopeTraversal {
                traversal,
                src_range: range_between(&src_range, step_range),
            }
        }
        Expr::RelativeTraversal {
            source,
            mut traversal,
            src_range,
        } => {
            traversal.steps.push(step);
            Expr::RelativeTraversal {
                source,
                traversal,
                src_range: range_between(&src_range, step_range),
            }
        }
        other => {
            let src_range = range_between(&other.src_range(), step_range);
            Expr::RelativeTraversal {
                source: Arc::new(other),
                traversal: Traversal::new(vec![step]),
                src_range,
            }
        }
    }
}
