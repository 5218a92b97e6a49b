//! The native configuration syntax.
//!
//! Source text is scanned into tokens, parsed into an [`Expr`]/[`Body`]
//! tree, and evaluated on demand through the [`Expression`] and
//! [`crate::structure::Body`] traits.
//!
//! [`Expression`]: crate::expression::Expression

mod ast;
mod eval;
mod navigation;
mod parser;
mod peeker;
mod scanner;
mod structure;
mod token;

use std::sync::Arc;

use crate::diagnostics::Diagnostics;
use crate::pos::Pos;
use crate::structure::File;
use crate::traversal::Traversal;

pub use ast::{Attribute, Block, Body, Expr, ForExpr, ObjectConsItem};
pub use navigation::Navigation;
pub use token::{Token, TokenType, Tokens};

use parser::Parser;
use scanner::{check_invalid_tokens, scan_tokens, ScanMode};

/// Splits a configuration file into tokens, reporting characters that
/// cannot start any token.
pub fn lex_config(src: &[u8], filename: &str, start: Pos) -> (Tokens, Diagnostics) {
    let tokens = scan_tokens(src, filename, start, ScanMode::Normal);
    let diags = check_invalid_tokens(&tokens);
    (tokens, diags)
}

/// Splits a standalone expression into tokens.
pub fn lex_expression(src: &[u8], filename: &str, start: Pos) -> (Tokens, Diagnostics) {
    lex_config(src, filename, start)
}

/// Splits a bare template into tokens.
pub fn lex_template(src: &[u8], filename: &str, start: Pos) -> (Tokens, Diagnostics) {
    let tokens = scan_tokens(src, filename, start, ScanMode::Template);
    let diags = check_invalid_tokens(&tokens);
    (tokens, diags)
}

/// Parses a whole configuration file.
///
/// A file is always returned, even when there are errors; it holds
/// whatever could be recovered.
pub fn parse_config(src: &[u8], filename: &str, start: Pos) -> (File, Diagnostics) {
    let (tokens, mut diags) = lex_config(src, filename, start);
    let mut parser = Parser::new(tokens, true);
    let body = Arc::new(parser.parse_body(TokenType::EOF));
    diags.extend(parser.diagnostics);

    let file = File {
        body: body.clone(),
        bytes: Arc::from(src),
        nav: Some(Arc::new(Navigation::new(body))),
    };
    (file, diags)
}

/// Parses a standalone expression. Newlines are insignificant, as if the
/// whole input were in parentheses.
pub fn parse_expression(src: &[u8], filename: &str, start: Pos) -> (Expr, Diagnostics) {
    let (tokens, mut diags) = lex_expression(src, filename, start);
    let mut parser = Parser::new(tokens, false);
    let expr = parser.parse_expression();
    parser.expect_eof();
    diags.extend(parser.diagnostics);
    (expr, diags)
}

/// Parses a bare template, as found in a file with no surrounding quotes.
pub fn parse_template(src: &[u8], filename: &str, start: Pos) -> (Expr, Diagnostics) {
    let (tokens, mut diags) = lex_template(src, filename, start);
    let mut parser = Parser::new(tokens, false);
    let expr = parser.parse_template();
    diags.extend(parser.diagnostics);
    (expr, diags)
}

/// Parses a static absolute traversal such as `a.b[0]`.
pub fn parse_traversal_abs(src: &[u8], filename: &str, start: Pos) -> (Traversal, Diagnostics) {
    let (tokens, mut diags) = lex_expression(src, filename, start);
    let mut parser = Parser::new(tokens, false);
    let traversal = parser.parse_traversal_abs();
    diags.extend(parser.diagnostics);
    (traversal, diags)
}

#[cfg(test)]
mod tests;
