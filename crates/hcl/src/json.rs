//! The JSON profile of the configuration language.
//!
//! A JSON document is an alternative spelling of a native body: object
//! properties become attributes or blocks depending on the schema they
//! are decoded with, and strings may contain `${...}` template sequences.

mod ast;
mod expression;
mod navigation;
mod parser;
mod scanner;
mod structure;

use std::sync::Arc;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::expression::Expression;
use crate::pos::{Pos, Range};
use crate::structure::File;

pub use ast::{Array, Node, Object, Property};
pub use expression::JsonExpr;
pub use navigation::Navigation;
pub use scanner::{Token, TokenType};
pub use structure::Body;

use parser::Parser;

/// Splits a JSON document into tokens.
pub fn lex(src: &[u8], filename: &str) -> Vec<Token> {
    scanner::scan(src, filename, Pos::INITIAL)
}

/// Parses a JSON configuration file.
///
/// The root must be an object, or an array of objects whose properties
/// are merged. Anything else is reported and replaced by an empty object
/// so that callers can still inspect the file.
pub fn parse(src: &[u8], filename: &str) -> (File, Diagnostics) {
    let mut parser = Parser::new(scanner::scan(src, filename, Pos::INITIAL));
    let root = parser.parse_document();
    let mut diags = parser.diagnostics;

    let root = match root {
        Some(root @ (Node::Object(_) | Node::Array(_))) => root,
        Some(other) => {
            diags.push(
                Diagnostic::error(
                    "Root value must be object",
                    "The root value in a JSON-based configuration must be either a JSON object or a JSON array of objects.",
                )
                .with_subject(other.start_range().clone()),
            );
            placeholder(other.start_range().start_point())
        }
        None => placeholder(Range::point(filename, Pos::INITIAL)),
    };

    let root = Arc::new(root);
    let file = File {
        body: Arc::new(Body::new(root.clone())),
        bytes: Arc::from(src),
        nav: Some(Arc::new(Navigation::new(root))),
    };
    (file, diags)
}

/// Parses a single JSON value as an expression.
pub fn parse_expression(src: &[u8], filename: &str) -> (Arc<dyn Expression>, Diagnostics) {
    let mut parser = Parser::new(scanner::scan(src, filename, Pos::INITIAL));
    let node = parser
        .parse_document()
        .unwrap_or_else(|| Node::Null {
            src_range: Range::point(filename, Pos::INITIAL),
        });
    (Arc::new(JsonExpr::new(node)), parser.diagnostics)
}

fn placeholder(at: Range) -> Node {
    Node::Object(Object {
        properties: Vec::new(),
        src_range: at.clone(),
        open_range: at.clone(),
        close_range: at,
    })
}

#[cfg(test)]
mod tests;
