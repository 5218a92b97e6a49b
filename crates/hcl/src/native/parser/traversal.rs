use hcl_value::Value;

use crate::pos::range_between;
use crate::traversal::{Traversal, Traverser};

use super::super::token::TokenType;
use super::{normalize_ident, Parser};

impl Parser {
    /// Parses a standalone absolute traversal such as `a.b[0]["c"]`.
    ///
    /// Index keys must be literal numbers or strings. Splat steps and
    /// the legacy `.0` index form are accepted.
    pub fn parse_traversal_abs(&mut self) -> Traversal {
        let mut steps = Vec::new();

        let root = self.read();
        if root.ty != TokenType::Ident {
            self.error(
                "Variable name required",
                "Must begin with a variable name.",
                root.range,
            );
            return Traversal::new(steps);
        }
        steps.push(Traverser::Root {
            name: normalize_ident(&root),
            src_range: root.range.clone(),
        });

        loop {
            let next = self.peek().clone();
            match next.ty {
                TokenType::EOF => break,
                TokenType::Dot => {
                    let dot = self.read();
                    let name = self.read();
                    let src_range = range_between(&dot.range, &name.range);
                    match name.ty {
                        TokenType::Ident => steps.push(Traverser::Attr {
                            name: normalize_ident(&name),
                            src_range,
                        }),
                        TokenType::Star => steps.push(Traverser::Splat { src_range }),
                        TokenType::NumberLit if !name.text().contains('.') => {
                            let key = self.number_literal_value(&name);
                            steps.push(Traverser::Index { key, src_range });
                        }
                        _ => {
                            self.error_in(
                                "Attribute name required",
                                "Dot must be followed by attribute name.",
                                name.range.clone(),
                                range_between(&root.range, &name.range),
                            );
                            break;
                        }
                    }
                }
                TokenType::OBrack => {
                    let open = self.read();
                    let key_token = self.peek().clone();
                    let key = match key_token.ty {
                        TokenType::NumberLit => {
                            let token = self.read();
                            Some(self.number_literal_value(&token))
                        }
                        TokenType::OQuote => {
                            let (text, _) = self.parse_quoted_string_literal();
                            Some(Value::string(text))
                        }
                        TokenType::Star => {
                            self.read();
                            None
                        }
                        _ => {
                            self.error_in(
                                "Index value required",
                                "Index brackets must contain either a literal number or a literal string.",
                                key_token.range.clone(),
                                range_between(&root.range, &key_token.range),
                            );
                            break;
                        }
                    };
                    let close = self.read();
                    if close.ty != TokenType::CBrack {
                        self.error_in(
                            "Unclosed index brackets",
                            "Index key must be followed by a closing bracket.",
                            close.range.clone(),
                            range_between(&open.range, &close.range),
                        );
                    }
                    let src_range = range_between(&open.range, &close.range);
                    steps.push(match key {
                        Some(key) => Traverser::Index { key, src_range },
                        None => Traverser::Splat { src_range },
                    });
                    if self.diagnostics.has_errors() {
                        break;
                    }
                }
                _ => {
                    self.error_in(
                        "Invalid character",
                        "Expected an attribute access or an index operator.",
                        next.range.clone(),
                        range_between(&root.range, &next.range),
                    );
                    break;
                }
            }
        }

        Traversal::new(steps)
    }
}
