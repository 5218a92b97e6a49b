use hcl_value::parse_number;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::didyoumean::suggestion_sentence;
use crate::pos::{range_between, Range};

use super::ast::{Array, Node, Object, Property};
use super::scanner::{Token, TokenType};

const KEYWORDS: [&str; 3] = ["true", "false", "null"];

pub struct Parser {
    tokens: Vec<Token>,
    next: usize,
    pub diagnostics: Diagnostics,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            next: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    fn peek(&self) -> &Token {
        // The scanner always ends the stream with EOF.
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.next.min(last)]
    }

    fn read(&mut self) -> Token {
        let token = self.peek().clone();
        if self.next + 1 < self.tokens.len() {
            self.next += 1;
        }
        token
    }

    fn error(&mut self, summary: &str, detail: impl Into<String>, subject: Range) {
        self.diagnostics
            .push(Diagnostic::error(summary, detail).with_subject(subject));
    }

    /// Parses a single value that must make up the whole input.
    pub fn parse_document(&mut self) -> Option<Node> {
        let node = self.parse_value()?;
        let extra = self.peek().clone();
        if extra.ty != TokenType::EOF {
            self.error(
                "Extraneous data after value",
                "Extra characters appear after the JSON value.",
                extra.range,
            );
        }
        Some(node)
    }

    /// Parses one value. `None` means the value was unusable and has
    /// already been reported.
    pub fn parse_value(&mut self) -> Option<Node> {
        let token = self.peek().clone();
        match token.ty {
            TokenType::ObjectOpen => Some(self.parse_object()),
            TokenType::ArrayOpen => Some(self.parse_array()),
            TokenType::String => {
                self.read();
                let value = self.decode_string(&token)?;
                Some(Node::String {
                    value,
                    src_range: token.range,
                })
            }
            TokenType::Number => {
                self.read();
                self.parse_number(token)
            }
            TokenType::Keyword => {
                self.read();
                Some(self.parse_keyword(token))
            }
            TokenType::EOF => {
                self.error(
                    "Missing JSON value",
                    "The JSON data ends prematurely. A value was expected.",
                    token.range,
                );
                None
            }
            TokenType::Invalid => {
                self.read();
                self.error(
                    "Invalid character",
                    "This character is not used within JSON syntax.",
                    token.range,
                );
                None
            }
            _ => {
                self.error(
                    "Invalid start of value",
                    "A JSON value must start with a brace, a bracket, a number, a string, or a keyword.",
                    token.range,
                );
                None
            }
        }
    }

    fn parse_object(&mut self) -> Node {
        let open = self.read();
        let mut properties = Vec::new();

        let close = loop {
            if self.peek().ty == TokenType::ObjectClose {
                break self.read();
            }

            let name_token = self.read();
            let name = match name_token.ty {
                TokenType::String => self.decode_string(&name_token),
                TokenType::Keyword => {
                    self.error(
                        "Invalid object property name",
                        format!(
                            "A JSON object property name must be a string. Did you mean \"{}\"?",
                            String::from_utf8_lossy(&name_token.bytes)
                        ),
                        name_token.range.clone(),
                    );
                    None
                }
                TokenType::EOF => {
                    self.error(
                        "Unclosed object",
                        "No closing brace was found for this JSON object.",
                        open.range.clone(),
                    );
                    break name_token;
                }
                _ => {
                    self.error(
                        "Invalid object property name",
                        "A JSON object property name must be a string.",
                        name_token.range.clone(),
                    );
                    None
                }
            };
            let Some(name) = name else {
                break self.recover(TokenType::ObjectOpen, TokenType::ObjectClose);
            };

            let colon = self.read();
            match colon.ty {
                TokenType::Colon => {}
                TokenType::Equals => {
                    self.error(
                        "Missing property value colon",
                        "JSON uses a colon as its name/value delimiter, not an equals sign.",
                        colon.range,
                    );
                    break self.recover(TokenType::ObjectOpen, TokenType::ObjectClose);
                }
                _ => {
                    self.error(
                        "Missing property value colon",
                        "A colon must appear between an object property's name and its value.",
                        colon.range,
                    );
                    break self.recover(TokenType::ObjectOpen, TokenType::ObjectClose);
                }
            }

            let Some(value) = self.parse_value() else {
                break self.recover(TokenType::ObjectOpen, TokenType::ObjectClose);
            };
            properties.push(Property {
                name,
                value,
                name_range: name_token.range,
            });

            let separator = self.peek().clone();
            match separator.ty {
                TokenType::Comma => {
                    self.read();
                    if self.peek().ty == TokenType::ObjectClose {
                        self.error(
                            "Trailing comma in object",
                            "JSON does not permit a trailing comma after the final property in an object.",
                            separator.range,
                        );
                    }
                }
                TokenType::ObjectClose => {}
                TokenType::EOF => {
                    self.error(
                        "Unclosed object",
                        "No closing brace was found for this JSON object.",
                        open.range.clone(),
                    );
                    break self.read();
                }
                _ => {
                    self.error(
                        "Missing property separator comma",
                        "A comma must appear between each property definition in an object.",
                        separator.range,
                    );
                    break self.recover(TokenType::ObjectOpen, TokenType::ObjectClose);
                }
            }
        };

        Node::Object(Object {
            properties,
            src_range: range_between(&open.range, &close.range),
            open_range: open.range,
            close_range: close.range,
        })
    }

    fn parse_array(&mut self) -> Node {
        let open = self.read();
        let mut values = Vec::new();

        let close = loop {
            match self.peek().ty {
                TokenType::ArrayClose => break self.read(),
                TokenType::EOF => {
                    self.error(
                        "Unclosed array",
                        "No closing bracket was found for this JSON array.",
                        open.range.clone(),
                    );
                    break self.read();
                }
                _ => {}
            }

            let Some(value) = self.parse_value() else {
                break self.recover(TokenType::ArrayOpen, TokenType::ArrayClose);
            };
            values.push(value);

            let separator = self.peek().clone();
            match separator.ty {
                TokenType::Comma => {
                    self.read();
                    if self.peek().ty == TokenType::ArrayClose {
                        self.error(
                            "Trailing comma in array",
                            "JSON does not permit a trailing comma after the final value in an array.",
                            separator.range,
                        );
                    }
                }
                TokenType::ArrayClose => {}
                TokenType::EOF => {
                    self.error(
                        "Unclosed array",
                        "No closing bracket was found for this JSON array.",
                        open.range.clone(),
                    );
                    break self.read();
                }
                _ => {
                    self.error(
                        "Missing array element separator",
                        "A comma must appear between each value in an array.",
                        separator.range,
                    );
                    break self.recover(TokenType::ArrayOpen, TokenType::ArrayClose);
                }
            }
        };

        Node::Array(Array {
            values,
            src_range: range_between(&open.range, &close.range),
            open_range: open.range,
        })
    }

    /// Skips to the token that closes the container we are inside, and
    /// consumes it. Returns `EOF` if there is none.
    fn recover(&mut self, open: TokenType, close: TokenType) -> Token {
        let mut depth = 1usize;
        loop {
            let token = self.read();
            if token.ty == TokenType::EOF {
                return token;
            }
            if token.ty == open {
                depth += 1;
            } else if token.ty == close {
                depth -= 1;
                if depth == 0 {
                    return token;
                }
            }
        }
    }

    fn decode_string(&mut self, token: &Token) -> Option<String> {
        match serde_json::from_slice::<String>(&token.bytes) {
            Ok(value) => Some(value),
            Err(_) => {
                self.error(
                    "Invalid JSON string",
                    "There is a syntax error in the given JSON string.",
                    token.range.clone(),
                );
                None
            }
        }
    }

    fn parse_number(&mut self, token: Token) -> Option<Node> {
        // serde_json enforces the JSON number grammar, which is stricter
        // than what the decimal parser accepts. Its arbitrary precision
        // mode keeps it from rejecting numbers outside the f64 range.
        let valid = serde_json::from_slice::<serde_json::Number>(&token.bytes).is_ok();
        let value = std::str::from_utf8(&token.bytes)
            .ok()
            .filter(|_| valid)
            .and_then(parse_number);
        match value {
            Some(value) => Some(Node::Number {
                value,
                src_range: token.range,
            }),
            None => {
                self.error(
                    "Invalid JSON number",
                    "There is a syntax error in the given JSON number.",
                    token.range,
                );
                None
            }
        }
    }

    fn parse_keyword(&mut self, token: Token) -> Node {
        let word = String::from_utf8_lossy(&token.bytes).into_owned();
        let src_range = token.range;
        match word.as_str() {
            "true" => return Node::Bool {
                value: true,
                src_range,
            },
            "false" => return Node::Bool {
                value: false,
                src_range,
            },
            "null" => return Node::Null { src_range },
            "undefined" | "NaN" | "Infinity" => self.error(
                "Invalid JSON keyword",
                format!("The JavaScript identifier {word:?} cannot be used in JSON."),
                src_range.clone(),
            ),
            _ => {
                let suggestion = suggestion_sentence(&word, &KEYWORDS);
                self.error(
                    "Invalid JSON keyword",
                    format!("{word:?} is not a valid JSON keyword.{suggestion}"),
                    src_range.clone(),
                )
            }
        }
        Node::Null { src_range }
    }
}
