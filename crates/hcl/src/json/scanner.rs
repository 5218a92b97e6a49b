use crate::pos::{Pos, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    ObjectOpen,
    ObjectClose,
    ArrayOpen,
    ArrayClose,
    Colon,
    Comma,
    /// `=`, which is never valid but gets a dedicated message.
    Equals,
    String,
    Number,
    /// A run of letters: `true`, `false`, `null`, or a mistake.
    Keyword,
    Invalid,
    EOF,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub ty: TokenType,
    pub bytes: Vec<u8>,
    pub range: Range,
}

/// Splits a JSON document into tokens, ending with `EOF`.
pub fn scan(src: &[u8], filename: &str, start: Pos) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = start;
    let mut offset = 0;

    while offset < src.len() {
        let rest = &src[offset..];
        let whitespace = rest
            .iter()
            .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
            .count();
        if whitespace > 0 {
            pos = pos.advance(&rest[..whitespace]);
            offset += whitespace;
            continue;
        }

        let (ty, len) = match rest[0] {
            b'{' => (TokenType::ObjectOpen, 1),
            b'}' => (TokenType::ObjectClose, 1),
            b'[' => (TokenType::ArrayOpen, 1),
            b']' => (TokenType::ArrayClose, 1),
            b':' => (TokenType::Colon, 1),
            b',' => (TokenType::Comma, 1),
            b'=' => (TokenType::Equals, 1),
            b'"' => (TokenType::String, string_len(rest)),
            b'-' | b'0'..=b'9' => (TokenType::Number, number_len(rest)),
            b if b.is_ascii_alphabetic() => (
                TokenType::Keyword,
                rest.iter().take_while(|b| b.is_ascii_alphabetic()).count(),
            ),
            _ => (TokenType::Invalid, char_len(rest)),
        };

        let bytes = &rest[..len];
        let end = pos.advance(bytes);
        tokens.push(Token {
            ty,
            bytes: bytes.to_vec(),
            range: Range::new(filename, pos, end),
        });
        pos = end;
        offset += len;
    }

    tokens.push(Token {
        ty: TokenType::EOF,
        bytes: Vec::new(),
        range: Range::point(filename, pos),
    });
    tokens
}

/// Length of a string token including both quotes. An unterminated string
/// runs to the end of input.
fn string_len(src: &[u8]) -> usize {
    let mut i = 1;
    while i < src.len() {
        match src[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    src.len()
}

fn number_len(src: &[u8]) -> usize {
    1 + src[1..]
        .iter()
        .take_while(|b| matches!(b, b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-'))
        .count()
}

fn char_len(src: &[u8]) -> usize {
    match src[0] {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
    .min(src.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(src: &str) -> Vec<TokenType> {
        scan(src.as_bytes(), "test.json", Pos::INITIAL)
            .into_iter()
            .map(|token| token.ty)
            .collect()
    }

    #[test]
    fn punctuation_and_scalars() {
        use TokenType::*;
        assert_eq!(
            types(r#"{"a": [1, -2.5e3, true, null]}"#),
            vec![
                ObjectOpen, String, Colon, ArrayOpen, Number, Comma, Number, Comma, Keyword,
                Comma, Keyword, ArrayClose, ObjectClose, EOF
            ]
        );
    }

    #[test]
    fn escaped_quote_stays_in_string() {
        let tokens = scan(br#""a\"b" x"#, "test.json", Pos::INITIAL);
        assert_eq!(tokens[0].bytes, br#""a\"b""#.to_vec());
        assert_eq!(tokens[1].ty, TokenType::Keyword);
    }

    #[test]
    fn ranges_track_lines() {
        let tokens = scan(b"{\n  \"a\": 1\n}", "test.json", Pos::INITIAL);
        let a = &tokens[1];
        assert_eq!(a.range.start.line, 2);
        assert_eq!(a.range.start.column, 3);
        assert_eq!(a.range.start.byte, 4);
        assert_eq!(tokens.last().map(|t| t.range.start.line), Some(3));
    }

    #[test]
    fn invalid_bytes_become_tokens() {
        assert_eq!(types("@ ="), vec![TokenType::Invalid, TokenType::Equals, TokenType::EOF]);
    }
}
