use crate::pos::Range;

use super::token::{Token, TokenType, Tokens};

/// Single-token lookahead over a token stream.
///
/// Comments are always skipped. Whether newlines are skipped depends on
/// the innermost entry of a mode stack: they separate items in a body but
/// are insignificant inside brackets.
pub(crate) struct Peeker {
    tokens: Tokens,
    next_index: usize,
    include_newlines: Vec<bool>,
}

impl Peeker {
    pub fn new(tokens: Tokens, include_newlines: bool) -> Self {
        let mut tokens = tokens;
        if tokens.last().map(|token| token.ty) != Some(TokenType::EOF) {
            let end = tokens
                .last()
                .map(|token| token.range.end_point())
                .unwrap_or_default();
            tokens.push(Token::new(TokenType::EOF, &[], end));
        }
        Self {
            tokens,
            next_index: 0,
            include_newlines: vec![include_newlines],
        }
    }

    fn including_newlines(&self) -> bool {
        self.include_newlines.last().copied().unwrap_or(true)
    }

    fn next_token(&self) -> (usize, usize) {
        let mut i = self.next_index;
        while i < self.tokens.len() {
            match self.tokens[i].ty {
                TokenType::Comment => {}
                TokenType::Newline if !self.including_newlines() => {}
                _ => return (i, i + 1),
            }
            i += 1;
        }
        (self.tokens.len() - 1, self.tokens.len())
    }

    pub fn peek(&self) -> &Token {
        let (index, _) = self.next_token();
        &self.tokens[index]
    }

    pub fn read(&mut self) -> Token {
        let (index, next) = self.next_token();
        self.next_index = next;
        self.tokens[index].clone()
    }

    /// The range of the most recently read token.
    pub fn prev_range(&self) -> Range {
        let index = self.next_index.saturating_sub(1).min(self.tokens.len() - 1);
        self.tokens[index].range.clone()
    }

    pub fn push_include_newlines(&mut self, include: bool) {
        self.include_newlines.push(include);
    }

    pub fn pop_include_newlines(&mut self) -> bool {
        if self.include_newlines.len() > 1 {
            self.include_newlines.pop().unwrap_or(true)
        } else {
            self.including_newlines()
        }
    }

    /// Reads tokens until the one closing the innermost open bracket of
    /// kind `end`, which is consumed too.
    pub fn recover(&mut self, end: TokenType) -> Token {
        let mut nest = 0usize;
        loop {
            let token = self.read();
            match token.ty {
                TokenType::EOF => return token,
                ty if ty == end && nest == 0 => return token,
                ty if ty == end => nest -= 1,
                ty if opens(ty, end) => nest += 1,
                _ => {}
            }
        }
    }

    /// Skips to the start of the next body item: past the end of the
    /// current line at bracket depth zero.
    pub fn recover_after_body_item(&mut self) {
        self.push_include_newlines(true);
        let mut stack: Vec<TokenType> = Vec::new();
        loop {
            let token = self.read();
            match token.ty {
                TokenType::EOF => break,
                TokenType::Newline if stack.is_empty() => break,
                TokenType::OBrace | TokenType::OBrack | TokenType::OParen => stack.push(token.ty),
                TokenType::CBrace | TokenType::CBrack | TokenType::CParen => {
                    let expected = opening_bracket(token.ty);
                    while let Some(open) = stack.pop() {
                        if Some(open) == expected {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
        self.pop_include_newlines();
    }
}

/// True if `ty` opens a nested construct closed by `close`.
fn opens(ty: TokenType, close: TokenType) -> bool {
    match close {
        TokenType::TemplateSeqEnd => {
            matches!(ty, TokenType::TemplateInterp | TokenType::TemplateControl)
        }
        _ => opening_bracket(close) == Some(ty),
    }
}

fn opening_bracket(close: TokenType) -> Option<TokenType> {
    Some(match close {
        TokenType::CBrace => TokenType::OBrace,
        TokenType::CBrack => TokenType::OBrack,
        TokenType::CParen => TokenType::OParen,
        TokenType::CQuote => TokenType::OQuote,
        TokenType::CHeredoc => TokenType::OHeredoc,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::scanner::{scan_tokens, ScanMode};
    use crate::pos::Pos;

    fn peeker(src: &str, newlines: bool) -> Peeker {
        Peeker::new(
            scan_tokens(src.as_bytes(), "t", Pos::INITIAL, ScanMode::Normal),
            newlines,
        )
    }

    #[test]
    fn skips_comments_and_optionally_newlines() {
        let mut p = peeker("a # note\nb", true);
        assert_eq!(p.read().ty, TokenType::Ident);
        assert_eq!(p.read().ty, TokenType::Newline);
        assert_eq!(p.read().ty, TokenType::Ident);
        assert_eq!(p.read().ty, TokenType::EOF);
        assert_eq!(p.read().ty, TokenType::EOF);

        let mut p = peeker("a\nb", false);
        p.read();
        assert_eq!(p.peek().ty, TokenType::Ident);
    }

    #[test]
    fn recover_skips_nested_brackets() {
        let mut p = peeker("[a, [b], c] d", false);
        p.read();
        let closer = p.recover(TokenType::CBrack);
        assert_eq!(closer.ty, TokenType::CBrack);
        assert_eq!(p.read().text(), "d");
    }

    #[test]
    fn recover_counts_nested_template_sequences() {
        let mut p = peeker(r#""${a "${b}" c} d""#, false);
        assert_eq!(p.read().ty, TokenType::OQuote);
        assert_eq!(p.read().ty, TokenType::TemplateInterp);
        let closer = p.recover(TokenType::TemplateSeqEnd);
        assert_eq!(closer.ty, TokenType::TemplateSeqEnd);
        let rest = p.read();
        assert_eq!(rest.ty, TokenType::QuotedLit);
        assert_eq!(rest.text(), " d");
    }

    #[test]
    fn recover_after_body_item_stops_at_newline() {
        let mut p = peeker("x = [\n1\n] junk\ny = 2", true);
        p.recover_after_body_item();
        assert_eq!(p.read().text(), "y");
    }
}
