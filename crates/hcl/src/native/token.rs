use std::fmt;

use serde::Serialize;

use crate::pos::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenType {
    OBrace,
    CBrace,
    OBrack,
    CBrack,
    OParen,
    CParen,
    OQuote,
    CQuote,
    OHeredoc,
    CHeredoc,

    Star,
    Slash,
    Plus,
    Minus,
    Percent,

    Equal,
    EqualOp,
    NotEqual,
    LessThan,
    LessThanEq,
    GreaterThan,
    GreaterThanEq,

    And,
    Or,
    Bang,

    Dot,
    Comma,
    Ellipsis,
    FatArrow,
    Question,
    Colon,

    /// `${` or `${~`.
    TemplateInterp,
    /// `%{` or `%{~`.
    TemplateControl,
    /// `}` or `~}` closing an interpolation or directive.
    TemplateSeqEnd,

    /// Literal text inside a quoted template.
    QuotedLit,
    /// Literal text inside a heredoc or bare template.
    StringLit,
    NumberLit,
    Ident,

    Comment,
    Newline,
    EOF,

    // Tokens below are never valid; the scanner produces them so that
    // the problem can be reported precisely.
    BitwiseAnd,
    BitwiseOr,
    BitwiseNot,
    BitwiseXor,
    Apostrophe,
    Backtick,
    Semicolon,
    /// A newline inside a quoted template.
    QuotedNewline,
    Invalid,
    BadUTF8,
}

impl TokenType {
    /// How the token type reads in "expected X" messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenType::OBrace => "\"{\"",
            TokenType::CBrace => "\"}\"",
            TokenType::OBrack => "\"[\"",
            TokenType::CBrack => "\"]\"",
            TokenType::OParen => "\"(\"",
            TokenType::CParen => "\")\"",
            TokenType::OQuote | TokenType::CQuote => "quote",
            TokenType::OHeredoc => "heredoc start",
            TokenType::CHeredoc => "heredoc end",
            TokenType::Star => "\"*\"",
            TokenType::Slash => "\"/\"",
            TokenType::Plus => "\"+\"",
            TokenType::Minus => "\"-\"",
            TokenType::Percent => "\"%\"",
            TokenType::Equal => "\"=\"",
            TokenType::EqualOp => "\"==\"",
            TokenType::NotEqual => "\"!=\"",
            TokenType::LessThan => "\"<\"",
            TokenType::LessThanEq => "\"<=\"",
            TokenType::GreaterThan => "\">\"",
            TokenType::GreaterThanEq => "\">=\"",
            TokenType::And => "\"&&\"",
            TokenType::Or => "\"||\"",
            TokenType::Bang => "\"!\"",
            TokenType::Dot => "\".\"",
            TokenType::Comma => "\",\"",
            TokenType::Ellipsis => "\"...\"",
            TokenType::FatArrow => "\"=>\"",
            TokenType::Question => "\"?\"",
            TokenType::Colon => "\":\"",
            TokenType::TemplateInterp => "\"${\"",
            TokenType::TemplateControl => "\"%{\"",
            TokenType::TemplateSeqEnd => "end of template sequence",
            TokenType::QuotedLit | TokenType::StringLit => "string",
            TokenType::NumberLit => "number",
            TokenType::Ident => "identifier",
            TokenType::Comment => "comment",
            TokenType::Newline => "newline",
            TokenType::EOF => "end of file",
            TokenType::BitwiseAnd => "\"&\"",
            TokenType::BitwiseOr => "\"|\"",
            TokenType::BitwiseNot => "\"~\"",
            TokenType::BitwiseXor => "\"^\"",
            TokenType::Apostrophe => "\"'\"",
            TokenType::Backtick => "\"`\"",
            TokenType::Semicolon => "\";\"",
            TokenType::QuotedNewline => "newline",
            TokenType::Invalid => "invalid character",
            TokenType::BadUTF8 => "invalid UTF-8",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    #[serde(rename = "type")]
    pub ty: TokenType,
    pub bytes: Vec<u8>,
    pub range: Range,
}

impl Token {
    pub fn new(ty: TokenType, bytes: &[u8], range: Range) -> Self {
        Self {
            ty,
            bytes: bytes.to_vec(),
            range,
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// True for `${~` and `%{~`.
    pub fn trims_left_side(&self) -> bool {
        matches!(self.ty, TokenType::TemplateInterp | TokenType::TemplateControl)
            && self.bytes.ends_with(b"~")
    }

    /// True for `~}`.
    pub fn trims_right_side(&self) -> bool {
        self.ty == TokenType::TemplateSeqEnd && self.bytes.starts_with(b"~")
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?}) at {}", self.ty, self.text(), self.range)
    }
}

pub type Tokens = Vec<Token>;
