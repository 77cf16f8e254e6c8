use crate::language::span::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Number(i64),
    String(String),

    Class,
    Def,
    Return,
    If,
    Else,
    Print,
    And,
    Or,
    Not,
    None,
    True,
    False,

    Eq,
    EqEq,
    BangEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,

    Newline,
    Indent,
    Dedent,
    Eof,
}
