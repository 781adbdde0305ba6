// Mylox compiler token definitions
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-03-02: Initial version
//      26-03-03: Tokens now carry lexeme and line, the compiler needs both for errors

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // 词法错误，lexeme 就是错误信息
    Errno,

    Eof,

    Ident,
    NumLit,
    StrLit,

    Assign,

    Plus,
    Minus,
    Asterisk,
    Slash,
    Bang,

    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,

    LParen,
    RParen,
    LBrace,
    RBrace,

    Comma,
    Dot,
    Semicolon,

    KwAnd,
    KwClass,
    KwElse,
    KwFalse,
    KwFor,
    KwFun,
    KwIf,
    KwNil,
    KwOr,
    KwPrint,
    KwReturn,
    KwSuper,
    KwThis,
    KwTrue,
    KwVar,
    KwWhile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, line: usize) -> Token {
        return Token { kind, lexeme, line };
    }
}
