// Mylox compiler lexical analyzer
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-03-02: Initial version, reworked from the Myula lexer for Lox tokens
//      26-03-03: Track line numbers, multi-line strings bump the counter
//      26-03-05: Lexical errors are Errno tokens now instead of a side list,
//                the compiler reports them at the right place in the stream

pub mod token;

use crate::frontend::lexer::token::{Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
}

impl Lexer<'_> {
    pub fn new(input: &'_ str) -> Lexer<'_> {
        return Lexer {
            input: input,
            pos: 0,
            line: 1,
        };
    }

    fn is_eof(&self) -> bool {
        return self.pos >= self.input.len();
    }

    fn peek_char(&self) -> Option<char> {
        if self.is_eof() {
            None
        } else {
            Some(self.input.as_bytes()[self.pos] as char)
        }
    }

    fn peek_next_char(&self) -> Option<char> {
        if self.pos + 1 >= self.input.len() {
            None
        } else {
            Some(self.input.as_bytes()[self.pos + 1] as char)
        }
    }

    fn advance(&mut self) -> Option<char> {
        if self.is_eof() {
            None
        } else {
            let c = self.input.as_bytes()[self.pos] as char;
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
            }
            Some(c)
        }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next_char() == Some('/') => {
                    // 单行注释，吃到行尾
                    while !self.is_eof() && self.peek_char() != Some('\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn make_token(&self, kind: TokenKind, lexeme: &str) -> Token {
        return Token::new(kind, lexeme.to_string(), self.line);
    }

    fn num_literal(&mut self) -> Token {
        let begin_pos = self.pos;
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        // fractional，小数点后面必须跟数字
        if self.peek_char() == Some('.')
            && matches!(self.peek_next_char(), Some(c) if c.is_ascii_digit())
        {
            self.advance(); // consume '.'
            while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num_str = &self.input[begin_pos..self.pos];
        return self.make_token(TokenKind::NumLit, num_str);
    }

    fn str_literal(&mut self) -> Token {
        self.advance(); // consume opening '"'
        let begin_pos = self.pos;
        while !self.is_eof() {
            // 没有转义序列；字符串可以跨行，advance 会更新行号
            let c = self.advance().unwrap();
            if c == '"' {
                let str_lit = &self.input[begin_pos..self.pos - 1];
                return self.make_token(TokenKind::StrLit, str_lit);
            }
        }
        return self.make_token(TokenKind::Errno, "Unterminated string.");
    }

    fn is_keyword(s: &str) -> Option<TokenKind> {
        match s {
            "and" => Some(TokenKind::KwAnd),
            "class" => Some(TokenKind::KwClass),
            "else" => Some(TokenKind::KwElse),
            "false" => Some(TokenKind::KwFalse),
            "for" => Some(TokenKind::KwFor),
            "fun" => Some(TokenKind::KwFun),
            "if" => Some(TokenKind::KwIf),
            "nil" => Some(TokenKind::KwNil),
            "or" => Some(TokenKind::KwOr),
            "print" => Some(TokenKind::KwPrint),
            "return" => Some(TokenKind::KwReturn),
            "super" => Some(TokenKind::KwSuper),
            "this" => Some(TokenKind::KwThis),
            "true" => Some(TokenKind::KwTrue),
            "var" => Some(TokenKind::KwVar),
            "while" => Some(TokenKind::KwWhile),
            _ => None,
        }
    }

    fn ident_or_keyword(&mut self) -> Token {
        let begin_pos = self.pos;
        while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let ident_str = &self.input[begin_pos..self.pos];
        if let Some(kw_kind) = Lexer::is_keyword(ident_str) {
            return self.make_token(kw_kind, ident_str);
        } else {
            return self.make_token(TokenKind::Ident, ident_str);
        }
    }

    fn double_char_op(
        &mut self,
        second: char,
        double_kind: TokenKind,
        single_kind: TokenKind,
        double_lexeme: &str,
        single_lexeme: &str,
    ) -> Token {
        // already consumed first char
        if self.peek_char() == Some(second) {
            self.advance(); // consume second char
            return self.make_token(double_kind, double_lexeme);
        } else {
            return self.make_token(single_kind, single_lexeme);
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_ws_and_comments();

        if self.is_eof() {
            return self.make_token(TokenKind::Eof, "");
        }

        let c = self.peek_char();
        match c {
            Some(ch) if ch.is_ascii_digit() => self.num_literal(),
            Some('"') => self.str_literal(),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => self.ident_or_keyword(),
            _ => match self.advance() {
                Some(chr) => match chr {
                    '+' => self.make_token(TokenKind::Plus, "+"),
                    '-' => self.make_token(TokenKind::Minus, "-"),
                    '*' => self.make_token(TokenKind::Asterisk, "*"),
                    '/' => self.make_token(TokenKind::Slash, "/"),
                    '=' => self.double_char_op('=', TokenKind::Eq, TokenKind::Assign, "==", "="),
                    '!' => self.double_char_op('=', TokenKind::Neq, TokenKind::Bang, "!=", "!"),
                    '<' => self.double_char_op('=', TokenKind::Leq, TokenKind::Lt, "<=", "<"),
                    '>' => self.double_char_op('=', TokenKind::Geq, TokenKind::Gt, ">=", ">"),
                    '(' => self.make_token(TokenKind::LParen, "("),
                    ')' => self.make_token(TokenKind::RParen, ")"),
                    '{' => self.make_token(TokenKind::LBrace, "{"),
                    '}' => self.make_token(TokenKind::RBrace, "}"),
                    ',' => self.make_token(TokenKind::Comma, ","),
                    '.' => self.make_token(TokenKind::Dot, "."),
                    ';' => self.make_token(TokenKind::Semicolon, ";"),
                    other => {
                        let msg = format!("Unexpected character '{}'.", other);
                        return Token::new(TokenKind::Errno, msg, self.line);
                    }
                },
                None => {
                    // should not reach here
                    unreachable!()
                }
            },
        }
    }
}
