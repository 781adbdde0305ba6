// Mylox compiler expression parsing (Pratt)
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-03-06: Initial version, precedence table keyed by token kind
//      26-03-09: and/or short-circuit jumps
//      26-03-12: Calls and argument lists
//      26-03-17: Property access, method invoke fusion, this

use crate::common::object::LoxValue;
use crate::common::opcode::OpCode;
use crate::frontend::compiler::{Compiler, MAX_ARITY};
use crate::frontend::lexer::token::TokenKind;

/// 优先级从低到高，parse_precedence 只接受不低于给定级别的中缀运算符
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Primary,
            Precedence::Primary => Precedence::Primary,
        }
    }
}

/// can_assign 只在 Assignment 及以下的优先级为真，
/// 挡住 a * b = c 这类非法赋值目标
type ParseFn = fn(&mut Compiler<'_>, bool);

pub struct ParseRule {
    pub prefix: Option<ParseFn>,
    pub infix: Option<ParseFn>,
    pub precedence: Precedence,
}

fn rule(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> ParseRule {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

pub fn get_rule(kind: TokenKind) -> ParseRule {
    use Precedence as P;
    use TokenKind as T;
    match kind {
        T::LParen => rule(Some(parse_grouping), Some(parse_call), P::Call),
        T::Dot => rule(None, Some(parse_dot), P::Call),
        T::Minus => rule(Some(parse_unary), Some(parse_binary), P::Term),
        T::Plus => rule(None, Some(parse_binary), P::Term),
        T::Slash | T::Asterisk => rule(None, Some(parse_binary), P::Factor),
        T::Bang => rule(Some(parse_unary), None, P::None),
        T::Eq | T::Neq => rule(None, Some(parse_binary), P::Equality),
        T::Gt | T::Geq | T::Lt | T::Leq => rule(None, Some(parse_binary), P::Comparison),
        T::Ident => rule(Some(parse_variable), None, P::None),
        T::StrLit => rule(Some(parse_string), None, P::None),
        T::NumLit => rule(Some(parse_number), None, P::None),
        T::KwAnd => rule(None, Some(parse_and), P::And),
        T::KwOr => rule(None, Some(parse_or), P::Or),
        T::KwNil | T::KwTrue | T::KwFalse => rule(Some(parse_literal), None, P::None),
        T::KwThis => rule(Some(parse_this), None, P::None),
        _ => rule(None, None, P::None),
    }
}

impl Compiler<'_> {
    pub(crate) fn parse_expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    /// Pratt 主循环：先走前缀规则，再在优先级允许的范围内吃中缀
    pub(crate) fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix = get_rule(self.previous.kind).prefix;
        let prefix_fn = match prefix {
            Some(f) => f,
            None => {
                self.error("Expect expression.");
                return;
            }
        };

        let can_assign = precedence <= Precedence::Assignment;
        prefix_fn(self, can_assign);

        while precedence <= get_rule(self.current.kind).precedence {
            self.advance();
            let infix_fn = get_rule(self.previous.kind).infix.unwrap();
            infix_fn(self, can_assign);
        }

        // 前缀和中缀都没消费掉 =，说明左边不是合法的赋值目标
        if can_assign && self.match_token(TokenKind::Assign) {
            self.error("Invalid assignment target.");
        }
    }

    fn parse_argument_list(&mut self) -> u8 {
        let mut argc: usize = 0;
        if !self.check(TokenKind::RParen) {
            loop {
                self.parse_expression();
                if argc == MAX_ARITY {
                    self.error("Can't have more than 255 arguments.");
                }
                argc += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "Expect ')' after arguments.");
        argc as u8
    }
}

fn parse_number(c: &mut Compiler<'_>, _can_assign: bool) {
    let value: f64 = c.previous.lexeme.parse().unwrap_or(0.0);
    c.emit_constant(LoxValue::Number(value));
}

fn parse_string(c: &mut Compiler<'_>, _can_assign: bool) {
    let content = c.previous.lexeme.clone();
    let ptr = match c.heap.alloc_string(content) {
        Some(ptr) => ptr,
        None => {
            c.error("Out of memory.");
            return;
        }
    };
    c.emit_constant(LoxValue::Str(ptr));
}

fn parse_literal(c: &mut Compiler<'_>, _can_assign: bool) {
    match c.previous.kind {
        TokenKind::KwNil => c.emit_op(OpCode::Nil),
        TokenKind::KwTrue => c.emit_op(OpCode::True),
        TokenKind::KwFalse => c.emit_op(OpCode::False),
        _ => unreachable!(),
    }
}

fn parse_grouping(c: &mut Compiler<'_>, _can_assign: bool) {
    c.parse_expression();
    c.consume(TokenKind::RParen, "Expect ')' after expression.");
}

fn parse_unary(c: &mut Compiler<'_>, _can_assign: bool) {
    let op_kind = c.previous.kind;
    // 操作数的优先级是 Unary，-a.b 会先取属性再取负
    c.parse_precedence(Precedence::Unary);
    match op_kind {
        TokenKind::Minus => c.emit_op(OpCode::Negate),
        TokenKind::Bang => c.emit_op(OpCode::Not),
        _ => unreachable!(),
    }
}

fn parse_binary(c: &mut Compiler<'_>, _can_assign: bool) {
    let op_kind = c.previous.kind;
    let precedence = get_rule(op_kind).precedence;
    // 左结合：右操作数只收更高一级的优先级
    c.parse_precedence(precedence.next());

    match op_kind {
        TokenKind::Plus => c.emit_op(OpCode::Add),
        TokenKind::Minus => c.emit_op(OpCode::Subtract),
        TokenKind::Asterisk => c.emit_op(OpCode::Multiply),
        TokenKind::Slash => c.emit_op(OpCode::Divide),
        TokenKind::Eq => c.emit_op(OpCode::Equal),
        TokenKind::Neq => {
            c.emit_op(OpCode::Equal);
            c.emit_op(OpCode::Not);
        }
        TokenKind::Gt => c.emit_op(OpCode::Greater),
        TokenKind::Geq => {
            c.emit_op(OpCode::Less);
            c.emit_op(OpCode::Not);
        }
        TokenKind::Lt => c.emit_op(OpCode::Less),
        TokenKind::Leq => {
            c.emit_op(OpCode::Greater);
            c.emit_op(OpCode::Not);
        }
        _ => unreachable!(),
    }
}

/// and：左边为假直接短路，为真就丢掉左值去算右边
fn parse_and(c: &mut Compiler<'_>, _can_assign: bool) {
    let end_jump = c.emit_jump(OpCode::JumpIfFalse);
    c.emit_op(OpCode::Pop);
    c.parse_precedence(Precedence::And);
    c.patch_jump(end_jump);
}

/// or：左边为假跳去算右边，为真跳过右边保留左值
fn parse_or(c: &mut Compiler<'_>, _can_assign: bool) {
    let else_jump = c.emit_jump(OpCode::JumpIfFalse);
    let end_jump = c.emit_jump(OpCode::Jump);
    c.patch_jump(else_jump);
    c.emit_op(OpCode::Pop);
    c.parse_precedence(Precedence::Or);
    c.patch_jump(end_jump);
}

fn parse_variable(c: &mut Compiler<'_>, can_assign: bool) {
    let name = c.previous.lexeme.clone();
    c.named_variable(&name, can_assign);
}

fn parse_call(c: &mut Compiler<'_>, _can_assign: bool) {
    let argc = c.parse_argument_list();
    c.emit_op_byte(OpCode::Call, argc);
}

fn parse_dot(c: &mut Compiler<'_>, can_assign: bool) {
    c.consume(TokenKind::Ident, "Expect property name after '.'.");
    let name = c.previous.lexeme.clone();
    let name_idx = c.identifier_constant(&name);

    if can_assign && c.match_token(TokenKind::Assign) {
        c.parse_expression();
        c.emit_op_byte(OpCode::SetProperty, name_idx);
    } else if c.match_token(TokenKind::LParen) {
        // obj.m(args) 融合成一条 Invoke，省掉中间的 BoundMethod
        let argc = c.parse_argument_list();
        c.emit_op_byte(OpCode::Invoke, name_idx);
        c.emit_byte(argc);
    } else {
        c.emit_op_byte(OpCode::GetProperty, name_idx);
    }
}

fn parse_this(c: &mut Compiler<'_>, _can_assign: bool) {
    if c.class_stack.is_empty() {
        c.error("Can't use 'this' outside of a class.");
        return;
    }
    // this 就是 0 号局部变量，按普通变量读，禁止赋值
    parse_variable(c, false);
}
