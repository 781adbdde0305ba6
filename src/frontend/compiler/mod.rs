// Mylox bytecode compiler
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-03-06: Initial version. Single pass this time: no AST, no IR, the parser
//                emits bytes into the current function's chunk as it goes
//      26-03-08: Scope tracking, local slots mirror the runtime frame layout
//      26-03-10: Nested function compilers, upvalue resolution walks the chain
//      26-03-14: Panic mode recovery, keep parsing to EOF and report everything
//      26-03-17: Class bodies, methods, this
//
// 布局约定：locals[i] 对应运行时 stack[frame.base + i]，编译期和运行期必须
// 严格一致。每个函数的 0 号槽保留：方法里是 this，普通函数里是被调用者自己。

pub mod expression;
pub mod statement;

use crate::backend::vm::LogLevel;
use crate::backend::vm::debug;
use crate::backend::vm::heap::Heap;
use crate::common::chunk::Chunk;
use crate::common::object::{GCObject, LFunction, LoxValue};
use crate::common::opcode::OpCode;
use crate::frontend::lexer::Lexer;
use crate::frontend::lexer::token::{Token, TokenKind};
use std::collections::HashMap;
use thiserror::Error;

pub const MAX_LOCALS: usize = 256;
pub const MAX_UPVALUES: usize = 256;
pub const MAX_CONSTANTS: usize = 256;
pub const MAX_ARITY: usize = 255;

#[derive(Debug, Clone, Error)]
#[error("[line {line}] Error{location}: {message}")]
pub struct CompileError {
    pub line: usize,
    /// " at 'lexeme'"、" at end"，词法错误则为空
    pub location: String,
    pub message: String,
}

/// 一次编译收集到的全部错误，恐慌模式只抑制同一条语句里的连锁报告
#[derive(Debug, Clone)]
pub struct CompileErrors(pub Vec<CompileError>);

impl std::fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Script,
    Function,
    Method,
    Initializer,
}

pub struct Local {
    pub name: String,
    /// -1 表示声明了但初始化式还没跑完，这时读它是编译错误
    pub depth: i32,
    pub is_captured: bool,
}

/// Closure 指令后面跟的 (is_local, index) 对
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpvalueRef {
    pub index: u8,
    pub is_local: bool,
}

/// 每个正在编译的函数一份，嵌套函数在栈上叠起来
pub struct FunctionCompiler {
    pub function: LFunction,
    pub kind: FunctionKind,
    pub locals: Vec<Local>,
    pub upvalues: Vec<UpvalueRef>,
    pub scope_depth: i32,
    /// 同名标识符常量去重，全局名、属性名走这里
    ident_constants: HashMap<String, u8>,
}

impl FunctionCompiler {
    fn new(kind: FunctionKind, name: Option<String>) -> FunctionCompiler {
        let mut locals = Vec::new();
        // 0 号槽：方法是 this，其他函数是被调用者，给个空名占住
        let slot_zero = match kind {
            FunctionKind::Method | FunctionKind::Initializer => "this",
            _ => "",
        };
        locals.push(Local {
            name: slot_zero.to_string(),
            depth: 0,
            is_captured: false,
        });
        FunctionCompiler {
            function: LFunction {
                arity: 0,
                upvalue_count: 0,
                chunk: Chunk::new(),
                name,
            },
            kind,
            locals,
            upvalues: Vec::new(),
            scope_depth: 0,
            ident_constants: HashMap::new(),
        }
    }
}

/// 标记当前在 class 体内，this 的合法性靠它判断
struct ClassCompiler;

pub struct Compiler<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
    errors: Vec<CompileError>,
    panic_mode: bool,
    func_stack: Vec<FunctionCompiler>,
    class_stack: Vec<ClassCompiler>,
    heap: &'a mut Heap,
    log_level: LogLevel,
}

/// 整个编译入口：成功返回顶层脚本函数（挂在堆上），失败返回全部错误
pub fn compile<'a>(
    source: &'a str,
    heap: &'a mut Heap,
    log_level: LogLevel,
) -> Result<*mut GCObject<LFunction>, CompileErrors> {
    let mut compiler = Compiler::new(source, heap, log_level);
    compiler.advance();
    while !compiler.match_token(TokenKind::Eof) {
        compiler.parse_declaration();
    }
    let (script, _) = compiler.end_compiler();
    if compiler.errors.is_empty() {
        Ok(script)
    } else {
        Err(CompileErrors(compiler.errors))
    }
}

impl<'a> Compiler<'a> {
    fn new(source: &'a str, heap: &'a mut Heap, log_level: LogLevel) -> Compiler<'a> {
        let placeholder = Token::new(TokenKind::Eof, String::new(), 0);
        Compiler {
            lexer: Lexer::new(source),
            current: placeholder.clone(),
            previous: placeholder,
            errors: Vec::new(),
            panic_mode: false,
            func_stack: vec![FunctionCompiler::new(FunctionKind::Script, None)],
            class_stack: Vec::new(),
            heap,
            log_level,
        }
    }

    /* ---------- token 流 ---------- */

    fn advance(&mut self) {
        self.previous = std::mem::replace(
            &mut self.current,
            Token::new(TokenKind::Eof, String::new(), 0),
        );
        loop {
            self.current = self.lexer.next_token();
            if self.current.kind != TokenKind::Errno {
                break;
            }
            // 词法错误的信息就在 lexeme 里
            let msg = self.current.lexeme.clone();
            self.error_at_current(&msg);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        return self.current.kind == kind;
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        return true;
    }

    /* ---------- 错误报告 ---------- */

    fn error_at(&mut self, token: &Token, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;

        let location = match token.kind {
            TokenKind::Eof => " at end".to_string(),
            TokenKind::Errno => String::new(),
            _ => format!(" at '{}'", token.lexeme),
        };
        self.errors.push(CompileError {
            line: token.line,
            location,
            message: message.to_string(),
        });
    }

    pub(crate) fn error(&mut self, message: &str) {
        let token = self.previous.clone();
        self.error_at(&token, message);
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.current.clone();
        self.error_at(&token, message);
    }

    /// 跳到下一个语句边界，恐慌模式到这里解除
    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::KwClass
                | TokenKind::KwFun
                | TokenKind::KwVar
                | TokenKind::KwFor
                | TokenKind::KwIf
                | TokenKind::KwWhile
                | TokenKind::KwPrint
                | TokenKind::KwReturn => return,
                _ => {}
            }
            self.advance();
        }
    }

    /* ---------- 字节发射 ---------- */

    fn current_func(&mut self) -> &mut FunctionCompiler {
        self.func_stack.last_mut().unwrap()
    }

    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.current_func().function.chunk
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.current_chunk().write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    fn emit_op_byte(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    fn emit_return(&mut self) {
        // init 方法隐式返回 this（0 号槽），其他函数隐式返回 nil
        if self.current_func().kind == FunctionKind::Initializer {
            self.emit_op_byte(OpCode::GetLocal, 0);
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.emit_op(OpCode::Return);
    }

    fn make_constant(&mut self, value: LoxValue) -> u8 {
        let idx = self.current_chunk().add_constant(value);
        if idx >= MAX_CONSTANTS {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        idx as u8
    }

    fn emit_constant(&mut self, value: LoxValue) {
        let idx = self.make_constant(value);
        self.emit_op_byte(OpCode::Constant, idx);
    }

    /// 把标识符驻留成字符串常量，同一个 chunk 里同名只占一个下标
    fn identifier_constant(&mut self, name: &str) -> u8 {
        if let Some(&idx) = self.current_func().ident_constants.get(name) {
            return idx;
        }
        // 触到硬内存上限就报编译错误，跟常量池打满一个待遇
        let ptr = match self.heap.alloc_string(name.to_string()) {
            Some(ptr) => ptr,
            None => {
                self.error("Out of memory.");
                return 0;
            }
        };
        let idx = self.make_constant(LoxValue::Str(ptr));
        self.current_func()
            .ident_constants
            .insert(name.to_string(), idx);
        idx
    }

    /* ---------- 跳转回填 ---------- */

    /// 发射一条前向跳转，偏移先占两个字节，返回占位处的偏移
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.current_chunk().code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        // -2 是跳过操作数本身
        let jump = self.current_chunk().code.len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        let code = &mut self.current_chunk().code;
        code[offset] = ((jump >> 8) & 0xff) as u8;
        code[offset + 1] = (jump & 0xff) as u8;
    }

    /// 无条件回跳，offset 是正数，运行时从 ip 里减掉
    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        let offset = self.current_chunk().code.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }
        self.emit_byte(((offset >> 8) & 0xff) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    /* ---------- 作用域与绑定 ---------- */

    fn begin_scope(&mut self) {
        self.current_func().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.current_func().scope_depth -= 1;
        loop {
            let (out_of_scope, captured) = {
                let func = self.func_stack.last().unwrap();
                match func.locals.last() {
                    Some(local) => (local.depth > func.scope_depth, local.is_captured),
                    None => (false, false),
                }
            };
            if !out_of_scope {
                break;
            }
            // 被捕获的局部变量出作用域时要先关闭对应 upvalue
            if captured {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
            self.current_func().locals.pop();
        }
    }

    fn add_local(&mut self, name: &str) {
        if self.current_func().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.current_func().locals.push(Local {
            name: name.to_string(),
            depth: -1,
            is_captured: false,
        });
    }

    /// 局部作用域里声明一个名字；同层重名是错误，深一层的遮蔽是合法的
    fn declare_variable(&mut self) {
        if self.current_func().scope_depth == 0 {
            return;
        }
        let name = self.previous.lexeme.clone();

        let func = self.func_stack.last().unwrap();
        let mut duplicate = false;
        for local in func.locals.iter().rev() {
            if local.depth != -1 && local.depth < func.scope_depth {
                break;
            }
            if local.name == name {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            self.error("Already a variable with this name in this scope.");
        }
        self.add_local(&name);
    }

    /// 消费一个变量名。局部变量返回 0（不需要常量），全局变量返回名字常量下标
    fn parse_variable_name(&mut self, message: &str) -> u8 {
        self.consume(TokenKind::Ident, message);
        self.declare_variable();
        if self.current_func().scope_depth > 0 {
            return 0;
        }
        let name = self.previous.lexeme.clone();
        self.identifier_constant(&name)
    }

    fn mark_initialized(&mut self) {
        let func = self.current_func();
        if func.scope_depth == 0 {
            return;
        }
        let depth = func.scope_depth;
        func.locals.last_mut().unwrap().depth = depth;
    }

    fn define_variable(&mut self, global_idx: u8) {
        if self.current_func().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_op_byte(OpCode::DefineGlobal, global_idx);
    }

    /// 从栈顶往下找局部变量，天然实现遮蔽
    fn resolve_local(&mut self, ci: usize, name: &str) -> Option<u8> {
        let mut found = None;
        for (i, local) in self.func_stack[ci].locals.iter().enumerate().rev() {
            if local.name == name {
                found = Some((i, local.depth));
                break;
            }
        }
        match found {
            Some((i, -1)) => {
                self.error("Can't read local variable in its own initializer.");
                Some(i as u8)
            }
            Some((i, _)) => Some(i as u8),
            None => None,
        }
    }

    /// 名字不在当前函数里，往外层找：外层局部变量捕获成 upvalue，
    /// 再外层就递归，拿外层的 upvalue 下标间接引用
    fn resolve_upvalue(&mut self, ci: usize, name: &str) -> Option<u8> {
        if ci == 0 {
            return None;
        }
        if let Some(local) = self.resolve_local(ci - 1, name) {
            self.func_stack[ci - 1].locals[local as usize].is_captured = true;
            return Some(self.add_upvalue(ci, local, true));
        }
        if let Some(upvalue) = self.resolve_upvalue(ci - 1, name) {
            return Some(self.add_upvalue(ci, upvalue, false));
        }
        None
    }

    fn add_upvalue(&mut self, ci: usize, index: u8, is_local: bool) -> u8 {
        // 同一个变量只捕获一次
        for (i, upvalue) in self.func_stack[ci].upvalues.iter().enumerate() {
            if upvalue.index == index && upvalue.is_local == is_local {
                return i as u8;
            }
        }
        if self.func_stack[ci].upvalues.len() >= MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }
        self.func_stack[ci].upvalues.push(UpvalueRef { index, is_local });
        self.func_stack[ci].function.upvalue_count = self.func_stack[ci].upvalues.len();
        (self.func_stack[ci].upvalues.len() - 1) as u8
    }

    /// 变量读写的统一出口：局部、upvalue、全局三级查找
    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let ci = self.func_stack.len() - 1;
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(ci, name) {
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else if let Some(idx) = self.resolve_upvalue(ci, name) {
            (OpCode::GetUpvalue, OpCode::SetUpvalue, idx)
        } else {
            let idx = self.identifier_constant(name);
            (OpCode::GetGlobal, OpCode::SetGlobal, idx)
        };

        if can_assign && self.match_token(TokenKind::Assign) {
            self.parse_expression();
            self.emit_op_byte(set_op, arg);
        } else {
            self.emit_op_byte(get_op, arg);
        }
    }

    /* ---------- 函数编译器栈 ---------- */

    fn push_func_compiler(&mut self, kind: FunctionKind) {
        let name = Some(self.previous.lexeme.clone());
        self.func_stack.push(FunctionCompiler::new(kind, name));
    }

    /// 收尾当前函数：补隐式返回，弹出编译器，把函数挂到堆上。
    /// upvalue 表一并交还，外层靠它给 Closure 指令补操作数
    fn end_compiler(&mut self) -> (*mut GCObject<LFunction>, Vec<UpvalueRef>) {
        self.emit_return();
        let finished = self.func_stack.pop().unwrap();

        if self.log_level != LogLevel::Release && self.errors.is_empty() {
            let name = finished
                .function
                .name
                .clone()
                .unwrap_or_else(|| "<script>".to_string());
            debug::disassemble_chunk(&finished.function.chunk, &name);
        }

        // 分配失败记一条编译错误就够了：有错误在，结果必然被丢弃，
        // 占位的空指针不会活到执行阶段
        let function = match self.heap.alloc_function(finished.function) {
            Some(ptr) => ptr,
            None => {
                self.error("Out of memory.");
                std::ptr::null_mut()
            }
        };
        (function, finished.upvalues)
    }
}
