// Mylox compiler statements and declarations
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-03-07: Initial version, expression/print/block statements
//      26-03-08: if/while, jump patching
//      26-03-09: for desugars to scoped init + while with increment hoisted behind the body
//      26-03-11: Function declarations and return
//      26-03-17: Class declarations and methods

use crate::common::object::LoxValue;
use crate::common::opcode::OpCode;
use crate::frontend::compiler::{Compiler, FunctionKind, MAX_ARITY};
use crate::frontend::lexer::token::TokenKind;

impl Compiler<'_> {
    pub(crate) fn parse_declaration(&mut self) {
        if self.match_token(TokenKind::KwClass) {
            self.parse_class_declaration();
        } else if self.match_token(TokenKind::KwFun) {
            self.parse_fun_declaration();
        } else if self.match_token(TokenKind::KwVar) {
            self.parse_var_declaration();
        } else {
            self.parse_statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn parse_statement(&mut self) {
        if self.match_token(TokenKind::KwPrint) {
            self.parse_print_statement();
        } else if self.match_token(TokenKind::KwIf) {
            self.parse_if_statement();
        } else if self.match_token(TokenKind::KwReturn) {
            self.parse_return_statement();
        } else if self.match_token(TokenKind::KwWhile) {
            self.parse_while_statement();
        } else if self.match_token(TokenKind::KwFor) {
            self.parse_for_statement();
        } else if self.match_token(TokenKind::LBrace) {
            self.begin_scope();
            self.parse_block();
            self.end_scope();
        } else {
            self.parse_expression_statement();
        }
    }

    /* ---------- 声明 ---------- */

    fn parse_var_declaration(&mut self) {
        let global_idx = self.parse_variable_name("Expect variable name.");

        if self.match_token(TokenKind::Assign) {
            self.parse_expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        );

        self.define_variable(global_idx);
    }

    fn parse_fun_declaration(&mut self) {
        let global_idx = self.parse_variable_name("Expect function name.");
        // 先标记已初始化，函数体里才能递归引用自己
        self.mark_initialized();
        self.parse_function(FunctionKind::Function);
        self.define_variable(global_idx);
    }

    fn parse_class_declaration(&mut self) {
        self.consume(TokenKind::Ident, "Expect class name.");
        let class_name = self.previous.lexeme.clone();
        let name_idx = self.identifier_constant(&class_name);
        self.declare_variable();

        self.emit_op_byte(OpCode::Class, name_idx);
        self.define_variable(name_idx);

        self.class_stack.push(super::ClassCompiler);

        // 把类再压回栈顶，Method 指令要在它身上注册方法
        self.named_variable(&class_name, false);
        self.consume(TokenKind::LBrace, "Expect '{' before class body.");
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            self.parse_method();
        }
        self.consume(TokenKind::RBrace, "Expect '}' after class body.");
        self.emit_op(OpCode::Pop);

        self.class_stack.pop();
    }

    fn parse_method(&mut self) {
        self.consume(TokenKind::Ident, "Expect method name.");
        let method_name = self.previous.lexeme.clone();
        let name_idx = self.identifier_constant(&method_name);

        let kind = if method_name == "init" {
            FunctionKind::Initializer
        } else {
            FunctionKind::Method
        };
        self.parse_function(kind);

        self.emit_op_byte(OpCode::Method, name_idx);
    }

    /// 形参表加函数体。收尾后发射 Closure，再补上每个 upvalue 的来源对
    fn parse_function(&mut self, kind: FunctionKind) {
        self.push_func_compiler(kind);
        self.begin_scope();

        self.consume(TokenKind::LParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RParen) {
            loop {
                if self.current_func().function.arity == MAX_ARITY {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                self.current_func().function.arity += 1;
                let param_idx = self.parse_variable_name("Expect parameter name.");
                self.define_variable(param_idx);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LBrace, "Expect '{' before function body.");
        self.parse_block();

        // 函数编译器弹掉后不用 end_scope，整个帧都随 Return 一起消失
        let (function, upvalues) = self.end_compiler();
        let const_idx = self.make_constant(LoxValue::Function(function));
        self.emit_op_byte(OpCode::Closure, const_idx);
        for upvalue in upvalues {
            self.emit_byte(upvalue.is_local as u8);
            self.emit_byte(upvalue.index);
        }
    }

    /* ---------- 语句 ---------- */

    pub(crate) fn parse_block(&mut self) {
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            self.parse_declaration();
        }
        self.consume(TokenKind::RBrace, "Expect '}' after block.");
    }

    fn parse_print_statement(&mut self) {
        self.parse_expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn parse_expression_statement(&mut self) {
        self.parse_expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn parse_if_statement(&mut self) {
        self.consume(TokenKind::LParen, "Expect '(' after 'if'.");
        self.parse_expression();
        self.consume(TokenKind::RParen, "Expect ')' after condition.");

        // 条件值两条路径各弹一次，保证语句总效果为零
        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_statement();
        let else_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);
        if self.match_token(TokenKind::KwElse) {
            self.parse_statement();
        }
        self.patch_jump(else_jump);
    }

    fn parse_while_statement(&mut self) {
        let loop_start = self.current_chunk().code.len();
        self.consume(TokenKind::LParen, "Expect '(' after 'while'.");
        self.parse_expression();
        self.consume(TokenKind::RParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    /// for 脱糖成带作用域的初始化语句加 while。
    /// 步进子句写在前面却要在循环体之后执行，所以先跳过它进循环体，
    /// 循环体结束再回跳到步进，步进完了回条件
    fn parse_for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LParen, "Expect '(' after 'for'.");
        if self.match_token(TokenKind::Semicolon) {
            // 没有初始化子句
        } else if self.match_token(TokenKind::KwVar) {
            self.parse_var_declaration();
        } else {
            self.parse_expression_statement();
        }

        let mut loop_start = self.current_chunk().code.len();
        let mut exit_jump = None;
        if !self.match_token(TokenKind::Semicolon) {
            self.parse_expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.match_token(TokenKind::RParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.current_chunk().code.len();
            self.parse_expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.parse_statement();
        self.emit_loop(loop_start);

        if let Some(exit) = exit_jump {
            self.patch_jump(exit);
            self.emit_op(OpCode::Pop);
        }
        self.end_scope();
    }

    fn parse_return_statement(&mut self) {
        if self.current_func().kind == FunctionKind::Script {
            self.error("Can't return from top-level code.");
        }

        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            if self.current_func().kind == FunctionKind::Initializer {
                self.error("Can't return a value from an initializer.");
            }
            self.parse_expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }
}
