mod access;
mod arithmetic;
mod class;
mod closure;
mod compare;
mod control;

use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::LoxValue;
use crate::common::opcode::OpCode;

impl VirtualMachine {
    /// 取指、译码、执行一条指令。操作数在这里读完再交给处理函数
    pub fn step(&mut self) -> Result<(), VMError> {
        let byte = self.read_byte();
        let op = OpCode::try_from(byte).map_err(|_| {
            self.error(ErrorKind::InternalError(format!(
                "Unknown opcode 0x{:02X} (bytecode corrupted).",
                byte
            )))
        })?;

        match op {
            OpCode::Constant => {
                let idx = self.read_byte();
                self.handle_constant(idx)
            }
            OpCode::Nil => self.handle_literal(LoxValue::Nil),
            OpCode::True => self.handle_literal(LoxValue::Boolean(true)),
            OpCode::False => self.handle_literal(LoxValue::Boolean(false)),
            OpCode::Pop => self.handle_pop(),

            OpCode::GetLocal => {
                let slot = self.read_byte();
                self.handle_get_local(slot)
            }
            OpCode::SetLocal => {
                let slot = self.read_byte();
                self.handle_set_local(slot)
            }
            OpCode::GetGlobal => {
                let name_idx = self.read_byte();
                self.handle_get_global(name_idx)
            }
            OpCode::DefineGlobal => {
                let name_idx = self.read_byte();
                self.handle_define_global(name_idx)
            }
            OpCode::SetGlobal => {
                let name_idx = self.read_byte();
                self.handle_set_global(name_idx)
            }
            OpCode::GetUpvalue => {
                let idx = self.read_byte();
                self.handle_get_upvalue(idx)
            }
            OpCode::SetUpvalue => {
                let idx = self.read_byte();
                self.handle_set_upvalue(idx)
            }

            OpCode::GetProperty => {
                let name_idx = self.read_byte();
                self.handle_get_property(name_idx)
            }
            OpCode::SetProperty => {
                let name_idx = self.read_byte();
                self.handle_set_property(name_idx)
            }

            OpCode::Equal => self.handle_equal(),
            OpCode::Greater => self.handle_greater(),
            OpCode::Less => self.handle_less(),

            OpCode::Add => self.handle_add(),
            OpCode::Subtract => self.handle_subtract(),
            OpCode::Multiply => self.handle_multiply(),
            OpCode::Divide => self.handle_divide(),
            OpCode::Not => self.handle_not(),
            OpCode::Negate => self.handle_negate(),

            OpCode::Print => self.handle_print(),

            OpCode::Jump => {
                let offset = self.read_short();
                self.handle_jump(offset)
            }
            OpCode::JumpIfFalse => {
                let offset = self.read_short();
                self.handle_jump_if_false(offset)
            }
            OpCode::Loop => {
                let offset = self.read_short();
                self.handle_loop(offset)
            }

            OpCode::Call => {
                let argc = self.read_byte();
                self.handle_call(argc)
            }
            OpCode::Invoke => {
                let name_idx = self.read_byte();
                let argc = self.read_byte();
                self.handle_invoke(name_idx, argc)
            }

            OpCode::Closure => {
                let const_idx = self.read_byte();
                self.handle_closure(const_idx)
            }
            OpCode::CloseUpvalue => self.handle_close_upvalue(),

            OpCode::Return => self.handle_return(),

            OpCode::Class => {
                let name_idx = self.read_byte();
                self.handle_class(name_idx)
            }
            OpCode::Method => {
                let name_idx = self.read_byte();
                self.handle_method(name_idx)
            }
        }
    }

    pub(crate) fn read_byte(&mut self) -> u8 {
        let frame = self.call_stack.last_mut().unwrap();
        let byte = unsafe { (&(*(*frame.closure).data.function).data.chunk.code)[frame.ip] };
        frame.ip += 1;
        byte
    }

    /// 两个字节，大端序
    pub(crate) fn read_short(&mut self) -> u16 {
        let hi = self.read_byte() as u16;
        let lo = self.read_byte() as u16;
        (hi << 8) | lo
    }

    pub(crate) fn read_constant(&self, idx: u8) -> LoxValue {
        let frame = self.call_stack.last().unwrap();
        unsafe { (&(*(*frame.closure).data.function).data.chunk.constants)[idx as usize] }
    }

    /// 名字类操作数必须是字符串常量，不是就是编译器或字节码坏了
    pub(crate) fn read_string_constant(&self, idx: u8) -> Result<String, VMError> {
        match self.read_constant(idx) {
            LoxValue::Str(ptr) => unsafe { Ok((*ptr).data.chars.clone()) },
            other => Err(self.error(ErrorKind::InternalError(format!(
                "Expected string constant at index {}, found {:?}.",
                idx, other
            )))),
        }
    }
}
