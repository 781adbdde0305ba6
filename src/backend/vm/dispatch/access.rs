use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::{LoxValue, UpvalueLocation};

impl VirtualMachine {
    pub fn handle_constant(&mut self, idx: u8) -> Result<(), VMError> {
        let value = self.read_constant(idx);
        self.push(value);
        Ok(())
    }

    pub fn handle_literal(&mut self, value: LoxValue) -> Result<(), VMError> {
        self.push(value);
        Ok(())
    }

    pub fn handle_pop(&mut self) -> Result<(), VMError> {
        self.pop();
        Ok(())
    }

    pub fn handle_get_local(&mut self, slot: u8) -> Result<(), VMError> {
        let base = self.call_stack.last().unwrap().slot_base;
        let value = self.value_stack.values[base + slot as usize];
        self.push(value);
        Ok(())
    }

    /// 赋值是表达式，值留在栈顶
    pub fn handle_set_local(&mut self, slot: u8) -> Result<(), VMError> {
        let base = self.call_stack.last().unwrap().slot_base;
        let value = self.peek(0);
        self.value_stack.values[base + slot as usize] = value;
        Ok(())
    }

    pub fn handle_get_global(&mut self, name_idx: u8) -> Result<(), VMError> {
        let name = self.read_string_constant(name_idx)?;
        if let Some(&value) = self.globals.get(&name) {
            self.push(value);
            Ok(())
        } else {
            Err(self.error(ErrorKind::UndefinedVariable(name)))
        }
    }

    /// 全局定义总是成功，重复定义就是覆盖
    pub fn handle_define_global(&mut self, name_idx: u8) -> Result<(), VMError> {
        let name = self.read_string_constant(name_idx)?;
        let value = self.peek(0);
        self.globals.insert(name, value);
        self.pop();
        Ok(())
    }

    /// 赋值要求键已经存在，否则是运行时错误；成功时值留在栈顶
    pub fn handle_set_global(&mut self, name_idx: u8) -> Result<(), VMError> {
        let name = self.read_string_constant(name_idx)?;
        if !self.globals.contains_key(&name) {
            return Err(self.error(ErrorKind::UndefinedVariable(name)));
        }
        let value = self.peek(0);
        self.globals.insert(name, value);
        Ok(())
    }

    pub fn handle_get_upvalue(&mut self, idx: u8) -> Result<(), VMError> {
        let frame = self.call_stack.last().unwrap();
        let cell = unsafe { (&(*frame.closure).data.upvalues)[idx as usize] };
        let value = unsafe {
            match (*cell).data.location {
                UpvalueLocation::Stack(i) => self.value_stack.values[i],
                UpvalueLocation::Closed(value) => value,
            }
        };
        self.push(value);
        Ok(())
    }

    pub fn handle_set_upvalue(&mut self, idx: u8) -> Result<(), VMError> {
        let value = self.peek(0);
        let frame = self.call_stack.last().unwrap();
        let cell = unsafe { (&(*frame.closure).data.upvalues)[idx as usize] };
        unsafe {
            match (*cell).data.location {
                UpvalueLocation::Stack(i) => self.value_stack.values[i] = value,
                UpvalueLocation::Closed(_) => (*cell).data.location = UpvalueLocation::Closed(value),
            }
        }
        Ok(())
    }
}
