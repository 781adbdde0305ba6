use crate::backend::vm::error::{ErrorKind, VMError};
use crate::backend::vm::stack::CallFrame;
use crate::backend::vm::{MAX_CALL_STACK, VirtualMachine};
use crate::common::object::{ClosureObject, GCObject, InstanceObject, LoxValue};
use std::collections::HashMap;
use std::io::Write;

impl VirtualMachine {
    pub fn handle_jump(&mut self, offset: u16) -> Result<(), VMError> {
        self.call_stack.last_mut().unwrap().ip += offset as usize;
        Ok(())
    }

    /// 条件值不弹，and/or 和 if/while 的编译产物自己决定什么时候弹
    pub fn handle_jump_if_false(&mut self, offset: u16) -> Result<(), VMError> {
        if !self.peek(0).is_truthy() {
            self.call_stack.last_mut().unwrap().ip += offset as usize;
        }
        Ok(())
    }

    pub fn handle_loop(&mut self, offset: u16) -> Result<(), VMError> {
        self.call_stack.last_mut().unwrap().ip -= offset as usize;
        Ok(())
    }

    pub fn handle_print(&mut self) -> Result<(), VMError> {
        let value = self.pop();
        let _ = writeln!(self.out, "{}", value.display());
        Ok(())
    }

    /// CALL：被调用者在 argc 个实参下面，按它的类型分发
    pub fn handle_call(&mut self, argc: u8) -> Result<(), VMError> {
        let argc = argc as usize;
        let callee = self.peek(argc);
        self.call_value(callee, argc)
    }

    pub fn call_value(&mut self, callee: LoxValue, argc: usize) -> Result<(), VMError> {
        match callee {
            LoxValue::Closure(closure) => self.call_closure(closure, argc),

            LoxValue::BoundMethod(bound) => unsafe {
                // 接收者顶掉被调用者的槽位，方法体里它就是 0 号局部变量 this
                let base = self.value_stack.values.len() - argc - 1;
                self.value_stack.values[base] = (*bound).data.receiver;
                self.call_closure((*bound).data.method, argc)
            },

            LoxValue::Class(class) => unsafe {
                let instance = self
                    .heap
                    .alloc_instance(InstanceObject {
                        class,
                        fields: HashMap::new(),
                    })
                    .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;
                let base = self.value_stack.values.len() - argc - 1;
                self.value_stack.values[base] = LoxValue::Instance(instance);

                // 有 init 就把实参转交给它，没有 init 就不准带实参
                if let Some(&initializer) = (*class).data.methods.get("init") {
                    self.call_closure(initializer, argc)
                } else if argc != 0 {
                    Err(self.error(ErrorKind::ArityMismatch {
                        expected: 0,
                        got: argc,
                    }))
                } else {
                    Ok(())
                }
            },

            LoxValue::CFunc(native) => {
                let result = native(self, argc)?;
                let new_len = self.value_stack.values.len() - argc - 1;
                self.value_stack.truncate(new_len);
                self.push(result);
                Ok(())
            }

            _ => Err(self.error(ErrorKind::InvalidCall(
                "Can only call functions and classes.".into(),
            ))),
        }
    }

    pub fn call_closure(
        &mut self,
        closure: *mut GCObject<ClosureObject>,
        argc: usize,
    ) -> Result<(), VMError> {
        let arity = unsafe { (*(*closure).data.function).data.arity };
        if argc != arity {
            return Err(self.error(ErrorKind::ArityMismatch {
                expected: arity,
                got: argc,
            }));
        }
        if self.call_stack.len() >= MAX_CALL_STACK {
            return Err(self.error(ErrorKind::StackOverflow));
        }

        self.call_stack.push(CallFrame {
            closure,
            ip: 0,
            slot_base: self.value_stack.values.len() - argc - 1,
        });
        Ok(())
    }

    /// RETURN：帧的所有栈槽随帧消失，被捕获的先关进 upvalue
    pub fn handle_return(&mut self) -> Result<(), VMError> {
        let result = self.pop();
        let frame = self.call_stack.pop().unwrap();

        self.close_upvalues(frame.slot_base);
        self.value_stack.truncate(frame.slot_base);

        // 脚本帧返回后值栈应当正好清空，循环在上层自然结束
        if !self.call_stack.is_empty() {
            self.push(result);
        }
        Ok(())
    }
}
