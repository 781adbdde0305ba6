use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::{
    ClosureObject, GCObject, LoxValue, UpvalueLocation, UpvalueObject,
};

impl VirtualMachine {
    /// CLOSURE：把函数常量包进新闭包。操作数后面跟 upvalue_count 对
    /// (is_local, index)：is_local 为真捕获本帧的栈槽，否则沿用外层闭包的 upvalue
    pub fn handle_closure(&mut self, const_idx: u8) -> Result<(), VMError> {
        let function = match self.read_constant(const_idx) {
            LoxValue::Function(ptr) => ptr,
            other => {
                return Err(self.error(ErrorKind::InternalError(format!(
                    "Closure operand must be a function constant, found {:?}.",
                    other
                ))));
            }
        };

        let upvalue_count = unsafe { (*function).data.upvalue_count };
        let mut upvalues = Vec::with_capacity(upvalue_count);
        for _ in 0..upvalue_count {
            let is_local = self.read_byte();
            let index = self.read_byte() as usize;
            if is_local == 1 {
                let base = self.call_stack.last().unwrap().slot_base;
                upvalues.push(self.capture_upvalue(base + index)?);
            } else {
                let enclosing = self.call_stack.last().unwrap().closure;
                upvalues.push(unsafe { (&(*enclosing).data.upvalues)[index] });
            }
        }

        let closure = self
            .heap
            .alloc_closure(ClosureObject { function, upvalues })
            .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;
        self.push(LoxValue::Closure(closure));
        Ok(())
    }

    /// 局部变量出作用域但还被闭包引用：把栈顶的槽关进 upvalue 再弹掉
    pub fn handle_close_upvalue(&mut self) -> Result<(), VMError> {
        let top = self.value_stack.values.len() - 1;
        self.close_upvalues(top);
        self.pop();
        Ok(())
    }

    /// 给栈槽找 upvalue。链表按栈下标降序，已有的直接复用，
    /// 保证同一个变量的所有捕获者共享同一个可变格子
    pub fn capture_upvalue(
        &mut self,
        stack_index: usize,
    ) -> Result<*mut GCObject<UpvalueObject>, VMError> {
        unsafe {
            let mut prev: *mut GCObject<UpvalueObject> = std::ptr::null_mut();
            let mut curr = self.open_upvalues;
            while !curr.is_null() {
                match (*curr).data.location {
                    UpvalueLocation::Stack(i) if i > stack_index => {
                        prev = curr;
                        curr = (*curr).data.next_open;
                    }
                    _ => break,
                }
            }

            if !curr.is_null() && (*curr).data.location == UpvalueLocation::Stack(stack_index) {
                return Ok(curr);
            }

            let created = self
                .heap
                .alloc_upvalue(UpvalueObject {
                    location: UpvalueLocation::Stack(stack_index),
                    next_open: curr,
                })
                .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;

            if prev.is_null() {
                self.open_upvalues = created;
            } else {
                (*prev).data.next_open = created;
            }
            Ok(created)
        }
    }

    /// 关闭所有栈下标不低于 boundary 的 upvalue：
    /// 把栈上的值搬进 upvalue 自己的格子，再把它从打开链表上摘下来。
    /// 之后任何闭包读写这个变量都走 Closed 格子，旧栈槽不会再被碰
    pub fn close_upvalues(&mut self, boundary: usize) {
        unsafe {
            while !self.open_upvalues.is_null() {
                let upvalue = self.open_upvalues;
                match (*upvalue).data.location {
                    UpvalueLocation::Stack(i) if i >= boundary => {
                        let value = self.value_stack.values[i];
                        (*upvalue).data.location = UpvalueLocation::Closed(value);
                        self.open_upvalues = (*upvalue).data.next_open;
                        (*upvalue).data.next_open = std::ptr::null_mut();
                    }
                    _ => break,
                }
            }
        }
    }
}
