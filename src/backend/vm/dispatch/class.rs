use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::{
    BoundMethodObject, ClassObject, GCObject, LoxValue,
};
use std::collections::HashMap;

impl VirtualMachine {
    pub fn handle_class(&mut self, name_idx: u8) -> Result<(), VMError> {
        let name = self.read_string_constant(name_idx)?;
        let class = self
            .heap
            .alloc_class(ClassObject {
                name,
                methods: HashMap::new(),
            })
            .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;
        self.push(LoxValue::Class(class));
        Ok(())
    }

    /// METHOD：类在 peek(1)，方法闭包在 peek(0)，注册完弹掉方法
    pub fn handle_method(&mut self, name_idx: u8) -> Result<(), VMError> {
        let name = self.read_string_constant(name_idx)?;
        let method = match self.peek(0) {
            LoxValue::Closure(ptr) => ptr,
            other => {
                return Err(self.error(ErrorKind::InternalError(format!(
                    "Method must be a closure, found {:?}.",
                    other
                ))));
            }
        };
        let class = match self.peek(1) {
            LoxValue::Class(ptr) => ptr,
            other => {
                return Err(self.error(ErrorKind::InternalError(format!(
                    "Method target must be a class, found {:?}.",
                    other
                ))));
            }
        };

        unsafe {
            (*class).data.methods.insert(name, method);
        }
        self.pop();
        Ok(())
    }

    /// GET_PROPERTY：字段优先，没有字段再把方法绑成 BoundMethod
    pub fn handle_get_property(&mut self, name_idx: u8) -> Result<(), VMError> {
        let name = self.read_string_constant(name_idx)?;
        let instance = match self.peek(0) {
            LoxValue::Instance(ptr) => ptr,
            _ => {
                return Err(self.error(ErrorKind::TypeError(
                    "Only instances have properties.".into(),
                )));
            }
        };

        unsafe {
            if let Some(&value) = (*instance).data.fields.get(&name) {
                self.pop();
                self.push(value);
                return Ok(());
            }
            self.bind_method((*instance).data.class, &name)
        }
    }

    /// SET_PROPERTY：peek(1) 是实例，peek(0) 是值；赋值表达式把值留在栈顶
    pub fn handle_set_property(&mut self, name_idx: u8) -> Result<(), VMError> {
        let name = self.read_string_constant(name_idx)?;
        let instance = match self.peek(1) {
            LoxValue::Instance(ptr) => ptr,
            _ => {
                return Err(self.error(ErrorKind::TypeError(
                    "Only instances have fields.".into(),
                )));
            }
        };

        let value = self.peek(0);
        unsafe {
            (*instance).data.fields.insert(name, value);
        }
        let value = self.pop();
        self.pop(); // 实例
        self.push(value);
        Ok(())
    }

    /// INVOKE：obj.m(args) 的融合快路径。属性是字段时退回普通调用
    pub fn handle_invoke(&mut self, name_idx: u8, argc: u8) -> Result<(), VMError> {
        let name = self.read_string_constant(name_idx)?;
        let argc = argc as usize;

        let instance = match self.peek(argc) {
            LoxValue::Instance(ptr) => ptr,
            _ => {
                return Err(self.error(ErrorKind::TypeError(
                    "Only instances have methods.".into(),
                )));
            }
        };

        unsafe {
            if let Some(&field) = (*instance).data.fields.get(&name) {
                let base = self.value_stack.values.len() - argc - 1;
                self.value_stack.values[base] = field;
                return self.call_value(field, argc);
            }
            self.invoke_from_class((*instance).data.class, &name, argc)
        }
    }

    fn invoke_from_class(
        &mut self,
        class: *mut GCObject<ClassObject>,
        name: &str,
        argc: usize,
    ) -> Result<(), VMError> {
        let method = unsafe { (*class).data.methods.get(name).copied() };
        match method {
            Some(method) => self.call_closure(method, argc),
            None => Err(self.error(ErrorKind::UndefinedProperty(name.to_string()))),
        }
    }

    /// 方法值被单独取出来时绑定接收者，之后可以当普通函数调用
    fn bind_method(
        &mut self,
        class: *mut GCObject<ClassObject>,
        name: &str,
    ) -> Result<(), VMError> {
        let method = unsafe { (*class).data.methods.get(name).copied() };
        let method = match method {
            Some(method) => method,
            None => return Err(self.error(ErrorKind::UndefinedProperty(name.to_string()))),
        };

        let receiver = self.peek(0);
        let bound = self
            .heap
            .alloc_bound_method(BoundMethodObject { receiver, method })
            .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;
        self.pop();
        self.push(LoxValue::BoundMethod(bound));
        Ok(())
    }
}
