use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::LoxValue;

impl VirtualMachine {
    /// ADD 是唯一的重载运算：两个数字相加，或两个字符串拼接
    pub fn handle_add(&mut self) -> Result<(), VMError> {
        let right = self.peek(0);
        let left = self.peek(1);

        match (left, right) {
            (LoxValue::Number(a), LoxValue::Number(b)) => {
                self.pop();
                self.pop();
                self.push(LoxValue::Number(a + b));
                Ok(())
            }
            (LoxValue::Str(a), LoxValue::Str(b)) => {
                // 拼接结果也走驻留池，"st" + "ring" 和字面量 "string" 是同一个对象
                let combined = unsafe { format!("{}{}", (*a).data.chars, (*b).data.chars) };
                let ptr = self
                    .heap
                    .alloc_string(combined)
                    .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;
                self.pop();
                self.pop();
                self.push(LoxValue::Str(ptr));
                Ok(())
            }
            _ => Err(self.error(ErrorKind::TypeError(
                "Operands must be two numbers or two strings.".into(),
            ))),
        }
    }

    pub fn handle_subtract(&mut self) -> Result<(), VMError> {
        self.handle_binary_number_op(|a, b| a - b)
    }

    pub fn handle_multiply(&mut self) -> Result<(), VMError> {
        self.handle_binary_number_op(|a, b| a * b)
    }

    /// 除以零不报错，IEEE-754 语义给出 inf / NaN
    pub fn handle_divide(&mut self) -> Result<(), VMError> {
        self.handle_binary_number_op(|a, b| a / b)
    }

    pub fn handle_negate(&mut self) -> Result<(), VMError> {
        match self.peek(0) {
            LoxValue::Number(n) => {
                self.pop();
                self.push(LoxValue::Number(-n));
                Ok(())
            }
            _ => Err(self.error(ErrorKind::TypeError("Operand must be a number.".into()))),
        }
    }

    pub fn handle_not(&mut self) -> Result<(), VMError> {
        let value = self.pop();
        self.push(LoxValue::Boolean(!value.is_truthy()));
        Ok(())
    }

    fn handle_binary_number_op<F>(&mut self, op_fn: F) -> Result<(), VMError>
    where
        F: Fn(f64, f64) -> f64,
    {
        match (self.peek(1), self.peek(0)) {
            (LoxValue::Number(a), LoxValue::Number(b)) => {
                self.pop();
                self.pop();
                self.push(LoxValue::Number(op_fn(a, b)));
                Ok(())
            }
            _ => Err(self.error(ErrorKind::TypeError("Operands must be numbers.".into()))),
        }
    }
}
