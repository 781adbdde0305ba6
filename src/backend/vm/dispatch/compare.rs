use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::LoxValue;

impl VirtualMachine {
    /// EQUAL 对任意两个值都有定义。字符串是驻留的，
    /// 派生的指针相等就是内容相等；NaN != NaN 由 f64 自带
    pub fn handle_equal(&mut self) -> Result<(), VMError> {
        let right = self.pop();
        let left = self.pop();
        self.push(LoxValue::Boolean(left == right));
        Ok(())
    }

    pub fn handle_greater(&mut self) -> Result<(), VMError> {
        self.handle_number_compare(|a, b| a > b)
    }

    pub fn handle_less(&mut self) -> Result<(), VMError> {
        self.handle_number_compare(|a, b| a < b)
    }

    fn handle_number_compare<F>(&mut self, op_fn: F) -> Result<(), VMError>
    where
        F: Fn(f64, f64) -> bool,
    {
        match (self.peek(1), self.peek(0)) {
            (LoxValue::Number(a), LoxValue::Number(b)) => {
                self.pop();
                self.pop();
                self.push(LoxValue::Boolean(op_fn(a, b)));
                Ok(())
            }
            _ => Err(self.error(ErrorKind::TypeError("Operands must be numbers.".into()))),
        }
    }
}
