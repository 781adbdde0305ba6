use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::VMError;
use crate::common::object::LoxValue;

pub fn load_standard_library(vm: &mut VirtualMachine) {
    vm.globals
        .insert("clock".to_string(), LoxValue::CFunc(lox_builtin_clock));
}

/// clock() -> 解释器启动到现在的秒数，单调递增，适合做计时差
pub fn lox_builtin_clock(vm: &mut VirtualMachine, _argc: usize) -> Result<LoxValue, VMError> {
    Ok(LoxValue::Number(vm.uptime_seconds()))
}
