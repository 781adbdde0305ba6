pub mod backend;
pub mod common;
pub mod frontend;

pub use backend::vm::{LogLevel, VirtualMachine};
pub use frontend::compiler::{CompileError, CompileErrors};

use backend::vm::error::VMError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("{0}")]
    Compile(#[from] CompileErrors),
    #[error("{0}")]
    Runtime(#[from] VMError),
}

/// 从源代码到执行完的完整管线，文件模式和 REPL 共用。
/// 编译产物挂在 vm 自己的堆上，REPL 连续多行共享全局变量
pub fn interpret(vm: &mut VirtualMachine, source: &str) -> Result<(), InterpretError> {
    let script = frontend::compile(source, &mut vm.heap, vm.log_level)?;
    vm.interpret(script)?;
    Ok(())
}
