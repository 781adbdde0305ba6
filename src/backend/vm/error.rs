#[derive(Debug, Clone)]
pub enum ErrorKind {
    // 类型错误：例如 1 + "a"
    TypeError(String),
    // 访问未定义的全局变量
    UndefinedVariable(String),
    // 实例上既没有这个字段也没有这个方法
    UndefinedProperty(String),
    // 调用一个不可调用的值
    InvalidCall(String),
    // 实参个数跟 arity 对不上
    ArityMismatch { expected: usize, got: usize },
    // 调用帧打满了：递归太深
    StackOverflow,
    // 触到硬内存上限，GC 后仍无法分配
    OutOfMemory,
    // 字节码损坏或 VM 实现 Bug
    InternalError(String),
}

#[derive(Debug, Clone)]
pub struct VMError {
    pub kind: ErrorKind,
    /// 每个活动帧一行，最内层在前，格式 "[line N] in name()"
    pub stack_trace: Vec<String>,
}

impl std::fmt::Display for VMError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get_message())?;
        for frame_line in &self.stack_trace {
            write!(f, "\n{}", frame_line)?;
        }
        Ok(())
    }
}

impl std::error::Error for VMError {}

impl VMError {
    pub fn get_message(&self) -> String {
        match &self.kind {
            ErrorKind::TypeError(m) => m.clone(),
            ErrorKind::InvalidCall(m) => m.clone(),
            ErrorKind::InternalError(m) => m.clone(),

            ErrorKind::UndefinedVariable(name) => {
                format!("Undefined variable '{}'.", name)
            }
            ErrorKind::UndefinedProperty(name) => {
                format!("Undefined property '{}'.", name)
            }
            ErrorKind::ArityMismatch { expected, got } => {
                format!("Expected {} arguments but got {}.", expected, got)
            }

            ErrorKind::StackOverflow => "Stack overflow.".to_string(),
            ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        }
    }
}
