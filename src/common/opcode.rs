use num_enum::TryFromPrimitive;

/// 单字节指令集。操作数直接跟在操作码后面的字节流里：
/// u8 操作数占一个字节，跳转偏移是大端序的 u16（两个字节）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    /* --- 常量与字面量 --- */
    /// push K(idx:u8)
    Constant,
    /// push nil
    Nil,
    /// push true
    True,
    /// push false
    False,
    /// 丢弃栈顶
    Pop,

    /* --- 变量访问 --- */
    /// push stack[base + slot:u8]
    GetLocal,
    /// stack[base + slot:u8] := peek(0)，值留在栈顶
    SetLocal,
    /// push Global[K(name:u8)]，未定义则运行时错误
    GetGlobal,
    /// Global[K(name:u8)] := peek(0)，然后 pop
    DefineGlobal,
    /// Global[K(name:u8)] := peek(0)，键必须已定义，值留在栈顶
    SetGlobal,
    /// push *frame.closure.upvalues[idx:u8]
    GetUpvalue,
    /// *frame.closure.upvalues[idx:u8] := peek(0)
    SetUpvalue,

    /* --- 属性访问 --- */
    /// 栈顶是实例：字段命中则替换为字段值，否则绑定方法
    GetProperty,
    /// instance.fields[K(name:u8)] := peek(0)，弹掉实例，值留在栈顶
    SetProperty,

    /* --- 比较 --- */
    /// 任意两个值都可比较
    Equal,
    /// 仅数字
    Greater,
    /// 仅数字
    Less,

    /* --- 算术 --- */
    /// 两个数字相加，或两个字符串拼接
    Add,
    Subtract,
    Multiply,
    Divide,
    /// push !is_truthy(pop)
    Not,
    /// 仅数字
    Negate,

    /* --- 语句 --- */
    /// 输出 pop 的显示形式并换行
    Print,

    /* --- 控制流 --- */
    /// ip += offset:u16
    Jump,
    /// peek(0) 为假则 ip += offset:u16，不弹出条件值
    JumpIfFalse,
    /// ip -= offset:u16，无条件回跳
    Loop,

    /* --- 调用 --- */
    /// 被调用者在 peek(argc:u8)，按其类型分发
    Call,
    /// 融合指令：GET_PROPERTY + CALL，操作数 name:u8, argc:u8
    Invoke,

    /* --- 闭包 --- */
    /// 把函数常量 K(idx:u8) 包进新闭包；
    /// 后面跟 upvalue_count 对 (is_local:u8, index:u8)
    Closure,
    /// 关闭所有指向当前栈顶的 upvalue，然后 pop
    CloseUpvalue,

    /// 取返回值，关闭本帧的 upvalue，弹帧
    Return,

    /* --- 类 --- */
    /// push 新的空类，名字是 K(name:u8)
    Class,
    /// peek(1) 是类，peek(0) 是方法闭包；注册后弹出方法
    Method,
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
