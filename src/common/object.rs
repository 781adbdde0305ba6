// Mylox object model
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-03-04: Defined the LoxValue tagged union and the GCObject<T> header scheme carried over
//            from the Myula heap; switched GCObject to repr(C) so the header prefix has one
//            layout for every payload type and header-only pointer views are well defined.
// 2026-03-09: Added the closure family (LFunction / ClosureObject / UpvalueObject) with the
//            open-or-closed location union for captured variables.
// 2026-03-16: Added the class family (ClassObject / InstanceObject / BoundMethodObject) and
//            the display forms used by print.
use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::VMError;
use crate::common::chunk::Chunk;
use std::collections::HashMap;

/// 原生函数直接是函数指针，不进堆，GC 不用管它
pub type NativeFn = fn(&mut VirtualMachine, usize) -> Result<LoxValue, VMError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectKind {
    String,
    Function,
    Closure,
    Upvalue,
    Class,
    Instance,
    BoundMethod,
}

/// 只看头部不看负载时用的零大小视图类型
pub struct HeaderOnly;

/// 所有堆对象共用的头：标记位、类型标签、记账尺寸、全对象链表指针。
/// repr(C) 保证任何 GCObject<T> 的头部字段偏移一致，
/// 因此 *mut GCObject<T> 可以安全地当作 *mut GCObject<HeaderOnly> 读写头部。
#[repr(C)]
pub struct GCObject<T> {
    pub mark: bool,
    pub kind: ObjectKind,
    pub size: usize,
    pub next: *mut GCObject<HeaderOnly>,
    pub data: T,
}

/// 驻留字符串。相同内容全局只有一份，所以值相等就是指针相等
pub struct StrObject {
    pub chars: String,
    pub hash: u32,
}

/// 编译器的产物：一段字节码加上它自己的常量池
pub struct LFunction {
    pub arity: usize,
    pub upvalue_count: usize,
    pub chunk: Chunk,
    /// None 表示顶层脚本
    pub name: Option<String>,
}

/// 运行时所有调用目标都是闭包，哪怕函数没捕获任何东西
pub struct ClosureObject {
    pub function: *mut GCObject<LFunction>,
    pub upvalues: Vec<*mut GCObject<UpvalueObject>>,
}

/// open: 变量还在值栈上，存栈下标；closed: 栈槽已经搬进 upvalue 自己的格子
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpvalueLocation {
    Stack(usize),
    Closed(LoxValue),
}

pub struct UpvalueObject {
    pub location: UpvalueLocation,
    /// 打开状态的 upvalue 串成链表，按栈下标降序排列
    pub next_open: *mut GCObject<UpvalueObject>,
}

pub struct ClassObject {
    pub name: String,
    pub methods: HashMap<String, *mut GCObject<ClosureObject>>,
}

pub struct InstanceObject {
    pub class: *mut GCObject<ClassObject>,
    pub fields: HashMap<String, LoxValue>,
}

pub struct BoundMethodObject {
    pub receiver: LoxValue,
    pub method: *mut GCObject<ClosureObject>,
}

// lox-value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoxValue {
    Nil,
    Boolean(bool),
    Number(f64),
    Str(*mut GCObject<StrObject>),
    /// 只出现在常量池里，运行时会被 Closure 指令包起来
    Function(*mut GCObject<LFunction>),
    Closure(*mut GCObject<ClosureObject>),
    Class(*mut GCObject<ClassObject>),
    Instance(*mut GCObject<InstanceObject>),
    BoundMethod(*mut GCObject<BoundMethodObject>),
    CFunc(NativeFn),
}

impl LoxValue {
    /// nil 和 false 为假，其余一律为真
    pub fn is_truthy(&self) -> bool {
        !matches!(self, LoxValue::Nil | LoxValue::Boolean(false))
    }

    /// print 语句和 REPL 用的显示形式
    pub fn display(&self) -> String {
        match self {
            LoxValue::Nil => "nil".to_string(),
            LoxValue::Boolean(b) => b.to_string(),
            LoxValue::Number(n) => n.to_string(),
            LoxValue::Str(ptr) => unsafe { (*(*ptr)).data.chars.clone() },
            LoxValue::Function(ptr) => unsafe { function_display(&(*(*ptr)).data) },
            LoxValue::Closure(ptr) => unsafe { function_display(&(*(*(*ptr)).data.function).data) },
            LoxValue::Class(ptr) => unsafe { (*(*ptr)).data.name.clone() },
            LoxValue::Instance(ptr) => unsafe {
                format!("{} instance", (*(*(*ptr)).data.class).data.name)
            },
            LoxValue::BoundMethod(ptr) => unsafe {
                function_display(&(*(*(*(*ptr)).data.method).data.function).data)
            },
            LoxValue::CFunc(_) => "<native fn>".to_string(),
        }
    }
}

fn function_display(func: &LFunction) -> String {
    match &func.name {
        Some(name) => format!("<fn {}>", name),
        None => "<script>".to_string(),
    }
}
