// Mylox VM
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-03-05: Finalized the VM data structures: call frame stack over a shared value stack,
//            late-bound globals table, and the heap carried over from Myula;
//            the run loop keeps Myula's shape (step, report, GC check between instructions).
// 2026-03-08: Switched dispatch to a flat byte stream with an ip per frame; operands are
//            decoded in the dispatch module and handed to per-category handlers.
// 2026-03-12: Closures and upvalues: open upvalue list sorted by descending stack index,
//            close-on-return and close-on-scope-exit.
// 2026-03-14: Reworked marking into an explicit gray worklist (Myula marked recursively,
//            deep object graphs blew the native stack); sweep keeps the synchronized
//            string-pool cleanup so the intern table stays weak.
// 2026-03-18: Classes, instances, bound methods; Invoke fast path.
// 2026-03-21: Runtime errors carry a per-frame traceback and reset the stack, the REPL
//            keeps going afterwards.
pub mod debug;
pub mod dispatch;
pub mod error;
pub mod heap;
pub mod stack;
pub mod std_lib;

use crate::backend::vm::error::{ErrorKind, VMError};
use crate::backend::vm::heap::Heap;
use crate::backend::vm::stack::{CallFrame, ValueStack};
use crate::common::object::{
    BoundMethodObject, ClassObject, ClosureObject, GCObject, HeaderOnly, InstanceObject,
    LFunction, LoxValue, ObjectKind, UpvalueLocation, UpvalueObject,
};
use clap::ValueEnum;
use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Release, // 仅输出程序结果
    Debug,   // 输出编译产物反汇编和 GC 统计
    Trace,   // 每条指令执行前打印值栈和反汇编
}

pub const MAX_CALL_STACK: usize = 64;
pub const HARD_MEMORY_LIMIT: usize = 1024 * 1024 * 512; //512MB
pub const VM_THRESHOLD: usize = 1024 * 1024; //1MB

pub struct VirtualMachine {
    pub call_stack: Vec<CallFrame>,
    pub value_stack: ValueStack,
    pub globals: HashMap<String, LoxValue>,
    /// 还开着的 upvalue 链表头，按栈下标降序
    pub open_upvalues: *mut GCObject<UpvalueObject>,
    pub heap: Heap,
    pub log_level: LogLevel,
    /// 三色标记的灰色工作表，跨收集复用容量
    gray_stack: Vec<*mut GCObject<HeaderOnly>>,
    start_time: Instant,
    /// print 的输出口，默认标准输出，测试里换成缓冲区
    pub out: Box<dyn Write>,
}

impl VirtualMachine {
    pub fn new() -> Self {
        let mut vm = Self {
            call_stack: Vec::new(),
            value_stack: ValueStack::default(),
            globals: HashMap::new(),
            open_upvalues: std::ptr::null_mut(),
            heap: Heap::new(),
            log_level: LogLevel::Release,
            gray_stack: Vec::new(),
            start_time: Instant::now(),
            out: Box::new(std::io::stdout()),
        };
        std_lib::load_standard_library(&mut vm);
        vm
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// 顶层入口：把编译好的脚本包进闭包，零实参调用，然后跑到底
    pub fn interpret(&mut self, script: *mut GCObject<LFunction>) -> Result<(), VMError> {
        let closure = self
            .heap
            .alloc_closure(ClosureObject {
                function: script,
                upvalues: Vec::new(),
            })
            .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;

        self.value_stack.push(LoxValue::Closure(closure));
        self.call_closure(closure, 0)?;
        self.run()
    }

    pub fn run(&mut self) -> Result<(), VMError> {
        while !self.call_stack.is_empty() {
            if self.log_level == LogLevel::Trace {
                self.trace_instruction();
            }

            if let Err(e) = self.step() {
                self.report_error(&e);
                self.reset_stack();
                return Err(e);
            }

            // GC 只在指令边界跑，指令内部的中间值都已经发布到栈上了
            if self.heap.check_gc_condition() {
                self.collect_garbage();
            }
        }

        if matches!(self.log_level, LogLevel::Debug | LogLevel::Trace) {
            println!(
                "[DEBUG] Max memory allocated during execution: {} bytes",
                self.heap.max_allocated
            );
        }
        Ok(())
    }

    fn trace_instruction(&self) {
        let frame = self.call_stack.last().unwrap();
        let mut repr = String::from("[TRACE] stack:");
        for value in &self.value_stack.values {
            repr.push_str(&format!(" [ {} ]", value.display()));
        }
        println!("{}", repr);
        unsafe {
            let chunk = &(*(*frame.closure).data.function).data.chunk;
            debug::disassemble_instruction(chunk, frame.ip);
        }
    }

    fn report_error(&self, err: &VMError) {
        eprintln!("{}", err);
    }

    /// 把错误和整条调用链打包起来，最内层帧在前
    pub fn error(&self, kind: ErrorKind) -> VMError {
        let mut stack_trace = Vec::new();
        for frame in self.call_stack.iter().rev() {
            unsafe {
                let function = &(*(*frame.closure).data.function).data;
                let line = function.chunk.line_of(frame.ip.saturating_sub(1));
                match &function.name {
                    Some(name) => stack_trace.push(format!("[line {}] in {}()", line, name)),
                    None => stack_trace.push(format!("[line {}] in script", line)),
                }
            }
        }
        VMError { kind, stack_trace }
    }

    pub fn reset_stack(&mut self) {
        self.value_stack.clear();
        self.call_stack.clear();
        self.open_upvalues = std::ptr::null_mut();
    }

    pub fn push(&mut self, value: LoxValue) {
        self.value_stack.push(value);
    }

    pub fn pop(&mut self) -> LoxValue {
        self.value_stack.pop()
    }

    pub fn peek(&self, distance: usize) -> LoxValue {
        self.value_stack.peek(distance)
    }

    /* ---------- GC ---------- */

    pub fn collect_garbage(&mut self) {
        if matches!(self.log_level, LogLevel::Debug | LogLevel::Trace) {
            println!(
                "[DEBUG] GC triggered: {} bytes allocated, threshold {} bytes.",
                self.heap.total_allocated, self.heap.threshold
            );
        }

        let mut gray = std::mem::take(&mut self.gray_stack);
        gray.clear();

        unsafe {
            // 根集：值栈、调用帧的闭包、开着的 upvalue、全局表的值。
            // 驻留池有意不在这里：它是弱表，清扫时同步剔除死键
            for value in &self.value_stack.values {
                mark_value(*value, &mut gray);
            }
            for frame in &self.call_stack {
                mark_object(frame.closure.cast(), &mut gray);
            }
            let mut upvalue = self.open_upvalues;
            while !upvalue.is_null() {
                mark_object(upvalue.cast(), &mut gray);
                upvalue = (*upvalue).data.next_open;
            }
            for value in self.globals.values() {
                mark_value(*value, &mut gray);
            }

            // 排空灰色工作表：弹一个，把它引用的对象全染灰
            while let Some(obj) = gray.pop() {
                blacken_object(obj, &mut gray);
            }
        }

        self.gray_stack = gray;
        self.sweep_objects();
        self.heap.expand_threshold();
    }

    fn sweep_objects(&mut self) {
        unsafe {
            let mut p_prev: *mut GCObject<HeaderOnly> = std::ptr::null_mut();
            let mut p_curr = self.heap.all_objects;

            // use for debug and performance monitoring
            let mut swept_count = 0;
            let mut swept_bytes = 0;

            while !p_curr.is_null() {
                if (*p_curr).mark {
                    (*p_curr).mark = false;
                    p_prev = p_curr;
                    p_curr = (*p_curr).next;
                } else {
                    swept_count += 1;
                    swept_bytes += (*p_curr).size;

                    let p_next = self.heap.free_object(p_curr);
                    if p_prev.is_null() {
                        self.heap.all_objects = p_next;
                    } else {
                        (*p_prev).next = p_next;
                    }
                    p_curr = p_next;
                }
            }

            //use for debug and performance monitoring
            if swept_count > 0 && matches!(self.log_level, LogLevel::Debug | LogLevel::Trace) {
                println!(
                    "[DEBUG] Sweep phase finished: reclaimed {} objects, {} bytes released. Current heap: {} bytes.",
                    swept_count, swept_bytes, self.heap.total_allocated
                );
            }
        }
    }
}

unsafe fn mark_value(value: LoxValue, gray: &mut Vec<*mut GCObject<HeaderOnly>>) {
    unsafe {
        match value {
            LoxValue::Str(ptr) => mark_object(ptr.cast(), gray),
            LoxValue::Function(ptr) => mark_object(ptr.cast(), gray),
            LoxValue::Closure(ptr) => mark_object(ptr.cast(), gray),
            LoxValue::Class(ptr) => mark_object(ptr.cast(), gray),
            LoxValue::Instance(ptr) => mark_object(ptr.cast(), gray),
            LoxValue::BoundMethod(ptr) => mark_object(ptr.cast(), gray),
            // Nil / Boolean / Number / CFunc 不在堆上
            _ => {}
        }
    }
}

unsafe fn mark_object(ptr: *mut GCObject<HeaderOnly>, gray: &mut Vec<*mut GCObject<HeaderOnly>>) {
    unsafe {
        if ptr.is_null() || (*ptr).mark {
            return;
        }
        (*ptr).mark = true;
        gray.push(ptr);
    }
}

/// 把一个灰对象染黑：标记它直接引用的所有对象
unsafe fn blacken_object(ptr: *mut GCObject<HeaderOnly>, gray: &mut Vec<*mut GCObject<HeaderOnly>>) {
    unsafe {
        match (*ptr).kind {
            ObjectKind::String => {}
            ObjectKind::Function => {
                let func = ptr as *mut GCObject<LFunction>;
                for value in &(*func).data.chunk.constants {
                    mark_value(*value, gray);
                }
            }
            ObjectKind::Closure => {
                let closure = ptr as *mut GCObject<ClosureObject>;
                mark_object((*closure).data.function.cast(), gray);
                for &upvalue in &(*closure).data.upvalues {
                    mark_object(upvalue.cast(), gray);
                }
            }
            ObjectKind::Upvalue => {
                let upvalue = ptr as *mut GCObject<UpvalueObject>;
                if let UpvalueLocation::Closed(value) = (*upvalue).data.location {
                    mark_value(value, gray);
                }
            }
            ObjectKind::Class => {
                let class = ptr as *mut GCObject<ClassObject>;
                for &method in (*class).data.methods.values() {
                    mark_object(method.cast(), gray);
                }
            }
            ObjectKind::Instance => {
                let instance = ptr as *mut GCObject<InstanceObject>;
                mark_object((*instance).data.class.cast(), gray);
                for value in (*instance).data.fields.values() {
                    mark_value(*value, gray);
                }
            }
            ObjectKind::BoundMethod => {
                let bound = ptr as *mut GCObject<BoundMethodObject>;
                mark_value((*bound).data.receiver, gray);
                mark_object((*bound).data.method.cast(), gray);
            }
        }
    }
}
