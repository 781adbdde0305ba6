// Mylox heap
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-03-05: Ported the Myula heap over: intrusive all-objects list, string interning pool,
//            byte accounting with a dynamic GC threshold and the HARD_MEMORY_LIMIT backstop.
// 2026-03-10: The pool is now keyed by FNV-1a content hash with per-bucket content comparison,
//            so intern lookups no longer clone the candidate string.
// 2026-03-16: One allocator per object kind (string / function / closure / upvalue / class /
//            instance / bound method); sizes account for the heap-owned capacity of the
//            payload's containers, not just the struct.
// 2026-03-20: Deterministic teardown: Drop walks the all-objects list and frees everything
//            that survived the last collection.
use crate::common::hash::fnv1a;
use crate::common::object::{
    BoundMethodObject, ClassObject, ClosureObject, GCObject, HeaderOnly, InstanceObject,
    LFunction, LoxValue, ObjectKind, StrObject, UpvalueObject,
};
use std::collections::HashMap;

pub struct Heap {
    pub all_objects: *mut GCObject<HeaderOnly>,
    /// 驻留池：内容哈希 -> 同哈希的字符串对象。对 GC 是弱引用，清扫时同步剔除
    pub string_pool: HashMap<u32, Vec<*mut GCObject<StrObject>>>,
    pub total_allocated: usize,
    pub threshold: usize,
    // used for debugging and tuning GC parameters, not used in actual GC logic
    pub max_allocated: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            all_objects: std::ptr::null_mut(),
            string_pool: HashMap::new(),
            total_allocated: 0,
            threshold: crate::backend::vm::VM_THRESHOLD,
            max_allocated: 0,
        }
    }

    /// 字符串全部走驻留：同内容返回同一个对象，相等判断退化成指针相等
    pub fn alloc_string(&mut self, s: String) -> Option<*mut GCObject<StrObject>> {
        let hash = fnv1a(s.as_bytes());
        if let Some(bucket) = self.string_pool.get(&hash) {
            for &ptr in bucket {
                if unsafe { (*ptr).data.chars == s } {
                    return Some(ptr);
                }
            }
        }

        let extra_mem = s.capacity();
        let total_size = std::mem::size_of::<GCObject<StrObject>>() + extra_mem;

        let ptr = self.alloc_raw_object(StrObject { chars: s, hash }, ObjectKind::String, total_size)?;
        self.string_pool.entry(hash).or_default().push(ptr);
        Some(ptr)
    }

    pub fn alloc_function(&mut self, data: LFunction) -> Option<*mut GCObject<LFunction>> {
        let size = std::mem::size_of::<GCObject<LFunction>>()
            + data.chunk.code.capacity()
            + data.chunk.constants.capacity() * std::mem::size_of::<LoxValue>();

        self.alloc_raw_object(data, ObjectKind::Function, size)
    }

    pub fn alloc_closure(&mut self, data: ClosureObject) -> Option<*mut GCObject<ClosureObject>> {
        let size = std::mem::size_of::<GCObject<ClosureObject>>()
            + data.upvalues.capacity() * std::mem::size_of::<*mut GCObject<UpvalueObject>>();

        self.alloc_raw_object(data, ObjectKind::Closure, size)
    }

    pub fn alloc_upvalue(&mut self, data: UpvalueObject) -> Option<*mut GCObject<UpvalueObject>> {
        let size = std::mem::size_of::<GCObject<UpvalueObject>>();
        self.alloc_raw_object(data, ObjectKind::Upvalue, size)
    }

    pub fn alloc_class(&mut self, data: ClassObject) -> Option<*mut GCObject<ClassObject>> {
        let size = std::mem::size_of::<GCObject<ClassObject>>()
            + data.methods.capacity()
                * std::mem::size_of::<(String, *mut GCObject<ClosureObject>)>();

        self.alloc_raw_object(data, ObjectKind::Class, size)
    }

    pub fn alloc_instance(&mut self, data: InstanceObject) -> Option<*mut GCObject<InstanceObject>> {
        let size = std::mem::size_of::<GCObject<InstanceObject>>()
            + data.fields.capacity() * std::mem::size_of::<(String, LoxValue)>();

        self.alloc_raw_object(data, ObjectKind::Instance, size)
    }

    pub fn alloc_bound_method(
        &mut self,
        data: BoundMethodObject,
    ) -> Option<*mut GCObject<BoundMethodObject>> {
        let size = std::mem::size_of::<GCObject<BoundMethodObject>>();
        self.alloc_raw_object(data, ObjectKind::BoundMethod, size)
    }

    fn alloc_raw_object<T>(
        &mut self,
        data: T,
        kind: ObjectKind,
        size: usize,
    ) -> Option<*mut GCObject<T>> {
        if self.total_allocated + size > crate::backend::vm::HARD_MEMORY_LIMIT {
            return None;
        }

        let obj = GCObject {
            mark: false,
            kind,
            size,
            next: self.all_objects,
            data,
        };
        let boxed = Box::new(obj);
        let ptr = Box::into_raw(boxed);
        self.all_objects = ptr as *mut GCObject<HeaderOnly>;

        self.total_allocated += size;

        if self.total_allocated > self.max_allocated {
            self.max_allocated = self.total_allocated;
        }

        Some(ptr)
    }

    pub fn check_gc_condition(&self) -> bool {
        return self.total_allocated > self.threshold;
    }

    /// 回收之后按存活字节数翻倍设下一次触发点
    pub fn expand_threshold(&mut self) {
        self.threshold = self.total_allocated * 2;
    }

    /// 释放单个对象，返回它在全对象链表里的后继。
    /// 字符串要先从驻留池里摘掉，否则池里留下悬垂指针
    pub unsafe fn free_object(
        &mut self,
        ptr: *mut GCObject<HeaderOnly>,
    ) -> *mut GCObject<HeaderOnly> {
        unsafe {
            let next = (*ptr).next;
            let kind = (*ptr).kind;
            let size = (*ptr).size;

            self.total_allocated = self.total_allocated.saturating_sub(size);

            match kind {
                ObjectKind::String => {
                    let str_ptr = ptr as *mut GCObject<StrObject>;
                    let hash = (*str_ptr).data.hash;
                    if let Some(bucket) = self.string_pool.get_mut(&hash) {
                        bucket.retain(|&p| p != str_ptr);
                        if bucket.is_empty() {
                            self.string_pool.remove(&hash);
                        }
                    }
                    let _ = Box::from_raw(str_ptr);
                }
                ObjectKind::Function => {
                    let _ = Box::from_raw(ptr as *mut GCObject<LFunction>);
                }
                ObjectKind::Closure => {
                    let _ = Box::from_raw(ptr as *mut GCObject<ClosureObject>);
                }
                ObjectKind::Upvalue => {
                    let _ = Box::from_raw(ptr as *mut GCObject<UpvalueObject>);
                }
                ObjectKind::Class => {
                    let _ = Box::from_raw(ptr as *mut GCObject<ClassObject>);
                }
                ObjectKind::Instance => {
                    let _ = Box::from_raw(ptr as *mut GCObject<InstanceObject>);
                }
                ObjectKind::BoundMethod => {
                    let _ = Box::from_raw(ptr as *mut GCObject<BoundMethodObject>);
                }
            }

            next
        }
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        let mut curr = self.all_objects;
        while !curr.is_null() {
            curr = unsafe { self.free_object(curr) };
        }
        self.all_objects = std::ptr::null_mut();
    }
}
