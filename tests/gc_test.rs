use mylox::backend::vm::VirtualMachine;
use mylox::common::object::LoxValue;
use mylox::interpret;

fn run_vm(source: &str) -> VirtualMachine {
    let mut vm = VirtualMachine::new();
    vm.out = Box::new(std::io::sink());
    interpret(&mut vm, source).expect("program should run");
    vm
}

#[test]
fn transient_strings_are_collected() {
    // 每轮拼接都造一个只活一轮的字符串，总分配量远超阈值，
    // 活下来的只有最后一个，GC 不跑的话 max 和 current 会一样大
    let vm = run_vm(
        "var s = \"\";
         for (var i = 0; i < 2000; i = i + 1) {
           s = s + \"x\";
         }
         var done = s == s;",
    );
    assert!(
        vm.heap.max_allocated > vm.heap.total_allocated,
        "GC never reclaimed anything: max {} vs current {}",
        vm.heap.max_allocated,
        vm.heap.total_allocated
    );
    // 活堆应该只剩脚本、少量驻留串和最后那条 2000 字节的字符串
    assert!(
        vm.heap.total_allocated < 4 * 1024 * 1024,
        "live heap too large: {}",
        vm.heap.total_allocated
    );
}

#[test]
fn live_closures_survive_gc_pressure() {
    let vm = run_vm(
        "fun make_counter() {
           var n = 0;
           fun inc() { n = n + 1; return n; }
           return inc;
         }
         var c = make_counter();
         c(); c();
         var junk = \"\";
         for (var i = 0; i < 2000; i = i + 1) {
           junk = junk + \"y\";
         }
         var after = c();",
    );
    // 闭包和它关闭的 upvalue 在整场 GC 压力下都活着，计数没丢
    assert_eq!(vm.globals.get("after"), Some(&LoxValue::Number(3.0)));
}

#[test]
fn interned_strings_are_reference_equal() {
    let vm = run_vm("var a = \"hello\"; var b = \"hello\"; var c = \"hel\" + \"lo\";");
    let a = vm.globals.get("a").copied().unwrap();
    let b = vm.globals.get("b").copied().unwrap();
    let c = vm.globals.get("c").copied().unwrap();
    match (a, b, c) {
        (LoxValue::Str(pa), LoxValue::Str(pb), LoxValue::Str(pc)) => {
            assert_eq!(pa, pb, "identical literals must share one object");
            assert_eq!(pa, pc, "concatenation result must intern to the same object");
        }
        other => panic!("expected three strings, got {:?}", other),
    }
}

#[test]
fn instances_keep_their_fields_through_gc() {
    let vm = run_vm(
        "class Node { init(v) { this.v = v; } }
         var keep = Node(7);
         var junk = \"\";
         for (var i = 0; i < 2000; i = i + 1) {
           junk = junk + \"z\";
           var throwaway = Node(i);
         }
         var v = keep.v;",
    );
    assert_eq!(vm.globals.get("v"), Some(&LoxValue::Number(7.0)));
}

#[test]
fn heap_accounting_reaches_zero_after_drop() {
    // Drop 按全对象链表逐个释放，没有双重释放也没有遗漏就不会崩
    let vm = run_vm("var s = \"live\"; fun f() { return s; } var g = f;");
    drop(vm);
}

#[test]
fn allocation_accounting_is_consistent() {
    let vm = run_vm("var x = 1;");
    let baseline = vm.heap.total_allocated;
    assert!(baseline > 0, "script function itself lives on the heap");

    let vm2 = run_vm("var x = 1; var more = \"some extra string data here\";");
    assert!(vm2.heap.total_allocated > baseline);
    assert!(vm2.heap.max_allocated >= vm2.heap.total_allocated);
}
