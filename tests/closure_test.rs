use mylox::backend::vm::VirtualMachine;
use mylox::common::object::LoxValue;
use mylox::interpret;

fn run_vm(source: &str) -> VirtualMachine {
    let mut vm = VirtualMachine::new();
    vm.out = Box::new(std::io::sink());
    interpret(&mut vm, source).expect("program should run");
    vm
}

fn global_number(vm: &VirtualMachine, name: &str) -> f64 {
    match vm.globals.get(name) {
        Some(LoxValue::Number(n)) => *n,
        other => panic!("global '{}' is not a number: {:?}", name, other),
    }
}

#[test]
fn counters_are_independent() {
    let vm = run_vm(
        "fun make_counter() {
           var n = 0;
           fun inc() { n = n + 1; return n; }
           return inc;
         }
         var a = make_counter();
         var b = make_counter();
         a(); a(); a();
         b();
         var ra = a();
         var rb = b();",
    );
    assert_eq!(global_number(&vm, "ra"), 4.0);
    assert_eq!(global_number(&vm, "rb"), 2.0);
}

#[test]
fn closed_cell_is_shared_after_scope_exit() {
    // 块结束把 v 关进 upvalue，之后 setter 改的和 getter 读的是同一个格子
    let vm = run_vm(
        "var setter; var getter;
         {
           var v = 10;
           fun s() { v = v + 5; }
           fun g() { return v; }
           setter = s;
           getter = g;
         }
         setter();
         setter();
         var result = getter();",
    );
    assert_eq!(global_number(&vm, "result"), 20.0);
}

#[test]
fn capture_through_intermediate_function() {
    // inner 不直接捕获 outer 的局部变量，而是间接引用 middle 的 upvalue
    let vm = run_vm(
        "fun outer() {
           var x = 41;
           fun middle() {
             fun inner() { return x + 1; }
             return inner;
           }
           return middle()();
         }
         var result = outer();",
    );
    assert_eq!(global_number(&vm, "result"), 42.0);
}

#[test]
fn local_function_can_recurse_through_its_own_cell() {
    // fib 是 make_fib 的局部变量，函数体里对自己的引用走 upvalue
    let vm = run_vm(
        "fun make_fib() {
           fun fib(n) {
             if (n < 2) return n;
             return fib(n - 1) + fib(n - 2);
           }
           return fib;
         }
         var f = make_fib();
         var result = f(7);",
    );
    assert_eq!(global_number(&vm, "result"), 13.0);
}

#[test]
fn same_slot_recaptured_after_close_gets_fresh_cell() {
    // 两个块里的 x 占同一个栈槽，第一个关掉后再捕获必须拿到新格子
    let vm = run_vm(
        "var f1; var f2;
         {
           var x = 1;
           fun a() { return x; }
           f1 = a;
         }
         {
           var x = 2;
           fun b() { return x; }
           f2 = b;
         }
         var r1 = f1();
         var r2 = f2();",
    );
    assert_eq!(global_number(&vm, "r1"), 1.0);
    assert_eq!(global_number(&vm, "r2"), 2.0);
}

#[test]
fn loop_variable_is_one_shared_cell() {
    // for 的循环变量整个循环只有一个，两个闭包看到的是同一个格子的最终值
    let vm = run_vm(
        "var first; var second;
         for (var i = 1; i <= 2; i = i + 1) {
           fun capture() { return i; }
           if (first == nil) { first = capture; } else { second = capture; }
         }
         var r1 = first();
         var r2 = second();",
    );
    assert_eq!(global_number(&vm, "r1"), 3.0);
    assert_eq!(global_number(&vm, "r2"), 3.0);
}

#[test]
fn methods_close_over_enclosing_function_locals() {
    let vm = run_vm(
        "fun make_box(start) {
           class Box {
             get() { return start; }
           }
           return Box();
         }
         var b = make_box(9);
         var result = b.get();",
    );
    assert_eq!(global_number(&vm, "result"), 9.0);
}

#[test]
fn open_upvalues_read_and_write_the_live_stack() {
    // 捕获者在定义帧还活着的时候调用，读写都要打到栈上的原槽位
    let vm = run_vm(
        "var observed;
         fun host() {
           var local = 1;
           fun poke() { local = local + 10; }
           poke();
           poke();
           observed = local;
         }
         host();",
    );
    assert_eq!(global_number(&vm, "observed"), 21.0);
}
