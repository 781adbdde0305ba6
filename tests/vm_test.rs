use mylox::backend::vm::VirtualMachine;
use mylox::backend::vm::error::ErrorKind;
use mylox::{InterpretError, interpret};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// print 的输出口换成共享缓冲区，跑完再读出来断言
#[derive(Clone)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn run(source: &str) -> (Result<(), InterpretError>, String) {
    let buffer = SharedBuffer(Rc::new(RefCell::new(Vec::new())));
    let mut vm = VirtualMachine::new();
    vm.out = Box::new(buffer.clone());

    let result = interpret(&mut vm, source);
    drop(vm);

    let output = String::from_utf8(buffer.0.borrow().clone()).unwrap();
    (result, output)
}

fn run_ok(source: &str) -> String {
    let (result, output) = run(source);
    assert!(result.is_ok(), "program failed: {:?}", result.err());
    output
}

fn run_runtime_err(source: &str) -> mylox::backend::vm::error::VMError {
    let (result, _) = run(source);
    match result {
        Err(InterpretError::Runtime(err)) => err,
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
    assert_eq!(run_ok("print (1 + 2) * 3;"), "9\n");
    assert_eq!(run_ok("print 1 + 2 * 3 - 4 / 2;"), "5\n");
    assert_eq!(run_ok("print -2 * 3;"), "-6\n");
}

#[test]
fn division_follows_ieee754() {
    assert_eq!(run_ok("print 1 / 0;"), "inf\n");
    assert_eq!(run_ok("print 0 / 0 == 0 / 0;"), "false\n");
    assert_eq!(run_ok("print 0.1 + 0.2 == 0.3;"), "false\n");
}

#[test]
fn string_interning_makes_concat_equal_literal() {
    assert_eq!(
        run_ok("var a = \"st\"; var b = \"ring\"; print a + b == \"string\";"),
        "true\n"
    );
    assert_eq!(run_ok("print \"abc\" == \"abc\";"), "true\n");
    assert_eq!(run_ok("print \"abc\" == \"abd\";"), "false\n");
}

#[test]
fn truthiness_and_not() {
    assert_eq!(run_ok("print !nil;"), "true\n");
    assert_eq!(run_ok("print !!0;"), "true\n");
    assert_eq!(run_ok("print !!\"\";"), "true\n");
    assert_eq!(run_ok("print !!false;"), "false\n");
}

#[test]
fn print_representations() {
    assert_eq!(run_ok("print nil;"), "nil\n");
    assert_eq!(run_ok("print true; print false;"), "true\nfalse\n");
    assert_eq!(run_ok("print 100;"), "100\n");
    assert_eq!(run_ok("print 0.5;"), "0.5\n");
    assert_eq!(run_ok("print \"hi there\";"), "hi there\n");
    assert_eq!(run_ok("fun foo() {} print foo;"), "<fn foo>\n");
    assert_eq!(run_ok("print clock;"), "<native fn>\n");
    assert_eq!(run_ok("class Foo {} print Foo;"), "Foo\n");
    assert_eq!(run_ok("class Foo {} print Foo();"), "Foo instance\n");
}

#[test]
fn short_circuit_keeps_operand_values() {
    // and/or 返回操作数本身，不折算成布尔
    assert_eq!(run_ok("print nil or \"fallback\";"), "fallback\n");
    assert_eq!(run_ok("print 1 or 2;"), "1\n");
    assert_eq!(run_ok("print false and 1;"), "false\n");
    assert_eq!(run_ok("print 1 and 2;"), "2\n");
}

#[test]
fn short_circuit_skips_side_effects() {
    assert_eq!(
        run_ok(
            "var n = 0;
             fun bump() { n = n + 1; return true; }
             false and bump();
             true or bump();
             print n;"
        ),
        "0\n"
    );
}

#[test]
fn control_flow() {
    assert_eq!(
        run_ok("if (1 < 2) { print \"then\"; } else { print \"else\"; }"),
        "then\n"
    );
    assert_eq!(
        run_ok("if (1 > 2) { print \"then\"; } else { print \"else\"; }"),
        "else\n"
    );
    assert_eq!(
        run_ok("var i = 0; while (i < 3) { print i; i = i + 1; }"),
        "0\n1\n2\n"
    );
    assert_eq!(
        run_ok("var sum = 0; for (var i = 1; i <= 10; i = i + 1) { sum = sum + i; } print sum;"),
        "55\n"
    );
    assert_eq!(run_ok("for (var i = 0; i < 2; i = i + 1) print i;"), "0\n1\n");
}

#[test]
fn globals_are_late_bound_and_redefinable() {
    assert_eq!(
        run_ok("fun get() { return g; } var g = 3; print get();"),
        "3\n"
    );
    assert_eq!(run_ok("var a = 1; var a = 2; print a;"), "2\n");
    assert_eq!(run_ok("var a = 1; a = 5; print a;"), "5\n");
}

#[test]
fn locals_shadow_and_unwind() {
    assert_eq!(
        run_ok(
            "var a = \"global\";
             {
               var a = \"outer\";
               {
                 var a = \"inner\";
                 print a;
               }
               print a;
             }
             print a;"
        ),
        "inner\nouter\nglobal\n"
    );
}

#[test]
fn function_calls_and_recursion() {
    assert_eq!(
        run_ok("fun add(a, b) { return a + b; } print add(1, 2);"),
        "3\n"
    );
    assert_eq!(
        run_ok(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
             print fib(10);"
        ),
        "55\n"
    );
    assert_eq!(run_ok("fun noret() {} print noret();"), "nil\n");
}

#[test]
fn closure_counter_keeps_state() {
    assert_eq!(
        run_ok(
            "fun outer() { var x = 1; fun inner() { x = x + 1; return x; } return inner; }
             var c = outer(); print c(); print c(); print c();"
        ),
        "2\n3\n4\n"
    );
}

#[test]
fn sibling_closures_share_one_cell() {
    assert_eq!(
        run_ok(
            "fun make() { var x = 0;
               fun inc() { x = x + 1; } fun get() { return x; }
               inc(); inc(); return get; }
             print make()();"
        ),
        "2\n"
    );
}

#[test]
fn upvalue_closes_when_scope_exits() {
    assert_eq!(
        run_ok(
            "var f;
             {
               var i = 5;
               fun g() { return i; }
               f = g;
             }
             print f();"
        ),
        "5\n"
    );
}

#[test]
fn class_with_init_and_method() {
    assert_eq!(
        run_ok("class Box { init(v) { this.v = v; } get() { return this.v; } } print Box(42).get();"),
        "42\n"
    );
}

#[test]
fn fields_and_methods() {
    assert_eq!(
        run_ok(
            "class Pair {}
             var p = Pair();
             p.first = 1;
             p.second = 2;
             print p.first + p.second;"
        ),
        "3\n"
    );
    // 字段遮蔽同名方法
    assert_eq!(
        run_ok(
            "class C { m() { return \"method\"; } }
             var c = C();
             print c.m();
             fun repl() { return \"field\"; }
             c.m = repl;
             print c.m();"
        ),
        "method\nfield\n"
    );
}

#[test]
fn detached_method_keeps_receiver() {
    assert_eq!(
        run_ok(
            "class Counter {
               init() { this.n = 0; }
               bump() { this.n = this.n + 1; return this.n; }
             }
             var c = Counter();
             var bump = c.bump;
             bump(); bump();
             print c.n;"
        ),
        "2\n"
    );
}

#[test]
fn initializer_returns_the_instance() {
    assert_eq!(
        run_ok(
            "class C { init() { this.ready = true; } }
             var c = C();
             print c.ready;"
        ),
        "true\n"
    );
    assert_eq!(
        run_ok("class C { init() { return; } } print C() == nil;"),
        "false\n"
    );
}

#[test]
fn undefined_variable_has_trace() {
    let err = run_runtime_err("print nope;");
    assert!(matches!(err.kind, ErrorKind::UndefinedVariable(ref n) if n == "nope"));
    assert_eq!(err.stack_trace, vec!["[line 1] in script".to_string()]);
}

#[test]
fn runtime_error_trace_is_innermost_first() {
    let err = run_runtime_err("fun inner() {\n  return 1 + nil;\n}\nfun outer() {\n  return inner();\n}\nouter();");
    assert!(matches!(err.kind, ErrorKind::TypeError(_)));
    assert_eq!(err.stack_trace.len(), 3);
    assert_eq!(err.stack_trace[0], "[line 2] in inner()");
    assert_eq!(err.stack_trace[1], "[line 5] in outer()");
    assert_eq!(err.stack_trace[2], "[line 7] in script");
}

#[test]
fn arity_is_checked_exactly() {
    assert_eq!(run_ok("fun f(a, b) { return a; } print f(1, 2);"), "1\n");

    let err = run_runtime_err("fun f(a, b) {} f(1);");
    assert!(matches!(
        err.kind,
        ErrorKind::ArityMismatch { expected: 2, got: 1 }
    ));

    let err = run_runtime_err("class C {} C(1);");
    assert!(matches!(
        err.kind,
        ErrorKind::ArityMismatch { expected: 0, got: 1 }
    ));
}

#[test]
fn type_errors() {
    let err = run_runtime_err("print 1 + \"a\";");
    assert!(matches!(err.kind, ErrorKind::TypeError(_)));
    assert_eq!(err.get_message(), "Operands must be two numbers or two strings.");

    let err = run_runtime_err("print -\"a\";");
    assert_eq!(err.get_message(), "Operand must be a number.");

    let err = run_runtime_err("print 1 < \"a\";");
    assert_eq!(err.get_message(), "Operands must be numbers.");

    let err = run_runtime_err("var x = 4; x();");
    assert_eq!(err.get_message(), "Can only call functions and classes.");

    let err = run_runtime_err("var x = 1; x.field = 2;");
    assert_eq!(err.get_message(), "Only instances have fields.");

    let err = run_runtime_err("print \"str\".length;");
    assert_eq!(err.get_message(), "Only instances have properties.");
}

#[test]
fn assigning_undefined_global_fails() {
    let err = run_runtime_err("missing = 1;");
    assert!(matches!(err.kind, ErrorKind::UndefinedVariable(ref n) if n == "missing"));
}

#[test]
fn undefined_property_and_method() {
    let err = run_runtime_err("class C {} C().missing;");
    assert!(matches!(err.kind, ErrorKind::UndefinedProperty(ref n) if n == "missing"));

    let err = run_runtime_err("class C {} C().missing();");
    assert!(matches!(err.kind, ErrorKind::UndefinedProperty(ref n) if n == "missing"));
}

#[test]
fn deep_recursion_overflows_call_stack() {
    let err = run_runtime_err("fun f() { f(); } f();");
    assert!(matches!(err.kind, ErrorKind::StackOverflow));
    assert_eq!(err.get_message(), "Stack overflow.");
}

#[test]
fn invoke_falls_back_to_field_closure() {
    assert_eq!(
        run_ok(
            "class Holder {}
             var h = Holder();
             fun shout() { return \"loud\"; }
             h.speak = shout;
             print h.speak();"
        ),
        "loud\n"
    );
}

#[test]
fn clock_is_monotonic_number() {
    assert_eq!(
        run_ok("var t0 = clock(); var t1 = clock(); print t1 >= t0; print t0 >= 0;"),
        "true\ntrue\n"
    );
}

#[test]
fn stack_is_clean_after_each_statement() {
    // 跑完之后 VM 的值栈和帧栈都应该清空
    let mut vm = VirtualMachine::new();
    vm.out = Box::new(std::io::sink());
    interpret(&mut vm, "var a = 1; { var b = 2; a = a + b; } if (a > 0) { a = 0; }").unwrap();
    assert!(vm.value_stack.values.is_empty());
    assert!(vm.call_stack.is_empty());
}

#[test]
fn globals_survive_between_interpret_calls() {
    // REPL 模式的支撑：同一个 VM 连续跑多段源代码
    let mut vm = VirtualMachine::new();
    vm.out = Box::new(std::io::sink());
    interpret(&mut vm, "var counter = 10;").unwrap();
    interpret(&mut vm, "counter = counter + 5;").unwrap();
    use mylox::common::object::LoxValue;
    assert_eq!(vm.globals.get("counter"), Some(&LoxValue::Number(15.0)));
}
