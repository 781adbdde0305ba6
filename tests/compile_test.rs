use mylox::backend::vm::LogLevel;
use mylox::backend::vm::heap::Heap;
use mylox::frontend::compile;

/// 编译一段必然失败的源代码，拿回渲染好的错误行
fn compile_err(source: &str) -> Vec<String> {
    let mut heap = Heap::new();
    let errors = compile(source, &mut heap, LogLevel::Release)
        .err()
        .expect("source should not compile");
    errors.0.iter().map(|e| e.to_string()).collect()
}

fn compiles(source: &str) -> bool {
    let mut heap = Heap::new();
    compile(source, &mut heap, LogLevel::Release).is_ok()
}

#[test]
fn invalid_assignment_targets() {
    let errors = compile_err("a * b = c;");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Invalid assignment target."));

    assert!(!compiles("(a) = 1;"));
    assert!(!compiles("a + b = 1;"));
    assert!(compiles("a.b = 1;"));
    assert!(compiles("a = b = 1;"));
}

#[test]
fn return_outside_function() {
    let errors = compile_err("return 1;");
    assert!(errors[0].contains("Can't return from top-level code."));
}

#[test]
fn return_value_from_initializer() {
    let errors = compile_err("class C { init() { return 1; } }");
    assert!(errors[0].contains("Can't return a value from an initializer."));
    // 裸 return 在 init 里是允许的
    assert!(compiles("class C { init() { return; } }"));
}

#[test]
fn this_outside_class() {
    let errors = compile_err("print this;");
    assert!(errors[0].contains("Can't use 'this' outside of a class."));
    let errors = compile_err("fun f() { return this; }");
    assert!(errors[0].contains("Can't use 'this' outside of a class."));
    // 方法里嵌套的函数通过 upvalue 拿 this，合法
    assert!(compiles("class C { m() { fun inner() { return this; } return inner; } }"));
}

#[test]
fn local_read_in_own_initializer() {
    let errors = compile_err("{ var a = \"first\"; { var a = a; } }");
    assert!(errors[0].contains("Can't read local variable in its own initializer."));
    // 全局变量没有这个限制，名字在运行时才解析
    assert!(compiles("var a = 1; var a = a;"));
}

#[test]
fn duplicate_local_in_same_scope() {
    let errors = compile_err("{ var a = 1; var a = 2; }");
    assert!(errors[0].contains("Already a variable with this name in this scope."));
    // 深一层作用域遮蔽是合法的
    assert!(compiles("{ var a = 1; { var a = 2; } }"));
}

#[test]
fn super_has_no_parse_rule() {
    // super 是关键字但语法里没有继承，用它就是表达式错误
    let errors = compile_err("print super.m();");
    assert!(errors[0].contains("Expect expression."));
}

#[test]
fn scan_errors_surface_with_line() {
    let errors = compile_err("var a = \"unclosed;");
    assert!(errors[0].contains("[line 1] Error: Unterminated string."));

    let errors = compile_err("var b = 1;\nvar c = @;");
    assert!(errors[0].contains("[line 2] Error: Unexpected character '@'."));
}

#[test]
fn error_locations_name_the_token() {
    let errors = compile_err("var 1 = 2;");
    assert!(errors[0].contains("[line 1] Error at '1': Expect variable name."));

    let errors = compile_err("print 1");
    assert!(errors[0].contains("Error at end"));
}

#[test]
fn panic_mode_recovers_per_statement() {
    // 三条坏语句三条错误，中间的好语句不受影响
    let errors = compile_err("var x = ;\nprint 1;\nvar y = ;\nprint 2;\nvar z = ;");
    assert_eq!(errors.len(), 3);
    assert!(errors[0].contains("[line 1]"));
    assert!(errors[1].contains("[line 3]"));
    assert!(errors[2].contains("[line 5]"));
}

#[test]
fn too_many_locals() {
    let mut source = String::from("{\n");
    for i in 0..300 {
        source.push_str(&format!("var v{} = {};\n", i, i));
    }
    source.push_str("}\n");
    let errors = compile_err(&source);
    assert!(errors.iter().any(|e| e.contains("Too many local variables in function.")));
}

#[test]
fn too_many_constants() {
    // 数字常量不去重，260 个不同字面量挤爆 8 位常量下标
    let mut source = String::new();
    for i in 0..300 {
        source.push_str(&format!("print {}.5;\n", i));
    }
    let errors = compile_err(&source);
    assert!(errors.iter().any(|e| e.contains("Too many constants in one chunk.")));
}

#[test]
fn too_many_parameters_and_arguments() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));
    let errors = compile_err(&source);
    assert!(errors.iter().any(|e| e.contains("Can't have more than 255 parameters.")));

    let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
    let source = format!("fun f() {{}}\nf({});", args.join(", "));
    let errors = compile_err(&source);
    assert!(errors.iter().any(|e| e.contains("Can't have more than 255 arguments.")));
}

#[test]
fn missing_semicolons_and_braces() {
    assert!(!compiles("print 1"));
    assert!(!compiles("{ print 1;"));
    assert!(!compiles("if (true { print 1; }"));
    assert!(!compiles("fun f( { }"));
}

#[test]
fn keywords_are_not_identifiers() {
    assert!(!compiles("var class = 1;"));
    assert!(!compiles("var fun = 1;"));
    assert!(compiles("var classy = 1;"));
}
