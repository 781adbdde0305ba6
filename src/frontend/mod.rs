pub mod compiler;
pub mod lexer;

pub use compiler::{CompileError, CompileErrors, compile};

#[cfg(test)]
mod tests {
    use crate::backend::vm::LogLevel;
    use crate::backend::vm::heap::Heap;
    use crate::frontend::compiler::compile;

    #[test]
    fn it_compiles() {
        let mut heap = Heap::new();
        let result = compile(
            "
        fun hello_world() {
            print \"Hello, World!\";
        }
        fun make_adder(n) {
            fun adder(x) { return x + n; }
            return adder;
        }
        var x = 10 + 20 * (30 - 5);
        if (x >= 100) {
            print x;
        } else {
            print \"small\";
        }
        while (x < 200) {
            x = x + 1;
        }
        for (var i = 0; i < 3; i = i + 1) {
            hello_world();
        }
        class Box {
            init(v) { this.v = v; }
            get() { return this.v; }
        }
        print Box(42).get();
        ",
            &mut heap,
            LogLevel::Release,
        );
        assert!(result.is_ok(), "compile failed: {:?}", result.err());
    }

    #[test]
    fn errors_are_collected_with_lines() {
        let mut heap = Heap::new();
        let result = compile("var x = ;\nvar y = 1;\nprint y +;", &mut heap, LogLevel::Release);
        let errors = result.err().expect("should not compile").0;
        // 两条语句各报一条，恐慌模式不会把后面整个文件吞掉
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[1].line, 3);
        assert!(errors[0].to_string().contains("Expect expression."));
    }
}
