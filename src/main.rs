use clap::Parser;
use mylox::backend::vm::{LogLevel, VirtualMachine};
use mylox::{InterpretError, interpret};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "mylox")]
#[command(version = "1.0")]
#[command(author = "Yuyang Feng && Zimeng Li")]
#[command(about = "Mylox: A bytecode compiler and VM for the Lox language", long_about = None)]
struct Cli {
    /// 不给路径进 REPL，给一个就跑文件
    input: Vec<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = LogLevel::Release)]
    mode: LogLevel,
}

// sysexits 风格的退出码
const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_SOFTWARE: u8 = 70;
const EX_IOERR: u8 = 74;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.input.len() {
        0 => repl(cli.mode),
        1 => run_file(&cli.input[0], cli.mode),
        _ => {
            eprintln!("Usage: mylox [path]");
            ExitCode::from(EX_USAGE)
        }
    }
}

fn run_file(path: &PathBuf, mode: LogLevel) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("[Error] Could not read source file {}: {}", path.display(), err);
            return ExitCode::from(EX_IOERR);
        }
    };

    let mut vm = VirtualMachine::new();
    vm.log_level = mode;

    match interpret(&mut vm, &source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(InterpretError::Compile(errors)) => {
            eprintln!("{}", errors);
            ExitCode::from(EX_DATAERR)
        }
        // 运行时错误在 VM 的 run 循环里已经带着栈回溯打印过了
        Err(InterpretError::Runtime(_)) => ExitCode::from(EX_SOFTWARE),
    }
}

/// 一个 VM 撑起整个会话，前面定义的全局变量后面接着用
fn repl(mode: LogLevel) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("[Error] Could not initialize line editor: {}", err);
            return ExitCode::from(EX_IOERR);
        }
    };

    let mut vm = VirtualMachine::new();
    vm.log_level = mode;

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                match interpret(&mut vm, &line) {
                    Ok(()) => {}
                    Err(InterpretError::Compile(errors)) => eprintln!("{}", errors),
                    // 运行时错误已经打印过，栈也重置了，继续读下一行
                    Err(InterpretError::Runtime(_)) => {}
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("[Error] {}", err);
                break;
            }
        }
    }
    ExitCode::SUCCESS
}
