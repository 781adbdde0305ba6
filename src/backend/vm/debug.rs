// 反汇编器，只在 Debug / Trace 日志级别下被调用
use crate::common::chunk::Chunk;
use crate::common::object::LoxValue;
use crate::common::opcode::OpCode;

pub fn disassemble_chunk(chunk: &Chunk, name: &str) {
    println!("== {} ==", name);
    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, offset);
    }
}

/// 打印一条指令，返回下一条的偏移
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> usize {
    print!("{:04} ", offset);
    let line = chunk.line_of(offset);
    if offset > 0 && line == chunk.line_of(offset - 1) {
        print!("   | ");
    } else {
        print!("{:4} ", line);
    }

    let byte = chunk.code[offset];
    let op = match OpCode::try_from(byte) {
        Ok(op) => op,
        Err(_) => {
            println!("Unknown opcode 0x{:02X}", byte);
            return offset + 1;
        }
    };

    match op {
        OpCode::Constant
        | OpCode::GetGlobal
        | OpCode::DefineGlobal
        | OpCode::SetGlobal
        | OpCode::GetProperty
        | OpCode::SetProperty
        | OpCode::Class
        | OpCode::Method => constant_instruction(chunk, op, offset),

        OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::GetUpvalue
        | OpCode::SetUpvalue
        | OpCode::Call => byte_instruction(chunk, op, offset),

        OpCode::Jump | OpCode::JumpIfFalse => jump_instruction(chunk, op, 1, offset),
        OpCode::Loop => jump_instruction(chunk, op, -1, offset),

        OpCode::Invoke => invoke_instruction(chunk, op, offset),
        OpCode::Closure => closure_instruction(chunk, offset),

        _ => {
            println!("{}", op);
            offset + 1
        }
    }
}

fn constant_instruction(chunk: &Chunk, op: OpCode, offset: usize) -> usize {
    let idx = chunk.code[offset + 1];
    let value = chunk.constants[idx as usize];
    println!("{:<16} {:4} '{}'", op.to_string(), idx, value.display());
    offset + 2
}

fn byte_instruction(chunk: &Chunk, op: OpCode, offset: usize) -> usize {
    let operand = chunk.code[offset + 1];
    println!("{:<16} {:4}", op.to_string(), operand);
    offset + 2
}

fn jump_instruction(chunk: &Chunk, op: OpCode, sign: i64, offset: usize) -> usize {
    let jump = ((chunk.code[offset + 1] as u16) << 8) | chunk.code[offset + 2] as u16;
    let target = offset as i64 + 3 + sign * jump as i64;
    println!("{:<16} {:4} -> {}", op.to_string(), offset, target);
    offset + 3
}

fn invoke_instruction(chunk: &Chunk, op: OpCode, offset: usize) -> usize {
    let name_idx = chunk.code[offset + 1];
    let argc = chunk.code[offset + 2];
    let name = chunk.constants[name_idx as usize];
    println!(
        "{:<16} ({} args) {:4} '{}'",
        op.to_string(),
        argc,
        name_idx,
        name.display()
    );
    offset + 3
}

/// Closure 的操作数是变长的：常量下标后面跟 upvalue_count 对来源说明
fn closure_instruction(chunk: &Chunk, offset: usize) -> usize {
    let mut offset = offset + 1;
    let const_idx = chunk.code[offset];
    offset += 1;
    let value = chunk.constants[const_idx as usize];
    println!("{:<16} {:4} {}", "Closure", const_idx, value.display());

    let upvalue_count = match value {
        LoxValue::Function(ptr) => unsafe { (*ptr).data.upvalue_count },
        _ => 0,
    };
    for _ in 0..upvalue_count {
        let is_local = chunk.code[offset];
        let index = chunk.code[offset + 1];
        println!(
            "{:04}      |                     {} {}",
            offset,
            if is_local == 1 { "local" } else { "upvalue" },
            index
        );
        offset += 2;
    }
    offset
}
