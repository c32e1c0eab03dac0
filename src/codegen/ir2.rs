//! Textual IR2 emitter: one instruction per line, operand per token, typed
//! suffixes on every literal. Labels stay symbolic (`@NAME`), which is what
//! makes a compile-to-IR2-and-back round trip idempotent.

use super::{int_width, IntWidth};
use crate::lower::{Instruction, Item, Operand};

pub fn emit(items: &[Item]) -> String {
    let mut out = String::new();
    for item in items {
        match item {
            Item::Label(name) => {
                out.push_str(name);
                out.push_str(":\n");
            }
            Item::Instr(instr) => {
                out.push_str(&format_instruction(instr));
                out.push('\n');
            }
        }
    }
    out
}

fn format_instruction(instr: &Instruction) -> String {
    let mut line = String::new();
    if instr.negated {
        line.push_str("NOT ");
    }
    line.push_str(&instr.opcode);
    for arg in &instr.args {
        line.push(' ');
        line.push_str(&format_operand(arg));
    }
    line
}

fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Int(v) => format!("{v}{}", suffix_for(*v)),
        Operand::Float(v) => format!("{v}f"),
        Operand::GlobalVar(index) => format!("&{index}"),
        Operand::LocalVar(index) => format!("{index}@"),
        Operand::TextLabel(name) => name.clone(),
        Operand::StringLit(s) => format!("\"{s}\""),
        Operand::Label(name) => format!("@{name}"),
    }
}

fn suffix_for(v: i64) -> &'static str {
    match int_width(v) {
        IntWidth::I8 => "i8",
        IntWidth::I16 => "i16",
        IntWidth::I32 => "i32",
    }
}
