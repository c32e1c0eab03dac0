//! Binary `.scm` body emitter: two passes over the lowered instruction
//! stream, first assigning every label a byte offset, then writing tagged
//! operands at those offsets (see `SPEC_FULL.md` §4.4).
//!
//! Pseudo-instructions the lowerer synthesizes (`GOTO`, `SET`, `ANDOR`,
//! the flattened comparisons, `SWITCH_START`/`SWITCH_CONTINUED`) are not
//! present in the XML command database, so they're assigned fixed opcodes
//! in a reserved range above any real command's opcode space.

use super::int_width;
use crate::command_db::CommandDatabase;
use crate::lower::{Instruction, Item, Operand};
use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    UnresolvedLabel(String),
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::UnresolvedLabel(name) => write!(f, "label '{name}' was never defined"),
        }
    }
}

impl std::error::Error for CodegenError {}

const ARG_INT32: u8 = 0x01;
const ARG_GLOBAL_VAR: u8 = 0x02;
const ARG_LOCAL_VAR: u8 = 0x03;
const ARG_INT8: u8 = 0x04;
const ARG_INT16: u8 = 0x05;
const ARG_FLOAT: u8 = 0x06;
const ARG_TEXT_LABEL: u8 = 0x08;
const ARG_STRING8: u8 = 0x09;

const NEGATED_BIT: u16 = 0x8000;

fn pseudo_opcode(name: &str) -> Option<u16> {
    // Reserved block: real command opcodes loaded from the XML database
    // never reach this high, so collisions aren't possible.
    let opcode = match name {
        "GOTO" => 0xFF01,
        "SET" => 0xFF02,
        "ANDOR" => 0xFF03,
        "JUMP_IF_FALSE" => 0xFF04,
        "ADD_VAL" => 0xFF05,
        "IS_GREATER" => 0xFF06,
        "IS_EQUAL_TO" => 0xFF07,
        "IS_GREATER_THAN" => 0xFF08,
        "IS_LOWER_THAN" => 0xFF09,
        "CONDITION" => 0xFF0A,
        "SWITCH_START" => 0xFF0B,
        "SWITCH_CONTINUED" => 0xFF0C,
        _ => return None,
    };
    Some(opcode)
}

fn resolve_opcode(db: &CommandDatabase, name: &str) -> u16 {
    db.find_command(name).map(|c| c.opcode).or_else(|| pseudo_opcode(name)).unwrap_or(0xFFFF)
}

fn operand_size(operand: &Operand) -> u32 {
    match operand {
        Operand::Int(v) => 1 + match int_width(*v) {
            super::IntWidth::I8 => 1,
            super::IntWidth::I16 => 2,
            super::IntWidth::I32 => 4,
        },
        Operand::Float(_) => 1 + 4,
        Operand::GlobalVar(_) | Operand::LocalVar(_) => 1 + 2,
        Operand::TextLabel(_) => 1 + 8,
        Operand::StringLit(s) => 1 + 1 + s.len().min(255) as u32,
        Operand::Label(_) => 1 + 4,
    }
}

fn instruction_size(instr: &Instruction) -> u32 {
    2 + instr.args.iter().map(operand_size).sum::<u32>()
}

/// Pass one: maps every label name to its byte offset within the
/// instruction stream (offset `0` is the stream's first instruction).
pub fn resolve_positions(items: &[Item]) -> IndexMap<String, u32> {
    let mut offset = 0u32;
    let mut positions = IndexMap::new();
    for item in items {
        match item {
            Item::Label(name) => {
                positions.insert(name.clone(), offset);
            }
            Item::Instr(instr) => offset += instruction_size(instr),
        }
    }
    positions
}

/// Pass two: writes the instruction stream's bytes, resolving every label
/// operand against `positions`. Fails if a label was referenced but never
/// defined (a lowering bug, not a user error — the analyzer already
/// rejects gotos to nonexistent labels upstream).
pub fn emit(
    items: &[Item],
    db: &CommandDatabase,
    relax_not: bool,
    use_local_offsets: bool,
) -> Result<Vec<u8>, CodegenError> {
    let positions = resolve_positions(items);
    let mut out = Vec::new();
    for item in items {
        let Item::Instr(instr) = item else { continue };
        let mut opcode = resolve_opcode(db, &instr.opcode);
        if instr.negated {
            if relax_not {
                // `relax_not` drops the high-bit convention; the negation
                // is left for the analyzer's surface-syntax NOT handling.
            } else {
                opcode |= NEGATED_BIT;
            }
        }
        out.extend_from_slice(&opcode.to_le_bytes());
        for arg in &instr.args {
            write_operand(&mut out, arg, &positions, use_local_offsets)?;
        }
    }
    Ok(out)
}

fn write_operand(
    out: &mut Vec<u8>,
    operand: &Operand,
    positions: &IndexMap<String, u32>,
    use_local_offsets: bool,
) -> Result<(), CodegenError> {
    match operand {
        Operand::Int(v) => match int_width(*v) {
            super::IntWidth::I8 => {
                out.push(ARG_INT8);
                out.push(*v as i8 as u8);
            }
            super::IntWidth::I16 => {
                out.push(ARG_INT16);
                out.extend_from_slice(&(*v as i16).to_le_bytes());
            }
            super::IntWidth::I32 => {
                out.push(ARG_INT32);
                out.extend_from_slice(&(*v as i32).to_le_bytes());
            }
        },
        Operand::Float(v) => {
            out.push(ARG_FLOAT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Operand::GlobalVar(index) => {
            out.push(ARG_GLOBAL_VAR);
            out.extend_from_slice(&(*index as u16).to_le_bytes());
        }
        Operand::LocalVar(index) => {
            out.push(ARG_LOCAL_VAR);
            out.extend_from_slice(&(*index as u16).to_le_bytes());
        }
        Operand::TextLabel(name) => {
            out.push(ARG_TEXT_LABEL);
            let mut buf = [0u8; 8];
            let bytes = name.as_bytes();
            let n = bytes.len().min(8);
            buf[..n].copy_from_slice(&bytes[..n]);
            out.extend_from_slice(&buf);
        }
        Operand::StringLit(s) => {
            out.push(ARG_STRING8);
            let n = s.len().min(255);
            out.push(n as u8);
            out.extend_from_slice(&s.as_bytes()[..n]);
        }
        Operand::Label(name) => {
            let position = *positions.get(name).ok_or_else(|| CodegenError::UnresolvedLabel(name.clone()))?;
            let value = if use_local_offsets { -(position as i32) } else { position as i32 };
            out.push(ARG_INT32);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;
    use crate::options::Options;
    use crate::parser::parse_script;
    use crate::symbol_table::SymbolTable;

    #[test]
    fn unresolved_label_is_rejected() {
        let items = vec![Item::Instr(Instruction {
            opcode: "GOTO".to_string(),
            args: vec![Operand::Label("nowhere".to_string())],
            negated: false,
            line: 1,
        })];
        let db = CommandDatabase::new(false);
        let result = emit(&items, &db, false, false);
        assert_eq!(result, Err(CodegenError::UnresolvedLabel("nowhere".to_string())));
    }

    #[test]
    fn negation_sets_the_high_bit_unless_relaxed() {
        let script = parse_script("main.sc", "IF 1 == 1\nWAIT 0\nENDIF\n").unwrap();
        let symbols = SymbolTable::new("main.sc", false);
        let items = lower("main", &symbols, &script, &Options::default());
        let db = CommandDatabase::new(false);
        // No NOT in this fixture, so this only exercises that emission
        // succeeds end to end with a fully resolvable label set.
        let bytes = emit(&items, &db, false, false).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn smallest_width_chooses_the_shortest_encoding() {
        let items = vec![Item::Instr(Instruction {
            opcode: "WAIT".to_string(),
            args: vec![Operand::Int(5)],
            negated: false,
            line: 1,
        })];
        let mut db = CommandDatabase::new(false);
        db.insert_command(crate::command_db::Command {
            name: "WAIT".to_string(),
            opcode: 1,
            supported: true,
            params: vec![],
            entity_type: None,
            is_keyword: false,
            is_terminator: false,
        });
        let bytes = emit(&items, &db, false, false).unwrap();
        // opcode (2 bytes) + tag (1 byte, ARG_INT8) + value (1 byte)
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes[2], ARG_INT8);
    }
}
