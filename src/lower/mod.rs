//! Control-flow lowering: turns the structured AST into a flat sequence of
//! [`Item`]s — instructions and label markers — with explicit `GOTO`s in
//! place of `IF`/`WHILE`/`REPEAT`/`SWITCH` nesting. The code generator walks
//! this sequence twice (see [`crate::codegen`]): once to resolve every
//! label to a position, once to emit.

use crate::ast::{BinaryOp, Expr, Script, Statement, UnaryOp};
use crate::options::Options;
use crate::symbol_table::{SymbolTable, VariableScope};
use itertools::Itertools;

/// A single instruction operand. Integer width is not fixed here: the code
/// generator picks the smallest width that holds the value, independently
/// for every operand (see `SPEC_FULL.md` §4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int(i64),
    Float(f32),
    GlobalVar(u32),
    LocalVar(u32),
    TextLabel(String),
    StringLit(String),
    /// A reference to a label, resolved to a position by the code generator.
    Label(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: String,
    pub args: Vec<Operand>,
    /// Set when this instruction's first argument was logically negated by
    /// a `NOT`; `relax_not` governs how the generator encodes it.
    pub negated: bool,
    pub line: u32,
}

impl Instruction {
    fn new(opcode: impl Into<String>, args: Vec<Operand>, line: u32) -> Self {
        Instruction { opcode: opcode.into(), args, negated: false, line }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Instr(Instruction),
    /// Defines `name` at the position this item occupies in the stream.
    Label(String),
}

struct Lowerer<'a> {
    script_name: &'a str,
    symbols: &'a SymbolTable,
    options: &'a Options,
    next_seq: u32,
    items: Vec<Item>,
    /// `(break_target, continue_target)`, pushed by every breakable
    /// construct (`WHILE`, `REPEAT`, `SWITCH`).
    targets: Vec<(String, String)>,
}

/// Lowers `script`'s statements into a flat instruction stream, using
/// `symbols` (already populated by [`crate::sema::analyze`]) to resolve
/// variable and label references, and `options` to pick between the
/// jump-based and fused `skip_single_ifs` encodings for `IF`.
pub fn lower(script_name: &str, symbols: &SymbolTable, script: &Script, options: &Options) -> Vec<Item> {
    let mut lowerer = Lowerer {
        script_name,
        symbols,
        options,
        next_seq: 1,
        items: Vec::new(),
        targets: Vec::new(),
    };
    lowerer.lower_statements(&script.statements);
    lowerer.items
}

impl<'a> Lowerer<'a> {
    fn new_label(&mut self) -> String {
        let name = format!("{}_{}", self.script_name, self.next_seq);
        self.next_seq += 1;
        name
    }

    fn emit(&mut self, instr: Instruction) {
        self.items.push(Item::Instr(instr));
    }

    fn label_here(&mut self, name: String) {
        self.items.push(Item::Label(name));
    }

    fn operand(&self, expr: &Expr) -> Operand {
        match expr {
            Expr::IntLiteral(v) => Operand::Int(*v),
            Expr::FloatLiteral(v) => Operand::Float(*v),
            Expr::StringLiteral(s) => Operand::StringLit(s.clone()),
            Expr::Identifier(name) => {
                if let Some(variable) = self.symbols.resolve_variable(name) {
                    match variable.scope {
                        VariableScope::Global => Operand::GlobalVar(variable.index),
                        VariableScope::Local | VariableScope::MissionLocal => Operand::LocalVar(variable.index),
                    }
                } else if self.symbols.resolve_label(name).is_some() {
                    Operand::Label(name.clone())
                } else {
                    Operand::LocalVar(0)
                }
            }
            Expr::Call { name, args } => {
                // A command invoked for its return value: represented the
                // same as a direct reference to the command's opcode result
                // is not modeled; fall back to its first argument or a
                // string placeholder so lowering never panics on this rare
                // shape.
                args.first().map(|a| self.operand(a)).unwrap_or(Operand::StringLit(name.clone()))
            }
            Expr::Binary { lhs, .. } => self.operand(lhs),
            Expr::Unary { operand, .. } => self.operand(operand),
        }
    }

    fn lower_statements(&mut self, statements: &[Statement]) {
        for statement in statements {
            self.lower_statement(statement);
        }
    }

    fn lower_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Label { name, .. } => self.label_here(name.clone()),
            Statement::ScriptName { .. } => {}
            Statement::Scope { body, .. } => self.lower_statements(body),
            Statement::Command { span, name, args } => {
                let operands = args.iter().map(|a| self.operand(a)).collect();
                self.emit(Instruction::new(name.clone(), operands, span.line));
            }
            Statement::Assign { span, target, value } => {
                let value_operand = self.operand(value);
                let target_operand = self.operand(&Expr::Identifier(target.clone()));
                self.emit(Instruction::new("SET", vec![target_operand, value_operand], span.line));
            }
            Statement::If { span, condition, then_body, else_body } => {
                self.lower_if(span.line, condition, then_body, else_body)
            }
            Statement::While { span, condition, body } => self.lower_while(span.line, condition, body),
            Statement::Repeat { span, count, counter, body } => {
                self.lower_repeat(span.line, count, counter, body)
            }
            Statement::Switch { span, discriminant, cases, default } => {
                self.lower_switch(span.line, discriminant, cases, default.as_deref())
            }
            Statement::Break(_) => {
                let target = self.targets.last().map(|(b, _)| b.clone()).unwrap_or_default();
                self.emit(Instruction::new("GOTO", vec![Operand::Label(target)], statement.span().line));
            }
            Statement::Continue(_) => {
                let target = self.targets.last().map(|(_, c)| c.clone()).unwrap_or_default();
                self.emit(Instruction::new("GOTO", vec![Operand::Label(target)], statement.span().line));
            }
        }
    }

    fn lower_if(&mut self, line: u32, condition: &Expr, then_body: &[Statement], else_body: &[Statement]) {
        if self.options.skip_single_ifs && then_body.len() == 1 && else_body.is_empty() {
            // A single-statement, no-else IF needs no jump at all: the
            // condition leaves a flag that gates only the very next
            // instruction, so the then-statement is simply emitted in place.
            self.emit_condition_flags(line, condition);
            self.lower_statement(&then_body[0]);
            return;
        }

        let else_or_end = self.new_label();
        self.emit_condition_jump(line, condition, &else_or_end);
        self.lower_statements(then_body);
        if else_body.is_empty() {
            self.label_here(else_or_end);
        } else {
            let end = self.new_label();
            self.emit(Instruction::new("GOTO", vec![Operand::Label(end.clone())], line));
            self.label_here(else_or_end);
            self.lower_statements(else_body);
            self.label_here(end);
        }
    }

    fn lower_while(&mut self, line: u32, condition: &Expr, body: &[Statement]) {
        let top = self.new_label();
        let end = self.new_label();
        self.label_here(top.clone());
        self.emit_condition_jump(line, condition, &end);
        self.targets.push((end.clone(), top.clone()));
        self.lower_statements(body);
        self.targets.pop();
        self.emit(Instruction::new("GOTO", vec![Operand::Label(top)], line));
        self.label_here(end);
    }

    fn lower_repeat(&mut self, line: u32, count: &Expr, counter: &str, body: &[Statement]) {
        let counter_operand = self.operand(&Expr::Identifier(counter.to_string()));
        self.emit(Instruction::new("SET", vec![counter_operand.clone(), Operand::Int(0)], line));
        let top = self.new_label();
        let end = self.new_label();
        self.label_here(top.clone());
        self.targets.push((end.clone(), top.clone()));
        self.lower_statements(body);
        self.targets.pop();
        self.emit(Instruction::new("ADD_VAL", vec![counter_operand.clone(), Operand::Int(1)], line));
        let count_operand = self.operand(count);
        self.emit(Instruction::new("IS_GREATER", vec![counter_operand, count_operand], line));
        self.emit(Instruction::new("JUMP_IF_FALSE", vec![Operand::Label(top)], line));
        self.label_here(end);
    }

    /// Flattens `condition` into a chain of comparison instructions joined
    /// by an implicit `ANDOR`, leaving its result as a flag rather than
    /// acting on it — shared by [`Self::emit_condition_jump`] and the
    /// `skip_single_ifs` fused form in [`Self::lower_if`].
    fn emit_condition_flags(&mut self, line: u32, condition: &Expr) {
        let mut leaves = Vec::new();
        let mut mode_is_or = false;
        self.flatten_condition(condition, &mut leaves, &mut mode_is_or, false);

        if leaves.len() > 1 {
            let andor_value = if mode_is_or { 20 + leaves.len() as i64 } else { leaves.len() as i64 };
            for leaf in &leaves {
                self.emit(leaf.clone());
            }
            self.emit(Instruction::new("ANDOR", vec![Operand::Int(andor_value)], line));
        } else if let Some(leaf) = leaves.into_iter().next() {
            self.emit(leaf);
        }
    }

    /// Flattens `condition` (see [`Self::emit_condition_flags`]), then a
    /// `JUMP_IF_FALSE` to `target` — mirroring the target VM's flag-based
    /// conditional encoding.
    fn emit_condition_jump(&mut self, line: u32, condition: &Expr, target: &str) {
        self.emit_condition_flags(line, condition);
        self.emit(Instruction::new("JUMP_IF_FALSE", vec![Operand::Label(target.to_string())], line));
    }

    fn flatten_condition(&mut self, expr: &Expr, out: &mut Vec<Instruction>, mode_is_or: &mut bool, negate: bool) {
        match expr {
            Expr::Binary { op: BinaryOp::And, lhs, rhs } => {
                self.flatten_condition(lhs, out, mode_is_or, negate);
                self.flatten_condition(rhs, out, mode_is_or, negate);
            }
            Expr::Binary { op: BinaryOp::Or, lhs, rhs } => {
                *mode_is_or = true;
                self.flatten_condition(lhs, out, mode_is_or, negate);
                self.flatten_condition(rhs, out, mode_is_or, negate);
            }
            Expr::Unary { op: UnaryOp::Not, operand } => {
                self.flatten_condition(operand, out, mode_is_or, !negate);
            }
            Expr::Binary { op, lhs, rhs } if is_comparison(*op) => {
                let (opcode, flip) = comparison_opcode(*op);
                let mut instr = Instruction::new(opcode, vec![self.operand(lhs), self.operand(rhs)], 0);
                instr.negated = negate ^ flip;
                out.push(instr);
            }
            other => {
                let mut instr = Instruction::new("CONDITION", vec![self.operand(other)], 0);
                instr.negated = negate;
                out.push(instr);
            }
        }
    }

    fn lower_switch(&mut self, line: u32, discriminant: &str, cases: &[crate::ast::CaseArm], default: Option<&[Statement]>) {
        let discriminant_operand = self.operand(&Expr::Identifier(discriminant.to_string()));
        let case_labels: Vec<String> = cases.iter().map(|_| self.new_label()).collect();
        let default_label = default.map(|_| self.new_label());
        let end_label = self.new_label();
        let default_target = default_label.clone().unwrap_or_else(|| end_label.clone());

        let sorted_pairs: Vec<(i64, String)> = cases
            .iter()
            .zip(case_labels.iter())
            .map(|(case, label)| (case.value, label.clone()))
            .sorted_by_key(|(value, _)| *value)
            .collect();

        let mut chunks = sorted_pairs.chunks(7);
        let first_chunk = chunks.next().unwrap_or(&[]);
        self.emit(self.switch_instruction(
            "SWITCH_START",
            discriminant_operand,
            sorted_pairs.len() as i64,
            &default_target,
            first_chunk,
            7,
            line,
        ));
        for chunk in sorted_pairs[first_chunk.len().min(sorted_pairs.len())..].chunks(9) {
            self.emit(self.switch_continued_instruction(&default_target, chunk, line));
        }

        self.targets.push((end_label.clone(), end_label.clone()));
        for (case, label) in cases.iter().zip(case_labels) {
            self.label_here(label);
            self.lower_statements(&case.body);
        }
        if let (Some(default_body), Some(label)) = (default, default_label) {
            self.label_here(label);
            self.lower_statements(default_body);
        }
        self.targets.pop();
        self.label_here(end_label);
    }

    fn switch_instruction(
        &self,
        opcode: &str,
        discriminant: Operand,
        n_cases: i64,
        default_target: &str,
        chunk: &[(i64, String)],
        slot_count: usize,
        line: u32,
    ) -> Instruction {
        let mut args = vec![discriminant, Operand::Int(n_cases), Operand::Label(default_target.to_string())];
        self.push_slots(&mut args, chunk, slot_count, default_target);
        Instruction::new(opcode, args, line)
    }

    fn switch_continued_instruction(&self, default_target: &str, chunk: &[(i64, String)], line: u32) -> Instruction {
        let mut args = Vec::new();
        self.push_slots(&mut args, chunk, 9, default_target);
        Instruction::new("SWITCH_CONTINUED", args, line)
    }

    fn push_slots(&self, args: &mut Vec<Operand>, chunk: &[(i64, String)], slot_count: usize, default_target: &str) {
        for (value, label) in chunk {
            args.push(Operand::Int(*value));
            args.push(Operand::Label(label.clone()));
        }
        for _ in chunk.len()..slot_count {
            args.push(Operand::Int(-1));
            args.push(Operand::Label(default_target.to_string()));
        }
    }
}

fn is_comparison(op: BinaryOp) -> bool {
    matches!(op, BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
}

/// Maps a comparison to `(mnemonic, flip)`: `flip` records whether the
/// mnemonic's natural sense must be negated to match `op`.
fn comparison_opcode(op: BinaryOp) -> (&'static str, bool) {
    match op {
        BinaryOp::Eq => ("IS_EQUAL_TO", false),
        BinaryOp::Ne => ("IS_EQUAL_TO", true),
        BinaryOp::Lt => ("IS_GREATER_THAN", true),
        BinaryOp::Ge => ("IS_GREATER_THAN", false),
        BinaryOp::Gt => ("IS_LOWER_THAN", true),
        BinaryOp::Le => ("IS_LOWER_THAN", false),
        _ => unreachable!("is_comparison guards this match"),
    }
}
