//! Semantic analysis: binds identifiers, resolves commands and alternators,
//! checks argument counts and `BREAK`/`CONTINUE` placement, and enforces
//! `SCRIPT_NAME` uniqueness. Produces the populated [`SymbolTable`] the
//! lowerer walks the AST against a second time.
//!
//! Failures are non-fatal by default: every statement is still visited so
//! sibling errors surface in one pass, matching `SPEC_FULL.md` §4.2's
//! "accumulate, don't abort" policy. Only an unsupported command under a
//! non-pedantic config, or a diagnostic sink hitting its cap, halts the job.

use crate::ast::{CaseArm, Expr, Script, Span, Statement};
use crate::command_db::{ArgType, Command, CommandDatabase};
use crate::context::ProgramContext;
use crate::diagnostics::{Diagnostic, Halted, SourceLocation};
use crate::symbol_table::{SymbolError, SymbolTable, Variable, VariableScope, VariableType};
use std::path::Path;

pub struct Analysis {
    pub symbols: SymbolTable,
}

struct Analyzer<'a> {
    ctx: &'a ProgramContext,
    path: &'a Path,
    source_lines: Vec<&'a str>,
    symbols: SymbolTable,
    /// Stack of whether `BREAK`/`CONTINUE` are currently valid, pushed by
    /// every loop and `SWITCH`.
    breakable: Vec<bool>,
}

/// Runs semantic analysis over `script`, reporting diagnostics into
/// `ctx.diagnostics`. Returns the populated symbol table, or `Err(Halted)`
/// if a fatal diagnostic (or the diagnostic cap) stopped the job.
pub fn analyze(ctx: &ProgramContext, path: &Path, source: &str, script: &Script) -> Result<Analysis, Halted> {
    let mut analyzer = Analyzer {
        ctx,
        path,
        source_lines: source.lines().collect(),
        symbols: SymbolTable::new(script.name.clone(), ctx.options.scope_then_label),
        breakable: Vec::new(),
    };
    analyzer.declare_labels(&script.statements)?;
    analyzer.analyze_statements(&script.statements)?;
    Ok(Analysis { symbols: analyzer.symbols })
}

impl<'a> Analyzer<'a> {
    fn loc(&self, span: Span) -> SourceLocation {
        let source_line = self
            .source_lines
            .get(span.line.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("")
            .to_string();
        SourceLocation {
            file: self.path.to_path_buf(),
            line: span.line,
            column: span.column,
            source_line,
        }
    }

    fn report_error(&self, span: Span, message: impl Into<String>) -> Result<(), Halted> {
        self.ctx
            .diagnostics
            .report(&Diagnostic::error_at(self.loc(span), message))
    }

    fn report_fatal(&self, span: Span, message: impl Into<String>) -> Result<(), Halted> {
        self.ctx
            .diagnostics
            .report(&Diagnostic::fatal_at(self.loc(span), message))
    }

    /// First pass: registers every label in the AST into the symbol table
    /// so forward references resolve, keeping scope push/pop in lockstep
    /// with the analysis pass that follows.
    fn declare_labels(&mut self, statements: &[Statement]) -> Result<(), Halted> {
        for statement in statements {
            match statement {
                Statement::Label { span, name } => {
                    if let Err(SymbolError::DuplicateLabel) = self.symbols.declare_label(name.clone()) {
                        self.report_error(*span, format!("label '{name}' already declared"))?;
                    }
                }
                Statement::Scope { body, .. } => {
                    self.symbols.push_scope();
                    self.declare_labels(body)?;
                    self.symbols.pop_scope();
                }
                Statement::If { then_body, else_body, .. } => {
                    self.declare_labels(then_body)?;
                    self.declare_labels(else_body)?;
                }
                Statement::While { body, .. } | Statement::Repeat { body, .. } => {
                    self.declare_labels(body)?;
                }
                Statement::Switch { cases, default, .. } => {
                    for case in cases {
                        self.declare_labels(&case.body)?;
                    }
                    if let Some(default_body) = default {
                        self.declare_labels(default_body)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn analyze_statements(&mut self, statements: &[Statement]) -> Result<(), Halted> {
        for statement in statements {
            self.analyze_statement(statement)?;
        }
        Ok(())
    }

    fn analyze_statement(&mut self, statement: &Statement) -> Result<(), Halted> {
        match statement {
            Statement::Label { .. } => Ok(()),
            Statement::ScriptName { span, name } => {
                let mut registry = self.ctx.script_names.lock().expect("script name registry poisoned");
                if let Err(existing) = registry.declare(name, &self.path.display().to_string()) {
                    self.report_error(
                        *span,
                        format!("SCRIPT_NAME '{name}' already declared by {existing}"),
                    )?;
                }
                Ok(())
            }
            Statement::Scope { body, .. } => {
                self.symbols.push_scope();
                let result = self.analyze_statements(body);
                self.symbols.pop_scope();
                result
            }
            Statement::Command { span, name, args } => self.analyze_command(*span, name, args),
            Statement::Assign { span, target, value } => {
                self.analyze_expr(value)?;
                if self.symbols.resolve_variable(target).is_none() {
                    if self.ctx.options.guesser {
                        self.declare_guessed(target);
                    } else {
                        self.report_error(*span, format!("undeclared variable '{target}'"))?;
                    }
                }
                Ok(())
            }
            Statement::If { condition, then_body, else_body, .. } => {
                self.analyze_expr(condition)?;
                self.analyze_statements(then_body)?;
                self.analyze_statements(else_body)
            }
            Statement::While { condition, body, .. } => {
                self.analyze_expr(condition)?;
                self.breakable.push(self.ctx.options.allow_break_continue);
                let result = self.analyze_statements(body);
                self.breakable.pop();
                result
            }
            Statement::Repeat { count, counter, body, .. } => {
                self.analyze_expr(count)?;
                if self.symbols.resolve_variable(counter).is_none() {
                    self.declare_guessed(counter);
                }
                self.breakable.push(self.ctx.options.allow_break_continue);
                let result = self.analyze_statements(body);
                self.breakable.pop();
                result
            }
            Statement::Switch { span, discriminant, cases, default } => self.analyze_switch(*span, discriminant, cases, default.as_deref()),
            Statement::Break(span) => self.check_breakable(*span, "BREAK"),
            Statement::Continue(span) => self.check_breakable(*span, "CONTINUE"),
        }
    }

    fn check_breakable(&self, span: Span, keyword: &str) -> Result<(), Halted> {
        if !self.breakable.last().copied().unwrap_or(false) {
            self.report_error(span, format!("{keyword} used outside of a loop or SWITCH"))?;
        }
        Ok(())
    }

    fn declare_guessed(&mut self, name: &str) {
        let _ = self.symbols.declare_variable(Variable {
            name: name.to_string(),
            scope: VariableScope::Local,
            var_type: VariableType::Int,
            index: 0,
            array_len: None,
            enum_binding: None,
            entity: None,
        });
    }

    fn analyze_switch(
        &mut self,
        span: Span,
        discriminant: &str,
        cases: &[CaseArm],
        default: Option<&[Statement]>,
    ) -> Result<(), Halted> {
        if !self.ctx.options.switch_statements {
            self.report_error(span, "SWITCH is not enabled (pass -fswitch)")?;
        }
        if self.symbols.resolve_variable(discriminant).is_none() {
            if self.ctx.options.guesser {
                self.declare_guessed(discriminant);
            } else {
                self.report_error(span, format!("undeclared variable '{discriminant}'"))?;
            }
        }
        if let Some(limit) = self.ctx.options.switch_case_limit {
            if cases.len() > limit {
                self.report_error(span, format!("SWITCH has {} cases, limit is {limit}", cases.len()))?;
            }
        }
        let mut seen = std::collections::HashSet::new();
        for case in cases {
            if !seen.insert(case.value) {
                self.report_error(span, format!("duplicate CASE value {}", case.value))?;
            }
        }

        self.breakable.push(true);
        for case in cases {
            self.analyze_statements(&case.body)?;
            if !case.body.last().is_some_and(|s| self.statement_terminates_case(s)) {
                self.report_error(span, format!("CASE {} falls through without BREAK", case.value))?;
            }
        }
        if let Some(default_body) = default {
            self.analyze_statements(default_body)?;
            if !default_body.last().is_some_and(|s| self.statement_terminates_case(s)) {
                self.report_error(span, "DEFAULT falls through without BREAK")?;
            }
        }
        self.breakable.pop();
        Ok(())
    }

    /// Whether `statement`, as the last statement of a `SWITCH` case, ends
    /// that case without falling through: a `BREAK`, or a call to a command
    /// the database marks `is_terminator` (`TERMINATE_THIS_SCRIPT`,
    /// `RETURN`…), per `SPEC_FULL.md` §4.3 step 7.
    fn statement_terminates_case(&self, statement: &Statement) -> bool {
        match statement {
            Statement::Break(_) => true,
            Statement::Command { name, .. } => {
                self.ctx.command_db.find_command(name).is_some_and(|c| c.is_terminator)
            }
            _ => false,
        }
    }

    fn analyze_command(&mut self, span: Span, name: &str, args: &[Expr]) -> Result<(), Halted> {
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            self.analyze_expr(arg)?;
            match self.infer_arg_type(arg) {
                Some(ty) => arg_types.push(ty),
                None => {
                    self.report_error(span, format!("argument to {name} is not a valid command operand"))?;
                    return Ok(());
                }
            }
        }

        let db: &CommandDatabase = &self.ctx.command_db;
        if let Some(command) = db.find_command(name) {
            let command = command.clone();
            self.check_supported(span, name, command.supported)?;
            if arg_types.len() < command.required_param_count() || arg_types.len() > command.params.len() {
                self.report_error(
                    span,
                    format!(
                        "{name} expects {}..{} arguments, got {}",
                        command.required_param_count(),
                        command.params.len(),
                        arg_types.len()
                    ),
                )?;
            }
            return self.track_entities(span, args, &command);
        }

        if let Some(alternator) = db.find_alternator(name) {
            let resolved = db.resolve_alternator(alternator, &arg_types).map(Command::clone);
            match resolved {
                Ok(command) => {
                    self.check_supported(span, &command.name, command.supported)?;
                    return self.track_entities(span, args, &command);
                }
                Err(err) => return self.report_error(span, format!("{name}: {err}")),
            }
        }

        self.report_error(span, format!("unknown command '{name}'"))
    }

    /// Propagates an entity-annotated command's output onto the variable its
    /// `out` slot writes, and checks entity-typed argument slots against
    /// what the matching variable currently holds. Gated on `entity_tracking`
    /// per `SPEC_FULL.md` §4.2.
    fn track_entities(&mut self, span: Span, args: &[Expr], command: &Command) -> Result<(), Halted> {
        if !self.ctx.options.entity_tracking {
            return Ok(());
        }
        for (param, arg) in command.params.iter().zip(args.iter()) {
            let Expr::Identifier(var_name) = arg else { continue };
            if param.out {
                if let Some(entity_type) = command.entity_type {
                    self.symbols.set_variable_entity(var_name, entity_type);
                }
                continue;
            }
            if let Some(expected) = param.entity_type {
                if let Some(actual) = self.symbols.resolve_variable(var_name).and_then(|v| v.entity) {
                    if actual != expected {
                        self.report_error(
                            span,
                            format!("'{var_name}' holds {actual} but this slot expects {expected}"),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_supported(&self, span: Span, name: &str, supported: bool) -> Result<(), Halted> {
        if supported {
            return Ok(());
        }
        if self.ctx.options.pedantic {
            self.report_error(span, format!("{name} is not supported by --config={}", self.ctx.options.config))
        } else {
            self.report_fatal(span, format!("{name} is not supported by --config={}", self.ctx.options.config))
        }
    }

    fn analyze_expr(&mut self, expr: &Expr) -> Result<(), Halted> {
        match expr {
            Expr::IntLiteral(_) | Expr::FloatLiteral(_) | Expr::StringLiteral(_) => Ok(()),
            Expr::Identifier(name) => {
                if self.symbols.resolve_variable(name).is_none() && self.symbols.resolve_label(name).is_none() {
                    if self.ctx.options.guesser {
                        self.declare_guessed(name);
                    }
                }
                Ok(())
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    self.analyze_expr(arg)?;
                }
                Ok(())
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.analyze_expr(lhs)?;
                self.analyze_expr(rhs)
            }
            Expr::Unary { operand, .. } => self.analyze_expr(operand),
        }
    }

    /// Statically infers the [`ArgType`] a command-argument expression
    /// contributes, used for alternator resolution. Only the forms GTA3script
    /// actually allows in argument position (literals and identifiers) are
    /// typed; compound expressions are not valid plain arguments.
    fn infer_arg_type(&self, expr: &Expr) -> Option<ArgType> {
        match expr {
            Expr::IntLiteral(v) => Some(ArgType::IntLiteral(*v)),
            Expr::FloatLiteral(v) => Some(ArgType::FloatLiteral((*v).into())),
            Expr::StringLiteral(_) => Some(ArgType::String),
            Expr::Identifier(name) => {
                if let Some(variable) = self.symbols.resolve_variable(name) {
                    Some(match variable.scope {
                        VariableScope::Global => ArgType::GlobalVar,
                        VariableScope::Local | VariableScope::MissionLocal => ArgType::LocalVar,
                    })
                } else if self.symbols.resolve_label(name).is_some() {
                    Some(ArgType::Label)
                } else {
                    Some(ArgType::LocalVar)
                }
            }
            Expr::Call { .. } | Expr::Binary { .. } | Expr::Unary { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_db::{Command, CommandDatabase, EntityType, ParamDesc, ParamKind};
    use crate::model_registry::ModelRegistry;
    use crate::options::Options;
    use crate::parser::parse_script;
    use std::path::PathBuf;

    fn ctx_with(options: Options) -> std::sync::Arc<ProgramContext> {
        let mut db = CommandDatabase::new(options.text_label_vars);
        db.insert_command(Command {
            name: "WAIT".to_string(),
            opcode: 1,
            supported: true,
            params: vec![ParamDesc::new(ParamKind::Int32)],
            entity_type: None,
            is_keyword: false,
            is_terminator: false,
        });
        db.insert_command(Command {
            name: "UNSUPPORTED_CMD".to_string(),
            opcode: 2,
            supported: false,
            params: vec![],
            entity_type: None,
            is_keyword: false,
            is_terminator: false,
        });
        db.insert_command(Command {
            name: "CREATE_CAR".to_string(),
            opcode: 3,
            supported: true,
            params: vec![
                ParamDesc::new(ParamKind::Int32),
                {
                    let mut out_param = ParamDesc::new(ParamKind::LocalVar);
                    out_param.out = true;
                    out_param
                },
            ],
            entity_type: Some(EntityType(1)),
            is_keyword: false,
            is_terminator: false,
        });
        db.insert_command(Command {
            name: "USE_CAR".to_string(),
            opcode: 4,
            supported: true,
            params: vec![ParamDesc::new(ParamKind::LocalVar).with_entity_type(EntityType(1))],
            entity_type: None,
            is_keyword: false,
            is_terminator: false,
        });
        db.insert_command(Command {
            name: "USE_PLAYER".to_string(),
            opcode: 5,
            supported: true,
            params: vec![ParamDesc::new(ParamKind::LocalVar).with_entity_type(EntityType(2))],
            entity_type: None,
            is_keyword: false,
            is_terminator: false,
        });
                db.insert_command(Command {
            name: "TERMINATE_THIS_SCRIPT".to_string(),
            opcode: 6,
            supported: true,
            params: vec![],
            entity_type: None,
            is_keyword: false,
            is_terminator: true,
        });
ProgramContext::new(options, db, ModelRegistry::new())
    }

    #[test]
    fn break_outside_loop_is_reported() {
        let ctx = ctx_with(Options::default());
        let script = parse_script("main.sc", "BREAK\n").unwrap();
        let path = PathBuf::from("main.sc");
        analyze(&ctx, &path, "BREAK\n", &script).unwrap();
        assert_eq!(ctx.diagnostics.error_count(), 1);
    }

    #[test]
    fn unsupported_command_is_fatal_by_default() {
        let ctx = ctx_with(Options::default());
        let script = parse_script("main.sc", "UNSUPPORTED_CMD\n").unwrap();
        let path = PathBuf::from("main.sc");
        let result = analyze(&ctx, &path, "UNSUPPORTED_CMD\n", &script);
        assert!(result.is_err());
        assert_eq!(ctx.diagnostics.fatal_count(), 1);
    }

    #[test]
    fn unsupported_command_is_error_under_pedantic() {
        let mut options = Options::default();
        options.pedantic = true;
        let ctx = ctx_with(options);
        let script = parse_script("main.sc", "UNSUPPORTED_CMD\n").unwrap();
        let path = PathBuf::from("main.sc");
        analyze(&ctx, &path, "UNSUPPORTED_CMD\n", &script).unwrap();
        assert_eq!(ctx.diagnostics.error_count(), 1);
        assert_eq!(ctx.diagnostics.fatal_count(), 0);
    }

    #[test]
    fn duplicate_script_name_reports_both_paths() {
        let ctx = ctx_with(Options::default());
        let script1 = parse_script("a.sc", "SCRIPT_NAME main\n").unwrap();
        let script2 = parse_script("b.sc", "SCRIPT_NAME main\n").unwrap();
        analyze(&ctx, Path::new("a.sc"), "SCRIPT_NAME main\n", &script1).unwrap();
        analyze(&ctx, Path::new("b.sc"), "SCRIPT_NAME main\n", &script2).unwrap();
        assert_eq!(ctx.diagnostics.error_count(), 1);
    }

    #[test]
    fn entity_type_propagates_from_an_out_slot_and_checks_out() {
        let mut options = Options::default();
        options.guesser = true;
        let ctx = ctx_with(options);
        let source = "CREATE_CAR 90 car\nUSE_CAR car\n";
        let script = parse_script("main.sc", source).unwrap();
        analyze(&ctx, Path::new("main.sc"), source, &script).unwrap();
        assert_eq!(ctx.diagnostics.error_count(), 0);
    }

    #[test]
    fn mismatched_entity_type_is_reported() {
        let mut options = Options::default();
        options.guesser = true;
        let ctx = ctx_with(options);
        let source = "CREATE_CAR 90 car\nUSE_PLAYER car\n";
        let script = parse_script("main.sc", source).unwrap();
        analyze(&ctx, Path::new("main.sc"), source, &script).unwrap();
        assert_eq!(ctx.diagnostics.error_count(), 1);
    }

    #[test]
    fn entity_tracking_disabled_skips_the_check() {
        let mut options = Options::default();
        options.guesser = true;
        options.entity_tracking = false;
        let ctx = ctx_with(options);
        let source = "CREATE_CAR 90 car\nUSE_PLAYER car\n";
        let script = parse_script("main.sc", source).unwrap();
        analyze(&ctx, Path::new("main.sc"), source, &script).unwrap();
        assert_eq!(ctx.diagnostics.error_count(), 0);
    }

    #[test]
    fn case_without_break_falls_through() {
        let ctx = ctx_with(Options::default());
        let source = "SWITCH x\nCASE 1\nWAIT 0\nENDSWITCH\n";
        let script = parse_script("main.sc", source).unwrap();
        analyze(&ctx, Path::new("main.sc"), source, &script).unwrap();
        assert!(ctx.diagnostics.error_count() >= 1);
    }

    #[test]
    fn case_ending_in_a_terminator_command_does_not_fall_through() {
        let ctx = ctx_with(Options::default());
        let source = "SWITCH x\nCASE 1\nTERMINATE_THIS_SCRIPT\nENDSWITCH\n";
        let script = parse_script("main.sc", source).unwrap();
        analyze(&ctx, Path::new("main.sc"), source, &script).unwrap();
        assert_eq!(ctx.diagnostics.error_count(), 0);
    }

    #[test]
    fn default_ending_in_a_terminator_command_does_not_fall_through() {
        let ctx = ctx_with(Options::default());
        let source = "SWITCH x\nCASE 1\nBREAK\nDEFAULT\nTERMINATE_THIS_SCRIPT\nENDSWITCH\n";
        let script = parse_script("main.sc", source).unwrap();
        analyze(&ctx, Path::new("main.sc"), source, &script).unwrap();
        assert_eq!(ctx.diagnostics.error_count(), 0);
    }
}
