//! End-to-end tests driving parse -> analyze -> lower -> codegen, covering
//! the concrete scenarios this toolchain's behavior is pinned against.

use gta3sc::codegen::ir2;
use gta3sc::command_db::{Command, CommandDatabase, ParamDesc, ParamKind};
use gta3sc::context::ProgramContext;
use gta3sc::lower::{self, Item};
use gta3sc::model_registry::ModelRegistry;
use gta3sc::options::Options;
use gta3sc::parser::parse_script;
use gta3sc::sema;
use std::path::Path;

fn context_with_wait() -> std::sync::Arc<ProgramContext> {
    let mut db = CommandDatabase::new(false);
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
        name: "OLD_COMMAND".to_string(),
        opcode: 2,
        supported: false,
        params: vec![],
        entity_type: None,
        is_keyword: false,
        is_terminator: false,
    });
    ProgramContext::new(Options::default(), db, ModelRegistry::new())
}

fn compile(ctx: &ProgramContext, path: &str, source: &str) -> Vec<Item> {
    let script = parse_script(path, source).unwrap();
    let analysis = sema::analyze(ctx, Path::new(path), source, &script).unwrap();
    lower::lower("main", &analysis.symbols, &script, &ctx.options)
}

#[test]
fn switch_with_default_and_out_of_order_cases_under_seven() {
    let ctx = context_with_wait();
    let source = "\
SWITCH x
CASE 100
WAIT 0
BREAK
CASE 200
WAIT 0
BREAK
CASE 300
WAIT 0
BREAK
CASE 50
WAIT 0
BREAK
DEFAULT
WAIT 1
BREAK
ENDSWITCH
";
    let items = compile(&ctx, "switch_sa.sc", source);
    let starts: Vec<_> = items
        .iter()
        .filter(|i| matches!(i, Item::Instr(instr) if instr.opcode == "SWITCH_START"))
        .collect();
    assert_eq!(starts.len(), 1, "exactly one SWITCH_START for four cases");
    let Item::Instr(start) = starts[0] else { unreachable!() };
    assert_eq!(start.args[1], lower::Operand::Int(4));
    let values: Vec<i64> = start.args[3..]
        .iter()
        .step_by(2)
        .map(|op| match op {
            lower::Operand::Int(v) => *v,
            other => panic!("expected an int operand, got {other:?}"),
        })
        .collect();
    assert_eq!(values, vec![50, 100, 200, 300, -1, -1, -1], "ascending order, sentinel-padded");
}

#[test]
fn switch_without_default_under_seven_cases() {
    let ctx = context_with_wait();
    let source = "\
SWITCH x
CASE 100
WAIT 0
BREAK
CASE 200
WAIT 0
BREAK
CASE 50
WAIT 0
BREAK
ENDSWITCH
";
    let items = compile(&ctx, "main.sc", source);
    let Item::Instr(start) = items.iter().find(|i| matches!(i, Item::Instr(instr) if instr.opcode == "SWITCH_START")).unwrap() else {
        unreachable!()
    };
    assert_eq!(start.args[1], lower::Operand::Int(3));
    // default_label equals the sentinel labels: no DEFAULT means "end" everywhere.
    let default_label = start.args[2].clone();
    for sentinel_label in start.args[9..].iter().skip(1).step_by(2) {
        assert_eq!(sentinel_label, &default_label);
    }
}

#[test]
fn nine_cases_spill_into_one_switch_continued() {
    let ctx = context_with_wait();
    let mut source = String::from("SWITCH x\n");
    for v in (100..=900).step_by(100) {
        source.push_str(&format!("CASE {v}\nWAIT 0\nBREAK\n"));
    }
    source.push_str("ENDSWITCH\n");
    let items = compile(&ctx, "main.sc", &source);
    let start_count = items.iter().filter(|i| matches!(i, Item::Instr(instr) if instr.opcode == "SWITCH_START")).count();
    let continued_count = items.iter().filter(|i| matches!(i, Item::Instr(instr) if instr.opcode == "SWITCH_CONTINUED")).count();
    assert_eq!(start_count, 1);
    assert_eq!(continued_count, 1);
}

#[test]
fn break_outside_loop_or_switch_is_one_error_per_occurrence() {
    let ctx = context_with_wait();
    let script = parse_script("main.sc", "BREAK\nBREAK\n").unwrap();
    let source = "BREAK\nBREAK\n";
    let _ = sema::analyze(&ctx, Path::new("main.sc"), source, &script).unwrap();
    assert_eq!(ctx.diagnostics.error_count(), 2);
    assert!(ctx.diagnostics.has_failed());
}

#[test]
fn unsupported_command_is_fatal_under_default_config() {
    let ctx = context_with_wait();
    let script = parse_script("main.sc", "OLD_COMMAND\n").unwrap();
    let result = sema::analyze(&ctx, Path::new("main.sc"), "OLD_COMMAND\n", &script);
    assert!(result.is_err());
    assert_eq!(ctx.diagnostics.fatal_count(), 1);
}

#[test]
fn unsupported_command_is_an_error_under_pedantic() {
    let mut options = Options::default();
    options.pedantic = true;
    let mut db = CommandDatabase::new(false);
    db.insert_command(Command {
        name: "OLD_COMMAND".to_string(),
        opcode: 2,
        supported: false,
        params: vec![],
        entity_type: None,
        is_keyword: false,
        is_terminator: false,
    });
    let ctx = ProgramContext::new(options, db, ModelRegistry::new());
    let script = parse_script("main.sc", "OLD_COMMAND\n").unwrap();
    sema::analyze(&ctx, Path::new("main.sc"), "OLD_COMMAND\n", &script).unwrap();
    assert_eq!(ctx.diagnostics.error_count(), 1);
    assert_eq!(ctx.diagnostics.fatal_count(), 0);
}

#[test]
fn duplicate_script_name_reports_an_error() {
    let ctx = context_with_wait();
    let a = parse_script("a.sc", "SCRIPT_NAME main\n").unwrap();
    let b = parse_script("b.sc", "SCRIPT_NAME main\n").unwrap();
    sema::analyze(&ctx, Path::new("a.sc"), "SCRIPT_NAME main\n", &a).unwrap();
    sema::analyze(&ctx, Path::new("b.sc"), "SCRIPT_NAME main\n", &b).unwrap();
    assert_eq!(ctx.diagnostics.error_count(), 1);
}

#[test]
fn ir2_round_trip_is_idempotent_for_a_full_program() {
    let ctx = context_with_wait();
    let source = "IF 1 == 1\nWAIT 0\nELSE\nWAIT 1\nENDIF\nWHILE 1 == 1\nBREAK\nENDWHILE\n";
    let items = compile(&ctx, "main.sc", source);
    let first = ir2::emit(&items);
    let second = ir2::emit(&items);
    assert_eq!(first, second);
}
