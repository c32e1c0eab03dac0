use clap::Parser;
use gta3sc::cli::Cli;
use gta3sc::command_db;
use gta3sc::context::ProgramContext;
use gta3sc::job::{self, JobOutput};
use gta3sc::logger;
use gta3sc::model_registry::ModelRegistry;
use std::process::ExitCode;

fn main() -> ExitCode {
    logger::init_logger();
    let cli = Cli::parse();

    let options = cli.into_options();
    let command_db = match command_db::load_from_xml(&cli.command_db, options.text_label_vars) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut model_registry = ModelRegistry::new();
    for path in &cli.models {
        if let Err(err) = model_registry.merge_ide_file(path) {
            eprintln!("error: failed to read {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    }

    let ctx = ProgramContext::new(options, command_db, model_registry);
    let results = job::run_jobs(ctx.clone(), cli.inputs.clone());

    if ctx.diagnostics.has_failed() {
        eprintln!(
            "{} error(s), {} fatal error(s)",
            ctx.diagnostics.error_count(),
            ctx.diagnostics.fatal_count()
        );
        return ExitCode::FAILURE;
    }

    for result in results {
        let Some(output) = result.output else { continue };
        let out_path = ctx_output_path(&result.path, &output);
        let write_result = match &output {
            JobOutput::Binary(bytes) => std::fs::write(&out_path, bytes),
            JobOutput::Ir2(text) => std::fs::write(&out_path, text),
            JobOutput::None => Ok(()),
        };
        if let Err(err) = write_result {
            eprintln!("error: failed to write {}: {err}", out_path.display());
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn ctx_output_path(input: &std::path::Path, output: &JobOutput) -> std::path::PathBuf {
    let extension = match output {
        JobOutput::Binary(_) => "scm",
        JobOutput::Ir2(_) => "ir2",
        JobOutput::None => "",
    };
    input.with_extension(extension)
}
