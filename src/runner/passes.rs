use std::io;

use itergen::bound::{BoundMethod, BoundProgram};
use itergen::interp::echo;
use itergen::lower::{self, LoweringOutput};

use super::config::OutputKind;
use super::dump::{dump_bound, dump_lowered};
use super::{PassOutput, RunnerCtx};

pub fn load_files(ctx: &mut RunnerCtx<'_, '_>) -> PassOutput<()> {
    for path in &ctx.config.paths {
        if let Err(e) = ctx.source.borrow_mut().load(path.clone()) {
            ctx.diagnostics
                .error()
                .with_message(format!("could not load file {}", path.display()))
                .with_source(Box::new(e))
                .emit();
        }
    }

    ctx.stop_if_errors(())
}

/// Parses every file and merges the methods into a single list.
pub fn parse_all(ctx: &mut RunnerCtx<'_, '_>) -> PassOutput<Vec<BoundMethod>> {
    let mut methods = vec![];
    let source = ctx.source.clone();

    for file in source.borrow().iter() {
        match ron::from_str::<BoundProgram>(file.text()) {
            Ok(program) => methods.extend(program.methods),

            Err(e) => {
                ctx.diagnostics
                    .error()
                    .with_message(format!("could not parse {}", file.path().display()))
                    .with_source(Box::new(e))
                    .emit();
            }
        }
    }

    ctx.stop_if_errors(methods)
}

pub fn dump_bound_if_asked(
    ctx: &mut RunnerCtx<'_, '_>,
    methods: Vec<BoundMethod>,
) -> PassOutput<Vec<BoundMethod>> {
    let OutputKind::Parse(format) = ctx.config.output else {
        return PassOutput::continue_with_output(methods);
    };

    let program = BoundProgram { methods };

    if let Err(e) = dump_bound(format, &program, io::stdout()) {
        ctx.diagnostics
            .error()
            .with_message("could not dump the bound program to stdout")
            .with_source(Box::new(e))
            .emit();
    }

    PassOutput::stop_with_output(program.methods)
}

pub fn lower(ctx: &mut RunnerCtx<'_, '_>, methods: &[BoundMethod]) -> PassOutput<LoweringOutput> {
    let output = lower::lower_methods(methods, &ctx.config.lowering, &mut ctx.diagnostics);

    PassOutput::continue_with_output(output)
}

pub fn dump_lowered_if_asked(
    ctx: &mut RunnerCtx<'_, '_>,
    output: &LoweringOutput,
) -> PassOutput<()> {
    let OutputKind::Lower(format) = ctx.config.output else {
        return PassOutput::r#continue();
    };

    if let Err(e) = dump_lowered(format, output, io::stdout()) {
        ctx.diagnostics
            .error()
            .with_message("could not dump the lowered program to stdout")
            .with_source(Box::new(e))
            .emit();
    }

    PassOutput::stop()
}

pub fn run_methods(ctx: &mut RunnerCtx<'_, '_>, output: &LoweringOutput) -> PassOutput<()> {
    if let Err(e) = echo::run_program(output, &ctx.config.run, io::stdout().lock()) {
        ctx.diagnostics
            .error()
            .with_message("could not write the transcript to stdout")
            .with_source(Box::new(e))
            .emit();
    }

    PassOutput::stop()
}
