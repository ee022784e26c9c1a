//! The driver's two entry points, shared by the binary and the end-to-end
//! tests.

use veriop_ir::{smtlib::print_to_smtlib, Context, Operation, Report};
use veriop_session::{Options, Pipeline};
use veriop_transform::{
    build_tv_module, register_all_dialects, Dce, LowerEffectsWithMemory, LowerPairs, LowerToSmt,
    Pass, PdlToSmt, TypeLowerer,
};

use crate::parser::parse_module;

fn contains_op_of(ctx: &Context, module: Operation, dialect: &str) -> bool {
    let mut found = false;
    ctx.walk_preorder(module, &mut |op| {
        found |= ctx.op_name(op).dialect() == dialect;
    });
    found
}

/// Lower one input program (or PDL pattern) and print the SMT-LIB script.
pub fn run_lower(input: &str, options: &Options) -> Result<String, Report> {
    let mut ctx = Context::new();
    register_all_dialects(&mut ctx);
    let module = parse_module(&mut ctx, input)?;
    ctx.verify(module)?;

    let mut passes: Vec<Box<dyn Pass>> = Vec::new();
    if contains_op_of(&ctx, module, "pdl") {
        passes.push(Box::new(PdlToSmt));
    } else {
        passes.push(Box::new(LowerToSmt::new(options.pipeline)));
        if contains_op_of(&ctx, module, "mem_effect") || contains_op_of(&ctx, module, "ub") {
            passes.push(Box::new(LowerEffectsWithMemory));
        }
    }
    if options.optimize {
        passes.push(Box::new(LowerPairs));
        passes.push(Box::new(Dce));
    }

    for pass in &passes {
        pass.apply(&mut ctx, module)?;
        if options.verify_each {
            log::debug!(target: "driver", "verifying after '{}'", pass.name());
            ctx.verify(module)?;
        }
    }
    print_to_smtlib(&ctx, module)
}

/// Lower a before/after pair, combine them, and print the refinement query.
pub fn run_tv(before: &str, after: &str, optimize: bool) -> Result<String, Report> {
    let mut ctx = Context::new();
    register_all_dialects(&mut ctx);

    let module_before = parse_module(&mut ctx, before)?;
    let module_after = parse_module(&mut ctx, after)?;
    ctx.verify(module_before)?;
    ctx.verify(module_after)?;

    let lower = LowerToSmt::with_lowerer(TypeLowerer::Integer);
    lower.apply(&mut ctx, module_before)?;
    lower.apply(&mut ctx, module_after)?;

    let combined = build_tv_module(&mut ctx, module_before, module_after)?;
    if optimize {
        LowerPairs.apply(&mut ctx, combined)?;
        Dce.apply(&mut ctx, combined)?;
    }
    print_to_smtlib(&ctx, combined)
}

/// Convenience used by tests: lower with the default pipeline selection.
pub fn lower_with_pipeline(input: &str, pipeline: Pipeline) -> Result<String, Report> {
    run_lower(
        input,
        &Options {
            pipeline,
            ..Options::default()
        },
    )
}
