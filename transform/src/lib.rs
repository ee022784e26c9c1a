//! Transformation passes over the veriop IR.
//!
//! The two pipelines of interest are [LowerToSmt] (source dialects down to
//! the SMT dialects) and [PdlToSmt] (a declarative rewrite pattern down to
//! a single SMT soundness query). [LowerEffectsWithMemory] desugars the
//! opaque effect state into explicit `Pair(Memory, Bool)` values, and the
//! small client passes ([Dce], [LowerPairs]) clean up after the others.

mod comb_to_smt;
mod dce;
mod lower_effects;
mod lower_pairs;
mod lower_to_smt;
mod pdl_to_smt;
mod refinement;

pub use self::{
    comb_to_smt::comb_to_smt_patterns,
    dce::Dce,
    lower_effects::LowerEffectsWithMemory,
    lower_pairs::LowerPairs,
    lower_to_smt::{arith_to_smt_patterns, func_to_smt_patterns, LowerToSmt, TypeLowerer},
    pdl_to_smt::PdlToSmt,
    refinement::build_tv_module,
};

use veriop_ir::{Context, Operation, Report};

/// A module-level transformation.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn apply(&self, ctx: &mut Context, module: Operation) -> Result<(), Report>;
}

/// Register every dialect the pipelines can encounter.
pub fn register_all_dialects(ctx: &mut Context) {
    ctx.register_dialect::<veriop_ir::builtin::BuiltinDialect>();
    ctx.register_dialect::<veriop_dialect_smt::SmtDialect>();
    ctx.register_dialect::<veriop_dialect_smt::SmtBitVectorDialect>();
    ctx.register_dialect::<veriop_dialect_smt::SmtUtilsDialect>();
    ctx.register_dialect::<veriop_dialect_smt::SmtSynthDialect>();
    ctx.register_dialect::<veriop_dialect_arith::ArithDialect>();
    ctx.register_dialect::<veriop_dialect_comb::CombDialect>();
    ctx.register_dialect::<veriop_dialect_func::FuncDialect>();
    ctx.register_dialect::<veriop_dialect_mem::MemDialect>();
    ctx.register_dialect::<veriop_dialect_mem::UbDialect>();
    ctx.register_dialect::<veriop_dialect_mem::MemEffectDialect>();
    ctx.register_dialect::<veriop_dialect_pdl::PdlDialect>();
    ctx.register_dialect::<veriop_dialect_pdl::PdlDataflowDialect>();
}
