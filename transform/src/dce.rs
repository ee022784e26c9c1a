//! Dead-code elimination: a client of the rewrite engine that erases pure
//! ops whose results are all unused.

use veriop_ir::{
    patterns::{
        apply_patterns_greedily, GreedyRewriteConfig, PatternRewriter, RewriteOutcome,
        RewritePattern, RewritePatternSet,
    },
    Context, Operation, Report, TraitSet,
};

use crate::Pass;

struct EraseUnusedPure;

impl RewritePattern for EraseUnusedPure {
    fn name(&self) -> &'static str {
        "erase-unused-pure"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).has_trait(TraitSet::PURE) {
            return Ok(RewriteOutcome::NotMatched);
        }
        let used = rewriter
            .op_results(op)
            .iter()
            .any(|&result| !rewriter.value_uses(result).is_empty());
        if used || rewriter.op_results(op).is_empty() {
            return Ok(RewriteOutcome::NotMatched);
        }
        rewriter.erase_matched_op(true)?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// The `dce` pass.
pub struct Dce;

impl Pass for Dce {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn apply(&self, ctx: &mut Context, module: Operation) -> Result<(), Report> {
        let mut patterns = RewritePatternSet::new();
        patterns.add(EraseUnusedPure);
        apply_patterns_greedily(ctx, module, &patterns, &GreedyRewriteConfig::default())?;
        Ok(())
    }
}
