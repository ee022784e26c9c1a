//! Pair canonicalization: forward `first`/`second` of a syntactic `pair`
//! to the paired value, so that the printer emits fewer tuple selectors.

use veriop_ir::{
    matchers,
    patterns::{
        apply_patterns_greedily, GreedyRewriteConfig, PatternRewriter, RewriteOutcome,
        RewritePattern, RewritePatternSet,
    },
    Context, Operation, Report,
};

use crate::Pass;

struct ForwardProjection {
    op_name: &'static str,
    component: usize,
}

impl RewritePattern for ForwardProjection {
    fn name(&self) -> &'static str {
        "forward-pair-projection"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is(self.op_name) {
            return Ok(RewriteOutcome::NotMatched);
        }
        let pair_value = rewriter.op_operand(op, 0);
        if !matchers::produced_by(rewriter, pair_value, "smt.utils.pair") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let pair_op = rewriter.defining_op(pair_value).expect("matched above");
        let component = rewriter.op_operand(pair_op, self.component);
        rewriter.replace_matched_op(&[], Some(&[component]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// The `lower-pairs` pass.
pub struct LowerPairs;

impl Pass for LowerPairs {
    fn name(&self) -> &'static str {
        "lower-pairs"
    }

    fn apply(&self, ctx: &mut Context, module: Operation) -> Result<(), Report> {
        let mut patterns = RewritePatternSet::new();
        patterns.add(ForwardProjection {
            op_name: "smt.utils.first",
            component: 0,
        });
        patterns.add(ForwardProjection {
            op_name: "smt.utils.second",
            component: 1,
        });
        apply_patterns_greedily(ctx, module, &patterns, &GreedyRewriteConfig::default())?;
        Ok(())
    }
}
