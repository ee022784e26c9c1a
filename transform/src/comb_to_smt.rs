//! Lowering of the `comb` dialect to `smt.bv`.
//!
//! Variadic families left-fold into binary ops; the empty arity produces
//! the family's identity constant at the result width. `icmp`, `parity`,
//! `extract`, and `replicate` are known gaps and fail with
//! *NotImplemented*, matching the upstream state of these lowerings.

use veriop_dialect_comb as comb;
use veriop_dialect_smt as smt;
use veriop_ir::{
    diagnostics::NotImplemented,
    patterns::{PatternRewriter, RewriteOutcome, RewritePattern, RewritePatternSet},
    OpInfo, Operation, OperationName, Report,
};

/// Fold a variadic comb op into a left-associated chain of binary SMT ops.
struct VariadicOpPattern {
    source: &'static OpInfo,
    target: &'static OpInfo,
    identity: u128,
}

impl RewritePattern for VariadicOpPattern {
    fn name(&self) -> &'static str {
        "comb-variadic-to-smt"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if rewriter.op_name(op) != OperationName::new(self.source) {
            return Ok(RewriteOutcome::NotMatched);
        }
        let operands = rewriter.op_operands(op).to_vec();

        if operands.is_empty() {
            let width = rewriter
                .value_type(rewriter.op_result(op, 0))
                .bit_width()
                .expect("verified comb op");
            let constant = smt::bv_constant(rewriter.context(), self.identity, width)?;
            rewriter.replace_matched_op(&[constant], None)?;
            return Ok(RewriteOutcome::Rewrote);
        }

        if !rewriter.value_type(operands[0]).is_bitvec() {
            // Operands not lowered yet; revisit once they are.
            return Ok(RewriteOutcome::NotMatched);
        }

        let mut current = operands[0];
        for &operand in &operands[1..] {
            let folded = smt::bv_binary(rewriter.context(), self.target, current, operand);
            rewriter.insert_op_before_matched(folded);
            current = rewriter.op_result(folded, 0);
        }
        rewriter.replace_matched_op(&[], Some(&[current]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// One source binop to one `smt.bv` op, identical operand order.
struct TrivialBinOpPattern {
    source: &'static OpInfo,
    target: &'static OpInfo,
}

impl RewritePattern for TrivialBinOpPattern {
    fn name(&self) -> &'static str {
        "comb-binop-to-smt"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if rewriter.op_name(op) != OperationName::new(self.source) {
            return Ok(RewriteOutcome::NotMatched);
        }
        let lhs = rewriter.op_operand(op, 0);
        let rhs = rewriter.op_operand(op, 1);
        if !rewriter.value_type(lhs).is_bitvec() {
            return Ok(RewriteOutcome::NotMatched);
        }
        let lowered = smt::bv_binary(rewriter.context(), self.target, lhs, rhs);
        rewriter.replace_matched_op(&[lowered], None)?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// Left-fold `comb.concat` into `smt.bv.concat`.
struct ConcatPattern;

impl RewritePattern for ConcatPattern {
    fn name(&self) -> &'static str {
        "comb-concat-to-smt"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("comb.concat") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let operands = rewriter.op_operands(op).to_vec();
        assert!(!operands.is_empty(), "concat requires at least one operand");
        if !rewriter.value_type(operands[0]).is_bitvec() {
            return Ok(RewriteOutcome::NotMatched);
        }
        let mut current = operands[0];
        for &operand in &operands[1..] {
            let folded = smt::bv_concat(rewriter.context(), current, operand);
            rewriter.insert_op_before_matched(folded);
            current = rewriter.op_result(folded, 0);
        }
        rewriter.replace_matched_op(&[], Some(&[current]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `comb.mux` as `smt.ite` on `cond == 1`.
struct MuxPattern;

impl RewritePattern for MuxPattern {
    fn name(&self) -> &'static str {
        "comb-mux-to-smt"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("comb.mux") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let cond = rewriter.op_operand(op, 0);
        let true_value = rewriter.op_operand(op, 1);
        let false_value = rewriter.op_operand(op, 2);
        if !rewriter.value_type(cond).is_bitvec() {
            return Ok(RewriteOutcome::NotMatched);
        }
        let one = smt::bv_constant(rewriter.context(), 1, 1)?;
        let one_value = rewriter.op_result(one, 0);
        let is_set = smt::eq(rewriter.context(), cond, one_value);
        rewriter.insert_op_before_matched(one);
        rewriter.insert_op_before_matched(is_set);
        let cond_bool = rewriter.op_result(is_set, 0);
        let ite = smt::ite(rewriter.context(), cond_bool, true_value, false_value);
        rewriter.replace_matched_op(&[ite], None)?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// A lowering that is a known upstream gap.
struct NotImplementedPattern {
    source: &'static OpInfo,
}

impl RewritePattern for NotImplementedPattern {
    fn name(&self) -> &'static str {
        "comb-not-implemented"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if rewriter.op_name(op) != OperationName::new(self.source) {
            return Ok(RewriteOutcome::NotMatched);
        }
        Err(NotImplemented::new(format!(
            "lowering of '{}'",
            rewriter.op_name(op)
        )))
    }
}

/// The full `comb` lowering pattern set.
pub fn comb_to_smt_patterns(patterns: &mut RewritePatternSet) {
    for (source, target, identity) in [
        (&comb::ADD, &smt::BV_ADD, 0u128),
        (&comb::MUL, &smt::BV_MUL, 1),
        (&comb::OR, &smt::BV_OR, 0),
        (&comb::AND, &smt::BV_AND, 1),
        (&comb::XOR, &smt::BV_XOR, 0),
    ] {
        patterns.add(VariadicOpPattern {
            source,
            target,
            identity,
        });
    }
    for (source, target) in [
        (&comb::DIVU, &smt::BV_UDIV),
        (&comb::DIVS, &smt::BV_SDIV),
        (&comb::MODU, &smt::BV_UREM),
        (&comb::MODS, &smt::BV_SREM),
        (&comb::SHL, &smt::BV_SHL),
        (&comb::SHRU, &smt::BV_LSHR),
        (&comb::SHRS, &smt::BV_ASHR),
        (&comb::SUB, &smt::BV_SUB),
    ] {
        patterns.add(TrivialBinOpPattern { source, target });
    }
    patterns.add(ConcatPattern);
    patterns.add(MuxPattern);
    for source in [&comb::ICMP, &comb::PARITY, &comb::EXTRACT, &comb::REPLICATE] {
        patterns.add(NotImplementedPattern { source });
    }
}
