//! Lowering of the source dialects (`arith`, `func`) to the SMT dialects.
//!
//! The pass is parameterized by a [TypeLowerer]: the plain lowerer maps
//! `iN` to `BitVec(N)`, the poison lowerer maps it to
//! `Pair(BitVec(N), Bool)` with the boolean marking poison. Every pattern
//! here consults the active lowerer, because the same patterns serve both
//! the default pipeline (poison) and the translation-validation flow
//! (plain).

use veriop_dialect_arith as arith;
use veriop_dialect_smt as smt;
use veriop_ir::{
    diagnostics::Unsupported,
    patterns::{
        apply_patterns_greedily, GreedyRewriteConfig, PatternRewriter, RewriteOutcome,
        RewritePattern, RewritePatternSet,
    },
    Attribute, CmpPredicate, Context, OpInfo, Operation, OperationName, Report, Type, Value,
};
use veriop_session::Pipeline;

use crate::Pass;

/// How source-level types are mapped onto solver sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeLowerer {
    /// `iN` becomes `BitVec(N)`.
    Integer,
    /// `iN` becomes `Pair(BitVec(N), Bool)`; the boolean marks poison.
    IntegerPoison,
}

impl TypeLowerer {
    /// Structurally convert `ty`, returning it unchanged when no rule
    /// applies.
    pub fn convert(&self, ty: &Type) -> Type {
        match ty {
            Type::Int(w) => match self {
                Self::Integer => Type::BitVec(*w),
                Self::IntegerPoison => Type::pair(Type::BitVec(*w), Type::Bool),
            },
            Type::Pair(a, b) => Type::pair(self.convert(a), self.convert(b)),
            Type::Array(k, v) => Type::array(self.convert(k), self.convert(v)),
            Type::Func(args, ret) => Type::Func(
                args.iter().map(|t| self.convert(t)).collect(),
                Box::new(self.convert(ret)),
            ),
            other => other.clone(),
        }
    }

}

/// Split a lowered operand into (value, poison) under the poison lowerer,
/// inserting the projections before the matched op.
fn unwrap_poison(rewriter: &mut PatternRewriter<'_>, operand: Value) -> Option<(Value, Value)> {
    rewriter.value_type(operand).as_pair()?;
    let value_op = smt::first(rewriter.context(), operand);
    let poison_op = smt::second(rewriter.context(), operand);
    rewriter.insert_op_before_matched(value_op);
    rewriter.insert_op_before_matched(poison_op);
    let ctx = rewriter.context();
    Some((ctx.op_result(value_op, 0), ctx.op_result(poison_op, 0)))
}

/// `arith.constant` to `smt.bv.constant` (plus a false poison marker under
/// the poison lowerer).
struct ConstantPattern {
    lowerer: TypeLowerer,
}

impl RewritePattern for ConstantPattern {
    fn name(&self) -> &'static str {
        "arith-constant-to-smt"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("arith.constant") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let Some(attr) = rewriter
            .op_attrs(op)
            .get("value")
            .and_then(|a| a.as_int())
            .copied()
        else {
            return Ok(RewriteOutcome::NotMatched);
        };
        let constant = smt::bv_constant(rewriter.context(), attr.value, attr.width)?;
        match self.lowerer {
            TypeLowerer::Integer => rewriter.replace_matched_op(&[constant], None)?,
            TypeLowerer::IntegerPoison => {
                let no_poison = smt::constant_bool(rewriter.context(), false);
                let value = rewriter.op_result(constant, 0);
                let poison = rewriter.op_result(no_poison, 0);
                let paired = smt::pair(rewriter.context(), value, poison);
                rewriter.replace_matched_op(&[constant, no_poison, paired], None)?;
            }
        }
        Ok(RewriteOutcome::Rewrote)
    }
}

/// A trivial binary lowering: one source op, one `smt.bv` op, identical
/// operand order. Division-family ops also mark the result poison when the
/// divisor is zero.
struct BinaryArithPattern {
    source: &'static OpInfo,
    target: &'static OpInfo,
    divides: bool,
    lowerer: TypeLowerer,
}

impl RewritePattern for BinaryArithPattern {
    fn name(&self) -> &'static str {
        "arith-binop-to-smt"
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
        match self.lowerer {
            TypeLowerer::Integer => {
                if !rewriter.value_type(lhs).is_bitvec() {
                    return Ok(RewriteOutcome::NotMatched);
                }
                let lowered = smt::bv_binary(rewriter.context(), self.target, lhs, rhs);
                rewriter.replace_matched_op(&[lowered], None)?;
            }
            TypeLowerer::IntegerPoison => {
                let Some((lhs_value, lhs_poison)) = unwrap_poison(rewriter, lhs) else {
                    return Ok(RewriteOutcome::NotMatched);
                };
                let (rhs_value, rhs_poison) = unwrap_poison(rewriter, rhs)
                    .expect("operands of a verified binop share one type");
                let lowered = smt::bv_binary(rewriter.context(), self.target, lhs_value, rhs_value);
                let poison_or = smt::or(rewriter.context(), lhs_poison, rhs_poison);
                rewriter.insert_op_before_matched(lowered);
                rewriter.insert_op_before_matched(poison_or);
                let mut poison = rewriter.op_result(poison_or, 0);
                if self.divides {
                    // Division by zero poisons the result.
                    let width = rewriter
                        .value_type(rhs_value)
                        .bit_width()
                        .expect("divisor is a bit-vector");
                    let zero = smt::bv_constant(rewriter.context(), 0, width)?;
                    let zero_value = rewriter.op_result(zero, 0);
                    let is_zero = smt::eq(rewriter.context(), rhs_value, zero_value);
                    rewriter.insert_op_before_matched(zero);
                    rewriter.insert_op_before_matched(is_zero);
                    let divisor_zero = rewriter.op_result(is_zero, 0);
                    let poisoned = smt::or(rewriter.context(), poison, divisor_zero);
                    rewriter.insert_op_before_matched(poisoned);
                    poison = rewriter.op_result(poisoned, 0);
                }
                let value = rewriter.op_result(lowered, 0);
                let paired = smt::pair(rewriter.context(), value, poison);
                rewriter.replace_matched_op(&[paired], None)?;
            }
        }
        Ok(RewriteOutcome::Rewrote)
    }
}

/// Lower a comparison of two bit-vector values to a `Bool`-producing op.
fn lower_predicate(
    ctx: &mut Context,
    predicate: CmpPredicate,
    lhs: Value,
    rhs: Value,
) -> Operation {
    use veriop_dialect_smt as bv;
    match predicate {
        CmpPredicate::Eq => smt::eq(ctx, lhs, rhs),
        CmpPredicate::Ne => smt::distinct(ctx, lhs, rhs),
        CmpPredicate::Ult => bv::bv_pred(ctx, &bv::BV_ULT, lhs, rhs),
        CmpPredicate::Ule => bv::bv_pred(ctx, &bv::BV_ULE, lhs, rhs),
        CmpPredicate::Ugt => bv::bv_pred(ctx, &bv::BV_UGT, lhs, rhs),
        CmpPredicate::Uge => bv::bv_pred(ctx, &bv::BV_UGE, lhs, rhs),
        CmpPredicate::Slt => bv::bv_pred(ctx, &bv::BV_SLT, lhs, rhs),
        CmpPredicate::Sle => bv::bv_pred(ctx, &bv::BV_SLE, lhs, rhs),
        CmpPredicate::Sgt => bv::bv_pred(ctx, &bv::BV_SGT, lhs, rhs),
        CmpPredicate::Sge => bv::bv_pred(ctx, &bv::BV_SGE, lhs, rhs),
    }
}

/// Materialize a `Bool` as a width-1 bit-vector.
fn bool_to_bv1(
    rewriter: &mut PatternRewriter<'_>,
    cond: Value,
) -> Result<Value, Report> {
    let one = smt::bv_constant(rewriter.context(), 1, 1)?;
    let zero = smt::bv_constant(rewriter.context(), 0, 1)?;
    let one_value = rewriter.op_result(one, 0);
    let zero_value = rewriter.op_result(zero, 0);
    let ite = smt::ite(rewriter.context(), cond, one_value, zero_value);
    rewriter.insert_op_before_matched(one);
    rewriter.insert_op_before_matched(zero);
    rewriter.insert_op_before_matched(ite);
    Ok(rewriter.op_result(ite, 0))
}

/// `arith.cmpi` under either lowerer.
struct CmpiPattern {
    lowerer: TypeLowerer,
}

impl RewritePattern for CmpiPattern {
    fn name(&self) -> &'static str {
        "arith-cmpi-to-smt"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("arith.cmpi") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let Some(predicate) = rewriter
            .op_attrs(op)
            .get("predicate")
            .and_then(|a| a.as_predicate())
        else {
            return Ok(RewriteOutcome::NotMatched);
        };
        let lhs = rewriter.op_operand(op, 0);
        let rhs = rewriter.op_operand(op, 1);
        match self.lowerer {
            TypeLowerer::Integer => {
                if !rewriter.value_type(lhs).is_bitvec() {
                    return Ok(RewriteOutcome::NotMatched);
                }
                let cmp = lower_predicate(rewriter.context(), predicate, lhs, rhs);
                rewriter.insert_op_before_matched(cmp);
                let cond = rewriter.op_result(cmp, 0);
                let as_bv = bool_to_bv1(rewriter, cond)?;
                rewriter.replace_matched_op(&[], Some(&[as_bv]))?;
            }
            TypeLowerer::IntegerPoison => {
                let Some((lhs_value, lhs_poison)) = unwrap_poison(rewriter, lhs) else {
                    return Ok(RewriteOutcome::NotMatched);
                };
                let (rhs_value, rhs_poison) = unwrap_poison(rewriter, rhs)
                    .expect("operands of a verified cmpi share one type");
                let cmp = lower_predicate(rewriter.context(), predicate, lhs_value, rhs_value);
                rewriter.insert_op_before_matched(cmp);
                let cond = rewriter.op_result(cmp, 0);
                let as_bv = bool_to_bv1(rewriter, cond)?;
                let poison_or = smt::or(rewriter.context(), lhs_poison, rhs_poison);
                rewriter.insert_op_before_matched(poison_or);
                let poison = rewriter.op_result(poison_or, 0);
                let paired = smt::pair(rewriter.context(), as_bv, poison);
                rewriter.replace_matched_op(&[paired], None)?;
            }
        }
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `arith.select` as `smt.ite`.
struct SelectPattern {
    lowerer: TypeLowerer,
}

impl RewritePattern for SelectPattern {
    fn name(&self) -> &'static str {
        "arith-select-to-smt"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("arith.select") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let cond = rewriter.op_operand(op, 0);
        let true_value = rewriter.op_operand(op, 1);
        let false_value = rewriter.op_operand(op, 2);
        match self.lowerer {
            TypeLowerer::Integer => {
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
            }
            TypeLowerer::IntegerPoison => {
                let Some((cond_value, cond_poison)) = unwrap_poison(rewriter, cond) else {
                    return Ok(RewriteOutcome::NotMatched);
                };
                let (true_pair, true_poison) = unwrap_poison(rewriter, true_value)
                    .expect("operands of a verified select are lowered together");
                let (false_pair, false_poison) = unwrap_poison(rewriter, false_value)
                    .expect("operands of a verified select are lowered together");
                let one = smt::bv_constant(rewriter.context(), 1, 1)?;
                let one_value = rewriter.op_result(one, 0);
                let is_set = smt::eq(rewriter.context(), cond_value, one_value);
                rewriter.insert_op_before_matched(one);
                rewriter.insert_op_before_matched(is_set);
                let cond_bool = rewriter.op_result(is_set, 0);
                let ite = smt::ite(rewriter.context(), cond_bool, true_pair, false_pair);
                let branch_poison = smt::or(rewriter.context(), true_poison, false_poison);
                rewriter.insert_op_before_matched(ite);
                rewriter.insert_op_before_matched(branch_poison);
                let branch_poison_value = rewriter.op_result(branch_poison, 0);
                let poison_or = smt::or(rewriter.context(), cond_poison, branch_poison_value);
                rewriter.insert_op_before_matched(poison_or);
                let value = rewriter.op_result(ite, 0);
                let poison = rewriter.op_result(poison_or, 0);
                let paired = smt::pair(rewriter.context(), value, poison);
                rewriter.replace_matched_op(&[paired], None)?;
            }
        }
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `func.func` to `smt.define_fun`: the body block moves over wholesale,
/// its argument and nested value types are rewritten by structural
/// recursion over the signature.
pub struct FuncToSmtPattern {
    pub lowerer: TypeLowerer,
}

impl RewritePattern for FuncToSmtPattern {
    fn name(&self) -> &'static str {
        "func-to-smt"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("func.func") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let Some(Attribute::Type(function_type)) =
            rewriter.op_attrs(op).get("function_type").cloned()
        else {
            return Ok(RewriteOutcome::NotMatched);
        };
        let Type::Func(arg_tys, ret_ty) = &function_type else {
            return Ok(RewriteOutcome::NotMatched);
        };
        let Some(sym_name) = rewriter
            .op_attrs(op)
            .get("sym_name")
            .and_then(|a| a.as_str())
            .map(str::to_owned)
        else {
            return Ok(RewriteOutcome::NotMatched);
        };

        let lowered_args: Vec<Type> = arg_tys.iter().map(|t| self.lowerer.convert(t)).collect();
        let lowered_ret = self.lowerer.convert(ret_ty);
        let lowered_fn = Type::Func(lowered_args.clone(), Box::new(lowered_ret));

        let body = rewriter
            .entry_block(op)
            .ok_or_else(|| Unsupported::new("cannot lower a function without a body"))?;

        let define_fun = rewriter.create_op(
            OperationName::new(&smt::DEFINE_FUN),
            &[],
            [lowered_fn],
            veriop_ir::AttributeMap::new().with("sym_name", Attribute::string(sym_name)),
        );
        let region = rewriter.context().add_region(define_fun);
        rewriter.context().transfer_block(body, region);
        for (index, ty) in lowered_args.into_iter().enumerate() {
            let arg = rewriter.block_args(body)[index];
            rewriter.context().modify_value_type(arg, ty);
        }
        rewriter.replace_matched_op(&[define_fun], Some(&[]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// The op owning the outermost region `op` is nested in, normally the
/// enclosing `builtin.module`.
fn enclosing_root(ctx: &Context, op: Operation) -> Operation {
    let mut current = op;
    while let Some(block) = ctx.op_parent_block(current) {
        match ctx.block_parent(block) {
            Some(region) => current = ctx.region(region).parent,
            None => break,
        }
    }
    current
}

/// `func.call` to `smt.call`: the callee symbol resolves to the result of
/// the `smt.define_fun` the named function has already been lowered to.
/// Calls to functions that are still `func.func` are left alone and
/// revisited once the definition has been rewritten.
pub struct CallPattern;

impl RewritePattern for CallPattern {
    fn name(&self) -> &'static str {
        "func-call-to-smt"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("func.call") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let Some(callee_name) = rewriter
            .op_attrs(op)
            .get("callee")
            .and_then(|a| a.as_str())
            .map(str::to_owned)
        else {
            return Ok(RewriteOutcome::NotMatched);
        };
        let args = rewriter.op_operands(op).to_vec();
        if args.iter().any(|&arg| rewriter.value_type(arg).is_int()) {
            // Arguments not lowered yet; revisit once they are.
            return Ok(RewriteOutcome::NotMatched);
        }

        let root = enclosing_root(rewriter, op);
        let Some(scope) = rewriter.entry_block(root) else {
            return Ok(RewriteOutcome::NotMatched);
        };
        let mut callee = None;
        for &candidate in rewriter.block_ops(scope) {
            if rewriter.op_name(candidate).is("smt.define_fun")
                && rewriter
                    .op_attrs(candidate)
                    .get("sym_name")
                    .and_then(|a| a.as_str())
                    == Some(callee_name.as_str())
            {
                callee = Some(rewriter.op_result(candidate, 0));
                break;
            }
        }
        let Some(callee) = callee else {
            // The definition has not been lowered yet.
            return Ok(RewriteOutcome::NotMatched);
        };

        let call = smt::call(rewriter.context(), callee, &args);
        rewriter.replace_matched_op(&[call], None)?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `func.return` to `smt.return`.
pub struct ReturnPattern;

impl RewritePattern for ReturnPattern {
    fn name(&self) -> &'static str {
        "func-return-to-smt"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("func.return") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let operands = rewriter.op_operands(op).to_vec();
        let &[value] = operands.as_slice() else {
            return Err(Unsupported::new(
                "only single-value returns can be lowered to SMT",
            ));
        };
        let ret = smt::ret(rewriter.context(), value);
        rewriter.replace_matched_op(&[ret], Some(&[]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// The `arith` lowering patterns under the given type lowerer.
pub fn arith_to_smt_patterns(lowerer: TypeLowerer, patterns: &mut RewritePatternSet) {
    patterns.add(ConstantPattern { lowerer });
    for (source, target, divides) in [
        (&arith::ADDI, &smt::BV_ADD, false),
        (&arith::SUBI, &smt::BV_SUB, false),
        (&arith::MULI, &smt::BV_MUL, false),
        (&arith::DIVSI, &smt::BV_SDIV, true),
        (&arith::DIVUI, &smt::BV_UDIV, true),
        (&arith::REMSI, &smt::BV_SREM, true),
        (&arith::REMUI, &smt::BV_UREM, true),
        (&arith::ANDI, &smt::BV_AND, false),
        (&arith::ORI, &smt::BV_OR, false),
        (&arith::XORI, &smt::BV_XOR, false),
        (&arith::SHLI, &smt::BV_SHL, false),
        (&arith::SHRSI, &smt::BV_ASHR, false),
        (&arith::SHRUI, &smt::BV_LSHR, false),
    ] {
        patterns.add(BinaryArithPattern {
            source,
            target,
            divides,
            lowerer,
        });
    }
    patterns.add(CmpiPattern { lowerer });
    patterns.add(SelectPattern { lowerer });
}

/// The `func` lowering patterns.
pub fn func_to_smt_patterns(lowerer: TypeLowerer, patterns: &mut RewritePatternSet) {
    patterns.add(FuncToSmtPattern { lowerer });
    patterns.add(CallPattern);
    patterns.add(ReturnPattern);
}

/// The `lower-to-smt` pass: one greedy application of the pipeline's
/// pattern set.
pub struct LowerToSmt {
    pub lowerer: TypeLowerer,
    pipeline: Pipeline,
}

impl LowerToSmt {
    pub fn new(pipeline: Pipeline) -> Self {
        let lowerer = match pipeline {
            Pipeline::Full => TypeLowerer::IntegerPoison,
            Pipeline::CombOnly => TypeLowerer::Integer,
        };
        Self { lowerer, pipeline }
    }

    pub fn with_lowerer(lowerer: TypeLowerer) -> Self {
        Self {
            lowerer,
            pipeline: Pipeline::CombOnly,
        }
    }

    pub fn patterns(&self) -> RewritePatternSet {
        let mut patterns = RewritePatternSet::new();
        match self.pipeline {
            Pipeline::Full => {
                arith_to_smt_patterns(self.lowerer, &mut patterns);
                crate::comb_to_smt_patterns(&mut patterns);
            }
            Pipeline::CombOnly => {
                crate::comb_to_smt_patterns(&mut patterns);
                arith_to_smt_patterns(self.lowerer, &mut patterns);
            }
        }
        func_to_smt_patterns(self.lowerer, &mut patterns);
        patterns
    }
}

impl Pass for LowerToSmt {
    fn name(&self) -> &'static str {
        "lower-to-smt"
    }

    fn apply(&self, ctx: &mut Context, module: Operation) -> Result<(), Report> {
        log::debug!(target: "lower-to-smt", "lowering module with {:?}", self.lowerer);
        let patterns = self.patterns();
        apply_patterns_greedily(ctx, module, &patterns, &GreedyRewriteConfig::default())?;
        Ok(())
    }
}
