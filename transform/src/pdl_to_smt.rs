//! Lowering of `pdl` patterns (plus the `pdl.df` known-bits extension) into
//! a single SMT query.
//!
//! The produced module is unsatisfiable iff the rewrite described by the
//! pattern is sound: operands become symbolic constants, the matched
//! operation is materialized concretely and lowered through the arith/comb
//! pipelines, and the replacement obligation is asserted *negated*
//! (`distinct`), conjoined with the dataflow preconditions accumulated from
//! `pdl.df.get` in order of occurrence.
//!
//! The PDL meta-ops are erased unsafely as they are processed: their
//! tombstoned results stay readable through the context, and the side
//! table maps each `pdl.operation` handle to the op carrying its lowered
//! result. Any handle that never gets resolved shows up as a dangling use
//! when the pass verifies the module at the end.

use std::cell::RefCell;
use std::rc::Rc;

use veriop_dialect_smt as smt;
use veriop_ir::{
    builtin,
    diagnostics::Unsupported,
    patterns::{
        apply_patterns_greedily, GreedyRewriteConfig, PatternRewriter, RewriteOutcome,
        RewritePattern, RewritePatternSet,
    },
    Attribute, AttributeMap, Context, FxHashMap, Operation, Report, Type, Value,
};

use crate::{
    comb_to_smt_patterns,
    lower_to_smt::{arith_to_smt_patterns, func_to_smt_patterns, TypeLowerer},
    Pass,
};

/// Pass-local state shared by the PDL patterns.
#[derive(Default)]
struct PdlRewriteCtx {
    /// Maps the result handle of a `pdl.operation` to the op that carries
    /// its lowered value.
    pdl_op_results: FxHashMap<Value, Operation>,
    /// Dataflow preconditions, in order of `pdl.df.get` occurrence.
    preconditions: Vec<Value>,
}

type SharedCtx = Rc<RefCell<PdlRewriteCtx>>;

/// Read the constant type out of a (possibly erased) `pdl.type` handle.
fn constant_type_of(ctx: &Context, handle: Value) -> Result<Type, Report> {
    let op = ctx
        .defining_op(handle)
        .ok_or_else(|| Unsupported::new("expected a 'pdl.type' result"))?;
    if !ctx.op_name(op).is("pdl.type") {
        return Err(Unsupported::new(format!(
            "expected a 'pdl.type' result, found '{}'",
            ctx.op_name(op)
        )));
    }
    ctx.op_attrs(op)
        .get("constant_type")
        .and_then(|a| a.as_type())
        .cloned()
        .ok_or_else(|| Unsupported::new("non-constant types in patterns"))
}

/// Read the constant value out of a (possibly erased) `pdl.attribute`
/// handle.
fn constant_attr_of(ctx: &Context, handle: Value) -> Result<Attribute, Report> {
    let op = ctx
        .defining_op(handle)
        .ok_or_else(|| Unsupported::new("expected a 'pdl.attribute' result"))?;
    if !ctx.op_name(op).is("pdl.attribute") {
        return Err(Unsupported::new(format!(
            "expected a 'pdl.attribute' result, found '{}'",
            ctx.op_name(op)
        )));
    }
    ctx.op_attrs(op)
        .get("value")
        .cloned()
        .ok_or_else(|| Unsupported::new("non-constant attributes in patterns"))
}

/// The operand segments of a `pdl.operation` or `pdl.replace`.
fn operand_segments(ctx: &Context, op: Operation) -> Result<Vec<Vec<Value>>, Report> {
    let sizes: Vec<usize> = ctx
        .op_attrs(op)
        .get("operand_segment_sizes")
        .and_then(|a| a.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|a| a.as_int())
                .map(|attr| attr.value as usize)
                .collect()
        })
        .ok_or_else(|| {
            Unsupported::new(format!(
                "'{}' without operand segment sizes",
                ctx.op_name(op)
            ))
        })?;
    let operands = ctx.op_operands(op);
    if sizes.iter().sum::<usize>() != operands.len() {
        return Err(Unsupported::new(format!(
            "'{}' segment sizes do not cover its operands",
            ctx.op_name(op)
        )));
    }
    let mut segments = Vec::with_capacity(sizes.len());
    let mut start = 0;
    for size in sizes {
        segments.push(operands[start..start + size].to_vec());
        start += size;
    }
    Ok(segments)
}

/// `pdl.pattern`: splice the body into the enclosing module, followed by
/// the final `check_sat`.
struct PatternRewrite;

impl RewritePattern for PatternRewrite {
    fn name(&self) -> &'static str {
        "pdl-pattern"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("pdl.pattern") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let body = rewriter
            .entry_block(op)
            .ok_or_else(|| Unsupported::new("'pdl.pattern' without a body"))?;
        rewriter.inline_block_before_matched(body)?;
        let check = smt::check_sat(rewriter.context());
        rewriter.insert_op_before_matched(check);
        rewriter.erase_matched_op(true)?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `pdl.rewrite` / `pdl.df.rewrite`: splice the body, drop the op.
struct RewriteRewrite {
    op_name: &'static str,
}

impl RewritePattern for RewriteRewrite {
    fn name(&self) -> &'static str {
        "pdl-rewrite"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is(self.op_name) {
            return Ok(RewriteOutcome::NotMatched);
        }
        if let Some(body) = rewriter.entry_block(op) {
            rewriter.inline_block_before_matched(body)?;
        }
        rewriter.erase_matched_op(true)?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `pdl.type` / `pdl.attribute`: erase unsafely; later reads go through the
/// tombstone.
struct EraseMetaOp {
    op_name: &'static str,
}

impl RewritePattern for EraseMetaOp {
    fn name(&self) -> &'static str {
        "pdl-erase-meta"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is(self.op_name) {
            return Ok(RewriteOutcome::NotMatched);
        }
        rewriter.erase_matched_op(false)?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `pdl.operand`: a fresh symbolic input of the lowered type.
struct OperandRewrite {
    lowerer: TypeLowerer,
}

impl RewritePattern for OperandRewrite {
    fn name(&self) -> &'static str {
        "pdl-operand"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("pdl.operand") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let handle = rewriter.op_operand(op, 0);
        let ty = constant_type_of(rewriter.context(), handle)?;
        let smt_ty = self.lowerer.convert(&ty);
        let declared = smt::declare_const(rewriter.context(), smt_ty);
        rewriter.replace_matched_op(&[declared], None)?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// Build the known-bits soundness condition
/// `(v & zeros) = 0 /\ (v & ones) = ones` and return it with the ops that
/// compute it.
fn kb_analysis_correct(
    ctx: &mut Context,
    value: Value,
    zeros: Value,
    ones: Value,
) -> Result<(Value, Vec<Operation>), Report> {
    let width = ctx
        .value_type(value)
        .bit_width()
        .ok_or_else(|| Unsupported::new("known-bits analysis over a non-bit-vector value"))?;
    let and_zeros = smt::bv_binary(ctx, &smt::BV_AND, value, zeros);
    let and_zeros_value = ctx.op_result(and_zeros, 0);
    let zero = smt::bv_constant(ctx, 0, width)?;
    let zero_value = ctx.op_result(zero, 0);
    let zeros_correct = smt::eq(ctx, and_zeros_value, zero_value);
    let zeros_correct_value = ctx.op_result(zeros_correct, 0);
    let and_ones = smt::bv_binary(ctx, &smt::BV_AND, value, ones);
    let and_ones_value = ctx.op_result(and_ones, 0);
    let ones_correct = smt::eq(ctx, and_ones_value, ones);
    let ones_correct_value = ctx.op_result(ones_correct, 0);
    let all_correct = smt::and(ctx, zeros_correct_value, ones_correct_value);
    let all_correct_value = ctx.op_result(all_correct, 0);
    Ok((
        all_correct_value,
        vec![and_zeros, zero, zeros_correct, and_ones, ones_correct, all_correct],
    ))
}

/// `pdl.df.get`: two fresh symbolic bit-vectors for (zeros, ones) plus the
/// soundness precondition.
struct GetOpRewrite {
    shared: SharedCtx,
}

impl RewritePattern for GetOpRewrite {
    fn name(&self) -> &'static str {
        "pdl-df-get"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("pdl.df.get") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let value = rewriter.op_operand(op, 0);
        let Some(bv_ty) = rewriter.value_type(value).is_bitvec().then(|| {
            rewriter.value_type(value).clone()
        }) else {
            return Ok(RewriteOutcome::NotMatched);
        };

        let zeros_op = smt::declare_const(rewriter.context(), bv_ty.clone());
        let ones_op = smt::declare_const(rewriter.context(), bv_ty);
        let zeros = rewriter.op_result(zeros_op, 0);
        let ones = rewriter.op_result(ones_op, 0);

        let (all_correct, correct_ops) =
            kb_analysis_correct(rewriter.context(), value, zeros, ones)?;
        self.shared.borrow_mut().preconditions.push(all_correct);

        let mut new_ops = vec![zeros_op, ones_op];
        new_ops.extend(correct_ops);
        rewriter.replace_matched_op(&new_ops, Some(&[zeros, ones]))?;

        let base = rewriter
            .name_hint(value)
            .map(str::to_owned)
            .unwrap_or_else(|| "value".to_string());
        let ctx = rewriter.context();
        ctx.set_name_hint(zeros, format!("{base}_zeros"));
        ctx.set_name_hint(ones, format!("{base}_ones"));
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `pdl.operation`: materialize the named op concretely, lower it through
/// the arith/comb pipelines in a scratch module, and splice the result in.
struct OperationRewrite {
    shared: SharedCtx,
}

impl RewritePattern for OperationRewrite {
    fn name(&self) -> &'static str {
        "pdl-operation"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("pdl.operation") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let op_name = rewriter
            .op_attrs(op)
            .get("op_name")
            .and_then(|a| a.as_str())
            .map(str::to_owned)
            .ok_or_else(|| Unsupported::new("'pdl.operation' without a constant op name"))?;
        let definition = rewriter.context().registry().expect(&op_name)?;

        let segments = operand_segments(rewriter.context(), op)?;
        let [operand_values, attribute_values, type_values] = &segments[..] else {
            return Err(Unsupported::new("'pdl.operation' expects three operand segments"));
        };

        if type_values.len() != 1 {
            // The lowered result is read off the last op of the scratch
            // module, which only works for single-result operations.
            return Err(Unsupported::new(
                "'pdl.operation' with multiple results",
            ));
        }

        let mut result_types = Vec::with_capacity(type_values.len());
        for &handle in type_values {
            result_types.push(constant_type_of(rewriter.context(), handle)?);
        }

        let attr_names: Vec<String> = rewriter
            .op_attrs(op)
            .get("attribute_names")
            .and_then(|a| a.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|a| a.as_str())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let mut attrs = AttributeMap::new();
        for (name, &handle) in attr_names.iter().zip(attribute_values.iter()) {
            attrs.set(name.as_str(), constant_attr_of(rewriter.context(), handle)?);
        }

        let synthesized =
            rewriter
                .context()
                .create_op(definition, operand_values, result_types, attrs);

        // Lower the op in a scratch module, then splice the result ops in
        // front of the matched op.
        let scratch = builtin::create_module(rewriter.context());
        let scratch_body = builtin::module_body(rewriter.context(), scratch);
        rewriter.context().append_op(scratch_body, synthesized);

        let mut patterns = RewritePatternSet::new();
        arith_to_smt_patterns(TypeLowerer::Integer, &mut patterns);
        comb_to_smt_patterns(&mut patterns);
        func_to_smt_patterns(TypeLowerer::Integer, &mut patterns);
        apply_patterns_greedily(
            rewriter.context(),
            scratch,
            &patterns,
            &GreedyRewriteConfig::default(),
        )?;

        let last = rewriter
            .block_ops(scratch_body)
            .last()
            .copied()
            .ok_or_else(|| Unsupported::new("lowering erased the matched operation entirely"))?;
        self.shared
            .borrow_mut()
            .pdl_op_results
            .insert(rewriter.op_result(op, 0), last);

        rewriter.inline_block_before_matched(scratch_body)?;
        rewriter.context().erase_op(scratch, true)?;
        rewriter.erase_matched_op(false)?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// Left-fold the precondition list with `smt.and`, inserting the fold ops
/// before the matched op. Returns `None` when there are no preconditions.
fn fold_preconditions(
    rewriter: &mut PatternRewriter<'_>,
    preconditions: &[Value],
) -> Option<Value> {
    let (&head, rest) = preconditions.split_first()?;
    let mut folded = head;
    for &precondition in rest {
        let and_op = smt::and(rewriter.context(), folded, precondition);
        rewriter.insert_op_before_matched(and_op);
        folded = rewriter.op_result(and_op, 0);
    }
    Some(folded)
}

/// `pdl.replace`: assert the negation of the refinement, under the
/// accumulated preconditions.
struct ReplaceRewrite {
    shared: SharedCtx,
}

impl RewritePattern for ReplaceRewrite {
    fn name(&self) -> &'static str {
        "pdl-replace"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("pdl.replace") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let segments = operand_segments(rewriter.context(), op)?;
        let [replaced, repl_operation, repl_values] = &segments[..] else {
            return Err(Unsupported::new("'pdl.replace' expects three operand segments"));
        };

        let shared = self.shared.borrow();
        let &[replaced_handle] = replaced.as_slice() else {
            return Err(Unsupported::new("'pdl.replace' without a replaced op"));
        };
        let replaced_op = *shared.pdl_op_results.get(&replaced_handle).ok_or_else(|| {
            Unsupported::new("'pdl.replace' of an operation that was never materialized")
        })?;
        if rewriter.op_results(replaced_op).len() != 1 {
            return Err(Unsupported::new("replacing an operation with multiple results"));
        }
        let replaced_value = rewriter.op_result(replaced_op, 0);

        let replacing_value = if let &[value] = repl_values.as_slice() {
            value
        } else if let &[handle] = repl_operation.as_slice() {
            let replacing_op = *shared.pdl_op_results.get(&handle).ok_or_else(|| {
                Unsupported::new("'pdl.replace' with an operation that was never materialized")
            })?;
            if rewriter.op_results(replacing_op).len() != 1 {
                return Err(Unsupported::new("replacing with an operation with multiple results"));
            }
            rewriter.op_result(replacing_op, 0)
        } else {
            return Err(Unsupported::new(
                "'pdl.replace' needs a replacement op or exactly one value",
            ));
        };
        let preconditions = shared.preconditions.clone();
        drop(shared);

        let distinct = smt::distinct(rewriter.context(), replacing_value, replaced_value);
        let distinct_value = rewriter.op_result(distinct, 0);

        match fold_preconditions(rewriter, &preconditions) {
            None => {
                let assert = smt::assert_op(rewriter.context(), distinct_value);
                rewriter.replace_matched_op(&[distinct, assert], None)?;
            }
            Some(folded) => {
                let conjoined = smt::and(rewriter.context(), distinct_value, folded);
                let conjoined_value = rewriter.op_result(conjoined, 0);
                let assert = smt::assert_op(rewriter.context(), conjoined_value);
                rewriter.replace_matched_op(&[distinct, conjoined, assert], None)?;
            }
        }
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `pdl.result`: resolve to the materialized op's result.
struct ResultRewrite {
    shared: SharedCtx,
}

impl RewritePattern for ResultRewrite {
    fn name(&self) -> &'static str {
        "pdl-result"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("pdl.result") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let index = rewriter
            .op_attrs(op)
            .get("index")
            .and_then(|a| a.as_int())
            .map(|attr| attr.value as usize)
            .ok_or_else(|| Unsupported::new("'pdl.result' without an index"))?;
        let parent = rewriter.op_operand(op, 0);
        let shared = self.shared.borrow();
        let Some(&materialized) = shared.pdl_op_results.get(&parent) else {
            // The producing `pdl.operation` has not been lowered yet.
            return Ok(RewriteOutcome::NotMatched);
        };
        let result = rewriter.op_result(materialized, index);
        drop(shared);
        rewriter.replace_matched_op(&[], Some(&[result]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `pdl.df.attach`: assert that the claimed domain can be wrong, under the
/// accumulated preconditions. Unsatisfiable iff the attachment is sound.
struct AttachRewrite {
    shared: SharedCtx,
}

impl RewritePattern for AttachRewrite {
    fn name(&self) -> &'static str {
        "pdl-df-attach"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("pdl.df.attach") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let operands = rewriter.op_operands(op).to_vec();
        let &[value, zeros, ones] = operands.as_slice() else {
            return Err(Unsupported::new(
                "'pdl.df.attach' expects a value and a (zeros, ones) domain",
            ));
        };
        if !rewriter.value_type(value).is_bitvec() {
            return Ok(RewriteOutcome::NotMatched);
        }

        let (correct, correct_ops) = kb_analysis_correct(rewriter.context(), value, zeros, ones)?;
        for new_op in correct_ops {
            rewriter.insert_op_before_matched(new_op);
        }
        let incorrect_op = smt::not(rewriter.context(), correct);
        rewriter.insert_op_before_matched(incorrect_op);
        let incorrect = rewriter.op_result(incorrect_op, 0);

        let preconditions = self.shared.borrow().preconditions.clone();
        match fold_preconditions(rewriter, &preconditions) {
            None => {
                let assert = smt::assert_op(rewriter.context(), incorrect);
                rewriter.replace_matched_op(&[assert], None)?;
            }
            Some(folded) => {
                let implies = smt::and(rewriter.context(), folded, incorrect);
                rewriter.insert_op_before_matched(implies);
                let implies_value = rewriter.op_result(implies, 0);
                let assert = smt::assert_op(rewriter.context(), implies_value);
                rewriter.replace_matched_op(&[assert], None)?;
            }
        }
        Ok(RewriteOutcome::Rewrote)
    }
}

/// The `pdl-to-smt` pass.
pub struct PdlToSmt;

impl Pass for PdlToSmt {
    fn name(&self) -> &'static str {
        "pdl-to-smt"
    }

    fn apply(&self, ctx: &mut Context, module: Operation) -> Result<(), Report> {
        let shared: SharedCtx = Rc::new(RefCell::new(PdlRewriteCtx::default()));
        let mut patterns = RewritePatternSet::new();
        patterns.add(PatternRewrite);
        patterns.add(RewriteRewrite {
            op_name: "pdl.rewrite",
        });
        patterns.add(RewriteRewrite {
            op_name: "pdl.df.rewrite",
        });
        patterns.add(EraseMetaOp {
            op_name: "pdl.type",
        });
        patterns.add(EraseMetaOp {
            op_name: "pdl.attribute",
        });
        patterns.add(OperandRewrite {
            lowerer: TypeLowerer::Integer,
        });
        patterns.add(GetOpRewrite {
            shared: Rc::clone(&shared),
        });
        patterns.add(OperationRewrite {
            shared: Rc::clone(&shared),
        });
        patterns.add(ReplaceRewrite {
            shared: Rc::clone(&shared),
        });
        patterns.add(ResultRewrite {
            shared: Rc::clone(&shared),
        });
        patterns.add(AttachRewrite {
            shared: Rc::clone(&shared),
        });
        arith_to_smt_patterns(TypeLowerer::Integer, &mut patterns);
        comb_to_smt_patterns(&mut patterns);
        func_to_smt_patterns(TypeLowerer::Integer, &mut patterns);

        log::debug!(target: "pdl-to-smt", "encoding pattern module as an SMT query");
        apply_patterns_greedily(ctx, module, &patterns, &GreedyRewriteConfig::default())?;
        Ok(())
    }
}
