//! The greedy pattern-rewrite engine.
//!
//! Patterns are tried in priority order against every operation reachable
//! from the root, in pre-order; the driver keeps going until a full pass
//! makes no change. Ops inserted by a rewrite are revisited within the same
//! pass. Termination is the pattern author's contract; the driver guards
//! against oscillation by bounding how often a single op may be rewritten
//! within one pass.

use core::ops::{Deref, DerefMut};
use std::collections::VecDeque;

use veriop_session::diagnostics::RewriteError;

use crate::{
    AttributeMap, Block, Context, FxHashMap, Operation, OperationName, Report, Type, Value,
};

/// The result of trying one pattern against one op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// The pattern does not apply to this op.
    NotMatched,
    /// The pattern applied and mutated the IR.
    Rewrote,
}

/// A single rewrite rule.
///
/// A rewrite may insert ops before the matched op, replace it (with new ops
/// and/or explicit replacement values), erase it, or inline a block in front
/// of it — all through the [PatternRewriter] it is handed.
pub trait RewritePattern {
    /// Name used in diagnostics and trace logs.
    fn name(&self) -> &'static str;

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report>;
}

/// A prioritized list of patterns: first match wins on any given op.
#[derive(Default)]
pub struct RewritePatternSet {
    patterns: Vec<Box<dyn RewritePattern>>,
}

impl RewritePatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pattern: impl RewritePattern + 'static) -> &mut Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    pub fn add_boxed(&mut self, pattern: Box<dyn RewritePattern>) -> &mut Self {
        self.patterns.push(pattern);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn RewritePattern> {
        self.patterns.iter().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Configuration of the greedy driver.
#[derive(Debug, Clone)]
pub struct GreedyRewriteConfig {
    /// Upper bound on fixpoint passes before the driver gives up.
    pub max_iterations: usize,
    /// Upper bound on rewrites of a single op within one pass; exceeding it
    /// is reported as oscillation.
    pub max_rewrites_per_op: usize,
    /// Verify the IR once the fixpoint is reached.
    pub verify_at_end: bool,
}

impl Default for GreedyRewriteConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_rewrites_per_op: 32,
            verify_at_end: true,
        }
    }
}

/// The mutation interface handed to a pattern for the duration of one match.
///
/// Everything inserted through it is recorded so the driver can revisit the
/// new ops in the same pass. Plain [Context] accessors are available through
/// deref.
pub struct PatternRewriter<'a> {
    ctx: &'a mut Context,
    matched: Operation,
    inserted: Vec<Operation>,
    rewrote: bool,
}

impl<'a> PatternRewriter<'a> {
    pub fn new(ctx: &'a mut Context, matched: Operation) -> Self {
        Self {
            ctx,
            matched,
            inserted: Vec::new(),
            rewrote: false,
        }
    }

    pub fn matched_op(&self) -> Operation {
        self.matched
    }

    pub fn context(&mut self) -> &mut Context {
        self.ctx
    }

    /// Create a detached op; link it with one of the insertion methods.
    pub fn create_op(
        &mut self,
        name: OperationName,
        operands: &[Value],
        result_types: impl IntoIterator<Item = Type>,
        attrs: AttributeMap,
    ) -> Operation {
        self.ctx.create_op(name, operands, result_types, attrs)
    }

    /// Splice a detached op right before the matched op.
    pub fn insert_op_before_matched(&mut self, op: Operation) {
        self.ctx.insert_op_before(self.matched, op);
        self.inserted.push(op);
        self.rewrote = true;
    }

    /// Replace the matched op with `new_ops`, rewiring its result uses to
    /// `new_results` when given, or to the results of the last new op.
    pub fn replace_matched_op(
        &mut self,
        new_ops: &[Operation],
        new_results: Option<&[Value]>,
    ) -> Result<(), Report> {
        self.ctx.replace_op(self.matched, new_ops, new_results)?;
        self.inserted.extend_from_slice(new_ops);
        self.rewrote = true;
        Ok(())
    }

    /// Erase the matched op. A safe erase fails with `HasUses` when any
    /// result is still used; an unsafe erase tombstones the op while
    /// keeping its data readable for meta-rewrites.
    pub fn erase_matched_op(&mut self, safe: bool) -> Result<(), Report> {
        self.ctx.erase_op(self.matched, safe)?;
        self.rewrote = true;
        Ok(())
    }

    /// Move the contents of `block` in front of the matched op.
    pub fn inline_block_before_matched(&mut self, block: Block) -> Result<(), Report> {
        let moved = self.ctx.block_ops(block).to_vec();
        self.ctx.inline_block_before(self.matched, block)?;
        self.inserted.extend(moved);
        self.rewrote = true;
        Ok(())
    }

    /// Change a value's type in place.
    pub fn modify_value_type(&mut self, value: Value, ty: Type) {
        self.ctx.modify_value_type(value, ty);
        self.rewrote = true;
    }

    /// Record an in-place modification the rewriter cannot observe itself
    /// (e.g. attribute updates through `op_attrs_mut`).
    pub fn notify_op_modified(&mut self) {
        self.rewrote = true;
    }

    /// Eagerly verify one op instead of waiting for end-of-pass
    /// verification.
    pub fn verify_op(&self, op: Operation) -> Result<(), Report> {
        self.ctx.verify(op)
    }

    fn take_inserted(&mut self) -> Vec<Operation> {
        core::mem::take(&mut self.inserted)
    }

    fn rewrote(&self) -> bool {
        self.rewrote
    }
}

impl Deref for PatternRewriter<'_> {
    type Target = Context;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for PatternRewriter<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

/// Apply `patterns` greedily to every op reachable from `root` until a full
/// pass makes no change. Returns whether anything changed at all.
pub fn apply_patterns_greedily(
    ctx: &mut Context,
    root: Operation,
    patterns: &RewritePatternSet,
    config: &GreedyRewriteConfig,
) -> Result<bool, Report> {
    let mut changed_any = false;

    for iteration in 0..config.max_iterations {
        let mut changed_this_pass = false;
        let mut rewrite_counts: FxHashMap<Operation, usize> = FxHashMap::default();
        let mut worklist: VecDeque<Operation> = ctx.collect_preorder(root).into();

        while let Some(op) = worklist.pop_front() {
            if ctx.is_op_erased(op) {
                continue;
            }
            for pattern in patterns.iter() {
                let mut rewriter = PatternRewriter::new(ctx, op);
                let outcome = pattern.match_and_rewrite(op, &mut rewriter)?;
                let rewrote = rewriter.rewrote();
                let inserted = rewriter.take_inserted();
                if outcome == RewriteOutcome::NotMatched && !rewrote {
                    continue;
                }

                log::trace!(
                    target: "patterns",
                    "'{}' rewrote {} ({} new ops)",
                    pattern.name(),
                    ctx.op_display(op),
                    inserted.len()
                );
                changed_this_pass = true;

                let count = rewrite_counts.entry(op).or_insert(0);
                *count += 1;
                if *count > config.max_rewrites_per_op {
                    return Err(Report::new(RewriteError::PatternFailed {
                        pattern: pattern.name().to_string(),
                        reason: format!(
                            "op {} was rewritten more than {} times in one pass",
                            ctx.op_display(op),
                            config.max_rewrites_per_op
                        ),
                    }));
                }

                // Revisit the op itself (when it survived) and everything
                // the rewrite inserted, before the rest of the worklist.
                if !ctx.is_op_erased(op) {
                    worklist.push_front(op);
                }
                for &new_op in inserted.iter().rev() {
                    worklist.push_front(new_op);
                }
                break;
            }
        }

        if !changed_this_pass {
            break;
        }
        changed_any = true;

        if iteration + 1 == config.max_iterations {
            return Err(Report::new(RewriteError::PatternFailed {
                pattern: "greedy-driver".to_string(),
                reason: format!(
                    "rewriting did not converge after {} iterations",
                    config.max_iterations
                ),
            }));
        }
    }

    if config.verify_at_end {
        ctx.verify(root)?;
    }
    Ok(changed_any)
}

#[cfg(test)]
mod tests {
    use veriop_session::diagnostics::RewriteError;

    use super::*;
    use crate::builtin;
    use crate::testing::{self, add, constant, sink, test_context};

    /// Folds `test.add(test.const, test.const)` into a fresh constant.
    struct FoldAdd;

    impl RewritePattern for FoldAdd {
        fn name(&self) -> &'static str {
            "fold-add"
        }

        fn match_and_rewrite(
            &self,
            op: Operation,
            rewriter: &mut PatternRewriter<'_>,
        ) -> Result<RewriteOutcome, Report> {
            if !rewriter.op_name(op).is("test.add") {
                return Ok(RewriteOutcome::NotMatched);
            }
            let lhs = rewriter.op_operand(op, 0);
            let rhs = rewriter.op_operand(op, 1);
            let (Some(a), Some(b)) = (
                testing::const_value(rewriter, lhs),
                testing::const_value(rewriter, rhs),
            ) else {
                return Ok(RewriteOutcome::NotMatched);
            };
            let folded = constant(rewriter.context(), a.wrapping_add(b));
            rewriter.replace_matched_op(&[folded], None)?;
            Ok(RewriteOutcome::Rewrote)
        }
    }

    /// Always claims to rewrite the op without changing anything that would
    /// stop it from re-matching.
    struct Oscillator;

    impl RewritePattern for Oscillator {
        fn name(&self) -> &'static str {
            "oscillator"
        }

        fn match_and_rewrite(
            &self,
            op: Operation,
            rewriter: &mut PatternRewriter<'_>,
        ) -> Result<RewriteOutcome, Report> {
            if !rewriter.op_name(op).is("test.add") {
                return Ok(RewriteOutcome::NotMatched);
            }
            rewriter.notify_op_modified();
            Ok(RewriteOutcome::Rewrote)
        }
    }

    fn build_chain(ctx: &mut Context) -> Operation {
        // sink(add(add(c1, c2), c3))
        let module = builtin::create_module(ctx);
        let body = builtin::module_body(ctx, module);
        let c1 = constant(ctx, 1);
        let c2 = constant(ctx, 2);
        let c3 = constant(ctx, 3);
        let (v1, v2, v3) = (ctx.op_result(c1, 0), ctx.op_result(c2, 0), ctx.op_result(c3, 0));
        let a1 = add(ctx, v1, v2);
        let partial = ctx.op_result(a1, 0);
        let a2 = add(ctx, partial, v3);
        let total = ctx.op_result(a2, 0);
        let consume = sink(ctx, total);
        for op in [c1, c2, c3, a1, a2, consume] {
            ctx.append_op(body, op);
        }
        module
    }

    #[test]
    fn greedy_folding_reaches_fixpoint() {
        let mut ctx = test_context();
        let module = build_chain(&mut ctx);
        let mut patterns = RewritePatternSet::new();
        patterns.add(FoldAdd);
        let config = GreedyRewriteConfig::default();

        let changed = apply_patterns_greedily(&mut ctx, module, &patterns, &config).unwrap();
        assert!(changed);

        // Both adds folded; the sink now consumes a constant 6.
        let body = builtin::module_body(&ctx, module);
        let last = *ctx.block_ops(body).last().unwrap();
        assert!(ctx.op_name(last).is("test.sink"));
        let folded = ctx.op_operand(last, 0);
        assert_eq!(testing::const_value(&ctx, folded), Some(6));
        ctx.verify(module).unwrap();
    }

    #[test]
    fn greedy_application_is_idempotent() {
        let mut ctx = test_context();
        let module = build_chain(&mut ctx);
        let mut patterns = RewritePatternSet::new();
        patterns.add(FoldAdd);
        let config = GreedyRewriteConfig::default();

        apply_patterns_greedily(&mut ctx, module, &patterns, &config).unwrap();
        let printed = ctx.print_ir(module);
        let changed = apply_patterns_greedily(&mut ctx, module, &patterns, &config).unwrap();
        assert!(!changed, "fixpoint must be stable");
        assert_eq!(ctx.print_ir(module), printed);
    }

    #[test]
    fn oscillation_is_reported_as_pattern_failure() {
        let mut ctx = test_context();
        let module = build_chain(&mut ctx);
        let mut patterns = RewritePatternSet::new();
        patterns.add(Oscillator);
        let config = GreedyRewriteConfig::default();

        let error = apply_patterns_greedily(&mut ctx, module, &patterns, &config).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<RewriteError>(),
            Some(RewriteError::PatternFailed { .. })
        ));
    }

    #[test]
    fn first_matching_pattern_wins() {
        struct Tag(&'static str);
        impl RewritePattern for Tag {
            fn name(&self) -> &'static str {
                self.0
            }

            fn match_and_rewrite(
                &self,
                op: Operation,
                rewriter: &mut PatternRewriter<'_>,
            ) -> Result<RewriteOutcome, Report> {
                if !rewriter.op_name(op).is("test.add") {
                    return Ok(RewriteOutcome::NotMatched);
                }
                let value = if self.0 == "high" { 100 } else { 200 };
                let replacement = constant(rewriter.context(), value);
                rewriter.replace_matched_op(&[replacement], None)?;
                Ok(RewriteOutcome::Rewrote)
            }
        }

        let mut ctx = test_context();
        let module = builtin::create_module(&mut ctx);
        let body = builtin::module_body(&ctx, module);
        let c1 = constant(&mut ctx, 1);
        let one = ctx.op_result(c1, 0);
        let a = add(&mut ctx, one, one);
        let sum = ctx.op_result(a, 0);
        let consume = sink(&mut ctx, sum);
        for op in [c1, a, consume] {
            ctx.append_op(body, op);
        }

        let mut patterns = RewritePatternSet::new();
        patterns.add(Tag("high"));
        patterns.add(Tag("low"));
        apply_patterns_greedily(&mut ctx, module, &patterns, &GreedyRewriteConfig::default())
            .unwrap();

        let folded = ctx.op_operand(*ctx.block_ops(builtin::module_body(&ctx, module)).last().unwrap(), 0);
        assert_eq!(testing::const_value(&ctx, folded), Some(100));
    }
}
