use veriop_session::diagnostics::VerificationError;

use super::context::{Context, OpOperand, Operation, Value};
use crate::{FxHashSet, Report, TraitSet};

impl Context {
    /// Verify the IR rooted at `root` against the structural invariants:
    /// SSA dominance, operand/result/attribute constraints from the
    /// registered definitions, use-list consistency, and absence of
    /// dangling references to erased values.
    ///
    /// Values defined outside `root` are assumed to dominate it; this is
    /// what allows verifying a detached sub-module whose operands were
    /// created in the surrounding scope.
    pub fn verify(&self, root: Operation) -> Result<(), Report> {
        let mut inside = FxHashSet::default();
        self.walk_preorder(root, &mut |op| {
            for &result in self.op_results(op) {
                inside.insert(result);
            }
            for &region in self.op_regions(op) {
                for &block in self.region_blocks(region) {
                    for &arg in self.block_args(block) {
                        inside.insert(arg);
                    }
                }
            }
        });

        let mut defined = FxHashSet::default();
        self.verify_op(root, &inside, &mut defined)
    }

    fn verify_op(
        &self,
        op: Operation,
        inside: &FxHashSet<Value>,
        defined: &mut FxHashSet<Value>,
    ) -> Result<(), Report> {
        if self.is_op_erased(op) {
            return Ok(());
        }
        let info = self.op_name(op).info();

        // Operand arity and constraints.
        let operands = self.op_operands(op);
        if info.traits.contains(TraitSet::VARIADIC) {
            if let Some(last) = info.operands.last() {
                let fixed = info.operands.len() - 1;
                for (index, &operand) in operands.iter().enumerate() {
                    let constraint = if index < fixed {
                        info.operands[index].constraint
                    } else {
                        last.constraint
                    };
                    self.check_operand(op, index, operand, constraint)?;
                }
            }
        } else {
            if operands.len() != info.operands.len() {
                return Err(Report::new(VerificationError::ArityMismatch {
                    op: self.op_display(op),
                    kind: "operands",
                    expected: info.operands.len(),
                    found: operands.len(),
                }));
            }
            for (index, (&operand, def)) in operands.iter().zip(info.operands).enumerate() {
                self.check_operand(op, index, operand, def.constraint)?;
            }
        }

        // Dominance: every operand must already be defined, or come from
        // outside the verified root entirely.
        for (index, &operand) in operands.iter().enumerate() {
            if self.is_value_erased(operand) {
                return Err(Report::new(VerificationError::DanglingUse {
                    op: self.op_display(op),
                    index,
                }));
            }
            if inside.contains(&operand) && !defined.contains(&operand) {
                return Err(Report::new(VerificationError::DanglingUse {
                    op: self.op_display(op),
                    index,
                }));
            }
        }

        // Result arity and constraints.
        let results = self.op_results(op);
        if results.len() != info.results.len() {
            return Err(Report::new(VerificationError::ArityMismatch {
                op: self.op_display(op),
                kind: "results",
                expected: info.results.len(),
                found: results.len(),
            }));
        }
        for (&result, def) in results.iter().zip(info.results) {
            if !def.constraint.check(self.value_type(result)) {
                return Err(Report::new(VerificationError::TypeMismatch {
                    op: self.op_display(op),
                    detail: format!(
                        "result '{}' has type {}, expected {}",
                        def.name,
                        self.value_type(result),
                        def.constraint
                    ),
                }));
            }
        }

        // Trait-level type agreement.
        if info
            .traits
            .intersects(TraitSet::SAME_TYPE_OPERANDS | TraitSet::SAME_OPERANDS_AND_RESULT_TYPE)
        {
            if let Some((&first, rest)) = operands.split_first() {
                let expected = self.value_type(first);
                for &operand in rest {
                    if self.value_type(operand) != expected {
                        return Err(Report::new(VerificationError::TypeMismatch {
                            op: self.op_display(op),
                            detail: format!(
                                "operands must share one type, found {} and {}",
                                expected,
                                self.value_type(operand)
                            ),
                        }));
                    }
                }
                if info.traits.contains(TraitSet::SAME_OPERANDS_AND_RESULT_TYPE) {
                    for &result in results {
                        if self.value_type(result) != expected {
                            return Err(Report::new(VerificationError::TypeMismatch {
                                op: self.op_display(op),
                                detail: format!(
                                    "result type {} differs from operand type {}",
                                    self.value_type(result),
                                    expected
                                ),
                            }));
                        }
                    }
                }
            }
        }

        // Required attributes and attribute kinds.
        for def in info.attrs {
            match self.op_attrs(op).get(def.name) {
                None if def.required => {
                    return Err(Report::new(VerificationError::MissingAttribute {
                        op: self.op_display(op),
                        name: def.name.to_string(),
                    }));
                }
                Some(attr) if !def.kind.check(attr) => {
                    return Err(Report::new(VerificationError::TypeMismatch {
                        op: self.op_display(op),
                        detail: format!("attribute '{}' has the wrong kind", def.name),
                    }));
                }
                _ => {}
            }
        }

        // Use-list consistency: every operand slot must be present in the
        // used value's use list.
        for (index, &operand) in operands.iter().enumerate() {
            let slot = OpOperand {
                owner: op,
                index: index as u32,
            };
            if !self.value_uses(operand).contains(&slot) {
                return Err(Report::new(VerificationError::DanglingUse {
                    op: self.op_display(op),
                    index,
                }));
            }
        }

        // Parent back-pointers.
        if let Some(block) = self.op_parent_block(op) {
            assert!(
                self.block_ops(block).contains(&op),
                "block does not list '{}' as one of its ops",
                self.op_display(op)
            );
        }

        // Custom hook.
        if let Some(verify) = info.verify {
            verify(self, op)?;
        }

        // Nested regions see outer definitions made so far, but their own
        // definitions stay scoped.
        for &region in self.op_regions(op) {
            if self.region(region).erased {
                continue;
            }
            for &block in self.region_blocks(region) {
                if self.block(block).erased {
                    continue;
                }
                let mut scoped = defined.clone();
                for &arg in self.block_args(block) {
                    scoped.insert(arg);
                }
                let block_ops = self.block_ops(block).to_vec();
                for (position, &nested) in block_ops.iter().enumerate() {
                    self.verify_op(nested, inside, &mut scoped)?;
                    if self.op_name(nested).has_trait(TraitSet::TERMINATOR)
                        && position + 1 != block_ops.len()
                    {
                        return Err(Report::new(VerificationError::TypeMismatch {
                            op: self.op_display(nested),
                            detail: "terminator is not the last op in its block".to_string(),
                        }));
                    }
                    for &result in self.op_results(nested) {
                        scoped.insert(result);
                    }
                }
            }
        }

        for &result in results {
            defined.insert(result);
        }
        Ok(())
    }

    fn check_operand(
        &self,
        op: Operation,
        index: usize,
        operand: Value,
        constraint: crate::TypeConstraint,
    ) -> Result<(), Report> {
        // Erased operands are reported as dangling uses by the caller.
        if self.is_value_erased(operand) {
            return Ok(());
        }
        if !constraint.check(self.value_type(operand)) {
            return Err(Report::new(VerificationError::TypeMismatch {
                op: self.op_display(op),
                detail: format!(
                    "operand #{index} has type {}, expected {}",
                    self.value_type(operand),
                    constraint
                ),
            }));
        }
        Ok(())
    }
}
