use cranelift_entity::{entity_impl, PrimaryMap};
use smallvec::SmallVec;
use veriop_session::diagnostics::{RewriteError, Unsupported, VerificationError};

use crate::{AttributeMap, DialectRegistry, OperationName, Report, SmallStr, Type};

/// A stable handle to an operation owned by a [Context].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Operation(u32);
entity_impl!(Operation, "op");

/// A stable handle to an SSA value owned by a [Context].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(u32);
entity_impl!(Value, "v");

/// A stable handle to a block owned by a [Context].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A stable handle to a region owned by a [Context].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region(u32);
entity_impl!(Region, "region");

/// One operand slot of an operation: the use of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpOperand {
    pub owner: Operation,
    pub index: u32,
}

/// What defines a value: an operation result or a block argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    OpResult { op: Operation, index: u32 },
    BlockArgument { block: Block, index: u32 },
}

#[derive(Debug)]
pub struct ValueData {
    pub kind: ValueKind,
    pub ty: Type,
    pub uses: Vec<OpOperand>,
    pub name_hint: Option<SmallStr>,
    pub erased: bool,
}

#[derive(Debug)]
pub struct OpData {
    pub name: OperationName,
    pub operands: SmallVec<[Value; 2]>,
    pub results: SmallVec<[Value; 1]>,
    pub attrs: AttributeMap,
    pub regions: SmallVec<[Region; 1]>,
    pub parent: Option<Block>,
    pub erased: bool,
}

#[derive(Debug)]
pub struct BlockData {
    pub args: Vec<Value>,
    pub ops: Vec<Operation>,
    pub parent: Option<Region>,
    pub erased: bool,
}

#[derive(Debug)]
pub struct RegionData {
    pub blocks: Vec<Block>,
    pub parent: Operation,
    pub erased: bool,
}

/// Owner of all IR entities of a session.
///
/// Entities are arena-allocated in [PrimaryMap]s and addressed by handle.
/// Erasing an entity tombstones it: the slot stays readable (type, name,
/// attributes) so that side tables keyed by handle remain meaningful, but
/// the entity no longer participates in traversal or verification.
#[derive(Default)]
pub struct Context {
    pub(crate) ops: PrimaryMap<Operation, OpData>,
    pub(crate) values: PrimaryMap<Value, ValueData>,
    pub(crate) blocks: PrimaryMap<Block, BlockData>,
    pub(crate) regions: PrimaryMap<Region, RegionData>,
    registry: DialectRegistry,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &DialectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DialectRegistry {
        &mut self.registry
    }

    pub fn register_dialect<D: crate::DialectRegistration>(&mut self) {
        self.registry.register_dialect::<D>();
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a detached operation with the given operands, result types and
    /// attributes. Result values are created alongside the op; operand uses
    /// are recorded immediately.
    pub fn create_op(
        &mut self,
        name: OperationName,
        operands: &[Value],
        result_types: impl IntoIterator<Item = Type>,
        attrs: AttributeMap,
    ) -> Operation {
        let op = self.ops.push(OpData {
            name,
            operands: SmallVec::from_slice(operands),
            results: SmallVec::new(),
            attrs,
            regions: SmallVec::new(),
            parent: None,
            erased: false,
        });
        for (index, &value) in operands.iter().enumerate() {
            self.values[value].uses.push(OpOperand {
                owner: op,
                index: index as u32,
            });
        }
        for (index, ty) in result_types.into_iter().enumerate() {
            let result = self.values.push(ValueData {
                kind: ValueKind::OpResult {
                    op,
                    index: index as u32,
                },
                ty,
                uses: Vec::new(),
                name_hint: None,
                erased: false,
            });
            self.ops[op].results.push(result);
        }
        op
    }

    /// Append a fresh region to `op`.
    pub fn add_region(&mut self, op: Operation) -> Region {
        let region = self.regions.push(RegionData {
            blocks: Vec::new(),
            parent: op,
            erased: false,
        });
        self.ops[op].regions.push(region);
        region
    }

    /// Append a fresh block with the given argument types to `region`.
    pub fn create_block(&mut self, region: Region, arg_types: &[Type]) -> Block {
        let block = self.blocks.push(BlockData {
            args: Vec::new(),
            ops: Vec::new(),
            parent: Some(region),
            erased: false,
        });
        for (index, ty) in arg_types.iter().enumerate() {
            let arg = self.values.push(ValueData {
                kind: ValueKind::BlockArgument {
                    block,
                    index: index as u32,
                },
                ty: ty.clone(),
                uses: Vec::new(),
                name_hint: None,
                erased: false,
            });
            self.blocks[block].args.push(arg);
        }
        self.regions[region].blocks.push(block);
        block
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn op(&self, op: Operation) -> &OpData {
        &self.ops[op]
    }

    pub fn op_name(&self, op: Operation) -> OperationName {
        self.ops[op].name
    }

    pub fn op_operands(&self, op: Operation) -> &[Value] {
        &self.ops[op].operands
    }

    pub fn op_operand(&self, op: Operation, index: usize) -> Value {
        self.ops[op].operands[index]
    }

    pub fn op_results(&self, op: Operation) -> &[Value] {
        &self.ops[op].results
    }

    pub fn op_result(&self, op: Operation, index: usize) -> Value {
        self.ops[op].results[index]
    }

    pub fn op_attrs(&self, op: Operation) -> &AttributeMap {
        &self.ops[op].attrs
    }

    pub fn op_attrs_mut(&mut self, op: Operation) -> &mut AttributeMap {
        &mut self.ops[op].attrs
    }

    pub fn op_regions(&self, op: Operation) -> &[Region] {
        &self.ops[op].regions
    }

    pub fn op_parent_block(&self, op: Operation) -> Option<Block> {
        self.ops[op].parent
    }

    pub fn is_op_erased(&self, op: Operation) -> bool {
        self.ops[op].erased
    }

    pub fn value(&self, value: Value) -> &ValueData {
        &self.values[value]
    }

    pub fn value_type(&self, value: Value) -> &Type {
        &self.values[value].ty
    }

    pub fn value_kind(&self, value: Value) -> ValueKind {
        self.values[value].kind
    }

    pub fn value_uses(&self, value: Value) -> &[OpOperand] {
        &self.values[value].uses
    }

    pub fn is_value_erased(&self, value: Value) -> bool {
        self.values[value].erased
    }

    /// The operation producing `value`, when it is an op result.
    pub fn defining_op(&self, value: Value) -> Option<Operation> {
        match self.values[value].kind {
            ValueKind::OpResult { op, .. } => Some(op),
            ValueKind::BlockArgument { .. } => None,
        }
    }

    pub fn name_hint(&self, value: Value) -> Option<&str> {
        self.values[value].name_hint.as_deref()
    }

    pub fn set_name_hint(&mut self, value: Value, hint: impl Into<SmallStr>) {
        self.values[value].name_hint = Some(hint.into());
    }

    pub fn block(&self, block: Block) -> &BlockData {
        &self.blocks[block]
    }

    pub fn block_ops(&self, block: Block) -> &[Operation] {
        &self.blocks[block].ops
    }

    pub fn block_args(&self, block: Block) -> &[Value] {
        &self.blocks[block].args
    }

    pub fn block_parent(&self, block: Block) -> Option<Region> {
        self.blocks[block].parent
    }

    pub fn region(&self, region: Region) -> &RegionData {
        &self.regions[region]
    }

    pub fn region_blocks(&self, region: Region) -> &[Block] {
        &self.regions[region].blocks
    }

    /// The single entry block of the op's first region, if any.
    pub fn entry_block(&self, op: Operation) -> Option<Block> {
        let region = *self.ops[op].regions.first()?;
        self.regions[region].blocks.first().copied()
    }

    /// A short human-readable rendering of an op for diagnostics.
    pub fn op_display(&self, op: Operation) -> String {
        self.ops[op].name.to_string()
    }

    // ------------------------------------------------------------------
    // Linking and splicing
    // ------------------------------------------------------------------

    /// Append a detached operation at the end of `block`.
    pub fn append_op(&mut self, block: Block, op: Operation) {
        debug_assert!(self.ops[op].parent.is_none(), "op is already attached");
        self.ops[op].parent = Some(block);
        self.blocks[block].ops.push(op);
    }

    /// Splice a detached operation right before `anchor`.
    pub fn insert_op_before(&mut self, anchor: Operation, op: Operation) {
        debug_assert!(self.ops[op].parent.is_none(), "op is already attached");
        let block = self.ops[anchor].parent.expect("anchor is detached");
        let index = self.position_in_block(block, anchor);
        self.ops[op].parent = Some(block);
        self.blocks[block].ops.insert(index, op);
    }

    /// Splice a detached operation right after `anchor`.
    pub fn insert_op_after(&mut self, anchor: Operation, op: Operation) {
        debug_assert!(self.ops[op].parent.is_none(), "op is already attached");
        let block = self.ops[anchor].parent.expect("anchor is detached");
        let index = self.position_in_block(block, anchor);
        self.ops[op].parent = Some(block);
        self.blocks[block].ops.insert(index + 1, op);
    }

    /// Unlink `op` from its parent block, leaving it otherwise intact.
    pub fn detach_op(&mut self, op: Operation) {
        if let Some(block) = self.ops[op].parent.take() {
            self.blocks[block].ops.retain(|&o| o != op);
        }
    }

    fn position_in_block(&self, block: Block, op: Operation) -> usize {
        self.blocks[block]
            .ops
            .iter()
            .position(|&o| o == op)
            .expect("op not found in its parent block")
    }

    // ------------------------------------------------------------------
    // Use rewiring
    // ------------------------------------------------------------------

    /// Rewire every use of `from` to `to`.
    pub fn replace_all_uses_of(&mut self, from: Value, to: Value) {
        if from == to {
            return;
        }
        let uses = core::mem::take(&mut self.values[from].uses);
        for operand in &uses {
            self.ops[operand.owner].operands[operand.index as usize] = to;
        }
        self.values[to].uses.extend(uses);
    }

    /// Replace operand slot `index` of `op` with `value`, maintaining the
    /// use lists on both sides.
    pub fn set_operand(&mut self, op: Operation, index: usize, value: Value) {
        let old = self.ops[op].operands[index];
        if old == value {
            return;
        }
        let slot = OpOperand {
            owner: op,
            index: index as u32,
        };
        self.values[old].uses.retain(|&u| u != slot);
        self.ops[op].operands[index] = value;
        self.values[value].uses.push(slot);
    }

    /// Change the type of a value in place. Uses are not re-seated; callers
    /// are responsible for the structural convertibility of the new type.
    pub fn modify_value_type(&mut self, value: Value, ty: Type) {
        self.values[value].ty = ty;
    }

    // ------------------------------------------------------------------
    // Replacement and erasure
    // ------------------------------------------------------------------

    /// Splice `new_ops` before `old`, rewire every use of `old`'s results to
    /// `new_results` (or to the results of the last new op), then erase
    /// `old`.
    pub fn replace_op(
        &mut self,
        old: Operation,
        new_ops: &[Operation],
        new_results: Option<&[Value]>,
    ) -> Result<(), Report> {
        for &op in new_ops {
            self.insert_op_before(old, op);
        }
        let replacements: Vec<Value> = match new_results {
            Some(values) => values.to_vec(),
            None => match new_ops.last() {
                Some(&last) => self.ops[last].results.to_vec(),
                None => Vec::new(),
            },
        };
        let old_results = self.ops[old].results.to_vec();
        if old_results.len() != replacements.len() {
            return Err(Report::new(VerificationError::ArityMismatch {
                op: self.op_display(old),
                kind: "replacement values",
                expected: old_results.len(),
                found: replacements.len(),
            }));
        }
        for (old_result, new_result) in old_results.iter().zip(replacements.iter()) {
            self.replace_all_uses_of(*old_result, *new_result);
            // Keep the readable name on the replacement.
            if self.values[*new_result].name_hint.is_none() {
                let hint = self.values[*old_result].name_hint.clone();
                self.values[*new_result].name_hint = hint;
            }
        }
        self.erase_op(old, true)
    }

    /// Erase an operation and everything nested inside it.
    ///
    /// With `safe` set, the erase fails with `HasUses` if any result still
    /// has uses. An unsafe erase tombstones the op and its results but keeps
    /// their data readable, so that meta-rewrites holding handles (e.g. the
    /// PDL lowering's side table) can still resolve them; any use that is
    /// never rewritten is reported as `DanglingUse` by the verifier.
    pub fn erase_op(&mut self, op: Operation, safe: bool) -> Result<(), Report> {
        if safe {
            for &result in self.ops[op].results.iter() {
                if !self.values[result].uses.is_empty() {
                    return Err(Report::new(RewriteError::HasUses {
                        op: self.op_display(op),
                    }));
                }
            }
        }

        // Nested state first, innermost uses are internal by construction.
        let regions = self.ops[op].regions.to_vec();
        for region in regions {
            let blocks = self.regions[region].blocks.to_vec();
            for block in blocks {
                let ops = self.blocks[block].ops.to_vec();
                for nested in ops.into_iter().rev() {
                    self.erase_op(nested, false)?;
                }
                for &arg in self.blocks[block].args.to_vec().iter() {
                    self.values[arg].erased = true;
                }
                self.blocks[block].erased = true;
            }
            self.regions[region].erased = true;
        }

        let operands = self.ops[op].operands.to_vec();
        for (index, value) in operands.into_iter().enumerate() {
            let slot = OpOperand {
                owner: op,
                index: index as u32,
            };
            self.values[value].uses.retain(|&u| u != slot);
        }

        self.detach_op(op);
        for &result in self.ops[op].results.to_vec().iter() {
            self.values[result].erased = true;
        }
        self.ops[op].erased = true;
        Ok(())
    }

    /// Move `block` (with its arguments and ops) into `region`, detaching it
    /// from its current region.
    pub fn transfer_block(&mut self, block: Block, region: Region) {
        if let Some(old_region) = self.blocks[block].parent.take() {
            self.regions[old_region].blocks.retain(|&b| b != block);
        }
        self.blocks[block].parent = Some(region);
        self.regions[region].blocks.push(block);
    }

    /// Move all operations of `block` in front of `anchor` and erase the
    /// now-empty source block. The source block must have no arguments (or
    /// only unused ones, when they were pre-bound by the caller).
    pub fn inline_block_before(&mut self, anchor: Operation, block: Block) -> Result<(), Report> {
        let dest = self.ops[anchor]
            .parent
            .expect("cannot inline before a detached op");
        for &arg in self.blocks[block].args.iter() {
            if !self.values[arg].uses.is_empty() {
                return Err(Unsupported::new(
                    "cannot inline a block whose arguments still have uses",
                ));
            }
        }

        let moved = core::mem::take(&mut self.blocks[block].ops);
        let index = self.position_in_block(dest, anchor);
        for &op in &moved {
            self.ops[op].parent = Some(dest);
        }
        self.blocks[dest].ops.splice(index..index, moved);

        if let Some(region) = self.blocks[block].parent.take() {
            self.regions[region].blocks.retain(|&b| b != block);
        }
        for &arg in self.blocks[block].args.to_vec().iter() {
            self.values[arg].erased = true;
        }
        self.blocks[block].erased = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use veriop_session::diagnostics::{RewriteError, VerificationError};

    use crate::builtin;
    use crate::testing::{add, constant, sink, test_context};

    #[test]
    fn insertion_preserves_block_order() {
        let mut ctx = test_context();
        let module = builtin::create_module(&mut ctx);
        let body = builtin::module_body(&ctx, module);

        let a = constant(&mut ctx, 1);
        let b = constant(&mut ctx, 2);
        let c = constant(&mut ctx, 3);
        ctx.append_op(body, a);
        ctx.append_op(body, c);
        ctx.insert_op_before(c, b);
        assert_eq!(ctx.block_ops(body), &[a, b, c]);

        let d = constant(&mut ctx, 4);
        ctx.insert_op_after(a, d);
        assert_eq!(ctx.block_ops(body), &[a, d, b, c]);
    }

    #[test]
    fn replace_op_rewires_all_uses() {
        let mut ctx = test_context();
        let module = builtin::create_module(&mut ctx);
        let body = builtin::module_body(&ctx, module);

        let a = constant(&mut ctx, 1);
        let b = constant(&mut ctx, 2);
        let (lhs, rhs) = (ctx.op_result(a, 0), ctx.op_result(b, 0));
        let sum = add(&mut ctx, lhs, rhs);
        let total = ctx.op_result(sum, 0);
        let consume = sink(&mut ctx, total);
        for op in [a, b, sum, consume] {
            ctx.append_op(body, op);
        }

        let replacement = constant(&mut ctx, 3);
        ctx.replace_op(sum, &[replacement], None).unwrap();

        assert!(ctx.is_op_erased(sum));
        assert_eq!(ctx.op_operand(consume, 0), ctx.op_result(replacement, 0));
        assert_eq!(ctx.value_uses(ctx.op_result(replacement, 0)).len(), 1);
        ctx.verify(module).unwrap();
    }

    #[test]
    fn safe_erase_is_blocked_by_uses() {
        let mut ctx = test_context();
        let module = builtin::create_module(&mut ctx);
        let body = builtin::module_body(&ctx, module);

        let a = constant(&mut ctx, 1);
        let value = ctx.op_result(a, 0);
        let consume = sink(&mut ctx, value);
        ctx.append_op(body, a);
        ctx.append_op(body, consume);

        let error = ctx.erase_op(a, true).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<RewriteError>(),
            Some(RewriteError::HasUses { .. })
        ));

        // Erasing the user first unblocks the erase.
        ctx.erase_op(consume, true).unwrap();
        ctx.erase_op(a, true).unwrap();
        assert!(ctx.is_op_erased(a));
    }

    #[test]
    fn unsafe_erase_leaves_a_readable_tombstone() {
        let mut ctx = test_context();
        let module = builtin::create_module(&mut ctx);
        let body = builtin::module_body(&ctx, module);

        let a = constant(&mut ctx, 7);
        let value = ctx.op_result(a, 0);
        let consume = sink(&mut ctx, value);
        ctx.append_op(body, a);
        ctx.append_op(body, consume);

        ctx.erase_op(a, false).unwrap();
        assert!(ctx.is_value_erased(ctx.op_result(a, 0)));
        // The payload is still readable through the tombstone.
        assert_eq!(
            ctx.op_attrs(a).get("value").and_then(|v| v.as_int()).map(|v| v.value),
            Some(7)
        );
        // But the module no longer verifies: the sink's operand dangles.
        let error = ctx.verify(module).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<VerificationError>(),
            Some(VerificationError::DanglingUse { .. })
        ));
    }

    #[test]
    fn use_before_def_fails_verification() {
        let mut ctx = test_context();
        let module = builtin::create_module(&mut ctx);
        let body = builtin::module_body(&ctx, module);

        let a = constant(&mut ctx, 1);
        let value = ctx.op_result(a, 0);
        let consume = sink(&mut ctx, value);
        // Deliberately place the use before the definition.
        ctx.append_op(body, consume);
        ctx.append_op(body, a);

        let error = ctx.verify(module).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<VerificationError>(),
            Some(VerificationError::DanglingUse { .. })
        ));
    }

    #[test]
    fn inline_block_moves_ops_before_anchor() {
        let mut ctx = test_context();
        let module = builtin::create_module(&mut ctx);
        let body = builtin::module_body(&ctx, module);

        let anchor = constant(&mut ctx, 0);
        ctx.append_op(body, anchor);

        // A detached single-block op holding two constants.
        let holder = builtin::create_module(&mut ctx);
        let holder_body = builtin::module_body(&ctx, holder);
        let x = constant(&mut ctx, 1);
        let y = constant(&mut ctx, 2);
        ctx.append_op(holder_body, x);
        ctx.append_op(holder_body, y);

        ctx.inline_block_before(anchor, holder_body).unwrap();
        assert_eq!(ctx.block_ops(body), &[x, y, anchor]);
        assert_eq!(ctx.op_parent_block(x), Some(body));
        ctx.erase_op(holder, true).unwrap();
        ctx.verify(module).unwrap();
    }
}
