//! Lowering of the opaque effect state into explicit memory + UB pairs.
//!
//! After this pass, every `!eff.state` value has become a
//! `Pair(Memory, Bool)` (the bool is the UB flag) and every
//! `!mem_effect.ptr` a `Pair(BlockID, BitVec(64))`. The `mem_effect` ops
//! are expanded into the corresponding `mem` sequences; out-of-bounds
//! accesses OR the UB flag with the bounds check.

use veriop_dialect_mem as mem;
use veriop_dialect_smt as smt;
use veriop_ir::{
    patterns::{
        apply_patterns_greedily, GreedyRewriteConfig, PatternRewriter, RewriteOutcome,
        RewritePattern, RewritePatternSet,
    },
    Attribute, Context, Operation, Report, Type, Value,
};

use crate::Pass;

/// The lowered form of `!eff.state`.
pub fn state_type() -> Type {
    Type::pair(Type::Memory, Type::Bool)
}

/// The lowered form of `!mem_effect.ptr`.
pub fn pointer_type() -> Type {
    Type::pair(Type::BlockId, Type::BitVec(64))
}

fn convert_type(ty: &Type) -> Type {
    match ty {
        Type::State => state_type(),
        Type::Pointer => pointer_type(),
        Type::Pair(a, b) => Type::pair(convert_type(a), convert_type(b)),
        Type::Array(k, v) => Type::array(convert_type(k), convert_type(v)),
        Type::Func(args, ret) => Type::Func(
            args.iter().map(convert_type).collect(),
            Box::new(convert_type(ret)),
        ),
        other => other.clone(),
    }
}

fn convert_attr(attr: &Attribute) -> Attribute {
    match attr {
        Attribute::Type(ty) => Attribute::Type(convert_type(ty)),
        Attribute::Array(items) => Attribute::Array(items.iter().map(convert_attr).collect()),
        other => other.clone(),
    }
}

/// Split a lowered state value into (memory, ub flag).
fn unwrap_state(rewriter: &mut PatternRewriter<'_>, state: Value) -> Option<(Value, Value)> {
    rewriter.value_type(state).as_pair()?;
    let memory_op = smt::first(rewriter.context(), state);
    let ub_op = smt::second(rewriter.context(), state);
    rewriter.insert_op_before_matched(memory_op);
    rewriter.insert_op_before_matched(ub_op);
    let ctx = rewriter.context();
    let memory = ctx.op_result(memory_op, 0);
    let ub = ctx.op_result(ub_op, 0);
    ctx.set_name_hint(memory, "memory");
    ctx.set_name_hint(ub, "ub_marker");
    Some((memory, ub))
}

/// Rebuild a state value from (memory, ub flag).
fn wrap_state(rewriter: &mut PatternRewriter<'_>, memory: Value, ub: Value) -> Value {
    let state_op = smt::pair(rewriter.context(), memory, ub);
    rewriter.insert_op_before_matched(state_op);
    let ctx = rewriter.context();
    let state = ctx.op_result(state_op, 0);
    ctx.set_name_hint(state, "state");
    state
}

/// Split a lowered pointer into (block id, byte offset).
fn unwrap_pointer(rewriter: &mut PatternRewriter<'_>, pointer: Value) -> Option<(Value, Value)> {
    rewriter.value_type(pointer).as_pair()?;
    let block_id_op = smt::first(rewriter.context(), pointer);
    let offset_op = smt::second(rewriter.context(), pointer);
    rewriter.insert_op_before_matched(block_id_op);
    rewriter.insert_op_before_matched(offset_op);
    let ctx = rewriter.context();
    let block_id = ctx.op_result(block_id_op, 0);
    let offset = ctx.op_result(offset_op, 0);
    ctx.set_name_hint(block_id, "block_id");
    ctx.set_name_hint(offset, "ptr_offset");
    Some((block_id, offset))
}

/// Rebuild a pointer value from (block id, byte offset).
fn wrap_pointer(rewriter: &mut PatternRewriter<'_>, block_id: Value, offset: Value) -> Value {
    let pointer_op = smt::pair(rewriter.context(), block_id, offset);
    rewriter.insert_op_before_matched(pointer_op);
    let ctx = rewriter.context();
    let pointer = ctx.op_result(pointer_op, 0);
    ctx.set_name_hint(pointer, "ptr");
    pointer
}

/// Bounds check of an access at `offset` into `block`: out of bounds iff
/// the offset is not below the block size.
fn check_bounds(rewriter: &mut PatternRewriter<'_>, offset: Value, block: Value) -> Value {
    let size_op = mem::get_block_size(rewriter.context(), block);
    rewriter.insert_op_before_matched(size_op);
    let block_size = rewriter.op_result(size_op, 0);
    rewriter.context().set_name_hint(block_size, "block_size");

    let oob_op = smt::bv_pred(rewriter.context(), &smt::BV_UGE, offset, block_size);
    rewriter.insert_op_before_matched(oob_op);
    let out_of_bounds = rewriter.op_result(oob_op, 0);
    rewriter
        .context()
        .set_name_hint(out_of_bounds, "offset_out_of_bounds");
    out_of_bounds
}

/// `ub.trigger`: the new state keeps the memory and forces the flag true.
struct LowerTrigger;

impl RewritePattern for LowerTrigger {
    fn name(&self) -> &'static str {
        "lower-ub-trigger"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("ub.trigger") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let state = rewriter.op_operand(op, 0);
        let Some((memory, _)) = unwrap_state(rewriter, state) else {
            return Ok(RewriteOutcome::NotMatched);
        };
        let raised = smt::constant_bool(rewriter.context(), true);
        rewriter.insert_op_before_matched(raised);
        let ub = rewriter.op_result(raised, 0);
        let new_state = wrap_state(rewriter, memory, ub);
        rewriter.replace_matched_op(&[], Some(&[new_state]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `ub.to_bool`: project the flag.
struct LowerToBool;

impl RewritePattern for LowerToBool {
    fn name(&self) -> &'static str {
        "lower-ub-to-bool"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("ub.to_bool") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let state = rewriter.op_operand(op, 0);
        let Some((_, ub)) = unwrap_state(rewriter, state) else {
            return Ok(RewriteOutcome::NotMatched);
        };
        rewriter.replace_matched_op(&[], Some(&[ub]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// Rewrites result types, block argument types, and type attributes that
/// mention effect states or pointers, on any op.
struct LowerGeneric;

impl RewritePattern for LowerGeneric {
    fn name(&self) -> &'static str {
        "lower-effect-types"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        let mut changed = false;
        for result in rewriter.op_results(op).to_vec() {
            let converted = convert_type(rewriter.value_type(result));
            if &converted != rewriter.value_type(result) {
                rewriter.modify_value_type(result, converted);
                changed = true;
            }
        }
        for region in rewriter.op_regions(op).to_vec() {
            for block in rewriter.region_blocks(region).to_vec() {
                for arg in rewriter.block_args(block).to_vec() {
                    let converted = convert_type(rewriter.value_type(arg));
                    if &converted != rewriter.value_type(arg) {
                        rewriter.modify_value_type(arg, converted);
                        changed = true;
                    }
                }
            }
        }
        let attrs: Vec<(String, Attribute)> = rewriter
            .op_attrs(op)
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        for (name, value) in attrs {
            let converted = convert_attr(&value);
            if converted != value {
                rewriter.op_attrs_mut(op).set(name.as_str(), converted);
                rewriter.notify_op_modified();
                changed = true;
            }
        }
        Ok(if changed {
            RewriteOutcome::Rewrote
        } else {
            RewriteOutcome::NotMatched
        })
    }
}

/// `mem_effect.alloc`: take a fresh block ID, mark the block live at the
/// requested size, and return a pointer to its start.
struct LowerAlloc;

impl RewritePattern for LowerAlloc {
    fn name(&self) -> &'static str {
        "lower-mem-alloc"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("mem_effect.alloc") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let state = rewriter.op_operand(op, 0);
        let size = rewriter.op_operand(op, 1);
        let Some((memory, ub)) = unwrap_state(rewriter, state) else {
            return Ok(RewriteOutcome::NotMatched);
        };

        let id_op = mem::get_fresh_block_id(rewriter.context(), memory);
        rewriter.insert_op_before_matched(id_op);
        let memory = rewriter.op_result(id_op, 0);
        let block_id = rewriter.op_result(id_op, 1);

        let get_block = mem::get_block(rewriter.context(), memory, block_id);
        rewriter.insert_op_before_matched(get_block);
        let block = rewriter.op_result(get_block, 0);
        let live = smt::constant_bool(rewriter.context(), true);
        rewriter.insert_op_before_matched(live);
        let live_value = rewriter.op_result(live, 0);
        let set_live = mem::set_block_live_marker(rewriter.context(), block, live_value);
        rewriter.insert_op_before_matched(set_live);
        let block = rewriter.op_result(set_live, 0);
        let set_size = mem::set_block_size(rewriter.context(), block, size);
        rewriter.insert_op_before_matched(set_size);
        let block = rewriter.op_result(set_size, 0);

        let set_block = mem::set_block(rewriter.context(), block, memory, block_id);
        rewriter.insert_op_before_matched(set_block);
        let new_memory = rewriter.op_result(set_block, 0);

        let zero = smt::bv_constant(rewriter.context(), 0, 64)?;
        rewriter.insert_op_before_matched(zero);
        let zero_offset = rewriter.op_result(zero, 0);
        let pointer = wrap_pointer(rewriter, block_id, zero_offset);

        let new_state = wrap_state(rewriter, new_memory, ub);
        rewriter.replace_matched_op(&[], Some(&[new_state, pointer]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `mem_effect.offset_pointer`: add to the pointer's byte offset.
struct LowerPointerOffset;

impl RewritePattern for LowerPointerOffset {
    fn name(&self) -> &'static str {
        "lower-mem-offset-pointer"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("mem_effect.offset_pointer") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let pointer = rewriter.op_operand(op, 0);
        let offset = rewriter.op_operand(op, 1);
        let Some((block_id, base_offset)) = unwrap_pointer(rewriter, pointer) else {
            return Ok(RewriteOutcome::NotMatched);
        };
        let add = smt::bv_binary(rewriter.context(), &smt::BV_ADD, base_offset, offset);
        rewriter.insert_op_before_matched(add);
        let new_offset = rewriter.op_result(add, 0);
        rewriter.context().set_name_hint(new_offset, "ptr_offset");
        let new_pointer = wrap_pointer(rewriter, block_id, new_offset);
        rewriter.replace_matched_op(&[], Some(&[new_pointer]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `mem_effect.read`: fetch the block's bytes, check bounds, read.
struct LowerRead;

impl RewritePattern for LowerRead {
    fn name(&self) -> &'static str {
        "lower-mem-read"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("mem_effect.read") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let state = rewriter.op_operand(op, 0);
        let pointer = rewriter.op_operand(op, 1);
        if rewriter.value_type(state).as_pair().is_none()
            || rewriter.value_type(pointer).as_pair().is_none()
        {
            return Ok(RewriteOutcome::NotMatched);
        }
        let (block_id, offset) = unwrap_pointer(rewriter, pointer).expect("checked above");
        let (memory, ub) = unwrap_state(rewriter, state).expect("checked above");

        let get_block = mem::get_block(rewriter.context(), memory, block_id);
        rewriter.insert_op_before_matched(get_block);
        let block = rewriter.op_result(get_block, 0);
        let get_bytes = mem::get_block_bytes(rewriter.context(), block);
        rewriter.insert_op_before_matched(get_bytes);
        let bytes = rewriter.op_result(get_bytes, 0);

        let out_of_bounds = check_bounds(rewriter, offset, block);
        let or_op = smt::or(rewriter.context(), ub, out_of_bounds);
        rewriter.insert_op_before_matched(or_op);
        let ub = rewriter.op_result(or_op, 0);

        let read_ty = rewriter.value_type(rewriter.op_result(op, 1)).clone();
        let read = mem::read_bytes(rewriter.context(), bytes, offset, read_ty);
        rewriter.insert_op_before_matched(read);
        let value = rewriter.op_result(read, 0);

        let new_state = wrap_state(rewriter, memory, ub);
        rewriter.replace_matched_op(&[], Some(&[new_state, value]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// `mem_effect.write`: check bounds, write the bytes back through the block
/// and memory.
struct LowerWrite;

impl RewritePattern for LowerWrite {
    fn name(&self) -> &'static str {
        "lower-mem-write"
    }

    fn match_and_rewrite(
        &self,
        op: Operation,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Result<RewriteOutcome, Report> {
        if !rewriter.op_name(op).is("mem_effect.write") {
            return Ok(RewriteOutcome::NotMatched);
        }
        let state = rewriter.op_operand(op, 0);
        let pointer = rewriter.op_operand(op, 1);
        let value = rewriter.op_operand(op, 2);
        if rewriter.value_type(state).as_pair().is_none()
            || rewriter.value_type(pointer).as_pair().is_none()
        {
            return Ok(RewriteOutcome::NotMatched);
        }
        let (block_id, offset) = unwrap_pointer(rewriter, pointer).expect("checked above");
        let (memory, ub) = unwrap_state(rewriter, state).expect("checked above");

        let get_block = mem::get_block(rewriter.context(), memory, block_id);
        rewriter.insert_op_before_matched(get_block);
        let block = rewriter.op_result(get_block, 0);
        let get_bytes = mem::get_block_bytes(rewriter.context(), block);
        rewriter.insert_op_before_matched(get_bytes);
        let bytes = rewriter.op_result(get_bytes, 0);

        let out_of_bounds = check_bounds(rewriter, offset, block);
        let or_op = smt::or(rewriter.context(), ub, out_of_bounds);
        rewriter.insert_op_before_matched(or_op);
        let ub = rewriter.op_result(or_op, 0);

        let write = mem::write_bytes(rewriter.context(), value, bytes, offset);
        rewriter.insert_op_before_matched(write);
        let bytes = rewriter.op_result(write, 0);

        let set_bytes = mem::set_block_bytes(rewriter.context(), block, bytes);
        rewriter.insert_op_before_matched(set_bytes);
        let block = rewriter.op_result(set_bytes, 0);
        let set_block = mem::set_block(rewriter.context(), block, memory, block_id);
        rewriter.insert_op_before_matched(set_block);
        let memory = rewriter.op_result(set_block, 0);

        let new_state = wrap_state(rewriter, memory, ub);
        rewriter.replace_matched_op(&[], Some(&[new_state]))?;
        Ok(RewriteOutcome::Rewrote)
    }
}

/// The `lower-effects-with-memory` pass.
pub struct LowerEffectsWithMemory;

impl Pass for LowerEffectsWithMemory {
    fn name(&self) -> &'static str {
        "lower-effects-with-memory"
    }

    fn apply(&self, ctx: &mut Context, module: Operation) -> Result<(), Report> {
        let mut patterns = RewritePatternSet::new();
        patterns.add(LowerTrigger);
        patterns.add(LowerToBool);
        patterns.add(LowerGeneric);
        patterns.add(LowerAlloc);
        patterns.add(LowerPointerOffset);
        patterns.add(LowerRead);
        patterns.add(LowerWrite);
        apply_patterns_greedily(ctx, module, &patterns, &GreedyRewriteConfig::default())?;
        Ok(())
    }
}
