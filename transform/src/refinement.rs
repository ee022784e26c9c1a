//! The translation-validation harness: combine two lowered modules into a
//! single query asserting that their functions agree.

use veriop_dialect_smt as smt;
use veriop_ir::{builtin, diagnostics::Unsupported, Context, Operation, Report};

/// Emit the ops checking that `func_after` refines `func`: call both
/// functions and assert their results equal. Ends with the assert; the
/// caller appends `check_sat`.
fn function_refinement(
    ctx: &mut Context,
    func: Operation,
    func_after: Operation,
) -> Result<Vec<Operation>, Report> {
    for f in [func, func_after] {
        let body = ctx
            .entry_block(f)
            .ok_or_else(|| Unsupported::new("function without a body"))?;
        if !ctx.block_args(body).is_empty() {
            return Err(Unsupported::new("functions with arguments"));
        }
    }

    let mut ops = Vec::new();

    let callee = ctx.op_result(func, 0);
    let callee_after = ctx.op_result(func_after, 0);
    let call = smt::call(ctx, callee, &[]);
    let call_after = smt::call(ctx, callee_after, &[]);
    ops.push(call);
    ops.push(call_after);

    let ret = ctx.op_result(call, 0);
    let ret_after = ctx.op_result(call_after, 0);
    let equal = smt::eq(ctx, ret, ret_after);
    let equal_value = ctx.op_result(equal, 0);
    ops.push(equal);
    ops.push(smt::assert_op(ctx, equal_value));

    Ok(ops)
}

/// Build the combined translation-validation module from two lowered
/// modules, each containing a single `smt.define_fun`.
pub fn build_tv_module(
    ctx: &mut Context,
    module_before: Operation,
    module_after: Operation,
) -> Result<Operation, Report> {
    let func = single_define_fun(ctx, module_before)?;
    let func_after = single_define_fun(ctx, module_after)?;

    let combined = builtin::create_module(ctx);
    let body = builtin::module_body(ctx, combined);
    ctx.detach_op(func);
    ctx.append_op(body, func);
    ctx.detach_op(func_after);
    ctx.append_op(body, func_after);

    for op in function_refinement(ctx, func, func_after)? {
        ctx.append_op(body, op);
    }
    let check = smt::check_sat(ctx);
    ctx.append_op(body, check);
    ctx.verify(combined)?;
    Ok(combined)
}

fn single_define_fun(ctx: &Context, module: Operation) -> Result<Operation, Report> {
    let body = builtin::module_body(ctx, module);
    match ctx.block_ops(body) {
        [op] if ctx.op_name(*op).is("smt.define_fun") => Ok(*op),
        _ => Err(Unsupported::new(
            "input is expected to lower to a single 'smt.define_fun'",
        )),
    }
}
