//! End-to-end checks of the PDL-to-SMT encoding.

use veriop_dialect_pdl as pdl;
use veriop_ir::{builtin, smtlib::print_to_smtlib, Attribute, Context, IntAttr, Operation, Type};
use veriop_transform::{register_all_dialects, Pass, PdlToSmt};

fn context() -> Context {
    let mut ctx = Context::new();
    register_all_dialects(&mut ctx);
    ctx
}

/// Build a pattern matching `<op_name>(x, constant)` rewritten to `x`, the
/// shape of the `mul(x, 1) -> x` and `and(x, 0) -> x` soundness queries.
fn build_identity_pattern(ctx: &mut Context, op_name: &str, constant: u128) -> Operation {
    let module = builtin::create_module(ctx);
    let body = builtin::module_body(ctx, module);

    let pattern = pdl::pattern(ctx);
    ctx.append_op(body, pattern);
    let pattern_body = ctx.entry_block(pattern).unwrap();

    let ty = pdl::ty(ctx, Some(Type::Int(8)));
    ctx.append_op(pattern_body, ty);
    let ty_value = ctx.op_result(ty, 0);

    let x = pdl::operand(ctx, ty_value);
    ctx.append_op(pattern_body, x);
    let x_value = ctx.op_result(x, 0);

    let const_attr = pdl::attribute(ctx, Some(Attribute::Int(IntAttr::new(constant, 8))));
    ctx.append_op(pattern_body, const_attr);
    let const_attr_value = ctx.op_result(const_attr, 0);
    let const_op = pdl::operation(
        ctx,
        "arith.constant",
        &[],
        &[("value", const_attr_value)],
        &[ty_value],
    );
    ctx.append_op(pattern_body, const_op);
    let const_handle = ctx.op_result(const_op, 0);
    let const_result = pdl::result(ctx, const_handle, 0);
    ctx.append_op(pattern_body, const_result);

    let const_value = ctx.op_result(const_result, 0);
    let matched = pdl::operation(ctx, op_name, &[x_value, const_value], &[], &[ty_value]);
    ctx.append_op(pattern_body, matched);
    let matched_value = ctx.op_result(matched, 0);

    let rewrite = pdl::rewrite(ctx, matched_value);
    ctx.append_op(pattern_body, rewrite);
    let rewrite_body = ctx.entry_block(rewrite).unwrap();
    let replace = pdl::replace_with_values(ctx, matched_value, &[x_value]);
    ctx.append_op(rewrite_body, replace);

    module
}

/// `comb.mul(x, 1) -> x`: the emitted query asserts the negation of the
/// refinement and closes with `check-sat`.
#[test]
fn multiply_by_one_pattern_encodes_refinement_query() {
    let mut ctx = context();
    let module = build_identity_pattern(&mut ctx, "comb.mul", 1);

    PdlToSmt.apply(&mut ctx, module).unwrap();
    let script = print_to_smtlib(&ctx, module).unwrap();

    assert!(script.contains("(declare-const "), "missing symbolic input:\n{script}");
    assert!(script.contains("bvmul"), "missing lowered multiply:\n{script}");
    assert!(script.contains("(distinct "), "missing negated refinement:\n{script}");
    assert!(script.contains("(_ bv1 8)"), "missing constant operand:\n{script}");
    assert!(script.ends_with("(check-sat)\n"), "missing check-sat:\n{script}");
    // With no preconditions, the assertion is exactly the let-bound
    // distinct: the symbolic input was declared first (tmp_0), then the
    // literal, the product, and the disequality.
    assert!(
        script.contains(
            "(assert (let ((tmp_1 (_ bv1 8))) (let ((tmp_2 (bvmul tmp_0 tmp_1))) \
             (let ((tmp_3 (distinct tmp_0 tmp_2))) tmp_3))))"
        ),
        "unexpected assert shape:\n{script}"
    );
}

/// `comb.and(x, 0) -> x` produces the same query shape; its satisfiability
/// (the rewrite is unsound) is the solver's business, not the encoder's.
#[test]
fn and_with_zero_pattern_encodes_refinement_query() {
    let mut ctx = context();
    let module = build_identity_pattern(&mut ctx, "comb.and", 0);

    PdlToSmt.apply(&mut ctx, module).unwrap();
    let script = print_to_smtlib(&ctx, module).unwrap();

    assert!(script.contains("bvand"), "missing lowered and:\n{script}");
    assert!(script.contains("(distinct "), "missing negated refinement:\n{script}");
    assert!(script.ends_with("(check-sat)\n"));
}

/// A `pdl.df.get` contributes its soundness condition as a precondition of
/// the replacement assertion.
#[test]
fn dataflow_get_preconditions_guard_the_query() {
    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let pattern = pdl::pattern(&mut ctx);
    ctx.append_op(body, pattern);
    let pattern_body = ctx.entry_block(pattern).unwrap();

    let ty = pdl::ty(&mut ctx, Some(Type::Int(8)));
    ctx.append_op(pattern_body, ty);
    let ty_value = ctx.op_result(ty, 0);
    let x = pdl::operand(&mut ctx, ty_value);
    ctx.append_op(pattern_body, x);
    let x_value = ctx.op_result(x, 0);

    let get = pdl::df_get(&mut ctx, x_value);
    ctx.append_op(pattern_body, get);

    let const_attr = pdl::attribute(&mut ctx, Some(Attribute::Int(IntAttr::new(1, 8))));
    ctx.append_op(pattern_body, const_attr);
    let const_attr_value = ctx.op_result(const_attr, 0);
    let const_op = pdl::operation(
        &mut ctx,
        "arith.constant",
        &[],
        &[("value", const_attr_value)],
        &[ty_value],
    );
    ctx.append_op(pattern_body, const_op);
    let const_handle = ctx.op_result(const_op, 0);
    let const_result = pdl::result(&mut ctx, const_handle, 0);
    ctx.append_op(pattern_body, const_result);

    let const_value = ctx.op_result(const_result, 0);
    let matched = pdl::operation(&mut ctx, "comb.mul", &[x_value, const_value], &[], &[ty_value]);
    ctx.append_op(pattern_body, matched);
    let matched_value = ctx.op_result(matched, 0);

    let rewrite = pdl::rewrite(&mut ctx, matched_value);
    ctx.append_op(pattern_body, rewrite);
    let rewrite_body = ctx.entry_block(rewrite).unwrap();
    let replace = pdl::replace_with_values(&mut ctx, matched_value, &[x_value]);
    ctx.append_op(rewrite_body, replace);

    PdlToSmt.apply(&mut ctx, module).unwrap();
    let script = print_to_smtlib(&ctx, module).unwrap();

    // The known-bits domain shows up as two extra symbolic constants named
    // after the value, and the assert conjoins the refinement negation with
    // the precondition.
    assert!(script.contains("value_zeros"), "missing zeros constant:\n{script}");
    assert!(script.contains("value_ones"), "missing ones constant:\n{script}");
    assert!(script.contains("(and "), "missing precondition conjunction:\n{script}");
    assert!(script.contains("(distinct "));
    assert!(script.ends_with("(check-sat)\n"));
}

/// `pdl.df.attach` asserts that the claimed domain can be wrong.
#[test]
fn dataflow_attach_asserts_the_negated_soundness() {
    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let pattern = pdl::pattern(&mut ctx);
    ctx.append_op(body, pattern);
    let pattern_body = ctx.entry_block(pattern).unwrap();

    let ty = pdl::ty(&mut ctx, Some(Type::Int(8)));
    ctx.append_op(pattern_body, ty);
    let ty_value = ctx.op_result(ty, 0);
    let x = pdl::operand(&mut ctx, ty_value);
    ctx.append_op(pattern_body, x);
    let x_value = ctx.op_result(x, 0);

    let get = pdl::df_get(&mut ctx, x_value);
    ctx.append_op(pattern_body, get);
    let zeros = ctx.op_result(get, 0);
    let ones = ctx.op_result(get, 1);

    let attach = pdl::df_attach(&mut ctx, x_value, &[zeros, ones]);
    ctx.append_op(pattern_body, attach);

    PdlToSmt.apply(&mut ctx, module).unwrap();
    let script = print_to_smtlib(&ctx, module).unwrap();

    assert!(script.contains("(not "), "missing negation:\n{script}");
    assert!(script.contains("(and "), "missing precondition conjunction:\n{script}");
    assert!(script.ends_with("(check-sat)\n"));
}

/// Patterns over unregistered operations are rejected.
#[test]
fn unknown_matched_op_is_reported() {
    let mut ctx = context();
    let module = build_identity_pattern(&mut ctx, "bogus.op", 1);

    let error = PdlToSmt.apply(&mut ctx, module).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<veriop_session::diagnostics::VerificationError>(),
        Some(veriop_session::diagnostics::VerificationError::UnknownOp { .. })
    ));
}
