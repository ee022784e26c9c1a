//! End-to-end checks of the source-to-SMT lowering pipelines.

use pretty_assertions::assert_eq;
use veriop_dialect_arith as arith;
use veriop_dialect_comb as comb;
use veriop_dialect_func as func;
use veriop_dialect_mem as mem;
use veriop_dialect_smt as smt;
use veriop_ir::{builtin, smtlib::print_to_smtlib, Context, Operation, Type};
use veriop_session::Pipeline;
use veriop_transform::{register_all_dialects, LowerEffectsWithMemory, LowerToSmt, Pass};

fn context() -> Context {
    let mut ctx = Context::new();
    register_all_dialects(&mut ctx);
    ctx
}

/// `func @f() -> i8 { return 3 }` under the plain lowerer becomes a 0-ary
/// function returning the literal.
#[test]
fn constant_function_lowers_to_define_fun() {
    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let f = func::func(&mut ctx, "f", vec![], Type::Int(8));
    ctx.append_op(body, f);
    let f_body = ctx.entry_block(f).unwrap();
    let c = arith::constant(&mut ctx, 3, 8);
    ctx.append_op(f_body, c);
    let returned = ctx.op_result(c, 0);
    let ret = func::ret(&mut ctx, &[returned]);
    ctx.append_op(f_body, ret);
    ctx.verify(module).unwrap();

    LowerToSmt::new(Pipeline::CombOnly)
        .apply(&mut ctx, module)
        .unwrap();

    let script = print_to_smtlib(&ctx, module).unwrap();
    assert_eq!(
        script,
        "(define-fun f () (_ BitVec 8) (let ((tmp_0 (_ bv3 8))) tmp_0))\n"
    );
}

/// The same function under the poison lowerer returns a (value, poison)
/// pair with the poison bit hardwired false.
#[test]
fn constant_function_lowers_with_poison_pairs() {
    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let f = func::func(&mut ctx, "f", vec![], Type::Int(8));
    ctx.append_op(body, f);
    let f_body = ctx.entry_block(f).unwrap();
    let c = arith::constant(&mut ctx, 3, 8);
    ctx.append_op(f_body, c);
    let returned = ctx.op_result(c, 0);
    let ret = func::ret(&mut ctx, &[returned]);
    ctx.append_op(f_body, ret);

    LowerToSmt::new(Pipeline::Full)
        .apply(&mut ctx, module)
        .unwrap();

    let script = print_to_smtlib(&ctx, module).unwrap();
    assert!(script.starts_with(
        "(declare-datatypes ((Pair 2)) ((par (X Y) ((pair (first X) (second Y))))))\n"
    ));
    assert!(script.contains("(define-fun f () (Pair (_ BitVec 8) Bool)"));
    assert!(script.contains("(_ bv3 8)"));
    assert!(script.contains("false"));
    assert!(script.contains("(pair "));
}

/// A ternary `comb.add` left-folds: `bvadd(bvadd(x, y), x)`.
#[test]
fn variadic_add_folds_left() {
    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let f = func::func(&mut ctx, "f", vec![Type::Int(8), Type::Int(8)], Type::Int(8));
    ctx.append_op(body, f);
    let f_body = ctx.entry_block(f).unwrap();
    let x = ctx.block_args(f_body)[0];
    let y = ctx.block_args(f_body)[1];
    ctx.set_name_hint(x, "x");
    ctx.set_name_hint(y, "y");

    let sum = comb::variadic(&mut ctx, &comb::ADD, &[x, y, x], Type::Int(8));
    ctx.append_op(f_body, sum);
    let returned = ctx.op_result(sum, 0);
    let ret = func::ret(&mut ctx, &[returned]);
    ctx.append_op(f_body, ret);
    ctx.verify(module).unwrap();

    LowerToSmt::new(Pipeline::CombOnly)
        .apply(&mut ctx, module)
        .unwrap();

    let script = print_to_smtlib(&ctx, module).unwrap();
    assert_eq!(
        script,
        "(define-fun f ((x (_ BitVec 8)) (y (_ BitVec 8))) (_ BitVec 8) \
         (let ((tmp_0 (bvadd x y))) (let ((tmp_1 (bvadd tmp_0 x))) tmp_1)))\n"
    );
}

/// Zero-arity variadic ops produce the family identity at the result
/// width.
#[test]
fn empty_variadic_produces_identity_constant() {
    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let f = func::func(&mut ctx, "f", vec![], Type::Int(8));
    ctx.append_op(body, f);
    let f_body = ctx.entry_block(f).unwrap();
    let sum = comb::variadic(&mut ctx, &comb::ADD, &[], Type::Int(8));
    ctx.append_op(f_body, sum);
    let returned = ctx.op_result(sum, 0);
    let ret = func::ret(&mut ctx, &[returned]);
    ctx.append_op(f_body, ret);

    LowerToSmt::new(Pipeline::CombOnly)
        .apply(&mut ctx, module)
        .unwrap();

    let script = print_to_smtlib(&ctx, module).unwrap();
    assert!(script.contains("(_ bv0 8)"));
}

/// `comb.icmp` lowering is a known gap.
#[test]
fn icmp_lowering_is_not_implemented() {
    use veriop_ir::{Attribute, AttributeMap, CmpPredicate, OperationName};

    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let f = func::func(&mut ctx, "f", vec![Type::Int(8), Type::Int(8)], Type::Int(1));
    ctx.append_op(body, f);
    let f_body = ctx.entry_block(f).unwrap();
    let x = ctx.block_args(f_body)[0];
    let y = ctx.block_args(f_body)[1];
    let cmp = ctx.create_op(
        OperationName::new(&comb::ICMP),
        &[x, y],
        [Type::Int(1)],
        AttributeMap::new().with("predicate", Attribute::Predicate(CmpPredicate::Ult)),
    );
    ctx.append_op(f_body, cmp);
    let returned = ctx.op_result(cmp, 0);
    let ret = func::ret(&mut ctx, &[returned]);
    ctx.append_op(f_body, ret);

    let error = LowerToSmt::new(Pipeline::CombOnly)
        .apply(&mut ctx, module)
        .unwrap_err();
    assert!(error
        .downcast_ref::<veriop_session::diagnostics::NotImplemented>()
        .is_some());
}

/// `arith.cmpi` lowers to a bit-vector predicate re-materialized as a
/// width-1 bit-vector through `ite`.
#[test]
fn cmpi_lowers_to_ite_comparison() {
    use veriop_ir::CmpPredicate;

    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let f = func::func(&mut ctx, "f", vec![Type::Int(8), Type::Int(8)], Type::Int(1));
    ctx.append_op(body, f);
    let f_body = ctx.entry_block(f).unwrap();
    let x = ctx.block_args(f_body)[0];
    let y = ctx.block_args(f_body)[1];
    ctx.set_name_hint(x, "x");
    ctx.set_name_hint(y, "y");
    let cmp = arith::cmpi(&mut ctx, CmpPredicate::Ult, x, y);
    ctx.append_op(f_body, cmp);
    let returned = ctx.op_result(cmp, 0);
    let ret = func::ret(&mut ctx, &[returned]);
    ctx.append_op(f_body, ret);
    ctx.verify(module).unwrap();

    LowerToSmt::new(Pipeline::CombOnly)
        .apply(&mut ctx, module)
        .unwrap();

    let script = print_to_smtlib(&ctx, module).unwrap();
    assert_eq!(
        script,
        "(define-fun f ((x (_ BitVec 8)) (y (_ BitVec 8))) (_ BitVec 1) \
         (let ((tmp_0 (bvult x y))) (let ((tmp_1 (_ bv1 1))) (let ((tmp_2 (_ bv0 1))) \
         (let ((tmp_3 (ite tmp_0 tmp_1 tmp_2))) tmp_3)))))\n"
    );
}

/// The same comparison under the poison lowerer also propagates the
/// operand poison bits into the result pair.
#[test]
fn cmpi_lowers_with_poison_pairs() {
    use veriop_ir::CmpPredicate;

    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let f = func::func(&mut ctx, "f", vec![Type::Int(8), Type::Int(8)], Type::Int(1));
    ctx.append_op(body, f);
    let f_body = ctx.entry_block(f).unwrap();
    let x = ctx.block_args(f_body)[0];
    let y = ctx.block_args(f_body)[1];
    let cmp = arith::cmpi(&mut ctx, CmpPredicate::Sge, x, y);
    ctx.append_op(f_body, cmp);
    let returned = ctx.op_result(cmp, 0);
    let ret = func::ret(&mut ctx, &[returned]);
    ctx.append_op(f_body, ret);

    LowerToSmt::new(Pipeline::Full)
        .apply(&mut ctx, module)
        .unwrap();

    let script = print_to_smtlib(&ctx, module).unwrap();
    assert!(script.contains("(define-fun f ((") && script.contains("(Pair (_ BitVec 1) Bool)"));
    assert!(script.contains("bvsge"), "missing predicate:\n{script}");
    assert!(script.contains("(ite "), "missing re-materialization:\n{script}");
    assert!(script.contains("(or "), "missing poison propagation:\n{script}");
    assert!(script.contains("(pair "), "missing result pair:\n{script}");
}

/// The `arith.cmpi` definition pins the result type to `i1`.
#[test]
fn cmpi_requires_an_i1_result() {
    use veriop_ir::{Attribute, AttributeMap, CmpPredicate, OperationName};

    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let a = arith::constant(&mut ctx, 1, 8);
    ctx.append_op(body, a);
    let b = arith::constant(&mut ctx, 2, 8);
    ctx.append_op(body, b);
    let (lhs, rhs) = (ctx.op_result(a, 0), ctx.op_result(b, 0));
    let cmp = ctx.create_op(
        OperationName::new(&arith::CMPI),
        &[lhs, rhs],
        [Type::Int(8)],
        AttributeMap::new().with("predicate", Attribute::Predicate(CmpPredicate::Eq)),
    );
    ctx.append_op(body, cmp);

    let error = ctx.verify(module).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<veriop_session::diagnostics::VerificationError>(),
        Some(veriop_session::diagnostics::VerificationError::TypeMismatch { .. })
    ));
}

/// `func.call` resolves its callee symbol to the lowered `smt.define_fun`
/// and becomes an `smt.call`.
#[test]
fn call_lowers_to_smt_call() {
    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let f = func::func(&mut ctx, "f", vec![], Type::Int(8));
    ctx.append_op(body, f);
    let f_body = ctx.entry_block(f).unwrap();
    let c = arith::constant(&mut ctx, 3, 8);
    ctx.append_op(f_body, c);
    let constant = ctx.op_result(c, 0);
    let f_ret = func::ret(&mut ctx, &[constant]);
    ctx.append_op(f_body, f_ret);

    let g = func::func(&mut ctx, "g", vec![], Type::Int(8));
    ctx.append_op(body, g);
    let g_body = ctx.entry_block(g).unwrap();
    let call = func::call(&mut ctx, "f", &[], Type::Int(8));
    ctx.append_op(g_body, call);
    let called = ctx.op_result(call, 0);
    let g_ret = func::ret(&mut ctx, &[called]);
    ctx.append_op(g_body, g_ret);
    ctx.verify(module).unwrap();

    LowerToSmt::new(Pipeline::CombOnly)
        .apply(&mut ctx, module)
        .unwrap();

    let script = print_to_smtlib(&ctx, module).unwrap();
    assert_eq!(
        script,
        "(define-fun f () (_ BitVec 8) (let ((tmp_0 (_ bv3 8))) tmp_0))\n\
         (define-fun g () (_ BitVec 8) (let ((tmp_1 f)) tmp_1))\n"
    );
}

/// Division by zero marks the result poison under the poison lowerer.
#[test]
fn division_poisons_on_zero_divisor() {
    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let f = func::func(&mut ctx, "f", vec![Type::Int(8), Type::Int(8)], Type::Int(8));
    ctx.append_op(body, f);
    let f_body = ctx.entry_block(f).unwrap();
    let x = ctx.block_args(f_body)[0];
    let y = ctx.block_args(f_body)[1];
    let div = arith::binary(&mut ctx, &arith::DIVUI, x, y);
    ctx.append_op(f_body, div);
    let returned = ctx.op_result(div, 0);
    let ret = func::ret(&mut ctx, &[returned]);
    ctx.append_op(f_body, ret);

    LowerToSmt::new(Pipeline::Full)
        .apply(&mut ctx, module)
        .unwrap();

    let script = print_to_smtlib(&ctx, module).unwrap();
    assert!(script.contains("bvudiv"));
    // Poison = or(or(p_lhs, p_rhs), divisor == 0).
    assert!(script.contains("(or "));
    assert!(script.contains("(= "));
    assert!(script.contains("(_ bv0 8)"));
}

/// After `lower-effects-with-memory` the state is an explicit
/// `Pair(Memory, Bool)` and the UB flag absorbs the bounds check.
#[test]
fn effect_lowering_desugars_alloc_and_read() {
    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let state = smt::declare_const(&mut ctx, Type::State);
    ctx.append_op(body, state);
    let size = smt::bv_constant(&mut ctx, 4, 64).unwrap();
    ctx.append_op(body, size);
    let (state_value, size_value) = (ctx.op_result(state, 0), ctx.op_result(size, 0));
    let alloc = mem::alloc(&mut ctx, state_value, size_value);
    ctx.append_op(body, alloc);
    let (new_state, pointer) = (ctx.op_result(alloc, 0), ctx.op_result(alloc, 1));
    let read = mem::read(&mut ctx, new_state, pointer, Type::BitVec(8));
    ctx.append_op(body, read);

    LowerEffectsWithMemory.apply(&mut ctx, module).unwrap();

    // No mem_effect ops survive.
    let mut leftover = Vec::new();
    ctx.walk_preorder(module, &mut |op| {
        if ctx.op_name(op).dialect() == "mem_effect" {
            leftover.push(op);
        }
    });
    assert!(leftover.is_empty(), "mem_effect ops survived the lowering");

    // The declared state is now a (Memory, Bool) pair.
    assert_eq!(
        ctx.value_type(ctx.op_result(state, 0)),
        &Type::pair(Type::Memory, Type::Bool)
    );

    // The UB flag is ORed with the bounds check of the read.
    let mut checks = (false, false, false);
    ctx.walk_preorder(module, &mut |op| {
        let name = ctx.op_name(op);
        checks.0 |= name.is("smt.or");
        checks.1 |= name.is("smt.bv.uge");
        checks.2 |= name.is("mem.read_bytes");
    });
    let (has_or, has_bounds, has_read) = checks;
    assert!(has_or, "UB flag is not ORed");
    assert!(has_bounds, "bounds check missing");
    assert!(has_read, "byte read missing");
}

/// Helper assertion: the lowered module must satisfy the structural
/// invariants after every pipeline.
fn assert_verified(ctx: &Context, module: Operation) {
    ctx.verify(module).unwrap();
}

/// `smt.synth.constant` prints as a `declare-const`, and asserts let-bind
/// their dependencies at the top level.
#[test]
fn synth_constants_print_as_declarations() {
    use veriop_ir::{AttributeMap, OpBuilder, OperationName};

    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let mut builder = OpBuilder::at_end(&mut ctx, body);
    let synth = builder.build(
        OperationName::new(&smt::SYNTH_CONSTANT),
        &[],
        [Type::BitVec(8)],
        AttributeMap::new(),
    );
    let x = builder.context().op_result(synth, 0);
    builder.context().set_name_hint(x, "x");

    let c = smt::bv_constant(builder.context(), 7, 8).unwrap();
    ctx.append_op(body, c);
    let literal = ctx.op_result(c, 0);
    let equal = smt::eq(&mut ctx, x, literal);
    ctx.append_op(body, equal);
    let cond = ctx.op_result(equal, 0);
    let assert = smt::assert_op(&mut ctx, cond);
    ctx.append_op(body, assert);
    let check = smt::check_sat(&mut ctx);
    ctx.append_op(body, check);
    ctx.verify(module).unwrap();

    let script = print_to_smtlib(&ctx, module).unwrap();
    assert_eq!(
        script,
        "(declare-const x (_ BitVec 8))\n\
         (assert (let ((tmp_0 (_ bv7 8))) (let ((tmp_1 (= x tmp_0))) tmp_1)))\n\
         (check-sat)\n"
    );
}

/// Lowering twice must be a no-op the second time.
#[test]
fn lowering_is_idempotent_at_fixpoint() {
    let mut ctx = context();
    let module = builtin::create_module(&mut ctx);
    let body = builtin::module_body(&ctx, module);

    let f = func::func(&mut ctx, "f", vec![Type::Int(8)], Type::Int(8));
    ctx.append_op(body, f);
    let f_body = ctx.entry_block(f).unwrap();
    let x = ctx.block_args(f_body)[0];
    let doubled = comb::variadic(&mut ctx, &comb::ADD, &[x, x], Type::Int(8));
    ctx.append_op(f_body, doubled);
    let returned = ctx.op_result(doubled, 0);
    let ret = func::ret(&mut ctx, &[returned]);
    ctx.append_op(f_body, ret);

    let pass = LowerToSmt::new(Pipeline::CombOnly);
    pass.apply(&mut ctx, module).unwrap();
    let first = ctx.print_ir(module);
    pass.apply(&mut ctx, module).unwrap();
    assert_eq!(ctx.print_ir(module), first);
    assert_verified(&ctx, module);
}
