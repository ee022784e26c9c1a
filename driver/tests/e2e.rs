//! End-to-end tests through the textual reader and the full pipelines.

use pretty_assertions::assert_eq;
use veriop::parser::parse_module;
use veriop::run::{lower_with_pipeline, run_lower, run_tv};
use veriop_ir::Context;
use veriop_session::{Options, Pipeline};
use veriop_transform::register_all_dialects;

const CONSTANT_FN: &str = r#"
builtin.module {
  func.func {function_type = () -> i8, sym_name = "f"} {
    %c = arith.constant {value = 3 : i8} : i8
    func.return %c
  }
}
"#;

const VARIADIC_FN: &str = r#"
builtin.module {
  func.func {function_type = (i8, i8) -> i8, sym_name = "f"} {
  ^(%x: i8, %y: i8):
    %z = comb.add %x, %y, %x : i8
    func.return %z
  }
}
"#;

#[test]
fn constant_function_end_to_end() {
    let script = lower_with_pipeline(CONSTANT_FN, Pipeline::CombOnly).unwrap();
    assert_eq!(
        script,
        "(define-fun f () (_ BitVec 8) (let ((c (_ bv3 8))) c))\n"
    );
}

#[test]
fn variadic_add_end_to_end() {
    let script = lower_with_pipeline(VARIADIC_FN, Pipeline::CombOnly).unwrap();
    // The fold keeps `%z`'s name on its final value.
    assert_eq!(
        script,
        "(define-fun f ((x (_ BitVec 8)) (y (_ BitVec 8))) (_ BitVec 8) \
         (let ((tmp_0 (bvadd x y))) (let ((z (bvadd tmp_0 x))) z)))\n"
    );
}

/// The generic textual form round-trips: print, reparse, print again.
#[test]
fn printed_ir_reparses_to_the_same_form() {
    let mut ctx = Context::new();
    register_all_dialects(&mut ctx);
    let module = parse_module(&mut ctx, VARIADIC_FN).unwrap();
    ctx.verify(module).unwrap();
    let printed = ctx.print_ir(module);

    let mut ctx2 = Context::new();
    register_all_dialects(&mut ctx2);
    let module2 = parse_module(&mut ctx2, &printed).unwrap();
    ctx2.verify(module2).unwrap();
    assert_eq!(ctx2.print_ir(module2), printed);
}

#[test]
fn unknown_op_is_rejected_at_parse_time() {
    let mut ctx = Context::new();
    register_all_dialects(&mut ctx);
    let error = parse_module(&mut ctx, "builtin.module { nope.op }").unwrap_err();
    assert!(matches!(
        error.downcast_ref::<veriop_session::diagnostics::VerificationError>(),
        Some(veriop_session::diagnostics::VerificationError::UnknownOp { .. })
    ));
}

/// `--verify-each` re-checks the structural invariants after every pass in
/// the pipeline, including the cleanup passes.
#[test]
fn verify_each_holds_across_the_whole_pipeline() {
    let options = Options {
        pipeline: Pipeline::CombOnly,
        optimize: true,
        verify_each: true,
    };
    let script = run_lower(VARIADIC_FN, &options).unwrap();
    assert!(script.contains("(define-fun f (("));
}

#[test]
fn translation_validation_rejects_functions_with_arguments() {
    let error = run_tv(VARIADIC_FN, VARIADIC_FN, false).unwrap_err();
    assert!(error
        .downcast_ref::<veriop_session::diagnostics::Unsupported>()
        .is_some());
    assert_eq!(
        veriop_session::ExitCode::from_report(&error),
        veriop_session::ExitCode::Unsupported
    );
}

#[test]
fn translation_validation_builds_a_refinement_query() {
    let before = CONSTANT_FN;
    let after = r#"
builtin.module {
  func.func {function_type = () -> i8, sym_name = "f"} {
    %a = arith.constant {value = 1 : i8} : i8
    %b = arith.constant {value = 2 : i8} : i8
    %c = arith.addi %a, %b : i8
    func.return %c
  }
}
"#;
    let script = run_tv(before, after, false).unwrap();
    assert!(script.contains("(define-fun f () (_ BitVec 8)"));
    assert!(script.contains("(define-fun f_0 () (_ BitVec 8)"));
    assert!(script.contains("(assert "));
    assert!(script.contains("(= "));
    assert!(script.ends_with("(check-sat)\n"));
}
