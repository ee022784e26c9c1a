//! The solver-side dialects: `smt` (core booleans, functions, script ops),
//! `smt.bv` (bit-vectors), `smt.utils` (pairs), and `smt.synth` (symbolic
//! constants).
//!
//! Every op here either carries a `SimpleSMTLibOp` mnemonic or a custom
//! printing hook; together with the printer driver in `veriop-ir` they make
//! a lowered module printable as a complete SMT-LIB script.

mod bitvector;
mod core;
mod utils;

pub use self::{bitvector::*, core::*, utils::*};

use veriop_ir::{DialectInfo, DialectRegistration};

/// The `smt` core dialect.
pub struct SmtDialect;

impl DialectRegistration for SmtDialect {
    const NAMESPACE: &'static str = "smt";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&CONSTANT_BOOL);
        info.register_operation(&NOT);
        info.register_operation(&AND);
        info.register_operation(&OR);
        info.register_operation(&XOR);
        info.register_operation(&IMPLIES);
        info.register_operation(&EQ);
        info.register_operation(&DISTINCT);
        info.register_operation(&ITE);
        info.register_operation(&DECLARE_CONST);
        info.register_operation(&DEFINE_FUN);
        info.register_operation(&RETURN);
        info.register_operation(&CALL);
        info.register_operation(&ASSERT);
        info.register_operation(&CHECK_SAT);
    }
}

/// The `smt.bv` bit-vector dialect.
pub struct SmtBitVectorDialect;

impl DialectRegistration for SmtBitVectorDialect {
    const NAMESPACE: &'static str = "smt.bv";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&BV_CONSTANT);
        // Arithmetic
        info.register_operation(&BV_NEG);
        info.register_operation(&BV_ADD);
        info.register_operation(&BV_SUB);
        info.register_operation(&BV_MUL);
        info.register_operation(&BV_UDIV);
        info.register_operation(&BV_SDIV);
        info.register_operation(&BV_UREM);
        info.register_operation(&BV_SREM);
        info.register_operation(&BV_SMOD);
        info.register_operation(&BV_SHL);
        info.register_operation(&BV_LSHR);
        info.register_operation(&BV_ASHR);
        // Bitwise
        info.register_operation(&BV_NOT);
        info.register_operation(&BV_AND);
        info.register_operation(&BV_OR);
        info.register_operation(&BV_XOR);
        info.register_operation(&BV_NAND);
        info.register_operation(&BV_NOR);
        info.register_operation(&BV_XNOR);
        // Predicates
        info.register_operation(&BV_ULE);
        info.register_operation(&BV_ULT);
        info.register_operation(&BV_UGE);
        info.register_operation(&BV_UGT);
        info.register_operation(&BV_SLE);
        info.register_operation(&BV_SLT);
        info.register_operation(&BV_SGE);
        info.register_operation(&BV_SGT);
        // Structural
        info.register_operation(&BV_CONCAT);
        info.register_operation(&BV_EXTRACT);
    }
}

/// The `smt.utils` pair dialect.
pub struct SmtUtilsDialect;

impl DialectRegistration for SmtUtilsDialect {
    const NAMESPACE: &'static str = "smt.utils";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&PAIR);
        info.register_operation(&FIRST);
        info.register_operation(&SECOND);
    }
}

/// The `smt.synth` dialect: unconstrained symbolic constants.
pub struct SmtSynthDialect;

impl DialectRegistration for SmtSynthDialect {
    const NAMESPACE: &'static str = "smt.synth";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&SYNTH_CONSTANT);
    }
}

/// `smt.synth.constant`: produces an unconstrained symbolic value of its
/// result type; printed as a `declare-const`.
pub static SYNTH_CONSTANT: veriop_ir::OpInfo = veriop_ir::OpInfo {
    dialect: "smt.synth",
    name: "constant",
    operands: &[],
    results: &[veriop_ir::ResultDef {
        name: "res",
        constraint: veriop_ir::TypeConstraint::Any,
    }],
    attrs: &[],
    traits: veriop_ir::TraitSet::empty(),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};
