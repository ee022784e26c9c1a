//! The `arith` dialect: source-level integer arithmetic over `iN` types.
//!
//! These are the pre-lowering ops: every one of them is rewritten away by
//! the SMT lowering pipeline. The op set follows the usual signless-integer
//! conventions: explicit signed/unsigned division and shifts, a single
//! compare op carrying its predicate as an attribute, and a ternary select.

mod ops;

pub use ops::*;

use veriop_ir::{DialectInfo, DialectRegistration};

pub struct ArithDialect;

impl DialectRegistration for ArithDialect {
    const NAMESPACE: &'static str = "arith";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&CONSTANT);
        info.register_operation(&ADDI);
        info.register_operation(&SUBI);
        info.register_operation(&MULI);
        info.register_operation(&DIVSI);
        info.register_operation(&DIVUI);
        info.register_operation(&REMSI);
        info.register_operation(&REMUI);
        info.register_operation(&ANDI);
        info.register_operation(&ORI);
        info.register_operation(&XORI);
        info.register_operation(&SHLI);
        info.register_operation(&SHRSI);
        info.register_operation(&SHRUI);
        info.register_operation(&CMPI);
        info.register_operation(&SELECT);
    }
}
