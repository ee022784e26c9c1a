//! The `smt.bv` dialect: fixed-width bit-vector arithmetic, bitwise logic,
//! predicates, and structural ops.

use veriop_ir::{
    diagnostics::VerificationError,
    smtlib::SmtConversionCtx,
    AttrDef, AttrKind, Attribute, AttributeMap, BitVectorAttr, Context, OpInfo, OperandDef,
    Operation, OperationName, Report, ResultDef, TraitSet, Type, TypeConstraint, Value,
};

macro_rules! bv_binary_op {
    ($ident:ident, $name:literal, $smt:literal) => {
        #[doc = concat!("`smt.bv.", $name, "`")]
        pub static $ident: OpInfo = OpInfo {
            dialect: "smt.bv",
            name: $name,
            operands: &[
                OperandDef {
                    name: "lhs",
                    constraint: TypeConstraint::AnyBitVec,
                },
                OperandDef {
                    name: "rhs",
                    constraint: TypeConstraint::AnyBitVec,
                },
            ],
            results: &[ResultDef {
                name: "res",
                constraint: TypeConstraint::AnyBitVec,
            }],
            attrs: &[],
            traits: TraitSet::PURE
                .union(TraitSet::SAME_OPERANDS_AND_RESULT_TYPE)
                .union(TraitSet::SIMPLE_SMTLIB_OP),
            smtlib_name: Some($smt),
            print_smtlib: None,
            verify: None,
        };
    };
}

macro_rules! bv_unary_op {
    ($ident:ident, $name:literal, $smt:literal) => {
        #[doc = concat!("`smt.bv.", $name, "`")]
        pub static $ident: OpInfo = OpInfo {
            dialect: "smt.bv",
            name: $name,
            operands: &[OperandDef {
                name: "arg",
                constraint: TypeConstraint::AnyBitVec,
            }],
            results: &[ResultDef {
                name: "res",
                constraint: TypeConstraint::AnyBitVec,
            }],
            attrs: &[],
            traits: TraitSet::PURE
                .union(TraitSet::SAME_OPERANDS_AND_RESULT_TYPE)
                .union(TraitSet::SIMPLE_SMTLIB_OP),
            smtlib_name: Some($smt),
            print_smtlib: None,
            verify: None,
        };
    };
}

macro_rules! bv_pred_op {
    ($ident:ident, $name:literal, $smt:literal) => {
        #[doc = concat!("`smt.bv.", $name, "`")]
        pub static $ident: OpInfo = OpInfo {
            dialect: "smt.bv",
            name: $name,
            operands: &[
                OperandDef {
                    name: "lhs",
                    constraint: TypeConstraint::AnyBitVec,
                },
                OperandDef {
                    name: "rhs",
                    constraint: TypeConstraint::AnyBitVec,
                },
            ],
            results: &[ResultDef {
                name: "res",
                constraint: TypeConstraint::Bool,
            }],
            attrs: &[],
            traits: TraitSet::PURE
                .union(TraitSet::SAME_TYPE_OPERANDS)
                .union(TraitSet::SIMPLE_SMTLIB_OP),
            smtlib_name: Some($smt),
            print_smtlib: None,
            verify: None,
        };
    };
}

// Arithmetic
bv_unary_op!(BV_NEG, "neg", "bvneg");
bv_binary_op!(BV_ADD, "add", "bvadd");
bv_binary_op!(BV_SUB, "sub", "bvsub");
bv_binary_op!(BV_MUL, "mul", "bvmul");
bv_binary_op!(BV_UDIV, "udiv", "bvudiv");
bv_binary_op!(BV_SDIV, "sdiv", "bvsdiv");
bv_binary_op!(BV_UREM, "urem", "bvurem");
bv_binary_op!(BV_SREM, "srem", "bvsrem");
bv_binary_op!(BV_SMOD, "smod", "bvsmod");
bv_binary_op!(BV_SHL, "shl", "bvshl");
bv_binary_op!(BV_LSHR, "lshr", "bvlshr");
bv_binary_op!(BV_ASHR, "ashr", "bvashr");

// Bitwise
bv_unary_op!(BV_NOT, "not", "bvnot");
bv_binary_op!(BV_AND, "and", "bvand");
bv_binary_op!(BV_OR, "or", "bvor");
bv_binary_op!(BV_XOR, "xor", "bvxor");
bv_binary_op!(BV_NAND, "nand", "bvnand");
bv_binary_op!(BV_NOR, "nor", "bvnor");
bv_binary_op!(BV_XNOR, "xnor", "bvxnor");

// Predicates
bv_pred_op!(BV_ULE, "ule", "bvule");
bv_pred_op!(BV_ULT, "ult", "bvult");
bv_pred_op!(BV_UGE, "uge", "bvuge");
bv_pred_op!(BV_UGT, "ugt", "bvugt");
bv_pred_op!(BV_SLE, "sle", "bvsle");
bv_pred_op!(BV_SLT, "slt", "bvslt");
bv_pred_op!(BV_SGE, "sge", "bvsge");
bv_pred_op!(BV_SGT, "sgt", "bvsgt");

fn print_bv_constant(
    ctx: &Context,
    op: Operation,
    _smt: &mut SmtConversionCtx,
    out: &mut String,
) -> Result<(), Report> {
    let attr = ctx
        .op_attrs(op)
        .get("value")
        .and_then(|a| a.as_bitvector())
        .ok_or_else(|| {
            Report::new(VerificationError::MissingAttribute {
                op: ctx.op_display(op),
                name: "value".to_string(),
            })
        })?;
    out.push_str(&attr.as_smtlib());
    Ok(())
}

fn verify_bv_constant(ctx: &Context, op: Operation) -> Result<(), Report> {
    let attr = ctx
        .op_attrs(op)
        .get("value")
        .and_then(|a| a.as_bitvector())
        .ok_or_else(|| {
            Report::new(VerificationError::MissingAttribute {
                op: ctx.op_display(op),
                name: "value".to_string(),
            })
        })?;
    let res_ty = ctx.value_type(ctx.op_result(op, 0));
    if res_ty != &attr.ty() {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!("literal of width {} but result type {res_ty}", attr.width()),
        }));
    }
    Ok(())
}

/// `smt.bv.constant`: a bit-vector literal `<value : width>`.
pub static BV_CONSTANT: OpInfo = OpInfo {
    dialect: "smt.bv",
    name: "constant",
    operands: &[],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::AnyBitVec,
    }],
    attrs: &[AttrDef {
        name: "value",
        kind: AttrKind::BitVector,
        required: true,
    }],
    traits: TraitSet::PURE
        .union(TraitSet::CONSTANT_LIKE)
        .union(TraitSet::SMTLIB_OP),
    smtlib_name: None,
    print_smtlib: Some(print_bv_constant),
    verify: Some(verify_bv_constant),
};

fn verify_concat(ctx: &Context, op: Operation) -> Result<(), Report> {
    let lhs_w = ctx
        .value_type(ctx.op_operand(op, 0))
        .bit_width()
        .unwrap_or(0);
    let rhs_w = ctx
        .value_type(ctx.op_operand(op, 1))
        .bit_width()
        .unwrap_or(0);
    let res_ty = ctx.value_type(ctx.op_result(op, 0));
    if res_ty != &Type::BitVec(lhs_w + rhs_w) {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!(
                "result type {res_ty} is not the concatenation of widths {lhs_w} and {rhs_w}"
            ),
        }));
    }
    Ok(())
}

/// `smt.bv.concat`: bit-vector concatenation; the result width is the sum
/// of the operand widths.
pub static BV_CONCAT: OpInfo = OpInfo {
    dialect: "smt.bv",
    name: "concat",
    operands: &[
        OperandDef {
            name: "lhs",
            constraint: TypeConstraint::AnyBitVec,
        },
        OperandDef {
            name: "rhs",
            constraint: TypeConstraint::AnyBitVec,
        },
    ],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::AnyBitVec,
    }],
    attrs: &[],
    traits: TraitSet::PURE.union(TraitSet::SIMPLE_SMTLIB_OP),
    smtlib_name: Some("concat"),
    print_smtlib: None,
    verify: Some(verify_concat),
};

fn extract_bounds(ctx: &Context, op: Operation) -> Result<(u32, u32), Report> {
    let get = |name: &str| {
        ctx.op_attrs(op)
            .get(name)
            .and_then(|a| a.as_int())
            .map(|attr| attr.value as u32)
            .ok_or_else(|| {
                Report::new(VerificationError::MissingAttribute {
                    op: ctx.op_display(op),
                    name: name.to_string(),
                })
            })
    };
    Ok((get("lo")?, get("hi")?))
}

fn print_bv_extract(
    ctx: &Context,
    op: Operation,
    smt: &mut SmtConversionCtx,
    out: &mut String,
) -> Result<(), Report> {
    let (lo, hi) = extract_bounds(ctx, op)?;
    out.push_str(&format!("((_ extract {hi} {lo}) "));
    smt.print_value(ctx, ctx.op_operand(op, 0), out)?;
    out.push(')');
    Ok(())
}

fn verify_bv_extract(ctx: &Context, op: Operation) -> Result<(), Report> {
    let (lo, hi) = extract_bounds(ctx, op)?;
    let arg_w = ctx
        .value_type(ctx.op_operand(op, 0))
        .bit_width()
        .unwrap_or(0);
    if lo > hi || hi >= arg_w {
        return Err(Report::new(VerificationError::OutOfRange {
            detail: format!("extract bounds [{lo}, {hi}] out of range for width {arg_w}"),
        }));
    }
    let res_ty = ctx.value_type(ctx.op_result(op, 0));
    if res_ty != &Type::BitVec(hi - lo + 1) {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!("result type {res_ty} does not match bounds [{lo}, {hi}]"),
        }));
    }
    Ok(())
}

/// `smt.bv.extract`: the slice of bits `[lo, hi]` of the operand.
pub static BV_EXTRACT: OpInfo = OpInfo {
    dialect: "smt.bv",
    name: "extract",
    operands: &[OperandDef {
        name: "arg",
        constraint: TypeConstraint::AnyBitVec,
    }],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::AnyBitVec,
    }],
    attrs: &[
        AttrDef {
            name: "hi",
            kind: AttrKind::Int,
            required: true,
        },
        AttrDef {
            name: "lo",
            kind: AttrKind::Int,
            required: true,
        },
    ],
    traits: TraitSet::PURE.union(TraitSet::SMTLIB_OP),
    smtlib_name: None,
    print_smtlib: Some(print_bv_extract),
    verify: Some(verify_bv_extract),
};

// ----------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------

/// Build a `smt.bv.constant`; fails with `OutOfRange` when the value does
/// not fit in the width.
pub fn bv_constant(ctx: &mut Context, value: u128, width: u32) -> Result<Operation, Report> {
    let attr = BitVectorAttr::new(value, width)?;
    Ok(ctx.create_op(
        OperationName::new(&BV_CONSTANT),
        &[],
        [attr.ty()],
        AttributeMap::new().with("value", Attribute::BitVector(attr)),
    ))
}

/// Build any same-width binary bit-vector op.
pub fn bv_binary(ctx: &mut Context, info: &'static OpInfo, lhs: Value, rhs: Value) -> Operation {
    let ty = ctx.value_type(lhs).clone();
    ctx.create_op(OperationName::new(info), &[lhs, rhs], [ty], AttributeMap::new())
}

/// Build any binary bit-vector predicate.
pub fn bv_pred(ctx: &mut Context, info: &'static OpInfo, lhs: Value, rhs: Value) -> Operation {
    ctx.create_op(
        OperationName::new(info),
        &[lhs, rhs],
        [Type::Bool],
        AttributeMap::new(),
    )
}

pub fn bv_not(ctx: &mut Context, arg: Value) -> Operation {
    let ty = ctx.value_type(arg).clone();
    ctx.create_op(OperationName::new(&BV_NOT), &[arg], [ty], AttributeMap::new())
}

pub fn bv_concat(ctx: &mut Context, lhs: Value, rhs: Value) -> Operation {
    let width = ctx.value_type(lhs).bit_width().unwrap_or(0)
        + ctx.value_type(rhs).bit_width().unwrap_or(0);
    ctx.create_op(
        OperationName::new(&BV_CONCAT),
        &[lhs, rhs],
        [Type::BitVec(width)],
        AttributeMap::new(),
    )
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use veriop_ir::Context;

    use super::*;

    fn ctx_with_dialects() -> Context {
        let mut ctx = Context::new();
        ctx.register_dialect::<crate::SmtDialect>();
        ctx.register_dialect::<crate::SmtBitVectorDialect>();
        ctx
    }

    proptest! {
        #[test]
        fn constants_verify_within_range(width in 1u32..=64, value in any::<u64>()) {
            let mut ctx = ctx_with_dialects();
            let value = value as u128;
            let max = 1u128 << width;
            let op = bv_constant(&mut ctx, value % max, width).unwrap();
            prop_assert!(ctx.verify(op).is_ok());
        }

        #[test]
        fn constants_fail_out_of_range(width in 1u32..=64, value in any::<u64>()) {
            let mut ctx = ctx_with_dialects();
            let max = 1u128 << width;
            let out_of_range = max + (value as u128 % max);
            prop_assert!(bv_constant(&mut ctx, out_of_range, width).is_err());
        }
    }

    #[test]
    fn binary_op_requires_same_widths() {
        let mut ctx = ctx_with_dialects();
        let a = bv_constant(&mut ctx, 1, 8).unwrap();
        let b = bv_constant(&mut ctx, 1, 16).unwrap();
        let lhs = ctx.op_result(a, 0);
        let rhs = ctx.op_result(b, 0);
        let add = bv_binary(&mut ctx, &BV_ADD, lhs, rhs);
        assert!(ctx.verify(add).is_err());
    }
}
