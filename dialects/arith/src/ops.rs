use veriop_ir::{
    diagnostics::VerificationError, AttrDef, AttrKind, Attribute, AttributeMap, Context, IntAttr,
    OpInfo, OperandDef, Operation, OperationName, Report, ResultDef, TraitSet, Type,
    TypeConstraint, Value,
};

macro_rules! arith_binary_op {
    ($ident:ident, $name:literal $(, $extra:ident)*) => {
        #[doc = concat!("`arith.", $name, "`")]
        pub static $ident: OpInfo = OpInfo {
            dialect: "arith",
            name: $name,
            operands: &[
                OperandDef {
                    name: "lhs",
                    constraint: TypeConstraint::AnyInteger,
                },
                OperandDef {
                    name: "rhs",
                    constraint: TypeConstraint::AnyInteger,
                },
            ],
            results: &[ResultDef {
                name: "result",
                constraint: TypeConstraint::AnyInteger,
            }],
            attrs: &[],
            traits: TraitSet::PURE
                .union(TraitSet::SAME_OPERANDS_AND_RESULT_TYPE)
                $(.union(TraitSet::$extra))*,
            smtlib_name: None,
            print_smtlib: None,
            verify: None,
        };
    };
}

arith_binary_op!(ADDI, "addi", COMMUTATIVE);
arith_binary_op!(SUBI, "subi");
arith_binary_op!(MULI, "muli", COMMUTATIVE);
arith_binary_op!(DIVSI, "divsi");
arith_binary_op!(DIVUI, "divui");
arith_binary_op!(REMSI, "remsi");
arith_binary_op!(REMUI, "remui");
arith_binary_op!(ANDI, "andi", COMMUTATIVE);
arith_binary_op!(ORI, "ori", COMMUTATIVE);
arith_binary_op!(XORI, "xori", COMMUTATIVE);
arith_binary_op!(SHLI, "shli");
arith_binary_op!(SHRSI, "shrsi");
arith_binary_op!(SHRUI, "shrui");

fn verify_constant(ctx: &Context, op: Operation) -> Result<(), Report> {
    let attr = ctx
        .op_attrs(op)
        .get("value")
        .and_then(|a| a.as_int())
        .ok_or_else(|| {
            Report::new(VerificationError::MissingAttribute {
                op: ctx.op_display(op),
                name: "value".to_string(),
            })
        })?;
    let res_ty = ctx.value_type(ctx.op_result(op, 0));
    if res_ty != &Type::Int(attr.width) {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!("literal of width {} but result type {res_ty}", attr.width),
        }));
    }
    if attr.width < 128 && attr.value >= (1u128 << attr.width) {
        return Err(Report::new(VerificationError::OutOfRange {
            detail: format!(
                "constant {} does not fit in {} bits",
                attr.value, attr.width
            ),
        }));
    }
    Ok(())
}

/// `arith.constant`
pub static CONSTANT: OpInfo = OpInfo {
    dialect: "arith",
    name: "constant",
    operands: &[],
    results: &[ResultDef {
        name: "result",
        constraint: TypeConstraint::AnyInteger,
    }],
    attrs: &[AttrDef {
        name: "value",
        kind: AttrKind::Int,
        required: true,
    }],
    traits: TraitSet::PURE.union(TraitSet::CONSTANT_LIKE),
    smtlib_name: None,
    print_smtlib: None,
    verify: Some(verify_constant),
};

fn verify_cmpi(ctx: &Context, op: Operation) -> Result<(), Report> {
    let res_ty = ctx.value_type(ctx.op_result(op, 0));
    if res_ty != &Type::Int(1) {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!("result has type {res_ty}, expected i1"),
        }));
    }
    Ok(())
}

/// `arith.cmpi`: integer comparison selected by the `predicate` attribute;
/// the result is `i1`.
pub static CMPI: OpInfo = OpInfo {
    dialect: "arith",
    name: "cmpi",
    operands: &[
        OperandDef {
            name: "lhs",
            constraint: TypeConstraint::AnyInteger,
        },
        OperandDef {
            name: "rhs",
            constraint: TypeConstraint::AnyInteger,
        },
    ],
    results: &[ResultDef {
        name: "result",
        constraint: TypeConstraint::AnyInteger,
    }],
    attrs: &[AttrDef {
        name: "predicate",
        kind: AttrKind::Predicate,
        required: true,
    }],
    traits: TraitSet::PURE.union(TraitSet::SAME_TYPE_OPERANDS),
    smtlib_name: None,
    print_smtlib: None,
    verify: Some(verify_cmpi),
};

fn verify_select(ctx: &Context, op: Operation) -> Result<(), Report> {
    let cond_ty = ctx.value_type(ctx.op_operand(op, 0));
    if cond_ty != &Type::Int(1) {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!("condition has type {cond_ty}, expected i1"),
        }));
    }
    let then_ty = ctx.value_type(ctx.op_operand(op, 1));
    let else_ty = ctx.value_type(ctx.op_operand(op, 2));
    let res_ty = ctx.value_type(ctx.op_result(op, 0));
    if then_ty != else_ty || then_ty != res_ty {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!("branches have types {then_ty} and {else_ty}, result {res_ty}"),
        }));
    }
    Ok(())
}

/// `arith.select`
pub static SELECT: OpInfo = OpInfo {
    dialect: "arith",
    name: "select",
    operands: &[
        OperandDef {
            name: "condition",
            constraint: TypeConstraint::AnyInteger,
        },
        OperandDef {
            name: "true_value",
            constraint: TypeConstraint::AnyInteger,
        },
        OperandDef {
            name: "false_value",
            constraint: TypeConstraint::AnyInteger,
        },
    ],
    results: &[ResultDef {
        name: "result",
        constraint: TypeConstraint::AnyInteger,
    }],
    attrs: &[],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: Some(verify_select),
};

// ----------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------

pub fn constant(ctx: &mut Context, value: u128, width: u32) -> Operation {
    ctx.create_op(
        OperationName::new(&CONSTANT),
        &[],
        [Type::Int(width)],
        AttributeMap::new().with("value", Attribute::Int(IntAttr::new(value, width))),
    )
}

pub fn binary(ctx: &mut Context, info: &'static OpInfo, lhs: Value, rhs: Value) -> Operation {
    let ty = ctx.value_type(lhs).clone();
    ctx.create_op(OperationName::new(info), &[lhs, rhs], [ty], AttributeMap::new())
}

pub fn cmpi(
    ctx: &mut Context,
    predicate: veriop_ir::CmpPredicate,
    lhs: Value,
    rhs: Value,
) -> Operation {
    ctx.create_op(
        OperationName::new(&CMPI),
        &[lhs, rhs],
        [Type::Int(1)],
        AttributeMap::new().with("predicate", Attribute::Predicate(predicate)),
    )
}

pub fn select(ctx: &mut Context, cond: Value, true_value: Value, false_value: Value) -> Operation {
    let ty = ctx.value_type(true_value).clone();
    ctx.create_op(
        OperationName::new(&SELECT),
        &[cond, true_value, false_value],
        [ty],
        AttributeMap::new(),
    )
}
