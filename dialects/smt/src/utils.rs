//! The `smt.utils` dialect: pair construction and projection.

use veriop_ir::{
    diagnostics::VerificationError, AttributeMap, Context, OpInfo, OperandDef, Operation,
    OperationName, Report, ResultDef, TraitSet, Type, TypeConstraint, Value,
};

fn verify_pair(ctx: &Context, op: Operation) -> Result<(), Report> {
    let first_ty = ctx.value_type(ctx.op_operand(op, 0)).clone();
    let second_ty = ctx.value_type(ctx.op_operand(op, 1)).clone();
    let res_ty = ctx.value_type(ctx.op_result(op, 0));
    if res_ty != &Type::pair(first_ty.clone(), second_ty.clone()) {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!(
                "result type {res_ty} is not the pair of {first_ty} and {second_ty}"
            ),
        }));
    }
    Ok(())
}

/// `smt.utils.pair`: build a pair value.
pub static PAIR: OpInfo = OpInfo {
    dialect: "smt.utils",
    name: "pair",
    operands: &[
        OperandDef {
            name: "first",
            constraint: TypeConstraint::Any,
        },
        OperandDef {
            name: "second",
            constraint: TypeConstraint::Any,
        },
    ],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::AnyPair,
    }],
    attrs: &[],
    traits: TraitSet::PURE.union(TraitSet::SIMPLE_SMTLIB_OP),
    smtlib_name: Some("pair"),
    print_smtlib: None,
    verify: Some(verify_pair),
};

fn verify_projection(ctx: &Context, op: Operation, index: usize) -> Result<(), Report> {
    let pair_ty = ctx.value_type(ctx.op_operand(op, 0));
    let Some((first_ty, second_ty)) = pair_ty.as_pair() else {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!("operand has non-pair type {pair_ty}"),
        }));
    };
    let expected = if index == 0 { first_ty } else { second_ty };
    let res_ty = ctx.value_type(ctx.op_result(op, 0));
    if res_ty != expected {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!("result type {res_ty}, expected component type {expected}"),
        }));
    }
    Ok(())
}

fn verify_first(ctx: &Context, op: Operation) -> Result<(), Report> {
    verify_projection(ctx, op, 0)
}

fn verify_second(ctx: &Context, op: Operation) -> Result<(), Report> {
    verify_projection(ctx, op, 1)
}

/// `smt.utils.first`: the first component of a pair.
pub static FIRST: OpInfo = OpInfo {
    dialect: "smt.utils",
    name: "first",
    operands: &[OperandDef {
        name: "pair",
        constraint: TypeConstraint::AnyPair,
    }],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Any,
    }],
    attrs: &[],
    traits: TraitSet::PURE.union(TraitSet::SIMPLE_SMTLIB_OP),
    smtlib_name: Some("first"),
    print_smtlib: None,
    verify: Some(verify_first),
};

/// `smt.utils.second`: the second component of a pair.
pub static SECOND: OpInfo = OpInfo {
    dialect: "smt.utils",
    name: "second",
    operands: &[OperandDef {
        name: "pair",
        constraint: TypeConstraint::AnyPair,
    }],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Any,
    }],
    attrs: &[],
    traits: TraitSet::PURE.union(TraitSet::SIMPLE_SMTLIB_OP),
    smtlib_name: Some("second"),
    print_smtlib: None,
    verify: Some(verify_second),
};

// ----------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------

pub fn pair(ctx: &mut Context, first: Value, second: Value) -> Operation {
    let ty = Type::pair(
        ctx.value_type(first).clone(),
        ctx.value_type(second).clone(),
    );
    ctx.create_op(
        OperationName::new(&PAIR),
        &[first, second],
        [ty],
        AttributeMap::new(),
    )
}

pub fn first(ctx: &mut Context, pair_value: Value) -> Operation {
    let ty = ctx
        .value_type(pair_value)
        .as_pair()
        .map(|(a, _)| a.clone())
        .expect("operand must be pair-typed");
    ctx.create_op(
        OperationName::new(&FIRST),
        &[pair_value],
        [ty],
        AttributeMap::new(),
    )
}

pub fn second(ctx: &mut Context, pair_value: Value) -> Operation {
    let ty = ctx
        .value_type(pair_value)
        .as_pair()
        .map(|(_, b)| b.clone())
        .expect("operand must be pair-typed");
    ctx.create_op(
        OperationName::new(&SECOND),
        &[pair_value],
        [ty],
        AttributeMap::new(),
    )
}
