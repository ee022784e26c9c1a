//! The `smt` core dialect: booleans, equality, conditionals, functions, and
//! the script-level `assert`/`check_sat` ops.

use veriop_ir::{
    diagnostics::{Unsupported, VerificationError},
    smtlib::SmtConversionCtx,
    AttrDef, AttrKind, Attribute, AttributeMap, Context, OpInfo, OperandDef, Operation,
    OperationName, Report, ResultDef, TraitSet, Type, TypeConstraint, Value,
};

macro_rules! bool_binary_op {
    ($ident:ident, $name:literal, $smt:literal) => {
        #[doc = concat!("`smt.", $name, "`")]
        pub static $ident: OpInfo = OpInfo {
            dialect: "smt",
            name: $name,
            operands: &[
                OperandDef {
                    name: "lhs",
                    constraint: TypeConstraint::Bool,
                },
                OperandDef {
                    name: "rhs",
                    constraint: TypeConstraint::Bool,
                },
            ],
            results: &[ResultDef {
                name: "res",
                constraint: TypeConstraint::Bool,
            }],
            attrs: &[],
            traits: TraitSet::PURE.union(TraitSet::SIMPLE_SMTLIB_OP),
            smtlib_name: Some($smt),
            print_smtlib: None,
            verify: None,
        };
    };
}

bool_binary_op!(AND, "and", "and");
bool_binary_op!(OR, "or", "or");
bool_binary_op!(XOR, "xor", "xor");
bool_binary_op!(IMPLIES, "implies", "=>");

/// `smt.not`
pub static NOT: OpInfo = OpInfo {
    dialect: "smt",
    name: "not",
    operands: &[OperandDef {
        name: "arg",
        constraint: TypeConstraint::Bool,
    }],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Bool,
    }],
    attrs: &[],
    traits: TraitSet::PURE.union(TraitSet::SIMPLE_SMTLIB_OP),
    smtlib_name: Some("not"),
    print_smtlib: None,
    verify: None,
};

fn print_constant_bool(
    ctx: &Context,
    op: Operation,
    _smt: &mut SmtConversionCtx,
    out: &mut String,
) -> Result<(), Report> {
    match ctx.op_attrs(op).get("value") {
        Some(Attribute::Bool(true)) => out.push_str("true"),
        Some(Attribute::Bool(false)) => out.push_str("false"),
        _ => {
            return Err(Report::new(VerificationError::MissingAttribute {
                op: ctx.op_display(op),
                name: "value".to_string(),
            }));
        }
    }
    Ok(())
}

/// `smt.constant_bool`: a boolean literal.
pub static CONSTANT_BOOL: OpInfo = OpInfo {
    dialect: "smt",
    name: "constant_bool",
    operands: &[],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Bool,
    }],
    attrs: &[AttrDef {
        name: "value",
        kind: AttrKind::Bool,
        required: true,
    }],
    traits: TraitSet::PURE
        .union(TraitSet::CONSTANT_LIKE)
        .union(TraitSet::SMTLIB_OP),
    smtlib_name: None,
    print_smtlib: Some(print_constant_bool),
    verify: None,
};

/// `smt.eq`: equality over any one sort.
pub static EQ: OpInfo = OpInfo {
    dialect: "smt",
    name: "eq",
    operands: &[
        OperandDef {
            name: "lhs",
            constraint: TypeConstraint::Any,
        },
        OperandDef {
            name: "rhs",
            constraint: TypeConstraint::Any,
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
    smtlib_name: Some("="),
    print_smtlib: None,
    verify: None,
};

/// `smt.distinct`: disequality over any one sort.
pub static DISTINCT: OpInfo = OpInfo {
    dialect: "smt",
    name: "distinct",
    operands: &[
        OperandDef {
            name: "lhs",
            constraint: TypeConstraint::Any,
        },
        OperandDef {
            name: "rhs",
            constraint: TypeConstraint::Any,
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
    smtlib_name: Some("distinct"),
    print_smtlib: None,
    verify: None,
};

fn verify_ite(ctx: &Context, op: Operation) -> Result<(), Report> {
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

/// `smt.ite`: if-then-else.
pub static ITE: OpInfo = OpInfo {
    dialect: "smt",
    name: "ite",
    operands: &[
        OperandDef {
            name: "cond",
            constraint: TypeConstraint::Bool,
        },
        OperandDef {
            name: "then_value",
            constraint: TypeConstraint::Any,
        },
        OperandDef {
            name: "else_value",
            constraint: TypeConstraint::Any,
        },
    ],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Any,
    }],
    attrs: &[],
    traits: TraitSet::PURE.union(TraitSet::SIMPLE_SMTLIB_OP),
    smtlib_name: Some("ite"),
    print_smtlib: None,
    verify: Some(verify_ite),
};

/// `smt.declare_const`: a fresh symbolic constant of the result type.
pub static DECLARE_CONST: OpInfo = OpInfo {
    dialect: "smt",
    name: "declare_const",
    operands: &[],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Any,
    }],
    attrs: &[],
    traits: TraitSet::empty(),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

fn verify_define_fun(ctx: &Context, op: Operation) -> Result<(), Report> {
    let result = ctx.op_result(op, 0);
    let Some((arg_tys, ret_ty)) = ctx.value_type(result).as_func().map(|(a, r)| (a.to_vec(), r.clone()))
    else {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: "result must be function-typed".to_string(),
        }));
    };
    let Some(body) = ctx.entry_block(op) else {
        return Err(Unsupported::new("'smt.define_fun' requires a body block"));
    };
    let args = ctx.block_args(body);
    if args.len() != arg_tys.len() {
        return Err(Report::new(VerificationError::ArityMismatch {
            op: ctx.op_display(op),
            kind: "body block arguments",
            expected: arg_tys.len(),
            found: args.len(),
        }));
    }
    for (&arg, expected) in args.iter().zip(arg_tys.iter()) {
        if ctx.value_type(arg) != expected {
            return Err(Report::new(VerificationError::TypeMismatch {
                op: ctx.op_display(op),
                detail: format!(
                    "body argument has type {}, function type says {expected}",
                    ctx.value_type(arg)
                ),
            }));
        }
    }
    if let Some(&terminator) = ctx.block_ops(body).last() {
        if ctx.op_name(terminator).is("smt.return") {
            let returned = ctx.value_type(ctx.op_operand(terminator, 0));
            if returned != &ret_ty {
                return Err(Report::new(VerificationError::TypeMismatch {
                    op: ctx.op_display(op),
                    detail: format!("body returns {returned}, function type says {ret_ty}"),
                }));
            }
        }
    }
    Ok(())
}

/// `smt.define_fun`: a function definition; the body's terminating
/// `smt.return` provides the function's result value.
pub static DEFINE_FUN: OpInfo = OpInfo {
    dialect: "smt",
    name: "define_fun",
    operands: &[],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::AnyFunc,
    }],
    attrs: &[AttrDef {
        name: "sym_name",
        kind: AttrKind::String,
        required: false,
    }],
    traits: TraitSet::ISOLATED_FROM_ABOVE,
    smtlib_name: None,
    print_smtlib: None,
    verify: Some(verify_define_fun),
};

/// `smt.return`: terminator of a `smt.define_fun` body.
pub static RETURN: OpInfo = OpInfo {
    dialect: "smt",
    name: "return",
    operands: &[OperandDef {
        name: "value",
        constraint: TypeConstraint::Any,
    }],
    results: &[],
    attrs: &[],
    traits: TraitSet::TERMINATOR,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

fn print_call(
    ctx: &Context,
    op: Operation,
    smt: &mut SmtConversionCtx,
    out: &mut String,
) -> Result<(), Report> {
    let operands = ctx.op_operands(op).to_vec();
    let (callee, args) = operands.split_first().expect("call without callee");
    // A nullary application is just the function's name.
    if args.is_empty() {
        return smt.print_value(ctx, *callee, out);
    }
    out.push('(');
    smt.print_value(ctx, *callee, out)?;
    for &arg in args {
        out.push(' ');
        smt.print_value(ctx, arg, out)?;
    }
    out.push(')');
    Ok(())
}

fn verify_call(ctx: &Context, op: Operation) -> Result<(), Report> {
    let callee_ty = ctx.value_type(ctx.op_operand(op, 0));
    let Some((arg_tys, ret_ty)) = callee_ty.as_func() else {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!("callee has non-function type {callee_ty}"),
        }));
    };
    let args = &ctx.op_operands(op)[1..];
    if args.len() != arg_tys.len() {
        return Err(Report::new(VerificationError::ArityMismatch {
            op: ctx.op_display(op),
            kind: "call arguments",
            expected: arg_tys.len(),
            found: args.len(),
        }));
    }
    for (&arg, expected) in args.iter().zip(arg_tys.iter()) {
        if ctx.value_type(arg) != expected {
            return Err(Report::new(VerificationError::TypeMismatch {
                op: ctx.op_display(op),
                detail: format!(
                    "argument has type {}, callee expects {expected}",
                    ctx.value_type(arg)
                ),
            }));
        }
    }
    let res_ty = ctx.value_type(ctx.op_result(op, 0));
    if res_ty != ret_ty {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: format!("result has type {res_ty}, callee returns {ret_ty}"),
        }));
    }
    Ok(())
}

/// `smt.call`: apply a defined function to arguments.
pub static CALL: OpInfo = OpInfo {
    dialect: "smt",
    name: "call",
    operands: &[
        OperandDef {
            name: "callee",
            constraint: TypeConstraint::AnyFunc,
        },
        OperandDef {
            name: "args",
            constraint: TypeConstraint::Any,
        },
    ],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Any,
    }],
    attrs: &[],
    traits: TraitSet::PURE
        .union(TraitSet::VARIADIC)
        .union(TraitSet::SMTLIB_OP),
    smtlib_name: None,
    print_smtlib: Some(print_call),
    verify: Some(verify_call),
};

/// `smt.assert`: assert a boolean at the top level of the script.
pub static ASSERT: OpInfo = OpInfo {
    dialect: "smt",
    name: "assert",
    operands: &[OperandDef {
        name: "cond",
        constraint: TypeConstraint::Bool,
    }],
    results: &[],
    attrs: &[],
    traits: TraitSet::empty(),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `smt.check_sat`: ask the solver for (un)satisfiability.
pub static CHECK_SAT: OpInfo = OpInfo {
    dialect: "smt",
    name: "check_sat",
    operands: &[],
    results: &[],
    attrs: &[],
    traits: TraitSet::empty(),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

// ----------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------

pub fn constant_bool(ctx: &mut Context, value: bool) -> Operation {
    ctx.create_op(
        OperationName::new(&CONSTANT_BOOL),
        &[],
        [Type::Bool],
        AttributeMap::new().with("value", Attribute::Bool(value)),
    )
}

pub fn not(ctx: &mut Context, arg: Value) -> Operation {
    ctx.create_op(OperationName::new(&NOT), &[arg], [Type::Bool], AttributeMap::new())
}

pub fn and(ctx: &mut Context, lhs: Value, rhs: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&AND),
        &[lhs, rhs],
        [Type::Bool],
        AttributeMap::new(),
    )
}

pub fn or(ctx: &mut Context, lhs: Value, rhs: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&OR),
        &[lhs, rhs],
        [Type::Bool],
        AttributeMap::new(),
    )
}

pub fn eq(ctx: &mut Context, lhs: Value, rhs: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&EQ),
        &[lhs, rhs],
        [Type::Bool],
        AttributeMap::new(),
    )
}

pub fn distinct(ctx: &mut Context, lhs: Value, rhs: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&DISTINCT),
        &[lhs, rhs],
        [Type::Bool],
        AttributeMap::new(),
    )
}

pub fn ite(ctx: &mut Context, cond: Value, then_value: Value, else_value: Value) -> Operation {
    let ty = ctx.value_type(then_value).clone();
    ctx.create_op(
        OperationName::new(&ITE),
        &[cond, then_value, else_value],
        [ty],
        AttributeMap::new(),
    )
}

pub fn declare_const(ctx: &mut Context, ty: Type) -> Operation {
    ctx.create_op(OperationName::new(&DECLARE_CONST), &[], [ty], AttributeMap::new())
}

pub fn synth_constant(ctx: &mut Context, ty: Type) -> Operation {
    ctx.create_op(
        OperationName::new(&crate::SYNTH_CONSTANT),
        &[],
        [ty],
        AttributeMap::new(),
    )
}

pub fn call(ctx: &mut Context, callee: Value, args: &[Value]) -> Operation {
    let ret_ty = ctx
        .value_type(callee)
        .as_func()
        .map(|(_, ret)| ret.clone())
        .expect("callee must be function-typed");
    let mut operands = Vec::with_capacity(args.len() + 1);
    operands.push(callee);
    operands.extend_from_slice(args);
    ctx.create_op(
        OperationName::new(&CALL),
        &operands,
        [ret_ty],
        AttributeMap::new(),
    )
}

pub fn ret(ctx: &mut Context, value: Value) -> Operation {
    ctx.create_op(OperationName::new(&RETURN), &[value], [], AttributeMap::new())
}

pub fn assert_op(ctx: &mut Context, cond: Value) -> Operation {
    ctx.create_op(OperationName::new(&ASSERT), &[cond], [], AttributeMap::new())
}

pub fn check_sat(ctx: &mut Context) -> Operation {
    ctx.create_op(OperationName::new(&CHECK_SAT), &[], [], AttributeMap::new())
}
