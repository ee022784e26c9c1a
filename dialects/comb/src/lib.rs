//! The `comb` dialect: combinational bit-vector logic over `iN` types.
//!
//! `add`, `mul`, `and`, `or`, `xor`, and `concat` are variadic; the SMT
//! lowering left-folds them into binary ops. `icmp`, `parity`, `extract`,
//! and `replicate` exist in the op set but their lowerings are known gaps.

use veriop_ir::{
    AttrDef, AttrKind, AttributeMap, Context, DialectInfo, DialectRegistration, OpInfo,
    OperandDef, Operation, OperationName, ResultDef, TraitSet, Type, TypeConstraint, Value,
};

pub struct CombDialect;

impl DialectRegistration for CombDialect {
    const NAMESPACE: &'static str = "comb";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&ADD);
        info.register_operation(&MUL);
        info.register_operation(&AND);
        info.register_operation(&OR);
        info.register_operation(&XOR);
        info.register_operation(&SUB);
        info.register_operation(&DIVU);
        info.register_operation(&DIVS);
        info.register_operation(&MODU);
        info.register_operation(&MODS);
        info.register_operation(&SHL);
        info.register_operation(&SHRU);
        info.register_operation(&SHRS);
        info.register_operation(&ICMP);
        info.register_operation(&PARITY);
        info.register_operation(&EXTRACT);
        info.register_operation(&CONCAT);
        info.register_operation(&REPLICATE);
        info.register_operation(&MUX);
    }
}

macro_rules! comb_variadic_op {
    ($ident:ident, $name:literal) => {
        #[doc = concat!("`comb.", $name, "` (variadic)")]
        pub static $ident: OpInfo = OpInfo {
            dialect: "comb",
            name: $name,
            operands: &[OperandDef {
                name: "inputs",
                constraint: TypeConstraint::AnyInteger,
            }],
            results: &[ResultDef {
                name: "result",
                constraint: TypeConstraint::AnyInteger,
            }],
            attrs: &[],
            traits: TraitSet::PURE
                .union(TraitSet::VARIADIC)
                .union(TraitSet::SAME_TYPE_OPERANDS),
            smtlib_name: None,
            print_smtlib: None,
            verify: None,
        };
    };
}

macro_rules! comb_binary_op {
    ($ident:ident, $name:literal) => {
        #[doc = concat!("`comb.", $name, "`")]
        pub static $ident: OpInfo = OpInfo {
            dialect: "comb",
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
            traits: TraitSet::PURE.union(TraitSet::SAME_OPERANDS_AND_RESULT_TYPE),
            smtlib_name: None,
            print_smtlib: None,
            verify: None,
        };
    };
}

comb_variadic_op!(ADD, "add");
comb_variadic_op!(MUL, "mul");
comb_variadic_op!(AND, "and");
comb_variadic_op!(OR, "or");
comb_variadic_op!(XOR, "xor");

comb_binary_op!(SUB, "sub");
comb_binary_op!(DIVU, "divu");
comb_binary_op!(DIVS, "divs");
comb_binary_op!(MODU, "modu");
comb_binary_op!(MODS, "mods");
comb_binary_op!(SHL, "shl");
comb_binary_op!(SHRU, "shru");
comb_binary_op!(SHRS, "shrs");

/// `comb.icmp`: integer comparison with a predicate attribute.
pub static ICMP: OpInfo = OpInfo {
    dialect: "comb",
    name: "icmp",
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
    verify: None,
};

/// `comb.parity`: XOR-reduction of all bits, producing `i1`.
pub static PARITY: OpInfo = OpInfo {
    dialect: "comb",
    name: "parity",
    operands: &[OperandDef {
        name: "input",
        constraint: TypeConstraint::AnyInteger,
    }],
    results: &[ResultDef {
        name: "result",
        constraint: TypeConstraint::AnyInteger,
    }],
    attrs: &[],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `comb.extract`: a bit slice starting at the `low_bit` attribute; the
/// result type determines the slice width.
pub static EXTRACT: OpInfo = OpInfo {
    dialect: "comb",
    name: "extract",
    operands: &[OperandDef {
        name: "input",
        constraint: TypeConstraint::AnyInteger,
    }],
    results: &[ResultDef {
        name: "result",
        constraint: TypeConstraint::AnyInteger,
    }],
    attrs: &[AttrDef {
        name: "low_bit",
        kind: AttrKind::Int,
        required: true,
    }],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `comb.concat` (variadic): bit concatenation; the result width is the sum
/// of the operand widths.
pub static CONCAT: OpInfo = OpInfo {
    dialect: "comb",
    name: "concat",
    operands: &[OperandDef {
        name: "inputs",
        constraint: TypeConstraint::AnyInteger,
    }],
    results: &[ResultDef {
        name: "result",
        constraint: TypeConstraint::AnyInteger,
    }],
    attrs: &[],
    traits: TraitSet::PURE.union(TraitSet::VARIADIC),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `comb.replicate`: repeat the input until the result width is filled.
pub static REPLICATE: OpInfo = OpInfo {
    dialect: "comb",
    name: "replicate",
    operands: &[OperandDef {
        name: "input",
        constraint: TypeConstraint::AnyInteger,
    }],
    results: &[ResultDef {
        name: "result",
        constraint: TypeConstraint::AnyInteger,
    }],
    attrs: &[],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `comb.mux`: two-way select on an `i1` condition.
pub static MUX: OpInfo = OpInfo {
    dialect: "comb",
    name: "mux",
    operands: &[
        OperandDef {
            name: "cond",
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
    verify: None,
};

// ----------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------

/// Build one of the variadic ops over any number of same-typed inputs.
pub fn variadic(
    ctx: &mut Context,
    info: &'static OpInfo,
    inputs: &[Value],
    result_ty: Type,
) -> Operation {
    ctx.create_op(OperationName::new(info), inputs, [result_ty], AttributeMap::new())
}

pub fn binary(ctx: &mut Context, info: &'static OpInfo, lhs: Value, rhs: Value) -> Operation {
    let ty = ctx.value_type(lhs).clone();
    ctx.create_op(OperationName::new(info), &[lhs, rhs], [ty], AttributeMap::new())
}

pub fn mux(ctx: &mut Context, cond: Value, true_value: Value, false_value: Value) -> Operation {
    let ty = ctx.value_type(true_value).clone();
    ctx.create_op(
        OperationName::new(&MUX),
        &[cond, true_value, false_value],
        [ty],
        AttributeMap::new(),
    )
}
