//! A small dialect used only by the unit tests of this crate.

use crate::{
    AttrDef, AttrKind, Attribute, AttributeMap, Context, DialectInfo, DialectRegistration,
    IntAttr, OpInfo, OperandDef, Operation, OperationName, ResultDef, TraitSet, Type,
    TypeConstraint, Value,
};

pub struct TestDialect;

impl DialectRegistration for TestDialect {
    const NAMESPACE: &'static str = "test";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&CONST);
        info.register_operation(&ADD);
        info.register_operation(&SINK);
    }
}

/// `test.const`: an integer literal.
pub static CONST: OpInfo = OpInfo {
    dialect: "test",
    name: "const",
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
    verify: None,
};

/// `test.add`
pub static ADD: OpInfo = OpInfo {
    dialect: "test",
    name: "add",
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

/// `test.sink`: consumes a value, so DCE-like patterns cannot touch its
/// operand chain.
pub static SINK: OpInfo = OpInfo {
    dialect: "test",
    name: "sink",
    operands: &[OperandDef {
        name: "value",
        constraint: TypeConstraint::AnyInteger,
    }],
    results: &[],
    attrs: &[],
    traits: TraitSet::empty(),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

pub fn test_context() -> Context {
    let mut ctx = Context::new();
    ctx.register_dialect::<crate::builtin::BuiltinDialect>();
    ctx.register_dialect::<TestDialect>();
    ctx
}

pub fn constant(ctx: &mut Context, value: u128) -> Operation {
    ctx.create_op(
        OperationName::new(&CONST),
        &[],
        [Type::Int(32)],
        AttributeMap::new().with("value", Attribute::Int(IntAttr::new(value, 32))),
    )
}

pub fn add(ctx: &mut Context, lhs: Value, rhs: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&ADD),
        &[lhs, rhs],
        [Type::Int(32)],
        AttributeMap::new(),
    )
}

pub fn sink(ctx: &mut Context, value: Value) -> Operation {
    ctx.create_op(OperationName::new(&SINK), &[value], [], AttributeMap::new())
}

/// The constant value behind `value`, when its producer is `test.const`.
pub fn const_value(ctx: &Context, value: Value) -> Option<u128> {
    let op = ctx.defining_op(value)?;
    if !ctx.op_name(op).is("test.const") {
        return None;
    }
    ctx.op_attrs(op).get("value")?.as_int().map(|attr| attr.value)
}
