//! Ops of the `ub` and `mem_effect` dialects.

use veriop_ir::{
    AttributeMap, Context, OpInfo, OperandDef, Operation, OperationName, ResultDef, TraitSet,
    Type, TypeConstraint, Value,
};

/// `ub.trigger`: raise the undefined-behaviour flag of the state.
pub static TRIGGER: OpInfo = OpInfo {
    dialect: "ub",
    name: "trigger",
    operands: &[OperandDef {
        name: "state",
        constraint: TypeConstraint::State,
    }],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::State,
    }],
    attrs: &[],
    traits: TraitSet::empty(),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `ub.to_bool`: read the undefined-behaviour flag of the state.
pub static TO_BOOL: OpInfo = OpInfo {
    dialect: "ub",
    name: "to_bool",
    operands: &[OperandDef {
        name: "state",
        constraint: TypeConstraint::State,
    }],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Bool,
    }],
    attrs: &[],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `mem_effect.alloc`: allocate a fresh live block of the given size,
/// producing the updated state and a pointer to offset 0.
pub static ALLOC: OpInfo = OpInfo {
    dialect: "mem_effect",
    name: "alloc",
    operands: &[
        OperandDef {
            name: "state",
            constraint: TypeConstraint::State,
        },
        OperandDef {
            name: "size",
            constraint: TypeConstraint::AnyBitVec,
        },
    ],
    results: &[
        ResultDef {
            name: "new_state",
            constraint: TypeConstraint::State,
        },
        ResultDef {
            name: "pointer",
            constraint: TypeConstraint::Pointer,
        },
    ],
    attrs: &[],
    traits: TraitSet::empty(),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `mem_effect.offset_pointer`: displace a pointer by a byte offset.
pub static OFFSET_POINTER: OpInfo = OpInfo {
    dialect: "mem_effect",
    name: "offset_pointer",
    operands: &[
        OperandDef {
            name: "pointer",
            constraint: TypeConstraint::Pointer,
        },
        OperandDef {
            name: "offset",
            constraint: TypeConstraint::AnyBitVec,
        },
    ],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Pointer,
    }],
    attrs: &[],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `mem_effect.read`: read a value of the second result's type through a
/// pointer; out-of-bounds accesses raise the UB flag after lowering.
pub static READ: OpInfo = OpInfo {
    dialect: "mem_effect",
    name: "read",
    operands: &[
        OperandDef {
            name: "state",
            constraint: TypeConstraint::State,
        },
        OperandDef {
            name: "pointer",
            constraint: TypeConstraint::Pointer,
        },
    ],
    results: &[
        ResultDef {
            name: "new_state",
            constraint: TypeConstraint::State,
        },
        ResultDef {
            name: "res",
            constraint: TypeConstraint::Any,
        },
    ],
    attrs: &[],
    traits: TraitSet::empty(),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `mem_effect.write`: write a value through a pointer.
pub static WRITE: OpInfo = OpInfo {
    dialect: "mem_effect",
    name: "write",
    operands: &[
        OperandDef {
            name: "state",
            constraint: TypeConstraint::State,
        },
        OperandDef {
            name: "pointer",
            constraint: TypeConstraint::Pointer,
        },
        OperandDef {
            name: "value",
            constraint: TypeConstraint::Any,
        },
    ],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::State,
    }],
    attrs: &[],
    traits: TraitSet::empty(),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

// ----------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------

pub fn trigger(ctx: &mut Context, state: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&TRIGGER),
        &[state],
        [Type::State],
        AttributeMap::new(),
    )
}

pub fn to_bool(ctx: &mut Context, state: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&TO_BOOL),
        &[state],
        [Type::Bool],
        AttributeMap::new(),
    )
}

pub fn alloc(ctx: &mut Context, state: Value, size: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&ALLOC),
        &[state, size],
        [Type::State, Type::Pointer],
        AttributeMap::new(),
    )
}

pub fn offset_pointer(ctx: &mut Context, pointer: Value, offset: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&OFFSET_POINTER),
        &[pointer, offset],
        [Type::Pointer],
        AttributeMap::new(),
    )
}

pub fn read(ctx: &mut Context, state: Value, pointer: Value, result_ty: Type) -> Operation {
    ctx.create_op(
        OperationName::new(&READ),
        &[state, pointer],
        [Type::State, result_ty],
        AttributeMap::new(),
    )
}

pub fn write(ctx: &mut Context, state: Value, pointer: Value, value: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&WRITE),
        &[state, pointer, value],
        [Type::State],
        AttributeMap::new(),
    )
}
