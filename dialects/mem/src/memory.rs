//! Ops of the `mem` dialect proper.

use veriop_ir::{
    AttributeMap, Context, OpInfo, OperandDef, Operation, OperationName, ResultDef, TraitSet,
    Type, TypeConstraint, Value,
};

/// The type of a block's byte storage: a 64-bit-indexed array of bytes.
pub fn bytes_type() -> Type {
    Type::array(Type::BitVec(64), Type::BitVec(8))
}

/// `mem.get_fresh_block_id`: produce a block ID unused in the given memory,
/// together with the updated memory. Side-effect free: the freshness is
/// symbolic, not stateful.
pub static GET_FRESH_BLOCK_ID: OpInfo = OpInfo {
    dialect: "mem",
    name: "get_fresh_block_id",
    operands: &[OperandDef {
        name: "memory",
        constraint: TypeConstraint::Memory,
    }],
    results: &[
        ResultDef {
            name: "new_memory",
            constraint: TypeConstraint::Memory,
        },
        ResultDef {
            name: "res",
            constraint: TypeConstraint::BlockId,
        },
    ],
    attrs: &[],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `mem.get_block`
pub static GET_BLOCK: OpInfo = OpInfo {
    dialect: "mem",
    name: "get_block",
    operands: &[
        OperandDef {
            name: "memory",
            constraint: TypeConstraint::Memory,
        },
        OperandDef {
            name: "block_id",
            constraint: TypeConstraint::BlockId,
        },
    ],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::MemBlock,
    }],
    attrs: &[],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `mem.set_block`
pub static SET_BLOCK: OpInfo = OpInfo {
    dialect: "mem",
    name: "set_block",
    operands: &[
        OperandDef {
            name: "block",
            constraint: TypeConstraint::MemBlock,
        },
        OperandDef {
            name: "memory",
            constraint: TypeConstraint::Memory,
        },
        OperandDef {
            name: "block_id",
            constraint: TypeConstraint::BlockId,
        },
    ],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Memory,
    }],
    attrs: &[],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

macro_rules! block_getter {
    ($ident:ident, $name:literal, $constraint:expr) => {
        #[doc = concat!("`mem.", $name, "`")]
        pub static $ident: OpInfo = OpInfo {
            dialect: "mem",
            name: $name,
            operands: &[OperandDef {
                name: "block",
                constraint: TypeConstraint::MemBlock,
            }],
            results: &[ResultDef {
                name: "res",
                constraint: $constraint,
            }],
            attrs: &[],
            traits: TraitSet::PURE,
            smtlib_name: None,
            print_smtlib: None,
            verify: None,
        };
    };
}

macro_rules! block_setter {
    ($ident:ident, $name:literal, $constraint:expr) => {
        #[doc = concat!("`mem.", $name, "`")]
        pub static $ident: OpInfo = OpInfo {
            dialect: "mem",
            name: $name,
            operands: &[
                OperandDef {
                    name: "block",
                    constraint: TypeConstraint::MemBlock,
                },
                OperandDef {
                    name: "value",
                    constraint: $constraint,
                },
            ],
            results: &[ResultDef {
                name: "res",
                constraint: TypeConstraint::MemBlock,
            }],
            attrs: &[],
            traits: TraitSet::PURE,
            smtlib_name: None,
            print_smtlib: None,
            verify: None,
        };
    };
}

block_getter!(GET_BLOCK_SIZE, "get_block_size", TypeConstraint::AnyBitVec);
block_setter!(SET_BLOCK_SIZE, "set_block_size", TypeConstraint::AnyBitVec);
block_getter!(
    GET_BLOCK_LIVE_MARKER,
    "get_block_live_marker",
    TypeConstraint::Bool
);
block_setter!(
    SET_BLOCK_LIVE_MARKER,
    "set_block_live_marker",
    TypeConstraint::Bool
);
block_getter!(GET_BLOCK_BYTES, "get_block_bytes", TypeConstraint::AnyArray);
block_setter!(SET_BLOCK_BYTES, "set_block_bytes", TypeConstraint::AnyArray);

/// `mem.read_bytes`: read a value of the result type from byte storage at
/// the given offset.
pub static READ_BYTES: OpInfo = OpInfo {
    dialect: "mem",
    name: "read_bytes",
    operands: &[
        OperandDef {
            name: "bytes",
            constraint: TypeConstraint::AnyArray,
        },
        OperandDef {
            name: "offset",
            constraint: TypeConstraint::AnyBitVec,
        },
    ],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::Any,
    }],
    attrs: &[],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `mem.write_bytes`: write a value into byte storage at the given offset.
pub static WRITE_BYTES: OpInfo = OpInfo {
    dialect: "mem",
    name: "write_bytes",
    operands: &[
        OperandDef {
            name: "value",
            constraint: TypeConstraint::Any,
        },
        OperandDef {
            name: "bytes",
            constraint: TypeConstraint::AnyArray,
        },
        OperandDef {
            name: "offset",
            constraint: TypeConstraint::AnyBitVec,
        },
    ],
    results: &[ResultDef {
        name: "res",
        constraint: TypeConstraint::AnyArray,
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

pub fn get_fresh_block_id(ctx: &mut Context, memory: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&GET_FRESH_BLOCK_ID),
        &[memory],
        [Type::Memory, Type::BlockId],
        AttributeMap::new(),
    )
}

pub fn get_block(ctx: &mut Context, memory: Value, block_id: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&GET_BLOCK),
        &[memory, block_id],
        [Type::MemBlock],
        AttributeMap::new(),
    )
}

pub fn set_block(ctx: &mut Context, block: Value, memory: Value, block_id: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&SET_BLOCK),
        &[block, memory, block_id],
        [Type::Memory],
        AttributeMap::new(),
    )
}

pub fn get_block_size(ctx: &mut Context, block: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&GET_BLOCK_SIZE),
        &[block],
        [Type::BitVec(64)],
        AttributeMap::new(),
    )
}

pub fn set_block_size(ctx: &mut Context, block: Value, size: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&SET_BLOCK_SIZE),
        &[block, size],
        [Type::MemBlock],
        AttributeMap::new(),
    )
}

pub fn get_block_live_marker(ctx: &mut Context, block: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&GET_BLOCK_LIVE_MARKER),
        &[block],
        [Type::Bool],
        AttributeMap::new(),
    )
}

pub fn set_block_live_marker(ctx: &mut Context, block: Value, live: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&SET_BLOCK_LIVE_MARKER),
        &[block, live],
        [Type::MemBlock],
        AttributeMap::new(),
    )
}

pub fn get_block_bytes(ctx: &mut Context, block: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&GET_BLOCK_BYTES),
        &[block],
        [bytes_type()],
        AttributeMap::new(),
    )
}

pub fn set_block_bytes(ctx: &mut Context, block: Value, bytes: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&SET_BLOCK_BYTES),
        &[block, bytes],
        [Type::MemBlock],
        AttributeMap::new(),
    )
}

pub fn read_bytes(ctx: &mut Context, bytes: Value, offset: Value, result_ty: Type) -> Operation {
    ctx.create_op(
        OperationName::new(&READ_BYTES),
        &[bytes, offset],
        [result_ty],
        AttributeMap::new(),
    )
}

pub fn write_bytes(ctx: &mut Context, value: Value, bytes: Value, offset: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&WRITE_BYTES),
        &[value, bytes, offset],
        [bytes_type()],
        AttributeMap::new(),
    )
}
