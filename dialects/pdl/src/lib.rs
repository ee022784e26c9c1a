//! The `pdl` pattern-description dialect and its `pdl.df` dataflow
//! extension.
//!
//! A `pdl.pattern` region declaratively describes the matched shape
//! (`pdl.type` / `pdl.operand` / `pdl.operation` / `pdl.result`) and the
//! replacement (`pdl.rewrite` + `pdl.replace`). `pdl.df.get` and
//! `pdl.df.attach` extend a pattern with known-bits analysis preconditions
//! and obligations. The PDL-to-SMT lowering consumes all of these; none
//! survive into a printable module.
//!
//! Values of the erased handle types (`!pdl.operation`, `!pdl.value`, ...)
//! are resolved through a side table during lowering, which is why most
//! operand constraints here are deliberately loose: halfway through the
//! lowering a `!pdl.value` operand may already have been replaced by a
//! lowered bit-vector.

use veriop_ir::{
    Attribute, AttributeMap, AttrDef, AttrKind, Context, DialectInfo, DialectRegistration,
    IntAttr, OpInfo, OperandDef, Operation, OperationName, ResultDef, TraitSet, Type,
    TypeConstraint, Value,
};

pub struct PdlDialect;

impl DialectRegistration for PdlDialect {
    const NAMESPACE: &'static str = "pdl";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&PATTERN);
        info.register_operation(&TYPE);
        info.register_operation(&ATTRIBUTE);
        info.register_operation(&OPERAND);
        info.register_operation(&OPERATION);
        info.register_operation(&RESULT);
        info.register_operation(&REWRITE);
        info.register_operation(&REPLACE);
    }
}

pub struct PdlDataflowDialect;

impl DialectRegistration for PdlDataflowDialect {
    const NAMESPACE: &'static str = "pdl.df";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&DF_GET);
        info.register_operation(&DF_ATTACH);
        info.register_operation(&DF_REWRITE);
    }
}

/// `pdl.pattern`: the container of one rewrite rule.
pub static PATTERN: OpInfo = OpInfo {
    dialect: "pdl",
    name: "pattern",
    operands: &[],
    results: &[],
    attrs: &[
        AttrDef {
            name: "benefit",
            kind: AttrKind::Int,
            required: false,
        },
        AttrDef {
            name: "sym_name",
            kind: AttrKind::String,
            required: false,
        },
    ],
    traits: TraitSet::ISOLATED_FROM_ABOVE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `pdl.type`: a type handle; `constant_type` pins it to a concrete type.
pub static TYPE: OpInfo = OpInfo {
    dialect: "pdl",
    name: "type",
    operands: &[],
    results: &[ResultDef {
        name: "result",
        constraint: TypeConstraint::PdlType,
    }],
    attrs: &[AttrDef {
        name: "constant_type",
        kind: AttrKind::Type,
        required: false,
    }],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `pdl.attribute`: an attribute handle; `value` pins it to a constant.
pub static ATTRIBUTE: OpInfo = OpInfo {
    dialect: "pdl",
    name: "attribute",
    operands: &[],
    results: &[ResultDef {
        name: "attr",
        constraint: TypeConstraint::PdlAttribute,
    }],
    attrs: &[AttrDef {
        name: "value",
        kind: AttrKind::Any,
        required: false,
    }],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `pdl.operand`: a free SSA input of the matched program, typed by a
/// `pdl.type` handle.
pub static OPERAND: OpInfo = OpInfo {
    dialect: "pdl",
    name: "operand",
    operands: &[OperandDef {
        name: "value_type",
        constraint: TypeConstraint::Any,
    }],
    results: &[ResultDef {
        name: "value",
        constraint: TypeConstraint::PdlValue,
    }],
    attrs: &[],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `pdl.operation`: the matched operation. Operands are segmented into
/// operand values, attribute handles, and result-type handles by the
/// `operand_segment_sizes` attribute; `attribute_names` names the attribute
/// handles in order.
pub static OPERATION: OpInfo = OpInfo {
    dialect: "pdl",
    name: "operation",
    operands: &[OperandDef {
        name: "operands",
        constraint: TypeConstraint::Any,
    }],
    results: &[ResultDef {
        name: "op",
        constraint: TypeConstraint::PdlOperation,
    }],
    attrs: &[
        AttrDef {
            name: "op_name",
            kind: AttrKind::String,
            required: true,
        },
        AttrDef {
            name: "attribute_names",
            kind: AttrKind::Array,
            required: false,
        },
        AttrDef {
            name: "operand_segment_sizes",
            kind: AttrKind::Array,
            required: true,
        },
    ],
    traits: TraitSet::VARIADIC,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `pdl.result`: project the `index`th result of a matched operation.
pub static RESULT: OpInfo = OpInfo {
    dialect: "pdl",
    name: "result",
    operands: &[OperandDef {
        name: "parent",
        constraint: TypeConstraint::Any,
    }],
    results: &[ResultDef {
        name: "value",
        constraint: TypeConstraint::PdlValue,
    }],
    attrs: &[AttrDef {
        name: "index",
        kind: AttrKind::Int,
        required: true,
    }],
    traits: TraitSet::PURE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `pdl.rewrite`: the rewrite half of a pattern; the body describes the
/// replacement.
pub static REWRITE: OpInfo = OpInfo {
    dialect: "pdl",
    name: "rewrite",
    operands: &[OperandDef {
        name: "root",
        constraint: TypeConstraint::Any,
    }],
    results: &[],
    attrs: &[],
    traits: TraitSet::VARIADIC,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `pdl.replace`: replace the matched op with a replacement op or values.
/// Operands are segmented by `operand_segment_sizes` into the replaced op,
/// an optional replacement op, and replacement values.
pub static REPLACE: OpInfo = OpInfo {
    dialect: "pdl",
    name: "replace",
    operands: &[OperandDef {
        name: "operands",
        constraint: TypeConstraint::Any,
    }],
    results: &[],
    attrs: &[AttrDef {
        name: "operand_segment_sizes",
        kind: AttrKind::Array,
        required: true,
    }],
    traits: TraitSet::VARIADIC,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `pdl.df.get`: bind the known-bits domain `(zeros, ones)` of a value,
/// under the precondition that the domain is sound for it.
pub static DF_GET: OpInfo = OpInfo {
    dialect: "pdl.df",
    name: "get",
    operands: &[OperandDef {
        name: "value",
        constraint: TypeConstraint::Any,
    }],
    results: &[
        ResultDef {
            name: "zeros",
            constraint: TypeConstraint::Any,
        },
        ResultDef {
            name: "ones",
            constraint: TypeConstraint::Any,
        },
    ],
    attrs: &[],
    traits: TraitSet::empty(),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `pdl.df.attach`: claim that `(zeros, ones)` is a sound known-bits domain
/// for the value; the lowering asserts its negation.
pub static DF_ATTACH: OpInfo = OpInfo {
    dialect: "pdl.df",
    name: "attach",
    operands: &[
        OperandDef {
            name: "value",
            constraint: TypeConstraint::Any,
        },
        OperandDef {
            name: "domains",
            constraint: TypeConstraint::Any,
        },
    ],
    results: &[],
    attrs: &[],
    traits: TraitSet::VARIADIC,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `pdl.df.rewrite`: the dataflow variant of `pdl.rewrite`.
pub static DF_REWRITE: OpInfo = OpInfo {
    dialect: "pdl.df",
    name: "rewrite",
    operands: &[OperandDef {
        name: "root",
        constraint: TypeConstraint::Any,
    }],
    results: &[],
    attrs: &[],
    traits: TraitSet::VARIADIC,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

// ----------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------

/// Create a `pdl.pattern` with an empty body block.
pub fn pattern(ctx: &mut Context) -> Operation {
    let op = ctx.create_op(OperationName::new(&PATTERN), &[], [], AttributeMap::new());
    let region = ctx.add_region(op);
    ctx.create_block(region, &[]);
    op
}

pub fn ty(ctx: &mut Context, constant_type: Option<Type>) -> Operation {
    let mut attrs = AttributeMap::new();
    if let Some(constant) = constant_type {
        attrs.set("constant_type", Attribute::Type(constant));
    }
    ctx.create_op(OperationName::new(&TYPE), &[], [Type::PdlType], attrs)
}

pub fn attribute(ctx: &mut Context, value: Option<Attribute>) -> Operation {
    let mut attrs = AttributeMap::new();
    if let Some(value) = value {
        attrs.set("value", value);
    }
    ctx.create_op(OperationName::new(&ATTRIBUTE), &[], [Type::PdlAttribute], attrs)
}

pub fn operand(ctx: &mut Context, value_type: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&OPERAND),
        &[value_type],
        [Type::PdlValue],
        AttributeMap::new(),
    )
}

fn segment_sizes(sizes: &[usize]) -> Attribute {
    Attribute::Array(
        sizes
            .iter()
            .map(|&n| Attribute::Int(IntAttr::new(n as u128, 32)))
            .collect(),
    )
}

/// Create a `pdl.operation` for `op_name` over operand values, attribute
/// handles (with their names), and result-type handles.
pub fn operation(
    ctx: &mut Context,
    op_name: &str,
    operand_values: &[Value],
    attributes: &[(&str, Value)],
    type_values: &[Value],
) -> Operation {
    let mut operands = Vec::new();
    operands.extend_from_slice(operand_values);
    operands.extend(attributes.iter().map(|(_, v)| *v));
    operands.extend_from_slice(type_values);
    let attr_names = Attribute::Array(
        attributes
            .iter()
            .map(|(name, _)| Attribute::string(*name))
            .collect(),
    );
    ctx.create_op(
        OperationName::new(&OPERATION),
        &operands,
        [Type::PdlOperation],
        AttributeMap::new()
            .with("op_name", Attribute::string(op_name))
            .with("attribute_names", attr_names)
            .with(
                "operand_segment_sizes",
                segment_sizes(&[operand_values.len(), attributes.len(), type_values.len()]),
            ),
    )
}

pub fn result(ctx: &mut Context, parent: Value, index: u32) -> Operation {
    ctx.create_op(
        OperationName::new(&RESULT),
        &[parent],
        [Type::PdlValue],
        AttributeMap::new().with("index", Attribute::Int(IntAttr::new(index as u128, 32))),
    )
}

/// Create a `pdl.rewrite` rooted at `root` with an empty body block.
pub fn rewrite(ctx: &mut Context, root: Value) -> Operation {
    let op = ctx.create_op(OperationName::new(&REWRITE), &[root], [], AttributeMap::new());
    let region = ctx.add_region(op);
    ctx.create_block(region, &[]);
    op
}

/// Create a `pdl.df.rewrite` rooted at `root` with an empty body block.
pub fn df_rewrite(ctx: &mut Context, root: Value) -> Operation {
    let op = ctx.create_op(
        OperationName::new(&DF_REWRITE),
        &[root],
        [],
        AttributeMap::new(),
    );
    let region = ctx.add_region(op);
    ctx.create_block(region, &[]);
    op
}

/// Replace `op` with a replacement operation.
pub fn replace_with_op(ctx: &mut Context, op: Value, replacement: Value) -> Operation {
    ctx.create_op(
        OperationName::new(&REPLACE),
        &[op, replacement],
        [],
        AttributeMap::new().with("operand_segment_sizes", segment_sizes(&[1, 1, 0])),
    )
}

/// Replace `op` with replacement values.
pub fn replace_with_values(ctx: &mut Context, op: Value, values: &[Value]) -> Operation {
    let mut operands = vec![op];
    operands.extend_from_slice(values);
    ctx.create_op(
        OperationName::new(&REPLACE),
        &operands,
        [],
        AttributeMap::new().with(
            "operand_segment_sizes",
            segment_sizes(&[1, 0, values.len()]),
        ),
    )
}

pub fn df_get(ctx: &mut Context, value: Value) -> Operation {
    let ty = ctx.value_type(value).clone();
    ctx.create_op(
        OperationName::new(&DF_GET),
        &[value],
        [ty.clone(), ty],
        AttributeMap::new(),
    )
}

pub fn df_attach(ctx: &mut Context, value: Value, domains: &[Value]) -> Operation {
    let mut operands = vec![value];
    operands.extend_from_slice(domains);
    ctx.create_op(
        OperationName::new(&DF_ATTACH),
        &operands,
        [],
        AttributeMap::new(),
    )
}
