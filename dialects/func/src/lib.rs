//! The `func` dialect: function definitions, returns, and direct calls in
//! the source program.

use veriop_ir::{
    diagnostics::VerificationError, AttrDef, AttrKind, Attribute, AttributeMap, Context,
    DialectInfo, DialectRegistration, OpInfo, OperandDef, Operation, OperationName, Report,
    ResultDef, TraitSet, Type, TypeConstraint, Value,
};

pub struct FuncDialect;

impl DialectRegistration for FuncDialect {
    const NAMESPACE: &'static str = "func";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&FUNC);
        info.register_operation(&RETURN);
        info.register_operation(&CALL);
    }
}

fn verify_func(ctx: &Context, op: Operation) -> Result<(), Report> {
    let Some(Attribute::Type(Type::Func(arg_tys, _))) = ctx.op_attrs(op).get("function_type")
    else {
        return Err(Report::new(VerificationError::TypeMismatch {
            op: ctx.op_display(op),
            detail: "attribute 'function_type' must be a function type".to_string(),
        }));
    };
    let Some(body) = ctx.entry_block(op) else {
        return Ok(());
    };
    let args = ctx.block_args(body);
    if args.len() != arg_tys.len() {
        return Err(Report::new(VerificationError::ArityMismatch {
            op: ctx.op_display(op),
            kind: "entry block arguments",
            expected: arg_tys.len(),
            found: args.len(),
        }));
    }
    for (&arg, expected) in args.iter().zip(arg_tys.iter()) {
        if ctx.value_type(arg) != expected {
            return Err(Report::new(VerificationError::TypeMismatch {
                op: ctx.op_display(op),
                detail: format!(
                    "entry argument has type {}, signature says {expected}",
                    ctx.value_type(arg)
                ),
            }));
        }
    }
    Ok(())
}

/// `func.func`: a function definition with a `sym_name` and a
/// `function_type` attribute; the body's entry block carries the argument
/// values.
pub static FUNC: OpInfo = OpInfo {
    dialect: "func",
    name: "func",
    operands: &[],
    results: &[],
    attrs: &[
        AttrDef {
            name: "sym_name",
            kind: AttrKind::String,
            required: true,
        },
        AttrDef {
            name: "function_type",
            kind: AttrKind::Type,
            required: true,
        },
    ],
    traits: TraitSet::ISOLATED_FROM_ABOVE,
    smtlib_name: None,
    print_smtlib: None,
    verify: Some(verify_func),
};

/// `func.return`: terminator of a function body.
pub static RETURN: OpInfo = OpInfo {
    dialect: "func",
    name: "return",
    operands: &[OperandDef {
        name: "operands",
        constraint: TypeConstraint::Any,
    }],
    results: &[],
    attrs: &[],
    traits: TraitSet::TERMINATOR.union(TraitSet::VARIADIC),
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// `func.call`: direct call of a function by symbol.
pub static CALL: OpInfo = OpInfo {
    dialect: "func",
    name: "call",
    operands: &[OperandDef {
        name: "operands",
        constraint: TypeConstraint::Any,
    }],
    results: &[ResultDef {
        name: "result",
        constraint: TypeConstraint::Any,
    }],
    attrs: &[AttrDef {
        name: "callee",
        kind: AttrKind::Symbol,
        required: true,
    }],
    traits: TraitSet::VARIADIC,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

// ----------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------

/// Create a `func.func` with an entry block matching the signature.
pub fn func(ctx: &mut Context, name: &str, arg_tys: Vec<Type>, ret_ty: Type) -> Operation {
    let function_type = Type::Func(arg_tys.clone(), Box::new(ret_ty));
    let op = ctx.create_op(
        OperationName::new(&FUNC),
        &[],
        [],
        AttributeMap::new()
            .with("sym_name", Attribute::string(name))
            .with("function_type", Attribute::Type(function_type)),
    );
    let region = ctx.add_region(op);
    ctx.create_block(region, &arg_tys);
    op
}

pub fn ret(ctx: &mut Context, values: &[Value]) -> Operation {
    ctx.create_op(OperationName::new(&RETURN), values, [], AttributeMap::new())
}

pub fn call(ctx: &mut Context, callee: &str, args: &[Value], result_ty: Type) -> Operation {
    ctx.create_op(
        OperationName::new(&CALL),
        args,
        [result_ty],
        AttributeMap::new().with("callee", Attribute::symbol(callee)),
    )
}
