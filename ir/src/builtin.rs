//! The builtin dialect: the `builtin.module` container op.

use crate::{
    AttributeMap, Block, Context, DialectInfo, DialectRegistration, OpInfo, Operation,
    OperationName, TraitSet,
};

pub struct BuiltinDialect;

impl DialectRegistration for BuiltinDialect {
    const NAMESPACE: &'static str = "builtin";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&MODULE);
    }
}

/// `builtin.module`: the root container. One region, one block, no operands
/// or results.
pub static MODULE: OpInfo = OpInfo {
    dialect: "builtin",
    name: "module",
    operands: &[],
    results: &[],
    attrs: &[],
    traits: TraitSet::ISOLATED_FROM_ABOVE,
    smtlib_name: None,
    print_smtlib: None,
    verify: None,
};

/// Create an empty module: the op, its region, and the entry block.
pub fn create_module(ctx: &mut Context) -> Operation {
    let module = ctx.create_op(OperationName::new(&MODULE), &[], [], AttributeMap::new());
    let region = ctx.add_region(module);
    ctx.create_block(region, &[]);
    module
}

/// The body block of a module.
pub fn module_body(ctx: &Context, module: Operation) -> Block {
    ctx.entry_block(module).expect("module without body block")
}
