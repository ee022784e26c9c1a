//! Small helpers for matching ops inside rewrite patterns.

use crate::{Attribute, Context, Operation, Value};

/// True when `op` has the given qualified name.
pub fn is_op(ctx: &Context, op: Operation, full_name: &str) -> bool {
    ctx.op_name(op).is(full_name)
}

/// The single result of `op`, when it has exactly one.
pub fn single_result(ctx: &Context, op: Operation) -> Option<Value> {
    match ctx.op_results(op) {
        [result] => Some(*result),
        _ => None,
    }
}

/// Fetch a named attribute of `op`.
pub fn attr<'a>(ctx: &'a Context, op: Operation, name: &str) -> Option<&'a Attribute> {
    ctx.op_attrs(op).get(name)
}

/// True when `value` is produced by an op with the given qualified name.
pub fn produced_by(ctx: &Context, value: Value, full_name: &str) -> bool {
    ctx.defining_op(value)
        .is_some_and(|op| ctx.op_name(op).is(full_name))
}
