use super::context::{Block, Context, Operation, Value};
use crate::{AttributeMap, OperationName, Type};

/// Where an [OpBuilder] places the ops it creates.
#[derive(Debug, Clone, Copy)]
enum InsertionPoint {
    Detached,
    BlockEnd(Block),
    Before(Operation),
}

/// A convenience layer over [Context::create_op] that also links the new op
/// at the current insertion point.
pub struct OpBuilder<'a> {
    ctx: &'a mut Context,
    ip: InsertionPoint,
}

impl<'a> OpBuilder<'a> {
    pub fn new(ctx: &'a mut Context) -> Self {
        Self {
            ctx,
            ip: InsertionPoint::Detached,
        }
    }

    pub fn at_end(ctx: &'a mut Context, block: Block) -> Self {
        Self {
            ctx,
            ip: InsertionPoint::BlockEnd(block),
        }
    }

    pub fn before(ctx: &'a mut Context, op: Operation) -> Self {
        Self {
            ctx,
            ip: InsertionPoint::Before(op),
        }
    }

    pub fn context(&mut self) -> &mut Context {
        self.ctx
    }

    pub fn set_insertion_point_to_end(&mut self, block: Block) {
        self.ip = InsertionPoint::BlockEnd(block);
    }

    pub fn set_insertion_point_before(&mut self, op: Operation) {
        self.ip = InsertionPoint::Before(op);
    }

    /// Create an op and link it at the insertion point.
    pub fn build(
        &mut self,
        name: OperationName,
        operands: &[Value],
        result_types: impl IntoIterator<Item = Type>,
        attrs: AttributeMap,
    ) -> Operation {
        let op = self.ctx.create_op(name, operands, result_types, attrs);
        match self.ip {
            InsertionPoint::Detached => {}
            InsertionPoint::BlockEnd(block) => self.ctx.append_op(block, op),
            InsertionPoint::Before(anchor) => self.ctx.insert_op_before(anchor, op),
        }
        op
    }
}
