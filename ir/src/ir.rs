mod builder;
mod context;
mod print;
mod verifier;
mod walk;

pub use self::{
    builder::OpBuilder,
    context::{
        Block, BlockData, Context, OpData, OpOperand, Operation, Region, RegionData, Value,
        ValueData, ValueKind,
    },
};
