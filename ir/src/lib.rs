//! The veriop intermediate representation.
//!
//! The IR is a strongly-typed, multi-dialect graph of operations organized
//! into blocks and regions, rooted at a `builtin.module` operation. All IR
//! entities are owned by a [Context] and referenced through stable integer
//! handles; erasing an entity tombstones its slot rather than invalidating
//! outstanding handles.
//!
//! On top of the core sits a greedy pattern-rewrite engine ([patterns]) and
//! the SMT-LIB printer ([smtlib]) that turns a lowered module into a solver
//! script.

mod attributes;
pub mod builtin;
mod dialect;
mod ir;
pub mod matchers;
pub mod patterns;
pub mod smtlib;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use compact_str::{CompactString as SmallStr, ToCompactString as ToSmallStr};
pub use smallvec::{smallvec, SmallVec};
pub use veriop_session::diagnostics::{self, Report};

pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type FxHashSet<K> = rustc_hash::FxHashSet<K>;

pub use self::{
    attributes::{Attribute, AttributeMap, BitVectorAttr, CmpPredicate, IntAttr},
    dialect::{
        AttrDef, AttrKind, DialectInfo, DialectRegistration, DialectRegistry, OpInfo, OperandDef,
        OperationName, PrintSmtFn, ResultDef, TraitSet, TypeConstraint, VerifyFn,
    },
    ir::{
        Block, BlockData, Context, OpBuilder, OpData, OpOperand, Operation, Region, RegionData,
        Value, ValueData, ValueKind,
    },
    types::Type,
};
