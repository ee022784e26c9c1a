//! The memory-model dialects.
//!
//! `mem` models a symbolic memory as an opaque `Memory` sort holding
//! `Block`s addressed by `BlockID`s; blocks carry a size, a liveness
//! marker, and their bytes. `ub` raises and reads the undefined-behaviour
//! flag threaded through the opaque `eff` state. `mem_effect` is the
//! effect-level surface (`alloc`/`read`/`write`/`offset_pointer`) the
//! lowering pass desugars into `mem` + pair states.

mod effects;
mod memory;

pub use self::{effects::*, memory::*};

use veriop_ir::{DialectInfo, DialectRegistration};

/// The `mem` dialect.
pub struct MemDialect;

impl DialectRegistration for MemDialect {
    const NAMESPACE: &'static str = "mem";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&GET_FRESH_BLOCK_ID);
        info.register_operation(&GET_BLOCK);
        info.register_operation(&SET_BLOCK);
        info.register_operation(&GET_BLOCK_SIZE);
        info.register_operation(&SET_BLOCK_SIZE);
        info.register_operation(&GET_BLOCK_LIVE_MARKER);
        info.register_operation(&SET_BLOCK_LIVE_MARKER);
        info.register_operation(&GET_BLOCK_BYTES);
        info.register_operation(&SET_BLOCK_BYTES);
        info.register_operation(&READ_BYTES);
        info.register_operation(&WRITE_BYTES);
    }
}

/// The `ub` dialect.
pub struct UbDialect;

impl DialectRegistration for UbDialect {
    const NAMESPACE: &'static str = "ub";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&TRIGGER);
        info.register_operation(&TO_BOOL);
    }
}

/// The `mem_effect` dialect.
pub struct MemEffectDialect;

impl DialectRegistration for MemEffectDialect {
    const NAMESPACE: &'static str = "mem_effect";

    fn register_operations(info: &mut DialectInfo) {
        info.register_operation(&ALLOC);
        info.register_operation(&OFFSET_POINTER);
        info.register_operation(&READ);
        info.register_operation(&WRITE);
    }
}
