use core::fmt;

use veriop_session::diagnostics::VerificationError;

use crate::{smtlib::SmtConversionCtx, Context, FxHashMap, Operation, Report, SmallStr, Type};

bitflags::bitflags! {
    /// Traits attached to an operation definition.
    ///
    /// Trait *behaviour* lives in the definition's function table
    /// ([OpInfo]); the flags only answer membership queries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraitSet: u32 {
        /// No side effects; the op may be duplicated or dropped when unused.
        const PURE = 1 << 0;
        /// Must appear last in its block.
        const TERMINATOR = 1 << 1;
        const COMMUTATIVE = 1 << 2;
        const CONSTANT_LIKE = 1 << 3;
        /// All operands share one type.
        const SAME_TYPE_OPERANDS = 1 << 4;
        /// All operands and results share one type.
        const SAME_OPERANDS_AND_RESULT_TYPE = 1 << 5;
        /// Has a custom SMT-LIB printing via [OpInfo::print_smtlib].
        const SMTLIB_OP = 1 << 6;
        /// Prints as `(<smtlib_name> <operands...>)`.
        const SIMPLE_SMTLIB_OP = 1 << 7;
        /// Accepts any number of trailing operands matching the last
        /// operand descriptor.
        const VARIADIC = 1 << 8;
        /// Bodies may not reference values defined outside the op.
        const ISOLATED_FROM_ABOVE = 1 << 9;
    }
}

/// A type constraint attached to an operand or result descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeConstraint {
    Any,
    Bool,
    AnyBitVec,
    /// A source-level `iN` integer.
    AnyInteger,
    AnyPair,
    AnyArray,
    AnyFunc,
    Memory,
    MemBlock,
    BlockId,
    Pointer,
    State,
    PdlOperation,
    PdlValue,
    PdlType,
    PdlAttribute,
}

impl TypeConstraint {
    pub fn check(&self, ty: &Type) -> bool {
        match self {
            Self::Any => true,
            Self::Bool => matches!(ty, Type::Bool),
            Self::AnyBitVec => matches!(ty, Type::BitVec(_)),
            Self::AnyInteger => matches!(ty, Type::Int(_)),
            Self::AnyPair => matches!(ty, Type::Pair(..)),
            Self::AnyArray => matches!(ty, Type::Array(..)),
            Self::AnyFunc => matches!(ty, Type::Func(..)),
            Self::Memory => matches!(ty, Type::Memory),
            Self::MemBlock => matches!(ty, Type::MemBlock),
            Self::BlockId => matches!(ty, Type::BlockId),
            Self::Pointer => matches!(ty, Type::Pointer),
            Self::State => matches!(ty, Type::State),
            Self::PdlOperation => matches!(ty, Type::PdlOperation),
            Self::PdlValue => matches!(ty, Type::PdlValue),
            Self::PdlType => matches!(ty, Type::PdlType),
            Self::PdlAttribute => matches!(ty, Type::PdlAttribute),
        }
    }
}

impl fmt::Display for TypeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any type",
            Self::Bool => "!smt.bool",
            Self::AnyBitVec => "a bit-vector",
            Self::AnyInteger => "an integer",
            Self::AnyPair => "a pair",
            Self::AnyArray => "an array",
            Self::AnyFunc => "a function",
            Self::Memory => "!mem.memory",
            Self::MemBlock => "!mem.block",
            Self::BlockId => "!mem.bid",
            Self::Pointer => "!mem_effect.ptr",
            Self::State => "!eff.state",
            Self::PdlOperation => "!pdl.operation",
            Self::PdlValue => "!pdl.value",
            Self::PdlType => "!pdl.type",
            Self::PdlAttribute => "!pdl.attribute",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OperandDef {
    pub name: &'static str,
    pub constraint: TypeConstraint,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultDef {
    pub name: &'static str,
    pub constraint: TypeConstraint,
}

/// The kind of value a named attribute must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Any,
    Int,
    String,
    Array,
    Type,
    BitVector,
    Predicate,
    Symbol,
    Bool,
}

impl AttrKind {
    pub fn check(&self, attr: &crate::Attribute) -> bool {
        use crate::Attribute as A;
        match self {
            Self::Any => true,
            Self::Int => matches!(attr, A::Int(_)),
            Self::String => matches!(attr, A::String(_)),
            Self::Array => matches!(attr, A::Array(_)),
            Self::Type => matches!(attr, A::Type(_)),
            Self::BitVector => matches!(attr, A::BitVector(_)),
            Self::Predicate => matches!(attr, A::Predicate(_)),
            Self::Symbol => matches!(attr, A::Symbol(_)),
            Self::Bool => matches!(attr, A::Bool(_)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AttrDef {
    pub name: &'static str,
    pub kind: AttrKind,
    pub required: bool,
}

/// A custom verification hook, run after the declarative checks.
pub type VerifyFn = fn(&Context, Operation) -> Result<(), Report>;

/// A custom SMT-LIB expression printer for ops whose printing is not simply
/// `(<name> <operands...>)`.
pub type PrintSmtFn =
    fn(&Context, Operation, &mut SmtConversionCtx, &mut String) -> Result<(), Report>;

/// The registered definition of an operation: its qualified name, operand,
/// result, and attribute descriptors, trait set, and hook table.
///
/// Definitions are plain statics declared by dialect crates; a registered
/// operation's behaviour is dispatched through the function pointers here
/// rather than through inherent methods on an op type.
#[derive(Debug)]
pub struct OpInfo {
    pub dialect: &'static str,
    pub name: &'static str,
    pub operands: &'static [OperandDef],
    pub results: &'static [ResultDef],
    pub attrs: &'static [AttrDef],
    pub traits: TraitSet,
    /// Mnemonic used by the `SimpleSMTLibOp` printing.
    pub smtlib_name: Option<&'static str>,
    pub print_smtlib: Option<PrintSmtFn>,
    pub verify: Option<VerifyFn>,
}

/// A handle to a registered operation definition.
#[derive(Clone, Copy)]
pub struct OperationName(&'static OpInfo);

impl OperationName {
    pub const fn new(info: &'static OpInfo) -> Self {
        Self(info)
    }

    pub fn dialect(&self) -> &'static str {
        self.0.dialect
    }

    pub fn name(&self) -> &'static str {
        self.0.name
    }

    pub fn info(&self) -> &'static OpInfo {
        self.0
    }

    pub fn has_trait(&self, traits: TraitSet) -> bool {
        self.0.traits.contains(traits)
    }

    /// Compare against a fully qualified `dialect.op` name.
    pub fn is(&self, full_name: &str) -> bool {
        full_name
            .strip_prefix(self.0.dialect)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|opcode| opcode == self.0.name)
    }
}

impl PartialEq for OperationName {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.0, other.0)
            || (self.0.dialect == other.0.dialect && self.0.name == other.0.name)
    }
}
impl Eq for OperationName {}

impl core::hash::Hash for OperationName {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.0.dialect.hash(state);
        self.0.name.hash(state);
    }
}

impl fmt::Debug for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.dialect, self.0.name)
    }
}

/// Per-dialect registration state: the namespace plus the operation
/// definitions registered under it.
#[derive(Debug)]
pub struct DialectInfo {
    namespace: &'static str,
    ops: Vec<OperationName>,
}

impl DialectInfo {
    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn operations(&self) -> &[OperationName] {
        &self.ops
    }

    pub fn register_operation(&mut self, info: &'static OpInfo) {
        assert_eq!(
            info.dialect, self.namespace,
            "operation '{}' registered with the wrong dialect",
            info.name
        );
        self.ops.push(OperationName::new(info));
    }
}

/// Implemented by each dialect to register itself with a [DialectRegistry].
pub trait DialectRegistration {
    /// The namespace prefix of every operation in the dialect.
    const NAMESPACE: &'static str;

    /// Called once per registry to register the dialect's operations.
    fn register_operations(info: &mut DialectInfo);
}

/// The set of registered dialects, initialized once at startup and read-only
/// afterwards. Operation definitions are keyed by qualified name.
#[derive(Debug, Default)]
pub struct DialectRegistry {
    dialects: Vec<DialectInfo>,
    by_name: FxHashMap<SmallStr, OperationName>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_dialect<D: DialectRegistration>(&mut self) {
        if self.dialects.iter().any(|d| d.namespace == D::NAMESPACE) {
            return;
        }
        let mut info = DialectInfo {
            namespace: D::NAMESPACE,
            ops: Vec::new(),
        };
        D::register_operations(&mut info);
        for op in &info.ops {
            let prev = self.by_name.insert(op.to_string().into(), *op);
            assert!(prev.is_none(), "duplicate registration of '{op}'");
        }
        self.dialects.push(info);
    }

    pub fn registered_dialects(&self) -> &[DialectInfo] {
        &self.dialects
    }

    pub fn get(&self, full_name: &str) -> Option<OperationName> {
        self.by_name.get(full_name).copied()
    }

    /// Look up an operation by qualified name, failing with `UnknownOp`.
    pub fn expect(&self, full_name: &str) -> Result<OperationName, Report> {
        self.get(full_name).ok_or_else(|| {
            Report::new(VerificationError::UnknownOp {
                name: full_name.to_string(),
            })
        })
    }
}
