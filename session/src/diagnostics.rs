//! Diagnostics and the error taxonomy shared by every pass.
//!
//! All fallible IR and pass APIs return [`Report`]. The concrete error types
//! below are downcastable from a report, which is how the driver maps a
//! failure to its exit code.

use miette::Diagnostic;
use thiserror::Error;

pub use miette::{IntoDiagnostic, Report, Result, Severity, WrapErr};

/// A structural or type error found while verifying the IR.
#[derive(Debug, Error, Diagnostic)]
pub enum VerificationError {
    #[error("type mismatch in '{op}': {detail}")]
    TypeMismatch { op: String, detail: String },

    #[error("'{op}' is missing required attribute '{name}'")]
    MissingAttribute { op: String, name: String },

    #[error("'{op}' expected {expected} {kind}, found {found}")]
    ArityMismatch {
        op: String,
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("value out of range: {detail}")]
    OutOfRange { detail: String },

    #[error("'{op}' refers to an erased value in operand #{index}")]
    DanglingUse { op: String, index: usize },

    #[error("unknown operation '{name}'")]
    UnknownOp { name: String },
}

/// An error raised while applying rewrite patterns.
#[derive(Debug, Error, Diagnostic)]
pub enum RewriteError {
    #[error("cannot erase '{op}': its results still have uses")]
    HasUses { op: String },

    #[error("pattern '{pattern}' failed: {reason}")]
    PatternFailed { pattern: String, reason: String },
}

/// A lowering that is a known gap rather than a bug.
#[derive(Debug, Error, Diagnostic)]
#[error("not implemented: {0}")]
pub struct NotImplemented(pub String);

/// A construct the pass consciously rejects.
#[derive(Debug, Error, Diagnostic)]
#[error("unsupported: {0}")]
pub struct Unsupported(pub String);

impl NotImplemented {
    pub fn new(what: impl Into<String>) -> Report {
        Report::new(Self(what.into()))
    }
}

impl Unsupported {
    pub fn new(what: impl Into<String>) -> Report {
        Report::new(Self(what.into()))
    }
}
