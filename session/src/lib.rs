pub mod diagnostics;

pub use self::diagnostics::Report;

/// Which lowering pipeline a session runs.
///
/// `Full` is the default pipeline: integer arithmetic is lowered under the
/// poison type lowerer. `CombOnly` corresponds to the `--circt` flag and
/// handles only the `comb` and `func` dialects, under the plain integer
/// type lowerer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    #[default]
    Full,
    CombOnly,
}

/// Session-wide options shared by the driver entry points.
#[derive(Debug, Default, Clone)]
pub struct Options {
    pub pipeline: Pipeline,
    /// Run the pair-lowering and cleanup passes on the final module.
    pub optimize: bool,
    /// Verify the module after every pass.
    pub verify_each: bool,
}

/// Process exit codes reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// Parse or verification failure.
    Failure = 1,
    /// The input used a construct the pipelines do not support.
    Unsupported = 2,
}

impl ExitCode {
    /// Classify an error report into the exit code contract.
    pub fn from_report(report: &Report) -> Self {
        use crate::diagnostics::{NotImplemented, Unsupported};
        if report.downcast_ref::<Unsupported>().is_some()
            || report.downcast_ref::<NotImplemented>().is_some()
        {
            Self::Unsupported
        } else {
            Self::Failure
        }
    }
}
