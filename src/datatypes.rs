//! Collection of all crate-wide datatypes.
//!
//! The identifier newtypes of the [diagram manager][crate::obdd::Bdd] are
//! re-exported at this level; the expression-layer types live in the
//! [expr] submodule.
pub mod expr;

mod bdd;
pub use bdd::Term;
pub use bdd::Var;
pub(crate) use bdd::BddNode;

/// The error kinds surfaced by the library.
///
/// An unsatisfiable query is not an error: the satisfiability path reports
/// `Ok(None)`. Construction errors are raised at factory time, backend
/// errors at solve time; the library never retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A factory was called with mismatched operand types, a missing record
    /// field, or an out-of-range arity.
    #[error("invalid construction: {0}")]
    InvalidConstruction(String),
    /// The selected backend cannot perform the requested operation, e.g.
    /// multiplication over decision diagrams.
    #[error("unsupported by backend: {0}")]
    UnsupportedByBackend(String),
    /// Symbolic values of different shapes were merged. This indicates a bug
    /// in the evaluation pipeline, not a user error.
    #[error("symbolic type mismatch: {0}")]
    TypeMismatch(String),
    /// A free [argument][crate::dag::Dag::argument] was reached during
    /// evaluation; user expressions must bind every argument.
    #[error("unreachable expression: {0}")]
    Unreachable(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidConstruction(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedByBackend(msg.into())
    }

    pub(crate) fn mismatch(msg: impl Into<String>) -> Self {
        Error::TypeMismatch(msg.into())
    }

    pub(crate) fn unbound(msg: impl Into<String>) -> Self {
        Error::Unreachable(msg.into())
    }
}
