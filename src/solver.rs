//! The abstract solver interface: a boolean and bit-vector term algebra
//! with satisfiability checking.
//!
//! The [symbolic evaluator][crate::symbolic::Evaluator] lowers expressions
//! into this vocabulary without knowing which decision procedure sits
//! behind it. The crate ships the decision-diagram implementation
//! ([BddSolver][crate::solver::bdd::BddSolver]); an SMT backend over a
//! bit-vector theory implements the same trait and plugs into
//! [find_with_solver][crate::check::find_with_solver].
pub mod bdd;

use crate::datatypes::{
    expr::{Expr, IntType},
    Error,
};

/// A decision procedure over booleans and fixed-width bit-vectors.
///
/// Variables are allocated against the identity of the
/// [arbitrary][crate::dag::Dag::arbitrary] node they stand for; allocation
/// must be idempotent per identity, so that re-encountering a shared node
/// yields the same variable.
pub trait Solver {
    /// A boolean term.
    type Bool: Clone;
    /// A bit-vector term; the width is fixed at creation.
    type BitVec: Clone;
    /// An allocated solver variable, used to query models.
    type Variable: Clone;
    /// A satisfying assignment.
    type Model;

    /// The constant true or false term.
    fn constant(&mut self, value: bool) -> Self::Bool;
    /// Conjunction.
    fn and(&mut self, a: &Self::Bool, b: &Self::Bool) -> Self::Bool;
    /// Disjunction.
    fn or(&mut self, a: &Self::Bool, b: &Self::Bool) -> Self::Bool;
    /// Negation.
    fn not(&mut self, a: &Self::Bool) -> Self::Bool;
    /// Equivalence.
    fn iff(&mut self, a: &Self::Bool, b: &Self::Bool) -> Self::Bool;
    /// Conditional on booleans.
    fn ite(&mut self, guard: &Self::Bool, t: &Self::Bool, e: &Self::Bool) -> Self::Bool;

    /// Allocates (or retrieves) the boolean variable of an arbitrary node.
    fn fresh_bool(&mut self, id: Expr) -> (Self::Variable, Self::Bool);
    /// Allocates (or retrieves) the bit-vector variable of an arbitrary
    /// node of the given width.
    fn fresh_int(&mut self, id: Expr, ty: IntType) -> (Self::Variable, Self::BitVec);
    /// A bit-vector constant of the given width.
    fn int_constant(&mut self, ty: IntType, bits: u64) -> Self::BitVec;

    /// Bitwise conjunction.
    fn bitand(&mut self, a: &Self::BitVec, b: &Self::BitVec) -> Self::BitVec;
    /// Bitwise disjunction.
    fn bitor(&mut self, a: &Self::BitVec, b: &Self::BitVec) -> Self::BitVec;
    /// Bitwise exclusive disjunction.
    fn bitxor(&mut self, a: &Self::BitVec, b: &Self::BitVec) -> Self::BitVec;
    /// Bitwise complement.
    fn bitnot(&mut self, a: &Self::BitVec) -> Self::BitVec;
    /// Wrapping addition.
    fn add(&mut self, a: &Self::BitVec, b: &Self::BitVec) -> Self::BitVec;
    /// Wrapping subtraction.
    fn sub(&mut self, a: &Self::BitVec, b: &Self::BitVec) -> Self::BitVec;
    /// Wrapping multiplication. Backends without it fail with
    /// [Error::UnsupportedByBackend].
    fn mul(&mut self, a: &Self::BitVec, b: &Self::BitVec) -> Result<Self::BitVec, Error>;

    /// Bit-vector equality.
    fn eq(&mut self, a: &Self::BitVec, b: &Self::BitVec) -> Self::Bool;
    /// Less-or-equal; **signed** selects the two's-complement order.
    fn leq(&mut self, a: &Self::BitVec, b: &Self::BitVec, signed: bool) -> Self::Bool;
    /// Greater-or-equal; **signed** selects the two's-complement order.
    fn geq(&mut self, a: &Self::BitVec, b: &Self::BitVec, signed: bool) -> Self::Bool {
        self.leq(b, a, signed)
    }
    /// Conditional on bit-vectors.
    fn ite_bits(&mut self, guard: &Self::Bool, t: &Self::BitVec, e: &Self::BitVec)
        -> Self::BitVec;

    /// Any model of the constraint, or [None] if it is unsatisfiable.
    fn satisfiable(&mut self, constraint: &Self::Bool) -> Option<Self::Model>;
    /// The signed representative of a variable in a model: the variable's
    /// bits sign-extended to an [i64]. Consumers bit-cast unsigned widths
    /// back via [Value::from_signed_bits][crate::datatypes::expr::Value::from_signed_bits].
    fn model_value(&self, model: &Self::Model, variable: &Self::Variable) -> i64;
}
