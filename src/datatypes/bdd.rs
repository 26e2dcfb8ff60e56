//! Datatypes of the diagram manager.
//! This module consists of the identifier newtypes [Term] and [Var] and the
//! node representation [BddNode] used by the [manager][crate::obdd::Bdd].
use serde::{Deserialize, Serialize};
use std::{fmt::Display, ops::Deref};

/// Representation of a decision diagram.
/// Each [Term] is represented as a number ([usize]) and identifies the root
/// node of a diagram inside the [manager][crate::obdd::Bdd].
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Copy, Clone, Serialize, Deserialize)]
pub struct Term(pub usize);

impl Deref for Term {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<usize> for Term {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Term({})", self.0)
    }
}

impl Term {
    /// Represents the contradiction, i.e. the empty diagram.
    pub const BOT: Term = Term(0);
    /// Represents the tautology, i.e. the full diagram.
    pub const TOP: Term = Term(1);

    /// Get the value of the Term, i.e. the corresponding [usize].
    pub fn value(self) -> usize {
        self.0
    }

    /// Checks if the [Term] represents a truth value ([Term::TOP] or
    /// [Term::BOT]) instead of a compound diagram.
    pub fn is_truth_value(&self) -> bool {
        self.0 <= Term::TOP.0
    }

    /// Returns true if the Term is [Term::TOP].
    pub fn is_true(&self) -> bool {
        *self == Self::TOP
    }

    /// Returns true if the Term is [Term::BOT].
    pub fn is_false(&self) -> bool {
        *self == Self::BOT
    }
}

/// Representation of a boolean decision variable.
/// The manager only works with [usize] values; the order of these values
/// defines the variable order of every diagram, which is why the
/// [interleaving][crate::interleave] pass chooses the values deliberately.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Var(pub usize);

impl Deref for Var {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<usize> for Var {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Var({})", self.0)
    }
}

impl Var {
    /// Sentinel variable of the top node.
    pub const TOP: Var = Var(usize::MAX);
    /// Sentinel variable of the bot node.
    pub const BOT: Var = Var(usize::MAX - 1);

    /// Returns the value of the [Var] as [usize].
    pub fn value(self) -> usize {
        self.0
    }

    /// Returns true if the variable is one of the terminal sentinels.
    pub fn is_constant(&self) -> bool {
        self.value() >= Var::BOT.value()
    }
}

/// One node of a reduced ordered decision diagram.
///
/// Nodes are shared: the manager never stores two nodes with the same
/// `(var, lo, hi)` triple.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct BddNode {
    var: Var,
    lo: Term,
    hi: Term,
}

impl Display for BddNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BddNode: {}, lo: {}, hi: {}", self.var, self.lo, self.hi)
    }
}

impl BddNode {
    /// Creates a new node.
    pub fn new(var: Var, lo: Term, hi: Term) -> Self {
        Self { var, lo, hi }
    }

    /// Returns the decision variable.
    pub fn var(self) -> Var {
        self.var
    }

    /// Returns the `lo`-branch.
    pub fn lo(self) -> Term {
        self.lo
    }

    /// Returns the `hi`-branch.
    pub fn hi(self) -> Term {
        self.hi
    }

    /// The unique node representing `⊥`.
    pub fn bot_node() -> Self {
        Self {
            var: Var::BOT,
            lo: Term::BOT,
            hi: Term::BOT,
        }
    }

    /// The unique node representing `⊤`.
    pub fn top_node() -> Self {
        Self {
            var: Var::TOP,
            lo: Term::TOP,
            hi: Term::TOP,
        }
    }
}
