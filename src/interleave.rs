//! The variable-interleaving heuristic.
//!
//! The size of a decision diagram for a relation like `x = y` over two k-bit
//! integers is exponential unless the bits of `x` and `y` alternate in the
//! variable order. This pass over-approximates which integer
//! [arbitraries][crate::dag::Dag::arbitrary] appear together under a
//! relational or arithmetic constraint and forces them into one interleaving
//! group, by folding the DAG into per-subtree variable sets and joining the
//! sets of coupling operations in a union-find.
//!
//! Changing the grouping never changes satisfiability, only diagram size.
use crate::{
    dag::{Dag, Node},
    datatypes::expr::{Expr, Type},
};
use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

/// The discovered arbitraries of an expression and their interleaving
/// groups, consumed by the
/// [BDD solver][crate::solver::bdd::BddSolver::extend_allocation] at
/// variable-allocation time.
#[derive(Debug, Clone, Default)]
pub struct InterleaveLayout {
    order: Vec<Expr>,
    position: HashMap<Expr, usize>,
    parent: HashMap<Expr, Expr>,
}

/// One allocation unit: either a single boolean variable or one interleaved
/// block of same-width integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A boolean arbitrary; booleans never interleave.
    Single(Expr),
    /// All same-width members of one group, allocated bit-interleaved.
    Interleaved {
        /// The shared width in bits. Signedness does not affect layout, so
        /// signed and unsigned arbitraries of one width share a block.
        width: usize,
        /// The members in discovery order.
        members: Vec<Expr>,
    },
}

impl InterleaveLayout {
    /// Every arbitrary reachable by the scan, in discovery order.
    pub fn arbitraries(&self) -> &[Expr] {
        &self.order
    }

    /// The canonical representative of the group an integer arbitrary
    /// belongs to.
    pub fn group_of(&self, arbitrary: Expr) -> Expr {
        self.parent.get(&arbitrary).copied().unwrap_or(arbitrary)
    }

    /// The deterministic allocation plan: blocks in discovery order of
    /// their first member, with one block per group and width.
    pub fn blocks(&self, dag: &Dag) -> Vec<Block> {
        let mut emitted: HashSet<Expr> = HashSet::new();
        let mut plan = Vec::new();
        for &arbitrary in &self.order {
            match dag.expr_type(arbitrary) {
                Type::Bool => plan.push(Block::Single(arbitrary)),
                Type::Int(_) => {
                    let root = self.group_of(arbitrary);
                    if !emitted.insert(root) {
                        continue;
                    }
                    let members: Vec<Expr> = self
                        .order
                        .iter()
                        .copied()
                        .filter(|other| {
                            matches!(dag.expr_type(*other), Type::Int(_))
                                && self.group_of(*other) == root
                        })
                        .collect();
                    let mut widths: Vec<usize> = members
                        .iter()
                        .map(|member| {
                            dag.expr_type(*member)
                                .as_int()
                                .expect("group members are integers")
                                .bits()
                        })
                        .collect();
                    widths.sort_unstable();
                    widths.dedup();
                    for width in widths {
                        let of_width: Vec<Expr> = members
                            .iter()
                            .copied()
                            .filter(|member| {
                                dag.expr_type(*member)
                                    .as_int()
                                    .expect("group members are integers")
                                    .bits()
                                    == width
                            })
                            .collect();
                        plan.push(Block::Interleaved {
                            width,
                            members: of_width,
                        });
                    }
                }
                _ => unreachable!("arbitraries are primitive by construction"),
            }
        }
        plan
    }
}

/// Scans an expression and computes its [InterleaveLayout].
pub fn analyze(dag: &Dag, root: Expr) -> InterleaveLayout {
    let mut scan = Scan {
        dag,
        layout: InterleaveLayout::default(),
        memo: HashMap::new(),
    };
    scan.visit(root);
    scan.compress();
    log::debug!(
        "interleave scan found {} arbitraries",
        scan.layout.order.len()
    );
    scan.layout
}

struct Scan<'a> {
    dag: &'a Dag,
    layout: InterleaveLayout,
    memo: HashMap<Expr, Rc<HashSet<Expr>>>,
}

impl Scan<'_> {
    fn discover(&mut self, arbitrary: Expr) {
        if !self.layout.position.contains_key(&arbitrary) {
            self.layout
                .position
                .insert(arbitrary, self.layout.order.len());
            self.layout.order.push(arbitrary);
        }
    }

    fn find(&mut self, arbitrary: Expr) -> Expr {
        let mut root = arbitrary;
        while let Some(&next) = self.layout.parent.get(&root) {
            if next == root {
                break;
            }
            root = next;
        }
        root
    }

    /// Joins the classes of every variable in both operand sets. The member
    /// discovered first becomes the representative, which keeps the
    /// allocation order stable across runs.
    fn combine(&mut self, left: &HashSet<Expr>, right: &HashSet<Expr>) {
        let mut members = left.union(right).copied();
        let Some(first) = members.next() else {
            return;
        };
        let mut anchor = self.find(first);
        for member in members {
            let root = self.find(member);
            if root == anchor {
                continue;
            }
            let (winner, loser) =
                if self.layout.position[&root] < self.layout.position[&anchor] {
                    (root, anchor)
                } else {
                    (anchor, root)
                };
            self.layout.parent.insert(loser, winner);
            anchor = winner;
        }
    }

    fn compress(&mut self) {
        for arbitrary in self.layout.order.clone() {
            let root = self.find(arbitrary);
            self.layout.parent.insert(arbitrary, root);
        }
    }

    fn union_sets(left: Rc<HashSet<Expr>>, right: Rc<HashSet<Expr>>) -> Rc<HashSet<Expr>> {
        if left.is_empty() {
            return right;
        }
        if right.is_empty() {
            return left;
        }
        Rc::new(left.union(&right).copied().collect())
    }

    fn visit(&mut self, expr: Expr) -> Rc<HashSet<Expr>> {
        if let Some(done) = self.memo.get(&expr) {
            return Rc::clone(done);
        }
        let result = match self.dag.node(expr).clone() {
            Node::Const(_) | Node::Argument { .. } | Node::EmptyList { .. } => {
                Rc::new(HashSet::new())
            }
            Node::Arbitrary { .. } => {
                self.discover(expr);
                match self.dag.expr_type(expr) {
                    Type::Int(_) => Rc::new(HashSet::from([expr])),
                    _ => Rc::new(HashSet::new()),
                }
            }
            Node::Adapter { inner, .. } => self.visit(inner),
            Node::Not(a) | Node::BitNot(a) => self.visit(a),
            // coupling operations: both operand sets join one class
            Node::Eq(a, b)
            | Node::Leq(a, b)
            | Node::Geq(a, b)
            | Node::Sum(a, b)
            | Node::Minus(a, b)
            | Node::Multiply(a, b)
            | Node::Maximum(a, b)
            | Node::Minimum(a, b) => {
                let left = self.visit(a);
                let right = self.visit(b);
                self.combine(&left, &right);
                Self::union_sets(left, right)
            }
            // bit-slice independence: no coupling needed
            Node::And(a, b)
            | Node::Or(a, b)
            | Node::BitAnd(a, b)
            | Node::BitOr(a, b)
            | Node::BitXor(a, b)
            | Node::AddFront { head: a, tail: b } => {
                let left = self.visit(a);
                let right = self.visit(b);
                Self::union_sets(left, right)
            }
            Node::Ite {
                guard,
                then_branch,
                else_branch,
            } => {
                let guard = self.visit(guard);
                let then_branch = self.visit(then_branch);
                let else_branch = self.visit(else_branch);
                Self::union_sets(guard, Self::union_sets(then_branch, else_branch))
            }
            // the cons branch is deliberately ignored; this over-approximates
            // the reachable variables soundly
            Node::ListCase { list, empty, .. } => {
                let list = self.visit(list);
                let empty = self.visit(empty);
                Self::union_sets(list, empty)
            }
            Node::CreateObject { fields, .. } => fields
                .into_iter()
                .map(|field| self.visit(field))
                .fold(Rc::new(HashSet::new()), Self::union_sets),
            Node::GetField { object, .. } => self.visit(object),
            Node::WithField { object, value, .. } => {
                let object = self.visit(object);
                let value = self.visit(value);
                Self::union_sets(object, value)
            }
        };
        self.memo.insert(expr, Rc::clone(&result));
        result
    }
}
