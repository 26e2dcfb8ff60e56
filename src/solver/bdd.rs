//! The decision-diagram implementation of the [Solver] interface.
//!
//! Boolean terms are diagrams of the [manager][crate::obdd::Bdd]; bit-vector
//! terms are one diagram per bit, least significant first. Arithmetic is
//! ripple-carry over the bit diagrams; comparisons fold from the least to
//! the most significant bit, with the sign bit flipping the order for
//! signed widths. Multiplication is not expressible with acceptable
//! diagram sizes and is rejected at solve time.
//!
//! Variable allocation happens in blocks described by an
//! [InterleaveLayout]; arbitraries that were not part of any scanned layout
//! are allocated on demand, one contiguous block each.
use crate::{
    dag::Dag,
    datatypes::{
        expr::{Expr, IntType},
        Error, Term, Var,
    },
    interleave::{Block, InterleaveLayout},
    obdd::Bdd,
    solver::Solver,
};
use std::collections::HashMap;

/// A bit-vector term: one diagram per bit, least significant first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bits(pub(crate) Vec<Term>);

impl Bits {
    /// The width in bits.
    pub fn width(&self) -> usize {
        self.0.len()
    }
}

/// The manager variables allocated for one arbitrary node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// A boolean arbitrary owns a single variable.
    Bool(Var),
    /// An integer arbitrary owns one variable per bit, least significant
    /// first.
    Bits(Vec<Var>),
}

/// A satisfying assignment of the diagram backend. Variables absent from
/// the map were unconstrained on the witness path and read as false.
#[derive(Debug, Clone)]
pub struct BddModel {
    assignment: HashMap<Var, bool>,
}

impl BddModel {
    pub(crate) fn from_path(path: &[(Var, bool)]) -> Self {
        Self {
            assignment: path.iter().copied().collect(),
        }
    }
}

/// The solver backend over the in-crate diagram manager.
#[derive(Debug, Default)]
pub struct BddSolver {
    pub(crate) bdd: Bdd,
    allocations: HashMap<Expr, Allocation>,
    next_var: usize,
}

impl BddSolver {
    /// A solver without any pre-allocated variables; every arbitrary is
    /// allocated on demand.
    pub fn new() -> Self {
        Self::default()
    }

    /// A solver with all variables of the layout allocated up front,
    /// block-interleaved.
    pub fn with_layout(dag: &Dag, layout: &InterleaveLayout) -> Self {
        let mut solver = Self::new();
        solver.extend_allocation(dag, layout);
        solver
    }

    /// Allocates the not-yet-allocated arbitraries of the layout. Within
    /// one block, allocation round-robins over the members per bit, which
    /// realises the interleaved variable order; the block order itself is
    /// the layout's deterministic discovery order.
    pub fn extend_allocation(&mut self, dag: &Dag, layout: &InterleaveLayout) {
        for block in layout.blocks(dag) {
            match block {
                Block::Single(member) => {
                    if !self.allocations.contains_key(&member) {
                        let var = self.alloc_var();
                        log::trace!("allocated {} for boolean {}", var, member);
                        self.allocations.insert(member, Allocation::Bool(var));
                    }
                }
                Block::Interleaved { width, members } => {
                    let fresh: Vec<Expr> = members
                        .into_iter()
                        .filter(|member| !self.allocations.contains_key(member))
                        .collect();
                    if fresh.is_empty() {
                        continue;
                    }
                    let mut bits: Vec<Vec<Var>> = vec![Vec::with_capacity(width); fresh.len()];
                    for _bit in 0..width {
                        for slot in bits.iter_mut() {
                            slot.push(self.alloc_var());
                        }
                    }
                    for (member, vars) in fresh.into_iter().zip(bits) {
                        log::trace!("allocated {:?} for integer {}", vars, member);
                        self.allocations.insert(member, Allocation::Bits(vars));
                    }
                }
            }
        }
    }

    /// The allocation of an arbitrary, if any exists yet.
    pub fn allocation(&self, arbitrary: Expr) -> Option<&Allocation> {
        self.allocations.get(&arbitrary)
    }

    fn alloc_var(&mut self) -> Var {
        let var = Var(self.next_var);
        self.next_var += 1;
        var
    }

    /// Like [satisfiable][Solver::satisfiable], but along a randomly chosen
    /// witness path. Callers must not rely on any distribution.
    pub fn random_model(&self, constraint: Term, rng: &mut impl rand::Rng) -> Option<BddModel> {
        let path = self.bdd.random_witness(constraint, rng)?;
        Some(BddModel {
            assignment: path.into_iter().collect(),
        })
    }

    /// Shared ripple-carry kernel of [add][Solver::add] and
    /// [sub][Solver::sub].
    fn ripple(&mut self, a: &Bits, b: &Bits, mut carry: Term) -> Bits {
        debug_assert_eq!(a.width(), b.width(), "operand widths agree by construction");
        let mut out = Vec::with_capacity(a.width());
        for (&x, &y) in a.0.iter().zip(b.0.iter()) {
            let half = self.bdd.xor(x, y);
            out.push(self.bdd.xor(half, carry));
            let generate = self.bdd.and(x, y);
            let propagate = self.bdd.and(half, carry);
            carry = self.bdd.or(generate, propagate);
        }
        Bits(out)
    }
}

impl Solver for BddSolver {
    type Bool = Term;
    type BitVec = Bits;
    type Variable = Allocation;
    type Model = BddModel;

    fn constant(&mut self, value: bool) -> Term {
        Bdd::constant(value)
    }

    fn and(&mut self, a: &Term, b: &Term) -> Term {
        self.bdd.and(*a, *b)
    }

    fn or(&mut self, a: &Term, b: &Term) -> Term {
        self.bdd.or(*a, *b)
    }

    fn not(&mut self, a: &Term) -> Term {
        self.bdd.not(*a)
    }

    fn iff(&mut self, a: &Term, b: &Term) -> Term {
        self.bdd.iff(*a, *b)
    }

    fn ite(&mut self, guard: &Term, t: &Term, e: &Term) -> Term {
        self.bdd.if_then_else(*guard, *t, *e)
    }

    fn fresh_bool(&mut self, id: Expr) -> (Allocation, Term) {
        let allocation = match self.allocations.get(&id) {
            Some(existing) => existing.clone(),
            None => {
                let var = self.alloc_var();
                let allocation = Allocation::Bool(var);
                self.allocations.insert(id, allocation.clone());
                allocation
            }
        };
        match &allocation {
            Allocation::Bool(var) => {
                let term = self.bdd.variable(*var);
                (allocation, term)
            }
            Allocation::Bits(_) => {
                unreachable!("an arbitrary keeps its shape across allocations")
            }
        }
    }

    fn fresh_int(&mut self, id: Expr, ty: IntType) -> (Allocation, Bits) {
        let allocation = match self.allocations.get(&id) {
            Some(existing) => existing.clone(),
            None => {
                let vars: Vec<Var> = (0..ty.bits()).map(|_| self.alloc_var()).collect();
                let allocation = Allocation::Bits(vars);
                self.allocations.insert(id, allocation.clone());
                allocation
            }
        };
        match &allocation {
            Allocation::Bits(vars) => {
                debug_assert_eq!(vars.len(), ty.bits());
                let terms = vars.iter().map(|var| self.bdd.variable(*var)).collect();
                (allocation, Bits(terms))
            }
            Allocation::Bool(_) => {
                unreachable!("an arbitrary keeps its shape across allocations")
            }
        }
    }

    fn int_constant(&mut self, ty: IntType, bits: u64) -> Bits {
        Bits(
            (0..ty.bits())
                .map(|bit| Bdd::constant(bits & (1u64 << bit) != 0))
                .collect(),
        )
    }

    fn bitand(&mut self, a: &Bits, b: &Bits) -> Bits {
        Bits(
            a.0.iter()
                .zip(b.0.iter())
                .map(|(&x, &y)| self.bdd.and(x, y))
                .collect(),
        )
    }

    fn bitor(&mut self, a: &Bits, b: &Bits) -> Bits {
        Bits(
            a.0.iter()
                .zip(b.0.iter())
                .map(|(&x, &y)| self.bdd.or(x, y))
                .collect(),
        )
    }

    fn bitxor(&mut self, a: &Bits, b: &Bits) -> Bits {
        Bits(
            a.0.iter()
                .zip(b.0.iter())
                .map(|(&x, &y)| self.bdd.xor(x, y))
                .collect(),
        )
    }

    fn bitnot(&mut self, a: &Bits) -> Bits {
        Bits(a.0.iter().map(|&x| self.bdd.not(x)).collect())
    }

    fn add(&mut self, a: &Bits, b: &Bits) -> Bits {
        self.ripple(a, b, Term::BOT)
    }

    fn sub(&mut self, a: &Bits, b: &Bits) -> Bits {
        let negated = self.bitnot(b);
        self.ripple(a, &negated, Term::TOP)
    }

    fn mul(&mut self, _a: &Bits, _b: &Bits) -> Result<Bits, Error> {
        Err(Error::unsupported(
            "multiplication over the decision-diagram backend",
        ))
    }

    fn eq(&mut self, a: &Bits, b: &Bits) -> Term {
        let mut result = Term::TOP;
        for (&x, &y) in a.0.iter().zip(b.0.iter()) {
            let same = self.bdd.iff(x, y);
            result = self.bdd.and(result, same);
        }
        result
    }

    fn leq(&mut self, a: &Bits, b: &Bits, signed: bool) -> Term {
        // fold from the least significant bit up: every more significant
        // bit overrides the verdict of the bits below it
        let mut result = Term::TOP;
        let top = a.width() - 1;
        for (bit, (&x, &y)) in a.0.iter().zip(b.0.iter()).enumerate() {
            let not_x = self.bdd.not(x);
            let not_y = self.bdd.not(y);
            let less_here = if signed && bit == top {
                // a negative sign bit orders below a positive one
                self.bdd.and(x, not_y)
            } else {
                self.bdd.and(not_x, y)
            };
            let same_here = self.bdd.iff(x, y);
            result = self.bdd.if_then_else(same_here, result, less_here);
        }
        result
    }

    fn ite_bits(&mut self, guard: &Term, t: &Bits, e: &Bits) -> Bits {
        Bits(
            t.0.iter()
                .zip(e.0.iter())
                .map(|(&x, &y)| self.bdd.if_then_else(*guard, x, y))
                .collect(),
        )
    }

    fn satisfiable(&mut self, constraint: &Term) -> Option<BddModel> {
        let path = self.bdd.sat_witness(*constraint)?;
        log::debug!("witness path over {} variables", path.len());
        Some(BddModel {
            assignment: path.into_iter().collect(),
        })
    }

    fn model_value(&self, model: &BddModel, variable: &Allocation) -> i64 {
        match variable {
            Allocation::Bool(var) => {
                i64::from(model.assignment.get(var).copied().unwrap_or(false))
            }
            Allocation::Bits(vars) => {
                let mut bits = 0u64;
                for (position, var) in vars.iter().enumerate() {
                    if model.assignment.get(var).copied().unwrap_or(false) {
                        bits |= 1u64 << position;
                    }
                }
                let shift = 64 - vars.len();
                ((bits << shift) as i64) >> shift
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn fresh_u8(solver: &mut BddSolver, serial: usize) -> (Allocation, Bits) {
        solver.fresh_int(Expr(serial), IntType::U8)
    }

    #[test]
    fn addition_has_the_right_models() {
        let mut solver = BddSolver::new();
        let (var, x) = fresh_u8(&mut solver, 0);
        let four = solver.int_constant(IntType::U8, 4);
        let ten = solver.int_constant(IntType::U8, 10);
        let sum = solver.add(&x, &four);
        let goal = solver.eq(&sum, &ten);

        let model = solver.satisfiable(&goal).expect("6 + 4 = 10");
        assert_eq!(solver.model_value(&model, &var), 6);
    }

    #[test]
    fn subtraction_wraps() {
        let mut solver = BddSolver::new();
        let (var, x) = fresh_u8(&mut solver, 0);
        let one = solver.int_constant(IntType::U8, 1);
        let want = solver.int_constant(IntType::U8, 0xff);
        let diff = solver.sub(&x, &one);
        let goal = solver.eq(&diff, &want);

        let model = solver.satisfiable(&goal).expect("0 - 1 wraps to 0xff");
        assert_eq!(solver.model_value(&model, &var), 0);
    }

    #[test]
    fn unsigned_versus_signed_order() {
        let mut solver = BddSolver::new();
        let (_, x) = fresh_u8(&mut solver, 0);
        let eighty = solver.int_constant(IntType::U8, 0x80);
        // unsigned: 0x80 <= x is satisfiable with x = 0x80
        let unsigned = solver.leq(&eighty, &x, false);
        assert!(solver.satisfiable(&unsigned).is_some());
        // signed: 0x80 is the minimum, so 0x80 <= x is a tautology
        let signed = solver.leq(&eighty, &x, true);
        assert_eq!(signed, Term::TOP);
        // signed: x <= 0x80 forces the minimum
        let forced = solver.leq(&x, &eighty, true);
        let model = solver.satisfiable(&forced).expect("the minimum exists");
        let (var, _) = fresh_u8(&mut solver, 0);
        assert_eq!(solver.model_value(&model, &var), -128);
    }

    #[test]
    fn multiplication_is_rejected() {
        let mut solver = BddSolver::new();
        let (_, x) = fresh_u8(&mut solver, 0);
        let (_, y) = fresh_u8(&mut solver, 1);
        assert!(matches!(
            solver.mul(&x, &y),
            Err(Error::UnsupportedByBackend(_))
        ));
    }

    #[test]
    fn unconstrained_variables_read_as_zero() {
        let mut solver = BddSolver::new();
        let tautology = solver.constant(true);
        let model = solver.satisfiable(&tautology).expect("⊤ is satisfiable");
        let (var, _) = fresh_u8(&mut solver, 0);
        assert_eq!(solver.model_value(&model, &var), 0);
    }

    #[test]
    fn allocation_is_idempotent() {
        let mut solver = BddSolver::new();
        let (first, _) = solver.fresh_int(Expr(7), IntType::U16);
        let (second, _) = solver.fresh_int(Expr(7), IntType::U16);
        assert_eq!(first, second);
        let (flag_a, _) = solver.fresh_bool(Expr(9));
        let (flag_b, _) = solver.fresh_bool(Expr(9));
        assert_eq!(flag_a, flag_b);
    }

    #[test]
    fn layout_blocks_interleave() {
        use crate::datatypes::expr::Type;
        use crate::interleave;

        let mut dag = Dag::new();
        let a = dag.arbitrary(&Type::Int(IntType::U8)).unwrap();
        let b = dag.arbitrary(&Type::Int(IntType::U8)).unwrap();
        let related = dag.eq(a, b).unwrap();
        let layout = interleave::analyze(&dag, related);
        let solver = BddSolver::with_layout(&dag, &layout);

        let (left, right) = match (solver.allocation(a), solver.allocation(b)) {
            (Some(Allocation::Bits(left)), Some(Allocation::Bits(right))) => (left, right),
            other => panic!("both integers must be allocated, got {:?}", other),
        };
        // bit i of a sits directly next to bit i of b
        for (bit, (x, y)) in left.iter().zip(right.iter()).enumerate() {
            assert_eq!(x.value(), 2 * bit);
            assert_eq!(y.value(), 2 * bit + 1);
        }
    }
}
