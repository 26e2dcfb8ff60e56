//! A naive enumerative implementation of the solver interface.
//!
//! It represents terms as explicit syntax and decides satisfiability by
//! trying every assignment of the variables the constraint mentions, the
//! way a bit-blasting backend would decide it semantically. It exists to
//! exercise the solver seam the way an external SMT backend would, and it
//! supports multiplication, which the diagram backend rejects.
//!
//! The assignment space is exponential in the variable bits; keep
//! constraints below the hard cap.
use std::{collections::BTreeSet, collections::HashMap, rc::Rc};
use zen_bdd::{
    datatypes::{
        expr::{Expr, IntType},
        Error,
    },
    solver::Solver,
};

const MAX_ENUMERATED_BITS: u32 = 24;

#[derive(Debug)]
enum BoolNode {
    Const(bool),
    Var(usize),
    Not(BoolTerm),
    And(BoolTerm, BoolTerm),
    Or(BoolTerm, BoolTerm),
    Iff(BoolTerm, BoolTerm),
    Ite(BoolTerm, BoolTerm, BoolTerm),
    Eq(IntTerm, IntTerm),
    Leq(IntTerm, IntTerm, bool),
}

#[derive(Debug)]
enum IntNode {
    Const(u64),
    Var(usize),
    BitNot(IntTerm),
    BitAnd(IntTerm, IntTerm),
    BitOr(IntTerm, IntTerm),
    BitXor(IntTerm, IntTerm),
    Add(IntTerm, IntTerm),
    Sub(IntTerm, IntTerm),
    Mul(IntTerm, IntTerm),
    Ite(BoolTerm, IntTerm, IntTerm),
}

/// A boolean term of the enumerative solver.
#[derive(Debug, Clone)]
pub struct BoolTerm(Rc<BoolNode>);

/// A bit-vector term of the enumerative solver.
#[derive(Debug, Clone)]
pub struct IntTerm {
    ty: IntType,
    node: Rc<IntNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarKind {
    Bool,
    Int(IntType),
}

/// The solver state: the allocated variables and their kinds.
#[derive(Debug, Default)]
pub struct EnumSolver {
    kinds: Vec<VarKind>,
    by_id: HashMap<Expr, usize>,
}

/// An assignment found by enumeration.
#[derive(Debug, Clone)]
pub struct EnumModel {
    values: HashMap<usize, u64>,
}

impl EnumSolver {
    /// A solver with no variables yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn var(&mut self, id: Expr, kind: VarKind) -> usize {
        if let Some(existing) = self.by_id.get(&id) {
            assert_eq!(self.kinds[*existing], kind, "an arbitrary keeps its kind");
            return *existing;
        }
        let index = self.kinds.len();
        self.kinds.push(kind);
        self.by_id.insert(id, index);
        index
    }

    fn eval_bool(&self, term: &BoolTerm, model: &EnumModel) -> bool {
        match term.0.as_ref() {
            BoolNode::Const(value) => *value,
            BoolNode::Var(index) => model.values.get(index).copied().unwrap_or(0) != 0,
            BoolNode::Not(a) => !self.eval_bool(a, model),
            BoolNode::And(a, b) => self.eval_bool(a, model) && self.eval_bool(b, model),
            BoolNode::Or(a, b) => self.eval_bool(a, model) || self.eval_bool(b, model),
            BoolNode::Iff(a, b) => self.eval_bool(a, model) == self.eval_bool(b, model),
            BoolNode::Ite(guard, t, e) => {
                if self.eval_bool(guard, model) {
                    self.eval_bool(t, model)
                } else {
                    self.eval_bool(e, model)
                }
            }
            BoolNode::Eq(a, b) => self.eval_int(a, model) == self.eval_int(b, model),
            BoolNode::Leq(a, b, signed) => {
                let lhs = self.eval_int(a, model);
                let rhs = self.eval_int(b, model);
                if *signed {
                    sign_extend(a.ty, lhs) <= sign_extend(b.ty, rhs)
                } else {
                    lhs <= rhs
                }
            }
        }
    }

    fn eval_int(&self, term: &IntTerm, model: &EnumModel) -> u64 {
        let raw = match term.node.as_ref() {
            IntNode::Const(value) => *value,
            IntNode::Var(index) => model.values.get(index).copied().unwrap_or(0),
            IntNode::BitNot(a) => !self.eval_int(a, model),
            IntNode::BitAnd(a, b) => self.eval_int(a, model) & self.eval_int(b, model),
            IntNode::BitOr(a, b) => self.eval_int(a, model) | self.eval_int(b, model),
            IntNode::BitXor(a, b) => self.eval_int(a, model) ^ self.eval_int(b, model),
            IntNode::Add(a, b) => self.eval_int(a, model).wrapping_add(self.eval_int(b, model)),
            IntNode::Sub(a, b) => self.eval_int(a, model).wrapping_sub(self.eval_int(b, model)),
            IntNode::Mul(a, b) => self.eval_int(a, model).wrapping_mul(self.eval_int(b, model)),
            IntNode::Ite(guard, t, e) => {
                if self.eval_bool(guard, model) {
                    self.eval_int(t, model)
                } else {
                    self.eval_int(e, model)
                }
            }
        };
        raw & term.ty.mask()
    }

    fn used_vars_bool(&self, term: &BoolTerm, used: &mut BTreeSet<usize>) {
        match term.0.as_ref() {
            BoolNode::Const(_) => {}
            BoolNode::Var(index) => {
                used.insert(*index);
            }
            BoolNode::Not(a) => self.used_vars_bool(a, used),
            BoolNode::And(a, b) | BoolNode::Or(a, b) | BoolNode::Iff(a, b) => {
                self.used_vars_bool(a, used);
                self.used_vars_bool(b, used);
            }
            BoolNode::Ite(guard, t, e) => {
                self.used_vars_bool(guard, used);
                self.used_vars_bool(t, used);
                self.used_vars_bool(e, used);
            }
            BoolNode::Eq(a, b) | BoolNode::Leq(a, b, _) => {
                self.used_vars_int(a, used);
                self.used_vars_int(b, used);
            }
        }
    }

    fn used_vars_int(&self, term: &IntTerm, used: &mut BTreeSet<usize>) {
        match term.node.as_ref() {
            IntNode::Const(_) => {}
            IntNode::Var(index) => {
                used.insert(*index);
            }
            IntNode::BitNot(a) => self.used_vars_int(a, used),
            IntNode::BitAnd(a, b)
            | IntNode::BitOr(a, b)
            | IntNode::BitXor(a, b)
            | IntNode::Add(a, b)
            | IntNode::Sub(a, b)
            | IntNode::Mul(a, b) => {
                self.used_vars_int(a, used);
                self.used_vars_int(b, used);
            }
            IntNode::Ite(guard, t, e) => {
                self.used_vars_bool(guard, used);
                self.used_vars_int(t, used);
                self.used_vars_int(e, used);
            }
        }
    }

    fn search(
        &self,
        constraint: &BoolTerm,
        vars: &[usize],
        position: usize,
        model: &mut EnumModel,
    ) -> bool {
        if position == vars.len() {
            return self.eval_bool(constraint, model);
        }
        let index = vars[position];
        let bits = match self.kinds[index] {
            VarKind::Bool => 1,
            VarKind::Int(ty) => ty.bits(),
        };
        let limit = 1u128 << bits;
        let mut candidate = 0u128;
        while candidate < limit {
            model.values.insert(index, candidate as u64);
            if self.search(constraint, vars, position + 1, model) {
                return true;
            }
            candidate += 1;
        }
        model.values.remove(&index);
        false
    }
}

fn sign_extend(ty: IntType, bits: u64) -> i64 {
    let shift = 64 - ty.bits();
    (((bits & ty.mask()) << shift) as i64) >> shift
}

impl Solver for EnumSolver {
    type Bool = BoolTerm;
    type BitVec = IntTerm;
    type Variable = usize;
    type Model = EnumModel;

    fn constant(&mut self, value: bool) -> BoolTerm {
        BoolTerm(Rc::new(BoolNode::Const(value)))
    }

    fn and(&mut self, a: &BoolTerm, b: &BoolTerm) -> BoolTerm {
        BoolTerm(Rc::new(BoolNode::And(a.clone(), b.clone())))
    }

    fn or(&mut self, a: &BoolTerm, b: &BoolTerm) -> BoolTerm {
        BoolTerm(Rc::new(BoolNode::Or(a.clone(), b.clone())))
    }

    fn not(&mut self, a: &BoolTerm) -> BoolTerm {
        BoolTerm(Rc::new(BoolNode::Not(a.clone())))
    }

    fn iff(&mut self, a: &BoolTerm, b: &BoolTerm) -> BoolTerm {
        BoolTerm(Rc::new(BoolNode::Iff(a.clone(), b.clone())))
    }

    fn ite(&mut self, guard: &BoolTerm, t: &BoolTerm, e: &BoolTerm) -> BoolTerm {
        BoolTerm(Rc::new(BoolNode::Ite(guard.clone(), t.clone(), e.clone())))
    }

    fn fresh_bool(&mut self, id: Expr) -> (usize, BoolTerm) {
        let index = self.var(id, VarKind::Bool);
        (index, BoolTerm(Rc::new(BoolNode::Var(index))))
    }

    fn fresh_int(&mut self, id: Expr, ty: IntType) -> (usize, IntTerm) {
        let index = self.var(id, VarKind::Int(ty));
        (
            index,
            IntTerm {
                ty,
                node: Rc::new(IntNode::Var(index)),
            },
        )
    }

    fn int_constant(&mut self, ty: IntType, bits: u64) -> IntTerm {
        IntTerm {
            ty,
            node: Rc::new(IntNode::Const(bits & ty.mask())),
        }
    }

    fn bitand(&mut self, a: &IntTerm, b: &IntTerm) -> IntTerm {
        IntTerm {
            ty: a.ty,
            node: Rc::new(IntNode::BitAnd(a.clone(), b.clone())),
        }
    }

    fn bitor(&mut self, a: &IntTerm, b: &IntTerm) -> IntTerm {
        IntTerm {
            ty: a.ty,
            node: Rc::new(IntNode::BitOr(a.clone(), b.clone())),
        }
    }

    fn bitxor(&mut self, a: &IntTerm, b: &IntTerm) -> IntTerm {
        IntTerm {
            ty: a.ty,
            node: Rc::new(IntNode::BitXor(a.clone(), b.clone())),
        }
    }

    fn bitnot(&mut self, a: &IntTerm) -> IntTerm {
        IntTerm {
            ty: a.ty,
            node: Rc::new(IntNode::BitNot(a.clone())),
        }
    }

    fn add(&mut self, a: &IntTerm, b: &IntTerm) -> IntTerm {
        IntTerm {
            ty: a.ty,
            node: Rc::new(IntNode::Add(a.clone(), b.clone())),
        }
    }

    fn sub(&mut self, a: &IntTerm, b: &IntTerm) -> IntTerm {
        IntTerm {
            ty: a.ty,
            node: Rc::new(IntNode::Sub(a.clone(), b.clone())),
        }
    }

    fn mul(&mut self, a: &IntTerm, b: &IntTerm) -> Result<IntTerm, Error> {
        Ok(IntTerm {
            ty: a.ty,
            node: Rc::new(IntNode::Mul(a.clone(), b.clone())),
        })
    }

    fn eq(&mut self, a: &IntTerm, b: &IntTerm) -> BoolTerm {
        BoolTerm(Rc::new(BoolNode::Eq(a.clone(), b.clone())))
    }

    fn leq(&mut self, a: &IntTerm, b: &IntTerm, signed: bool) -> BoolTerm {
        BoolTerm(Rc::new(BoolNode::Leq(a.clone(), b.clone(), signed)))
    }

    fn ite_bits(&mut self, guard: &BoolTerm, t: &IntTerm, e: &IntTerm) -> IntTerm {
        IntTerm {
            ty: t.ty,
            node: Rc::new(IntNode::Ite(guard.clone(), t.clone(), e.clone())),
        }
    }

    fn satisfiable(&mut self, constraint: &BoolTerm) -> Option<EnumModel> {
        let mut used = BTreeSet::new();
        self.used_vars_bool(constraint, &mut used);
        let vars: Vec<usize> = used.into_iter().collect();
        let total_bits: u32 = vars
            .iter()
            .map(|index| match self.kinds[*index] {
                VarKind::Bool => 1u32,
                VarKind::Int(ty) => ty.bits() as u32,
            })
            .sum();
        assert!(
            total_bits <= MAX_ENUMERATED_BITS,
            "the enumerative backend only handles small assignment spaces"
        );
        let mut model = EnumModel {
            values: HashMap::new(),
        };
        if self.search(constraint, &vars, 0, &mut model) {
            Some(model)
        } else {
            None
        }
    }

    fn model_value(&self, model: &EnumModel, variable: &usize) -> i64 {
        let bits = model.values.get(variable).copied().unwrap_or(0);
        match self.kinds[*variable] {
            VarKind::Bool => i64::from(bits != 0),
            VarKind::Int(ty) => sign_extend(ty, bits),
        }
    }
}
