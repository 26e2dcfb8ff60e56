//! Symbolic state sets and state-set transformers over the diagram backend.
//!
//! A [StateSet] wraps a decision diagram over the variable tuple of some
//! type; a [StateSetTransformer] wraps a diagram relating an input tuple to
//! an output tuple and supports forward image, preimage, and composition.
//! Everything shares one [TransformerContext]: the arena, the diagram
//! solver, and the per-type canonical `(expression, variable tuple)` pairs
//! into which all sets of a type are rewritten before any joint operation.
//! Canonical pairs are chosen the first time a type is used and cached for
//! the context's lifetime.
//!
//! The context replaces the process-wide manager of a global-state design:
//! sets and transformers from different contexts never mix.
use crate::{
    dag::Dag,
    datatypes::{
        expr::{DepthConfig, Expr, Type, Value},
        Error, Term, Var,
    },
    generate::fresh_symbolic,
    interleave,
    interpret::{interpret, Environment},
    solver::{
        bdd::{Allocation, BddModel, BddSolver},
        Solver,
    },
    symbolic::{Evaluator, SymbolicValue},
};
use roaring::RoaringBitmap;
use std::{
    cell::RefCell,
    collections::HashMap,
    hash::{Hash, Hasher},
    rc::Rc,
};

/// The reconstruction expression of a value space together with its
/// arbitraries and their flattened variable tuple, one variable per bit.
#[derive(Debug, Clone)]
struct ValueSpace {
    expr: Expr,
    arbitraries: Vec<Expr>,
    vars: Vec<Var>,
    mask: RoaringBitmap,
}

#[derive(Debug)]
struct ContextState {
    dag: Dag,
    solver: BddSolver,
    depth: DepthConfig,
    canonical: HashMap<Type, ValueSpace>,
}

/// The shared context state sets and transformers live in.
#[derive(Debug, Clone, Default)]
pub struct TransformerContext {
    inner: Rc<RefCell<ContextState>>,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            dag: Dag::new(),
            solver: BddSolver::new(),
            depth: DepthConfig::default(),
            canonical: HashMap::new(),
        }
    }
}

impl ContextState {
    fn tuple_of(&mut self, expr: Expr) -> Result<ValueSpace, Error> {
        let layout = interleave::analyze(&self.dag, expr);
        self.solver.extend_allocation(&self.dag, &layout);
        let arbitraries = layout.arbitraries().to_vec();
        let mut vars = Vec::new();
        for arbitrary in &arbitraries {
            match self
                .solver
                .allocation(*arbitrary)
                .expect("tuple arbitraries were just allocated")
            {
                Allocation::Bool(var) => vars.push(*var),
                Allocation::Bits(bits) => vars.extend_from_slice(bits),
            }
        }
        let mask = vars
            .iter()
            .map(|var| {
                TryInto::<u32>::try_into(var.value())
                    .expect("variable bookkeeping assumes no more than u32::MAX variables")
            })
            .collect();
        Ok(ValueSpace {
            expr,
            arbitraries,
            vars,
            mask,
        })
    }

    /// The canonical space of a type, created at first use.
    fn space_for(&mut self, ty: &Type) -> Result<ValueSpace, Error> {
        if let Some(space) = self.canonical.get(ty) {
            return Ok(space.clone());
        }
        log::debug!("choosing the canonical space for {}", ty);
        let depth = self.depth;
        let expr = fresh_symbolic(&mut self.dag, ty, &depth)?;
        let space = self.tuple_of(expr)?;
        self.canonical.insert(ty.clone(), space.clone());
        Ok(space)
    }

    fn register_canonical(&mut self, ty: &Type, space: &ValueSpace) {
        self.canonical
            .entry(ty.clone())
            .or_insert_with(|| space.clone());
    }

    fn eval_bool(&mut self, expr: Expr) -> Result<Term, Error> {
        let ContextState { dag, solver, .. } = self;
        let mut evaluator = Evaluator::new(dag, solver);
        match evaluator.evaluate(expr)? {
            SymbolicValue::Bool(term) => Ok(term),
            other => Err(Error::mismatch(format!(
                "a set predicate evaluated to {:?}",
                other
            ))),
        }
    }

    /// Renames a diagram from one variable tuple onto another of the same
    /// shape. Aligning an already-aligned diagram returns it unchanged.
    fn rename(&mut self, dd: Term, from: &ValueSpace, onto: &ValueSpace) -> Term {
        if from.vars == onto.vars {
            return dd;
        }
        debug_assert_eq!(
            from.vars.len(),
            onto.vars.len(),
            "equal types under one depth configuration have equal tuples"
        );
        let map: HashMap<Var, Var> = from
            .vars
            .iter()
            .copied()
            .zip(onto.vars.iter().copied())
            .collect();
        self.solver.bdd.replace(dd, &map)
    }

    /// Rewrites a diagram over **space** into the canonical space of the
    /// type and returns both.
    fn canonicalise(
        &mut self,
        ty: &Type,
        space: &ValueSpace,
        dd: Term,
    ) -> Result<(ValueSpace, Term), Error> {
        let canonical = self.space_for(ty)?;
        let dd = self.rename(dd, space, &canonical);
        Ok((canonical, dd))
    }
}

impl TransformerContext {
    /// A context with the default [DepthConfig].
    pub fn new() -> Self {
        Self::default()
    }

    /// A context with an explicit generation depth. All sets and
    /// transformers of one context share it, which keeps the variable
    /// tuples of equal types aligned.
    pub fn with_depth(depth: DepthConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ContextState {
                depth,
                ..ContextState::default()
            })),
        }
    }

    fn same_context(&self, other: &TransformerContext) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The set of all values of a type satisfying a predicate over the
    /// symbolic value. The predicate must constrain only the value it is
    /// given (plus constants).
    pub fn state_set(
        &self,
        ty: &Type,
        predicate: impl FnOnce(&mut Dag, Expr) -> Result<Expr, Error>,
    ) -> Result<StateSet, Error> {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;
        let space = state.space_for(ty)?;
        let condition = predicate(&mut state.dag, space.expr)?;
        if *state.dag.expr_type(condition) != Type::Bool {
            return Err(Error::invalid(format!(
                "a set predicate must be boolean, got {}",
                state.dag.expr_type(condition)
            )));
        }
        let dd = state.eval_bool(condition)?;
        Ok(StateSet {
            ctx: self.clone(),
            ty: ty.clone(),
            space,
            dd,
        })
    }

    /// The empty set of a type.
    pub fn empty_set(&self, ty: &Type) -> Result<StateSet, Error> {
        let space = self.inner.borrow_mut().space_for(ty)?;
        Ok(StateSet {
            ctx: self.clone(),
            ty: ty.clone(),
            space,
            dd: Term::BOT,
        })
    }

    /// The full set of a type.
    pub fn full_set(&self, ty: &Type) -> Result<StateSet, Error> {
        let space = self.inner.borrow_mut().space_for(ty)?;
        Ok(StateSet {
            ctx: self.clone(),
            ty: ty.clone(),
            space,
            dd: Term::TOP,
        })
    }

    /// Compiles a pure function into its relational encoding `R(x, y)`:
    /// a fresh symbolic input `x` is pushed through **function**, a fresh
    /// output tuple `y` is generated, and the equality `f(x) = y` becomes
    /// the transformer's diagram.
    pub fn transformer(
        &self,
        input: &Type,
        output: &Type,
        function: impl FnOnce(&mut Dag, Expr) -> Result<Expr, Error>,
    ) -> Result<StateSetTransformer, Error> {
        log::info!("[Start] compiling a transformer {} -> {}", input, output);
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;
        let depth = state.depth;

        let input_expr = fresh_symbolic(&mut state.dag, input, &depth)?;
        let image = function(&mut state.dag, input_expr)?;
        if state.dag.expr_type(image) != output {
            return Err(Error::invalid(format!(
                "the function produced {}, expected {}",
                state.dag.expr_type(image),
                output
            )));
        }
        let output_expr = fresh_symbolic(&mut state.dag, output, &depth)?;
        let relation = state.dag.eq(image, output_expr)?;

        let layout = interleave::analyze(&state.dag, relation);
        state.solver.extend_allocation(&state.dag, &layout);
        let dd = state.eval_bool(relation)?;

        let input_space = state.tuple_of(input_expr)?;
        let output_space = state.tuple_of(output_expr)?;
        state.register_canonical(input, &input_space);
        state.register_canonical(output, &output_space);
        log::info!("[Done] transformer compiled");

        Ok(StateSetTransformer {
            ctx: self.clone(),
            input_type: input.clone(),
            output_type: output.clone(),
            input: input_space,
            output: output_space,
            dd,
        })
    }
}

/// A decision-diagram-backed set of values of one type.
///
/// All operations are pure and return new sets; sets are always kept over
/// the canonical variable tuple of their type, so equality and hashing can
/// delegate to diagram identity.
#[derive(Debug, Clone)]
pub struct StateSet {
    ctx: TransformerContext,
    ty: Type,
    space: ValueSpace,
    dd: Term,
}

impl PartialEq for StateSet {
    fn eq(&self, other: &Self) -> bool {
        self.ctx.same_context(&other.ctx) && self.ty == other.ty && self.dd == other.dd
    }
}

impl Eq for StateSet {}

impl Hash for StateSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dd.hash(state);
        self.ty.hash(state);
    }
}

impl StateSet {
    /// The type of the contained values.
    pub fn value_type(&self) -> &Type {
        &self.ty
    }

    fn check_operand(&self, other: &StateSet) -> Result<(), Error> {
        if !self.ctx.same_context(&other.ctx) {
            return Err(Error::invalid(
                "sets from different contexts cannot be combined",
            ));
        }
        if self.ty != other.ty {
            return Err(Error::invalid(format!(
                "sets over {} and {} cannot be combined",
                self.ty, other.ty
            )));
        }
        Ok(())
    }

    /// Rewrites the set onto the canonical tuple of its type. Aligning an
    /// already-canonical set returns an identical diagram.
    pub fn align(&self) -> Result<StateSet, Error> {
        let mut guard = self.ctx.inner.borrow_mut();
        let (space, dd) = guard.canonicalise(&self.ty, &self.space, self.dd)?;
        Ok(StateSet {
            ctx: self.ctx.clone(),
            ty: self.ty.clone(),
            space,
            dd,
        })
    }

    /// The intersection of two sets over one type.
    pub fn intersect(&self, other: &StateSet) -> Result<StateSet, Error> {
        self.check_operand(other)?;
        let lhs = self.align()?;
        let rhs = other.align()?;
        let dd = {
            let mut guard = self.ctx.inner.borrow_mut();
            guard.solver.bdd.and(lhs.dd, rhs.dd)
        };
        Ok(StateSet { dd, ..lhs })
    }

    /// The union of two sets over one type.
    pub fn union(&self, other: &StateSet) -> Result<StateSet, Error> {
        self.check_operand(other)?;
        let lhs = self.align()?;
        let rhs = other.align()?;
        let dd = {
            let mut guard = self.ctx.inner.borrow_mut();
            guard.solver.bdd.or(lhs.dd, rhs.dd)
        };
        Ok(StateSet { dd, ..lhs })
    }

    /// The complement within the type's value space.
    pub fn complement(&self) -> Result<StateSet, Error> {
        let aligned = self.align()?;
        let dd = {
            let mut guard = self.ctx.inner.borrow_mut();
            guard.solver.bdd.not(aligned.dd)
        };
        Ok(StateSet { dd, ..aligned })
    }

    /// True if no value is contained.
    pub fn is_empty(&self) -> bool {
        self.dd == Term::BOT
    }

    /// True if every value of the type is contained.
    pub fn is_full(&self) -> bool {
        self.dd == Term::TOP
    }

    /// The exact number of contained values.
    pub fn size(&self) -> u128 {
        let guard = self.ctx.inner.borrow();
        guard.solver.bdd.count_in(self.dd, &self.space.vars)
    }

    /// Any representative of the set, or [None] if it is empty. Callers
    /// must not rely on which representative is returned.
    pub fn element(&self) -> Result<Option<Value>, Error> {
        let mut guard = self.ctx.inner.borrow_mut();
        let state = &mut *guard;
        let model = match state.solver.satisfiable(&self.dd) {
            None => return Ok(None),
            Some(model) => model,
        };
        reconstruct(state, &self.space, &model).map(Some)
    }

    /// A representative drawn along a random diagram path, or [None] if the
    /// set is empty.
    pub fn sample(&self, rng: &mut impl rand::Rng) -> Result<Option<Value>, Error> {
        let mut guard = self.ctx.inner.borrow_mut();
        let state = &mut *guard;
        let model = match state.solver.random_model(self.dd, rng) {
            None => return Ok(None),
            Some(model) => model,
        };
        reconstruct(state, &self.space, &model).map(Some)
    }

    /// Streams every contained value over the channel, in diagram order,
    /// until the set is exhausted or the receiver disconnects. Intended for
    /// sets known to be small; the element count is exponential in the
    /// unconstrained bits.
    pub fn elements_channel(
        &self,
        sender: &crossbeam_channel::Sender<Value>,
    ) -> Result<(), Error> {
        let guard = self.ctx.inner.borrow();
        let state = &*guard;
        let mut failure = None;
        state
            .solver
            .bdd
            .foreach_model(self.dd, &self.space.vars, &mut |path| {
                let model = BddModel::from_path(path);
                match reconstruct(state, &self.space, &model) {
                    Ok(value) => match sender.send(value) {
                        Ok(()) => true,
                        Err(err) => {
                            log::debug!("stopped streaming elements: {}", err);
                            false
                        }
                    },
                    Err(err) => {
                        failure = Some(err);
                        false
                    }
                }
            });
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn reconstruct(
    state: &ContextState,
    space: &ValueSpace,
    model: &BddModel,
) -> Result<Value, Error> {
    let mut env = Environment::new();
    for arbitrary in &space.arbitraries {
        let allocation = state
            .solver
            .allocation(*arbitrary)
            .expect("tuple arbitraries stay allocated for the context lifetime")
            .clone();
        let signed = state.solver.model_value(model, &allocation);
        let value = match state.dag.expr_type(*arbitrary) {
            Type::Bool => Value::Bool(signed != 0),
            Type::Int(int) => Value::from_signed_bits(*int, signed),
            other => {
                return Err(Error::mismatch(format!(
                    "a tuple arbitrary of composite type {}",
                    other
                )))
            }
        };
        env.assign(*arbitrary, value);
    }
    interpret(&state.dag, space.expr, &env)
}

/// The relational encoding `R(x, y)` of a pure function, supporting image,
/// preimage, and composition.
#[derive(Debug, Clone)]
pub struct StateSetTransformer {
    ctx: TransformerContext,
    input_type: Type,
    output_type: Type,
    input: ValueSpace,
    output: ValueSpace,
    dd: Term,
}

impl StateSetTransformer {
    /// The input type of the encoded function.
    pub fn input_type(&self) -> &Type {
        &self.input_type
    }

    /// The output type of the encoded function.
    pub fn output_type(&self) -> &Type {
        &self.output_type
    }

    fn project_input(&self, dd: Term) -> Result<StateSet, Error> {
        let mut guard = self.ctx.inner.borrow_mut();
        let state = &mut *guard;
        let projected = state.solver.bdd.exists(dd, &self.output.mask);
        let (space, dd) = state.canonicalise(&self.input_type, &self.input, projected)?;
        Ok(StateSet {
            ctx: self.ctx.clone(),
            ty: self.input_type.clone(),
            space,
            dd,
        })
    }

    fn project_output(&self, dd: Term) -> Result<StateSet, Error> {
        let mut guard = self.ctx.inner.borrow_mut();
        let state = &mut *guard;
        let projected = state.solver.bdd.exists(dd, &self.input.mask);
        let (space, dd) = state.canonicalise(&self.output_type, &self.output, projected)?;
        Ok(StateSet {
            ctx: self.ctx.clone(),
            ty: self.output_type.clone(),
            space,
            dd,
        })
    }

    /// Constrains the relation by an invariant over the input and output
    /// values. The closure receives the input and output expressions.
    fn constrained(
        &self,
        invariant: impl FnOnce(&mut Dag, Expr, Expr) -> Result<Expr, Error>,
    ) -> Result<Term, Error> {
        let mut guard = self.ctx.inner.borrow_mut();
        let state = &mut *guard;
        let condition = invariant(&mut state.dag, self.input.expr, self.output.expr)?;
        if *state.dag.expr_type(condition) != Type::Bool {
            return Err(Error::invalid(format!(
                "a transformer invariant must be boolean, got {}",
                state.dag.expr_type(condition)
            )));
        }
        let constraint = state.eval_bool(condition)?;
        Ok(state.solver.bdd.and(self.dd, constraint))
    }

    /// The set of inputs related to any output.
    pub fn input_set(&self) -> Result<StateSet, Error> {
        self.project_input(self.dd)
    }

    /// The set of inputs related to an output under the invariant.
    pub fn input_set_where(
        &self,
        invariant: impl FnOnce(&mut Dag, Expr, Expr) -> Result<Expr, Error>,
    ) -> Result<StateSet, Error> {
        let constrained = self.constrained(invariant)?;
        self.project_input(constrained)
    }

    /// The set of outputs related to any input.
    pub fn output_set(&self) -> Result<StateSet, Error> {
        self.project_output(self.dd)
    }

    /// The set of outputs related to an input under the invariant.
    pub fn output_set_where(
        &self,
        invariant: impl FnOnce(&mut Dag, Expr, Expr) -> Result<Expr, Error>,
    ) -> Result<StateSet, Error> {
        let constrained = self.constrained(invariant)?;
        self.project_output(constrained)
    }

    /// The forward image `{f(x) | x ∈ s}` of a set of inputs.
    pub fn transform_forward(&self, set: &StateSet) -> Result<StateSet, Error> {
        if !self.ctx.same_context(&set.ctx) {
            return Err(Error::invalid(
                "a transformer only applies to sets of its own context",
            ));
        }
        if set.ty != self.input_type {
            return Err(Error::invalid(format!(
                "a {} -> {} transformer cannot map a set over {}",
                self.input_type, self.output_type, set.ty
            )));
        }
        let restricted = {
            let mut guard = self.ctx.inner.borrow_mut();
            let state = &mut *guard;
            let aligned = state.rename(set.dd, &set.space, &self.input);
            state.solver.bdd.and(aligned, self.dd)
        };
        self.project_output(restricted)
    }

    /// The preimage `{x | f(x) ∈ s}` of a set of outputs.
    pub fn transform_backwards(&self, set: &StateSet) -> Result<StateSet, Error> {
        if !self.ctx.same_context(&set.ctx) {
            return Err(Error::invalid(
                "a transformer only applies to sets of its own context",
            ));
        }
        if set.ty != self.output_type {
            return Err(Error::invalid(format!(
                "a {} -> {} transformer cannot invert a set over {}",
                self.input_type, self.output_type, set.ty
            )));
        }
        let restricted = {
            let mut guard = self.ctx.inner.borrow_mut();
            let state = &mut *guard;
            let aligned = state.rename(set.dd, &set.space, &self.output);
            state.solver.bdd.and(aligned, self.dd)
        };
        self.project_input(restricted)
    }

    /// The relational composition `self ; other`: first this transformer,
    /// then the other. The middle tuple is quantified away.
    pub fn compose(&self, other: &StateSetTransformer) -> Result<StateSetTransformer, Error> {
        if !self.ctx.same_context(&other.ctx) {
            return Err(Error::invalid(
                "transformers from different contexts cannot be composed",
            ));
        }
        if self.output_type != other.input_type {
            return Err(Error::invalid(format!(
                "cannot compose {} -> {} with {} -> {}",
                self.input_type, self.output_type, other.input_type, other.output_type
            )));
        }
        let mut guard = self.ctx.inner.borrow_mut();
        let state = &mut *guard;
        let depth = state.depth;
        // a fresh middle tuple keeps the composition sound even when the
        // two transformers share variable tuples
        let middle_expr = fresh_symbolic(&mut state.dag, &self.output_type, &depth)?;
        let middle = state.tuple_of(middle_expr)?;
        let first = state.rename(self.dd, &self.output, &middle);
        let second = state.rename(other.dd, &other.input, &middle);
        let conj = state.solver.bdd.and(first, second);
        let dd = state.solver.bdd.exists(conj, &middle.mask);
        Ok(StateSetTransformer {
            ctx: self.ctx.clone(),
            input_type: self.input_type.clone(),
            output_type: other.output_type.clone(),
            input: self.input.clone(),
            output: other.output.clone(),
            dd,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datatypes::expr::IntType;
    use test_log::test;

    fn u8_type() -> Type {
        Type::Int(IntType::U8)
    }

    /// The increment transformer over bytes.
    fn increment(ctx: &TransformerContext) -> StateSetTransformer {
        ctx.transformer(&u8_type(), &u8_type(), |dag, input| {
            let one = dag.lift(1u8);
            dag.sum(input, one)
        })
        .unwrap()
    }

    #[test]
    fn output_set_element() {
        let ctx = TransformerContext::new();
        let add_one = increment(&ctx);
        let tens = add_one
            .output_set_where(|dag, _input, output| {
                let ten = dag.lift(10u8);
                dag.eq(output, ten)
            })
            .unwrap();
        assert_eq!(tens.element().unwrap(), Some(Value::U8(10)));
        assert_eq!(tens.size(), 1);
    }

    #[test]
    fn disjoint_input_sets() {
        let ctx = TransformerContext::new();
        let add_one = increment(&ctx);
        let to_ten = add_one
            .input_set_where(|dag, _input, output| {
                let ten = dag.lift(10u8);
                dag.eq(output, ten)
            })
            .unwrap();
        let to_eleven = add_one
            .input_set_where(|dag, _input, output| {
                let eleven = dag.lift(11u8);
                dag.eq(output, eleven)
            })
            .unwrap();
        assert_eq!(to_ten.element().unwrap(), Some(Value::U8(9)));
        let both = to_ten.intersect(&to_eleven).unwrap();
        assert!(both.is_empty());
        assert_eq!(both.element().unwrap(), None);
    }

    #[test]
    fn relational_algebra_laws() {
        let ctx = TransformerContext::new();
        let small = ctx
            .state_set(&u8_type(), |dag, value| {
                let bound = dag.lift(10u8);
                dag.leq(value, bound)
            })
            .unwrap();
        let even_bit = ctx
            .state_set(&u8_type(), |dag, value| {
                let one = dag.lift(1u8);
                let zero = dag.lift(0u8);
                let low = dag.bitand(value, one).unwrap();
                dag.eq(low, zero)
            })
            .unwrap();

        assert_eq!(small.union(&small).unwrap(), small);
        assert_eq!(small.intersect(&small).unwrap(), small);
        let complement = small.complement().unwrap();
        assert!(small.intersect(&complement).unwrap().is_empty());
        assert!(small.union(&complement).unwrap().is_full());
        assert_eq!(complement.complement().unwrap(), small);
        assert_eq!(
            small.intersect(&even_bit).unwrap(),
            even_bit.intersect(&small).unwrap()
        );
        assert_eq!(
            small.union(&even_bit).unwrap(),
            even_bit.union(&small).unwrap()
        );
        // De Morgan
        let lhs = small.union(&even_bit).unwrap().complement().unwrap();
        let rhs = small
            .complement()
            .unwrap()
            .intersect(&even_bit.complement().unwrap())
            .unwrap();
        assert_eq!(lhs, rhs);

        assert_eq!(small.size(), 11);
        assert_eq!(complement.size(), 245);
    }

    #[test]
    fn alignment_is_idempotent() {
        let ctx = TransformerContext::new();
        let small = ctx
            .state_set(&u8_type(), |dag, value| {
                let bound = dag.lift(3u8);
                dag.leq(value, bound)
            })
            .unwrap();
        let aligned = small.align().unwrap();
        assert_eq!(aligned.dd, small.dd);
        let again = aligned.align().unwrap();
        assert_eq!(again.dd, aligned.dd);
    }

    #[test]
    fn forward_and_backward_images() {
        let ctx = TransformerContext::new();
        let add_one = increment(&ctx);
        let start = ctx
            .state_set(&u8_type(), |dag, value| {
                let five = dag.lift(5u8);
                dag.eq(value, five)
            })
            .unwrap();
        let image = add_one.transform_forward(&start).unwrap();
        assert_eq!(image.element().unwrap(), Some(Value::U8(6)));
        assert_eq!(image.size(), 1);

        // the round trip contains the start
        let back = add_one.transform_backwards(&image).unwrap();
        assert!(!back.intersect(&start).unwrap().is_empty());
        // increment is injective, so equality holds
        assert_eq!(back, start);
    }

    #[test]
    fn composition_matches_two_steps() {
        let ctx = TransformerContext::new();
        let add_one = increment(&ctx);
        let add_two = add_one.compose(&add_one).unwrap();
        let start = ctx
            .state_set(&u8_type(), |dag, value| {
                let seven = dag.lift(7u8);
                dag.eq(value, seven)
            })
            .unwrap();
        let stepped = add_one
            .transform_forward(&add_one.transform_forward(&start).unwrap())
            .unwrap();
        let composed = add_two.transform_forward(&start).unwrap();
        assert_eq!(stepped, composed);
        assert_eq!(composed.element().unwrap(), Some(Value::U8(9)));
    }

    #[test]
    fn sets_of_different_types_do_not_mix() {
        let ctx = TransformerContext::new();
        let bytes = ctx.full_set(&u8_type()).unwrap();
        let words = ctx.full_set(&Type::Int(IntType::U16)).unwrap();
        assert!(bytes.intersect(&words).is_err());

        let other = TransformerContext::new();
        let foreign = other.full_set(&u8_type()).unwrap();
        assert!(bytes.union(&foreign).is_err());
    }

    #[test]
    fn streaming_elements() {
        let ctx = TransformerContext::new();
        let tiny = ctx
            .state_set(&u8_type(), |dag, value| {
                let two = dag.lift(2u8);
                dag.leq(value, two)
            })
            .unwrap();
        let (sender, receiver) = crossbeam_channel::unbounded();
        tiny.elements_channel(&sender).unwrap();
        drop(sender);
        let mut streamed: Vec<Value> = receiver.iter().collect();
        streamed.sort_by_key(|value| value.bits());
        assert_eq!(streamed, vec![Value::U8(0), Value::U8(1), Value::U8(2)]);
    }

    #[test]
    fn sampling_stays_inside_the_set() {
        let ctx = TransformerContext::new();
        let bounded = ctx
            .state_set(&u8_type(), |dag, value| {
                let bound = dag.lift(17u8);
                dag.leq(value, bound)
            })
            .unwrap();
        let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(7);
        for _ in 0..16 {
            let value = bounded.sample(&mut rng).unwrap().expect("the set is not empty");
            assert!(value.bits().unwrap() <= 17);
        }
        let empty = ctx.empty_set(&u8_type()).unwrap();
        assert_eq!(empty.sample(&mut rng).unwrap(), None);
    }
}
