//! Symbolic values and the symbolic evaluator.
//!
//! The evaluator lowers an expression DAG into the vocabulary of a
//! [Solver]: booleans become solver booleans, integers become bit-vector
//! terms, lists become finite guarded unrollings, and records become field
//! maps. Conditionals [merge][SymbolicValue::merge] both branch values
//! pointwise under the guard. Results are cached per
//! `(expression, environment frame)`, so a shared subtree builds its solver
//! terms once.
use crate::{
    dag::{Dag, Node},
    datatypes::{
        expr::{Expr, IntType, RecordDescriptor, Type, Value},
        Error,
    },
    solver::Solver,
};
use std::{collections::HashMap, fmt, rc::Rc};

/// The value of a sub-expression under symbolic evaluation, parameterised
/// by the solver's term types.
pub enum SymbolicValue<S: Solver> {
    /// A solver boolean.
    Bool(S::Bool),
    /// A bit-vector term of the given integer type.
    Int(IntType, S::BitVec),
    /// A finite guarded unrolling: entry *i* is present iff its guard
    /// holds, and present entries form a prefix.
    List {
        /// The element type.
        elem: Type,
        /// The guarded entries.
        items: Vec<(S::Bool, SymbolicValue<S>)>,
    },
    /// A record value; fields are in descriptor order.
    Object {
        /// The record descriptor.
        record: Rc<RecordDescriptor>,
        /// The field values.
        fields: Vec<SymbolicValue<S>>,
    },
}

impl<S: Solver> Clone for SymbolicValue<S> {
    fn clone(&self) -> Self {
        match self {
            SymbolicValue::Bool(b) => SymbolicValue::Bool(b.clone()),
            SymbolicValue::Int(ty, bits) => SymbolicValue::Int(*ty, bits.clone()),
            SymbolicValue::List { elem, items } => SymbolicValue::List {
                elem: elem.clone(),
                items: items.clone(),
            },
            SymbolicValue::Object { record, fields } => SymbolicValue::Object {
                record: Rc::clone(record),
                fields: fields.clone(),
            },
        }
    }
}

impl<S: Solver> fmt::Debug for SymbolicValue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolicValue::Bool(_) => write!(f, "SymbolicValue::Bool"),
            SymbolicValue::Int(ty, _) => write!(f, "SymbolicValue::Int({})", ty),
            SymbolicValue::List { items, .. } => {
                write!(f, "SymbolicValue::List(slots: {})", items.len())
            }
            SymbolicValue::Object { record, .. } => {
                write!(f, "SymbolicValue::Object({})", record.name())
            }
        }
    }
}

impl<S: Solver> SymbolicValue<S> {
    /// The pointwise if-then-else of two same-shape values under a guard.
    /// Lists of different unrolled lengths are padded with absent entries.
    /// Shape disagreement is an internal [Error::TypeMismatch].
    pub fn merge(
        solver: &mut S,
        guard: &S::Bool,
        then_value: Self,
        else_value: Self,
    ) -> Result<Self, Error> {
        match (then_value, else_value) {
            (SymbolicValue::Bool(t), SymbolicValue::Bool(e)) => {
                Ok(SymbolicValue::Bool(solver.ite(guard, &t, &e)))
            }
            (SymbolicValue::Int(ty, t), SymbolicValue::Int(ty_e, e)) if ty == ty_e => {
                Ok(SymbolicValue::Int(ty, solver.ite_bits(guard, &t, &e)))
            }
            (
                SymbolicValue::List { elem, items: then_items },
                SymbolicValue::List { elem: elem_e, items: else_items },
            ) if elem == elem_e => {
                let absent = solver.constant(false);
                let mut items = Vec::with_capacity(then_items.len().max(else_items.len()));
                let mut then_iter = then_items.into_iter();
                let mut else_iter = else_items.into_iter();
                loop {
                    match (then_iter.next(), else_iter.next()) {
                        (Some((tg, tv)), Some((eg, ev))) => {
                            let present = solver.ite(guard, &tg, &eg);
                            let value = Self::merge(solver, guard, tv, ev)?;
                            items.push((present, value));
                        }
                        (Some((tg, tv)), None) => {
                            let present = solver.ite(guard, &tg, &absent);
                            items.push((present, tv));
                        }
                        (None, Some((eg, ev))) => {
                            let present = solver.ite(guard, &absent, &eg);
                            items.push((present, ev));
                        }
                        (None, None) => break,
                    }
                }
                Ok(SymbolicValue::List { elem, items })
            }
            (
                SymbolicValue::Object { record, fields: then_fields },
                SymbolicValue::Object { record: record_e, fields: else_fields },
            ) if record == record_e => {
                let fields = then_fields
                    .into_iter()
                    .zip(else_fields)
                    .map(|(t, e)| Self::merge(solver, guard, t, e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SymbolicValue::Object { record, fields })
            }
            (t, e) => Err(Error::mismatch(format!(
                "merge of {:?} and {:?}",
                t, e
            ))),
        }
    }

    /// Structural equality as a solver boolean. For lists this requires
    /// pairwise presence agreement, element equality wherever both entries
    /// are present, and absence of every surplus entry.
    pub fn equal(solver: &mut S, a: &Self, b: &Self) -> Result<S::Bool, Error> {
        match (a, b) {
            (SymbolicValue::Bool(x), SymbolicValue::Bool(y)) => Ok(solver.iff(x, y)),
            (SymbolicValue::Int(tx, x), SymbolicValue::Int(ty, y)) if tx == ty => {
                Ok(solver.eq(x, y))
            }
            (
                SymbolicValue::List { items: xs, .. },
                SymbolicValue::List { items: ys, .. },
            ) => {
                let mut result = solver.constant(true);
                for position in 0..xs.len().max(ys.len()) {
                    let part = match (xs.get(position), ys.get(position)) {
                        (Some((gx, vx)), Some((gy, vy))) => {
                            let same_presence = solver.iff(gx, gy);
                            let elements = Self::equal(solver, vx, vy)?;
                            let absent = solver.not(gx);
                            let elements_if_present = solver.or(&absent, &elements);
                            solver.and(&same_presence, &elements_if_present)
                        }
                        (Some((g, _)), None) | (None, Some((g, _))) => solver.not(g),
                        (None, None) => unreachable!("position is below one of the lengths"),
                    };
                    result = solver.and(&result, &part);
                }
                Ok(result)
            }
            (
                SymbolicValue::Object { record: rx, fields: xs },
                SymbolicValue::Object { record: ry, fields: ys },
            ) if rx == ry => {
                let mut result = solver.constant(true);
                for (x, y) in xs.iter().zip(ys.iter()) {
                    let field = Self::equal(solver, x, y)?;
                    result = solver.and(&result, &field);
                }
                Ok(result)
            }
            (x, y) => Err(Error::mismatch(format!(
                "equality of {:?} and {:?}",
                x, y
            ))),
        }
    }
}

/// The symbolic evaluator: lowers expressions into solver terms.
///
/// One evaluator works against one solver; the
/// [variables][Evaluator::variables] map records which solver variable each
/// encountered arbitrary received, which is how models are related back to
/// expressions.
pub struct Evaluator<'a, S: Solver> {
    dag: &'a Dag,
    solver: &'a mut S,
    cache: HashMap<(Expr, usize), SymbolicValue<S>>,
    variables: HashMap<Expr, S::Variable>,
    bindings: Vec<(Expr, SymbolicValue<S>)>,
    generation: usize,
}

impl<S: Solver> fmt::Debug for Evaluator<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("cached", &self.cache.len())
            .field("variables", &self.variables.len())
            .finish()
    }
}

impl<'a, S: Solver> Evaluator<'a, S> {
    /// A fresh evaluator over the given arena and solver.
    pub fn new(dag: &'a Dag, solver: &'a mut S) -> Self {
        Self {
            dag,
            solver,
            cache: HashMap::new(),
            variables: HashMap::new(),
            bindings: Vec::new(),
            generation: 0,
        }
    }

    /// The solver variables of every arbitrary encountered so far.
    pub fn variables(&self) -> &HashMap<Expr, S::Variable> {
        &self.variables
    }

    /// Consumes the evaluator, releasing the solver borrow.
    pub fn into_variables(self) -> HashMap<Expr, S::Variable> {
        self.variables
    }

    /// Lowers an expression into a [SymbolicValue].
    pub fn evaluate(&mut self, expr: Expr) -> Result<SymbolicValue<S>, Error> {
        let key = (expr, self.generation);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }
        let result = self.eval_node(expr)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    fn eval_bool(&mut self, expr: Expr) -> Result<S::Bool, Error> {
        match self.evaluate(expr)? {
            SymbolicValue::Bool(b) => Ok(b),
            other => Err(Error::mismatch(format!(
                "expected a boolean term, got {:?}",
                other
            ))),
        }
    }

    fn eval_int(&mut self, expr: Expr) -> Result<(IntType, S::BitVec), Error> {
        match self.evaluate(expr)? {
            SymbolicValue::Int(ty, bits) => Ok((ty, bits)),
            other => Err(Error::mismatch(format!(
                "expected a bit-vector term, got {:?}",
                other
            ))),
        }
    }

    fn lower_value(&mut self, ty: &Type, value: &Value) -> Result<SymbolicValue<S>, Error> {
        match (ty, value) {
            (Type::Bool, Value::Bool(b)) => Ok(SymbolicValue::Bool(self.solver.constant(*b))),
            (Type::Int(int), _) => {
                let bits = value.bits().ok_or_else(|| {
                    Error::mismatch("an integer constant without an integer payload")
                })?;
                Ok(SymbolicValue::Int(*int, self.solver.int_constant(*int, bits)))
            }
            (Type::List(elem), Value::List(values)) => {
                let present = self.solver.constant(true);
                let items = values
                    .iter()
                    .map(|v| Ok((present.clone(), self.lower_value(elem, v)?)))
                    .collect::<Result<Vec<_>, Error>>()?;
                Ok(SymbolicValue::List {
                    elem: elem.as_ref().clone(),
                    items,
                })
            }
            (Type::Record(record), Value::Record(_, values)) => {
                let fields = record
                    .fields()
                    .iter()
                    .zip(values.iter())
                    .map(|(field, v)| self.lower_value(&field.field_type, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SymbolicValue::Object {
                    record: Rc::clone(record),
                    fields,
                })
            }
            _ => Err(Error::mismatch(
                "a constant whose value does not match its type",
            )),
        }
    }

    fn eval_node(&mut self, expr: Expr) -> Result<SymbolicValue<S>, Error> {
        match self.dag.node(expr).clone() {
            Node::Const(value) => {
                let ty = self.dag.expr_type(expr).clone();
                self.lower_value(&ty, &value)
            }
            Node::Arbitrary { .. } => match self.dag.expr_type(expr) {
                Type::Bool => {
                    let (variable, term) = self.solver.fresh_bool(expr);
                    self.variables.insert(expr, variable);
                    Ok(SymbolicValue::Bool(term))
                }
                Type::Int(int) => {
                    let int = *int;
                    let (variable, bits) = self.solver.fresh_int(expr, int);
                    self.variables.insert(expr, variable);
                    Ok(SymbolicValue::Int(int, bits))
                }
                other => Err(Error::mismatch(format!(
                    "an arbitrary of composite type {} reached the evaluator",
                    other
                ))),
            },
            Node::Argument { name, .. } => self
                .bindings
                .iter()
                .rev()
                .find(|(binder, _)| *binder == expr)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| {
                    Error::unbound(format!(
                        "free argument {} during symbolic evaluation",
                        name
                    ))
                }),
            Node::Adapter { inner, .. } => self.evaluate(inner),
            Node::Not(a) => {
                let a = self.eval_bool(a)?;
                Ok(SymbolicValue::Bool(self.solver.not(&a)))
            }
            Node::And(a, b) => {
                let a = self.eval_bool(a)?;
                let b = self.eval_bool(b)?;
                Ok(SymbolicValue::Bool(self.solver.and(&a, &b)))
            }
            Node::Or(a, b) => {
                let a = self.eval_bool(a)?;
                let b = self.eval_bool(b)?;
                Ok(SymbolicValue::Bool(self.solver.or(&a, &b)))
            }
            Node::Ite {
                guard,
                then_branch,
                else_branch,
            } => {
                let guard = self.eval_bool(guard)?;
                let then_value = self.evaluate(then_branch)?;
                let else_value = self.evaluate(else_branch)?;
                SymbolicValue::merge(self.solver, &guard, then_value, else_value)
            }
            Node::Eq(a, b) => {
                let a = self.evaluate(a)?;
                let b = self.evaluate(b)?;
                Ok(SymbolicValue::Bool(SymbolicValue::equal(
                    self.solver,
                    &a,
                    &b,
                )?))
            }
            Node::Leq(a, b) => {
                let (ty, x) = self.eval_int(a)?;
                let (_, y) = self.eval_int(b)?;
                Ok(SymbolicValue::Bool(self.solver.leq(&x, &y, ty.is_signed())))
            }
            Node::Geq(a, b) => {
                let (ty, x) = self.eval_int(a)?;
                let (_, y) = self.eval_int(b)?;
                Ok(SymbolicValue::Bool(self.solver.geq(&x, &y, ty.is_signed())))
            }
            Node::Sum(a, b) => {
                let (ty, x) = self.eval_int(a)?;
                let (_, y) = self.eval_int(b)?;
                Ok(SymbolicValue::Int(ty, self.solver.add(&x, &y)))
            }
            Node::Minus(a, b) => {
                let (ty, x) = self.eval_int(a)?;
                let (_, y) = self.eval_int(b)?;
                Ok(SymbolicValue::Int(ty, self.solver.sub(&x, &y)))
            }
            Node::Multiply(a, b) => {
                let (ty, x) = self.eval_int(a)?;
                let (_, y) = self.eval_int(b)?;
                Ok(SymbolicValue::Int(ty, self.solver.mul(&x, &y)?))
            }
            Node::Maximum(a, b) => {
                let (ty, x) = self.eval_int(a)?;
                let (_, y) = self.eval_int(b)?;
                let le = self.solver.leq(&x, &y, ty.is_signed());
                Ok(SymbolicValue::Int(ty, self.solver.ite_bits(&le, &y, &x)))
            }
            Node::Minimum(a, b) => {
                let (ty, x) = self.eval_int(a)?;
                let (_, y) = self.eval_int(b)?;
                let le = self.solver.leq(&x, &y, ty.is_signed());
                Ok(SymbolicValue::Int(ty, self.solver.ite_bits(&le, &x, &y)))
            }
            Node::BitAnd(a, b) => {
                let (ty, x) = self.eval_int(a)?;
                let (_, y) = self.eval_int(b)?;
                Ok(SymbolicValue::Int(ty, self.solver.bitand(&x, &y)))
            }
            Node::BitOr(a, b) => {
                let (ty, x) = self.eval_int(a)?;
                let (_, y) = self.eval_int(b)?;
                Ok(SymbolicValue::Int(ty, self.solver.bitor(&x, &y)))
            }
            Node::BitXor(a, b) => {
                let (ty, x) = self.eval_int(a)?;
                let (_, y) = self.eval_int(b)?;
                Ok(SymbolicValue::Int(ty, self.solver.bitxor(&x, &y)))
            }
            Node::BitNot(a) => {
                let (ty, x) = self.eval_int(a)?;
                Ok(SymbolicValue::Int(ty, self.solver.bitnot(&x)))
            }
            Node::EmptyList { elem } => Ok(SymbolicValue::List {
                elem,
                items: Vec::new(),
            }),
            Node::AddFront { head, tail } => {
                let head = self.evaluate(head)?;
                match self.evaluate(tail)? {
                    SymbolicValue::List { elem, mut items } => {
                        let present = self.solver.constant(true);
                        items.insert(0, (present, head));
                        Ok(SymbolicValue::List { elem, items })
                    }
                    other => Err(Error::mismatch(format!(
                        "add_front onto {:?}",
                        other
                    ))),
                }
            }
            Node::ListCase {
                list,
                empty,
                head,
                tail,
                cons,
            } => {
                let (elem, items) = match self.evaluate(list)? {
                    SymbolicValue::List { elem, items } => (elem, items),
                    other => {
                        return Err(Error::mismatch(format!("list_case over {:?}", other)))
                    }
                };
                // fold right over the guarded prefix: each step substitutes
                // the slot element and the tail below it into the cons body
                // and merges with the accumulator under the slot guard
                let mut acc = self.evaluate(empty)?;
                for index in (0..items.len()).rev() {
                    let (guard, element) = items[index].clone();
                    let tail_value = SymbolicValue::List {
                        elem: elem.clone(),
                        items: items[index + 1..].to_vec(),
                    };
                    self.bindings.push((head, element));
                    self.bindings.push((tail, tail_value));
                    self.generation += 1;
                    let cons_value = self.evaluate(cons);
                    self.bindings.pop();
                    self.bindings.pop();
                    acc = SymbolicValue::merge(self.solver, &guard, cons_value?, acc)?;
                }
                Ok(acc)
            }
            Node::CreateObject { record, fields } => {
                let fields = fields
                    .into_iter()
                    .map(|field| self.evaluate(field))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SymbolicValue::Object { record, fields })
            }
            Node::GetField { object, field } => match self.evaluate(object)? {
                SymbolicValue::Object { fields, .. } => Ok(fields[field].clone()),
                other => Err(Error::mismatch(format!("get_field of {:?}", other))),
            },
            Node::WithField {
                object,
                field,
                value,
            } => {
                let new_value = self.evaluate(value)?;
                match self.evaluate(object)? {
                    SymbolicValue::Object { record, mut fields } => {
                        fields[field] = new_value;
                        Ok(SymbolicValue::Object { record, fields })
                    }
                    other => Err(Error::mismatch(format!("with_field of {:?}", other))),
                }
            }
        }
    }
}
