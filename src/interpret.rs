//! Concrete evaluation of expressions.
//!
//! The interpreter walks the DAG with an [Environment] holding argument
//! bindings and an optional assignment of [arbitrary][crate::dag::Dag::arbitrary]
//! nodes to concrete values; the latter is how a model returned by a solver
//! is turned back into witness values. Results are memoised per
//! `(node, environment frame)` pair, so shared sub-expressions are evaluated
//! once.
pub mod compile;

use crate::{
    dag::{Dag, Node},
    datatypes::{
        expr::{int_binary, int_compare, int_unary, Expr, Value},
        Error,
    },
};
use std::{cmp::Ordering, collections::HashMap};

/// Bindings used during concrete evaluation.
#[derive(Debug, Default, Clone)]
pub struct Environment {
    arguments: HashMap<String, Value>,
    chosen: HashMap<Expr, Value>,
}

impl Environment {
    /// An empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment carrying an assignment of arbitraries, as returned by
    /// [`find`][crate::check::find].
    pub fn with_assignment(assignment: HashMap<Expr, Value>) -> Self {
        Self {
            arguments: HashMap::new(),
            chosen: assignment,
        }
    }

    /// Binds a named argument.
    pub fn bind_argument(&mut self, name: &str, value: Value) {
        self.arguments.insert(name.to_string(), value);
    }

    /// Assigns a concrete value to an arbitrary node. Arbitraries without an
    /// assignment evaluate to the default value of their type.
    pub fn assign(&mut self, arbitrary: Expr, value: Value) {
        self.chosen.insert(arbitrary, value);
    }
}

/// Evaluates an expression to a concrete [Value] under the given
/// environment.
pub fn interpret(dag: &Dag, expr: Expr, env: &Environment) -> Result<Value, Error> {
    let mut session = Session {
        dag,
        env,
        cache: HashMap::new(),
        frames: Vec::new(),
        generation: 0,
    };
    session.eval(expr)
}

struct Session<'a> {
    dag: &'a Dag,
    env: &'a Environment,
    cache: HashMap<(Expr, usize), Value>,
    frames: Vec<(Expr, Value)>,
    generation: usize,
}

impl Session<'_> {
    fn eval(&mut self, expr: Expr) -> Result<Value, Error> {
        let key = (expr, self.generation);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }
        let result = self.eval_node(expr)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    fn eval_bool(&mut self, expr: Expr) -> Result<bool, Error> {
        self.eval(expr)?
            .as_bool()
            .ok_or_else(|| Error::mismatch("a boolean operand evaluated to a non-boolean value"))
    }

    fn eval_node(&mut self, expr: Expr) -> Result<Value, Error> {
        match self.dag.node(expr).clone() {
            Node::Const(value) => Ok(value),
            Node::Arbitrary { .. } => Ok(self
                .env
                .chosen
                .get(&expr)
                .cloned()
                .unwrap_or_else(|| self.dag.expr_type(expr).default_value())),
            Node::Argument { name, .. } => {
                if let Some((_, bound)) = self.frames.iter().rev().find(|(binder, _)| *binder == expr)
                {
                    return Ok(bound.clone());
                }
                self.env
                    .arguments
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| Error::unbound(format!("free argument {}", name)))
            }
            Node::Adapter { inner, chain } => {
                let mut value = self.eval(inner)?;
                for converter in self.dag.adapter_chain(chain) {
                    value = converter(value)?;
                }
                Ok(value)
            }
            Node::Not(a) => Ok(Value::Bool(!self.eval_bool(a)?)),
            Node::And(a, b) => Ok(Value::Bool(self.eval_bool(a)? && self.eval_bool(b)?)),
            Node::Or(a, b) => Ok(Value::Bool(self.eval_bool(a)? || self.eval_bool(b)?)),
            Node::Ite {
                guard,
                then_branch,
                else_branch,
            } => {
                if self.eval_bool(guard)? {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            Node::Eq(a, b) => Ok(Value::Bool(self.eval(a)? == self.eval(b)?)),
            Node::Leq(a, b) => {
                let ord = int_compare(&self.eval(a)?, &self.eval(b)?)?;
                Ok(Value::Bool(ord != Ordering::Greater))
            }
            Node::Geq(a, b) => {
                let ord = int_compare(&self.eval(a)?, &self.eval(b)?)?;
                Ok(Value::Bool(ord != Ordering::Less))
            }
            Node::Sum(a, b) => int_binary(&self.eval(a)?, &self.eval(b)?, u64::wrapping_add),
            Node::Minus(a, b) => int_binary(&self.eval(a)?, &self.eval(b)?, u64::wrapping_sub),
            Node::Multiply(a, b) => int_binary(&self.eval(a)?, &self.eval(b)?, u64::wrapping_mul),
            Node::Maximum(a, b) => {
                let lhs = self.eval(a)?;
                let rhs = self.eval(b)?;
                Ok(if int_compare(&lhs, &rhs)? == Ordering::Less {
                    rhs
                } else {
                    lhs
                })
            }
            Node::Minimum(a, b) => {
                let lhs = self.eval(a)?;
                let rhs = self.eval(b)?;
                Ok(if int_compare(&lhs, &rhs)? == Ordering::Greater {
                    rhs
                } else {
                    lhs
                })
            }
            Node::BitAnd(a, b) => int_binary(&self.eval(a)?, &self.eval(b)?, |l, r| l & r),
            Node::BitOr(a, b) => int_binary(&self.eval(a)?, &self.eval(b)?, |l, r| l | r),
            Node::BitXor(a, b) => int_binary(&self.eval(a)?, &self.eval(b)?, |l, r| l ^ r),
            Node::BitNot(a) => int_unary(&self.eval(a)?, |bits| !bits),
            Node::EmptyList { .. } => Ok(Value::List(Vec::new())),
            Node::AddFront { head, tail } => {
                let head = self.eval(head)?;
                match self.eval(tail)? {
                    Value::List(mut elems) => {
                        elems.insert(0, head);
                        Ok(Value::List(elems))
                    }
                    _ => Err(Error::mismatch("a list operand evaluated to a non-list value")),
                }
            }
            Node::ListCase {
                list,
                empty,
                head,
                tail,
                cons,
            } => {
                let elems = match self.eval(list)? {
                    Value::List(elems) => elems,
                    _ => {
                        return Err(Error::mismatch(
                            "a list operand evaluated to a non-list value",
                        ))
                    }
                };
                match elems.split_first() {
                    None => self.eval(empty),
                    Some((first, rest)) => {
                        self.frames.push((head, first.clone()));
                        self.frames.push((tail, Value::List(rest.to_vec())));
                        self.generation += 1;
                        let result = self.eval(cons);
                        self.frames.pop();
                        self.frames.pop();
                        result
                    }
                }
            }
            Node::CreateObject { record, fields } => {
                let values = fields
                    .into_iter()
                    .map(|field| self.eval(field))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Record(record, values))
            }
            Node::GetField { object, field } => match self.eval(object)? {
                Value::Record(_, values) => Ok(values[field].clone()),
                _ => Err(Error::mismatch(
                    "a record operand evaluated to a non-record value",
                )),
            },
            Node::WithField {
                object,
                field,
                value,
            } => {
                let new_value = self.eval(value)?;
                match self.eval(object)? {
                    Value::Record(record, mut values) => {
                        values[field] = new_value;
                        Ok(Value::Record(record, values))
                    }
                    _ => Err(Error::mismatch(
                        "a record operand evaluated to a non-record value",
                    )),
                }
            }
        }
    }
}
