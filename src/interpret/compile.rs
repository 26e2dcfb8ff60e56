//! Compilation of an expression into a self-contained evaluation closure.
//!
//! The compiled form copies everything it needs out of the arena, so a
//! [CompiledFunction] outlives the [Dag] it was compiled from. Its only
//! contract is semantic equivalence with [interpret][super::interpret] on
//! every environment, which the integration tests check by property.
use super::Environment;
use crate::{
    dag::{Dag, Node},
    datatypes::{
        expr::{int_binary, int_compare, int_unary, Expr, Value},
        Error,
    },
};
use derivative::Derivative;
use std::{cmp::Ordering, collections::HashMap, rc::Rc};

type Thunk = Rc<dyn Fn(&mut Activation) -> Result<Value, Error>>;

struct Activation<'a> {
    env: &'a Environment,
    stack: Vec<Value>,
}

/// A compiled expression, ready to be [called][CompiledFunction::call]
/// against arbitrary environments.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CompiledFunction {
    #[derivative(Debug = "ignore")]
    root: Thunk,
}

impl CompiledFunction {
    /// Evaluates the compiled expression under the given environment.
    pub fn call(&self, env: &Environment) -> Result<Value, Error> {
        let mut activation = Activation {
            env,
            stack: Vec::new(),
        };
        (self.root)(&mut activation)
    }
}

/// Compiles an expression. The work is proportional to the expression tree
/// under the active binders; repeated calls of the result do not touch the
/// arena again.
pub fn compile(dag: &Dag, expr: Expr) -> CompiledFunction {
    let mut compiler = Compiler {
        dag,
        binders: Vec::new(),
        memo: HashMap::new(),
    };
    CompiledFunction {
        root: compiler.thunk(expr),
    }
}

struct Compiler<'a> {
    dag: &'a Dag,
    binders: Vec<Expr>,
    memo: HashMap<(Expr, Vec<Expr>), Thunk>,
}

fn binary(
    a: Thunk,
    b: Thunk,
    op: impl Fn(Value, Value) -> Result<Value, Error> + 'static,
) -> Thunk {
    Rc::new(move |activation| op(a(activation)?, b(activation)?))
}

impl Compiler<'_> {
    fn thunk(&mut self, expr: Expr) -> Thunk {
        let key = (expr, self.binders.clone());
        if let Some(cached) = self.memo.get(&key) {
            return Rc::clone(cached);
        }
        let compiled = self.build(expr);
        self.memo.insert(key, Rc::clone(&compiled));
        compiled
    }

    fn build(&mut self, expr: Expr) -> Thunk {
        match self.dag.node(expr).clone() {
            Node::Const(value) => Rc::new(move |_| Ok(value.clone())),
            Node::Arbitrary { .. } => {
                let fallback = self.dag.expr_type(expr).default_value();
                Rc::new(move |activation| {
                    Ok(activation
                        .env
                        .chosen
                        .get(&expr)
                        .cloned()
                        .unwrap_or_else(|| fallback.clone()))
                })
            }
            Node::Argument { name, .. } => {
                match self.binders.iter().rposition(|binder| *binder == expr) {
                    Some(slot) => Rc::new(move |activation| Ok(activation.stack[slot].clone())),
                    None => Rc::new(move |activation| {
                        activation
                            .env
                            .arguments
                            .get(&name)
                            .cloned()
                            .ok_or_else(|| Error::unbound(format!("free argument {}", name)))
                    }),
                }
            }
            Node::Adapter { inner, chain } => {
                let inner = self.thunk(inner);
                let converters: Vec<_> = self.dag.adapter_chain(chain).to_vec();
                Rc::new(move |activation| {
                    let mut value = inner(activation)?;
                    for converter in &converters {
                        value = converter(value)?;
                    }
                    Ok(value)
                })
            }
            Node::Not(a) => {
                let a = self.thunk(a);
                Rc::new(move |activation| match a(activation)? {
                    Value::Bool(b) => Ok(Value::Bool(!b)),
                    _ => Err(Error::mismatch("a boolean operand evaluated to a non-boolean value")),
                })
            }
            Node::And(a, b) => {
                let (a, b) = (self.thunk(a), self.thunk(b));
                Rc::new(move |activation| {
                    match (a(activation)?.as_bool(), b(activation)?.as_bool()) {
                        (Some(lhs), Some(rhs)) => Ok(Value::Bool(lhs && rhs)),
                        _ => Err(Error::mismatch(
                            "a boolean operand evaluated to a non-boolean value",
                        )),
                    }
                })
            }
            Node::Or(a, b) => {
                let (a, b) = (self.thunk(a), self.thunk(b));
                Rc::new(move |activation| {
                    match (a(activation)?.as_bool(), b(activation)?.as_bool()) {
                        (Some(lhs), Some(rhs)) => Ok(Value::Bool(lhs || rhs)),
                        _ => Err(Error::mismatch(
                            "a boolean operand evaluated to a non-boolean value",
                        )),
                    }
                })
            }
            Node::Ite {
                guard,
                then_branch,
                else_branch,
            } => {
                let guard = self.thunk(guard);
                let then_branch = self.thunk(then_branch);
                let else_branch = self.thunk(else_branch);
                Rc::new(move |activation| match guard(activation)? {
                    Value::Bool(true) => then_branch(activation),
                    Value::Bool(false) => else_branch(activation),
                    _ => Err(Error::mismatch("a boolean operand evaluated to a non-boolean value")),
                })
            }
            Node::Eq(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                Ok(Value::Bool(lhs == rhs))
            }),
            Node::Leq(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                Ok(Value::Bool(int_compare(&lhs, &rhs)? != Ordering::Greater))
            }),
            Node::Geq(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                Ok(Value::Bool(int_compare(&lhs, &rhs)? != Ordering::Less))
            }),
            Node::Sum(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                int_binary(&lhs, &rhs, u64::wrapping_add)
            }),
            Node::Minus(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                int_binary(&lhs, &rhs, u64::wrapping_sub)
            }),
            Node::Multiply(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                int_binary(&lhs, &rhs, u64::wrapping_mul)
            }),
            Node::Maximum(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                Ok(if int_compare(&lhs, &rhs)? == Ordering::Less {
                    rhs
                } else {
                    lhs
                })
            }),
            Node::Minimum(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                Ok(if int_compare(&lhs, &rhs)? == Ordering::Greater {
                    rhs
                } else {
                    lhs
                })
            }),
            Node::BitAnd(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                int_binary(&lhs, &rhs, |l, r| l & r)
            }),
            Node::BitOr(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                int_binary(&lhs, &rhs, |l, r| l | r)
            }),
            Node::BitXor(a, b) => binary(self.thunk(a), self.thunk(b), |lhs, rhs| {
                int_binary(&lhs, &rhs, |l, r| l ^ r)
            }),
            Node::BitNot(a) => {
                let a = self.thunk(a);
                Rc::new(move |activation| int_unary(&a(activation)?, |bits| !bits))
            }
            Node::EmptyList { .. } => Rc::new(|_| Ok(Value::List(Vec::new()))),
            Node::AddFront { head, tail } => {
                binary(self.thunk(head), self.thunk(tail), |head, tail| match tail {
                    Value::List(mut elems) => {
                        elems.insert(0, head);
                        Ok(Value::List(elems))
                    }
                    _ => Err(Error::mismatch("a list operand evaluated to a non-list value")),
                })
            }
            Node::ListCase {
                list,
                empty,
                head,
                tail,
                cons,
            } => {
                let list = self.thunk(list);
                let empty = self.thunk(empty);
                self.binders.push(head);
                self.binders.push(tail);
                let cons = self.thunk(cons);
                self.binders.pop();
                self.binders.pop();
                Rc::new(move |activation| {
                    let elems = match list(activation)? {
                        Value::List(elems) => elems,
                        _ => {
                            return Err(Error::mismatch(
                                "a list operand evaluated to a non-list value",
                            ))
                        }
                    };
                    match elems.split_first() {
                        None => empty(activation),
                        Some((first, rest)) => {
                            activation.stack.push(first.clone());
                            activation.stack.push(Value::List(rest.to_vec()));
                            let result = cons(activation);
                            activation.stack.pop();
                            activation.stack.pop();
                            result
                        }
                    }
                })
            }
            Node::CreateObject { record, fields } => {
                let fields: Vec<Thunk> =
                    fields.into_iter().map(|field| self.thunk(field)).collect();
                Rc::new(move |activation| {
                    let values = fields
                        .iter()
                        .map(|field| field(activation))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::Record(Rc::clone(&record), values))
                })
            }
            Node::GetField { object, field } => {
                let object = self.thunk(object);
                Rc::new(move |activation| match object(activation)? {
                    Value::Record(_, values) => Ok(values[field].clone()),
                    _ => Err(Error::mismatch(
                        "a record operand evaluated to a non-record value",
                    )),
                })
            }
            Node::WithField {
                object,
                field,
                value,
            } => binary(self.thunk(object), self.thunk(value), move |object, new| {
                match object {
                    Value::Record(record, mut values) => {
                        values[field] = new;
                        Ok(Value::Record(record, values))
                    }
                    _ => Err(Error::mismatch(
                        "a record operand evaluated to a non-record value",
                    )),
                }
            }),
        }
    }
}
