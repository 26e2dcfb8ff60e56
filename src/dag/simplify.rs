//! Constant-folding rewrites over the expression DAG.
//!
//! The pass is a single memoised bottom-up sweep; every rewrite is local and
//! strictly reduces structural complexity, so the pass terminates on the
//! finite DAG. All rewrites preserve the interpreted semantics (see the
//! soundness property in the integration tests).
use super::{Dag, Node};
use crate::datatypes::expr::{int_binary, int_compare, int_unary, Expr, Type, Value};
use std::{cmp::Ordering, collections::HashMap};

/// Rewrites the given expression and returns the simplified identifier.
/// Sub-expressions shared with other expressions stay valid; the arena only
/// grows by the rewritten nodes.
pub fn simplify(dag: &mut Dag, root: Expr) -> Expr {
    let mut memo: HashMap<Expr, Expr> = HashMap::new();
    let result = simplify_rec(dag, root, &mut memo);
    log::debug!("simplified {} to {}", root, result);
    result
}

fn constant_of(dag: &Dag, expr: Expr) -> Option<Value> {
    match dag.node(expr) {
        Node::Const(value) => Some(value.clone()),
        _ => None,
    }
}

fn simplify_rec(dag: &mut Dag, expr: Expr, memo: &mut HashMap<Expr, Expr>) -> Expr {
    if let Some(done) = memo.get(&expr) {
        return *done;
    }
    let ty = dag.expr_type(expr).clone();
    let node = dag.node(expr).clone();
    let result = match node {
        Node::Const(_)
        | Node::Arbitrary { .. }
        | Node::Argument { .. }
        | Node::EmptyList { .. } => expr,
        Node::Adapter { inner, chain } => {
            let inner = simplify_rec(dag, inner, memo);
            dag.intern(Node::Adapter { inner, chain }, ty)
        }
        Node::Not(a) => {
            let a = simplify_rec(dag, a, memo);
            match dag.node(a).clone() {
                Node::Const(Value::Bool(b)) => dag.lift(!b),
                Node::Not(inner) => inner,
                _ => dag.intern(Node::Not(a), ty),
            }
        }
        Node::And(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            match (constant_of(dag, a), constant_of(dag, b)) {
                (Some(Value::Bool(false)), _) | (_, Some(Value::Bool(false))) => dag.lift(false),
                (Some(Value::Bool(true)), _) => b,
                (_, Some(Value::Bool(true))) => a,
                _ if a == b => a,
                _ => dag.intern(Node::And(a, b), ty),
            }
        }
        Node::Or(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            match (constant_of(dag, a), constant_of(dag, b)) {
                (Some(Value::Bool(true)), _) | (_, Some(Value::Bool(true))) => dag.lift(true),
                (Some(Value::Bool(false)), _) => b,
                (_, Some(Value::Bool(false))) => a,
                _ if a == b => a,
                _ => dag.intern(Node::Or(a, b), ty),
            }
        }
        Node::Ite {
            guard,
            then_branch,
            else_branch,
        } => {
            let guard = simplify_rec(dag, guard, memo);
            let then_branch = simplify_rec(dag, then_branch, memo);
            let else_branch = simplify_rec(dag, else_branch, memo);
            match constant_of(dag, guard) {
                Some(Value::Bool(true)) => then_branch,
                Some(Value::Bool(false)) => else_branch,
                _ if then_branch == else_branch => then_branch,
                _ => dag.intern(
                    Node::Ite {
                        guard,
                        then_branch,
                        else_branch,
                    },
                    ty,
                ),
            }
        }
        Node::Eq(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            if a == b {
                dag.lift(true)
            } else {
                match (constant_of(dag, a), constant_of(dag, b)) {
                    (Some(lhs), Some(rhs)) => dag.lift(lhs == rhs),
                    _ => dag.intern(Node::Eq(a, b), ty),
                }
            }
        }
        Node::Leq(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            fold_compare(dag, a, b, ty, true)
        }
        Node::Geq(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            fold_compare(dag, a, b, ty, false)
        }
        Node::Sum(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            fold_arith(dag, a, b, ty, Node::Sum, |x, y| {
                int_binary(&x, &y, u64::wrapping_add)
            })
        }
        Node::Minus(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            fold_arith(dag, a, b, ty, Node::Minus, |x, y| {
                int_binary(&x, &y, u64::wrapping_sub)
            })
        }
        Node::Multiply(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            fold_arith(dag, a, b, ty, Node::Multiply, |x, y| {
                int_binary(&x, &y, u64::wrapping_mul)
            })
        }
        Node::Maximum(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            fold_arith(dag, a, b, ty, Node::Maximum, |x, y| {
                int_compare(&x, &y).map(|ord| if ord == Ordering::Less { y } else { x })
            })
        }
        Node::Minimum(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            fold_arith(dag, a, b, ty, Node::Minimum, |x, y| {
                int_compare(&x, &y).map(|ord| if ord == Ordering::Greater { y } else { x })
            })
        }
        Node::BitAnd(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            if a == b {
                a
            } else {
                fold_arith(dag, a, b, ty, Node::BitAnd, |x, y| {
                    int_binary(&x, &y, |l, r| l & r)
                })
            }
        }
        Node::BitOr(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            if a == b {
                a
            } else {
                fold_arith(dag, a, b, ty, Node::BitOr, |x, y| {
                    int_binary(&x, &y, |l, r| l | r)
                })
            }
        }
        Node::BitXor(a, b) => {
            let a = simplify_rec(dag, a, memo);
            let b = simplify_rec(dag, b, memo);
            if a == b {
                let int = dag
                    .expr_type(a)
                    .as_int()
                    .expect("bitxor operands are integers by construction");
                dag.constant(Value::from_bits(int, 0))
                    .expect("integer constants always carry their type")
            } else {
                fold_arith(dag, a, b, ty, Node::BitXor, |x, y| {
                    int_binary(&x, &y, |l, r| l ^ r)
                })
            }
        }
        Node::BitNot(a) => {
            let a = simplify_rec(dag, a, memo);
            match dag.node(a).clone() {
                Node::BitNot(inner) => inner,
                Node::Const(value) => {
                    let folded = int_unary(&value, |bits| !bits)
                        .expect("bitnot operands are integers by construction");
                    dag.constant(folded)
                        .expect("integer constants always carry their type")
                }
                _ => dag.intern(Node::BitNot(a), ty),
            }
        }
        Node::AddFront { head, tail } => {
            let head = simplify_rec(dag, head, memo);
            let tail = simplify_rec(dag, tail, memo);
            dag.intern(Node::AddFront { head, tail }, ty)
        }
        Node::ListCase {
            list,
            empty,
            head,
            tail,
            cons,
        } => {
            let list = simplify_rec(dag, list, memo);
            let empty = simplify_rec(dag, empty, memo);
            let cons = simplify_rec(dag, cons, memo);
            if matches!(dag.node(list), Node::EmptyList { .. }) {
                empty
            } else {
                dag.intern(
                    Node::ListCase {
                        list,
                        empty,
                        head,
                        tail,
                        cons,
                    },
                    ty,
                )
            }
        }
        Node::CreateObject { record, fields } => {
            let fields = fields
                .into_iter()
                .map(|field| simplify_rec(dag, field, memo))
                .collect();
            dag.intern(Node::CreateObject { record, fields }, ty)
        }
        Node::GetField { object, field } => {
            let mut object = simplify_rec(dag, object, memo);
            // walk through construction and override layers to the field
            loop {
                match dag.node(object).clone() {
                    Node::CreateObject { fields, .. } => break fields[field],
                    Node::WithField {
                        object: inner,
                        field: overridden,
                        value,
                    } => {
                        if overridden == field {
                            break value;
                        }
                        object = inner;
                    }
                    _ => break dag.intern(Node::GetField { object, field }, ty),
                }
            }
        }
        Node::WithField {
            object,
            field,
            value,
        } => {
            let object = simplify_rec(dag, object, memo);
            let value = simplify_rec(dag, value, memo);
            match dag.node(object).clone() {
                Node::CreateObject { record, mut fields } => {
                    fields[field] = value;
                    dag.intern(Node::CreateObject { record, fields }, ty)
                }
                _ => dag.intern(
                    Node::WithField {
                        object,
                        field,
                        value,
                    },
                    ty,
                ),
            }
        }
    };
    memo.insert(expr, result);
    result
}

fn fold_compare(dag: &mut Dag, a: Expr, b: Expr, ty: Type, leq: bool) -> Expr {
    if a == b {
        return dag.lift(true);
    }
    match (constant_of(dag, a), constant_of(dag, b)) {
        (Some(lhs), Some(rhs)) => {
            let ord = int_compare(&lhs, &rhs)
                .expect("comparison operands are integers by construction");
            let holds = if leq {
                ord != Ordering::Greater
            } else {
                ord != Ordering::Less
            };
            dag.lift(holds)
        }
        _ => {
            let node = if leq { Node::Leq(a, b) } else { Node::Geq(a, b) };
            dag.intern(node, ty)
        }
    }
}

fn fold_arith(
    dag: &mut Dag,
    a: Expr,
    b: Expr,
    ty: Type,
    build: impl FnOnce(Expr, Expr) -> Node,
    fold: impl FnOnce(Value, Value) -> Result<Value, crate::datatypes::Error>,
) -> Expr {
    match (constant_of(dag, a), constant_of(dag, b)) {
        (Some(lhs), Some(rhs)) => {
            let folded =
                fold(lhs, rhs).expect("arithmetic operands are integers by construction");
            dag.constant(folded)
                .expect("integer constants always carry their type")
        }
        _ => dag.intern(build(a, b), ty),
    }
}
