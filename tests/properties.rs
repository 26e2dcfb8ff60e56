//! Property-based checks of the crate-wide invariants.
mod common;

use common::EnumSolver;
use quickcheck_macros::quickcheck;
use zen_bdd::{
    check::{find, find_with_solver, Options},
    dag::{simplify::simplify, Dag},
    datatypes::expr::{Expr, IntType, Type, Value},
    interpret::{compile::compile, interpret, Environment},
    solver::bdd::BddSolver,
    stateset::TransformerContext,
};

fn byte() -> Type {
    Type::Int(IntType::U8)
}

/// A small expression family over one arbitrary byte and one arbitrary
/// boolean, rich enough to cross most node kinds.
fn family(dag: &mut Dag, c: u8, d: u8) -> (Expr, Expr, Expr) {
    let a = dag.arbitrary(&byte()).unwrap();
    let flag = dag.arbitrary(&Type::Bool).unwrap();
    let c = dag.lift(c);
    let d = dag.lift(d);
    let sum = dag.sum(a, c).unwrap();
    let masked = dag.bitxor(a, d).unwrap();
    let inverted = dag.bitnot(masked).unwrap();
    let bigger = dag.maximum(sum, inverted).unwrap();
    let product = dag.multiply(a, c).unwrap();
    let picked = dag.ite(flag, bigger, product).unwrap();
    let bounded = dag.leq(picked, d).unwrap();
    let nontrivial = dag.geq(sum, c).unwrap();
    let goal = dag.and(bounded, nontrivial).unwrap();
    (goal, a, flag)
}

#[quickcheck]
fn find_is_sound(c: u8, d: u8) -> bool {
    let mut dag = Dag::new();
    let a = dag.arbitrary(&byte()).unwrap();
    let c_e = dag.lift(c);
    let d_e = dag.lift(d);
    let sum = dag.sum(a, c_e).unwrap();
    let below = dag.leq(sum, d_e).unwrap();
    let above = dag.geq(a, c_e).unwrap();
    let goal = dag.and(below, above).unwrap();

    match find(&mut dag, goal, &Options::default()).unwrap() {
        Some(witness) => {
            let env = Environment::with_assignment(witness);
            interpret(&dag, goal, &env).unwrap() == Value::Bool(true)
        }
        None => (0..=255u8).all(|candidate| {
            let mut env = Environment::new();
            env.assign(a, Value::U8(candidate));
            interpret(&dag, goal, &env).unwrap() == Value::Bool(false)
        }),
    }
}

#[quickcheck]
fn backends_agree_on_satisfiability(c: u8, d: u8) -> bool {
    // multiplication-free on purpose: the diagram backend rejects it
    let mut dag = Dag::new();
    let a = dag.arbitrary(&byte()).unwrap();
    let c_e = dag.lift(c);
    let d_e = dag.lift(d);
    let sum = dag.sum(a, c_e).unwrap();
    let masked = dag.bitxor(sum, d_e).unwrap();
    let below = dag.leq(masked, c_e).unwrap();
    let exact = dag.eq(sum, d_e).unwrap();
    let goal = dag.or(below, exact).unwrap();

    let diagram = find(&mut dag, goal, &Options::default()).unwrap();
    let mut reference = EnumSolver::new();
    let enumerated = find_with_solver(&dag, goal, &mut reference).unwrap();
    diagram.is_some() == enumerated.is_some()
}

#[quickcheck]
fn simplification_preserves_interpretation(c: u8, d: u8, a_value: u8, flag_value: bool) -> bool {
    let mut dag = Dag::new();
    let (goal, a, flag) = family(&mut dag, c, d);
    let simplified = simplify(&mut dag, goal);

    let mut env = Environment::new();
    env.assign(a, Value::U8(a_value));
    env.assign(flag, Value::Bool(flag_value));
    interpret(&dag, goal, &env).unwrap() == interpret(&dag, simplified, &env).unwrap()
}

#[quickcheck]
fn compiled_functions_match_the_interpreter(c: u8, d: u8, a_value: u8, flag_value: bool) -> bool {
    let mut dag = Dag::new();
    let (goal, a, flag) = family(&mut dag, c, d);
    let function = compile(&dag, goal);

    let mut env = Environment::new();
    env.assign(a, Value::U8(a_value));
    env.assign(flag, Value::Bool(flag_value));
    function.call(&env).unwrap() == interpret(&dag, goal, &env).unwrap()
}

#[quickcheck]
fn structurally_identical_expressions_share_identity(c: u8, d: u8) -> bool {
    let mut dag = Dag::new();
    let a = dag.arbitrary(&byte()).unwrap();
    let build = |dag: &mut Dag| {
        let c_e = dag.lift(c);
        let d_e = dag.lift(d);
        let sum = dag.sum(a, c_e).unwrap();
        let masked = dag.bitand(sum, d_e).unwrap();
        dag.eq(masked, c_e).unwrap()
    };
    let first = build(&mut dag);
    let second = build(&mut dag);
    first == second
}

#[quickcheck]
fn transformer_round_trips_contain_the_source(c: u8, k: u8) -> bool {
    let ctx = TransformerContext::new();
    let add_c = ctx
        .transformer(&byte(), &byte(), |dag, input| {
            let c = dag.lift(c);
            dag.sum(input, c)
        })
        .unwrap();
    let source = ctx
        .state_set(&byte(), |dag, value| {
            let k = dag.lift(k);
            dag.leq(value, k)
        })
        .unwrap();

    let image = add_c.transform_forward(&source).unwrap();
    let back = add_c.transform_backwards(&image).unwrap();
    // the round trip contains the source; addition is bijective modulo
    // the width, so equality holds as well
    back.intersect(&source).unwrap() == source && back == source
}

#[quickcheck]
fn interleaving_does_not_change_satisfiability(c: u8, d: u8) -> bool {
    let mut dag = Dag::new();
    let a = dag.arbitrary(&byte()).unwrap();
    let b = dag.arbitrary(&byte()).unwrap();
    let c_e = dag.lift(c);
    let d_e = dag.lift(d);
    let same = dag.eq(a, b).unwrap();
    let above = dag.geq(b, c_e).unwrap();
    let below = dag.leq(a, d_e).unwrap();
    let partial = dag.and(same, above).unwrap();
    let goal = dag.and(partial, below).unwrap();

    // interleaved allocation via the scanned layout
    let interleaved = find(&mut dag, goal, &Options::default()).unwrap();
    // sequential allocation: no layout, variables allocated on demand
    let mut sequential = BddSolver::new();
    let on_demand = find_with_solver(&dag, goal, &mut sequential).unwrap();
    interleaved.is_some() == on_demand.is_some()
}

#[quickcheck]
fn alignment_is_idempotent(k: u8) -> bool {
    let ctx = TransformerContext::new();
    let bounded = ctx
        .state_set(&byte(), |dag, value| {
            let k = dag.lift(k);
            dag.geq(value, k)
        })
        .unwrap();
    let aligned = bounded.align().unwrap();
    let again = aligned.align().unwrap();
    aligned == bounded && again == aligned
}
