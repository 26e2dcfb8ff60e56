//! The model-checker facade.
//!
//! [find] wires the pipeline together for the built-in backend: optional
//! [simplification][crate::dag::simplify::simplify], the
//! [interleaving scan][crate::interleave::analyze], solver construction
//! with the scanned layout, [symbolic evaluation][crate::symbolic::Evaluator]
//! and witness reconstruction. [find_with_solver] is the same pipeline over
//! any [Solver] implementation and is the hook for external SMT backends.
use crate::{
    dag::{simplify::simplify, Dag},
    datatypes::{
        expr::{Expr, Type, Value},
        Error,
    },
    interleave,
    solver::{bdd::BddSolver, Solver},
    symbolic::{Evaluator, SymbolicValue},
};
use std::{collections::HashMap, str::FromStr};

/// The decision procedures the facade can select.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    /// The in-crate decision-diagram backend; the default.
    Bdd,
    /// An external SMT backend. The crate does not ship one; supply an
    /// implementation of [Solver] via [find_with_solver].
    Smt,
}

/// Configuration of a [find] query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// The backend to solve with.
    pub backend: Backend,
    /// Whether to run the simplifier before evaluation.
    pub simplify: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            backend: Backend::Bdd,
            simplify: true,
        }
    }
}

impl Options {
    /// Reads overrides from the environment: `ZEN_BDD_BACKEND` (`bdd` or
    /// `smt`) and `ZEN_BDD_SIMPLIFY` (`true` or `false`). Unset or
    /// malformed variables keep the defaults.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(backend) = std::env::var("ZEN_BDD_BACKEND") {
            if let Ok(backend) = Backend::from_str(&backend) {
                options.backend = backend;
            }
        }
        if let Ok(flag) = std::env::var("ZEN_BDD_SIMPLIFY") {
            if let Ok(flag) = flag.parse() {
                options.simplify = flag;
            }
        }
        options
    }
}

/// A satisfying assignment: one concrete value per arbitrary the constraint
/// reaches. Arbitraries the solver left unconstrained default to zero or
/// false.
pub type Assignment = HashMap<Expr, Value>;

/// Finds an input satisfying the boolean expression, or [None] if there is
/// none within the generated bounds.
pub fn find(dag: &mut Dag, constraint: Expr, options: &Options) -> Result<Option<Assignment>, Error> {
    if *dag.expr_type(constraint) != Type::Bool {
        return Err(Error::invalid(format!(
            "find requires a boolean constraint, got {}",
            dag.expr_type(constraint)
        )));
    }
    match options.backend {
        Backend::Smt => Err(Error::unsupported(
            "no smt backend is built in; supply one through find_with_solver",
        )),
        Backend::Bdd => {
            log::info!("[Start] find over the decision-diagram backend");
            let goal = if options.simplify {
                simplify(dag, constraint)
            } else {
                constraint
            };
            let layout = interleave::analyze(dag, goal);
            let mut solver = BddSolver::with_layout(dag, &layout);
            let result = find_with_solver(dag, goal, &mut solver);
            log::info!("[Done] find");
            result
        }
    }
}

/// The [find] pipeline over a caller-supplied solver. The constraint is
/// evaluated as given; run the [simplifier][crate::dag::simplify::simplify]
/// first if wanted.
pub fn find_with_solver<S: Solver>(
    dag: &Dag,
    constraint: Expr,
    solver: &mut S,
) -> Result<Option<Assignment>, Error> {
    let mut evaluator = Evaluator::new(dag, solver);
    let value = evaluator.evaluate(constraint)?;
    let goal = match value {
        SymbolicValue::Bool(goal) => goal,
        other => {
            return Err(Error::mismatch(format!(
                "a boolean constraint evaluated to {:?}",
                other
            )))
        }
    };
    let variables = evaluator.into_variables();
    let model = match solver.satisfiable(&goal) {
        None => return Ok(None),
        Some(model) => model,
    };
    let mut assignment = Assignment::new();
    for (arbitrary, variable) in variables {
        let signed = solver.model_value(&model, &variable);
        let value = match dag.expr_type(arbitrary) {
            Type::Bool => Value::Bool(signed != 0),
            Type::Int(int) => Value::from_signed_bits(*int, signed),
            other => {
                return Err(Error::mismatch(format!(
                    "a solver variable of composite type {}",
                    other
                )))
            }
        };
        log::debug!("witness {} = {:?}", arbitrary, value);
        assignment.insert(arbitrary, value);
    }
    Ok(Some(assignment))
}

/// Finds a witness and interprets the given input expressions under it,
/// returning one concrete value per input. Between one and four inputs are
/// supported.
pub fn find_inputs(
    dag: &mut Dag,
    constraint: Expr,
    inputs: &[Expr],
    options: &Options,
) -> Result<Option<Vec<Value>>, Error> {
    if inputs.is_empty() || inputs.len() > 4 {
        return Err(Error::invalid(format!(
            "find_inputs supports between 1 and 4 inputs, got {}",
            inputs.len()
        )));
    }
    let assignment = match find(dag, constraint, options)? {
        None => return Ok(None),
        Some(assignment) => assignment,
    };
    let env = crate::interpret::Environment::with_assignment(assignment);
    let values = inputs
        .iter()
        .map(|input| crate::interpret::interpret(dag, *input, &env))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(values))
}
