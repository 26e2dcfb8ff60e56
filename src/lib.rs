/*!
This library reasons about typed expressions symbolically, by utilising an
implementation of `Ordered Binary Decision Diagrams (OBDD)`.

# Symbolic expressions
A user builds ordinary expressions over symbolic values of boolean, integer,
record, list, map, and option types inside a hash-consed
[expression DAG][crate::dag::Dag]. The library compiles such an expression
into the vocabulary of a [solver][crate::solver::Solver] and answers three
kinds of queries:

- [**find**][crate::check::find] an input satisfying a boolean expression,
- **check** a function against its [compiled][crate::interpret::compile]
  counterpart (the two evaluation paths are semantically equivalent),
- compute [**state-set transformers**][crate::stateset::StateSetTransformer],
  relational encodings of pure functions with forward image, preimage,
  union, intersection, complement, and emptiness testing.

# Reduced Ordered Binary Decision Diagram (roBDD)
A `reduced ordered binary decision diagram` is a normalised representation of
binary functions, where satisfiability- and validity checks can be done
relatively cheap and no redundant information is stored. One
[manager][crate::obdd::Bdd] holds every diagram of an analysis, so
reductions on shared sub-diagrams are computed once and cached.

Integer expressions become one diagram per bit. Because relational
constraints between two integers blow up unless their bits alternate in the
variable order, a [scan][crate::interleave::analyze] over the expression
groups the integer unknowns that must share an interleaved variable block
before any variable is allocated.

# Usage examples
Find a satisfying input of an arithmetic constraint:
```rust
use zen_bdd::check::{find, Options};
use zen_bdd::dag::Dag;
use zen_bdd::datatypes::expr::{IntType, Type, Value};

let mut dag = Dag::new();
let a = dag.arbitrary(&Type::Int(IntType::U32)).expect("u32 is a primitive type");
let four = dag.lift(4u32);
let ten = dag.lift(10u32);
let sum = dag.sum(a, four).expect("operands share one width");
let goal = dag.eq(sum, ten).expect("operands share one type");

let witness = find(&mut dag, goal, &Options::default())
    .expect("the query runs")
    .expect("6 + 4 = 10");
assert_eq!(witness[&a], Value::U32(6));
```

Precompute the relational encoding of `|i| i + 1` and query it as a set:
```rust
use zen_bdd::datatypes::expr::{IntType, Type, Value};
use zen_bdd::stateset::TransformerContext;

let ctx = TransformerContext::new();
let word = Type::Int(IntType::U32);
let add_one = ctx
    .transformer(&word, &word, |dag, input| {
        let one = dag.lift(1u32);
        dag.sum(input, one)
    })
    .expect("the function is well typed");

// which inputs map to 10?
let sources = add_one
    .input_set_where(|dag, _input, output| {
        let ten = dag.lift(10u32);
        dag.eq(output, ten)
    })
    .expect("the invariant is well typed");
assert_eq!(sources.element().expect("extraction runs"), Some(Value::U32(9)));
```

Stream the elements of a small set to a consumer thread as they are
produced:
```rust
use zen_bdd::datatypes::expr::{IntType, Type};
use zen_bdd::stateset::TransformerContext;

let (sender, receiver) = crossbeam_channel::unbounded();
let printer = std::thread::spawn(move || receiver.iter().count());

let ctx = TransformerContext::new();
let tiny = ctx
    .state_set(&Type::Int(IntType::U8), |dag, value| {
        let three = dag.lift(3u8);
        dag.leq(value, three)
    })
    .expect("the predicate is well typed");
tiny.elements_channel(&sender).expect("streaming runs");
drop(sender);
assert_eq!(printer.join().expect("the consumer finishes"), 4);
```
*/
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod check;
pub mod dag;
pub mod datatypes;
pub mod generate;
pub mod interleave;
pub mod interpret;
pub mod obdd;
pub mod solver;
pub mod stateset;
pub mod symbolic;
