//! The diagram manager: a reduced ordered binary decision diagram over a
//! shared collection of nodes.
//!
//! One manager holds (possibly) many diagrams at once; each diagram is
//! identified by its root [`Term`]. Because all diagrams of one analysis
//! share a signature (the allocated [variables][Var]), reductions on shared
//! sub-diagrams are computed once and cached in the node table.
//!
//! Beyond the usual boolean connectives, the manager provides the three
//! operations the [state-set layer][crate::stateset] is built on:
//! [existential quantification][Bdd::exists], [variable
//! substitution][Bdd::replace], and [witness extraction][Bdd::sat_witness],
//! plus [exact model counting][Bdd::count_in] over a declared variable
//! universe.
pub mod vectorize;

use crate::datatypes::{BddNode, Term, Var};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::{cmp::min, collections::HashMap, fmt::Display};

fn var_bit(var: Var) -> u32 {
    var.value()
        .try_into()
        .expect("variable bookkeeping assumes no more than u32::MAX variables")
}

/// Contains the data of (possibly) multiple diagrams, managed over one
/// collection of nodes.
#[derive(Debug, Serialize, Deserialize)]
pub struct Bdd {
    pub(crate) nodes: Vec<BddNode>,
    #[serde(skip)]
    var_deps: Vec<RoaringBitmap>,
    #[serde(with = "vectorize")]
    cache: HashMap<BddNode, Term>,
}

impl Display for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, " ")?;
        for (idx, elem) in self.nodes.iter().enumerate() {
            writeln!(f, "{} {}", idx, *elem)?;
        }
        Ok(())
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Self::new()
    }
}

impl Bdd {
    /// Instantiates a new manager. The terminal nodes for the
    /// [`⊤`][Term::TOP] and [`⊥`][Term::BOT] concepts are prepared in that
    /// step too.
    pub fn new() -> Self {
        Self {
            nodes: vec![BddNode::bot_node(), BddNode::top_node()],
            var_deps: vec![RoaringBitmap::new(), RoaringBitmap::new()],
            cache: HashMap::new(),
        }
    }

    /// Instantiates a [variable][Var] and returns the representing diagram.
    pub fn variable(&mut self, var: Var) -> Term {
        self.node(var, Term::BOT, Term::TOP)
    }

    /// Instantiates a constant diagram, which is either [true] or [false].
    pub fn constant(val: bool) -> Term {
        if val {
            Term::TOP
        } else {
            Term::BOT
        }
    }

    /// Returns the negation of the given diagram.
    pub fn not(&mut self, term: Term) -> Term {
        self.if_then_else(term, Term::BOT, Term::TOP)
    }

    /// Returns the conjunction of the two given diagrams.
    pub fn and(&mut self, term_a: Term, term_b: Term) -> Term {
        self.if_then_else(term_a, term_b, Term::BOT)
    }

    /// Returns the disjunction of the two given diagrams.
    pub fn or(&mut self, term_a: Term, term_b: Term) -> Term {
        self.if_then_else(term_a, Term::TOP, term_b)
    }

    /// Returns the equivalence of the two given diagrams.
    pub fn iff(&mut self, term_a: Term, term_b: Term) -> Term {
        let not_b = self.not(term_b);
        self.if_then_else(term_a, term_b, not_b)
    }

    /// Returns the exclusive disjunction of the two given diagrams.
    pub fn xor(&mut self, term_a: Term, term_b: Term) -> Term {
        let not_b = self.not(term_b);
        self.if_then_else(term_a, not_b, term_b)
    }

    /// Restrict the value of a given [variable][Var] to **val**.
    pub fn restrict(&mut self, tree: Term, var: Var, val: bool) -> Term {
        if !self.var_deps[tree.value()].contains(var_bit(var)) {
            return tree;
        }
        let node = self.nodes[tree.0];
        // keep the three ordering cases visibly separate
        #[allow(clippy::collapsible_else_if)]
        if node.var() > var || node.var() >= Var::BOT {
            tree
        } else if node.var() < var {
            let lonode = self.restrict(node.lo(), var, val);
            let hinode = self.restrict(node.hi(), var, val);
            self.node(node.var(), lonode, hinode)
        } else {
            if val {
                self.restrict(node.hi(), var, val)
            } else {
                self.restrict(node.lo(), var, val)
            }
        }
    }

    /// Creates a diagram based on the relation of three diagrams, which are
    /// in an `if-then-else` relation.
    pub fn if_then_else(&mut self, i: Term, t: Term, e: Term) -> Term {
        if i == Term::TOP {
            t
        } else if i == Term::BOT {
            e
        } else if t == e {
            t
        } else if t == Term::TOP && e == Term::BOT {
            i
        } else {
            let minvar = Var(min(
                self.nodes[i.value()].var().value(),
                min(
                    self.nodes[t.value()].var().value(),
                    self.nodes[e.value()].var().value(),
                ),
            ));
            let itop = self.restrict(i, minvar, true);
            let ttop = self.restrict(t, minvar, true);
            let etop = self.restrict(e, minvar, true);
            let ibot = self.restrict(i, minvar, false);
            let tbot = self.restrict(t, minvar, false);
            let ebot = self.restrict(e, minvar, false);

            let top_ite = self.if_then_else(itop, ttop, etop);
            let bot_ite = self.if_then_else(ibot, tbot, ebot);
            self.node(minvar, bot_ite, top_ite)
        }
    }

    /// Existentially quantifies every variable of **vars** in the given
    /// diagram: each step replaces the diagram by the disjunction of its two
    /// cofactors. Variables the diagram does not depend on are skipped.
    pub fn exists(&mut self, tree: Term, vars: &RoaringBitmap) -> Term {
        let mut result = tree;
        for var in vars.iter() {
            if !self.var_deps[result.value()].contains(var) {
                continue;
            }
            let var = Var(var as usize);
            let lo = self.restrict(result, var, false);
            let hi = self.restrict(result, var, true);
            result = self.or(lo, hi);
            log::trace!("exists {}: {} -> {}", var, tree, result);
        }
        result
    }

    /// Substitutes variables in the given diagram according to **map**.
    /// The diagram is rebuilt bottom-up, so the map does not need to respect
    /// the variable order. The substitution must be injective on the
    /// variables the diagram depends on.
    pub fn replace(&mut self, tree: Term, map: &HashMap<Var, Var>) -> Term {
        let mut memo: HashMap<Term, Term> = HashMap::new();
        self.replace_rec(tree, map, &mut memo)
    }

    fn replace_rec(
        &mut self,
        tree: Term,
        map: &HashMap<Var, Var>,
        memo: &mut HashMap<Term, Term>,
    ) -> Term {
        if tree.is_truth_value() {
            return tree;
        }
        if let Some(done) = memo.get(&tree) {
            return *done;
        }
        let node = self.nodes[tree.value()];
        let lo = self.replace_rec(node.lo(), map, memo);
        let hi = self.replace_rec(node.hi(), map, memo);
        let target = map.get(&node.var()).copied().unwrap_or_else(|| node.var());
        let guard = self.variable(target);
        let result = self.if_then_else(guard, hi, lo);
        memo.insert(tree, result);
        result
    }

    /// Extracts any satisfying assignment of the given diagram, or [None] if
    /// it is `⊥`. Variables missing from the returned path are
    /// unconstrained.
    pub fn sat_witness(&self, tree: Term) -> Option<Vec<(Var, bool)>> {
        if tree == Term::BOT {
            return None;
        }
        let mut path = Vec::new();
        let mut current = tree;
        while !current.is_truth_value() {
            let node = self.nodes[current.value()];
            // every reduced non-⊥ node has a path to ⊤
            if node.hi() != Term::BOT {
                path.push((node.var(), true));
                current = node.hi();
            } else {
                path.push((node.var(), false));
                current = node.lo();
            }
        }
        Some(path)
    }

    /// Extracts a satisfying assignment along a randomly chosen path.
    /// Callers must not rely on any distribution over the models.
    pub fn random_witness(&self, tree: Term, rng: &mut impl rand::Rng) -> Option<Vec<(Var, bool)>> {
        if tree == Term::BOT {
            return None;
        }
        let mut path = Vec::new();
        let mut current = tree;
        while !current.is_truth_value() {
            let node = self.nodes[current.value()];
            let pick_hi = if node.hi() == Term::BOT {
                false
            } else if node.lo() == Term::BOT {
                true
            } else {
                rng.gen_bool(0.5)
            };
            path.push((node.var(), pick_hi));
            current = if pick_hi { node.hi() } else { node.lo() };
        }
        Some(path)
    }

    /// Counts the satisfying assignments of the given diagram over the
    /// declared **universe** of variables, which must contain every variable
    /// the diagram depends on.
    pub fn count_in(&self, tree: Term, universe: &[Var]) -> u128 {
        let mut ordered: Vec<Var> = universe.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        debug_assert!(
            self.var_deps[tree.value()]
                .iter()
                .all(|dep| ordered.binary_search(&Var(dep as usize)).is_ok()),
            "the universe must cover the dependencies of the diagram"
        );
        let mut memo: HashMap<(Term, usize), u128> = HashMap::new();
        self.count_rec(tree, 0, &ordered, &mut memo)
    }

    fn count_rec(
        &self,
        tree: Term,
        position: usize,
        universe: &[Var],
        memo: &mut HashMap<(Term, usize), u128>,
    ) -> u128 {
        let remaining = universe.len() - position;
        if tree == Term::BOT {
            return 0;
        }
        if tree == Term::TOP {
            return 1u128 << remaining;
        }
        if let Some(count) = memo.get(&(tree, position)) {
            return *count;
        }
        let node = self.nodes[tree.value()];
        let level = universe[position..]
            .iter()
            .position(|var| *var == node.var())
            .expect("the universe must cover the dependencies of the diagram")
            + position;
        let below = self.count_rec(node.lo(), level + 1, universe, memo)
            + self.count_rec(node.hi(), level + 1, universe, memo);
        let count = below << (level - position);
        memo.insert((tree, position), count);
        count
    }

    /// Visits every satisfying assignment of the diagram over the declared
    /// **universe**, which must cover the diagram's dependencies. The
    /// visitor returns false to stop the walk early; the method reports
    /// whether the walk ran to completion.
    pub fn foreach_model(
        &self,
        tree: Term,
        universe: &[Var],
        visit: &mut dyn FnMut(&[(Var, bool)]) -> bool,
    ) -> bool {
        let mut ordered: Vec<Var> = universe.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        let mut scratch = Vec::with_capacity(ordered.len());
        self.walk_models(tree, &ordered, 0, &mut scratch, visit)
    }

    fn walk_models(
        &self,
        tree: Term,
        universe: &[Var],
        position: usize,
        scratch: &mut Vec<(Var, bool)>,
        visit: &mut dyn FnMut(&[(Var, bool)]) -> bool,
    ) -> bool {
        if tree == Term::BOT {
            return true;
        }
        if position == universe.len() {
            debug_assert!(
                tree == Term::TOP,
                "the universe must cover the dependencies of the diagram"
            );
            return visit(scratch);
        }
        let var = universe[position];
        let node = self.nodes[tree.value()];
        let (lo, hi) = if tree.is_truth_value() || node.var() > var {
            (tree, tree)
        } else {
            debug_assert_eq!(node.var(), var, "universe entries follow the variable order");
            (node.lo(), node.hi())
        };
        for (value, branch) in [(false, lo), (true, hi)] {
            scratch.push((var, value));
            let keep_going = self.walk_models(branch, universe, position + 1, scratch, visit);
            scratch.pop();
            if !keep_going {
                return false;
            }
        }
        true
    }

    /// Creates a new node in the diagram. It will not create duplicate
    /// nodes and reuses already existing nodes, if applicable.
    pub fn node(&mut self, var: Var, lo: Term, hi: Term) -> Term {
        if lo == hi {
            lo
        } else {
            let node = BddNode::new(var, lo, hi);
            match self.cache.get(&node) {
                Some(t) => *t,
                None => {
                    let new_term = Term(self.nodes.len());
                    self.nodes.push(node);
                    self.cache.insert(node, new_term);
                    let mut var_set =
                        &self.var_deps[lo.value()] | &self.var_deps[hi.value()];
                    var_set.insert(var_bit(var));
                    self.var_deps.push(var_set);
                    log::trace!("new node: {} as {:?}", new_term, node);
                    new_term
                }
            }
        }
    }

    /// Returns the set of [variables][Var] a given diagram depends on.
    pub fn var_dependencies(&self, tree: Term) -> &RoaringBitmap {
        &self.var_deps[tree.value()]
    }

    /// Repairs the internal dependency structures after an import, since
    /// they are not part of the serialised representation.
    pub fn fix_import(&mut self) {
        self.var_deps = Vec::with_capacity(self.nodes.len());
        // nodes reference only earlier nodes, so one forward pass suffices
        for idx in 0..self.nodes.len() {
            let node = self.nodes[idx];
            if node.var() >= Var::BOT {
                self.var_deps.push(RoaringBitmap::new());
            } else {
                let mut var_set =
                    &self.var_deps[node.lo().value()] | &self.var_deps[node.hi().value()];
                var_set.insert(var_bit(node.var()));
                self.var_deps.push(var_set);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn new_manager() {
        let bdd = Bdd::new();
        assert_eq!(bdd.nodes.len(), 2);
        assert_eq!(Bdd::constant(true), Term::TOP);
        assert_eq!(Bdd::constant(false), Term::BOT);
    }

    #[test]
    fn variables_are_shared() {
        let mut bdd = Bdd::new();
        assert_eq!(bdd.variable(Var(0)), Term(2));
        assert_eq!(bdd.variable(Var(1)), Term(3));
        bdd.variable(Var(0));
        assert_eq!(bdd.variable(Var(0)), Term(2));
    }

    #[test]
    fn connectives() {
        let mut bdd = Bdd::new();
        let v1 = bdd.variable(Var(0));
        let v2 = bdd.variable(Var(1));
        let nv1 = bdd.not(v1);

        let taut = bdd.or(v1, nv1);
        assert_eq!(taut, Term::TOP);
        let contr = bdd.and(v1, nv1);
        assert_eq!(contr, Term::BOT);

        let conj = bdd.and(v1, v2);
        assert_eq!(bdd.restrict(conj, Var(0), false), Term::BOT);
        assert_eq!(bdd.restrict(conj, Var(0), true), v2);

        let same = bdd.iff(v1, v1);
        assert_eq!(same, Term::TOP);
        let diff = bdd.xor(v1, v1);
        assert_eq!(diff, Term::BOT);
    }

    #[test]
    fn dependencies() {
        let mut bdd = Bdd::new();
        let v1 = bdd.variable(Var(0));
        let v2 = bdd.variable(Var(1));
        let conj = bdd.and(v1, v2);
        let deps = bdd.var_dependencies(conj);
        assert!(deps.contains(0));
        assert!(deps.contains(1));
        assert_eq!(deps.len(), 2);
        assert!(bdd.var_dependencies(Term::TOP).is_empty());
    }

    #[test]
    fn quantification() {
        let mut bdd = Bdd::new();
        let v1 = bdd.variable(Var(0));
        let v2 = bdd.variable(Var(1));
        let conj = bdd.and(v1, v2);

        let mut mask = RoaringBitmap::new();
        mask.insert(1);
        // ∃ v2. v1 ∧ v2 = v1
        assert_eq!(bdd.exists(conj, &mask), v1);
        mask.insert(0);
        // ∃ v1 v2. v1 ∧ v2 = ⊤
        assert_eq!(bdd.exists(conj, &mask), Term::TOP);
        assert_eq!(bdd.exists(Term::BOT, &mask), Term::BOT);
    }

    #[test]
    fn substitution() {
        let mut bdd = Bdd::new();
        let v1 = bdd.variable(Var(0));
        let v2 = bdd.variable(Var(1));
        let v3 = bdd.variable(Var(2));
        let conj = bdd.and(v1, v2);

        let mut map = HashMap::new();
        map.insert(Var(1), Var(2));
        let replaced = bdd.replace(conj, &map);
        let expected = bdd.and(v1, v3);
        assert_eq!(replaced, expected);

        // swapping against the variable order still works
        let mut swap = HashMap::new();
        swap.insert(Var(0), Var(1));
        swap.insert(Var(1), Var(0));
        let lo_hi = bdd.not(v2);
        let asym = bdd.and(v1, lo_hi);
        let swapped = bdd.replace(asym, &swap);
        let nv1 = bdd.not(v1);
        let expected = bdd.and(v2, nv1);
        assert_eq!(swapped, expected);
    }

    #[test]
    fn witnesses() {
        let mut bdd = Bdd::new();
        let v1 = bdd.variable(Var(0));
        let v2 = bdd.variable(Var(1));
        let nv1 = bdd.not(v1);
        let formula = bdd.and(nv1, v2);

        assert_eq!(bdd.sat_witness(Term::BOT), None);
        assert_eq!(bdd.sat_witness(Term::TOP), Some(vec![]));
        let path = bdd.sat_witness(formula).expect("the formula is satisfiable");
        assert!(path.contains(&(Var(0), false)));
        assert!(path.contains(&(Var(1), true)));

        let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(42);
        let random = bdd
            .random_witness(formula, &mut rng)
            .expect("the formula is satisfiable");
        assert!(random.contains(&(Var(0), false)));
    }

    #[test]
    fn counting() {
        let mut bdd = Bdd::new();
        let v1 = bdd.variable(Var(0));
        let v2 = bdd.variable(Var(1));
        let universe = [Var(0), Var(1), Var(2)];

        let conj = bdd.and(v1, v2);
        let disj = bdd.or(v1, v2);
        let anti = bdd.xor(v1, v2);

        assert_eq!(bdd.count_in(conj, &universe), 2);
        assert_eq!(bdd.count_in(disj, &universe), 6);
        assert_eq!(bdd.count_in(anti, &universe), 4);
        assert_eq!(bdd.count_in(Term::TOP, &universe), 8);
        assert_eq!(bdd.count_in(Term::BOT, &universe), 0);
        assert_eq!(bdd.count_in(v1, &[Var(0)]), 1);
    }

    #[test]
    fn serialize_roundtrip() {
        let mut bdd = Bdd::new();
        let v1 = bdd.variable(Var(0));
        let v2 = bdd.variable(Var(1));
        let formula = bdd.and(v1, v2);

        let exported = serde_json::to_string(&bdd).expect("the manager serialises");
        let mut imported: Bdd = serde_json::from_str(&exported).expect("the manager deserialises");
        imported.fix_import();

        assert_eq!(bdd.nodes, imported.nodes);
        let formula_again = imported.and(v1, v2);
        assert_eq!(formula, formula_again);
        assert_eq!(
            bdd.var_dependencies(formula),
            imported.var_dependencies(formula)
        );
    }
}
