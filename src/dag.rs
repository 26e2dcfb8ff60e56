//! The hash-consed expression DAG and its typed factory methods.
//!
//! All expression nodes of one analysis live in a [Dag] arena; an expression
//! is the identifier [Expr] of its root node. Every factory validates its
//! operands, constructs a lookup key from operand identifiers plus scalar
//! attributes, and returns the cached node on a hit — structurally identical
//! expressions therefore share one identifier and per-node work is done at
//! most once downstream.
//!
//! Nodes are immutable after construction and live as long as the arena.
pub mod simplify;

use crate::datatypes::{
    expr::{Expr, RecordDescriptor, Type, Value},
    Error,
};
use derivative::Derivative;
use std::{collections::HashMap, rc::Rc};

/// A converter applied by the [interpreter][crate::interpret] when it walks
/// through an [adapter][Dag::adapter] node.
pub type AdapterFn = dyn Fn(Value) -> Result<Value, Error>;

/// One node of the expression DAG.
///
/// Operands are stored as identifiers, scalar attributes inline; the
/// combination is the hash-cons key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Node {
    Const(Value),
    Arbitrary { serial: usize },
    Argument { name: String, ty: Type },
    Adapter { inner: Expr, chain: usize },
    Not(Expr),
    And(Expr, Expr),
    Or(Expr, Expr),
    Ite { guard: Expr, then_branch: Expr, else_branch: Expr },
    Eq(Expr, Expr),
    Leq(Expr, Expr),
    Geq(Expr, Expr),
    Sum(Expr, Expr),
    Minus(Expr, Expr),
    Multiply(Expr, Expr),
    Maximum(Expr, Expr),
    Minimum(Expr, Expr),
    BitAnd(Expr, Expr),
    BitOr(Expr, Expr),
    BitXor(Expr, Expr),
    BitNot(Expr),
    EmptyList { elem: Type },
    AddFront { head: Expr, tail: Expr },
    ListCase { list: Expr, empty: Expr, head: Expr, tail: Expr, cons: Expr },
    CreateObject { record: Rc<RecordDescriptor>, fields: Vec<Expr> },
    GetField { object: Expr, field: usize },
    WithField { object: Expr, field: usize, value: Expr },
}

/// The arena holding every node of one analysis, together with the
/// hash-cons table and the adapter converter chains.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Dag {
    nodes: Vec<Node>,
    types: Vec<Type>,
    cache: HashMap<Node, Expr>,
    #[derivative(Debug = "ignore")]
    adapters: Vec<Vec<Rc<AdapterFn>>>,
    next_serial: usize,
    next_binder: usize,
}

impl Default for Dag {
    fn default() -> Self {
        Self::new()
    }
}

impl Dag {
    /// Instantiates an empty arena.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            types: Vec::new(),
            cache: HashMap::new(),
            adapters: Vec::new(),
            next_serial: 0,
            next_binder: 0,
        }
    }

    /// Number of interned nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The result type of an expression.
    pub fn expr_type(&self, expr: Expr) -> &Type {
        &self.types[expr.value()]
    }

    pub(crate) fn node(&self, expr: Expr) -> &Node {
        &self.nodes[expr.value()]
    }

    pub(crate) fn adapter_chain(&self, chain: usize) -> &[Rc<AdapterFn>] {
        &self.adapters[chain]
    }

    pub(crate) fn intern(&mut self, node: Node, ty: Type) -> Expr {
        if let Some(cached) = self.cache.get(&node) {
            return *cached;
        }
        let expr = Expr(self.nodes.len());
        log::trace!("new expr: {} as {:?} : {}", expr, node, ty);
        self.cache.insert(node.clone(), expr);
        self.nodes.push(node);
        self.types.push(ty);
        expr
    }

    fn infer_value_type(value: &Value) -> Result<Type, Error> {
        match value {
            Value::Bool(_) => Ok(Type::Bool),
            Value::List(elems) => match elems.first() {
                Some(first) => Ok(Type::list_of(Self::infer_value_type(first)?)),
                None => Err(Error::invalid(
                    "the element type of an empty list constant is ambiguous, use typed_constant",
                )),
            },
            Value::Record(descriptor, _) => Ok(Type::Record(Rc::clone(descriptor))),
            int => Ok(Type::Int(
                int.int_type().expect("all remaining variants are integers"),
            )),
        }
    }

    fn value_matches(ty: &Type, value: &Value) -> bool {
        match (ty, value) {
            (Type::Bool, Value::Bool(_)) => true,
            (Type::Int(int), _) => value.int_type() == Some(*int),
            (Type::List(elem), Value::List(elems)) => {
                elems.iter().all(|e| Self::value_matches(elem, e))
            }
            (Type::Record(descriptor), Value::Record(actual, values)) => {
                descriptor == actual
                    && descriptor
                        .fields()
                        .iter()
                        .zip(values.iter())
                        .all(|(field, value)| Self::value_matches(&field.field_type, value))
            }
            _ => false,
        }
    }

    /// Interns a constant; the type is inferred from the value.
    /// Empty list constants need [typed_constant][Self::typed_constant].
    pub fn constant(&mut self, value: Value) -> Result<Expr, Error> {
        let ty = Self::infer_value_type(&value)?;
        Ok(self.intern(Node::Const(value), ty))
    }

    /// Interns a constant of an explicitly given type.
    pub fn typed_constant(&mut self, ty: &Type, value: Value) -> Result<Expr, Error> {
        if !Self::value_matches(ty, &value) {
            return Err(Error::invalid(format!(
                "constant {:?} does not have type {}",
                value, ty
            )));
        }
        Ok(self.intern(Node::Const(value), ty.clone()))
    }

    /// Lifts a host value into a constant node.
    pub fn lift(&mut self, value: impl Into<Value>) -> Expr {
        self.constant(value.into())
            .expect("lifted host values always carry their type")
    }

    /// Allocates a fresh free variable of a primitive type. Every call
    /// returns a distinct node; the node's identity is the variable.
    ///
    /// Composite types are materialised structurally by
    /// [`fresh_symbolic`][crate::generate::fresh_symbolic].
    pub fn arbitrary(&mut self, ty: &Type) -> Result<Expr, Error> {
        match ty {
            Type::Bool | Type::Int(_) => {
                let serial = self.next_serial;
                self.next_serial += 1;
                Ok(self.intern(Node::Arbitrary { serial }, ty.clone()))
            }
            other => Err(Error::invalid(format!(
                "arbitrary values of type {} are built by generate::fresh_symbolic",
                other
            ))),
        }
    }

    /// Interns a formal parameter with a stable name. Arguments are bound by
    /// the interpretation environment or by [list_case][Self::list_case].
    pub fn argument(&mut self, name: &str, ty: &Type) -> Expr {
        self.intern(
            Node::Argument {
                name: name.to_string(),
                ty: ty.clone(),
            },
            ty.clone(),
        )
    }

    /// A binder argument with a name no user argument can collide with.
    pub(crate) fn fresh_binder(&mut self, prefix: &str, ty: &Type) -> Expr {
        let name = format!("__{}#{}", prefix, self.next_binder);
        self.next_binder += 1;
        self.argument(&name, ty)
    }

    /// Wraps an expression into an adapter of the given result type.
    /// Symbolically the adapter is the identity; the converters fire only in
    /// concrete interpretation, in the given order.
    pub fn adapter(&mut self, inner: Expr, to: &Type, converters: Vec<Rc<AdapterFn>>) -> Expr {
        let chain = self.adapters.len();
        self.adapters.push(converters);
        self.intern(Node::Adapter { inner, chain }, to.clone())
    }

    fn expect_bool(&self, expr: Expr, context: &str) -> Result<(), Error> {
        if *self.expr_type(expr) == Type::Bool {
            Ok(())
        } else {
            Err(Error::invalid(format!(
                "{} requires a boolean operand, got {}",
                context,
                self.expr_type(expr)
            )))
        }
    }

    fn expect_int_pair(&self, a: Expr, b: Expr, context: &str) -> Result<(), Error> {
        match (self.expr_type(a), self.expr_type(b)) {
            (Type::Int(lhs), Type::Int(rhs)) if lhs == rhs => Ok(()),
            (lhs, rhs) => Err(Error::invalid(format!(
                "{} requires two integers of one width, got {} and {}",
                context, lhs, rhs
            ))),
        }
    }

    fn expect_same(&self, a: Expr, b: Expr, context: &str) -> Result<(), Error> {
        if self.expr_type(a) == self.expr_type(b) {
            Ok(())
        } else {
            Err(Error::invalid(format!(
                "{} requires operands of one type, got {} and {}",
                context,
                self.expr_type(a),
                self.expr_type(b)
            )))
        }
    }

    /// Logical negation.
    pub fn not(&mut self, expr: Expr) -> Result<Expr, Error> {
        self.expect_bool(expr, "not")?;
        Ok(self.intern(Node::Not(expr), Type::Bool))
    }

    /// Logical conjunction.
    pub fn and(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.expect_bool(a, "and")?;
        self.expect_bool(b, "and")?;
        Ok(self.intern(Node::And(a, b), Type::Bool))
    }

    /// Logical disjunction.
    pub fn or(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.expect_bool(a, "or")?;
        self.expect_bool(b, "or")?;
        Ok(self.intern(Node::Or(a, b), Type::Bool))
    }

    /// Conditional, polymorphic in the branch type.
    pub fn ite(&mut self, guard: Expr, then_branch: Expr, else_branch: Expr) -> Result<Expr, Error> {
        self.expect_bool(guard, "ite")?;
        self.expect_same(then_branch, else_branch, "ite")?;
        let ty = self.expr_type(then_branch).clone();
        Ok(self.intern(
            Node::Ite {
                guard,
                then_branch,
                else_branch,
            },
            ty,
        ))
    }

    /// Equality over any supported type.
    pub fn eq(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.expect_same(a, b, "eq")?;
        Ok(self.intern(Node::Eq(a, b), Type::Bool))
    }

    /// Less-or-equal over one integer type; signed widths compare signed.
    pub fn leq(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.expect_int_pair(a, b, "leq")?;
        Ok(self.intern(Node::Leq(a, b), Type::Bool))
    }

    /// Greater-or-equal over one integer type; signed widths compare signed.
    pub fn geq(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.expect_int_pair(a, b, "geq")?;
        Ok(self.intern(Node::Geq(a, b), Type::Bool))
    }

    fn int_node(
        &mut self,
        a: Expr,
        b: Expr,
        context: &str,
        build: impl FnOnce(Expr, Expr) -> Node,
    ) -> Result<Expr, Error> {
        self.expect_int_pair(a, b, context)?;
        let ty = self.expr_type(a).clone();
        Ok(self.intern(build(a, b), ty))
    }

    /// Wrapping addition.
    pub fn sum(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.int_node(a, b, "sum", Node::Sum)
    }

    /// Wrapping subtraction.
    pub fn minus(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.int_node(a, b, "minus", Node::Minus)
    }

    /// Wrapping multiplication. Constructible everywhere, but rejected by
    /// the decision-diagram backend at solve time.
    pub fn multiply(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.int_node(a, b, "multiply", Node::Multiply)
    }

    /// The larger operand, with the signedness of the operand type.
    pub fn maximum(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.int_node(a, b, "maximum", Node::Maximum)
    }

    /// The smaller operand, with the signedness of the operand type.
    pub fn minimum(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.int_node(a, b, "minimum", Node::Minimum)
    }

    /// Bitwise conjunction.
    pub fn bitand(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.int_node(a, b, "bitand", Node::BitAnd)
    }

    /// Bitwise disjunction.
    pub fn bitor(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.int_node(a, b, "bitor", Node::BitOr)
    }

    /// Bitwise exclusive disjunction.
    pub fn bitxor(&mut self, a: Expr, b: Expr) -> Result<Expr, Error> {
        self.int_node(a, b, "bitxor", Node::BitXor)
    }

    /// Bitwise complement.
    pub fn bitnot(&mut self, a: Expr) -> Result<Expr, Error> {
        match self.expr_type(a) {
            Type::Int(_) => {
                let ty = self.expr_type(a).clone();
                Ok(self.intern(Node::BitNot(a), ty))
            }
            other => Err(Error::invalid(format!(
                "bitnot requires an integer operand, got {}",
                other
            ))),
        }
    }

    /// The unique empty list of the given element type.
    pub fn empty_list(&mut self, elem: &Type) -> Expr {
        self.intern(
            Node::EmptyList { elem: elem.clone() },
            Type::list_of(elem.clone()),
        )
    }

    /// Prepends an element to a list.
    pub fn add_front(&mut self, head: Expr, tail: Expr) -> Result<Expr, Error> {
        match self.expr_type(tail) {
            Type::List(elem) if elem.as_ref() == self.expr_type(head) => {
                let ty = self.expr_type(tail).clone();
                Ok(self.intern(Node::AddFront { head, tail }, ty))
            }
            other => Err(Error::invalid(format!(
                "add_front of a {} onto a {}",
                self.expr_type(head),
                other
            ))),
        }
    }

    /// Case analysis on a list. **head** and **tail** must be
    /// [argument][Self::argument] nodes of the element and the list type;
    /// they are bound inside **cons** when the list is non-empty.
    pub fn list_case(
        &mut self,
        list: Expr,
        empty: Expr,
        head: Expr,
        tail: Expr,
        cons: Expr,
    ) -> Result<Expr, Error> {
        let elem = match self.expr_type(list) {
            Type::List(elem) => elem.as_ref().clone(),
            other => {
                return Err(Error::invalid(format!(
                    "list_case scrutinee must be a list, got {}",
                    other
                )))
            }
        };
        for (binder, expected) in [
            (head, elem.clone()),
            (tail, Type::list_of(elem)),
        ] {
            if !matches!(self.node(binder), Node::Argument { .. }) {
                return Err(Error::invalid(
                    "list_case binders must be argument nodes",
                ));
            }
            if *self.expr_type(binder) != expected {
                return Err(Error::invalid(format!(
                    "list_case binder has type {}, expected {}",
                    self.expr_type(binder),
                    expected
                )));
            }
        }
        self.expect_same(empty, cons, "list_case branches")?;
        let ty = self.expr_type(empty).clone();
        Ok(self.intern(
            Node::ListCase {
                list,
                empty,
                head,
                tail,
                cons,
            },
            ty,
        ))
    }

    /// Constructs a record; every declared field must be given exactly once.
    pub fn create_object(
        &mut self,
        record: &Rc<RecordDescriptor>,
        fields: &[(&str, Expr)],
    ) -> Result<Expr, Error> {
        if fields.len() != record.fields().len() {
            return Err(Error::invalid(format!(
                "record {} has {} fields, {} were given",
                record.name(),
                record.fields().len(),
                fields.len()
            )));
        }
        let mut ordered = vec![None; record.fields().len()];
        for (name, value) in fields {
            let idx = record.field_index(name).ok_or_else(|| {
                Error::invalid(format!("record {} has no field {}", record.name(), name))
            })?;
            if ordered[idx].replace(*value).is_some() {
                return Err(Error::invalid(format!(
                    "field {} of record {} was given twice",
                    name,
                    record.name()
                )));
            }
            let expected = &record.fields()[idx].field_type;
            if self.expr_type(*value) != expected {
                return Err(Error::invalid(format!(
                    "field {} of record {} has type {}, got {}",
                    name,
                    record.name(),
                    expected,
                    self.expr_type(*value)
                )));
            }
        }
        let fields = ordered
            .into_iter()
            .map(|slot| slot.expect("every slot was filled exactly once"))
            .collect();
        Ok(self.intern(
            Node::CreateObject {
                record: Rc::clone(record),
                fields,
            },
            Type::Record(Rc::clone(record)),
        ))
    }

    fn record_of(&self, object: Expr, context: &str) -> Result<Rc<RecordDescriptor>, Error> {
        match self.expr_type(object) {
            Type::Record(descriptor) => Ok(Rc::clone(descriptor)),
            other => Err(Error::invalid(format!(
                "{} requires a record operand, got {}",
                context, other
            ))),
        }
    }

    /// Projects a record field by name.
    pub fn get_field(&mut self, object: Expr, field: &str) -> Result<Expr, Error> {
        let record = self.record_of(object, "get_field")?;
        let idx = record.field_index(field).ok_or_else(|| {
            Error::invalid(format!("record {} has no field {}", record.name(), field))
        })?;
        let ty = record.fields()[idx].field_type.clone();
        Ok(self.intern(Node::GetField { object, field: idx }, ty))
    }

    /// Replaces a record field by name; the remaining fields are shared.
    pub fn with_field(&mut self, object: Expr, field: &str, value: Expr) -> Result<Expr, Error> {
        let record = self.record_of(object, "with_field")?;
        let idx = record.field_index(field).ok_or_else(|| {
            Error::invalid(format!("record {} has no field {}", record.name(), field))
        })?;
        let expected = &record.fields()[idx].field_type;
        if self.expr_type(value) != expected {
            return Err(Error::invalid(format!(
                "field {} of record {} has type {}, got {}",
                field,
                record.name(),
                expected,
                self.expr_type(value)
            )));
        }
        let ty = Type::Record(Rc::clone(&record));
        Ok(self.intern(
            Node::WithField {
                object,
                field: idx,
                value,
            },
            ty,
        ))
    }

    /// Builds the bounded unrolling of a list membership test: true iff one
    /// of the first **depth** entries equals **needle**.
    pub fn list_contains(
        &mut self,
        list: Expr,
        needle: Expr,
        depth: usize,
    ) -> Result<Expr, Error> {
        let elem = match self.expr_type(list) {
            Type::List(elem) => elem.as_ref().clone(),
            other => {
                return Err(Error::invalid(format!(
                    "list_contains requires a list, got {}",
                    other
                )))
            }
        };
        if *self.expr_type(needle) != elem {
            return Err(Error::invalid(format!(
                "list_contains needle has type {}, expected {}",
                self.expr_type(needle),
                elem
            )));
        }
        if depth == 0 {
            return Ok(self.lift(false));
        }
        let head = self.fresh_binder("contains_head", &elem);
        let tail = self.fresh_binder("contains_tail", &Type::list_of(elem));
        let rest = self.list_contains(tail, needle, depth - 1)?;
        let here = self.eq(head, needle)?;
        let found = self.or(here, rest)?;
        let absent = self.lift(false);
        self.list_case(list, absent, head, tail, found)
    }

    /// Builds the bounded unrolling of a map membership test over the
    /// [map encoding][Type::map_of]: true iff a present entry among the
    /// first **depth** ones carries a matching key.
    pub fn map_member(&mut self, map: Expr, key: Expr, depth: usize) -> Result<Expr, Error> {
        let entry = self.map_entry_type(map)?;
        if depth == 0 {
            return Ok(self.lift(false));
        }
        let map_ty = self.expr_type(map).clone();
        let head = self.fresh_binder("member_head", &Type::Record(Rc::clone(&entry)));
        let tail = self.fresh_binder("member_tail", &map_ty);
        let rest = self.map_member(tail, key, depth - 1)?;
        let entry_key = self.get_field(head, Type::MAP_KEY)?;
        let here = self.eq(entry_key, key)?;
        let found = self.or(here, rest)?;
        let absent = self.lift(false);
        self.list_case(map, absent, head, tail, found)
    }

    /// Builds the bounded unrolling of a map lookup over the
    /// [map encoding][Type::map_of]: the first matching binding among the
    /// first **depth** entries, as an [option][Type::option_of] of the value
    /// type.
    pub fn map_get(&mut self, map: Expr, key: Expr, depth: usize) -> Result<Expr, Error> {
        let entry = self.map_entry_type(map)?;
        let value_ty = entry.fields()[entry
            .field_index(Type::MAP_VALUE)
            .expect("entry descriptors carry a value field")]
        .field_type
        .clone();
        let option_ty = Type::option_of(value_ty.clone());
        let option = match &option_ty {
            Type::Record(descriptor) => Rc::clone(descriptor),
            _ => unreachable!("option types encode as records"),
        };
        let miss_flag = self.lift(false);
        let miss_value = self.typed_constant(&value_ty, value_ty.default_value())?;
        let miss = self.create_object(
            &option,
            &[
                (Type::OPTION_FLAG, miss_flag),
                (Type::OPTION_VALUE, miss_value),
            ],
        )?;
        if depth == 0 {
            return Ok(miss);
        }
        let map_ty = self.expr_type(map).clone();
        let head = self.fresh_binder("get_head", &Type::Record(Rc::clone(&entry)));
        let tail = self.fresh_binder("get_tail", &map_ty);
        let rest = self.map_get(tail, key, depth - 1)?;
        let entry_key = self.get_field(head, Type::MAP_KEY)?;
        let hit = self.eq(entry_key, key)?;
        let hit_flag = self.lift(true);
        let payload = self.get_field(head, Type::MAP_VALUE)?;
        let found = self.create_object(
            &option,
            &[
                (Type::OPTION_FLAG, hit_flag),
                (Type::OPTION_VALUE, payload),
            ],
        )?;
        let body = self.ite(hit, found, rest)?;
        self.list_case(map, miss, head, tail, body)
    }

    fn map_entry_type(&self, map: Expr) -> Result<Rc<RecordDescriptor>, Error> {
        match self.expr_type(map) {
            Type::List(elem) => match elem.as_ref() {
                Type::Record(descriptor)
                    if descriptor.field_index(Type::MAP_KEY).is_some()
                        && descriptor.field_index(Type::MAP_VALUE).is_some() =>
                {
                    Ok(Rc::clone(descriptor))
                }
                other => Err(Error::invalid(format!(
                    "map operations require {{key, value}} entries, got {}",
                    other
                ))),
            },
            other => Err(Error::invalid(format!(
                "map operations require a list of entries, got {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datatypes::expr::{FieldDescriptor, IntType};
    use test_log::test;

    fn packet() -> Rc<RecordDescriptor> {
        RecordDescriptor::new(
            "packet",
            vec![
                FieldDescriptor::new("dst", Type::Int(IntType::U32)),
                FieldDescriptor::new("src", Type::Int(IntType::U32)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn hash_consing_shares_nodes() {
        let mut dag = Dag::new();
        let three_a = dag.lift(3u8);
        let three_b = dag.lift(3u8);
        assert_eq!(three_a, three_b);

        let x = dag.arbitrary(&Type::Int(IntType::U8)).unwrap();
        let sum_a = dag.sum(x, three_a).unwrap();
        let sum_b = dag.sum(x, three_b).unwrap();
        assert_eq!(sum_a, sum_b);
        let before = dag.node_count();
        dag.sum(x, three_a).unwrap();
        assert_eq!(dag.node_count(), before);
    }

    #[test]
    fn arbitraries_are_distinct() {
        let mut dag = Dag::new();
        let a = dag.arbitrary(&Type::Bool).unwrap();
        let b = dag.arbitrary(&Type::Bool).unwrap();
        assert_ne!(a, b);
        assert!(dag.arbitrary(&Type::list_of(Type::Bool)).is_err());
    }

    #[test]
    fn factories_check_types() {
        let mut dag = Dag::new();
        let flag = dag.lift(true);
        let byte = dag.lift(7u8);
        let word = dag.lift(7u16);

        assert!(dag.not(byte).is_err());
        assert!(dag.and(flag, byte).is_err());
        assert!(dag.sum(byte, word).is_err());
        assert!(dag.sum(flag, flag).is_err());
        assert!(dag.leq(flag, flag).is_err());
        assert!(dag.eq(byte, word).is_err());
        assert!(dag.ite(byte, flag, flag).is_err());
        assert!(dag.ite(flag, byte, word).is_err());
        assert!(dag.bitnot(flag).is_err());
    }

    #[test]
    fn record_factories_check_fields() {
        let mut dag = Dag::new();
        let record = packet();
        let dst = dag.lift(1u32);
        let src = dag.lift(2u32);
        let object = dag
            .create_object(&record, &[("dst", dst), ("src", src)])
            .unwrap();

        assert!(dag.get_field(object, "ttl").is_err());
        assert!(dag.create_object(&record, &[("dst", dst)]).is_err());
        assert!(dag
            .create_object(&record, &[("dst", dst), ("dst", dst)])
            .is_err());
        let flag = dag.lift(true);
        assert!(dag
            .create_object(&record, &[("dst", dst), ("src", flag)])
            .is_err());
        assert!(dag.with_field(object, "src", flag).is_err());
        assert!(dag.get_field(flag, "dst").is_err());

        let projected = dag.get_field(object, "src").unwrap();
        assert_eq!(*dag.expr_type(projected), Type::Int(IntType::U32));
    }

    #[test]
    fn list_factories_check_shapes() {
        let mut dag = Dag::new();
        let elem = Type::Int(IntType::U8);
        let nil = dag.empty_list(&elem);
        let seven = dag.lift(7u8);
        let list = dag.add_front(seven, nil).unwrap();
        assert_eq!(*dag.expr_type(list), Type::list_of(elem.clone()));

        let word = dag.lift(7u16);
        assert!(dag.add_front(word, nil).is_err());

        let head = dag.argument("h", &elem);
        let tail = dag.argument("t", &Type::list_of(elem.clone()));
        let fallback = dag.lift(0u8);
        let case = dag.list_case(list, fallback, head, tail, head).unwrap();
        assert_eq!(*dag.expr_type(case), elem);

        // binders must be arguments of the right types
        assert!(dag.list_case(list, fallback, seven, tail, head).is_err());
        assert!(dag.list_case(list, fallback, head, head, head).is_err());
        assert!(dag.list_case(seven, fallback, head, tail, head).is_err());
        assert!(dag.list_case(list, fallback, head, tail, list).is_err());
    }

    #[test]
    fn empty_list_constant_is_ambiguous() {
        let mut dag = Dag::new();
        assert!(dag.constant(Value::List(Vec::new())).is_err());
        let typed = dag.typed_constant(&Type::list_of(Type::Bool), Value::List(Vec::new()));
        assert!(typed.is_ok());
        assert!(dag
            .typed_constant(&Type::Bool, Value::U8(1))
            .is_err());
    }
}

