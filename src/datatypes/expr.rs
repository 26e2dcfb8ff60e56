//! Datatypes of the expression layer: node identifiers, type descriptors,
//! and concrete values.
//!
//! Every type a user can reason about is described by a [Type] value.
//! Records carry an explicit [RecordDescriptor]; option and map types are
//! encoded structurally (see [Type::option_of] and [Type::map_of]), so the
//! evaluators only ever deal with booleans, fixed-width integers, lists, and
//! records.
use crate::datatypes::Error;
use lexical_sort::natural_lexical_cmp;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt::Display, ops::Deref, rc::Rc};

/// Identifier of one node in the [expression DAG][crate::dag::Dag].
///
/// Structurally identical nodes share one identifier, therefore comparing two
/// [Expr] values decides structural equality in constant time.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Copy, Clone, Serialize, Deserialize)]
pub struct Expr(pub usize);

impl Deref for Expr {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<usize> for Expr {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Expr({})", self.0)
    }
}

impl Expr {
    /// Get the value of the identifier, i.e. the corresponding [usize].
    pub fn value(self) -> usize {
        self.0
    }
}

/// The supported fixed-width integer types.
#[derive(
    Debug,
    Eq,
    PartialEq,
    PartialOrd,
    Ord,
    Hash,
    Copy,
    Clone,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum IntType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntType {
    /// Number of bits of the representation.
    pub fn bits(self) -> usize {
        match self {
            IntType::I8 | IntType::U8 => 8,
            IntType::I16 | IntType::U16 => 16,
            IntType::I32 | IntType::U32 => 32,
            IntType::I64 | IntType::U64 => 64,
        }
    }

    /// Returns true for the two's-complement interpreted widths.
    pub fn is_signed(self) -> bool {
        matches!(self, IntType::I8 | IntType::I16 | IntType::I32 | IntType::I64)
    }

    /// Bit mask with the low [bits][IntType::bits] bits set.
    pub fn mask(self) -> u64 {
        if self.bits() == 64 {
            u64::MAX
        } else {
            (1u64 << self.bits()) - 1
        }
    }

    pub(crate) fn sign_extend(self, bits: u64) -> i64 {
        let shift = 64 - self.bits();
        (((bits & self.mask()) << shift) as i64) >> shift
    }
}

/// Per-field generation overrides, observed by
/// [`fresh_symbolic`][crate::generate::fresh_symbolic].
#[derive(
    Debug, Default, Eq, PartialEq, Hash, Copy, Clone, Serialize, Deserialize,
)]
pub struct FieldConfig {
    /// Overrides the ambient generation depth for this field.
    pub depth: Option<usize>,
    /// Forces list slots of this field to be always present.
    pub fixed_size: bool,
}

/// One named, typed field of a record.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// The field name.
    pub name: String,
    /// The field type.
    pub field_type: Type,
    /// Generation overrides.
    pub config: FieldConfig,
}

impl FieldDescriptor {
    /// A field without generation overrides.
    pub fn new(name: &str, field_type: Type) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            config: FieldConfig::default(),
        }
    }

    /// A field with explicit generation overrides.
    pub fn with_config(name: &str, field_type: Type, config: FieldConfig) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            config,
        }
    }
}

/// Description of a record type: a name plus a finite, named, typed set of
/// fields with structural identity.
///
/// Fields are kept in natural lexical order of their names, which is the
/// stable order every walker of the type observes, independently of the
/// order the caller declared them in.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
pub struct RecordDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    /// Creates a descriptor. Fails with [Error::InvalidConstruction] unless
    /// there are between one and eight uniquely named fields.
    pub fn new(name: &str, mut fields: Vec<FieldDescriptor>) -> Result<Rc<Self>, Error> {
        if fields.is_empty() || fields.len() > 8 {
            return Err(Error::invalid(format!(
                "record {} must have between 1 and 8 fields, got {}",
                name,
                fields.len()
            )));
        }
        fields.sort_by(|a, b| natural_lexical_cmp(&a.name, &b.name));
        if fields.windows(2).any(|pair| pair[0].name == pair[1].name) {
            return Err(Error::invalid(format!(
                "record {} declares a field name twice",
                name
            )));
        }
        Ok(Rc::new(Self {
            name: name.to_string(),
            fields,
        }))
    }

    /// The record name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fields in their stable order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Position of a field inside [fields][Self::fields].
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == field)
    }
}

/// A type a symbolic value can take.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
pub enum Type {
    /// The boolean type.
    Bool,
    /// A fixed-width integer type.
    Int(IntType),
    /// A finite sequence of elements.
    List(Rc<Type>),
    /// A record described by a [RecordDescriptor].
    Record(Rc<RecordDescriptor>),
}

impl Type {
    /// Field name of the option-encoding flag.
    pub const OPTION_FLAG: &'static str = "has_value";
    /// Field name of the option-encoding payload.
    pub const OPTION_VALUE: &'static str = "value";
    /// Field name of the map-entry key.
    pub const MAP_KEY: &'static str = "key";
    /// Field name of the map-entry value.
    pub const MAP_VALUE: &'static str = "value";

    /// A list over the given element type.
    pub fn list_of(elem: Type) -> Type {
        Type::List(Rc::new(elem))
    }

    /// The structural encoding of `Option<inner>`: a record with a boolean
    /// `has_value` flag and a `value` payload.
    pub fn option_of(inner: Type) -> Type {
        let descriptor = RecordDescriptor::new(
            "option",
            vec![
                FieldDescriptor::new(Self::OPTION_FLAG, Type::Bool),
                FieldDescriptor::new(Self::OPTION_VALUE, inner),
            ],
        )
        .expect("the option descriptor has two distinct fields");
        Type::Record(descriptor)
    }

    /// The structural encoding of a map: a list of `{key, value}` records.
    /// Membership is the existence of a present entry with a matching key.
    pub fn map_of(key: Type, value: Type) -> Type {
        let entry = RecordDescriptor::new(
            "entry",
            vec![
                FieldDescriptor::new(Self::MAP_KEY, key),
                FieldDescriptor::new(Self::MAP_VALUE, value),
            ],
        )
        .expect("the entry descriptor has two distinct fields");
        Type::list_of(Type::Record(entry))
    }

    /// Returns the integer type if this is an integer type.
    pub fn as_int(&self) -> Option<IntType> {
        match self {
            Type::Int(ty) => Some(*ty),
            _ => None,
        }
    }

    /// The default value of the type: `false`, zero, the empty list, or the
    /// record of field defaults.
    pub fn default_value(&self) -> Value {
        match self {
            Type::Bool => Value::Bool(false),
            Type::Int(ty) => Value::from_bits(*ty, 0),
            Type::List(_) => Value::List(Vec::new()),
            Type::Record(descriptor) => Value::Record(
                Rc::clone(descriptor),
                descriptor
                    .fields()
                    .iter()
                    .map(|field| field.field_type.default_value())
                    .collect(),
            ),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int(ty) => write!(f, "{}", ty),
            Type::List(elem) => write!(f, "list<{}>", elem),
            Type::Record(descriptor) => write!(f, "{}", descriptor.name()),
        }
    }
}

/// A concrete value, the result of [interpretation][crate::interpret].
#[derive(Debug, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// A concrete list; elements share one type.
    List(Vec<Value>),
    /// A concrete record; values are stored in descriptor field order.
    Record(Rc<RecordDescriptor>, Vec<Value>),
}

impl Value {
    /// The integer type of the value, if it is an integer.
    pub fn int_type(&self) -> Option<IntType> {
        match self {
            Value::I8(_) => Some(IntType::I8),
            Value::I16(_) => Some(IntType::I16),
            Value::I32(_) => Some(IntType::I32),
            Value::I64(_) => Some(IntType::I64),
            Value::U8(_) => Some(IntType::U8),
            Value::U16(_) => Some(IntType::U16),
            Value::U32(_) => Some(IntType::U32),
            Value::U64(_) => Some(IntType::U64),
            _ => None,
        }
    }

    /// The raw two's-complement bits of an integer value, zero-extended.
    pub fn bits(&self) -> Option<u64> {
        match self {
            Value::I8(v) => Some((*v as u8) as u64),
            Value::I16(v) => Some((*v as u16) as u64),
            Value::I32(v) => Some((*v as u32) as u64),
            Value::I64(v) => Some(*v as u64),
            Value::U8(v) => Some((*v) as u64),
            Value::U16(v) => Some((*v) as u64),
            Value::U32(v) => Some((*v) as u64),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Reconstructs an integer value of the given type from raw bits.
    /// Bits beyond the width are ignored.
    pub fn from_bits(ty: IntType, bits: u64) -> Value {
        let bits = bits & ty.mask();
        match ty {
            IntType::I8 => Value::I8(bits as u8 as i8),
            IntType::I16 => Value::I16(bits as u16 as i16),
            IntType::I32 => Value::I32(bits as u32 as i32),
            IntType::I64 => Value::I64(bits as i64),
            IntType::U8 => Value::U8(bits as u8),
            IntType::U16 => Value::U16(bits as u16),
            IntType::U32 => Value::U32(bits as u32),
            IntType::U64 => Value::U64(bits),
        }
    }

    /// Reconstructs an integer value of the given type from a signed
    /// representative, as returned by
    /// [`Solver::model_value`][crate::solver::Solver::model_value].
    /// Unsigned widths are produced by bit-casting.
    pub fn from_signed_bits(ty: IntType, value: i64) -> Value {
        Value::from_bits(ty, value as u64)
    }

    /// The boolean payload, if the value is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Looks up a record field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(descriptor, values) => {
                descriptor.field_index(name).map(|idx| &values[idx])
            }
            _ => None,
        }
    }
}

/// Applies a raw binary bit operation to two integer values of the same
/// type; the result is masked back to the width.
pub(crate) fn int_binary(
    a: &Value,
    b: &Value,
    op: impl FnOnce(u64, u64) -> u64,
) -> Result<Value, Error> {
    let (ty, lhs) = a
        .int_type()
        .zip(a.bits())
        .ok_or_else(|| Error::mismatch("integer operation applied to a non-integer value"))?;
    let (tyb, rhs) = b
        .int_type()
        .zip(b.bits())
        .ok_or_else(|| Error::mismatch("integer operation applied to a non-integer value"))?;
    if ty != tyb {
        return Err(Error::mismatch(format!(
            "integer operation applied to mixed widths {} and {}",
            ty, tyb
        )));
    }
    Ok(Value::from_bits(ty, op(lhs, rhs)))
}

/// Applies a raw unary bit operation to an integer value.
pub(crate) fn int_unary(a: &Value, op: impl FnOnce(u64) -> u64) -> Result<Value, Error> {
    let (ty, bits) = a
        .int_type()
        .zip(a.bits())
        .ok_or_else(|| Error::mismatch("integer operation applied to a non-integer value"))?;
    Ok(Value::from_bits(ty, op(bits)))
}

/// Signedness-aware comparison of two integer values of the same type.
pub(crate) fn int_compare(a: &Value, b: &Value) -> Result<Ordering, Error> {
    let (ty, lhs) = a
        .int_type()
        .zip(a.bits())
        .ok_or_else(|| Error::mismatch("comparison applied to a non-integer value"))?;
    let (tyb, rhs) = b
        .int_type()
        .zip(b.bits())
        .ok_or_else(|| Error::mismatch("comparison applied to a non-integer value"))?;
    if ty != tyb {
        return Err(Error::mismatch(format!(
            "comparison applied to mixed widths {} and {}",
            ty, tyb
        )));
    }
    if ty.is_signed() {
        Ok(ty.sign_extend(lhs).cmp(&ty.sign_extend(rhs)))
    } else {
        Ok(lhs.cmp(&rhs))
    }
}

/// Configuration of symbolic-input generation: the unrolling bound of lists
/// and maps, and whether shorter lengths are admitted.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Serialize, Deserialize)]
pub struct DepthConfig {
    /// Maximal number of list slots to materialise.
    pub depth: usize,
    /// When true, lists of any length up to [depth][Self::depth] are
    /// admitted; when false, the length is exactly [depth][Self::depth].
    pub exhaustive: bool,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            depth: 3,
            exhaustive: true,
        }
    }
}

macro_rules! value_from {
    ($($native:ty => $variant:ident),* $(,)?) => {
        $(impl From<$native> for Value {
            fn from(val: $native) -> Self {
                Value::$variant(val)
            }
        })*
    };
}

value_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;
    use test_log::test;

    #[test]
    fn field_order_is_lexical() {
        let descriptor = RecordDescriptor::new(
            "packet",
            vec![
                FieldDescriptor::new("src", Type::Int(IntType::U32)),
                FieldDescriptor::new("dst", Type::Int(IntType::U32)),
            ],
        )
        .unwrap();
        assert_eq!(descriptor.fields()[0].name, "dst");
        assert_eq!(descriptor.fields()[1].name, "src");
        assert_eq!(descriptor.field_index("src"), Some(1));
        assert_eq!(descriptor.field_index("ttl"), None);
    }

    #[test]
    fn record_arity_is_checked() {
        assert!(RecordDescriptor::new("empty", vec![]).is_err());
        let many = (0..9)
            .map(|idx| FieldDescriptor::new(&format!("f{}", idx), Type::Bool))
            .collect();
        assert!(RecordDescriptor::new("wide", many).is_err());
        let twice = vec![
            FieldDescriptor::new("f", Type::Bool),
            FieldDescriptor::new("f", Type::Bool),
        ];
        assert!(RecordDescriptor::new("dup", twice).is_err());
    }

    #[test]
    fn option_and_map_encodings() {
        let opt = Type::option_of(Type::Int(IntType::U8));
        match &opt {
            Type::Record(descriptor) => {
                assert_eq!(descriptor.fields()[0].name, Type::OPTION_FLAG);
                assert_eq!(descriptor.fields()[1].name, Type::OPTION_VALUE);
            }
            _ => panic!("option must encode as a record"),
        }
        let map = Type::map_of(Type::Int(IntType::U8), Type::Bool);
        match &map {
            Type::List(entry) => match entry.as_ref() {
                Type::Record(descriptor) => assert_eq!(descriptor.name(), "entry"),
                _ => panic!("map entries must encode as records"),
            },
            _ => panic!("map must encode as a list"),
        }
    }

    #[test]
    fn defaults() {
        assert_eq!(Type::Bool.default_value(), Value::Bool(false));
        assert_eq!(Type::Int(IntType::I16).default_value(), Value::I16(0));
        assert_eq!(
            Type::list_of(Type::Bool).default_value(),
            Value::List(Vec::new())
        );
    }

    #[quickcheck]
    fn bits_roundtrip(value: u64) -> bool {
        for ty in [
            IntType::I8,
            IntType::I16,
            IntType::I32,
            IntType::I64,
            IntType::U8,
            IntType::U16,
            IntType::U32,
            IntType::U64,
        ] {
            let reconstructed = Value::from_bits(ty, value);
            assert_eq!(reconstructed.bits(), Some(value & ty.mask()));
            assert_eq!(reconstructed.int_type(), Some(ty));
        }
        true
    }

    #[quickcheck]
    fn signed_representative_bitcast(value: i64) -> bool {
        assert_eq!(
            Value::from_signed_bits(IntType::U8, value),
            Value::U8(value as u8)
        );
        assert_eq!(
            Value::from_signed_bits(IntType::I8, value),
            Value::I8(value as u8 as i8)
        );
        true
    }

    #[test]
    fn comparisons_respect_signedness() {
        let minus_one = Value::I8(-1);
        let one = Value::I8(1);
        assert_eq!(int_compare(&minus_one, &one).unwrap(), Ordering::Less);
        // the same bit pattern is large once interpreted unsigned
        let ff = Value::U8(0xff);
        let one = Value::U8(1);
        assert_eq!(int_compare(&ff, &one).unwrap(), Ordering::Greater);
        assert!(int_compare(&ff, &Value::U16(1)).is_err());
    }

    #[test]
    fn wrapping_arithmetic() {
        let sum = int_binary(&Value::U8(250), &Value::U8(10), |a, b| a.wrapping_add(b)).unwrap();
        assert_eq!(sum, Value::U8(4));
        let neg = int_unary(&Value::U8(0), |a| !a).unwrap();
        assert_eq!(neg, Value::U8(0xff));
    }
}
