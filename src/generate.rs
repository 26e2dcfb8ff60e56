//! Symbolic-input generation.
//!
//! [fresh_symbolic] materialises a fresh symbolic value of any supported
//! [Type] as an expression over freshly allocated
//! [arbitraries][crate::dag::Dag::arbitrary]: primitives become arbitrary
//! nodes, records recurse over their fields, and lists become a chain of
//! guarded slots whose depth the [DepthConfig] bounds. The [Symbolic] trait
//! connects host types to this machinery and to concrete [Value]s.
use crate::{
    dag::Dag,
    datatypes::{
        expr::{DepthConfig, Expr, FieldConfig, Type, Value},
        Error,
    },
};

/// Materialises a fresh symbolic value of the given type.
///
/// Lists produce up to `config.depth` slots. With `config.exhaustive` each
/// slot carries a fresh boolean guard, so every length up to the bound is
/// admitted (the conjunction of the first *i* guards means "length ≥ i");
/// without it the length is exactly the bound. Fields tagged
/// [fixed_size][FieldConfig::fixed_size] are always fully present, fields
/// with a [depth][FieldConfig::depth] override use their own bound.
pub fn fresh_symbolic(dag: &mut Dag, ty: &Type, config: &DepthConfig) -> Result<Expr, Error> {
    log::trace!("generating a symbolic {} at depth {}", ty, config.depth);
    match ty {
        Type::Bool | Type::Int(_) => dag.arbitrary(ty),
        Type::List(elem) => {
            let mut slots = dag.empty_list(elem);
            for _ in 0..config.depth {
                let element = fresh_symbolic(dag, elem, config)?;
                let longer = dag.add_front(element, slots)?;
                slots = if config.exhaustive {
                    let guard = dag.arbitrary(&Type::Bool)?;
                    let nil = dag.empty_list(elem);
                    dag.ite(guard, longer, nil)?
                } else {
                    longer
                };
            }
            Ok(slots)
        }
        Type::Record(record) => {
            let mut fields = Vec::with_capacity(record.fields().len());
            for field in record.fields() {
                let effective = override_config(config, field.config);
                let value = fresh_symbolic(dag, &field.field_type, &effective)?;
                fields.push((field.name.clone(), value));
            }
            let fields: Vec<(&str, Expr)> = fields
                .iter()
                .map(|(name, value)| (name.as_str(), *value))
                .collect();
            let record = std::rc::Rc::clone(record);
            dag.create_object(&record, &fields)
        }
    }
}

fn override_config(ambient: &DepthConfig, field: FieldConfig) -> DepthConfig {
    DepthConfig {
        depth: field.depth.unwrap_or(ambient.depth),
        exhaustive: ambient.exhaustive && !field.fixed_size,
    }
}

/// Connects a host type to its symbolic [Type] and its [Value] encoding.
///
/// The crate implements it for booleans, all integer widths, `Vec<T>`, and
/// `Option<T>`; user records implement it against their
/// [RecordDescriptor][crate::datatypes::expr::RecordDescriptor].
pub trait Symbolic: Sized {
    /// The symbolic type of the host type.
    fn symbolic_type() -> Type;
    /// Encodes a host value.
    fn into_value(self) -> Value;
    /// Decodes a host value; fails with [Error::InvalidConstruction] if the
    /// encoding does not match.
    fn from_value(value: &Value) -> Result<Self, Error>;
}

macro_rules! symbolic_primitive {
    ($($native:ty => ($ty:expr, $variant:ident)),* $(,)?) => {
        $(impl Symbolic for $native {
            fn symbolic_type() -> Type {
                $ty
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Result<Self, Error> {
                match value {
                    Value::$variant(v) => Ok(*v),
                    other => Err(Error::invalid(format!(
                        "expected a {}, got {:?}",
                        stringify!($native),
                        other
                    ))),
                }
            }
        })*
    };
}

symbolic_primitive! {
    bool => (Type::Bool, Bool),
    i8 => (Type::Int(crate::datatypes::expr::IntType::I8), I8),
    i16 => (Type::Int(crate::datatypes::expr::IntType::I16), I16),
    i32 => (Type::Int(crate::datatypes::expr::IntType::I32), I32),
    i64 => (Type::Int(crate::datatypes::expr::IntType::I64), I64),
    u8 => (Type::Int(crate::datatypes::expr::IntType::U8), U8),
    u16 => (Type::Int(crate::datatypes::expr::IntType::U16), U16),
    u32 => (Type::Int(crate::datatypes::expr::IntType::U32), U32),
    u64 => (Type::Int(crate::datatypes::expr::IntType::U64), U64),
}

impl<T: Symbolic> Symbolic for Vec<T> {
    fn symbolic_type() -> Type {
        Type::list_of(T::symbolic_type())
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(Symbolic::into_value).collect())
    }

    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::List(elems) => elems.iter().map(T::from_value).collect(),
            other => Err(Error::invalid(format!("expected a list, got {:?}", other))),
        }
    }
}

impl<T: Symbolic> Symbolic for Option<T> {
    fn symbolic_type() -> Type {
        Type::option_of(T::symbolic_type())
    }

    fn into_value(self) -> Value {
        let record = match Self::symbolic_type() {
            Type::Record(record) => record,
            _ => unreachable!("option types encode as records"),
        };
        let (flag, payload) = match self {
            Some(value) => (true, value.into_value()),
            None => (false, T::symbolic_type().default_value()),
        };
        // descriptor order is lexical: has_value before value
        Value::Record(record, vec![Value::Bool(flag), payload])
    }

    fn from_value(value: &Value) -> Result<Self, Error> {
        let flag = value
            .field(Type::OPTION_FLAG)
            .and_then(Value::as_bool)
            .ok_or_else(|| Error::invalid("expected an option record"))?;
        if !flag {
            return Ok(None);
        }
        let payload = value
            .field(Type::OPTION_VALUE)
            .ok_or_else(|| Error::invalid("expected an option record"))?;
        Ok(Some(T::from_value(payload)?))
    }
}
