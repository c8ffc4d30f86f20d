//! The dynamic value model.
//!
//! The source system operates on untyped JS values, where a reactive proxy
//! is indistinguishable from the object it wraps. Rust has no free-standing
//! "any value" type, so observable data here is modeled as a tagged sum with
//! one variant per primitive plus the three structural cases the spec names:
//! a single-cell reference ([`Cell`]), and the two keyed/ordered aggregates
//! ([`ReactiveMap`], [`ReactiveList`]). An escape hatch (`Raw`) carries an
//! opaque, never-tracked payload for values the system doesn't need to look
//! inside of — the Rust analogue of `markRaw`'s effect on a value that's
//! never passed through `reactive()` in the first place.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::cell::Cell;
use crate::reactive_list::ReactiveList;
use crate::reactive_map::ReactiveMap;

/// A dynamically-typed observable value.
///
/// Cloning a `Value` is cheap: aggregates and cells clone their `Rc` handle,
/// not their contents.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Rc<str>),
    Cell(Cell),
    Map(ReactiveMap),
    List(ReactiveList),
    /// An opaque payload that is never tracked and never unwrapped. The
    /// equivalent of a plain object that was never passed to `reactive()`.
    Raw(Rc<dyn Any>),
}

impl Value {
    pub fn is_cell(&self) -> bool {
        matches!(self, Value::Cell(_))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Value::Map(_) | Value::List(_))
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Value::Cell(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ReactiveMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ReactiveList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Returns whether two values should be considered equal for the purpose of
/// deciding whether a `Set` actually changed anything.
///
/// Primitives compare by value, with `NaN` treated as equal to itself (the
/// source model's `hasChanged` uses `Object.is` rather than `===`, precisely
/// so that assigning `NaN` over an existing `NaN` does *not* re-trigger).
/// Cells and aggregates compare by identity: two distinct `ReactiveMap`
/// handles over the same underlying target are equal, but structurally equal
/// content under different targets is not.
pub(crate) fn reactive_eq(a: &Value, b: &Value) -> bool {
    use Value::*;
    match (a, b) {
        (Null, Null) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (Float(x), Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Text(x), Text(y)) => x == y,
        (Cell(x), Cell(y)) => x.target_ptr_eq(y),
        (Map(x), Map(y)) => x.target_ptr_eq(y),
        (List(x), List(y)) => x.target_ptr_eq(y),
        (Raw(x), Raw(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Aggregates constructed through this crate are always already reactive, so
/// there is no separate "wrap a plain value" step the way `reactive()` has to
/// do in the source model. This passthrough exists only to name that point
/// in the call sites that conceptually perform it (`Cell::set`,
/// `ReactiveMap::set`).
pub(crate) fn deep_wrap(v: Value) -> Value {
    v
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Cell(_) => write!(f, "Cell(..)"),
            Value::Map(_) => write!(f, "Map(..)"),
            Value::List(_) => write!(f, "List(..)"),
            Value::Raw(_) => write!(f, "Raw(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Rc::from(v))
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Rc::from(v.as_str()))
    }
}
impl From<Cell> for Value {
    fn from(v: Cell) -> Self {
        Value::Cell(v)
    }
}
impl From<ReactiveMap> for Value {
    fn from(v: ReactiveMap) -> Self {
        Value::Map(v)
    }
}
impl From<ReactiveList> for Value {
    fn from(v: ReactiveList) -> Self {
        Value::List(v)
    }
}

/// `serde` support (`trace`'s sibling ambient-stack feature): a `Value` only
/// round-trips its *content*, not its reactivity — a deserialized `Map`/`List`
/// is a brand-new target with an empty dep graph, the same way deserializing
/// into a `leptos_reactive` signal's inner type produces a plain value that
/// still needs wrapping. `Raw` has no general serialization and is rejected.
#[cfg(feature = "serde")]
mod serde_impl {
    use super::Value;
    use crate::reactive_list::ReactiveList;
    use crate::reactive_map::ReactiveMap;
    use serde::de::{self, Visitor};
    use serde::ser::{SerializeMap, SerializeSeq};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;
    use std::rc::Rc;

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Value::Null => serializer.serialize_unit(),
                Value::Bool(b) => serializer.serialize_bool(*b),
                Value::Int(i) => serializer.serialize_i64(*i),
                Value::Float(f) => serializer.serialize_f64(*f),
                Value::Text(s) => serializer.serialize_str(s),
                Value::Cell(c) => c.peek().serialize(serializer),
                Value::Map(m) => {
                    let entries = crate::effect::untrack(|| m.entries());
                    let mut map = serializer.serialize_map(Some(entries.len()))?;
                    for (k, v) in &entries {
                        map.serialize_entry(k.as_ref(), v)?;
                    }
                    map.end()
                }
                Value::List(l) => {
                    let snapshot = crate::effect::untrack(|| l.snapshot());
                    let mut seq = serializer.serialize_seq(Some(snapshot.len()))?;
                    for v in &snapshot {
                        seq.serialize_element(v)?;
                    }
                    seq.end()
                }
                Value::Raw(_) => {
                    Err(serde::ser::Error::custom("reactive-core: cannot serialize a markRaw value"))
                }
            }
        }
    }

    struct ValueVisitor;

    impl<'de> Visitor<'de> for ValueVisitor {
        type Value = Value;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a reactive-core value (null, bool, number, string, map, or sequence)")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
            Ok(Value::Null)
        }
        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
            Ok(Value::Bool(v))
        }
        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
            Ok(Value::Int(v))
        }
        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
            Ok(Value::Int(v as i64))
        }
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
            Ok(Value::Float(v))
        }
        fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
            Ok(Value::Text(Rc::from(v)))
        }
        fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
            Ok(Value::Text(Rc::from(v.as_str())))
        }
        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
            let mut values = Vec::new();
            while let Some(v) = seq.next_element::<Value>()? {
                values.push(v);
            }
            Ok(Value::List(ReactiveList::from_values(values)))
        }
        fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
            let mut entries = Vec::new();
            while let Some((k, v)) = map.next_entry::<String, Value>()? {
                entries.push((k, v));
            }
            Ok(Value::Map(ReactiveMap::from_entries(entries)))
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(ValueVisitor)
        }
    }

}
