use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::marks::{union_marks, Mark, Marks};
use crate::number::Number;
use crate::types::{unify, Type};

/// A dynamically-typed value.
///
/// Every value has a type, and is either null, unknown, or known. Null and
/// unknown values keep their type so that type checking can continue even
/// when a concrete value is not available. Marks are orthogonal to all
/// three states.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    ty: Type,
    repr: Repr,
    marks: Marks,
}

#[derive(Debug, Clone, PartialEq)]
enum Repr {
    Null,
    Unknown,
    Bool(bool),
    Number(Number),
    String(String),
    Seq(Vec<Value>),
    Attrs(BTreeMap<String, Value>),
}

impl Value {
    fn known(ty: Type, repr: Repr) -> Self {
        Self {
            ty,
            repr,
            marks: Marks::new(),
        }
    }

    pub fn null(ty: Type) -> Self {
        Self::known(ty, Repr::Null)
    }

    pub fn unknown(ty: Type) -> Self {
        Self::known(ty, Repr::Unknown)
    }

    /// An unknown value of unknown type.
    pub fn dynamic() -> Self {
        Self::unknown(Type::Dynamic)
    }

    /// A null value of unknown type, as produced by a `null` literal.
    pub fn null_dynamic() -> Self {
        Self::null(Type::Dynamic)
    }

    pub fn bool(value: bool) -> Self {
        Self::known(Type::Bool, Repr::Bool(value))
    }

    pub fn number(value: Number) -> Self {
        Self::known(Type::Number, Repr::Number(value))
    }

    pub fn int(value: i64) -> Self {
        Self::number(Number::from(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::known(Type::String, Repr::String(value.into()))
    }

    /// Builds a list value. The elements must already share a type; use
    /// [`Value::list_of`] to name the element type of an empty list.
    pub fn list(elements: Vec<Value>) -> Self {
        let ety = common_element_type(&elements);
        Self::list_of(ety, elements)
    }

    pub fn list_of(ety: Type, elements: Vec<Value>) -> Self {
        Self::known(Type::list(ety), Repr::Seq(elements))
    }

    /// Builds a set value, discarding elements that equal an earlier one.
    /// Elements are kept in a canonical order, so two sets with the same
    /// members have the same representation.
    pub fn set(elements: Vec<Value>) -> Self {
        let ety = common_element_type(&elements);
        Self::set_of(ety, elements)
    }

    pub fn set_of(ety: Type, mut elements: Vec<Value>) -> Self {
        elements.sort_by(canonical_order);
        let mut unique: Vec<Value> = Vec::with_capacity(elements.len());
        for element in elements {
            let duplicate = element.is_whole_known()
                && unique.iter().any(|existing| existing == &element);
            if !duplicate {
                unique.push(element);
            }
        }
        Self::known(Type::set(ety), Repr::Seq(unique))
    }

    pub fn tuple(elements: Vec<Value>) -> Self {
        let ty = Type::Tuple(elements.iter().map(|value| value.ty.clone()).collect());
        Self::known(ty, Repr::Seq(elements))
    }

    pub fn empty_tuple() -> Self {
        Self::tuple(Vec::new())
    }

    pub fn map(elements: BTreeMap<String, Value>) -> Self {
        let values: Vec<Value> = elements.values().cloned().collect();
        let ety = common_element_type(&values);
        Self::map_of(ety, elements)
    }

    pub fn map_of(ety: Type, elements: BTreeMap<String, Value>) -> Self {
        Self::known(Type::map(ety), Repr::Attrs(elements))
    }

    pub fn object(attrs: BTreeMap<String, Value>) -> Self {
        let ty = Type::Object(
            attrs
                .iter()
                .map(|(name, value)| (name.clone(), value.ty.clone()))
                .collect(),
        );
        Self::known(ty, Repr::Attrs(attrs))
    }

    pub fn object_from<I, K>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::object(attrs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn empty_object() -> Self {
        Self::object(BTreeMap::new())
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn is_null(&self) -> bool {
        matches!(self.repr, Repr::Null)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self.repr, Repr::Unknown)
    }

    /// True if neither this value nor anything nested inside it is unknown.
    pub fn is_whole_known(&self) -> bool {
        match &self.repr {
            Repr::Unknown => false,
            Repr::Seq(elements) => elements.iter().all(Value::is_whole_known),
            Repr::Attrs(attrs) => attrs.values().all(Value::is_whole_known),
            _ => true,
        }
    }

    pub fn marks(&self) -> &Marks {
        &self.marks
    }

    pub fn is_marked(&self) -> bool {
        !self.marks.is_empty()
    }

    pub fn has_mark(&self, mark: &Mark) -> bool {
        self.marks.contains(mark)
    }

    /// True if this value or any nested value carries a mark.
    pub fn contains_marked(&self) -> bool {
        if self.is_marked() {
            return true;
        }
        match &self.repr {
            Repr::Seq(elements) => elements.iter().any(Value::contains_marked),
            Repr::Attrs(attrs) => attrs.values().any(Value::contains_marked),
            _ => false,
        }
    }

    pub fn mark(mut self, mark: impl Into<Mark>) -> Self {
        self.marks.insert(mark.into());
        self
    }

    pub fn with_marks(mut self, marks: Marks) -> Self {
        if !marks.is_empty() {
            self.marks = self.marks.union(marks);
        }
        self
    }

    /// Adds the marks of every value in `sources` to this value.
    pub fn with_marks_from<'a, I>(self, sources: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let marks = union_marks(sources);
        self.with_marks(marks)
    }

    /// Removes the marks directly on this value, returning them separately.
    pub fn unmark(mut self) -> (Value, Marks) {
        let marks = std::mem::take(&mut self.marks);
        (self, marks)
    }

    /// Removes marks from this value and all nested values, returning the
    /// union of everything removed.
    pub fn unmark_deep(self) -> (Value, Marks) {
        let (mut value, mut marks) = self.unmark();
        match &mut value.repr {
            Repr::Seq(elements) => {
                for element in elements.iter_mut() {
                    let (plain, nested) = std::mem::replace(element, Value::dynamic()).unmark_deep();
                    *element = plain;
                    marks = marks.union(nested);
                }
            }
            Repr::Attrs(attrs) => {
                for element in attrs.values_mut() {
                    let (plain, nested) = std::mem::replace(element, Value::dynamic()).unmark_deep();
                    *element = plain;
                    marks = marks.union(nested);
                }
            }
            _ => {}
        }
        (value, marks)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.repr {
            Repr::Bool(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match &self.repr {
            Repr::Number(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.repr {
            Repr::String(value) => Some(value),
            _ => None,
        }
    }

    /// The number as a signed integer, if it is a whole number in range.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number()?.to_i64()
    }

    /// The elements of a known list, set or tuple.
    pub fn elements(&self) -> Option<&[Value]> {
        match &self.repr {
            Repr::Seq(elements) => Some(elements),
            _ => None,
        }
    }

    /// The elements of a known map or the attributes of a known object.
    pub fn attributes(&self) -> Option<&BTreeMap<String, Value>> {
        match &self.repr {
            Repr::Attrs(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&Value> {
        self.attributes().and_then(|attrs| attrs.get(name))
    }

    pub fn element(&self, index: usize) -> Option<&Value> {
        self.elements().and_then(|elements| elements.get(index))
    }

    /// Number of elements in a known collection or structural value.
    pub fn length(&self) -> Option<usize> {
        match &self.repr {
            Repr::Seq(elements) => Some(elements.len()),
            Repr::Attrs(attrs) => Some(attrs.len()),
            _ => None,
        }
    }

    /// Key/value pairs of a known iterable value: numeric keys for
    /// sequences and string keys (in sorted order) for mappings.
    pub fn element_pairs(&self) -> Vec<(Value, Value)> {
        match &self.repr {
            Repr::Seq(elements) => elements
                .iter()
                .enumerate()
                .map(|(i, value)| (Value::int(i as i64), value.clone()))
                .collect(),
            Repr::Attrs(attrs) => attrs
                .iter()
                .map(|(key, value)| (Value::string(key.clone()), value.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Compares two values, producing a `Bool` value.
    ///
    /// The result is unknown when either side (or anything nested) is
    /// unknown, and carries the marks of both operands.
    pub fn equals(&self, other: &Value) -> Value {
        let marks = self.marks.clone().union(other.marks.clone());
        let result = match raw_equals(self, other) {
            Some(equal) => Value::bool(equal),
            None => Value::unknown(Type::Bool),
        };
        result.with_marks(marks)
    }
}

fn common_element_type(elements: &[Value]) -> Type {
    let types: Vec<Type> = elements.iter().map(|value| value.ty.clone()).collect();
    match types.first() {
        None => Type::Dynamic,
        Some(first) if types.iter().all(|ty| ty == first) => first.clone(),
        Some(_) => unify(&types).unwrap_or(Type::Dynamic),
    }
}

/// Structural equality ignoring marks; `None` means "not yet known".
fn raw_equals(a: &Value, b: &Value) -> Option<bool> {
    match (&a.repr, &b.repr) {
        (Repr::Unknown, _) | (_, Repr::Unknown) => None,
        (Repr::Null, Repr::Null) => Some(true),
        (Repr::Null, _) | (_, Repr::Null) => Some(false),
        (Repr::Bool(x), Repr::Bool(y)) => Some(x == y),
        (Repr::Number(x), Repr::Number(y)) => Some(x == y),
        (Repr::String(x), Repr::String(y)) => Some(x == y),
        (Repr::Seq(xs), Repr::Seq(ys)) => {
            if !same_structure_kind(&a.ty, &b.ty) || xs.len() != ys.len() {
                return Some(false);
            }
            let mut unknown = false;
            for (x, y) in xs.iter().zip(ys) {
                match raw_equals(x, y) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown {
                None
            } else {
                Some(true)
            }
        }
        (Repr::Attrs(xs), Repr::Attrs(ys)) => {
            if !same_structure_kind(&a.ty, &b.ty) || xs.len() != ys.len() {
                return Some(false);
            }
            let mut unknown = false;
            for (key, x) in xs {
                let Some(y) = ys.get(key) else {
                    return Some(false);
                };
                match raw_equals(x, y) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown {
                None
            } else {
                Some(true)
            }
        }
        _ => Some(false),
    }
}

/// A total order over values that ignores marks. Known values sort before
/// nulls, and unknowns sort last.
fn canonical_order(a: &Value, b: &Value) -> Ordering {
    fn rank(repr: &Repr) -> u8 {
        match repr {
            Repr::Bool(_) => 0,
            Repr::Number(_) => 1,
            Repr::String(_) => 2,
            Repr::Seq(_) => 3,
            Repr::Attrs(_) => 4,
            Repr::Null => 5,
            Repr::Unknown => 6,
        }
    }
    match (&a.repr, &b.repr) {
        (Repr::Bool(x), Repr::Bool(y)) => x.cmp(y),
        (Repr::Number(x), Repr::Number(y)) => x.cmp(y),
        (Repr::String(x), Repr::String(y)) => x.cmp(y),
        (Repr::Seq(xs), Repr::Seq(ys)) => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| canonical_order(x, y))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| xs.len().cmp(&ys.len())),
        (Repr::Attrs(xs), Repr::Attrs(ys)) => xs
            .iter()
            .zip(ys)
            .map(|((kx, x), (ky, y))| kx.cmp(ky).then_with(|| canonical_order(x, y)))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| xs.len().cmp(&ys.len())),
        (x, y) => rank(x).cmp(&rank(y)),
    }
}

fn same_structure_kind(a: &Type, b: &Type) -> bool {
    matches!(
        (a, b),
        (Type::List(_), Type::List(_))
            | (Type::Set(_), Type::Set(_))
            | (Type::Tuple(_), Type::Tuple(_))
            | (Type::Map(_), Type::Map(_))
            | (Type::Object(_), Type::Object(_))
    )
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::int(value)
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::string(value)
    }
}

/// Renders values in the native expression syntax, for debugging output.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Null => f.write_str("null"),
            Repr::Unknown => write!(f, "(unknown {})", self.ty),
            Repr::Bool(value) => write!(f, "{value}"),
            Repr::Number(value) => write!(f, "{value}"),
            Repr::String(value) => {
                let quoted = serde_json::to_string(value).map_err(|_| fmt::Error)?;
                f.write_str(&quoted)
            }
            Repr::Seq(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Repr::Attrs(attrs) => {
                f.write_str("{")?;
                for (i, (key, element)) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key} = {element}")?;
                }
                f.write_str("}")
            }
        }
    }
}
