use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// The static type of a [`crate::Value`].
///
/// `Dynamic` is the pseudo-type used when the concrete type is not known
/// until a value is available.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Type {
    Bool,
    Number,
    String,
    List(Box<Type>),
    Set(Box<Type>),
    Map(Box<Type>),
    Tuple(Vec<Type>),
    Object(BTreeMap<String, Type>),
    Dynamic,
}

impl Type {
    pub fn list(element: Type) -> Self {
        Type::List(Box::new(element))
    }

    pub fn set(element: Type) -> Self {
        Type::Set(Box::new(element))
    }

    pub fn map(element: Type) -> Self {
        Type::Map(Box::new(element))
    }

    pub fn object<I, K>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, Type)>,
        K: Into<String>,
    {
        Type::Object(attrs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn empty_object() -> Self {
        Type::Object(BTreeMap::new())
    }

    pub fn empty_tuple() -> Self {
        Type::Tuple(Vec::new())
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Bool | Type::Number | Type::String)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Type::List(_) | Type::Set(_) | Type::Map(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Type::List(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Type::Set(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Type::Map(_))
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Type::Tuple(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Type::Object(_))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Type::Dynamic)
    }

    /// True for the sequence-like kinds that can be iterated by position.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Type::List(_) | Type::Set(_) | Type::Tuple(_))
    }

    /// True for the kinds that can be iterated at all.
    pub fn is_iterable(&self) -> bool {
        matches!(
            self,
            Type::List(_) | Type::Set(_) | Type::Map(_) | Type::Tuple(_) | Type::Object(_)
        )
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::List(ety) | Type::Set(ety) | Type::Map(ety) => Some(ety),
            _ => None,
        }
    }

    pub fn tuple_element_types(&self) -> Option<&[Type]> {
        match self {
            Type::Tuple(etys) => Some(etys),
            _ => None,
        }
    }

    pub fn attribute_types(&self) -> Option<&BTreeMap<String, Type>> {
        match self {
            Type::Object(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn attribute_type(&self, name: &str) -> Option<&Type> {
        self.attribute_types().and_then(|attrs| attrs.get(name))
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_type(name).is_some()
    }

    /// True if this type or any type nested inside it is `Dynamic`.
    pub fn has_dynamic_types(&self) -> bool {
        match self {
            Type::Dynamic => true,
            Type::Bool | Type::Number | Type::String => false,
            Type::List(ety) | Type::Set(ety) | Type::Map(ety) => ety.has_dynamic_types(),
            Type::Tuple(etys) => etys.iter().any(Type::has_dynamic_types),
            Type::Object(attrs) => attrs.values().any(Type::has_dynamic_types),
        }
    }

    /// A short English description used in user-facing messages.
    pub fn friendly_name(&self) -> String {
        match self {
            Type::Bool => "bool".to_string(),
            Type::Number => "number".to_string(),
            Type::String => "string".to_string(),
            Type::Dynamic => "dynamic".to_string(),
            Type::List(ety) => format!("list of {}", ety.friendly_name()),
            Type::Set(ety) => format!("set of {}", ety.friendly_name()),
            Type::Map(ety) => format!("map of {}", ety.friendly_name()),
            Type::Tuple(_) => "tuple".to_string(),
            Type::Object(_) => "object".to_string(),
        }
    }

    /// Like [`Type::friendly_name`] but tuned for "required" messages,
    /// where the details of structural types are not helpful.
    pub fn friendly_name_for_constraint(&self) -> String {
        match self {
            Type::Dynamic => "any type".to_string(),
            Type::Tuple(_) => "tuple".to_string(),
            Type::Object(_) => "object".to_string(),
            other => other.friendly_name(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => f.write_str("bool"),
            Type::Number => f.write_str("number"),
            Type::String => f.write_str("string"),
            Type::Dynamic => f.write_str("any"),
            Type::List(ety) => write!(f, "list({ety})"),
            Type::Set(ety) => write!(f, "set({ety})"),
            Type::Map(ety) => write!(f, "map({ety})"),
            Type::Tuple(etys) => {
                f.write_str("tuple([")?;
                for (i, ety) in etys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ety}")?;
                }
                f.write_str("])")
            }
            Type::Object(attrs) => {
                f.write_str("object({")?;
                for (i, (name, aty)) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}={aty}")?;
                }
                f.write_str("})")
            }
        }
    }
}

/// Finds a single type that all of the given types can convert to.
///
/// `Dynamic` inputs are ignored when at least one concrete type is
/// present. Primitive types only unify when they are identical, except
/// that numbers and bools unify with strings (as string).
pub fn unify(types: &[Type]) -> Option<Type> {
    let concrete: Vec<&Type> = types.iter().filter(|ty| !ty.is_dynamic()).collect();
    let Some(first) = concrete.first() else {
        return Some(Type::Dynamic);
    };
    if concrete.iter().all(|ty| *ty == *first) {
        return Some((*first).clone());
    }

    if concrete.iter().all(|ty| ty.is_primitive()) {
        let has_string = concrete.iter().any(|ty| **ty == Type::String);
        return has_string.then_some(Type::String);
    }

    if concrete.iter().all(|ty| ty.is_tuple()) {
        let len = first.tuple_element_types().map(<[Type]>::len).unwrap_or(0);
        if concrete
            .iter()
            .any(|ty| ty.tuple_element_types().map(<[Type]>::len) != Some(len))
        {
            return None;
        }
        let mut etys = Vec::with_capacity(len);
        for i in 0..len {
            let column: Vec<Type> = concrete
                .iter()
                .filter_map(|ty| ty.tuple_element_types().map(|etys| etys[i].clone()))
                .collect();
            etys.push(unify(&column)?);
        }
        return Some(Type::Tuple(etys));
    }

    if concrete.iter().all(|ty| ty.is_object()) {
        let names: Vec<&String> = first.attribute_types()?.keys().collect();
        for ty in &concrete {
            let attrs = ty.attribute_types()?;
            if attrs.len() != names.len() || names.iter().any(|name| !attrs.contains_key(*name)) {
                return None;
            }
        }
        let mut attrs = BTreeMap::new();
        for name in names {
            let column: Vec<Type> = concrete
                .iter()
                .filter_map(|ty| ty.attribute_type(name).cloned())
                .collect();
            attrs.insert(name.clone(), unify(&column)?);
        }
        return Some(Type::Object(attrs));
    }

    // Mixed sequence kinds collapse to a list; mixed mapping kinds to a map.
    let sequence_like = concrete
        .iter()
        .all(|ty| matches!(ty, Type::List(_) | Type::Tuple(_)));
    let set_like = concrete.iter().all(|ty| ty.is_set());
    let mapping_like = concrete
        .iter()
        .all(|ty| matches!(ty, Type::Map(_) | Type::Object(_)));
    if sequence_like || set_like || mapping_like {
        let mut elements = Vec::new();
        for ty in &concrete {
            match ty {
                Type::List(ety) | Type::Set(ety) | Type::Map(ety) => elements.push((**ety).clone()),
                Type::Tuple(etys) => elements.extend(etys.iter().cloned()),
                Type::Object(attrs) => elements.extend(attrs.values().cloned()),
                _ => return None,
            }
        }
        let ety = unify(&elements)?;
        return Some(if set_like {
            Type::set(ety)
        } else if sequence_like {
            Type::list(ety)
        } else {
            Type::map(ety)
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unify_identical() {
        assert_eq!(unify(&[Type::Number, Type::Number]), Some(Type::Number));
    }

    #[test]
    fn unify_number_and_bool_fails() {
        assert_eq!(unify(&[Type::Number, Type::Bool]), None);
    }

    #[test]
    fn unify_prefers_string() {
        assert_eq!(unify(&[Type::Number, Type::String]), Some(Type::String));
    }

    #[test]
    fn unify_ignores_dynamic() {
        assert_eq!(unify(&[Type::Dynamic, Type::Bool]), Some(Type::Bool));
        assert_eq!(unify(&[Type::Dynamic]), Some(Type::Dynamic));
    }

    #[test]
    fn unify_objects_need_same_attributes() {
        let a = Type::object([("a", Type::Number)]);
        let b = Type::object([("b", Type::Number)]);
        assert_eq!(unify(&[a.clone(), b]), None);
        assert_eq!(unify(&[a.clone(), a.clone()]), Some(a));
    }

    #[test]
    fn unify_list_and_tuple() {
        let list = Type::list(Type::String);
        let tuple = Type::Tuple(vec![Type::String, Type::Number]);
        assert_eq!(unify(&[list, tuple]), Some(Type::list(Type::String)));
    }

    #[test]
    fn friendly_names() {
        assert_eq!(Type::list(Type::Number).friendly_name(), "list of number");
        assert_eq!(Type::Dynamic.friendly_name_for_constraint(), "any type");
    }
}
