use hcl_value::{convert, Type, Value};

use crate::didyoumean::suggestion_sentence;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::pos::Range;

const BAD_KEY: &str = "The given key does not identify an element in this collection value";

fn error(summary: &str, detail: impl Into<String>, subject: Option<&Range>) -> Diagnostics {
    let mut diag = Diagnostic::error(summary, detail);
    diag.subject = subject.cloned();
    diag.into()
}

/// Looks up `key` in `collection`, the way an index expression `c[k]` does.
///
/// Marks on the collection always propagate to the result. Marks on the
/// key propagate for lists, tuples and maps, but not for object attribute
/// lookups, whose key must be a known string anyway.
pub fn index(collection: &Value, key: &Value, src_range: Option<&Range>) -> (Value, Diagnostics) {
    let (coll, coll_marks) = collection.clone().unmark();
    let (key, key_marks) = key.clone().unmark();
    let all_marks = coll_marks.clone().union(key_marks.clone());

    if coll.is_null() {
        return (
            Value::dynamic(),
            error(
                "Attempt to index null value",
                "This value is null, so it does not have any indices.",
                src_range,
            ),
        );
    }
    if key.is_null() {
        return (
            Value::dynamic(),
            error(
                "Invalid index",
                "Can't use a null value as an indexing key.",
                src_range,
            ),
        );
    }

    match coll.ty().clone() {
        Type::Dynamic => (Value::dynamic().with_marks(all_marks), Diagnostics::new()),
        Type::List(_) | Type::Tuple(_) => {
            let element_unknown = |coll: &Value| match coll.ty() {
                Type::List(ety) => Value::unknown((**ety).clone()),
                _ => Value::dynamic(),
            };
            let number = match convert(&key, &Type::Number) {
                Ok(number) => number,
                Err(_) => {
                    return (
                        Value::dynamic(),
                        error(
                            "Invalid index",
                            format!("{BAD_KEY}: a number is required."),
                            src_range,
                        ),
                    )
                }
            };
            if !number.is_known() || !coll.is_known() {
                return (element_unknown(&coll).with_marks(all_marks), Diagnostics::new());
            }
            let Some(idx) = number.as_i64() else {
                return (
                    Value::dynamic(),
                    error(
                        "Invalid index",
                        format!("{BAD_KEY}: a whole number is required."),
                        src_range,
                    ),
                );
            };
            let len = coll.length().unwrap_or(0);
            if idx < 0 {
                return (
                    Value::dynamic(),
                    error(
                        "Invalid index",
                        format!("{BAD_KEY}: a negative number is not a valid index for a sequence."),
                        src_range,
                    ),
                );
            }
            if (idx as usize) >= len {
                let reason = if len == 0 {
                    "the collection has no elements"
                } else {
                    "the given index is greater than or equal to the length of the collection"
                };
                return (
                    Value::dynamic(),
                    error("Invalid index", format!("{BAD_KEY}: {reason}."), src_range),
                );
            }
            let element = coll.element(idx as usize).cloned().unwrap_or_else(Value::dynamic);
            (element.with_marks(all_marks), Diagnostics::new())
        }
        Type::Map(ety) => {
            let name = match convert(&key, &Type::String) {
                Ok(name) => name,
                Err(_) => {
                    return (
                        Value::dynamic(),
                        error(
                            "Invalid index",
                            format!("{BAD_KEY}: string required."),
                            src_range,
                        ),
                    )
                }
            };
            if !name.is_known() || !coll.is_known() {
                return (Value::unknown(*ety).with_marks(all_marks), Diagnostics::new());
            }
            match name.as_str().and_then(|name| coll.get_attr(name)) {
                Some(element) => (element.clone().with_marks(all_marks), Diagnostics::new()),
                None => (
                    Value::dynamic(),
                    error("Invalid index", format!("{BAD_KEY}."), src_range),
                ),
            }
        }
        Type::Object(attrs) => {
            let name = match convert(&key, &Type::String) {
                Ok(name) => name,
                Err(_) => {
                    return (
                        Value::dynamic(),
                        error(
                            "Invalid index",
                            format!("{BAD_KEY}: string required."),
                            src_range,
                        ),
                    )
                }
            };
            if !name.is_known() {
                return (Value::dynamic().with_marks(coll_marks), Diagnostics::new());
            }
            let name = name.as_str().unwrap_or_default();
            let Some(aty) = attrs.get(name) else {
                return (
                    Value::dynamic(),
                    error("Invalid index", format!("{BAD_KEY}."), src_range),
                );
            };
            if !coll.is_known() {
                return (Value::unknown(aty.clone()).with_marks(coll_marks), Diagnostics::new());
            }
            let element = coll.get_attr(name).cloned().unwrap_or_else(Value::dynamic);
            (element.with_marks(coll_marks), Diagnostics::new())
        }
        Type::Set(_) => (
            Value::dynamic(),
            error(
                "Invalid index",
                "Elements of a set are identified only by their value and don't have any separate index or key to select with, so it's only possible to perform operations across all elements of the set.",
                src_range,
            ),
        ),
        Type::Bool | Type::Number | Type::String => (
            Value::dynamic(),
            error(
                "Invalid index",
                "This value does not have any indices.",
                src_range,
            ),
        ),
    }
}

/// Reads attribute `name` from `value`, the way `v.name` does.
pub fn get_attr(value: &Value, name: &str, src_range: Option<&Range>) -> (Value, Diagnostics) {
    let (plain, marks) = value.clone().unmark();
    if plain.is_null() {
        return (
            Value::dynamic(),
            error(
                "Attempt to get attribute from null value",
                "This value is null, so it does not have any attributes.",
                src_range,
            ),
        );
    }
    match plain.ty().clone() {
        Type::Dynamic => (Value::dynamic().with_marks(marks), Diagnostics::new()),
        Type::Object(attrs) => {
            let Some(aty) = attrs.get(name) else {
                let names: Vec<&str> = attrs.keys().map(String::as_str).collect();
                return (
                    Value::dynamic(),
                    error(
                        "Unsupported attribute",
                        format!(
                            "This object does not have an attribute named {name:?}.{}",
                            suggestion_sentence(name, &names)
                        ),
                        src_range,
                    ),
                );
            };
            if !plain.is_known() {
                return (Value::unknown(aty.clone()).with_marks(marks), Diagnostics::new());
            }
            let attr = plain.get_attr(name).cloned().unwrap_or_else(Value::dynamic);
            (attr.with_marks(marks), Diagnostics::new())
        }
        Type::Map(ety) => {
            if !plain.is_known() {
                return (Value::unknown(*ety).with_marks(marks), Diagnostics::new());
            }
            match plain.get_attr(name) {
                Some(element) => (element.clone().with_marks(marks), Diagnostics::new()),
                None => (
                    Value::dynamic(),
                    error(
                        "Missing map element",
                        format!("This map does not have an element with the key {name:?}."),
                        src_range,
                    ),
                ),
            }
        }
        Type::List(_) | Type::Set(_) | Type::Tuple(_) => {
            let kind = match plain.ty() {
                Type::Set(_) => "set",
                Type::Tuple(_) => "tuple",
                _ => "list",
            };
            (
                Value::dynamic(),
                error(
                    "Unsupported attribute",
                    format!(
                        "Can't access attributes on a {kind} of objects. Did you mean to access an attribute for a specific element of the {kind}, or across all elements of the {kind}?"
                    ),
                    src_range,
                ),
            )
        }
        ty @ (Type::Bool | Type::Number | Type::String) => (
            Value::dynamic(),
            error(
                "Unsupported attribute",
                format!(
                    "Can't access attributes on a primitive-typed value ({}).",
                    ty.friendly_name()
                ),
                src_range,
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_list() {
        let list = Value::list(vec![Value::string("a"), Value::string("b")]);
        let (value, diags) = index(&list, &Value::int(1), None);
        assert!(diags.is_empty());
        assert_eq!(value, Value::string("b"));
    }

    #[test]
    fn index_rejects_fraction() {
        let list = Value::list(vec![Value::string("a")]);
        let (_, diags) = index(&list, &Value::number(hcl_value::Number::parse("0.5").unwrap()), None);
        assert!(diags[0].detail.contains("whole number"));
    }

    #[test]
    fn index_out_of_range() {
        let tuple = Value::tuple(vec![Value::int(1)]);
        let (_, diags) = index(&tuple, &Value::int(3), None);
        assert_eq!(diags[0].summary, "Invalid index");
    }

    #[test]
    fn index_null_collection() {
        let (_, diags) = index(&Value::null(Type::list(Type::String)), &Value::int(0), None);
        assert_eq!(diags[0].summary, "Attempt to index null value");
    }

    #[test]
    fn index_map_coerces_key_and_propagates_key_marks() {
        let map = Value::map([("1".to_string(), Value::bool(true))].into_iter().collect());
        let (value, diags) = index(&map, &Value::int(1).mark("k"), None);
        assert!(diags.is_empty());
        assert_eq!(value.as_bool(), Some(true));
        assert!(value.is_marked());
    }

    #[test]
    fn object_key_marks_do_not_propagate() {
        let object = Value::object_from([("a", Value::int(1))]).mark("coll");
        let (value, _) = index(&object, &Value::string("a").mark("key"), None);
        assert!(value.has_mark(&"coll".into()));
        assert!(!value.has_mark(&"key".into()));
    }

    #[test]
    fn index_set_is_rejected() {
        let set = Value::set(vec![Value::int(1)]);
        let (_, diags) = index(&set, &Value::int(0), None);
        assert!(diags[0].detail.starts_with("Elements of a set"));
    }

    #[test]
    fn unknown_list_index() {
        let list = Value::unknown(Type::list(Type::Number));
        let (value, diags) = index(&list, &Value::int(0), None);
        assert!(diags.is_empty());
        assert_eq!(value, Value::unknown(Type::Number));
    }

    #[test]
    fn get_attr_suggests() {
        let object = Value::object_from([("name", Value::string("x"))]);
        let (_, diags) = get_attr(&object, "nmae", None);
        assert_eq!(diags[0].summary, "Unsupported attribute");
        assert!(diags[0].detail.contains("Did you mean \"name\"?"));
    }

    #[test]
    fn get_attr_on_null() {
        let (_, diags) = get_attr(&Value::null(Type::empty_object()), "a", None);
        assert_eq!(diags[0].summary, "Attempt to get attribute from null value");
    }
}
