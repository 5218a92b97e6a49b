use std::collections::BTreeMap;

use crate::error::ConversionError;
use crate::number::Number;
use crate::types::{unify, Type};
use crate::value::Value;

/// Converts `value` to the type `want`, preserving marks at every level.
///
/// Null and unknown values convert to a null or unknown of the target type
/// whenever the conversion would be possible for some known value.
pub fn convert(value: &Value, want: &Type) -> Result<Value, ConversionError> {
    convert_at(value, want, &mut Vec::new())
}

/// True if some value of type `from` could convert to `to`.
pub fn conversion_possible(from: &Type, to: &Type) -> bool {
    if from == to || to.is_dynamic() || from.is_dynamic() {
        return true;
    }
    match (from, to) {
        (Type::Number | Type::Bool, Type::String) => true,
        (Type::String, Type::Number | Type::Bool) => true,
        (Type::List(f) | Type::Set(f), Type::List(t) | Type::Set(t)) => conversion_possible(f, t),
        (Type::Tuple(fs), Type::List(t) | Type::Set(t)) => {
            if t.is_dynamic() {
                unify(fs).is_some()
            } else {
                fs.iter().all(|f| conversion_possible(f, t))
            }
        }
        (Type::List(_) | Type::Set(_), Type::Tuple(_)) => true,
        (Type::Tuple(fs), Type::Tuple(ts)) => {
            fs.len() == ts.len() && fs.iter().zip(ts).all(|(f, t)| conversion_possible(f, t))
        }
        (Type::Map(f), Type::Map(t)) => conversion_possible(f, t),
        (Type::Object(fs), Type::Map(t)) => {
            if t.is_dynamic() {
                let attrs: Vec<Type> = fs.values().cloned().collect();
                unify(&attrs).is_some()
            } else {
                fs.values().all(|f| conversion_possible(f, t))
            }
        }
        (Type::Map(f), Type::Object(ts)) => ts.values().all(|t| conversion_possible(f, t)),
        (Type::Object(fs), Type::Object(ts)) => {
            fs.len() == ts.len()
                && ts.iter().all(|(name, t)| {
                    fs.get(name)
                        .is_some_and(|f| conversion_possible(f, t))
                })
        }
        _ => false,
    }
}

fn convert_at(
    value: &Value,
    want: &Type,
    path: &mut Vec<String>,
) -> Result<Value, ConversionError> {
    if want.is_dynamic() || value.ty() == want {
        return Ok(value.clone());
    }
    let (plain, marks) = value.clone().unmark();
    if !conversion_possible(plain.ty(), want) {
        return Err(mismatch(path, want));
    }
    if plain.is_null() {
        return Ok(Value::null(want.clone()).with_marks(marks));
    }
    if !plain.is_known() {
        return Ok(Value::unknown(want.clone()).with_marks(marks));
    }

    let converted = match want {
        Type::String => convert_to_string(&plain, path, want)?,
        Type::Number => {
            let text = plain.as_str().ok_or_else(|| mismatch(path, want))?;
            Value::number(parse_number(text).ok_or_else(|| {
                ConversionError::new(path, "a number is required")
            })?)
        }
        Type::Bool => match plain.as_str() {
            Some("true") => Value::bool(true),
            Some("false") => Value::bool(false),
            _ => return Err(ConversionError::new(path, "a bool is required")),
        },
        Type::List(ety) | Type::Set(ety) => {
            let elements = plain.elements().ok_or_else(|| mismatch(path, want))?;
            let target = if ety.is_dynamic() {
                let types: Vec<Type> = elements.iter().map(|e| e.ty().clone()).collect();
                unify(&types).ok_or_else(|| {
                    ConversionError::new(path, "all elements must have the same type")
                })?
            } else {
                (**ety).clone()
            };
            let mut out = Vec::with_capacity(elements.len());
            for (i, element) in elements.iter().enumerate() {
                path.push(format!("element {i}"));
                let result = convert_at(element, &target, path);
                path.pop();
                out.push(result?);
            }
            if want.is_set() {
                Value::set_of(target, out)
            } else {
                Value::list_of(target, out)
            }
        }
        Type::Tuple(etys) => {
            let elements = plain.elements().ok_or_else(|| mismatch(path, want))?;
            if elements.len() != etys.len() {
                return Err(ConversionError::new(
                    path,
                    format!("tuple required with exactly {} elements", etys.len()),
                ));
            }
            let mut out = Vec::with_capacity(elements.len());
            for (i, (element, ety)) in elements.iter().zip(etys).enumerate() {
                path.push(format!("element {i}"));
                let result = convert_at(element, ety, path);
                path.pop();
                out.push(result?);
            }
            Value::tuple(out)
        }
        Type::Map(ety) => {
            let attrs = plain.attributes().ok_or_else(|| mismatch(path, want))?;
            let target = if ety.is_dynamic() {
                let types: Vec<Type> = attrs.values().map(|e| e.ty().clone()).collect();
                unify(&types).ok_or_else(|| {
                    ConversionError::new(path, "all map elements must have the same type")
                })?
            } else {
                (**ety).clone()
            };
            let mut out = BTreeMap::new();
            for (key, element) in attrs {
                path.push(format!("element {key:?}"));
                let result = convert_at(element, &target, path);
                path.pop();
                out.insert(key.clone(), result?);
            }
            Value::map_of(target, out)
        }
        Type::Object(want_attrs) => {
            let attrs = plain.attributes().ok_or_else(|| mismatch(path, want))?;
            if let Some(extra) = attrs.keys().find(|name| !want_attrs.contains_key(*name)) {
                return Err(ConversionError::new(
                    path,
                    format!("unsupported attribute {extra:?}"),
                ));
            }
            let mut out = BTreeMap::new();
            for (name, aty) in want_attrs {
                let Some(element) = attrs.get(name) else {
                    return Err(ConversionError::new(
                        path,
                        format!("attribute {name:?} is required"),
                    ));
                };
                path.push(format!("attribute {name:?}"));
                let result = convert_at(element, aty, path);
                path.pop();
                out.insert(name.clone(), result?);
            }
            Value::object(out)
        }
        Type::Dynamic => plain.clone(),
    };
    Ok(converted.with_marks(marks))
}

fn convert_to_string(
    value: &Value,
    path: &[String],
    want: &Type,
) -> Result<Value, ConversionError> {
    if let Some(number) = value.as_number() {
        return Ok(Value::string(number.to_string()));
    }
    if let Some(flag) = value.as_bool() {
        return Ok(Value::string(if flag { "true" } else { "false" }));
    }
    Err(mismatch(path, want))
}

fn mismatch(path: &[String], want: &Type) -> ConversionError {
    ConversionError::new(
        path,
        format!("{} required", want.friendly_name_for_constraint()),
    )
}

/// Parses a decimal number, accepting an optional exponent.
pub fn parse_number(text: &str) -> Option<Number> {
    Number::parse(text)
}
