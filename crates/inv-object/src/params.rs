//! Typed access to call params.

use inv_types::{IndexKey, Key};
use serde_json::Value;

use crate::error::{ObjectError, ObjectResult};

pub fn required_str<'a>(params: &'a Value, name: &str) -> ObjectResult<&'a str> {
    match params.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ObjectError::InvalidParams(format!("\"{name}\" must be a string"))),
        None => Err(ObjectError::InvalidParams(format!("missing \"{name}\""))),
    }
}

pub fn optional_str<'a>(params: &'a Value, name: &str) -> ObjectResult<Option<&'a str>> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ObjectError::InvalidParams(format!("\"{name}\" must be a string"))),
    }
}

/// Array of strings; an absent member reads as empty.
pub fn str_list(params: &Value, name: &str) -> ObjectResult<Vec<String>> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    ObjectError::InvalidParams(format!("\"{name}\" must hold only strings"))
                })
            })
            .collect(),
        Some(_) => Err(ObjectError::InvalidParams(format!("\"{name}\" must be an array"))),
    }
}

/// Array of object paths; an absent member reads as empty.
pub fn path_list(params: &Value, name: &str) -> ObjectResult<Vec<IndexKey>> {
    str_list(params, name)?
        .iter()
        .map(|p| IndexKey::parse(p).map_err(ObjectError::from))
        .collect()
}
