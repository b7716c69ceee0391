//! Builtin functions and native namespaces registered into the global scope.
//!
//! Every native receives the interpreter as an explicit context handle and
//! marshals between host data and the Value model at the boundary.

use super::env::Environment;
use super::error::{EvalResult, Frame, RuntimeError};
use super::eval::Interpreter;
use super::value::{from_json, to_json, ListObject, MapObject, NativeFn, SetObject, Value};
use crate::types::matching::value_matches;
use chrono::{Local, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

fn native(name: &'static str, handler: super::value::NativeHandler) -> Value {
    Value::Native(NativeFn { name, handler })
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

fn list_value(items: Vec<Value>) -> Value {
    Value::List(Arc::new(ListObject::with_items("any", items)))
}

fn map_value(entries: Vec<(&str, Value)>) -> Value {
    let map = MapObject::new("string", "any");
    for (key, value) in entries {
        map.insert(Value::string(key), value);
    }
    Value::Map(Arc::new(map))
}

// ----------------------------------------------------------------------
// Core builtins
// ----------------------------------------------------------------------

fn builtin_print(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let parts: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    println!("{}", parts.join(" "));
    Ok(Value::Null)
}

fn builtin_len(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let length = match &arg(args, 0) {
        Value::Str(s) => s.chars().count(),
        Value::List(l) => l.items.lock().len(),
        Value::Map(m) => m.len(),
        Value::Set(s) => s.len(),
        _ => 0,
    };
    Ok(Value::Int(length as i64))
}

fn builtin_type(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(arg(args, 0).type_name()))
}

fn builtin_wait_seconds(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    match arg(args, 0).as_float() {
        Some(seconds) if seconds >= 0.0 => {
            std::thread::sleep(std::time::Duration::from_secs_f64(seconds));
            Ok(Value::Bool(true))
        }
        _ => Ok(Value::Bool(false)),
    }
}

/// Convert captured frames into a value shape programs can inspect
pub fn frames_to_value(frames: &[Frame]) -> Value {
    let items = frames
        .iter()
        .map(|frame| {
            map_value(vec![
                ("function", Value::string(frame.function.clone())),
                (
                    "file",
                    frame
                        .file
                        .as_ref()
                        .map(|p| Value::string(p.display().to_string()))
                        .unwrap_or(Value::Null),
                ),
                (
                    "line",
                    frame.line.map(|l| Value::Int(l as i64)).unwrap_or(Value::Null),
                ),
                (
                    "column",
                    frame
                        .column
                        .map(|c| Value::Int(c as i64))
                        .unwrap_or(Value::Null),
                ),
                (
                    "source",
                    frame
                        .source
                        .as_ref()
                        .map(|s| Value::string(s.clone()))
                        .unwrap_or(Value::Null),
                ),
            ])
        })
        .collect();
    list_value(items)
}

fn builtin_exception_stack_trace(interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let frames = interp.trace_for_value(&arg(args, 0));
    Ok(frames_to_value(&frames))
}

fn builtin_exception_message(interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let value = arg(args, 0);
    Ok(Value::string(interp.format_exception_message(&value)))
}

fn builtin_exception_type(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(arg(args, 0).type_name()))
}

// ----------------------------------------------------------------------
// Container constructors
// ----------------------------------------------------------------------

/// `new List(elemType?, items...)` — a leading string literal names the
/// element type (injected by the constructor sugar when omitted).
fn native_list_ctor(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let (elem_type, rest) = match args.first() {
        Some(Value::Str(ty)) => (ty.to_string(), &args[1..]),
        _ => ("any".to_string(), args),
    };
    for item in rest {
        if !value_matches(item, Some(&elem_type)) {
            return Err(RuntimeError::type_error(format!(
                "cannot add value of type '{}' to List<{elem_type}>",
                item.type_name()
            ))
            .into());
        }
    }
    Ok(Value::List(Arc::new(ListObject::with_items(
        elem_type,
        rest.to_vec(),
    ))))
}

fn native_map_ctor(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let key_type = match args.first() {
        Some(Value::Str(ty)) => ty.to_string(),
        _ => "any".to_string(),
    };
    let value_type = match args.get(1) {
        Some(Value::Str(ty)) => ty.to_string(),
        _ => "any".to_string(),
    };
    Ok(Value::Map(Arc::new(MapObject::new(key_type, value_type))))
}

fn native_set_ctor(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let (elem_type, rest) = match args.first() {
        Some(Value::Str(ty)) => (ty.to_string(), &args[1..]),
        _ => ("any".to_string(), args),
    };
    let set = SetObject::new(elem_type);
    for item in rest {
        set.add(item.clone());
    }
    Ok(Value::Set(Arc::new(set)))
}

// ----------------------------------------------------------------------
// JSON / Object namespaces
// ----------------------------------------------------------------------

fn json_parse(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    match arg(args, 0).as_str() {
        Some(text) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(parsed) => Ok(from_json(&parsed)),
            Err(_) => Ok(Value::Null),
        },
        None => Ok(Value::Null),
    }
}

fn json_stringify(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let json = to_json(&arg(args, 0));
    match serde_json::to_string_pretty(&json) {
        Ok(text) => Ok(Value::string(text)),
        Err(_) => Ok(Value::string(arg(args, 0).to_string())),
    }
}

fn object_keys(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let keys = match &arg(args, 0) {
        Value::Map(map) => map.entries.lock().iter().map(|(k, _)| k.clone()).collect(),
        Value::Instance(instance) => {
            let mut names: Vec<String> = instance.fields.lock().keys().cloned().collect();
            names.sort();
            names.into_iter().map(Value::string).collect()
        }
        _ => Vec::new(),
    };
    Ok(list_value(keys))
}

fn object_values(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let values = match &arg(args, 0) {
        Value::Map(map) => map.entries.lock().iter().map(|(_, v)| v.clone()).collect(),
        Value::Instance(instance) => {
            let fields = instance.fields.lock();
            let mut names: Vec<&String> = fields.keys().collect();
            names.sort();
            names.iter().filter_map(|name| fields.get(*name).cloned()).collect()
        }
        _ => Vec::new(),
    };
    Ok(list_value(values))
}

fn object_entries(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let entries = match &arg(args, 0) {
        Value::Map(map) => map
            .entries
            .lock()
            .iter()
            .map(|(k, v)| list_value(vec![k.clone(), v.clone()]))
            .collect(),
        _ => Vec::new(),
    };
    Ok(list_value(entries))
}

fn object_clone(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let value = arg(args, 0);
    match &value {
        Value::Map(_) | Value::List(_) | Value::Set(_) | Value::Instance(_) => {
            Ok(from_json(&to_json(&value)))
        }
        other => Ok(other.clone()),
    }
}

// ----------------------------------------------------------------------
// mf.utils / mf.fs / mf.path / mf.datetime
// ----------------------------------------------------------------------

fn utils_upper(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(
        arg(args, 0).as_str().unwrap_or_default().to_uppercase(),
    ))
}

fn utils_lower(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(
        arg(args, 0).as_str().unwrap_or_default().to_lowercase(),
    ))
}

fn utils_strip(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(
        arg(args, 0).as_str().unwrap_or_default().trim().to_string(),
    ))
}

fn fs_read_text(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let path = arg(args, 0);
    let path = path
        .as_str()
        .ok_or_else(|| RuntimeError::type_error("read_text expects a path string"))?;
    std::fs::read_to_string(path)
        .map(Value::string)
        .map_err(|err| RuntimeError::io_error(err.to_string()).into())
}

fn fs_write_text(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let path = arg(args, 0);
    let path = path
        .as_str()
        .ok_or_else(|| RuntimeError::type_error("write_text expects a path string"))?;
    let content = arg(args, 1).to_string();
    std::fs::write(path, content)
        .map(|_| Value::Bool(true))
        .map_err(|err| RuntimeError::io_error(err.to_string()).into())
}

fn fs_append_text(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    use std::io::Write;
    let path = arg(args, 0);
    let path = path
        .as_str()
        .ok_or_else(|| RuntimeError::type_error("append_text expects a path string"))?;
    let content = arg(args, 1).to_string();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| RuntimeError::io_error(err.to_string()))?;
    file.write_all(content.as_bytes())
        .map(|_| Value::Bool(true))
        .map_err(|err| RuntimeError::io_error(err.to_string()).into())
}

fn fs_exists(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::Bool(
        arg(args, 0)
            .as_str()
            .map(|p| std::path::Path::new(p).exists())
            .unwrap_or(false),
    ))
}

fn fs_is_file(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::Bool(
        arg(args, 0)
            .as_str()
            .map(|p| std::path::Path::new(p).is_file())
            .unwrap_or(false),
    ))
}

fn fs_is_dir(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::Bool(
        arg(args, 0)
            .as_str()
            .map(|p| std::path::Path::new(p).is_dir())
            .unwrap_or(false),
    ))
}

fn fs_make_dir(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let path = arg(args, 0);
    let path = path
        .as_str()
        .ok_or_else(|| RuntimeError::type_error("make_dir expects a path string"))?;
    std::fs::create_dir_all(path)
        .map(|_| Value::Bool(true))
        .map_err(|err| RuntimeError::io_error(err.to_string()).into())
}

fn fs_remove(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let path = arg(args, 0);
    let path = match path.as_str() {
        Some(p) => p,
        None => return Ok(Value::Bool(false)),
    };
    let target = std::path::Path::new(path);
    let result = if target.is_dir() {
        std::fs::remove_dir_all(target)
    } else {
        std::fs::remove_file(target)
    };
    Ok(Value::Bool(result.is_ok()))
}

fn fs_list_dir(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let path = arg(args, 0);
    let path = path
        .as_str()
        .ok_or_else(|| RuntimeError::type_error("list_dir expects a path string"))?;
    let entries = std::fs::read_dir(path)
        .map_err(|err| RuntimeError::io_error(err.to_string()))?
        .flatten()
        .map(|entry| Value::string(entry.file_name().to_string_lossy().to_string()))
        .collect();
    Ok(list_value(entries))
}

fn path_join(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let mut path = std::path::PathBuf::new();
    for part in args {
        if let Some(s) = part.as_str() {
            path.push(s);
        }
    }
    Ok(Value::string(path.display().to_string()))
}

fn path_basename(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(
        arg(args, 0)
            .as_str()
            .and_then(|p| std::path::Path::new(p).file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    ))
}

fn path_dirname(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(
        arg(args, 0)
            .as_str()
            .and_then(|p| std::path::Path::new(p).parent())
            .map(|n| n.display().to_string())
            .unwrap_or_default(),
    ))
}

fn path_extname(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(
        arg(args, 0)
            .as_str()
            .and_then(|p| std::path::Path::new(p).extension())
            .map(|n| format!(".{}", n.to_string_lossy()))
            .unwrap_or_default(),
    ))
}

fn path_is_absolute(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::Bool(
        arg(args, 0)
            .as_str()
            .map(|p| std::path::Path::new(p).is_absolute())
            .unwrap_or(false),
    ))
}

fn datetime_now(_interp: &mut Interpreter, _args: &[Value]) -> EvalResult {
    let now = Utc::now();
    Ok(Value::Float(
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1000.0,
    ))
}

fn datetime_today(_interp: &mut Interpreter, _args: &[Value]) -> EvalResult {
    Ok(Value::string(Local::now().format("%Y-%m-%d").to_string()))
}

fn datetime_format(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let timestamp = match arg(args, 0).as_float() {
        Some(ts) => ts,
        None => return Ok(Value::string("")),
    };
    let format = arg(args, 1);
    let format = format.as_str().unwrap_or("%Y-%m-%d %H:%M:%S");
    match Utc.timestamp_opt(timestamp as i64, 0).single() {
        Some(moment) => Ok(Value::string(moment.format(format).to_string())),
        None => Ok(Value::string("")),
    }
}

fn datetime_parse(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let text = arg(args, 0);
    let text = match text.as_str() {
        Some(t) => t,
        None => return Ok(Value::Null),
    };
    let format = arg(args, 1);
    let format = format.as_str().unwrap_or("%Y-%m-%d");
    match NaiveDate::parse_from_str(text, format) {
        Ok(date) => {
            let moment = date.and_hms_opt(0, 0, 0).unwrap_or_default();
            Ok(Value::Float(moment.and_utc().timestamp() as f64))
        }
        Err(_) => Ok(Value::Null),
    }
}

// ----------------------------------------------------------------------
// Prototype methods for primitive values (receiver is args[0])
// ----------------------------------------------------------------------

fn proto_string_upper(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(
        arg(args, 0).as_str().unwrap_or_default().to_uppercase(),
    ))
}

fn proto_string_lower(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(
        arg(args, 0).as_str().unwrap_or_default().to_lowercase(),
    ))
}

fn proto_string_trim(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(
        arg(args, 0).as_str().unwrap_or_default().trim().to_string(),
    ))
}

fn proto_string_contains(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let receiver = arg(args, 0);
    let needle = arg(args, 1);
    Ok(Value::Bool(match (receiver.as_str(), needle.as_str()) {
        (Some(haystack), Some(needle)) => haystack.contains(needle),
        _ => false,
    }))
}

fn proto_string_starts_with(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let receiver = arg(args, 0);
    let prefix = arg(args, 1);
    Ok(Value::Bool(match (receiver.as_str(), prefix.as_str()) {
        (Some(s), Some(p)) => s.starts_with(p),
        _ => false,
    }))
}

fn proto_string_ends_with(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let receiver = arg(args, 0);
    let suffix = arg(args, 1);
    Ok(Value::Bool(match (receiver.as_str(), suffix.as_str()) {
        (Some(s), Some(p)) => s.ends_with(p),
        _ => false,
    }))
}

fn proto_string_replace(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let receiver = arg(args, 0);
    let old = arg(args, 1).to_string();
    let new = arg(args, 2).to_string();
    Ok(Value::string(
        receiver.as_str().unwrap_or_default().replace(&old, &new),
    ))
}

fn proto_number_to_string(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(arg(args, 0).to_string()))
}

fn proto_number_to_fixed(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let number = arg(args, 0).as_float().unwrap_or(0.0);
    let decimals = arg(args, 1).as_int().unwrap_or(2).clamp(0, 17) as usize;
    Ok(Value::string(format!("{number:.decimals$}")))
}

fn proto_number_abs(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    match arg(args, 0) {
        Value::Int(n) => Ok(Value::Int(n.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        _ => Ok(Value::Int(0)),
    }
}

fn proto_number_round(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let number = arg(args, 0).as_float().unwrap_or(0.0);
    let decimals = arg(args, 1).as_int().unwrap_or(0).clamp(0, 17);
    if decimals == 0 {
        Ok(Value::Int(number.round() as i64))
    } else {
        let factor = 10f64.powi(decimals as i32);
        Ok(Value::Float((number * factor).round() / factor))
    }
}

fn proto_number_format_currency(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let number = arg(args, 0).as_float().unwrap_or(0.0);
    let currency = arg(args, 1);
    let currency = currency.as_str().unwrap_or("USD").to_uppercase();
    let formatted = format!("{number:.2}");
    let symbol = match currency.as_str() {
        "USD" => "$".to_string(),
        "EUR" => "€".to_string(),
        "BRL" => "R$".to_string(),
        other => other.to_string(),
    };
    Ok(Value::string(format!("{symbol} {formatted}")))
}

/// Prototype method lookup for primitive receivers
pub fn prototype_method(type_name: &str, method: &str) -> Option<NativeFn> {
    let handler: super::value::NativeHandler = match (type_name, method) {
        ("string", "upper") => proto_string_upper,
        ("string", "lower") => proto_string_lower,
        ("string", "trim") => proto_string_trim,
        ("string", "contains") => proto_string_contains,
        ("string", "startsWith") => proto_string_starts_with,
        ("string", "endsWith") => proto_string_ends_with,
        ("string", "replace") => proto_string_replace,
        ("int" | "float", "toString") => proto_number_to_string,
        ("int" | "float", "toFixed") => proto_number_to_fixed,
        ("int" | "float", "abs") => proto_number_abs,
        ("int" | "float", "round") => proto_number_round,
        ("int" | "float", "formatCurrency") => proto_number_format_currency,
        _ => return None,
    };
    Some(NativeFn {
        name: "prototype",
        handler,
    })
}

// ----------------------------------------------------------------------
// Container methods (receiver is args[0])
// ----------------------------------------------------------------------

fn expect_list(args: &[Value]) -> Result<Arc<ListObject>, RuntimeError> {
    match args.first() {
        Some(Value::List(list)) => Ok(Arc::clone(list)),
        _ => Err(RuntimeError::type_error("receiver is not a List")),
    }
}

fn expect_map(args: &[Value]) -> Result<Arc<MapObject>, RuntimeError> {
    match args.first() {
        Some(Value::Map(map)) => Ok(Arc::clone(map)),
        _ => Err(RuntimeError::type_error("receiver is not a Map")),
    }
}

fn expect_set(args: &[Value]) -> Result<Arc<SetObject>, RuntimeError> {
    match args.first() {
        Some(Value::Set(set)) => Ok(Arc::clone(set)),
        _ => Err(RuntimeError::type_error("receiver is not a Set")),
    }
}

fn list_push(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let item = arg(args, 1);
    if !value_matches(&item, Some(&list.elem_type)) {
        return Err(RuntimeError::type_error(format!(
            "cannot add value of type '{}' to List<{}>",
            item.type_name(),
            list.elem_type
        ))
        .into());
    }
    list.items.lock().push(item);
    Ok(Value::Null)
}

fn list_insert_at(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let index = arg(args, 1)
        .as_int()
        .ok_or_else(|| RuntimeError::type_error("insertAt expects an index"))?;
    let item = arg(args, 2);
    if !value_matches(&item, Some(&list.elem_type)) {
        return Err(RuntimeError::type_error(format!(
            "cannot add value of type '{}' to List<{}>",
            item.type_name(),
            list.elem_type
        ))
        .into());
    }
    let mut items = list.items.lock();
    let index = (index.max(0) as usize).min(items.len());
    items.insert(index, item);
    Ok(Value::Null)
}

fn list_delete_at(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let index = match arg(args, 1).as_int() {
        Some(i) => i,
        None => return Ok(Value::Null),
    };
    let mut items = list.items.lock();
    if index >= 0 && (index as usize) < items.len() {
        Ok(items.remove(index as usize))
    } else {
        Ok(Value::Null)
    }
}

fn list_index_of(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let item = arg(args, 1);
    let index = list
        .items
        .lock()
        .iter()
        .position(|v| *v == item)
        .map(|i| i as i64)
        .unwrap_or(-1);
    Ok(Value::Int(index))
}

fn list_contains(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let item = arg(args, 1);
    let found = list.items.lock().iter().any(|v| *v == item);
    Ok(Value::Bool(found))
}

fn list_clear(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    list.items.lock().clear();
    Ok(Value::Null)
}

fn list_get(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let index = match arg(args, 1).as_int() {
        Some(i) => i,
        None => return Ok(Value::Null),
    };
    let items = list.items.lock();
    if index >= 0 && (index as usize) < items.len() {
        Ok(items[index as usize].clone())
    } else {
        Ok(Value::Null)
    }
}

fn list_set(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let index = arg(args, 1)
        .as_int()
        .ok_or_else(|| RuntimeError::type_error("set expects an index"))?;
    let item = arg(args, 2);
    let mut items = list.items.lock();
    if index >= 0 && (index as usize) < items.len() {
        items[index as usize] = item;
        Ok(Value::Bool(true))
    } else {
        Ok(Value::Bool(false))
    }
}

fn list_length(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let len = list.items.lock().len() as i64;
    Ok(Value::Int(len))
}

fn list_to_string(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    Ok(Value::string(arg(args, 0).to_string()))
}

fn list_map(interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let callback = arg(args, 1);
    let snapshot = list.items.lock().clone();
    let mut mapped = Vec::with_capacity(snapshot.len());
    for item in snapshot {
        mapped.push(interp.call_value(callback.clone(), vec![item])?);
    }
    Ok(list_value(mapped))
}

fn list_filter(interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let callback = arg(args, 1);
    let snapshot = list.items.lock().clone();
    let mut kept = Vec::new();
    for item in snapshot {
        if interp
            .call_value(callback.clone(), vec![item.clone()])?
            .is_truthy()
        {
            kept.push(item);
        }
    }
    Ok(Value::List(Arc::new(ListObject::with_items(
        list.elem_type.clone(),
        kept,
    ))))
}

fn list_for_each(interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let list = expect_list(args)?;
    let callback = arg(args, 1);
    let snapshot = list.items.lock().clone();
    for item in snapshot {
        interp.call_value(callback.clone(), vec![item])?;
    }
    Ok(Value::Null)
}

fn map_set(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let map = expect_map(args)?;
    map.insert(arg(args, 1), arg(args, 2));
    Ok(Value::Null)
}

fn map_get(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let map = expect_map(args)?;
    Ok(map.get(&arg(args, 1)).unwrap_or(Value::Null))
}

fn map_has(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let map = expect_map(args)?;
    Ok(Value::Bool(map.contains_key(&arg(args, 1))))
}

fn map_delete(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let map = expect_map(args)?;
    Ok(Value::Bool(map.remove(&arg(args, 1))))
}

fn map_size(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let map = expect_map(args)?;
    Ok(Value::Int(map.len() as i64))
}

fn map_keys(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let map = expect_map(args)?;
    let keys = map.entries.lock().iter().map(|(k, _)| k.clone()).collect();
    Ok(list_value(keys))
}

fn map_values(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let map = expect_map(args)?;
    let values = map.entries.lock().iter().map(|(_, v)| v.clone()).collect();
    Ok(list_value(values))
}

fn map_entries(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let map = expect_map(args)?;
    let entries = map
        .entries
        .lock()
        .iter()
        .map(|(k, v)| list_value(vec![k.clone(), v.clone()]))
        .collect();
    Ok(list_value(entries))
}

fn set_add(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let set = expect_set(args)?;
    let item = arg(args, 1);
    if !value_matches(&item, Some(&set.elem_type)) {
        return Err(RuntimeError::type_error(format!(
            "cannot add value of type '{}' to Set<{}>",
            item.type_name(),
            set.elem_type
        ))
        .into());
    }
    Ok(Value::Bool(set.add(item)))
}

fn set_has(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let set = expect_set(args)?;
    Ok(Value::Bool(set.contains(&arg(args, 1))))
}

fn set_delete(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let set = expect_set(args)?;
    Ok(Value::Bool(set.remove(&arg(args, 1))))
}

fn set_size(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let set = expect_set(args)?;
    Ok(Value::Int(set.len() as i64))
}

fn set_values(_interp: &mut Interpreter, args: &[Value]) -> EvalResult {
    let set = expect_set(args)?;
    let items = set.items.lock().clone();
    Ok(list_value(items))
}

/// Container method lookup by receiver kind and method name
pub fn container_method(container: &str, method: &str) -> Option<NativeFn> {
    let handler: super::value::NativeHandler = match (container, method) {
        ("List", "push" | "append") => list_push,
        ("List", "insertAt") => list_insert_at,
        ("List", "deleteAt") => list_delete_at,
        ("List", "indexOf") => list_index_of,
        ("List", "contains") => list_contains,
        ("List", "clear") => list_clear,
        ("List", "get") => list_get,
        ("List", "set") => list_set,
        ("List", "length") => list_length,
        ("List", "toString") => list_to_string,
        ("List", "map") => list_map,
        ("List", "filter") => list_filter,
        ("List", "forEach") => list_for_each,
        ("Map", "set") => map_set,
        ("Map", "get") => map_get,
        ("Map", "has") => map_has,
        ("Map", "delete") => map_delete,
        ("Map", "size") => map_size,
        ("Map", "keys") => map_keys,
        ("Map", "values") => map_values,
        ("Map", "entries") => map_entries,
        ("Set", "add") => set_add,
        ("Set", "has" | "contains") => set_has,
        ("Set", "delete") => set_delete,
        ("Set", "size") => set_size,
        ("Set", "values") => set_values,
        _ => return None,
    };
    Some(NativeFn {
        name: "container",
        handler,
    })
}

/// Rows used by the dataset simulation stub
pub fn sample_dataset() -> Value {
    let rows = vec![
        map_value(vec![
            ("id", Value::Int(1)),
            ("name", Value::string("Alice")),
            ("age", Value::Int(30)),
            ("salary", Value::Int(5000)),
        ]),
        map_value(vec![
            ("id", Value::Int(2)),
            ("name", Value::string("Bruno")),
            ("age", Value::Int(25)),
            ("salary", Value::Int(4500)),
        ]),
        map_value(vec![
            ("id", Value::Int(3)),
            ("name", Value::string("Carla")),
            ("age", Value::Int(35)),
            ("salary", Value::Int(6000)),
        ]),
    ];
    list_value(rows)
}

// ----------------------------------------------------------------------
// Registration
// ----------------------------------------------------------------------

/// Register builtins, constructors and the `mf` namespace into globals.
pub fn register(globals: &mut Environment) {
    globals.define_untyped("print", native("print", builtin_print));
    globals.define_untyped("sout", native("sout", builtin_print));
    globals.define_untyped("len", native("len", builtin_len));
    globals.define_untyped("type", native("type", builtin_type));
    globals.define_untyped("waitSeconds", native("waitSeconds", builtin_wait_seconds));
    globals.define_untyped(
        "exceptionStackTrace",
        native("exceptionStackTrace", builtin_exception_stack_trace),
    );
    globals.define_untyped(
        "exceptionMessage",
        native("exceptionMessage", builtin_exception_message),
    );
    globals.define_untyped(
        "exceptionType",
        native("exceptionType", builtin_exception_type),
    );

    // container constructors, plus the aliases sharing the List and Map
    // representations
    globals.define_untyped("List", native("List", native_list_ctor));
    globals.define_untyped("EmbedList", native("EmbedList", native_list_ctor));
    globals.define_untyped("Matrix", native("Matrix", native_list_ctor));
    globals.define_untyped("Map", native("Map", native_map_ctor));
    globals.define_untyped("HashMap", native("HashMap", native_map_ctor));
    globals.define_untyped("Set", native("Set", native_set_ctor));

    // JSON / Object namespaces, with dotted aliases kept for compatibility
    let json_namespace = map_value(vec![
        ("parse", native("JSON.parse", json_parse)),
        ("stringify", native("JSON.stringify", json_stringify)),
    ]);
    globals.define_untyped("JSON", json_namespace);
    globals.define_untyped("JSON.parse", native("JSON.parse", json_parse));
    globals.define_untyped("JSON.stringify", native("JSON.stringify", json_stringify));

    let object_namespace = map_value(vec![
        ("keys", native("Object.keys", object_keys)),
        ("values", native("Object.values", object_values)),
        ("entries", native("Object.entries", object_entries)),
        ("clone", native("Object.clone", object_clone)),
    ]);
    globals.define_untyped("Object", object_namespace);
    globals.define_untyped("Object.keys", native("Object.keys", object_keys));
    globals.define_untyped("Object.values", native("Object.values", object_values));
    globals.define_untyped("Object.entries", native("Object.entries", object_entries));
    globals.define_untyped("Object.clone", native("Object.clone", object_clone));

    // the mf namespace
    let collections = map_value(vec![
        ("List", native("List", native_list_ctor)),
        ("Map", native("Map", native_map_ctor)),
        ("Set", native("Set", native_set_ctor)),
    ]);
    let json = map_value(vec![
        ("parse", native("mf.json.parse", json_parse)),
        ("stringify", native("mf.json.stringify", json_stringify)),
    ]);
    let utils = map_value(vec![
        ("len", native("mf.utils.len", builtin_len)),
        ("type", native("mf.utils.type", builtin_type)),
        ("upper", native("mf.utils.upper", utils_upper)),
        ("lower", native("mf.utils.lower", utils_lower)),
        ("strip", native("mf.utils.strip", utils_strip)),
    ]);
    let fs = map_value(vec![
        ("read_text", native("mf.fs.read_text", fs_read_text)),
        ("write_text", native("mf.fs.write_text", fs_write_text)),
        ("append_text", native("mf.fs.append_text", fs_append_text)),
        ("exists", native("mf.fs.exists", fs_exists)),
        ("is_file", native("mf.fs.is_file", fs_is_file)),
        ("is_dir", native("mf.fs.is_dir", fs_is_dir)),
        ("make_dir", native("mf.fs.make_dir", fs_make_dir)),
        ("remove", native("mf.fs.remove", fs_remove)),
        ("list_dir", native("mf.fs.list_dir", fs_list_dir)),
    ]);
    let path = map_value(vec![
        ("join", native("mf.path.join", path_join)),
        ("basename", native("mf.path.basename", path_basename)),
        ("dirname", native("mf.path.dirname", path_dirname)),
        ("extname", native("mf.path.extname", path_extname)),
        ("is_absolute", native("mf.path.is_absolute", path_is_absolute)),
    ]);
    let datetime = map_value(vec![
        ("now", native("mf.datetime.now", datetime_now)),
        ("today", native("mf.datetime.today", datetime_today)),
        ("format", native("mf.datetime.format", datetime_format)),
        ("parse", native("mf.datetime.parse", datetime_parse)),
    ]);

    let mf = map_value(vec![
        ("collections", collections.clone()),
        ("json", json.clone()),
        ("utils", utils.clone()),
        ("fs", fs.clone()),
        ("path", path.clone()),
        ("datetime", datetime.clone()),
    ]);
    globals.define_untyped("mf", mf);

    // dotted names kept for compatibility
    globals.define_untyped("mf.collections", collections);
    globals.define_untyped("mf.json", json);
    globals.define_untyped("mf.utils", utils);
    globals.define_untyped("mf.fs", fs);
    globals.define_untyped("mf.path", path);
    globals.define_untyped("mf.datetime", datetime);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> Interpreter {
        Interpreter::new()
    }

    #[test]
    fn test_len_builtin() {
        let mut i = interp();
        assert_eq!(
            builtin_len(&mut i, &[Value::string("héllo")]).unwrap(),
            Value::Int(5)
        );
        assert_eq!(builtin_len(&mut i, &[Value::Int(5)]).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_type_builtin() {
        let mut i = interp();
        assert_eq!(
            builtin_type(&mut i, &[Value::Float(1.0)]).unwrap(),
            Value::string("float")
        );
        assert_eq!(builtin_type(&mut i, &[]).unwrap(), Value::string("null"));
    }

    #[test]
    fn test_list_ctor_with_type_arg() {
        let mut i = interp();
        let list = native_list_ctor(&mut i, &[Value::string("int"), Value::Int(1)]).unwrap();
        match list {
            Value::List(l) => {
                assert_eq!(l.elem_type, "int");
                assert_eq!(l.items.lock().len(), 1);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_list_push_enforces_element_type() {
        let mut i = interp();
        let list = native_list_ctor(&mut i, &[Value::string("int")]).unwrap();
        assert!(list_push(&mut i, &[list.clone(), Value::Int(1)]).is_ok());
        assert!(list_push(&mut i, &[list.clone(), Value::string("no")]).is_err());
        // int is accepted where float is declared
        let floats = native_list_ctor(&mut i, &[Value::string("float")]).unwrap();
        assert!(list_push(&mut i, &[floats, Value::Int(2)]).is_ok());
    }

    #[test]
    fn test_json_round_trip_builtins() {
        let mut i = interp();
        let parsed = json_parse(&mut i, &[Value::string(r#"{"a": [1, 2]}"#)]).unwrap();
        let text = json_stringify(&mut i, &[parsed]).unwrap();
        let text = text.as_str().unwrap();
        assert!(text.contains("\"a\""));
        assert!(text.contains('1'));
    }

    #[test]
    fn test_json_parse_invalid_is_null() {
        let mut i = interp();
        assert_eq!(
            json_parse(&mut i, &[Value::string("{nope")]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_object_keys_values() {
        let mut i = interp();
        let map = map_value(vec![("x", Value::Int(1)), ("y", Value::Int(2))]);
        let keys = object_keys(&mut i, &[map.clone()]).unwrap();
        match keys {
            Value::List(l) => {
                let items = l.items.lock();
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], Value::string("x"));
            }
            other => panic!("expected list, got {other:?}"),
        }
        let values = object_values(&mut i, &[map]).unwrap();
        match values {
            Value::List(l) => assert_eq!(l.items.lock()[1], Value::Int(2)),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_prototype_lookup() {
        assert!(prototype_method("string", "upper").is_some());
        assert!(prototype_method("int", "toFixed").is_some());
        assert!(prototype_method("float", "round").is_some());
        assert!(prototype_method("string", "nonsense").is_none());
        assert!(prototype_method("bool", "upper").is_none());
    }

    #[test]
    fn test_container_lookup() {
        assert!(container_method("List", "push").is_some());
        assert!(container_method("List", "append").is_some());
        assert!(container_method("Map", "entries").is_some());
        assert!(container_method("Set", "add").is_some());
        assert!(container_method("List", "nonsense").is_none());
    }

    #[test]
    fn test_number_to_fixed() {
        let mut i = interp();
        assert_eq!(
            proto_number_to_fixed(&mut i, &[Value::Float(3.14159), Value::Int(2)]).unwrap(),
            Value::string("3.14")
        );
    }

    #[test]
    fn test_set_add_via_method() {
        let mut i = interp();
        let set = native_set_ctor(&mut i, &[Value::string("int")]).unwrap();
        assert_eq!(
            set_add(&mut i, &[set.clone(), Value::Int(1)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            set_add(&mut i, &[set.clone(), Value::Int(1)]).unwrap(),
            Value::Bool(false)
        );
        assert!(set_add(&mut i, &[set, Value::string("x")]).is_err());
    }

    #[test]
    fn test_sample_dataset_shape() {
        match sample_dataset() {
            Value::List(l) => assert_eq!(l.items.lock().len(), 3),
            other => panic!("expected list, got {other:?}"),
        }
    }
}
