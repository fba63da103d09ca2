//! Dotted path resolution over normalized event records
//!
//! Records are plain `serde_json::Value` trees. A path such as
//! `involvedObject.kind` or `series.items.0.name` is split on `.` and each
//! segment descends one level: into a mapping by key, or into a sequence by
//! a non-negative integer index.
//!
//! Resolved leaves are turned into text before any predicate sees them.
//! Predicates work on that textual rendering only; the value's type is
//! intentionally dropped at this point.

use serde_json::Value;
use thiserror::Error;

/// The generic nested representation of one event.
pub type Record = Value;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '.';

/// Failure to resolve a path inside a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// A key or index along the path does not exist.
    #[error("path not found: {path} (missing segment '{segment}')")]
    PathNotFound {
        /// The full path being resolved
        path: String,
        /// The segment that could not be found
        segment: String,
    },

    /// The path tried to descend into a value that cannot hold `segment`.
    #[error("type mismatch at '{segment}' in {path}: cannot descend into {found}")]
    TypeMismatch {
        /// The full path being resolved
        path: String,
        /// The segment that could not be applied
        segment: String,
        /// Kind of value found where a container was expected
        found: &'static str,
    },
}

impl LookupError {
    /// The path that failed to resolve.
    pub fn path(&self) -> &str {
        match self {
            LookupError::PathNotFound { path, .. } | LookupError::TypeMismatch { path, .. } => path,
        }
    }
}

/// Resolve `path` inside `record`.
///
/// # Errors
///
/// Returns `LookupError::PathNotFound` when a key or index is absent and
/// `LookupError::TypeMismatch` when a segment would descend into a scalar
/// (or into a sequence with a non-numeric segment).
///
/// # Examples
///
/// ```
/// use k8s_event_watcher::filter::path::resolve;
/// use serde_json::json;
///
/// let record = json!({"a": {"b": [{"c": "v"}]}});
/// assert_eq!(resolve(&record, "a.b.0.c").unwrap(), &json!("v"));
/// assert!(resolve(&json!({}), "missing.path").is_err());
/// ```
pub fn resolve<'a>(record: &'a Record, path: &str) -> Result<&'a Value, LookupError> {
    let mut current = record;

    for segment in path.split(PATH_SEPARATOR) {
        current = match current {
            Value::Object(map) => map.get(segment).ok_or_else(|| not_found(path, segment))?,
            Value::Array(items) => {
                let index = segment
                    .parse::<usize>()
                    .map_err(|_| mismatch(path, segment, current))?;
                items.get(index).ok_or_else(|| not_found(path, segment))?
            }
            scalar => return Err(mismatch(path, segment, scalar)),
        };
    }

    Ok(current)
}

/// Resolve `path` and render the leaf as text.
pub fn resolve_string(record: &Record, path: &str) -> Result<String, LookupError> {
    resolve(record, path).map(stringify)
}

/// Render a value the way Go's `%v` verb does.
///
/// Strings are emitted verbatim, numbers and booleans canonically, null as
/// `<nil>`, sequences as `[a b]` and mappings as `map[k:v]` with sorted keys.
pub fn stringify(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Shortest `%g` rendering: exponent form when the decimal exponent is
/// below -4 or at least 6, with a sign and at least two exponent digits.
fn format_float(f: f64) -> String {
    let scientific = format!("{:e}", f);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return f.to_string(),
    };
    let exponent: i32 = match exponent.parse() {
        Ok(exponent) => exponent,
        Err(_) => return f.to_string(),
    };

    if f != 0.0 && (exponent < -4 || exponent >= 6) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        f.to_string()
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("<nil>"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push_str(&i.to_string());
            } else if let Some(u) = n.as_u64() {
                out.push_str(&u.to_string());
            } else if let Some(f) = n.as_f64() {
                out.push_str(&format_float(f));
            }
        }
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push_str("map[");
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(key);
                out.push(':');
                write_value(out, &map[key]);
            }
            out.push(']');
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

fn not_found(path: &str, segment: &str) -> LookupError {
    LookupError::PathNotFound {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}

fn mismatch(path: &str, segment: &str, found: &Value) -> LookupError {
    LookupError::TypeMismatch {
        path: path.to_string(),
        segment: segment.to_string(),
        found: kind(found),
    }
}
