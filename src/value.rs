// Dynamic value model.
//
// `Value` is a closed tagged union over everything an expression can produce.
// Containers are Arc-wrapped so cloning is O(1) (values are immutable once
// constructed, so sharing is safe across threads). Two variants never appear
// in a final result: `Undefined`, the "no value here" marker that propagates
// through most operators, and `Sequence`, the intermediate collection carrier
// used by navigation steps. Both are collapsed away at the dispatch boundary.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::callable::Callable;

#[derive(Clone, Debug)]
pub enum Value {
    /// Absence of a value. Distinct from `Null` and from an error.
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Record(Arc<IndexMap<String, Value>>),
    Callable(Callable),
    /// Evaluator-internal collection produced by navigation steps. Collapsed
    /// to a plain value (see [`Sequence::into_value`]) before leaving the
    /// evaluator.
    Sequence(Sequence),
}

/// Ordered list of values produced by a navigation step, with the JSONata
/// singleton/empty collapsing rules.
#[derive(Clone, Debug, Default)]
pub struct Sequence {
    items: Vec<Value>,
    pub(crate) keep_singletons: bool,
}

impl Sequence {
    pub fn with_capacity(n: usize) -> Self {
        Sequence {
            items: Vec::with_capacity(n),
            keep_singletons: false,
        }
    }

    /// Append a value. Undefined is never stored in a sequence.
    pub fn push(&mut self, v: Value) {
        if !v.is_undefined() {
            self.items.push(v);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Collapse: empty becomes Undefined, a singleton becomes its sole
    /// element (unless `keep_singletons`), anything longer becomes an array.
    pub fn into_value(mut self) -> Value {
        match self.items.len() {
            0 => Value::Undefined,
            1 if !self.keep_singletons => self.items.pop().unwrap_or(Value::Undefined),
            _ => Value::array(self.items),
        }
    }
}

impl From<Vec<Value>> for Sequence {
    fn from(items: Vec<Value>) -> Self {
        let mut seq = Sequence::with_capacity(items.len());
        for v in items {
            seq.push(v);
        }
        seq
    }
}

// ── Constructors ─────────────────────────────────────────────────────────────

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Arc::new(items))
    }

    pub fn record(fields: IndexMap<String, Value>) -> Value {
        Value::Record(Arc::new(fields))
    }
}

// ── Classification ───────────────────────────────────────────────────────────

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Value::Record(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Callable(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Callable(f) => Some(f),
            _ => None,
        }
    }

    /// Unwrap any indirection layer: a sequence collapses to its plain form,
    /// everything else passes through. Total over all inputs, including
    /// Undefined.
    pub fn collapse(self) -> Value {
        match self {
            Value::Sequence(seq) => seq.into_value(),
            other => other,
        }
    }

    /// JSONata truthiness: false/0/""/empty containers are falsy, an array is
    /// truthy if any element is, functions are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => items.iter().any(Value::truthy),
            Value::Record(fields) => !fields.is_empty(),
            Value::Callable(_) => false,
            Value::Sequence(seq) => seq.items().iter().any(Value::truthy),
        }
    }

    /// Stringify for concatenation and the `string` builtin: strings pass
    /// through unquoted, Undefined becomes the empty string, containers
    /// serialize as JSON, functions have no representation.
    pub fn stringify(&self) -> String {
        match self {
            Value::Undefined => String::new(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(_) | Value::Record(_) => serde_json::Value::from(self).to_string(),
            Value::Callable(_) => String::new(),
            Value::Sequence(seq) => seq.clone().into_value().stringify(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ── Collection utilities ─────────────────────────────────────────────────────

/// Undefined becomes an empty array, an array stays itself, any scalar
/// becomes a one-element array.
pub fn arrayify(v: &Value) -> Vec<Value> {
    match v {
        Value::Undefined => Vec::new(),
        Value::Array(items) => items.as_ref().clone(),
        Value::Sequence(seq) => arrayify(&seq.clone().into_value()),
        other => vec![other.clone()],
    }
}

/// Recursively concatenate nested arrays into one flat list; a non-array
/// becomes a single leaf.
pub fn flatten(v: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    flatten_into(v, &mut out);
    out
}

fn flatten_into(v: &Value, out: &mut Vec<Value>) {
    match v {
        Value::Undefined => {}
        Value::Array(items) => {
            for item in items.iter() {
                flatten_into(item, out);
            }
        }
        other => out.push(other.clone()),
    }
}

// ── Equality ─────────────────────────────────────────────────────────────────

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // NaN is never equal to itself
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            // Functions are equal only if they are the same object
            (Value::Callable(a), Value::Callable(b)) => a.same_object(b),
            (Value::Sequence(a), Value::Sequence(b)) => a.items == b.items,
            _ => false,
        }
    }
}

// ── serde_json boundary ──────────────────────────────────────────────────────

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::record(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::json!(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
            Value::Callable(_) => serde_json::Value::Null,
            Value::Sequence(seq) => serde_json::Value::from(&seq.clone().into_value()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", serde_json::Value::from(other)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sequence_collapsing() {
        let empty = Sequence::with_capacity(0);
        assert_eq!(empty.into_value(), Value::Undefined);

        let mut single = Sequence::with_capacity(1);
        single.push(Value::from(1.0));
        assert_eq!(single.into_value(), Value::from(1.0));

        let mut kept = Sequence::with_capacity(1);
        kept.push(Value::from(1.0));
        kept.keep_singletons = true;
        assert_eq!(kept.into_value(), Value::array(vec![Value::from(1.0)]));

        let mut many = Sequence::with_capacity(2);
        many.push(Value::from(1.0));
        many.push(Value::from(2.0));
        assert_eq!(
            many.into_value(),
            Value::array(vec![Value::from(1.0), Value::from(2.0)])
        );
    }

    #[test]
    fn sequence_drops_undefined() {
        let mut seq = Sequence::with_capacity(2);
        seq.push(Value::Undefined);
        seq.push(Value::from("x"));
        seq.push(Value::Undefined);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.into_value(), Value::from("x"));
    }

    #[test]
    fn arrayify_edge_cases() {
        assert_eq!(arrayify(&Value::Undefined), Vec::<Value>::new());
        assert_eq!(arrayify(&Value::from(3.0)), vec![Value::from(3.0)]);
        let arr = Value::array(vec![Value::from(1.0), Value::from(2.0)]);
        assert_eq!(arrayify(&arr), vec![Value::from(1.0), Value::from(2.0)]);
    }

    #[test]
    fn flatten_nested() {
        let nested = Value::array(vec![
            Value::from(1.0),
            Value::array(vec![Value::from(2.0), Value::array(vec![Value::from(3.0)])]),
        ]);
        assert_eq!(
            flatten(&nested),
            vec![Value::from(1.0), Value::from(2.0), Value::from(3.0)]
        );
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Null.truthy());
        assert!(!Value::from(0.0).truthy());
        assert!(Value::from(0.5).truthy());
        assert!(!Value::from("").truthy());
        assert!(Value::from("x").truthy());
        assert!(!Value::array(vec![Value::from(0.0)]).truthy());
        assert!(Value::array(vec![Value::from(0.0), Value::from(1.0)]).truthy());
    }

    #[test]
    fn stringify_values() {
        assert_eq!(Value::Undefined.stringify(), "");
        assert_eq!(Value::Null.stringify(), "null");
        assert_eq!(Value::from(2.0).stringify(), "2");
        assert_eq!(Value::from(2.5).stringify(), "2.5");
        assert_eq!(Value::from("hi").stringify(), "hi");
        assert_eq!(
            Value::array(vec![Value::from(1.0), Value::from("a")]).stringify(),
            r#"[1.0,"a"]"#
        );
    }

    #[test]
    fn json_roundtrip() {
        let v = Value::from(serde_json::json!({"a": [1, 2], "b": "x", "c": null}));
        let back = serde_json::Value::from(&v);
        assert_eq!(back, serde_json::json!({"a": [1.0, 2.0], "b": "x", "c": null}));
    }
}
