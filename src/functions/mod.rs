// Builtin function registry.
//
// Builtins live behind the same callable protocol as lambdas. The registry
// maps names to trait objects and installs each one into an environment as a
// `$name` binding, so expressions call builtins exactly like user functions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::callable::Callable;
use crate::environment::Environment;
use crate::errors::Result;
use crate::value::Value;

/// Trait for pluggable functions exposed to expressions.
pub trait BuiltinFunction: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> std::ops::RangeInclusive<usize>;
    fn call(&self, args: &[Value]) -> Result<Value>;
}

/// Thread-safe function registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, Arc<dyn BuiltinFunction>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut map: HashMap<&'static str, Arc<dyn BuiltinFunction>> = HashMap::new();
        map.insert("string", Arc::new(builtins::StringFn));
        map.insert("number", Arc::new(builtins::NumberFn));
        map.insert("boolean", Arc::new(builtins::BooleanFn));
        map.insert("not", Arc::new(builtins::Not));
        map.insert("exists", Arc::new(builtins::Exists));
        map.insert("count", Arc::new(builtins::Count));
        map.insert("sum", Arc::new(builtins::Sum));
        map.insert("max", Arc::new(builtins::Max));
        map.insert("min", Arc::new(builtins::Min));
        map.insert("average", Arc::new(builtins::Average));
        map.insert("uppercase", Arc::new(builtins::Uppercase));
        map.insert("lowercase", Arc::new(builtins::Lowercase));
        map.insert("length", Arc::new(builtins::Length));
        map.insert("append", Arc::new(builtins::Append));
        map.insert("distinct", Arc::new(builtins::Distinct));
        Self { inner: Arc::new(map) }
    }

    pub fn register<F: BuiltinFunction + 'static>(&mut self, f: F) {
        let map = Arc::make_mut(&mut self.inner);
        map.insert(f.name(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BuiltinFunction>> {
        self.inner.get(name).cloned()
    }

    /// Bind every registered function into `env` under its own name.
    pub fn install(&self, env: &Arc<Environment>) {
        for f in self.inner.values() {
            env.bind(f.name(), Value::Callable(Callable::builtin(Arc::clone(f))));
        }
    }
}

pub mod builtins {
    use super::*;
    use itertools::Itertools;

    use crate::errors::EvalError;
    use crate::value::arrayify;

    fn arg(args: &[Value], i: usize) -> Value {
        args.get(i).cloned().unwrap_or(Value::Undefined)
    }

    /// Collect an argument as a list of numbers, for the aggregates.
    fn numbers(function: &str, v: &Value) -> Result<Vec<f64>> {
        arrayify(v)
            .iter()
            .map(|item| {
                item.as_number().ok_or_else(|| EvalError::ArgumentType {
                    function: function.into(),
                    index: 1,
                    expected: "array of numbers",
                })
            })
            .collect()
    }

    pub struct StringFn;
    impl BuiltinFunction for StringFn {
        fn name(&self) -> &'static str { "string" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(match arg(args, 0) {
                Value::Undefined => Value::Undefined,
                other => Value::string(other.stringify()),
            })
        }
    }

    pub struct NumberFn;
    impl BuiltinFunction for NumberFn {
        fn name(&self) -> &'static str { "number" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let wrong_type = || EvalError::ArgumentType {
                function: "number".into(),
                index: 1,
                expected: "number, numeric string or boolean",
            };
            match arg(args, 0) {
                Value::Undefined => Ok(Value::Undefined),
                v @ Value::Number(_) => Ok(v),
                Value::Bool(b) => Ok(Value::Number(if b { 1.0 } else { 0.0 })),
                Value::String(s) => {
                    let n: f64 = s.trim().parse().map_err(|_| wrong_type())?;
                    if n.is_finite() {
                        Ok(Value::Number(n))
                    } else {
                        Err(wrong_type())
                    }
                }
                _ => Err(wrong_type()),
            }
        }
    }

    pub struct BooleanFn;
    impl BuiltinFunction for BooleanFn {
        fn name(&self) -> &'static str { "boolean" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(match arg(args, 0) {
                Value::Undefined => Value::Undefined,
                other => Value::Bool(other.truthy()),
            })
        }
    }

    pub struct Not;
    impl BuiltinFunction for Not {
        fn name(&self) -> &'static str { "not" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(match arg(args, 0) {
                Value::Undefined => Value::Undefined,
                other => Value::Bool(!other.truthy()),
            })
        }
    }

    pub struct Exists;
    impl BuiltinFunction for Exists {
        fn name(&self) -> &'static str { "exists" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(Value::Bool(!arg(args, 0).is_undefined()))
        }
    }

    pub struct Count;
    impl BuiltinFunction for Count {
        fn name(&self) -> &'static str { "count" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(Value::Number(arrayify(&arg(args, 0)).len() as f64))
        }
    }

    pub struct Sum;
    impl BuiltinFunction for Sum {
        fn name(&self) -> &'static str { "sum" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            match arg(args, 0) {
                Value::Undefined => Ok(Value::Undefined),
                v => Ok(Value::Number(numbers("sum", &v)?.iter().sum())),
            }
        }
    }

    pub struct Max;
    impl BuiltinFunction for Max {
        fn name(&self) -> &'static str { "max" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            match arg(args, 0) {
                Value::Undefined => Ok(Value::Undefined),
                v => Ok(numbers("max", &v)?
                    .into_iter()
                    .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |m| m.max(n))))
                    .map_or(Value::Undefined, Value::Number)),
            }
        }
    }

    pub struct Min;
    impl BuiltinFunction for Min {
        fn name(&self) -> &'static str { "min" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            match arg(args, 0) {
                Value::Undefined => Ok(Value::Undefined),
                v => Ok(numbers("min", &v)?
                    .into_iter()
                    .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |m| m.min(n))))
                    .map_or(Value::Undefined, Value::Number)),
            }
        }
    }

    pub struct Average;
    impl BuiltinFunction for Average {
        fn name(&self) -> &'static str { "average" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            match arg(args, 0) {
                Value::Undefined => Ok(Value::Undefined),
                v => {
                    let ns = numbers("average", &v)?;
                    if ns.is_empty() {
                        return Ok(Value::Undefined);
                    }
                    Ok(Value::Number(ns.iter().sum::<f64>() / ns.len() as f64))
                }
            }
        }
    }

    fn string_arg(function: &'static str, args: &[Value]) -> Result<Option<String>> {
        match arg(args, 0) {
            Value::Undefined => Ok(None),
            Value::String(s) => Ok(Some(s.to_string())),
            _ => Err(EvalError::ArgumentType {
                function: function.into(),
                index: 1,
                expected: "string",
            }),
        }
    }

    pub struct Uppercase;
    impl BuiltinFunction for Uppercase {
        fn name(&self) -> &'static str { "uppercase" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(string_arg("uppercase", args)?
                .map_or(Value::Undefined, |s| Value::string(s.to_uppercase())))
        }
    }

    pub struct Lowercase;
    impl BuiltinFunction for Lowercase {
        fn name(&self) -> &'static str { "lowercase" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(string_arg("lowercase", args)?
                .map_or(Value::Undefined, |s| Value::string(s.to_lowercase())))
        }
    }

    pub struct Length;
    impl BuiltinFunction for Length {
        fn name(&self) -> &'static str { "length" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(string_arg("length", args)?
                .map_or(Value::Undefined, |s| Value::Number(s.chars().count() as f64)))
        }
    }

    pub struct Append;
    impl BuiltinFunction for Append {
        fn name(&self) -> &'static str { "append" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 2..=2 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let (a, b) = (arg(args, 0), arg(args, 1));
            if a.is_undefined() {
                return Ok(b);
            }
            if b.is_undefined() {
                return Ok(a);
            }
            let mut items = arrayify(&a);
            items.extend(arrayify(&b));
            Ok(Value::array(items))
        }
    }

    pub struct Distinct;
    impl BuiltinFunction for Distinct {
        fn name(&self) -> &'static str { "distinct" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            match arg(args, 0) {
                Value::Undefined => Ok(Value::Undefined),
                v => {
                    // Dedup on the serialized form; f64 is not Eq + Hash.
                    let items: Vec<Value> = arrayify(&v)
                        .into_iter()
                        .unique_by(|item| item.to_string())
                        .collect();
                    Ok(Value::array(items))
                }
            }
        }
    }
}
