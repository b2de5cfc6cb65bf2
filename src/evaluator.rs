// Evaluator dispatch.
//
// `evaluate` routes every node kind to its rule and applies one uniform
// post-step: if the rule produced a Sequence, collapse it. Rules are free to
// return sequences or scalars; collapsing happens exactly once, here.

use std::sync::Arc;

use tracing::trace;

use crate::ast::Node;
use crate::callable;
use crate::environment::Environment;
use crate::errors::{EvalError, Result, Side};
use crate::object;
use crate::operators;
use crate::path;
use crate::sort;
use crate::value::{arrayify, flatten, Sequence, Value};

/// Maximum array size allowed in a range expression. Matches the limit used
/// by the reference jsonata-js implementation.
pub const MAX_RANGE_ITEMS: usize = 10_000_000;

/// Evaluate one node against a context value and an environment.
pub fn evaluate(node: &Node, input: &Value, env: &Arc<Environment>) -> Result<Value> {
    let v = match node {
        Node::String(s) => Value::string(s.as_str()),
        Node::Number(n) => Value::Number(*n),
        Node::Boolean(b) => Value::Bool(*b),
        Node::Null => Value::Null,

        Node::Variable(name) => eval_variable(name, input, env),
        Node::Name(name) => eval_name(name, input),
        Node::Path { steps, keep_arrays } => path::eval_path(steps, *keep_arrays, input, env)?,

        Node::Negation(rhs) => eval_negation(rhs, input, env)?,
        Node::Range { lhs, rhs } => eval_range(lhs, rhs, input, env)?,
        Node::Array(items) => eval_array(items, input, env)?,
        Node::Object(pairs) => object::eval_object(pairs, input, env)?,
        Node::Block(exprs) => eval_block(exprs, input, env)?,
        Node::Conditional {
            condition,
            then,
            otherwise,
        } => eval_conditional(condition, then, otherwise.as_deref(), input, env)?,
        Node::Assignment { name, value } => eval_assignment(name, value, input, env)?,

        Node::Wildcard => eval_wildcard(input),
        Node::Descendant => eval_descendant(input),
        Node::Group { expr, pairs } => {
            let items = evaluate(expr, input, env)?;
            object::eval_object(pairs, &items, env)?
        }
        Node::Predicate { expr, filters } => eval_predicate(expr, filters, input, env)?,
        Node::Sort { expr, terms } => sort::eval_sort(expr, terms, input, env)?,

        Node::Lambda { params, body } => callable::eval_lambda(params, None, body, input, env),
        Node::TypedLambda {
            params,
            types,
            body,
        } => callable::eval_lambda(params, Some(types.as_slice()), body, input, env),
        Node::Transform {
            pattern,
            update,
            deletes,
        } => callable::eval_transform(pattern, update, deletes.as_deref(), env),
        Node::Partial { func, args } => callable::eval_partial(func, args, input, env)?,
        Node::FunctionCall { func, args } => {
            callable::eval_function_call(func, None, args, input, env)?
        }
        Node::Apply { lhs, rhs } => callable::eval_apply(lhs, rhs, input, env)?,

        Node::Numeric { op, lhs, rhs } => operators::eval_numeric(*op, lhs, rhs, input, env)?,
        Node::Comparison { op, lhs, rhs } => {
            operators::eval_comparison(*op, lhs, rhs, input, env)?
        }
        Node::Logical { op, lhs, rhs } => operators::eval_logical(*op, lhs, rhs, input, env)?,
        Node::Concat { lhs, rhs } => operators::eval_concat(lhs, rhs, input, env)?,

        // A placeholder is only meaningful inside a partial-application
        // argument list; reaching dispatch means the parser produced a
        // malformed tree.
        Node::Placeholder => panic!("evaluate: placeholder node outside partial application"),
    };

    Ok(v.collapse())
}

fn eval_variable(name: &str, input: &Value, env: &Arc<Environment>) -> Value {
    if name.is_empty() {
        // `$` is the context itself
        return input.clone();
    }
    env.lookup(name)
}

/// Field access. On an array the access broadcasts over every element and
/// array-valued results are flattened one level into the output.
fn eval_name(name: &str, data: &Value) -> Value {
    match data {
        Value::Record(fields) => fields.get(name).cloned().unwrap_or(Value::Undefined),
        Value::Array(items) => {
            let mut results = Vec::with_capacity(items.len());
            for item in items.iter() {
                match eval_name(name, item) {
                    Value::Undefined => {}
                    Value::Array(inner) => results.extend(inner.iter().cloned()),
                    other => results.push(other),
                }
            }
            Value::array(results)
        }
        Value::Sequence(seq) => eval_name(name, &seq.clone().into_value()),
        _ => Value::Undefined,
    }
}

fn eval_negation(rhs: &Node, input: &Value, env: &Arc<Environment>) -> Result<Value> {
    let v = evaluate(rhs, input, env)?;
    if v.is_undefined() {
        return Ok(Value::Undefined);
    }
    match v.as_number() {
        Some(n) => Ok(Value::Number(-n)),
        None => Err(EvalError::NonNumberOperand {
            op: "-".into(),
            side: Side::Right,
        }),
    }
}

fn eval_range(lhs: &Node, rhs: &Node, input: &Value, env: &Arc<Environment>) -> Result<Value> {
    // For each bound: the value if present, plus whether it is an integer.
    let bound = |node: &Node| -> Result<Option<(f64, bool)>> {
        let v = evaluate(node, input, env)?;
        if v.is_undefined() {
            return Ok(None);
        }
        let is_int = v.as_number().map(|n| n == n.trunc());
        Ok(Some((v.as_number().unwrap_or(0.0), is_int == Some(true))))
    };

    let lo = bound(lhs)?;
    let hi = bound(rhs)?;

    if let Some((_, false)) = lo {
        return Err(EvalError::NonIntegerRangeBound { side: Side::Left });
    }
    if let Some((_, false)) = hi {
        return Err(EvalError::NonIntegerRangeBound { side: Side::Right });
    }

    let (Some((lo, _)), Some((hi, _))) = (lo, hi) else {
        return Ok(Value::Undefined);
    };
    if lo > hi {
        return Ok(Value::Undefined);
    }

    // Guard the size in floating point before truncating, so a huge span
    // cannot overflow the integer conversion.
    let size = hi - lo + 1.0;
    if size > MAX_RANGE_ITEMS as f64 {
        return Err(EvalError::MaxRangeItemsExceeded {
            max: MAX_RANGE_ITEMS,
        });
    }

    let size = size as usize;
    let mut items = Vec::with_capacity(size);
    let mut n = lo;
    for _ in 0..size {
        items.push(Value::Number(n));
        n += 1.0;
    }
    Ok(Value::array(items))
}

/// Array constructor. Undefined items are dropped; results from a nested
/// array literal stay nested, results from any other expression are
/// flattened one level.
fn eval_array(items: &[Node], input: &Value, env: &Arc<Environment>) -> Result<Value> {
    let mut results = Vec::with_capacity(items.len());

    for item in items {
        let v = evaluate(item, input, env)?;
        if v.is_undefined() {
            continue;
        }
        match item {
            Node::Array(_) => results.push(v),
            _ => results.extend(arrayify(&v)),
        }
    }

    Ok(Value::array(results))
}

fn eval_block(exprs: &[Node], input: &Value, env: &Arc<Environment>) -> Result<Value> {
    // Variables assigned inside the block are scoped to it.
    let env = env.child(0);

    let mut result = Value::Undefined;
    for expr in exprs {
        result = evaluate(expr, input, &env)?;
    }
    Ok(result)
}

fn eval_conditional(
    condition: &Node,
    then: &Node,
    otherwise: Option<&Node>,
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    let cond = evaluate(condition, input, env)?;
    if cond.truthy() {
        return evaluate(then, input, env);
    }
    match otherwise {
        Some(node) => evaluate(node, input, env),
        None => Ok(Value::Undefined),
    }
}

fn eval_assignment(
    name: &str,
    value: &Node,
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    let v = evaluate(value, input, env)?;
    env.bind(name, v.clone());
    Ok(v)
}

/// Apply `f` to every direct child value of an array or record.
fn walk_children(v: &Value, mut f: impl FnMut(&Value)) {
    match v {
        Value::Array(items) => {
            for item in items.iter() {
                f(item);
            }
        }
        Value::Record(fields) => {
            for field in fields.values() {
                f(field);
            }
        }
        _ => {}
    }
}

fn eval_wildcard(data: &Value) -> Value {
    let mut results = Sequence::with_capacity(0);

    walk_children(data, |child| match child {
        Value::Array(_) => {
            for item in flatten(child) {
                results.push(item);
            }
        }
        other => results.push(other.clone()),
    });

    Value::Sequence(results)
}

fn eval_descendant(data: &Value) -> Value {
    let mut results = Sequence::with_capacity(0);
    recurse_descendants(&mut results, data);
    Value::Sequence(results)
}

// Pre-order: a value is collected before its children, except arrays, which
// only contribute their contents.
fn recurse_descendants(seq: &mut Sequence, v: &Value) {
    if !v.is_array() {
        seq.push(v.clone());
    }
    walk_children(v, |child| recurse_descendants(seq, child));
}

fn eval_predicate(
    expr: &Node,
    filters: &[Node],
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    let mut items = evaluate(expr, input, env)?;
    if items.is_undefined() {
        return Ok(Value::Undefined);
    }

    for filter in filters {
        let kept = apply_filter(filter, &arrayify(&items), env)?;
        if kept.is_empty() {
            return Ok(Value::Undefined);
        }
        items = Value::array(kept);
    }

    Ok(normalize_array(items))
}

/// Run one predicate filter over a candidate list. A numeric result (or an
/// array of numbers) selects by index, negative indexes counting from the
/// end; any other result keeps the item when truthy.
pub(crate) fn apply_filter(
    filter: &Node,
    items: &[Value],
    env: &Arc<Environment>,
) -> Result<Vec<Value>> {
    let n_items = items.len();
    let mut results = Vec::new();

    for (i, item) in items.iter().enumerate() {
        let mut res = evaluate(filter, item, env)?;
        trace!(index = i, "predicate filter result: {res:?}");

        if res.is_number() {
            res = Value::array(arrayify(&res));
        }

        match res.as_array() {
            Some(indexes) if indexes.iter().all(Value::is_number) => {
                for idx in indexes {
                    let n = idx.as_number().unwrap_or(0.0);
                    let mut index = n.floor() as i64;
                    if index < 0 {
                        index += n_items as i64;
                    }
                    if index == i as i64 {
                        results.push(item.clone());
                    }
                }
            }
            _ => {
                if res.truthy() {
                    results.push(item.clone());
                }
            }
        }
    }

    Ok(results)
}

/// A one-element array degenerates to its element.
pub(crate) fn normalize_array(v: Value) -> Value {
    match v {
        Value::Array(items) if items.len() == 1 => items[0].clone(),
        other => other,
    }
}
