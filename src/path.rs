// Path stepping.
//
// A path is a chain of navigation steps evaluated left to right over an
// accumulating output collection. The defining rule: collection results from
// consecutive steps are flattened by one level per step, while deliberately
// constructed array literals are never auto-flattened.

use std::sync::Arc;

use tracing::trace;

use crate::ast::Node;
use crate::environment::Environment;
use crate::errors::Result;
use crate::evaluator::{apply_filter, evaluate, normalize_array};
use crate::value::{arrayify, Sequence, Value};

pub(crate) fn eval_path(
    steps: &[Node],
    keep_arrays: bool,
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    if steps.is_empty() {
        return Ok(Value::Undefined);
    }

    // A leading variable reference (bare or under a predicate) always seeds a
    // fresh one-element collection, as does any non-array input: every step
    // then uniformly operates over a collection.
    let leading_var = match &steps[0] {
        Node::Variable(_) => true,
        Node::Predicate { expr, .. } => matches!(expr.as_ref(), Node::Variable(_)),
        _ => false,
    };

    let mut output = if leading_var || !input.is_array() {
        Value::array(vec![input.clone()])
    } else {
        input.clone()
    };

    let last = steps.len() - 1;
    for (i, step) in steps.iter().enumerate() {
        // A leading array literal is an ordinary constructor, not a step.
        output = if i == 0 && matches!(step, Node::Array(_)) {
            evaluate(step, input, env)?
        } else {
            eval_path_step(step, &output, env, i == last)?
        };

        if output.is_undefined() {
            return Ok(Value::Undefined);
        }
        // An empty collection aborts the rest of the chain.
        if output.as_array().is_some_and(|items| items.is_empty()) {
            return Ok(Value::Undefined);
        }
    }

    if keep_arrays {
        trace!("path requested array-preserving output");
        output = match output {
            Value::Sequence(mut seq) => {
                seq.keep_singletons = true;
                Value::Sequence(seq)
            }
            other => Value::array(vec![other]),
        };
    }

    Ok(output)
}

fn eval_path_step(
    step: &Node,
    input: &Value,
    env: &Arc<Environment>,
    last_step: bool,
) -> Result<Value> {
    let results = match input {
        Value::Sequence(seq) => eval_over_items(step, seq.items(), env)?,
        Value::Array(items) => eval_over_array(step, items, env)?,
        // The chain seeds a collection before the first step and every step
        // yields a sequence, an array or Undefined (handled by the caller).
        other => unreachable!("path step over non-collection {other:?}"),
    };
    trace!(count = results.len(), "path step produced per-item results");

    // The final step keeps a sole array result intact instead of flattening
    // it away.
    if last_step && results.len() == 1 && results[0].is_array() {
        return Ok(results[0].clone());
    }

    let is_constructor = matches!(step, Node::Array(_));
    let mut seq = Sequence::with_capacity(results.len());

    for v in results {
        if is_constructor || !v.is_array() {
            seq.push(v);
            continue;
        }
        for item in arrayify(&v) {
            seq.push(item);
        }
    }

    if seq.is_empty() {
        return Ok(Value::Undefined);
    }
    Ok(Value::Sequence(seq))
}

/// Map a step over the elements of the current collection, with predicates
/// special-cased: the predicate's base expression sees the whole collection
/// once, then each filter narrows the candidates.
fn eval_over_array(step: &Node, items: &[Value], env: &Arc<Environment>) -> Result<Vec<Value>> {
    if let Node::Predicate { expr, filters } = step {
        let data = Value::array(items.to_vec());
        let mut candidates = evaluate(expr, &data, env)?;
        if candidates.is_undefined() {
            return Ok(Vec::new());
        }

        for filter in filters {
            let kept = apply_filter(filter, &arrayify(&candidates), env)?;
            if kept.is_empty() {
                return Ok(Vec::new());
            }
            candidates = Value::array(kept);
        }

        return Ok(vec![normalize_array(candidates)]);
    }

    eval_over_items(step, items, env)
}

fn eval_over_items(step: &Node, items: &[Value], env: &Arc<Environment>) -> Result<Vec<Value>> {
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        let v = evaluate(step, item, env)?;
        if !v.is_undefined() {
            results.push(v);
        }
    }
    Ok(results)
}
