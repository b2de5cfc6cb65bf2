// Stable multi-key sorting.
//
// Every term's expression is evaluated for every item up front, with the
// first defined value fixing that term's type (all numbers or all strings).
// The comparator then walks terms in declared order; Undefined sorts last
// regardless of direction, and full ties keep the original relative order.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::ast::{Node, SortDirection, SortTerm};
use crate::environment::Environment;
use crate::errors::{EvalError, Result};
use crate::evaluator::{evaluate, normalize_array};
use crate::operators::less_than;
use crate::value::{arrayify, Value};

pub(crate) fn eval_sort(
    expr: &Node,
    terms: &[SortTerm],
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    let items_value = evaluate(expr, input, env)?;
    if items_value.is_undefined() {
        return Ok(Value::Undefined);
    }

    let items = arrayify(&items_value);
    let keys = build_sort_keys(&items, terms, env)?;

    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&i, &j| compare(&keys[i], &keys[j], terms));

    let results: Vec<Value> = order.into_iter().map(|i| items[i].clone()).collect();
    Ok(normalize_array(Value::array(results)))
}

/// Per-item term values. Undefined is allowed here (it drives the sorts-last
/// rule); a defined value must match the type the term has already fixed.
fn build_sort_keys(
    items: &[Value],
    terms: &[SortTerm],
    env: &Arc<Environment>,
) -> Result<Vec<Vec<Value>>> {
    let mut is_number_term = vec![false; terms.len()];
    let mut is_string_term = vec![false; terms.len()];
    let mut keys = Vec::with_capacity(items.len());

    for item in items {
        let mut values = Vec::with_capacity(terms.len());

        for (t, term) in terms.iter().enumerate() {
            let v = evaluate(&term.expr, item, env)?;

            match &v {
                Value::Undefined => {}
                Value::Number(_) => {
                    if is_string_term[t] {
                        return Err(EvalError::SortMismatch);
                    }
                    is_number_term[t] = true;
                }
                Value::String(_) => {
                    if is_number_term[t] {
                        return Err(EvalError::SortMismatch);
                    }
                    is_string_term[t] = true;
                }
                _ => return Err(EvalError::NonSortableValue),
            }

            values.push(v);
        }

        keys.push(values);
    }

    Ok(keys)
}

fn compare(a: &[Value], b: &[Value], terms: &[SortTerm]) -> Ordering {
    for (t, term) in terms.iter().enumerate() {
        let (va, vb) = (&a[t], &b[t]);

        match (va.is_undefined(), vb.is_undefined()) {
            (true, true) => continue,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        if va == vb {
            continue;
        }

        let ascending_less = match term.dir {
            SortDirection::Descending => less_than(vb, va),
            SortDirection::Ascending => less_than(va, vb),
        };
        return if ascending_less {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }

    Ordering::Equal
}
