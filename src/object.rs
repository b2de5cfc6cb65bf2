// Object construction with implicit grouping.
//
// An object constructor is a list of (key, value) pairs evaluated over an
// input collection. Keys partition the items into groups; each pair's value
// expression then runs once per distinct key with the matching items as its
// context.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use crate::ast::Node;
use crate::environment::Environment;
use crate::errors::{EvalError, Result};
use crate::evaluator::evaluate;
use crate::value::Value;

pub(crate) fn eval_object(
    pairs: &[(Node, Node)],
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    // A single item is treated as a one-element collection.
    let data: Vec<Value> = match input {
        Value::Array(items) => items.as_ref().clone(),
        other => vec![other.clone()],
    };

    let groups = group_items_by_key(pairs, &data, env)?;
    trace!(keys = groups.len(), "object constructor grouped items");

    let n_items = data.len();
    let mut results = IndexMap::with_capacity(groups.len());

    for (key, group) in groups {
        // The value expression sees the full collection when every item
        // landed under this key, otherwise just the matching sub-collection.
        let items = if !group.items.is_empty() && group.items.len() != n_items {
            Value::array(group.items.iter().map(|&j| data[j].clone()).collect())
        } else {
            Value::array(data.clone())
        };

        let value = evaluate(&pairs[group.pair].1, &items, env)?;
        if !value.is_undefined() {
            results.insert(key, value);
        }
    }

    Ok(Value::record(results))
}

struct KeyGroup {
    /// Which pair's value expression owns this key.
    pair: usize,
    /// Indexes of the matching items; empty means "all of them".
    items: Vec<usize>,
}

fn group_items_by_key(
    pairs: &[(Node, Node)],
    items: &[Value],
    env: &Arc<Environment>,
) -> Result<IndexMap<String, KeyGroup>> {
    let mut groups: IndexMap<String, KeyGroup> = IndexMap::with_capacity(pairs.len());

    for (i, (key_node, _)) in pairs.iter().enumerate() {
        // A literal key is evaluated once and binds every item.
        if let Node::String(key) = key_node {
            if groups.contains_key(key) {
                return Err(EvalError::DuplicateKey { key: key.clone() });
            }
            groups.insert(
                key.clone(),
                KeyGroup {
                    pair: i,
                    items: Vec::new(),
                },
            );
            continue;
        }

        for (j, item) in items.iter().enumerate() {
            let v = evaluate(key_node, item, env)?;
            let Some(key) = v.as_string() else {
                return Err(EvalError::IllegalKey);
            };

            match groups.get_mut(key) {
                None => {
                    groups.insert(
                        key.to_string(),
                        KeyGroup {
                            pair: i,
                            items: vec![j],
                        },
                    );
                }
                // The same key under the same pair grows that group; under a
                // different pair it is a conflict.
                Some(group) if group.pair == i => group.items.push(j),
                Some(_) => {
                    return Err(EvalError::DuplicateKey {
                        key: key.to_string(),
                    });
                }
            }
        }
    }

    Ok(groups)
}
