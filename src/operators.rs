// Binary operators.
//
// The shared contract: an Undefined operand silently yields Undefined, a
// present operand of the wrong kind is a typed error. Equality never errors;
// ordering requires both sides to be the same comparable kind.

use std::sync::Arc;

use crate::ast::{ComparisonOp, LogicalOp, Node, NumericOp};
use crate::environment::Environment;
use crate::errors::{EvalError, Result, Side};
use crate::evaluator::evaluate;
use crate::value::{arrayify, Value};

pub(crate) fn eval_numeric(
    op: NumericOp,
    lhs: &Node,
    rhs: &Node,
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    // Evaluate both sides before any type checking.
    let lv = evaluate(lhs, input, env)?;
    let rv = evaluate(rhs, input, env)?;

    if !lv.is_undefined() && !lv.is_number() {
        return Err(EvalError::NonNumberOperand {
            op: op.to_string(),
            side: Side::Left,
        });
    }
    if !rv.is_undefined() && !rv.is_number() {
        return Err(EvalError::NonNumberOperand {
            op: op.to_string(),
            side: Side::Right,
        });
    }

    let (Some(a), Some(b)) = (lv.as_number(), rv.as_number()) else {
        return Ok(Value::Undefined);
    };

    let x = match op {
        NumericOp::Add => a + b,
        NumericOp::Subtract => a - b,
        NumericOp::Multiply => a * b,
        NumericOp::Divide => a / b,
        NumericOp::Modulo => a % b,
    };

    // The language has no representation for non-finite numbers: division by
    // zero surfaces as an overflow error, modulo by zero as an invalid one.
    if x.is_infinite() {
        return Err(EvalError::NumberOverflow { op: op.to_string() });
    }
    if x.is_nan() {
        return Err(EvalError::NumberInvalid { op: op.to_string() });
    }

    Ok(Value::Number(x))
}

pub(crate) fn eval_comparison(
    op: ComparisonOp,
    lhs: &Node,
    rhs: &Node,
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    let lv = evaluate(lhs, input, env)?;
    let rv = evaluate(rhs, input, env)?;

    // Ordering operators need comparable, same-kind operands; equality and
    // membership accept anything.
    if needs_comparable_types(op) {
        if !lv.is_undefined() && !lv.is_number() && !lv.is_string() {
            return Err(EvalError::NonComparableOperand {
                op: op.to_string(),
                side: Side::Left,
            });
        }
        if !rv.is_undefined() && !rv.is_number() && !rv.is_string() {
            return Err(EvalError::NonComparableOperand {
                op: op.to_string(),
                side: Side::Right,
            });
        }
        if !lv.is_undefined()
            && !rv.is_undefined()
            && (lv.is_number() != rv.is_number() || lv.is_string() != rv.is_string())
        {
            return Err(EvalError::TypeMismatch { op: op.to_string() });
        }
    }

    if lv.is_undefined() || rv.is_undefined() {
        return Ok(Value::Undefined);
    }

    let b = match op {
        ComparisonOp::In => contains(&lv, &rv),
        ComparisonOp::Equal => lv == rv,
        ComparisonOp::NotEqual => lv != rv,
        ComparisonOp::Less => less_than(&lv, &rv),
        ComparisonOp::LessEqual => less_than(&lv, &rv) || lv == rv,
        ComparisonOp::Greater => !(less_than(&lv, &rv) || lv == rv),
        ComparisonOp::GreaterEqual => !less_than(&lv, &rv),
    };

    Ok(Value::Bool(b))
}

fn needs_comparable_types(op: ComparisonOp) -> bool {
    !matches!(
        op,
        ComparisonOp::Equal | ComparisonOp::NotEqual | ComparisonOp::In
    )
}

/// Strict ordering over two values of the same comparable kind. Callers
/// type-check first; anything else here is an evaluator bug.
pub(crate) fn less_than(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a < b,
        (Value::String(a), Value::String(b)) => a < b,
        _ => unreachable!("less_than over non-comparable values {lhs:?} and {rhs:?}"),
    }
}

/// Membership: the right side is coerced to an array and searched with the
/// equality rule.
fn contains(lhs: &Value, rhs: &Value) -> bool {
    arrayify(rhs).iter().any(|v| v == lhs)
}

pub(crate) fn eval_logical(
    op: LogicalOp,
    lhs: &Node,
    rhs: &Node,
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    let lv = evaluate(lhs, input, env)?;

    // Short-circuit: skip the right side entirely when the left alone
    // determines the outcome.
    match op {
        LogicalOp::Or if lv.truthy() => return Ok(Value::Bool(true)),
        LogicalOp::And if !lv.truthy() => return Ok(Value::Bool(false)),
        _ => {}
    }

    let rv = evaluate(rhs, input, env)?;
    Ok(Value::Bool(rv.truthy()))
}

pub(crate) fn eval_concat(
    lhs: &Node,
    rhs: &Node,
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    let lv = evaluate(lhs, input, env)?;
    let rv = evaluate(rhs, input, env)?;

    let mut s = lv.stringify();
    s.push_str(&rv.stringify());
    Ok(Value::string(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Box<Node> {
        Box::new(Node::Number(n))
    }

    fn run(node: &Node) -> Result<Value> {
        evaluate(node, &Value::Null, &Environment::root())
    }

    fn numeric(op: NumericOp, lhs: Box<Node>, rhs: Box<Node>) -> Node {
        Node::Numeric { op, lhs, rhs }
    }

    fn comparison(op: ComparisonOp, lhs: Box<Node>, rhs: Box<Node>) -> Node {
        Node::Comparison { op, lhs, rhs }
    }

    #[test]
    fn arithmetic() {
        assert_eq!(
            run(&numeric(NumericOp::Add, num(2.0), num(3.0))).unwrap(),
            Value::from(5.0)
        );
        assert_eq!(
            run(&numeric(NumericOp::Modulo, num(5.0), num(2.0))).unwrap(),
            Value::from(1.0)
        );
    }

    #[test]
    fn division_by_zero_is_overflow() {
        assert_eq!(
            run(&numeric(NumericOp::Divide, num(1.0), num(0.0))).unwrap_err(),
            EvalError::NumberOverflow { op: "/".into() }
        );
    }

    #[test]
    fn modulo_by_zero_is_invalid() {
        assert_eq!(
            run(&numeric(NumericOp::Modulo, num(1.0), num(0.0))).unwrap_err(),
            EvalError::NumberInvalid { op: "%".into() }
        );
    }

    #[test]
    fn undefined_operand_propagates() {
        let node = numeric(NumericOp::Add, Box::new(Node::name("missing")), num(1.0));
        assert_eq!(run(&node).unwrap(), Value::Undefined);
    }

    #[test]
    fn present_non_number_operand_is_an_error() {
        let node = numeric(NumericOp::Add, Box::new(Node::string("x")), num(1.0));
        assert_eq!(
            run(&node).unwrap_err(),
            EvalError::NonNumberOperand {
                op: "+".into(),
                side: Side::Left
            }
        );
    }

    #[test]
    fn string_ordering() {
        let node = comparison(
            ComparisonOp::Less,
            Box::new(Node::string("a")),
            Box::new(Node::string("b")),
        );
        assert_eq!(run(&node).unwrap(), Value::Bool(true));
    }

    #[test]
    fn mixed_kind_ordering_is_a_type_mismatch() {
        let node = comparison(ComparisonOp::Less, num(1.0), Box::new(Node::string("2")));
        assert_eq!(
            run(&node).unwrap_err(),
            EvalError::TypeMismatch { op: "<".into() }
        );
    }

    #[test]
    fn equality_never_errors_on_mixed_kinds() {
        let node = comparison(ComparisonOp::Equal, num(1.0), Box::new(Node::string("1")));
        assert_eq!(run(&node).unwrap(), Value::Bool(false));
    }

    #[test]
    fn deep_equality_over_structures() {
        let arr = || {
            Box::new(Node::Array(vec![
                Node::Number(1.0),
                Node::Array(vec![Node::Number(2.0)]),
            ]))
        };
        let node = comparison(ComparisonOp::Equal, arr(), arr());
        assert_eq!(run(&node).unwrap(), Value::Bool(true));
    }

    #[test]
    fn undefined_comparison_is_undefined() {
        let node = comparison(
            ComparisonOp::Less,
            Box::new(Node::name("missing")),
            num(1.0),
        );
        assert_eq!(run(&node).unwrap(), Value::Undefined);
    }

    #[test]
    fn membership() {
        let node = comparison(
            ComparisonOp::In,
            num(2.0),
            Box::new(Node::Array(vec![
                Node::Number(1.0),
                Node::Number(2.0),
                Node::Number(3.0),
            ])),
        );
        assert_eq!(run(&node).unwrap(), Value::Bool(true));

        // scalar right side is coerced to a one-element array
        let scalar = comparison(ComparisonOp::In, num(2.0), num(2.0));
        assert_eq!(run(&scalar).unwrap(), Value::Bool(true));
    }

    #[test]
    fn logical_short_circuit() {
        // `true or (1/0)` never evaluates the right side
        let node = Node::Logical {
            op: LogicalOp::Or,
            lhs: Box::new(Node::Boolean(true)),
            rhs: Box::new(numeric(NumericOp::Divide, num(1.0), num(0.0))),
        };
        assert_eq!(run(&node).unwrap(), Value::Bool(true));

        let node = Node::Logical {
            op: LogicalOp::And,
            lhs: Box::new(Node::Boolean(false)),
            rhs: Box::new(numeric(NumericOp::Divide, num(1.0), num(0.0))),
        };
        assert_eq!(run(&node).unwrap(), Value::Bool(false));
    }

    #[test]
    fn concatenation_stringifies_both_sides() {
        let node = Node::Concat {
            lhs: Box::new(Node::string("n=")),
            rhs: num(4.0),
        };
        assert_eq!(run(&node).unwrap(), Value::from("n=4"));

        // Undefined stringifies to the empty string
        let node = Node::Concat {
            lhs: Box::new(Node::name("missing")),
            rhs: Box::new(Node::string("x")),
        };
        assert_eq!(run(&node).unwrap(), Value::from("x"));
    }
}
