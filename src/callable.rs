// The callable protocol.
//
// Every invocable value is a `Callable`: a lambda closing over its definition
// context, a partial application with holes still to fill, a two-stage chain
// built by the `~>` operator, an object transform, or a registered builtin.
// All of them go through `Callable::call`, so invocation sites never care
// which kind they hold.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::ast::{Node, ParamType};
use crate::environment::Environment;
use crate::errors::{EvalError, Result};
use crate::evaluator::evaluate;
use crate::functions::BuiltinFunction;
use crate::value::{arrayify, Value};

#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    kind: CallableKind,
}

#[derive(Clone)]
enum CallableKind {
    Lambda(Arc<LambdaFn>),
    Partial(Arc<PartialFn>),
    Chain(Arc<ChainFn>),
    Transform(Arc<TransformFn>),
    Builtin(Arc<dyn BuiltinFunction>),
}

struct LambdaFn {
    params: Vec<String>,
    types: Option<Vec<ParamType>>,
    body: Node,
    /// Context value at the point of definition.
    context: Value,
    /// Environment at the point of definition.
    env: Arc<Environment>,
}

struct PartialFn {
    target: Callable,
    /// Unevaluated argument expressions; placeholders mark the holes.
    args: Vec<Node>,
    /// Context value at the point of construction.
    context: Value,
    /// Environment at the point of construction.
    env: Arc<Environment>,
}

struct ChainFn {
    first: Callable,
    second: Callable,
}

struct TransformFn {
    pattern: Node,
    update: Node,
    deletes: Option<Node>,
    env: Arc<Environment>,
}

impl Callable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn builtin(f: Arc<dyn BuiltinFunction>) -> Callable {
        Callable {
            name: f.name().into(),
            kind: CallableKind::Builtin(f),
        }
    }

    /// The same callable under a different name. Call sites that reach a
    /// function through a variable relabel it so diagnostics carry the name
    /// the expression used.
    pub(crate) fn with_name(&self, name: &str) -> Callable {
        Callable {
            name: name.into(),
            kind: self.kind.clone(),
        }
    }

    /// Identity comparison. Two callables are the same object when they share
    /// the same underlying definition, not when they happen to look alike.
    pub fn same_object(&self, other: &Callable) -> bool {
        match (&self.kind, &other.kind) {
            (CallableKind::Lambda(a), CallableKind::Lambda(b)) => Arc::ptr_eq(a, b),
            (CallableKind::Partial(a), CallableKind::Partial(b)) => Arc::ptr_eq(a, b),
            (CallableKind::Chain(a), CallableKind::Chain(b)) => Arc::ptr_eq(a, b),
            (CallableKind::Transform(a), CallableKind::Transform(b)) => Arc::ptr_eq(a, b),
            (CallableKind::Builtin(a), CallableKind::Builtin(b)) => a.name() == b.name(),
            _ => false,
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        trace!(name = %self.name, argc = args.len(), "invoking callable");
        match &self.kind {
            CallableKind::Lambda(f) => call_lambda(&self.name, f, args),
            CallableKind::Partial(f) => call_partial(f, args),
            CallableKind::Chain(f) => {
                let mid = f.first.call(args)?;
                f.second.call(&[mid])
            }
            CallableKind::Transform(f) => {
                let input = args.first().cloned().unwrap_or(Value::Undefined);
                apply_transform(f, &input)
            }
            CallableKind::Builtin(f) => {
                let arity = f.arity();
                if !arity.contains(&args.len()) {
                    return Err(EvalError::ArgumentCount {
                        function: f.name().into(),
                        expected: describe_arity(&arity),
                        actual: args.len(),
                    });
                }
                f.call(args)
            }
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Lambdas close over their environment, which can in turn hold this
        // callable; keep Debug shallow.
        f.debug_struct("Callable")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn describe_arity(arity: &std::ops::RangeInclusive<usize>) -> String {
    if arity.start() == arity.end() {
        arity.start().to_string()
    } else {
        format!("{} to {}", arity.start(), arity.end())
    }
}

/// A lambda binds each parameter to the matching argument (Undefined when the
/// caller supplied fewer) in a child of its captured environment, then
/// evaluates its body against its captured context.
fn call_lambda(name: &str, f: &LambdaFn, args: &[Value]) -> Result<Value> {
    if let Some(types) = &f.types {
        validate_arguments(name, types, args)?;
    }

    let env = f.env.child(f.params.len());
    for (i, param) in f.params.iter().enumerate() {
        let arg = args.get(i).cloned().unwrap_or(Value::Undefined);
        env.bind(param, arg);
    }

    evaluate(&f.body, &f.context, &env)
}

/// Declared-type checks for a typed lambda. An Undefined argument always
/// passes; absence is not a type violation.
fn validate_arguments(name: &str, types: &[ParamType], args: &[Value]) -> Result<()> {
    for (i, ty) in types.iter().enumerate() {
        let Some(arg) = args.get(i) else { break };
        if arg.is_undefined() || matches_type(arg, *ty) {
            continue;
        }
        return Err(EvalError::ArgumentType {
            function: name.into(),
            index: i + 1,
            expected: ty.describe(),
        });
    }
    Ok(())
}

fn matches_type(v: &Value, ty: ParamType) -> bool {
    match ty {
        ParamType::Any => true,
        ParamType::Number => v.is_number(),
        ParamType::String => v.is_string(),
        ParamType::Bool => matches!(v, Value::Bool(_)),
        ParamType::Array => v.is_array(),
        ParamType::Object => matches!(v, Value::Record(_)),
        ParamType::Function => v.is_callable(),
    }
}

/// Calling a partial fills its holes left to right from the call arguments.
/// The fixed argument expressions are evaluated now, against the context and
/// environment captured when the partial was constructed, so they see any
/// bindings made between construction and the call.
fn call_partial(f: &PartialFn, args: &[Value]) -> Result<Value> {
    let mut supplied = args.iter();
    let mut filled = Vec::with_capacity(f.args.len());
    for arg in &f.args {
        match arg {
            Node::Placeholder => {
                filled.push(supplied.next().cloned().unwrap_or(Value::Undefined));
            }
            other => filled.push(evaluate(other, &f.context, &f.env)?),
        }
    }

    f.target.call(&filled)
}

pub(crate) fn eval_lambda(
    params: &[String],
    types: Option<&[ParamType]>,
    body: &Node,
    input: &Value,
    env: &Arc<Environment>,
) -> Value {
    Value::Callable(Callable {
        name: "lambda".into(),
        kind: CallableKind::Lambda(Arc::new(LambdaFn {
            params: params.to_vec(),
            types: types.map(<[ParamType]>::to_vec),
            body: body.clone(),
            context: input.clone(),
            env: Arc::clone(env),
        })),
    })
}

pub(crate) fn eval_transform(
    pattern: &Node,
    update: &Node,
    deletes: Option<&Node>,
    env: &Arc<Environment>,
) -> Value {
    Value::Callable(Callable {
        name: "transform".into(),
        kind: CallableKind::Transform(Arc::new(TransformFn {
            pattern: pattern.clone(),
            update: update.clone(),
            deletes: deletes.cloned(),
            env: Arc::clone(env),
        })),
    })
}

pub(crate) fn eval_partial(
    func: &Node,
    args: &[Node],
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    let fv = evaluate(func, input, env)?;
    let Some(target) = fv.as_callable() else {
        return Err(EvalError::NonCallablePartialTarget);
    };
    let target = match func {
        Node::Variable(name) if !name.is_empty() => target.with_name(name),
        _ => target.clone(),
    };

    Ok(Value::Callable(Callable {
        name: format!("{}_partial", target.name()).into(),
        kind: CallableKind::Partial(Arc::new(PartialFn {
            target,
            args: args.to_vec(),
            context: input.clone(),
            env: Arc::clone(env),
        })),
    }))
}

/// Invoke the value of `func` with evaluated arguments. `extra_arg` is an
/// extra first argument supplied by the pipeline operator; it never touches
/// the expression tree, the argument vector is built fresh for every call.
pub(crate) fn eval_function_call(
    func: &Node,
    extra_arg: Option<&Node>,
    args: &[Node],
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    let fv = evaluate(func, input, env)?;
    let Some(callable) = fv.as_callable() else {
        let name = match func {
            Node::Variable(name) => name.clone(),
            _ => "anonymous".into(),
        };
        return Err(EvalError::NonCallableTarget { name });
    };
    let callable = match func {
        Node::Variable(name) if !name.is_empty() => callable.with_name(name),
        _ => callable.clone(),
    };

    let mut argv = Vec::with_capacity(args.len() + 1);
    if let Some(extra) = extra_arg {
        argv.push(evaluate(extra, input, env)?);
    }
    for arg in args {
        argv.push(evaluate(arg, input, env)?);
    }

    callable.call(&argv)
}

/// The `~>` operator. `x ~> f(a)` calls `f` with `x` prepended to the
/// argument list; `x ~> f` calls `f(x)`; `f ~> g` composes the two into a
/// chain callable.
pub(crate) fn eval_apply(
    lhs: &Node,
    rhs: &Node,
    input: &Value,
    env: &Arc<Environment>,
) -> Result<Value> {
    if let Node::FunctionCall { func, args } = rhs {
        return eval_function_call(func, Some(lhs), args, input, env);
    }

    let lv = evaluate(lhs, input, env)?;
    let rv = evaluate(rhs, input, env)?;
    let Some(second) = rv.as_callable() else {
        return Err(EvalError::NonCallableApplyTarget);
    };

    match lv.as_callable() {
        Some(first) => Ok(Value::Callable(Callable {
            name: format!("{}~>{}", first.name(), second.name()).into(),
            kind: CallableKind::Chain(Arc::new(ChainFn {
                first: first.clone(),
                second: second.clone(),
            })),
        })),
        None => second.call(&[lv]),
    }
}

/// Apply an object transform to a value. Matches from the pattern expression
/// are located in a copy of the input by structural equality and replaced by
/// their updated form.
fn apply_transform(t: &TransformFn, input: &Value) -> Result<Value> {
    if input.is_undefined() {
        return Ok(Value::Undefined);
    }

    let matches = evaluate(&t.pattern, input, &t.env)?;
    let mut result = input.clone();

    for matched in arrayify(&matches) {
        // Only objects can be updated; other matches are left alone.
        let Value::Record(fields) = &matched else {
            continue;
        };

        let mut updated = fields.as_ref().clone();

        match evaluate(&t.update, &matched, &t.env)? {
            Value::Undefined => {}
            Value::Record(changes) => {
                for (k, v) in changes.iter() {
                    updated.insert(k.clone(), v.clone());
                }
            }
            _ => return Err(EvalError::InvalidTransformUpdate),
        }

        if let Some(deletes) = &t.deletes {
            match evaluate(deletes, &matched, &t.env)? {
                Value::Undefined => {}
                Value::String(key) => {
                    updated.shift_remove(key.as_ref());
                }
                Value::Array(keys) => {
                    for key in keys.iter() {
                        let Some(key) = key.as_string() else {
                            return Err(EvalError::InvalidTransformDelete);
                        };
                        updated.shift_remove(key);
                    }
                }
                _ => return Err(EvalError::InvalidTransformDelete),
            }
        }

        result = rewrite(&result, &matched, &Value::record(updated));
    }

    Ok(result)
}

fn rewrite(value: &Value, target: &Value, replacement: &Value) -> Value {
    if value == target {
        return replacement.clone();
    }
    match value {
        Value::Array(items) => Value::array(
            items
                .iter()
                .map(|v| rewrite(v, target, replacement))
                .collect(),
        ),
        Value::Record(fields) => Value::record(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), rewrite(v, target, replacement)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Node, NumericOp};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(node: &Node, input: serde_json::Value) -> Result<Value> {
        evaluate(node, &Value::from(input), &Environment::root())
    }

    fn lambda(params: &[&str], body: Node) -> Node {
        Node::Lambda {
            params: params.iter().map(|p| (*p).to_string()).collect(),
            body: Box::new(body),
        }
    }

    fn add(lhs: Node, rhs: Node) -> Node {
        Node::Numeric {
            op: NumericOp::Add,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn multiply(lhs: Node, rhs: Node) -> Node {
        Node::Numeric {
            op: NumericOp::Multiply,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn call(func: Node, args: Vec<Node>) -> Node {
        Node::FunctionCall {
            func: Box::new(func),
            args,
        }
    }

    fn assign(name: &str, value: Node) -> Node {
        Node::Assignment {
            name: name.into(),
            value: Box::new(value),
        }
    }

    #[test]
    fn lambda_definition_and_call() {
        // ($add := function($a, $b) { $a + $b }; $add(2, 3))
        let node = Node::Block(vec![
            assign(
                "add",
                lambda(&["a", "b"], add(Node::variable("a"), Node::variable("b"))),
            ),
            call(Node::variable("add"), vec![Node::Number(2.0), Node::Number(3.0)]),
        ]);
        assert_eq!(run(&node, json!(null)).unwrap(), Value::from(5.0));
    }

    #[test]
    fn missing_arguments_bind_to_undefined() {
        // ($f := function($a, $b) { $b }; $f(1))
        let node = Node::Block(vec![
            assign("f", lambda(&["a", "b"], Node::variable("b"))),
            call(Node::variable("f"), vec![Node::Number(1.0)]),
        ]);
        assert_eq!(run(&node, json!(null)).unwrap(), Value::Undefined);
    }

    #[test]
    fn lambda_closes_over_definition_environment() {
        // ($n := 10; $f := function($x) { $x + $n }; ($n := 0; $f(1)))
        let node = Node::Block(vec![
            assign("n", Node::Number(10.0)),
            assign(
                "f",
                lambda(&["x"], add(Node::variable("x"), Node::variable("n"))),
            ),
            Node::Block(vec![
                assign("n", Node::Number(0.0)),
                call(Node::variable("f"), vec![Node::Number(1.0)]),
            ]),
        ]);
        assert_eq!(run(&node, json!(null)).unwrap(), Value::from(11.0));
    }

    #[test]
    fn typed_lambda_rejects_a_wrong_argument() {
        let node = Node::Block(vec![
            assign(
                "f",
                Node::TypedLambda {
                    params: vec!["x".into()],
                    types: vec![ParamType::Number],
                    body: Box::new(Node::variable("x")),
                },
            ),
            call(Node::variable("f"), vec![Node::string("nope")]),
        ]);
        // the error names the variable the call went through
        assert_eq!(
            run(&node, json!(null)).unwrap_err(),
            EvalError::ArgumentType {
                function: "f".into(),
                index: 1,
                expected: "number",
            }
        );
    }

    #[test]
    fn typed_lambda_lets_undefined_through() {
        let node = Node::Block(vec![
            assign(
                "f",
                Node::TypedLambda {
                    params: vec!["x".into()],
                    types: vec![ParamType::Number],
                    body: Box::new(Node::Number(1.0)),
                },
            ),
            call(Node::variable("f"), vec![Node::name("missing")]),
        ]);
        assert_eq!(run(&node, json!({})).unwrap(), Value::from(1.0));
    }

    #[test]
    fn calling_a_non_function_is_an_error() {
        let node = Node::Block(vec![
            assign("x", Node::Number(1.0)),
            call(Node::variable("x"), vec![]),
        ]);
        assert_eq!(
            run(&node, json!(null)).unwrap_err(),
            EvalError::NonCallableTarget { name: "x".into() }
        );
    }

    #[test]
    fn partial_application_fills_holes_in_order() {
        // ($add := function($a, $b) { $a + $b }; $add10 := $add(?, 10); $add10(5))
        let node = Node::Block(vec![
            assign(
                "add",
                lambda(&["a", "b"], add(Node::variable("a"), Node::variable("b"))),
            ),
            assign(
                "add10",
                Node::Partial {
                    func: Box::new(Node::variable("add")),
                    args: vec![Node::Placeholder, Node::Number(10.0)],
                },
            ),
            call(Node::variable("add10"), vec![Node::Number(5.0)]),
        ]);
        assert_eq!(run(&node, json!(null)).unwrap(), Value::from(15.0));
    }

    #[test]
    fn partial_fixed_arguments_evaluate_at_call_time() {
        // ($add := function($a, $b) { $a + $b }; $n := 1; $p := $add(?, $n);
        //  $n := 2; $p(5))
        let node = Node::Block(vec![
            assign(
                "add",
                lambda(&["a", "b"], add(Node::variable("a"), Node::variable("b"))),
            ),
            assign("n", Node::Number(1.0)),
            assign(
                "p",
                Node::Partial {
                    func: Box::new(Node::variable("add")),
                    args: vec![Node::Placeholder, Node::variable("n")],
                },
            ),
            assign("n", Node::Number(2.0)),
            call(Node::variable("p"), vec![Node::Number(5.0)]),
        ]);
        // $n is read when the partial is invoked, not when it is built
        assert_eq!(run(&node, json!(null)).unwrap(), Value::from(7.0));
    }

    #[test]
    fn partial_of_a_non_function_is_an_error() {
        let node = Node::Partial {
            func: Box::new(Node::Number(1.0)),
            args: vec![Node::Placeholder],
        };
        assert_eq!(
            run(&node, json!(null)).unwrap_err(),
            EvalError::NonCallablePartialTarget
        );
    }

    #[test]
    fn pipeline_prepends_the_left_side() {
        // ($pad := function($x, $n) { $x * $n }; 5 ~> $pad(3))
        let node = Node::Block(vec![
            assign(
                "pad",
                lambda(
                    &["x", "n"],
                    multiply(Node::variable("x"), Node::variable("n")),
                ),
            ),
            Node::Apply {
                lhs: Box::new(Node::Number(5.0)),
                rhs: Box::new(call(Node::variable("pad"), vec![Node::Number(3.0)])),
            },
        ]);
        assert_eq!(run(&node, json!(null)).unwrap(), Value::from(15.0));
    }

    #[test]
    fn pipeline_chains_apply_left_to_right() {
        // 5 ~> $double ~> $increment == $increment($double(5))
        let node = Node::Block(vec![
            assign(
                "double",
                lambda(&["x"], multiply(Node::variable("x"), Node::Number(2.0))),
            ),
            assign(
                "increment",
                lambda(&["x"], add(Node::variable("x"), Node::Number(1.0))),
            ),
            Node::Apply {
                lhs: Box::new(Node::Apply {
                    lhs: Box::new(Node::Number(5.0)),
                    rhs: Box::new(Node::variable("double")),
                }),
                rhs: Box::new(Node::variable("increment")),
            },
        ]);
        assert_eq!(run(&node, json!(null)).unwrap(), Value::from(11.0));
    }

    #[test]
    fn composing_two_functions_yields_a_callable() {
        // ($double ~> $increment)(5)
        let node = Node::Block(vec![
            assign(
                "double",
                lambda(&["x"], multiply(Node::variable("x"), Node::Number(2.0))),
            ),
            assign(
                "increment",
                lambda(&["x"], add(Node::variable("x"), Node::Number(1.0))),
            ),
            call(
                Node::Apply {
                    lhs: Box::new(Node::variable("double")),
                    rhs: Box::new(Node::variable("increment")),
                },
                vec![Node::Number(5.0)],
            ),
        ]);
        assert_eq!(run(&node, json!(null)).unwrap(), Value::from(11.0));
    }

    #[test]
    fn applying_to_a_non_function_is_an_error() {
        let node = Node::Apply {
            lhs: Box::new(Node::Number(1.0)),
            rhs: Box::new(Node::Number(2.0)),
        };
        assert_eq!(
            run(&node, json!(null)).unwrap_err(),
            EvalError::NonCallableApplyTarget
        );
    }

    #[test]
    fn transform_updates_matching_objects() {
        // $ ~> |items|{"price": 0}|
        let node = Node::Apply {
            lhs: Box::new(Node::variable("")),
            rhs: Box::new(Node::Transform {
                pattern: Box::new(Node::path(&["items"])),
                update: Box::new(Node::Object(vec![(
                    Node::string("price"),
                    Node::Number(0.0),
                )])),
                deletes: None,
            }),
        };
        let input = json!({"items": [{"name": "a", "price": 5}, {"name": "b", "price": 9}]});
        let v = run(&node, input).unwrap();
        assert_eq!(
            v,
            Value::from(json!({
                "items": [
                    {"name": "a", "price": 0.0},
                    {"name": "b", "price": 0.0}
                ]
            }))
        );
    }

    #[test]
    fn transform_deletes_named_keys() {
        // $ ~> |$|{}, "secret"|
        let node = Node::Apply {
            lhs: Box::new(Node::variable("")),
            rhs: Box::new(Node::Transform {
                pattern: Box::new(Node::variable("")),
                update: Box::new(Node::Object(vec![])),
                deletes: Some(Box::new(Node::string("secret"))),
            }),
        };
        let v = run(&node, json!({"keep": 1, "secret": 2})).unwrap();
        assert_eq!(v, Value::from(json!({"keep": 1.0})));
    }

    #[test]
    fn transform_with_a_non_object_update_is_an_error() {
        let node = Node::Apply {
            lhs: Box::new(Node::variable("")),
            rhs: Box::new(Node::Transform {
                pattern: Box::new(Node::variable("")),
                update: Box::new(Node::Number(1.0)),
                deletes: None,
            }),
        };
        assert_eq!(
            run(&node, json!({"a": 1})).unwrap_err(),
            EvalError::InvalidTransformUpdate
        );
    }

    #[test]
    fn transform_leaves_unmatched_input_untouched() {
        let node = Node::Apply {
            lhs: Box::new(Node::variable("")),
            rhs: Box::new(Node::Transform {
                pattern: Box::new(Node::path(&["nothing"])),
                update: Box::new(Node::Object(vec![(
                    Node::string("x"),
                    Node::Number(1.0),
                )])),
                deletes: None,
            }),
        };
        let input = json!({"a": {"b": 2}});
        assert_eq!(run(&node, input.clone()).unwrap(), Value::from(input));
    }
}
