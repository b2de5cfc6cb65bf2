pub mod ast;
pub mod environment;
pub mod errors;
pub mod evaluator;
pub mod functions; // plugin model
pub mod value;

mod callable;
mod object;
mod operators;
mod path;
mod sort;

use ast::Node;
use environment::Environment;
use errors::Result;
use functions::Registry;
use value::Value;

pub use callable::Callable;
pub use evaluator::MAX_RANGE_ITEMS;

/// The main entry point. Holds a function registry and evaluates pre-parsed
/// expression trees against JSON-like input values.
pub struct Evaluator {
    registry: Registry,
}

impl Evaluator {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Evaluate an expression tree against an input value. Every call gets a
    /// fresh root scope with the registry's functions bound, so one
    /// `Evaluator` can serve concurrent callers.
    pub fn evaluate(&self, node: &Node, input: &Value) -> Result<Value> {
        let env = Environment::root();
        self.registry.install(&env);
        evaluator::evaluate(node, input, &env)
    }

    /// Evaluate against `serde_json` input, back to `serde_json` output. An
    /// Undefined result maps to `None`, never to JSON null.
    pub fn evaluate_json(
        &self,
        node: &Node,
        input: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        let v = self.evaluate(node, &Value::from(input.clone()))?;
        Ok(match v {
            Value::Undefined => None,
            other => Some(serde_json::Value::from(&other)),
        })
    }
}

/// Convenience: evaluate with the built-in registry.
pub fn evaluate(node: &Node, input: &Value) -> Result<Value> {
    Evaluator::new(Registry::with_builtins()).evaluate(node, input)
}

/// Evaluate with extra top-level variable bindings, e.g. parameters supplied
/// by the host application.
pub fn evaluate_with_bindings(
    node: &Node,
    input: &Value,
    bindings: &[(&str, Value)],
) -> Result<Value> {
    let env = Environment::root();
    Registry::with_builtins().install(&env);
    for (name, value) in bindings {
        env.bind(*name, value.clone());
    }
    evaluator::evaluate(node, input, &env)
}
