// Lexical environments.
//
// An environment is one frame of a scope chain: a map of local bindings plus
// a shared handle on the parent frame. Frames are created for blocks, lambda
// invocations and the root scope, and are handed out as `Arc` so a closure
// can keep its defining scope alive after the call that created it returns.
// A frame only ever mutates its own map, never an ancestor's, and bindings
// are written before the frame is shared, so concurrent readers are safe.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::value::Value;

pub struct Environment {
    parent: Option<Arc<Environment>>,
    frame: RwLock<HashMap<String, Value>>,
}

impl Environment {
    /// The outermost scope. Builtin functions are bound here before
    /// evaluation starts.
    pub fn root() -> Arc<Environment> {
        Arc::new(Environment {
            parent: None,
            frame: RwLock::new(HashMap::new()),
        })
    }

    /// A new scope whose parent is `self`.
    pub fn child(self: &Arc<Self>, size_hint: usize) -> Arc<Environment> {
        Arc::new(Environment {
            parent: Some(Arc::clone(self)),
            frame: RwLock::new(HashMap::with_capacity(size_hint)),
        })
    }

    /// Insert or overwrite a binding in this scope only.
    pub fn bind(&self, name: impl Into<String>, value: Value) {
        self.frame.write().insert(name.into(), value);
    }

    /// Walk outward through the chain; an unbound name is Undefined, never
    /// an error.
    pub fn lookup(&self, name: &str) -> Value {
        if let Some(v) = self.frame.read().get(name) {
            return v.clone();
        }
        match &self.parent {
            Some(parent) => parent.lookup(name),
            None => Value::Undefined,
        }
    }
}

// Bindings can hold closures that reference this environment, so Debug stays
// shallow to avoid recursing through the chain.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.frame.read().keys().cloned().collect();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lookup_walks_the_chain() {
        let root = Environment::root();
        root.bind("a", Value::from(1.0));

        let inner = root.child(0);
        inner.bind("b", Value::from(2.0));

        assert_eq!(inner.lookup("a"), Value::from(1.0));
        assert_eq!(inner.lookup("b"), Value::from(2.0));
        assert_eq!(inner.lookup("missing"), Value::Undefined);
    }

    #[test]
    fn child_binding_shadows_without_mutating_parent() {
        let root = Environment::root();
        root.bind("x", Value::from("outer"));

        let inner = root.child(1);
        inner.bind("x", Value::from("inner"));

        assert_eq!(inner.lookup("x"), Value::from("inner"));
        assert_eq!(root.lookup("x"), Value::from("outer"));
    }
}
