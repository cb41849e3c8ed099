use std::{collections::HashMap, fmt, mem};

use rpds::RedBlackTreeMap;
use tracing::warn;

use crate::{
    error::RuntimeError,
    generic::GenericRegistry,
    value::{Callable, Value},
};

type Scope = HashMap<String, Value>;

/// How many closure calls may be active at once by default
pub const DEFAULT_RECURSION_LIMIT: usize = 1000;

/// The state a program runs against
///
/// Only the innermost local scope is ever visible. Calling a closure hides
/// the caller's locals behind a fresh scope until the call returns, and a
/// lambda captures nothing from where it was written: its free variables
/// resolve against whatever scope is on top when it runs, then the globals,
/// then the generic operations.
pub struct Environment {
    current: Scope,
    suspended: Vec<Scope>,
    globals: RedBlackTreeMap<String, Value>,
    generics: GenericRegistry,
    calls: usize,
    recursion_limit: usize,
}

impl Environment {
    pub fn new<I, N>(globals: I) -> Self
    where
        I: IntoIterator<Item = (N, Value)>,
        N: Into<String>,
    {
        Environment {
            current: Scope::new(),
            suspended: Vec::new(),
            globals: globals
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
            generics: GenericRegistry::new(),
            calls: 0,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
    /// An environment with the standard builtins bound as globals
    pub fn with_prelude() -> Self {
        Environment::new(crate::builtins::prelude())
    }
    /// A fresh scope stack sharing this environment's globals and generics
    ///
    /// Changes made through either environment afterwards stay private to it.
    pub fn fork(&self) -> Self {
        Environment {
            current: Scope::new(),
            suspended: Vec::new(),
            globals: self.globals.clone(),
            generics: self.generics.clone(),
            calls: 0,
            recursion_limit: self.recursion_limit,
        }
    }
    pub fn lookup(&self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = self.current.get(name).or_else(|| self.globals.get(name)) {
            return Ok(value.clone());
        }
        self.generics
            .stub(name)
            .map(|stub| Value::Callable(Callable::Generic(stub)))
            .ok_or_else(|| RuntimeError::UnboundName(name.into()))
    }
    /// Bind a name in the innermost scope
    ///
    /// Never touches outer scopes or globals, so a binding of the same name
    /// elsewhere is shadowed rather than changed.
    pub fn assign<N>(&mut self, name: N, value: Value)
    where
        N: Into<String>,
    {
        self.current.insert(name.into(), value);
    }
    pub fn push_scope(&mut self) {
        self.suspended.push(mem::take(&mut self.current));
    }
    pub fn pop_scope(&mut self) {
        match self.suspended.pop() {
            Some(scope) => self.current = scope,
            None => warn!("attempted to pop the base scope"),
        }
    }
    /// The number of scopes on the stack, counting the base scope
    pub fn depth(&self) -> usize {
        self.suspended.len() + 1
    }
    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }
    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.recursion_limit = limit;
    }
    /// Count a closure call, failing once the recursion limit is reached
    ///
    /// Every successful `enter_call` must be paired with an `exit_call`.
    pub fn enter_call(&mut self) -> Result<(), RuntimeError> {
        if self.calls >= self.recursion_limit {
            return Err(RuntimeError::RecursionLimit { depth: self.calls });
        }
        self.calls += 1;
        Ok(())
    }
    pub fn exit_call(&mut self) {
        self.calls = self.calls.saturating_sub(1);
    }
    /// The number of closure calls currently running
    pub fn calls(&self) -> usize {
        self.calls
    }
    pub fn define_global<N>(&mut self, name: N, value: Value)
    where
        N: Into<String>,
    {
        self.globals = self.globals.insert(name.into(), value);
    }
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }
    pub fn register_class<N, O, S>(&mut self, name: N, operations: O) -> Result<(), RuntimeError>
    where
        N: Into<String>,
        O: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generics.register_class(name, operations)
    }
    pub fn register_instance<M, T>(
        &mut self,
        class: &str,
        operation: &str,
        implementation: Callable,
        matchers: M,
    ) -> Result<(), RuntimeError>
    where
        M: IntoIterator<Item = (usize, T)>,
        T: Into<String>,
    {
        self.generics
            .register_instance(class, operation, implementation, matchers)
    }
    pub fn resolve_generic(
        &self,
        class: &str,
        operation: &str,
        args: &[Value],
    ) -> Result<Callable, RuntimeError> {
        self.generics.resolve(class, operation, args)
    }
    pub fn generics(&self) -> &GenericRegistry {
        &self.generics
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new(Vec::<(String, Value)>::new())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Environment")
            .field("current", &self.current)
            .field("depth", &self.depth())
            .field("calls", &self.calls)
            .field("globals", &self.globals.keys().collect::<Vec<_>>())
            .field("generics", &self.generics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::value::Builtin;

    fn env() -> Environment {
        Environment::new(vec![("g", Value::from(1))])
    }

    #[test]
    fn lookup_order() {
        let mut env = env();
        assert_eq!(env.lookup("g").unwrap(), Value::from(1));
        env.assign("g", Value::from(2));
        assert_eq!(env.lookup("g").unwrap(), Value::from(2));
        assert_eq!(env.global("g"), Some(&Value::from(1)));
        assert_eq!(
            env.lookup("missing").unwrap_err(),
            RuntimeError::UnboundName("missing".into())
        );
    }

    #[test]
    fn only_the_innermost_scope_is_visible() {
        let mut env = env();
        env.assign("x", Value::from(10));
        env.push_scope();
        assert_eq!(env.depth(), 2);
        assert!(env.lookup("x").is_err());
        assert_eq!(env.lookup("g").unwrap(), Value::from(1));
        env.assign("x", Value::from(20));
        env.pop_scope();
        assert_eq!(env.lookup("x").unwrap(), Value::from(10));
    }

    #[test]
    fn base_scope_survives_extra_pops() {
        let mut env = env();
        env.assign("x", Value::from(1));
        env.pop_scope();
        assert_eq!(env.depth(), 1);
        assert_eq!(env.lookup("x").unwrap(), Value::from(1));
    }

    #[test]
    fn generic_operations_resolve_last() {
        let mut env = env();
        env.register_class("Greeter", vec!["greet"]).unwrap();
        assert!(matches!(
            env.lookup("greet").unwrap(),
            Value::Callable(Callable::Generic(_))
        ));
        env.define_global("greet", Value::from("shadowed"));
        assert_eq!(env.lookup("greet").unwrap(), Value::from("shadowed"));
    }

    #[test]
    fn call_counting() {
        let mut env = env();
        env.set_recursion_limit(2);
        env.enter_call().unwrap();
        env.enter_call().unwrap();
        assert_eq!(
            env.enter_call().unwrap_err(),
            RuntimeError::RecursionLimit { depth: 2 }
        );
        assert_eq!(env.calls(), 2);
        env.exit_call();
        env.exit_call();
        env.exit_call();
        assert_eq!(env.calls(), 0);
        assert_eq!(env.fork().recursion_limit(), 2);
    }

    #[test]
    fn forks_are_isolated() {
        let mut parent = env();
        parent.assign("local", Value::from(1));
        let mut child = parent.fork();
        assert!(child.lookup("local").is_err());
        assert_eq!(child.lookup("g").unwrap(), Value::from(1));
        child.define_global("g", Value::from(2));
        child.register_class("Shape", vec!["area"]).unwrap();
        assert_eq!(parent.lookup("g").unwrap(), Value::from(1));
        assert!(parent.lookup("area").is_err());
        parent
            .register_class("Greeter", vec!["greet"])
            .unwrap();
        parent
            .register_instance(
                "Greeter",
                "greet",
                Callable::Builtin(Builtin::new("hi", |_, _| Ok(Value::Null))),
                vec![(0, "Person")],
            )
            .unwrap();
        assert!(child.lookup("greet").is_err());
    }
}
