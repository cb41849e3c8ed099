//! A small parenthesized expression language
//!
//! Source text is split into token trees, read into [`Node`]s and evaluated
//! against an [`Environment`]. Operations can be overloaded per struct tag
//! through generic classes, see [`GenericRegistry`].
//!
//! Lambdas are not lexical closures. A lambda remembers only its
//! parameters and body, and its free variables are looked up in whatever
//! scope is active when it is called.

mod ast;
mod builtins;
mod env;
mod error;
mod eval;
mod generic;
mod parse;
mod read;
mod value;

pub use crate::{
    ast::{Lambda, Literal, Node},
    builtins::prelude,
    env::{Environment, DEFAULT_RECURSION_LIMIT},
    error::{Error, ReadError, RuntimeError},
    generic::{GenericRegistry, TypeMatcher},
    parse::{parse, parse_trees, Rule, Tree},
    read::read,
    value::{Builtin, BuiltinFn, Callable, GenericStub, Number, Struct, Value},
};

/// Parse and evaluate every top-level form, returning the value of the last
///
/// Nothing is evaluated if any form fails to parse.
pub fn run(input: &str, env: &mut Environment) -> Result<Value, Error> {
    let mut result = Value::Null;
    for node in parse(input)? {
        result = node.evaluate(env)?;
    }
    Ok(result)
}
