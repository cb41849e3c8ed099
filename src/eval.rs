use std::rc::Rc;

use rpds::RedBlackTreeMap;
use tracing::trace;

use crate::{
    ast::{Lambda, Node},
    env::Environment,
    error::RuntimeError,
    value::{Callable, Struct, Value},
};

/// Why evaluation stopped early
///
/// `Return` is not an error. It travels up through blocks, branches and
/// loops until the closure call that owns it turns it back into a value.
enum Signal {
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Signal {
    fn from(error: RuntimeError) -> Self {
        Signal::Error(error)
    }
}

type Flow = Result<Value, Signal>;

/// Resolve a signal at a call boundary
fn settle(flow: Flow) -> Result<Value, RuntimeError> {
    match flow {
        Ok(value) | Err(Signal::Return(value)) => Ok(value),
        Err(Signal::Error(error)) => Err(error),
    }
}

/// Remaining stack below which evaluation moves onto a fresh segment
const RED_ZONE: usize = 128 * 1024;
/// Size of each stack segment allocated for deep evaluation
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Run `f`, first growing the stack if little of it is left
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, f)
}

impl Node {
    /// Evaluate this node
    ///
    /// A `return` that is not inside any call ends this evaluation with the
    /// returned value.
    pub fn evaluate(&self, env: &mut Environment) -> Result<Value, RuntimeError> {
        settle(self.eval(env))
    }
    fn eval(&self, env: &mut Environment) -> Flow {
        ensure_sufficient_stack(|| self.eval_node(env))
    }
    fn eval_node(&self, env: &mut Environment) -> Flow {
        Ok(match self {
            Node::Literal(literal) => literal.value(),
            Node::Variable(name) => env.lookup(name)?,
            Node::Lambda(lambda) => Value::Callable(Callable::Closure(Rc::clone(lambda))),
            Node::Block(statements) => {
                let mut result = Value::Null;
                for statement in statements {
                    result = statement.eval(env)?;
                }
                result
            }
            Node::Assign { name, value } => {
                let value = value.eval(env)?;
                env.assign(name.as_str(), value.clone());
                value
            }
            Node::If {
                test,
                then,
                otherwise,
            } => {
                return if test.eval(env)?.is_truthy() {
                    then.eval(env)
                } else {
                    otherwise.eval(env)
                }
            }
            Node::While { test, body } => {
                let mut result = Value::Null;
                while test.eval(env)?.is_truthy() {
                    result = body.eval(env)?;
                }
                result
            }
            Node::Return(value) => return Err(Signal::Return(value.eval(env)?)),
            Node::StructLiteral { type_name, fields } => {
                return build_struct(env, type_name, fields)
            }
            Node::FieldAccess { base, field } => return read_field(env, base, field),
            Node::Apply { callee, args } => return apply(env, callee, args),
        })
    }
}

#[inline(never)]
fn build_struct(env: &mut Environment, type_name: &str, fields: &[(String, Node)]) -> Flow {
    let mut values = RedBlackTreeMap::new();
    for (name, expr) in fields {
        values = values.insert(name.clone(), expr.eval(env)?);
    }
    Ok(Struct::new(type_name, values).into())
}

#[inline(never)]
fn read_field(env: &mut Environment, base: &Node, field: &str) -> Flow {
    match base.eval(env)? {
        Value::Struct(s) => Ok(s.field(field)),
        other => Err(RuntimeError::mismatch(format!(
            "cannot read field `{}` of {} {}",
            field,
            other.type_name(),
            other
        ))
        .into()),
    }
}

#[inline(never)]
fn apply(env: &mut Environment, callee: &Node, args: &[Node]) -> Flow {
    let callee = callee.eval(env)?;
    let args = args
        .iter()
        .map(|arg| arg.eval(env))
        .collect::<Result<Vec<_>, _>>()?;
    match callee {
        Value::Callable(callable) => Ok(callable.call(env, args)?),
        other => Err(RuntimeError::mismatch(format!(
            "{} {} is not callable",
            other.type_name(),
            other
        ))
        .into()),
    }
}

impl Callable {
    /// Apply this callable to already evaluated arguments
    pub fn call(&self, env: &mut Environment, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match self {
            Callable::Closure(lambda) => lambda.call(env, args),
            Callable::Builtin(builtin) => builtin.invoke(env, &args),
            Callable::Generic(stub) => env
                .resolve_generic(&stub.class, &stub.operation, &args)?
                .call(env, args),
        }
    }
}

impl Lambda {
    /// Arguments bind to parameters by position. Surplus arguments are
    /// dropped and parameters without an argument stay unbound.
    fn call(&self, env: &mut Environment, args: Vec<Value>) -> Result<Value, RuntimeError> {
        env.enter_call()?;
        env.push_scope();
        trace!(depth = env.depth(), params = ?self.params, "enter closure");
        for (param, arg) in self.params.iter().zip(args) {
            env.assign(param.as_str(), arg);
        }
        let flow = self.body.eval(env);
        env.pop_scope();
        env.exit_call();
        trace!(depth = env.depth(), "exit closure");
        settle(flow)
    }
}
