use std::convert::TryFrom;

use itertools::Itertools;
use num_traits::ToPrimitive;

use crate::{
    env::Environment,
    error::RuntimeError,
    value::{Builtin, Number, Value},
};

/// The global bindings every program starts with
pub fn prelude() -> Vec<(String, Value)> {
    let mut builtins = Vec::new();
    macro_rules! binops {
        ($($name:literal => $f:expr),* $(,)?) => {
            $(builtins.push(Builtin::new($name, |_, args| {
                let f: fn(&Value, &Value) -> Result<Value, RuntimeError> = $f;
                let [left, right] = operands::<2>($name, args)?;
                f(left, right)
            }));)*
        }
    }
    binops!(
        "+" => Value::add,
        "-" => Value::sub,
        "*" => Value::mul,
        "/" => Value::div,
        "==" => |a, b| Ok(Value::Bool(a == b)),
        "<" => |a, b| a.less(b).map(Value::Bool),
        ">" => |a, b| a.greater(b).map(Value::Bool),
    );
    builtins.push(Builtin::new("print", |_, args| {
        println!("{}", args.iter().join(" "));
        Ok(Value::Null)
    }));
    builtins.push(Builtin::new("log", |_, args| {
        let [message, value] = operands::<2>("log", args)?;
        eprintln!("{}", message);
        Ok(value.clone())
    }));
    builtins.push(Builtin::new("global", |env, args| {
        let [name, value] = operands::<2>("global", args)?;
        env.define_global(string("global", name)?, value.clone());
        Ok(value.clone())
    }));
    builtins.push(Builtin::new("class", define_class));
    builtins.push(Builtin::new("instance", define_instance));
    builtins
        .into_iter()
        .map(|builtin| (builtin.name().to_owned(), Value::from(builtin)))
        .collect()
}

fn operands<'a, const N: usize>(name: &str, args: &'a [Value]) -> Result<&'a [Value; N], RuntimeError> {
    <&[Value; N]>::try_from(args).map_err(|_| RuntimeError::Arity {
        name: name.into(),
        expected: N,
        found: args.len(),
    })
}

fn string<'a>(name: &str, value: &'a Value) -> Result<&'a str, RuntimeError> {
    match value {
        Value::String(s) => Ok(&**s),
        other => Err(RuntimeError::mismatch(format!(
            "`{}` expects a string but got {} {}",
            name,
            other.type_name(),
            other
        ))),
    }
}

/// `(class name operation ...)`
fn define_class(env: &mut Environment, args: &[Value]) -> Result<Value, RuntimeError> {
    let (name, operations) = args.split_first().ok_or(RuntimeError::Arity {
        name: "class".into(),
        expected: 1,
        found: 0,
    })?;
    let operations = operations
        .iter()
        .map(|operation| string("class", operation))
        .collect::<Result<Vec<_>, _>>()?;
    env.register_class(string("class", name)?, operations)?;
    Ok(Value::Null)
}

/// `(instance class operation implementation position tag ...)`
fn define_instance(env: &mut Environment, args: &[Value]) -> Result<Value, RuntimeError> {
    if args.len() < 3 {
        return Err(RuntimeError::Arity {
            name: "instance".into(),
            expected: 3,
            found: args.len(),
        });
    }
    let (head, pairs) = args.split_at(3);
    let implementation = match &head[2] {
        Value::Callable(callable) => callable.clone(),
        other => {
            return Err(RuntimeError::mismatch(format!(
                "`instance` expects a function but got {} {}",
                other.type_name(),
                other
            )))
        }
    };
    if pairs.len() % 2 != 0 {
        return Err(RuntimeError::mismatch(
            "`instance` expects argument positions and tags in pairs",
        ));
    }
    let matchers = pairs
        .chunks(2)
        .map(matcher)
        .collect::<Result<Vec<_>, _>>()?;
    env.register_instance(
        string("instance", &head[0])?,
        string("instance", &head[1])?,
        implementation,
        matchers,
    )?;
    Ok(Value::Null)
}

fn matcher(pair: &[Value]) -> Result<(usize, &str), RuntimeError> {
    Ok((position(&pair[0])?, string("instance", &pair[1])?))
}

fn position(value: &Value) -> Result<usize, RuntimeError> {
    match value {
        Value::Number(Number::Int(i)) => i.to_usize(),
        _ => None,
    }
    .ok_or_else(|| {
        RuntimeError::mismatch(format!(
            "argument position must be a non-negative integer, got {}",
            value
        ))
    })
}
