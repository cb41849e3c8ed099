use std::{cmp::Ordering, fmt, rc::Rc};

use itertools::Itertools;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use rpds::RedBlackTreeMap;

use crate::{ast::Lambda, env::Environment, error::RuntimeError};

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(Rc<str>),
    Struct(Rc<Struct>),
    Callable(Callable),
}

#[derive(Debug, Clone)]
pub enum Number {
    Int(BigInt),
    Real(f64),
}

macro_rules! arithmetic {
    ($($name:ident => $op:tt),*) => {
        $(pub fn $name(&self, other: &Number) -> Number {
            match (self, other) {
                (Number::Int(a), Number::Int(b)) => Number::Int(a $op b),
                (a, b) => Number::Real(a.to_f64() $op b.to_f64()),
            }
        })*
    }
}

impl Number {
    arithmetic!(add => +, sub => -, mul => *);
    pub fn div(&self, other: &Number) -> Result<Number, RuntimeError> {
        let divisor = match other {
            Number::Int(i) if i.is_zero() => return Err(RuntimeError::DivisionByZero),
            Number::Real(r) if *r == 0.0 => return Err(RuntimeError::DivisionByZero),
            other => other.to_f64(),
        };
        Ok(Number::Real(self.to_f64() / divisor))
    }
    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Int(i) => i.to_f64().unwrap_or(f64::NAN),
            Number::Real(r) => *r,
        }
    }
    /// Exact numeric ordering, `None` only when a NaN is involved
    pub fn compare(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            (Number::Real(a), Number::Real(b)) => a.partial_cmp(b),
            (Number::Int(a), Number::Real(b)) => compare_int_real(a, *b),
            (Number::Real(a), Number::Int(b)) => compare_int_real(b, *a).map(Ordering::reverse),
        }
    }
}

fn compare_int_real(int: &BigInt, real: f64) -> Option<Ordering> {
    if real.is_nan() {
        return None;
    }
    if real.is_infinite() {
        return Some(if real > 0.0 {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }
    let whole = real.trunc();
    match int.cmp(&BigInt::from_f64(whole)?) {
        // the fraction alone decides
        Ordering::Equal => whole.partial_cmp(&real),
        unequal => Some(unequal),
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Real(r) => write!(f, "{:?}", r),
        }
    }
}

/// An instance of a struct tag
///
/// Fields are fixed when the instance is built and never change afterwards.
#[derive(Clone)]
pub struct Struct {
    pub type_name: String,
    pub fields: RedBlackTreeMap<String, Value>,
}

impl Struct {
    pub fn new<N>(type_name: N, fields: RedBlackTreeMap<String, Value>) -> Self
    where
        N: Into<String>,
    {
        Struct {
            type_name: type_name.into(),
            fields,
        }
    }
    /// Missing fields read as `Null`
    pub fn field(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or(Value::Null)
    }
}

impl fmt::Debug for Struct {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Struct")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for Struct {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(new {}", self.type_name)?;
        for (name, value) in self.fields.iter() {
            write!(f, " {} {}", name, value)?;
        }
        write!(f, ")")
    }
}

pub type BuiltinFn = dyn Fn(&mut Environment, &[Value]) -> Result<Value, RuntimeError>;

/// A function provided by the host
#[derive(Clone)]
pub struct Builtin {
    name: Rc<str>,
    function: Rc<BuiltinFn>,
}

impl Builtin {
    pub fn new<N, F>(name: N, function: F) -> Self
    where
        N: Into<Rc<str>>,
        F: Fn(&mut Environment, &[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Builtin {
            name: name.into(),
            function: Rc::new(function),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub(crate) fn invoke(&self, env: &mut Environment, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.function)(env, args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// Stands in for a generic operation until its arguments are known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericStub {
    pub class: String,
    pub operation: String,
}

#[derive(Debug, Clone)]
pub enum Callable {
    Closure(Rc<Lambda>),
    Builtin(Builtin),
    Generic(GenericStub),
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Closure(a), Callable::Closure(b)) => Rc::ptr_eq(a, b),
            (Callable::Builtin(a), Callable::Builtin(b)) => Rc::ptr_eq(&a.function, &b.function),
            (Callable::Generic(a), Callable::Generic(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Callable::Closure(lambda) => write!(f, "<lambda ({})>", lambda.params.iter().join(" ")),
            Callable::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
            Callable::Generic(stub) => write!(f, "<generic {}>", stub.operation),
        }
    }
}

impl Value {
    /// Only `#f` and `#nil` are falsy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "nil",
            Value::Bool(_) => "bool",
            Value::Number(Number::Int(_)) => "int",
            Value::Number(Number::Real(_)) => "real",
            Value::String(_) => "string",
            Value::Struct(s) => &s.type_name,
            Value::Callable(_) => "function",
        }
    }
    pub fn int<I>(i: I) -> Value
    where
        I: Into<BigInt>,
    {
        Value::Number(Number::Int(i.into()))
    }
    pub fn add(&self, other: &Value) -> Result<Value, RuntimeError> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b).into())),
            _ => self.numeric(other, "add", |a, b| Ok(a.add(b))),
        }
    }
    pub fn sub(&self, other: &Value) -> Result<Value, RuntimeError> {
        self.numeric(other, "subtract", |a, b| Ok(a.sub(b)))
    }
    pub fn mul(&self, other: &Value) -> Result<Value, RuntimeError> {
        self.numeric(other, "multiply", |a, b| Ok(a.mul(b)))
    }
    pub fn div(&self, other: &Value) -> Result<Value, RuntimeError> {
        self.numeric(other, "divide", Number::div)
    }
    pub fn less(&self, other: &Value) -> Result<bool, RuntimeError> {
        Ok(self.compare(other)? == Some(Ordering::Less))
    }
    pub fn greater(&self, other: &Value) -> Result<bool, RuntimeError> {
        Ok(self.compare(other)? == Some(Ordering::Greater))
    }
    fn compare(&self, other: &Value) -> Result<Option<Ordering>, RuntimeError> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Ok(a.compare(b)),
            (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
            (a, b) => Err(RuntimeError::mismatch(format!(
                "cannot compare {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }
    fn numeric<F>(&self, other: &Value, verb: &str, f: F) -> Result<Value, RuntimeError>
    where
        F: FnOnce(&Number, &Number) -> Result<Number, RuntimeError>,
    {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => f(a, b).map(Value::Number),
            (a, b) => Err(RuntimeError::mismatch(format!(
                "cannot {} {} and {}",
                verb,
                a.type_name(),
                b.type_name()
            ))),
        }
    }
}

/// Numbers compare by value across int and real, structs and
/// functions by identity
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => Rc::ptr_eq(a, b),
            (Value::Callable(a), Value::Callable(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "#nil"),
            Value::Bool(true) => write!(f, "#t"),
            Value::Bool(false) => write!(f, "#f"),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Struct(s) => write!(f, "{}", s),
            Value::Callable(c) => write!(f, "{}", c),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::int(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::int(i)
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::int(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Number(Number::Real(r))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Struct> for Value {
    fn from(s: Struct) -> Self {
        Value::Struct(Rc::new(s))
    }
}

impl From<Builtin> for Value {
    fn from(builtin: Builtin) -> Self {
        Value::Callable(Callable::Builtin(builtin))
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Value::Callable(callable)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::from(0).is_truthy());
        assert!(Value::from("").is_truthy());
        assert!(Value::from(0.0).is_truthy());
    }

    #[test]
    fn integer_arithmetic_is_exact() {
        let big = Value::int(BigInt::from(u64::MAX));
        let squared = big.mul(&big).unwrap();
        assert_eq!(
            squared.to_string(),
            "340282366920938463426481119284349108225"
        );
        assert_eq!(Value::from(7).sub(&Value::from(10)).unwrap(), Value::from(-3));
    }

    #[test]
    fn mixed_arithmetic_promotes_to_real() {
        let sum = Value::from(1).add(&Value::from(0.5)).unwrap();
        assert_eq!(sum.type_name(), "real");
        assert_eq!(sum, Value::from(1.5));
    }

    #[test]
    fn int_and_real_compare_exactly() {
        let above: BigInt = "9007199254740993".parse().unwrap();
        let int = Value::int(above);
        let real = Value::from(9007199254740992.0);
        assert!(int != real);
        assert!(real.less(&int).unwrap());
        assert!(int.greater(&real).unwrap());
        assert_eq!(Value::from(2), Value::from(2.0));
        assert!(Value::from(2).less(&Value::from(2.5)).unwrap());
        assert!(Value::from(-3).less(&Value::from(-2.5)).unwrap());
        assert!(Value::from(-2).greater(&Value::from(-2.5)).unwrap());
        assert!(Value::from(10).less(&Value::from(f64::INFINITY)).unwrap());
        assert!(Value::from(10).greater(&Value::from(f64::NEG_INFINITY)).unwrap());
        assert!(!Value::from(1).less(&Value::from(f64::NAN)).unwrap());
        assert!(Value::from(1) != Value::from(f64::NAN));
    }

    #[test]
    fn division_is_true_division() {
        assert_eq!(Value::from(7).div(&Value::from(2)).unwrap(), Value::from(3.5));
        assert_eq!(Value::from(6).div(&Value::from(3)).unwrap().type_name(), "real");
        assert_eq!(
            Value::from(1).div(&Value::from(0)),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            Value::from(1).div(&Value::from(0.0)),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn strings_concatenate_and_compare() {
        assert_eq!(
            Value::from("foo").add(&Value::from("bar")).unwrap(),
            Value::from("foobar")
        );
        assert!(Value::from("abc").less(&Value::from("abd")).unwrap());
        assert!(Value::from("foo").sub(&Value::from("bar")).is_err());
    }

    #[test]
    fn equality_across_kinds() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::from(1), Value::from(true));
        assert_ne!(Value::Null, Value::Bool(false));
        let s = Value::from(Struct::new("Point", RedBlackTreeMap::new()));
        assert_eq!(s, s.clone());
        assert_ne!(s, Value::from(Struct::new("Point", RedBlackTreeMap::new())));
    }

    #[test]
    fn comparing_incompatible_values_fails() {
        assert!(matches!(
            Value::from(1).less(&Value::from("1")),
            Err(RuntimeError::TypeMismatch(_))
        ));
        assert!(Value::Null.greater(&Value::Null).is_err());
    }

    #[test]
    fn struct_missing_field_is_null() {
        let s = Struct::new("MyStruct", RedBlackTreeMap::new().insert("foo".into(), Value::from(1)));
        assert_eq!(s.field("foo"), Value::from(1));
        assert_eq!(s.field("bar"), Value::Null);
        assert_eq!(s.to_string(), "(new MyStruct foo 1)");
    }
}
