use std::{fmt, rc::Rc};

use derive_more::Display;
use itertools::Itertools;
use num_bigint::BigInt;

use crate::value::{Number, Value};

/// An expression
///
/// `Display` renders the canonical source form, which reads back into an
/// equal node.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum Node {
    #[display(fmt = "{}", _0)]
    Literal(Literal),
    #[display(fmt = "{}", _0)]
    Variable(String),
    #[display(fmt = "{}", _0)]
    Lambda(Rc<Lambda>),
    #[display(fmt = "(block{})", "spaced(_0)")]
    Block(Vec<Node>),
    #[display(fmt = "(set {} {})", name, value)]
    Assign { name: String, value: Box<Node> },
    #[display(fmt = "(if {} {} {})", test, then, otherwise)]
    If {
        test: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    #[display(fmt = "(while {} {})", test, body)]
    While { test: Box<Node>, body: Box<Node> },
    #[display(fmt = "(return {})", _0)]
    Return(Box<Node>),
    #[display(
        fmt = "(new {}{})",
        type_name,
        r#"fields.iter().map(|(name, expr)| format!(" {} {}", name, expr)).collect::<String>()"#
    )]
    StructLiteral {
        type_name: String,
        fields: Vec<(String, Node)>,
    },
    #[display(fmt = "(. {} {})", base, field)]
    FieldAccess { base: Box<Node>, field: String },
    #[display(fmt = "({}{})", callee, "spaced(args)")]
    Apply { callee: Box<Node>, args: Vec<Node> },
}

fn spaced(nodes: &[Node]) -> String {
    nodes.iter().map(|node| format!(" {}", node)).collect()
}

impl Node {
    pub fn variable<N>(name: N) -> Node
    where
        N: Into<String>,
    {
        Node::Variable(name.into())
    }
    pub fn apply<I>(callee: Node, args: I) -> Node
    where
        I: IntoIterator<Item = Node>,
    {
        Node::Apply {
            callee: callee.into(),
            args: args.into_iter().collect(),
        }
    }
    pub fn lambda<P, S>(params: P, body: Node) -> Node
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Node::Lambda(Rc::new(Lambda {
            params: params.into_iter().map(Into::into).collect(),
            body,
        }))
    }
    pub fn if_else(test: Node, then: Node, otherwise: Node) -> Node {
        Node::If {
            test: test.into(),
            then: then.into(),
            otherwise: otherwise.into(),
        }
    }
}

impl From<Literal> for Node {
    fn from(literal: Literal) -> Self {
        Node::Literal(literal)
    }
}

macro_rules! literal_nodes {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Node {
            fn from(value: $ty) -> Self {
                Node::Literal(value.into())
            }
        })*
    }
}

literal_nodes!(bool, i64, f64, &str);

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Node,
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(lambda ({}) {})", self.params.iter().join(" "), self.body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(BigInt),
    Real(f64),
    String(String),
}

impl Literal {
    pub fn value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Number(Number::Int(i.clone())),
            Literal::Real(r) => Value::Number(Number::Real(*r)),
            Literal::String(s) => Value::String(s.as_str().into()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "#nil"),
            Literal::Bool(true) => write!(f, "#t"),
            Literal::Bool(false) => write!(f, "#f"),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Real(r) => write!(f, "{:?}", r),
            Literal::String(s) => write!(f, "{}", quote(s)),
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Int(i.into())
    }
}

impl From<f64> for Literal {
    fn from(r: f64) -> Self {
        Literal::Real(r)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.into())
    }
}

/// Render a string with the escapes the reader understands
pub(crate) fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{8}' => quoted.push_str("\\b"),
            '\u{c}' => quoted.push_str("\\f"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn render_forms() {
        let factorial = Node::lambda(
            vec!["n"],
            Node::if_else(
                Node::apply(Node::variable("<"), vec![Node::variable("n"), 2i64.into()]),
                1i64.into(),
                Node::apply(
                    Node::variable("*"),
                    vec![
                        Node::variable("n"),
                        Node::apply(
                            Node::variable("factorial"),
                            vec![Node::apply(
                                Node::variable("-"),
                                vec![Node::variable("n"), 1i64.into()],
                            )],
                        ),
                    ],
                ),
            ),
        );
        assert_eq!(
            factorial.to_string(),
            "(lambda (n) (if (< n 2) 1 (* n (factorial (- n 1)))))"
        );
    }

    #[test]
    fn render_statements() {
        let node = Node::Block(vec![
            Node::Assign {
                name: "x".into(),
                value: Box::new(0i64.into()),
            },
            Node::While {
                test: Box::new(Node::variable("go")),
                body: Box::new(Node::Return(Box::new(Literal::Null.into()))),
            },
            Node::FieldAccess {
                base: Box::new(Node::StructLiteral {
                    type_name: "Point".into(),
                    fields: vec![("x".into(), 1.5f64.into()), ("y".into(), "up".into())],
                }),
                field: "x".into(),
            },
            Node::apply(Node::variable("tick"), None),
        ]);
        assert_eq!(
            node.to_string(),
            r#"(block (set x 0) (while go (return #nil)) (. (new Point x 1.5 y "up") x) (tick))"#
        );
        assert_eq!(Node::Block(Vec::new()).to_string(), "(block)");
    }

    #[test]
    fn render_literals() {
        assert_eq!(Node::from(true).to_string(), "#t");
        assert_eq!(Node::from(false).to_string(), "#f");
        assert_eq!(Node::from(Literal::Null).to_string(), "#nil");
        assert_eq!(Node::from(3.0f64).to_string(), "3.0");
        assert_eq!(Node::from(-12i64).to_string(), "-12");
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(quote("plain"), r#""plain""#);
        assert_eq!(quote("a \"b\"\n\\"), r#""a \"b\"\n\\""#);
        assert_eq!(quote("\u{1}\t"), r#""\u0001\t""#);
    }
}
