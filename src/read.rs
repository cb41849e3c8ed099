use std::{convert::TryFrom, str::Chars};

use crate::{
    ast::{Lambda, Literal, Node},
    error::ReadError,
    parse::Tree,
};

/// Turn a token tree into a node
///
/// Special forms are recognized by their head symbol and checked for shape
/// here, so a malformed form never reaches evaluation. Any other head is an
/// ordinary application.
pub fn read(tree: &Tree) -> Result<Node, ReadError> {
    Ok(match tree {
        Tree::Int(i) => Literal::Int(i.clone()).into(),
        Tree::Real(r) => Literal::Real(*r).into(),
        Tree::Str(raw) => Literal::String(unquote(raw)?).into(),
        Tree::Symbol(symbol) => read_symbol(symbol),
        Tree::List(items) => read_form(items)?,
    })
}

fn read_all(trees: &[Tree]) -> Result<Vec<Node>, ReadError> {
    trees.iter().map(read).collect()
}

fn read_boxed(tree: &Tree) -> Result<Box<Node>, ReadError> {
    read(tree).map(Box::new)
}

fn read_symbol(symbol: &str) -> Node {
    match symbol {
        "#t" => Literal::Bool(true).into(),
        "#f" => Literal::Bool(false).into(),
        "#nil" => Literal::Null.into(),
        name => Node::variable(name),
    }
}

/// The operands of a form that takes exactly `N` of them
fn operands<'t, const N: usize>(form: &str, rest: &'t [Tree]) -> Result<&'t [Tree; N], ReadError> {
    <&[Tree; N]>::try_from(rest).map_err(|_| {
        ReadError::malformed(
            form,
            format!("expected {} operands, found {}", N, rest.len()),
        )
    })
}

fn name<'t>(form: &str, tree: &'t Tree) -> Result<&'t str, ReadError> {
    match tree {
        Tree::Symbol(name) => Ok(name.as_str()),
        tree => Err(ReadError::malformed(
            form,
            format!("expected a name, found {:?}", tree),
        )),
    }
}

fn read_form(items: &[Tree]) -> Result<Node, ReadError> {
    let (head, rest) = items
        .split_first()
        .ok_or_else(|| ReadError::malformed("()", "empty form"))?;
    let head = match head {
        Tree::Symbol(head) => head.as_str(),
        head => return Ok(Node::apply(read(head)?, read_all(rest)?)),
    };
    Ok(match head {
        "lambda" => {
            let [params, body] = operands::<2>(head, rest)?;
            let params = match params {
                Tree::List(params) => params
                    .iter()
                    .map(|param| name(head, param).map(String::from))
                    .collect::<Result<Vec<_>, _>>()?,
                _ => return Err(ReadError::malformed(head, "expected a parameter list")),
            };
            Node::Lambda(
                Lambda {
                    params,
                    body: read(body)?,
                }
                .into(),
            )
        }
        "block" => Node::Block(read_all(rest)?),
        "set" => {
            let [target, value] = operands::<2>(head, rest)?;
            Node::Assign {
                name: name(head, target)?.into(),
                value: read_boxed(value)?,
            }
        }
        "if" => {
            let [test, then, otherwise] = operands::<3>(head, rest)?;
            Node::If {
                test: read_boxed(test)?,
                then: read_boxed(then)?,
                otherwise: read_boxed(otherwise)?,
            }
        }
        "while" => {
            let [test, body] = operands::<2>(head, rest)?;
            Node::While {
                test: read_boxed(test)?,
                body: read_boxed(body)?,
            }
        }
        "return" => match rest {
            [] => Node::Return(Box::new(Literal::Null.into())),
            [value] => Node::Return(read_boxed(value)?),
            _ => {
                return Err(ReadError::malformed(
                    head,
                    format!("expected at most 1 operand, found {}", rest.len()),
                ))
            }
        },
        "new" => {
            let (type_name, fields) = rest
                .split_first()
                .ok_or_else(|| ReadError::malformed(head, "expected a type name"))?;
            if fields.len() % 2 != 0 {
                return Err(ReadError::malformed(
                    head,
                    "expected field names and values in pairs",
                ));
            }
            Node::StructLiteral {
                type_name: name(head, type_name)?.into(),
                fields: fields
                    .chunks(2)
                    .map(|pair| -> Result<(String, Node), ReadError> {
                        Ok((name(head, &pair[0])?.into(), read(&pair[1])?))
                    })
                    .collect::<Result<_, _>>()?,
            }
        }
        "." => {
            let [base, field] = operands::<2>(head, rest)?;
            Node::FieldAccess {
                base: read_boxed(base)?,
                field: name(head, field)?.into(),
            }
        }
        "and" | "&&" => {
            let [left, right] = operands::<2>(head, rest)?;
            Node::if_else(read(left)?, read(right)?, Literal::Bool(false).into())
        }
        "or" | "||" => {
            let [left, right] = operands::<2>(head, rest)?;
            Node::if_else(read(left)?, Literal::Bool(true).into(), read(right)?)
        }
        callee => Node::apply(read_symbol(callee), read_all(rest)?),
    })
}

/// Decode a quoted string token
fn unquote(raw: &str) -> Result<String, ReadError> {
    let invalid = || ReadError::InvalidString(raw.into());
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(invalid)?;
    let mut s = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            s.push(c);
            continue;
        }
        s.push(match chars.next().ok_or_else(invalid)? {
            '"' => '"',
            '\\' => '\\',
            '/' => '/',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => {
                let high = hex_escape(&mut chars).ok_or_else(invalid)?;
                let code = if (0xD800..0xDC00).contains(&high) {
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(invalid());
                    }
                    let low = hex_escape(&mut chars)
                        .filter(|low| (0xDC00..0xE000).contains(low))
                        .ok_or_else(invalid)?;
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                std::char::from_u32(code).ok_or_else(invalid)?
            }
            _ => return Err(invalid()),
        });
    }
    Ok(s)
}

fn hex_escape(chars: &mut Chars) -> Option<u32> {
    let digits: String = chars.by_ref().take(4).collect();
    if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        u32::from_str_radix(&digits, 16).ok()
    } else {
        None
    }
}
