use num_bigint::BigInt;
use pest::{
    error::{Error as PestError, ErrorVariant},
    iterators::Pair,
    Parser, Span,
};

use crate::{ast::Node, error::Error, read::read};

pub type ParseResult<T> = Result<T, PestError<Rule>>;

#[derive(pest_derive::Parser)]
#[grammar = "grammar.pest"]
struct RillParser;

/// A token tree: either a single token or a parenthesized sequence of trees
///
/// String tokens keep their surrounding quotes and escapes. Decoding them is
/// the reader's job.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    Int(BigInt),
    Real(f64),
    Str(String),
    Symbol(String),
    List(Vec<Tree>),
}

impl Tree {
    pub fn symbol<S>(s: S) -> Tree
    where
        S: Into<String>,
    {
        Tree::Symbol(s.into())
    }
}

fn custom_error(span: Span<'_>, message: String) -> PestError<Rule> {
    PestError::new_from_span(ErrorVariant::CustomError { message }, span)
}

/// Split source text into top-level token trees
pub fn parse_trees(input: &str) -> ParseResult<Vec<Tree>> {
    Ok(located_trees(input)?
        .into_iter()
        .map(|(tree, _)| tree)
        .collect())
}

/// Parse source text into one node per top-level form
pub fn parse(input: &str) -> Result<Vec<Node>, Error> {
    located_trees(input)?
        .into_iter()
        .map(|(tree, span)| {
            read(&tree).map_err(|kind| {
                let located = Box::new(custom_error(span, kind.to_string()));
                Error::Read { kind, located }
            })
        })
        .collect()
}

fn located_trees(input: &str) -> ParseResult<Vec<(Tree, Span<'_>)>> {
    let mut trees = Vec::new();
    for program in RillParser::parse(Rule::program, input)? {
        for pair in program.into_inner() {
            if pair.as_rule() == Rule::EOI {
                continue;
            }
            let span = pair.as_span();
            trees.push((parse_tree(pair)?, span));
        }
    }
    Ok(trees)
}

fn parse_tree(pair: Pair<'_, Rule>) -> ParseResult<Tree> {
    Ok(match pair.as_rule() {
        Rule::list => Tree::List(
            pair.into_inner()
                .map(parse_tree)
                .collect::<ParseResult<_>>()?,
        ),
        Rule::int => {
            let s = pair.as_str();
            let digits = s.strip_prefix('+').unwrap_or(s);
            Tree::Int(digits.parse().map_err(|_| {
                custom_error(pair.as_span(), format!("Invalid number literal {}", s))
            })?)
        }
        Rule::real => Tree::Real(pair.as_str().parse().map_err(|_| {
            custom_error(
                pair.as_span(),
                format!("Invalid number literal {}", pair.as_str()),
            )
        })?),
        Rule::string => Tree::Str(pair.as_str().into()),
        Rule::symbol => Tree::symbol(pair.as_str()),
        rule => unreachable!("{:?}", rule),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ReadError;

    fn int(i: i64) -> Tree {
        Tree::Int(i.into())
    }

    #[test]
    fn comments_and_whitespace() {
        let text = "
        ()
        (+ 123 ;; some comment!
            ( * xyz 34))
        ";
        assert_eq!(
            parse_trees(text).unwrap(),
            vec![
                Tree::List(vec![]),
                Tree::List(vec![
                    Tree::symbol("+"),
                    int(123),
                    Tree::List(vec![Tree::symbol("*"), Tree::symbol("xyz"), int(34)]),
                ]),
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            parse_trees("34.05E-7 -5 +7 1.5 2e3 - + 12a").unwrap(),
            vec![
                Tree::Real(34.05E-7),
                int(-5),
                int(7),
                Tree::Real(1.5),
                Tree::Real(2000.0),
                Tree::symbol("-"),
                Tree::symbol("+"),
                Tree::symbol("12a"),
            ]
        );
    }

    #[test]
    fn huge_integers_stay_exact() {
        let trees = parse_trees("265252859812191058636308480000000").unwrap();
        assert_eq!(
            trees,
            vec![Tree::Int(
                "265252859812191058636308480000000".parse().unwrap()
            )]
        );
    }

    #[test]
    fn strings_keep_their_quotes() {
        assert_eq!(
            parse_trees(r#"(print "a \"quoted\" (paren)" "multi
line")"#)
            .unwrap(),
            vec![Tree::List(vec![
                Tree::symbol("print"),
                Tree::Str(r#""a \"quoted\" (paren)""#.into()),
                Tree::Str("\"multi\nline\"".into()),
            ])]
        );
    }

    #[test]
    fn keywords_are_symbols() {
        assert_eq!(
            parse_trees("#t #f #nil").unwrap(),
            vec![Tree::symbol("#t"), Tree::symbol("#f"), Tree::symbol("#nil")]
        );
    }

    #[test]
    fn unbalanced_parens_fail() {
        assert!(parse_trees("(+ 1 2").is_err());
        assert!(parse_trees("(+ 1 2))").is_err());
        assert!(parse_trees(r#"(print "open)"#).is_err());
    }

    #[test]
    fn read_errors_point_at_the_form() {
        match parse("(+ 1 2)\n(if #t 1)") {
            Err(Error::Read { kind, located }) => {
                assert!(matches!(kind, ReadError::MalformedForm { .. }));
                assert!(located.to_string().contains("2:1"));
            }
            other => panic!("expected read error, got {:?}", other),
        }
    }
}
