//! isolation::expr
//!
//! Parser for the marker expression language.
//!
//! # Grammar
//!
//! ```text
//! expr     = or_expr [ "?" expr [ ":" expr ] ]
//! or_expr  = and_expr { "or" and_expr }
//! and_expr = eq_expr { "and" eq_expr }
//! eq_expr  = concat [ ("=" | "==" | "!=") concat ]
//! concat   = unary { "&" unary }
//! unary    = "not" unary | primary
//! primary  = "(" expr ")" | string | number | "true" | "false" | "null"
//!          | call | path
//! call     = "$" ident "(" [ expr { "," expr } ] ")"
//! path     = [ "$" ] name { "." name | "[" string "]" }
//! name     = ident | "`" any "`"
//! ```
//!
//! Whitespace is allowed between tokens.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0, none_of},
    combinator::{all_consuming, cut, map, map_res, not, opt, peek, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use serde_json::Value;
use thiserror::Error;

/// A parse failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `&` string concatenation
    Concat,
    /// `=` or `==`
    Eq,
    /// `!=`
    Ne,
    And,
    Or,
}

impl BinaryOp {
    /// Operator as written in source.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// Parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Member lookup from the variable root.
    Path(Vec<String>),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// Unary `not`.
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
}

/// Parse a complete expression.
///
/// # Example
///
/// ```
/// use solution_kit::isolation::expr::{parse, Expr};
///
/// let expr = parse("env.tag").unwrap();
/// assert_eq!(expr, Expr::Path(vec!["env".into(), "tag".into()]));
/// assert!(parse("env.").is_err());
/// ```
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    match all_consuming(delimited(multispace0, expression, multispace0))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = input.len() - e.input.len();
            let message = if e.input.is_empty() {
                "unexpected end of expression".to_string()
            } else {
                format!("unexpected input at offset {offset}: '{}'", e.input)
            };
            Err(ParseError { message })
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError {
            message: "incomplete expression".to_string(),
        }),
    }
}

/// Wrap a parser so it skips surrounding whitespace.
fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Match a keyword that is not the prefix of a longer identifier.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(peek(take_while1(is_ident_char))))
}

// =============================================================================
// Operators, lowest precedence first
// =============================================================================

fn expression(input: &str) -> IResult<&str, Expr> {
    let (input, condition) = or_expr(input)?;
    let (input, branches) = opt(preceded(
        ws(char('?')),
        cut(pair(expression, opt(preceded(ws(char(':')), expression)))),
    ))(input)?;

    Ok(match branches {
        None => (input, condition),
        Some((then, otherwise)) => (
            input,
            Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: otherwise.map(Box::new),
            },
        ),
    })
}

/// Left-fold `operand { op operand }` into binary nodes.
fn fold_binary(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(pair(
        value(BinaryOp::Or, ws(keyword("or"))),
        cut(and_expr),
    ))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = eq_expr(input)?;
    let (input, rest) = many0(pair(
        value(BinaryOp::And, ws(keyword("and"))),
        cut(eq_expr),
    ))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn eq_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = concat_expr(input)?;
    let (input, rest) = opt(pair(
        ws(alt((
            value(BinaryOp::Ne, tag("!=")),
            value(BinaryOp::Eq, tag("==")),
            value(BinaryOp::Eq, tag("=")),
        ))),
        cut(concat_expr),
    ))(input)?;
    Ok((input, fold_binary(first, rest.into_iter().collect())))
}

fn concat_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(value(BinaryOp::Concat, ws(char('&'))), cut(unary)))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(keyword("not")), cut(unary)), |inner| {
            Expr::Not(Box::new(inner))
        }),
        primary,
    ))(input)
}

// =============================================================================
// Primaries
// =============================================================================

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(char('('), cut(ws(expression)), cut(char(')'))),
        map(string_literal, |s| Expr::Literal(Value::String(s))),
        number_literal,
        value(Expr::Literal(Value::Bool(true)), keyword("true")),
        value(Expr::Literal(Value::Bool(false)), keyword("false")),
        value(Expr::Literal(Value::Null), keyword("null")),
        call,
        path,
    )))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_ident_start), take_while(is_ident_char)))(input)
}

fn call(input: &str) -> IResult<&str, Expr> {
    let (input, name) = preceded(char('$'), terminated(identifier, peek(ws(char('(')))))(input)?;
    let (input, args) = cut(delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        ws(char(')')),
    ))(input)?;
    Ok((
        input,
        Expr::Call {
            name: name.to_string(),
            args,
        },
    ))
}

/// A path segment name: a plain identifier or a backtick-quoted name.
fn name(input: &str) -> IResult<&str, String> {
    alt((
        map(identifier, str::to_string),
        map(delimited(char('`'), take_until("`"), char('`')), str::to_string),
    ))(input)
}

fn path(input: &str) -> IResult<&str, Expr> {
    let (input, first) = preceded(opt(char('$')), name)(input)?;
    let (input, rest) = many0(alt((
        preceded(char('.'), cut(name)),
        delimited(
            pair(char('['), multispace0),
            cut(string_literal),
            cut(pair(multispace0, char(']'))),
        ),
    )))(input)?;

    let mut segments = Vec::with_capacity(rest.len() + 1);
    segments.push(first);
    segments.extend(rest);
    Ok((input, Expr::Path(segments)))
}

fn number_literal(input: &str) -> IResult<&str, Expr> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
        ))),
        |text: &str| -> Result<Expr, String> {
            let number = if text.contains('.') {
                let f: f64 = text.parse().map_err(|e| format!("{e}"))?;
                serde_json::Number::from_f64(f).ok_or_else(|| format!("invalid number {text}"))?
            } else {
                let i: i64 = text.parse().map_err(|e| format!("{e}"))?;
                i.into()
            };
            Ok(Expr::Literal(Value::Number(number)))
        },
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    alt((quoted('"'), quoted('\'')))(input)
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    let normal: &'static str = if quote == '"' { "\\\"" } else { "\\'" };
    move |input: &'a str| {
        let (input, _) = char(quote)(input)?;
        let (input, body) = opt(escaped_transform(
            none_of(normal),
            '\\',
            alt((
                value("\\", char('\\')),
                value("\"", char('"')),
                value("'", char('\'')),
                value("\n", char('n')),
                value("\t", char('t')),
            )),
        ))(input)?;
        let (input, _) = cut(char(quote))(input)?;
        Ok((input, body.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> Expr {
        Expr::Path(segments.iter().map(|s| s.to_string()).collect())
    }

    fn string(s: &str) -> Expr {
        Expr::Literal(Value::String(s.to_string()))
    }

    #[test]
    fn parse_path() {
        assert_eq!(parse("env.tag").unwrap(), path(&["env", "tag"]));
        assert_eq!(parse(" $env.tag ").unwrap(), path(&["env", "tag"]));
    }

    #[test]
    fn parse_bracket_and_backtick_members() {
        assert_eq!(
            parse("env.dependencyTags[\"my-dep\"]").unwrap(),
            path(&["env", "dependencyTags", "my-dep"])
        );
        assert_eq!(
            parse("env.dependencyTags.`my-dep`").unwrap(),
            path(&["env", "dependencyTags", "my-dep"])
        );
    }

    #[test]
    fn parse_literals() {
        assert_eq!(parse("'a\\'b'").unwrap(), string("a'b"));
        assert_eq!(parse("\"\"").unwrap(), string(""));
        assert_eq!(parse("42").unwrap(), Expr::Literal(Value::from(42)));
        assert_eq!(parse("-1.5").unwrap(), Expr::Literal(Value::from(-1.5)));
        assert_eq!(parse("true").unwrap(), Expr::Literal(Value::Bool(true)));
        assert_eq!(parse("null").unwrap(), Expr::Literal(Value::Null));
    }

    #[test]
    fn keywords_do_not_swallow_identifiers() {
        assert_eq!(parse("trueish").unwrap(), path(&["trueish"]));
        assert_eq!(parse("android").unwrap(), path(&["android"]));
    }

    #[test]
    fn parse_call() {
        assert_eq!(
            parse("$tagSuffix(env.tag)").unwrap(),
            Expr::Call {
                name: "tagSuffix".into(),
                args: vec![path(&["env", "tag"])],
            }
        );
        assert_eq!(
            parse("$lookup( env , 'a' )").unwrap(),
            Expr::Call {
                name: "lookup".into(),
                args: vec![path(&["env"]), string("a")],
            }
        );
    }

    #[test]
    fn parse_ternary() {
        let expr = parse("env.tag = 'stable' ? '' : '-' & env.tag").unwrap();
        let Expr::Conditional {
            condition,
            then,
            otherwise,
        } = expr
        else {
            panic!("expected conditional");
        };
        assert!(matches!(*condition, Expr::Binary { op: BinaryOp::Eq, .. }));
        assert_eq!(*then, string(""));
        assert!(matches!(
            otherwise.as_deref(),
            Some(Expr::Binary { op: BinaryOp::Concat, .. })
        ));
    }

    #[test]
    fn ternary_without_else() {
        let expr = parse("a ? 'x'").unwrap();
        assert!(matches!(expr, Expr::Conditional { otherwise: None, .. }));
    }

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        let expr = parse("a or b and c").unwrap();
        let Expr::Binary { op, rhs, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn parentheses_group() {
        let expr = parse("(a or b) and c").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn parse_unary_not() {
        assert_eq!(
            parse("not (env.tag = 'x')").unwrap(),
            Expr::Not(Box::new(Expr::Binary {
                op: BinaryOp::Eq,
                lhs: Box::new(path(&["env", "tag"])),
                rhs: Box::new(string("x")),
            }))
        );
        assert_eq!(
            parse("not not a").unwrap(),
            Expr::Not(Box::new(Expr::Not(Box::new(path(&["a"])))))
        );
        // binds tighter than '='
        assert!(matches!(
            parse("not a = b").unwrap(),
            Expr::Binary { op: BinaryOp::Eq, .. }
        ));
        assert_eq!(parse("nothing").unwrap(), path(&["nothing"]));
        assert!(parse("not").is_err());
    }

    #[test]
    fn errors() {
        assert!(parse("").is_err());
        assert!(parse("env.").is_err());
        assert!(parse("'unterminated").is_err());
        assert!(parse("$f(a,").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("a ?").is_err());
    }
}
