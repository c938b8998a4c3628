//! Nom-based parser for the predicate expression grammar.
//!
//! Accepted grammar (JS-flavoured, matching what the analysis collaborator
//! generates):
//!
//! ```text
//! predicate   = [ "item" "=>" | "(item)" "=>" ] or-expr
//! or-expr     = and-expr { "||" and-expr }
//! and-expr    = comparison { "&&" comparison }
//! comparison  = unary [ cmp-op unary ]
//! cmp-op      = "===" | "!==" | "==" | "!=" | ">=" | "<=" | ">" | "<"
//! unary       = "!" unary | primary
//! primary     = "(" or-expr ")" | literal | path [ "." method "(" literal ")" ]
//! path        = "item" { "." ident }
//! method      = "includes" | "startsWith" | "endsWith"
//! literal     = string | number | "true" | "false" | "null"
//! ```
//!
//! String literals take single or double quotes; escapes are not supported.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt, value},
    multi::many0,
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::PredicateError;

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Expr {
    Literal(Lit),
    /// Member access on the item: the segments after `item` (empty = the
    /// item itself).
    Path(Vec<String>),
    /// A string/array method call on a path, e.g. `item.name.includes('x')`.
    Call {
        path: Vec<String>,
        method: Method,
        arg: Lit,
    },
    Not(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Lit {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Method {
    Includes,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum BinOp {
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
}

/// Parse full predicate source into an expression tree.
pub(super) fn parse(source: &str) -> Result<Expr, PredicateError> {
    let body = expression_body(source);
    if body.is_empty() {
        return Err(PredicateError::Parse("empty predicate".to_string()));
    }
    match all_consuming(terminated(or_expr, multispace0))(body) {
        Ok((_, expr)) => Ok(expr),
        Err(err) => Err(PredicateError::Parse(format!(
            "could not parse {body:?}: {err}"
        ))),
    }
}

/// Strip an optional `item =>` / `(item) =>` arrow prefix.
fn expression_body(source: &str) -> &str {
    let trimmed = source.trim();
    for head in ["item", "(item)", "(item )", "( item )"] {
        if let Some(rest) = trimmed.strip_prefix(head) {
            let rest = rest.trim_start();
            if let Some(body) = rest.strip_prefix("=>") {
                return body.trim();
            }
        }
    }
    trimmed
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(preceded(multispace0, tag("||")), and_expr))(input)?;
    Ok((input, fold_binary(first, BinOp::Or, rest)))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = comparison(input)?;
    let (input, rest) = many0(preceded(preceded(multispace0, tag("&&")), comparison))(input)?;
    Ok((input, fold_binary(first, BinOp::And, rest)))
}

fn fold_binary(first: Expr, op: BinOp, rest: Vec<Expr>) -> Expr {
    rest.into_iter().fold(first, |lhs, rhs| Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = unary(input)?;
    let (input, tail) = opt(pair(preceded(multispace0, cmp_op), unary))(input)?;
    Ok((
        input,
        match tail {
            Some((op, rhs)) => Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            None => lhs,
        },
    ))
}

fn cmp_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        value(BinOp::StrictEq, tag("===")),
        value(BinOp::StrictNe, tag("!==")),
        value(BinOp::LooseEq, tag("==")),
        value(BinOp::LooseNe, tag("!=")),
        value(BinOp::Ge, tag(">=")),
        value(BinOp::Le, tag("<=")),
        value(BinOp::Gt, tag(">")),
        value(BinOp::Lt, tag("<")),
    ))(input)
}

fn unary(input: &str) -> IResult<&str, Expr> {
    preceded(
        multispace0,
        alt((
            map(preceded(pair(char('!'), multispace0), unary), |inner| {
                Expr::Not(Box::new(inner))
            }),
            primary,
        )),
    )(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    preceded(
        multispace0,
        alt((
            parens,
            map(string_lit, |s| Expr::Literal(Lit::Str(s))),
            map(double, |n| Expr::Literal(Lit::Num(n))),
            keyword_or_path,
        )),
    )(input)
}

fn parens(input: &str) -> IResult<&str, Expr> {
    delimited(
        char('('),
        or_expr,
        preceded(multispace0, char(')')),
    )(input)
}

fn string_lit(input: &str) -> IResult<&str, String> {
    let single = delimited(char('\''), take_while(|c| c != '\''), char('\''));
    let double_q = delimited(char('"'), take_while(|c| c != '"'), char('"'));
    map(alt((single, double_q)), str::to_string)(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    let (rest, head) = take_while1(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$')(input)?;
    let (rest, tail) = take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$')(rest)?;
    let len = head.len() + tail.len();
    Ok((rest, &input[..len]))
}

/// Bare identifiers: the reserved literals, or a member path rooted at `item`.
fn keyword_or_path(input: &str) -> IResult<&str, Expr> {
    let (input, ident) = identifier(input)?;
    match ident {
        "true" => Ok((input, Expr::Literal(Lit::Bool(true)))),
        "false" => Ok((input, Expr::Literal(Lit::Bool(false)))),
        "null" => Ok((input, Expr::Literal(Lit::Null))),
        "item" => item_path(input),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

/// Member segments after `item`, optionally ending in a method call.
fn item_path(input: &str) -> IResult<&str, Expr> {
    let (input, segments) = many0(preceded(char('.'), identifier))(input)?;
    let (input, call_arg) = opt(delimited(
        tuple((multispace0, char('('), multispace0)),
        literal,
        tuple((multispace0, char(')'))),
    ))(input)?;

    let mut segments: Vec<String> = segments.into_iter().map(str::to_string).collect();

    match call_arg {
        None => Ok((input, Expr::Path(segments))),
        Some(arg) => {
            let method = match segments.pop().as_deref() {
                Some("includes") => Method::Includes,
                Some("startsWith") => Method::StartsWith,
                Some("endsWith") => Method::EndsWith,
                _ => {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        input,
                        nom::error::ErrorKind::Tag,
                    )))
                }
            };
            Ok((
                input,
                Expr::Call {
                    path: segments,
                    method,
                    arg,
                },
            ))
        }
    }
}

fn literal(input: &str) -> IResult<&str, Lit> {
    alt((
        map(string_lit, Lit::Str),
        map(double, Lit::Num),
        value(Lit::Bool(true), tag("true")),
        value(Lit::Bool(false), tag("false")),
        value(Lit::Null, tag("null")),
    ))(input)
}
