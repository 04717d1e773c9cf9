//! Recursive-descent arithmetic evaluator built on `nom` combinators.
//!
//! `nom` parses the expression into a small AST; evaluation walks the AST
//! separately so that divide-by-zero and overflow can be reported as
//! distinct error kinds rather than collapsing into NaN/inf.
//!
//! Grammar (precedence lowest to highest):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := '-' unary | power
//! power   := primary ('**' power)?
//! primary := number | '(' expr ')'
//! ```
//!
//! `**` is right-associative and binds tighter than unary minus, so
//! `-2 ** 2` parses as `-(2 ** 2)` and evaluates to `-4`, per spec.md §4.1.
//! `+ - * / %` are left-associative, built with iterative folds rather than
//! recursion on the left side.

use nom::branch::alt;
use nom::character::complete::{char, multispace0};
use nom::combinator::{all_consuming, map, map_res, opt};
use nom::number::complete::recognize_float;
use nom::sequence::delimited;
use nom::IResult;

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    Syntax(String),
    DivideByZero,
    Overflow,
}

#[derive(Debug, Clone)]
enum Expr {
    Num(f64),
    Neg(Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Mod(Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
}

pub fn evaluate(expr: &str) -> Result<f64, EvalError> {
    let ast = match all_consuming(delimited(multispace0, parse_expr, multispace0))(expr) {
        Ok((_, ast)) => ast,
        Err(_) => return Err(EvalError::Syntax(format!("could not parse expression: '{}'", expr))),
    };
    eval_ast(&ast)
}

fn eval_ast(expr: &Expr) -> Result<f64, EvalError> {
    let value = match expr {
        Expr::Num(n) => *n,
        Expr::Neg(a) => -eval_ast(a)?,
        Expr::Pow(a, b) => eval_ast(a)?.powf(eval_ast(b)?),
        Expr::Mul(a, b) => eval_ast(a)? * eval_ast(b)?,
        Expr::Div(a, b) => {
            let rhs = eval_ast(b)?;
            if rhs == 0.0 {
                return Err(EvalError::DivideByZero);
            }
            eval_ast(a)? / rhs
        }
        Expr::Mod(a, b) => {
            let rhs = eval_ast(b)?;
            if rhs == 0.0 {
                return Err(EvalError::DivideByZero);
            }
            eval_ast(a)? % rhs
        }
        Expr::Add(a, b) => eval_ast(a)? + eval_ast(b)?,
        Expr::Sub(a, b) => eval_ast(a)? - eval_ast(b)?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::Overflow)
    }
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn parse_number(input: &str) -> IResult<&str, Expr> {
    map(map_res(recognize_float, |s: &str| s.parse::<f64>()), Expr::Num)(input)
}

fn parse_primary(input: &str) -> IResult<&str, Expr> {
    alt((
        delimited(ws(char('(')), parse_expr, ws(char(')'))),
        ws(parse_number),
    ))(input)
}

/// power := primary ('**' power)?  -- right-associative
fn parse_power(input: &str) -> IResult<&str, Expr> {
    let (input, base) = parse_primary(input)?;
    let (input, exp) = opt(|i| {
        let (i, _) = ws(char('*'))(i)?;
        let (i, _) = char('*')(i)?;
        parse_power(i)
    })(input)?;
    match exp {
        Some(exp) => Ok((input, Expr::Pow(Box::new(base), Box::new(exp)))),
        None => Ok((input, base)),
    }
}

/// unary := '-' unary | power
fn parse_unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            |i| {
                let (i, _) = ws(char('-'))(i)?;
                parse_unary(i)
            },
            |e| Expr::Neg(Box::new(e)),
        ),
        parse_power,
    ))(input)
}

#[derive(Clone, Copy)]
enum MulOp {
    Mul,
    Div,
    Mod,
}

fn parse_mul_op(input: &str) -> IResult<&str, MulOp> {
    ws(alt((
        map(char('*'), |_| MulOp::Mul),
        map(char('/'), |_| MulOp::Div),
        map(char('%'), |_| MulOp::Mod),
    )))(input)
}

/// term := unary (('*' | '/' | '%') unary)*  -- left-associative
fn parse_term(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut acc) = parse_unary(input)?;
    loop {
        // '**' is consumed by parse_power, so a lone '*' here is unambiguous.
        match parse_mul_op(input) {
            Ok((rest, op)) => {
                let (rest, rhs) = parse_unary(rest)?;
                acc = match op {
                    MulOp::Mul => Expr::Mul(Box::new(acc), Box::new(rhs)),
                    MulOp::Div => Expr::Div(Box::new(acc), Box::new(rhs)),
                    MulOp::Mod => Expr::Mod(Box::new(acc), Box::new(rhs)),
                };
                input = rest;
            }
            Err(_) => break,
        }
    }
    Ok((input, acc))
}

#[derive(Clone, Copy)]
enum AddOp {
    Add,
    Sub,
}

fn parse_add_op(input: &str) -> IResult<&str, AddOp> {
    ws(alt((
        map(char('+'), |_| AddOp::Add),
        map(char('-'), |_| AddOp::Sub),
    )))(input)
}

/// expr := term (('+' | '-') term)*  -- left-associative
fn parse_expr(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut acc) = parse_term(input)?;
    loop {
        match parse_add_op(input) {
            Ok((rest, op)) => {
                let (rest, rhs) = parse_term(rest)?;
                acc = match op {
                    AddOp::Add => Expr::Add(Box::new(acc), Box::new(rhs)),
                    AddOp::Sub => Expr::Sub(Box::new(acc), Box::new(rhs)),
                };
                input = rest;
            }
            Err(_) => break,
        }
    }
    Ok((input, acc))
}
