//! Path expression parser
//!
//! Parses jq/yq style expressions into an [`Expr`] tree using pest.

use miette::{NamedSource, SourceSpan};
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use serde_json::Value as JsonValue;

use crate::ast::{AssignOp, BinaryOp, Expr, Suffix};
use crate::error::{ExprError, SyntaxError};

#[derive(Parser)]
#[grammar = "expression.pest"]
struct ExpressionParser;

type Result<T> = std::result::Result<T, ExprError>;

/// Parse an expression into an AST
pub fn parse(input: &str) -> Result<Expr> {
    let mut pairs = ExpressionParser::parse(Rule::program, input)
        .map_err(|e| syntax_error(input, &e))?;

    let program = pairs
        .next()
        .ok_or_else(|| unexpected(input, "empty expression"))?;

    let pipeline = program
        .into_inner()
        .find(|p| p.as_rule() == Rule::pipeline)
        .ok_or_else(|| unexpected(input, "empty expression"))?;

    parse_pipeline(pipeline)
}

fn syntax_error(input: &str, err: &pest::error::Error<Rule>) -> ExprError {
    let span = match err.location {
        pest::error::InputLocation::Pos(pos) => SourceSpan::from((pos, 0)),
        pest::error::InputLocation::Span((start, end)) => SourceSpan::from((start, end - start)),
    };
    let message = match &err.variant {
        pest::error::ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let expected: Vec<String> = positives.iter().map(describe_rule).collect();
            format!("expected {}", expected.join(", "))
        }
        pest::error::ErrorVariant::ParsingError { .. } => "unexpected input".to_string(),
        pest::error::ErrorVariant::CustomError { message } => message.clone(),
    };

    ExprError::Syntax(SyntaxError {
        message,
        src: NamedSource::new("expression", input.to_string()),
        span: Some(span),
    })
}

fn unexpected(input: &str, message: &str) -> ExprError {
    ExprError::Syntax(SyntaxError {
        message: message.to_string(),
        src: NamedSource::new("expression", input.to_string()),
        span: None,
    })
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of expression".to_string(),
        Rule::field_access => "a field like .name".to_string(),
        Rule::assign_op => "an assignment".to_string(),
        Rule::cmp_op => "a comparison".to_string(),
        Rule::string => "a string".to_string(),
        Rule::ident => "a name".to_string(),
        other => format!("{other:?}"),
    }
}

fn parse_pipeline(pair: Pair<Rule>) -> Result<Expr> {
    fold_left(pair, parse_comma, |lhs, rhs| {
        Expr::Pipe(Box::new(lhs), Box::new(rhs))
    })
}

fn parse_comma(pair: Pair<Rule>) -> Result<Expr> {
    fold_left(pair, parse_alt, |lhs, rhs| {
        Expr::Comma(Box::new(lhs), Box::new(rhs))
    })
}

fn parse_alt(pair: Pair<Rule>) -> Result<Expr> {
    // `//` is right associative
    let operands = pair
        .into_inner()
        .map(parse_assign)
        .collect::<Result<Vec<_>>>()?;

    operands
        .into_iter()
        .rev()
        .reduce(|rhs, lhs| binary(BinaryOp::Alternative, lhs, rhs))
        .ok_or_else(|| ExprError::eval("empty alternative"))
}

fn parse_assign(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let target = next_operand(&mut inner, parse_or)?;

    let Some(op) = inner.next() else {
        return Ok(target);
    };
    let op = match op.as_str() {
        "=" => AssignOp::Set,
        "|=" => AssignOp::Update,
        "+=" => AssignOp::Add,
        other => return Err(ExprError::eval(format!("unknown assignment '{other}'"))),
    };
    let value = next_operand(&mut inner, parse_or)?;

    Ok(Expr::Assign {
        op,
        target: Box::new(target),
        value: Box::new(value),
    })
}

fn parse_or(pair: Pair<Rule>) -> Result<Expr> {
    let operands = pair
        .into_inner()
        .filter(|p| p.as_rule() != Rule::kw_or)
        .map(parse_and);
    fold_operands(operands, BinaryOp::Or)
}

fn parse_and(pair: Pair<Rule>) -> Result<Expr> {
    let operands = pair
        .into_inner()
        .filter(|p| p.as_rule() != Rule::kw_and)
        .map(parse_cmp);
    fold_operands(operands, BinaryOp::And)
}

fn parse_cmp(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let lhs = next_operand(&mut inner, parse_add)?;

    let Some(op) = inner.next() else {
        return Ok(lhs);
    };
    let op = match op.as_str() {
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        other => return Err(ExprError::eval(format!("unknown comparison '{other}'"))),
    };
    let rhs = next_operand(&mut inner, parse_add)?;

    Ok(binary(op, lhs, rhs))
}

fn parse_add(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let mut expr = next_operand(&mut inner, parse_postfix)?;

    while let Some(op) = inner.next() {
        let op = if op.as_str() == "-" {
            BinaryOp::Sub
        } else {
            BinaryOp::Add
        };
        let rhs = next_operand(&mut inner, parse_postfix)?;
        expr = binary(op, expr, rhs);
    }

    Ok(expr)
}

fn parse_postfix(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let base = next_operand(&mut inner, parse_term)?;

    let suffixes = inner.map(parse_suffix).collect::<Result<Vec<_>>>()?;
    Ok(base.with_suffixes(suffixes))
}

fn parse_suffix(pair: Pair<Rule>) -> Result<Suffix> {
    match pair.as_rule() {
        Rule::field_access => Ok(Suffix::Field(parse_field_name(pair)?)),
        Rule::iterate => Ok(Suffix::Iterate),
        Rule::index => {
            let inner = first_inner(pair)?;
            Ok(Suffix::Index(parse_pipeline(inner)?))
        }
        other => Err(ExprError::eval(format!("unexpected {other:?} after term"))),
    }
}

fn parse_term(pair: Pair<Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::identity => Ok(Expr::Identity),
        Rule::field_access => {
            let name = parse_field_name(pair)?;
            Ok(Expr::Postfix(Box::new(Expr::Identity), vec![Suffix::Field(name)]))
        }
        Rule::null => Ok(Expr::Literal(JsonValue::Null)),
        Rule::boolean => Ok(Expr::Literal(JsonValue::Bool(pair.as_str() == "true"))),
        Rule::number => parse_number(pair.as_str()).map(Expr::Literal),
        Rule::string => Ok(Expr::Literal(JsonValue::String(parse_string(pair)?))),
        Rule::array => match pair.into_inner().next() {
            Some(inner) => Ok(Expr::Array(Some(Box::new(parse_pipeline(inner)?)))),
            None => Ok(Expr::Array(None)),
        },
        Rule::object => {
            let entries = pair
                .into_inner()
                .map(parse_object_entry)
                .collect::<Result<Vec<_>>>()?;
            Ok(Expr::Object(entries))
        }
        Rule::function => {
            let mut inner = pair.into_inner();
            let name = inner
                .next()
                .map(|p| p.as_str().to_string())
                .ok_or_else(|| ExprError::eval("function without a name"))?;
            let args = inner.map(parse_pipeline).collect::<Result<Vec<_>>>()?;
            Ok(Expr::Call { name, args })
        }
        Rule::pipeline => parse_pipeline(pair),
        other => Err(ExprError::eval(format!("unexpected {other:?} in expression"))),
    }
}

fn parse_object_entry(pair: Pair<Rule>) -> Result<(String, Expr)> {
    let mut inner = pair.into_inner();
    let key = inner
        .next()
        .ok_or_else(|| ExprError::eval("object entry without a key"))?;
    let key = match key.as_rule() {
        Rule::string => parse_string(key)?,
        _ => key.as_str().to_string(),
    };
    let value = next_operand(&mut inner, parse_or)?;
    Ok((key, value))
}

fn parse_field_name(pair: Pair<Rule>) -> Result<String> {
    let name = first_inner(pair)?;
    match name.as_rule() {
        Rule::string => parse_string(name),
        _ => Ok(name.as_str().to_string()),
    }
}

fn parse_number(text: &str) -> Result<JsonValue> {
    if let Ok(int) = text.parse::<i64>() {
        return Ok(JsonValue::from(int));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .ok_or_else(|| ExprError::eval(format!("invalid number: {text}")))
}

fn parse_string(pair: Pair<Rule>) -> Result<String> {
    let raw = pair
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or_default();
    unescape(raw)
}

fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let ch = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ExprError::eval(format!("invalid escape \\u{hex}")))?;
                out.push(ch);
            }
            Some(other) => return Err(ExprError::eval(format!("invalid escape \\{other}"))),
            None => return Err(ExprError::eval("dangling backslash in string")),
        }
    }

    Ok(out)
}

fn first_inner(pair: Pair<Rule>) -> Result<Pair<Rule>> {
    let rule = pair.as_rule();
    pair.into_inner()
        .next()
        .ok_or_else(|| ExprError::eval(format!("empty {rule:?}")))
}

fn next_operand<'a>(
    inner: &mut pest::iterators::Pairs<'a, Rule>,
    parse: fn(Pair<'a, Rule>) -> Result<Expr>,
) -> Result<Expr> {
    let pair = inner
        .next()
        .ok_or_else(|| ExprError::eval("missing operand"))?;
    parse(pair)
}

fn fold_left(
    pair: Pair<Rule>,
    parse: fn(Pair<Rule>) -> Result<Expr>,
    combine: fn(Expr, Expr) -> Expr,
) -> Result<Expr> {
    let rule = pair.as_rule();
    pair.into_inner()
        .map(parse)
        .reduce(|lhs, rhs| Ok(combine(lhs?, rhs?)))
        .unwrap_or_else(|| Err(ExprError::eval(format!("empty {rule:?}"))))
}

fn fold_operands(operands: impl Iterator<Item = Result<Expr>>, op: BinaryOp) -> Result<Expr> {
    operands
        .reduce(|lhs, rhs| Ok(binary(op, lhs?, rhs?)))
        .unwrap_or_else(|| Err(ExprError::eval(format!("empty {} expression", op.symbol()))))
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
