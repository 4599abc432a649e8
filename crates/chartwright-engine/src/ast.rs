//! AST for path expressions
//!
//! Expressions follow the jq/yq model: every expression consumes one input
//! value and produces zero or more outputs.

use serde_json::Value as JsonValue;
use std::fmt;

/// A parsed path expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `.`
    Identity,
    /// A constant
    Literal(JsonValue),
    /// A term followed by field, index or iteration steps: `.a.b[0][]`
    Postfix(Box<Expr>, Vec<Suffix>),
    /// `[ expr ]` collects every output of `expr`; `[]` is an empty array
    Array(Option<Box<Expr>>),
    /// `{key: expr, ...}`
    Object(Vec<(String, Expr)>),
    /// `name` or `name(arg; arg)`
    Call { name: String, args: Vec<Expr> },
    /// `lhs | rhs`
    Pipe(Box<Expr>, Box<Expr>),
    /// `lhs, rhs`
    Comma(Box<Expr>, Box<Expr>),
    /// Binary operators: alternative, boolean, comparison and arithmetic
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `target = value`, `target |= value`, `target += value`
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

/// A step applied to the output of a term
#[derive(Debug, Clone, PartialEq)]
pub enum Suffix {
    /// `.name` or `."name"`
    Field(String),
    /// `[expr]`
    Index(Expr),
    /// `[]`
    Iterate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Alternative,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Alternative => "//",
            Self::Or => "or",
            Self::And => "and",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`: value is evaluated against the original input
    Set,
    /// `|=`: value is evaluated against each target
    Update,
    /// `+=`: value is evaluated against the original input and added to each target
    Add,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Set => "=",
            Self::Update => "|=",
            Self::Add => "+=",
        }
    }
}

impl Expr {
    /// Wrap `self` in a postfix chain, flattening nested chains
    pub fn with_suffixes(self, suffixes: Vec<Suffix>) -> Expr {
        if suffixes.is_empty() {
            return self;
        }
        match self {
            Expr::Postfix(base, mut existing) => {
                existing.extend(suffixes);
                Expr::Postfix(base, existing)
            }
            other => Expr::Postfix(Box::new(other), suffixes),
        }
    }
}

fn is_plain_ident(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suffix::Field(name) if is_plain_ident(name) => write!(f, ".{name}"),
            Suffix::Field(name) => write!(f, ".{}", JsonValue::String(name.clone())),
            Suffix::Index(expr) => write!(f, "[{expr}]"),
            Suffix::Iterate => write!(f, "[]"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Identity => write!(f, "."),
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Postfix(base, suffixes) => {
                // `.` followed by a field prints as `.a`, not `..a`
                let mut rest = suffixes.as_slice();
                match (base.as_ref(), suffixes.first()) {
                    (Expr::Identity, Some(first @ Suffix::Field(_))) => {
                        write!(f, "{first}")?;
                        rest = &suffixes[1..];
                    }
                    (Expr::Identity, _) => write!(f, ".")?,
                    (base, _) => write!(f, "{base}")?,
                }
                for suffix in rest {
                    write!(f, "{suffix}")?;
                }
                Ok(())
            }
            Expr::Array(None) => write!(f, "[]"),
            Expr::Array(Some(inner)) => write!(f, "[{inner}]"),
            Expr::Object(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {value}", JsonValue::String(key.clone()))?;
                }
                write!(f, "}}")
            }
            Expr::Call { name, args } if args.is_empty() => write!(f, "{name}"),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Pipe(lhs, rhs) => write!(f, "{lhs} | {rhs}"),
            Expr::Comma(lhs, rhs) => write!(f, "{lhs}, {rhs}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Assign { op, target, value } => {
                write!(f, "({target}) {} {value}", op.symbol())
            }
        }
    }
}
