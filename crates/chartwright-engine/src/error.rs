//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Syntax error in a path expression, pointing into the expression text
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("invalid expression: {message}")]
#[diagnostic(code(chartwright::expr::syntax))]
pub struct SyntaxError {
    pub message: String,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("here")]
    pub span: Option<SourceSpan>,
}

/// Errors raised while parsing or evaluating a path expression
#[derive(Error, Debug, Diagnostic)]
pub enum ExprError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("{message}")]
    #[diagnostic(code(chartwright::expr::eval))]
    Eval { message: String },

    #[error("unknown function: {name}/{arity}")]
    #[diagnostic(
        code(chartwright::expr::unknown_function),
        help("supported: select, del, has, length, keys, not, test, startswith, endswith, map, empty")
    )]
    UnknownFunction { name: String, arity: usize },
}

impl ExprError {
    pub(crate) fn eval(message: impl Into<String>) -> Self {
        ExprError::Eval {
            message: message.into(),
        }
    }
}

/// Errors raised by the rule engine
#[derive(Error, Debug, Diagnostic)]
pub enum RuleError {
    #[error("invalid {field} pattern '{pattern}'")]
    #[diagnostic(code(chartwright::rule::pattern))]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{expression}' does not parse")]
    #[diagnostic(code(chartwright::rule::expression))]
    InvalidExpression {
        expression: String,
        #[source]
        #[diagnostic_source]
        source: ExprError,
    },

    #[error("no value path found in '{expression}'")]
    #[diagnostic(
        code(chartwright::rule::no_value_path),
        help("a rule with valuesSelector needs one .Values.<path> placeholder per selector")
    )]
    NoValuePath { expression: String },

    #[error("rule '{expression}' declares {selectors} selector(s) but {placeholders} placeholder(s)")]
    #[diagnostic(code(chartwright::rule::selector_mismatch))]
    SelectorMismatch {
        expression: String,
        selectors: usize,
        placeholders: usize,
    },

    #[error("selector '{selector}' matched {found} nodes in {document}, not exactly one element")]
    #[diagnostic(code(chartwright::rule::cardinality))]
    Cardinality {
        selector: String,
        found: usize,
        document: String,
    },

    #[error("'{expression}' produced {outputs} result(s) for {document}, expected exactly one mapping")]
    #[diagnostic(code(chartwright::rule::result))]
    NotADocument {
        expression: String,
        outputs: usize,
        document: String,
    },

    #[error("'{expression}' failed on {document}")]
    #[diagnostic(code(chartwright::rule::evaluation))]
    Evaluation {
        expression: String,
        document: String,
        #[source]
        #[diagnostic_source]
        source: ExprError,
    },
}

pub type Result<T> = std::result::Result<T, RuleError>;
