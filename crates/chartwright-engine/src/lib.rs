//! Chartwright Engine - Manifest rewriting
//!
//! This crate turns raw upstream manifests into chart-ready documents:
//! - A jq/yq compatible path expression language (`parser`, `eval`)
//! - The `Evaluator` seam the rule engine evaluates through
//! - `Modifier`: kind gating, value extraction into placeholders, rewriting
//! - Placeholder helpers shared with chart synthesis

pub mod ast;
pub mod error;
pub mod eval;
pub mod evaluator;
pub mod modifier;
pub mod parser;
pub mod placeholder;

pub use error::{ExprError, RuleError, SyntaxError};
pub use evaluator::{Evaluator, YqEvaluator};
pub use modifier::{CompiledRule, Modifier, describe};
pub use placeholder::{unquote_placeholders, value_paths};
