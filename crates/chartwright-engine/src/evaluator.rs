//! The seam between the rule engine and the path expression language

use serde_json::Value as JsonValue;

use crate::error::ExprError;
use crate::{eval, parser};

/// Evaluates path expressions against a single document
///
/// The rule engine only relies on this contract, so a different expression
/// language can be plugged in without touching rule orchestration.
pub trait Evaluator: Send + Sync {
    /// Reject an expression that can never evaluate, before any document is seen
    fn check(&self, expression: &str) -> Result<(), ExprError> {
        let _ = expression;
        Ok(())
    }

    /// Every output of `expression` applied to `document`
    fn evaluate(&self, expression: &str, document: &JsonValue)
    -> Result<Vec<JsonValue>, ExprError>;
}

/// Evaluator for the built-in jq/yq compatible language
#[derive(Debug, Clone, Copy, Default)]
pub struct YqEvaluator;

impl Evaluator for YqEvaluator {
    fn check(&self, expression: &str) -> Result<(), ExprError> {
        parser::parse(expression).map(|_| ())
    }

    fn evaluate(
        &self,
        expression: &str,
        document: &JsonValue,
    ) -> Result<Vec<JsonValue>, ExprError> {
        let expr = parser::parse(expression)?;
        eval::evaluate(&expr, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_reports_syntax_errors() {
        assert!(YqEvaluator.check(".metadata.name").is_ok());
        assert!(YqEvaluator.check(".metadata[").is_err());
    }

    #[test]
    fn test_evaluate_returns_all_outputs() {
        let doc = json!({"spec": {"ports": [{"port": 80}, {"port": 443}]}});
        let out = YqEvaluator.evaluate(".spec.ports[].port", &doc).unwrap();
        assert_eq!(out, vec![json!(80), json!(443)]);
    }
}
