//! Rule application: kind gating, value extraction and document rewriting

use regex::Regex;
use serde_json::Value as JsonValue;

use chartwright_core::manifest::{Document, ManifestSet, document_kind, document_name};
use chartwright_core::{Rule, Values};

use crate::error::{Result, RuleError};
use crate::evaluator::{Evaluator, YqEvaluator};
use crate::placeholder::value_paths;

/// A rule whose patterns and expression were validated up front
#[derive(Debug, Clone)]
pub struct CompiledRule {
    expression: String,
    kind: Option<Regex>,
    reject: Option<Regex>,
    /// Selector paired with the value path its subtree is stored under
    selectors: Vec<(String, Vec<String>)>,
}

impl CompiledRule {
    /// Source expression
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether this rule runs for a document of the given kind
    ///
    /// A document without a kind never matches a kind pattern and is never rejected.
    pub fn applies_to(&self, kind: Option<&str>) -> bool {
        if let Some(pattern) = &self.kind {
            match kind {
                Some(kind) if pattern.is_match(kind) => {}
                _ => return false,
            }
        }
        match (&self.reject, kind) {
            (Some(pattern), Some(kind)) => !pattern.is_match(kind),
            _ => true,
        }
    }
}

fn compile_pattern(field: &'static str, pattern: Option<&str>) -> Result<Option<Regex>> {
    match pattern.filter(|p| !p.is_empty()) {
        None => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|source| RuleError::InvalidPattern {
                field,
                pattern: p.to_string(),
                source,
            }),
    }
}

/// Short human description of a document for error messages
pub fn describe(doc: &Document) -> String {
    match (document_kind(doc), document_name(doc)) {
        (Some(kind), Some(name)) => format!("{kind}/{name}"),
        (Some(kind), None) => kind.to_string(),
        (None, Some(name)) => format!("<no kind>/{name}"),
        (None, None) => "<no kind>".to_string(),
    }
}

/// Applies rewrite rules to manifests
///
/// A modifier holds no state between documents; one is built per release.
#[derive(Debug, Clone, Default)]
pub struct Modifier<E = YqEvaluator> {
    evaluator: E,
}

impl Modifier<YqEvaluator> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: Evaluator> Modifier<E> {
    /// Use a different expression language
    pub fn with_evaluator(evaluator: E) -> Self {
        Self { evaluator }
    }

    /// Validate rules: kind patterns, expression syntax and selector/placeholder pairing
    pub fn compile(&self, rules: &[Rule]) -> Result<Vec<CompiledRule>> {
        rules.iter().map(|rule| self.compile_rule(rule)).collect()
    }

    fn compile_rule(&self, rule: &Rule) -> Result<CompiledRule> {
        let kind = compile_pattern("kind", rule.kind.as_deref())?;
        let reject = compile_pattern("reject", rule.reject.as_deref())?;

        self.evaluator
            .check(&rule.expression)
            .map_err(|source| RuleError::InvalidExpression {
                expression: rule.expression.clone(),
                source,
            })?;
        for selector in &rule.values_selector {
            self.evaluator
                .check(selector)
                .map_err(|source| RuleError::InvalidExpression {
                    expression: selector.clone(),
                    source,
                })?;
        }

        let selectors = if rule.values_selector.is_empty() {
            Vec::new()
        } else {
            let paths = value_paths(&rule.expression);
            if paths.is_empty() {
                return Err(RuleError::NoValuePath {
                    expression: rule.expression.clone(),
                });
            }
            if paths.len() != rule.values_selector.len() {
                return Err(RuleError::SelectorMismatch {
                    expression: rule.expression.clone(),
                    selectors: rule.values_selector.len(),
                    placeholders: paths.len(),
                });
            }
            rule.values_selector.iter().cloned().zip(paths).collect()
        };

        Ok(CompiledRule {
            expression: rule.expression.clone(),
            kind,
            reject,
            selectors,
        })
    }

    /// Run every applicable rule over one document
    ///
    /// Returns the rewritten document and the values extracted from it.
    pub fn apply_rules(
        &self,
        document: &Document,
        rules: &[CompiledRule],
    ) -> Result<(Document, Values)> {
        let mut current = document.clone();
        let mut extracted = Values::new();

        for rule in rules {
            if !rule.applies_to(document_kind(&current)) {
                continue;
            }

            let input = JsonValue::Object(current);

            for (selector, path) in &rule.selectors {
                let mut found = self.run(selector, &input)?;
                if found.len() != 1 {
                    return Err(RuleError::Cardinality {
                        selector: selector.clone(),
                        found: found.len(),
                        document: describe_value(&input),
                    });
                }
                let fragment = match found.remove(0) {
                    JsonValue::Null => Values::new(),
                    value => Values::nested(path, value),
                };
                extracted.merge(&fragment);
            }

            let mut outputs = self.run(&rule.expression, &input)?;
            current = match (outputs.len(), outputs.pop()) {
                (1, Some(JsonValue::Object(doc))) => doc,
                (count, _) => {
                    return Err(RuleError::NotADocument {
                        expression: rule.expression.clone(),
                        outputs: count,
                        document: describe_value(&input),
                    });
                }
            };
        }

        Ok((current, extracted))
    }

    fn run(&self, expression: &str, input: &JsonValue) -> Result<Vec<JsonValue>> {
        self.evaluator
            .evaluate(expression, input)
            .map_err(|source| RuleError::Evaluation {
                expression: expression.to_string(),
                document: describe_value(input),
                source,
            })
    }

    /// Apply rules to every manifest and CRD of a release
    ///
    /// Extracted values are merged over the release's seeded values, manifests
    /// into `values` and CRDs into `crd_values`. The first failure aborts.
    pub fn parametrize(&self, set: ManifestSet, rules: &[CompiledRule]) -> Result<ManifestSet> {
        let ManifestSet {
            crds,
            manifests,
            version,
            app_version,
            mut values,
            mut crd_values,
        } = set;

        let manifests = self.rewrite_all(&manifests, rules, &mut values)?;
        let crds = self.rewrite_all(&crds, rules, &mut crd_values)?;

        Ok(ManifestSet {
            crds,
            manifests,
            version,
            app_version,
            values,
            crd_values,
        })
    }

    fn rewrite_all(
        &self,
        documents: &[Document],
        rules: &[CompiledRule],
        values: &mut Values,
    ) -> Result<Vec<Document>> {
        let mut rewritten = Vec::with_capacity(documents.len());
        for doc in documents {
            let (doc, extracted) = self.apply_rules(doc, rules)?;
            tracing::trace!(document = %describe(&doc), "rules applied");
            values.merge(&extracted);
            rewritten.push(doc);
        }
        Ok(rewritten)
    }

    /// Drop manifests whose kind is excluded (case-insensitive); CRDs are kept
    pub fn filter(&self, mut set: ManifestSet, drop: &[String]) -> ManifestSet {
        if drop.is_empty() {
            return set;
        }

        let before = set.manifests.len();
        set.manifests.retain(|doc| {
            !document_kind(doc).is_some_and(|kind| drop.iter().any(|d| d.eq_ignore_ascii_case(kind)))
        });
        tracing::debug!(
            dropped = before - set.manifests.len(),
            kept = set.manifests.len(),
            "filtered manifests by kind"
        );
        set
    }
}

fn describe_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Object(doc) => describe(doc),
        other => other.to_string(),
    }
}
