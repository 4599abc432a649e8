//! Rendering of parametrized documents into chart template files

use std::collections::BTreeMap;

use chartwright_core::manifest::{Document, document_kind};
use chartwright_engine::{describe, unquote_placeholders};

use crate::error::{ChartError, Result};

const DOCUMENT_SEPARATOR: &str = "\n---\n";

/// File name of the template that holds every document of `kind`
pub fn template_file_name(kind: &str) -> String {
    format!("{}.yaml", kind.to_lowercase())
}

/// Group documents into one template file per kind
///
/// Documents keep their input order inside a file. Quotes that YAML
/// serialization put around `{{ ... }}` placeholders are removed so the
/// placeholders become template actions.
pub fn render_templates(documents: &[Document]) -> Result<BTreeMap<String, String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (index, doc) in documents.iter().enumerate() {
        let Some(kind) = document_kind(doc) else {
            return Err(ChartError::MissingKind {
                index,
                document: describe(doc),
            });
        };

        let yaml = serde_yaml::to_string(doc)?;
        let body = unquote_placeholders(yaml.trim_end());
        grouped.entry(template_file_name(kind)).or_default().push(body);
    }

    let templates = grouped
        .into_iter()
        .map(|(name, bodies)| {
            let mut content = bodies.join(DOCUMENT_SEPARATOR);
            content.push('\n');
            (name, content)
        })
        .collect::<BTreeMap<_, _>>();

    tracing::debug!(
        documents = documents.len(),
        files = templates.len(),
        "rendered templates"
    );
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_groups_documents_by_kind() {
        let docs = vec![
            doc(json!({"apiVersion": "v1", "kind": "ServiceAccount", "metadata": {"name": "a"}})),
            doc(json!({"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "d"}})),
            doc(json!({"apiVersion": "v1", "kind": "ServiceAccount", "metadata": {"name": "b"}})),
        ];

        let templates = render_templates(&docs).unwrap();

        assert_eq!(
            templates.keys().collect::<Vec<_>>(),
            vec!["deployment.yaml", "serviceaccount.yaml"]
        );
        insta::assert_snapshot!(templates["serviceaccount.yaml"], @r"
        apiVersion: v1
        kind: ServiceAccount
        metadata:
          name: a
        ---
        apiVersion: v1
        kind: ServiceAccount
        metadata:
          name: b
        ");
    }

    #[test]
    fn test_placeholders_are_unquoted() {
        let docs = vec![doc(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "cfg", "namespace": "{{ .Release.Namespace }}"},
            "data": {"mode": "{{ .Values.mode }}"}
        }))];

        let templates = render_templates(&docs).unwrap();
        let content = &templates["configmap.yaml"];

        assert!(content.contains("namespace: {{ .Release.Namespace }}\n"));
        assert!(content.contains("mode: {{ .Values.mode }}\n"));
        assert!(!content.contains("'{{"));
    }

    #[test]
    fn test_missing_kind_is_rejected() {
        let docs = vec![
            doc(json!({"kind": "Service", "metadata": {"name": "svc"}})),
            doc(json!({"metadata": {"name": "orphan"}})),
        ];

        let err = render_templates(&docs).unwrap_err();
        assert!(matches!(err, ChartError::MissingKind { index: 1, .. }));
    }

    #[test]
    fn test_empty_input_renders_nothing() {
        assert!(render_templates(&[]).unwrap().is_empty());
    }
}
