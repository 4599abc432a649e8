//! Kubernetes manifest documents and the per-release document set

use semver::Version;
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};
use crate::values::Values;

/// A single Kubernetes resource, as an ordered mapping
pub type Document = serde_json::Map<String, JsonValue>;

/// Key that identifies the resource type of a document
pub const KIND_KEY: &str = "kind";

/// Kind prefix shared by schema-definition resources
pub const CRD_KIND_PREFIX: &str = "CustomResourceDefinition";

/// The `kind` of a document, if it carries a string one
pub fn document_kind(doc: &Document) -> Option<&str> {
    doc.get(KIND_KEY).and_then(JsonValue::as_str)
}

/// `metadata.name` of a document, if present
pub fn document_name(doc: &Document) -> Option<&str> {
    doc.get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(JsonValue::as_str)
}

/// Check whether a document is a CustomResourceDefinition
pub fn is_crd(doc: &Document) -> bool {
    document_kind(doc).is_some_and(|kind| kind.starts_with(CRD_KIND_PREFIX))
}

/// Parse a multi-document YAML stream into documents
///
/// Empty documents (`---` separators with nothing between them, comment-only
/// blocks) are skipped. A document that is not a mapping is rejected.
pub fn parse_documents(asset: &str, data: &[u8]) -> Result<Vec<Document>> {
    let mut documents = Vec::new();

    for (idx, de) in serde_yaml::Deserializer::from_slice(data).enumerate() {
        let value = <JsonValue as serde::Deserialize>::deserialize(de).map_err(|e| {
            CoreError::InvalidAsset {
                asset: asset.to_string(),
                message: format!("document {idx}: {e}"),
            }
        })?;

        match value {
            JsonValue::Null => continue,
            JsonValue::Object(map) => documents.push(map),
            other => {
                return Err(CoreError::InvalidAsset {
                    asset: asset.to_string(),
                    message: format!("document {idx} is not a mapping: {other}"),
                });
            }
        }
    }

    tracing::debug!(asset, documents = documents.len(), "parsed manifest asset");
    Ok(documents)
}

/// All documents of one upstream release plus the state needed to turn them into charts
#[derive(Debug, Clone)]
pub struct ManifestSet {
    /// CustomResourceDefinition documents
    pub crds: Vec<Document>,
    /// Every other document
    pub manifests: Vec<Document>,
    /// Resolved chart version
    pub version: Version,
    /// Upstream release tag
    pub app_version: String,
    /// Overlay for the primary chart
    pub values: Values,
    /// Overlay for the CRD chart
    pub crd_values: Values,
}

impl ManifestSet {
    /// Parse the given assets, in order, and partition the documents by the CRD kind prefix
    pub fn new(
        assets: &[(String, Vec<u8>)],
        version: Version,
        app_version: impl Into<String>,
        values: Values,
        crd_values: Values,
    ) -> Result<Self> {
        let mut crds = Vec::new();
        let mut manifests = Vec::new();

        for (name, data) in assets {
            for doc in parse_documents(name, data)? {
                if is_crd(&doc) {
                    crds.push(doc);
                } else {
                    manifests.push(doc);
                }
            }
        }

        tracing::debug!(
            manifests = manifests.len(),
            crds = crds.len(),
            "manifests extracted"
        );

        Ok(Self {
            crds,
            manifests,
            version,
            app_version: app_version.into(),
            values,
            crd_values,
        })
    }

    /// Whether the release ships any CRDs
    pub fn contains_crds(&self) -> bool {
        !self.crds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STREAM: &str = r#"
---
apiVersion: v1
kind: Namespace
metadata:
  name: kubevirt
---
# only a comment
---
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: kubevirts.kubevirt.io
---
apiVersion: v1
kind: ServiceAccount
metadata:
  name: kubevirt-operator
  namespace: kubevirt
"#;

    #[test]
    fn test_parse_documents_skips_empty() {
        let docs = parse_documents("operator.yaml", STREAM.as_bytes()).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(document_kind(&docs[0]), Some("Namespace"));
        assert_eq!(document_name(&docs[2]), Some("kubevirt-operator"));
    }

    #[test]
    fn test_parse_documents_preserves_key_order() {
        let docs = parse_documents("a.yaml", b"kind: A\nzeta: 1\nalpha: 2\n").unwrap();
        let keys: Vec<&str> = docs[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["kind", "zeta", "alpha"]);
    }

    #[test]
    fn test_parse_documents_rejects_scalars() {
        let err = parse_documents("bad.yaml", b"just a string\n").unwrap_err();
        assert!(matches!(err, CoreError::InvalidAsset { .. }));
    }

    #[test]
    fn test_manifest_set_partitions_crds() {
        let assets = vec![("operator.yaml".to_string(), STREAM.as_bytes().to_vec())];
        let set = ManifestSet::new(
            &assets,
            Version::new(0, 1, 0),
            "v1.3.0",
            Values::new(),
            Values::new(),
        )
        .unwrap();

        assert_eq!(set.manifests.len(), 2);
        assert_eq!(set.crds.len(), 1);
        assert!(set.contains_crds());
        assert_eq!(set.app_version, "v1.3.0");
    }

    #[test]
    fn test_is_crd_uses_prefix() {
        let crd = json!({"kind": "CustomResourceDefinitionList"});
        let other = json!({"kind": "Deployment"});
        let missing = json!({"metadata": {}});

        assert!(is_crd(crd.as_object().unwrap()));
        assert!(!is_crd(other.as_object().unwrap()));
        assert!(!is_crd(missing.as_object().unwrap()));
    }
}
