//! Release descriptors: which upstream release to track and how to rewrite it

use serde::{Deserialize, Serialize};

use crate::values::Values;

/// Suffix appended to a chart name for its CRD sibling chart
pub const CRD_CHART_SUFFIX: &str = "-crds";

/// One rewrite rule applied to every document of a release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Path expression producing the rewritten document
    pub expression: String,

    /// Paths whose subtrees move into values, paired in order with the
    /// `{{ .Values.* }}` placeholders of `expression`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_selector: Vec<String>,

    /// Only apply to documents whose kind matches this regex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Never apply to documents whose kind matches this regex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject: Option<String>,
}

impl Rule {
    /// A plain rewrite applying to every kind
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Default::default()
        }
    }

    /// Builder: extract these selectors into values
    #[must_use]
    pub fn with_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values_selector = selectors.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: restrict to kinds matching `pattern`
    #[must_use]
    pub fn for_kind(mut self, pattern: impl Into<String>) -> Self {
        self.kind = Some(pattern.into());
        self
    }

    /// Builder: skip kinds matching `pattern`
    #[must_use]
    pub fn rejecting(mut self, pattern: impl Into<String>) -> Self {
        self.reject = Some(pattern.into());
        self
    }
}

/// An upstream GitHub release turned into a chart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDescriptor {
    /// GitHub owner of the upstream project
    pub owner: String,

    /// GitHub repository of the upstream project
    pub repo: String,

    /// Release assets holding the manifests, in the order they are parsed
    #[serde(default)]
    pub assets: Vec<String>,

    /// Name of the generated chart
    pub chart_name: String,

    /// Kinds dropped before any rule runs (case-insensitive)
    #[serde(default)]
    pub drop: Vec<String>,

    /// Rewrite rules, in application order
    #[serde(default)]
    pub modifications: Vec<Rule>,

    /// Values seeded into the primary chart
    #[serde(default)]
    pub add_values: Values,

    /// Values seeded into the CRD chart
    #[serde(default)]
    pub add_crd_values: Values,
}

impl ReleaseDescriptor {
    /// Name of the sibling chart that carries the CRDs
    pub fn crd_chart_name(&self) -> String {
        format!("{}{}", self.chart_name, CRD_CHART_SUFFIX)
    }

    /// `owner/repo`, for logs
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_deserialize() {
        let yaml = r#"
owner: kubevirt
repo: kubevirt
chartName: kubevirt
assets: [kubevirt-operator.yaml, kubevirt-cr.yaml]
drop: [Namespace]
modifications:
  - expression: '.spec.configuration = "{{ .Values.kubevirt.configuration }}"'
    valuesSelector: [.spec.configuration]
    kind: ^KubeVirt$
addValues:
  monitorNamespace: monitoring
"#;
        let release: ReleaseDescriptor = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(release.slug(), "kubevirt/kubevirt");
        assert_eq!(release.crd_chart_name(), "kubevirt-crds");
        assert_eq!(release.modifications.len(), 1);
        assert_eq!(release.modifications[0].kind.as_deref(), Some("^KubeVirt$"));
        assert_eq!(release.modifications[0].values_selector, vec![".spec.configuration"]);
        assert_eq!(release.add_values.get("monitorNamespace").unwrap(), "monitoring");
        assert!(release.add_crd_values.is_empty());
    }
}
