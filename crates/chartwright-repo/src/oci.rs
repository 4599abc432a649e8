//! OCI registry publishing for packaged charts

use oci_distribution::Reference;
use oci_distribution::client::{Client, ClientConfig, ClientProtocol, Config, ImageLayer};
use oci_distribution::secrets::RegistryAuth;
use std::path::Path;

use chartwright_chart::read_chart_metadata;

use crate::error::{RepoError, Result};

const OCI_SCHEME: &str = "oci://";

/// Media types for Helm charts in OCI
pub mod media_types {
    /// Helm chart config
    pub const HELM_CONFIG: &str = "application/vnd.cncf.helm.config.v1+json";
    /// Helm chart content layer
    pub const HELM_CONTENT: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";
}

/// Full `oci://` reference a chart version is pushed to
///
/// When the remote already names the chart (`oci://ghcr.io/org/kubevirt`) the
/// version is appended as a tag, otherwise the chart name is appended first.
pub fn chart_reference(remote: &str, chart: &str, version: &str) -> Result<String> {
    if !remote.starts_with(OCI_SCHEME) {
        return Err(RepoError::InvalidOciReference {
            reference: format!("remote must start with {OCI_SCHEME}, got: {remote}"),
        });
    }

    let trimmed = remote.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or_default();
    if last == chart {
        Ok(format!("{trimmed}:{version}"))
    } else {
        Ok(format!("{trimmed}/{chart}:{version}"))
    }
}

/// Parse an `oci://` reference string
pub fn parse_reference(reference: &str) -> Result<Reference> {
    let clean = reference.trim_start_matches(OCI_SCHEME);
    Reference::try_from(clean).map_err(|e| RepoError::InvalidOciReference {
        reference: format!("{}: {}", reference, e),
    })
}

/// Pushes packaged charts, refusing to overwrite existing versions
pub struct ChartPublisher {
    client: Client,
    auth: RegistryAuth,
}

impl ChartPublisher {
    /// Publisher using basic credentials, or anonymous access
    pub fn new(credentials: Option<(String, String)>) -> Self {
        let auth = match credentials {
            Some((username, password)) => RegistryAuth::Basic(username, password),
            None => RegistryAuth::Anonymous,
        };
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };

        Self {
            client: Client::new(config),
            auth,
        }
    }

    /// Push `archive` under `remote`, returning the reference it was pushed to
    pub async fn publish(&self, archive: &Path, remote: &str) -> Result<String> {
        if !archive.is_file() {
            return Err(RepoError::OciPushFailed {
                message: format!("invalid packaged chart path: {}", archive.display()),
            });
        }

        let metadata = read_chart_metadata(archive)?;
        let target = chart_reference(remote, &metadata.name, &metadata.version)?;
        let reference = parse_reference(&target)?;

        if self.version_exists(&reference, &metadata.version).await? {
            return Err(RepoError::VersionExists {
                chart: metadata.name,
                version: metadata.version,
                reference: target,
            });
        }

        tracing::info!(
            chart = %metadata.name,
            version = %metadata.version,
            reference = %target,
            "pushing chart"
        );

        let config = Config {
            data: serde_json::to_vec(&metadata)?,
            media_type: media_types::HELM_CONFIG.to_string(),
            annotations: None,
        };
        let layers = vec![ImageLayer {
            data: std::fs::read(archive)?,
            media_type: media_types::HELM_CONTENT.to_string(),
            annotations: None,
        }];

        let result = self
            .client
            .push(&reference, &layers, config, &self.auth, None)
            .await
            .map_err(|e| RepoError::OciPushFailed {
                message: e.to_string(),
            })?;

        tracing::info!(manifest = %result.manifest_url, "pushed chart to {target}");
        Ok(target)
    }

    /// Whether `version` is already a tag of the reference's repository
    ///
    /// A repository that does not exist yet has no tags.
    async fn version_exists(&self, reference: &Reference, version: &str) -> Result<bool> {
        match self.client.list_tags(reference, &self.auth, None, None).await {
            Ok(response) => Ok(response.tags.iter().any(|t| t == version)),
            Err(e) => {
                let message = e.to_string();
                if is_missing_repository(&message) {
                    tracing::debug!(
                        repository = %reference.repository(),
                        "registry repository does not exist yet, will create on first push"
                    );
                    Ok(false)
                } else {
                    Err(RepoError::OciError {
                        message: format!("failed to fetch tags: {message}"),
                    })
                }
            }
        }
    }
}

fn is_missing_repository(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("404") || lower.contains("name unknown") || lower.contains("name_unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_reference_appends_chart_name() {
        assert_eq!(
            chart_reference("oci://ghcr.io/org/charts", "kubevirt", "1.3.0").unwrap(),
            "oci://ghcr.io/org/charts/kubevirt:1.3.0"
        );
        assert_eq!(
            chart_reference("oci://ghcr.io/org/charts/", "kubevirt", "1.3.0").unwrap(),
            "oci://ghcr.io/org/charts/kubevirt:1.3.0"
        );
    }

    #[test]
    fn test_chart_reference_uses_remote_named_after_chart() {
        assert_eq!(
            chart_reference("oci://ghcr.io/org/kubevirt", "kubevirt", "1.3.0").unwrap(),
            "oci://ghcr.io/org/kubevirt:1.3.0"
        );
    }

    #[test]
    fn test_chart_reference_requires_oci_scheme() {
        assert!(matches!(
            chart_reference("https://ghcr.io/org", "kubevirt", "1.3.0"),
            Err(RepoError::InvalidOciReference { .. })
        ));
    }

    #[test]
    fn test_parse_reference() {
        let reference = parse_reference("oci://ghcr.io/org/charts/kubevirt:1.3.0").unwrap();
        assert_eq!(reference.registry(), "ghcr.io");
        assert_eq!(reference.repository(), "org/charts/kubevirt");
        assert_eq!(reference.tag(), Some("1.3.0"));
    }

    #[test]
    fn test_missing_repository_detection() {
        assert!(is_missing_repository("Registry error: url https://x, envelope: NAME_UNKNOWN"));
        assert!(is_missing_repository("server responded with 404"));
        assert!(!is_missing_repository("unauthorized: authentication required"));
    }

    #[tokio::test]
    async fn test_publish_rejects_missing_archive() {
        let publisher = ChartPublisher::new(None);
        let err = publisher
            .publish(Path::new("/nonexistent/kubevirt-1.3.0.tgz"), "oci://ghcr.io/org")
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::OciPushFailed { .. }));
    }
}
