//! Rule engine behavior against the shared KubeVirt/CDI manifest fixtures

use std::path::PathBuf;

use chartwright_core::manifest::{Document, document_kind, document_name};
use chartwright_core::{ManifestSet, Rule, Values};
use chartwright_engine::Modifier;
use semver::Version;
use serde_json::json;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures/manifests"))
}

fn load_fixture_set() -> ManifestSet {
    let mut files: Vec<PathBuf> = std::fs::read_dir(fixtures_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();

    let assets: Vec<(String, Vec<u8>)> = files
        .into_iter()
        .map(|p| {
            let name = p.file_name().unwrap().to_string_lossy().to_string();
            (name, std::fs::read(&p).unwrap())
        })
        .collect();

    ManifestSet::new(
        &assets,
        Version::new(0, 0, 1),
        "0.0.1",
        Values::new(),
        Values::new(),
    )
    .unwrap()
}

fn namespace_rule() -> Rule {
    Rule::new(r#".metadata.namespace |= "{{ .Release.Namespace }}""#)
}

fn find<'a>(docs: &'a [Document], kind: &str, name: &str) -> &'a Document {
    docs.iter()
        .find(|d| document_kind(d) == Some(kind) && document_name(d) == Some(name))
        .unwrap_or_else(|| panic!("{kind}/{name} not in fixtures"))
}

#[test]
fn fixture_assets_partition_into_manifests_and_crds() {
    let set = load_fixture_set();
    assert_eq!(set.manifests.len(), 18);
    assert_eq!(set.crds.len(), 2);
}

#[test]
fn no_rules_extract_nothing() {
    let set = load_fixture_set();
    let before = set.manifests.clone();

    let out = Modifier::new().parametrize(set, &[]).unwrap();

    assert_eq!(out.manifests, before);
    assert!(out.values.is_empty());
    assert!(out.crd_values.is_empty());
}

#[test]
fn namespace_rule_touches_every_manifest_without_values() {
    let modifier = Modifier::new();
    let rules = modifier.compile(&[namespace_rule()]).unwrap();

    let out = modifier.parametrize(load_fixture_set(), &rules).unwrap();

    assert!(out.values.is_empty());
    for doc in &out.manifests {
        assert_eq!(doc["metadata"]["namespace"], json!("{{ .Release.Namespace }}"));
    }
}

#[test]
fn kubevirt_configuration_moves_into_values() {
    let modifier = Modifier::new();
    let rules = modifier
        .compile(&[
            namespace_rule(),
            Rule::new(r#".spec.configuration |= "{{ .Values.kubevirt.configuration }}""#)
                .with_selectors([".spec.configuration"])
                .for_kind("KubeVirt"),
            Rule::new(
                r#".spec.customizeComponents |= "{{ .Values.kubevirt.customizeComponents }}""#,
            )
            .with_selectors([".spec.customizeComponents"])
            .for_kind("KubeVirt"),
        ])
        .unwrap();

    let out = modifier.parametrize(load_fixture_set(), &rules).unwrap();

    assert_eq!(
        out.values.0,
        json!({
            "kubevirt": {
                "configuration": {"developerConfiguration": {"featureGates": []}},
                "customizeComponents": {}
            }
        })
    );

    let cr = find(&out.manifests, "KubeVirt", "kubevirt");
    assert_eq!(cr["spec"]["configuration"], json!("{{ .Values.kubevirt.configuration }}"));
    assert_eq!(
        cr["spec"]["customizeComponents"],
        json!("{{ .Values.kubevirt.customizeComponents }}")
    );
    assert_eq!(cr["spec"]["imagePullPolicy"], json!("IfNotPresent"));
}

#[test]
fn rolebinding_subject_namespace_follows_release() {
    let modifier = Modifier::new();
    let rules = modifier
        .compile(&[
            namespace_rule(),
            Rule::new(
                r#"(.subjects[] | select(.name == "kubevirt-operator") .namespace) = "{{ .Release.Namespace }}""#,
            )
            .for_kind("RoleBinding"),
        ])
        .unwrap();

    let out = modifier.parametrize(load_fixture_set(), &rules).unwrap();
    let binding = find(&out.manifests, "RoleBinding", "kubevirt-operator-rolebinding");

    assert_eq!(binding["metadata"]["namespace"], json!("{{ .Release.Namespace }}"));
    assert_eq!(
        binding["subjects"],
        json!([
            {"kind": "ServiceAccount", "name": "kubevirt-operator", "namespace": "{{ .Release.Namespace }}"},
            {"kind": "ServiceAccount", "name": "prometheus-k8s", "namespace": "monitoring"}
        ])
    );

    // the cluster-scoped binding is a ClusterRoleBinding, which the kind regex also matches
    let cluster = find(&out.manifests, "ClusterRoleBinding", "kubevirt-operator");
    assert_eq!(
        cluster["subjects"][0]["namespace"],
        json!("{{ .Release.Namespace }}")
    );
}

#[test]
fn dropped_kinds_never_reach_rules() {
    let modifier = Modifier::new();
    let set = modifier.filter(load_fixture_set(), &["namespace".into(), "PriorityClass".into()]);

    assert_eq!(set.manifests.len(), 15);
    assert!(
        set.manifests
            .iter()
            .all(|d| !matches!(document_kind(d), Some("Namespace" | "PriorityClass")))
    );
}
