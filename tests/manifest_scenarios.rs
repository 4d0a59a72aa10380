//! Manifest load/replace behaviour on realistic chart values files.

use pinsync::manifest::{self, ManifestDocument, ManifestError, ServiceEdit};
use pinsync::types::{service_map, SchemaVariant};

fn replace_one(yaml: &str, service: &str, version: &str) -> String {
    let mut doc = ManifestDocument::parse(yaml.as_bytes()).expect("manifest parses");
    doc.load().expect("manifest loads");
    doc.replace(&service_map([(service, version)]))
        .expect("replace succeeds");
    String::from_utf8(doc.content()).expect("utf-8 output")
}

#[test]
fn test_new_version() {
    let got = replace_one(
        "services:\n  applicantCommunicationApi:\n    serviceVersion: v1.0.6\n",
        "applicantCommunicationApi",
        "v1.0.7",
    );
    assert_eq!(
        got,
        "services:\n  applicantCommunicationApi:\n    serviceVersion: v1.0.7\n"
    );
}

#[test]
fn test_keep_comments() {
    let got = replace_one(
        "services:\t\n  # applicant-communication-api\n  applicantCommunicationApi:\n    serviceVersion: v1.0.6\n",
        "applicantCommunicationApi",
        "v1.0.7",
    );
    assert_eq!(
        got,
        "services:\n  # applicant-communication-api\n  applicantCommunicationApi:\n    serviceVersion: v1.0.7\n"
    );
}

#[test]
fn test_lower_version_does_update() {
    let got = replace_one(
        "services:\n  # applicant-communication-api\n  applicantCommunicationApi:\n    serviceVersion: v1.0.6\n",
        "applicantCommunicationApi",
        "v1.0.4",
    );
    assert_eq!(
        got,
        "services:\n  # applicant-communication-api\n  applicantCommunicationApi:\n    serviceVersion: v1.0.4\n"
    );
}

#[test]
fn test_service_not_found_is_appended() {
    let got = replace_one(
        "services:\n  # applicant-communication-api\n  applicantCommunicationApi:\n    serviceVersion: v1.0.6\n  # api\n  api:\n    serviceVersion: v1.0.4\n",
        "test",
        "v1.0.4",
    );
    assert_eq!(
        got,
        "services:\n  # applicant-communication-api\n  applicantCommunicationApi:\n    serviceVersion: v1.0.6\n  # api\n  api:\n    serviceVersion: v1.0.4\n  test:\n    serviceVersion: v1.0.4\n"
    );
}

#[test]
fn test_string_version_is_quoted() {
    let got = replace_one(
        "services:\n  # applicant-communication-api\n  applicantCommunicationApi:\n    serviceVersion: v1.0.6\n",
        "applicantCommunicationApi",
        "1234",
    );
    assert_eq!(
        got,
        "services:\n  # applicant-communication-api\n  applicantCommunicationApi:\n    serviceVersion: \"1234\"\n"
    );
}

#[test]
fn test_nested_entry_only_touches_tagged_container() {
    let yaml = "services:\n  application-api:\n    podspec:\n      containers:\n        fpm:\n          tag: v1.17.3\n        nginx:\n          env:\n            DIVIDO_NGINX_CLIENT_MAX_BODY_SIZE: 10m\n";
    let got = replace_one(yaml, "application-api", "1234");
    assert_eq!(
        got,
        "services:\n  application-api:\n    podspec:\n      containers:\n        fpm:\n          tag: \"1234\"\n        nginx:\n          env:\n            DIVIDO_NGINX_CLIENT_MAX_BODY_SIZE: 10m\n"
    );
}

#[test]
fn test_nested_container_list_keeps_siblings() {
    let yaml = "\
services:
  billing:
    podspec:
      containers:
        - name: sidecar
          image: envoy
        - name: app
          tag: v2.0.0 # pinned by release
          env:
            - name: MODE
              value: prod
";
    let services = manifest::load(yaml.as_bytes()).unwrap();
    assert_eq!(services["billing"].version, "v2.0.0");
    assert_eq!(services["billing"].schema, SchemaVariant::Nested);

    let got = replace_one(yaml, "billing", "v2.1.0");
    assert_eq!(got, yaml.replace("tag: v2.0.0", "tag: v2.1.0"));
}

#[test]
fn test_unchanged_versions_are_byte_identical() {
    let yaml = "\
# Chart values for the web platform
services:
  # edge
  gateway:
    serviceVersion: v3.1.0 # keep in sync with ingress
  application-api:
    podspec:
      containers:
        fpm:
          tag: v1.17.3
        nginx:
          env:
            BODY_SIZE: 10m

  notes:
    serviceVersion: '2024.1'
    description: |
      multi-line
        text kept as is
";
    let mut doc = ManifestDocument::parse(yaml.as_bytes()).unwrap();
    let current = doc.load().unwrap();
    let edits = doc.replace(&current).unwrap();
    assert!(edits.is_empty());
    assert_eq!(String::from_utf8(doc.content()).unwrap(), yaml);
}

#[test]
fn test_update_and_insert_report_edits() {
    let yaml = "services:\n  api:\n    serviceVersion: v1\n  web:\n    serviceVersion: v5\n";
    let (bytes, edits) = manifest::rewrite(
        yaml.as_bytes(),
        &service_map([("web", "v6"), ("api", "v1"), ("zeta", "v1"), ("alpha", "v2")]),
    )
    .unwrap();

    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "services:\n  api:\n    serviceVersion: v1\n  web:\n    serviceVersion: v6\n  alpha:\n    serviceVersion: v2\n  zeta:\n    serviceVersion: v1\n"
    );
    let touched: Vec<&str> = edits.iter().map(ServiceEdit::service).collect();
    assert_eq!(touched, vec!["web", "alpha", "zeta"]);
}

#[test]
fn test_root_mapping_without_services_key() {
    let yaml = "api:\n  serviceVersion: v1\nworker:\n  serviceVersion: v2\n";
    let got = replace_one(yaml, "worker", "v3");
    assert_eq!(got, "api:\n  serviceVersion: v1\nworker:\n  serviceVersion: v3\n");
}

#[test]
fn test_one_bad_entry_fails_whole_load() {
    let yaml = "services:\n  api:\n    serviceVersion: v1\n  broken:\n    replicas: 3\n";
    let err = manifest::load(yaml.as_bytes()).unwrap_err();
    assert!(matches!(err, ManifestError::Schema { ref service, .. } if service == "broken"));
}

#[test]
fn test_failed_replace_leaves_document_untouched() {
    let yaml = "services:\n  api:\n    serviceVersion: v1\n  broken:\n    replicas: 3\n";
    let mut doc = ManifestDocument::parse(yaml.as_bytes()).unwrap();
    let err = doc
        .replace(&service_map([("api", "v2"), ("broken", "v9"), ("new", "v1")]))
        .unwrap_err();
    assert_eq!(err.service(), Some("broken"));
    assert_eq!(String::from_utf8(doc.content()).unwrap(), yaml);
}

#[test]
fn test_invalid_documents_are_rejected() {
    for bad in ["", "   \n# only a comment\n", "- a\n- b\n", "a: 1\n---\nb: 2\n"] {
        let err = ManifestDocument::parse(bad.as_bytes()).unwrap_err();
        assert!(
            matches!(err, ManifestError::InvalidDocument(_)),
            "{bad:?} gave {err:?}"
        );
    }
}

#[test]
fn test_empty_flow_services_block() {
    assert!(manifest::load(b"services: {}\n").unwrap().is_empty());

    let got = replace_one("services: {}\n", "api", "v1");
    assert_eq!(got, "services:\n  api:\n    serviceVersion: v1\n");
    assert_eq!(manifest::load(got.as_bytes()).unwrap()["api"].version, "v1");
}

#[test]
fn test_tags_and_anchors_are_not_version_text() {
    let yaml = "\
services:
  api:
    serviceVersion: !!str 1234
  worker:
    serviceVersion: &shared v1.0.0
  cron:
    serviceVersion: *shared
";
    let services = manifest::load(yaml.as_bytes()).unwrap();
    assert_eq!(services["api"].version, "1234");
    assert_eq!(services["worker"].version, "v1.0.0");
    assert_eq!(services["cron"].version, "v1.0.0");
}

#[test]
fn test_replace_keeps_anchor_on_rewritten_pin() {
    let got = replace_one(
        "services:\n  worker:\n    serviceVersion: &shared v1.0.0\n",
        "worker",
        "v1.1.0",
    );
    assert_eq!(got, "services:\n  worker:\n    serviceVersion: &shared v1.1.0\n");
}

#[test]
fn test_unsupported_node_properties_are_rejected() {
    for bad in [
        "services:\n  api:\n    serviceVersion: *missing\n",
        "base: &base\n  serviceVersion: v1\n",
        "services:\n  api:\n    serviceVersion: !a !b v1\n",
    ] {
        let err = manifest::load(bad.as_bytes()).unwrap_err();
        assert!(
            matches!(err, ManifestError::InvalidDocument(_)),
            "{bad:?} gave {err:?}"
        );
    }
}

#[test]
fn test_wrapped_values_survive_a_rewrite() {
    let yaml = "\
services:
  api:
    serviceVersion: v1
    note: a long
      wrapped line
  worker:
    serviceVersion: v2
    description: \"kept
      as is\"
";
    let mut doc = ManifestDocument::parse(yaml.as_bytes()).unwrap();
    assert_eq!(doc.load().unwrap().len(), 2);
    assert_eq!(doc.content(), yaml.as_bytes());

    doc.replace(&service_map([("worker", "v3")])).unwrap();
    assert_eq!(
        String::from_utf8(doc.content()).unwrap(),
        yaml.replace("serviceVersion: v2", "serviceVersion: v3")
    );
}

#[test]
fn test_crlf_manifest_keeps_line_endings() {
    let yaml = "services:\r\n  # edge\r\n  api:\r\n    serviceVersion: v1\r\n";
    let (unchanged, edits) = manifest::rewrite(yaml.as_bytes(), &service_map([("api", "v1")])).unwrap();
    assert!(edits.is_empty());
    assert_eq!(unchanged, yaml.as_bytes());

    let (bumped, _) = manifest::rewrite(yaml.as_bytes(), &service_map([("api", "v2")])).unwrap();
    assert_eq!(
        String::from_utf8(bumped).unwrap(),
        "services:\r\n  # edge\r\n  api:\r\n    serviceVersion: v2\r\n"
    );
}
