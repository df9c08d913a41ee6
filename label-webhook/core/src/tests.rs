use super::*;
use serde_json::{json, Value};

fn pod(labels: Value, annotations: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": "web-0",
            "namespace": "default",
            "labels": labels,
            "annotations": annotations,
        },
        "spec": {
            "containers": [{ "name": "web", "image": "nginx" }],
        },
    }))
    .unwrap()
}

fn deployment(template_labels: Value, annotations: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": "web",
            "namespace": "default",
            "annotations": annotations,
        },
        "spec": {
            "selector": { "matchLabels": { "app": "web" } },
            "template": {
                "metadata": { "labels": template_labels },
                "spec": {
                    "containers": [{ "name": "web", "image": "nginx" }],
                },
            },
        },
    }))
    .unwrap()
}

fn annotation_patch() -> Value {
    json!([{ "op": "add", "path": "/metadata/annotations", "value": { "mutated": "true" } }])
}

fn patch_json(verdict: &Verdict) -> Option<Value> {
    verdict
        .as_patch()
        .map(|p| serde_json::to_value(p).expect("patch must serialize"))
}

#[test]
fn pod_with_matching_label_is_patched() {
    let engine = Engine::default();
    let verdict = engine.evaluate("Pod", &pod(json!({ "team": "ops" }), json!(null)));
    assert!(verdict.is_allowed());
    assert_eq!(patch_json(&verdict), Some(annotation_patch()));
}

#[test]
fn missing_label_is_allowed() {
    let engine = Engine::default();

    let verdict = engine.evaluate("Pod", &pod(json!({ "app": "web" }), json!(null)));
    assert_eq!(patch_json(&verdict), Some(annotation_patch()));

    let verdict = engine.evaluate("Pod", &pod(json!(null), json!(null)));
    assert_eq!(patch_json(&verdict), Some(annotation_patch()));

    let verdict = engine.evaluate("Deployment", &deployment(json!({ "app": "web" }), json!(null)));
    assert_eq!(patch_json(&verdict), Some(annotation_patch()));
}

#[test]
fn deployment_with_unwanted_label_is_denied() {
    let engine = Engine::default();
    let verdict = engine.evaluate(
        "Deployment",
        &deployment(json!({ "app": "web", "team": "finance" }), json!(null)),
    );
    assert_eq!(
        verdict,
        Verdict::Denied {
            reason: "Deployment contains an unwanted label".to_string()
        }
    );
    assert!(verdict.as_patch().is_none());
}

#[test]
fn pod_with_unwanted_label_is_denied() {
    let engine = Engine::default();
    let verdict = engine.evaluate("Pod", &pod(json!({ "team": "dev" }), json!(null)));
    assert_eq!(verdict.reason(), Some("Pod contains an unwanted label"));
}

#[test]
fn deployment_object_labels_are_ignored() {
    let engine = Engine::default();
    let raw = serde_json::to_vec(&json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": "web", "labels": { "team": "finance" } },
        "spec": {
            "selector": {},
            "template": { "metadata": { "labels": { "team": "ops" } } },
        },
    }))
    .unwrap();
    assert!(engine.evaluate("Deployment", &raw).is_allowed());
}

#[test]
fn already_mutated_pod_is_not_patched() {
    let engine = Engine::default();
    let raw = pod(json!({ "team": "ops" }), json!({ "mutated": "true" }));
    assert_eq!(engine.evaluate("Pod", &raw), Verdict::Allowed { patch: None });
}

#[test]
fn already_mutated_deployment_is_not_patched() {
    let engine = Engine::default();
    let raw = deployment(json!({ "team": "ops" }), json!({ "mutated": "true" }));
    assert_eq!(engine.evaluate("Deployment", &raw), Verdict::allow());
}

#[test]
fn mutation_is_a_fixed_point() {
    let engine = Engine::default();
    let raw = pod(json!({ "team": "ops" }), json!({ "mutated": "true", "a": "b" }));
    for _ in 0..5 {
        assert_eq!(engine.evaluate("Pod", &raw), Verdict::allow());
    }
}

#[test]
fn policy_is_checked_before_mutation_state() {
    let engine = Engine::default();
    let raw = pod(json!({ "team": "dev" }), json!({ "mutated": "true" }));
    assert!(!engine.evaluate("Pod", &raw).is_allowed());
}

#[test]
fn malformed_pod_is_denied() {
    let engine = Engine::default();
    let verdict = engine.evaluate("Pod", b"not-json");
    let reason = verdict.reason().expect("malformed pods must be denied");
    assert!(reason.starts_with("failed to decode Pod: "), "{reason}");
    assert!(reason.contains("expected"), "{reason}");
}

#[test]
fn decode_failures_are_never_allowed() {
    let engine = Engine::default();
    for kind in ["Pod", "Deployment"] {
        let malformed: [&[u8]; 5] = [b"", b"{", b"[1, 2]", b"null", br#"{"apiVersion":"batch/v1"}"#];
        for raw in malformed {
            let verdict = engine.evaluate(kind, raw);
            assert!(
                !verdict.is_allowed(),
                "{kind} {} must be denied",
                String::from_utf8_lossy(raw)
            );
        }
    }
}

#[test]
fn unsupported_kinds_are_patched() {
    let engine = Engine::default();
    let raw = serde_json::to_vec(&json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": { "name": "cfg", "labels": { "team": "finance" } },
    }))
    .unwrap();
    let verdict = engine.evaluate("ConfigMap", &raw);
    assert_eq!(patch_json(&verdict), Some(annotation_patch()));
}

#[test]
fn unsupported_kinds_must_be_objects() {
    let engine = Engine::default();
    let verdict = engine.evaluate("ConfigMap", b"not-json");
    let reason = verdict.reason().expect("malformed objects must be denied");
    assert!(reason.starts_with("failed to decode ConfigMap: "), "{reason}");
}

#[test]
fn pod_labels_mode() {
    let engine = Engine::new(
        Decoders::default(),
        LabelPolicy::default(),
        PatchMode::PodLabels,
    );
    let verdict = engine.evaluate("Pod", &pod(json!({ "app": "web" }), json!(null)));
    assert_eq!(
        patch_json(&verdict),
        Some(json!([
            { "op": "add", "path": "/metadata/labels", "value": { "team": "ops" } },
            { "op": "add", "path": "/metadata/annotations", "value": { "mutated": "true" } },
        ]))
    );

    let verdict = engine.evaluate("Deployment", &deployment(json!(null), json!(null)));
    assert_eq!(patch_json(&verdict), Some(annotation_patch()));
}

#[test]
fn custom_decoders() {
    let engine = Engine::new(
        Decoders::empty(),
        LabelPolicy::default(),
        PatchMode::default(),
    );
    // Without a decoder, labels are not inspected at all.
    let verdict = engine.evaluate("Pod", &pod(json!({ "team": "dev" }), json!(null)));
    assert_eq!(patch_json(&verdict), Some(annotation_patch()));
}

#[test]
fn review_echoes_uid() {
    let engine = Engine::default();
    let cases = [
        ReviewRequest::new("uid-0", "Pod", b"not-json".to_vec()),
        ReviewRequest::new("uid-1", "Pod", pod(json!({ "team": "ops" }), json!(null))),
        ReviewRequest::new(
            "uid-2",
            "Deployment",
            deployment(json!({ "team": "finance" }), json!(null)),
        ),
        ReviewRequest::new(
            "uid-3",
            "Pod",
            pod(json!({ "team": "ops" }), json!({ "mutated": "true" })),
        ),
    ];
    for req in cases {
        let rsp = engine.review(&req);
        assert_eq!(rsp.uid, req.uid);
        assert_eq!(rsp.verdict, engine.evaluate(&req.kind, &req.object));
    }
}

#[test]
fn engine_is_shareable() {
    fn assert_send_sync<T: Send + Sync + Clone + 'static>() {}
    assert_send_sync::<Engine>();
}
