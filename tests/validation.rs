//! Pre-flight guarantees: invalid drafts never reach the network.

mod common;

use common::*;
use stability_rs::client::{ManualClock, PollOptions};
use stability_rs::validation::Constraint;
use stability_rs::{Attachment, ErrorKind, Registry, RequestDraft};
use std::sync::Arc;

fn image(w: u32, h: u32) -> Attachment {
    Attachment::new(vec![0u8; 64], "image/png").with_dimensions(w, h)
}

#[tokio::test]
async fn missing_required_field_makes_no_network_call() {
    for endpoint in ["stable-image-core", "sketch", "text-to-audio", "stable-fast-3d"] {
        let transport = ScriptedTransport::new(vec![]);
        let client = client(transport.clone(), Arc::new(ManualClock::new()));

        let err = client
            .generate(&RequestDraft::new(endpoint), PollOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed, "{}", endpoint);
        let descriptor = Registry::builtin().get(endpoint).unwrap();
        for spec in descriptor.params.iter().filter(|p| p.required) {
            assert!(
                err.violations()
                    .iter()
                    .any(|v| v.field == spec.name && v.constraint == Constraint::Missing),
                "{} should report missing '{}'",
                endpoint,
                spec.name
            );
        }
        assert_eq!(transport.calls(), 0);
    }
}

#[tokio::test]
async fn strength_without_image_is_a_dependency_error() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(transport.clone(), Arc::new(ManualClock::new()));
    let draft = RequestDraft::new("sd3.5")
        .text("prompt", "make it snow")
        .text("mode", "image-to-image")
        .float("strength", 0.7);

    let err = client.validate(&draft).unwrap_err();
    let image_violation = err
        .violations()
        .iter()
        .find(|v| v.field == "image")
        .expect("image violation");
    assert!(image_violation.constraint.is_dependency());
    assert!(err
        .violations()
        .iter()
        .any(|v| v.field == "strength" && v.constraint.is_dependency()));

    let err = client.generate(&draft, PollOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(transport.calls(), 0);
}

#[test]
fn aspect_ratio_bounds_are_inclusive() {
    let descriptor = Registry::builtin().get("sketch").unwrap();
    let draft = |img| {
        RequestDraft::new("sketch")
            .text("prompt", "a cat")
            .attachment("image", img)
    };

    let too_wide = stability_rs::validate(&descriptor, &draft(image(1536, 512))).unwrap_err();
    assert!(matches!(
        too_wide.violations()[0].constraint,
        Constraint::AspectRatio { .. }
    ));

    assert!(stability_rs::validate(&descriptor, &draft(image(1280, 512))).is_ok());
    assert!(stability_rs::validate(&descriptor, &draft(image(512, 1280))).is_ok());
    assert!(stability_rs::validate(&descriptor, &draft(image(500, 1251))).is_err());
}

#[test]
fn unknown_field_is_reported_with_other_violations() {
    let descriptor = Registry::builtin().get("stable-image-core").unwrap();
    let draft = RequestDraft::new("stable-image-core")
        .text("prompt", "x")
        .integer("seed", -1)
        .text("sampler", "euler");

    let err = stability_rs::validate(&descriptor, &draft).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownField);
    let fields: Vec<&str> = err.violations().iter().map(|v| v.field.as_str()).collect();
    assert_eq!(fields, vec!["sampler", "seed"]);
}

#[tokio::test]
async fn unknown_endpoint_is_rejected_before_io() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(transport.clone(), Arc::new(ManualClock::new()));
    let err = client
        .generate(&RequestDraft::new("stable-video"), PollOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownEndpoint);
    assert!(err.kind().is_pre_flight());
    assert_eq!(transport.calls(), 0);
}

#[test]
fn binary_and_text_are_never_coerced() {
    let descriptor = Registry::builtin().get("sketch").unwrap();
    let draft = RequestDraft::new("sketch")
        .text("prompt", "x")
        .text("image", "https://example.com/cat.png");
    let err = stability_rs::validate(&descriptor, &draft).unwrap_err();
    assert!(matches!(
        err.violations()[0].constraint,
        Constraint::TypeMismatch { .. }
    ));

    let draft = RequestDraft::new("sketch")
        .attachment("prompt", image(512, 512))
        .attachment("image", image(512, 512));
    let err = stability_rs::validate(&descriptor, &draft).unwrap_err();
    assert_eq!(err.violations()[0].field, "prompt");
}
