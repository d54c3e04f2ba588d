//! Sync submissions over HTTP.

use crate::integration::mock_server::MockServerFixture;
use base64::Engine;
use stability_rs::types::FinishReason;
use stability_rs::{
    Attachment, ErrorKind, PollOptions, RequestDraft, ResponseEncoding, Submission,
};

#[tokio::test]
async fn core_image_round_trip() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_artifact(
            "/v2beta/stable-image/generate/core",
            "image/png",
            b"\x89PNG fake",
        )
        .await;
    let client = fixture.create_test_client().unwrap();

    let draft = RequestDraft::new("stable-image-core")
        .text("prompt", "a lighthouse at dusk")
        .text("aspect_ratio", "16:9");
    let request = client.validate(&draft).unwrap();
    let (submission, stats) = client.submit_with_stats(&request).await.unwrap();

    mock.assert_async().await;
    let Submission::Complete(result) = submission else {
        panic!("sync endpoint must complete");
    };
    assert_eq!(&result.artifact[..], b"\x89PNG fake");
    assert_eq!(result.media_type, "image/png");
    assert_eq!(result.file_extension(), "png");
    assert_eq!(result.seed, Some(314));
    assert_eq!(result.finish_reason, Some(FinishReason::Success));
    assert_eq!(stats.http_status, 200);
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.endpoint, "/v2beta/stable-image/generate/core");
}

#[tokio::test]
async fn multipart_carries_declared_fields() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_multipart(
            "/v2beta/stable-image/control/sketch",
            &[
                "name=\"prompt\"",
                "castle on a hill",
                "name=\"image\"; filename=\"sketch.png\"",
                "sketch-bytes",
                "name=\"control_strength\"",
            ],
            b"img",
        )
        .await;
    let client = fixture.create_test_client().unwrap();
    let draft = RequestDraft::new("sketch")
        .text("prompt", "castle on a hill")
        .attachment(
            "image",
            Attachment::new(b"sketch-bytes".to_vec(), "image/png")
                .with_file_name("sketch.png")
                .with_dimensions(640, 640),
        );
    let result = client.generate(&draft, PollOptions::default()).await.unwrap();
    mock.assert_async().await;
    assert_eq!(&result.artifact[..], b"img");
}

#[tokio::test]
async fn identity_headers_are_sent() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/v2beta/stable-image/generate/ultra")
            .match_header("stability-client-id", "mock-suite")
            .match_header("stability-client-version", "0.0.1")
            .match_header("accept", "image/*")
            .with_status(200)
            .with_header("content-type", "image/webp")
            .with_body("w")
            .create_async()
            .await
    };
    let client = fixture.create_test_client().unwrap();
    let draft = RequestDraft::new("stable-image-ultra")
        .text("prompt", "x")
        .text("output_format", "webp");
    let result = client.generate(&draft, PollOptions::default()).await.unwrap();
    mock.assert_async().await;
    assert_eq!(result.file_extension(), "webp");
}

#[tokio::test]
async fn json_encoding_decodes_base64_artifact() {
    let fixture = MockServerFixture::new().await;
    let payload = base64::engine::general_purpose::STANDARD.encode(b"jpeg-bytes");
    let _mock = fixture
        .mock_json_response(
            "POST",
            "/v2beta/stable-image/generate/sd3",
            200,
            &format!(
                r#"{{"image":"{}","seed":77,"finish_reason":"CONTENT_FILTERED"}}"#,
                payload
            ),
        )
        .await;
    let client = fixture.create_client_with(ResponseEncoding::Json).unwrap();
    let draft = RequestDraft::new("sd3.5")
        .text("prompt", "x")
        .text("output_format", "jpeg");
    let result = client.generate(&draft, PollOptions::default()).await.unwrap();
    assert_eq!(&result.artifact[..], b"jpeg-bytes");
    assert_eq!(result.media_type, "image/jpeg");
    assert_eq!(result.seed, Some(77));
    assert!(result.is_filtered());
}

#[tokio::test]
async fn business_errors_are_classified_and_not_retried() {
    let cases: [(usize, &str, ErrorKind); 4] = [
        (401, r#"{"name":"unauthorized","errors":["bad key"]}"#, ErrorKind::AuthRejected),
        (402, r#"{"name":"payment_required","errors":["no credits"]}"#, ErrorKind::InsufficientCredits),
        (403, r#"{"name":"content_moderation","errors":["flagged"]}"#, ErrorKind::ContentRejected),
        (500, r#"{"name":"internal_error","errors":["boom"]}"#, ErrorKind::Unavailable),
    ];
    for (status, body, kind) in cases {
        let fixture = MockServerFixture::new().await;
        let mock = fixture
            .mock_error_response("/v2beta/stable-image/generate/core", status, body)
            .await;
        let client = fixture.create_test_client().unwrap();
        let draft = RequestDraft::new("stable-image-core").text("prompt", "x");

        let err = client
            .generate(&draft, PollOptions::default())
            .await
            .unwrap_err();
        mock.assert_async().await;
        assert_eq!(err.kind(), kind, "HTTP {}", status);
        let api = err.api().expect("api error");
        assert_eq!(api.status, Some(status as u16));
        assert!(api.provider_name.is_some());
    }
}

#[tokio::test]
async fn batch_preserves_input_order() {
    let fixture = MockServerFixture::new().await;
    let _core = fixture
        .mock_artifact("/v2beta/stable-image/generate/core", "image/png", b"core")
        .await;
    let _ultra = fixture
        .mock_artifact("/v2beta/stable-image/generate/ultra", "image/png", b"ultra")
        .await;
    let client = fixture.create_test_client().unwrap();

    let drafts = vec![
        RequestDraft::new("stable-image-ultra").text("prompt", "a"),
        RequestDraft::new("stable-image-core").text("prompt", "b"),
        RequestDraft::new("stable-image-core"),
        RequestDraft::new("stable-image-core").text("prompt", "c"),
    ];
    let results = client
        .generate_batch(drafts, Some(2), PollOptions::default())
        .await;

    assert_eq!(results.len(), 4);
    assert_eq!(&results[0].as_ref().unwrap().artifact[..], b"ultra");
    assert_eq!(&results[1].as_ref().unwrap().artifact[..], b"core");
    assert_eq!(
        results[2].as_ref().unwrap_err().kind(),
        ErrorKind::ValidationFailed
    );
    assert_eq!(&results[3].as_ref().unwrap().artifact[..], b"core");
}

#[tokio::test]
async fn unreachable_host_is_unavailable_after_retries() {
    let client = stability_rs::StabilityClient::builder()
        .api_key("sk-test")
        .base_url_override("http://127.0.0.1:9")
        .network_retries(1)
        .poll_policy(
            stability_rs::PollPolicy::default()
                .with_base_delay(std::time::Duration::from_millis(5))
                .with_max_delay(std::time::Duration::from_millis(5))
                .with_jitter(0.0),
        )
        .build()
        .unwrap();
    let draft = RequestDraft::new("stable-image-core").text("prompt", "x");
    let err = client
        .generate(&draft, PollOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(err.is_retryable());
    assert!(err.to_string().contains("2 attempt"), "{}", err);
}
