//! Async audio generation over HTTP: 202 submission, then result polling.

use crate::integration::mock_server::{MockServerFixture, API_KEY};
use stability_rs::{ErrorKind, PollOptions, RequestDraft, Submission};

const JOB_ID: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

#[tokio::test]
async fn text_to_audio_submits_then_fetches_result() {
    let fixture = MockServerFixture::new().await;
    let submit = fixture
        .mock_json_response(
            "POST",
            "/v2beta/audio/stable-audio-2/text-to-audio",
            202,
            &format!(r#"{{"id":"{}"}}"#, JOB_ID),
        )
        .await;
    let result = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", format!("/v2beta/results/{}", JOB_ID).as_str())
            .match_header("authorization", format!("Bearer {}", API_KEY).as_str())
            .match_header("accept", "audio/*")
            .with_status(200)
            .with_header("content-type", "audio/mpeg")
            .with_body("ID3 mp3 bytes")
            .expect(1)
            .create_async()
            .await
    };
    let client = fixture.create_test_client().unwrap();

    let draft = RequestDraft::new("text-to-audio")
        .text("prompt", "lo-fi beat")
        .integer("duration", 45)
        .integer("steps", 60);
    let request = client.validate(&draft).unwrap();
    let job = match client.submit(&request).await.unwrap() {
        Submission::Pending(job) => job,
        Submission::Complete(_) => panic!("audio is async"),
    };
    assert_eq!(job.id(), JOB_ID);
    assert_eq!(job.output_format(), Some("mp3"));

    let audio = client.poll(&job, PollOptions::default()).await.unwrap();
    submit.assert_async().await;
    result.assert_async().await;
    assert_eq!(&audio.artifact[..], b"ID3 mp3 bytes");
    assert_eq!(audio.file_extension(), "mp3");
    assert_eq!(audio.generation_id.as_deref(), Some(JOB_ID));
}

#[tokio::test]
async fn malformed_generation_id_is_a_protocol_error() {
    let fixture = MockServerFixture::new().await;
    let _submit = fixture
        .mock_json_response(
            "POST",
            "/v2beta/audio/stable-audio-2/text-to-audio",
            202,
            r#"{"id":"short"}"#,
        )
        .await;
    let client = fixture.create_test_client().unwrap();
    let draft = RequestDraft::new("text-to-audio").text("prompt", "x");
    let err = client
        .generate(&draft, PollOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("64 alphanumerics"), "{}", err);
}

#[tokio::test]
async fn sync_endpoint_answering_202_is_rejected() {
    let fixture = MockServerFixture::new().await;
    let _submit = fixture
        .mock_json_response(
            "POST",
            "/v2beta/stable-image/generate/core",
            202,
            &format!(r#"{{"id":"{}"}}"#, JOB_ID),
        )
        .await;
    let client = fixture.create_test_client().unwrap();
    let draft = RequestDraft::new("stable-image-core").text("prompt", "x");
    let err = client
        .generate(&draft, PollOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert!(err.to_string().contains("202"), "{}", err);
}

#[tokio::test]
async fn expired_result_is_not_found() {
    let fixture = MockServerFixture::new().await;
    let _gone = fixture
        .mock_json_response(
            "GET",
            &format!("/v2beta/results/{}", JOB_ID),
            404,
            r#"{"name":"not_found","errors":["expired"]}"#,
        )
        .await;
    let client = fixture.create_test_client().unwrap();
    let job = client.resume_job(JOB_ID, "text-to-audio").unwrap();
    let err = client.poll(&job, PollOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFoundOrExpired);
}
