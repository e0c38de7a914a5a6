use crate::e2e::helpers;

use helpers::{
    audio_response, counter, log_messages, profile_settings, rate_limited_response,
    server_error_response, TestContext, FALLBACK_MODEL, PRIMARY_MODEL,
};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_convert_records_and_write_audio_references(ctx: &TestContext) {
    ctx.mock_model(PRIMARY_MODEL, audio_response(&[1, 0, 2, 0]))
        .await;

    ctx.start_batch(&[1, 2, 3, 4, 5, 99]).await.unwrap();
    let status = ctx.wait_for_batch().await.unwrap();

    assert_eq!(counter(&status, "success"), 2);
    assert_eq!(counter(&status, "skipped"), 2);
    assert_eq!(counter(&status, "failed"), 0);
    assert_eq!(
        status.pointer("/summary/reason").and_then(|v| v.as_str()),
        Some("completed")
    );
    assert_eq!(ctx.gemini_requests().await, 2);

    let logs = log_messages(&status);
    assert!(logs.contains(&"Record 1: Success".to_string()));
    assert!(logs.contains(&"Record 2: Success".to_string()));
    assert!(logs.contains(&"Record 3: Skipped (Audio exists)".to_string()));
    assert!(logs.contains(&"Record 4: Skipped (Empty text)".to_string()));
    assert!(logs.contains(&"Record 99: Skipped (Deleted)".to_string()));
    assert!(!logs.iter().any(|line| line.starts_with("Record 5:")));

    for id in [1i64, 2] {
        let audio = ctx.audio_field(id).unwrap();
        assert!(
            audio.starts_with(&format!("[sound:gemini_tts_{id}_")) && audio.ends_with(".wav]"),
            "unexpected audio reference {audio}"
        );
        assert_eq!(ctx.record(id).unwrap().tags, vec!["tts_done".to_string()]);
    }
    assert_eq!(ctx.audio_field(3).unwrap(), "[sound:old.wav]");
    assert_eq!(ctx.audio_field(4).unwrap(), "");

    let media = ctx.media_files().unwrap();
    assert_eq!(media.len(), 2);
    let wav = std::fs::read(ctx.media_dir.join(&media[0])).unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    assert_eq!(wav.len(), 44 + 4);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_send_cleaned_text_to_the_api(ctx: &TestContext) {
    ctx.mock_model(PRIMARY_MODEL, audio_response(&[0, 0]))
        .await;

    ctx.start_batch(&[1]).await.unwrap();
    ctx.wait_for_batch().await.unwrap();

    let requests = ctx.gemini.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body.pointer("/contents/0/parts/0/text")
            .and_then(|v| v.as_str()),
        Some("Hello world")
    );
    assert_eq!(
        requests[0]
            .headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok()),
        Some("test-key")
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_use_fallback_model_when_rate_limited(ctx: &TestContext) {
    ctx.mock_model(PRIMARY_MODEL, rate_limited_response()).await;
    ctx.mock_model(FALLBACK_MODEL, audio_response(&[0, 0]))
        .await;

    ctx.start_batch(&[1]).await.unwrap();
    let status = ctx.wait_for_batch().await.unwrap();

    assert_eq!(counter(&status, "success"), 1);
    assert!(log_messages(&status).contains(&format!("Record 1: Success ({FALLBACK_MODEL})")));
    assert_eq!(ctx.gemini_requests().await, 2);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_count_api_failures_and_keep_going(ctx: &TestContext) {
    ctx.mock_model(PRIMARY_MODEL, server_error_response()).await;

    ctx.start_batch(&[1, 2]).await.unwrap();
    let status = ctx.wait_for_batch().await.unwrap();

    assert_eq!(counter(&status, "failed"), 2);
    assert_eq!(counter(&status, "success"), 0);
    assert!(log_messages(&status).contains(
        &"Record 1: API error - Server error (HTTP 500): internal error on the API side"
            .to_string()
    ));

    assert_eq!(ctx.audio_field(1).unwrap(), "");
    assert!(ctx.media_files().unwrap().is_empty());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_a_second_batch_while_one_is_running(ctx: &TestContext) {
    ctx.mock_model(
        PRIMARY_MODEL,
        audio_response(&[0, 0]).set_delay(Duration::from_millis(800)),
    )
    .await;

    ctx.start_batch(&[1, 2]).await.unwrap();

    let response = ctx
        .client
        .post("/api/batches", &json!({"record_ids": [1]}))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::CONFLICT)
        .assert_error_message("A batch is already running");

    let status = ctx.wait_for_batch().await.unwrap();
    assert_eq!(counter(&status, "success"), 2);

    // Once finished a new batch is accepted
    ctx.start_batch(&[1]).await.unwrap();
    ctx.wait_for_batch().await.unwrap();
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_cancel_a_running_batch(ctx: &TestContext) {
    ctx.mock_model(
        PRIMARY_MODEL,
        audio_response(&[0, 0]).set_delay(Duration::from_millis(800)),
    )
    .await;

    ctx.start_batch(&[1, 2]).await.unwrap();

    let response = ctx
        .client
        .post_empty("/api/batches/current/cancel")
        .await
        .unwrap();
    response.assert_status(StatusCode::ACCEPTED);

    let status = ctx.wait_for_batch().await.unwrap();
    assert_eq!(
        status.pointer("/summary/reason").and_then(|v| v.as_str()),
        Some("cancelled")
    );
    assert!(ctx.gemini_requests().await <= 1);
    assert_eq!(ctx.audio_field(2).unwrap(), "");

    // Nothing left to cancel
    let response = ctx
        .client
        .post_empty("/api/batches/current/cancel")
        .await
        .unwrap();
    response.assert_status(StatusCode::NOT_FOUND);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_404_before_any_batch(ctx: &TestContext) {
    let response = ctx.client.get("/api/batches/current").await.unwrap();
    response
        .assert_status(StatusCode::NOT_FOUND)
        .assert_error_message("No batch has been started");

    let response = ctx
        .client
        .post_empty("/api/batches/current/cancel")
        .await
        .unwrap();
    response
        .assert_status(StatusCode::NOT_FOUND)
        .assert_error_message("No batch is running");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_an_empty_record_list(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/batches", &json!({"record_ids": []}))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("record_ids must not be empty");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_malformed_json(ctx: &TestContext) {
    let response = ctx
        .client
        .post_raw("/api/batches", "{\"record_ids\": [1,")
        .await
        .unwrap();

    assert!(response.status.is_client_error());
    assert_eq!(ctx.gemini_requests().await, 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_require_an_api_key(ctx: &TestContext) {
    let mut settings = profile_settings();
    settings["api_key"] = json!("   ");
    ctx.write_config(&json!({"current_profile": "main", "profiles": {"main": settings}}))
        .unwrap();

    let response = ctx
        .client
        .post("/api/batches", &json!({"record_ids": [1]}))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::PRECONDITION_FAILED)
        .assert_error_message("API key");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_require_an_enabled_field_mapping(ctx: &TestContext) {
    let mut settings = profile_settings();
    settings["field_mappings"] = json!([
        {"record_type": "Basic", "source_field": "Front", "target_field": "Audio", "enabled": false}
    ]);
    ctx.write_config(&json!({"current_profile": "main", "profiles": {"main": settings}}))
        .unwrap();

    let response = ctx
        .client
        .post("/api/batches", &json!({"record_ids": [1]}))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::PRECONDITION_FAILED)
        .assert_error_message("field mapping");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_expose_progress_of_the_finished_batch(ctx: &TestContext) {
    ctx.mock_model(PRIMARY_MODEL, audio_response(&[0, 0]))
        .await;

    let batch_id = ctx.start_batch(&[1, 3]).await.unwrap();
    let status = ctx.wait_for_batch().await.unwrap();

    assert_eq!(status.get("batch_id").and_then(|v| v.as_str()), Some(batch_id.as_str()));
    assert_eq!(status.get("profile").and_then(|v| v.as_str()), Some("main"));
    assert_eq!(status.get("status").and_then(|v| v.as_str()), Some("Done"));
    assert_eq!(counter(&status, "total"), 2);
    assert_eq!(counter(&status, "current"), 2);
    assert!(status.get("finished_at").is_some());
    assert_eq!(
        status.pointer("/usage/output_tokens").and_then(|v| v.as_u64()),
        Some(70)
    );
}
