//! Integration tests for the `/api/v1/jobs` and `/api/v1/simulations` endpoints.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, body_text, get, post_json};
use geohub_events::{EventBus, NoopNotifier};
use serde_json::json;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_202_with_job_id() {
    let script = common::write_script("echo '{\"type\":\"success\",\"message\":\"ok\"}'\n");
    let state = common::test_state(common::catalog_for(&script), Arc::new(NoopNotifier));
    let registry = Arc::clone(&state.registry);
    let app = common::build_test_app(state);

    let response = post_json(
        app,
        "/api/v1/jobs",
        json!({"jobType": "extraction", "config": common::extraction_config()}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "running");
    let job_id = json["data"]["jobId"].as_str().unwrap().to_string();
    assert_eq!(job_id.len(), 36, "generated ids are UUIDs");

    let job = common::wait_for_terminal(&registry, &job_id).await;
    assert_eq!(job.status.as_str(), "success");
}

#[tokio::test]
async fn submit_unknown_type_is_accepted_as_failed() {
    let app = common::build_default_app();

    let response = post_json(
        app,
        "/api/v1/jobs",
        json!({"jobId": "job-x", "jobType": "reprojection", "config": {}}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["jobId"], "job-x");
    assert_eq!(json["data"]["status"], "failed");
    assert_eq!(json["data"]["message"], "Unknown job type: reprojection");
}

#[tokio::test]
async fn submit_duplicate_id_returns_409() {
    let state = common::test_state(common::empty_catalog(), Arc::new(NoopNotifier));
    let body = json!({"jobId": "same", "jobType": "bogus"});

    let first = post_json(common::build_test_app(state.clone()), "/api/v1/jobs", body.clone()).await;
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = post_json(common::build_test_app(state), "/api/v1/jobs", body).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let json = body_json(second).await;
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn submit_without_job_type_is_rejected() {
    let app = common::build_default_app();
    let response = post_json(app, "/api/v1/jobs", json!({"config": {}})).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// List / Get
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_unknown_job_returns_404() {
    let app = common::build_default_app();
    let response = get(app, "/api/v1/jobs/does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn get_and_list_return_submitted_jobs() {
    let state = common::test_state(common::empty_catalog(), Arc::new(NoopNotifier));
    post_json(
        common::build_test_app(state.clone()),
        "/api/v1/jobs",
        json!({"jobId": "listed", "jobType": "extraction", "config": null}),
    )
    .await;

    let response = get(common::build_test_app(state.clone()), "/api/v1/jobs/listed").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let job = &json["data"];
    assert_eq!(job["id"], "listed");
    assert_eq!(job["jobType"], "extraction");
    assert_eq!(job["status"], "failed");
    assert_eq!(job["logs"].as_array().unwrap().len(), 1);
    assert_eq!(job["logs"][0]["type"], "error");
    assert!(job["startedAt"].is_null());

    let response = get(common::build_test_app(state), "/api/v1/jobs").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let jobs = json["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["logCount"], 1);
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn events_for_finished_job_send_snapshot_and_end() {
    let state = common::test_state(common::empty_catalog(), Arc::new(NoopNotifier));
    post_json(
        common::build_test_app(state.clone()),
        "/api/v1/jobs",
        json!({"jobId": "done", "jobType": "bogus"}),
    )
    .await;

    let response = get(common::build_test_app(state), "/api/v1/jobs/done/events").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let text = body_text(response).await;
    assert!(text.contains("event: snapshot"));
    assert!(text.contains("\"id\":\"done\""));
}

#[tokio::test]
async fn events_stream_follows_a_running_job_to_completion() {
    let script = common::write_script("sleep 0.2\necho 'halfway'\nsleep 0.1\nexit 0\n");
    let state = common::test_state(common::catalog_for(&script), Arc::new(NoopNotifier));

    post_json(
        common::build_test_app(state.clone()),
        "/api/v1/jobs",
        json!({"jobId": "live", "jobType": "extraction", "config": common::extraction_config()}),
    )
    .await;

    let response = get(common::build_test_app(state), "/api/v1/jobs/live/events").await;
    let text = body_text(response).await;

    let snapshot_at = text.find("event: snapshot").expect("snapshot first");
    let log_at = text.find("halfway").expect("log event");
    let status_at = text.rfind("event: status").expect("terminal status event");
    assert!(snapshot_at < log_at && log_at < status_at);
    assert!(text.contains("\"status\":\"success\""));
}

#[tokio::test]
async fn lagged_stream_ends_with_final_snapshot_when_job_finished() {
    let script = common::write_script("sleep 0.3\nfor i in 1 2 3 4 5; do echo \"line $i\"; done\n");
    let state = common::test_state_with_bus(
        common::catalog_for(&script),
        Arc::new(NoopNotifier),
        EventBus::new(2),
    );
    let registry = Arc::clone(&state.registry);

    post_json(
        common::build_test_app(state.clone()),
        "/api/v1/jobs",
        json!({"jobId": "lagging", "jobType": "extraction", "config": common::extraction_config()}),
    )
    .await;
    let response = get(common::build_test_app(state.clone()), "/api/v1/jobs/lagging/events").await;
    common::wait_for_terminal(&registry, "lagging").await;

    // Traffic from other jobs pushes the terminal status out of the buffer.
    for id in ["other-1", "other-2"] {
        post_json(
            common::build_test_app(state.clone()),
            "/api/v1/jobs",
            json!({"jobId": id, "jobType": "bogus"}),
        )
        .await;
    }

    let text = tokio::time::timeout(Duration::from_secs(5), body_text(response))
        .await
        .expect("stream must end once the job is finished");
    assert_eq!(text.matches("event: snapshot").count(), 2);
    let final_snapshot = &text[text.rfind("event: snapshot").unwrap()..];
    assert!(final_snapshot.contains("\"status\":\"success\""));
    assert!(final_snapshot.contains("line 5"));
    assert!(!text.contains("other-1"));
}

#[tokio::test]
async fn events_for_unknown_job_return_404() {
    let app = common::build_default_app();
    let response = get(app, "/api/v1/jobs/missing/events").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Simulations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn custom_simulation_stops_at_first_error() {
    let app = common::build_default_app();
    let response = post_json(
        app,
        "/api/v1/simulations",
        json!({"steps": [
            {"type": "info", "message": "one", "delayMs": 1},
            {"type": "error", "message": "two", "delayMs": 1},
            {"type": "success", "message": "three", "delayMs": 1},
        ]}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["outcome"], "failed");
    assert_eq!(data["status"], "failed");
    let logs = data["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[1]["message"], "two");
    assert!(logs[0]["id"].is_string());
}

#[tokio::test(start_paused = true)]
async fn canned_simulation_for_job_type_succeeds() {
    let app = common::build_default_app();
    let response = post_json(app, "/api/v1/simulations", json!({"jobType": "comparison"})).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["outcome"], "success");
    assert_eq!(json["data"]["logs"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn simulation_requires_job_type_or_steps() {
    let app = common::build_default_app();
    let response = post_json(app, "/api/v1/simulations", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = common::build_default_app();
    let response = post_json(app, "/api/v1/simulations", json!({"jobType": "nope"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}
