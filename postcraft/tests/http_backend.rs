//! `HttpBackend` against a local stand-in for the content backend.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use postcraft::controller::WorkflowController;
use postcraft::core::step::Step;
use postcraft::core::types::Side;
use postcraft::io::config::BackendConfig;
use postcraft::io::http::HttpBackend;
use postcraft::io::services::{RefinementService, Services};
use postcraft::test_support::scenario_form;

type Recorded = Arc<Mutex<Vec<(&'static str, Value)>>>;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

fn backend(base_url: String) -> HttpBackend {
    HttpBackend::new(&BackendConfig {
        base_url,
        timeout_secs: 5,
    })
    .expect("backend")
}

fn record(recorded: &Recorded, path: &'static str, body: Value) {
    recorded.lock().expect("record lock").push((path, body));
}

fn happy_router(recorded: Recorded) -> Router {
    Router::new()
        .route(
            "/api/init",
            post(|State(rec): State<Recorded>, Json(body): Json<Value>| async move {
                record(&rec, "init", body);
                Json(json!({
                    "pinecone_results": [{"title": "helmet", "score": 0.8}],
                    "similar_posts": [{"text": "older"}],
                    "analytics_insights": "mornings work"
                }))
            }),
        )
        .route(
            "/api/generate",
            post(|State(rec): State<Recorded>, Json(body): Json<Value>| async move {
                record(&rec, "generate", body);
                Json(json!({
                    "post_a": {"text": "gen a", "character_count": 5, "is_valid": true},
                    "post_b": {"text": "gen b", "character_count": 5, "is_valid": true, "thinking": "t"},
                    "metadata": {"model": "m"}
                }))
            }),
        )
        .route(
            "/api/refine",
            post(|State(rec): State<Recorded>, Json(body): Json<Value>| async move {
                record(&rec, "refine", body);
                Json(json!({
                    "post_a": {"text": "ref a", "character_count": 5, "is_valid": true},
                    "post_b": {"text": "ref b", "character_count": 5, "is_valid": false}
                }))
            }),
        )
        .route(
            "/api/publish",
            post(|State(rec): State<Recorded>, Json(body): Json<Value>| async move {
                record(&rec, "publish", body);
                Json(json!({"success": true, "draft_row": 12, "published_row": 13}))
            }),
        )
        .with_state(recorded)
}

#[tokio::test]
async fn full_workflow_over_http_uses_the_wire_contract() {
    let recorded: Recorded = Arc::default();
    let base_url = serve(happy_router(recorded.clone())).await;
    let services = Services::from_backend(Arc::new(backend(base_url)));
    let mut controller = WorkflowController::new(services);

    controller
        .fetch_context(scenario_form())
        .await
        .expect("fetch");
    assert_eq!(controller.step(), Step::ReviewContext);
    assert_eq!(controller.context().analytics_insights, "mornings work");

    controller.proceed_to_generation().await.expect("generate");
    controller.select_candidate(Side::B).expect("select");
    controller.proceed_to_refinement().expect("open refinement");
    controller.refine_post("shorter").await.expect("refine");
    controller.select_candidate(Side::A).expect("select");
    controller.finalize_selection().expect("finalize");
    controller.confirm_and_publish().await.expect("publish");

    assert_eq!(controller.step(), Step::Done);
    let receipt = controller.receipt().expect("receipt");
    assert_eq!((receipt.draft_row, receipt.published_row), (Some(12), Some(13)));

    let recorded = recorded.lock().expect("record lock").clone();
    let paths: Vec<&str> = recorded.iter().map(|(path, _)| *path).collect();
    assert_eq!(paths, vec!["init", "generate", "refine", "publish"]);

    let init = &recorded[0].1;
    assert_eq!(
        init,
        &json!({"date": "2024-01-01", "url": "http://x", "decided": "buy", "anniversary": "", "remarks": ""})
    );

    let generate = &recorded[1].1;
    assert_eq!(generate["url"], "http://x");
    assert_eq!(generate["pinecone_results"][0]["title"], "helmet");
    assert_eq!(generate["analytics_insights"], "mornings work");

    let refine = &recorded[2].1;
    assert_eq!(
        refine,
        &json!({"selected_post": "gen b", "refinement_request": "shorter", "round": 1})
    );

    let publish = &recorded[3].1;
    assert_eq!(publish["final_post"]["text"], "ref a");
    assert_eq!(publish["history"][0]["postB"]["thinking"], "t");
    assert_eq!(publish["history"][0]["selected"], "B");
    assert_eq!(publish["history"][0]["refinementRequest"], "shorter");
    assert_eq!(publish["history"][1]["round"], 2);
    assert_eq!(publish["history"][1]["refinementRequest"], "");
    assert_eq!(publish["similar_posts"][0]["text"], "older");
}

fn failing_router() -> Router {
    Router::new()
        .route(
            "/api/init",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "index offline"})),
                )
                    .into_response()
            }),
        )
        .route(
            "/api/generate",
            post(|| async { Json(json!({"error": "quota exceeded"})) }),
        )
        .route(
            "/api/refine",
            post(|| async {
                Json(json!({"post_a": {"text": ""}, "post_b": {"text": "fine"}}))
            }),
        )
        .route(
            "/api/publish",
            post(|| async { Json(json!({"success": false})) }),
        )
}

#[tokio::test]
async fn error_status_carries_backend_message() {
    let base_url = serve(failing_router()).await;
    let services = Services::from_backend(Arc::new(backend(base_url)));
    let mut controller = WorkflowController::new(services);

    controller.fetch_context(scenario_form()).await.unwrap_err();

    let message = controller.error().expect("error recorded");
    assert!(message.starts_with("failed to fetch context: POST http://"));
    assert!(message.contains("500"));
    assert!(message.ends_with("index offline"));
    assert_eq!(controller.step(), Step::EnterInfo);
}

#[tokio::test]
async fn error_field_in_success_body_fails_the_call() {
    let base_url = serve(failing_router()).await;
    let backend = backend(base_url);
    let err = postcraft::io::services::GenerationService::generate(
        &backend,
        &scenario_form(),
        &Default::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("quota exceeded"));
}

#[tokio::test]
async fn invalid_candidate_pair_is_rejected() {
    let base_url = serve(failing_router()).await;
    let err = backend(base_url)
        .refine("text", "request", 1)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("schema validation"));
}

#[tokio::test]
async fn unacknowledged_publish_fails() {
    let base_url = serve(failing_router()).await;
    let backend = backend(base_url);
    let request = postcraft::io::services::PublishRequest {
        form: scenario_form(),
        final_result: postcraft::test_support::candidate("final"),
        history: Vec::new(),
        context: Default::default(),
    };
    let err = postcraft::io::services::PublishService::publish(&backend, &request)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not acknowledged"));
}

#[tokio::test]
async fn unreachable_backend_is_a_service_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let services = Services::from_backend(Arc::new(backend(format!("http://{addr}"))));
    let mut controller = WorkflowController::new(services);
    let err = controller.fetch_context(scenario_form()).await.unwrap_err();
    assert!(matches!(err, postcraft::WorkflowError::Service { .. }));
    assert!(!controller.is_loading());
}
