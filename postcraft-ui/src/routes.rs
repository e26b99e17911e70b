//! HTTP route handlers for the workflow API.
//!
//! Every action responds with the same envelope: whether it succeeded, the
//! recorded error if not, and the controller snapshot afterwards. Requests
//! that arrive while another action is still awaiting its service call are
//! turned away with 409 instead of queueing behind it.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tracing::debug;

use postcraft::core::types::{FormInput, Side};
use postcraft::{WorkflowController, WorkflowError, WorkflowSnapshot};

use crate::state::AppState;

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(get_state))
        .route("/fetch-context", post(fetch_context))
        .route("/generate", post(generate))
        .route("/select", post(select))
        .route("/refine/open", post(open_refinement))
        .route("/refine", post(refine))
        .route("/refine/skip", post(skip_refinement))
        .route("/finalize", post(finalize))
        .route("/publish", post(publish))
        .route("/edit", post(edit))
        .route("/back", post(back))
        .route("/restart", post(restart))
}

#[derive(Debug, Serialize)]
struct ActionResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    state: WorkflowSnapshot,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    side: Side,
}

#[derive(Debug, Deserialize)]
struct RefineBody {
    request: String,
}

async fn health() -> &'static str {
    "ok"
}

fn busy() -> Response {
    (
        StatusCode::CONFLICT,
        Json(serde_json::json!({"ok": false, "error": "another action is in progress"})),
    )
        .into_response()
}

fn status_for(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Service { .. } => StatusCode::BAD_GATEWAY,
        WorkflowError::Validation(_)
        | WorkflowError::Selection
        | WorkflowError::InvalidStep { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn respond(controller: &WorkflowController, outcome: Result<(), WorkflowError>) -> Response {
    let state = controller.snapshot();
    match outcome {
        Ok(()) => Json(ActionResponse {
            ok: true,
            error: None,
            state,
        })
        .into_response(),
        Err(err) => {
            debug!(error = %err, step = %state.step, "action rejected");
            (
                status_for(&err),
                Json(ActionResponse {
                    ok: false,
                    error: Some(err.to_string()),
                    state,
                }),
            )
                .into_response()
        }
    }
}

/// GET /api/state - current controller snapshot.
async fn get_state(State(state): State<AppState>) -> Response {
    let Some(controller) = state.try_claim() else {
        return busy();
    };
    Json(controller.snapshot()).into_response()
}

/// POST /api/fetch-context - submit the form.
async fn fetch_context(State(state): State<AppState>, Json(form): Json<FormInput>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    let outcome = controller.fetch_context(form).await;
    respond(&controller, outcome)
}

/// POST /api/generate - continue from context review.
async fn generate(State(state): State<AppState>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    let outcome = controller.proceed_to_generation().await;
    respond(&controller, outcome)
}

async fn select(State(state): State<AppState>, Json(body): Json<SelectBody>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    let outcome = controller.select_candidate(body.side);
    respond(&controller, outcome)
}

async fn open_refinement(State(state): State<AppState>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    let outcome = controller.proceed_to_refinement();
    respond(&controller, outcome)
}

async fn refine(State(state): State<AppState>, Json(body): Json<RefineBody>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    let outcome = controller.refine_post(body.request).await;
    respond(&controller, outcome)
}

async fn skip_refinement(State(state): State<AppState>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    let outcome = controller.skip_refinement();
    respond(&controller, outcome)
}

async fn finalize(State(state): State<AppState>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    let outcome = controller.finalize_selection();
    respond(&controller, outcome)
}

async fn publish(State(state): State<AppState>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    let outcome = controller.confirm_and_publish().await;
    respond(&controller, outcome)
}

async fn edit(State(state): State<AppState>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    let outcome = controller.edit_post();
    respond(&controller, outcome)
}

async fn back(State(state): State<AppState>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    controller.go_back();
    respond(&controller, Ok(()))
}

async fn restart(State(state): State<AppState>) -> Response {
    let Some(mut controller) = state.try_claim() else {
        return busy();
    };
    controller.restart();
    respond(&controller, Ok(()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use postcraft::WorkflowEvent;
    use postcraft::core::step::{Action, Step};
    use postcraft::test_support::{ScriptedBackend, context_with_matches, pair, receipt};
    use serde_json::{Value, json};
    use tokio::sync::Notify;
    use tower::ServiceExt;

    use super::*;

    fn app_with_state(backend: &ScriptedBackend) -> (Router, AppState) {
        let state = AppState::new(WorkflowController::new(backend.services()));
        let app = Router::new()
            .nest("/api", api_router())
            .with_state(state.clone());
        (app, state)
    }

    fn app(backend: &ScriptedBackend) -> Router {
        app_with_state(backend).0
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn form() -> Value {
        json!({"date": "2024-01-01", "url": "http://x", "decided": "buy"})
    }

    #[tokio::test]
    async fn full_flow_over_the_api() {
        let backend = ScriptedBackend::new()
            .with_context(context_with_matches(1))
            .with_generation(pair("a1", "b1"))
            .with_refinement(pair("a2", "b2"))
            .with_receipt(receipt(1, 2));
        let app = app(&backend);

        let (status, body) = call(&app, Method::POST, "/api/fetch-context", Some(form())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["step"], "review_context");

        let (_, body) = call(&app, Method::POST, "/api/generate", None).await;
        assert_eq!(body["state"]["step"], "compare_candidates");
        assert_eq!(body["state"]["round"]["candidate_a"]["text"], "a1");

        call(&app, Method::POST, "/api/select", Some(json!({"side": "A"}))).await;
        call(&app, Method::POST, "/api/refine/open", None).await;
        let refine_body = json!({"request": "shorter"});
        let (status, body) = call(&app, Method::POST, "/api/refine", Some(refine_body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["round"]["number"], 2);
        assert_eq!(body["state"]["history"][0]["refinement_request"], "shorter");

        call(&app, Method::POST, "/api/select", Some(json!({"side": "b"}))).await;
        let (_, body) = call(&app, Method::POST, "/api/finalize", None).await;
        assert_eq!(body["state"]["final_result"]["text"], "b2");

        let (status, body) = call(&app, Method::POST, "/api/publish", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["step"], "done");
        assert_eq!(body["state"]["receipt"]["published_row"], 2);
        assert_eq!(body["state"]["progress_text"], "Step 8/8: done");
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let backend = ScriptedBackend::new().with_context_failure("offline");
        let app = app(&backend);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/fetch-context",
            Some(json!({"date": "2024-01-01", "url": "http://x", "decided": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "missing required field: decided");
        assert_eq!(body["state"]["error"], "missing required field: decided");

        let (status, body) = call(&app, Method::POST, "/api/fetch-context", Some(form())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "failed to fetch context: offline");
        assert_eq!(body["state"]["step"], "enter_info");

        let (status, _) = call(&app, Method::POST, "/api/publish", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn back_and_restart_always_succeed() {
        let backend = ScriptedBackend::new()
            .with_empty_context()
            .with_generation(pair("a1", "b1"));
        let app = app(&backend);
        call(&app, Method::POST, "/api/fetch-context", Some(form())).await;

        let (status, body) = call(&app, Method::POST, "/api/back", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["step"], "review_context");

        let (status, body) = call(&app, Method::POST, "/api/restart", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["step"], "enter_info");
        assert_eq!(body["state"]["round"]["number"], 1);
        assert_eq!(body["state"]["history"], json!([]));
    }

    #[tokio::test]
    async fn requests_during_an_action_are_rejected() {
        let gate = Arc::new(Notify::new());
        let backend = ScriptedBackend::new()
            .with_context(context_with_matches(1))
            .with_fetch_gate(gate.clone());
        let (app, state) = app_with_state(&backend);
        let mut events = state.event_tx.subscribe();

        let in_flight = {
            let app = app.clone();
            tokio::spawn(async move {
                call(&app, Method::POST, "/api/fetch-context", Some(form())).await
            })
        };
        // The busy flag and the loading step are announced before the fetch resolves.
        let mut announced = Vec::new();
        while let Ok(event) = events.recv().await {
            let loading = event
                == (WorkflowEvent::StepChanged {
                    from: Step::EnterInfo,
                    to: Step::LoadingContext,
                });
            announced.push(event);
            if loading {
                break;
            }
        }
        assert_eq!(
            announced.first(),
            Some(&WorkflowEvent::Busy {
                action: Action::FetchContext,
                publishing: false,
            })
        );

        let (status, body) = call(&app, Method::GET, "/api/state", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "another action is in progress");
        let (status, _) = call(&app, Method::POST, "/api/back", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        gate.notify_one();
        let (status, body) = in_flight.await.expect("join");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["step"], "review_context");
        let (status, _) = call(&app, Method::GET, "/api/state", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
