use super::*;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{ChatId, UserId};
use tokio::{net::TcpListener, sync::Mutex};

fn session() -> SessionKey {
    SessionKey::new(ChatId(5), UserId(9))
}

#[derive(Clone, Default)]
struct ServerState {
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
    next_calls: Arc<AtomicUsize>,
}

async fn handle_get_state(
    State(state): State<ServerState>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.queries.lock().await.push(query);
    Json(json!({
        "ok": true,
        "rev": 3,
        "role": "admin",
        "timer_seconds": 20,
        "round": { "started_at": 100.0, "question_at": 103.0, "deadline": 123.0 },
        "question": { "question": "Capital of France?", "options": ["Paris", "Rome"] },
        "players": { "9": { "name": "Ann", "answered": false } },
    }))
}

async fn handle_submit(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
    state.bodies.lock().await.push(body);
    Json(json!({ "ok": false, "error": "already answered" }))
}

async fn handle_flaky_next(State(state): State<ServerState>) -> impl IntoResponse {
    if state.next_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
    } else {
        Json(json!({ "ok": true })).into_response()
    }
}

async fn handle_forbidden_end() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "ok": false, "error": "forbidden" })),
    )
}

async fn spawn_quiz_server() -> std::io::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/get_state", get(handle_get_state))
        .route("/api/submit", post(handle_submit))
        .route("/api/admin/next", post(handle_flaky_next))
        .route("/api/admin/end", post(handle_forbidden_end))
        .route("/api/rematch/state", get(|| async { "<html>not json</html>" }))
        .route(
            "/api/admin/force_start",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn fetch_snapshot_sends_session_query_and_parses_state() {
    let (server_url, state) = spawn_quiz_server().await.expect("spawn server");
    let api = HttpQuizApi::new(&server_url, session()).expect("api");

    let snapshot = api.fetch_snapshot().await.expect("snapshot");
    assert_eq!(snapshot.revision, 3);
    assert_eq!(snapshot.pending_deadline(), Some(123.0));
    assert_eq!(snapshot.player(UserId(9)).map(|p| p.name.as_str()), Some("Ann"));

    let queries = state.queries.lock().await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].get("chat_id").map(String::as_str), Some("5"));
    assert_eq!(queries[0].get("user_id").map(String::as_str), Some("9"));
}

#[tokio::test]
async fn base_url_with_path_prefix_is_preserved() {
    let (server_url, state) = spawn_quiz_server().await.expect("spawn server");
    let api = HttpQuizApi::new(&format!("{server_url}/"), session()).expect("api");
    api.fetch_snapshot().await.expect("snapshot");
    assert_eq!(state.queries.lock().await.len(), 1);
}

#[tokio::test]
async fn undecodable_body_is_malformed() {
    let (server_url, _state) = spawn_quiz_server().await.expect("spawn server");
    let api = HttpQuizApi::new(&server_url, session()).expect("api");
    let err = api.rematch_state().await.expect_err("html body");
    assert!(matches!(err, SyncError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let api = HttpQuizApi::new(&format!("http://{addr}"), session()).expect("api");
    let err = api.fetch_snapshot().await.expect_err("closed port");
    assert!(matches!(err, SyncError::Network(_)), "{err:?}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn submit_posts_answer_body_and_rejection_is_not_retried() {
    let (server_url, state) = spawn_quiz_server().await.expect("spawn server");
    let api = Arc::new(HttpQuizApi::new(&server_url, session()).expect("api"));
    let client = RemoteStateClient::new(api, fast_retry());

    let err = client
        .submit(Mutation::SubmitAnswer { option: 1 })
        .await
        .expect_err("rejected");
    assert!(matches!(&err, SyncError::ServerRejected(msg) if msg == "already answered"));

    let bodies = state.bodies.lock().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0],
        json!({ "chat_id": 5, "user": { "id": 9 }, "given": 1 })
    );
    assert_eq!(client.indicator().current(), Connectivity::Online);
}

#[tokio::test]
async fn error_status_with_envelope_is_a_rejection() {
    let (server_url, _state) = spawn_quiz_server().await.expect("spawn server");
    let api = Arc::new(HttpQuizApi::new(&server_url, session()).expect("api"));
    let client = RemoteStateClient::new(api, fast_retry());

    let err = client.submit(Mutation::End).await.expect_err("forbidden");
    assert!(matches!(&err, SyncError::ServerRejected(msg) if msg == "forbidden"));
}

#[tokio::test]
async fn transient_write_failure_is_retried() {
    let (server_url, state) = spawn_quiz_server().await.expect("spawn server");
    let api = Arc::new(HttpQuizApi::new(&server_url, session()).expect("api"));
    let client = RemoteStateClient::new(api, fast_retry());
    let mut connectivity = client.indicator().subscribe();

    let ack = client.submit(Mutation::Next).await.expect("second attempt");
    assert!(ack.ok);
    assert_eq!(state.next_calls.load(Ordering::SeqCst), 2);
    assert!(connectivity.has_changed().expect("indicator alive"));
    assert_eq!(client.indicator().current(), Connectivity::Online);
}

#[tokio::test]
async fn write_gives_up_after_bounded_retries() {
    let (server_url, _state) = spawn_quiz_server().await.expect("spawn server");
    let api = Arc::new(HttpQuizApi::new(&server_url, session()).expect("api"));
    let client = RemoteStateClient::new(api, fast_retry());

    let err = client.submit(Mutation::ForceStart).await.expect_err("always 503");
    assert!(matches!(err, SyncError::Network(_)), "{err:?}");
    assert_eq!(client.indicator().current(), Connectivity::Online);
}

struct SlowApi {
    delay: Duration,
    reads: AtomicUsize,
}

#[async_trait]
impl QuizApi for SlowApi {
    async fn fetch_snapshot(&self) -> Result<RoundSnapshot, SyncError> {
        let rev = self.reads.fetch_add(1, Ordering::SeqCst) as i64;
        tokio::time::sleep(self.delay).await;
        Ok(serde_json::from_value(json!({ "ok": true, "rev": rev, "players": {} }))?)
    }

    async fn submit(&self, _mutation: &Mutation) -> Result<Ack, SyncError> {
        Ok(Ack::ok())
    }

    async fn rematch_state(&self) -> Result<RematchState, SyncError> {
        Ok(RematchState::default())
    }
}

#[tokio::test(start_paused = true)]
async fn newer_read_cancels_outstanding_one() {
    let api = Arc::new(SlowApi {
        delay: Duration::from_millis(500),
        reads: AtomicUsize::new(0),
    });
    let mut client = RemoteStateClient::new(api.clone(), RetryPolicy::none());

    let (first, first_read) = client.begin_read(FetchMode::Soft);
    let first_read = tokio::spawn(first_read);
    tokio::task::yield_now().await;

    let (second, second_read) = client.begin_read(FetchMode::Hard);
    assert_eq!(client.in_flight(), Some(second));

    let err = first_read.await.expect("join").expect_err("cancelled");
    assert!(err.is_cancelled());
    assert!(!client.finish_read(first.id));

    let snapshot = second_read.await.expect("second read");
    assert_eq!(snapshot.revision, 1);
    assert!(client.finish_read(second.id));
    assert_eq!(client.in_flight(), None);
    assert_eq!(api.reads.load(Ordering::SeqCst), 2);
}

#[test]
fn image_urls_go_through_the_proxy() {
    let url = proxied_image_url("http://quiz.local:8080", "https://cdn.example/a b.jpg")
        .expect("url");
    assert_eq!(
        url,
        "http://quiz.local:8080/api/img?u=https%3A%2F%2Fcdn.example%2Fa+b.jpg"
    );
}

#[test]
fn finished_retry_keeps_badge_raised_by_failed_read() {
    let indicator = ConnectivityIndicator::new();
    indicator.read_failed();
    indicator.retry_started();
    indicator.retry_finished();
    assert_eq!(indicator.current(), Connectivity::Degraded);

    indicator.read_recovered();
    assert_eq!(indicator.current(), Connectivity::Online);
}

#[test]
fn recovered_read_keeps_badge_raised_by_pending_retry() {
    let indicator = ConnectivityIndicator::new();
    indicator.retry_started();
    indicator.read_failed();
    indicator.read_recovered();
    assert_eq!(indicator.current(), Connectivity::Degraded);

    indicator.retry_finished();
    assert_eq!(indicator.current(), Connectivity::Online);
}
