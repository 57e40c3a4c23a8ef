use super::*;
use crate::server::testutil::{StubSynth, medium_key, temp_store, test_config, wait_for};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tower::ServiceExt;

fn test_state(synth: Arc<dyn Synthesize>, digests: &[String]) -> (tempfile::TempDir, AppState) {
    let (dir, store) = temp_store();
    let config = test_config(&dir);
    let pool = Arc::new(WorkerPool::new(&config, Arc::clone(&store), Arc::clone(&synth)));
    let auth = Arc::new(TokenAuth::from_digests(digests).expect("digests"));
    (
        dir,
        AppState {
            config,
            store,
            pool,
            synth,
            auth,
        },
    )
}

async fn send(state: &AppState, request: Request<Body>) -> Response {
    router(state.clone())
        .oneshot(request)
        .await
        .expect("infallible")
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn digest_of(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_on_an_empty_key_generates_inline_and_replenishes() {
    let synth = Arc::new(StubSynth::default());
    let (_dir, state) = test_state(synth.clone(), &[]);

    let response = send(&state, get("/json?width=4&height=3")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    assert_eq!(payload["empty"], 5);
    assert_eq!(payload["barrier"], 7);
    assert_eq!(payload["light"], 6);
    assert_eq!(payload["numbers"], serde_json::json!([0, 1, 2, 3]));
    let rows = payload["board"].as_array().expect("board rows");
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.as_array().unwrap().len() == 4));

    // the miss was served by a synchronous inline generation
    assert!(synth.calls() >= 1);

    // and the fetch kicked off a background replenishment up to the target
    let store = Arc::clone(&state.store);
    let key = PoolKey {
        width: 4,
        height: 3,
        difficulty: Difficulty::Medium,
    };
    assert!(
        wait_for(Duration::from_secs(5), move || {
            store.count(&key).unwrap() == 5
        })
        .await,
        "replenishment should restore the backlog"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_serves_a_pooled_board_on_hit() {
    let synth = Arc::new(StubSynth::default());
    let (_dir, state) = test_state(synth.clone(), &[]);

    let pooled = StubSynth::default()
        .synthesize(&medium_key(5, 5))
        .expect("stub board");
    state
        .store
        .insert(&medium_key(5, 5), &pooled)
        .expect("seed the pool");

    let response = send(&state, get("/json")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    let served: Board = serde_json::from_value(payload["board"].clone()).expect("board");
    assert_eq!(served, pooled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_rejects_malformed_dimensions_before_any_generation() {
    let synth = Arc::new(StubSynth::default());
    let (_dir, state) = test_state(synth.clone(), &[]);

    for uri in [
        "/json?width=abc",
        "/json?height=-2",
        "/json?width=0",
        "/json?height=999",
    ] {
        let response = send(&state, get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
    assert_eq!(synth.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_difficulty_labels_normalize_to_medium() {
    let synth = Arc::new(StubSynth::default());
    let (_dir, state) = test_state(synth.clone(), &[]);

    let response = send(&state, get("/json?difficulty=WEIRD")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let store = Arc::clone(&state.store);
    assert!(
        wait_for(Duration::from_secs(5), move || {
            store.count(&medium_key(5, 5)).unwrap() == 5
        })
        .await,
        "the normalized medium bucket should be replenished"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inline_synthesis_failure_surfaces_as_a_server_error() {
    let synth = Arc::new(StubSynth::failing());
    let (_dir, state) = test_state(synth, &[]);

    let response = send(&state, get("/json")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn solve_round_trips_a_uniquely_solvable_board() {
    let synth = Arc::new(StubSynth::default());
    let (_dir, state) = test_state(synth, &[]);

    let response = send(&state, post_json("/solve", r#"{"board":[[2,5],[5,5]]}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    assert_eq!(payload["board"], serde_json::json!([[2, 6], [6, 5]]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn solve_rejects_unsolvable_boards_as_semantic_errors() {
    let synth = Arc::new(StubSynth::default());
    let (_dir, state) = test_state(synth, &[]);

    let response = send(&state, post_json("/solve", r#"{"board":[[0,5,0]]}"#)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn solve_rejects_malformed_payloads_before_solving() {
    let synth = Arc::new(StubSynth::default());
    let (_dir, state) = test_state(synth, &[]);

    for body in [
        "{}",
        r#"{"board":[]}"#,
        r#"{"board":[[4]]}"#,
        r#"{"board":[[5,5],[5]]}"#,
        "not json",
    ] {
        let response = send(&state, post_json("/solve", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_and_solve_require_a_listed_bearer_token() {
    let synth = Arc::new(StubSynth::default());
    let (_dir, state) = test_state(synth, &[digest_of("firefly")]);

    let response = send(&state, get("/json")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut wrong = get("/json");
    wrong
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer glowworm".parse().unwrap());
    let response = send(&state, wrong).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut authed = get("/json");
    authed
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer firefly".parse().unwrap());
    let response = send(&state, authed).await;
    assert_eq!(response.status(), StatusCode::OK);

    // the status view stays public
    let response = send(&state, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_lists_every_nonempty_bucket() {
    let synth = Arc::new(StubSynth::default());
    let (_dir, state) = test_state(synth, &[]);

    let response = send(&state, get("/")).await;
    assert_eq!(body_json(response).await, serde_json::json!([]));

    let seed = StubSynth::default();
    let small = medium_key(3, 1);
    let big = medium_key(6, 2);
    for key in [&small, &small, &big] {
        let board = seed.synthesize(key).expect("stub board");
        state.store.insert(key, &board).expect("insert");
    }

    let payload = body_json(send(&state, get("/index")).await).await;
    assert_eq!(
        payload,
        serde_json::json!([
            {"width": 3, "height": 1, "difficulty": "medium", "count": 2},
            {"width": 6, "height": 2, "difficulty": "medium", "count": 1},
        ])
    );
}
