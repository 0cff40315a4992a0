use std::fs;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use komik_downloader::base_system::history::HistoryLedger;
use komik_downloader::ui::web::{AppState, build_router};
use tempfile::TempDir;
use tower::ServiceExt;

struct Library {
    _tmp: TempDir,
    state: AppState,
    history: PathBuf,
}

fn library() -> Library {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("komik");
    let title = root.join("one-piece");
    for chapter in ["10", "2", "35-1", "35-10", "35-2", "35"] {
        fs::create_dir_all(title.join(chapter)).unwrap();
    }
    let ch2 = title.join("2");
    fs::write(ch2.join("scaled_image_10.png"), b"ten").unwrap();
    fs::write(ch2.join("scaled_image_2.png"), b"two").unwrap();
    fs::write(ch2.join("scaled_image_1_skip_.png"), b"one").unwrap();
    fs::write(ch2.join("notes.txt"), b"ignored").unwrap();
    fs::create_dir_all(root.join("berwarna")).unwrap();
    fs::write(root.join("stray.txt"), b"not a title").unwrap();
    fs::write(tmp.path().join("secret.png"), b"outside").unwrap();

    let history = tmp.path().join("history.json");
    let state = AppState::new(root, history.clone(), 10);
    Library {
        _tmp: tmp,
        state,
        history,
    }
}

async fn get(state: &AppState, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = build_router(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(state: &AppState, uri: &str) -> serde_json::Value {
    let (status, body) = get(state, uri).await;
    assert_eq!(status, StatusCode::OK, "GET {uri}");
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn lists_titles_chapters_and_images() {
    let lib = library();

    let titles = get_json(&lib.state, "/api/komik").await;
    assert_eq!(titles, serde_json::json!(["berwarna", "one-piece"]));

    let chapters = get_json(&lib.state, "/api/komik/one-piece").await;
    assert_eq!(chapters, serde_json::json!(["2", "10", "35", "35-1", "35-10", "35-2"]));

    let images = get_json(&lib.state, "/api/komik/one-piece/2").await;
    assert_eq!(
        images,
        serde_json::json!([
            "/api/image?path=one-piece%2F2%2Fscaled_image_1_skip_.png",
            "/api/image?path=one-piece%2F2%2Fscaled_image_2.png",
            "/api/image?path=one-piece%2F2%2Fscaled_image_10.png",
        ])
    );
}

#[tokio::test]
async fn unknown_title_or_chapter_is_404() {
    let lib = library();

    let (status, body) = get(&lib.state, "/api/komik/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"Judul not found");

    let (status, body) = get(&lib.state, "/api/komik/one-piece/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"Chapter not found");

    let (status, _) = get(&lib.state, "/api/komik/..").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn image_endpoint_serves_files_inside_root_only() {
    let lib = library();

    let (status, body) = get(
        &lib.state,
        "/api/image?path=one-piece%2F2%2Fscaled_image_2.png",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"two");

    let (status, body) = get(&lib.state, "/api/image").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"File path not specified");

    let (status, _) = get(&lib.state, "/api/image?path=one-piece%2F2%2Fnope.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&lib.state, "/api/image?path=..%2Fsecret.png").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn every_response_carries_cors_headers() {
    let lib = library();

    let response = build_router(lib.state.clone())
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/komik")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );

    let response = build_router(lib.state.clone())
        .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, OPTIONS"
    );
}

#[tokio::test]
async fn index_page_and_history_are_served() {
    let lib = library();

    let (status, body) = get(&lib.state, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("/assets/app.js"));

    let history = get_json(&lib.state, "/api/history").await;
    assert_eq!(history, serde_json::json!([]));

    let mut ledger = HistoryLedger::load(&lib.history, 10);
    ledger.record_access("https://komiku.id/manga/one-piece/", "one-piece");
    let history = get_json(&lib.state, "/api/history").await;
    assert_eq!(history[0]["title"], "one-piece");
    assert!(history[0]["lastAccessed"].is_string());
}
