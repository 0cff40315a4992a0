use axum::Router;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{HeaderValue, Method, Request, StatusCode, header};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use tracing::info;

use super::routes;
use super::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index::index))
        .route("/assets/app.css", get(routes::index::asset_css))
        .route("/assets/app.js", get(routes::index::asset_js))
        .route("/api/komik", get(routes::library::api_titles))
        .route("/api/komik/:title", get(routes::library::api_chapters))
        .route(
            "/api/komik/:title/:chapter",
            get(routes::library::api_images),
        )
        .route("/api/image", get(routes::image::api_image))
        .route("/api/history", get(routes::history::api_history))
        .fallback(not_found)
        .layer(from_fn(cors_and_log_mw))
        .with_state(state)
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// 所有响应都带 CORS 头；预检请求直接返回 204。
async fn cors_and_log_mw(req: Request<axum::body::Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().clone();
    let ip = req
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|c| c.0)
        .map(|a| a.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut resp = if method == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    with_cors(&mut resp);

    info!(target: "web_access", ip = %ip, method = %method, path = %path, status = %resp.status().as_u16(), "ok");
    resp
}

fn with_cors(resp: &mut Response) {
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}
