use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};

use crate::ui::web::templates;

fn no_cache(resp: &mut Response) {
    resp.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    resp.headers_mut()
        .insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    resp.headers_mut()
        .insert(header::EXPIRES, HeaderValue::from_static("0"));
}

pub(crate) async fn index() -> impl IntoResponse {
    let mut resp = Html(templates::INDEX_HTML).into_response();
    no_cache(&mut resp);
    resp
}

fn text_asset(body: &'static str, content_type: &'static str) -> Response {
    let mut resp = Response::new(body.into());
    *resp.status_mut() = StatusCode::OK;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    no_cache(&mut resp);
    resp
}

pub(crate) async fn asset_css() -> Response {
    text_asset(templates::APP_CSS, "text/css; charset=utf-8")
}

pub(crate) async fn asset_js() -> Response {
    text_asset(
        templates::APP_JS,
        "application/javascript; charset=utf-8",
    )
}
