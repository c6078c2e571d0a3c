use axum::response::IntoResponse;

// Undocumented landing route; probes and humans both hit `/`.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
