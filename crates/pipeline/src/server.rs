use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderValue, header},
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::info;

/// Static files from `dir`, never cached, readable from any origin.
pub fn router(dir: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the review files until the token is cancelled.
pub async fn serve(dir: PathBuf, port: u16, cancel: CancellationToken) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(addr = %addr, dir = %dir.display(), "Serving review files");
    axum::serve(listener, router(&dir))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn serves_files_without_caching() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("doc_review_tasks.json"),
            r#"{"review_tasks": []}"#,
        )
        .unwrap();

        let response = router(dir.path())
            .oneshot(
                Request::builder()
                    .uri("/doc_review_tasks.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "no-store, no-cache, must-revalidate"
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(dir.path())
            .oneshot(Request::builder().uri("/nope.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
