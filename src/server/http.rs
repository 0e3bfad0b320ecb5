//! HTTP ingestion endpoint for JsonLog

use crate::config::{is_doc_type_name, is_platform_name};
use crate::stream::{Lookup, StreamRegistry};
use crate::types::CollectedRecord;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Build the ingestion router: `POST /collect/{platform}/{doc_type}`
pub fn router(registry: Arc<StreamRegistry>) -> Router {
    Router::new()
        .route("/collect/{platform}/{doc_type}", post(collect))
        .with_state(registry)
}

async fn collect(
    State(registry): State<Arc<StreamRegistry>>,
    Path((platform, doc_type)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    if !is_platform_name(&platform) || !is_doc_type_name(&doc_type) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let channel = match registry.lookup(&platform, &doc_type) {
        Lookup::Ready(channel) => channel,
        Lookup::UnknownPlatform => {
            return (StatusCode::BAD_REQUEST, "Invalid platform").into_response();
        }
        Lookup::UnknownDocType => {
            return (StatusCode::BAD_REQUEST, "Invalid doc type").into_response();
        }
        Lookup::Unavailable => {
            return (
                StatusCode::NOT_IMPLEMENTED,
                "Unknown doc_type, need to add to whitelist and restart collect",
            )
                .into_response();
        }
    };

    let mut record = match CollectedRecord::parse(&body) {
        Ok(record) => record,
        Err(err) => {
            debug!(%platform, %doc_type, error = %err, "rejected body");
            return (StatusCode::BAD_REQUEST, "Wrong Json Body").into_response();
        }
    };
    record.stamp(&platform, &doc_type, Utc::now());

    let message = match record.to_json() {
        Ok(message) => message,
        Err(err) => {
            error!(%platform, %doc_type, error = %err, "could not serialize record");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match channel.submit(message).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!(%platform, %doc_type, error = %err, "stream refused record");
            (StatusCode::SERVICE_UNAVAILABLE, "Stream closed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn post_json(app: Router, uri: &str, body: &str) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    fn registry(dir: &std::path::Path) -> Arc<StreamRegistry> {
        let mut config = ServerConfig::default();
        config.storage.data_dir = dir.to_path_buf();
        config
            .platforms
            .insert("web".to_string(), vec!["click".to_string()]);
        Arc::new(StreamRegistry::from_config(&config).unwrap())
    }

    #[tokio::test]
    async fn test_status_codes() {
        let dir = tempdir().unwrap();
        let app = router(registry(dir.path()));

        assert_eq!(
            post_json(app.clone(), "/collect/web/click", r#"{"uid":1}"#).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            post_json(app.clone(), "/collect/ios/click", "{}").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            post_json(app.clone(), "/collect/web/purchase", "{}").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            post_json(app.clone(), "/collect/web/click", "not json").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            post_json(app.clone(), "/collect/web/click", "[1]").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            post_json(app.clone(), "/collect/Web/click", "{}").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            post_json(app, "/collect/web/click_2", "{}").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_closed_stream_is_unavailable() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        registry.close_all().await;

        let status = post_json(router(registry), "/collect/web/click", "{}").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
