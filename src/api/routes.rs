use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize;

    Router::new()
        .route("/health", get(handlers::health))
        // Photos
        .route("/photo", get(handlers::list_photos))
        .route(
            "/photo",
            post(handlers::upload_photo).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/photo/:photoName", get(handlers::get_photo))
        .route("/photo/:photoName", delete(handlers::delete_photo))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{multipart_body, test_state, MULTIPART_BOUNDARY};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    async fn send(
        router: Router,
        request: Request<Body>,
    ) -> (StatusCode, header::HeaderMap, Bytes) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    fn json(body: &Bytes) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn upload(file_name: &str, content_type: Option<&str>, data: &[u8]) -> Request<Body> {
        Request::post("/photo")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(multipart_body("file", file_name, content_type, data)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _, body) = send(create_router(test_state(&dir)), get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), serde_json::json!({"status": "OK"}));
    }

    #[tokio::test]
    async fn test_list_empty_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _, body) = send(create_router(test_state(&dir)), get_request("/photo")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json(&body),
            serde_json::json!({"numberOfPhotos": 0, "photos": []})
        );
    }

    #[tokio::test]
    async fn test_upload_then_list_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let (status, _, body) = send(
            create_router(state.clone()),
            upload("cat.png", Some("image/png"), PNG),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["message"], "file uploaded successfully");
        let pathname = body["pathname"].as_str().unwrap().to_string();
        assert!(pathname.starts_with("/local/cat.png"));
        // file name + 36-char UUID
        let name = pathname.trim_start_matches("/local/").to_string();
        assert_eq!(name.len(), "cat.png".len() + 36);

        let (status, _, body) = send(create_router(state.clone()), get_request("/photo")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json(&body),
            serde_json::json!({"numberOfPhotos": 1, "photos": [name.clone()]})
        );

        let (status, headers, body) =
            send(create_router(state.clone()), get_request(&format!("/photo/{name}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(&body[..], PNG);

        let request = Request::delete(format!("/photo/{name}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(create_router(state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json(&body),
            serde_json::json!({"message": "file deleted successfully"})
        );

        let (_, _, body) = send(create_router(state), get_request("/photo")).await;
        assert_eq!(json(&body)["numberOfPhotos"], 0);
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        state
            .object_store
            .put("cat-1.png", Bytes::from_static(PNG), "image/png")
            .await
            .unwrap();
        state
            .object_store
            .put("dog-1.png", Bytes::from_static(PNG), "image/png")
            .await
            .unwrap();

        let (status, _, body) = send(create_router(state), get_request("/photo?prefix=cat")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json(&body),
            serde_json::json!({"numberOfPhotos": 1, "photos": ["cat-1.png"]})
        );
    }

    #[tokio::test]
    async fn test_upload_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let (status, _, body) = send(
            create_router(state.clone()),
            upload("notes.txt", Some("text/plain"), b"hello"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json(&body),
            serde_json::json!({"message": "Invalid Content-Type", "error": true})
        );

        let (status, _, _) = send(
            create_router(state.clone()),
            upload("blob", None, b"hello"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(state.object_store.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::post("/photo")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(multipart_body(
                "avatar",
                "cat.png",
                Some("image/png"),
                PNG,
            )))
            .unwrap();

        let (status, _, body) = send(create_router(test_state(&dir)), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["message"], "file field is required");
        assert_eq!(json(&body)["error"], true);
    }

    #[tokio::test]
    async fn test_get_missing_photo() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _, body) =
            send(create_router(test_state(&dir)), get_request("/photo/nope.png")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json(&body),
            serde_json::json!({"message": "Error Reading File", "error": true})
        );
    }

    #[tokio::test]
    async fn test_get_sniffs_content_type_without_stored_type() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        // Written directly, bypassing the sidecar
        std::fs::write(dir.path().join("files").join("raw-upload"), PNG).unwrap();

        let (status, headers, _) =
            send(create_router(state), get_request("/photo/raw-upload")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_delete_missing_photo() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::delete("/photo/nope.png")
            .body(Body::empty())
            .unwrap();

        let (status, _, body) = send(create_router(test_state(&dir)), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(&body)["error"], true);
        assert!(json(&body)["message"]
            .as_str()
            .unwrap()
            .contains("nope.png"));
    }

    #[tokio::test]
    async fn test_upload_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let big = vec![0u8; state.config.max_upload_size as usize + 1];

        let (status, _, _) =
            send(create_router(state.clone()), upload("big.png", Some("image/png"), &big)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(state.object_store.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_drops_directories_from_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let (status, _, body) = send(
            create_router(state.clone()),
            upload("photos/cat.png", Some("image/png"), PNG),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let pathname = json(&body)["pathname"].as_str().unwrap().to_string();
        assert!(pathname.starts_with("/local/cat.png"));

        let photos = state.object_store.list("").await.unwrap();
        assert_eq!(photos.len(), 1);
        assert!(photos[0].starts_with("cat.png"));
    }

    #[tokio::test]
    async fn test_get_unreadable_photo_data() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        // The name exists but cannot be read as a file
        std::fs::create_dir(dir.path().join("files").join("album")).unwrap();

        let (status, _, body) = send(create_router(state), get_request("/photo/album")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json(&body),
            serde_json::json!({"message": "Error Reading File Data", "error": true})
        );
    }

    #[tokio::test]
    async fn test_list_rejects_malformed_query() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _, body) = send(
            create_router(test_state(&dir)),
            get_request("/photo?prefix[nested]=cat"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["error"], true);
        assert!(json(&body)["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid query parameter:"));
    }

    #[tokio::test]
    async fn test_upload_rejects_malformed_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let request = Request::post("/photo")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from("this body has no multipart boundary in it"))
            .unwrap();

        let (status, _, body) = send(create_router(state.clone()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["error"], true);
        assert!(json(&body)["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid multipart data:"));
        assert!(state.object_store.list("").await.unwrap().is_empty());
    }
}
