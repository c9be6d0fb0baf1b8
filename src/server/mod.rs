//! Upload-form HTTP server
//!
//! One page at `/`: `GET` shows the form, `POST` saves the uploaded image
//! under `static/uploads/` and renders the predicted label. Everything under
//! `static/` is served as files so the page can show the upload.

pub mod render;
pub mod routes;
pub mod state;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use burn::tensor::backend::Backend;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::{AppState, ServerConfig, SharedState};

/// Largest accepted request body
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Build the application router
pub fn build_router<B: Backend>(state: SharedState<B>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route(
            "/",
            get(routes::index::show::<B>).post(routes::index::upload::<B>),
        )
        .nest_service("/static", static_files)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until the process is stopped
pub async fn serve<B: Backend>(state: SharedState<B>) -> std::io::Result<()> {
    let addr = state.config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Serving on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::inference::Predictor;
    use crate::model::LeafClassifierConfig;

    type TestBackend = NdArray;

    const BOUNDARY: &str = "leafboundary";
    const LABELS: [&str; 3] = ["Black Sigatoka", "Cordana", "Healthy"];

    struct TestContext {
        _dir: TempDir,
        config: ServerConfig,
        app: Router,
    }

    impl TestContext {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = ServerConfig {
                static_dir: dir.path().join("static"),
                artifact: dir.path().join("banana_leaf_model"),
                train_dir: dir.path().join("dataset/train"),
                ..ServerConfig::default()
            };
            std::fs::create_dir_all(config.upload_dir()).unwrap();

            let device = Default::default();
            let model = LeafClassifierConfig::new(LABELS.len())
                .with_input_size(16)
                .with_conv_filters(vec![4])
                .with_hidden_units(8)
                .init::<TestBackend>(&device)
                .unwrap();
            let labels = LABELS.iter().map(|s| s.to_string()).collect();
            let predictor = Predictor::new(model, labels, 16, device).unwrap();

            let state = Arc::new(AppState::new(config.clone(), predictor));
            Self {
                _dir: dir,
                config,
                app: build_router(state),
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, String::from_utf8_lossy(&bytes).to_string())
        }

        async fn post_parts(&self, parts: &[(&str, Option<&str>, Vec<u8>)]) -> (StatusCode, String) {
            let request = Request::builder()
                .method("POST")
                .uri("/")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap();
            self.send(request).await
        }
    }

    fn multipart_body(parts: &[(&str, Option<&str>, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn png_bytes(color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(24, 24, Rgb(color));
        let mut cursor = std::io::Cursor::new(Vec::new());
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    fn result_of(body: &str) -> Option<&str> {
        let start = body.find(r#"<strong id="result">"#)? + r#"<strong id="result">"#.len();
        let end = body[start..].find("</strong>")? + start;
        Some(&body[start..end])
    }

    #[tokio::test]
    async fn get_renders_empty_form() {
        let ctx = TestContext::new();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let (status, body) = ctx.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"name="leaf_image""#));
        assert_eq!(result_of(&body), None);
        assert!(!body.contains("leaf-preview"));
    }

    #[tokio::test]
    async fn post_without_file_field_reports_no_file_part() {
        let ctx = TestContext::new();
        let (status, body) = ctx
            .post_parts(&[("comment", None, b"hello".to_vec())])
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(result_of(&body), Some("No file part"));
        assert!(!body.contains("leaf-preview"));
    }

    #[tokio::test]
    async fn post_without_multipart_body_reports_no_file_part() {
        let ctx = TestContext::new();
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("a=b"))
            .unwrap();

        let (status, body) = ctx.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result_of(&body), Some("No file part"));
    }

    #[tokio::test]
    async fn post_with_empty_filename_reports_no_selected_file() {
        let ctx = TestContext::new();
        let (status, body) = ctx
            .post_parts(&[("leaf_image", Some(""), Vec::new())])
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(result_of(&body), Some("No selected file"));
        assert!(!body.contains("leaf-preview"));
    }

    #[tokio::test]
    async fn post_with_image_predicts_known_label() {
        let ctx = TestContext::new();
        let data = png_bytes([30, 160, 40]);
        let (status, body) = ctx
            .post_parts(&[("leaf_image", Some("leaf.png"), data.clone())])
            .await;

        assert_eq!(status, StatusCode::OK);
        let label = result_of(&body).unwrap();
        assert!(LABELS.contains(&label), "unexpected label {label}");
        assert!(body.contains(r#"src="static/uploads/leaf.png""#));

        let saved = std::fs::read(ctx.config.upload_dir().join("leaf.png")).unwrap();
        assert_eq!(saved, data);

        let request = Request::builder()
            .uri("/static/uploads/leaf.png")
            .body(Body::empty())
            .unwrap();
        let (status, _) = ctx.send(request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn same_image_gets_same_label() {
        let ctx = TestContext::new();
        let data = png_bytes([90, 60, 20]);

        let (_, first) = ctx
            .post_parts(&[("leaf_image", Some("a.png"), data.clone())])
            .await;
        let (_, second) = ctx
            .post_parts(&[("leaf_image", Some("b.png"), data)])
            .await;

        assert_eq!(result_of(&first), result_of(&second));
    }

    #[tokio::test]
    async fn reupload_overwrites_saved_file() {
        let ctx = TestContext::new();
        let first = png_bytes([255, 0, 0]);
        let second = png_bytes([0, 0, 255]);

        let (status, _) = ctx
            .post_parts(&[("leaf_image", Some("same.png"), first)])
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = ctx
            .post_parts(&[("leaf_image", Some("same.png"), second.clone())])
            .await;
        assert_eq!(status, StatusCode::OK);

        let saved = std::fs::read(ctx.config.upload_dir().join("same.png")).unwrap();
        assert_eq!(saved, second);
    }

    #[tokio::test]
    async fn path_components_are_stripped_from_filename() {
        let ctx = TestContext::new();
        let (status, body) = ctx
            .post_parts(&[("leaf_image", Some("../../escape.png"), png_bytes([1, 2, 3]))])
            .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("static/uploads/escape.png"));
        assert!(ctx.config.upload_dir().join("escape.png").is_file());
    }

    #[tokio::test]
    async fn undecodable_upload_is_bad_request_but_saved() {
        let ctx = TestContext::new();
        let (status, body) = ctx
            .post_parts(&[("leaf_image", Some("notes.png"), b"not an image".to_vec())])
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("not a readable image"));
        assert!(ctx.config.upload_dir().join("notes.png").is_file());
    }

    #[tokio::test]
    async fn truncated_multipart_is_bad_request() {
        let ctx = TestContext::new();
        let body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"leaf_image\"; filename=\"x.png\"\r\n\r\nabc",
            BOUNDARY
        );
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, _) = ctx.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
