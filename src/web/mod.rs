//! HTTP API over the meme pipeline.

use std::num::NonZeroU16;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::error::MemeForgeError;
use crate::pipeline::{BatchReport, MemeForge, MemeRecord, MemeRequest};

mod images;

use images::generated_file_handler;

#[derive(Clone)]
pub(crate) struct AppState {
    forge: Arc<MemeForge>,
}

impl AppState {
    fn new(forge: Arc<MemeForge>) -> Self {
        Self { forge }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateBody {
    #[serde(default)]
    situation: Option<String>,
    #[serde(default)]
    style: Option<String>,
    #[serde(default)]
    mood: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchBody {
    #[serde(default)]
    situations: Vec<String>,
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn generate_handler(
    State(state): State<AppState>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<MemeRecord>, MemeForgeError> {
    let Json(body) = body.map_err(|err| MemeForgeError::BadRequest(err.body_text()))?;
    let situation = body
        .situation
        .as_deref()
        .map(str::trim)
        .filter(|situation| !situation.is_empty())
        .ok_or_else(|| MemeForgeError::BadRequest("Situation is required".to_string()))?;

    let request = MemeRequest::new(situation)
        .with_style(body.style.as_deref())
        .with_mood(body.mood.as_deref());
    let record = state.forge.create_meme(&request).await?;
    Ok(Json(record))
}

async fn batch_handler(
    State(state): State<AppState>,
    body: Result<Json<BatchBody>, JsonRejection>,
) -> Result<Json<BatchReport>, MemeForgeError> {
    let Json(body) = body.map_err(|err| MemeForgeError::BadRequest(err.body_text()))?;
    Ok(Json(state.forge.create_batch(&body.situations).await))
}

async fn memes_handler(State(state): State<AppState>) -> Result<Json<Value>, MemeForgeError> {
    let forge = Arc::clone(&state.forge);
    let memes = tokio::task::spawn_blocking(move || forge.store().list()).await??;
    Ok(Json(json!({ "memes": memes })))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/generate", post(generate_handler))
        .route("/batch", post(batch_handler))
        .route("/memes", get(memes_handler))
        .route("/static/generated/{filename}", get(generated_file_handler))
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(cors)
        .with_state(state)
}

/// Serve the API until the listener fails.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    forge: Arc<MemeForge>,
) -> Result<(), anyhow::Error> {
    let app = create_router(AppState::new(forge));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH};
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tower::ServiceExt;

    use crate::compositor::{BlockTypeface, ComposeOptions, Compositor};
    use crate::providers::{ImageGenerator, ProviderError, Providers, TextGenerator};
    use crate::storage::MemeStore;

    struct FixedText;

    #[async_trait]
    impl TextGenerator for FixedText {
        async fn generate_text(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok("Standup at 9---Still talking at 10".to_string())
        }
    }

    struct GrayImage;

    #[async_trait]
    impl ImageGenerator for GrayImage {
        async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, ProviderError> {
            let mut out = Vec::new();
            DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 60, Rgb([128, 128, 128])))
                .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .map_err(|err| ProviderError::Decode(err.to_string()))?;
            Ok(out)
        }
    }

    struct BrokenImage;

    #[async_trait]
    impl ImageGenerator for BrokenImage {
        async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, ProviderError> {
            Err(ProviderError::Status {
                status: 503,
                body: "overloaded".to_string(),
            })
        }
    }

    fn app_with(image: Arc<dyn ImageGenerator>, dir: &std::path::Path) -> Router {
        let forge = MemeForge::new(
            Providers {
                text: Arc::new(FixedText),
                image,
            },
            Compositor::with_typeface(Arc::new(BlockTypeface), ComposeOptions::default()),
            MemeStore::new(dir),
        );
        create_router(AppState::new(Arc::new(forge)))
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok_on_both_prefixes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(Arc::new(GrayImage), dir.path());

        for uri in ["/health", "/api/health"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(read_json(response).await, json!({"status": "ok"}));
        }
    }

    #[tokio::test]
    async fn generate_requires_a_situation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(Arc::new(GrayImage), dir.path());

        for body in [json!({}), json!({"situation": "   "})] {
            let response = app
                .clone()
                .oneshot(post_json("/generate", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                read_json(response).await,
                json!({"error": "Situation is required"})
            );
        }
    }

    #[tokio::test]
    async fn generate_returns_the_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(Arc::new(GrayImage), dir.path());

        let response = app
            .oneshot(post_json(
                "/api/generate",
                json!({"situation": "Meetings about meetings", "mood": "sarcastic"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["caption"]["top"], "Standup at 9");
        assert_eq!(body["mood"], "sarcastic");
        assert_eq!(body["style"], "cartoon/animation");
        assert_eq!(body["filename"], "meme_001_meetings_about_meetings.png");
        assert!(dir.path().join("meme_001_meetings_about_meetings.png").exists());
    }

    #[tokio::test]
    async fn provider_failure_is_a_500_with_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(Arc::new(BrokenImage), dir.path());

        let response = app
            .oneshot(post_json("/generate", json!({"situation": "printer on fire"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        let message = body["error"].as_str().expect("error message");
        assert!(message.contains("503"), "{message}");
    }

    #[tokio::test]
    async fn batch_reports_counts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(Arc::new(GrayImage), dir.path());

        let response = app
            .oneshot(post_json(
                "/batch",
                json!({"situations": ["one thing", "another thing"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["generated"], 2);
        assert_eq!(body["results"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn memes_lists_what_was_generated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(Arc::new(GrayImage), dir.path());
        std::fs::write(dir.path().join("notes.txt"), b"ignored").expect("write");

        let response = app
            .clone()
            .oneshot(post_json("/generate", json!({"situation": "reply all"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/memes")).await.unwrap();
        let body = read_json(response).await;
        let memes = body["memes"].as_array().expect("memes array");
        assert_eq!(memes.len(), 1);
        assert_eq!(memes[0]["filename"], "meme_001_reply_all.png");
        assert_eq!(memes[0]["url"], "/static/generated/meme_001_reply_all.png");
    }

    #[tokio::test]
    async fn static_files_are_served_with_cache_headers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(Arc::new(GrayImage), dir.path());
        std::fs::write(dir.path().join("meme_001_x.png"), b"not really a png").expect("write");

        let response = app
            .clone()
            .oneshot(get("/static/generated/meme_001_x.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        let etag = response.headers()[ETAG].clone();

        let request = Request::builder()
            .uri("/static/generated/meme_001_x.png")
            .header(IF_NONE_MATCH, etag)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn static_rejects_missing_and_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(Arc::new(GrayImage), dir.path());

        for uri in [
            "/static/generated/nope.png",
            "/static/generated/..%2Fsecret.png",
            "/static/generated/.hidden",
        ] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }
}
