//! Shared HTTP test fixtures. The app runs against in-memory stores and a
//! fake upscaler, with the same middleware stack as production.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use printframe_adapters::{AdapterError, EnhanceOptions, UpscaleService};
use printframe_api::auth::jwt::{generate_access_token, JwtConfig};
use printframe_api::config::ServerConfig;
use printframe_api::router::build_app_router;
use printframe_api::state::AppState;
use printframe_api::ws::WsManager;
use printframe_db::memory::MemoryStore;
use printframe_db::Stores;
use printframe_events::EventBus;
use printframe_pipeline::workflows::WorkflowRegistry;
use printframe_pipeline::{Dispatcher, EnhancementService, PipelineConfig, PipelineDeps};
use printframe_storage::MemoryAssetStore;
use tower::ServiceExt;

pub const USER: &str = "u1";
pub const OTHER_USER: &str = "u2";
const SECRET: &str = "test-secret-that-is-long-enough-for-hmac";
const BOUNDARY: &str = "printframe-test-boundary";

/// Returns its input unchanged.
pub struct EchoUpscaler;

#[async_trait]
impl UpscaleService for EchoUpscaler {
    async fn sharpen(&self, image: Vec<u8>) -> Result<Vec<u8>, AdapterError> {
        Ok(image)
    }

    async fn enhance(&self, image: Vec<u8>, _options: &EnhanceOptions) -> Result<Vec<u8>, AdapterError> {
        Ok(image)
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        embedded_worker: false,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub assets: Arc<MemoryAssetStore>,
    pub bus: Arc<EventBus>,
    pub dispatcher: Dispatcher,
}

impl TestApp {
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let assets = Arc::new(MemoryAssetStore::new("photos"));
        let bus = Arc::new(EventBus::default());
        let stores = Stores::memory(store.clone());

        let upscaler: Arc<dyn UpscaleService> = Arc::new(EchoUpscaler);
        let deps = PipelineDeps::new(&stores, assets.clone(), bus.clone()).with_upscaler(Some(upscaler));
        let service = EnhancementService::new(deps.clone(), stores.runs.clone());
        let pipeline_config = PipelineConfig::default();
        let dispatcher = Dispatcher::new(
            stores.runs.clone(),
            stores.steps.clone(),
            WorkflowRegistry::standard(deps),
            &pipeline_config,
        );

        let state = AppState {
            service,
            config: Arc::new(config.clone()),
            ws_manager: Arc::new(WsManager::new()),
            event_bus: bus.clone(),
            pool: None,
        };
        let router = build_app_router(state.clone(), &config);

        Self {
            router,
            state,
            store,
            assets,
            bus,
            dispatcher,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, user: Option<&str>) -> Response<Body> {
        self.send(request(Method::GET, uri, user, None, Body::empty())).await
    }

    pub async fn post_json(&self, uri: &str, user: &str, body: serde_json::Value) -> Response<Body> {
        self.send(request(
            Method::POST,
            uri,
            Some(user),
            Some("application/json"),
            Body::from(body.to_string()),
        ))
        .await
    }

    /// POST a multipart form with a `file` part and optional text fields.
    pub async fn post_multipart(
        &self,
        uri: &str,
        user: &str,
        file_name: &str,
        bytes: &[u8],
        fields: &[(&str, &str)],
    ) -> Response<Body> {
        let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
        self.send(request(
            Method::POST,
            uri,
            Some(user),
            Some(&content_type),
            Body::from(multipart_body(file_name, bytes, fields)),
        ))
        .await
    }

    /// Upload an original and save a 3:2 crop; returns the photo JSON.
    pub async fn cropped_photo(&self, user: &str) -> serde_json::Value {
        let jpeg = test_jpeg(48, 32);
        let response = self.post_multipart("/api/v1/photos", user, "beach.jpg", &jpeg, &[]).await;
        let id = body_json(response).await["data"]["id"].as_i64().unwrap();

        let response = self
            .post_multipart(
                &format!("/api/v1/photos/{id}/crop"),
                user,
                "crop.jpg",
                &jpeg,
                &[("aspectRatio", "3:2")],
            )
            .await;
        body_json(response).await["data"].clone()
    }
}

pub fn token_for(user: &str) -> String {
    let config = JwtConfig {
        secret: SECRET.to_string(),
    };
    generate_access_token(user, 900, &config).unwrap()
}

fn request(
    method: Method,
    uri: &str,
    user: Option<&str>,
    content_type: Option<&str>,
    body: Body,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("authorization", format!("Bearer {}", token_for(user)));
    }
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder.body(body).unwrap()
}

fn multipart_body(file_name: &str, bytes: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Mid-tone gradient, encoded as JPEG.
pub fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(60 + x * 90 / width) as u8, (80 + y * 70 / height) as u8, 110])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}
