//! Shared fixtures: in-memory stores, fake remote services and a wired
//! service/dispatcher pair.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use printframe_adapters::{AdapterError, EnhanceOptions, UpscaleService, VisionService};
use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::photo::{AspectRatio, Photo};
use printframe_db::memory::MemoryStore;
use printframe_db::{PhotoStore, Stores};
use printframe_events::EventBus;
use printframe_pipeline::workflows::WorkflowRegistry;
use printframe_pipeline::{Dispatcher, EnhancementService, PipelineConfig, PipelineDeps, RetryPolicy};
use printframe_storage::MemoryAssetStore;

pub const USER: &str = "u1";
pub const OTHER_USER: &str = "u2";

// ---------------------------------------------------------------------------
// Fake remote services
// ---------------------------------------------------------------------------

/// Upscaler that echoes its input, or fails with a fixed HTTP error.
#[derive(Default)]
pub struct FakeUpscaler {
    pub sharpen_calls: AtomicUsize,
    pub enhance_calls: AtomicUsize,
    sharpen_failure: Mutex<Option<(u16, String)>>,
}

impl FakeUpscaler {
    pub fn fail_sharpen(&self, status: u16, body: &str) {
        *self.sharpen_failure.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn sharpen_calls(&self) -> usize {
        self.sharpen_calls.load(Ordering::SeqCst)
    }

    pub fn enhance_calls(&self) -> usize {
        self.enhance_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpscaleService for FakeUpscaler {
    async fn sharpen(&self, image: Vec<u8>) -> Result<Vec<u8>, AdapterError> {
        self.sharpen_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((status, body)) = self.sharpen_failure.lock().unwrap().clone() {
            return Err(AdapterError::Api {
                operation: "Sharpen",
                status,
                status_text: format!("{status} Service Unavailable"),
                body,
            });
        }
        Ok(image)
    }

    async fn enhance(&self, image: Vec<u8>, options: &EnhanceOptions) -> Result<Vec<u8>, AdapterError> {
        assert_eq!(options, &EnhanceOptions::default());
        self.enhance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(image)
    }
}

/// Vision service returning a fixed recommendation.
pub struct FakeVision {
    pub calls: AtomicUsize,
    pub recommendation: AdjustmentParameters,
}

impl Default for FakeVision {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            recommendation: AdjustmentParameters {
                explanation: Some("Lift the shadows slightly.".into()),
                ..AdjustmentParameters::new(12.0, 8.0, 5.0, 10.0, -4.0, 25.0)
            },
        }
    }
}

#[async_trait]
impl VisionService for FakeVision {
    async fn analyze(&self, image: &[u8], content_type: &str) -> Result<AdjustmentParameters, AdapterError> {
        assert!(!image.is_empty());
        assert_eq!(content_type, "image/jpeg");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.recommendation.clone())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub assets: Arc<MemoryAssetStore>,
    pub bus: Arc<EventBus>,
    pub upscaler: Arc<FakeUpscaler>,
    pub vision: Arc<FakeVision>,
    pub service: EnhancementService,
    pub dispatcher: Dispatcher,
}

pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        poll_interval: Duration::from_millis(10),
        retry: RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_attempts: 4,
        },
        stale_after: Duration::from_millis(300),
        heartbeat_interval: Duration::from_millis(20),
        ..PipelineConfig::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// No upscale credential configured.
    pub fn without_upscaler() -> Self {
        Self::build(false)
    }

    fn build(with_upscaler: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let assets = Arc::new(MemoryAssetStore::new("photos"));
        let bus = Arc::new(EventBus::default());
        let upscaler = Arc::new(FakeUpscaler::default());
        let vision = Arc::new(FakeVision::default());

        let stores = Stores::memory(store.clone());
        let upscale_service: Option<Arc<dyn UpscaleService>> = if with_upscaler {
            Some(upscaler.clone())
        } else {
            None
        };
        let vision_service: Arc<dyn VisionService> = vision.clone();
        let deps = PipelineDeps::new(&stores, assets.clone(), bus.clone())
            .with_upscaler(upscale_service)
            .with_vision(Some(vision_service));

        let service = EnhancementService::new(deps.clone(), stores.runs.clone());
        let dispatcher = Dispatcher::new(
            stores.runs.clone(),
            stores.steps.clone(),
            WorkflowRegistry::standard(deps),
            &fast_config(),
        );

        Self {
            store,
            assets,
            bus,
            upscaler,
            vision,
            service,
            dispatcher,
        }
    }

    /// Upload an original and save a 3:2 crop for `USER`.
    pub async fn cropped_photo(&self) -> Photo {
        let photo = self
            .service
            .create_photo(USER, "beach.JPG", test_jpeg(48, 32))
            .await
            .unwrap();
        self.service
            .save_crop(USER, photo.id, test_jpeg(48, 32), Some(AspectRatio::ThreeByTwo))
            .await
            .unwrap()
    }

    /// A photo whose upscale has completed.
    pub async fn upscaled_photo(&self) -> Photo {
        let photo = self.cropped_photo().await;
        let cropped = photo.cropped_path.clone().unwrap();
        self.service.submit_upscale(USER, photo.id, &cropped).await.unwrap();
        self.dispatcher.run_until_idle().await.unwrap();
        self.photo(photo.id).await
    }

    pub async fn photo(&self, id: i64) -> Photo {
        PhotoStore::find(self.store.as_ref(), id).await.unwrap().unwrap()
    }
}

/// Mid-tone gradient, encoded as JPEG.
pub fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let r = (70 + x * 80 / width) as u8;
        let g = (90 + y * 60 / height) as u8;
        Rgb([r, g, 120])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}
