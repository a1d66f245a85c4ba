//! Debounced interactive preview rendering.
//!
//! Edits arrive faster than renders finish. Only the newest parameters
//! after a quiet period are rendered, and a render overtaken by a newer
//! edit while it ran is dropped instead of published.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use printframe_core::adjustments::AdjustmentParameters;
use printframe_imaging::preview::{load_preview_source, render_preview};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::ClientError;

/// Quiet period before a render starts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// One published preview.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    /// Sequence number of the edit this frame renders.
    pub generation: u64,
    pub params: AdjustmentParameters,
    pub image: Arc<RgbaImage>,
}

type Request = (u64, AdjustmentParameters);

pub struct PreviewRenderer {
    requests: mpsc::UnboundedSender<Request>,
    latest: Arc<AtomicU64>,
    frames: watch::Receiver<Option<PreviewFrame>>,
    task: JoinHandle<()>,
}

impl PreviewRenderer {
    /// Start a renderer over an already decoded working copy. Must be
    /// called from within a Tokio runtime.
    pub fn new(source: RgbaImage, debounce: Duration) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = watch::channel(None);
        let latest = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(render_loop(
            Arc::new(source),
            debounce,
            requests_rx,
            Arc::clone(&latest),
            frames_tx,
        ));

        Self {
            requests: requests_tx,
            latest,
            frames: frames_rx,
            task,
        }
    }

    /// Decode `bytes`, shrink to `max_edge` and start a renderer over it.
    pub async fn from_bytes(bytes: Vec<u8>, max_edge: u32, debounce: Duration) -> Result<Self, ClientError> {
        let source = tokio::task::spawn_blocking(move || load_preview_source(&bytes, max_edge))
            .await??;
        Ok(Self::new(source, debounce))
    }

    /// Queue an edit and return its generation number.
    pub fn update(&self, params: AdjustmentParameters) -> u64 {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        if self.requests.send((generation, params.clamped())).is_err() {
            tracing::warn!(generation, "Preview renderer has stopped");
        }
        generation
    }

    pub fn latest_frame(&self) -> Option<PreviewFrame> {
        self.frames.borrow().clone()
    }

    /// Receiver notified whenever a frame is published.
    pub fn frames(&self) -> watch::Receiver<Option<PreviewFrame>> {
        self.frames.clone()
    }
}

impl Drop for PreviewRenderer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn render_loop(
    source: Arc<RgbaImage>,
    debounce: Duration,
    mut requests: mpsc::UnboundedReceiver<Request>,
    latest: Arc<AtomicU64>,
    frames: watch::Sender<Option<PreviewFrame>>,
) {
    while let Some(mut request) = requests.recv().await {
        // Every newer edit restarts the quiet period.
        loop {
            match tokio::time::timeout(debounce, requests.recv()).await {
                Ok(Some(newer)) => request = newer,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        let (generation, params) = request;
        let working = Arc::clone(&source);
        let render_params = params.clone();
        let rendered = match tokio::task::spawn_blocking(move || render_preview(&working, &render_params)).await {
            Ok(image) => image,
            Err(e) => {
                tracing::error!(generation, error = %e, "Preview render task failed");
                continue;
            }
        };

        if generation != latest.load(Ordering::Acquire) {
            tracing::debug!(generation, "Discarding superseded preview");
            continue;
        }
        frames.send_replace(Some(PreviewFrame {
            generation,
            params,
            image: Arc::new(rendered),
        }));
    }
}
