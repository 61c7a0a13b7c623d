use crate::core_modules::light_map::{photo_identity, LightMaps};
use crate::core_modules::tile_pattern::{self, decode_texture_bytes, TextureRef};
use crate::error::RenderError;
use crate::pipeline::{CompositeRequest, RenderConfig, RenderPipeline};
use futures::future::BoxFuture;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Light maps kept per worker before the cache resets. A preview session
/// revisits one photo many times, so even a small cache absorbs nearly every
/// rebuild.
const LIGHT_MAP_CACHE_CAP: usize = 8;

/// Boundary for resolving remote texture URLs. Implementations live with the
/// embedder; the queue only needs the encoded bytes back.
pub trait TextureFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<Vec<u8>, String>>;
}

/// Fetcher used when none is installed: every URL is unavailable.
pub struct NoFetcher;

impl TextureFetcher for NoFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<Vec<u8>, String>> {
        let message = format!("no fetcher installed for {url}");
        Box::pin(async move { Err(message) })
    }
}

/// A finished render, encoded for transport.
#[derive(Debug, Clone)]
pub struct EncodedRaster {
    pub width: u32,
    pub height: u32,
    pub png: Arc<[u8]>,
}

/// The queue's reply for one request. Failures travel the same path as
/// successes and carry the request's correlation id.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub correlation_id: String,
    pub outcome: Result<EncodedRaster, RenderError>,
}

pub struct RenderTask {
    pub request: CompositeRequest,
    pub result_sender: oneshot::Sender<CompositeResult>,
}

/// Message type for the dispatcher and render workers
enum QueueMessage {
    Job(RenderTask),
    Shutdown,
}

/// Async front door of the compositing engine. Jobs fan out round-robin over
/// a fixed pool of worker tasks; each job replies over its own oneshot
/// channel, so every accepted request produces exactly one result.
pub struct RenderQueue {
    task_sender: mpsc::UnboundedSender<QueueMessage>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl RenderQueue {
    pub fn new(config: RenderConfig) -> Self {
        Self::with_fetcher(config, Arc::new(NoFetcher))
    }

    pub fn with_fetcher(config: RenderConfig, fetcher: Arc<dyn TextureFetcher>) -> Self {
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<QueueMessage>();
        let worker_count = num_cpus::get().max(1);

        // Create a single dispatcher that distributes jobs to workers
        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<QueueMessage>())
            .unzip();

        // Spawn dispatcher
        let dispatcher_senders = worker_senders;
        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(message) = task_receiver.recv().await {
                match message {
                    QueueMessage::Job(task) => {
                        let _ = dispatcher_senders[worker_idx].send(QueueMessage::Job(task));
                        worker_idx = (worker_idx + 1) % dispatcher_senders.len();
                    }
                    QueueMessage::Shutdown => {
                        for sender in &dispatcher_senders {
                            let _ = sender.send(QueueMessage::Shutdown);
                        }
                        break;
                    }
                }
            }
        });

        // Spawn workers; each owns its pipeline and light-map cache
        let mut workers = Vec::new();
        for mut worker_receiver in worker_receivers {
            let worker_pipeline = RenderPipeline::new(config.clone());
            let worker_fetcher = Arc::clone(&fetcher);

            let worker = tokio::spawn(async move {
                let mut light_map_cache: HashMap<u64, Arc<LightMaps>> = HashMap::new();

                while let Some(message) = worker_receiver.recv().await {
                    match message {
                        QueueMessage::Job(task) => {
                            let result = Self::render_job(
                                &worker_pipeline,
                                &mut light_map_cache,
                                worker_fetcher.as_ref(),
                                task.request,
                            )
                            .await;
                            let _ = task.result_sender.send(result);
                        }
                        QueueMessage::Shutdown => break,
                    }
                }
            });

            workers.push(worker);
        }

        Self {
            task_sender,
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Submit one request and await its result. The queue itself never loses
    /// a job; an `Err` here means the queue has been shut down.
    pub async fn submit(
        &self,
        request: CompositeRequest,
    ) -> Result<CompositeResult, &'static str> {
        tracing::debug!(correlation_id = %request.correlation_id, "composite job submitted");
        let (result_sender, result_receiver) = oneshot::channel();

        let task = RenderTask {
            request,
            result_sender,
        };

        self.task_sender
            .send(QueueMessage::Job(task))
            .map_err(|_| "Failed to send job to render queue")?;

        result_receiver
            .await
            .map_err(|_| "Failed to receive result from render worker")
    }

    /// Shutdown the dispatcher and all worker tasks cleanly. Jobs already
    /// dispatched still finish and reply.
    pub fn shutdown(&self) {
        let _ = self.task_sender.send(QueueMessage::Shutdown);
    }

    async fn render_job(
        pipeline: &RenderPipeline,
        light_map_cache: &mut HashMap<u64, Arc<LightMaps>>,
        fetcher: &dyn TextureFetcher,
        request: CompositeRequest,
    ) -> CompositeResult {
        let correlation_id = request.correlation_id.clone();
        let outcome =
            Self::render_outcome(pipeline, light_map_cache, fetcher, &request).await;

        match &outcome {
            Ok(raster) => tracing::debug!(
                correlation_id = %correlation_id,
                width = raster.width,
                height = raster.height,
                "composite job complete"
            ),
            Err(error) => tracing::warn!(
                correlation_id = %correlation_id,
                error = %error,
                "composite job failed"
            ),
        }

        CompositeResult {
            correlation_id,
            outcome,
        }
    }

    async fn render_outcome(
        pipeline: &RenderPipeline,
        light_map_cache: &mut HashMap<u64, Arc<LightMaps>>,
        fetcher: &dyn TextureFetcher,
        request: &CompositeRequest,
    ) -> Result<EncodedRaster, RenderError> {
        let texture = Self::resolve_texture(fetcher, &request.material.texture).await?;

        // Read-through cache: light maps depend only on photo content, so
        // jobs on the same photo reuse them.
        let identity = photo_identity(request.photo.as_ref());
        let maps = match light_map_cache.get(&identity) {
            Some(maps) => Arc::clone(maps),
            None => {
                if light_map_cache.len() >= LIGHT_MAP_CACHE_CAP {
                    light_map_cache.clear();
                }
                let maps = Arc::new(pipeline.build_light_maps(request.photo.as_ref()));
                light_map_cache.insert(identity, Arc::clone(&maps));
                maps
            }
        };

        let raster = pipeline.render_with_maps(request, texture.as_ref(), maps.as_ref())?;
        Self::encode_png(&raster)
    }

    async fn resolve_texture(
        fetcher: &dyn TextureFetcher,
        texture: &TextureRef,
    ) -> Result<Arc<RgbaImage>, RenderError> {
        match texture {
            TextureRef::Remote(url) => {
                let bytes = fetcher
                    .fetch(url)
                    .await
                    .map_err(RenderError::MaterialUnavailable)?;
                Ok(Arc::new(decode_texture_bytes(&bytes)?))
            }
            local => tile_pattern::resolve_texture_sync(local),
        }
    }

    fn encode_png(raster: &RgbaImage) -> Result<EncodedRaster, RenderError> {
        let mut png = Vec::new();
        let encoder = PngEncoder::new(&mut png);
        encoder
            .write_image(
                raster.as_raw(),
                raster.width(),
                raster.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|error| RenderError::EncodingFailure(error.to_string()))?;

        Ok(EncodedRaster {
            width: raster.width(),
            height: raster.height(),
            png: Arc::from(png),
        })
    }
}

impl Drop for RenderQueue {
    fn drop(&mut self) {
        // Best effort shutdown on drop
        let _ = self.task_sender.send(QueueMessage::Shutdown);
    }
}
