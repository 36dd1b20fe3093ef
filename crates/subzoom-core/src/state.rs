//! Lifecycle owner of one subsampled image: loads the source decoder and a
//! preview in the background, plans tiles from a [`ZoomState`] and hands the
//! decode passes to a [`TileScheduler`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, error, info, warn};

use crate::config::TileConfig;
use crate::decoder::{Bitmap, DecoderFactory, ImageSource, PixelFormat};
use crate::error::Result;
use crate::events::{EventSink, LoadEvent, RepaintCallback};
use crate::geometry::{round_size, rect_is_empty, IntRect, IntSize};
use crate::sync::lock;
use crate::tiles::{
    plan_tiles, preview_sample_size, DecodeContext, PlanInputs, PreviewTile, SnapshotTile,
    TilePool, TileScheduler,
};
use crate::zoom::ZoomState;

/// Produces the encoded source. Runs once on the source loader thread.
pub type SourceProvider = Box<dyn FnOnce() -> Result<ImageSource> + Send>;

/// Produces a ready-made preview. Runs once on the preview loader thread.
pub type PreviewProvider = Box<dyn FnOnce() -> Result<Bitmap> + Send>;

pub struct SubsamplingOptions {
    /// Source dimensions if known up front. Lets tiles plan before the decoder
    /// reports its size.
    pub source_size: IntSize,
    pub tiles: TileConfig,
    pub pixel_format: PixelFormat,
    /// Externally owned preview. Returned through [`LoadEvent::DisposePreview`]
    /// on teardown. Without it a preview is decoded from the source.
    pub preview_provider: Option<PreviewProvider>,
    pub events: Option<mpsc::Sender<LoadEvent>>,
    pub repaint: Option<RepaintCallback>,
}

impl Default for SubsamplingOptions {
    fn default() -> Self {
        Self {
            source_size: IntSize::ZERO,
            tiles: TileConfig::default(),
            pixel_format: PixelFormat::default(),
            preview_provider: None,
            events: None,
            repaint: None,
        }
    }
}

/// What the renderer draws for one frame.
#[derive(Clone, Debug)]
pub struct RenderSnapshot {
    pub preview_tile: Option<PreviewTile>,
    pub display_tiles: Arc<[SnapshotTile]>,
}

/// Values discovered by the loader threads.
struct Loaded {
    context: Arc<DecodeContext>,
    source_size: Mutex<IntSize>,
    aspect_ratio: Mutex<Option<f64>>,
    preview: Mutex<Option<Arc<Bitmap>>>,
    decoder_ready: AtomicBool,
}

impl Loaded {
    fn set_aspect_ratio(&self, size: IntSize) {
        if !size.is_zero() {
            *lock(&self.aspect_ratio) = Some(size.aspect_ratio());
        }
    }

    /// Use `size` only while nothing better is known.
    fn offer_aspect_ratio(&self, size: IntSize) {
        let mut ratio = lock(&self.aspect_ratio);
        if ratio.is_none() && !size.is_zero() {
            *ratio = Some(size.aspect_ratio());
        }
    }

    /// Store the preview and announce it, unless torn down. The event is sent
    /// under the preview lock so it always precedes teardown's events.
    fn store_preview(&self, bitmap: Bitmap) -> bool {
        let size = bitmap.size();
        let mut preview = lock(&self.preview);
        if !self.context.is_active() {
            return false;
        }
        *preview = Some(Arc::new(bitmap));
        self.context.events().emit(LoadEvent::PreviewLoaded {
            width: size.width,
            height: size.height,
        });
        true
    }

    /// Emit a loader failure unless torn down, serialized with teardown like
    /// [`Self::store_preview`].
    fn report(&self, event: LoadEvent) -> bool {
        let _preview = lock(&self.preview);
        if !self.context.is_active() {
            return false;
        }
        self.context.events().emit(event);
        true
    }
}

pub struct SubsamplingState {
    loaded: Arc<Loaded>,
    config: TileConfig,
    external_preview: bool,
    scheduler: Option<TileScheduler>,
    loaders: Vec<JoinHandle<()>>,
    applied_aspect_ratio: Option<f64>,
    last_inputs: Option<PlanInputs>,
    pending: Arc<[SnapshotTile]>,
    destroyed: bool,
}

impl SubsamplingState {
    /// Start loading. `source_provider` and the decoder factory run on a
    /// background thread, as does the preview provider if given.
    pub fn new<P>(
        source_provider: P,
        decoder_factory: Arc<dyn DecoderFactory>,
        options: SubsamplingOptions,
    ) -> Result<Self>
    where
        P: FnOnce() -> Result<ImageSource> + Send + 'static,
    {
        options.tiles.validate()?;
        let SubsamplingOptions {
            source_size,
            tiles,
            pixel_format,
            preview_provider,
            events,
            repaint,
        } = options;

        if preview_provider.is_some() && source_size.is_zero() {
            warn!(
                "preview provider given without a source size; \
                 the image cannot be shown until the source has loaded"
            );
        }

        let events = EventSink::new(events, repaint);
        let context = Arc::new(DecodeContext::with_events(
            TilePool::new(tiles.max_pool_entries),
            pixel_format,
            events,
        ));
        let loaded = Arc::new(Loaded {
            context: context.clone(),
            source_size: Mutex::new(source_size),
            aspect_ratio: Mutex::new(None),
            preview: Mutex::new(None),
            decoder_ready: AtomicBool::new(false),
        });
        context.events().emit(LoadEvent::Loading);
        info!(source_size = %source_size, "subsampling state created");

        let scheduler = TileScheduler::spawn(context)?;
        let external_preview = preview_provider.is_some();
        let mut loaders = Vec::with_capacity(2);

        let source_loaded = loaded.clone();
        let budget = tiles.preview_pixel_budget;
        loaders.push(
            std::thread::Builder::new()
                .name("subzoom-source".into())
                .spawn(move || {
                    load_source(
                        &source_loaded,
                        Box::new(source_provider),
                        decoder_factory.as_ref(),
                        (!external_preview).then_some(budget),
                    )
                })?,
        );

        if let Some(provider) = preview_provider {
            let preview_loaded = loaded.clone();
            loaders.push(
                std::thread::Builder::new()
                    .name("subzoom-preview".into())
                    .spawn(move || load_external_preview(&preview_loaded, provider))?,
            );
        }

        Ok(Self {
            loaded,
            config: tiles,
            external_preview,
            scheduler: Some(scheduler),
            loaders,
            applied_aspect_ratio: None,
            last_inputs: None,
            pending: Arc::from(Vec::new()),
            destroyed: false,
        })
    }

    pub fn source_size(&self) -> IntSize {
        *lock(&self.loaded.source_size)
    }

    pub fn is_decoder_ready(&self) -> bool {
        self.loaded.decoder_ready.load(Ordering::SeqCst)
    }

    pub fn preview(&self) -> Option<Arc<Bitmap>> {
        lock(&self.loaded.preview).clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn tile_config(&self) -> &TileConfig {
        &self.config
    }

    /// Tiles planned for the current transform, decoded or not.
    pub fn pending_tiles(&self) -> Arc<[SnapshotTile]> {
        self.pending.clone()
    }

    /// Tiles of the last completed decode pass.
    pub fn display_tiles(&self) -> Arc<[SnapshotTile]> {
        self.loaded.context.display_tiles()
    }

    pub fn pool_len(&self) -> usize {
        self.loaded.context.pool().len()
    }

    /// Per-frame pump. Applies a newly discovered aspect ratio to `zoom` and
    /// submits a decode pass when the planned tile list changed.
    pub fn sync(&mut self, zoom: &mut ZoomState) {
        if self.destroyed {
            return;
        }
        let discovered = *lock(&self.loaded.aspect_ratio);
        if discovered.is_some() && discovered != self.applied_aspect_ratio {
            if let Some(ratio) = discovered {
                zoom.set_content_aspect_ratio(ratio);
            }
            self.applied_aspect_ratio = discovered;
        }

        let preview_size = self.preview().map(|p| p.size());
        let inputs = PlanInputs::from_zoom(
            zoom,
            self.source_size(),
            preview_size,
            self.is_decoder_ready(),
        );
        if self.last_inputs.as_ref() == Some(&inputs) {
            return;
        }

        let planned: Arc<[SnapshotTile]> =
            Arc::from(plan_tiles(&inputs, self.loaded.context.pool(), &self.config));
        self.last_inputs = Some(inputs);
        if planned[..] == self.pending[..] {
            return;
        }
        debug!(tiles = planned.len(), "pending tiles changed");
        self.pending = planned.clone();
        if let Some(scheduler) = &self.scheduler {
            scheduler.submit(planned);
        }
    }

    /// Preview stretched over the content bounds plus the published tiles.
    pub fn snapshot(&self, zoom: &ZoomState) -> RenderSnapshot {
        let content = zoom.content_bounds();
        let preview_tile = self
            .preview()
            .filter(|_| !rect_is_empty(content))
            .map(|bitmap| PreviewTile {
                bitmap,
                dst_size: round_size(content.size()),
            });
        RenderSnapshot {
            preview_tile,
            display_tiles: self.display_tiles(),
        }
    }

    /// Tear everything down: stop decode passes, close the decoder, release
    /// the preview, then the tile pool. Emits `Destroyed` exactly once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        let context = &self.loaded.context;

        context.deactivate();
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }
        // Loaders blocked in a provider are left to finish on their own; they
        // observe the deactivated context and discard what they produce.
        for handle in self.loaders.drain(..) {
            if handle.is_finished() && handle.join().is_err() {
                warn!("loader thread panicked");
            }
        }

        context.close_decoder();
        self.loaded.decoder_ready.store(false, Ordering::SeqCst);

        if let Some(preview) = lock(&self.loaded.preview).take() {
            if self.external_preview {
                context.events().emit(LoadEvent::DisposePreview(preview));
            }
        }

        self.pending = Arc::from(Vec::new());
        context.pool().clear();
        context.events().emit(LoadEvent::Destroyed);
        info!("subsampling state destroyed");
    }
}

impl Drop for SubsamplingState {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn load_source(
    loaded: &Loaded,
    provider: SourceProvider,
    factory: &dyn DecoderFactory,
    preview_budget: Option<u64>,
) {
    let context = &loaded.context;
    let decoder = provider().and_then(|source| {
        debug!(%source, "source provided");
        factory.create(&source)
    });
    let decoder = match decoder {
        Ok(decoder) => decoder,
        Err(e) => {
            if loaded.report(LoadEvent::SourceLoadError(e.to_string())) {
                error!("failed to load source: {e}");
            }
            return;
        }
    };

    let installed = context.install_decoder_then(decoder, |size| {
        if !size.is_zero() {
            *lock(&loaded.source_size) = size;
            loaded.set_aspect_ratio(size);
        }
        loaded.decoder_ready.store(true, Ordering::SeqCst);
        info!(width = size.width, height = size.height, "source decoder ready");
        context.events().emit(LoadEvent::SourceLoaded {
            width: size.width,
            height: size.height,
        });
    });
    if !installed {
        debug!("source loaded after teardown, decoder closed");
        return;
    }

    if let Some(budget) = preview_budget {
        decode_preview(loaded, budget);
    }
}

/// Derive a preview by decoding the whole source at a coarse sample size.
fn decode_preview(loaded: &Loaded, budget: u64) {
    let context = &loaded.context;
    let full = IntRect::from_size(*lock(&loaded.source_size));
    if full.is_empty() {
        return;
    }
    let sample_size = preview_sample_size(
        IntSize::new(full.width() as u32, full.height() as u32),
        budget,
    );
    let result = {
        let mut decoder = lock(context.decoder());
        match decoder.as_mut() {
            Some(decoder) => decoder.decode_region(full, sample_size, context.format()),
            None => return,
        }
    };

    match result {
        Ok(bitmap) => {
            let size = bitmap.size();
            if loaded.store_preview(bitmap) {
                debug!(sample_size, preview = %size, "preview decoded from source");
            }
        }
        Err(e) => {
            if loaded.report(LoadEvent::PreviewLoadError(e.to_string())) {
                warn!("failed to decode preview: {e}");
            }
        }
    }
}

fn load_external_preview(loaded: &Loaded, provider: PreviewProvider) {
    match provider() {
        Ok(bitmap) => {
            let size = bitmap.size();
            loaded.offer_aspect_ratio(size);
            if loaded.store_preview(bitmap) {
                info!(preview = %size, "preview loaded");
            } else {
                debug!("preview provided after teardown, released");
            }
        }
        Err(e) => {
            if loaded.report(LoadEvent::PreviewLoadError(e.to_string())) {
                warn!("failed to load preview: {e}");
            }
        }
    }
}
