use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use super::pool::TilePool;
use super::tile::{DecodeOutcome, ReusableTile, SnapshotTile};
use crate::decoder::{PixelFormat, RegionDecoder, SharedDecoder};
use crate::error::{Result, SubsamplingError};
use crate::events::{EventSink, LoadEvent};
use crate::geometry::IntSize;
use crate::sync::lock;

/// State shared by the owner of a subsampled image and its decode thread.
pub struct DecodeContext {
    decoder: SharedDecoder,
    pool: TilePool,
    display: Mutex<Arc<[SnapshotTile]>>,
    active: AtomicBool,
    format: PixelFormat,
    events: EventSink,
}

impl DecodeContext {
    pub fn new(pool: TilePool, format: PixelFormat) -> Self {
        Self::with_events(pool, format, EventSink::default())
    }

    pub(crate) fn with_events(pool: TilePool, format: PixelFormat, events: EventSink) -> Self {
        Self {
            decoder: Mutex::new(None),
            pool,
            display: Mutex::new(Arc::from(Vec::new())),
            active: AtomicBool::new(true),
            format,
            events,
        }
    }

    pub fn decoder(&self) -> &SharedDecoder {
        &self.decoder
    }

    /// Hand over the decoder. Refused, and the decoder closed, once deactivated.
    pub fn install_decoder(&self, decoder: Box<dyn RegionDecoder>) -> bool {
        self.install_decoder_then(decoder, |_| {})
    }

    /// Like [`Self::install_decoder`], running `on_installed` while the slot is
    /// still locked so it completes before any teardown can close the decoder.
    pub(crate) fn install_decoder_then(
        &self,
        mut decoder: Box<dyn RegionDecoder>,
        on_installed: impl FnOnce(IntSize),
    ) -> bool {
        let mut slot = lock(&self.decoder);
        if !self.is_active() {
            decoder.close();
            return false;
        }
        let size = decoder.size();
        *slot = Some(decoder);
        on_installed(size);
        true
    }

    /// Close and drop the decoder. Waits for any decode holding it.
    pub fn close_decoder(&self) {
        if let Some(mut decoder) = lock(&self.decoder).take() {
            decoder.close();
        }
    }

    pub fn pool(&self) -> &TilePool {
        &self.pool
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop publishing and drop the published list. Irreversible.
    pub fn deactivate(&self) {
        let mut display = lock(&self.display);
        self.active.store(false, Ordering::SeqCst);
        *display = Arc::from(Vec::new());
    }

    /// The most recently published tile list.
    pub fn display_tiles(&self) -> Arc<[SnapshotTile]> {
        lock(&self.display).clone()
    }

    pub(crate) fn events(&self) -> &EventSink {
        &self.events
    }

    /// Publish `tiles` unless deactivated. The flag is read under the list
    /// lock so a deactivation can never be followed by a publication.
    fn publish(&self, tiles: &Arc<[SnapshotTile]>) -> bool {
        let mut display = lock(&self.display);
        if !self.is_active() {
            return false;
        }
        *display = tiles.clone();
        true
    }
}

enum SchedulerCommand {
    Plan(Arc<[SnapshotTile]>),
    Shutdown,
}

enum PassOutcome {
    Completed,
    /// A newer command arrived mid-pass.
    Superseded(SchedulerCommand),
    /// The decoder went away; nothing was published.
    Abandoned,
    /// The context was deactivated or the owner dropped its sender.
    Cancelled,
}

/// Background thread turning planned tile lists into decoded, published ones.
///
/// Only the newest submitted plan matters: a pass in progress is abandoned
/// as soon as another plan arrives, and an abandoned pass never publishes.
pub struct TileScheduler {
    tx: mpsc::Sender<SchedulerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl TileScheduler {
    pub fn spawn(context: Arc<DecodeContext>) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<SchedulerCommand>();
        let handle = std::thread::Builder::new()
            .name("subzoom-tiles".into())
            .spawn(move || scheduler_loop(rx, context))?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Queue a pass for `tiles`, superseding any pass not yet published.
    pub fn submit(&self, tiles: Arc<[SnapshotTile]>) {
        let _ = self.tx.send(SchedulerCommand::Plan(tiles));
    }

    /// Stop the thread after its current tile and wait for it.
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(SchedulerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("tile scheduler thread panicked");
            }
        }
    }
}

impl Drop for TileScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn scheduler_loop(rx: mpsc::Receiver<SchedulerCommand>, context: Arc<DecodeContext>) {
    let mut next = rx.recv().ok();
    while let Some(cmd) = next.take() {
        match drain_latest(cmd, &rx) {
            SchedulerCommand::Shutdown => break,
            SchedulerCommand::Plan(tiles) => match run_pass(&context, &tiles, &rx) {
                PassOutcome::Completed | PassOutcome::Abandoned => {}
                PassOutcome::Superseded(cmd) => {
                    next = Some(cmd);
                    continue;
                }
                PassOutcome::Cancelled => break,
            },
        }
        next = rx.recv().ok();
    }
    debug!("tile scheduler stopped");
}

/// Skip to the newest queued command. Shutdown wins over any plan.
fn drain_latest(mut cmd: SchedulerCommand, rx: &mpsc::Receiver<SchedulerCommand>) -> SchedulerCommand {
    if matches!(cmd, SchedulerCommand::Shutdown) {
        return cmd;
    }
    while let Ok(next) = rx.try_recv() {
        if matches!(next, SchedulerCommand::Shutdown) {
            return next;
        }
        cmd = next;
    }
    cmd
}

fn run_pass(
    context: &DecodeContext,
    pending: &Arc<[SnapshotTile]>,
    rx: &mpsc::Receiver<SchedulerCommand>,
) -> PassOutcome {
    if !context.is_active() {
        return PassOutcome::Cancelled;
    }
    let pending_tiles: Vec<Arc<ReusableTile>> = pending.iter().map(|t| t.tile.clone()).collect();

    // Keep both what is on screen and what is about to be.
    let mut resident = pending_tiles.clone();
    resident.extend(context.display_tiles().iter().map(|t| t.tile.clone()));
    let recycled = context.pool.recycle_except(&resident);

    let mut decoded = 0usize;
    for snapshot in pending.iter() {
        if !context.is_active() {
            return PassOutcome::Cancelled;
        }
        match rx.try_recv() {
            Ok(cmd) => return PassOutcome::Superseded(cmd),
            Err(TryRecvError::Disconnected) => return PassOutcome::Cancelled,
            Err(TryRecvError::Empty) => {}
        }

        match snapshot.tile.decode(&context.decoder, context.format) {
            Ok(DecodeOutcome::Decoded) => decoded += 1,
            Ok(DecodeOutcome::Cached) | Ok(DecodeOutcome::Destroyed) => {}
            Err(SubsamplingError::DecoderClosed) => {
                return if context.is_active() {
                    PassOutcome::Abandoned
                } else {
                    PassOutcome::Cancelled
                };
            }
            Err(_) if !context.is_active() => return PassOutcome::Cancelled,
            Err(e) => {
                let key = snapshot.key();
                warn!(tile = %key, "tile decode failed: {e}");
                context.events.emit(LoadEvent::TileLoadError {
                    rect: key.rect,
                    sample_size: key.sample_size,
                    message: e.to_string(),
                });
            }
        }
    }

    if !context.publish(pending) {
        return PassOutcome::Cancelled;
    }
    context.events.request_repaint();

    let released = context.pool.recycle_except(&pending_tiles);
    context.pool.evict_stale(&pending_tiles);
    debug!(
        tiles = pending.len(),
        decoded,
        recycled = recycled + released,
        pool = context.pool.len(),
        "tile pass published"
    );
    PassOutcome::Completed
}
