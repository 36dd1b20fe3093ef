use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::tile::{ReusableTile, TileKey};
use crate::sync::lock;

/// Stable set of tile identities, sorted by key.
///
/// The pool owns every tile it created; planning passes hold `Arc`s to the
/// ones they place. Tiles are recycled rather than removed so a region seen
/// again keeps the same identity. An optional cap evicts the least recently
/// planned identities that hold no bitmap. Tiles placed by the newest
/// planning generation are never recycled or evicted, since that plan may
/// still be queued behind the pass doing the cleanup.
pub struct TilePool {
    tiles: Mutex<Vec<Arc<ReusableTile>>>,
    generation: AtomicU64,
    max_entries: Option<usize>,
}

impl TilePool {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            tiles: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.tiles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tiles currently holding a bitmap.
    pub fn decoded_count(&self) -> usize {
        lock(&self.tiles).iter().filter(|t| t.is_decoded()).count()
    }

    pub fn keys(&self) -> Vec<TileKey> {
        lock(&self.tiles).iter().map(|t| t.key()).collect()
    }

    /// Start a new planning generation, used for recency when evicting.
    pub(crate) fn begin_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, key: TileKey) -> Option<Arc<ReusableTile>> {
        let tiles = lock(&self.tiles);
        tiles
            .binary_search_by(|t| t.key().cmp(&key))
            .ok()
            .map(|i| tiles[i].clone())
    }

    /// Return the tile for `key`, creating it on first use.
    pub fn obtain(&self, key: TileKey) -> Arc<ReusableTile> {
        let mut tiles = lock(&self.tiles);
        let generation = self.generation.load(Ordering::Relaxed);
        let tile = match tiles.binary_search_by(|t| t.key().cmp(&key)) {
            Ok(i) => tiles[i].clone(),
            Err(i) => {
                let tile = Arc::new(ReusableTile::new(key));
                tiles.insert(i, tile.clone());
                tile
            }
        };
        tile.touch(generation);
        tile
    }

    /// Recycle every tile not in `keep`. Returns how many released a bitmap.
    pub fn recycle_except(&self, keep: &[Arc<ReusableTile>]) -> usize {
        let keep = identity_set(keep);
        let tiles = lock(&self.tiles);
        tiles
            .iter()
            .filter(|t| !keep.contains(&Arc::as_ptr(*t)) && !self.in_latest_plan(t))
            .filter(|t| t.recycle())
            .count()
    }

    /// Enforce the entry cap, dropping bitmap-free identities outside `keep`,
    /// least recently planned first.
    pub fn evict_stale(&self, keep: &[Arc<ReusableTile>]) -> usize {
        let Some(max) = self.max_entries else {
            return 0;
        };
        let mut tiles = lock(&self.tiles);
        if tiles.len() <= max {
            return 0;
        }
        let keep = identity_set(keep);
        let mut candidates: Vec<(u64, TileKey)> = tiles
            .iter()
            .filter(|t| {
                !keep.contains(&Arc::as_ptr(*t)) && !t.is_decoded() && !self.in_latest_plan(t)
            })
            .map(|t| (t.last_used(), t.key()))
            .collect();
        candidates.sort_unstable();
        let excess = tiles.len() - max;
        let evict: HashSet<TileKey> = candidates.into_iter().take(excess).map(|(_, k)| k).collect();

        tiles.retain(|t| {
            let evicted = evict.contains(&t.key());
            if evicted {
                t.destroy();
            }
            !evicted
        });
        debug!(evicted = evict.len(), remaining = tiles.len(), "tile pool trimmed");
        evict.len()
    }

    /// Whether the most recent planning generation placed `tile`. Before the
    /// first generation nothing is protected.
    fn in_latest_plan(&self, tile: &ReusableTile) -> bool {
        let current = self.generation.load(Ordering::Relaxed);
        current > 0 && tile.last_used() >= current
    }

    /// Destroy and forget every tile.
    pub fn clear(&self) {
        let mut tiles = lock(&self.tiles);
        for tile in tiles.iter() {
            tile.destroy();
        }
        tiles.clear();
    }
}

impl Default for TilePool {
    fn default() -> Self {
        Self::new(None)
    }
}

fn identity_set(tiles: &[Arc<ReusableTile>]) -> HashSet<*const ReusableTile> {
    tiles.iter().map(Arc::as_ptr).collect()
}
