use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use fxhash::FxHashSet;
use serde::Serialize;

use crate::camera::{Camera, CameraEvent, Frustum, Projection};
use crate::core::constants::{
    BOOTSTRAP_LEVEL, DEFAULT_MAX_LEVEL, DEFAULT_MIN_LEVEL, EARTH_RADIUS, TILE_SIZE,
};
use crate::core::crs::{forward, Crs};
use crate::tiles::source::TileSource;
use crate::tiles::tile::TileKey;
use crate::tiles::tree::TileTree;

/// Pyramid bounds for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileProviderOptions {
    pub min_level: u8,
    pub max_level: u8,
}

impl Default for TileProviderOptions {
    fn default() -> Self {
        Self {
            min_level: DEFAULT_MIN_LEVEL,
            max_level: DEFAULT_MAX_LEVEL,
        }
    }
}

impl TileProviderOptions {
    /// Shallow pyramid for tests: keeps candidate walks small.
    pub fn for_testing() -> Self {
        Self {
            min_level: 1,
            max_level: 10,
        }
    }
}

/// Snapshot of a provider's lifetime counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProviderStats {
    pub level: u8,
    pub scheduled: u64,
    pub fetched: u64,
    pub culled: u64,
    pub failed: u64,
    pub pending: usize,
}

/// Sentinel meaning "no level computed yet"; any real level differs.
const LEVEL_UNSET: u8 = u8::MAX;

struct ProviderInner {
    source: TileSource,
    tree: Arc<Mutex<TileTree>>,
    projection: Mutex<Projection>,
    options: TileProviderOptions,
    curlevel: AtomicU8,
    stop: AtomicBool,
    pending: Mutex<FxHashSet<TileKey>>,
    scheduled: AtomicU64,
}

/// The scheduler: watches one camera, derives the target LOD level from its
/// altitude, prunes the tile pyramid with the frustum and back-face tests,
/// and streams the surviving tiles into the shared [`TileTree`].
///
/// Fetches are fire-and-continue tokio tasks; completions arrive in any
/// order and insertion is idempotent, so nothing is awaited or cancelled. A
/// fetch made stale by further camera movement still lands in the tree:
/// wasted work, not a correctness problem, since the tree only grows.
pub struct TileProvider {
    inner: Arc<ProviderInner>,
}

impl TileProvider {
    pub fn new(projection: Projection, source: TileSource, options: TileProviderOptions) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                source,
                tree: Arc::new(Mutex::new(TileTree::new())),
                projection: Mutex::new(projection),
                options,
                curlevel: AtomicU8::new(LEVEL_UNSET),
                stop: AtomicBool::new(false),
                pending: Mutex::new(FxHashSet::default()),
                scheduled: AtomicU64::new(0),
            }),
        }
    }

    /// The shared tile cache this provider feeds.
    pub fn tree(&self) -> Arc<Mutex<TileTree>> {
        Arc::clone(&self.inner.tree)
    }

    pub fn source(&self) -> &TileSource {
        &self.inner.source
    }

    pub fn set_projection(&self, projection: Projection) {
        *self.inner.projection.lock().expect("projection lock") = projection;
    }

    /// Subscribe to a camera for the rest of this provider's life. Zoom
    /// events only reschedule when the computed level actually changes;
    /// pans and orbits always do.
    pub fn attach(&self, camera: &mut Camera) {
        let inner = Arc::clone(&self.inner);
        camera.add_change_listener(Box::new(move |cam, event| {
            Self::handle_event(&inner, cam, event);
        }));
    }

    /// Force a full scheduling pass for the camera's current state.
    pub fn refresh(&self, camera: &Camera) {
        let level = level_for(&self.inner.options, camera);
        self.inner.curlevel.store(level, Ordering::Relaxed);
        Self::schedule(&self.inner, camera, level);
    }

    /// Stop reacting to camera changes. In-flight fetches still complete.
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.inner.stop.store(false, Ordering::Relaxed);
    }

    pub fn current_level(&self) -> u8 {
        self.inner.curlevel.load(Ordering::Relaxed)
    }

    /// The LOD level the camera's altitude maps to.
    pub fn tile_level(&self, camera: &Camera) -> u8 {
        level_for(&self.inner.options, camera)
    }

    pub fn stats(&self) -> ProviderStats {
        let counters = self.inner.source.counters();
        ProviderStats {
            level: self.current_level(),
            scheduled: self.inner.scheduled.load(Ordering::Relaxed),
            fetched: counters.fetched,
            culled: counters.culled,
            failed: counters.failed,
            pending: self.inner.pending.lock().expect("pending lock").len(),
        }
    }

    fn handle_event(inner: &Arc<ProviderInner>, camera: &Camera, event: CameraEvent) {
        if inner.stop.load(Ordering::Relaxed) {
            return;
        }

        let level = level_for(&inner.options, camera);
        if event == CameraEvent::Zoom && level == inner.curlevel.load(Ordering::Relaxed) {
            // Sub-pixel zoom jitter; the visible set is unchanged.
            log::trace!("zoom event without level change, keeping level {}", level);
            return;
        }
        inner.curlevel.store(level, Ordering::Relaxed);
        Self::schedule(inner, camera, level);
    }

    fn schedule(inner: &Arc<ProviderInner>, camera: &Camera, level: u8) {
        let frustum = {
            let projection = inner.projection.lock().expect("projection lock");
            Frustum::new(&projection, camera)
        };
        inner.source.set_frustum(Some(frustum.clone()));

        let keys = Self::select_keys(&inner.source, &frustum, level);
        log::debug!("level {}: {} candidate tiles", level, keys.len());

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::warn!("no async runtime available, skipping fetch dispatch");
                return;
            }
        };

        for key in keys {
            {
                let mut pending = inner.pending.lock().expect("pending lock");
                if pending.contains(&key) {
                    continue;
                }
                let tree = inner.tree.lock().expect("tree lock");
                if tree.get_tile_node(key.z, key.x, key.y).is_some() {
                    continue;
                }
                pending.insert(key);
            }
            inner.scheduled.fetch_add(1, Ordering::Relaxed);

            let task_inner = Arc::clone(inner);
            let tile = inner.source.make_tile(key);
            runtime.spawn(async move {
                let fetched = task_inner.source.fetch_tile(tile).await;
                task_inner
                    .pending
                    .lock()
                    .expect("pending lock")
                    .remove(&key);
                if let Some(tile) = fetched {
                    task_inner.tree.lock().expect("tree lock").add_tile(tile);
                }
            });
        }
    }

    /// The keys to fetch for a target level.
    ///
    /// At or below the bootstrap level the full grid goes out
    /// unconditionally, since culling heuristics are unreliable at
    /// whole-globe scale. Above it, a
    /// breadth-first walk starts from the bootstrap grid and expands only
    /// tiles that pass the visibility tests until the frontier reaches the
    /// target level.
    fn select_keys(source: &TileSource, frustum: &Frustum, level: u8) -> Vec<TileKey> {
        if level <= BOOTSTRAP_LEVEL {
            let n = 1u32 << level;
            let mut keys = Vec::with_capacity((n * n) as usize);
            for y in 0..n {
                for x in 0..n {
                    keys.push(TileKey::new(level, x, y));
                }
            }
            return keys;
        }

        let n = 1u32 << BOOTSTRAP_LEVEL;
        let mut queue: VecDeque<TileKey> = (0..n)
            .flat_map(|y| (0..n).map(move |x| TileKey::new(BOOTSTRAP_LEVEL, x, y)))
            .collect();

        let mut keys = Vec::new();
        while let Some(key) = queue.pop_front() {
            let tile = source.make_tile(key);
            if !tile.visible(frustum) {
                continue;
            }
            if key.z == level {
                keys.push(key);
            } else {
                queue.extend(key.children());
            }
        }
        keys
    }
}

fn level_for(options: &TileProviderOptions, camera: &Camera) -> u8 {
    let geodetic = forward(Crs::Geocentric, Crs::Geodetic, camera.from_point().coords);
    let altitude = geodetic.z;
    if altitude <= 0.0 {
        return options.max_level;
    }

    let initial_resolution = 2.0 * std::f64::consts::PI * EARTH_RADIUS / TILE_SIZE as f64;
    let ground_resolution = altitude * 2.0 / TILE_SIZE as f64;
    let zoom = (initial_resolution / ground_resolution).log2();
    (zoom.floor() as i64 + 2).clamp(options.min_level as i64, options.max_level as i64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::source::SolidFetcher;
    use std::time::Duration;

    fn provider() -> TileProvider {
        let source =
            TileSource::new("{z}/{x}/{y}", Arc::new(SolidFetcher::default())).unwrap();
        TileProvider::new(
            Projection::default(),
            source,
            TileProviderOptions::for_testing(),
        )
    }

    fn camera_at(altitude: f64) -> Camera {
        Camera::above(118.767335, 32.050471, altitude)
    }

    #[test]
    fn test_level_monotonically_non_increasing_with_altitude() {
        let provider = provider();
        let mut last = u8::MAX;
        for exp in 0..=7 {
            let level = provider.tile_level(&camera_at(10f64.powi(exp)));
            assert!(
                level <= last,
                "level {} at altitude 1e{} above level {}",
                level,
                exp,
                last
            );
            last = level;
        }
    }

    #[test]
    fn test_level_clamped_to_bounds() {
        let provider = provider();
        assert_eq!(provider.tile_level(&camera_at(1.0e9)), 1);
        assert_eq!(provider.tile_level(&camera_at(0.01)), 10);
    }

    async fn wait_for_level(provider: &TileProvider, level: u8, want: usize) {
        for _ in 0..500 {
            let (ready, _) = provider.tree().lock().unwrap().ready_count_at_level(level);
            if ready >= want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let (ready, total) = provider.tree().lock().unwrap().ready_count_at_level(level);
        panic!("timed out: {ready}/{total} ready at level {level}, wanted {want}");
    }

    #[tokio::test]
    async fn test_bootstrap_grid_fetches_everything() {
        let provider = provider();
        // High camera: level 3, below the bootstrap threshold.
        let camera = camera_at(6.0e6);
        let level = provider.tile_level(&camera);
        assert!(level <= BOOTSTRAP_LEVEL);

        provider.refresh(&camera);
        let expected = (1usize << level) * (1usize << level);
        wait_for_level(&provider, level, expected).await;
        assert_eq!(provider.stats().scheduled as usize, expected);
    }

    #[tokio::test]
    async fn test_zoom_hysteresis_skips_rescheduling() {
        let provider = provider();
        let mut camera = camera_at(6.0e6);
        provider.attach(&mut camera);

        provider.refresh(&camera);
        let scheduled = provider.stats().scheduled;

        // A zoom far too small to change the computed level.
        camera.zoom(0.999);
        assert_eq!(provider.stats().scheduled, scheduled);
    }

    #[tokio::test]
    async fn test_stop_flag_blocks_scheduling() {
        let provider = provider();
        let mut camera = camera_at(6.0e6);
        provider.attach(&mut camera);
        provider.stop();

        camera.pan(10_000.0, 0.0);
        assert_eq!(provider.stats().scheduled, 0);
    }

    #[tokio::test]
    async fn test_pan_always_reschedules() {
        let provider = provider();
        let mut camera = camera_at(6.0e6);
        provider.attach(&mut camera);

        camera.pan(1.0, 0.0);
        let after_first = provider.stats().scheduled;
        assert!(after_first > 0);
    }
}
