use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use once_cell::sync::Lazy;

use crate::camera::frustum::Frustum;
use crate::tiles::tile::{Tile, TileKey};
use crate::{Result, TinyEarthError};

/// Shared async HTTP client with a custom User-Agent so that public tile
/// servers don't reject the request. Building the client once avoids TLS and
/// connection-pool setup for every tile.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent("tinyearth/0.1 (+https://github.com/example/tinyearth)")
        .timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .expect("failed to build reqwest async client")
});

/// Anything that can turn a tile URL into a decoded image.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RgbaImage>;
}

/// Production fetcher: HTTP GET plus in-memory decode.
pub struct HttpFetcher;

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RgbaImage> {
        let response = HTTP_CLIENT.get(url).send().await?;
        if !response.status().is_success() {
            return Err(TinyEarthError::Fetch(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }
        let bytes = response.bytes().await?;
        let image = image::load_from_memory(&bytes)?;
        Ok(image.to_rgba8())
    }
}

/// Deterministic fetcher producing a solid-color tile; used by the headless
/// demo and tests, where network access is unwanted.
pub struct SolidFetcher {
    pub color: [u8; 4],
    calls: AtomicU64,
}

impl SolidFetcher {
    pub fn new(color: [u8; 4]) -> Self {
        Self {
            color,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for SolidFetcher {
    fn default() -> Self {
        Self::new([32, 64, 128, 255])
    }
}

#[async_trait]
impl ImageFetcher for SolidFetcher {
    async fn fetch(&self, _url: &str) -> Result<RgbaImage> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut img = RgbaImage::new(256, 256);
        for pixel in img.pixels_mut() {
            pixel.0 = self.color;
        }
        Ok(img)
    }
}

/// Diagnostic counters for a source's lifetime.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SourceCounters {
    pub fetched: u64,
    pub culled: u64,
    pub failed: u64,
}

/// Builds tiles for a URL template and fetches their imagery, culling
/// against the most recently attached frustum before any network I/O.
pub struct TileSource {
    url_template: String,
    frustum: Mutex<Option<Frustum>>,
    fetcher: Arc<dyn ImageFetcher>,
    fetched: AtomicU64,
    culled: AtomicU64,
    failed: AtomicU64,
}

const MAX_ATTEMPTS: usize = 2;
const RETRY_DELAY: Duration = Duration::from_millis(100);

impl TileSource {
    pub fn new(url_template: impl Into<String>, fetcher: Arc<dyn ImageFetcher>) -> Result<Self> {
        let url_template = url_template.into();
        for token in ["{z}", "{x}", "{y}"] {
            if !url_template.contains(token) {
                return Err(TinyEarthError::UrlTemplate(format!(
                    "template {:?} is missing {}",
                    url_template, token
                )));
            }
        }
        Ok(Self {
            url_template,
            frustum: Mutex::new(None),
            fetcher,
            fetched: AtomicU64::new(0),
            culled: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    /// Convenience constructor with the production HTTP fetcher.
    pub fn with_http(url_template: impl Into<String>) -> Result<Self> {
        Self::new(url_template, Arc::new(HttpFetcher))
    }

    pub fn make_tile(&self, key: TileKey) -> Tile {
        Tile::new(key, self.url_template.clone())
    }

    /// Attach the frustum used to cull fetches issued from now on.
    pub fn set_frustum(&self, frustum: Option<Frustum>) {
        *self.frustum.lock().expect("frustum lock poisoned") = frustum;
    }

    /// Fetch a tile's image, culling first against the attached frustum
    /// (the camera may have moved between scheduling and dispatch). Returns
    /// the completed tile, or `None` when culled or failed; failures are
    /// logged and will be retried naturally by later scheduling passes.
    pub async fn fetch_tile(&self, mut tile: Tile) -> Option<Tile> {
        let culled = {
            let frustum = self.frustum.lock().expect("frustum lock poisoned");
            frustum.as_ref().map_or(false, |f| !tile.visible(f))
        };
        if culled {
            self.culled.fetch_add(1, Ordering::Relaxed);
            log::debug!("culled tile {:?} before fetch", tile.key);
            return None;
        }

        let url = tile.url();
        for attempt in 1..=MAX_ATTEMPTS {
            log::debug!("fetch tile {:?} attempt {}", tile.key, attempt);
            match self.fetcher.fetch(&url).await {
                Ok(image) => {
                    log::info!(
                        "fetched tile {:?} ({}x{})",
                        tile.key,
                        image.width(),
                        image.height()
                    );
                    tile.complete(image);
                    self.fetched.fetch_add(1, Ordering::Relaxed);
                    return Some(tile);
                }
                Err(e) => {
                    log::warn!("tile {:?} fetch attempt {} failed: {}", tile.key, attempt, e);
                    if attempt == MAX_ATTEMPTS {
                        log::error!("giving up on tile {:?}", tile.key);
                    } else {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
        self.failed.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn counters(&self) -> SourceCounters {
        SourceCounters {
            fetched: self.fetched.load(Ordering::Relaxed),
            culled: self.culled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }
}
