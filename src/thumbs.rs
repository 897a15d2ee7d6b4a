use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use image::{GenericImageView, ImageEncoder, RgbaImage};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::files::ImageEntry;
use crate::Result;

pub const THUMB_MAX_WIDTH: u32 = 720;
pub const THUMB_MAX_HEIGHT: u32 = 480;
const THUMB_CACHE_VERSION: u32 = 1;
const MIN_POOL_THREADS: usize = 2;
const MAX_POOL_THREADS: usize = 4;

/// Cheap staleness proxy for a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSignature {
    pub size: u64,
    pub mtime_ms: u64,
}

impl ContentSignature {
    pub fn probe(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        let mtime_ms = meta
            .modified()
            .ok()?
            .duration_since(UNIX_EPOCH)
            .ok()?
            .as_millis() as u64;
        Some(Self {
            size: meta.len(),
            mtime_ms,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SidecarMeta {
    version: u32,
    native_width: u32,
    native_height: u32,
    signature: ContentSignature,
}

/// Generation status of one thumbnail. `Failed` is terminal for the session;
/// the UI renders a placeholder instead of retrying.
#[derive(Clone)]
pub enum ThumbStatus {
    Pending,
    Ready(Arc<RgbaImage>),
    Failed,
}

impl ThumbStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ThumbStatus::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ThumbStatus::Failed)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ThumbStatus::Pending)
    }
}

struct Generated {
    pixels: Arc<RgbaImage>,
    native: (u32, u32),
}

struct GenOutcome {
    path: PathBuf,
    result: std::result::Result<Generated, String>,
}

/// Asynchronous thumbnail cache with an on-disk sidecar per source image.
///
/// Lookups never block: a miss inserts a `Pending` record and queues exactly
/// one generation job on the bounded pool, so concurrent requests for the
/// same key coalesce. Completions are drained with `poll` once per frame.
pub struct ThumbnailCache {
    root: PathBuf,
    max_width: u32,
    max_height: u32,
    records: HashMap<PathBuf, ThumbStatus>,
    dims: HashMap<PathBuf, (u32, u32)>,
    pool: rayon::ThreadPool,
    tx: Sender<GenOutcome>,
    rx: Receiver<GenOutcome>,
}

impl ThumbnailCache {
    pub fn new(root: PathBuf) -> Result<Self> {
        Self::with_limits(root, THUMB_MAX_WIDTH, THUMB_MAX_HEIGHT)
    }

    pub fn with_limits(root: PathBuf, max_width: u32, max_height: u32) -> Result<Self> {
        fs::create_dir_all(&root)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_cpus::get().clamp(MIN_POOL_THREADS, MAX_POOL_THREADS))
            .build()?;
        let (tx, rx) = mpsc::channel();

        Ok(Self {
            root,
            max_width,
            max_height,
            records: HashMap::new(),
            dims: HashMap::new(),
            pool,
            tx,
            rx,
        })
    }

    /// Default cache root under the XDG cache directory.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("wallpaper-carousel")
            .join("thumbnails")
    }

    /// Returns the current status without blocking. The first call for an
    /// entry queues a background generation job; later calls observe
    /// `Pending` until it completes.
    pub fn get_or_generate(&mut self, entry: &ImageEntry) -> ThumbStatus {
        if let Some(status) = self.records.get(&entry.path) {
            return status.clone();
        }

        self.records.insert(entry.path.clone(), ThumbStatus::Pending);

        let tx = self.tx.clone();
        let path = entry.path.clone();
        let root = self.root.clone();
        let (max_width, max_height) = (self.max_width, self.max_height);
        self.pool.spawn(move || {
            let result = generate(&root, &path, max_width, max_height);
            // The receiver may already be gone during shutdown.
            let _ = tx.send(GenOutcome { path, result });
        });

        ThumbStatus::Pending
    }

    /// Drains finished generation jobs into the records. Results are applied
    /// even for entries nobody is looking at anymore; stale-but-correct data
    /// is still useful later.
    pub fn poll(&mut self) -> Vec<(PathBuf, ThumbStatus)> {
        let mut completed = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            let status = match outcome.result {
                Ok(generated) => {
                    self.dims.insert(outcome.path.clone(), generated.native);
                    ThumbStatus::Ready(generated.pixels)
                }
                Err(err) => {
                    warn!(
                        "thumbnail generation failed for {}: {err}",
                        outcome.path.display()
                    );
                    ThumbStatus::Failed
                }
            };
            self.records.insert(outcome.path.clone(), status.clone());
            completed.push((outcome.path, status));
        }
        completed
    }

    pub fn status(&self, entry: &ImageEntry) -> Option<ThumbStatus> {
        self.records.get(&entry.path).cloned()
    }

    /// Native size of the original image: memoized, then the sidecar, then a
    /// header-only probe. Never decodes full pixel data.
    pub fn native_dimensions(&mut self, entry: &ImageEntry) -> Option<(u32, u32)> {
        if let Some(dims) = self.dims.get(&entry.path) {
            return Some(*dims);
        }

        if let Some(meta) = read_sidecar_meta(&self.meta_path(&entry.path)) {
            if ContentSignature::probe(&entry.path) == Some(meta.signature) {
                let dims = (meta.native_width, meta.native_height);
                self.dims.insert(entry.path.clone(), dims);
                return Some(dims);
            }
        }

        let probed = image::io::Reader::open(&entry.path)
            .ok()?
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()?;
        self.dims.insert(entry.path.clone(), probed);
        Some(probed)
    }

    /// Drops everything cached for one entry, including its sidecar pair.
    pub fn invalidate(&mut self, entry: &ImageEntry) {
        self.records.remove(&entry.path);
        self.dims.remove(&entry.path);
        let _ = fs::remove_file(self.thumb_path(&entry.path));
        let _ = fs::remove_file(self.meta_path(&entry.path));
    }

    /// Forgets finished records so a refresh re-reads everything; sidecars
    /// stay, so regeneration is cheap. In-flight markers are kept, keeping
    /// the one-job-per-key guarantee intact across a refresh.
    pub fn reset(&mut self) {
        self.records.retain(|_, status| status.is_pending());
        self.dims.clear();
    }

    pub fn thumb_path(&self, source: &Path) -> PathBuf {
        self.root.join(format!("{}.png", thumbnail_hash(source)))
    }

    pub fn meta_path(&self, source: &Path) -> PathBuf {
        self.root.join(format!("{}.json", thumbnail_hash(source)))
    }
}

/// Stable cache name: SHA1 of the file URI, freedesktop style.
pub fn thumbnail_hash(source: &Path) -> String {
    let canonical = fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());
    let file_uri = format!("file://{}", canonical.to_string_lossy());

    let mut hasher = Sha1::new();
    hasher.update(file_uri.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate(
    root: &Path,
    source: &Path,
    max_width: u32,
    max_height: u32,
) -> std::result::Result<Generated, String> {
    let signature = ContentSignature::probe(source)
        .ok_or_else(|| format!("cannot stat {}", source.display()))?;
    let hash = thumbnail_hash(source);
    let thumb_path = root.join(format!("{hash}.png"));
    let meta_path = root.join(format!("{hash}.json"));

    // Sidecar fast path: an unchanged signature means the scaled bytes and
    // native size on disk are still good, skipping the full-resolution decode.
    if let Some(meta) = read_sidecar_meta(&meta_path) {
        if meta.version == THUMB_CACHE_VERSION && meta.signature == signature {
            if let Ok(scaled) = image::open(&thumb_path) {
                debug!("thumbnail cache hit for {}", source.display());
                return Ok(Generated {
                    pixels: Arc::new(scaled.to_rgba8()),
                    native: (meta.native_width, meta.native_height),
                });
            }
        }
    }

    let decoded = image::io::Reader::open(source)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| err.to_string())?
        .decode()
        .map_err(|err| err.to_string())?;
    let native = decoded.dimensions();

    let scaled = if native.0 > max_width || native.1 > max_height {
        decoded.thumbnail(max_width, max_height)
    } else {
        decoded
    };
    let pixels = scaled.to_rgba8();

    // Persistence is best-effort: losing the sidecar only loses the restart
    // optimization.
    if let Err(err) = write_sidecar(&thumb_path, &meta_path, &pixels, native, signature) {
        warn!("failed to write thumbnail sidecar for {}: {err}", source.display());
    }

    Ok(Generated {
        pixels: Arc::new(pixels),
        native,
    })
}

fn read_sidecar_meta(meta_path: &Path) -> Option<SidecarMeta> {
    let raw = fs::read_to_string(meta_path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn write_sidecar(
    thumb_path: &Path,
    meta_path: &Path,
    pixels: &RgbaImage,
    native: (u32, u32),
    signature: ContentSignature,
) -> io::Result<()> {
    let mut encoded = Vec::new();
    image::codecs::png::PngEncoder::new(&mut encoded)
        .write_image(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

    let meta = SidecarMeta {
        version: THUMB_CACHE_VERSION,
        native_width: native.0,
        native_height: native.1,
        signature,
    };
    let meta_json = serde_json::to_string_pretty(&meta)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

    // Whole-file replaces, so concurrent readers never see a torn sidecar.
    atomic_write(thumb_path, &encoded)?;
    atomic_write(meta_path, meta_json.as_bytes())
}

fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
