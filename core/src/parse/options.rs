//! Typed forms of the recognized cache and layer options.
//!
//! The `Raw*` structs mirror the option bags one-to-one (option names contain
//! spaces, hence the renames) and reject unknown options. The tile parser
//! reads bags into them with serde, then checks ranges and fills defaults.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;


pub const DEFAULT_PROJECTION: &str = "spherical mercator";
pub const DEFAULT_TILE_HEIGHT: u32 = 256;
pub const DEFAULT_STALE_LOCK_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_UMASK: u32 = 0o022;


// ---------------------------------------------------------------------------
// Cache section
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawCache {
    pub name: Option<String>,
    pub path: Option<String>,
    pub umask: Option<Value>,
    pub dirs: Option<DirLayout>,
    pub gzip: Option<Vec<String>>,
    pub verbose: Option<bool>,
    #[serde(rename = "write cache")]
    pub write_cache: Option<bool>,
    #[serde(rename = "cache lifespan")]
    pub cache_lifespan: Option<f64>,
    #[serde(rename = "stale lock timeout")]
    pub stale_lock_timeout: Option<f64>,
}

/// Directory layout used by the disk cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirLayout {
    #[default]
    Safe,
    Portable,
    Quadtile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheBackend {
    /// No-op cache: every tile is rendered fresh.
    Test,
    /// In-process cache.
    Memory,
    Disk {
        path: PathBuf,
        umask: u32,
        dirs: DirLayout,
        gzip: Vec<String>,
    },
}

/// Cache-level values that layers inherit unless they override them.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDefaults {
    pub write_cache: bool,
    /// `None` keeps tiles forever.
    pub cache_lifespan: Option<Duration>,
    pub stale_lock_timeout: Duration,
}

impl Default for LayerDefaults {
    fn default() -> Self {
        LayerDefaults {
            write_cache: true,
            cache_lifespan: None,
            stale_lock_timeout: DEFAULT_STALE_LOCK_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub verbose: bool,
    pub defaults: LayerDefaults,
}


// ---------------------------------------------------------------------------
// Layer section
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawLayer {
    pub provider: Option<Value>,
    pub metatile: Option<Metatile>,
    pub preview: Option<Preview>,
    pub projection: Option<String>,
    #[serde(rename = "stale lock timeout")]
    pub stale_lock_timeout: Option<f64>,
    #[serde(rename = "cache lifespan")]
    pub cache_lifespan: Option<f64>,
    #[serde(rename = "write cache")]
    pub write_cache: Option<bool>,
    pub bounds: Option<BoundsSpec>,
    #[serde(rename = "allowed origin")]
    pub allowed_origin: Option<String>,
    #[serde(rename = "maximum cache age")]
    pub maximum_cache_age: Option<f64>,
    pub redirects: Option<IndexMap<String, String>>,
    #[serde(rename = "tile height")]
    pub tile_height: Option<i64>,
    #[serde(rename = "jpeg options")]
    pub jpeg_options: Option<JpegOptions>,
    #[serde(rename = "png options")]
    pub png_options: Option<PngOptions>,
    #[serde(rename = "pixel effect")]
    pub pixel_effect: Option<PixelEffect>,
}

/// Object form of the `provider` option: a built-in provider `name` or a
/// `class` path, plus whatever arguments that provider takes.
#[derive(Debug, Deserialize)]
pub(crate) struct RawProvider {
    pub name: Option<String>,
    pub class: Option<String>,
    #[serde(flatten)]
    pub params: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProviderKind {
    /// Provider shipped with the tile server, e.g. `mapnik` or `proxy`.
    Builtin(String),
    /// Provider loaded from a class path.
    Class(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provider {
    pub kind: ProviderKind,
    pub params: IndexMap<String, Value>,
}

/// Render `rows` x `columns` tiles at once, with `buffer` pixels of margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metatile {
    #[serde(default = "one")]
    pub rows: u32,
    #[serde(default = "one")]
    pub columns: u32,
    #[serde(default)]
    pub buffer: u32,
}

impl Default for Metatile {
    fn default() -> Self {
        Metatile { rows: 1, columns: 1, buffer: 0 }
    }
}

/// Starting point of the built-in slippy map preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preview {
    #[serde(default = "default_preview_lat")]
    pub lat: f64,
    #[serde(default = "default_preview_lon")]
    pub lon: f64,
    #[serde(default = "default_preview_zoom")]
    pub zoom: u32,
    #[serde(default = "default_preview_ext")]
    pub ext: String,
}

impl Default for Preview {
    fn default() -> Self {
        Preview {
            lat: default_preview_lat(),
            lon: default_preview_lon(),
            zoom: default_preview_zoom(),
            ext: default_preview_ext(),
        }
    }
}

/// One bounding box in zoom levels and degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bounds {
    #[serde(default)]
    pub low: u32,
    #[serde(default = "default_high")]
    pub high: u32,
    #[serde(default = "default_north")]
    pub north: f64,
    #[serde(default = "default_west")]
    pub west: f64,
    #[serde(default = "default_south")]
    pub south: f64,
    #[serde(default = "default_east")]
    pub east: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            low: 0,
            high: default_high(),
            north: default_north(),
            west: default_west(),
            south: default_south(),
            east: default_east(),
        }
    }
}

/// `bounds` takes one box or a list of boxes.
///
/// `Many` comes first: a derived struct also accepts a sequence, so an empty
/// list would otherwise read as one all-default box.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum BoundsSpec {
    Many(Vec<Bounds>),
    One(Bounds),
}

impl BoundsSpec {
    pub fn into_vec(self) -> Vec<Bounds> {
        match self {
            BoundsSpec::One(b) => vec![b],
            BoundsSpec::Many(list) => list,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JpegOptions {
    pub quality: Option<u8>,
    pub progressive: Option<bool>,
    pub optimize: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PngOptions {
    /// URL or file name of a palette.
    pub palette: Option<String>,
    pub palette256: Option<bool>,
    pub optimize: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelEffectKind {
    Blackwhite,
    Greyscale,
    Desaturate,
    Pixelate,
    Halftone,
    Blur,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelEffect {
    pub name: PixelEffectKind,
    /// Effect-specific parameters (e.g. `factor`, `radius`).
    #[serde(flatten)]
    pub params: IndexMap<String, Value>,
}

/// Fully resolved options of one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConfig {
    pub name: String,
    pub provider: Provider,
    pub metatile: Metatile,
    pub preview: Preview,
    pub projection: String,
    pub stale_lock_timeout: Duration,
    pub cache_lifespan: Option<Duration>,
    pub write_cache: bool,
    pub bounds: Vec<Bounds>,
    pub allowed_origin: Option<String>,
    pub maximum_cache_age: Option<Duration>,
    /// Lowercased extension to lowercased extension.
    pub redirects: IndexMap<String, String>,
    pub tile_height: u32,
    pub jpeg_options: JpegOptions,
    pub png_options: PngOptions,
    pub pixel_effect: Option<PixelEffect>,
}


fn one() -> u32 { 1 }
fn default_preview_lat() -> f64 { 37.80 }
fn default_preview_lon() -> f64 { -122.26 }
fn default_preview_zoom() -> u32 { 10 }
fn default_preview_ext() -> String { "png".into() }
fn default_high() -> u32 { 31 }
fn default_north() -> f64 { 89.0 }
fn default_west() -> f64 { -180.0 }
fn default_south() -> f64 { -89.0 }
fn default_east() -> f64 { 180.0 }
