//! Default parser: validates a snapshot as a tile server configuration.
//!
//! Each option bag is read into its `Raw*` form (unknown options and wrong
//! value types fail there), then range-checked and resolved against the
//! defaults into a [`RuntimeConfig`].

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Section, ValidationError};
use crate::types::{value_kind, ConfigSnapshot, OptionBag};
use super::options::{
    Bounds, BoundsSpec, CacheBackend, CacheConfig, LayerConfig, LayerDefaults, Provider,
    ProviderKind, RawCache, RawLayer, RawProvider, DEFAULT_PROJECTION, DEFAULT_TILE_HEIGHT,
    DEFAULT_UMASK,
};
use super::ConfigParser;


/// The validated artifact: resolved cache settings and every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub cache: CacheConfig,
    pub layers: IndexMap<String, LayerConfig>,
}

impl RuntimeConfig {
    pub fn layer(&self, name: &str) -> Option<&LayerConfig> {
        self.layers.get(name)
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.keys().map(|k| k.as_str()).collect()
    }
}


/// Validates cache and layer option bags against the recognized tile
/// server options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileConfigParser;

impl ConfigParser for TileConfigParser {
    type Output = RuntimeConfig;
    type Error = ValidationError;

    fn parse(&self, snapshot: &ConfigSnapshot) -> Result<RuntimeConfig, ValidationError> {
        let cache = parse_cache(&snapshot.cache)?;
        let mut layers = IndexMap::with_capacity(snapshot.layers.len());
        for (name, bag) in &snapshot.layers {
            let layer = parse_layer(name, bag, &cache.defaults)?;
            layers.insert(name.clone(), layer);
        }
        Ok(RuntimeConfig { cache, layers })
    }
}


// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

fn parse_cache(bag: &OptionBag) -> Result<CacheConfig, ValidationError> {
    let section = Section::Cache;
    let raw: RawCache = read_bag(&section, bag)?;

    let name = raw.name.as_deref().unwrap_or("test").to_lowercase();
    let backend = match name.as_str() {
        "test" => CacheBackend::Test,
        "memory" => CacheBackend::Memory,
        "disk" => {
            let path = raw
                .path
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| invalid(&section, "path", "required by the disk cache"))?;
            CacheBackend::Disk {
                path: PathBuf::from(path),
                umask: parse_umask(&section, raw.umask)?,
                dirs: raw.dirs.unwrap_or_default(),
                gzip: raw
                    .gzip
                    .unwrap_or_default()
                    .into_iter()
                    .map(|ext| ext.to_lowercase())
                    .collect(),
            }
        }
        other => {
            return Err(invalid(
                &section,
                "name",
                format!("unsupported cache backend '{}'", other),
            ))
        }
    };

    let mut defaults = LayerDefaults::default();
    if let Some(write_cache) = raw.write_cache {
        defaults.write_cache = write_cache;
    }
    if let Some(secs) = raw.cache_lifespan {
        defaults.cache_lifespan = lifespan(&section, secs)?;
    }
    if let Some(secs) = raw.stale_lock_timeout {
        defaults.stale_lock_timeout = seconds(&section, "stale lock timeout", secs)?;
    }

    Ok(CacheConfig {
        backend,
        verbose: raw.verbose.unwrap_or(false),
        defaults,
    })
}

/// Accepts an integer or an octal string such as `"0022"`.
fn parse_umask(section: &Section, value: Option<Value>) -> Result<u32, ValidationError> {
    match value {
        None => Ok(DEFAULT_UMASK),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n <= 0o777)
            .ok_or_else(|| invalid(section, "umask", format!("out of range: {}", n))),
        Some(Value::String(s)) => {
            let digits = s.trim().trim_start_matches("0o");
            u32::from_str_radix(digits, 8)
                .ok()
                .filter(|n| *n <= 0o777)
                .ok_or_else(|| invalid(section, "umask", format!("not an octal mask: '{}'", s)))
        }
        Some(other) => Err(invalid(
            section,
            "umask",
            format!("expected a number or an octal string, found {}", value_kind(&other)),
        )),
    }
}


// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

fn parse_layer(
    name: &str,
    bag: &OptionBag,
    defaults: &LayerDefaults,
) -> Result<LayerConfig, ValidationError> {
    let section = Section::Layer(name.to_string());
    let raw: RawLayer = read_bag(&section, bag)?;

    let provider = parse_provider(&section, raw.provider)?;

    let metatile = raw.metatile.unwrap_or_default();
    if metatile.rows == 0 || metatile.columns == 0 {
        return Err(invalid(&section, "metatile", "rows and columns must be at least 1"));
    }

    let preview = raw.preview.unwrap_or_default();
    if !(-90.0..=90.0).contains(&preview.lat) || !(-180.0..=180.0).contains(&preview.lon) {
        return Err(invalid(
            &section,
            "preview",
            format!("coordinates out of range: lat {}, lon {}", preview.lat, preview.lon),
        ));
    }

    let projection = raw.projection.unwrap_or_else(|| DEFAULT_PROJECTION.to_string());
    if projection.trim().is_empty() {
        return Err(invalid(&section, "projection", "must not be empty"));
    }

    let stale_lock_timeout = match raw.stale_lock_timeout {
        Some(secs) => seconds(&section, "stale lock timeout", secs)?,
        None => defaults.stale_lock_timeout,
    };
    // An explicit null keeps tiles forever; only an absent option inherits.
    let cache_lifespan = match raw.cache_lifespan {
        Some(secs) => lifespan(&section, secs)?,
        None if bag.get("cache lifespan") == Some(&Value::Null) => None,
        None => defaults.cache_lifespan,
    };

    let bounds = raw
        .bounds
        .map(BoundsSpec::into_vec)
        .unwrap_or_else(|| vec![Bounds::default()]);
    if bounds.is_empty() {
        return Err(invalid(&section, "bounds", "needs at least one bounding box"));
    }
    for b in &bounds {
        check_bounds(&section, b)?;
    }

    let maximum_cache_age = raw
        .maximum_cache_age
        .map(|secs| seconds(&section, "maximum cache age", secs))
        .transpose()?;

    let redirects = raw
        .redirects
        .unwrap_or_default()
        .into_iter()
        .map(|(from, to)| (from.to_lowercase(), to.to_lowercase()))
        .collect();

    let tile_height = match raw.tile_height {
        None => DEFAULT_TILE_HEIGHT,
        Some(h) => u32::try_from(h)
            .ok()
            .filter(|h| *h > 0)
            .ok_or_else(|| invalid(&section, "tile height", format!("must be positive, got {}", h)))?,
    };

    let jpeg_options = raw.jpeg_options.unwrap_or_default();
    if let Some(q) = jpeg_options.quality {
        if !(1..=100).contains(&q) {
            return Err(invalid(
                &section,
                "jpeg options",
                format!("quality must be between 1 and 100, got {}", q),
            ));
        }
    }

    Ok(LayerConfig {
        name: name.to_string(),
        provider,
        metatile,
        preview,
        projection,
        stale_lock_timeout,
        cache_lifespan,
        write_cache: raw.write_cache.unwrap_or(defaults.write_cache),
        bounds,
        allowed_origin: raw.allowed_origin,
        maximum_cache_age,
        redirects,
        tile_height,
        jpeg_options,
        png_options: raw.png_options.unwrap_or_default(),
        pixel_effect: raw.pixel_effect,
    })
}

fn parse_provider(section: &Section, value: Option<Value>) -> Result<Provider, ValidationError> {
    match value {
        None => Err(invalid(section, "provider", "every layer needs a provider")),
        Some(Value::String(name)) if !name.trim().is_empty() => Ok(Provider {
            kind: ProviderKind::Builtin(name),
            params: IndexMap::new(),
        }),
        Some(Value::String(_)) => Err(invalid(section, "provider", "name must not be empty")),
        Some(value @ Value::Object(_)) => {
            let raw: RawProvider = serde_json::from_value(value).map_err(|source| {
                ValidationError::Malformed {
                    section: section.clone(),
                    source,
                }
            })?;
            let kind = match (raw.name, raw.class) {
                (Some(name), None) => ProviderKind::Builtin(name),
                (None, Some(class)) => ProviderKind::Class(class),
                (Some(_), Some(_)) => {
                    return Err(invalid(section, "provider", "give either a name or a class, not both"))
                }
                (None, None) => return Err(invalid(section, "provider", "needs a name or a class")),
            };
            Ok(Provider {
                kind,
                params: raw.params,
            })
        }
        Some(other) => Err(invalid(
            section,
            "provider",
            format!("expected a string or an object, found {}", value_kind(&other)),
        )),
    }
}

fn check_bounds(section: &Section, b: &Bounds) -> Result<(), ValidationError> {
    if b.low > b.high {
        return Err(invalid(
            section,
            "bounds",
            format!("low zoom {} is above high zoom {}", b.low, b.high),
        ));
    }
    let lat_ok = (-90.0..=90.0).contains(&b.north) && (-90.0..=90.0).contains(&b.south);
    let lon_ok = (-180.0..=180.0).contains(&b.west) && (-180.0..=180.0).contains(&b.east);
    if !lat_ok || !lon_ok {
        return Err(invalid(section, "bounds", "edges must be valid degrees"));
    }
    if b.south >= b.north {
        return Err(invalid(
            section,
            "bounds",
            format!("south {} must be below north {}", b.south, b.north),
        ));
    }
    if b.west >= b.east {
        return Err(invalid(
            section,
            "bounds",
            format!("west {} must be left of east {}", b.west, b.east),
        ));
    }
    Ok(())
}


// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_bag<T: DeserializeOwned>(section: &Section, bag: &OptionBag) -> Result<T, ValidationError> {
    serde_json::to_value(bag)
        .and_then(serde_json::from_value)
        .map_err(|source| ValidationError::Malformed {
            section: section.clone(),
            source,
        })
}

fn invalid(section: &Section, option: &'static str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidOption {
        section: section.clone(),
        option,
        reason: reason.into(),
    }
}

fn seconds(section: &Section, option: &'static str, secs: f64) -> Result<Duration, ValidationError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid(
            section,
            option,
            format!("expected a non-negative number of seconds, got {}", secs),
        ));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| invalid(section, option, e.to_string()))
}

/// Zero means "keep forever".
fn lifespan(section: &Section, secs: f64) -> Result<Option<Duration>, ValidationError> {
    let d = seconds(section, "cache lifespan", secs)?;
    Ok(if d.is_zero() { None } else { Some(d) })
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
