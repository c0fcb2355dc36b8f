//! Per-tile response headers.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const CONTAINS_DATA: &str = "x-tilelive-contains-data";
pub const METATILE_CACHE: &str = "Carto-Metatile-Cache";

/// Whether a tile's bytes came from a fresh render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a resolved or in-flight pass triggered by another request
    Hit,
    /// This request triggered the render pass
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A header value: either text or a boolean flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Text(String),
    Flag(bool),
}

/// Ordered header map attached to every tile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TileHeaders(BTreeMap<String, HeaderValue>);

impl TileHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_string(), HeaderValue::Text(value.into()));
    }

    pub fn insert_flag(&mut self, name: &str, value: bool) {
        self.0.insert(name.to_string(), HeaderValue::Flag(value));
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.0.get(name)
    }

    /// Text value of a header, `None` if absent or a flag.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(HeaderValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// Flag value of a header, `None` if absent or text.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.0.get(name) {
            Some(HeaderValue::Flag(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.text(CONTENT_TYPE)
    }

    /// The `Carto-Metatile-Cache` status, if set.
    pub fn cache_status(&self) -> Option<CacheStatus> {
        match self.text(METATILE_CACHE)? {
            "HIT" => Some(CacheStatus::Hit),
            "MISS" => Some(CacheStatus::Miss),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single rendered tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// Encoded payload; empty for vector tiles without data
    pub data: Bytes,
    pub headers: TileHeaders,
}

impl Tile {
    /// Copy of this tile tagged with a `Carto-Metatile-Cache` status.
    pub fn with_cache_status(&self, status: CacheStatus) -> Tile {
        let mut tile = self.clone();
        tile.headers.insert_text(METATILE_CACHE, status.as_str());
        tile
    }
}
