//! Typed path and URL templates.
//!
//! Each template kind knows exactly which placeholders it substitutes, so
//! callers pass a tile or rectangle instead of a loose key/value map.

use std::fmt;
use std::path::{Path, PathBuf};

use super::types::ProviderError;
use crate::coord::{TileCoord, TileRectangle};

const TILE_PLACEHOLDERS: [&str; 3] = ["{x}", "{y}", "{z}"];

fn check_tile_placeholders(kind: &'static str, template: &str) -> Result<(), ProviderError> {
    for placeholder in TILE_PLACEHOLDERS {
        if !template.contains(placeholder) {
            return Err(ProviderError::MissingPlaceholder {
                kind,
                template: template.to_string(),
                placeholder,
            });
        }
    }
    Ok(())
}

fn format_tile(template: &str, tile: &TileCoord) -> String {
    template
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
        .replace("{z}", &tile.z.to_string())
}

/// Tile download URL, e.g. `https://host/{z}/{x}/{y}.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    /// Parses a URL template; `{x}`, `{y}` and `{z}` are required.
    pub fn parse(template: impl Into<String>) -> Result<Self, ProviderError> {
        let template = template.into();
        check_tile_placeholders("url", &template)?;
        Ok(Self(template))
    }

    /// Builds the request URL for a tile.
    pub fn format(&self, tile: &TileCoord) -> String {
        format_tile(&self.0, tile)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relative (or absolute) tile file path, e.g. `Tile/osm/{z}/{x}/{y}.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePathTemplate(String);

impl TilePathTemplate {
    /// Parses a tile path template; `{x}`, `{y}` and `{z}` are required so
    /// that every tile maps to its own file.
    pub fn parse(template: impl Into<String>) -> Result<Self, ProviderError> {
        let template = template.into();
        check_tile_placeholders("tile path", &template)?;
        Ok(Self(template))
    }

    /// Resolves the tile's file path under `root`.
    ///
    /// Absolute templates ignore `root`.
    pub fn format(&self, root: &Path, tile: &TileCoord) -> PathBuf {
        root.join(format_tile(&self.0, tile))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Mosaic file path, e.g. `Mosaic/osm-{z}-{x_min}_{x_max}-{y_min}_{y_max}.jpg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicPathTemplate(String);

impl MosaicPathTemplate {
    pub fn parse(template: impl Into<String>) -> Result<Self, ProviderError> {
        let template = template.into();
        if template.trim().is_empty() {
            return Err(ProviderError::EmptyTemplate { kind: "mosaic path" });
        }
        Ok(Self(template))
    }

    /// Resolves the mosaic file path for a rectangle under `root`.
    pub fn format(&self, root: &Path, rect: &TileRectangle) -> PathBuf {
        // {x_min} etc. go first so "{x}" style placeholders cannot eat them.
        let path = self
            .0
            .replace("{x_min}", &rect.x_min.to_string())
            .replace("{x_max}", &rect.x_max.to_string())
            .replace("{y_min}", &rect.y_min.to_string())
            .replace("{y_max}", &rect.y_max.to_string())
            .replace("{z}", &rect.z.to_string());
        root.join(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
