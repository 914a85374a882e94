//! Provider selection and resolution.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::template::{MosaicPathTemplate, TilePathTemplate, UrlTemplate};

/// Errors that can occur while selecting a provider or talking to it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Provider name is not a preset and no URL template was supplied.
    #[error("Unknown provider '{0}' (use a preset or pass a URL template)")]
    UnknownProvider(String),

    /// Template lacks a required placeholder.
    #[error("{kind} template '{template}' is missing {placeholder}")]
    MissingPlaceholder {
        kind: &'static str,
        template: String,
        placeholder: &'static str,
    },

    /// Template is blank.
    #[error("{kind} template is empty")]
    EmptyTemplate { kind: &'static str },
}

/// Built-in tile providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedProvider {
    /// Esri World Imagery
    EsriSatellite,
    /// Google road map
    GoogleRoad,
    /// Google satellite imagery
    GoogleSatellite,
    /// OpenStreetMap France humanitarian style
    OpenStreetMap,
}

impl NamedProvider {
    /// All presets, in display order.
    pub const ALL: [NamedProvider; 4] = [
        NamedProvider::EsriSatellite,
        NamedProvider::GoogleRoad,
        NamedProvider::GoogleSatellite,
        NamedProvider::OpenStreetMap,
    ];

    /// Name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            NamedProvider::EsriSatellite => "esri.satellite",
            NamedProvider::GoogleRoad => "google.road",
            NamedProvider::GoogleSatellite => "google.satellite",
            NamedProvider::OpenStreetMap => "openstreetmap",
        }
    }

    /// Directory and file-name prefix used on disk.
    pub fn slug(&self) -> &'static str {
        match self {
            NamedProvider::EsriSatellite => "esri-satellite",
            NamedProvider::GoogleRoad => "google-road",
            NamedProvider::GoogleSatellite => "google-satellite",
            NamedProvider::OpenStreetMap => "openstreetmap",
        }
    }

    pub fn url_template(&self) -> &'static str {
        match self {
            NamedProvider::EsriSatellite => {
                "http://server.arcgisonline.com/arcgis/rest/services/world_imagery/mapserver/tile/{z}/{y}/{x}"
            }
            NamedProvider::GoogleRoad => "https://mt1.google.cn/vt/lyrs=m&hl=zh-CN&x={x}&y={y}&z={z}",
            NamedProvider::GoogleSatellite => {
                "https://mt1.google.cn/vt/lyrs=s&hl=zh-CN&x={x}&y={y}&z={z}"
            }
            NamedProvider::OpenStreetMap => "https://tile.openstreetmap.fr/hot/{z}/{x}/{y}.png",
        }
    }

    /// File extension of the tiles this provider serves.
    pub fn tile_extension(&self) -> &'static str {
        match self {
            NamedProvider::OpenStreetMap => "png",
            _ => "jpg",
        }
    }
}

impl fmt::Display for NamedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NamedProvider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProviderError::UnknownProvider(s.to_string()))
    }
}

/// Default tile path template for a provider slug.
pub fn default_tile_path(slug: &str, extension: &str) -> String {
    format!("Tile/{}/{{z}}/{{x}}/{{y}}.{}", slug, extension)
}

/// Default mosaic path template for a provider slug.
pub fn default_mosaic_path(slug: &str) -> String {
    format!("Mosaic/{}-{{z}}-{{x_min}}_{{x_max}}-{{y_min}}_{{y_max}}.jpg", slug)
}

/// Provider selection: a preset or an ad-hoc set of templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Named(NamedProvider),
    Custom {
        name: String,
        url_template: String,
        tile_path_template: String,
        mosaic_path_template: String,
    },
}

impl ProviderConfig {
    /// Builds a custom provider, filling in default path templates.
    pub fn custom(
        name: impl Into<String>,
        url_template: impl Into<String>,
        tile_path_template: Option<String>,
        mosaic_path_template: Option<String>,
    ) -> Self {
        let name = name.into();
        let tile_path_template =
            tile_path_template.unwrap_or_else(|| default_tile_path(&name, "jpg"));
        let mosaic_path_template =
            mosaic_path_template.unwrap_or_else(|| default_mosaic_path(&name));

        ProviderConfig::Custom {
            name,
            url_template: url_template.into(),
            tile_path_template,
            mosaic_path_template,
        }
    }

    /// Selects a provider by name.
    ///
    /// Preset names win over a supplied URL. Any other name needs a URL.
    pub fn select(
        name: &str,
        url_template: Option<String>,
        tile_path_template: Option<String>,
        mosaic_path_template: Option<String>,
    ) -> Result<Self, ProviderError> {
        if let Ok(named) = name.parse::<NamedProvider>() {
            return Ok(ProviderConfig::Named(named));
        }

        match url_template {
            Some(url) => Ok(Self::custom(
                name,
                url,
                tile_path_template,
                mosaic_path_template,
            )),
            None => Err(ProviderError::UnknownProvider(name.to_string())),
        }
    }

    /// Resolves the selection into validated templates.
    pub fn resolve(&self) -> Result<ResolvedProvider, ProviderError> {
        match self {
            ProviderConfig::Named(named) => Ok(ResolvedProvider {
                name: named.name().to_string(),
                url: UrlTemplate::parse(named.url_template())?,
                tile_path: TilePathTemplate::parse(default_tile_path(
                    named.slug(),
                    named.tile_extension(),
                ))?,
                mosaic_path: MosaicPathTemplate::parse(default_mosaic_path(named.slug()))?,
            }),
            ProviderConfig::Custom {
                name,
                url_template,
                tile_path_template,
                mosaic_path_template,
            } => Ok(ResolvedProvider {
                name: name.clone(),
                url: UrlTemplate::parse(url_template.as_str())?,
                tile_path: TilePathTemplate::parse(tile_path_template.as_str())?,
                mosaic_path: MosaicPathTemplate::parse(mosaic_path_template.as_str())?,
            }),
        }
    }
}

/// Concrete templates for one run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub name: String,
    pub url: UrlTemplate,
    pub tile_path: TilePathTemplate,
    pub mosaic_path: MosaicPathTemplate,
}
