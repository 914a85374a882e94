//! Tile provider abstraction
//!
//! A provider is a URL template plus the on-disk layout for its tiles and
//! mosaics. Presets cover the common public tile servers; anything else is
//! described with a [`ProviderConfig::Custom`] set of templates.
//!
//! ```
//! use tilemirror::provider::{NamedProvider, ProviderConfig};
//!
//! let provider = ProviderConfig::Named(NamedProvider::OpenStreetMap).resolve().unwrap();
//! assert_eq!(provider.name, "openstreetmap");
//! ```

mod http;
mod template;
mod types;

pub use http::{is_retryable_status, HttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use template::{MosaicPathTemplate, TilePathTemplate, UrlTemplate};
pub use types::{
    default_mosaic_path, default_tile_path, NamedProvider, ProviderConfig, ProviderError,
    ResolvedProvider,
};

#[cfg(test)]
pub use http::tests::{direct_client, MockHttpClient, StatusServer};
