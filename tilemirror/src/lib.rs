//! TileMirror - offline mirror for slippy-map tile servers
//!
//! Downloads every tile covering a geographic bounding box over a range of
//! zoom levels into a local directory tree, throttled by a duty cycle and
//! retrying failed downloads forever. Optionally stitches each zoom level
//! into a single Web Mercator georeferenced mosaic.
//!
//! # Pipeline
//!
//! ```text
//! GeoBoundingBox ─► TileRectangle (per zoom) ─► Scheduler ─► Fetcher ─► TileStore
//!                                                                          │
//!                                          MosaicAssembler ◄───────────────┘
//!                                                 │
//!                                      raster + .latlonbound.txt
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tilemirror::clock::SystemClock;
//! use tilemirror::coord::GeoBoundingBox;
//! use tilemirror::mosaic::{Georeferencer, SystemCommandRunner};
//! use tilemirror::provider::{NamedProvider, ProviderConfig, ReqwestClient};
//! use tilemirror::schedule::NoopObserver;
//! use tilemirror::session::{MirrorSession, SessionConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bbox = GeoBoundingBox::new(-67.0, -45.5, -48.0, -41.5)?;
//! let mut config = SessionConfig::new(bbox, 0, 5);
//! config.mosaic = true;
//!
//! let session = MirrorSession::new(
//!     config,
//!     &ProviderConfig::Named(NamedProvider::OpenStreetMap),
//!     ReqwestClient::new()?,
//!     SystemClock::new(),
//!     Georeferencer::new(SystemCommandRunner),
//! )?;
//! session.run(&NoopObserver)?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod coord;
pub mod fetch;
pub mod logging;
pub mod mosaic;
pub mod provider;
pub mod schedule;
pub mod session;
pub mod store;
