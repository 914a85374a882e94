//! Mosaic assembly.
//!
//! After every tile of a [`TileRectangle`] has been fetched, the
//! [`MosaicAssembler`] pastes the cached tiles onto a single RGB raster,
//! georeferences it in Web Mercator and writes a bounds sidecar next to it.
//!
//! # Output files
//!
//! For a mosaic path `Mosaic/esri-5-10_11-20_20.jpg`:
//!
//! | File | Contents |
//! |------|----------|
//! | `Mosaic/esri-5-10_11-20_20_temp.jpg` | untagged raster (removed on success) |
//! | `Mosaic/esri-5-10_11-20_20.jpg` | georeferenced raster, or the untagged one if georeferencing failed |
//! | `Mosaic/esri-5-10_11-20_20.jpg.latlonbound.txt` | `[[lat_min, lon_min], [lat_max, lon_max]]` |
//!
//! Missing or undecodable tiles leave their cell black. Georeferencing
//! failures never fail the assembly; only filesystem and encoding errors on
//! the output do.

mod georef;

pub use georef::{
    CommandOutput, CommandRunner, GeorefError, Georeferencer, ProjectedPoint, RasterFormat,
    SystemCommandRunner, DEFAULT_TRANSFORM_PROGRAM, DEFAULT_TRANSLATE_PROGRAM, SOURCE_SRS,
    TARGET_SRS,
};

#[cfg(test)]
pub use georef::tests::{FakeGdal, MissingTools};

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::{imageops, RgbImage};
use thiserror::Error;
use tracing::{info, warn};

use crate::coord::{LatLonBounds, TileRectangle, TILE_SIZE};
use crate::provider::MosaicPathTemplate;
use crate::store::TileStore;

/// Suffix appended to the mosaic path for the bounds sidecar.
pub const SIDECAR_SUFFIX: &str = ".latlonbound.txt";

/// Marker inserted before the extension of the intermediate raster.
pub const TEMP_MARKER: &str = "_temp";

/// Errors that fail a mosaic.
#[derive(Debug, Error)]
pub enum MosaicError {
    #[error("Mosaic of {columns}x{rows} tiles is too large to allocate")]
    TooLarge { columns: u32, rows: u32 },

    #[error("Mosaic path has no parent directory: {0}")]
    NoParent(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to encode mosaic {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    Promote {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write bounds file {path}: {source}")]
    Sidecar { path: PathBuf, source: io::Error },
}

/// A composed raster before it is written out.
#[derive(Debug)]
pub struct ComposedMosaic {
    pub image: RgbImage,
    pub placed: u64,
    pub missing: u64,
    pub corrupt: u64,
}

/// What [`MosaicAssembler::assemble`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicReport {
    pub path: PathBuf,
    pub sidecar: PathBuf,
    pub bounds: LatLonBounds,
    pub placed: u64,
    pub missing: u64,
    pub corrupt: u64,
    /// False if the final raster is the untagged fallback.
    pub georeferenced: bool,
}

/// Builds mosaics from cached tiles.
pub struct MosaicAssembler<R> {
    store: TileStore,
    template: MosaicPathTemplate,
    georef: Georeferencer<R>,
}

impl<R: CommandRunner> MosaicAssembler<R> {
    pub fn new(store: TileStore, template: MosaicPathTemplate, georef: Georeferencer<R>) -> Self {
        Self {
            store,
            template,
            georef,
        }
    }

    pub fn georeferencer(&self) -> &Georeferencer<R> {
        &self.georef
    }

    /// Final raster path for `rect`, under the tile store root.
    pub fn mosaic_path(&self, rect: &TileRectangle) -> PathBuf {
        self.template.format(self.store.root(), rect)
    }

    /// Pastes every cached tile of `rect` onto a blank canvas.
    pub fn compose(&self, rect: &TileRectangle) -> Result<ComposedMosaic, MosaicError> {
        let (width, height) = rect.pixel_size().ok_or(MosaicError::TooLarge {
            columns: rect.columns(),
            rows: rect.rows(),
        })?;

        let mut mosaic = ComposedMosaic {
            image: RgbImage::new(width, height),
            placed: 0,
            missing: 0,
            corrupt: 0,
        };

        for tile in rect.tiles() {
            let path = self.store.path(&tile);
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Tile missing, leaving cell blank");
                    mosaic.missing += 1;
                    continue;
                }
            };

            match image::load_from_memory(&bytes) {
                Ok(decoded) => {
                    let x = i64::from(tile.x - rect.x_min) * i64::from(TILE_SIZE);
                    let y = i64::from(tile.y - rect.y_min) * i64::from(TILE_SIZE);
                    imageops::replace(&mut mosaic.image, &decoded.to_rgb8(), x, y);
                    mosaic.placed += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to decode tile, leaving cell blank");
                    mosaic.corrupt += 1;
                }
            }
        }

        Ok(mosaic)
    }

    /// Composes, georeferences and writes the mosaic for `rect`.
    pub fn assemble(&self, rect: &TileRectangle) -> Result<MosaicReport, MosaicError> {
        let path = self.mosaic_path(rect);
        let temp = temp_path(&path);
        let sidecar = sidecar_path(&path);
        let bounds = rect.geo_bounds();

        info!(z = rect.z, path = %path.display(), "Combine tiles (zoom level {})", rect.z);

        let parent = path
            .parent()
            .ok_or_else(|| MosaicError::NoParent(path.clone()))?;
        fs::create_dir_all(parent).map_err(|source| MosaicError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;

        let composed = self.compose(rect)?;
        composed
            .image
            .save(&temp)
            .map_err(|source| MosaicError::Encode {
                path: temp.clone(),
                source,
            })?;

        let georeferenced = match self.georef.georeference(&bounds, &temp, &path) {
            Ok(_) => {
                if let Err(e) = fs::remove_file(&temp) {
                    warn!(path = %temp.display(), error = %e, "Failed to remove intermediate mosaic");
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "Georeferencing failed, keeping untagged mosaic");
                fs::rename(&temp, &path).map_err(|source| MosaicError::Promote {
                    from: temp.clone(),
                    to: path.clone(),
                    source,
                })?;
                false
            }
        };

        write_sidecar(&sidecar, &bounds)?;

        info!(
            path = %path.display(),
            placed = composed.placed,
            missing = composed.missing,
            corrupt = composed.corrupt,
            georeferenced,
            "Mosaic written"
        );

        Ok(MosaicReport {
            path,
            sidecar,
            bounds,
            placed: composed.placed,
            missing: composed.missing,
            corrupt: composed.corrupt,
            georeferenced,
        })
    }
}

/// `<stem>_temp.<ext>` next to `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_stem().map(OsString::from).unwrap_or_default();
    name.push(TEMP_MARKER);
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// `<path>.latlonbound.txt`.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Sidecar text: `[[lat_min, lon_min], [lat_max, lon_max]]`, 7 decimals.
pub fn format_bounds(bounds: &LatLonBounds) -> String {
    format!(
        "[[{:.7}, {:.7}], [{:.7}, {:.7}]]",
        bounds.lat_min, bounds.lon_min, bounds.lat_max, bounds.lon_max
    )
}

fn write_sidecar(path: &Path, bounds: &LatLonBounds) -> Result<(), MosaicError> {
    fs::write(path, format_bounds(bounds)).map_err(|source| MosaicError::Sidecar {
        path: path.to_path_buf(),
        source,
    })
}
