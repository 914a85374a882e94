//! Coordinate type definitions

use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.0511287798;
pub const MAX_LAT: f64 = 85.0511287798;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Highest zoom level accepted for a mirror session.
///
/// At zoom 24 a tile index still fits comfortably in `u32` and a single-row
/// mosaic strip stays addressable.
pub const MAX_ZOOM: u8 = 24;

/// Edge length of a tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Tile coordinates in the slippy-map system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level
    pub z: u8,
    /// Column, 0 at the antimeridian (west)
    pub x: u32,
    /// Row, 0 at the north edge
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile coordinate.
    #[inline]
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

/// Geographic rectangle requested by the caller, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl GeoBoundingBox {
    /// Creates a bounding box, checking ranges and ordering.
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Result<Self, CoordError> {
        for lon in [lon_min, lon_max] {
            if !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(CoordError::InvalidLongitude(lon));
            }
        }
        for lat in [lat_min, lat_max] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(CoordError::InvalidLatitude(lat));
            }
        }
        if lon_min > lon_max {
            return Err(CoordError::InvertedRange {
                axis: "longitude",
                min: lon_min,
                max: lon_max,
            });
        }
        if lat_min > lat_max {
            return Err(CoordError::InvertedRange {
                axis: "latitude",
                min: lat_min,
                max: lat_max,
            });
        }

        Ok(Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        })
    }
}

/// Geographic extent actually covered by a [`TileRectangle`].
///
/// Tile edges rarely coincide with the requested box, so this is always
/// equal to or larger than the [`GeoBoundingBox`] it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLonBounds {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

/// Inclusive block of tiles at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRectangle {
    pub z: u8,
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileRectangle {
    /// Creates a rectangle from explicit tile bounds.
    pub fn new(z: u8, x_min: u32, x_max: u32, y_min: u32, y_max: u32) -> Result<Self, CoordError> {
        if z > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(z));
        }
        if x_min > x_max || y_min > y_max {
            return Err(CoordError::EmptyRectangle {
                x_min,
                x_max,
                y_min,
                y_max,
            });
        }

        Ok(Self {
            z,
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    /// Number of tile columns.
    #[inline]
    pub fn columns(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    /// Number of tile rows.
    #[inline]
    pub fn rows(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    /// Total number of tiles in the rectangle.
    #[inline]
    pub fn tile_count(&self) -> u64 {
        self.columns() as u64 * self.rows() as u64
    }

    /// Pixel dimensions of a mosaic built from this rectangle.
    ///
    /// Returns `None` if either side overflows `u32`.
    pub fn pixel_size(&self) -> Option<(u32, u32)> {
        let width = self.columns().checked_mul(TILE_SIZE)?;
        let height = self.rows().checked_mul(TILE_SIZE)?;
        Some((width, height))
    }

    /// Iterates every tile, x outer and y inner.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> {
        let Self {
            z,
            x_min,
            x_max,
            y_min,
            y_max,
        } = *self;
        (x_min..=x_max).flat_map(move |x| (y_min..=y_max).map(move |y| TileCoord::new(z, x, y)))
    }

    /// Returns true if the tile lies inside this rectangle.
    pub fn contains(&self, tile: &TileCoord) -> bool {
        tile.z == self.z
            && (self.x_min..=self.x_max).contains(&tile.x)
            && (self.y_min..=self.y_max).contains(&tile.y)
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),

    #[error("Invalid zoom level: {0} (max {max})", max = MAX_ZOOM)]
    InvalidZoom(u8),

    #[error("Inverted {axis} range: min {min} > max {max}")]
    InvertedRange {
        axis: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Latitude {0} is outside the Web Mercator range (±{max})", max = MAX_LAT)]
    OutsideMercatorRange(f64),

    #[error("Empty tile rectangle: x {x_min}..={x_max}, y {y_min}..={y_max}")]
    EmptyRectangle {
        x_min: u32,
        x_max: u32,
        y_min: u32,
        y_max: u32,
    },
}
