//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (longitude/latitude)
//! and Web Mercator slippy-map tile coordinates, plus the rectangle types a
//! mirror session works with.

mod types;

pub use types::{
    CoordError, GeoBoundingBox, LatLonBounds, TileCoord, TileRectangle, MAX_LAT, MAX_LON,
    MAX_ZOOM, MIN_LAT, MIN_LON, TILE_SIZE,
};

use std::f64::consts::PI;

/// Converts geographic coordinates to (unclamped) tile indices.
///
/// No validation is done here. Latitudes outside the Mercator range produce
/// indices outside the grid and the poles are undefined; use
/// [`TileRectangle::from_bbox`] for checked conversion.
///
/// # Arguments
///
/// * `lon` - Longitude in degrees
/// * `lat` - Latitude in degrees
/// * `z` - Zoom level
#[inline]
pub fn lon_lat_to_tile(lon: f64, lat: f64, z: u8) -> (i64, i64) {
    let n = 2.0_f64.powi(z as i32);

    let x = ((lon + 180.0) / 360.0 * n).floor();

    let lat_rad = lat.to_radians();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    (x as i64, y as i64)
}

/// Converts a tile grid corner back to geographic coordinates.
///
/// Returns the (longitude, latitude) of the tile's north-west corner. Passing
/// `x + 1`, `y + 1` yields the south-east corner, so `x` and `y` may equal
/// `2^z`.
#[inline]
pub fn tile_to_lon_lat(x: u32, y: u32, z: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(z as i32);

    let lon = x as f64 / n * 360.0 - 180.0;

    let lat_rad = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan();
    let lat = lat_rad.to_degrees();

    (lon, lat)
}

impl TileRectangle {
    /// Computes the tile rectangle covering `bbox` at zoom `z`.
    ///
    /// The north-west corner of the box gives `(x_min, y_min)` and the
    /// south-east corner gives `(x_max, y_max)`. Latitudes outside the
    /// Mercator range are rejected. Indices that land exactly on the far
    /// grid edge (longitude 180, latitude `MIN_LAT`) snap to the last tile.
    pub fn from_bbox(bbox: &GeoBoundingBox, z: u8) -> Result<Self, CoordError> {
        if z > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(z));
        }
        for lat in [bbox.lat_min, bbox.lat_max] {
            if !(MIN_LAT..=MAX_LAT).contains(&lat) {
                return Err(CoordError::OutsideMercatorRange(lat));
            }
        }

        let n = 1_i64 << z;
        let (x_min, y_min) = lon_lat_to_tile(bbox.lon_min, bbox.lat_max, z);
        let (x_max, y_max) = lon_lat_to_tile(bbox.lon_max, bbox.lat_min, z);

        Self::new(
            z,
            snap_to_grid(x_min, n),
            snap_to_grid(x_max, n),
            snap_to_grid(y_min, n),
            snap_to_grid(y_max, n),
        )
    }

    /// Geographic bounds of the tiles in this rectangle.
    pub fn geo_bounds(&self) -> LatLonBounds {
        let (lon_min, lat_max) = tile_to_lon_lat(self.x_min, self.y_min, self.z);
        let (lon_max, lat_min) = tile_to_lon_lat(self.x_max + 1, self.y_max + 1, self.z);

        LatLonBounds {
            lat_min,
            lon_min,
            lat_max,
            lon_max,
        }
    }
}

fn snap_to_grid(index: i64, n: i64) -> u32 {
    index.clamp(0, n - 1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let (x, y) = lon_lat_to_tile(-74.0060, 40.7128, 16);
        assert_eq!(x, 19295);
        assert_eq!(y, 24640);
    }

    #[test]
    fn test_london_at_zoom_10() {
        let (x, y) = lon_lat_to_tile(-0.1278, 51.5074, 10);
        assert_eq!((x, y), (511, 340));
    }

    #[test]
    fn test_origin_at_zoom_1() {
        assert_eq!(lon_lat_to_tile(0.0, 0.0, 1), (1, 1));
    }

    #[test]
    fn test_grid_corners_stay_in_bounds() {
        for z in 0..=18u8 {
            let n = 1_i64 << z;
            let (x, y) = lon_lat_to_tile(-180.0, 85.0, z);
            assert_eq!(x, 0, "zoom {}", z);
            assert!((0..n).contains(&y), "zoom {}: y {} out of grid", z, y);
            if z <= 8 {
                assert_eq!(y, 0, "zoom {}", z);
            }

            let (x, y) = lon_lat_to_tile(180.0 - 1e-9, -85.0, z);
            assert!((0..n).contains(&x), "zoom {}: x {} out of grid", z, x);
            assert!((0..n).contains(&y), "zoom {}: y {} out of grid", z, y);
        }
    }

    #[test]
    fn test_tile_to_lon_lat_northwest_corner() {
        let (lon, lat) = tile_to_lon_lat(19295, 24640, 16);
        assert!((lat - 40.713).abs() < 0.01);
        assert!((lon - (-74.007)).abs() < 0.01);
    }

    #[test]
    fn test_tile_to_lon_lat_far_edge() {
        let (lon, lat) = tile_to_lon_lat(4, 4, 2);
        assert!((lon - 180.0).abs() < 1e-9);
        assert!((lat - (-MAX_LAT)).abs() < 1e-6);
    }

    #[test]
    fn test_rectangle_from_bbox() {
        let bbox = GeoBoundingBox::new(-67.0, -45.5, -48.0, -41.5).unwrap();
        let rect = TileRectangle::from_bbox(&bbox, 5).unwrap();
        assert_eq!(rect.z, 5);
        assert_eq!((rect.x_min, rect.x_max), (10, 11));
        assert_eq!((rect.y_min, rect.y_max), (20, 20));
        assert_eq!(rect.tile_count(), 2);
        assert_eq!(rect.pixel_size(), Some((512, 256)));
    }

    #[test]
    fn test_rectangle_snaps_east_edge() {
        let bbox = GeoBoundingBox::new(-180.0, 180.0, -85.0, 85.0).unwrap();
        let rect = TileRectangle::from_bbox(&bbox, 3).unwrap();
        assert_eq!((rect.x_min, rect.x_max), (0, 7));
        assert_eq!((rect.y_min, rect.y_max), (0, 7));
    }

    #[test]
    fn test_rectangle_rejects_polar_latitude() {
        let bbox = GeoBoundingBox::new(0.0, 10.0, 0.0, 89.0).unwrap();
        assert!(matches!(
            TileRectangle::from_bbox(&bbox, 4),
            Err(CoordError::OutsideMercatorRange(_))
        ));
    }

    #[test]
    fn test_rectangle_rejects_excessive_zoom() {
        let bbox = GeoBoundingBox::new(0.0, 1.0, 0.0, 1.0).unwrap();
        assert_eq!(
            TileRectangle::from_bbox(&bbox, MAX_ZOOM + 1),
            Err(CoordError::InvalidZoom(MAX_ZOOM + 1))
        );
    }

    #[test]
    fn test_bbox_validation() {
        assert!(matches!(
            GeoBoundingBox::new(-181.0, 0.0, 0.0, 1.0),
            Err(CoordError::InvalidLongitude(_))
        ));
        assert!(matches!(
            GeoBoundingBox::new(0.0, 1.0, -91.0, 1.0),
            Err(CoordError::InvalidLatitude(_))
        ));
        assert!(matches!(
            GeoBoundingBox::new(10.0, 0.0, 0.0, 1.0),
            Err(CoordError::InvertedRange {
                axis: "longitude",
                ..
            })
        ));
        assert!(matches!(
            GeoBoundingBox::new(0.0, 1.0, 5.0, 1.0),
            Err(CoordError::InvertedRange {
                axis: "latitude",
                ..
            })
        ));
    }

    #[test]
    fn test_geo_bounds_of_rectangle() {
        let rect = TileRectangle::new(5, 10, 11, 20, 20).unwrap();
        let bounds = rect.geo_bounds();
        assert!((bounds.lon_min - (-67.5)).abs() < 1e-9);
        assert!((bounds.lon_max - (-45.0)).abs() < 1e-9);
        assert!((bounds.lat_max - (-40.9798981)).abs() < 1e-6);
        assert!((bounds.lat_min - (-48.9224993)).abs() < 1e-6);
    }

    #[test]
    fn test_tiles_iterate_x_outer_y_inner() {
        let rect = TileRectangle::new(3, 1, 2, 4, 5).unwrap();
        let tiles: Vec<_> = rect.tiles().map(|t| (t.x, t.y)).collect();
        assert_eq!(tiles, vec![(1, 4), (1, 5), (2, 4), (2, 5)]);
        assert!(rect.contains(&TileCoord::new(3, 2, 5)));
        assert!(!rect.contains(&TileCoord::new(4, 2, 5)));
    }

    #[test]
    fn test_empty_rectangle_rejected() {
        assert!(matches!(
            TileRectangle::new(3, 2, 1, 0, 0),
            Err(CoordError::EmptyRectangle { .. })
        ));
    }

    proptest! {
        #[test]
        fn roundtrip_stays_within_tile(
            lon in -179.999f64..179.999,
            lat in -85.0f64..85.0,
            z in 0u8..=18,
        ) {
            let (x, y) = lon_lat_to_tile(lon, lat, z);
            prop_assert!(x >= 0 && y >= 0);

            let (west, north) = tile_to_lon_lat(x as u32, y as u32, z);
            let (east, south) = tile_to_lon_lat(x as u32 + 1, y as u32 + 1, z);

            let eps = 1e-9;
            prop_assert!(west - eps <= lon && lon <= east + eps);
            prop_assert!(south - eps <= lat && lat <= north + eps);
        }
    }
}
