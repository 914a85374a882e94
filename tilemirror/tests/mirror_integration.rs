//! End-to-end tests for a mirror session.
//!
//! These run the whole pipeline (rectangle, scheduler, fetcher, store,
//! mosaic) against a stub tile server and stub GDAL tools.
//!
//! Run with: `cargo test --test mirror_integration`

use std::ffi::OsString;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use tempfile::TempDir;

use tilemirror::clock::{Clock, ManualClock};
use tilemirror::coord::{GeoBoundingBox, TILE_SIZE};
use tilemirror::mosaic::{CommandOutput, CommandRunner, GeorefError, Georeferencer};
use tilemirror::provider::{HttpClient, NamedProvider, ProviderConfig, ProviderError};
use tilemirror::schedule::{DutyCycle, ExecutionMode, NoopObserver};
use tilemirror::session::{MirrorSession, SessionConfig};

// ============================================================================
// Stubs
// ============================================================================

/// Serves a solid-colour PNG per tile; red encodes x, green encodes y.
#[derive(Default)]
struct StubTileServer {
    requests: Mutex<Vec<String>>,
}

impl StubTileServer {
    fn color_for(x: u32, y: u32) -> [u8; 3] {
        [(x * 20) as u8, (y * 10) as u8, 200]
    }

    fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl HttpClient for StubTileServer {
    fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.requests.lock().push(url.to_string());

        // .../{z}/{x}/{y}.png
        let mut parts = url.trim_end_matches(".png").rsplit('/');
        let y: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let x: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);

        let tile = RgbImage::from_pixel(TILE_SIZE, TILE_SIZE, Rgb(Self::color_for(x, y)));
        let mut body = Vec::new();
        tile.write_to(&mut Cursor::new(&mut body), ImageFormat::Png)
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;
        Ok(body)
    }
}

/// GDAL stand-in that records calls.
///
/// With `installed = false` every program is reported missing.
struct StubGdal {
    installed: bool,
    calls: Mutex<Vec<(String, Vec<String>, Option<String>)>>,
}

impl StubGdal {
    fn new(installed: bool) -> Self {
        Self {
            installed,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl CommandRunner for StubGdal {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, GeorefError> {
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        self.calls
            .lock()
            .push((program.to_string(), args.clone(), stdin.map(str::to_string)));

        if !self.installed {
            return Err(GeorefError::ToolMissing {
                program: program.to_string(),
            });
        }

        match program {
            "gdaltransform" => Ok(CommandOutput::ok(
                "-7514065.6285097 -5009377.0856973\n-5009377.0856973 -6261721.3571216\n",
            )),
            _ => {
                let n = args.len();
                fs::copy(&args[n - 2], &args[n - 1]).map_err(|source| GeorefError::Io {
                    program: program.to_string(),
                    source,
                })?;
                Ok(CommandOutput::ok(""))
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Bounding box covering tiles x 10..=11, y 20 at zoom 5.
fn patagonia() -> GeoBoundingBox {
    GeoBoundingBox::new(-67.0, -45.5, -48.0, -41.5).unwrap()
}

fn session_config(temp: &TempDir) -> SessionConfig {
    let mut config = SessionConfig::new(patagonia(), 5, 5);
    config.mosaic = true;
    config.output_root = temp.path().to_path_buf();
    config.duty_cycle = DutyCycle::unlimited();
    config
}

fn close_to(actual: &Rgb<u8>, expected: [u8; 3]) -> bool {
    actual
        .0
        .iter()
        .zip(expected)
        .all(|(a, e)| (i16::from(*a) - i16::from(e)).abs() <= 8)
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_zoom_five_mosaic_without_gdal() {
    let temp = TempDir::new().unwrap();
    let server = Arc::new(StubTileServer::default());
    let gdal = Arc::new(StubGdal::new(false));

    let session = MirrorSession::new(
        session_config(&temp),
        &ProviderConfig::Named(NamedProvider::OpenStreetMap),
        server.clone(),
        Arc::new(ManualClock::default()),
        Georeferencer::new(gdal.clone()),
    )
    .unwrap();

    let reports = session.run(&NoopObserver).unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(
        (report.rect.x_min, report.rect.x_max, report.rect.y_min, report.rect.y_max),
        (10, 11, 20, 20)
    );
    assert_eq!(report.fetch.downloaded, 2);
    assert_eq!(server.request_count(), 2);
    assert!(temp.path().join("Tile/openstreetmap/5/10/20.png").is_file());
    assert!(temp.path().join("Tile/openstreetmap/5/11/20.png").is_file());

    let mosaic = report.mosaic.as_ref().unwrap();
    assert!(!mosaic.georeferenced);
    assert_eq!(mosaic.placed, 2);
    assert_eq!(
        mosaic.path,
        temp.path().join("Mosaic/openstreetmap-5-10_11-20_20.jpg")
    );
    assert!(!temp
        .path()
        .join("Mosaic/openstreetmap-5-10_11-20_20_temp.jpg")
        .exists());

    let image = image::open(&mosaic.path).unwrap().to_rgb8();
    assert_eq!(image.dimensions(), (512, 256));
    assert!(close_to(
        image.get_pixel(128, 128),
        StubTileServer::color_for(10, 20)
    ));
    assert!(close_to(
        image.get_pixel(384, 128),
        StubTileServer::color_for(11, 20)
    ));

    assert_eq!(
        fs::read_to_string(&mosaic.sidecar).unwrap(),
        "[[-48.9224993, -67.5000000], [-40.9798981, -45.0000000]]"
    );
    assert_eq!(
        mosaic.sidecar,
        temp.path()
            .join("Mosaic/openstreetmap-5-10_11-20_20.jpg.latlonbound.txt")
    );
}

#[test]
fn test_zoom_five_mosaic_is_georeferenced() {
    let temp = TempDir::new().unwrap();
    let gdal = Arc::new(StubGdal::new(true));

    let session = MirrorSession::new(
        session_config(&temp),
        &ProviderConfig::Named(NamedProvider::OpenStreetMap),
        Arc::new(StubTileServer::default()),
        Arc::new(ManualClock::default()),
        Georeferencer::new(gdal.clone()),
    )
    .unwrap();

    let reports = session.run(&NoopObserver).unwrap();
    let mosaic = reports[0].mosaic.as_ref().unwrap();
    assert!(mosaic.georeferenced);
    assert!(mosaic.path.is_file());

    let calls = gdal.calls.lock();
    assert_eq!(calls.len(), 2);

    let (program, _, stdin) = &calls[0];
    assert_eq!(program, "gdaltransform");
    assert_eq!(
        stdin.as_deref(),
        Some("-67.5000000 -40.9798981\n-45.0000000 -48.9224993\n")
    );

    let (program, args, _) = &calls[1];
    assert_eq!(program, "gdal_translate");
    assert_eq!(
        &args[..9],
        &[
            "-of",
            "JPEG",
            "-a_srs",
            "EPSG:3857",
            "-a_ullr",
            "-7514065.6285097",
            "-5009377.0856973",
            "-5009377.0856973",
            "-6261721.3571216",
        ]
    );
    assert!(args[9].ends_with("openstreetmap-5-10_11-20_20_temp.jpg"));
    assert!(args[10].ends_with("openstreetmap-5-10_11-20_20.jpg"));
}

#[test]
fn test_rerun_downloads_nothing_and_rebuilds_mosaic() {
    let temp = TempDir::new().unwrap();
    let server = Arc::new(StubTileServer::default());
    let build = || {
        MirrorSession::new(
            session_config(&temp),
            &ProviderConfig::Named(NamedProvider::OpenStreetMap),
            server.clone(),
            Arc::new(ManualClock::default()),
            Georeferencer::new(StubGdal::new(false)),
        )
        .unwrap()
    };

    build().run(&NoopObserver).unwrap();
    let mosaic_path = temp.path().join("Mosaic/openstreetmap-5-10_11-20_20.jpg");
    fs::remove_file(&mosaic_path).unwrap();

    let reports = build().run(&NoopObserver).unwrap();

    assert_eq!(server.request_count(), 2);
    assert_eq!(reports[0].fetch.cached, 2);
    assert!(mosaic_path.is_file());
}

#[test]
fn test_parallel_session_over_several_zoom_levels() {
    let temp = TempDir::new().unwrap();
    let server = Arc::new(StubTileServer::default());
    let mut config = session_config(&temp);
    config.zoom_min = 3;
    config.zoom_max = 6;
    config.mosaic = false;
    config.execution = ExecutionMode::from_workers(4);

    let session = MirrorSession::new(
        config,
        &ProviderConfig::Named(NamedProvider::OpenStreetMap),
        server.clone(),
        Arc::new(ManualClock::default()),
        Georeferencer::new(StubGdal::new(false)),
    )
    .unwrap();

    let reports = session.run(&NoopObserver).unwrap();

    let expected: u64 = session.rectangles().iter().map(|r| r.tile_count()).sum();
    let downloaded: u64 = reports.iter().map(|r| r.fetch.downloaded).sum();
    assert_eq!(downloaded, expected);
    assert_eq!(server.request_count() as u64, expected);
}

/// Tile server on a slow link: every request takes `latency` of clock time.
struct SlowTileServer {
    clock: Arc<ManualClock>,
    latency: Duration,
    inner: StubTileServer,
    seen_at: Mutex<Vec<Duration>>,
}

impl HttpClient for SlowTileServer {
    fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.seen_at.lock().push(self.clock.now());
        self.clock.advance(self.latency);
        self.inner.get(url)
    }
}

#[test]
fn test_duty_cycle_pauses_between_requests() {
    let temp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());
    let server = Arc::new(SlowTileServer {
        clock: clock.clone(),
        latency: Duration::from_millis(2500),
        inner: StubTileServer::default(),
        seen_at: Mutex::new(Vec::new()),
    });
    let mut config = session_config(&temp);
    config.mosaic = false;
    config.duty_cycle = DutyCycle::new(Duration::from_secs(2), Duration::from_secs(1)).unwrap();

    let session = MirrorSession::new(
        config,
        &ProviderConfig::Named(NamedProvider::OpenStreetMap),
        server.clone(),
        clock.clone(),
        Georeferencer::new(StubGdal::new(false)),
    )
    .unwrap();

    session.run(&NoopObserver).unwrap();

    // The second request would fall at 2.5 s, inside the idle window.
    let seen_at = server.seen_at.lock().clone();
    assert_eq!(seen_at.len(), 2);
    assert_eq!(seen_at[0], Duration::ZERO);
    assert!(seen_at[1] >= Duration::from_secs(3));
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(500)]);
}
