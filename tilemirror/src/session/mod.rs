//! Mirror session: the per-zoom pipeline.
//!
//! For each zoom level from `zoom_min` to `zoom_max`, in order:
//!
//! 1. convert the bounding box into a [`TileRectangle`],
//! 2. fetch every tile of it through the [`Scheduler`],
//! 3. if enabled, assemble the mosaic once all tiles are stored.
//!
//! Levels never overlap and the mosaic of a level is never started before
//! its fetches return. All inputs are validated in [`MirrorSession::new`],
//! so a session that starts will not fail on bad parameters halfway through.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::clock::Clock;
use crate::coord::{CoordError, GeoBoundingBox, TileRectangle, MAX_ZOOM};
use crate::fetch::Fetcher;
use crate::mosaic::{CommandRunner, Georeferencer, MosaicAssembler, MosaicError, MosaicReport};
use crate::provider::{HttpClient, ProviderConfig, ProviderError, ResolvedProvider};
use crate::schedule::{
    DutyCycle, ExecutionMode, FetchObserver, FetchSession, NoopObserver, ScheduleError,
    ScheduleReport, Scheduler,
};
use crate::store::TileStore;

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "./OfflineMap";

/// Errors that stop a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Minimum zoom {min} is greater than maximum zoom {max}")]
    InvalidZoomRange { min: u8, max: u8 },

    #[error(transparent)]
    Coord(#[from] CoordError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Mosaic(#[from] MosaicError),
}

/// Parameters of one mirror run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub bbox: GeoBoundingBox,
    pub zoom_min: u8,
    pub zoom_max: u8,
    /// Assemble a mosaic after each zoom level.
    pub mosaic: bool,
    /// Root that relative tile and mosaic templates are resolved against.
    pub output_root: PathBuf,
    pub duty_cycle: DutyCycle,
    pub execution: ExecutionMode,
}

impl SessionConfig {
    /// A sequential, throttled, mosaic-less session over `bbox`.
    pub fn new(bbox: GeoBoundingBox, zoom_min: u8, zoom_max: u8) -> Self {
        Self {
            bbox,
            zoom_min,
            zoom_max,
            mosaic: false,
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            duty_cycle: DutyCycle::default(),
            execution: ExecutionMode::Sequential,
        }
    }
}

/// Outcome of one zoom level.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomReport {
    pub rect: TileRectangle,
    pub fetch: ScheduleReport,
    pub mosaic: Option<MosaicReport>,
}

/// Progress hooks for a whole session.
pub trait SessionObserver: FetchObserver {
    fn on_mosaic_start(&self, _rect: &TileRectangle, _path: &Path) {}

    fn on_mosaic(&self, _report: &MosaicReport) {}
}

impl SessionObserver for NoopObserver {}

/// A validated, ready-to-run mirror session.
pub struct MirrorSession<C, K, R> {
    config: SessionConfig,
    provider: ResolvedProvider,
    rects: Vec<TileRectangle>,
    scheduler: Scheduler<C, K>,
    assembler: MosaicAssembler<R>,
}

impl<C, K, R> MirrorSession<C, K, R>
where
    C: HttpClient,
    K: Clock,
    R: CommandRunner,
{
    /// Validates the configuration and wires up the pipeline.
    ///
    /// Fails if the zoom range is inverted or exceeds [`MAX_ZOOM`], if the
    /// bounding box cannot be projected, or if the provider templates are
    /// invalid.
    pub fn new(
        config: SessionConfig,
        provider: &ProviderConfig,
        client: C,
        clock: K,
        georef: Georeferencer<R>,
    ) -> Result<Self, SessionError> {
        if config.zoom_min > config.zoom_max {
            return Err(SessionError::InvalidZoomRange {
                min: config.zoom_min,
                max: config.zoom_max,
            });
        }
        if config.zoom_max > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(config.zoom_max).into());
        }

        let provider = provider.resolve()?;
        let rects = (config.zoom_min..=config.zoom_max)
            .map(|z| TileRectangle::from_bbox(&config.bbox, z))
            .collect::<Result<Vec<_>, _>>()?;

        let store = TileStore::new(&config.output_root, provider.tile_path.clone());
        let fetcher = Fetcher::new(client, clock, store.clone(), provider.url.clone());
        let scheduler = Scheduler::new(fetcher, config.execution)?;
        let assembler = MosaicAssembler::new(store, provider.mosaic_path.clone(), georef);

        Ok(Self {
            config,
            provider,
            rects,
            scheduler,
            assembler,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn provider(&self) -> &ResolvedProvider {
        &self.provider
    }

    /// Tile rectangles, one per zoom level, in processing order.
    pub fn rectangles(&self) -> &[TileRectangle] {
        &self.rects
    }

    /// Runs every zoom level to completion.
    pub fn run<O: SessionObserver>(&self, observer: &O) -> Result<Vec<ZoomReport>, SessionError> {
        info!(
            provider = %self.provider.name,
            url = %self.provider.url.as_str(),
            root = %self.config.output_root.display(),
            zoom_min = self.config.zoom_min,
            zoom_max = self.config.zoom_max,
            "Starting mirror session"
        );

        let session = FetchSession::begin(self.scheduler.fetcher().clock(), self.config.duty_cycle);
        let mut reports = Vec::with_capacity(self.rects.len());

        for rect in &self.rects {
            let fetch = self.scheduler.run(rect, &session, observer)?;

            let mosaic = if self.config.mosaic {
                observer.on_mosaic_start(rect, &self.assembler.mosaic_path(rect));
                let report = self.assembler.assemble(rect)?;
                observer.on_mosaic(&report);
                Some(report)
            } else {
                None
            };

            reports.push(ZoomReport {
                rect: *rect,
                fetch,
                mosaic,
            });
        }

        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::coord::TileCoord;
    use crate::fetch::FetchOutcome;
    use crate::mosaic::MissingTools;
    use crate::provider::{MockHttpClient, NamedProvider};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    type TestSession = MirrorSession<Arc<MockHttpClient>, Arc<ManualClock>, MissingTools>;

    fn world() -> GeoBoundingBox {
        GeoBoundingBox::new(-179.999999, 179.999999, -84.999999, 84.999999).unwrap()
    }

    fn config(temp: &TempDir, zoom_min: u8, zoom_max: u8) -> SessionConfig {
        let mut config = SessionConfig::new(world(), zoom_min, zoom_max);
        config.output_root = temp.path().to_path_buf();
        config.duty_cycle = DutyCycle::unlimited();
        config
    }

    fn session(
        config: SessionConfig,
        provider: &ProviderConfig,
        client: Arc<MockHttpClient>,
    ) -> Result<TestSession, SessionError> {
        MirrorSession::new(
            config,
            provider,
            client,
            Arc::new(ManualClock::default()),
            Georeferencer::new(MissingTools),
        )
    }

    fn osm() -> ProviderConfig {
        ProviderConfig::Named(NamedProvider::OpenStreetMap)
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl FetchObserver for Events {
        fn on_start(&self, rect: &TileRectangle) {
            self.0.lock().push(format!("fetch {}", rect.z));
        }

        fn on_tile(&self, _tile: &TileCoord, _outcome: &FetchOutcome) {}
    }

    impl SessionObserver for Events {
        fn on_mosaic(&self, report: &MosaicReport) {
            self.0.lock().push(format!("mosaic {}", report.placed));
        }
    }

    #[test]
    fn test_inverted_zoom_range_rejected() {
        let temp = TempDir::new().unwrap();
        let result = session(config(&temp, 3, 2), &osm(), Arc::new(MockHttpClient::ok(vec![])));
        assert!(matches!(
            result,
            Err(SessionError::InvalidZoomRange { min: 3, max: 2 })
        ));
    }

    #[test]
    fn test_zoom_above_max_rejected() {
        let temp = TempDir::new().unwrap();
        let result = session(config(&temp, 0, 25), &osm(), Arc::new(MockHttpClient::ok(vec![])));
        assert!(matches!(
            result,
            Err(SessionError::Coord(CoordError::InvalidZoom(25)))
        ));
    }

    #[test]
    fn test_bad_custom_template_rejected() {
        let temp = TempDir::new().unwrap();
        let provider = ProviderConfig::custom("mine", "http://t/{z}/{x}", None, None);
        let result = session(config(&temp, 0, 0), &provider, Arc::new(MockHttpClient::ok(vec![])));
        assert!(matches!(result, Err(SessionError::Provider(_))));
    }

    #[test]
    fn test_rectangles_cover_each_zoom_level() {
        let temp = TempDir::new().unwrap();
        let session = session(config(&temp, 0, 2), &osm(), Arc::new(MockHttpClient::ok(vec![])))
            .unwrap();
        let counts: Vec<u64> = session.rectangles().iter().map(|r| r.tile_count()).collect();
        assert_eq!(counts, vec![1, 4, 16]);
    }

    #[test]
    fn test_run_fetches_every_level_without_mosaic() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockHttpClient::ok(vec![1, 2]));
        let session = session(config(&temp, 0, 1), &osm(), client.clone()).unwrap();

        let reports = session.run(&NoopObserver).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].fetch.downloaded, 1);
        assert_eq!(reports[1].fetch.downloaded, 4);
        assert!(reports.iter().all(|r| r.mosaic.is_none()));
        assert_eq!(client.request_count(), 5);
        assert_eq!(client.requests()[0], "https://tile.openstreetmap.fr/hot/0/0/0.png");
        assert!(temp.path().join("Tile/openstreetmap/1/1/1.png").is_file());
        assert!(!temp.path().join("Mosaic").exists());
    }

    #[test]
    fn test_mosaic_follows_fetch_for_each_level() {
        let temp = TempDir::new().unwrap();
        let mut config = config(&temp, 0, 1);
        config.mosaic = true;
        let session = session(config, &osm(), Arc::new(MockHttpClient::ok(vec![0]))).unwrap();
        let events = Events::default();

        let reports = session.run(&events).unwrap();

        assert_eq!(
            *events.0.lock(),
            vec!["fetch 0", "mosaic 0", "fetch 1", "mosaic 0"]
        );
        let mosaic = reports[1].mosaic.as_ref().unwrap();
        assert_eq!(mosaic.corrupt, 4);
        assert_eq!(
            mosaic.path,
            temp.path().join("Mosaic/openstreetmap-1-0_1-0_1.jpg")
        );
        assert!(mosaic.path.is_file());
        assert!(mosaic.sidecar.is_file());
    }
}
