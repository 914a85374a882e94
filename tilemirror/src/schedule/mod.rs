//! Bulk tile scheduling.
//!
//! The [`Scheduler`] drives a [`Fetcher`] over every tile of a
//! [`TileRectangle`] exactly once, either sequentially (x outer, y inner) or
//! on a bounded rayon worker pool. Each tile is independent, so order only
//! affects progress reporting. There is no resume state beyond the tile
//! store: rerunning a rectangle skips tiles already on disk.

mod duty_cycle;

pub use duty_cycle::{
    DutyCycle, FetchSession, DEFAULT_ACTIVE_WINDOW_SECS, DEFAULT_IDLE_WINDOW_SECS, POLL_INTERVAL,
};

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;
use tracing::info;

use crate::clock::Clock;
use crate::coord::{TileCoord, TileRectangle};
use crate::fetch::{FetchError, FetchOutcome, Fetcher};
use crate::provider::HttpClient;

/// Scheduler errors.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Duty cycle active window must be greater than zero")]
    ZeroActiveWindow,

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// How tiles of a rectangle are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One tile at a time, in row-major order.
    #[default]
    Sequential,
    /// Up to `workers` tiles concurrently.
    Parallel { workers: NonZeroUsize },
}

impl ExecutionMode {
    /// `Sequential` for zero or one worker, otherwise `Parallel`.
    pub fn from_workers(workers: usize) -> Self {
        match NonZeroUsize::new(workers) {
            Some(workers) if workers.get() > 1 => ExecutionMode::Parallel { workers },
            _ => ExecutionMode::Sequential,
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel { workers } => workers.get(),
        }
    }
}

/// Totals for one scheduled rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub total: u64,
    pub cached: u64,
    pub downloaded: u64,
}

/// Progress hooks for a scheduler run.
///
/// Called from worker threads in parallel mode.
pub trait FetchObserver: Send + Sync {
    fn on_start(&self, _rect: &TileRectangle) {}

    fn on_tile(&self, _tile: &TileCoord, _outcome: &FetchOutcome) {}

    fn on_finish(&self, _rect: &TileRectangle, _report: &ScheduleReport) {}
}

/// Observer that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FetchObserver for NoopObserver {}

#[derive(Default)]
struct Counters {
    cached: AtomicU64,
    downloaded: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Cached => self.cached.fetch_add(1, Ordering::Relaxed),
            FetchOutcome::Downloaded { .. } => self.downloaded.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn report(&self, total: u64) -> ScheduleReport {
        ScheduleReport {
            total,
            cached: self.cached.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
        }
    }
}

/// Fetches whole tile rectangles.
pub struct Scheduler<C, K> {
    fetcher: Fetcher<C, K>,
    mode: ExecutionMode,
    pool: Option<ThreadPool>,
}

impl<C: HttpClient, K: Clock> Scheduler<C, K> {
    /// Creates a scheduler, building the worker pool up front in parallel mode.
    pub fn new(fetcher: Fetcher<C, K>, mode: ExecutionMode) -> Result<Self, ScheduleError> {
        let pool = match mode {
            ExecutionMode::Sequential => None,
            ExecutionMode::Parallel { workers } => Some(
                ThreadPoolBuilder::new()
                    .num_threads(workers.get())
                    .thread_name(|i| format!("tile-fetch-{}", i))
                    .build()?,
            ),
        };

        Ok(Self {
            fetcher,
            mode,
            pool,
        })
    }

    pub fn fetcher(&self) -> &Fetcher<C, K> {
        &self.fetcher
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Fetches every tile in `rect`, returning once all of them are stored.
    pub fn run(
        &self,
        rect: &TileRectangle,
        session: &FetchSession,
        observer: &dyn FetchObserver,
    ) -> Result<ScheduleReport, ScheduleError> {
        let total = rect.tile_count();
        info!(
            z = rect.z,
            tiles = total,
            workers = self.mode.workers(),
            "Download tiles (zoom level {})",
            rect.z
        );
        observer.on_start(rect);

        let counters = Counters::default();
        let fetch_one = |tile: TileCoord| -> Result<(), FetchError> {
            let outcome = self.fetcher.fetch(&tile, session)?;
            counters.record(&outcome);
            observer.on_tile(&tile, &outcome);
            Ok(())
        };

        match &self.pool {
            None => rect.tiles().try_for_each(fetch_one)?,
            Some(pool) => pool.install(|| rect.tiles().par_bridge().try_for_each(fetch_one))?,
        }

        let report = counters.report(total);
        info!(
            z = rect.z,
            downloaded = report.downloaded,
            cached = report.cached,
            "Zoom level {} tiles complete",
            rect.z
        );
        observer.on_finish(rect, &report);

        Ok(report)
    }
}
