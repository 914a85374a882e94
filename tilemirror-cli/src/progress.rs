//! Terminal progress display.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use tilemirror::coord::{TileCoord, TileRectangle};
use tilemirror::fetch::FetchOutcome;
use tilemirror::mosaic::MosaicReport;
use tilemirror::schedule::{FetchObserver, ScheduleReport};
use tilemirror::session::SessionObserver;

const BAR_TEMPLATE: &str =
    "{msg:>10} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} tiles ({eta})";

/// One progress bar, reset for every zoom level.
///
/// Hidden automatically when stderr is not a terminal.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let bar = ProgressBar::new(0);
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchObserver for ProgressObserver {
    fn on_start(&self, rect: &TileRectangle) {
        self.bar.reset();
        self.bar.set_length(rect.tile_count());
        self.bar.set_message(format!("zoom {}", rect.z));
    }

    fn on_tile(&self, _tile: &TileCoord, _outcome: &FetchOutcome) {
        self.bar.inc(1);
    }

    fn on_finish(&self, _rect: &TileRectangle, _report: &ScheduleReport) {
        self.bar.finish_and_clear();
    }
}

impl SessionObserver for ProgressObserver {
    fn on_mosaic_start(&self, rect: &TileRectangle, path: &Path) {
        info!(
            "Stitching {}x{} tiles into {}",
            rect.columns(),
            rect.rows(),
            path.display()
        );
    }

    fn on_mosaic(&self, report: &MosaicReport) {
        if !report.georeferenced {
            info!(
                path = %report.path.display(),
                "Mosaic saved without georeferencing; bounds are in {}",
                report.sidecar.display()
            );
        }
    }
}
