//! Single-tile fetcher.
//!
//! [`Fetcher::fetch`] either finds the tile already cached or downloads it,
//! retrying transport failures forever with capped exponential backoff. Any
//! response the client hands back is stored, whatever its status. A provider
//! that stays unreachable stalls the run on that tile rather than skipping
//! it; only local filesystem failures are returned.

mod backoff;

pub use backoff::{
    Backoff, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_SECS, DEFAULT_MAX_DELAY_SECS,
};

use thiserror::Error;
use tracing::{debug, error};

use crate::clock::Clock;
use crate::coord::TileCoord;
use crate::provider::{HttpClient, UrlTemplate};
use crate::schedule::FetchSession;
use crate::store::{StoreError, TileStore};

/// Result of fetching one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The tile was already on disk; no request was made.
    Cached,
    /// The tile was downloaded and stored.
    Downloaded {
        /// Number of HTTP attempts, including the successful one.
        attempts: u32,
        /// Size of the stored body.
        bytes: usize,
    },
}

/// Errors that stop a fetch. Network failures are never reported here.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Downloads tiles for one provider into a [`TileStore`].
pub struct Fetcher<C, K> {
    client: C,
    clock: K,
    store: TileStore,
    url: UrlTemplate,
    backoff: Backoff,
}

impl<C: HttpClient, K: Clock> Fetcher<C, K> {
    /// Creates a fetcher with the default backoff (1 s doubling to 1 h).
    pub fn new(client: C, clock: K, store: TileStore, url: UrlTemplate) -> Self {
        Self {
            client,
            clock,
            store,
            url,
            backoff: Backoff::default(),
        }
    }

    /// Replaces the retry backoff.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Ensures `tile` is present in the store.
    ///
    /// Returns immediately if the tile is cached. Otherwise waits for the
    /// duty cycle before each attempt and retries until a response body is
    /// received. The body is stored as-is, without content validation.
    pub fn fetch(
        &self,
        tile: &TileCoord,
        session: &FetchSession,
    ) -> Result<FetchOutcome, FetchError> {
        if self.store.exists(tile) {
            return Ok(FetchOutcome::Cached);
        }

        let url = self.url.format(tile);
        let mut attempts = 0u32;

        let body = loop {
            session.wait_until_active(&self.clock);
            attempts += 1;

            match self.client.get(&url) {
                Ok(body) => break body,
                Err(e) => {
                    let wait = self.backoff.delay_for_failure(attempts);
                    error!(
                        url = %url,
                        path = %self.store.path(tile).display(),
                        attempt = attempts,
                        error = %e,
                        "Failed to download tile"
                    );
                    error!(wait_secs = wait.as_secs(), "Waiting before retry");
                    self.clock.sleep(wait);
                }
            }
        };

        self.store.write(tile, &body)?;
        debug!(
            z = tile.z,
            x = tile.x,
            y = tile.y,
            bytes = body.len(),
            attempts,
            "Tile downloaded"
        );

        Ok(FetchOutcome::Downloaded {
            attempts,
            bytes: body.len(),
        })
    }
}
