// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Memoized sample retrieval: at most one fetch per asset reference.
//!
//! Failed fetches are evicted once observed, so the next request for the same asset starts a
//! fresh fetch. Nothing is retried on its own.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, Shared};
use futures_util::{FutureExt, TryFutureExt};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::loader::{SampleError, SampleFetcher};
use crate::audio::DecodedBuffer;

/// The result every waiter of a fetch observes.
pub type FetchResult = Result<Arc<DecodedBuffer>, Arc<SampleError>>;

/// A pending or resolved fetch shared by everyone who asked for the same asset.
type PendingBuffer = Shared<BoxFuture<'static, FetchResult>>;

/// Caches sample fetches by asset reference.
pub struct SampleCache {
    fetcher: Arc<dyn SampleFetcher>,
    entries: Arc<Mutex<HashMap<String, PendingBuffer>>>,
}

impl SampleCache {
    /// Creates an empty cache backed by `fetcher`.
    pub fn new(fetcher: Arc<dyn SampleFetcher>) -> SampleCache {
        SampleCache {
            fetcher,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the decoded buffer for `file`, starting a fetch only if none is pending or
    /// resolved for it. The lookup and insert happen before the returned future is polled.
    pub fn fetch(&self, file: &str) -> impl Future<Output = FetchResult> + Send + 'static {
        let pending = {
            let mut entries = self.entries.lock();
            entries
                .entry(file.to_string())
                .or_insert_with(|| {
                    debug!(file, "Fetching sample");
                    self.fetcher.fetch(file).map_err(Arc::new).boxed().shared()
                })
                .clone()
        };

        let entries = Arc::clone(&self.entries);
        let file = file.to_string();
        async move {
            let result = pending.clone().await;
            if let Err(e) = &result {
                let mut entries = entries.lock();
                // Only evict our own failed fetch, never a newer one for the same file.
                if entries
                    .get(&file)
                    .is_some_and(|current| current.ptr_eq(&pending))
                {
                    warn!(file, error = %e, "Sample fetch failed, evicting from cache");
                    entries.remove(&file);
                }
            }
            result
        }
    }

    /// Returns true if a fetch for `file` is pending or resolved.
    pub fn contains(&self, file: &str) -> bool {
        self.entries.lock().contains_key(file)
    }

    /// Returns the number of cached assets.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing has been fetched yet.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for SampleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleCache")
            .field("cached_samples", &self.len())
            .finish()
    }
}
