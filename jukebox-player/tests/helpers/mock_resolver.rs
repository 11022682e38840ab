//! In-memory resolver
//!
//! Every query resolves to `mock://<query>` with a three minute duration,
//! except queries starting with "missing", which are not found. Queries can
//! be held so their resolution finishes only when the test releases them.

use async_trait::async_trait;
use jukebox_common::{RequesterId, Song};
use jukebox_player::resolver::{ResolveError, Resolver};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
pub struct MockResolver {
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    calls: AtomicUsize,
}

impl MockResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delay resolution of `query` until [`release`](Self::release)
    pub fn hold(&self, query: &str) {
        self.holds
            .lock()
            .unwrap()
            .insert(query.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, query: &str) {
        if let Some(gate) = self.holds.lock().unwrap().get(query) {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Locator the mock resolver assigns to a query
pub fn locator(query: &str) -> String {
    format!("mock://{}", query)
}

#[async_trait]
impl Resolver for MockResolver {
    async fn resolve(&self, query: &str, requester: &RequesterId) -> Result<Song, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.holds.lock().unwrap().get(query).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if query.starts_with("missing") {
            return Err(ResolveError::NotFound(query.to_string()));
        }

        Ok(Song::new(query, locator(query), requester.clone()).with_duration(180))
    }
}
