//! Lazily-initialized, shareable client handle.

use super::ModelClient;
use crate::error::{Error, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

type Factory = Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn ModelClient>>> + Send + Sync>;

/// Creates a model client on first use and hands out the cached instance afterwards.
///
/// The factory runs at most once per successful creation: concurrent callers
/// wait for the first one, and a failed creation leaves the handle empty so the
/// next caller tries again. Cloning is cheap and clones share the cache.
#[derive(Clone)]
pub struct LazyClient {
    factory: Factory,
    cell: Arc<OnceCell<Arc<dyn ModelClient>>>,
}

impl LazyClient {
    /// Create a handle that builds its client with `factory`.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn ModelClient>>> + Send + 'static,
    {
        Self {
            factory: Arc::new(move || factory().boxed()),
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Wrap an already-built client.
    pub fn ready(client: Arc<dyn ModelClient>) -> Self {
        let handle = Self::new({
            let client = client.clone();
            move || {
                let client = client.clone();
                async move { Ok::<_, Error>(client) }
            }
        });
        let _ = handle.cell.set(client);
        handle
    }

    /// Get the client, creating it if this is the first successful call.
    pub async fn get(&self) -> Result<Arc<dyn ModelClient>> {
        self.cell
            .get_or_try_init(|| (self.factory)())
            .await
            .cloned()
    }

    /// Whether a client has been created.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
