//! Time-bounded cache of the model list.
//!
//! One cache is built per process and handed around by reference. The
//! clock is injected so expiry can be tested without sleeping.

use super::client::{LlmError, ModelClient};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CachedList {
    models: Vec<String>,
    fetched_at: Instant,
}

/// Caches `ModelClient::list_models` for a fixed TTL.
pub struct ModelListCache<C: Clock = SystemClock> {
    client: Arc<dyn ModelClient>,
    ttl: Duration,
    clock: C,
    state: Mutex<Option<CachedList>>,
}

impl ModelListCache<SystemClock> {
    pub fn new(client: Arc<dyn ModelClient>, ttl: Duration) -> Self {
        Self::with_clock(client, ttl, SystemClock)
    }
}

impl<C: Clock> ModelListCache<C> {
    pub fn with_clock(client: Arc<dyn ModelClient>, ttl: Duration, clock: C) -> Self {
        Self {
            client,
            ttl,
            clock,
            state: Mutex::new(None),
        }
    }

    /// Cached list while fresh, otherwise a new fetch.
    pub async fn get(&self) -> Result<Vec<String>, LlmError> {
        let mut state = self.state.lock().await;

        if let Some(cached) = state.as_ref() {
            if self.clock.now().duration_since(cached.fetched_at) < self.ttl {
                debug!("Model list served from cache");
                return Ok(cached.models.clone());
            }
        }

        self.refresh_locked(&mut state).await
    }

    /// Drop the cached list.
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
    }

    /// Fetch regardless of age.
    pub async fn force_refresh(&self) -> Result<Vec<String>, LlmError> {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state).await
    }

    async fn refresh_locked(
        &self,
        state: &mut Option<CachedList>,
    ) -> Result<Vec<String>, LlmError> {
        let models = self.client.list_models().await?;
        debug!("Fetched {} models from server", models.len());

        *state = Some(CachedList {
            models: models.clone(),
            fetched_at: self.clock.now(),
        });

        Ok(models)
    }
}
