//! Trust store loader and background refresh.
//!
//! [`TrustStoreLoader`] reads a [`CertificateSource`], builds a fresh
//! [`TrustSnapshot`] and publishes it to a [`TrustStore`]. Each call to
//! [`load`](TrustStoreLoader::load) is one rotation cycle:
//!
//! ```text
//! load_all() ──► skip per-certificate failures ──► TrustSnapshot::from_records
//!     │                                                    │
//!     └─ SourceUnavailable: abort, keep previous ──────────┴──► TrustStore::rotate
//! ```
//!
//! A loader can also run periodically on a `tokio` interval (see
//! [`spawn_refresh`](TrustStoreLoader::spawn_refresh)); the task stops on
//! [`shutdown`](TrustStoreLoader::shutdown) or when the loader is dropped.

use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use chrono::Utc;
use fail::fail_point;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{StoreError, StoreResult},
    snapshot::TrustSnapshot,
    source::CertificateSource,
    trust_store::TrustStore,
};

/// Loader configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Interval between background reloads; `None` disables the refresh task.
    #[serde(with = "humantime_serde", default)]
    pub refresh_interval: Option<Duration>,

    /// Refuse to publish a snapshot without an issuance certificate.
    ///
    /// Issuers set this; verification-only deployments leave it off.
    #[serde(default)]
    #[builder(default)]
    pub require_issuer: bool,
}

/// Result of one successful load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Generation published by this cycle.
    pub generation: u64,
    /// Certificates in the published snapshot.
    pub trusted: usize,
    /// Entries skipped because they failed to load.
    pub skipped: usize,
    /// Whether the published snapshot can issue tokens.
    pub has_issuer: bool,
}

/// Populates and refreshes a [`TrustStore`] from a [`CertificateSource`].
pub struct TrustStoreLoader {
    source: Arc<dyn CertificateSource>,
    store: Arc<TrustStore>,
    config: LoaderConfig,
    cancel_token: CancellationToken,
    refresh_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    cycles: AtomicU64,
    failures: AtomicU64,
    last_generation: AtomicU64,
}

impl TrustStoreLoader {
    /// Creates a loader; nothing is loaded until [`load`](Self::load) runs.
    #[must_use]
    pub fn new(
        source: Arc<dyn CertificateSource>,
        store: Arc<TrustStore>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
            cancel_token: CancellationToken::new(),
            refresh_handle: Mutex::new(None),
            cycles: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_generation: AtomicU64::new(0),
        }
    }

    /// Returns the store this loader publishes to.
    #[must_use]
    pub fn store(&self) -> &Arc<TrustStore> {
        &self.store
    }

    /// Runs one load cycle and publishes the result.
    ///
    /// Certificates that fail to load are logged and skipped. The previous
    /// snapshot stays published when the cycle fails.
    ///
    /// # Errors
    ///
    /// - [`StoreError::SourceUnavailable`] if the source cannot be read, or if it yields no usable
    ///   certificate while the current snapshot trusts some (an empty reload is treated as an
    ///   outage rather than a mass retirement)
    /// - [`StoreError::NoIssuanceCertificate`] if `require_issuer` is set and no loaded certificate
    ///   has a private key
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> StoreResult<LoadReport> {
        let result = self.load_cycle().await;
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = &result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                error = %err,
                generation = self.store.generation(),
                "trust store reload failed; keeping previous snapshot"
            );
        }
        result
    }

    async fn load_cycle(&self) -> StoreResult<LoadReport> {
        fail_point!("loader-before-load", |_| {
            Err(StoreError::source_unavailable("injected failure before load"))
        });

        let entries = self.source.load_all().await?;

        let mut records = Vec::with_capacity(entries.len());
        let mut skipped = 0usize;
        for entry in entries {
            match entry {
                Ok(record) => records.push(record),
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(origin = %err.origin, error = %err.message, "skipping certificate");
                },
            }
        }

        if records.is_empty() && !self.store.snapshot().is_empty() {
            return Err(StoreError::source_unavailable(format!(
                "source yielded no usable certificates ({skipped} failed)"
            )));
        }

        let snapshot = TrustSnapshot::from_records(records, Utc::now());
        if self.config.require_issuer && snapshot.current_issuer().is_none() {
            return Err(StoreError::NoIssuanceCertificate);
        }

        let trusted = snapshot.len();
        let has_issuer = snapshot.current_issuer().is_some();
        let generation = self.store.rotate(snapshot);
        self.last_generation.store(generation, Ordering::Relaxed);

        tracing::info!(generation, trusted, skipped, has_issuer, "trust store reloaded");

        Ok(LoadReport { generation, trusted, skipped, has_issuer })
    }

    /// Starts the background refresh task if `refresh_interval` is configured.
    ///
    /// The task runs [`load`](Self::load) once per interval until
    /// [`shutdown`](Self::shutdown) is called or the last `Arc` to the
    /// loader is dropped. Returns `false` when no interval is configured or
    /// a refresh task is already running.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    pub fn spawn_refresh(self: &Arc<Self>) -> bool {
        let Some(interval) = self.config.refresh_interval else {
            return false;
        };

        let mut slot = self.refresh_handle.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("trust store refresh task already running");
            return false;
        }

        // The task must not keep the loader alive, or Drop never cancels it.
        let loader = Arc::downgrade(self);
        let token = self.cancel_token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; consume it so we start
            // with a full interval wait.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("trust store refresh task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if !refresh_once(&loader).await {
                            tracing::info!("trust store loader dropped; refresh task exiting");
                            break;
                        }
                    }
                }
            }
        });

        *slot = Some(handle);
        true
    }

    /// Stops the background refresh task and waits for it to exit.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        let handle = self.refresh_handle.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::warn!(error = %err, "trust store refresh task panicked");
        }
    }

    /// Returns the cancellation token for the background refresh task.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Number of load cycles attempted.
    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Number of load cycles that failed.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Generation published by the last successful cycle, or 0 if none has succeeded.
    #[must_use]
    pub fn last_generation(&self) -> u64 {
        self.last_generation.load(Ordering::Relaxed)
    }
}

/// Runs one refresh cycle. Returns `false` once the loader is gone.
async fn refresh_once(loader: &Weak<TrustStoreLoader>) -> bool {
    let Some(loader) = loader.upgrade() else {
        return false;
    };
    let start = Instant::now();
    let outcome = loader.load().await;
    tracing::debug!(
        ok = outcome.is_ok(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "trust store refresh cycle complete"
    );
    true
}

impl Drop for TrustStoreLoader {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
