//! The upload bridge
//!
//! [`UploadBridge`] is the single inbound operation. It decodes the caller's
//! payloads, builds the request, hands it to the executor and returns a future
//! that settles exactly once. Progress, completion and error events are
//! published on the bridge's [`EventBus`].

use crate::callback::UploadHandle;
use crate::config::BridgeConfig;
use crate::dispatch::Dispatcher;
use crate::error::{BridgeError, Result};
use crate::events::{EventBus, UploadStatus};
use crate::upload::{SubscriptionRegistry, UploadEngine, UploadExecutor, UploadRequestBuilder};
use std::sync::Arc;

/// Bridges a native upload engine to promise-and-event style callers
pub struct UploadBridge {
    executor: UploadExecutor,
    bus: EventBus,
    config: BridgeConfig,
}

impl UploadBridge {
    /// Create a bridge over `engine`
    ///
    /// Applies the configured log level to the `log` facade.
    ///
    /// Must be called from within a tokio runtime: the delivery context is
    /// spawned onto it. The delivery context outlives the bridge until every
    /// engine has dropped its notification sinks, so outstanding handles
    /// still settle.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use media_upload_bridge::{BridgeConfig, UploadBridge, UploadEngine};
    /// use std::sync::Arc;
    ///
    /// # async fn run(engine: Arc<dyn UploadEngine>) -> media_upload_bridge::Result<()> {
    /// let bridge = UploadBridge::new(engine, BridgeConfig::default())?;
    /// let progress = bridge.events().subscribe_progress(|event| {
    ///     println!("{}: {}", event.id, event.progress);
    /// });
    ///
    /// let status = bridge
    ///     .upload_media("/tmp/clip.mp4", r#"{"camera":"front"}"#, r#"{"title":"Demo"}"#)
    ///     .await?;
    /// println!("uploaded to {}", status.status.uploaded_file_url);
    /// progress.remove();
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(engine: Arc<dyn UploadEngine>, config: BridgeConfig) -> Result<Self> {
        config.validate()?;

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(BridgeError::config_error(
                "UploadBridge must be created inside a tokio runtime",
            ));
        }
        config.apply_log_level();

        let registry = SubscriptionRegistry::new();
        let bus = EventBus::new();
        let dispatcher = Dispatcher::new(
            registry.clone(),
            bus.clone(),
            config.effective_progress_precision(),
        );
        let queue = dispatcher.spawn();

        Ok(Self {
            executor: UploadExecutor::new(engine, registry, queue),
            bus,
            config,
        })
    }

    /// The listener bus on which upload events are published
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Number of uploads still waiting for their terminal notification
    pub fn active_uploads(&self) -> usize {
        self.executor.active_uploads()
    }

    /// Upload the file at `path` and wait for the outcome
    ///
    /// # Arguments
    ///
    /// * `path` - Absolute path or `file://` URL of the media file
    /// * `tags` - JSON object text of string tags
    /// * `metadata` - JSON object text of string metadata
    ///
    /// # Returns
    ///
    /// The completion payload wrapped as `{"status": ...}`. On failure the
    /// error's [`BridgeError::rejection`] gives the `(code, message, cause)`
    /// shape.
    pub async fn upload_media(&self, path: &str, tags: &str, metadata: &str) -> Result<UploadStatus> {
        self.submit(path, tags, metadata)?.await
    }

    /// Start an upload without waiting for it
    ///
    /// Decoding, locator and start failures are returned immediately; the
    /// handle settles with the terminal outcome.
    pub fn submit(&self, path: &str, tags: &str, metadata: &str) -> Result<UploadHandle> {
        let request = UploadRequestBuilder::from_payloads(path, tags, metadata)
            .inspect_err(|e| log::info!("Rejected upload of '{}': {}", path, e))?
            .build();
        self.executor.execute(request)
    }
}

impl std::fmt::Debug for UploadBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadBridge")
            .field("executor", &self.executor)
            .field("bus", &self.bus)
            .field("config", &self.config)
            .finish()
    }
}
