//! Submission of built requests to the engine

use crate::callback::{CallContext, UploadHandle};
use crate::dispatch::Delivery;
use crate::error::{BridgeError, Result};
use crate::upload::engine::{NotificationSink, UploadEngine};
use crate::upload::request::UploadRequest;
use crate::upload::subscription::{Subscription, SubscriptionRegistry};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Starts uploads on an engine and keeps their subscriptions alive
#[derive(Clone)]
pub struct UploadExecutor {
    engine: Arc<dyn UploadEngine>,
    registry: SubscriptionRegistry,
    queue: UnboundedSender<Delivery>,
}

impl UploadExecutor {
    pub(crate) fn new(
        engine: Arc<dyn UploadEngine>,
        registry: SubscriptionRegistry,
        queue: UnboundedSender<Delivery>,
    ) -> Self {
        Self {
            engine,
            registry,
            queue,
        }
    }

    /// Start transferring `request`
    ///
    /// The subscription for the request is in place before the engine is
    /// called. The returned handle settles exactly once, when the engine
    /// reports its terminal notification.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TransportStart`] if the engine refuses to
    /// start. Nothing is ever dispatched for such a request.
    pub fn execute(&self, request: UploadRequest) -> Result<UploadHandle> {
        let id = request.id();
        let request = Arc::new(request);
        let context = Arc::new(CallContext::new(id));

        self.registry
            .acquire(Subscription::new(request.clone(), context.clone()));

        let sink = NotificationSink::new(id, self.queue.clone());
        log::debug!("Starting upload {} of {}", id, request.locator());

        if let Err(failure) = self.engine.start_upload(&request, sink) {
            self.registry.release(id);

            let mut error = BridgeError::transport_start(failure.message);
            if let Some(cause) = failure.cause {
                error = error.with_cause(cause);
            }
            context.reject(error.clone());

            log::info!("Upload {} failed to start: {}", id, error);
            return Err(error);
        }

        if self.queue.send(Delivery::Activate(id)).is_err() {
            self.registry.release(id);
            let error = BridgeError::transport_start("delivery context has shut down");
            context.reject(error.clone());
            return Err(error);
        }

        Ok(UploadHandle::new(context))
    }

    /// Number of uploads whose subscriptions are still held
    pub fn active_uploads(&self) -> usize {
        self.registry.len()
    }
}

impl std::fmt::Debug for UploadExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadExecutor")
            .field("active_uploads", &self.registry.len())
            .finish()
    }
}
