//! The single delivery context
//!
//! Engine notifications arrive from arbitrary worker threads. They are queued
//! here and handled one at a time by a single task, which emits events on the
//! bus and settles pending calls. Because a subscription is released while
//! handling its terminal notification, no progress for a request can be
//! forwarded after that request's terminal event.

use crate::error::BridgeError;
use crate::events::{CompletionPayload, ErrorEvent, EventBus, ProgressEvent, UploadStatus};
use crate::types::RequestId;
use crate::upload::engine::{EngineFailure, Notification, UploadedFile};
use crate::upload::subscription::{Subscription, SubscriptionRegistry};
use chrono::Utc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Work items for the delivery context
#[derive(Debug)]
pub(crate) enum Delivery {
    /// A notification from the engine
    Notify(Notification),
    /// The engine accepted the request; flush anything buffered during start
    Activate(RequestId),
}

/// Clamp a reported fraction into `[0.0, 1.0]`. NaN becomes 0.0.
pub fn clamp_percentage(percentage: f64) -> f64 {
    if percentage.is_nan() {
        0.0
    } else {
        percentage.clamp(0.0, 1.0)
    }
}

/// Render a fraction as a percentage string with `precision` decimals
pub fn format_progress(percentage: f64, precision: usize) -> String {
    format!("{:.*}%", precision, percentage * 100.0)
}

pub(crate) struct Dispatcher {
    registry: SubscriptionRegistry,
    bus: EventBus,
    precision: usize,
}

impl Dispatcher {
    pub(crate) fn new(registry: SubscriptionRegistry, bus: EventBus, precision: usize) -> Self {
        Self {
            registry,
            bus,
            precision,
        }
    }

    /// Spawn the delivery task on the current tokio runtime
    pub(crate) fn spawn(self) -> UnboundedSender<Delivery> {
        let (tx, rx) = unbounded_channel();
        tokio::spawn(self.run(rx));
        tx
    }

    async fn run(self, mut rx: UnboundedReceiver<Delivery>) {
        while let Some(delivery) = rx.recv().await {
            self.handle(delivery);
        }
        log::debug!("Delivery context stopped");
    }

    pub(crate) fn handle(&self, delivery: Delivery) {
        match delivery {
            Delivery::Notify(notification) => {
                if let Some(notification) = self.registry.admit(notification) {
                    self.forward(notification);
                }
            }
            Delivery::Activate(id) => {
                if let Some(buffered) = self.registry.activate(id) {
                    for notification in buffered {
                        self.forward(notification);
                    }
                }
            }
        }
    }

    fn forward(&self, notification: Notification) {
        match notification {
            Notification::Progress { id, percentage } => self.forward_progress(id, percentage),
            Notification::Completed { id, file } => {
                if let Some(subscription) = self.settle(id) {
                    self.forward_completion(subscription, file);
                }
            }
            Notification::Failed { id, failure } => {
                if let Some(subscription) = self.settle(id) {
                    self.forward_failure(subscription, failure);
                }
            }
        }
    }

    fn settle(&self, id: RequestId) -> Option<Subscription> {
        let subscription = self.registry.release(id);
        if subscription.is_none() {
            log::warn!("Ignoring repeated terminal notification for upload {}", id);
        }
        subscription
    }

    fn forward_progress(&self, id: RequestId, reported: f64) {
        // Progress buffered behind a terminal notification arrives here after release
        if !self.registry.contains(id) {
            log::debug!("Dropping progress for settled upload {}", id);
            return;
        }

        let percentage = clamp_percentage(reported);
        if percentage != reported {
            log::debug!(
                "Clamped progress {} to {} for upload {}",
                reported,
                percentage,
                id
            );
        }

        let event = ProgressEvent {
            id,
            progress: format_progress(percentage, self.precision),
            percentage,
        };
        log::debug!("Upload {} progress {}", id, event.progress);
        self.bus.emit_progress(&event);
    }

    fn forward_completion(&self, subscription: Subscription, file: UploadedFile) {
        let request = subscription.request();
        let payload = CompletionPayload {
            id: request.id(),
            uploaded_file_url: file.uploaded_file_url,
            meta_data: file.metadata,
            tags: file.tags,
            transcription_url: file.transcription_url,
            transcription_length: file.transcription_length,
        };

        log::info!(
            "Upload {} completed in {} ms: {}",
            request.id(),
            (Utc::now() - request.created_at()).num_milliseconds(),
            payload.uploaded_file_url
        );

        self.bus.emit_completion(&payload);
        subscription
            .context()
            .resolve(UploadStatus { status: payload });
    }

    fn forward_failure(&self, subscription: Subscription, failure: EngineFailure) {
        let id = subscription.request().id();
        let mut error = BridgeError::transport_failure(failure.message);
        if let Some(cause) = failure.cause {
            error = error.with_cause(cause);
        }

        log::info!("Upload {} failed: {}", id, error);

        self.bus.emit_error(&ErrorEvent::from_error(id, &error));
        subscription.context().reject(error);
    }
}
