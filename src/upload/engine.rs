//! The native upload engine seam
//!
//! An [`UploadEngine`] performs the actual transfer on its own worker
//! context and reports back through a [`NotificationSink`]. The bridge never
//! touches the network itself.

use crate::dispatch::Delivery;
use crate::types::RequestId;
use crate::upload::request::UploadRequest;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

/// A failure reported by the engine, either at start or as the terminal notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub message: String,
    pub cause: Option<String>,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})", self.message, cause),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for EngineFailure {}

/// The artifact produced by a successful upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Absolute URL of the uploaded artifact
    pub uploaded_file_url: String,
    pub tags: HashMap<String, String>,
    pub metadata: HashMap<String, String>,
    pub transcription_url: Option<String>,
    pub transcription_length: Option<f64>,
}

impl UploadedFile {
    pub fn new(uploaded_file_url: impl Into<String>) -> Self {
        Self {
            uploaded_file_url: uploaded_file_url.into(),
            tags: HashMap::new(),
            metadata: HashMap::new(),
            transcription_url: None,
            transcription_length: None,
        }
    }

    pub fn tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn transcription(mut self, url: impl Into<String>, length: f64) -> Self {
        self.transcription_url = Some(url.into());
        self.transcription_length = Some(length);
        self
    }
}

/// A notification emitted by the engine for one request
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Progress { id: RequestId, percentage: f64 },
    Completed { id: RequestId, file: UploadedFile },
    Failed { id: RequestId, failure: EngineFailure },
}

impl Notification {
    pub fn id(&self) -> RequestId {
        match self {
            Notification::Progress { id, .. }
            | Notification::Completed { id, .. }
            | Notification::Failed { id, .. } => *id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Progress { .. })
    }
}

/// Where an engine reports progress and terminal outcomes
///
/// Cheap to clone and safe to use from any thread. Notifications for a
/// request that has already settled are dropped by the bridge.
#[derive(Clone)]
pub struct NotificationSink {
    id: RequestId,
    queue: UnboundedSender<Delivery>,
}

impl NotificationSink {
    pub(crate) fn new(id: RequestId, queue: UnboundedSender<Delivery>) -> Self {
        Self { id, queue }
    }

    /// The request this sink reports for
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Report the fraction of the upload completed, in `[0.0, 1.0]`
    pub fn progress(&self, percentage: f64) {
        self.send(Notification::Progress {
            id: self.id,
            percentage,
        });
    }

    /// Report successful completion
    pub fn complete(&self, file: UploadedFile) {
        self.send(Notification::Completed { id: self.id, file });
    }

    /// Report terminal failure
    pub fn fail(&self, failure: EngineFailure) {
        self.send(Notification::Failed {
            id: self.id,
            failure,
        });
    }

    fn send(&self, notification: Notification) {
        if self.queue.send(Delivery::Notify(notification)).is_err() {
            log::warn!(
                "Delivery context has shut down; dropping notification for upload {}",
                self.id
            );
        }
    }
}

impl fmt::Debug for NotificationSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationSink")
            .field("id", &self.id)
            .field("closed", &self.queue.is_closed())
            .finish()
    }
}

/// A native media upload engine
///
/// `start_upload` must return promptly: the transfer runs on the engine's
/// own context and reports through `sink`, which the engine may clone and
/// keep for as long as it needs. Exactly one of `sink.complete` or
/// `sink.fail` is expected per started upload.
pub trait UploadEngine: Send + Sync {
    /// Begin transferring `request`
    ///
    /// # Errors
    ///
    /// Returns an [`EngineFailure`] if the transfer cannot be started at all,
    /// for example because the file is unavailable. No notification sent
    /// before such an error is ever forwarded.
    fn start_upload(
        &self,
        request: &UploadRequest,
        sink: NotificationSink,
    ) -> std::result::Result<(), EngineFailure>;
}
