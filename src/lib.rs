//! Promise and event bridge over an asynchronous native media upload engine
//!
//! A caller hands [`UploadBridge::upload_media`] a file path plus tag and
//! metadata payloads as JSON text. The bridge decodes them, starts the upload
//! on an [`UploadEngine`], republishes the engine's notifications on the
//! `onProgress`, `onComplete` and `onError` channels of its [`EventBus`], and
//! settles the returned future exactly once.

pub mod bridge;
pub mod callback;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod payload;
pub mod types;
pub mod upload;

pub use bridge::UploadBridge;

pub use callback::UploadHandle;

pub use config::{BridgeConfig, LogLevel};

pub use dispatch::{clamp_percentage, format_progress};

pub use error::{BridgeError, Rejection, Result};

pub use events::{
    Channel, CompletionPayload, ErrorEvent, EventBus, ListenerHandle, ProgressEvent, UploadStatus,
    CHANNEL_COMPLETION, CHANNEL_ERROR, CHANNEL_PROGRESS,
};

pub use payload::{decode_payload, PayloadKind};

pub use types::{FileLocator, RequestId};

pub use upload::{
    EngineFailure, Notification, NotificationSink, UploadEngine, UploadExecutor, UploadRequest,
    UploadRequestBuilder, UploadedFile,
};
