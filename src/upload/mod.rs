//! Upload requests and their execution
//!
//! This module builds upload requests, submits them to a native engine and
//! keeps each upload's notification subscriptions alive until it settles.

pub mod engine;
pub mod executor;
pub mod request;
pub mod subscription;

pub use engine::{EngineFailure, Notification, NotificationSink, UploadEngine, UploadedFile};
pub use executor::UploadExecutor;
pub use request::{UploadRequest, UploadRequestBuilder};
pub use subscription::SubscriptionRegistry;
