//! Outbound events and the host listener bus
//!
//! Events are published on three fixed channels. Hosts subscribe per channel,
//! either with typed listeners or with listeners that receive the JSON body
//! exactly as it would cross a script bridge.

use crate::error::BridgeError;
use crate::types::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Channel name for progress events
pub const CHANNEL_PROGRESS: &str = "onProgress";
/// Channel name for completion events
pub const CHANNEL_COMPLETION: &str = "onComplete";
/// Channel name for error events
pub const CHANNEL_ERROR: &str = "onError";

/// A named outbound event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Progress,
    Completion,
    Error,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Progress, Channel::Completion, Channel::Error];

    /// The wire name of the channel
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Progress => CHANNEL_PROGRESS,
            Channel::Completion => CHANNEL_COMPLETION,
            Channel::Error => CHANNEL_ERROR,
        }
    }

    /// Look up a channel by its wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Channel::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress of one upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub id: RequestId,
    /// Formatted percentage, e.g. `"42.50%"`
    pub progress: String,
    /// Fraction complete in `[0.0, 1.0]`
    #[serde(skip)]
    pub percentage: f64,
}

/// Body of a completion event and of a resolved call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    pub id: RequestId,
    #[serde(rename = "uploadedFileURL")]
    pub uploaded_file_url: String,
    #[serde(rename = "metaData")]
    pub meta_data: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    #[serde(rename = "transcriptionURL")]
    pub transcription_url: Option<String>,
    #[serde(rename = "transcriptionLength")]
    pub transcription_length: Option<f64>,
}

/// Value a successful call resolves with, serialized as `{"status": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub status: CompletionPayload,
}

/// Body of an error event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub id: RequestId,
    pub code: String,
    pub message: String,
    pub cause: Option<String>,
}

impl ErrorEvent {
    pub fn from_error(id: RequestId, error: &BridgeError) -> Self {
        let rejection = error.rejection();
        Self {
            id,
            code: rejection.code,
            message: rejection.message,
            cause: rejection.cause,
        }
    }
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registration<E: ?Sized> {
    id: u64,
    active: Arc<AtomicBool>,
    listener: Listener<E>,
}

impl<E: ?Sized> Clone for Registration<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: self.active.clone(),
            listener: self.listener.clone(),
        }
    }
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    progress: Mutex<Vec<Registration<ProgressEvent>>>,
    completion: Mutex<Vec<Registration<CompletionPayload>>>,
    error: Mutex<Vec<Registration<ErrorEvent>>>,
    raw: Mutex<Vec<(Channel, Registration<Value>)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The host listener bus
///
/// Cloning the bus yields another handle to the same listener set.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for progress events
    pub fn subscribe_progress<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        let registration = self.registration::<ProgressEvent>(Arc::new(listener));
        let handle = self.handle(Channel::Progress, &registration, false);
        lock(&self.inner.progress).push(registration);
        handle
    }

    /// Listen for completion events
    pub fn subscribe_completion<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&CompletionPayload) + Send + Sync + 'static,
    {
        let registration = self.registration::<CompletionPayload>(Arc::new(listener));
        let handle = self.handle(Channel::Completion, &registration, false);
        lock(&self.inner.completion).push(registration);
        handle
    }

    /// Listen for error events
    pub fn subscribe_error<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        let registration = self.registration::<ErrorEvent>(Arc::new(listener));
        let handle = self.handle(Channel::Error, &registration, false);
        lock(&self.inner.error).push(registration);
        handle
    }

    /// Listen for the JSON body of every event on `channel`
    pub fn subscribe<F>(&self, channel: Channel, listener: F) -> ListenerHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let registration = self.registration::<Value>(Arc::new(listener));
        let handle = self.handle(channel, &registration, true);
        lock(&self.inner.raw).push((channel, registration));
        handle
    }

    /// Number of listeners currently registered on `channel`
    pub fn listener_count(&self, channel: Channel) -> usize {
        let typed = match channel {
            Channel::Progress => lock(&self.inner.progress).len(),
            Channel::Completion => lock(&self.inner.completion).len(),
            Channel::Error => lock(&self.inner.error).len(),
        };
        let raw = lock(&self.inner.raw)
            .iter()
            .filter(|(c, _)| *c == channel)
            .count();
        typed + raw
    }

    pub(crate) fn emit_progress(&self, event: &ProgressEvent) {
        let listeners = lock(&self.inner.progress).clone();
        deliver(Channel::Progress, &listeners, event);
        self.emit_raw(Channel::Progress, event);
    }

    pub(crate) fn emit_completion(&self, event: &CompletionPayload) {
        let listeners = lock(&self.inner.completion).clone();
        deliver(Channel::Completion, &listeners, event);
        self.emit_raw(Channel::Completion, event);
    }

    pub(crate) fn emit_error(&self, event: &ErrorEvent) {
        let listeners = lock(&self.inner.error).clone();
        deliver(Channel::Error, &listeners, event);
        self.emit_raw(Channel::Error, event);
    }

    fn emit_raw<E: Serialize>(&self, channel: Channel, event: &E) {
        let listeners: Vec<Registration<Value>> = lock(&self.inner.raw)
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, r)| r.clone())
            .collect();
        if listeners.is_empty() {
            return;
        }

        match serde_json::to_value(event) {
            Ok(body) => deliver(channel, &listeners, &body),
            Err(e) => log::warn!("Failed to serialize {} event body: {}", channel, e),
        }
    }

    fn registration<E: ?Sized>(&self, listener: Listener<E>) -> Registration<E> {
        Registration {
            id: self.inner.next_id.fetch_add(1, Ordering::SeqCst),
            active: Arc::new(AtomicBool::new(true)),
            listener,
        }
    }

    fn handle<E: ?Sized>(
        &self,
        channel: Channel,
        registration: &Registration<E>,
        raw: bool,
    ) -> ListenerHandle {
        ListenerHandle {
            bus: Arc::downgrade(&self.inner),
            channel,
            id: registration.id,
            raw,
            active: registration.active.clone(),
        }
    }
}

fn deliver<E: ?Sized>(channel: Channel, listeners: &[Registration<E>], event: &E) {
    for registration in listeners {
        if !registration.active.load(Ordering::SeqCst) {
            continue;
        }
        let listener = registration.listener.clone();
        if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
            log::warn!(
                "Listener {} on {} panicked; continuing delivery",
                registration.id,
                channel
            );
        }
    }
}

/// A registered listener. Call [`ListenerHandle::remove`] to stop delivery.
///
/// Dropping the handle leaves the listener registered.
#[derive(Debug)]
pub struct ListenerHandle {
    bus: Weak<BusInner>,
    channel: Channel,
    id: u64,
    raw: bool,
    active: Arc<AtomicBool>,
}

impl ListenerHandle {
    /// The channel this listener is registered on
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Whether the listener will still receive events
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Unregister the listener
    ///
    /// No event dispatched after this returns reaches the listener, including
    /// later listeners of a dispatch that is already running. A call that has
    /// already entered the listener on the delivery context still finishes.
    pub fn remove(self) {
        self.active.store(false, Ordering::SeqCst);

        let Some(inner) = self.bus.upgrade() else {
            return;
        };

        let id = self.id;
        if self.raw {
            lock(&inner.raw).retain(|(_, r)| r.id != id);
            return;
        }
        match self.channel {
            Channel::Progress => lock(&inner.progress).retain(|r| r.id != id),
            Channel::Completion => lock(&inner.completion).retain(|r| r.id != id),
            Channel::Error => lock(&inner.error).retain(|r| r.id != id),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("progress", &self.listener_count(Channel::Progress))
            .field("completion", &self.listener_count(Channel::Completion))
            .field("error", &self.listener_count(Channel::Error))
            .finish()
    }
}
