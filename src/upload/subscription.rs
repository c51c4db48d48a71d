//! Per-request notification subscriptions
//!
//! A subscription is acquired before the engine is asked to start and is
//! released by the terminal notification, never by the caller returning.
//! Notifications that arrive while the engine is still starting are buffered
//! and only forwarded once the start has succeeded.

use crate::callback::CallContext;
use crate::types::RequestId;
use crate::upload::engine::Notification;
use crate::upload::request::UploadRequest;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

enum SubscriptionState {
    /// The engine has not yet confirmed the start
    Starting(Vec<Notification>),
    Active,
}

/// Everything held alive for one in-flight upload
pub(crate) struct Subscription {
    request: Arc<UploadRequest>,
    context: Arc<CallContext>,
    state: SubscriptionState,
}

impl Subscription {
    pub(crate) fn new(request: Arc<UploadRequest>, context: Arc<CallContext>) -> Self {
        Self {
            request,
            context,
            state: SubscriptionState::Starting(Vec::new()),
        }
    }

    pub(crate) fn request(&self) -> &UploadRequest {
        &self.request
    }

    pub(crate) fn context(&self) -> &Arc<CallContext> {
        &self.context
    }
}

/// The set of live subscriptions, keyed by request id
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<HashMap<RequestId, Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, Subscription>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of uploads whose subscriptions are still held
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.lock().contains_key(&id)
    }

    pub(crate) fn acquire(&self, subscription: Subscription) {
        let id = subscription.request.id();
        if self.lock().insert(id, subscription).is_some() {
            log::warn!("Replaced an existing subscription for upload {}", id);
        }
    }

    pub(crate) fn release(&self, id: RequestId) -> Option<Subscription> {
        self.lock().remove(&id)
    }

    /// Mark the start as confirmed and hand back anything buffered meanwhile
    pub(crate) fn activate(&self, id: RequestId) -> Option<Vec<Notification>> {
        let mut subscriptions = self.lock();
        let subscription = subscriptions.get_mut(&id)?;
        match std::mem::replace(&mut subscription.state, SubscriptionState::Active) {
            SubscriptionState::Starting(buffered) => Some(buffered),
            SubscriptionState::Active => Some(Vec::new()),
        }
    }

    /// Decide what to do with an incoming notification
    ///
    /// Returns the notification if it should be forwarded now. Notifications
    /// for starting uploads are buffered; those for unknown or already
    /// settled uploads are dropped.
    pub(crate) fn admit(&self, notification: Notification) -> Option<Notification> {
        let mut subscriptions = self.lock();
        let id = notification.id();
        match subscriptions.get_mut(&id) {
            Some(Subscription {
                state: SubscriptionState::Starting(buffer),
                ..
            }) => {
                buffer.push(notification);
                None
            }
            Some(_) => Some(notification),
            None => {
                log::warn!(
                    "Dropping {} notification for settled or unknown upload {}",
                    if notification.is_terminal() { "terminal" } else { "progress" },
                    id
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("active", &self.len())
            .finish()
    }
}
