//! Settlement of pending upload calls
//!
//! Every upload call owns a [`CallContext`] shared between the delivery
//! context, which settles it, and the [`UploadHandle`] future the caller
//! awaits. A context is settled at most once; later attempts are ignored.

use crate::error::{BridgeError, Result};
use crate::events::UploadStatus;
use crate::types::RequestId;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Settlement state of one upload call
pub struct CallContext {
    /// Request this call is waiting on
    id: RequestId,
    /// The outcome, once settled
    outcome: Mutex<Option<Result<UploadStatus>>>,
    /// The waker to notify on settlement
    waker: Mutex<Option<Waker>>,
    /// Whether resolve or reject has been invoked
    settled: AtomicBool,
}

impl CallContext {
    pub fn new(id: RequestId) -> Self {
        Self {
            id,
            outcome: Mutex::new(None),
            waker: Mutex::new(None),
            settled: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Whether the call has already been resolved or rejected
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    /// Resolve the call. Returns `false` if it was already settled.
    pub fn resolve(&self, status: UploadStatus) -> bool {
        self.settle(Ok(status))
    }

    /// Reject the call. Returns `false` if it was already settled.
    pub fn reject(&self, error: BridgeError) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: Result<UploadStatus>) -> bool {
        if self.settled.swap(true, Ordering::SeqCst) {
            log::warn!("Ignoring repeated settlement for upload {}", self.id);
            return false;
        }

        *lock(&self.outcome) = Some(outcome);

        if let Some(waker) = lock(&self.waker).take() {
            waker.wake();
        }
        true
    }

    fn set_waker(&self, waker: &Waker) {
        let mut slot = lock(&self.waker);
        match slot.as_ref() {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    fn outcome(&self) -> Option<Result<UploadStatus>> {
        lock(&self.outcome).clone()
    }
}

/// A future that completes when the upload call is settled
///
/// Dropping the handle does not cancel the upload; it only stops waiting for it.
pub struct UploadHandle {
    context: Arc<CallContext>,
}

impl UploadHandle {
    pub(crate) fn new(context: Arc<CallContext>) -> Self {
        Self { context }
    }

    /// The id of the request this handle waits on
    pub fn id(&self) -> RequestId {
        self.context.id()
    }

    /// Whether the call has settled
    pub fn is_settled(&self) -> bool {
        self.context.is_settled()
    }
}

impl Future for UploadHandle {
    type Output = Result<UploadStatus>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.context.set_waker(cx.waker());

        match self.context.outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for UploadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadHandle")
            .field("id", &self.context.id())
            .field("settled", &self.context.is_settled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CompletionPayload;
    use std::collections::HashMap;
    use std::task::Wake;

    struct TestWaker {
        woken: AtomicBool,
    }

    impl Wake for TestWaker {
        fn wake(self: Arc<Self>) {
            self.woken.store(true, Ordering::SeqCst);
        }
    }

    fn status(id: RequestId) -> UploadStatus {
        UploadStatus {
            status: CompletionPayload {
                id,
                uploaded_file_url: "https://cdn.example.com/clip.mp4".to_string(),
                meta_data: HashMap::new(),
                tags: HashMap::new(),
                transcription_url: None,
                transcription_length: None,
            },
        }
    }

    #[test]
    fn test_context_starts_unsettled() {
        let context = CallContext::new(RequestId::new());
        assert!(!context.is_settled());
        assert!(context.outcome().is_none());
    }

    #[test]
    fn test_first_settlement_wins() {
        let id = RequestId::new();
        let context = CallContext::new(id);

        assert!(context.resolve(status(id)));
        assert!(!context.reject(BridgeError::transport_failure("late")));
        assert!(!context.resolve(status(id)));

        let outcome = context.outcome().unwrap();
        assert_eq!(outcome.unwrap().status.id, id);
    }

    #[test]
    fn test_settlement_wakes_pending_poll() {
        let id = RequestId::new();
        let context = Arc::new(CallContext::new(id));
        let mut handle = UploadHandle::new(context.clone());

        let test_waker = Arc::new(TestWaker {
            woken: AtomicBool::new(false),
        });
        let waker = Waker::from(test_waker.clone());
        let mut cx = Context::from_waker(&waker);

        assert!(Pin::new(&mut handle).poll(&mut cx).is_pending());
        assert!(!test_waker.woken.load(Ordering::SeqCst));

        context.reject(BridgeError::transport_failure("network down"));
        assert!(test_waker.woken.load(Ordering::SeqCst));

        match Pin::new(&mut handle).poll(&mut cx) {
            Poll::Ready(Err(BridgeError::TransportFailure { message, .. })) => {
                assert_eq!(message, "network down")
            }
            other => panic!("Expected rejected outcome, got: {:?}", other.is_ready()),
        }
    }

    #[tokio::test]
    async fn test_handle_resolves() {
        let id = RequestId::new();
        let context = Arc::new(CallContext::new(id));
        let handle = UploadHandle::new(context.clone());

        context.resolve(status(id));

        let result = handle.await.unwrap();
        assert_eq!(result.status.id, id);
    }
}
