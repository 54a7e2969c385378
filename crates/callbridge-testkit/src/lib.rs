//! callbridge-testkit: in-process transport and helpers for exercising the
//! adapter layer.
//!
//! [`MockTransport`] is the semantic reference implementation of
//! [`CallTransport`]: calls open instantly and the test drives the transport
//! half of each call by hand. Panicking accessors are deliberate; this crate
//! is test-only.

#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use callbridge_core::{
    CallError, CallHandle, CallStatus, CallTransport, Metadata, MethodDescriptor, RequestStream,
    TransportCall,
};

/// Everything the transport saw when a call was opened.
pub struct OpenedCall<V> {
    /// The method the adapter asked for.
    pub method: MethodDescriptor,
    /// The initial request value; absent for request-streaming opens.
    pub request: Option<V>,
    /// Metadata attached at invocation time.
    pub metadata: Metadata,
    /// The transport half of the call, for the test to drive.
    pub call: TransportCall<V>,
}

/// In-process [`CallTransport`] whose opened calls are handed to the test.
pub struct MockTransport<V> {
    opened: Mutex<VecDeque<OpenedCall<V>>>,
    reject_next: Mutex<Option<CallError>>,
}

impl<V: Send + 'static> MockTransport<V> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            opened: Mutex::new(VecDeque::new()),
            reject_next: Mutex::new(None),
        })
    }

    /// Make the next `open` fail with `error` instead of producing a call.
    pub fn reject_next_open(&self, error: CallError) {
        *self.reject_next.lock() = Some(error);
    }

    /// Take the oldest opened call. Panics if nothing was opened.
    pub fn take_call(&self) -> OpenedCall<V> {
        self.opened
            .lock()
            .pop_front()
            .expect("no call has been opened")
    }

    /// Number of opened calls not yet taken.
    pub fn opened_count(&self) -> usize {
        self.opened.lock().len()
    }
}

impl<V: Send + 'static> CallTransport for MockTransport<V> {
    type Value = V;

    fn open(
        &self,
        method: &MethodDescriptor,
        request: Option<V>,
        metadata: &Metadata,
    ) -> Result<CallHandle<V>, CallError> {
        if let Some(error) = self.reject_next.lock().take() {
            return Err(error);
        }
        let (handle, call) = CallHandle::pair();
        tracing::debug!(method = %method.full_name(), "mock transport opened call");
        self.opened.lock().push_back(OpenedCall {
            method: method.clone(),
            request,
            metadata: metadata.clone(),
            call,
        });
        Ok(handle)
    }
}

/// A request stream fed through a channel, so the test can push values while
/// the call is in flight.
pub fn request_channel<V: Send + 'static>(
) -> (mpsc::Sender<Result<V, CallStatus>>, RequestStream<V>) {
    let (tx, rx) = mpsc::channel(16);
    (tx, ReceiverStream::new(rx).boxed())
}

/// A request stream over a fixed set of values, all `Ok`.
pub fn request_values<V: Send + 'static>(values: Vec<V>) -> RequestStream<V> {
    stream::iter(values.into_iter().map(Ok).collect::<Vec<_>>()).boxed()
}

/// Install a test-friendly tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
