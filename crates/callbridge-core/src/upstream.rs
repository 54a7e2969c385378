//! The adapter's subscription to a consumer-supplied request stream.

use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::Stream;

use crate::{CallHandle, CallStatus};

/// A consumer-supplied stream of request values.
///
/// `Err` items abort the call: they are forwarded to the transport as a
/// failure and become the response stream's terminal error.
pub type RequestStream<V> = BoxStream<'static, Result<V, CallStatus>>;

/// Owns the request stream for one invocation and forwards its items into
/// the call.
///
/// Released exactly once, on whichever comes first: request-stream
/// completion, call termination, or consumer cancellation.
pub struct UpstreamSubscription<V> {
    stream: Option<RequestStream<V>>,
}

impl<V: Send + 'static> UpstreamSubscription<V> {
    pub fn new(stream: RequestStream<V>) -> Self {
        Self { stream: Some(stream) }
    }

    /// A subscription that was never attached; `pump` and `release` are
    /// no-ops.
    pub fn none() -> Self {
        Self { stream: None }
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Drop the request stream. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.stream.take().is_some() {
            tracing::trace!("request stream released");
        }
    }

    /// Forward as many request values as are ready.
    ///
    /// Returns the upstream failure, if the request stream produced one; the
    /// caller must treat it as the invocation's terminal error.
    pub fn pump(&mut self, call: &CallHandle<V>, cx: &mut Context<'_>) -> Option<CallStatus> {
        let stream = self.stream.as_mut()?;
        loop {
            match stream.as_mut().poll_next(cx) {
                Poll::Pending => return None,
                Poll::Ready(Some(Ok(value))) => call.write(value),
                Poll::Ready(Some(Err(status))) => {
                    tracing::debug!(code = %status.code, "request stream failed; aborting call");
                    call.fail(status.clone());
                    self.stream = None;
                    return Some(status);
                }
                Poll::Ready(None) => {
                    tracing::trace!("request stream complete; closing send side");
                    call.close_send();
                    self.stream = None;
                    return None;
                }
            }
        }
    }
}
