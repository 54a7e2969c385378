//! Unary adapter: bridges single-response calls into a response stream that
//! emits at most one value and then completes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use crate::call::Phase;
use crate::{
    CallEvent, CallHandle, CallStatus, CallTransport, Metadata, MethodDescriptor,
    UpstreamSubscription,
};

/// A single-response call surfaced as a stream.
///
/// Lazily started: the transport call opens on first poll, so open failures
/// arrive as the stream's terminal error rather than at the call site. Emits
/// at most one value; listeners are released the moment it arrives.
pub struct UnaryCall<T: CallTransport> {
    transport: Arc<T>,
    method: MethodDescriptor,
    metadata: Metadata,
    request: Option<T::Value>,
    upstream: UpstreamSubscription<T::Value>,
    call: Option<CallHandle<T::Value>>,
    cancelled_by_consumer: bool,
    phase: Phase,
}

// No field is structurally pinned; `Value` is never pin-projected.
impl<T: CallTransport> Unpin for UnaryCall<T> {}

impl<T: CallTransport> UnaryCall<T> {
    pub(crate) fn new(
        transport: Arc<T>,
        method: MethodDescriptor,
        metadata: Metadata,
        request: Option<T::Value>,
        upstream: UpstreamSubscription<T::Value>,
    ) -> Self {
        Self {
            transport,
            method,
            metadata,
            request,
            upstream,
            call: None,
            cancelled_by_consumer: false,
            phase: Phase::Idle,
        }
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    /// Consumer-initiated teardown. Idempotent, and a no-op once the call
    /// has finished.
    pub fn cancel(&mut self) {
        self.upstream.release();
        match self.phase {
            Phase::Idle => {
                // Never started: complete without ever opening the call.
                self.phase = Phase::Terminated;
            }
            Phase::Open => {
                let Some(call) = self.call.as_ref() else { return };
                if self.cancelled_by_consumer {
                    return;
                }
                self.cancelled_by_consumer = true;
                if call.is_finished() {
                    // Terminal already delivered; stop emitting, no
                    // instruction needed.
                    self.phase = Phase::Draining;
                    return;
                }
                tracing::debug!(method = %self.method.full_name(), "consumer cancelled unary call");
                call.cancel();
            }
            Phase::Draining | Phase::Terminated => {}
        }
    }
}

impl<T: CallTransport> Stream for UnaryCall<T> {
    type Item = Result<T::Value, CallStatus>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.phase {
                Phase::Terminated => return Poll::Ready(None),
                Phase::Draining => {
                    this.phase = Phase::Terminated;
                    return Poll::Ready(None);
                }
                Phase::Idle => {
                    tracing::debug!(method = %this.method.full_name(), "opening unary call");
                    match this
                        .transport
                        .open(&this.method, this.request.take(), &this.metadata)
                    {
                        Ok(call) => {
                            this.call = Some(call);
                            this.phase = Phase::Open;
                        }
                        Err(error) => {
                            this.upstream.release();
                            this.phase = Phase::Terminated;
                            return Poll::Ready(Some(Err(error.into())));
                        }
                    }
                }
                Phase::Open => {
                    let Some(call) = this.call.as_mut() else {
                        this.phase = Phase::Terminated;
                        return Poll::Ready(None);
                    };
                    if let Some(status) = this.upstream.pump(call, cx) {
                        call.destroy();
                        this.phase = Phase::Terminated;
                        return Poll::Ready(Some(Err(status)));
                    }
                    match call.poll_event(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Some(CallEvent::Data(value))) => {
                            if this.cancelled_by_consumer {
                                // Torn down; nothing is delivered anymore.
                                continue;
                            }
                            // The single completion value: emit it, stop
                            // listening, complete on the next poll.
                            call.destroy();
                            this.upstream.release();
                            this.phase = Phase::Draining;
                            return Poll::Ready(Some(Ok(value)));
                        }
                        Poll::Ready(Some(CallEvent::Error(raw))) => {
                            let status = CallStatus::normalize(raw);
                            call.destroy();
                            this.upstream.release();
                            this.phase = Phase::Terminated;
                            if status.is_cancellation() {
                                if this.cancelled_by_consumer {
                                    tracing::debug!(
                                        method = %this.method.full_name(),
                                        "suppressing cancellation error after consumer cancel"
                                    );
                                    return Poll::Ready(None);
                                }
                                tracing::debug!(
                                    method = %this.method.full_name(),
                                    code = %status.code,
                                    "unary call cancelled by peer"
                                );
                            }
                            return Poll::Ready(Some(Err(status)));
                        }
                        Poll::Ready(Some(CallEvent::End)) | Poll::Ready(None) => {
                            call.destroy();
                            this.upstream.release();
                            this.phase = Phase::Terminated;
                            return Poll::Ready(None);
                        }
                    }
                }
            }
        }
    }
}

impl<T: CallTransport> Drop for UnaryCall<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
