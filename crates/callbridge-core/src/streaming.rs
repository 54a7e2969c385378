//! Streaming adapter: bridges response-streaming calls into a long-lived
//! response stream, forwarding values in arrival order.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use crate::call::Phase;
use crate::{
    CallEvent, CallHandle, CallStatus, CallTransport, Metadata, MethodDescriptor,
    UpstreamSubscription,
};

/// A response-streaming call surfaced as a stream.
///
/// Same lazy start as the unary adapter. After consumer-initiated
/// cancellation the adapter keeps draining transport events but never emits
/// another value: data is skipped and a cancelled-class terminal error
/// completes the stream cleanly instead of surfacing.
pub struct StreamingCall<T: CallTransport> {
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
impl<T: CallTransport> Unpin for StreamingCall<T> {}

impl<T: CallTransport> StreamingCall<T> {
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
                self.cancelled_by_consumer = true;
                self.phase = Phase::Draining;
                if call.is_finished() {
                    // Terminal already delivered; drain without emitting,
                    // no instruction needed.
                    return;
                }
                tracing::debug!(
                    method = %self.method.full_name(),
                    "consumer cancelled streaming call"
                );
                call.cancel();
            }
            Phase::Draining | Phase::Terminated => {}
        }
    }
}

impl<T: CallTransport> Stream for StreamingCall<T> {
    type Item = Result<T::Value, CallStatus>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.phase {
                Phase::Terminated => return Poll::Ready(None),
                Phase::Idle => {
                    tracing::debug!(method = %this.method.full_name(), "opening streaming call");
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
                Phase::Open | Phase::Draining => {
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
                            if this.phase == Phase::Draining {
                                // Cancelled: drain without emitting.
                                continue;
                            }
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
                                    "streaming call cancelled by peer"
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

impl<T: CallTransport> Drop for StreamingCall<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
