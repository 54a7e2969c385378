//! Call dispatch: one uniform `invoke` surface over all four call shapes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use crate::{
    CallError, CallStatus, CallTransport, Metadata, MethodDescriptor, RequestStream, ServiceSchema,
    StreamingCall, UnaryCall, UpstreamSubscription,
};

/// The request side of one invocation.
///
/// An explicit capability union, resolved at the call site: a `Stream`
/// argument is only honored by methods that declare a streaming request
/// side.
pub enum CallArgs<V> {
    /// A single request value.
    Value(V),
    /// A stream of request values.
    Stream(RequestStream<V>),
}

/// A client for one remote service: resolves methods against the schema and
/// dispatches each invocation to the matching adapter.
pub struct CallClient<T: CallTransport> {
    schema: ServiceSchema,
    transport: Arc<T>,
}

impl<T: CallTransport> CallClient<T> {
    pub fn new(schema: ServiceSchema, transport: Arc<T>) -> Self {
        Self { schema, transport }
    }

    pub fn schema(&self) -> &ServiceSchema {
        &self.schema
    }

    /// Invoke `method` with no metadata.
    pub fn invoke(
        &self,
        method: &str,
        args: CallArgs<T::Value>,
    ) -> Result<ResponseStream<T>, CallError> {
        self.invoke_with_metadata(method, args, Metadata::new())
    }

    /// Invoke `method`, returning a lazily started, cancellable response
    /// stream.
    ///
    /// Resolution failures and argument-shape mismatches are returned
    /// synchronously; everything after the call opens arrives through the
    /// stream, terminated by at most one error.
    pub fn invoke_with_metadata(
        &self,
        method: &str,
        args: CallArgs<T::Value>,
        metadata: Metadata,
    ) -> Result<ResponseStream<T>, CallError> {
        let descriptor = self.schema.resolve(method)?.clone();
        let (request, upstream) = match args {
            CallArgs::Value(value) => (Some(value), UpstreamSubscription::none()),
            CallArgs::Stream(stream) if descriptor.request_stream => {
                (None, UpstreamSubscription::new(stream))
            }
            CallArgs::Stream(_) => {
                return Err(CallError::InvalidRequest {
                    method: descriptor.full_name(),
                    reason: "request stream passed to a method without a streaming request side",
                });
            }
        };
        tracing::debug!(
            method = %descriptor.full_name(),
            shape = %descriptor.shape(),
            "dispatching call"
        );
        let stream = if descriptor.response_stream {
            ResponseStream::Streaming(StreamingCall::new(
                self.transport.clone(),
                descriptor,
                metadata,
                request,
                upstream,
            ))
        } else {
            ResponseStream::Unary(UnaryCall::new(
                self.transport.clone(),
                descriptor,
                metadata,
                request,
                upstream,
            ))
        };
        Ok(stream)
    }

    /// Event publishing belongs to message-broker clients; this client only
    /// issues calls.
    pub fn publish(&self, topic: &str, _payload: T::Value) -> Result<(), CallError> {
        tracing::warn!(topic, "publish attempted on a call-oriented client");
        Err(CallError::Unsupported {
            operation: "publish",
        })
    }

    /// Topic subscription belongs to message-broker clients; this client
    /// only issues calls.
    pub fn subscribe(&self, topic: &str) -> Result<(), CallError> {
        tracing::warn!(topic, "subscribe attempted on a call-oriented client");
        Err(CallError::Unsupported {
            operation: "subscribe",
        })
    }
}

/// The consumer-facing response stream: a tagged variant over the two
/// adapters, selected once at dispatch time from the method's declared
/// response shape.
pub enum ResponseStream<T: CallTransport> {
    Unary(UnaryCall<T>),
    Streaming(StreamingCall<T>),
}

impl<T: CallTransport> ResponseStream<T> {
    pub fn method(&self) -> &MethodDescriptor {
        match self {
            Self::Unary(call) => call.method(),
            Self::Streaming(call) => call.method(),
        }
    }

    /// Consumer-initiated cancellation. Idempotent, and a no-op once the
    /// call has finished.
    pub fn cancel(&mut self) {
        match self {
            Self::Unary(call) => call.cancel(),
            Self::Streaming(call) => call.cancel(),
        }
    }
}

impl<T: CallTransport> Stream for ResponseStream<T> {
    type Item = Result<T::Value, CallStatus>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut() {
            Self::Unary(call) => Pin::new(call).poll_next(cx),
            Self::Streaming(call) => Pin::new(call).poll_next(cx),
        }
    }
}
