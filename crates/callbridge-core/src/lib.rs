//! callbridge-core: adapts an RPC client's four invocation shapes (unary,
//! client-streaming, server-streaming, bidirectional) into one uniform,
//! cancellable, push-based response stream.
//!
//! The pieces:
//! - [`MethodDescriptor`] / [`ServiceSchema`]: what a method looks like
//! - [`CallClient`] / [`CallArgs`] / [`ResponseStream`]: dispatch
//! - [`UnaryCall`] / [`StreamingCall`]: the two response adapters
//! - [`CallHandle`] / [`TransportCall`]: the live call, as a channel pair
//! - [`ErrorCode`] / [`RawCallError`] / [`CallStatus`]: error normalization
//! - [`CallTransport`]: the seam a real transport implements
//!
//! Values are an opaque `V: Send + 'static`; serialization is entirely the
//! transport's business.

#![forbid(unsafe_code)]

mod call;
mod client;
mod descriptor;
mod error;
mod metadata;
mod streaming;
mod transport;
mod unary;
mod upstream;

pub use call::{CallEvent, CallHandle, CallInstruction, TransportCall};
pub use client::{CallArgs, CallClient, ResponseStream};
pub use descriptor::{CallShape, MethodDescriptor, ServiceSchema};
pub use error::{CallError, CallStatus, ErrorCode, RawCallError};
pub use metadata::Metadata;
pub use streaming::StreamingCall;
pub use transport::CallTransport;
pub use unary::UnaryCall;
pub use upstream::{RequestStream, UpstreamSubscription};

// Consumers drive response streams with `StreamExt::next`; re-export it so
// they need not depend on futures directly.
pub use futures::StreamExt;
