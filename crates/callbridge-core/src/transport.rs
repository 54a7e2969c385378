//! The seam between the adapter layer and an actual RPC transport.

use crate::{CallError, CallHandle, Metadata, MethodDescriptor};

/// Opens live calls for resolved methods.
///
/// Implementations own connection concerns entirely: endpoint, credentials,
/// channel tuning. The adapter layer hands them a descriptor and metadata
/// and drives the returned handle; nothing else crosses the seam.
pub trait CallTransport: Send + Sync + 'static {
    /// The value type carried by requests and responses.
    type Value: Send + 'static;

    /// Open one invocation of `method`.
    ///
    /// Plain calls pass the request value up front; request-streaming calls
    /// open with `None` and write values through the handle afterwards.
    fn open(
        &self,
        method: &MethodDescriptor,
        request: Option<Self::Value>,
        metadata: &Metadata,
    ) -> Result<CallHandle<Self::Value>, CallError>;
}
