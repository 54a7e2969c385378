//! callbridge: one uniform, cancellable response stream over the four RPC
//! call shapes.
//!
//! A [`CallClient`] resolves method names against a [`ServiceSchema`] and
//! returns a [`ResponseStream`] for every invocation, unary or streaming,
//! with transport errors normalized into [`CallStatus`]. The
//! [`ClientRegistry`] owns one client per service.
//!
//! ```ignore
//! let transport = Arc::new(MyTransport::connect(&ClientConfig::default())?);
//! let schema = ServiceSchema::new("UserService")
//!     .unary("GetUser")
//!     .server_streaming("WatchOrders");
//! let client = CallClient::new(schema, transport);
//!
//! let mut orders = client.invoke("WatchOrders", CallArgs::Value(filter))?;
//! while let Some(order) = orders.next().await {
//!     handle(order?);
//! }
//! ```

#![forbid(unsafe_code)]

mod registry;

pub use callbridge_core::*;
pub use registry::{ClientConfig, ClientRegistry};
