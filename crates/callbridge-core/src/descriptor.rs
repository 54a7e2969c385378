//! Method descriptors and service schemas.

use core::fmt;
use std::collections::HashMap;

use crate::CallError;

/// The four invocation shapes a remote method can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unary => "unary",
            Self::ClientStreaming => "client-streaming",
            Self::ServerStreaming => "server-streaming",
            Self::BidiStreaming => "bidi-streaming",
        })
    }
}

/// Identifies a remote method and its declared streaming shape.
///
/// Produced once by schema resolution and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub service: String,
    pub name: String,
    /// The request side is a stream of values rather than a single value.
    pub request_stream: bool,
    /// The response side is a stream of values rather than a single value.
    pub response_stream: bool,
}

impl MethodDescriptor {
    pub fn new(
        service: impl Into<String>,
        name: impl Into<String>,
        request_stream: bool,
        response_stream: bool,
    ) -> Self {
        Self {
            service: service.into(),
            name: name.into(),
            request_stream,
            response_stream,
        }
    }

    /// The invocation shape implied by the two streaming flags.
    pub fn shape(&self) -> CallShape {
        match (self.request_stream, self.response_stream) {
            (false, false) => CallShape::Unary,
            (true, false) => CallShape::ClientStreaming,
            (false, true) => CallShape::ServerStreaming,
            (true, true) => CallShape::BidiStreaming,
        }
    }

    /// `Service/Method`, for diagnostics.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.service, self.name)
    }
}

/// Immutable method table for one remote service.
#[derive(Debug, Clone)]
pub struct ServiceSchema {
    service: String,
    methods: HashMap<String, MethodDescriptor>,
}

impl ServiceSchema {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            methods: HashMap::new(),
        }
    }

    pub fn unary(self, name: impl Into<String>) -> Self {
        self.push(name, false, false)
    }

    pub fn client_streaming(self, name: impl Into<String>) -> Self {
        self.push(name, true, false)
    }

    pub fn server_streaming(self, name: impl Into<String>) -> Self {
        self.push(name, false, true)
    }

    pub fn bidi_streaming(self, name: impl Into<String>) -> Self {
        self.push(name, true, true)
    }

    fn push(mut self, name: impl Into<String>, request_stream: bool, response_stream: bool) -> Self {
        let name = name.into();
        let descriptor = MethodDescriptor {
            service: self.service.clone(),
            name: name.clone(),
            request_stream,
            response_stream,
        };
        self.methods.insert(name, descriptor);
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Look up a method by bare name.
    pub fn resolve(&self, name: &str) -> Result<&MethodDescriptor, CallError> {
        self.methods.get(name).ok_or_else(|| CallError::MethodNotFound {
            method: format!("{}/{}", self.service, name),
        })
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
