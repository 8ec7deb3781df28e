//! The seam between the query layer and the network.
//!
//! The core never performs I/O itself. A host supplies a `Transport` that
//! executes one `HttpRequest` and returns the `HttpResponse`; the query
//! client calls it exactly once per fetch or mutation.

use std::future::Future;
use std::pin::Pin;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};

pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, ApiError>> + Send + 'a>>;

/// Executes HTTP requests on behalf of the query client.
///
/// Non-2xx responses must be returned as `Ok`; status interpretation
/// belongs to `request::parse_response`. Return `Err(ApiError::Transport)`
/// only when no response was received.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    type Responder = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

    /// Answers every request from a closure and records what it was sent.
    pub(crate) struct StubTransport {
        calls: Mutex<Vec<HttpRequest>>,
        respond: Responder,
    }

    impl StubTransport {
        pub(crate) fn new(
            respond: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        pub(crate) fn ok(body: &str) -> Arc<Self> {
            let body = body.to_string();
            Self::new(move |_| HttpResponse::new(200, body.clone()))
        }

        pub(crate) fn calls(&self) -> Vec<HttpRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
            let response = (self.respond)(&request);
            self.calls.lock().unwrap().push(request);
            Box::pin(async move { Ok(response) })
        }
    }
}
