use tokio::time::{Duration, Instant};

use crate::client::pending::Promise;
use crate::client::request::ReadRequest;
use crate::error::RequestError;

/// All of the information the session task needs to process a read
pub(crate) struct Request {
    pub(crate) request: ReadRequest,
    pub(crate) timeout: Duration,
    /// start of the response timeout
    pub(crate) created: Instant,
    pub(crate) promise: Promise,
}

impl Request {
    pub(crate) fn new(request: ReadRequest, timeout: Duration, promise: Promise) -> Self {
        Self {
            request,
            timeout,
            created: Instant::now(),
            promise,
        }
    }

    pub(crate) fn fail(self, err: RequestError) {
        self.promise.failure(err)
    }
}
