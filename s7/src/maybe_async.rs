use std::future::Future;
use std::pin::Pin;

enum Value<T> {
    Ready(T),
    Async(Pin<Box<dyn Future<Output = T> + Send + 'static>>),
}

/// Result produced by user code either immediately or by a future
///
/// [`Connector`](crate::client::Connector) implementations that already hold a
/// stream (an in-memory pipe, a pre-opened socket) return it with
/// [`MaybeAsync::ready`] and avoid boxing a future. Implementations that must
/// perform I/O return [`MaybeAsync::asynchronous`].
#[must_use]
pub struct MaybeAsync<T> {
    inner: Value<T>,
}

impl<T> MaybeAsync<T> {
    /// Retrieve the value, which might be available immediately or require awaiting
    pub async fn get(self) -> T {
        match self.inner {
            Value::Ready(x) => x,
            Value::Async(x) => x.await,
        }
    }

    /// Construct a new `MaybeAsync` from an already available result
    pub fn ready(result: T) -> Self {
        MaybeAsync {
            inner: Value::Ready(result),
        }
    }

    /// Construct a new `MaybeAsync` from a future which yields the value eventually
    pub fn asynchronous<F>(result: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        MaybeAsync {
            inner: Value::Async(Box::pin(result)),
        }
    }
}

impl<T> std::fmt::Debug for MaybeAsync<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner {
            Value::Ready(_) => f.write_str("MaybeAsync::Ready"),
            Value::Async(_) => f.write_str("MaybeAsync::Async"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_ready_and_deferred_values() {
        assert_eq!(MaybeAsync::ready(1).get().await, 1);
        assert_eq!(MaybeAsync::asynchronous(async { 2 }).get().await, 2);
    }
}
