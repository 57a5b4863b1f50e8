//! Confirmation-code notification dispatch
//!
//! Delivery is fire-and-forget: the auth flow never fails because a
//! notification could not be sent, but failures are logged rather than
//! silently swallowed. The transport itself (SMTP, a queue, a provider API)
//! sits behind the trait.

use async_trait::async_trait;
use tracing::{error, info};

/// Sink for confirmation-code notifications
#[async_trait]
pub trait ConfirmationSink: Send + Sync {
    /// Deliver a confirmation code to the given address
    async fn send_confirmation(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Sink that records the dispatch in the log stream. Stands in for a real
/// transport in development and tests; the code itself is never logged.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl ConfirmationSink for LogSink {
    async fn send_confirmation(&self, email: &str, _code: &str) -> anyhow::Result<()> {
        info!(email = %email, "Confirmation code dispatched");
        Ok(())
    }
}

/// Dispatch a confirmation code on a best-effort basis
pub async fn dispatch_confirmation(sink: &dyn ConfirmationSink, email: &str, code: &str) {
    if let Err(e) = sink.send_confirmation(email, code).await {
        error!(email = %email, error = %e, "Failed to dispatch confirmation code");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSink;

    #[async_trait]
    impl ConfirmationSink for FailingSink {
        async fn send_confirmation(&self, _email: &str, _code: &str) -> anyhow::Result<()> {
            anyhow::bail!("transport down")
        }
    }

    struct CountingSink(AtomicUsize);

    #[async_trait]
    impl ConfirmationSink for CountingSink {
        async fn send_confirmation(&self, _email: &str, _code: &str) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_swallows_transport_errors() {
        // Must not panic or propagate
        dispatch_confirmation(&FailingSink, "a@x.com", "code").await;
    }

    #[tokio::test]
    async fn test_dispatch_delivers() {
        let sink = CountingSink(AtomicUsize::new(0));
        dispatch_confirmation(&sink, "a@x.com", "code").await;
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }
}
