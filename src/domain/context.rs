use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use super::{DialError, Result};

/// Cancellation, deadline and chain trail shared by every blocking step of one dial.
#[derive(Debug, Clone, Default)]
pub struct DialContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    trail: Vec<String>,
}

impl DialContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Adapter names currently being resolved, outermost first.
    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    pub fn is_resolving(&self, name: &str) -> bool {
        self.trail.iter().any(|entry| entry == name)
    }

    /// Child context for dialing through `name`; fails if `name` is already on the trail.
    pub fn enter(&self, name: &str) -> Result<DialContext> {
        if self.is_resolving(name) {
            let mut cycle = self.trail.clone();
            cycle.push(name.to_string());
            return Err(DialError::ChainCycle(cycle));
        }
        let mut child = self.clone();
        child.trail.push(name.to_string());
        Ok(child)
    }

    /// Runs `fut` until it completes, the caller cancels, or the deadline passes.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = self.deadline;
        let bounded = async move {
            match deadline {
                Some(at) => timeout_at(at, fut).await.map_err(|_| DialError::Timeout)?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DialError::Cancelled),
            result = bounded => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_detects_cycles() {
        let ctx = DialContext::new();
        let ctx = ctx.enter("a").unwrap();
        let ctx = ctx.enter("b").unwrap();
        assert_eq!(ctx.trail(), ["a".to_string(), "b".to_string()]);

        match ctx.enter("a") {
            Err(DialError::ChainCycle(path)) => assert_eq!(path, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let ctx = DialContext::new();
        let value = ctx.run(async { Ok::<_, DialError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_aborts_on_cancel() {
        let token = CancellationToken::new();
        let ctx = DialContext::new().with_cancel(token.clone());
        token.cancel();

        let result = ctx
            .run(async {
                std::future::pending::<()>().await;
                Ok::<_, DialError>(())
            })
            .await;
        assert!(matches!(result, Err(DialError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_honours_deadline() {
        let ctx = DialContext::new().with_timeout(Duration::from_secs(3));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, DialError>(())
            })
            .await;
        assert!(matches!(result, Err(DialError::Timeout)));
    }
}
