use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::error::{RegistryError, Result};

/// Bounded set of in-flight jobs.
///
/// After the first failure no further jobs are accepted; `finish` waits for
/// the ones already running and then reports that first failure.
pub(crate) struct Window {
    limit: usize,
    in_flight: FuturesUnordered<BoxFuture<'static, Result<()>>>,
    completed: usize,
    first_error: Option<RegistryError>,
}

impl Window {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            in_flight: FuturesUnordered::new(),
            completed: 0,
            first_error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.first_error.is_some()
    }

    /// Queue a job, waiting for a free slot first.
    pub async fn push(&mut self, job: BoxFuture<'static, Result<()>>) {
        while self.in_flight.len() >= self.limit {
            self.next().await;
        }
        if !self.is_failed() {
            self.in_flight.push(job);
        }
    }

    /// Record a failure that did not come from a queued job.
    pub fn fail(&mut self, error: RegistryError) {
        self.first_error.get_or_insert(error);
    }

    async fn next(&mut self) -> bool {
        match self.in_flight.next().await {
            Some(Ok(())) => self.completed += 1,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "job failed");
                self.fail(e);
            }
            None => return false,
        }
        true
    }

    /// Drain in-flight jobs and return how many succeeded.
    pub async fn finish(mut self) -> Result<usize> {
        while self.next().await {}

        match self.first_error {
            Some(source) if self.completed == 0 => Err(source),
            Some(source) => Err(RegistryError::PartialBatchFailure {
                completed: self.completed,
                source: Box::new(source),
            }),
            None => Ok(self.completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_limit_is_respected() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut window = Window::new(3);

        for _ in 0..10 {
            let running = running.clone();
            let peak = peak.clone();
            window
                .push(
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                    .boxed(),
                )
                .await;
        }

        assert_eq!(window.finish().await.unwrap(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_first_error_stops_intake() {
        let mut window = Window::new(1);

        window
            .push(async { Err(RegistryError::NotFound("a".to_string())) }.boxed())
            .await;
        // The failed job is collected while waiting for a slot
        window.push(async { Ok(()) }.boxed()).await;
        assert!(window.is_failed());

        let err = window.finish().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_failure_after_progress_is_partial() {
        let mut window = Window::new(1);

        window.push(async { Ok(()) }.boxed()).await;
        window
            .push(async { Err(RegistryError::NotFound("b".to_string())) }.boxed())
            .await;

        match window.finish().await {
            Err(RegistryError::PartialBatchFailure { completed, source }) => {
                assert_eq!(completed, 1);
                assert!(source.is_not_found());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
