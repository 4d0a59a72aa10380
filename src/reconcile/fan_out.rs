//! Bounded fan-out / fan-in over collaborator calls

use crate::transport::FetchError;
use crate::{Error, ErrorContext, Result};
use futures::StreamExt;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs one job per input with at most `limit` in flight.
///
/// Results come back in input order, one per input, whatever the completion
/// order. A failing job never stops the others from being drained. Once the
/// token is cancelled, jobs that have not started yet resolve to
/// [`FetchError::Cancelled`] without running.
#[derive(Debug, Clone)]
pub struct FanOut {
    limit: usize,
    cancel: CancellationToken,
}

impl FanOut {
    pub fn new(limit: usize, cancel: CancellationToken) -> Self {
        Self {
            limit: limit.max(1),
            cancel,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn run<I, T, F, Fut>(&self, inputs: Vec<I>, job: F) -> Vec<Result<T>>
    where
        F: Fn(I, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let n = inputs.len();
        if n == 0 {
            return Vec::new();
        }

        let mut slots: Vec<Option<Result<T>>> = (0..n).map(|_| None).collect();
        let job = &job;

        let finished: Vec<(usize, Result<T>)> = futures::stream::iter(inputs.into_iter().enumerate())
            .map(|(idx, input)| {
                let cancel = self.cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (idx, Err(Error::from(FetchError::Cancelled)));
                    }
                    debug!(slot = idx, "fan-out job dispatched");
                    let result = job(input, cancel).await;
                    match &result {
                        Ok(_) => debug!(slot = idx, "fan-out job completed"),
                        Err(e) => warn!(slot = idx, error = %e, "fan-out job failed"),
                    }
                    (idx, result)
                }
            })
            .buffer_unordered(self.limit)
            .collect()
            .await;

        for (idx, result) in finished {
            slots[idx] = Some(result);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    Err(Error::runtime_with_context(
                        "fan-out result missing",
                        ErrorContext::new()
                            .with_details(format!("slot {}", idx))
                            .with_source("fan_out"),
                    ))
                })
            })
            .collect()
    }
}

/// All successes, or the lowest-index failure wrapped as a reconciliation
/// error naming `operation` and that input's subject.
pub fn first_failure<T>(
    results: Vec<Result<T>>,
    operation: &str,
    subjects: &[String],
) -> Result<Vec<T>> {
    let mut values = Vec::with_capacity(results.len());
    for (idx, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => values.push(value),
            Err(e) => {
                let subject = subjects.get(idx).cloned().unwrap_or_else(|| format!("#{}", idx));
                return Err(Error::reconciliation(operation, subject, e));
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let fan_out = FanOut::new(3, CancellationToken::new());
        let results = fan_out
            .run(vec![30u64, 10, 20, 0], |delay, _| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, Error>(delay)
            })
            .await;
        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![30, 10, 20, 0]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_draining() {
        let ran = AtomicUsize::new(0);
        let fan_out = FanOut::new(1, CancellationToken::new());
        let results = fan_out
            .run(vec![1, 2, 3], |i, _| {
                ran.fetch_add(1, Ordering::SeqCst);
                async move {
                    if i == 1 {
                        Err(Error::from(FetchError::not_found("first")))
                    } else {
                        Ok(i)
                    }
                }
            })
            .await;
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_err());
        assert!(results[1].is_ok() && results[2].is_ok());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let fan_out = FanOut::new(2, CancellationToken::new());
        let _ = fan_out
            .run((0..6).collect(), |i: i32, _| {
                let (in_flight, peak) = (&in_flight, &peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, Error>(i)
                }
            })
            .await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_jobs() {
        let token = CancellationToken::new();
        token.cancel();
        let ran = AtomicUsize::new(0);
        let results = FanOut::new(4, token)
            .run(vec![1, 2], |i, _| {
                ran.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, Error>(i) }
            })
            .await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(results.iter().all(|r| r.as_ref().is_err_and(|e| e.is_cancelled())));
    }

    #[test]
    fn test_first_failure_reports_lowest_index() {
        let results: Vec<Result<i32>> = vec![
            Ok(1),
            Err(Error::from(FetchError::not_found("second"))),
            Err(Error::from(FetchError::Cancelled)),
        ];
        let subjects = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let err = first_failure(results, "compare", &subjects).unwrap_err();
        match err {
            Error::Reconciliation { subject, source, .. } => {
                assert_eq!(subject, "b");
                assert!(source.is_not_found());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
