//! Batch calls with recursive splitting on truncation.
//!
//! A batch service may return fewer results than it was given, or flag its
//! answer as length-limited. Either way the response is *truncated*. The
//! [`split`] driver discards a truncated answer and retries each half of the
//! batch independently until every sub-batch either succeeds or cannot be
//! split any further.
//!
//! Oversized batches are halved before any call is made. Each level of
//! recursion halves the batch, so the depth is bounded by `log2(n) + 1` and
//! at most `2n - 1` calls are made for `n` segments.

use nonempty::NonEmpty;

use crate::{
    domain::Segment,
    enrich::{CancelFlag, Classified, Generated, ServiceError},
};

/// One batch response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<T> {
    /// The results, in whatever order the service returned them.
    pub items: Vec<T>,
    /// Whether the response is known or suspected to be incomplete.
    pub truncated: bool,
}

impl<T> Response<T> {
    /// A complete response.
    #[must_use]
    pub const fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            truncated: false,
        }
    }

    /// A truncated response.
    #[must_use]
    pub const fn truncated(items: Vec<T>) -> Self {
        Self {
            items,
            truncated: true,
        }
    }
}

/// A service that classifies segments and generates examples in batches.
pub trait BatchEnricher: Send + Sync {
    /// Classify every segment in one call.
    ///
    /// # Errors
    ///
    /// Returns an error on a hard failure. Truncation is not an error.
    fn classify_batch(&self, segments: &[&Segment]) -> Result<Response<Classified>, ServiceError>;

    /// Generate examples for every segment in one call.
    ///
    /// `context` segments are folded into the request but are not expected
    /// back in the results.
    ///
    /// # Errors
    ///
    /// Returns an error on a hard failure. Truncation is not an error.
    fn generate_examples_batch(
        &self,
        segments: &[&Segment],
        context: &[&Segment],
    ) -> Result<Response<Generated>, ServiceError>;
}

/// How batches are sized and split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPolicy {
    /// The largest batch sent in a single call. Values below 1 are treated
    /// as 1.
    pub max_batch: usize,
    /// Process the two halves of a split concurrently.
    pub parallel: bool,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            max_batch: 10,
            parallel: false,
        }
    }
}

/// A sub-batch that failed with a hard error.
#[derive(Debug)]
pub struct Failure {
    /// The segments in the failed sub-batch.
    pub segment_ids: Vec<String>,
    /// What went wrong.
    pub error: ServiceError,
}

/// The combined result of a split batch run.
#[derive(Debug)]
pub struct Outcome<T> {
    /// Results from every successful sub-batch, left half before right.
    pub items: Vec<T>,
    /// Segments that were still truncated on their own and were accepted
    /// with whatever the service returned.
    pub partial: Vec<String>,
    /// Sub-batches that failed while a sibling succeeded.
    pub failures: Vec<Failure>,
}

impl<T> Default for Outcome<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            partial: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Outcome<T> {
    fn append(&mut self, other: Self) {
        self.items.extend(other.items);
        self.partial.extend(other.partial);
        self.failures.extend(other.failures);
    }
}

/// A batch run that produced no results at all.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// A single, unsplit call failed.
    #[error("batch of {} segments failed: {}", .0.segment_ids.len(), .0.error)]
    Failed(Failure),

    /// Both halves of a split batch failed.
    #[error("both halves of a split batch failed ({} failed sub-batches, first: {})", .0.len(), .0.head.error)]
    BothHalvesFailed(NonEmpty<Failure>),
}

impl BatchError {
    /// Every failed sub-batch behind this error.
    #[must_use]
    pub fn into_failures(self) -> NonEmpty<Failure> {
        match self {
            Self::Failed(failure) => NonEmpty::new(failure),
            Self::BothHalvesFailed(failures) => failures,
        }
    }
}

/// Run `call` over `segments`, splitting on size and on truncation.
///
/// `call` must be safe to retry with any subset of the segments. Cancellation
/// is checked before every call; a cancelled sub-batch fails with
/// [`ServiceError::Cancelled`] and results already gathered are kept.
///
/// # Errors
///
/// Returns an error only if no sub-batch succeeded: the single call failed,
/// or both halves of a split failed.
pub fn split<T, F>(
    segments: &[&Segment],
    policy: SplitPolicy,
    cancel: &CancelFlag,
    call: &F,
) -> Result<Outcome<T>, BatchError>
where
    T: Send,
    F: Fn(&[&Segment]) -> Result<Response<T>, ServiceError> + Sync,
{
    if segments.is_empty() {
        return Ok(Outcome::default());
    }

    if segments.len() > policy.max_batch.max(1) {
        tracing::debug!(size = segments.len(), max = policy.max_batch, "splitting oversized batch");
        return halves(segments, policy, cancel, call);
    }

    let response = if cancel.is_cancelled() {
        Err(ServiceError::Cancelled)
    } else {
        call(segments)
    };

    let response = response.map_err(|error| {
        BatchError::Failed(Failure {
            segment_ids: ids(segments),
            error,
        })
    })?;

    if !response.truncated {
        return Ok(Outcome {
            items: response.items,
            ..Outcome::default()
        });
    }

    if segments.len() > 1 {
        tracing::debug!(
            size = segments.len(),
            returned = response.items.len(),
            "truncated response, splitting"
        );
        return halves(segments, policy, cancel, call);
    }

    let partial = ids(segments);
    tracing::warn!(segment_id = %partial[0], "response still truncated for a single segment, keeping partial result");
    Ok(Outcome {
        items: response.items,
        partial,
        failures: Vec::new(),
    })
}

fn halves<T, F>(
    segments: &[&Segment],
    policy: SplitPolicy,
    cancel: &CancelFlag,
    call: &F,
) -> Result<Outcome<T>, BatchError>
where
    T: Send,
    F: Fn(&[&Segment]) -> Result<Response<T>, ServiceError> + Sync,
{
    let (left, right) = segments.split_at(segments.len() / 2);

    let (left, right) = if policy.parallel {
        rayon::join(
            || split(left, policy, cancel, call),
            || split(right, policy, cancel, call),
        )
    } else {
        (
            split(left, policy, cancel, call),
            split(right, policy, cancel, call),
        )
    };

    match (left, right) {
        (Ok(mut left), Ok(right)) => {
            left.append(right);
            Ok(left)
        }
        (Ok(mut ok), Err(error)) | (Err(error), Ok(mut ok)) => {
            let failures = error.into_failures();
            for failure in failures.iter() {
                tracing::warn!(
                    segments = failure.segment_ids.len(),
                    error = %failure.error,
                    "sub-batch failed, keeping results from the other half"
                );
            }
            ok.failures.extend(failures);
            Ok(ok)
        }
        (Err(left), Err(right)) => {
            let mut failures = left.into_failures();
            failures.extend(right.into_failures());
            Err(BatchError::BothHalvesFailed(failures))
        }
    }
}

fn ids(segments: &[&Segment]) -> Vec<String> {
    segments.iter().map(|s| s.id().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use test_case::test_case;

    use super::*;

    fn segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment::new(format!("seg-{i:04}"), vec![], format!("content {i}")))
            .collect()
    }

    /// Records each call's batch and answers according to `answer`.
    struct Recorder<A> {
        answer: A,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl<A> Recorder<A>
    where
        A: Fn(&[&Segment]) -> Result<Response<String>, ServiceError> + Sync,
    {
        fn new(answer: A) -> Self {
            Self {
                answer,
                calls: Mutex::default(),
            }
        }

        fn call(&self, batch: &[&Segment]) -> Result<Response<String>, ServiceError> {
            self.calls.lock().unwrap().push(ids(batch));
            (self.answer)(batch)
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn echo(batch: &[&Segment]) -> Response<String> {
        Response::complete(ids(batch))
    }

    fn sorted(mut items: Vec<String>) -> Vec<String> {
        items.sort();
        items
    }

    #[test]
    fn empty_batch_makes_no_call() {
        let recorder = Recorder::new(|b: &[&Segment]| Ok(echo(b)));
        let outcome = split(&[], SplitPolicy::default(), &CancelFlag::default(), &|b: &[&Segment]| {
            recorder.call(b)
        })
        .unwrap();

        assert!(outcome.items.is_empty());
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn oversized_batch_is_split_before_calling() {
        let all = segments(12);
        let refs: Vec<&Segment> = all.iter().collect();
        let recorder = Recorder::new(|b: &[&Segment]| Ok(echo(b)));

        let outcome = split(&refs, SplitPolicy::default(), &CancelFlag::default(), &|b: &[&Segment]| {
            recorder.call(b)
        })
        .unwrap();

        let calls = recorder.calls();
        assert!(calls.len() >= 2);
        assert!(calls.iter().all(|batch| batch.len() <= 10));
        assert_eq!(sorted(outcome.items), ids(&refs));
    }

    #[test]
    fn truncated_response_is_discarded_and_split() {
        let all = segments(4);
        let refs: Vec<&Segment> = all.iter().collect();
        // Only batches of two or fewer fit in a response.
        let recorder = Recorder::new(|b: &[&Segment]| {
            if b.len() > 2 {
                Ok(Response::truncated(ids(&b[..1])))
            } else {
                Ok(echo(b))
            }
        });

        let outcome = split(&refs, SplitPolicy::default(), &CancelFlag::default(), &|b: &[&Segment]| {
            recorder.call(b)
        })
        .unwrap();

        assert_eq!(outcome.items, ids(&refs));
        assert_eq!(recorder.calls().len(), 3);
        assert!(outcome.partial.is_empty());
    }

    #[test]
    fn single_truncated_segment_is_accepted_as_partial() {
        let all = segments(2);
        let refs: Vec<&Segment> = all.iter().collect();
        let recorder = Recorder::new(|b: &[&Segment]| {
            if b.iter().any(|s| s.id() == "seg-0001") {
                Ok(Response::truncated(Vec::new()))
            } else {
                Ok(echo(b))
            }
        });

        let outcome = split(&refs, SplitPolicy::default(), &CancelFlag::default(), &|b: &[&Segment]| {
            recorder.call(b)
        })
        .unwrap();

        assert_eq!(outcome.items, ["seg-0000"]);
        assert_eq!(outcome.partial, ["seg-0001"]);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn one_failed_half_keeps_the_other() {
        let all = segments(4);
        let refs: Vec<&Segment> = all.iter().collect();
        let policy = SplitPolicy {
            max_batch: 2,
            parallel: false,
        };
        let recorder = Recorder::new(|b: &[&Segment]| {
            if b[0].id() == "seg-0002" {
                Err(ServiceError::Transport("boom".to_string()))
            } else {
                Ok(echo(b))
            }
        });

        let outcome = split(&refs, policy, &CancelFlag::default(), &|b: &[&Segment]| {
            recorder.call(b)
        })
        .unwrap();

        assert_eq!(outcome.items, ["seg-0000", "seg-0001"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].segment_ids, ["seg-0002", "seg-0003"]);
    }

    #[test]
    fn both_halves_failing_is_fatal() {
        let all = segments(4);
        let refs: Vec<&Segment> = all.iter().collect();
        let policy = SplitPolicy {
            max_batch: 2,
            parallel: false,
        };

        let error = split(&refs, policy, &CancelFlag::default(), &|_: &[&Segment]| {
            Err::<Response<String>, _>(ServiceError::Transport("down".to_string()))
        })
        .unwrap_err();

        assert!(matches!(error, BatchError::BothHalvesFailed(ref f) if f.len() == 2));
    }

    #[test]
    fn unsplit_failure_is_fatal() {
        let all = segments(3);
        let refs: Vec<&Segment> = all.iter().collect();

        let error = split(&refs, SplitPolicy::default(), &CancelFlag::default(), &|_: &[&Segment]| {
            Err::<Response<String>, _>(ServiceError::Timeout(std::time::Duration::from_secs(1)))
        })
        .unwrap_err();

        let failures = error.into_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures.head.segment_ids.len(), 3);
    }

    #[test]
    fn cancelled_run_makes_no_calls() {
        let all = segments(3);
        let refs: Vec<&Segment> = all.iter().collect();
        let cancel = CancelFlag::default();
        cancel.cancel();
        let recorder = Recorder::new(|b: &[&Segment]| Ok(echo(b)));

        let error = split(&refs, SplitPolicy::default(), &cancel, &|b: &[&Segment]| {
            recorder.call(b)
        })
        .unwrap_err();

        assert!(matches!(
            error,
            BatchError::Failed(Failure {
                error: ServiceError::Cancelled,
                ..
            })
        ));
        assert!(recorder.calls().is_empty());
    }

    #[test_case(1; "one")]
    #[test_case(2; "two")]
    #[test_case(7; "seven")]
    #[test_case(33; "thirty three")]
    #[test_case(100; "one hundred")]
    fn always_truncated_terminates_within_bound(n: usize) {
        let all = segments(n);
        let refs: Vec<&Segment> = all.iter().collect();
        let recorder = Recorder::new(|_: &[&Segment]| Ok(Response::truncated(Vec::new())));

        let outcome = split(&refs, SplitPolicy::default(), &CancelFlag::default(), &|b: &[&Segment]| {
            recorder.call(b)
        })
        .unwrap();

        assert!(recorder.calls().len() <= 2 * n - 1);
        assert_eq!(sorted(outcome.partial), ids(&refs));
    }

    #[test_case(false; "sequential")]
    #[test_case(true; "parallel")]
    fn results_are_left_then_right(parallel: bool) {
        let all = segments(25);
        let refs: Vec<&Segment> = all.iter().collect();
        let policy = SplitPolicy {
            max_batch: 3,
            parallel,
        };

        let outcome = split(&refs, policy, &CancelFlag::default(), &|b: &[&Segment]| {
            Ok::<_, ServiceError>(echo(b))
        })
        .unwrap();

        assert_eq!(outcome.items, ids(&refs));
    }
}
