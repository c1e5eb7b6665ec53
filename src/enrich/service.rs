//! Calling a completion service with timeouts, retries and cancellation.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

/// A request for a structured (JSON) completion.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// The model to use.
    pub model: &'a str,
    /// The full prompt text.
    pub prompt: &'a str,
    /// The JSON schema the response must conform to.
    pub schema: &'a serde_json::Value,
    /// Deadline for this attempt.
    pub timeout: Duration,
}

/// Why the service stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// The response is complete.
    Stop,
    /// The response hit the output length limit and may be cut short.
    Length,
    /// Any other reason reported by the service.
    Other(String),
}

/// The text returned by a completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The generated text, expected to be JSON.
    pub text: String,
    /// Why generation stopped.
    pub finish: FinishReason,
}

impl Completion {
    /// Whether the service reported a length-limited completion.
    #[must_use]
    pub fn is_length_limited(&self) -> bool {
        self.finish == FinishReason::Length
    }
}

/// A synchronous text completion capability.
pub trait CompletionBackend: Send + Sync {
    /// Perform a single completion attempt.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, transport failure, or an unusable
    /// response.
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, ServiceError>;
}

/// Errors from a completion service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No credential is configured for the service.
    #[error("{0} is required. Set the environment variable: export {0}=your-key")]
    MissingCredential(&'static str),

    /// The attempt did not finish within its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be delivered or the response not received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body.
        body: String,
    },

    /// The response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The caller cancelled the run.
    #[error("cancelled")]
    Cancelled,

    /// Every attempt failed.
    #[error("all {attempts} attempts failed: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        last: Box<ServiceError>,
    },
}

impl ServiceError {
    const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::MissingCredential(_) | Self::Cancelled | Self::Exhausted { .. }
        )
    }
}

/// A shared cancellation signal.
///
/// Cancelling stops further attempts and sub-batches. A call already in
/// flight runs to its own deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A completion backend with a retry budget and a cancellation flag.
#[derive(Clone)]
pub struct Service {
    backend: Arc<dyn CompletionBackend>,
    max_retries: u32,
    cancel: CancelFlag,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("max_retries", &self.max_retries)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Number of retries after a failed first attempt, unless overridden.
    pub const DEFAULT_MAX_RETRIES: u32 = 2;

    /// Wrap a backend with the default retry budget.
    #[must_use]
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            cancel: CancelFlag::default(),
        }
    }

    /// Set the number of retries after the first attempt.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Observe the given cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The cancellation flag this service observes.
    #[must_use]
    pub const fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Perform a completion, retrying immediately on failure.
    ///
    /// Each attempt gets the full timeout of `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Cancelled`] if cancellation was requested
    /// before an attempt, a non-retryable error as-is, or
    /// [`ServiceError::Exhausted`] once the retry budget is spent.
    pub fn call(&self, request: &CompletionRequest<'_>) -> Result<Completion, ServiceError> {
        let attempts = self.max_retries.saturating_add(1);
        let mut last = None;

        for attempt in 1..=attempts {
            if self.cancel.is_cancelled() {
                return Err(ServiceError::Cancelled);
            }

            match self.backend.complete(request) {
                Ok(completion) => return Ok(completion),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt, attempts, model = request.model, error = %e, "completion attempt failed");
                    last = Some(e);
                }
            }
        }

        Err(ServiceError::Exhausted {
            attempts,
            last: Box::new(last.unwrap_or(ServiceError::Cancelled)),
        })
    }
}
