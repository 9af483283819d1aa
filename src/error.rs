use thiserror::Error;

/// Failure taxonomy for the alert pipeline. Variants that are recovered
/// locally (carrier sends, media downloads, attention hooks) never bubble
/// out of their call sites; everything else reaches the task-level failure
/// handler which marks the alert `failed`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The AI service answered but the response is unusable.
    #[error("invalid AI response: {0}")]
    Validation(String),

    /// AI service returned 503 with its backpressure body. Fatal for this
    /// attempt but distinguishable so a backoff policy can treat it apart
    /// from hard validation failures.
    #[error("AI service at capacity")]
    Capacity { active_requests: Option<u64> },

    /// The AI service reported an internal pipeline failure in-band.
    #[error("AI service pipeline error: {0}")]
    AiPipeline(String),

    /// Missing or unusable tenant configuration. Not retryable.
    #[error("tenant configuration error: {0}")]
    Configuration(String),

    /// A single carrier send failed. Isolated per recipient and recorded
    /// as a failed notification row, never propagated past the dispatcher.
    #[error("carrier send failed: {0}")]
    Carrier(String),

    /// Evidence media could not be fetched or stored. Recovered locally.
    #[error("media persistence failed: {0}")]
    MediaDownload(String),

    #[error("telemetry provider error: {0}")]
    Provider(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("alert {0} not found")]
    AlertNotFound(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Whether a retry with backoff could plausibly succeed. Used by
    /// operators reading the failure reason, not by the queue: the
    /// processing task is single-attempt by design.
    pub fn is_backoff_candidate(&self) -> bool {
        matches!(self, PipelineError::Capacity { .. })
    }
}
