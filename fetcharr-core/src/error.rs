use thiserror::Error;

/// Errors raised by the engine: the workflow loop, the Item Store, the
/// Cached-Source Selector, and the schedulers. Mirrors the teacher's
/// `MediaError` shape — one variant per failure class the callers actually
/// need to branch on, everything else folded into `Internal`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("item store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("model error: {0}")]
    Model(#[from] fetcharr_model::ModelError),

    #[error("downloader provider error: {0}")]
    Provider(String),

    #[error("http error talking to downloader provider: {0}")]
    Http(#[from] reqwest::Error),

    #[error("capability {0} is not configured")]
    NotConfigured(&'static str),

    #[error("{0} failed fatal startup validation: {1}")]
    FatalStartup(&'static str, String),

    #[error("workflow {0} is already running")]
    WorkflowAlreadyRunning(String),

    #[error("workflow {0} exceeded its transition budget")]
    WorkflowIterationBudgetExceeded(String),

    #[error("workflow {0} timed out")]
    WorkflowTimedOut(String),

    #[error("activity {0} timed out")]
    ActivityTimedOut(&'static str),

    #[error("rate limit budget exhausted for {0}")]
    BudgetExhausted(&'static str),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
