//! Error types for the crawl pipeline
//!
//! Every failure the crawler can run into while talking to the platform API,
//! the feed endpoint or the document store is expressed as a [`CrawlError`].
//! None of them are fatal: the orchestrator logs the error with the entity it
//! belongs to and moves on to the next one. [`CrawlError::kind`] groups the
//! variants so callers (and tests) can reason about the failure category.

/// The category a [`CrawlError`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad status code or a request that never completed
    Transient,
    /// The upstream answered, but the body was not what we expected
    Payload,
    /// The document store rejected or failed an operation
    Store,
    /// A credential pool or setting is unusable
    Config,
    /// The crawl was stopped through its cancellation token
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// Upstream answered with a non-success status code
    #[error("{endpoint} responded with status {status}")]
    Status { endpoint: &'static str, status: u16 },

    /// The request could not be sent or timed out
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The response body is malformed or misses required fields
    #[error("malformed payload from {endpoint}: {message}")]
    Payload {
        endpoint: &'static str,
        message: String,
    },

    /// A document store operation failed
    #[error("store operation '{operation}' failed: {message}")]
    Store {
        operation: &'static str,
        message: String,
    },

    #[error("key pool '{pool}' is empty")]
    EmptyKeyPool { pool: &'static str },

    #[error("crawl cancelled")]
    Cancelled,
}

impl CrawlError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CrawlError::Status { .. } | CrawlError::Request { .. } => FailureKind::Transient,
            CrawlError::Payload { .. } => FailureKind::Payload,
            CrawlError::Store { .. } => FailureKind::Store,
            CrawlError::EmptyKeyPool { .. } => FailureKind::Config,
            CrawlError::Cancelled => FailureKind::Cancelled,
        }
    }

    pub fn store(operation: &'static str, message: impl ToString) -> Self {
        CrawlError::Store {
            operation,
            message: message.to_string(),
        }
    }

    pub fn payload(endpoint: &'static str, message: impl ToString) -> Self {
        CrawlError::Payload {
            endpoint,
            message: message.to_string(),
        }
    }
}

impl From<elasticsearch::Error> for CrawlError {
    fn from(error: elasticsearch::Error) -> Self {
        CrawlError::store("elasticsearch", error)
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;
