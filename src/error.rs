use reqwest::StatusCode;
use thiserror::Error;

/// Failures raised by a single fetch, form submission or site visit.
///
/// None of these abort a run: the dispatcher turns them into
/// [`SiteOutcome::Failed`](crate::models::SiteOutcome) or an empty result
/// for the form or link that produced them.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: StatusCode },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("lookup form has no action URL")]
    MissingAction,

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl ScrapeError {
    /// Timeouts, refused connections, 429 and 5xx responses are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapeError::Http(e) => e.is_timeout() || e.is_connect(),
            ScrapeError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}
