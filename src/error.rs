//! Error types shared by the scraping pipeline.
//!
//! Errors fall into three groups that the pipeline treats differently:
//!
//! - **Transport** ([`ScrapeError::Http`], [`ScrapeError::Status`]): abort the
//!   current unit of work (one page, one image, one article) and let the
//!   surrounding loop continue with whatever partial result it holds.
//! - **Shape** ([`ScrapeError::MissingContent`]): the page was fetched but the
//!   expected structure is not there.
//! - **Precondition** ([`ScrapeError::Access`], [`ScrapeError::CookieFile`],
//!   configuration errors): fatal for the whole run, never retried.

use crate::session::AccessStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("no article content found at {0}")]
    MissingContent(String),

    #[error("session check failed: {0}")]
    Access(AccessStatus),

    #[error("cannot use cookie file {path}: {reason}")]
    CookieFile { path: String, reason: String },

    #[error("invalid site rules: {0}")]
    Rules(#[from] serde_yaml::Error),

    #[error("invalid pattern in site rules: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid selector in site rules: {0}")]
    Selector(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EPUB packaging error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ScrapeError {
    /// True for failures that only concern the request at hand.
    pub fn is_transport(&self) -> bool {
        matches!(self, ScrapeError::Http { .. } | ScrapeError::Status { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let err = ScrapeError::Status {
            url: "https://www.golem.de/x.html".to_string(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "https://www.golem.de/x.html answered with status 404"
        );
        assert!(err.is_transport());
    }

    #[test]
    fn test_access_error_is_not_transport() {
        let err = ScrapeError::Access(AccessStatus::Paywall);
        assert!(!err.is_transport());
        assert!(err.to_string().contains("paywall"));
    }
}
