// 🚨 Error Taxonomy - Fatal failures of an updater run
//
// Only fatal conditions live here. Recoverable conditions (missed patterns,
// missing fee rows, out-of-range values) are reported as
// `reconciliation::Warning` values and never abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// Page fetch failure (transport or non-success HTTP status)
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. } => url,
            FetchError::Status { url, .. } => url,
        }
    }

    /// Status code when the server answered with a non-success response
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Transport { .. } => None,
        }
    }
}

/// Record store load/save failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate entity id '{id}' in {}", path.display())]
    DuplicateId { path: PathBuf, id: String },

    #[error("marshalling data: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that aborts a provider run
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not extract any fees from {0}")]
    NothingExtracted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_surfaces_code() {
        let err = FetchError::Status {
            url: "https://example.com/fees".to_string(),
            status: 404,
        };

        assert_eq!(err.status(), Some(404));
        assert_eq!(err.url(), "https://example.com/fees");
        assert_eq!(err.to_string(), "HTTP 404 from https://example.com/fees");
    }

    #[test]
    fn test_update_error_is_transparent_over_fetch() {
        let err: UpdateError = FetchError::Status {
            url: "https://example.com".to_string(),
            status: 503,
        }
        .into();

        assert_eq!(err.to_string(), "HTTP 503 from https://example.com");
    }

    #[test]
    fn test_duplicate_id_message() {
        let err = StoreError::DuplicateId {
            path: PathBuf::from("data.json"),
            id: "bna".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate entity id 'bna' in data.json");
    }
}
