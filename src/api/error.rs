use thiserror::Error;

/// Failure talking to the dashboard backend.
///
/// The "still processing" answer of the report endpoint is not an error and
/// never shows up here; see [`crate::models::ResultFetch::Processing`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Connection refused, DNS failure, timeout.
    #[error("network error: {0}")]
    Network(String),
    /// Backend answered with a status outside 2xx.
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Body did not match the expected JSON shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_status() {
        let e = ApiError::Status {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(e.to_string(), "backend returned HTTP 500: boom");
        assert_eq!(e.status(), Some(500));
    }

    #[test]
    fn display_network() {
        let e = ApiError::Network("connection refused".into());
        assert_eq!(e.to_string(), "network error: connection refused");
        assert_eq!(e.status(), None);
    }
}
