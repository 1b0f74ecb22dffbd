use std::time::Duration;

use thiserror::Error;

/// Type alias for Result with TriageError
pub type Result<T> = std::result::Result<T, TriageError>;

/// Error types for the triage service
#[derive(Error, Debug)]
pub enum TriageError {
    /// A required secret, credential source or setting is missing or invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Interactive authorization failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Refresh token exchange was rejected or could not be performed
    #[error("Token refresh failed: {0}")]
    RefreshError(String),

    /// Remote API returned an unexpected non-success status
    #[error("API error: {0}")]
    ApiError(String),

    /// Rate limit exceeded - provider asked us to back off
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection refused, reset, DNS, ...)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Remote call did not complete within its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Bad request (400) or invalid caller input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// External payload did not have the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Provider message did not have the expected structure
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Any fault raised while talking to the mail provider
    #[error("Mail provider error: {source}")]
    MailProvider {
        #[source]
        source: Box<TriageError>,
    },

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TriageError {
    /// Wrap a provider-side fault
    pub fn mail_provider(error: TriageError) -> Self {
        match error {
            already @ TriageError::MailProvider { .. } => already,
            other => TriageError::MailProvider {
                source: Box::new(other),
            },
        }
    }

    /// True for failures of a remote service (unreachable, slow or non-2xx)
    pub fn is_external_failure(&self) -> bool {
        matches!(
            self,
            TriageError::ApiError(_)
                | TriageError::RateLimitExceeded { .. }
                | TriageError::NetworkError(_)
                | TriageError::Timeout(_)
                | TriageError::ServerError { .. }
                | TriageError::MessageNotFound(_)
                | TriageError::BadRequest(_)
                | TriageError::Forbidden(_)
        )
    }

    /// True for malformed external payloads
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            TriageError::ParseError(_)
                | TriageError::InvalidMessageFormat(_)
                | TriageError::SerializationError(_)
        )
    }

    /// Short machine-friendly label, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            TriageError::ConfigError(_) => "config",
            TriageError::AuthError(_) => "auth",
            TriageError::RefreshError(_) => "refresh",
            TriageError::MailProvider { .. } => "mail_provider",
            TriageError::IoError(_) => "io",
            e if e.is_parse_failure() => "parse",
            TriageError::Timeout(_) => "timeout",
            _ => "external_service",
        }
    }

    /// Map a non-success HTTP status to the matching variant
    pub fn from_status(status: u16, message: String, retry_after: Option<u64>) -> Self {
        match status {
            429 => TriageError::RateLimitExceeded {
                retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
            },
            404 => TriageError::MessageNotFound(message),
            400 => TriageError::BadRequest(message),
            401 | 403 => TriageError::Forbidden(message),
            500..=599 => TriageError::ServerError { status, message },
            _ => TriageError::ApiError(message),
        }
    }
}

const DEFAULT_RETRY_AFTER: u64 = 5;

/// Parse the Retry-After header (delay-seconds form) from an HTTP response
///
/// Returns the default of 5 seconds when the header is missing or not an integer.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl From<google_gmail1::Error> for TriageError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            // HTTP response with status code (non-success responses)
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let message = format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                );
                let retry_after = parse_retry_after_header(response);
                TriageError::from_status(status.as_u16(), message, Some(retry_after))
            }
            google_gmail1::Error::BadRequest(ref err) => TriageError::BadRequest(format!("{}", err)),
            google_gmail1::Error::HttpError(ref err) => {
                TriageError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => TriageError::NetworkError(err.to_string()),
            google_gmail1::Error::JsonDecodeError(body, err) => {
                TriageError::ParseError(format!("{} (body: {})", err, body))
            }
            _ => TriageError::ApiError(error.to_string()),
        }
    }
}

impl TriageError {
    /// Map a reqwest failure; timeouts report the deadline the client was built with
    pub fn from_reqwest(error: reqwest::Error, deadline: Duration) -> Self {
        if error.is_timeout() {
            return TriageError::Timeout(deadline);
        }
        if error.is_decode() {
            return TriageError::ParseError(error.to_string());
        }
        if let Some(status) = error.status() {
            return TriageError::from_status(status.as_u16(), error.to_string(), None);
        }
        TriageError::NetworkError(error.to_string())
    }
}
