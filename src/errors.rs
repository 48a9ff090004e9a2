use reqwest::StatusCode;
use std::fmt::{self, Formatter};
use thiserror::Error;
use url::Url;

/// Coarse classification of a non-2xx response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HttpErrorKind {
    /// 4xx, the request itself was rejected.
    Client,
    /// 5xx, the service failed to handle a valid request.
    Server,
    /// Any other non-success status (1xx, 3xx).
    Other,
}

impl HttpErrorKind {
    #[must_use]
    pub fn of(status: StatusCode) -> Self {
        if status.is_client_error() {
            Self::Client
        } else if status.is_server_error() {
            Self::Server
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for HttpErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client error"),
            Self::Server => write!(f, "server error"),
            Self::Other => write!(f, "unexpected status"),
        }
    }
}

const SUMMARY_LEN: usize = 120;

/// A non-2xx response from the verification service.
#[derive(Debug, Error)]
pub struct RequestFailure {
    pub url: Url,
    pub status: StatusCode,
    /// Short reason, the service's `detail` when it sent one.
    pub msg: String,
    /// Response body exactly as received.
    pub body: String,
}

impl RequestFailure {
    /// Failure whose body is the message itself. Use [`Self::with_body`]
    /// when the raw response differs.
    pub fn new(url: Url, status: StatusCode, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            url,
            status,
            body: msg.clone(),
            msg,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First line of `msg`, cut to a length that fits a terminal line.
    #[must_use]
    pub fn summary(&self) -> String {
        let line = self.msg.lines().next().unwrap_or_default().trim();
        if line.chars().count() > SUMMARY_LEN {
            let cut: String = line.chars().take(SUMMARY_LEN).collect();
            format!("{cut}...")
        } else {
            line.to_owned()
        }
    }

    #[must_use]
    pub fn kind(&self) -> HttpErrorKind {
        HttpErrorKind::of(self.status)
    }

    pub fn error_code(&self) -> &'static str {
        match self.status.as_u16() {
            400..=499 => "E102",
            500..=599 => "E103",
            _ => "E101",
        }
    }

    fn suggestions(&self) -> &'static [&'static str] {
        match self.status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => &[
                "Check that PARCHA_API_TOKEN holds a valid API key",
                "Verify the key has access to the selected agent",
            ],
            StatusCode::NOT_FOUND => &[
                "Check that the job or case identifier is correct",
                "Check that the base URL points at the right region",
            ],
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => &[
                "Check the schema payload against the agent configuration",
                "Verify the agent key is correct",
            ],
            StatusCode::TOO_MANY_REQUESTS => &[
                "Wait a moment before retrying",
                "Consider reducing request frequency",
            ],
            status if status.is_server_error() => &[
                "The verification service is having trouble, try again later",
            ],
            _ => &[],
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "[{}] {} returned {} ({})",
            self.error_code(),
            self.url,
            self.status,
            self.kind(),
        )?;

        let summary = self.summary();
        if !summary.is_empty() {
            write!(formatter, ": {summary}")?;
        }
        write!(formatter, "\nServer response: {}", self.body)?;

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            write!(formatter, "\n\nSuggestions:")?;
            for suggestion in suggestions {
                write!(formatter, "\n  • {suggestion}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://api.parcha.ai/getJobById").unwrap()
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(HttpErrorKind::of(StatusCode::NOT_FOUND), HttpErrorKind::Client);
        assert_eq!(
            HttpErrorKind::of(StatusCode::BAD_GATEWAY),
            HttpErrorKind::Server
        );
        assert_eq!(
            HttpErrorKind::of(StatusCode::PERMANENT_REDIRECT),
            HttpErrorKind::Other
        );
    }

    #[test]
    fn test_error_code_follows_kind() {
        let client = RequestFailure::new(url(), StatusCode::UNAUTHORIZED, "nope");
        let server = RequestFailure::new(url(), StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(client.error_code(), "E102");
        assert_eq!(server.error_code(), "E103");
    }

    #[test]
    fn test_display_without_suggestions() {
        let failure = RequestFailure::new(url(), StatusCode::IM_A_TEAPOT, "short and stout");
        let message = format!("{failure}");
        assert!(message.contains("418"));
        assert!(message.contains("Server response: short and stout"));
        assert!(!message.contains("Suggestions:"));
    }

    #[test]
    fn test_first_line_carries_the_reason() {
        let failure = RequestFailure::new(url(), StatusCode::NOT_FOUND, "Job not found")
            .with_body(r#"{"detail":"Job not found","request_id":"r-77"}"#);
        let message = format!("{failure}");
        let first = message.lines().next().unwrap();
        assert!(first.starts_with("[E102]"));
        assert!(first.ends_with("(client error): Job not found"));
        assert!(message.contains(
            r#"Server response: {"detail":"Job not found","request_id":"r-77"}"#
        ));
    }

    #[test]
    fn test_summary_is_one_short_line() {
        let long = format!("{}\nsecond line", "x".repeat(300));
        let failure = RequestFailure::new(url(), StatusCode::BAD_GATEWAY, long);
        let summary = failure.summary();
        assert_eq!(summary, format!("{}...", "x".repeat(SUMMARY_LEN)));
        assert!(failure.body.contains("second line"));
    }
}
