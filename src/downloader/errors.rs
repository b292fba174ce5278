// Error types for the extractor probe and the streaming relay

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Network timeout while talking to the origin site
    #[error("Network timeout: the origin site is not responding")]
    NetworkTimeout,

    /// Origin refused the request (429, bot detection, etc.)
    #[error("The origin site is throttling or blocking requests: {0}")]
    Blocked(String),

    /// yt-dlp, python or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// URL unsupported by the extractor
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// External process exited with a failure status
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Requested variant is absent from a fresh probe
    #[error("Format not found: {0}")]
    FormatNotFound(String),

    /// The fetch step finished without producing any bytes or files
    #[error("Download produced no output")]
    EmptyOutput,

    /// Local I/O failure (temp dir, pipes)
    #[error("I/O error: {0}")]
    Io(String),

    /// Unknown error with details
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DownloadError {
    /// Failures caused by the local installation rather than the request.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::ToolNotFound(_) | Self::Io(_))
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

// Classification of raw stderr text coming back from yt-dlp
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::NetworkTimeout;
        }

        if lower.contains("429")
            || lower.contains("not a bot")
            || lower.contains("sign in to confirm")
            || lower.contains("blocked")
        {
            return Self::Blocked(s);
        }

        if lower.contains("unsupported url") || lower.contains("invalid url") || lower.contains("is not a valid url") {
            return Self::InvalidUrl(s);
        }

        if lower.contains("command not found") || lower.contains("no such file") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("json") || lower.contains("parse") {
            return Self::ParseError(s);
        }

        if lower.contains("requested format is not available") {
            return Self::FormatNotFound(s);
        }

        Self::Unknown(s)
    }
}

impl From<&str> for DownloadError {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_timeouts() {
        let err = DownloadError::from("ERROR: Read timed out.");
        assert!(matches!(err, DownloadError::NetworkTimeout));
    }

    #[test]
    fn classifies_unsupported_urls() {
        let err = DownloadError::from("ERROR: Unsupported URL: https://example.com/nothing");
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
    }

    #[test]
    fn classifies_rate_limits() {
        let err = DownloadError::from("ERROR: HTTP Error 429: Too Many Requests");
        assert!(matches!(err, DownloadError::Blocked(_)));
    }

    #[test]
    fn classifies_bot_checks() {
        let err = DownloadError::from("ERROR: [youtube] X: Sign in to confirm you're not a bot");
        assert!(matches!(err, DownloadError::Blocked(_)));
    }

    #[test]
    fn bot_inside_a_url_is_not_a_bot_check() {
        let err = DownloadError::from("ERROR: Unsupported URL: https://example.com/robotics");
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
    }

    #[test]
    fn classifies_missing_formats() {
        let err = DownloadError::from("ERROR: [youtube] X: Requested format is not available");
        assert!(matches!(err, DownloadError::FormatNotFound(_)));
    }

    #[test]
    fn falls_back_to_unknown() {
        let err = DownloadError::from("something odd happened");
        assert!(matches!(err, DownloadError::Unknown(_)));
        assert!(!err.is_local());
    }

    #[test]
    fn io_errors_are_local() {
        let err = DownloadError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert!(err.is_local());
    }
}
