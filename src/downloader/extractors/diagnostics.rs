// Probe failure diagnostics
//
// Looks at yt-dlp error text and names the most likely cause, so the client
// gets a hint next to the raw message.

use serde::{Deserialize, Serialize};

/// Reasons an origin site may refuse a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingReason {
    /// HTTP 403 Forbidden
    Forbidden,
    /// Age-restricted content requiring login
    AgeRestricted,
    /// Geographic restriction
    GeoBlocked,
    /// 429 or similar
    RateLimited,
    /// Bot detection / captcha
    BotDetection,
    PrivateVideo,
    /// Deleted or otherwise gone
    Unavailable,
    /// DRM or paid content; no workaround
    DrmProtected,
    /// URL not handled by any extractor
    UnsupportedUrl,
    NetworkTimeout,
}

impl BlockingReason {
    /// Whether asking again later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Forbidden | Self::RateLimited | Self::BotDetection | Self::NetworkTimeout
        )
    }

    /// Short hint shown to the client
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Forbidden => "the site refused access (HTTP 403)",
            Self::AgeRestricted => "the media is age-restricted and needs a signed-in session",
            Self::GeoBlocked => "the media is not available from this server's region",
            Self::RateLimited => "the site is rate-limiting this server, try again later",
            Self::BotDetection => "the site flagged the request as automated",
            Self::PrivateVideo => "the media is private",
            Self::Unavailable => "the media was removed or is unavailable",
            Self::DrmProtected => "the media is DRM-protected and cannot be downloaded",
            Self::UnsupportedUrl => "the URL is not supported",
            Self::NetworkTimeout => "the site did not respond in time",
        }
    }
}

/// Analyze error message and return the most specific reason
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    let lower = error.to_lowercase();

    if lower.contains("drm")
        || lower.contains("widevine")
        || lower.contains("requires purchase")
        || lower.contains("rental")
    {
        return Some(BlockingReason::DrmProtected);
    }

    if lower.contains("unsupported url") {
        return Some(BlockingReason::UnsupportedUrl);
    }

    if lower.contains("age-restricted") || lower.contains("confirm your age") {
        return Some(BlockingReason::AgeRestricted);
    }

    if lower.contains("private video") || lower.contains("video is private") {
        return Some(BlockingReason::PrivateVideo);
    }

    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("no longer available")
    {
        return Some(BlockingReason::Unavailable);
    }

    if lower.contains("not available in your country") || lower.contains("geo restrict") {
        return Some(BlockingReason::GeoBlocked);
    }

    if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit") {
        return Some(BlockingReason::RateLimited);
    }

    if lower.contains("not a bot") || lower.contains("captcha") || lower.contains("unusual traffic") {
        return Some(BlockingReason::BotDetection);
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return Some(BlockingReason::Forbidden);
    }

    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("network is unreachable") {
        return Some(BlockingReason::NetworkTimeout);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_403_is_forbidden() {
        let error = "ERROR: HTTP Error 403: Forbidden";
        assert_eq!(diagnose_error(error), Some(BlockingReason::Forbidden));
    }

    #[test]
    fn unsupported_url_is_detected() {
        let error = "ERROR: Unsupported URL: https://example.com/";
        assert_eq!(diagnose_error(error), Some(BlockingReason::UnsupportedUrl));
    }

    #[test]
    fn region_lock_is_geo_blocked() {
        let error = "Video not available in your country";
        assert_eq!(diagnose_error(error), Some(BlockingReason::GeoBlocked));
    }

    #[test]
    fn sign_in_prompt_is_bot_detection() {
        let error = "Sign in to confirm you're not a bot";
        assert_eq!(diagnose_error(error), Some(BlockingReason::BotDetection));
    }

    #[test]
    fn unrelated_text_is_not_diagnosed() {
        assert_eq!(diagnose_error("something else"), None);
    }

    #[test]
    fn only_transient_reasons_are_retryable() {
        assert!(BlockingReason::RateLimited.is_retryable());
        assert!(!BlockingReason::DrmProtected.is_retryable());
    }
}
