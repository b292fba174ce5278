// Quality classifier
//
// Grades a variant from the bitrate and codec yt-dlp reports for it. This is
// a heuristic over self-reported metadata, not a measurement of the audio.

use super::models::QualityTier;

/// Threshold for `Good`, kbps
pub const GOOD_BITRATE: f64 = 128.0;

/// Threshold for `Excellent`, kbps
pub const EXCELLENT_BITRATE: f64 = 160.0;

/// Bitrate assumed for codecs that report zero
pub const ASSUMED_OPUS_BITRATE: f64 = 160.0;

/// Classification of one variant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityEstimate {
    pub tier: QualityTier,
    /// Bitrate used for grading and sorting, kbps
    pub effective_bitrate: f64,
    /// True when `effective_bitrate` is an assumption, not the reported value
    pub estimated: bool,
}

/// Codec families known to report a zero bitrate for good streams
fn under_reports_bitrate(codec: &str) -> bool {
    codec.trim().to_ascii_lowercase().starts_with("opus")
}

/// Grade a variant from its reported bitrate (kbps) and codec name
pub fn classify(bitrate: Option<f64>, codec: &str) -> QualityEstimate {
    let reported = bitrate.filter(|b| b.is_finite() && *b > 0.0).unwrap_or(0.0);

    let (effective_bitrate, estimated) = if reported == 0.0 && under_reports_bitrate(codec) {
        (ASSUMED_OPUS_BITRATE, true)
    } else {
        (reported, false)
    };

    let mut tier = QualityTier::Fair;
    if effective_bitrate >= GOOD_BITRATE {
        tier = QualityTier::Good;
    }
    if effective_bitrate >= EXCELLENT_BITRATE {
        tier = QualityTier::Excellent;
    }

    QualityEstimate {
        tier,
        effective_bitrate,
        estimated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bitrate_opus_is_assumed_excellent() {
        let estimate = classify(Some(0.0), "opus");
        assert_eq!(estimate.tier, QualityTier::Excellent);
        assert_eq!(estimate.effective_bitrate, 160.0);
        assert!(estimate.estimated);
    }

    #[test]
    fn missing_bitrate_opus_is_assumed_excellent() {
        let estimate = classify(None, "OPUS");
        assert_eq!(estimate.tier, QualityTier::Excellent);
        assert!(estimate.estimated);
    }

    #[test]
    fn reported_bitrate_drives_the_tier() {
        assert_eq!(classify(Some(150.0), "aac").tier, QualityTier::Good);
        assert_eq!(classify(Some(200.0), "mp3").tier, QualityTier::Excellent);
        assert_eq!(classify(Some(200.0), "opus").tier, QualityTier::Excellent);
        assert_eq!(classify(Some(50.0), "mp3").tier, QualityTier::Fair);
        assert_eq!(classify(Some(128.0), "mp4a.40.2").tier, QualityTier::Good);
        assert_eq!(classify(Some(160.0), "mp4a.40.2").tier, QualityTier::Excellent);
    }

    #[test]
    fn low_opus_bitrate_is_not_substituted() {
        let estimate = classify(Some(64.0), "opus");
        assert_eq!(estimate.tier, QualityTier::Fair);
        assert_eq!(estimate.effective_bitrate, 64.0);
        assert!(!estimate.estimated);
    }

    #[test]
    fn zero_bitrate_other_codecs_stay_fair() {
        let estimate = classify(Some(0.0), "mp3");
        assert_eq!(estimate.tier, QualityTier::Fair);
        assert_eq!(estimate.effective_bitrate, 0.0);
        assert!(!estimate.estimated);
    }

    #[test]
    fn negative_bitrate_is_treated_as_missing() {
        assert_eq!(classify(Some(-5.0), "aac").effective_bitrate, 0.0);
    }
}
