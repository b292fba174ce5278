// Common data models for the relay

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media the client asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Coarse quality grade inferred from self-reported metadata.
///
/// Ordered, so `Fair < Good < Excellent`. This is never a measurement of
/// the actual audio fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Fair,
    Good,
    Excellent,
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fair => write!(f, "fair"),
            Self::Good => write!(f, "good"),
            Self::Excellent => write!(f, "excellent"),
        }
    }
}

/// One user-facing variant, as returned by `POST /formats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedVariant {
    #[serde(rename = "format_id")]
    pub id: String,
    pub label: String,
    #[serde(rename = "ext")]
    pub extension: String,
    #[serde(rename = "filesize", skip_serializing_if = "Option::is_none")]
    pub approx_size_bytes: Option<u64>,
    #[serde(rename = "quality")]
    pub quality_tier: QualityTier,
    /// Height for video, effective bitrate (kbps) for audio
    pub sort_key: f64,
}

/// Probe result for one URL and media kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub title: String,
    #[serde(rename = "formats")]
    pub variants: Vec<NormalizedVariant>,
}

/// Client's download choice. Only presence is validated; the id is not
/// checked against an earlier probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSelection {
    pub url: String,
    pub variant_id: String,
    pub media_kind: MediaKind,
}

/// Result of `POST /analyze-audio`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub quality: QualityTier,
    /// Bitrate as reported by the extractor, in kbps
    pub bitrate: f64,
    pub sample_rate: u32,
    pub codec: String,
    /// True when the tier was computed from an assumed bitrate
    pub bitrate_estimated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
