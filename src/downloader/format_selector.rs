// FormatSelector - turns raw yt-dlp formats into the list shown to clients
//
// Handles:
// - Media kind filtering (video vs pure audio-only)
// - Human labels with placeholders for missing metadata
// - Quality tier and sort key per variant
// - Descending stable ranking
// - The synthetic "Best Audio" entry at the head of audio lists

use super::extractors::{ExtendedFormat, ExtendedVideoInfo};
use super::models::{MediaKind, NormalizedVariant, ProbeResult};
use super::quality::{self, QualityEstimate};

/// Reserved id of the synthetic best-audio entry. yt-dlp never emits `@`
/// in format ids, and real formats with this id are dropped anyway.
pub const BEST_AUDIO_ID: &str = "@bestaudio";

/// yt-dlp selector the relay uses for `BEST_AUDIO_ID`
pub const BEST_AUDIO_SELECTOR: &str = "bestaudio/best";

const UNKNOWN: &str = "Unknown";

/// Format selector with kind filtering and ranking
pub struct FormatSelector;

impl FormatSelector {
    /// Filtered, normalized, ranked list for one probe
    pub fn build_probe_result(kind: MediaKind, info: &ExtendedVideoInfo) -> ProbeResult {
        let variants = Self::normalize(kind, &info.formats);

        ProbeResult {
            title: info.title.clone(),
            variants: Self::rank(kind, variants),
        }
    }

    /// Whether a raw format belongs in the list for `kind`
    pub fn matches_kind(kind: MediaKind, format: &ExtendedFormat) -> bool {
        match kind {
            MediaKind::Video => format.has_video(),
            MediaKind::Audio => format.is_audio_only(),
        }
    }

    /// Keep the formats of the requested kind and normalize them. Never fails.
    pub fn normalize(kind: MediaKind, formats: &[ExtendedFormat]) -> Vec<NormalizedVariant> {
        formats
            .iter()
            .filter(|f| f.format_id != BEST_AUDIO_ID)
            .filter(|f| Self::matches_kind(kind, f))
            .map(|f| Self::normalize_one(kind, f))
            .collect()
    }

    fn normalize_one(kind: MediaKind, format: &ExtendedFormat) -> NormalizedVariant {
        let codec = format.acodec.as_deref().unwrap_or("");
        let estimate = quality::classify(format.abr, codec);
        let extension = format
            .ext
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let (label, sort_key) = match kind {
            MediaKind::Video => (
                Self::video_label(format, &extension),
                format.height.unwrap_or(0) as f64,
            ),
            MediaKind::Audio => (
                Self::audio_label(format, &extension, &estimate),
                estimate.effective_bitrate,
            ),
        };

        NormalizedVariant {
            id: format.format_id.clone(),
            label,
            extension,
            approx_size_bytes: format.effective_size().filter(|s| *s > 0),
            quality_tier: estimate.tier,
            sort_key: sort_key.max(0.0),
        }
    }

    fn video_label(format: &ExtendedFormat, extension: &str) -> String {
        let resolution = match (&format.resolution, format.width, format.height) {
            (Some(r), _, _) if !r.is_empty() => r.clone(),
            (_, Some(w), Some(h)) => format!("{}x{}", w, h),
            (_, None, Some(h)) => format!("{}p", h),
            _ => UNKNOWN.to_string(),
        };

        match format.format_note.as_deref().filter(|n| !n.is_empty()) {
            Some(note) => format!("{} ({}) - {}", resolution, extension, note),
            None => format!("{} ({})", resolution, extension),
        }
    }

    /// Shows the reported bitrate only; an assumed one is marked as such
    fn audio_label(format: &ExtendedFormat, extension: &str, estimate: &QualityEstimate) -> String {
        let bitrate = match format.abr.filter(|b| b.is_finite() && *b > 0.0) {
            Some(abr) => format!("{}kbps", abr.round() as u64),
            None => format!("{} bitrate", UNKNOWN),
        };

        let mut label = match format.acodec.as_deref().filter(|c| !c.is_empty()) {
            Some(codec) => format!("{} ({}) - {}", bitrate, extension, codec),
            None => format!("{} ({})", bitrate, extension),
        };
        if estimate.estimated {
            label.push_str(&format!(" (assumed ~{}kbps)", estimate.effective_bitrate.round() as u64));
        }
        label
    }

    /// Stable descending sort by `sort_key`; audio lists get the synthetic
    /// best-audio entry first.
    pub fn rank(kind: MediaKind, mut variants: Vec<NormalizedVariant>) -> Vec<NormalizedVariant> {
        variants.sort_by(|a, b| b.sort_key.total_cmp(&a.sort_key));

        if kind == MediaKind::Audio {
            if let Some(top) = variants.first() {
                let best = Self::best_audio_variant(top);
                variants.insert(0, best);
            }
        }

        variants
    }

    /// Synthetic entry deferring the choice to yt-dlp's own best-audio pick.
    /// `top` is the highest ranked real variant.
    fn best_audio_variant(top: &NormalizedVariant) -> NormalizedVariant {
        NormalizedVariant {
            id: BEST_AUDIO_ID.to_string(),
            label: "Best Audio (auto-select)".to_string(),
            extension: top.extension.clone(),
            approx_size_bytes: None,
            quality_tier: top.quality_tier,
            sort_key: top.sort_key + 1.0,
        }
    }

    /// yt-dlp `-f` argument for a client-supplied variant id
    pub fn format_spec(variant_id: &str) -> String {
        if variant_id == BEST_AUDIO_ID {
            BEST_AUDIO_SELECTOR.to_string()
        } else {
            variant_id.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::QualityTier;

    fn audio_format(id: &str, abr: f64, acodec: &str, ext: &str) -> ExtendedFormat {
        ExtendedFormat {
            format_id: id.to_string(),
            ext: Some(ext.to_string()),
            vcodec: Some("none".to_string()),
            acodec: Some(acodec.to_string()),
            abr: Some(abr),
            asr: Some(48000),
            ..Default::default()
        }
    }

    fn video_format(id: &str, height: u32, acodec: &str) -> ExtendedFormat {
        ExtendedFormat {
            format_id: id.to_string(),
            ext: Some("mp4".to_string()),
            width: Some(height * 16 / 9),
            height: Some(height),
            resolution: Some(format!("{}x{}", height * 16 / 9, height)),
            vcodec: Some("avc1.640028".to_string()),
            acodec: Some(acodec.to_string()),
            format_note: Some(format!("{}p", height)),
            filesize: Some(height as u64 * 1000),
            ..Default::default()
        }
    }

    fn info(formats: Vec<ExtendedFormat>) -> ExtendedVideoInfo {
        ExtendedVideoInfo {
            title: "Clip".to_string(),
            formats,
        }
    }

    #[test]
    fn audio_only_formats_go_to_audio_lists_only() {
        let formats = vec![
            audio_format("251", 130.0, "opus", "webm"),
            video_format("18", 360, "mp4a.40.2"),
            video_format("137", 1080, "none"),
        ];

        let audio = FormatSelector::normalize(MediaKind::Audio, &formats);
        assert_eq!(audio.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(), vec!["251"]);

        let video = FormatSelector::normalize(MediaKind::Video, &formats);
        assert_eq!(
            video.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(),
            vec!["18", "137"]
        );
    }

    #[test]
    fn formats_without_codecs_are_dropped() {
        let storyboard = ExtendedFormat {
            format_id: "sb0".to_string(),
            vcodec: Some("none".to_string()),
            acodec: Some("none".to_string()),
            ..Default::default()
        };
        assert!(FormatSelector::normalize(MediaKind::Audio, &[storyboard.clone()]).is_empty());
        assert!(FormatSelector::normalize(MediaKind::Video, &[storyboard]).is_empty());
    }

    #[test]
    fn missing_fields_degrade_to_placeholders() {
        let bare = ExtendedFormat {
            format_id: "x".to_string(),
            vcodec: Some("vp9".to_string()),
            ..Default::default()
        };
        let variants = FormatSelector::normalize(MediaKind::Video, &[bare]);

        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].label, "Unknown (Unknown)");
        assert_eq!(variants[0].extension, "Unknown");
        assert_eq!(variants[0].sort_key, 0.0);
        assert_eq!(variants[0].approx_size_bytes, None);
        assert_eq!(variants[0].quality_tier, QualityTier::Fair);
    }

    #[test]
    fn labels_compose_human_fields() {
        let variants = FormatSelector::normalize(
            MediaKind::Video,
            &[video_format("22", 720, "mp4a.40.2")],
        );
        assert_eq!(variants[0].label, "1280x720 (mp4) - 720p");
        assert_eq!(variants[0].approx_size_bytes, Some(720_000));

        let variants = FormatSelector::normalize(
            MediaKind::Audio,
            &[audio_format("140", 129.48, "mp4a.40.2", "m4a")],
        );
        assert_eq!(variants[0].label, "129kbps (m4a) - mp4a.40.2");
    }

    #[test]
    fn assumed_bitrate_is_never_shown_as_measured() {
        let variants = FormatSelector::normalize(
            MediaKind::Audio,
            &[audio_format("250", 0.0, "opus", "webm")],
        );

        assert_eq!(variants[0].label, "Unknown bitrate (webm) - opus (assumed ~160kbps)");
        assert!(!variants[0].label.starts_with("160kbps"));
        assert_eq!(variants[0].sort_key, 160.0);
        assert_eq!(variants[0].quality_tier, QualityTier::Excellent);
    }

    #[test]
    fn ranking_is_stable_and_descending() {
        let formats = vec![
            video_format("a", 720, "none"),
            video_format("b", 1080, "none"),
            video_format("c", 720, "none"),
            video_format("d", 360, "none"),
        ];
        let ranked = FormatSelector::rank(
            MediaKind::Video,
            FormatSelector::normalize(MediaKind::Video, &formats),
        );

        let ids: Vec<&str> = ranked.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c", "d"]);
        assert!(ranked.windows(2).all(|w| w[0].sort_key >= w[1].sort_key));
    }

    #[test]
    fn audio_list_starts_with_best_audio() {
        let formats = vec![
            audio_format("m", 64.0, "mp3", "mp3"),
            audio_format("o", 0.0, "opus", "webm"),
        ];
        let result = FormatSelector::build_probe_result(MediaKind::Audio, &info(formats));

        let ids: Vec<&str> = result.variants.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec![BEST_AUDIO_ID, "o", "m"]);

        assert_eq!(result.variants[1].quality_tier, QualityTier::Excellent);
        assert_eq!(result.variants[1].sort_key, 160.0);
        assert_eq!(result.variants[1].label, "Unknown bitrate (webm) - opus (assumed ~160kbps)");
        assert_eq!(result.variants[2].label, "64kbps (mp3) - mp3");
        assert_eq!(result.variants[2].quality_tier, QualityTier::Fair);
        assert_eq!(result.variants[2].sort_key, 64.0);
        assert!(result.variants[0].sort_key > result.variants[1].sort_key);
        assert_eq!(result.title, "Clip");
    }

    #[test]
    fn best_audio_is_not_added_to_empty_or_video_lists() {
        let empty = FormatSelector::build_probe_result(MediaKind::Audio, &info(vec![]));
        assert!(empty.variants.is_empty());

        let video = FormatSelector::build_probe_result(
            MediaKind::Video,
            &info(vec![video_format("18", 360, "mp4a.40.2")]),
        );
        assert!(video.variants.iter().all(|v| v.id != BEST_AUDIO_ID));
    }

    #[test]
    fn reserved_id_never_collides() {
        let formats = vec![
            audio_format(BEST_AUDIO_ID, 320.0, "mp3", "mp3"),
            audio_format("140", 128.0, "mp4a.40.2", "m4a"),
        ];
        let result = FormatSelector::build_probe_result(MediaKind::Audio, &info(formats));

        assert_eq!(result.variants.len(), 2);
        assert_eq!(
            result.variants.iter().filter(|v| v.id == BEST_AUDIO_ID).count(),
            1
        );
    }

    #[test]
    fn best_audio_maps_to_tool_selector() {
        assert_eq!(FormatSelector::format_spec(BEST_AUDIO_ID), "bestaudio/best");
        assert_eq!(FormatSelector::format_spec("251"), "251");
    }
}
