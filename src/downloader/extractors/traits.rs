// Probe-side types: raw yt-dlp formats, extractor options and the probe seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::downloader::errors::DownloadError;

/// How yt-dlp is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExtractorMode {
    /// Native `yt-dlp` binary
    #[default]
    Cli,
    /// `python3 -m yt_dlp`
    Python,
}

impl fmt::Display for ExtractorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

/// Process-wide options passed to every yt-dlp invocation
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// yt-dlp `--socket-timeout`, in seconds
    pub socket_timeout_seconds: u32,
    /// Wall-clock limit for one metadata probe, in seconds
    pub probe_timeout_seconds: u64,
    /// Pass `--force-ipv4`
    pub prefer_ipv4: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            socket_timeout_seconds: 30,
            probe_timeout_seconds: 60,
            prefer_ipv4: false,
        }
    }
}

impl ExtractorConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: u32) -> Self {
        self.socket_timeout_seconds = seconds;
        self
    }

    pub fn with_probe_timeout(mut self, seconds: u64) -> Self {
        self.probe_timeout_seconds = seconds;
        self
    }

    pub fn with_prefer_ipv4(mut self, enabled: bool) -> Self {
        self.prefer_ipv4 = enabled;
        self
    }

    /// Network arguments shared by probe and fetch invocations
    pub fn network_args(&self) -> Vec<String> {
        let mut args = vec![
            "--socket-timeout".to_string(),
            self.socket_timeout_seconds.to_string(),
        ];

        if self.prefer_ipv4 {
            args.push("--force-ipv4".to_string());
        }

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args
    }
}

/// Raw format record as reported by yt-dlp
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedFormat {
    /// Format ID (e.g., "137", "251")
    pub format_id: String,
    /// File extension (mp4, webm, m4a)
    pub ext: Option<String>,
    /// Resolution string (e.g., "1920x1080", "audio only")
    pub resolution: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Video codec (avc1, vp9, av01, none)
    pub vcodec: Option<String>,
    /// Audio codec (mp4a, opus, none)
    pub acodec: Option<String>,
    /// File size in bytes
    pub filesize: Option<u64>,
    /// Approximate file size (when exact is unknown)
    pub filesize_approx: Option<u64>,
    /// Audio bitrate in kbps
    pub abr: Option<f64>,
    /// Audio sample rate in Hz
    pub asr: Option<u32>,
    /// Format note (e.g., "1080p", "medium")
    pub format_note: Option<String>,
}

fn codec_present(codec: &Option<String>) -> bool {
    codec
        .as_deref()
        .map_or(false, |c| !c.is_empty() && c != "none")
}

impl ExtendedFormat {
    /// Get effective file size (exact or approximate)
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    pub fn has_video(&self) -> bool {
        codec_present(&self.vcodec)
    }

    pub fn has_audio(&self) -> bool {
        codec_present(&self.acodec)
    }

    /// Audio present, video absent
    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }
}

/// Video info with all raw formats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedVideoInfo {
    pub title: String,
    pub formats: Vec<ExtendedFormat>,
}

impl ExtendedVideoInfo {
    pub fn find_format(&self, format_id: &str) -> Option<&ExtendedFormat> {
        self.formats.iter().find(|f| f.format_id == format_id)
    }
}

/// Trait for info extractors
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Probe metadata for one URL. Never cached.
    async fn extract(
        &self,
        url: &str,
        config: &ExtractorConfig,
    ) -> Result<ExtendedVideoInfo, DownloadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(vcodec: Option<&str>, acodec: Option<&str>) -> ExtendedFormat {
        ExtendedFormat {
            format_id: "1".to_string(),
            vcodec: vcodec.map(str::to_string),
            acodec: acodec.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn none_codec_counts_as_absent() {
        assert!(format(Some("none"), Some("opus")).is_audio_only());
        assert!(format(None, Some("opus")).is_audio_only());
        assert!(!format(Some("avc1.64001f"), Some("mp4a.40.2")).is_audio_only());
        assert!(!format(Some("none"), Some("none")).has_audio());
    }

    #[test]
    fn network_args_follow_config() {
        let config = ExtractorConfig::default()
            .with_socket_timeout(12)
            .with_prefer_ipv4(true)
            .with_proxy(Some("socks5://127.0.0.1:1080".to_string()));

        assert_eq!(
            config.network_args(),
            vec![
                "--socket-timeout",
                "12",
                "--force-ipv4",
                "--proxy",
                "socks5://127.0.0.1:1080"
            ]
        );
    }
}
